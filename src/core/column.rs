use std::fmt;

use super::cursor::ByteReader;
use crate::error::{FormatError, Result};

/// The closed set of column encodings a data set may declare.
///
/// The discriminants are the type codes stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ColumnType {
    I8 = 0,
    U8 = 1,
    I16 = 2,
    U16 = 3,
    I32 = 4,
    U32 = 5,
    /// Big-endian IEEE-754 single
    F32 = 6,
    /// `i32` length followed by single-byte characters
    Ascii = 7,
    /// `i32` character count followed by 16-bit code units
    Wide = 8,
}
impl ColumnType {
    /// Resolves an on-disk type code
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::I8),
            1 => Ok(Self::U8),
            2 => Ok(Self::I16),
            3 => Ok(Self::U16),
            4 => Ok(Self::I32),
            5 => Ok(Self::U32),
            6 => Ok(Self::F32),
            7 => Ok(Self::Ascii),
            8 => Ok(Self::Wide),
            _ => Err(FormatError::UnknownColumnType(code).into()),
        }
    }

    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// The minimum number of bytes a value of this type occupies.
    ///
    /// For string types this is the length prefix alone.
    #[must_use]
    pub fn min_width(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 | Self::Ascii | Self::Wide => 4,
        }
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::U8 | Self::I16 | Self::U16 | Self::I32 | Self::U32
        )
    }

    #[must_use]
    pub fn is_string(self) -> bool {
        matches!(self, Self::Ascii | Self::Wide)
    }

    /// Decodes one value, treating `width` as the framing of string values
    pub(crate) fn decode(self, reader: &mut ByteReader<'_>, width: usize) -> Result<Value> {
        let value = match self {
            Self::I8 => Value::I8(reader.read_i8()?),
            Self::U8 => Value::U8(reader.read_u8()?),
            Self::I16 => Value::I16(reader.read_i16()?),
            Self::U16 => Value::U16(reader.read_u16()?),
            Self::I32 => Value::I32(reader.read_i32()?),
            Self::U32 => Value::U32(reader.read_u32()?),
            Self::F32 => Value::F32(reader.read_f32()?),
            Self::Ascii => Value::Ascii(reader.read_string(Some(width))?),
            Self::Wide => Value::Wide(reader.read_wstring(Some(width))?),
        };
        Ok(value)
    }
}

/// A single decoded cell of a data set row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    Ascii(String),
    Wide(String),
}
impl Value {
    /// Widens any integer value
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I8(v) => Some(i64::from(v)),
            Self::U8(v) => Some(i64::from(v)),
            Self::I16(v) => Some(i64::from(v)),
            Self::U16(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::U32(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are converted
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            other => other.as_i64().map(|v| v as f32),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ascii(s) | Self::Wide(s) => Some(s),
            _ => None,
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32(v) => write!(f, "{v}"),
            Self::Ascii(s) | Self::Wide(s) => f.write_str(s),
            other => match other.as_i64() {
                Some(v) => write!(f, "{v}"),
                None => Ok(()),
            },
        }
    }
}

/// Name, encoding, and on-disk width of one data set column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    name: String,
    kind: ColumnType,
    byte_size: usize,
}
impl ColumnDescriptor {
    /// Builds a descriptor from its on-disk `(name, type_code, byte_size)` triple
    ///
    /// # Arguments
    ///
    /// * `name` - The column name, must not be empty
    /// * `code` - The type code, one of the nine known encodings
    /// * `byte_size` - The number of bytes each row spends on this column
    pub fn new(name: impl Into<String>, code: i32, byte_size: usize) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(FormatError::EmptyColumnName.into());
        }
        let kind = ColumnType::from_code(code)?;
        if byte_size < kind.min_width() {
            return Err(FormatError::ColumnTooNarrow {
                name,
                declared: byte_size,
                required: kind.min_width(),
            }
            .into());
        }
        Ok(Self {
            name,
            kind,
            byte_size,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ColumnType {
        self.kind
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Decodes this column's value at the reader's current position
    pub(crate) fn decode(&self, reader: &mut ByteReader<'_>) -> Result<Value> {
        self.kind.decode(reader, self.byte_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn decode(code: i32, bytes: &[u8]) -> Value {
        let column = ColumnDescriptor::new("col", code, bytes.len()).unwrap();
        let mut reader = ByteReader::new(bytes);
        column.decode(&mut reader).unwrap()
    }

    // ==================== Decode Tests ====================

    #[test]
    fn test_decode_every_type_code() {
        assert_eq!(decode(0, &[0xfe]), Value::I8(-2));
        assert_eq!(decode(1, &[0xfe]), Value::U8(254));
        assert_eq!(decode(2, &[0xff, 0xfe]), Value::I16(-2));
        assert_eq!(decode(3, &[0x01, 0x00]), Value::U16(256));
        assert_eq!(decode(4, &[0x00, 0x00, 0x00, 0x2a]), Value::I32(42));
        assert_eq!(decode(5, &[0xff, 0xff, 0xff, 0xff]), Value::U32(u32::MAX));
        assert_eq!(decode(6, &100.25f32.to_be_bytes()), Value::F32(100.25));
        assert_eq!(
            decode(7, &[0x00, 0x00, 0x00, 0x03, b'A', b'B', b'C']),
            Value::Ascii("ABC".to_string())
        );
        assert_eq!(
            decode(8, &[0x00, 0x00, 0x00, 0x02, 0x00, b'O', 0x00, b'K']),
            Value::Wide("OK".to_string())
        );
    }

    #[test]
    fn test_string_column_consumes_declared_width() {
        let bytes = [0x00, 0x00, 0x00, 0x01, b'A', 0, 0, 0, 0x2a];
        let column = ColumnDescriptor::new("name", 7, 8).unwrap();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(column.decode(&mut reader).unwrap(), Value::Ascii("A".into()));
        assert_eq!(reader.read_u8().unwrap(), 0x2a);
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_unknown_type_code() {
        let err = ColumnDescriptor::new("col", 9, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::UnknownColumnType(9))
        ));
        assert!(ColumnDescriptor::new("col", -1, 4).is_err());
    }

    #[test]
    fn test_empty_name() {
        let err = ColumnDescriptor::new("", 4, 4).unwrap_err();
        assert!(matches!(err, Error::FormatError(FormatError::EmptyColumnName)));
    }

    #[test]
    fn test_too_narrow() {
        let err = ColumnDescriptor::new("Intensity", 6, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::ColumnTooNarrow { .. })
        ));
    }

    #[test]
    fn test_code_round_trip() {
        for code in 0..=8 {
            assert_eq!(ColumnType::from_code(code).unwrap().code(), code);
        }
    }

    // ==================== Value Tests ====================

    #[test]
    fn test_value_views() {
        assert_eq!(Value::I16(-4).as_i64(), Some(-4));
        assert_eq!(Value::U8(3).as_f32(), Some(3.0));
        assert_eq!(Value::F32(1.5).as_i64(), None);
        assert_eq!(Value::Wide("x".into()).as_str(), Some("x"));
        assert_eq!(Value::I32(7).to_string(), "7");
        assert_eq!(Value::Ascii("abc".into()).to_string(), "abc");
    }
}
