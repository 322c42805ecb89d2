use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use super::cursor::{latin1, ByteReader};
use crate::error::Result;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_ASCII: &str = "text/ascii";
pub const MIME_INT8: &str = "text/x-calvin-integer-8";
pub const MIME_INT16: &str = "text/x-calvin-integer-16";
pub const MIME_INT32: &str = "text/x-calvin-integer-32";
pub const MIME_UINT8: &str = "text/x-calvin-unsigned-integer-8";
pub const MIME_UINT16: &str = "text/x-calvin-unsigned-integer-16";
pub const MIME_UINT32: &str = "text/x-calvin-unsigned-integer-32";
pub const MIME_FLOAT: &str = "text/x-calvin-float";

/// A parameter value decoded according to its declared type
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Wide text
    Text(String),
    /// Single-byte text
    Ascii(String),
    /// Any signed integer width
    Int(i32),
    /// Any unsigned integer width
    UInt(u32),
    Float(f32),
    /// Bytes of an unrecognized type, kept verbatim
    Raw(Vec<u8>),
}
impl ParameterValue {
    /// Interprets a raw value blob using its type string.
    ///
    /// Blobs too short for the declared numeric width are kept as [`ParameterValue::Raw`].
    #[must_use]
    pub fn decode(bytes: &[u8], type_name: &str) -> Self {
        match type_name {
            MIME_TEXT => {
                let text = bytes.chunks_exact(2).map(|unit| char::from(unit[1])).collect();
                Self::Text(trim_nul(text))
            }
            MIME_ASCII => Self::Ascii(trim_nul(latin1(bytes))),
            MIME_INT8 if !bytes.is_empty() => Self::Int(i32::from(bytes[0] as i8)),
            MIME_INT16 if bytes.len() >= 2 => Self::Int(i32::from(BigEndian::read_i16(bytes))),
            MIME_INT32 if bytes.len() >= 4 => Self::Int(BigEndian::read_i32(bytes)),
            MIME_UINT8 if !bytes.is_empty() => Self::UInt(u32::from(bytes[0])),
            MIME_UINT16 if bytes.len() >= 2 => Self::UInt(u32::from(BigEndian::read_u16(bytes))),
            MIME_UINT32 if bytes.len() >= 4 => Self::UInt(BigEndian::read_u32(bytes)),
            MIME_FLOAT if bytes.len() >= 4 => Self::Float(BigEndian::read_f32(bytes)),
            _ => Self::Raw(bytes.to_vec()),
        }
    }

    /// Serializes the value into its blob representation
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Ascii(s) => s.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect(),
            Self::Int(v) => v.to_be_bytes().to_vec(),
            Self::UInt(v) => v.to_be_bytes().to_vec(),
            Self::Float(v) => v.to_be_bytes().to_vec(),
            Self::Raw(bytes) => bytes.clone(),
        }
    }

    /// The type string this value is written with by default
    #[must_use]
    pub fn default_type(&self) -> &'static str {
        match self {
            Self::Text(_) => MIME_TEXT,
            Self::Ascii(_) => MIME_ASCII,
            Self::Int(_) => MIME_INT32,
            Self::UInt(_) => MIME_UINT32,
            Self::Float(_) => MIME_FLOAT,
            Self::Raw(_) => "application/octet-stream",
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::UInt(v) => Some(i64::from(*v)),
            Self::Text(s) | Self::Ascii(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Ascii(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Raw(bytes) => f.write_str(&trim_nul(latin1(bytes))),
        }
    }
}

fn trim_nul(mut s: String) -> String {
    let len = s.trim_end_matches('\0').len();
    s.truncate(len);
    s
}

/// A typed name/value pair recorded in a data header
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
    pub type_name: String,
}
impl Parameter {
    /// Creates a parameter using the value's default type string
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        let type_name = value.default_type().to_string();
        Self {
            name: name.into(),
            value,
            type_name,
        }
    }

    /// Reads `(wide name, value blob, wide type)` at the reader's position
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let name = reader.read_wstring(None)?;
        let raw = reader.read_blob()?;
        let type_name = reader.read_wstring(None)?;
        let value = ParameterValue::decode(raw, &type_name);
        Ok(Self {
            name,
            value,
            type_name,
        })
    }

    /// The textual rendering of the value
    #[must_use]
    pub fn value_text(&self) -> String {
        self.value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> Vec<u8> {
        let mut bytes = (s.len() as i32).to_be_bytes().to_vec();
        for c in s.bytes() {
            bytes.extend_from_slice(&[0, c]);
        }
        bytes
    }

    #[test]
    fn test_read_text_parameter() {
        let mut bytes = wide("affymetrix-array-type");
        let value = ParameterValue::Text("HG-U133A\0\0".into()).encode();
        bytes.extend_from_slice(&(value.len() as i32).to_be_bytes());
        bytes.extend_from_slice(&value);
        bytes.extend_from_slice(&wide(MIME_TEXT));

        let mut reader = ByteReader::new(&bytes);
        let param = Parameter::read(&mut reader).unwrap();
        assert_eq!(param.name, "affymetrix-array-type");
        assert_eq!(param.value, ParameterValue::Text("HG-U133A".into()));
        assert_eq!(param.type_name, MIME_TEXT);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_decode_numeric_values() {
        assert_eq!(
            ParameterValue::decode(&[0, 0, 1, 0, 0, 0, 0, 0], MIME_INT32),
            ParameterValue::Int(256)
        );
        assert_eq!(ParameterValue::decode(&[0xff], MIME_INT8), ParameterValue::Int(-1));
        assert_eq!(
            ParameterValue::decode(&[0x01, 0x00], MIME_UINT16),
            ParameterValue::UInt(256)
        );
        assert_eq!(
            ParameterValue::decode(&2.5f32.to_be_bytes(), MIME_FLOAT),
            ParameterValue::Float(2.5)
        );
    }

    #[test]
    fn test_decode_short_numeric_is_raw() {
        assert_eq!(
            ParameterValue::decode(&[1, 2], MIME_INT32),
            ParameterValue::Raw(vec![1, 2])
        );
    }

    #[test]
    fn test_value_text_rendering() {
        assert_eq!(ParameterValue::Int(-7).to_string(), "-7");
        assert_eq!(ParameterValue::Ascii("abc".into()).to_string(), "abc");
        assert_eq!(ParameterValue::Raw(b"xy\0".to_vec()).to_string(), "xy");
        assert_eq!(ParameterValue::Text(" 12 ".into()).as_i64(), Some(12));
    }

    #[test]
    fn test_parameter_new_uses_default_type() {
        let param = Parameter::new("count", ParameterValue::UInt(3));
        assert_eq!(param.type_name, MIME_UINT32);
        assert_eq!(param.value_text(), "3");
    }
}
