use tracing::trace;

use super::cursor::ByteReader;
use super::{Parameter, LOCALE_SIZE};
use crate::error::{IndexError, Result, StructureError};

/// A provenance block: identity strings, typed parameters, and the headers of
/// the files this one was derived from.
///
/// Parent headers are stored back to back directly after the parameter list,
/// so reading a header consumes its entire subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct DataHeader {
    data_type: String,
    file_id: String,
    creation_date: String,
    locale: [u8; LOCALE_SIZE],
    parameters: Vec<Parameter>,
    parents: Vec<DataHeader>,
}
impl DataHeader {
    /// Materializes the header stored at `offset`, leaving the reader where it was
    pub(crate) fn at(reader: &mut ByteReader<'_>, offset: u64, max_depth: usize) -> Result<Self> {
        let mut scope = reader.scoped(offset)?;
        Self::read(&mut scope, 0, max_depth)
    }

    /// Reads a header and all of its parents starting at the reader's position
    pub(crate) fn read(reader: &mut ByteReader<'_>, depth: usize, max_depth: usize) -> Result<Self> {
        if depth > max_depth {
            return Err(StructureError::HeaderTooDeep(max_depth).into());
        }
        let data_type = reader.read_string(None)?;
        let file_id = reader.read_string(None)?;
        let creation_date = reader.read_datetime()?;
        let locale = reader.read_locale()?;

        let num_parameters = reader.read_count("parameter")?;
        let parameters = (0..num_parameters)
            .map(|_| Parameter::read(reader))
            .collect::<Result<Vec<_>>>()?;

        let num_parents = reader.read_count("parent header")?;
        let parents = (0..num_parents)
            .map(|_| Self::read(reader, depth + 1, max_depth))
            .collect::<Result<Vec<_>>>()?;

        trace!(
            data_type = %data_type,
            depth,
            num_parameters,
            num_parents,
            "read data header"
        );
        Ok(Self {
            data_type,
            file_id,
            creation_date,
            locale,
            parameters,
            parents,
        })
    }

    /// Assembles a header from its parts
    #[must_use]
    pub fn new(
        data_type: impl Into<String>,
        file_id: impl Into<String>,
        creation_date: impl Into<String>,
        locale: [u8; LOCALE_SIZE],
        parameters: Vec<Parameter>,
        parents: Vec<DataHeader>,
    ) -> Self {
        Self {
            data_type: data_type.into(),
            file_id: file_id.into(),
            creation_date: creation_date.into(),
            locale,
            parameters,
            parents,
        }
    }

    #[must_use]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    #[must_use]
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    #[must_use]
    pub fn creation_date(&self) -> &str {
        &self.creation_date
    }

    #[must_use]
    pub fn locale_bytes(&self) -> &[u8; LOCALE_SIZE] {
        &self.locale
    }

    /// The locale block read as wide characters, without padding
    #[must_use]
    pub fn locale(&self) -> String {
        self.locale
            .chunks_exact(2)
            .map(|unit| char::from(unit[1]))
            .take_while(|&c| c != '\0')
            .collect()
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// First parameter with exactly this name
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn parents(&self) -> &[DataHeader] {
        &self.parents
    }

    pub fn parent(&self, idx: usize) -> Result<&DataHeader> {
        self.parents.get(idx).ok_or_else(|| {
            IndexError::OutOfRange {
                kind: "parent header",
                requested_index: idx,
                len: self.parents.len(),
            }
            .into()
        })
    }

    /// Iterates over this header and every ancestor, depth first
    pub fn walk(&self) -> impl Iterator<Item = &DataHeader> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let header = stack.pop()?;
            stack.extend(header.parents.iter().rev());
            Some(header)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParameterValue;
    use crate::write::HeaderWriter;
    use crate::Error;

    fn locale() -> [u8; LOCALE_SIZE] {
        let mut locale = [0u8; LOCALE_SIZE];
        for (i, c) in "en-US".bytes().enumerate() {
            locale[2 * i + 1] = c;
        }
        locale
    }

    fn scan_header() -> DataHeader {
        DataHeader::new(
            "affymetrix-calvin-scan-acquisition",
            "scan-0001",
            "2024-03-01T10:00:00Z",
            locale(),
            vec![Parameter::new(
                "affymetrix-scanner-id",
                ParameterValue::Text("GC3000".into()),
            )],
            vec![],
        )
    }

    fn cel_header() -> DataHeader {
        DataHeader::new(
            "affymetrix-calvin-intensity",
            "cel-0001",
            "2024-03-02T09:30:00Z",
            locale(),
            vec![
                Parameter::new("affymetrix-cel-rows", ParameterValue::Int(2)),
                Parameter::new("affymetrix-cel-cols", ParameterValue::Int(3)),
            ],
            vec![scan_header()],
        )
    }

    fn encode(header: &DataHeader) -> Vec<u8> {
        let mut buf = Vec::new();
        HeaderWriter::new(header).write_into(&mut buf);
        buf
    }

    #[test]
    fn test_read_header_with_parent() {
        let header = cel_header();
        let bytes = encode(&header);
        let mut reader = ByteReader::new(&bytes);
        let decoded = DataHeader::read(&mut reader, 0, 8).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.locale(), "en-US");
        assert_eq!(decoded.parents().len(), 1);
        assert_eq!(
            decoded.parent(0).unwrap().data_type(),
            "affymetrix-calvin-scan-acquisition"
        );
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_header_at_restores_position() {
        let mut bytes = vec![0xee; 5];
        bytes.extend(encode(&cel_header()));
        let mut reader = ByteReader::new(&bytes);
        reader.skip(3).unwrap();
        let decoded = DataHeader::at(&mut reader, 5, 8).unwrap();
        assert_eq!(decoded.file_id(), "cel-0001");
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn test_parent_out_of_range() {
        let header = cel_header();
        let err = header.parent(1).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexError(IndexError::OutOfRange {
                requested_index: 1,
                len: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_header_depth_bound() {
        let mut header = scan_header();
        for _ in 0..4 {
            header = DataHeader::new("t", "id", "", locale(), vec![], vec![header]);
        }
        let bytes = encode(&header);
        let mut reader = ByteReader::new(&bytes);
        assert!(DataHeader::read(&mut reader, 0, 4).is_ok());
        let mut reader = ByteReader::new(&bytes);
        let err = DataHeader::read(&mut reader, 0, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::StructureError(StructureError::HeaderTooDeep(3))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = encode(&cel_header());
        let mut reader = ByteReader::new(&bytes[..bytes.len() - 3]);
        assert!(DataHeader::read(&mut reader, 0, 8).unwrap_err().is_structural());
    }

    #[test]
    fn test_walk_visits_ancestors() {
        let header = cel_header();
        let types: Vec<_> = header.walk().map(DataHeader::data_type).collect();
        assert_eq!(
            types,
            vec![
                "affymetrix-calvin-intensity",
                "affymetrix-calvin-scan-acquisition"
            ]
        );
        assert!(header.parameter("affymetrix-cel-rows").is_some());
        assert!(header.parameter("missing").is_none());
    }
}
