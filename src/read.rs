//! Calvin container reader
//!
//! A [`Container`] is built in one pass over an immutable byte source: either a
//! memory-mapped file, a decompressed in-memory copy of a compressed file, or a
//! buffer read from an arbitrary stream. Construction either materializes the
//! complete group / data set / header structure or fails; there is no partial
//! container.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use niffler::compression::Format;
use tracing::debug;

use crate::core::cursor::ByteReader;
use crate::core::{DataGroup, DataHeader, FileHeader, SharedBytes};
use crate::error::{IndexError, Result, StructureError};
use crate::{DEFAULT_MAX_HEADER_DEPTH, FILE_MAGIC, ROOT_HEADER_OFFSET};

/// Options controlling how a container is parsed
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Maximum nesting of parent data headers
    max_header_depth: usize,
    /// Check that no data set's rows overrun the structure that follows it
    validate_extents: bool,
}
impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_header_depth: DEFAULT_MAX_HEADER_DEPTH,
            validate_extents: true,
        }
    }
}
impl ReaderOptions {
    #[must_use]
    pub fn with_max_header_depth(mut self, depth: usize) -> Self {
        self.max_header_depth = depth;
        self
    }

    #[must_use]
    pub fn with_validate_extents(mut self, validate: bool) -> Self {
        self.validate_extents = validate;
        self
    }

    #[must_use]
    pub fn max_header_depth(&self) -> usize {
        self.max_header_depth
    }

    #[must_use]
    pub fn validate_extents(&self) -> bool {
        self.validate_extents
    }
}

/// A fully materialized Calvin container
///
/// # Examples
///
/// ```no_run
/// use calvin::Container;
///
/// fn main() -> calvin::Result<()> {
///     let container = Container::open("./data/sample.CEL")?;
///     for group in container.data_groups() {
///         for set in group.data_sets() {
///             println!("{}/{}: {} rows", group.name(), set.name(), set.num_rows());
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct Container {
    header: FileHeader,
    root_header: DataHeader,
    groups: Vec<DataGroup>,
    bytes: SharedBytes,
}
impl Container {
    /// Opens a container from disk with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default())
    }

    /// Opens a container from disk.
    ///
    /// Plain files are memory-mapped. Compressed files (gzip, bzip2, ...) are
    /// decompressed into memory first.
    pub fn open_with<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        // Safety: the map is only ever read
        let map = unsafe { Mmap::map(&file) }?;

        // compression magic numbers are at least 2 bytes long
        if map.first() == Some(&FILE_MAGIC) || map.len() < 2 {
            return Self::from_shared(Arc::new(map), options);
        }
        let (mut reader, format) = niffler::from_path(path)?;
        if matches!(format, Format::No) {
            return Self::from_shared(Arc::new(map), options);
        }
        debug!(path = %path.display(), ?format, "decompressing container");
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_shared(Arc::new(buf), options)
    }

    /// Parses an owned buffer
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_shared(Arc::new(bytes), ReaderOptions::default())
    }

    /// Buffers and parses everything remaining in `reader`
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_bytes(buf)
    }

    /// Parses a container embedded in a seekable stream at its current position.
    ///
    /// Offsets are taken relative to that position, and the stream is returned
    /// to it afterwards whether or not parsing succeeds.
    pub fn from_stream<R: Read + Seek>(stream: &mut R, options: ReaderOptions) -> Result<Self> {
        let start = stream.stream_position()?;
        let mut buf = Vec::new();
        let read = stream.read_to_end(&mut buf);
        stream.seek(SeekFrom::Start(start))?;
        read?;
        Self::from_shared(Arc::new(buf), options)
    }

    pub(crate) fn from_shared(bytes: SharedBytes, options: ReaderOptions) -> Result<Self> {
        let data: &[u8] = (*bytes).as_ref();
        let header = FileHeader::from_bytes(data)?;
        let num_groups = header.num_groups()?;

        let mut reader = ByteReader::new(data);
        reader.seek(size_of::<FileHeader>() as u64)?;

        let root_header = DataHeader::at(&mut reader, ROOT_HEADER_OFFSET, options.max_header_depth)?;

        let mut groups = Vec::with_capacity(num_groups.min(data.len()));
        let mut offset = header.first_group_offset();
        for idx in 0..num_groups {
            let group = DataGroup::at(&bytes, &mut reader, offset)?;
            if idx + 1 < num_groups {
                offset = group.next_offset().ok_or(StructureError::TruncatedChain {
                    kind: "data group",
                    declared: num_groups,
                    found: idx + 1,
                })?;
            }
            groups.push(group);
        }
        debug!(
            version = header.version,
            num_groups,
            len = data.len(),
            "materialized container"
        );

        let container = Self {
            header,
            root_header,
            groups,
            bytes,
        };
        if options.validate_extents {
            container.check_extents()?;
        }
        Ok(container)
    }

    /// Verifies that every data set's rows end before the structure following it
    pub fn check_extents(&self) -> Result<()> {
        let len = self.len() as u64;
        for (g, group) in self.groups.iter().enumerate() {
            let group_limit = self
                .groups
                .get(g + 1)
                .map_or(len, DataGroup::offset);
            for (s, set) in group.data_sets().iter().enumerate() {
                let limit = match group.data_sets().get(s + 1) {
                    Some(next) if next.offset() > set.offset() => next.offset(),
                    _ if group_limit > set.offset() => group_limit,
                    _ => len,
                };
                if set.data_end() > limit {
                    return Err(StructureError::DataSetOverrun {
                        name: set.name().to_string(),
                        end: set.data_end(),
                        limit,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn file_header(&self) -> &FileHeader {
        &self.header
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// Size of the container in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        (*self.bytes).as_ref().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn num_data_groups(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn data_groups(&self) -> &[DataGroup] {
        &self.groups
    }

    /// Strictly bounds-checked access to a data group
    pub fn data_group(&self, idx: usize) -> Result<&DataGroup> {
        self.groups.get(idx).ok_or_else(|| {
            IndexError::OutOfRange {
                kind: "data group",
                requested_index: idx,
                len: self.groups.len(),
            }
            .into()
        })
    }

    #[must_use]
    pub fn root_header(&self) -> &DataHeader {
        &self.root_header
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("header", &self.header)
            .field("len", &self.len())
            .field("root_header", &self.root_header)
            .field("groups", &self.groups)
            .finish()
    }
}

/// Opens a container from disk with default options
pub fn open_container<P: AsRef<Path>>(path: P) -> Result<Container> {
    Container::open(path)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use byteorder::{BigEndian, ByteOrder};

    use super::*;
    use crate::core::{ColumnType, Parameter, ParameterValue, Value};
    use crate::error::FormatError;
    use crate::write::{ContainerWriter, DataSetWriter, GroupWriter};
    use crate::{Error, LOCALE_SIZE};

    fn header() -> DataHeader {
        let parent = DataHeader::new(
            "affymetrix-calvin-scan-acquisition",
            "parent",
            "2024-01-01T00:00:00Z",
            [0u8; LOCALE_SIZE],
            vec![],
            vec![],
        );
        DataHeader::new(
            "affymetrix-calvin-intensity",
            "child",
            "2024-01-02T00:00:00Z",
            [0u8; LOCALE_SIZE],
            vec![Parameter::new("affymetrix-cel-rows", ParameterValue::Int(1))],
            vec![parent],
        )
    }

    fn writer(num_groups: usize, num_sets: usize) -> ContainerWriter {
        let mut writer = ContainerWriter::new(header());
        for g in 0..num_groups {
            let mut group = GroupWriter::new(format!("Group{g}"));
            for s in 0..num_sets {
                let mut set = DataSetWriter::new(format!("Set{s}")).column("V", ColumnType::F32);
                set.push_row(vec![Value::F32(s as f32)]);
                set.push_row(vec![Value::F32(g as f32)]);
                group.push_data_set(set);
            }
            writer.push_group(group);
        }
        writer
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_container_structure() {
        let container = Container::from_bytes(writer(3, 2).to_bytes()).unwrap();
        assert_eq!(container.version(), 1);
        assert_eq!(container.num_data_groups(), 3);
        for (g, group) in container.data_groups().iter().enumerate() {
            assert_eq!(group.name(), format!("Group{g}"));
            assert_eq!(group.num_data_sets(), 2);
        }
        assert_eq!(
            container.data_group(2).unwrap().data_set(1).unwrap().row(1).unwrap(),
            vec![Value::F32(2.0)]
        );
        assert_eq!(container.root_header().parents().len(), 1);
    }

    #[test]
    fn test_group_index_is_strict() {
        let container = Container::from_bytes(writer(2, 1).to_bytes()).unwrap();
        assert!(matches!(
            container.data_group(2).unwrap_err(),
            Error::IndexError(IndexError::OutOfRange {
                requested_index: 2,
                len: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_container() {
        let container = Container::from_bytes(writer(0, 0).to_bytes()).unwrap();
        assert_eq!(container.num_data_groups(), 0);
        assert!(container.data_group(0).is_err());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = writer(1, 1).to_bytes();
        bytes[0] = 58;
        let err = Container::from_bytes(bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::InvalidMagicNumber(58))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(Container::from_bytes(Vec::new()).unwrap_err().is_structural());
    }

    #[test]
    fn test_truncated_group_chain() {
        let mut bytes = writer(3, 1).to_bytes();
        let container = Container::from_bytes(bytes.clone()).unwrap();
        let second = container.data_group(1).unwrap().offset() as usize;
        BigEndian::write_u32(&mut bytes[second..second + 4], 0);
        let err = Container::from_bytes(bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::StructureError(StructureError::TruncatedChain {
                kind: "data group",
                declared: 3,
                found: 2,
            })
        ));
    }

    #[test]
    fn test_truncated_file() {
        let bytes = writer(2, 2).to_bytes();
        for cut in [5, 30, bytes.len() / 2, bytes.len() - 1] {
            let err = Container::from_bytes(bytes[..cut].to_vec()).unwrap_err();
            assert!(err.is_structural(), "cut at {cut}: {err:?}");
        }
    }

    #[test]
    fn test_extent_validation() {
        let bytes = writer(1, 2).to_bytes();
        let container = Container::from_bytes(bytes.clone()).unwrap();
        let set = container.data_group(0).unwrap().data_set(0).unwrap();
        // claim one more row than is stored
        let rows_pos = set.offset() as usize + 4 + 4 + 2 * "Set0".len();
        let mut bytes = bytes;
        BigEndian::write_i32(&mut bytes[rows_pos..rows_pos + 4], 3);

        let err = Container::from_bytes(bytes.clone()).unwrap_err();
        assert!(matches!(
            err,
            Error::StructureError(StructureError::DataSetOverrun { .. })
        ));

        let options = ReaderOptions::default().with_validate_extents(false);
        let container = Container::from_shared(Arc::new(bytes), options).unwrap();
        assert_eq!(
            container.data_group(0).unwrap().data_set(0).unwrap().num_rows(),
            3
        );
    }

    #[test]
    fn test_oversized_data_set_is_rejected() {
        use crate::write::HeaderWriter;

        fn put_wstring(buf: &mut Vec<u8>, s: &str) {
            buf.extend_from_slice(&(s.len() as i32).to_be_bytes());
            for b in s.bytes() {
                buf.extend_from_slice(&[0, b]);
            }
        }

        let mut bytes = FileHeader::new(1, 0).as_bytes().to_vec();
        HeaderWriter::new(&header()).write_into(&mut bytes);
        let group_start = bytes.len();
        BigEndian::write_u32(&mut bytes[6..10], group_start as u32);

        // group header: next, first set, count, name "G"
        let set_start = group_start + 4 + 4 + 4 + 4 + 2;
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&(set_start as u32).to_be_bytes());
        bytes.extend_from_slice(&1i32.to_be_bytes());
        put_wstring(&mut bytes, "G");

        // i32::MAX rows of 8 I32 columns, each i32::MAX bytes wide
        bytes.extend_from_slice(&0u32.to_be_bytes());
        put_wstring(&mut bytes, "Huge");
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        bytes.extend_from_slice(&8i32.to_be_bytes());
        for _ in 0..8 {
            put_wstring(&mut bytes, "C");
            bytes.extend_from_slice(&ColumnType::I32.code().to_be_bytes());
            bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        }

        for validate in [true, false] {
            let options = ReaderOptions::default().with_validate_extents(validate);
            let err = Container::from_shared(Arc::new(bytes.clone()), options).unwrap_err();
            assert!(matches!(
                err,
                Error::StructureError(StructureError::SizeOverflow { .. })
            ));
        }
    }

    #[test]
    fn test_header_depth_option() {
        let bytes = writer(1, 1).to_bytes();
        let options = ReaderOptions::default().with_max_header_depth(0);
        let err = Container::from_shared(Arc::new(bytes), options).unwrap_err();
        assert!(matches!(
            err,
            Error::StructureError(StructureError::HeaderTooDeep(0))
        ));
    }

    // ==================== Source Tests ====================

    #[test]
    fn test_from_stream_restores_position() {
        let mut buf = vec![0xaa; 16];
        buf.extend(writer(2, 1).to_bytes());
        let mut stream = Cursor::new(buf);
        stream.seek(SeekFrom::Start(16)).unwrap();
        let container = Container::from_stream(&mut stream, ReaderOptions::default()).unwrap();
        assert_eq!(container.num_data_groups(), 2);
        assert_eq!(stream.position(), 16);
    }

    #[test]
    fn test_from_stream_restores_position_on_failure() {
        let mut stream = Cursor::new(vec![1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        stream.seek(SeekFrom::Start(1)).unwrap();
        assert!(Container::from_stream(&mut stream, ReaderOptions::default()).is_err());
        assert_eq!(stream.position(), 1);
    }

    #[test]
    fn test_open_plain_and_gzipped() {
        let bytes = writer(1, 3).to_bytes();
        let dir = std::env::temp_dir().join(format!("calvin-read-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let plain = dir.join("plain.CEL");
        std::fs::write(&plain, &bytes).unwrap();
        let container = open_container(&plain).unwrap();
        assert_eq!(container.len(), bytes.len());

        let gzipped = dir.join("plain.CEL.gz");
        {
            let file = File::create(&gzipped).unwrap();
            let mut writer = niffler::get_writer(
                Box::new(file),
                niffler::compression::Format::Gzip,
                niffler::Level::One,
            )
            .unwrap();
            writer.write_all(&bytes).unwrap();
        }
        let container = open_container(&gzipped).unwrap();
        assert_eq!(container.num_data_groups(), 1);
        assert_eq!(container.data_group(0).unwrap().num_data_sets(), 3);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let err = open_container("./does/not/exist.CEL").unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }
}
