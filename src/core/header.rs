use bytemuck::{Pod, Zeroable};

use super::{FILE_MAGIC, FILE_VERSION};
use crate::error::{FormatError, ReadError, Result};

/// The fixed 10-byte header at the start of every Calvin container.
///
/// This is stored identically in memory and on disk; multi-byte fields are kept
/// as raw big-endian byte arrays so the struct has no padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct FileHeader {
    /// File magic number
    magic: u8,
    /// Container version number
    pub version: u8,
    /// Number of top-level data groups (big-endian i32)
    num_groups: [u8; 4],
    /// Absolute offset of the first data group (big-endian u32)
    first_group_offset: [u8; 4],
}
impl FileHeader {
    #[must_use]
    pub fn new(num_groups: i32, first_group_offset: u32) -> Self {
        Self {
            magic: FILE_MAGIC,
            version: FILE_VERSION,
            num_groups: num_groups.to_be_bytes(),
            first_group_offset: first_group_offset.to_be_bytes(),
        }
    }

    /// The declared number of data groups, rejecting negative counts
    pub fn num_groups(&self) -> Result<usize> {
        let value = i32::from_be_bytes(self.num_groups);
        usize::try_from(value).map_err(|_| {
            FormatError::NegativeCount {
                field: "data group",
                value,
            }
            .into()
        })
    }

    #[must_use]
    pub fn first_group_offset(&self) -> u64 {
        u64::from(u32::from_be_bytes(self.first_group_offset))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Validates and copies the header out of the first bytes of a container
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // the magic byte alone decides whether this is a Calvin file at all
        match bytes.first() {
            Some(&FILE_MAGIC) => {}
            Some(&other) => return Err(FormatError::InvalidMagicNumber(other).into()),
            None => {
                return Err(ReadError::ShortRead {
                    pos: 0,
                    needed: size_of::<Self>(),
                    available: 0,
                }
                .into())
            }
        }
        let Some(raw) = bytes.get(..size_of::<Self>()) else {
            return Err(ReadError::ShortRead {
                pos: 0,
                needed: size_of::<Self>(),
                available: bytes.len(),
            }
            .into());
        };
        let header: Self = bytemuck::pod_read_unaligned(raw);
        if header.version != FILE_VERSION {
            return Err(FormatError::UnsupportedVersion(header.version).into());
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_header_size() {
        assert_eq!(size_of::<FileHeader>(), 10);
    }

    #[test]
    fn test_header_layout() {
        let header = FileHeader::new(2, 0x0102_0304);
        assert_eq!(
            header.as_bytes(),
            &[59, 1, 0, 0, 0, 2, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn test_header_from_bytes() {
        let bytes = [59, 1, 0, 0, 0, 3, 0, 0, 1, 0, 0xff];
        let header = FileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.num_groups().unwrap(), 3);
        assert_eq!(header.first_group_offset(), 256);
    }

    #[test]
    fn test_header_bad_magic() {
        let bytes = [60, 1, 0, 0, 0, 1, 0, 0, 0, 10];
        let err = FileHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::InvalidMagicNumber(60))
        ));
    }

    #[test]
    fn test_header_bad_version() {
        let bytes = [59, 8, 0, 0, 0, 1, 0, 0, 0, 10];
        let err = FileHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::UnsupportedVersion(8))
        ));
    }

    #[test]
    fn test_header_truncated() {
        let err = FileHeader::from_bytes(&[59, 1, 0]).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_header_negative_groups() {
        let header = FileHeader::new(-1, 10);
        assert!(header.num_groups().unwrap_err().is_format_error());
    }
}
