use std::error::Error as StdError;

/// Custom Result type for calvin operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the calvin library, encompassing all possible error cases
/// that can occur while decoding a Calvin container.
///
/// None of these are ever recovered from inside the parser: a container is either
/// fully materialized or not returned at all.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The bytes do not describe a valid Calvin container
    #[error("Error in container format: {0}")]
    FormatError(#[from] FormatError),

    /// A primitive could not be decoded from the available bytes
    #[error("Error reading container: {0}")]
    ReadError(#[from] ReadError),

    /// A caller asked for a group, data set, or row that does not exist
    #[error("Error indexing container: {0}")]
    IndexError(#[from] IndexError),

    /// A linked structure disagrees with the counts declared for it
    #[error("Error in container structure: {0}")]
    StructureError(#[from] StructureError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// Errors raised while detecting or decompressing a compressed input
    #[error("Error with compressed input: {0}")]
    NifflerError(#[from] niffler::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}
impl Error {
    /// Checks if the error means the input is not a (supported) Calvin file at all
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::FormatError(_))
    }

    /// Checks if the error comes from a damaged or truncated container
    ///
    /// # Returns
    ///
    /// * `true` for short reads, dangling offsets, and structural inconsistencies
    /// * `false` for all other error types
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::ReadError(_) | Self::StructureError(_))
    }
}

/// Errors raised when the container violates the format definition
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The leading byte is not the Calvin magic number
    ///
    /// # Arguments
    /// * `u8` - The byte that was found instead
    #[error("Invalid magic number: {0} (not a Calvin-format file)")]
    InvalidMagicNumber(u8),

    /// The container version is not supported
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u8),

    /// A column carries a type code outside of the known set
    #[error("Unrecognized column type code: {0}")]
    UnknownColumnType(i32),

    /// A column descriptor has no name
    #[error("Column descriptor has an empty name")]
    EmptyColumnName,

    /// A column declares fewer bytes than its primitive needs
    #[error("Column {name} declares {declared} bytes but its type needs at least {required}")]
    ColumnTooNarrow {
        name: String,
        declared: usize,
        required: usize,
    },

    /// A column expected to hold numbers holds text
    #[error("Column {column} of data set {data_set} is not numeric")]
    NonNumericColumn { data_set: String, column: String },

    /// A column expected to hold integers holds floats or text
    #[error("Column {column} of data set {data_set} is not an integer column")]
    NonIntegerColumn { data_set: String, column: String },

    /// A count field holds a negative value
    #[error("Negative {field} count found: {value}")]
    NegativeCount { field: &'static str, value: i32 },
}

/// Errors that can occur while decoding primitives from the byte source
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// Fewer bytes remain than the primitive requires
    #[error("Short read at byte pos {pos}: needed {needed} bytes, {available} available")]
    ShortRead {
        pos: usize,
        needed: usize,
        available: usize,
    },

    /// An offset recorded in the stream points outside of the file
    #[error("Offset {offset} is outside of the file (length {len})")]
    OffsetOutOfBounds { offset: u64, len: usize },
}

/// Errors raised when a caller addresses something that was never materialized
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Requested index is beyond the available range
    #[error("Requested {kind} index ({requested_index}) is out of range ({len})")]
    OutOfRange {
        kind: &'static str,
        requested_index: usize,
        len: usize,
    },

    /// A data set addressed by name does not exist in the group
    #[error("No data set named {name} in group {group}")]
    MissingDataSet { name: String, group: String },

    /// The container has no data groups at all
    #[error("Container holds no data groups")]
    EmptyContainer,
}

/// Errors raised when the linked on-disk structure disagrees with itself
#[derive(thiserror::Error, Debug)]
pub enum StructureError {
    /// A linked list of siblings ended before the declared count was reached
    #[error("{kind} chain ended after {found} entries but {declared} were declared")]
    TruncatedChain {
        kind: &'static str,
        declared: usize,
        found: usize,
    },

    /// Data header parents nest deeper than allowed
    #[error("Data header nesting exceeds the maximum depth of {0}")]
    HeaderTooDeep(usize),

    /// The rows of a data set run into the structure that follows it
    #[error("Data set {name} ends at byte {end} but the next structure starts at {limit}")]
    DataSetOverrun { name: String, end: u64, limit: u64 },

    /// The declared rows and column widths of a data set describe more bytes
    /// than can be addressed
    #[error("Data set {name} declares a size that overflows the addressable range")]
    SizeOverflow { name: String },

    /// A CEL data set does not hold one row per feature
    #[error("Data set {name} holds {found} rows but the array has {expected} cells")]
    CellCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Trait for converting arbitrary errors into `Error`
pub trait IntoCalvinError {
    fn into_calvin_error(self) -> Error;
}

// Implement conversion for Box<dyn Error>
impl<E> IntoCalvinError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_calvin_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}
