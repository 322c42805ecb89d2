mod column;
pub(crate) mod cursor;
mod data_group;
mod data_header;
mod data_set;
mod header;
mod parameter;

pub use column::{ColumnDescriptor, ColumnType, Value};
pub use data_group::DataGroup;
pub use data_header::DataHeader;
pub use data_set::{DataSet, RowIter};
pub use header::FileHeader;
pub use parameter::{Parameter, ParameterValue};

/// Immutable container bytes shared by every reader
pub(crate) type SharedBytes = std::sync::Arc<dyn AsRef<[u8]> + Send + Sync>;

use super::{FILE_MAGIC, FILE_VERSION, LOCALE_SIZE};
