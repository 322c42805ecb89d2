//! # calvin
//!
//! A reader for the Affymetrix *Calvin* binary container format, the
//! self-describing file layout used by GCOS/AGCC-era CEL and CHP files.
//!
//! A Calvin file is a small fixed file header followed by a tree of linked
//! structures:
//!
//! ```text
//! File header (10 bytes): magic(u8 = 59) version(u8) groups(i32) first_group(u32)
//! Root data header      : provenance block with typed parameters and parent headers
//! Data group ─next─► Data group ─next─► ...
//!   └ Data set ─next─► Data set ─next─► ...
//!       └ column descriptors followed by fixed-width row data
//! ```
//!
//! [`Container`] materializes the full group / data set / header structure
//! eagerly and decodes rows lazily. [`Facade`] and [`CelFile`] provide the
//! higher level views used for exporting CEL intensity grids.
//!
//! ```no_run
//! use calvin::{open_container, CelFile};
//!
//! fn main() -> calvin::Result<()> {
//!     let container = open_container("./data/sample.CEL")?;
//!     let cel = CelFile::new(&container)?;
//!     cel.write_text(&mut std::io::stdout().lock())?;
//!     Ok(())
//! }
//! ```

pub mod batch;
mod cel;
mod core;
pub mod error;
mod facade;
mod parallel;
mod read;
mod write;

pub use cel::{CelCell, CelFile, Cells};
pub use crate::core::{
    ColumnDescriptor, ColumnType, DataGroup, DataHeader, DataSet, FileHeader, Parameter,
    ParameterValue, RowIter, Value,
};
pub use error::{Error, IntoCalvinError, Result};
pub use facade::Facade;
pub use parallel::ParallelProcessor;
pub use read::{open_container, Container, ReaderOptions};
pub use write::{ContainerWriter, DataSetWriter, GroupWriter, HeaderWriter};

/// Leading byte of every Calvin container
pub const FILE_MAGIC: u8 = 59;

/// The only container version this crate understands
pub const FILE_VERSION: u8 = 1;

/// Absolute offset of the root data header (immediately after the file header)
pub const ROOT_HEADER_OFFSET: u64 = 10;

/// Default bound on the data header provenance chain depth
pub const DEFAULT_MAX_HEADER_DEPTH: usize = 64;

/// Size of the raw locale block stored in every data header
pub const LOCALE_SIZE: usize = 14;

/// Parameter carrying the number of feature columns on the array
pub const PARAM_NUM_COLUMNS: &str = "affymetrix-cel-cols";

/// Parameter carrying the number of feature rows on the array
pub const PARAM_NUM_ROWS: &str = "affymetrix-cel-rows";

/// Parameter carrying the array (chip) type
pub const PARAM_CHIP_TYPE: &str = "affymetrix-array-type";

/// Parameter carrying the name of the algorithm that produced the file
pub const PARAM_ALGORITHM_NAME: &str = "affymetrix-algorithm-name";

/// Prefix of algorithm parameters collected into [`Facade::parameters`]
pub const ALGORITHM_PARAM_PREFIX: &str = "affymetrix-algorithm-param-";

/// Prefix of chip summary statistics collected into [`Facade::statistics`]
pub const CHIP_SUMMARY_PREFIX: &str = "affymetrix-chipsummary-";
