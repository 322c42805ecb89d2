use tracing::debug;

use super::cursor::ByteReader;
use super::{DataSet, SharedBytes};
use crate::error::{IndexError, Result, StructureError};

/// A named collection of data sets, linked to its next sibling group by offset
#[derive(Debug, Clone)]
pub struct DataGroup {
    name: String,
    offset: u64,
    next_offset: u64,
    first_data_set_offset: u64,
    data_sets: Vec<DataSet>,
}
impl DataGroup {
    /// Reads the group at `offset` and every data set in its chain.
    ///
    /// The reader's position is restored before returning.
    pub(crate) fn at(bytes: &SharedBytes, reader: &mut ByteReader<'_>, offset: u64) -> Result<Self> {
        let mut scope = reader.scoped(offset)?;
        let next_offset = u64::from(scope.read_u32()?);
        let first_data_set_offset = u64::from(scope.read_u32()?);
        let num_data_sets = scope.read_count("data set")?;
        let name = scope.read_wstring(None)?;

        let mut data_sets = Vec::with_capacity(num_data_sets.min(scope.remaining()));
        let mut set_offset = first_data_set_offset;
        for idx in 0..num_data_sets {
            let data_set = DataSet::at(bytes, &mut scope, set_offset)?;
            if idx + 1 < num_data_sets {
                set_offset = data_set.next_offset().ok_or(StructureError::TruncatedChain {
                    kind: "data set",
                    declared: num_data_sets,
                    found: idx + 1,
                })?;
            }
            data_sets.push(data_set);
        }

        debug!(name = %name, offset, num_data_sets, "materialized data group");
        Ok(Self {
            name,
            offset,
            next_offset,
            first_data_set_offset,
            data_sets,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Absolute offset of the next sibling group, `None` for the last one
    #[must_use]
    pub fn next_offset(&self) -> Option<u64> {
        (self.next_offset != 0).then_some(self.next_offset)
    }

    #[must_use]
    pub fn first_data_set_offset(&self) -> u64 {
        self.first_data_set_offset
    }

    #[must_use]
    pub fn num_data_sets(&self) -> usize {
        self.data_sets.len()
    }

    #[must_use]
    pub fn data_sets(&self) -> &[DataSet] {
        &self.data_sets
    }

    /// Strictly bounds-checked access to a data set
    pub fn data_set(&self, idx: usize) -> Result<&DataSet> {
        self.data_sets.get(idx).ok_or_else(|| {
            IndexError::OutOfRange {
                kind: "data set",
                requested_index: idx,
                len: self.data_sets.len(),
            }
            .into()
        })
    }

    /// Looks up a data set by its exact name
    pub fn data_set_by_name(&self, name: &str) -> Result<&DataSet> {
        self.data_sets
            .iter()
            .find(|set| set.name() == name)
            .ok_or_else(|| {
                IndexError::MissingDataSet {
                    name: name.to_string(),
                    group: self.name.clone(),
                }
                .into()
            })
    }
}
