use std::ops::Range;

use tracing::trace;

use super::cursor::ByteReader;
use super::{ColumnDescriptor, SharedBytes, Value};
use crate::error::{IndexError, Result, StructureError};

/// One named table inside a data group.
///
/// Construction reads only the column descriptors; row data is decoded on
/// demand from the shared container bytes.
#[derive(Clone)]
pub struct DataSet {
    name: String,
    /// Absolute offset of the data set header
    offset: u64,
    /// Absolute offset of the next sibling data set (0 for none)
    next_offset: u64,
    /// Absolute offset of the first row
    data_start: u64,
    /// Absolute offset one past the last row byte
    data_end: u64,
    num_rows: usize,
    columns: Vec<ColumnDescriptor>,
    /// Byte offset of each column within a row
    column_offsets: Vec<usize>,
    row_width: usize,
    bytes: SharedBytes,
}
impl DataSet {
    /// Reads the data set header at `offset`, leaving the reader where it was
    ///
    /// # Arguments
    ///
    /// * `bytes` - The shared container bytes, retained for lazy row decoding
    /// * `reader` - A cursor over the same bytes
    /// * `offset` - Absolute offset of the data set header
    pub(crate) fn at(bytes: &SharedBytes, reader: &mut ByteReader<'_>, offset: u64) -> Result<Self> {
        let mut scope = reader.scoped(offset)?;
        let next_offset = u64::from(scope.read_u32()?);
        let name = scope.read_wstring(None)?;
        let num_rows = scope.read_count("row")?;
        let num_columns = scope.read_count("column")?;

        let mut columns = Vec::with_capacity(num_columns.min(scope.remaining()));
        let mut column_offsets = Vec::with_capacity(columns.capacity());
        let mut row_width: usize = 0;
        for _ in 0..num_columns {
            let column_name = scope.read_wstring(None)?;
            let code = scope.read_i32()?;
            let byte_size = scope.read_count("column byte size")?;
            columns.push(ColumnDescriptor::new(column_name, code, byte_size)?);
            column_offsets.push(row_width);
            row_width = row_width
                .checked_add(byte_size)
                .ok_or_else(|| StructureError::SizeOverflow { name: name.clone() })?;
        }
        let data_start = scope.position();
        let data_end = (num_rows as u64)
            .checked_mul(row_width as u64)
            .and_then(|size| size.checked_add(data_start))
            .ok_or_else(|| StructureError::SizeOverflow { name: name.clone() })?;

        trace!(
            name = %name,
            offset,
            data_start,
            num_rows,
            num_columns,
            "read data set"
        );
        Ok(Self {
            name,
            offset,
            next_offset,
            data_start,
            data_end,
            num_rows,
            columns,
            column_offsets,
            row_width,
            bytes: bytes.clone(),
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

    /// Absolute offset of the next sibling, `None` for the last data set
    #[must_use]
    pub fn next_offset(&self) -> Option<u64> {
        (self.next_offset != 0).then_some(self.next_offset)
    }

    #[must_use]
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Absolute offset one past the last row byte
    #[must_use]
    pub fn data_end(&self) -> u64 {
        self.data_end
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[must_use]
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Position of the column with the given name
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Decodes a single row
    pub fn row(&self, idx: usize) -> Result<Vec<Value>> {
        self.check_row(idx)?;
        let mut reader = ByteReader::new(self.data());
        self.decode_row(&mut reader, idx)
    }

    /// Decodes a single cell
    pub fn value(&self, row: usize, column: usize) -> Result<Value> {
        self.check_row(row)?;
        let Some(descriptor) = self.columns.get(column) else {
            return Err(IndexError::OutOfRange {
                kind: "column",
                requested_index: column,
                len: self.columns.len(),
            }
            .into());
        };
        let mut reader = ByteReader::at(self.data(), self.cell_offset(row, column))?;
        descriptor.decode(&mut reader)
    }

    /// Lazily decodes every row in order
    #[must_use]
    pub fn rows(&self) -> RowIter<'_> {
        RowIter {
            set: self,
            reader: ByteReader::new(self.data()),
            range: 0..self.num_rows,
        }
    }

    /// Lazily decodes the rows in `range`
    pub fn rows_in(&self, range: Range<usize>) -> Result<RowIter<'_>> {
        if range.start > range.end || range.end > self.num_rows {
            return Err(IndexError::OutOfRange {
                kind: "row",
                requested_index: range.end,
                len: self.num_rows,
            }
            .into());
        }
        Ok(RowIter {
            set: self,
            reader: ByteReader::new(self.data()),
            range,
        })
    }

    fn data(&self) -> &[u8] {
        (*self.bytes).as_ref()
    }

    fn check_row(&self, idx: usize) -> Result<()> {
        if idx >= self.num_rows {
            return Err(IndexError::OutOfRange {
                kind: "row",
                requested_index: idx,
                len: self.num_rows,
            }
            .into());
        }
        Ok(())
    }

    /// Bounded by `data_end` for every valid row and column
    fn cell_offset(&self, row: usize, column: usize) -> u64 {
        self.data_start + row as u64 * self.row_width as u64 + self.column_offsets[column] as u64
    }

    fn decode_row(&self, reader: &mut ByteReader<'_>, idx: usize) -> Result<Vec<Value>> {
        self.columns
            .iter()
            .enumerate()
            .map(|(column, descriptor)| {
                reader.seek(self.cell_offset(idx, column))?;
                descriptor.decode(reader)
            })
            .collect()
    }
}
impl std::fmt::Debug for DataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSet")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("data_start", &self.data_start)
            .field("num_rows", &self.num_rows)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Iterator decoding data set rows with its own cursor
pub struct RowIter<'a> {
    set: &'a DataSet,
    reader: ByteReader<'a>,
    range: Range<usize>,
}
impl Iterator for RowIter<'_> {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.range.next()?;
        Some(self.set.decode_row(&mut self.reader, idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}
impl ExactSizeIterator for RowIter<'_> {}
