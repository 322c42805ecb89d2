//! Encoder for Calvin containers
//!
//! Structures are appended to a single buffer in file order and the offsets
//! linking them (first group, next group, first data set, next data set) are
//! back-patched once the target position is known.

use std::io;

use byteorder::{BigEndian, ByteOrder};

use crate::core::{ColumnType, DataHeader, FileHeader, Value};
use crate::error::Result;
use crate::ROOT_HEADER_OFFSET;

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    let bytes: Vec<u8> = value.chars().map(ascii_byte).collect();
    put_i32(buf, bytes.len() as i32);
    buf.extend_from_slice(&bytes);
}

fn put_wstring(buf: &mut Vec<u8>, value: &str) {
    let units: Vec<u16> = value.encode_utf16().collect();
    put_i32(buf, units.len() as i32);
    for unit in units {
        buf.extend_from_slice(&unit.to_be_bytes());
    }
}

/// Overwrites the big-endian `u32` at `pos`
fn patch_u32(buf: &mut [u8], pos: usize, value: u32) {
    BigEndian::write_u32(&mut buf[pos..pos + 4], value);
}

fn ascii_byte(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b'?')
}

/// Serializes a data header together with its parent chain
pub struct HeaderWriter<'a> {
    header: &'a DataHeader,
}
impl<'a> HeaderWriter<'a> {
    #[must_use]
    pub fn new(header: &'a DataHeader) -> Self {
        Self { header }
    }

    pub fn write_into(&self, buf: &mut Vec<u8>) {
        let header = self.header;
        put_string(buf, header.data_type());
        put_string(buf, header.file_id());
        put_wstring(buf, header.creation_date());
        buf.extend_from_slice(header.locale_bytes());

        put_i32(buf, header.parameters().len() as i32);
        for param in header.parameters() {
            put_wstring(buf, &param.name);
            let value = param.value.encode();
            put_i32(buf, value.len() as i32);
            buf.extend_from_slice(&value);
            put_wstring(buf, &param.type_name);
        }

        put_i32(buf, header.parents().len() as i32);
        for parent in header.parents() {
            HeaderWriter::new(parent).write_into(buf);
        }
    }
}

/// Accumulates the columns and rows of one data set
#[derive(Debug, Clone)]
pub struct DataSetWriter {
    name: String,
    columns: Vec<(String, ColumnType)>,
    rows: Vec<Vec<Value>>,
}
impl DataSetWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Appends a column definition
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, kind: ColumnType) -> Self {
        self.columns.push((name.into(), kind));
        self
    }

    /// Appends a row; values are converted to their column's type when written
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// On-disk width of each column; string columns fit their longest value
    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, (_, kind))| {
                let longest = || {
                    self.rows
                        .iter()
                        .filter_map(|row| row.get(idx))
                        .map(|value| value.to_string().encode_utf16().count())
                        .max()
                        .unwrap_or(0)
                };
                match kind {
                    ColumnType::Ascii => 4 + longest(),
                    ColumnType::Wide => 4 + 2 * longest(),
                    fixed => fixed.min_width(),
                }
            })
            .collect()
    }

    /// Appends the data set to `buf` with the given next-sibling offset
    pub fn write_into(&self, buf: &mut Vec<u8>, next_offset: u32) {
        let widths = self.widths();
        put_u32(buf, next_offset);
        put_wstring(buf, &self.name);
        put_i32(buf, self.rows.len() as i32);
        put_i32(buf, self.columns.len() as i32);
        for ((name, kind), width) in self.columns.iter().zip(&widths) {
            put_wstring(buf, name);
            put_i32(buf, kind.code());
            put_i32(buf, *width as i32);
        }
        for row in &self.rows {
            for (idx, (_, kind)) in self.columns.iter().enumerate() {
                let start = buf.len();
                if let Some(value) = row.get(idx) {
                    encode_value(buf, *kind, value);
                }
                buf.resize(start + widths[idx], 0);
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode_value(buf: &mut Vec<u8>, kind: ColumnType, value: &Value) {
    let int = || value.as_i64().unwrap_or_default();
    match kind {
        ColumnType::I8 => buf.push(int() as i8 as u8),
        ColumnType::U8 => buf.push(int() as u8),
        ColumnType::I16 => buf.extend_from_slice(&(int() as i16).to_be_bytes()),
        ColumnType::U16 => buf.extend_from_slice(&(int() as u16).to_be_bytes()),
        ColumnType::I32 => buf.extend_from_slice(&(int() as i32).to_be_bytes()),
        ColumnType::U32 => buf.extend_from_slice(&(int() as u32).to_be_bytes()),
        ColumnType::F32 => {
            buf.extend_from_slice(&value.as_f32().unwrap_or_default().to_be_bytes());
        }
        ColumnType::Ascii => put_string(buf, &value.to_string()),
        ColumnType::Wide => put_wstring(buf, &value.to_string()),
    }
}

/// Accumulates the data sets of one data group
#[derive(Debug, Clone)]
pub struct GroupWriter {
    name: String,
    data_sets: Vec<DataSetWriter>,
}
impl GroupWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_sets: Vec::new(),
        }
    }

    pub fn push_data_set(&mut self, data_set: DataSetWriter) {
        self.data_sets.push(data_set);
    }

    /// Appends the group and its data sets to `buf`.
    ///
    /// # Returns
    ///
    /// The absolute offsets of the written data sets
    pub fn write_into(&self, buf: &mut Vec<u8>, next_offset: u32) -> Vec<u64> {
        let group_start = buf.len();
        put_u32(buf, next_offset);
        put_u32(buf, 0);
        put_i32(buf, self.data_sets.len() as i32);
        put_wstring(buf, &self.name);

        let mut offsets = Vec::with_capacity(self.data_sets.len());
        for data_set in &self.data_sets {
            let set_start = buf.len();
            match offsets.last() {
                // link from the group header
                None => patch_u32(buf, group_start + 4, set_start as u32),
                // link from the previous data set
                Some(&prev) => patch_u32(buf, prev as usize, set_start as u32),
            }
            data_set.write_into(buf, 0);
            offsets.push(set_start as u64);
        }
        offsets
    }
}

/// Builds a complete container: file header, root data header, and groups
#[derive(Debug, Clone)]
pub struct ContainerWriter {
    header: DataHeader,
    groups: Vec<GroupWriter>,
}
impl ContainerWriter {
    #[must_use]
    pub fn new(header: DataHeader) -> Self {
        Self {
            header,
            groups: Vec::new(),
        }
    }

    pub fn push_group(&mut self, group: GroupWriter) {
        self.groups.push(group);
    }

    /// Encodes the whole container into a new buffer
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = FileHeader::new(self.groups.len() as i32, 0)
            .as_bytes()
            .to_vec();
        debug_assert_eq!(buf.len() as u64, ROOT_HEADER_OFFSET);
        HeaderWriter::new(&self.header).write_into(&mut buf);

        let mut prev_group: Option<usize> = None;
        for group in &self.groups {
            let group_start = buf.len();
            match prev_group {
                // first group offset lives in the file header
                None => patch_u32(&mut buf, 6, group_start as u32),
                Some(prev) => patch_u32(&mut buf, prev, group_start as u32),
            }
            group.write_into(&mut buf, 0);
            prev_group = Some(group_start);
        }
        buf
    }

    pub fn write<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}
