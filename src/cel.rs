//! CEL view over a Calvin intensity container
//!
//! Intensity, standard deviation and pixel counts are stored one row per cell
//! in scan order. Outlier and masked cells are stored sparsely as `(x, y)`
//! coordinate rows. Exported cells are emitted with `y` as the outer loop and
//! `x` as the inner loop, the traditional CEL ordering.

use std::collections::HashSet;
use std::io;

use crate::core::{DataSet, RowIter, Value};
use crate::error::{FormatError, Result, StructureError};
use crate::facade::Facade;
use crate::read::Container;

pub const INTENSITY: &str = "Intensity";
pub const STD_DEV: &str = "StdDev";
pub const PIXEL: &str = "Pixel";
pub const OUTLIER: &str = "Outlier";
pub const MASK: &str = "Mask";

/// One exported feature of the array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CelCell {
    pub x: usize,
    pub y: usize,
    pub intensity: f32,
    pub stddev: f32,
    pub pixels: i64,
    pub outlier: bool,
    pub masked: bool,
}
impl CelCell {
    /// Writes the cell as `intensity\tstddev\tpixels\toutlier\tmasked\n`
    pub fn write_text<W: io::Write>(
        &self,
        writer: &mut W,
        itoa_buf: &mut itoa::Buffer,
    ) -> io::Result<()> {
        write!(writer, "{:.2}\t{:.2}\t", self.intensity, self.stddev)?;
        writer.write_all(itoa_buf.format(self.pixels).as_bytes())?;
        writer.write_all(if self.outlier { b"\ttrue" } else { b"\tfalse" })?;
        writer.write_all(if self.masked { b"\ttrue\n" } else { b"\tfalse\n" })?;
        Ok(())
    }
}

/// A CEL file: the facade plus the five well-known data sets
pub struct CelFile<'a> {
    facade: Facade<'a>,
    intensity: &'a DataSet,
    stddev: &'a DataSet,
    pixel: &'a DataSet,
    outliers: HashSet<(usize, usize)>,
    masked: HashSet<(usize, usize)>,
}
impl<'a> CelFile<'a> {
    /// Locates the CEL data sets by name in the first data group.
    ///
    /// Outlier and mask coordinates are decoded eagerly; the per-cell data sets
    /// are only checked for shape. A missing Outlier or Mask data set is read as
    /// "no flagged cells".
    pub fn new(container: &'a Container) -> Result<Self> {
        let facade = Facade::new(container)?;
        let group = container.data_group(0)?;

        let intensity = group.data_set_by_name(INTENSITY)?;
        let stddev = group.data_set_by_name(STD_DEV)?;
        let pixel = group.data_set_by_name(PIXEL)?;
        let expected = facade.num_cells();
        check_columns(intensity, 1, ColumnClass::Numeric)?;
        check_columns(stddev, 1, ColumnClass::Numeric)?;
        check_columns(pixel, 1, ColumnClass::Integer)?;
        for set in [intensity, stddev, pixel] {
            if set.num_rows() != expected {
                return Err(StructureError::CellCountMismatch {
                    name: set.name().to_string(),
                    expected,
                    found: set.num_rows(),
                }
                .into());
            }
        }

        let outliers = match group.data_set_by_name(OUTLIER) {
            Ok(set) => coordinates(set)?,
            Err(_) => HashSet::new(),
        };
        let masked = match group.data_set_by_name(MASK) {
            Ok(set) => coordinates(set)?,
            Err(_) => HashSet::new(),
        };

        Ok(Self {
            facade,
            intensity,
            stddev,
            pixel,
            outliers,
            masked,
        })
    }

    #[must_use]
    pub fn facade(&self) -> &Facade<'a> {
        &self.facade
    }

    #[must_use]
    pub fn chip_type(&self) -> Option<&str> {
        self.facade.chip_type.as_deref()
    }

    #[must_use]
    pub fn algorithm_name(&self) -> Option<&str> {
        self.facade.algorithm_name.as_deref()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.facade.num_rows
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.facade.num_columns
    }

    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.facade.num_cells()
    }

    #[must_use]
    pub fn is_outlier(&self, x: usize, y: usize) -> bool {
        self.outliers.contains(&(x, y))
    }

    #[must_use]
    pub fn is_masked(&self, x: usize, y: usize) -> bool {
        self.masked.contains(&(x, y))
    }

    /// Streams every cell in `y`-major, `x`-minor order
    #[must_use]
    pub fn cells(&self) -> Cells<'_> {
        Cells {
            cel: self,
            intensity: self.intensity.rows(),
            stddev: self.stddev.rows(),
            pixel: self.pixel.rows(),
            idx: 0,
        }
    }

    /// Streams the cells with design element indices in `range`
    pub(crate) fn cells_in(&self, range: std::ops::Range<usize>) -> Result<Cells<'_>> {
        Ok(Cells {
            cel: self,
            intensity: self.intensity.rows_in(range.clone())?,
            stddev: self.stddev.rows_in(range.clone())?,
            pixel: self.pixel.rows_in(range.clone())?,
            idx: range.start,
        })
    }

    /// Decodes the whole grid into memory
    pub fn export_grid(&self) -> Result<Vec<CelCell>> {
        self.cells().collect()
    }

    /// Writes one tab-separated line per cell, returning the number of lines
    pub fn write_text<W: io::Write>(&self, writer: &mut W) -> Result<usize> {
        let mut itoa_buf = itoa::Buffer::new();
        let mut lines = 0;
        for cell in self.cells() {
            cell?.write_text(writer, &mut itoa_buf)?;
            lines += 1;
        }
        Ok(lines)
    }

    /// Combines the lockstep row values for design element `idx`
    fn cell(&self, idx: usize, intensity: &[Value], stddev: &[Value], pixel: &[Value]) -> CelCell {
        let x = idx % self.num_columns();
        let y = idx / self.num_columns();
        CelCell {
            x,
            y,
            intensity: first_f32(intensity),
            stddev: first_f32(stddev),
            pixels: first_i64(pixel),
            outlier: self.is_outlier(x, y),
            masked: self.is_masked(x, y),
        }
    }
}

/// Lockstep iterator over the Intensity, StdDev and Pixel data sets
pub struct Cells<'a> {
    cel: &'a CelFile<'a>,
    intensity: RowIter<'a>,
    stddev: RowIter<'a>,
    pixel: RowIter<'a>,
    idx: usize,
}
impl Iterator for Cells<'_> {
    type Item = Result<CelCell>;

    fn next(&mut self) -> Option<Self::Item> {
        let intensity = self.intensity.next()?;
        let stddev = self.stddev.next()?;
        let pixel = self.pixel.next()?;
        let idx = self.idx;
        self.idx += 1;
        Some(
            intensity
                .and_then(|i| stddev.and_then(|s| pixel.map(|p| self.cel.cell(idx, &i, &s, &p)))),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.intensity.size_hint()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ColumnClass {
    Numeric,
    Integer,
}

/// Checks the kind of the first `count` columns of `set`
fn check_columns(set: &DataSet, count: usize, class: ColumnClass) -> Result<()> {
    for idx in 0..count {
        let column = set.columns().get(idx);
        let accepted = column.is_some_and(|c| match class {
            ColumnClass::Numeric => !c.kind().is_string(),
            ColumnClass::Integer => c.kind().is_integer(),
        });
        if !accepted {
            let data_set = set.name().to_string();
            let column = column.map(|c| c.name().to_string()).unwrap_or_default();
            return Err(match class {
                ColumnClass::Numeric => FormatError::NonNumericColumn { data_set, column },
                ColumnClass::Integer => FormatError::NonIntegerColumn { data_set, column },
            }
            .into());
        }
    }
    Ok(())
}

/// Decodes every `(x, y)` row of a sparse coordinate data set.
///
/// Negative coordinates address no cell and are dropped.
fn coordinates(set: &DataSet) -> Result<HashSet<(usize, usize)>> {
    check_columns(set, 2, ColumnClass::Integer)?;
    let mut coords = HashSet::with_capacity(set.num_rows().min(1 << 16));
    for row in set.rows() {
        let row = row?;
        let x = usize::try_from(first_i64(&row));
        let y = usize::try_from(first_i64(&row[1..]));
        if let (Ok(x), Ok(y)) = (x, y) {
            coords.insert((x, y));
        }
    }
    Ok(coords)
}

fn first_f32(row: &[Value]) -> f32 {
    row.first().and_then(Value::as_f32).unwrap_or_default()
}

fn first_i64(row: &[Value]) -> i64 {
    row.first().and_then(Value::as_i64).unwrap_or_default()
}
