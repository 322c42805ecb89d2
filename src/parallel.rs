use std::ops::Range;

use tracing::debug;

use crate::cel::{CelCell, CelFile};
use crate::error::{IndexError, IntoCalvinError, Result};

/// Number of cells a worker decodes between calls to `on_batch_complete`
pub const BATCH_SIZE: usize = 1024;

/// Trait for types that can process CEL cells in parallel.
///
/// Each worker thread receives its own clone of the processor. Shared state
/// (counters, output buffers) belongs behind an `Arc` inside the processor.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single cell
    fn process_cell(&mut self, cell: CelCell) -> Result<()>;

    /// Called when a thread finishes processing a batch of cells
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread calls this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl CelFile<'_> {
    /// Processes every cell of the array across `num_threads` workers.
    ///
    /// A `num_threads` of zero uses every available CPU.
    pub fn process_parallel<P: ParallelProcessor>(
        &self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        self.process_parallel_range(processor, num_threads, 0..self.num_cells())
    }

    /// Process cells in parallel within a specified range
    ///
    /// The range is split into contiguous chunks, one per thread. Every worker
    /// decodes through its own cursor over the shared bytes.
    ///
    /// # Arguments
    ///
    /// * `processor` - The processor to use for each cell
    /// * `num_threads` - The number of threads to spawn
    /// * `range` - The range of design element indices to process
    pub fn process_parallel_range<P: ParallelProcessor>(
        &self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()> {
        self.validate_range(&range)?;
        if range.is_empty() {
            return Ok(());
        }

        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        }
        .max(1);
        let cells_per_thread = range.len().div_ceil(num_threads);
        debug!(
            num_threads,
            cells_per_thread,
            start = range.start,
            end = range.end,
            "processing cells in parallel"
        );

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..num_threads)
                .map(|tid| {
                    let mut processor = processor.clone();
                    processor.set_tid(tid);
                    let start = range.start + tid * cells_per_thread;
                    let end = (start + cells_per_thread).min(range.end);
                    scope.spawn(move || -> Result<()> {
                        if start >= end {
                            return Ok(());
                        }
                        for batch_start in (start..end).step_by(BATCH_SIZE) {
                            let batch_end = (batch_start + BATCH_SIZE).min(end);
                            for cell in self.cells_in(batch_start..batch_end)? {
                                processor.process_cell(cell?)?;
                            }
                            processor.on_batch_complete()?;
                        }
                        Ok(())
                    })
                })
                .collect();

            for handle in handles {
                handle.join().map_err(|_| {
                    std::io::Error::other("cell processing thread panicked").into_calvin_error()
                })??;
            }
            Ok(())
        })
    }

    /// Checks that `range` addresses existing cells
    pub fn validate_range(&self, range: &Range<usize>) -> Result<()> {
        let total = self.num_cells();
        if range.start > range.end || range.end > total {
            return Err(IndexError::OutOfRange {
                kind: "cell",
                requested_index: range.end.max(range.start),
                len: total,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use std::collections::HashSet;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::cel::{INTENSITY, PIXEL, STD_DEV};
    use crate::core::{ColumnType, DataHeader, Parameter, ParameterValue, Value};
    use crate::read::Container;
    use crate::write::{ContainerWriter, DataSetWriter, GroupWriter};
    use crate::{Error, LOCALE_SIZE, PARAM_NUM_COLUMNS, PARAM_NUM_ROWS};

    #[derive(Clone, Default)]
    struct TestProcessor {
        pub n_cells: Arc<Mutex<usize>>,
        pub n_batches: Arc<Mutex<usize>>,
        pub seen: Arc<Mutex<HashSet<(usize, usize)>>>,
        tid: Option<usize>,
    }
    impl ParallelProcessor for TestProcessor {
        fn process_cell(&mut self, cell: CelCell) -> Result<()> {
            *self.n_cells.lock() += 1;
            assert!((cell.intensity - (cell.y * 100 + cell.x) as f32).abs() < f32::EPSILON);
            self.seen.lock().insert((cell.x, cell.y));
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            *self.n_batches.lock() += 1;
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    /// Array of `rows` x 100 cells whose intensity encodes its position
    fn container(rows: usize) -> Container {
        let cols = 100;
        let header = DataHeader::new(
            "affymetrix-calvin-intensity",
            "par",
            "",
            [0u8; LOCALE_SIZE],
            vec![
                Parameter::new(PARAM_NUM_ROWS, ParameterValue::Int(rows as i32)),
                Parameter::new(PARAM_NUM_COLUMNS, ParameterValue::Int(cols as i32)),
            ],
            vec![],
        );
        let mut intensity = DataSetWriter::new(INTENSITY).column(INTENSITY, ColumnType::F32);
        let mut stddev = DataSetWriter::new(STD_DEV).column(STD_DEV, ColumnType::F32);
        let mut pixel = DataSetWriter::new(PIXEL).column(PIXEL, ColumnType::I16);
        for i in 0..rows * cols {
            intensity.push_row(vec![Value::F32(i as f32)]);
            stddev.push_row(vec![Value::F32(1.0)]);
            pixel.push_row(vec![Value::I16(16)]);
        }
        let mut group = GroupWriter::new("Default Group");
        group.push_data_set(intensity);
        group.push_data_set(stddev);
        group.push_data_set(pixel);
        let mut writer = ContainerWriter::new(header);
        writer.push_group(group);
        Container::from_bytes(writer.to_bytes()).unwrap()
    }

    #[test]
    fn test_parallel_processor() {
        let container = container(50);
        let cel = CelFile::new(&container).unwrap();
        let processor = TestProcessor::default();
        cel.process_parallel(processor.clone(), 0).unwrap();
        assert_eq!(*processor.n_cells.lock(), 5000);
        assert_eq!(processor.seen.lock().len(), 5000);
        assert!(*processor.n_batches.lock() >= 5);
    }

    #[test]
    fn test_parallel_processor_range() {
        let container = container(30);
        let cel = CelFile::new(&container).unwrap();
        let processor = TestProcessor::default();
        cel.process_parallel_range(processor.clone(), 4, 250..260)
            .unwrap();
        assert_eq!(*processor.n_cells.lock(), 10);
        let seen = processor.seen.lock();
        assert!(seen.contains(&(50, 2)));
        assert!(seen.contains(&(59, 2)));
    }

    #[test]
    fn test_parallel_processor_empty_range() {
        let container = container(3);
        let cel = CelFile::new(&container).unwrap();
        let processor = TestProcessor::default();
        cel.process_parallel_range(processor.clone(), 2, 10..10)
            .unwrap();
        assert_eq!(*processor.n_cells.lock(), 0);
    }

    #[test]
    fn test_parallel_processor_out_of_range() {
        let container = container(3);
        let cel = CelFile::new(&container).unwrap();
        let processor = TestProcessor::default();
        assert!(matches!(
            cel.process_parallel_range(processor, 0, 0..1_000_000),
            Err(Error::IndexError(IndexError::OutOfRange { len: 300, .. }))
        ));
    }

    #[derive(Clone)]
    struct FailingProcessor;
    impl ParallelProcessor for FailingProcessor {
        fn process_cell(&mut self, cell: CelCell) -> Result<()> {
            if cell.x == 7 {
                return Err(std::io::Error::other("refused").into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_processor_error_propagates() {
        let container = container(2);
        let cel = CelFile::new(&container).unwrap();
        assert!(matches!(
            cel.process_parallel(FailingProcessor, 2),
            Err(Error::IoError(_))
        ));
    }
}
