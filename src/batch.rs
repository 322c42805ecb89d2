//! Exports many CEL containers to tab-separated text files
//!
//! A failure on one input is logged and recorded in the [`BatchReport`]; the
//! remaining inputs are still processed. Inputs are spread across worker
//! threads, each of which opens its own containers.

use std::collections::hash_map::{Entry, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cel::CelFile;
use crate::error::{IntoCalvinError, Result};
use crate::read::open_container;

/// Extension given to every exported text file
pub const EXPORT_EXTENSION: &str = "txt";

/// Settings for a batch export
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Number of files exported concurrently (0 = all cores)
    pub num_threads: usize,
}
impl ExportOptions {
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    fn threads_for(&self, num_inputs: usize) -> usize {
        let threads = if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        };
        threads.min(num_inputs).max(1)
    }
}

/// Outcome of a batch export
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Output files that were written successfully
    pub succeeded: Vec<PathBuf>,
    /// Inputs that failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}
impl BatchReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn num_processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Path of the text file `input` exports to inside `out_dir`
#[must_use]
pub fn output_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "export".into(), |s| s.to_string_lossy().into_owned());
    out_dir.join(format!("{stem}.{EXPORT_EXTENSION}"))
}

/// Exports a single CEL container, returning the number of cells written.
///
/// The input is fully parsed before `output` is created, so a malformed input
/// never touches the output path. A failed write removes the partial output
/// created by this call.
pub fn export_file(input: &Path, output: &Path) -> Result<usize> {
    let container = open_container(input)?;
    let cel = CelFile::new(&container)?;
    debug!(
        path = %input.display(),
        rows = cel.num_rows(),
        cols = cel.num_columns(),
        chip_type = cel.chip_type().unwrap_or_default(),
        "exporting CEL grid"
    );
    let mut writer = BufWriter::new(File::create(output)?);
    let written = cel.write_text(&mut writer).and_then(|cells| {
        writer.flush()?;
        Ok(cells)
    });
    if written.is_err() {
        // drop partial output
        let _ = fs::remove_file(output);
    }
    written
}

/// Exports every path in `paths` into `out_dir` with default options
pub fn export_files<P: AsRef<Path>>(paths: &[P], out_dir: impl AsRef<Path>) -> Result<BatchReport> {
    export_files_with(paths, out_dir, ExportOptions::default())
}

/// Exports every path in `paths` into `out_dir`, creating the directory if needed.
///
/// Only a failure to create `out_dir` is returned as an error. The report lists
/// inputs in the order they were given. When several inputs map to the same
/// output file, the first one claims it and the others are reported as failed.
pub fn export_files_with<P: AsRef<Path>>(
    paths: &[P],
    out_dir: impl AsRef<Path>,
    options: ExportOptions,
) -> Result<BatchReport> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;
    if paths.is_empty() {
        return Ok(BatchReport::default());
    }

    let jobs = plan_outputs(paths, out_dir);
    let num_threads = options.threads_for(jobs.len());
    let per_thread = jobs.len().div_ceil(num_threads);
    debug!(num_threads, inputs = jobs.len(), "starting batch export");

    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .chunks(per_thread)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(export_one)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().map_err(|_| {
                    std::io::Error::other("export thread panicked").into_calvin_error()
                })
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut report = BatchReport::default();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Ok(output) => report.succeeded.push(output),
            Err(failure) => report.failed.push(failure),
        }
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch export finished"
    );
    Ok(report)
}

/// One input of a batch and the file it exports to
struct Job<'p> {
    input: &'p Path,
    output: PathBuf,
    /// Earlier input that already exports to `output`
    claimed_by: Option<&'p Path>,
}

/// Assigns every input its output path, first come first served
fn plan_outputs<'p, P: AsRef<Path>>(paths: &'p [P], out_dir: &Path) -> Vec<Job<'p>> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::with_capacity(paths.len());
    paths
        .iter()
        .map(|input| {
            let input = input.as_ref();
            let output = output_path(input, out_dir);
            let claimed_by = match claimed.entry(output.clone()) {
                Entry::Occupied(entry) => Some(*entry.get()),
                Entry::Vacant(entry) => {
                    entry.insert(input);
                    None
                }
            };
            Job {
                input,
                output,
                claimed_by,
            }
        })
        .collect()
}

/// Exports one input, logging the outcome
fn export_one(job: &Job<'_>) -> std::result::Result<PathBuf, (PathBuf, String)> {
    let Job {
        input,
        output,
        claimed_by,
    } = job;
    if let Some(owner) = claimed_by {
        let reason = format!(
            "output {} is already written by {}",
            output.display(),
            owner.display()
        );
        warn!(input = %input.display(), "{reason}");
        return Err((input.to_path_buf(), reason));
    }
    match export_file(input, output) {
        Ok(cells) => {
            info!(input = %input.display(), output = %output.display(), cells, "exported");
            Ok(output.clone())
        }
        Err(e) => {
            warn!(input = %input.display(), error = %e, "export failed");
            Err((input.to_path_buf(), e.to_string()))
        }
    }
}
