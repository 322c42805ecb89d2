use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use calvin::batch::{export_files_with, ExportOptions};
use tracing::{error, info};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

const USAGE: &str = "usage: calvin-export [-t <threads>] <out_dir> <cel>...";

fn main() -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);
    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from).peekable();
    let mut options = ExportOptions::default();
    if args.peek().is_some_and(|arg| arg.as_os_str() == "-t") {
        args.next();
        let Some(threads) = args.next() else {
            bail!(USAGE);
        };
        let threads = threads
            .to_str()
            .and_then(|t| t.parse::<usize>().ok())
            .with_context(|| format!("invalid thread count: {}", threads.display()))?;
        options = options.with_num_threads(threads);
    }
    let Some(out_dir) = args.next() else {
        bail!(USAGE);
    };
    let inputs: Vec<PathBuf> = args.collect();
    if inputs.is_empty() {
        bail!(USAGE);
    }

    info!(inputs = inputs.len(), out_dir = %out_dir.display(), "starting export");
    let report = export_files_with(&inputs, &out_dir, options)?;
    for (path, reason) in &report.failed {
        error!(path = %path.display(), "{reason}");
    }
    if !report.is_success() {
        bail!(
            "{} of {} files failed to export",
            report.failed.len(),
            report.num_processed()
        );
    }
    Ok(())
}
