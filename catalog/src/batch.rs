//! Batch deduplication of per-field detection tables.
//!
//! Every `*.csv` file in the input directory is one detection set. Each file
//! is loaded, resolved and written independently; a failure in one file is
//! logged, recorded in its [`FileReport`] and never stops the batch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::resolver::{OverlapResolver, ResolveError, ResolverConfig};
use crate::sky::RaConvention;
use crate::table::{DetectionTable, TableError};

/// Prefix prepended to input file names to form output file names
pub const DEFAULT_OUTPUT_PREFIX: &str = "processed_";

/// Errors that abort a whole batch
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Input directory '{0}' does not exist")]
    InputDirMissing(PathBuf),

    #[error("Input path '{0}' is not a directory")]
    InputNotADirectory(PathBuf),

    #[error("Failed to list input directory '{path}': {source}")]
    InputDirUnreadable { path: PathBuf, source: io::Error },

    #[error("Failed to create output directory '{path}': {source}")]
    CreateOutputDir { path: PathBuf, source: io::Error },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors confined to a single file
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Schema error: {0}")]
    Schema(TableError),

    #[error("Read error: {0}")]
    Read(TableError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Write error for '{path}': {source}")]
    Write { path: PathBuf, source: TableError },
}

impl From<TableError> for FileError {
    fn from(e: TableError) -> Self {
        if e.is_schema_error() {
            FileError::Schema(e)
        } else {
            FileError::Read(e)
        }
    }
}

/// Coarse classification of a file failure, for summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Schema,
    Read,
    Resolve,
    Write,
}

impl FileError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FileError::Schema(_) => FailureKind::Schema,
            FileError::Read(_) => FailureKind::Read,
            FileError::Resolve(_) => FailureKind::Resolve,
            FileError::Write { .. } => FailureKind::Write,
        }
    }
}

/// Non-fatal conditions noticed while processing a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileWarning {
    /// The table had no rows, or no valid rows
    EmptyInput,
    /// Rows skipped because a required value was missing or out of range
    InvalidRows(usize),
}

/// Counts for a successfully processed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedStats {
    pub rows_read: usize,
    pub invalid_rows: usize,
    pub retained: usize,
    pub removed: usize,
    pub warnings: Vec<FileWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Processed(ProcessedStats),
    Failed { kind: FailureKind, message: String },
}

/// Result of processing one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: FileOutcome,
    pub elapsed: Duration,
}

impl FileReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, FileOutcome::Processed(_))
    }
}

/// Aggregate result of a batch run; reports follow discovery order
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub reports: Vec<FileReport>,
}

impl BatchSummary {
    fn from_reports(reports: Vec<FileReport>) -> Self {
        Self {
            total: reports.len(),
            succeeded: reports.iter().filter(|r| r.succeeded()).count(),
            reports,
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

/// Everything a batch run needs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Process files concurrently
    pub parallel: bool,
    /// Worker count for parallel mode; rayon's global pool when `None`
    pub threads: Option<usize>,
    pub output_prefix: String,
    pub ra_convention: RaConvention,
    pub resolver: ResolverConfig,
}

impl BatchConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            parallel: false,
            threads: None,
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            ra_convention: RaConvention::default(),
            resolver: ResolverConfig::default(),
        }
    }

    /// Destination for the deduplicated copy of `input`
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(format!("{}{}", self.output_prefix, name))
    }
}

/// List the `*.csv` files directly inside `dir`, sorted by path.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !dir.exists() {
        return Err(BatchError::InputDirMissing(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(BatchError::InputNotADirectory(dir.to_path_buf()));
    }

    let unreadable = |source| BatchError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

fn try_process(
    input: &Path,
    output: &Path,
    config: &BatchConfig,
) -> Result<ProcessedStats, FileError> {
    let table = DetectionTable::read(input, config.ra_convention)?;
    info!("Processing {}: read {} records", input.display(), table.total_rows());

    let mut warnings = Vec::new();
    if table.invalid_rows() > 0 {
        warn!(
            "{}: skipped {} rows with missing or invalid coordinates",
            input.display(),
            table.invalid_rows()
        );
        warnings.push(FileWarning::InvalidRows(table.invalid_rows()));
    }
    if table.is_empty() {
        warn!("{}: no valid detections, writing empty output", input.display());
        warnings.push(FileWarning::EmptyInput);
    }

    let start = Instant::now();
    let resolution = OverlapResolver::new(config.resolver).resolve(table.detections())?;
    info!(
        "  Processed {}: original={}, remaining={}",
        input.display(),
        table.len(),
        resolution.retained_count()
    );
    info!(
        "  Removed {} overlapping records in {:.2} seconds",
        resolution.discarded_count(),
        start.elapsed().as_secs_f64()
    );

    table
        .write_subset(output, &resolution.retained_in_input_order())
        .map_err(|source| FileError::Write {
            path: output.to_path_buf(),
            source,
        })?;
    info!("  Saved to {}", output.display());

    Ok(ProcessedStats {
        rows_read: table.total_rows(),
        invalid_rows: table.invalid_rows(),
        retained: resolution.retained_count(),
        removed: resolution.discarded_count(),
        warnings,
    })
}

/// Deduplicate one input file into the output directory.
///
/// Never fails: any error is logged and captured in the returned report.
pub fn process_file(input: &Path, config: &BatchConfig) -> FileReport {
    let start = Instant::now();
    let output = config.output_path_for(input);

    let outcome = match try_process(input, &output, config) {
        Ok(stats) => FileOutcome::Processed(stats),
        Err(e) => {
            error!("Error in {}: {}", input.display(), e);
            FileOutcome::Failed {
                kind: e.kind(),
                message: e.to_string(),
            }
        }
    };

    FileReport {
        input: input.to_path_buf(),
        output,
        outcome,
        elapsed: start.elapsed(),
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("##-"));
    }
    bar
}

fn process_parallel(inputs: &[PathBuf], config: &BatchConfig) -> Vec<FileReport> {
    let bar = progress_bar(inputs.len());
    let reports = inputs
        .par_iter()
        .map(|input| {
            let report = process_file(input, config);
            bar.inc(1);
            report
        })
        .collect();
    bar.finish_and_clear();
    reports
}

/// Run the whole batch.
///
/// # Errors
/// Only batch-level problems are returned: a missing or unreadable input
/// directory, an output directory that cannot be created, or a worker pool
/// that cannot be built. Per-file failures are reported in the summary.
pub fn run_batch(config: &BatchConfig) -> Result<BatchSummary, BatchError> {
    let inputs = discover_inputs(&config.input_dir)?;

    fs::create_dir_all(&config.output_dir).map_err(|source| BatchError::CreateOutputDir {
        path: config.output_dir.clone(),
        source,
    })?;

    if inputs.is_empty() {
        warn!("No CSV files found in '{}'", config.input_dir.display());
        return Ok(BatchSummary::from_reports(Vec::new()));
    }

    info!(
        "Found {} CSV files to process in '{}'",
        inputs.len(),
        config.input_dir.display()
    );

    let reports = if config.parallel {
        info!("Using parallel processing...");
        match config.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(|| process_parallel(&inputs, config)),
            None => process_parallel(&inputs, config),
        }
    } else {
        info!("Using sequential processing...");
        inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                info!("Processing file {}/{}", i + 1, inputs.len());
                process_file(input, config)
            })
            .collect()
    };

    let summary = BatchSummary::from_reports(reports);
    info!(
        "Batch processing completed: successfully processed {}/{} CSV files",
        summary.succeeded, summary.total
    );
    Ok(summary)
}
