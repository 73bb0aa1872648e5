//! Remove overlapping detections from sky-projected detection tables
//!
//! Every `*.csv` file in the input directory is treated as one field. Within a
//! field, detections are visited by descending score and a detection is kept
//! only if its RA/Dec bounding box overlaps none of the detections kept before
//! it. Kept rows are written unchanged to `<output_dir>/<prefix><name>.csv`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin bbox_overlap_removal -- \
//!     --input_dir wcs_results --output_dir dedup_results
//!
//! # Process fields concurrently on 8 workers and keep a JSON summary
//! cargo run --release --bin bbox_overlap_removal -- \
//!     --input_dir wcs_results --output_dir dedup_results \
//!     --parallel --threads 8 --report summary.json
//! ```
//!
//! Per-file failures (missing columns, unreadable tables, unwritable outputs)
//! are logged and counted; the tool still exits successfully after logging
//! the summary. A missing input directory is fatal.

use catalog::batch::{run_batch, BatchConfig, FileOutcome, DEFAULT_OUTPUT_PREFIX};
use catalog::resolver::ResolverConfig;
use catalog::sky::RaConvention;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bbox_overlap_removal",
    about = "Batch process CSV files to remove overlapping bounding boxes",
    long_about = None
)]
struct Args {
    /// Input directory containing CSV files
    #[arg(long = "input_dir", alias = "input-dir")]
    input_dir: PathBuf,

    /// Output directory for processed CSV files (created if absent)
    #[arg(long = "output_dir", alias = "output-dir")]
    output_dir: PathBuf,

    /// Process files concurrently
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (defaults to one per CPU)
    #[arg(long, requires = "parallel")]
    threads: Option<usize>,

    /// How bbox_ra_min/bbox_ra_max pairs are read
    #[arg(long, value_enum, default_value_t = RaConvention::Ordered)]
    ra_convention: RaConvention,

    /// Spatial index cell size in degrees (derived per file when omitted)
    #[arg(long)]
    cell_size: Option<f64>,

    /// Prefix added to output file names
    #[arg(long, default_value = DEFAULT_OUTPUT_PREFIX)]
    prefix: String,

    /// Write a JSON summary of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = BatchConfig {
        input_dir: args.input_dir,
        output_dir: args.output_dir,
        parallel: args.parallel,
        threads: args.threads,
        output_prefix: args.prefix,
        ra_convention: args.ra_convention,
        resolver: ResolverConfig {
            cell_size_deg: args.cell_size,
        },
    };

    let summary = run_batch(&config)?;

    for report in &summary.reports {
        if let FileOutcome::Failed { kind, message } = &report.outcome {
            println!("  FAILED ({kind:?}) {}: {message}", report.input.display());
        }
    }

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)?;
        println!("Summary written to {}", path.display());
    }

    Ok(())
}
