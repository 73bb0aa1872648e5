//! Catalog creation tools for sky-projected source detections.
//!
//! The core of the crate removes duplicate detections of the same source:
//! detections of one field are resolved greedily by score against an
//! insert-only [`index::SpatialIndex`], using an overlap predicate that
//! treats right ascension as circular.
//!
//! - [`sky`]: RA arcs, sky boxes and the overlap predicate
//! - [`index`]: grid-backed acceptance index
//! - [`resolver`]: greedy score-priority suppression
//! - [`table`]: CSV detection tables with passthrough columns
//! - [`batch`]: per-file orchestration with failure isolation

pub mod batch;
pub mod index;
pub mod resolver;
pub mod sky;
pub mod table;

pub use batch::{
    process_file, run_batch, BatchConfig, BatchError, BatchSummary, FileOutcome, FileReport,
};
pub use index::SpatialIndex;
pub use resolver::{resolve_overlaps, Detection, OverlapResolver, Resolution, ResolverConfig};
pub use sky::{RaConvention, RaRange, SkyBox};
pub use table::DetectionTable;
