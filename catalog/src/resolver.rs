//! Greedy score-priority suppression of overlapping detections.
//!
//! Detections of one field are visited from highest to lowest score. A
//! detection is accepted when its box overlaps none of the boxes accepted so
//! far, and discarded otherwise. Accepted boxes live in a [`SpatialIndex`]
//! created for the pass and dropped when it ends.
//!
//! This is a single-pass greedy approximation, not a maximum-weight
//! independent set. Overlap only propagates through accepted boxes: a
//! detection that overlaps a discarded one survives as long as it is clear of
//! every accepted box.
//!
//! # Examples
//!
//! ```rust
//! use catalog::resolver::{resolve_overlaps, Detection};
//! use catalog::sky::{RaConvention, SkyBox};
//!
//! let boxed = |ra_min, ra_max, score| Detection {
//!     score,
//!     sky_box: SkyBox::from_bounds(ra_min, ra_max, 0.0, 1.0, RaConvention::Ordered).unwrap(),
//! };
//!
//! // B overlaps A and C; C does not overlap A
//! let detections = vec![boxed(0.0, 1.0, 0.9), boxed(0.8, 2.0, 0.8), boxed(1.5, 3.0, 0.7)];
//! let resolution = resolve_overlaps(&detections).unwrap();
//! assert_eq!(resolution.retained(), &[0, 2]);
//! assert_eq!(resolution.suppressor_of(1), Some(0));
//! ```

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::index::{IndexError, SpatialIndex, MIN_CELL_DEG};
use crate::sky::{SkyBox, FULL_CIRCLE_DEG};

/// Errors that can occur while resolving a detection set
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Detection {index} has a NaN score")]
    NanScore { index: usize },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// One candidate source: its confidence and its box on the sky
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub score: f64,
    pub sky_box: SkyBox,
}

/// Tuning for the resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResolverConfig {
    /// Grid cell edge in degrees; derived from the set when `None`
    pub cell_size_deg: Option<f64>,
}

/// Outcome of resolving one detection set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    retained: Vec<usize>,
    suppressed_by: Vec<Option<usize>>,
}

impl Resolution {
    /// Input indices of the retained detections, in acceptance order
    /// (descending score, ties in input order)
    pub fn retained(&self) -> &[usize] {
        &self.retained
    }

    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }

    pub fn discarded_count(&self) -> usize {
        self.suppressed_by.len() - self.retained.len()
    }

    pub fn is_retained(&self, index: usize) -> bool {
        index < self.suppressed_by.len() && self.suppressed_by[index].is_none()
    }

    /// The accepted detection that caused `index` to be discarded.
    ///
    /// Returns `None` for retained detections and out-of-range indices. When
    /// several accepted boxes overlap, the earliest accepted one is reported.
    pub fn suppressor_of(&self, index: usize) -> Option<usize> {
        self.suppressed_by.get(index).copied().flatten()
    }

    /// Retained input indices sorted ascending, i.e. in original row order
    pub fn retained_in_input_order(&self) -> Vec<usize> {
        let mut indices = self.retained.clone();
        indices.sort_unstable();
        indices
    }
}

/// Greedy overlap resolver for a single detection set
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapResolver {
    config: ResolverConfig,
}

impl OverlapResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Select the retained subset of `detections`.
    ///
    /// # Errors
    /// * `ResolveError::NanScore` - a score cannot be ordered
    /// * `ResolveError::Index` - the configured cell size is invalid
    pub fn resolve(&self, detections: &[Detection]) -> Result<Resolution, ResolveError> {
        if let Some(index) = detections.iter().position(|d| d.score.is_nan()) {
            return Err(ResolveError::NanScore { index });
        }

        let cell_size = match self.config.cell_size_deg {
            Some(size) => size,
            None => auto_cell_size(detections),
        };
        let mut index = SpatialIndex::new(cell_size)?;

        // Stable sort keeps input order among equal scores
        let mut order: Vec<usize> = (0..detections.len()).collect();
        order.sort_by(|&a, &b| detections[b].score.total_cmp(&detections[a].score));

        let mut retained = Vec::new();
        let mut suppressed_by = vec![None; detections.len()];

        for &candidate in &order {
            let sky_box = detections[candidate].sky_box;
            // Hits come back in insertion order, so the first is the
            // highest-priority suppressor
            match index.query(&sky_box).first() {
                Some(&suppressor) => suppressed_by[candidate] = Some(suppressor),
                None => {
                    index.insert(candidate, sky_box);
                    retained.push(candidate);
                }
            }
        }

        debug!(
            "Resolved {} detections with {:.6} deg cells: {} retained",
            detections.len(),
            index.cell_size(),
            retained.len()
        );

        Ok(Resolution {
            retained,
            suppressed_by,
        })
    }
}

/// Resolve with the default configuration
pub fn resolve_overlaps(detections: &[Detection]) -> Result<Resolution, ResolveError> {
    OverlapResolver::default().resolve(detections)
}

/// Cell size matched to the typical box so most boxes touch a handful of cells.
///
/// Uses the median of each box's larger extent, clamped to
/// `[MIN_CELL_DEG, 360]`.
pub fn auto_cell_size(detections: &[Detection]) -> f64 {
    let mut extents: Vec<f64> = detections
        .iter()
        .map(|d| d.sky_box.extent())
        .filter(|e| e.is_finite())
        .collect();
    if extents.is_empty() {
        return FULL_CIRCLE_DEG;
    }
    extents.sort_by(f64::total_cmp);
    extents[extents.len() / 2].clamp(MIN_CELL_DEG, FULL_CIRCLE_DEG)
}
