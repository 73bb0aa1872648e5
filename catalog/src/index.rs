//! Insert-only spatial index of accepted sky boxes.
//!
//! The index is a uniform grid over the planar `[0, 360] × [-90, 90]` sky.
//! Each accepted box is split at the RA meridian into at most two rectangles
//! and registered in every grid cell those rectangles cover. A query gathers
//! the boxes registered in the cells under the query box and confirms each
//! candidate with the exact circular overlap predicate.
//!
//! Boxes are never removed: once inserted a box keeps suppressing for the
//! lifetime of the index, which is one resolution pass.

use std::collections::HashMap;

use thiserror::Error;

use crate::sky::{PlanarRect, SkyBox, FULL_CIRCLE_DEG};

/// Boxes covering more cells than this are kept in a linear side list
/// instead of being registered cell by cell.
pub const MAX_CELLS_PER_BOX: usize = 4096;

/// Finest grid pitch (one arcsecond); smaller requested sizes are raised to it
pub const MIN_CELL_DEG: f64 = 1.0 / 3600.0;

const DEC_EXTENT_DEG: f64 = 180.0;

/// Errors that can occur while building a spatial index
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Cell size must be a positive finite number of degrees, got {0}")]
    InvalidCellSize(f64),
}

#[derive(Debug, Clone, Copy)]
struct CellSpan {
    ra_lo: usize,
    ra_hi: usize,
    dec_lo: usize,
    dec_hi: usize,
}

impl CellSpan {
    fn count(&self) -> usize {
        // Saturates: a fine grid under a wide box exceeds usize on 32-bit targets
        (self.ra_hi - self.ra_lo)
            .saturating_add(1)
            .saturating_mul((self.dec_hi - self.dec_lo).saturating_add(1))
    }

    fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.ra_lo..=self.ra_hi)
            .flat_map(move |ra| (self.dec_lo..=self.dec_hi).map(move |dec| (ra, dec)))
    }
}

fn total_cells(spans: &[CellSpan]) -> usize {
    spans
        .iter()
        .map(CellSpan::count)
        .fold(0, usize::saturating_add)
}

#[derive(Debug, Clone)]
struct Entry {
    id: usize,
    sky_box: SkyBox,
}

/// Grid index answering "does any accepted box overlap this one?"
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    ra_cells: usize,
    dec_cells: usize,
    cells: HashMap<(usize, usize), Vec<usize>>,
    oversized: Vec<usize>,
    entries: Vec<Entry>,
}

impl SpatialIndex {
    /// Create an empty index with square cells of `cell_size_deg` degrees.
    ///
    /// The size is clamped to `[MIN_CELL_DEG, 360]`.
    ///
    /// # Errors
    /// * `IndexError::InvalidCellSize` - cell size is not positive and finite
    pub fn new(cell_size_deg: f64) -> Result<Self, IndexError> {
        if !cell_size_deg.is_finite() || cell_size_deg <= 0.0 {
            return Err(IndexError::InvalidCellSize(cell_size_deg));
        }

        let cell_size = cell_size_deg.clamp(MIN_CELL_DEG, FULL_CIRCLE_DEG);
        let ra_cells = ((FULL_CIRCLE_DEG / cell_size).ceil() as usize).max(1);
        let dec_cells = ((DEC_EXTENT_DEG / cell_size).ceil() as usize).max(1);

        Ok(Self {
            cell_size,
            ra_cells,
            dec_cells,
            cells: HashMap::new(),
            oversized: Vec::new(),
            entries: Vec::new(),
        })
    }

    /// Edge length of a grid cell in degrees
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of boxes inserted so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Permanently add a box under the caller's identifier.
    pub fn insert(&mut self, id: usize, sky_box: SkyBox) {
        let slot = self.entries.len();
        self.entries.push(Entry { id, sky_box });

        let spans: Vec<CellSpan> = sky_box.rects().iter().map(|r| self.span_of(r)).collect();
        let covered = total_cells(&spans);
        if covered > MAX_CELLS_PER_BOX {
            self.oversized.push(slot);
            return;
        }

        for span in &spans {
            for cell in span.cells() {
                let bucket = self.cells.entry(cell).or_default();
                // Both halves of a wrapping box can land in the same cell
                // when the grid has a single RA column.
                if bucket.last() != Some(&slot) {
                    bucket.push(slot);
                }
            }
        }
    }

    /// True when any inserted box overlaps `sky_box`.
    pub fn query_intersects(&self, sky_box: &SkyBox) -> bool {
        self.candidates(sky_box)
            .into_iter()
            .any(|slot| self.entries[slot].sky_box.overlaps(sky_box))
    }

    /// Identifiers of all inserted boxes overlapping `sky_box`, in insertion order.
    pub fn query(&self, sky_box: &SkyBox) -> Vec<usize> {
        self.candidates(sky_box)
            .into_iter()
            .filter(|&slot| self.entries[slot].sky_box.overlaps(sky_box))
            .map(|slot| self.entries[slot].id)
            .collect()
    }

    /// Sorted, deduplicated entry slots that may overlap the query box
    fn candidates(&self, sky_box: &SkyBox) -> Vec<usize> {
        let spans: Vec<CellSpan> = sky_box.rects().iter().map(|r| self.span_of(r)).collect();

        // A query covering more cells than there are entries is cheaper as a scan
        let covered = total_cells(&spans);
        if covered > MAX_CELLS_PER_BOX.max(self.entries.len()) {
            return (0..self.entries.len()).collect();
        }

        let mut slots: Vec<usize> = self.oversized.clone();
        for span in &spans {
            for cell in span.cells() {
                if let Some(bucket) = self.cells.get(&cell) {
                    slots.extend_from_slice(bucket);
                }
            }
        }
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    fn span_of(&self, rect: &PlanarRect) -> CellSpan {
        CellSpan {
            ra_lo: self.ra_cell(rect.ra_lo),
            ra_hi: self.ra_cell(rect.ra_hi),
            dec_lo: self.dec_cell(rect.dec_lo),
            dec_hi: self.dec_cell(rect.dec_hi),
        }
    }

    fn ra_cell(&self, ra: f64) -> usize {
        ((ra / self.cell_size).floor().max(0.0) as usize).min(self.ra_cells - 1)
    }

    fn dec_cell(&self, dec: f64) -> usize {
        (((dec + 90.0) / self.cell_size).floor().max(0.0) as usize).min(self.dec_cells - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::RaConvention;

    fn sky_box(ra_min: f64, ra_max: f64, dec_min: f64, dec_max: f64) -> SkyBox {
        SkyBox::from_bounds(ra_min, ra_max, dec_min, dec_max, RaConvention::Ordered).unwrap()
    }

    #[test]
    fn test_invalid_cell_size() {
        assert_eq!(SpatialIndex::new(0.0).unwrap_err(), IndexError::InvalidCellSize(0.0));
        assert!(SpatialIndex::new(-1.0).is_err());
        assert!(SpatialIndex::new(f64::NAN).is_err());
        assert!(SpatialIndex::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_empty_index_has_no_hits() {
        let index = SpatialIndex::new(1.0).unwrap();
        assert!(index.is_empty());
        assert!(!index.query_intersects(&sky_box(0.0, 10.0, 0.0, 10.0)));
        assert!(index.query(&sky_box(0.0, 10.0, 0.0, 10.0)).is_empty());
    }

    #[test]
    fn test_insert_and_query() {
        let mut index = SpatialIndex::new(0.5).unwrap();
        index.insert(7, sky_box(10.0, 11.0, 10.0, 11.0));
        index.insert(3, sky_box(20.0, 21.0, -30.0, -29.0));
        assert_eq!(index.len(), 2);

        assert!(index.query_intersects(&sky_box(10.5, 12.0, 10.5, 12.0)));
        assert_eq!(index.query(&sky_box(10.5, 12.0, 10.5, 12.0)), vec![7]);
        assert_eq!(index.query(&sky_box(20.9, 25.0, -29.5, 0.0)), vec![3]);
        assert!(!index.query_intersects(&sky_box(15.0, 16.0, 10.0, 11.0)));

        // Same cell but disjoint boxes must not report a hit
        assert!(!index.query_intersects(&sky_box(11.2, 11.4, 10.0, 10.4)));
    }

    #[test]
    fn test_edge_contact_counts() {
        let mut index = SpatialIndex::new(1.0).unwrap();
        index.insert(0, sky_box(10.0, 11.0, 0.0, 1.0));
        assert!(index.query_intersects(&sky_box(11.0, 12.0, 1.0, 2.0)));
    }

    #[test]
    fn test_wrapping_box_found_from_both_sides() {
        let mut index = SpatialIndex::new(0.25).unwrap();
        index.insert(1, sky_box(359.0, 1.0, -1.0, 1.0));

        assert!(index.query_intersects(&sky_box(0.5, 0.8, -0.5, 0.5)));
        assert!(index.query_intersects(&sky_box(359.5, 359.6, 0.0, 0.1)));
        assert!(!index.query_intersects(&sky_box(1.5, 2.0, 0.0, 0.1)));
        assert!(!index.query_intersects(&sky_box(358.0, 358.5, 0.0, 0.1)));

        // A wrapping query against a plain box on the east side
        let mut index = SpatialIndex::new(0.25).unwrap();
        index.insert(2, sky_box(0.5, 0.8, -0.5, 0.5));
        assert_eq!(index.query(&sky_box(359.0, 1.0, -1.0, 1.0)), vec![2]);
    }

    #[test]
    fn test_oversized_boxes_still_suppress() {
        let mut index = SpatialIndex::new(0.01).unwrap();
        index.insert(9, sky_box(0.0, 50.0, -40.0, 40.0));
        assert!(index.oversized.contains(&0));
        assert!(index.query_intersects(&sky_box(25.0, 25.001, 0.0, 0.001)));
        assert!(!index.query_intersects(&sky_box(60.0, 60.001, 0.0, 0.001)));
    }

    #[test]
    fn test_large_query_falls_back_to_scan() {
        let mut index = SpatialIndex::new(0.01).unwrap();
        index.insert(4, sky_box(100.0, 100.001, 10.0, 10.001));
        index.insert(5, sky_box(200.0, 200.001, 10.0, 10.001));
        assert_eq!(index.query(&sky_box(90.0, 150.0, 0.0, 20.0)), vec![4]);
    }

    #[test]
    fn test_full_ra_box() {
        let mut index = SpatialIndex::new(30.0).unwrap();
        index.insert(0, sky_box(0.0, 360.0, 80.0, 90.0));
        assert!(index.query_intersects(&sky_box(123.0, 124.0, 85.0, 86.0)));
        assert!(!index.query_intersects(&sky_box(123.0, 124.0, 0.0, 1.0)));
    }

    #[test]
    fn test_coarse_grid_wrapping_box() {
        // Single RA column: both halves of a wrapping box share cells
        let mut index = SpatialIndex::new(360.0).unwrap();
        index.insert(0, sky_box(359.0, 1.0, -1.0, 1.0));
        assert_eq!(index.cells.values().map(Vec::len).max(), Some(1));
        assert_eq!(index.query(&sky_box(0.0, 0.5, 0.0, 0.5)), vec![0]);
    }

    #[test]
    fn test_tiny_cell_size_is_clamped() {
        let mut index = SpatialIndex::new(1e-9).unwrap();
        assert_eq!(index.cell_size(), MIN_CELL_DEG);

        // Hundreds of billions of arcsecond cells: kept in the side list
        index.insert(0, sky_box(10.0, 200.0, -60.0, 60.0));
        assert_eq!(index.oversized, vec![0]);
        assert!(index.cells.is_empty());

        assert!(index.query_intersects(&sky_box(100.0, 100.001, 0.0, 0.001)));
        assert!(!index.query_intersects(&sky_box(300.0, 301.0, 0.0, 1.0)));
        assert_eq!(index.query(&sky_box(0.0, 360.0, -90.0, 90.0)), vec![0]);
    }

    #[test]
    fn test_cell_count_saturates() {
        let span = CellSpan {
            ra_lo: 0,
            ra_hi: usize::MAX - 1,
            dec_lo: 0,
            dec_hi: usize::MAX - 1,
        };
        assert_eq!(span.count(), usize::MAX);
    }
}
