//! Sky-projected bounding boxes for astronomical source detections.
//!
//! A detection found in pixel space is projected through the image's world
//! coordinate system into a rectangle in (RA, Dec). This module provides the
//! box type the deduplication pipeline works with and the overlap predicate
//! that decides whether two detections describe the same patch of sky.
//!
//! # Key Features
//!
//! - **Meridian-aware overlap**: RA extents are circular arcs, so boxes
//!   straddling 0°/360° overlap their neighbours on both sides
//! - **Inclusive bounds**: Boxes that merely touch are treated as overlapping
//! - **Planar decomposition**: Each box splits into at most two ordinary
//!   rectangles for grid-based indexing
//!
//! # Examples
//!
//! ```rust
//! use catalog::sky::{RaConvention, SkyBox};
//!
//! // A source straddling the meridian and a compact source just east of it
//! let wide = SkyBox::from_bounds(359.0, 1.0, -1.0, 1.0, RaConvention::Ordered).unwrap();
//! let compact = SkyBox::from_bounds(0.5, 0.8, -0.5, 0.5, RaConvention::Ordered).unwrap();
//! let distant = SkyBox::from_bounds(180.0, 181.0, -0.5, 0.5, RaConvention::Ordered).unwrap();
//!
//! assert!(wide.overlaps(&compact));
//! assert!(!wide.overlaps(&distant));
//! assert_eq!(wide.rects().len(), 2);
//! ```

use super::ra::{RaConvention, RaRange};
use super::SkyError;

/// Rectangle in the (RA, Dec) plane with RA confined to `[0, 360]`.
///
/// Produced by [`SkyBox::rects`]; never wraps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarRect {
    pub ra_lo: f64,
    pub ra_hi: f64,
    pub dec_lo: f64,
    pub dec_hi: f64,
}

impl PlanarRect {
    /// Inclusive planar intersection test
    pub fn overlaps(&self, other: &Self) -> bool {
        self.ra_lo <= other.ra_hi
            && self.ra_hi >= other.ra_lo
            && self.dec_lo <= other.dec_hi
            && self.dec_hi >= other.dec_lo
    }
}

/// Bounding box of a detection in celestial coordinates.
///
/// # Coordinate System
/// - **RA**: circular arc in degrees, see [`RaRange`]
/// - **Dec**: closed interval in degrees within `[-90, 90]`, `dec_min <= dec_max`
/// - **Bounds**: inclusive on every side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyBox {
    /// Right ascension extent
    pub ra: RaRange,
    /// Southern edge (degrees, inclusive)
    pub dec_min: f64,
    /// Northern edge (degrees, inclusive)
    pub dec_max: f64,
}

impl SkyBox {
    /// Create a box from raw catalog bounds.
    ///
    /// RA endpoints are interpreted under `convention`. Declination bounds
    /// given in reverse order are swapped, since declination does not wrap.
    ///
    /// # Errors
    /// * `SkyError::NonFinite` - any bound is NaN or infinite
    /// * `SkyError::DeclinationOutOfRange` - a Dec bound lies beyond a pole
    ///
    /// # Examples
    /// ```rust
    /// use catalog::sky::{RaConvention, SkyBox};
    ///
    /// let sky_box = SkyBox::from_bounds(10.0, 10.5, 2.0, -2.0, RaConvention::Ordered).unwrap();
    /// assert_eq!(sky_box.dec_min, -2.0);
    /// assert_eq!(sky_box.dec_max, 2.0);
    /// ```
    pub fn from_bounds(
        ra_min: f64,
        ra_max: f64,
        dec_min: f64,
        dec_max: f64,
        convention: RaConvention,
    ) -> Result<Self, SkyError> {
        let ra = RaRange::from_endpoints(ra_min, ra_max, convention)?;

        for (name, value) in [("dec_min", dec_min), ("dec_max", dec_max)] {
            if !value.is_finite() {
                return Err(SkyError::NonFinite { name, value });
            }
            if !(-90.0..=90.0).contains(&value) {
                return Err(SkyError::DeclinationOutOfRange(value));
            }
        }

        let (dec_min, dec_max) = if dec_min <= dec_max {
            (dec_min, dec_max)
        } else {
            (dec_max, dec_min)
        };

        Ok(Self {
            ra,
            dec_min,
            dec_max,
        })
    }

    /// Check if this box overlaps another on the sky.
    ///
    /// Declination ranges must intersect as ordinary intervals and RA ranges
    /// must intersect as circular arcs. Edge contact counts as overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.dec_min <= other.dec_max
            && self.dec_max >= other.dec_min
            && self.ra.intersects(&other.ra)
    }

    /// Check if the point (ra, dec) lies inside the box, bounds included
    pub fn contains_point(&self, ra: f64, dec: f64) -> bool {
        dec >= self.dec_min && dec <= self.dec_max && self.ra.contains(ra)
    }

    /// RA extent in degrees of arc along the RA axis
    pub fn ra_span(&self) -> f64 {
        self.ra.span()
    }

    /// Dec extent in degrees
    pub fn dec_span(&self) -> f64 {
        self.dec_max - self.dec_min
    }

    /// Larger of the two extents, used to size index cells
    pub fn extent(&self) -> f64 {
        self.ra_span().max(self.dec_span())
    }

    /// Center as (ra, dec), with RA taken along the arc
    pub fn center(&self) -> (f64, f64) {
        (self.ra.center(), (self.dec_min + self.dec_max) / 2.0)
    }

    /// Split the box into one or two non-wrapping rectangles.
    ///
    /// A box whose RA arc crosses the meridian yields two rectangles sharing
    /// the same Dec bounds; every other box yields one.
    pub fn rects(&self) -> Vec<PlanarRect> {
        self.ra
            .segments()
            .into_iter()
            .map(|(ra_lo, ra_hi)| PlanarRect {
                ra_lo,
                ra_hi,
                dec_lo: self.dec_min,
                dec_hi: self.dec_max,
            })
            .collect()
    }
}
