//! Right ascension ranges on the celestial circle.
//!
//! A detection's RA extent is stored as an arc walked eastward from `start`
//! to `end`, both normalized into `[0, 360)`. When `start > end` the arc
//! crosses the 0°/360° meridian and covers `[start, 360) ∪ [0, end]`.

use clap::ValueEnum;
use serde::Serialize;

use super::SkyError;

/// Degrees in one full turn of right ascension
pub const FULL_CIRCLE_DEG: f64 = 360.0;

/// Map any finite right ascension onto `[0, 360)`.
///
/// # Examples
/// ```rust
/// use catalog::sky::normalize_ra;
///
/// assert_eq!(normalize_ra(370.0), 10.0);
/// assert_eq!(normalize_ra(-1.0), 359.0);
/// assert_eq!(normalize_ra(360.0), 0.0);
/// ```
pub fn normalize_ra(ra_deg: f64) -> f64 {
    let wrapped = ra_deg.rem_euclid(FULL_CIRCLE_DEG);
    // rem_euclid can round tiny negatives up to exactly 360.0
    if wrapped >= FULL_CIRCLE_DEG {
        0.0
    } else {
        wrapped
    }
}

/// Smallest angular distance between two right ascensions, in `[0, 180]`.
///
/// # Examples
/// ```rust
/// use catalog::sky::ra_separation;
///
/// assert_eq!(ra_separation(359.0, 1.0), 2.0);
/// assert_eq!(ra_separation(90.0, 270.0), 180.0);
/// ```
pub fn ra_separation(ra1: f64, ra2: f64) -> f64 {
    let delta = (normalize_ra(ra1) - normalize_ra(ra2)).abs();
    delta.min(FULL_CIRCLE_DEG - delta)
}

/// Rule used to decide which arc a pair of RA endpoints describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaConvention {
    /// `ra_min <= ra_max` is an ordinary interval; `ra_min > ra_max` straddles
    /// the meridian and covers `[ra_min, 360) ∪ [0, ra_max]`.
    #[default]
    Ordered,
    /// The extent is the shorter arc between the endpoints, whatever their
    /// order. Use for tables whose endpoints were already swapped into
    /// ascending order upstream, which turns a meridian-straddling box into
    /// one spanning more than 180°.
    ShortestArc,
}

impl std::fmt::Display for RaConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaConvention::Ordered => write!(f, "ordered"),
            RaConvention::ShortestArc => write!(f, "shortest-arc"),
        }
    }
}

/// A closed arc of right ascension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RaRange {
    /// Every right ascension
    Full,
    /// Eastward arc from `start` to `end`, both in `[0, 360)`
    Arc { start: f64, end: f64 },
}

impl RaRange {
    /// Build a range from raw catalog endpoints.
    ///
    /// Endpoints are normalized into `[0, 360)` first. A raw extent of a
    /// full turn or more becomes [`RaRange::Full`].
    ///
    /// # Examples
    /// ```rust
    /// use catalog::sky::{RaConvention, RaRange};
    ///
    /// let wrapped = RaRange::from_endpoints(359.0, 1.0, RaConvention::Ordered).unwrap();
    /// assert!(wrapped.is_wrapping());
    /// assert_eq!(wrapped.span(), 2.0);
    ///
    /// // Endpoints already sorted upstream: recover the short arc
    /// let swapped = RaRange::from_endpoints(1.0, 359.0, RaConvention::ShortestArc).unwrap();
    /// assert_eq!(swapped, wrapped);
    /// ```
    pub fn from_endpoints(
        ra_min: f64,
        ra_max: f64,
        convention: RaConvention,
    ) -> Result<Self, SkyError> {
        if !ra_min.is_finite() {
            return Err(SkyError::NonFinite {
                name: "ra_min",
                value: ra_min,
            });
        }
        if !ra_max.is_finite() {
            return Err(SkyError::NonFinite {
                name: "ra_max",
                value: ra_max,
            });
        }

        let (start, end) = (normalize_ra(ra_min), normalize_ra(ra_max));
        match convention {
            RaConvention::Ordered => {
                if ra_max - ra_min >= FULL_CIRCLE_DEG {
                    return Ok(RaRange::Full);
                }
                Ok(RaRange::Arc { start, end })
            }
            RaConvention::ShortestArc => {
                if (ra_max - ra_min).abs() >= FULL_CIRCLE_DEG {
                    return Ok(RaRange::Full);
                }
                let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                if hi - lo <= FULL_CIRCLE_DEG / 2.0 {
                    Ok(RaRange::Arc { start: lo, end: hi })
                } else {
                    Ok(RaRange::Arc { start: hi, end: lo })
                }
            }
        }
    }

    /// True when the arc crosses the 0°/360° meridian
    pub fn is_wrapping(&self) -> bool {
        matches!(self, RaRange::Arc { start, end } if start > end)
    }

    /// Angular extent of the arc in degrees
    pub fn span(&self) -> f64 {
        match *self {
            RaRange::Full => FULL_CIRCLE_DEG,
            RaRange::Arc { start, end } if start <= end => end - start,
            RaRange::Arc { start, end } => FULL_CIRCLE_DEG - start + end,
        }
    }

    /// Midpoint of the arc, normalized into `[0, 360)`
    pub fn center(&self) -> f64 {
        match *self {
            RaRange::Full => FULL_CIRCLE_DEG / 2.0,
            RaRange::Arc { start, .. } => normalize_ra(start + self.span() / 2.0),
        }
    }

    /// Inclusive membership test under modulo-360 semantics
    pub fn contains(&self, ra: f64) -> bool {
        let ra = normalize_ra(ra);
        match *self {
            RaRange::Full => true,
            RaRange::Arc { start, end } if start <= end => start <= ra && ra <= end,
            RaRange::Arc { start, end } => ra >= start || ra <= end,
        }
    }

    /// Circular intersection test.
    ///
    /// Two arcs share a point exactly when one of them contains the other's
    /// starting endpoint, which holds for wrapping and non-wrapping arcs alike.
    pub fn intersects(&self, other: &RaRange) -> bool {
        match (*self, *other) {
            (RaRange::Full, _) | (_, RaRange::Full) => true,
            (RaRange::Arc { start: a, .. }, RaRange::Arc { start: b, .. }) => {
                self.contains(b) || other.contains(a)
            }
        }
    }

    /// Planar intervals within `[0, 360]` covering this arc.
    ///
    /// Non-wrapping arcs yield one interval; wrapping arcs are split at the
    /// meridian into `[start, 360]` and `[0, end]`.
    pub fn segments(&self) -> Vec<(f64, f64)> {
        match *self {
            RaRange::Full => vec![(0.0, FULL_CIRCLE_DEG)],
            RaRange::Arc { start, end } if start <= end => vec![(start, end)],
            RaRange::Arc { start, end } => vec![(start, FULL_CIRCLE_DEG), (0.0, end)],
        }
    }
}
