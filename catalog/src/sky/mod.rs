//! Celestial coordinate geometry for sky-projected detection boxes.
//!
//! Right ascension is a circular coordinate: 359.9° and 0.1° are neighbours.
//! Everything in this module treats RA as a value on a circle and declination
//! as a plain bounded line, so that overlap tests stay correct for sources
//! sitting on the 0°/360° meridian.

pub mod ra;
pub mod sky_box;

pub use ra::{normalize_ra, ra_separation, RaConvention, RaRange, FULL_CIRCLE_DEG};
pub use sky_box::{PlanarRect, SkyBox};

use thiserror::Error;

/// Errors raised while building sky geometry from raw coordinates
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkyError {
    #[error("Coordinate {name} is not finite: {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("Declination {0} is outside [-90, 90] degrees")]
    DeclinationOutOfRange(f64),
}
