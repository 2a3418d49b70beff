//! # gonio-base
//! Base library for gonio.
//! Contains the math, colour, error and random number utilities shared by the
//! scattering and measurement crates.
#![warn(missing_docs)]

pub mod color;
pub mod error;
pub mod math;
pub mod random;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Half of the sphere surrounding a specimen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    /// Hemisphere on the side of the surface normal.
    Top,
    /// Hemisphere below the surface.
    Bottom,
}

impl Hemisphere {
    /// Returns whether it's the top hemisphere.
    pub const fn is_top(&self) -> bool { matches!(self, Self::Top) }

    /// Returns whether it's the bottom hemisphere.
    pub const fn is_bottom(&self) -> bool { matches!(self, Self::Bottom) }
}

impl Display for Hemisphere {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Hemisphere::Top => write!(f, "Top hemisphere"),
            Hemisphere::Bottom => write!(f, "Bottom hemisphere"),
        }
    }
}
