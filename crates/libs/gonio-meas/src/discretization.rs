//! Ring boundary policies shared by every ring-based detector.
//!
//! A hemisphere is cut into `n` rings of elevation covering `[0, pi/2]`.
//! Each policy is a [`RingScheme`]; [`PatchDiscretization`] is the
//! serializable selector that hands out the matching scheme.

use serde::{Deserialize, Serialize};
use std::{
    f64::consts::{FRAC_PI_2, PI},
    fmt::{Display, Formatter},
};

/// How ring boundaries are placed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchDiscretization {
    /// Uniform angular step.
    EqualAngles,
    /// Rings of equal area on the sphere.
    EqualAreas,
    /// Solid angle grows from the specimen plane towards the pole.
    ExponentialSolidAngle,
    /// Every ring has the same projected solid angle.
    #[default]
    EqualPsa,
}

impl PatchDiscretization {
    /// Returns the boundary policy.
    pub fn scheme(&self) -> &'static dyn RingScheme {
        match self {
            PatchDiscretization::EqualAngles => &EqualAngles,
            PatchDiscretization::EqualAreas => &EqualAreas,
            PatchDiscretization::ExponentialSolidAngle => &ExponentialSolidAngle,
            PatchDiscretization::EqualPsa => &EqualPsa,
        }
    }

    /// Returns whether every patch carries the same projected solid angle.
    pub fn is_psa(&self) -> bool { matches!(self, PatchDiscretization::EqualPsa) }
}

impl Display for PatchDiscretization {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchDiscretization::EqualAngles => write!(f, "equal angles"),
            PatchDiscretization::EqualAreas => write!(f, "equal areas"),
            PatchDiscretization::ExponentialSolidAngle => {
                write!(f, "exponentially increasing solid angle")
            },
            PatchDiscretization::EqualPsa => write!(f, "equal projected solid angle"),
        }
    }
}

/// Placement of ring boundaries in elevation.
pub trait RingScheme: Sync {
    /// Returns `(begin, end)` of ring `i` among `n` rings, with
    /// `begin < end`, both in `[0, pi/2]`.
    fn ring(&self, i: usize, n: usize) -> (f64, f64);

    /// Projected solid angle of a full ring when the scheme makes it the
    /// same for every ring.
    fn uniform_ring_psa(&self, _n: usize) -> Option<f64> { None }

    /// Boundaries of all `n` rings.
    fn rings(&self, n: usize) -> Vec<(f64, f64)> { (0..n).map(|i| self.ring(i, n)).collect() }
}

/// Uniform angular step.
#[derive(Debug, Copy, Clone)]
pub struct EqualAngles;

impl RingScheme for EqualAngles {
    fn ring(&self, i: usize, n: usize) -> (f64, f64) {
        let n = n as f64;
        (FRAC_PI_2 * i as f64 / n, FRAC_PI_2 * (i + 1) as f64 / n)
    }
}

/// Boundaries at `asin(i/n)`.
#[derive(Debug, Copy, Clone)]
pub struct EqualAreas;

impl RingScheme for EqualAreas {
    fn ring(&self, i: usize, n: usize) -> (f64, f64) {
        let n = n as f64;
        ((i as f64 / n).asin(), ((i + 1) as f64 / n).asin())
    }
}

/// Boundaries at `acos(i/n)`; ring 0 touches the pole.
#[derive(Debug, Copy, Clone)]
pub struct ExponentialSolidAngle;

impl RingScheme for ExponentialSolidAngle {
    fn ring(&self, i: usize, n: usize) -> (f64, f64) {
        let n = n as f64;
        (((i + 1) as f64 / n).acos(), (i as f64 / n).acos())
    }
}

/// Boundaries chosen so that `cos²θb − cos²θe = 1/n` for every ring.
#[derive(Debug, Copy, Clone)]
pub struct EqualPsa;

impl EqualPsa {
    /// Boundary `k` satisfies `cos²θ = 1 − k/n`; the last one is exactly the
    /// pole.
    fn boundary(k: usize, n: usize) -> f64 {
        if k >= n {
            FRAC_PI_2
        } else {
            (1.0 - k as f64 / n as f64).sqrt().acos()
        }
    }
}

impl RingScheme for EqualPsa {
    fn ring(&self, i: usize, n: usize) -> (f64, f64) {
        (Self::boundary(i, n), Self::boundary(i + 1, n))
    }

    fn uniform_ring_psa(&self, n: usize) -> Option<f64> { Some(PI / n as f64) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::projected_solid_angle;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::f64::consts::TAU;

    const ALL: [PatchDiscretization; 4] = [
        PatchDiscretization::EqualAngles,
        PatchDiscretization::EqualAreas,
        PatchDiscretization::ExponentialSolidAngle,
        PatchDiscretization::EqualPsa,
    ];

    #[test]
    fn test_equal_psa_rings_have_equal_projected_solid_angle() {
        let rings = EqualPsa.rings(7);
        for (b, e) in rings {
            assert_abs_diff_eq!(projected_solid_angle(b, e, TAU), PI / 7.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_equal_areas_rings_have_equal_area() {
        // Band area in elevation is proportional to sin(e) - sin(b).
        for (b, e) in EqualAreas.rings(5) {
            assert_abs_diff_eq!(e.sin() - b.sin(), 0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_serde_names() {
        let s = serde_yaml::to_string(&PatchDiscretization::ExponentialSolidAngle).unwrap();
        assert_eq!(s.trim(), "exponential-solid-angle");
        let d: PatchDiscretization = serde_yaml::from_str("equal-psa").unwrap();
        assert_eq!(d, PatchDiscretization::EqualPsa);
    }

    proptest! {
        #[test]
        fn test_rings_tile_quarter_circle(n in 1usize..64, k in 0usize..4) {
            let mut rings = ALL[k].scheme().rings(n);
            rings.sort_by(|a, b| a.0.total_cmp(&b.0));
            prop_assert!(rings[0].0.abs() < 1e-12);
            prop_assert!((rings[n - 1].1 - FRAC_PI_2).abs() < 1e-12);
            for w in rings.windows(2) {
                prop_assert!(w[0].0 < w[0].1);
                prop_assert!((w[0].1 - w[1].0).abs() < 1e-12);
            }
        }
    }
}
