//! Math utilities.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

pub use glam::*;
use num_traits::Float;

/// Tolerance below which a quantity is considered to be zero.
pub const NEAR_ZERO: f64 = 1e-12;

/// Returns the square of the given value.
#[inline(always)]
pub fn sqr<F: Float>(x: F) -> F { x * x }

/// Spherical coordinate (unit radius) in radians.
#[derive(Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sph2 {
    /// Polar angle measured from the positive z-axis, in `[0, pi]`.
    pub theta: f64,
    /// Azimuthal angle measured from the positive x-axis, in `[0, 2pi]`.
    pub phi: f64,
}

impl Sph2 {
    /// Creates a new spherical coordinate.
    pub const fn new(theta: f64, phi: f64) -> Self { Self { theta, phi } }

    /// Converts to a unit vector.
    pub fn to_cartesian(&self) -> DVec3 { sph_to_cart(self.theta, self.phi) }

    /// Converts a point to spherical coordinates.
    ///
    /// Points on the z-axis have no defined azimuth and yield `None`. The
    /// polar and azimuthal cosines are scaled slightly towards zero before the
    /// `acos` so that points lying exactly on the poles or on the x-axis do not
    /// fall outside the domain of the inverse cosine.
    pub fn from_cartesian(p: DVec3) -> Option<Self> {
        if p.x == 0.0 && p.y == 0.0 {
            return None;
        }
        let r = p.length();
        let theta = (0.9999999999 * p.z / r).acos();
        let cos_phi = (p.x / (r * 1.0000000001 * theta.sin())).clamp(-1.0, 1.0);
        let phi = if p.y < 0.0 {
            std::f64::consts::TAU - cos_phi.acos()
        } else {
            cos_phi.acos()
        };
        Some(Self { theta, phi })
    }
}

impl Debug for Sph2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(θ: {}, φ: {})", self.theta, self.phi)
    }
}

impl Display for Sph2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(θ: {:.4}°, φ: {:.4}°)",
            self.theta.to_degrees(),
            self.phi.to_degrees()
        )
    }
}

/// Conversion from spherical coordinate system to cartesian coordinate system.
pub fn sph_to_cart(theta: f64, phi: f64) -> DVec3 {
    DVec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
}

/// Reflects the direction `d` about the normal `n`.
#[inline]
pub fn reflect(d: DVec3, n: DVec3) -> DVec3 { d - 2.0 * d.dot(n) * n }

/// Ray with an origin and a direction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    /// Origin of the ray.
    pub org: DVec3,
    /// Direction of the ray.
    pub dir: DVec3,
}

impl Ray {
    /// Creates a new ray.
    pub fn new(org: DVec3, dir: DVec3) -> Self { Self { org, dir } }

    /// Creates a ray starting at `from` heading towards `to`, or `None` when
    /// the two points coincide.
    pub fn towards(from: DVec3, to: DVec3) -> Option<Self> {
        (to - from)
            .try_normalize()
            .map(|dir| Self { org: from, dir })
    }

    /// Returns the point at distance `t` along the ray.
    pub fn at(&self, t: f64) -> DVec3 { self.org + t * self.dir }
}

/// Right-handed orthonormal basis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Onb {
    /// First tangent.
    pub u: DVec3,
    /// Second tangent.
    pub v: DVec3,
    /// Normal.
    pub w: DVec3,
}

impl Default for Onb {
    fn default() -> Self {
        Self {
            u: DVec3::X,
            v: DVec3::Y,
            w: DVec3::Z,
        }
    }
}

impl Onb {
    /// Builds a basis whose `w` axis is the given direction.
    pub fn from_w(w: DVec3) -> Self {
        let w = w.normalize();
        let a = if w.x.abs() > 0.9 { DVec3::Y } else { DVec3::X };
        let v = w.cross(a).normalize();
        let u = v.cross(w);
        Self { u, v, w }
    }

    /// Returns the basis with `w` (and `v`, to stay right-handed) flipped.
    pub fn flipped(&self) -> Self {
        Self {
            u: self.u,
            v: -self.v,
            w: -self.w,
        }
    }

    /// Transforms a vector expressed in this basis to world space.
    pub fn to_world(&self, local: DVec3) -> DVec3 {
        self.u * local.x + self.v * local.y + self.w * local.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    #[test]
    fn test_ray_towards_coincident_points() {
        let p = DVec3::new(0.5, -1.0, 2.0);
        assert!(Ray::towards(p, p).is_none());
        let ray = Ray::towards(p, DVec3::new(0.5, -1.0, 0.0)).unwrap();
        assert_eq!(ray.dir, DVec3::NEG_Z);
        assert_eq!(ray.org, p);
    }

    #[test]
    fn test_sph2_from_cartesian_axes() {
        let sph = Sph2::from_cartesian(DVec3::X).unwrap();
        assert_abs_diff_eq!(sph.theta, FRAC_PI_2, epsilon = 1e-6);
        assert_abs_diff_eq!(sph.phi, 0.0, epsilon = 1e-4);

        let sph = Sph2::from_cartesian(-DVec3::Y).unwrap();
        assert_abs_diff_eq!(sph.phi, 1.5 * PI, epsilon = 1e-6);

        assert!(Sph2::from_cartesian(DVec3::Z).is_none());
        assert!(Sph2::from_cartesian(-DVec3::Z * 3.0).is_none());
    }

    #[test]
    fn test_onb_from_w() {
        for w in [DVec3::X, DVec3::Y, DVec3::Z, DVec3::new(1.0, 2.0, -3.0)] {
            let onb = Onb::from_w(w);
            assert_abs_diff_eq!(onb.u.dot(onb.v), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(onb.u.dot(onb.w), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(onb.u.cross(onb.v).dot(onb.w), 1.0, epsilon = 1e-12);
            let flipped = onb.flipped();
            assert_abs_diff_eq!(flipped.u.cross(flipped.v).dot(flipped.w), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reflect() {
        let d = DVec3::new(1.0, 0.0, -1.0).normalize();
        let r = reflect(d, DVec3::Z);
        assert_abs_diff_eq!(r.x, d.x, epsilon = 1e-12);
        assert_abs_diff_eq!(r.z, -d.z, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn test_sph2_round_trip(theta in 0.01f64..(PI - 0.01), phi in 0.0f64..TAU) {
            let p = sph_to_cart(theta, phi) * 2.5;
            let sph = Sph2::from_cartesian(p).unwrap();
            prop_assert!((sph.theta - theta).abs() < 1e-6);
            let dphi = (sph.phi - phi).abs();
            prop_assert!(dphi < 1e-4 || (TAU - dphi) < 1e-4);
        }
    }
}
