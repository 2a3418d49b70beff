//! Angular patches of a detector sphere.

use base::color::Radiometric;
use serde::{Deserialize, Serialize};

/// Region of the detector sphere bounded in polar and azimuthal angle.
///
/// Angles are expressed in the detector frame: in the top hemisphere
/// `theta` is the elevation above the specimen plane; the bottom hemisphere
/// mirrors it to `pi - theta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngularPatch<P = f64> {
    /// Lower polar bound (radians).
    pub theta_begin: f64,
    /// Upper polar bound (radians).
    pub theta_end: f64,
    /// Lower azimuthal bound (radians).
    pub phi_begin: f64,
    /// Upper azimuthal bound (radians).
    pub phi_end: f64,
    /// Power accumulated during the current measurement pass.
    pub power: P,
    /// Accumulated power divided by incident power times projected solid
    /// angle; set by normalization.
    pub ratio: P,
    /// Projected solid angle of the patch.
    pub solid_projected_angle: f64,
    /// Area of the patch on the detector sphere.
    pub area: f64,
    /// Mean absolute cosine of the polar bounds.
    pub cos_theta_mean: f64,
    /// Expected ratio used when validating a measurement against a known
    /// distribution; zero when unknown.
    pub known_value: f64,
}

impl<P: Radiometric> AngularPatch<P> {
    /// Creates an empty patch with the given bounds.
    pub fn new(theta: (f64, f64), phi: (f64, f64)) -> Self {
        Self {
            theta_begin: theta.0,
            theta_end: theta.1,
            phi_begin: phi.0,
            phi_end: phi.1,
            power: P::default(),
            ratio: P::default(),
            solid_projected_angle: 0.0,
            area: 0.0,
            cos_theta_mean: 0.0,
            known_value: 0.0,
        }
    }

    /// Returns whether the direction lies inside the patch, bounds included.
    pub fn contains(&self, theta: f64, phi: f64) -> bool {
        self.theta_begin <= theta
            && theta <= self.theta_end
            && self.phi_begin <= phi
            && phi <= self.phi_end
    }

    /// Azimuthal extent of the patch.
    pub fn delta_phi(&self) -> f64 { self.phi_end - self.phi_begin }

    /// Adds power to the patch.
    #[inline]
    pub fn deposit(&mut self, power: P) { self.power += power; }

    /// Clears the accumulated power and the ratio.
    pub fn clear(&mut self) {
        self.power = P::default();
        self.ratio = P::default();
    }
}

/// Projected solid angle `0.5·Δφ·(cos²θb − cos²θe)` of a patch whose polar
/// bounds are measured from the specimen plane.
pub fn projected_solid_angle(theta_begin: f64, theta_end: f64, delta_phi: f64) -> f64 {
    // cos²b − cos²e = sin(e − b)·sin(e + b), exact for narrow patches.
    0.5 * delta_phi * (theta_end - theta_begin).sin() * (theta_end + theta_begin).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    #[test]
    fn test_projected_solid_angle_of_hemisphere() {
        assert_abs_diff_eq!(projected_solid_angle(0.0, FRAC_PI_2, TAU), PI, epsilon = 1e-12);
        // Splitting the band does not change the total.
        let a = projected_solid_angle(0.0, 0.3, TAU);
        let b = projected_solid_angle(0.3, FRAC_PI_2, TAU);
        assert_abs_diff_eq!(a + b, PI, epsilon = 1e-12);
    }

    #[test]
    fn test_projected_solid_angle_of_narrow_patches() {
        // Close to the specimen plane cos² is within an ulp of one.
        let psa = projected_solid_angle(1e-9, 1e-9 + 4e-12, 4e-12);
        assert!(psa > 0.0);
        assert_abs_diff_eq!(psa, 0.5 * 4e-12 * 4e-12 * 2e-9, epsilon = 1e-33);
        let psa = projected_solid_angle(0.7, 0.7 + 2e-12, 2e-12);
        assert_abs_diff_eq!(psa / (0.5 * 4e-24 * 1.4f64.sin()), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_patch_deposit_and_clear() {
        let mut patch = AngularPatch::<f64>::new((0.0, 0.5), (0.0, 1.0));
        assert!(patch.contains(0.0, 0.0));
        assert!(patch.contains(0.5, 1.0));
        assert!(!patch.contains(0.6, 0.5));
        patch.deposit(0.25);
        patch.deposit(0.5);
        assert_eq!(patch.power, 0.75);
        patch.clear();
        assert_eq!(patch.power, 0.0);
        assert_eq!(patch.delta_phi(), 1.0);
    }
}
