//! Scattering phase functions.

use crate::scattered::ScatteredRays;
use base::math::{DVec3, Onb, Ray, NEAR_ZERO};
use rand::RngCore;
use std::f64::consts::TAU;

/// Geometric description of a ray hitting a surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceInteraction {
    /// The incident ray.
    pub ray: Ray,
    /// Point of intersection.
    pub point: DVec3,
    /// Shading basis at the point; `w` is the surface normal.
    pub onb: Onb,
}

impl SurfaceInteraction {
    /// Interaction at `point` with the canonical basis (normal along +z).
    pub fn new(ray: Ray, point: DVec3) -> Self {
        Self {
            ray,
            point,
            onb: Onb::default(),
        }
    }

    /// Returns the basis facing the side the ray arrives from.
    pub fn facing_onb(&self) -> Onb {
        if self.ray.dir.dot(self.onb.w) > NEAR_ZERO {
            self.onb.flipped()
        } else {
            self.onb
        }
    }
}

/// Function mapping an incident ray to a set of outgoing rays with their
/// weights.
pub trait ScatteringPhaseFunction: Send + Sync {
    /// Scatters the incident ray, appending the outgoing rays to `scattered`.
    fn scatter(
        &self,
        isect: &SurfaceInteraction,
        rng: &mut dyn RngCore,
        scattered: &mut ScatteredRays,
    );

    /// Scatters the incident ray at a single wavelength.
    fn scatter_nm(
        &self,
        isect: &SurfaceInteraction,
        rng: &mut dyn RngCore,
        nm: f64,
        scattered: &mut ScatteredRays,
    );
}

/// Cosine-weighted direction about `onb.w` from two canonical numbers.
pub fn diffuse_direction(onb: &Onb, u: f64, v: f64) -> DVec3 {
    let phi = TAU * u;
    let sin_theta = v.sqrt();
    let cos_theta = (1.0 - v).sqrt();
    onb.to_world(DVec3::new(
        phi.cos() * sin_theta,
        phi.sin() * sin_theta,
        cos_theta,
    ))
}
