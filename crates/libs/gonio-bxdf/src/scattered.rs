//! Rays leaving a surface after an interaction.

use base::{
    color::{Radiometric, Rgb},
    math::{Ray, NEAR_ZERO},
};

/// Maximum number of rays a single interaction may produce.
pub const MAX_SCATTERED_RAYS: usize = 6;

/// Kind of the scattering event that produced a ray.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScatteredRayKind {
    /// Diffuse reflection.
    Diffuse,
    /// Specular or glossy reflection.
    Reflection,
    /// Refraction through the surface.
    Refraction,
    /// Diffuse transmission.
    Translucent,
}

/// A ray leaving the surface together with its weight.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScatteredRay {
    /// The outgoing ray.
    pub ray: Ray,
    /// Reflectance (or transmittance) carried by the ray.
    pub kray: Rgb,
    /// Reflectance at the wavelength of a spectral interaction.
    pub kray_nm: f64,
    /// Kind of the scattering event.
    pub kind: ScatteredRayKind,
}

impl ScatteredRay {
    /// Creates a ray carrying an RGB weight.
    pub fn new(ray: Ray, kray: Rgb, kind: ScatteredRayKind) -> Self {
        Self {
            ray,
            kray,
            kray_nm: 0.0,
            kind,
        }
    }

    /// Creates a ray carrying a single-wavelength weight.
    pub fn spectral(ray: Ray, kray_nm: f64, kind: ScatteredRayKind) -> Self {
        Self {
            ray,
            kray: Rgb::default(),
            kray_nm,
            kind,
        }
    }

    /// Weight used when choosing between rays and when depositing power.
    pub fn weight(&self, spectral: bool) -> f64 {
        if spectral {
            self.kray_nm
        } else {
            self.kray.max_value()
        }
    }
}

/// Bounded set of rays produced by one interaction.
#[derive(Debug, Clone)]
pub struct ScatteredRays {
    rays: Vec<ScatteredRay>,
}

impl Default for ScatteredRays {
    fn default() -> Self { Self::new() }
}

impl ScatteredRays {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            rays: Vec::with_capacity(MAX_SCATTERED_RAYS),
        }
    }

    /// Adds a ray. Returns `false` and discards the ray when the container is
    /// already full.
    pub fn push(&mut self, ray: ScatteredRay) -> bool {
        if self.rays.len() >= MAX_SCATTERED_RAYS {
            log::trace!("Scattered ray container full, discarding {:?}", ray.kind);
            return false;
        }
        self.rays.push(ray);
        true
    }

    /// Removes every ray, keeping the allocation.
    pub fn clear(&mut self) { self.rays.clear(); }

    /// Number of rays held.
    pub fn len(&self) -> usize { self.rays.len() }

    /// Returns whether the container is empty.
    pub fn is_empty(&self) -> bool { self.rays.is_empty() }

    /// Iterates over the rays.
    pub fn iter(&self) -> impl Iterator<Item = &ScatteredRay> { self.rays.iter() }

    /// Picks exactly one ray, or none to signal absorption.
    ///
    /// A single ray is always returned as is. With several rays, each is
    /// chosen with probability proportional to its weight (the largest RGB
    /// channel, or the spectral weight when `spectral` is set); when the
    /// weights sum to (nearly) zero the interaction is treated as absorbed.
    ///
    /// # Arguments
    ///
    /// * `u` - canonical random number in `[0, 1)`.
    /// * `spectral` - whether to use the spectral weights.
    pub fn random_select(&self, u: f64, spectral: bool) -> Option<&ScatteredRay> {
        match self.rays.len() {
            0 => None,
            1 => self.rays.first(),
            _ => {
                let total: f64 = self.rays.iter().map(|r| r.weight(spectral)).sum();
                if total <= NEAR_ZERO {
                    return None;
                }
                let mut cdf = 0.0;
                self.rays.iter().find(|r| {
                    cdf += r.weight(spectral);
                    u < cdf / total
                })
            },
        }
    }
}
