use crate::{
    reflectance::Reflectance,
    scattered::{ScatteredRay, ScatteredRayKind, ScatteredRays},
    spf::{diffuse_direction, ScatteringPhaseFunction, SurfaceInteraction},
    Material,
};
use base::{
    math::{reflect, DVec3, Onb, Ray},
    random::canonical,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Isotropic Phong model: a diffuse lobe plus a glossy lobe around the mirror
/// direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotropicPhong {
    /// Diffuse reflectance.
    pub diffuse: Reflectance,
    /// Specular reflectance.
    pub specular: Reflectance,
    /// Phong exponent; larger values give a narrower lobe.
    pub exponent: f64,
}

impl IsotropicPhong {
    /// Creates a Phong surface.
    pub fn new(diffuse: Reflectance, specular: Reflectance, exponent: f64) -> Self {
        Self {
            diffuse,
            specular,
            exponent,
        }
    }

    /// Returns the diffuse and the specular rays.
    fn rays(&self, isect: &SurfaceInteraction, rng: &mut dyn RngCore) -> (Ray, Ray) {
        let n = isect.facing_onb().w;
        let mirror = reflect(isect.ray.dir, n);

        let diffuse = diffuse_direction(&isect.facing_onb(), canonical(rng), canonical(rng));

        let cos_alpha = canonical(rng).powf(1.0 / (self.exponent + 1.0));
        let sin_alpha = (1.0 - cos_alpha * cos_alpha).max(0.0).sqrt();
        let beta = TAU * canonical(rng);
        let glossy = Onb::from_w(mirror).to_world(DVec3::new(
            sin_alpha * beta.cos(),
            sin_alpha * beta.sin(),
            cos_alpha,
        ));

        (Ray::new(isect.point, diffuse), Ray::new(isect.point, glossy))
    }
}

impl ScatteringPhaseFunction for IsotropicPhong {
    fn scatter(
        &self,
        isect: &SurfaceInteraction,
        rng: &mut dyn RngCore,
        scattered: &mut ScatteredRays,
    ) {
        let (diffuse, glossy) = self.rays(isect, rng);
        scattered.push(ScatteredRay::new(
            glossy,
            self.specular.rgb(),
            ScatteredRayKind::Reflection,
        ));
        scattered.push(ScatteredRay::new(
            diffuse,
            self.diffuse.rgb(),
            ScatteredRayKind::Diffuse,
        ));
    }

    fn scatter_nm(
        &self,
        isect: &SurfaceInteraction,
        rng: &mut dyn RngCore,
        nm: f64,
        scattered: &mut ScatteredRays,
    ) {
        let (diffuse, glossy) = self.rays(isect, rng);
        scattered.push(ScatteredRay::spectral(
            glossy,
            self.specular.at_nm(nm),
            ScatteredRayKind::Reflection,
        ));
        scattered.push(ScatteredRay::spectral(
            diffuse,
            self.diffuse.at_nm(nm),
            ScatteredRayKind::Diffuse,
        ));
    }
}

impl Material for IsotropicPhong {
    fn spf(&self) -> Option<&dyn ScatteringPhaseFunction> { Some(self) }
}
