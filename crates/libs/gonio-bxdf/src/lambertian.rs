use crate::{
    reflectance::Reflectance,
    scattered::{ScatteredRay, ScatteredRayKind, ScatteredRays},
    spf::{diffuse_direction, ScatteringPhaseFunction, SurfaceInteraction},
    Material,
};
use base::{math::Ray, random::canonical};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Perfectly diffuse reflector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lambertian {
    /// Albedo of the surface.
    pub reflectance: Reflectance,
}

impl Lambertian {
    /// Creates a Lambertian surface.
    pub fn new(reflectance: Reflectance) -> Self { Self { reflectance } }

    fn diffuse_ray(&self, isect: &SurfaceInteraction, rng: &mut dyn RngCore) -> Ray {
        let onb = isect.facing_onb();
        let dir = diffuse_direction(&onb, canonical(rng), canonical(rng));
        Ray::new(isect.point, dir)
    }
}

impl ScatteringPhaseFunction for Lambertian {
    fn scatter(
        &self,
        isect: &SurfaceInteraction,
        rng: &mut dyn RngCore,
        scattered: &mut ScatteredRays,
    ) {
        let ray = self.diffuse_ray(isect, rng);
        scattered.push(ScatteredRay::new(
            ray,
            self.reflectance.rgb(),
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
        let ray = self.diffuse_ray(isect, rng);
        scattered.push(ScatteredRay::spectral(
            ray,
            self.reflectance.at_nm(nm),
            ScatteredRayKind::Diffuse,
        ));
    }
}

impl Material for Lambertian {
    fn spf(&self) -> Option<&dyn ScatteringPhaseFunction> { Some(self) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base::{
        color::Rgb,
        math::{DVec3, Ray},
        random::seeded_rng,
    };

    #[test]
    fn test_lambertian_scatters_into_upper_hemisphere() {
        let spf = Lambertian::new(Reflectance::Rgb(Rgb::new(0.8, 0.5, 0.2)));
        let isect = SurfaceInteraction::new(
            Ray::towards(DVec3::new(1.0, 0.0, 1.0), DVec3::ZERO).unwrap(),
            DVec3::ZERO,
        );
        let mut rng = seeded_rng(7, 0);
        let mut rays = ScatteredRays::new();
        let mut mean_cos = 0.0;
        let n = 20000;
        for _ in 0..n {
            rays.clear();
            spf.scatter(&isect, &mut rng, &mut rays);
            assert_eq!(rays.len(), 1);
            let r = rays.random_select(0.5, false).unwrap();
            assert!(r.ray.dir.z >= 0.0);
            assert_eq!(r.kray, Rgb::new(0.8, 0.5, 0.2));
            mean_cos += r.ray.dir.z;
        }
        // E[cos θ] of a cosine-weighted lobe is 2/3.
        mean_cos /= n as f64;
        assert!((mean_cos - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_lambertian_flips_for_rays_from_below() {
        let spf = Lambertian::default();
        let isect = SurfaceInteraction::new(Ray::new(-DVec3::Z, DVec3::Z), DVec3::ZERO);
        let mut rng = seeded_rng(1, 0);
        let mut rays = ScatteredRays::new();
        spf.scatter_nm(&isect, &mut rng, 550.0, &mut rays);
        let r = rays.random_select(0.0, true).unwrap();
        assert!(r.ray.dir.z <= 0.0);
        assert_eq!(r.kray_nm, 1.0);
    }
}
