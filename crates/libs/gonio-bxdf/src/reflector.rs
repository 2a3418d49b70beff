use crate::{
    reflectance::Reflectance,
    scattered::{ScatteredRay, ScatteredRayKind, ScatteredRays},
    spf::{ScatteringPhaseFunction, SurfaceInteraction},
    Material,
};
use base::math::{reflect, Ray};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Ideal mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfectReflector {
    /// Reflectance of the mirror.
    pub reflectance: Reflectance,
}

impl PerfectReflector {
    /// Creates a mirror.
    pub fn new(reflectance: Reflectance) -> Self { Self { reflectance } }

    /// Mirror direction, if it leaves the surface on the normal side.
    fn mirrored(&self, isect: &SurfaceInteraction) -> Option<Ray> {
        let dir = reflect(isect.ray.dir, isect.onb.w);
        (dir.dot(isect.onb.w) > 0.0).then(|| Ray::new(isect.point, dir))
    }
}

impl ScatteringPhaseFunction for PerfectReflector {
    fn scatter(
        &self,
        isect: &SurfaceInteraction,
        _: &mut dyn RngCore,
        scattered: &mut ScatteredRays,
    ) {
        if let Some(ray) = self.mirrored(isect) {
            scattered.push(ScatteredRay::new(
                ray,
                self.reflectance.rgb(),
                ScatteredRayKind::Reflection,
            ));
        }
    }

    fn scatter_nm(
        &self,
        isect: &SurfaceInteraction,
        _: &mut dyn RngCore,
        nm: f64,
        scattered: &mut ScatteredRays,
    ) {
        if let Some(ray) = self.mirrored(isect) {
            scattered.push(ScatteredRay::spectral(
                ray,
                self.reflectance.at_nm(nm),
                ScatteredRayKind::Reflection,
            ));
        }
    }
}

impl Material for PerfectReflector {
    fn spf(&self) -> Option<&dyn ScatteringPhaseFunction> { Some(self) }
}
