//! # gonio-bxdf
//! Scattering phase functions and materials consumed by the measurement
//! engine.
#![warn(missing_docs)]

mod lambertian;
mod phong;
mod reflectance;
mod reflector;
pub mod scattered;
pub mod spf;

pub use lambertian::Lambertian;
pub use phong::IsotropicPhong;
pub use reflectance::Reflectance;
pub use reflector::PerfectReflector;
pub use scattered::{ScatteredRay, ScatteredRayKind, ScatteredRays};
pub use spf::{ScatteringPhaseFunction, SurfaceInteraction};

/// A surface material.
///
/// Materials that only emit or absorb light expose no scattering phase
/// function and cannot be measured.
pub trait Material: Send + Sync {
    /// Returns the scattering phase function of the material, if any.
    fn spf(&self) -> Option<&dyn ScatteringPhaseFunction>;
}
