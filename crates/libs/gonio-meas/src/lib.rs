//! # gonio-meas
//! Detector-sphere measurement engine.
//!
//! Rays are fired from an emitter at a specimen, scattered by the specimen's
//! material and caught on a detector around it. The detectors turn the
//! captured power into ratios per patch of the sphere:
//!
//! - [`FixedGridDetector`]: rings and slices over both hemispheres.
//! - [`AdaptiveQuadtreeDetector`]: patches refined where power accumulates.
//! - [`IsotropicRgbDetector`]: full rings accumulating colour.
//! - [`CircularDiskDetector`]: disks along a great circle.
//!
//! Measurements can be described in YAML, see [`params::MeasurementParams`].
#![warn(missing_docs)]

pub mod adaptive;
pub mod discretization;
pub mod disk;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod grid;
#[cfg(feature = "io")]
pub mod io;
pub mod isotropic;
pub mod normalize;
pub mod parallel;
pub mod params;
pub mod patch;

pub use adaptive::AdaptiveQuadtreeDetector;
pub use discretization::PatchDiscretization;
pub use disk::CircularDiskDetector;
pub use engine::{perform_measurement, MeasurementSetup, MeasurementStatus, ProgressCallback};
pub use grid::FixedGridDetector;
pub use isotropic::IsotropicRgbDetector;
pub use parallel::measure_grid_parallel;
pub use patch::AngularPatch;
