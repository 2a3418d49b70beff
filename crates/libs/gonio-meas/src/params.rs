//! Measurement parameters as read from YAML documents.

use crate::{
    adaptive::AdaptiveQuadtreeDetector,
    discretization::PatchDiscretization,
    disk::CircularDiskDetector,
    engine::{MeasurementSetup, MeasurementStatus, ProgressCallback},
    error::ParamsError,
    geometry::{DiskSample, PointSample, SampleGeometry},
    grid::FixedGridDetector,
    isotropic::{IsotropicRgbDetector, IsotropicSetup},
    parallel::measure_grid_parallel,
};
use base::{
    error::GonioError,
    math::DVec3,
    random::{seeded_rng, DEFAULT_SEED},
};
use bxdf::Material;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Detector to measure with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorParams {
    /// Fixed grid of patches over the whole sphere.
    Grid {
        /// Rings over the whole sphere, split evenly between hemispheres.
        theta_rings: usize,
        /// Azimuthal slices per ring.
        phi_slices: usize,
        /// Radius of the detector sphere.
        radius: f64,
        /// Ring boundary policy.
        #[serde(default)]
        discretization: PatchDiscretization,
        /// Spread the sampling over the rayon thread pool.
        #[serde(default)]
        parallel: bool,
    },
    /// Quad-tree refined where power accumulates.
    Adaptive {
        /// Radius of the detector sphere.
        radius: f64,
        /// Power a patch may hold before splitting.
        threshold: f64,
        /// Budget of patches created by splits.
        max_patches: usize,
    },
    /// Full rings accumulating colour; the emitter is placed by
    /// `emitter_theta` and the sample geometries are not used.
    Isotropic {
        /// Rings per hemisphere.
        rings: usize,
        /// Ring boundary policy.
        #[serde(default)]
        discretization: PatchDiscretization,
        /// Polar angle of the emitter, in degrees.
        emitter_theta: f64,
        /// Wavelength range in nanometres for a spectral measurement.
        #[serde(default)]
        spectral: Option<(f64, f64)>,
    },
    /// Disks along a great circle.
    Disk {
        /// Number of disks.
        disks: usize,
        /// Radius of the sphere carrying the disks.
        radius: f64,
        /// Radius of every disk.
        disk_radius: f64,
    },
}

impl DetectorParams {
    fn check(&self) -> Result<(), ParamsError> {
        fn positive(what: &'static str, value: f64) -> Result<(), ParamsError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ParamsError::NonPositiveRadius { what, value })
            }
        }

        match *self {
            DetectorParams::Grid {
                theta_rings,
                phi_slices,
                radius,
                ..
            } => {
                if theta_rings < 2 || theta_rings % 2 != 0 {
                    return Err(ParamsError::InvalidRingCount(theta_rings));
                }
                if phi_slices == 0 {
                    return Err(ParamsError::ZeroCount("phi slices"));
                }
                positive("detector", radius)
            },
            DetectorParams::Adaptive {
                radius,
                threshold,
                max_patches,
            } => {
                positive("detector", radius)?;
                if threshold <= 0.0 || threshold.is_nan() {
                    return Err(ParamsError::NonPositiveThreshold(threshold));
                }
                if max_patches == 0 {
                    return Err(ParamsError::ZeroCount("patches"));
                }
                Ok(())
            },
            DetectorParams::Isotropic {
                rings,
                emitter_theta,
                spectral,
                ..
            } => {
                if rings == 0 {
                    return Err(ParamsError::ZeroCount("rings"));
                }
                if !(0.0..=90.0).contains(&emitter_theta) {
                    return Err(ParamsError::InvalidEmitterTheta(emitter_theta));
                }
                match spectral {
                    Some((begin, end)) if !(begin >= 0.0 && begin < end) => {
                        Err(ParamsError::InvalidWavelengthRange(begin, end))
                    },
                    _ => Ok(()),
                }
            },
            DetectorParams::Disk {
                disks,
                radius,
                disk_radius,
            } => {
                if disks == 0 {
                    return Err(ParamsError::ZeroCount("disks"));
                }
                positive("detector", radius)?;
                positive("disk", disk_radius)
            },
        }
    }
}

/// Geometry rays are emitted from or aimed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleGeometryParams {
    /// A single point.
    Point {
        /// Position of the point.
        position: DVec3,
    },
    /// A flat disk.
    Disk {
        /// Centre of the disk.
        center: DVec3,
        /// Normal of the disk.
        normal: DVec3,
        /// Radius of the disk.
        radius: f64,
    },
}

impl SampleGeometryParams {
    /// Builds the geometry.
    pub fn build(&self) -> Box<dyn SampleGeometry> {
        match *self {
            SampleGeometryParams::Point { position } => Box::new(PointSample::new(position)),
            SampleGeometryParams::Disk {
                center,
                normal,
                radius,
            } => Box::new(DiskSample::new(center, normal, radius)),
        }
    }

    fn check(&self, what: &'static str) -> Result<(), ParamsError> {
        match *self {
            SampleGeometryParams::Disk { radius, .. } if radius <= 0.0 || radius.is_nan() => {
                Err(ParamsError::NonPositiveRadius {
                    what,
                    value: radius,
                })
            },
            _ => Ok(()),
        }
    }
}

/// Number of trials, as `outer × inner`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    /// Outer iterations; progress is reported between them.
    pub outer: u32,
    /// Trials per outer iteration.
    pub inner: u32,
}

fn default_emitter() -> SampleGeometryParams {
    SampleGeometryParams::Point {
        position: DVec3::Z,
    }
}

fn default_specimen() -> SampleGeometryParams {
    SampleGeometryParams::Point {
        position: DVec3::ZERO,
    }
}

fn default_progress_rate() -> u32 { 1 }

fn default_seed() -> u64 { DEFAULT_SEED }

/// Description of one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementParams {
    /// Detector to measure with.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub detector: DetectorParams,
    /// Where incident rays start.
    #[serde(
        default = "default_emitter",
        with = "serde_yaml::with::singleton_map"
    )]
    pub emitter: SampleGeometryParams,
    /// Where incident rays aim.
    #[serde(
        default = "default_specimen",
        with = "serde_yaml::with::singleton_map"
    )]
    pub specimen: SampleGeometryParams,
    /// Total emitted power.
    pub radiant_power: f64,
    /// Number of trials.
    pub samples: SampleCounts,
    /// Outer iterations between progress reports.
    #[serde(default = "default_progress_rate")]
    pub progress_rate: u32,
    /// Seed of the random generator.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// A YAML document holds either one measurement or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    One(MeasurementParams),
    Many(Vec<MeasurementParams>),
}

/// Detector after a measurement.
#[derive(Debug, Clone)]
pub enum MeasuredDetector {
    /// Fixed grid.
    Grid(FixedGridDetector),
    /// Adaptive quad-tree.
    Adaptive(AdaptiveQuadtreeDetector),
    /// Isotropic colour rings.
    Isotropic(IsotropicRgbDetector),
    /// Circular disks.
    Disk(CircularDiskDetector),
}

impl MeasuredDetector {
    /// Root mean square error of the ratios against the known values.
    pub fn rms_error(&self) -> f64 {
        match self {
            MeasuredDetector::Grid(d) => d.rms_error(),
            MeasuredDetector::Adaptive(d) => crate::normalize::rms_error(d.patches()),
            MeasuredDetector::Isotropic(d) => d.rms_error(),
            MeasuredDetector::Disk(d) => d.rms_error(),
        }
    }

    /// Writes the result in the format suited to the detector: CSV for
    /// grids, text lists otherwise.
    #[cfg(feature = "io")]
    pub fn dump(&self, path: &Path) -> Result<(), GonioError> {
        use crate::io;
        match self {
            MeasuredDetector::Grid(d) => io::dump_to_file(path, |w| io::write_grid_csv(d, w)),
            MeasuredDetector::Adaptive(d) => {
                io::dump_to_file(path, |w| io::write_patch_list(d.patches(), w))
            },
            MeasuredDetector::Isotropic(d) => {
                io::dump_to_file(path, |w| io::write_isotropic_matrix(d, w))
            },
            MeasuredDetector::Disk(d) => io::dump_to_file(path, |w| io::write_disk_list(d, w)),
        }
    }
}

impl MeasurementParams {
    /// Loads every measurement of a YAML file and validates it.
    ///
    /// Documents are separated by `---`; each one holds a single
    /// measurement or a sequence of them.
    pub fn load(path: &Path) -> Result<Vec<Self>, GonioError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            GonioError::from_io_error(
                err,
                format!(
                    "Failed to read measurement parameters: {}",
                    path.display()
                ),
            )
        })?;
        Self::load_from_str(&text)
    }

    /// Same as [`load`](Self::load) on an in-memory string.
    pub fn load_from_str(text: &str) -> Result<Vec<Self>, GonioError> {
        let mut measurements = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(text) {
            let parsed = Document::deserialize(doc).map_err(|err| {
                GonioError::new(
                    "Failed to deserialize measurement parameters",
                    Some(Box::new(err)),
                )
            })?;
            match parsed {
                Document::One(params) => measurements.push(params.validate()?),
                Document::Many(list) => {
                    for params in list {
                        measurements.push(params.validate()?);
                    }
                },
            }
        }
        Ok(measurements)
    }

    /// Checks that the parameters describe a measurement that can run.
    pub fn validate(self) -> Result<Self, GonioError> {
        log::info!("Validating measurement parameters...");
        if self.samples.outer == 0 {
            return Err(ParamsError::ZeroSamples("outer").into());
        }
        if self.samples.inner == 0 {
            return Err(ParamsError::ZeroSamples("inner").into());
        }
        if !(self.radiant_power > 0.0 && self.radiant_power.is_finite()) {
            return Err(ParamsError::NonPositivePower(self.radiant_power).into());
        }
        self.emitter.check("emitter disk")?;
        self.specimen.check("specimen disk")?;
        self.detector.check()?;
        Ok(self)
    }

    /// Builds the detector and measures the material with it.
    pub fn run(
        &self,
        material: &dyn Material,
        progress: Option<&mut (dyn ProgressCallback + '_)>,
    ) -> Result<(MeasurementStatus, MeasuredDetector), GonioError> {
        let emitter = self.emitter.build();
        let specimen = self.specimen.build();
        let setup = MeasurementSetup {
            emitter: &*emitter,
            specimen: &*specimen,
            radiant_power: self.radiant_power,
            material,
            outer_samples: self.samples.outer,
            inner_samples: self.samples.inner,
            progress_rate: self.progress_rate,
        };
        let mut rng = seeded_rng(self.seed, 0);

        let result = match self.detector {
            DetectorParams::Grid {
                theta_rings,
                phi_slices,
                radius,
                discretization,
                parallel,
            } => {
                let mut detector =
                    FixedGridDetector::new(theta_rings, phi_slices, radius, discretization);
                let status = if parallel {
                    measure_grid_parallel(&mut detector, &setup, self.seed)
                } else {
                    detector.perform_measurement(&setup, progress, &mut rng)
                };
                (status, MeasuredDetector::Grid(detector))
            },
            DetectorParams::Adaptive {
                radius,
                threshold,
                max_patches,
            } => {
                let mut detector = AdaptiveQuadtreeDetector::new(radius, threshold, max_patches);
                let status = detector.perform_measurement(&setup, progress, &mut rng);
                (status, MeasuredDetector::Adaptive(detector))
            },
            DetectorParams::Isotropic {
                rings,
                discretization,
                emitter_theta,
                spectral,
            } => {
                let mut detector = IsotropicRgbDetector::new(rings, discretization);
                let iso = IsotropicSetup {
                    emitter_theta: emitter_theta.to_radians(),
                    radiant_power: self.radiant_power,
                    material,
                    outer_samples: self.samples.outer,
                    inner_samples: self.samples.inner,
                    spectral,
                    progress_rate: self.progress_rate,
                };
                let status = detector.perform_measurement(&iso, progress, &mut rng);
                (status, MeasuredDetector::Isotropic(detector))
            },
            DetectorParams::Disk {
                disks,
                radius,
                disk_radius,
            } => {
                let mut detector = CircularDiskDetector::new(disks, radius, disk_radius);
                let status = detector.perform_measurement(&setup, progress, &mut rng);
                (status, MeasuredDetector::Disk(detector))
            },
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use base::Hemisphere;
    use bxdf::{Lambertian, Reflectance};
    use std::f64::consts::FRAC_1_PI;

    const GRID_YAML: &str = r#"
detector:
  grid:
    theta_rings: 8
    phi_slices: 8
    radius: 1.0
    discretization: equal-psa
emitter:
  point:
    position: [0.2, 0.1, 1.0]
radiant_power: 1.0
samples:
  outer: 50
  inner: 1000
seed: 12
"#;

    #[test]
    fn test_load_single_document_with_defaults() {
        let params = MeasurementParams::load_from_str(GRID_YAML).unwrap();
        assert_eq!(params.len(), 1);
        let p = &params[0];
        assert_eq!(
            p.detector,
            DetectorParams::Grid {
                theta_rings: 8,
                phi_slices: 8,
                radius: 1.0,
                discretization: PatchDiscretization::EqualPsa,
                parallel: false,
            }
        );
        assert_eq!(p.specimen, default_specimen());
        assert_eq!(p.progress_rate, 1);
        assert_eq!(p.seed, 12);
    }

    #[test]
    fn test_load_multiple_documents_and_sequences() {
        let text = format!(
            "{}\n---\n{}",
            GRID_YAML,
            r#"
- detector:
    adaptive: { radius: 1.0, threshold: 0.01, max_patches: 64 }
  radiant_power: 2.0
  samples: { outer: 10, inner: 10 }
- detector:
    isotropic: { rings: 4, emitter_theta: 30.0, spectral: [400.0, 700.0] }
  radiant_power: 1.0
  samples: { outer: 10, inner: 10 }
- detector:
    disk: { disks: 6, radius: 1.0, disk_radius: 0.1 }
  specimen:
    disk: { center: [0.0, 0.0, 0.0], normal: [0.0, 0.0, 1.0], radius: 0.05 }
  radiant_power: 1.0
  samples: { outer: 10, inner: 10 }
"#
        );
        let params = MeasurementParams::load_from_str(&text).unwrap();
        assert_eq!(params.len(), 4);
        assert!(matches!(params[1].detector, DetectorParams::Adaptive { max_patches: 64, .. }));
        match params[2].detector {
            DetectorParams::Isotropic { spectral, .. } => {
                assert_eq!(spectral, Some((400.0, 700.0)))
            },
            ref other => panic!("unexpected detector {:?}", other),
        }
        assert!(matches!(params[3].specimen, SampleGeometryParams::Disk { .. }));
    }

    #[test]
    fn test_yaml_round_trip() {
        let params = MeasurementParams::load_from_str(GRID_YAML).unwrap().remove(0);
        let text = serde_yaml::to_string(&params).unwrap();
        let back = MeasurementParams::load_from_str(&text).unwrap();
        assert_eq!(back, vec![params]);
    }

    #[test]
    fn test_invalid_parameters() {
        let cases = [
            ("theta_rings: 8", "theta_rings: 7"),
            ("radius: 1.0", "radius: 0.0"),
            ("outer: 50", "outer: 0"),
            ("radiant_power: 1.0", "radiant_power: -1.0"),
            ("phi_slices: 8", "phi_slices: 0"),
        ];
        for (from, to) in cases {
            let text = GRID_YAML.replace(from, to);
            let err = MeasurementParams::load_from_str(&text).unwrap_err();
            assert_eq!(err.message(), "Invalid measurement parameters", "{}", to);
        }

        let bad_range = MeasurementParams {
            detector: DetectorParams::Isotropic {
                rings: 4,
                discretization: PatchDiscretization::EqualPsa,
                emitter_theta: 10.0,
                spectral: Some((700.0, 400.0)),
            },
            emitter: default_emitter(),
            specimen: default_specimen(),
            radiant_power: 1.0,
            samples: SampleCounts { outer: 1, inner: 1 },
            progress_rate: 1,
            seed: 0,
        };
        assert!(bad_range.clone().validate().is_err());
        let bad_theta = MeasurementParams {
            detector: DetectorParams::Isotropic {
                rings: 4,
                discretization: PatchDiscretization::EqualPsa,
                emitter_theta: 95.0,
                spectral: None,
            },
            ..bad_range
        };
        assert!(bad_theta.validate().is_err());

        let malformed = MeasurementParams::load_from_str("detector: 3\n").unwrap_err();
        assert_eq!(malformed.message(), "Failed to deserialize measurement parameters");
    }

    #[test]
    fn test_run_grid_from_params() {
        let params = MeasurementParams::load_from_str(GRID_YAML).unwrap().remove(0);
        let material = Lambertian::new(Reflectance::grey(1.0));
        let (status, measured) = params.run(&material, None).unwrap();
        assert_eq!(status, MeasurementStatus::Completed);
        match &measured {
            MeasuredDetector::Grid(grid) => {
                assert_abs_diff_eq!(grid.total_power(), 1.0, epsilon = 1e-9);
                let top = crate::normalize::rms_error(grid.patches(Hemisphere::Top));
                assert!(top < 0.1 * FRAC_1_PI);
                assert_eq!(measured.rms_error(), grid.rms_error());
            },
            other => panic!("unexpected detector {:?}", other),
        }

        // Same seed, same result.
        let (_, again) = params.run(&material, None).unwrap();
        match (&measured, &again) {
            (MeasuredDetector::Grid(a), MeasuredDetector::Grid(b)) => assert_eq!(a, b),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_run_every_detector_kind() {
        let text = r#"
- detector:
    grid: { theta_rings: 4, phi_slices: 4, radius: 2.0, parallel: true }
  radiant_power: 1.0
  samples: { outer: 20, inner: 100 }
- detector:
    adaptive: { radius: 1.0, threshold: 0.05, max_patches: 32 }
  radiant_power: 1.0
  samples: { outer: 20, inner: 100 }
- detector:
    isotropic: { rings: 3, emitter_theta: 45.0 }
  radiant_power: 1.0
  samples: { outer: 20, inner: 100 }
- detector:
    disk: { disks: 3, radius: 1.0, disk_radius: 0.2 }
  radiant_power: 1.0
  samples: { outer: 20, inner: 100 }
"#;
        let material = Lambertian::default();
        for params in MeasurementParams::load_from_str(text).unwrap() {
            let mut calls = 0;
            let mut cb = |_: f64, _: f64| {
                calls += 1;
                true
            };
            let (status, measured) = params.run(&material, Some(&mut cb)).unwrap();
            assert_eq!(status, MeasurementStatus::Completed);
            match measured {
                MeasuredDetector::Grid(d) => {
                    // The parallel path reports no progress.
                    assert_eq!(calls, 0);
                    assert_abs_diff_eq!(d.total_power(), 1.0, epsilon = 1e-9);
                },
                MeasuredDetector::Adaptive(d) => {
                    assert_eq!(calls, 21);
                    assert!(d.patches().len() > 1);
                },
                MeasuredDetector::Isotropic(d) => {
                    assert_eq!(calls, 21);
                    assert!(d.total_luminance() > 0.9);
                },
                MeasuredDetector::Disk(d) => {
                    assert_eq!(calls, 21);
                    assert!(d.total_power() > 0.0);
                },
            }
        }
    }

    #[cfg(feature = "io")]
    #[test]
    fn test_dump_measured_detector() {
        let params = MeasurementParams::load_from_str(GRID_YAML).unwrap().remove(0);
        let (_, measured) = params.run(&Lambertian::default(), None).unwrap();
        let path = std::env::temp_dir().join(format!("gonio-params-{}.csv", std::process::id()));
        measured.dump(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Top hemisphere"));
        std::fs::remove_file(&path).unwrap();
    }
}
