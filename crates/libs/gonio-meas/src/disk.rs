//! Detector made of small disks placed along a great circle.

use crate::{
    engine::{poll_progress, scatter_once, MeasurementSetup, MeasurementStatus, ProgressCallback},
    geometry::{DetectorGeometry, RayHit},
    normalize::ratio,
};
use base::math::{DVec3, Ray, NEAR_ZERO};
use bxdf::ScatteredRays;
use rand::RngCore;
use std::f64::consts::{FRAC_1_PI, FRAC_PI_2, PI};

/// One disk of a [`CircularDiskDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorDisk {
    /// Polar angle of the disk centre, in `(-pi/2, pi/2)`; negative towards
    /// `-x`.
    pub theta: f64,
    /// Centre of the disk.
    pub center: DVec3,
    /// Unit normal, pointing away from the specimen.
    pub normal: DVec3,
    /// Radius of the disk.
    pub radius: f64,
    /// Area of the disk.
    pub area: f64,
    /// Absolute cosine of `theta`.
    pub cos_theta_mean: f64,
    /// Projected solid angle seen from the specimen.
    pub solid_projected_angle: f64,
    /// Power accumulated during the current pass.
    pub power: f64,
    /// Normalized power.
    pub ratio: f64,
}

impl DetectorGeometry for DetectorDisk {
    fn intersect(&self, ray: &Ray, front_faces: bool, back_faces: bool) -> Option<RayHit> {
        let denom = ray.dir.dot(self.normal);
        if denom.abs() < NEAR_ZERO {
            return None;
        }
        let front_face = denom < 0.0;
        if (front_face && !front_faces) || (!front_face && !back_faces) {
            return None;
        }
        let t = (self.center - ray.org).dot(self.normal) / denom;
        if t <= NEAR_ZERO {
            return None;
        }
        let point = ray.at(t);
        ((point - self.center).length_squared() <= self.radius * self.radius).then_some(RayHit {
            t,
            point,
            normal: self.normal,
            front_face,
        })
    }
}

/// `n` equal disks whose centres sit on a sphere, spread evenly in polar
/// angle over the `xz` half plane above the specimen.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularDiskDetector {
    radius: f64,
    disks: Vec<DetectorDisk>,
}

impl CircularDiskDetector {
    /// Creates the detector.
    ///
    /// # Arguments
    ///
    /// * `n` - number of disks.
    /// * `radius` - radius of the sphere carrying the disk centres.
    /// * `disk_radius` - radius of every disk.
    pub fn new(n: usize, radius: f64, disk_radius: f64) -> Self {
        let area = PI * disk_radius * disk_radius;
        let disks = (0..n)
            .map(|i| {
                let theta = (i as f64 + 0.5) * PI / n as f64 - FRAC_PI_2;
                let normal = DVec3::new(theta.sin(), 0.0, theta.cos());
                let cos_theta_mean = theta.cos().abs();
                DetectorDisk {
                    theta,
                    center: normal * radius,
                    normal,
                    radius: disk_radius,
                    area,
                    cos_theta_mean,
                    solid_projected_angle: area * cos_theta_mean / (radius * radius),
                    power: 0.0,
                    ratio: 0.0,
                }
            })
            .collect();
        Self { radius, disks }
    }

    /// Radius of the sphere carrying the disk centres.
    pub fn radius(&self) -> f64 { self.radius }

    /// The disks, ordered by polar angle.
    pub fn disks(&self) -> &[DetectorDisk] { &self.disks }

    /// Clears power and ratios.
    pub fn reset(&mut self) {
        for disk in &mut self.disks {
            disk.power = 0.0;
            disk.ratio = 0.0;
        }
    }

    /// Sum of the power accumulated on every disk.
    pub fn total_power(&self) -> f64 { self.disks.iter().map(|d| d.power).sum() }

    /// Root mean square error of the ratios against `1/pi`.
    pub fn rms_error(&self) -> f64 {
        if self.disks.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.disks.iter().map(|d| (d.ratio - FRAC_1_PI).powi(2)).sum();
        (sum / self.disks.len() as f64).sqrt()
    }

    /// Index of the nearest disk crossed by the ray.
    pub fn first_hit(&self, ray: &Ray) -> Option<usize> {
        self.disks
            .iter()
            .enumerate()
            .filter_map(|(i, disk)| disk.intersect(ray, true, true).map(|hit| (i, hit.t)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Runs a measurement pass.
    ///
    /// A single emitter and specimen sample fix the incident ray for the
    /// whole pass; only the scattering varies between trials.
    pub fn perform_measurement(
        &mut self,
        setup: &MeasurementSetup,
        mut progress: Option<&mut (dyn ProgressCallback + '_)>,
        rng: &mut dyn RngCore,
    ) -> MeasurementStatus {
        let Some(spf) = setup.material.spf() else {
            log::debug!("Material has no scattering phase function, nothing to measure");
            return MeasurementStatus::NotMeasurable;
        };
        log::info!(
            "Measuring {} disks, {} x {} samples",
            self.disks.len(),
            setup.outer_samples,
            setup.inner_samples
        );
        self.reset();

        let power_each = setup.power_per_sample();
        let (from, to) = (setup.emitter.sample_point(rng), setup.specimen.sample_point(rng));
        let Some(incident) = Ray::towards(from, to) else {
            log::warn!("Emitter and specimen points coincide at {}, nothing to measure", from);
            return MeasurementStatus::NotMeasurable;
        };
        let mut scattered = ScatteredRays::new();
        let mut trials = 0u64;
        let mut status = MeasurementStatus::Completed;

        for i in 0..setup.outer_samples {
            for _ in 0..setup.inner_samples {
                trials += 1;
                let Some(ray) = scatter_once(spf, incident, None, &mut scattered, rng) else {
                    continue;
                };
                if let Some(index) = self.first_hit(&ray.ray) {
                    self.disks[index].power += power_each * ray.weight(false);
                }
            }
            if !poll_progress(&mut progress, i, setup.outer_samples, setup.progress_rate) {
                status = MeasurementStatus::Cancelled { outer_done: i + 1 };
                log::info!("Measurement cancelled after {} outer iterations", i + 1);
                break;
            }
        }
        if let Some(cb) = progress {
            cb.progress(1.0, 1.0);
        }

        let emitted = power_each * trials as f64;
        for disk in &mut self.disks {
            disk.ratio = ratio(disk.power, emitted, disk.solid_projected_angle);
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PointSample;
    use approx::assert_abs_diff_eq;
    use base::random::seeded_rng;
    use bxdf::{Lambertian, PerfectReflector, Reflectance};

    #[test]
    fn test_disk_layout() {
        let detector = CircularDiskDetector::new(4, 2.0, 0.1);
        let thetas: Vec<f64> = detector.disks().iter().map(|d| d.theta.to_degrees()).collect();
        for (t, expected) in thetas.iter().zip([-67.5, -22.5, 22.5, 67.5]) {
            assert_abs_diff_eq!(*t, expected, epsilon = 1e-9);
        }
        for disk in detector.disks() {
            assert_abs_diff_eq!(disk.center.length(), 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(disk.area, PI * 0.01, epsilon = 1e-12);
            assert_abs_diff_eq!(
                disk.solid_projected_angle,
                disk.area * disk.theta.cos() / 4.0,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_ray_disk_intersection() {
        let detector = CircularDiskDetector::new(3, 1.0, 0.05);
        // The middle disk faces straight up.
        let up = Ray::new(DVec3::ZERO, DVec3::Z);
        assert_eq!(detector.first_hit(&up), Some(1));
        let hit = detector.disks()[1].intersect(&up, true, true).unwrap();
        assert!(!hit.front_face);
        assert_abs_diff_eq!(hit.t, 1.0, epsilon = 1e-12);
        let off = Ray::new(DVec3::ZERO, DVec3::new(0.0, 0.2, 1.0).normalize());
        assert_eq!(detector.first_hit(&off), None);
        assert!(detector.disks()[1].intersect(&up, true, false).is_none());
    }

    #[test]
    fn test_lambertian_response_is_symmetric() {
        let emitter = PointSample::new(DVec3::Z);
        let specimen = PointSample::new(DVec3::ZERO);
        let material = Lambertian::new(Reflectance::grey(1.0));
        let setup = MeasurementSetup {
            emitter: &emitter,
            specimen: &specimen,
            radiant_power: 1.0,
            material: &material,
            outer_samples: 500,
            inner_samples: 2000,
            progress_rate: 100,
        };
        let mut detector = CircularDiskDetector::new(6, 1.0, 0.1);
        let status = detector.perform_measurement(&setup, None, &mut seeded_rng(77, 0));
        assert_eq!(status, MeasurementStatus::Completed);
        let disks = detector.disks();
        for (a, b) in disks.iter().zip(disks.iter().rev()) {
            assert_abs_diff_eq!(a.ratio, b.ratio, epsilon = 0.1 * FRAC_1_PI);
        }
        for disk in disks {
            assert_abs_diff_eq!(disk.ratio, FRAC_1_PI, epsilon = 0.1 * FRAC_1_PI);
        }
        assert!(detector.rms_error() < 0.1 * FRAC_1_PI);
    }

    #[test]
    fn test_coincident_emitter_and_specimen_is_not_measurable() {
        let point = PointSample::new(DVec3::new(0.0, 0.0, 0.5));
        let material = Lambertian::new(Reflectance::grey(1.0));
        let setup = MeasurementSetup {
            emitter: &point,
            specimen: &point,
            radiant_power: 1.0,
            material: &material,
            outer_samples: 2,
            inner_samples: 5,
            progress_rate: 1,
        };
        let mut detector = CircularDiskDetector::new(4, 1.0, 0.5);
        let status = detector.perform_measurement(&setup, None, &mut seeded_rng(0, 0));
        assert_eq!(status, MeasurementStatus::NotMeasurable);
        assert_eq!(detector.total_power(), 0.0);
    }

    #[test]
    fn test_mirror_lights_opposite_disk() {
        let tilt = 22.5f64.to_radians();
        let emitter = PointSample::new(DVec3::new(-tilt.sin(), 0.0, tilt.cos()));
        let specimen = PointSample::new(DVec3::ZERO);
        let material = PerfectReflector::new(Reflectance::grey(1.0));
        let setup = MeasurementSetup {
            emitter: &emitter,
            specimen: &specimen,
            radiant_power: 1.0,
            material: &material,
            outer_samples: 2,
            inner_samples: 5,
            progress_rate: 1,
        };
        let mut detector = CircularDiskDetector::new(4, 1.0, 0.5);
        detector.perform_measurement(&setup, None, &mut seeded_rng(0, 0));
        // The mirror direction goes through the centre of the third disk.
        let lit: Vec<usize> = (0..4).filter(|&i| detector.disks()[i].power > 0.0).collect();
        assert_eq!(lit, vec![2]);
        assert_abs_diff_eq!(detector.total_power(), 1.0, epsilon = 1e-12);
    }
}
