//! Stochastic measurement engine.
//!
//! For every trial a ray is fired from a point on the emitter towards a point
//! on the specimen, scattered by the specimen's phase function, reduced to a
//! single outgoing ray and caught by the detector sphere. The hit is turned
//! into detector angles and the detector receives the power carried by the
//! trial.

use crate::geometry::{DetectorGeometry, SampleGeometry, SphereGeometry};
use base::{
    math::{DVec3, Ray, Sph2, NEAR_ZERO},
    random::canonical,
    Hemisphere,
};
use bxdf::{Material, ScatteredRay, ScatteredRays, ScatteringPhaseFunction, SurfaceInteraction};
use rand::RngCore;
use std::{
    f64::consts::{FRAC_PI_2, PI},
    ops::Range,
};

/// Receives progress reports; returning `false` asks the measurement to stop.
pub trait ProgressCallback {
    /// Reports that `current` out of `total` units of work are done.
    fn progress(&mut self, current: f64, total: f64) -> bool;
}

impl<F: FnMut(f64, f64) -> bool> ProgressCallback for F {
    fn progress(&mut self, current: f64, total: f64) -> bool { self(current, total) }
}

/// Outcome of a measurement pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MeasurementStatus {
    /// Every trial ran.
    Completed,
    /// The progress callback asked to stop after the given number of outer
    /// iterations; the results gathered so far are valid.
    Cancelled {
        /// Outer iterations that ran.
        outer_done: u32,
    },
    /// The material has no scattering phase function; nothing was measured.
    NotMeasurable,
}

impl MeasurementStatus {
    /// Returns whether any sampling took place.
    pub fn is_measured(&self) -> bool { !matches!(self, MeasurementStatus::NotMeasurable) }
}

/// Everything a measurement pass needs besides the detector.
#[derive(Clone, Copy)]
pub struct MeasurementSetup<'a> {
    /// Geometry the incident rays start from.
    pub emitter: &'a dyn SampleGeometry,
    /// Geometry the incident rays aim at.
    pub specimen: &'a dyn SampleGeometry,
    /// Total power emitted over the whole pass.
    pub radiant_power: f64,
    /// Material of the specimen.
    pub material: &'a dyn Material,
    /// Number of outer iterations.
    pub outer_samples: u32,
    /// Number of trials per outer iteration.
    pub inner_samples: u32,
    /// Progress is reported every `progress_rate` outer iterations.
    pub progress_rate: u32,
}

impl<'a> MeasurementSetup<'a> {
    /// Total number of trials.
    pub fn total_samples(&self) -> u64 { self.outer_samples as u64 * self.inner_samples as u64 }

    /// Power carried by a single trial.
    pub fn power_per_sample(&self) -> f64 {
        match self.total_samples() {
            0 => 0.0,
            n => self.radiant_power / n as f64,
        }
    }
}

/// Where a scattered ray landed on the detector sphere, in detector angles.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DetectorHit {
    /// Exactly at one of the poles, where every patch of the pole ring
    /// meets.
    Pole(Hemisphere),
    /// Anywhere else.
    Direction(Sph2),
}

impl DetectorHit {
    /// Classifies a point on a sphere of the given radius.
    ///
    /// Returns `None` when the point has no azimuth but is not close enough
    /// to a pole to be treated as one.
    pub fn from_point(point: DVec3, radius: f64) -> Option<Self> {
        let unit = point / radius;
        if (unit - DVec3::Z).abs().max_element() < NEAR_ZERO {
            return Some(DetectorHit::Pole(Hemisphere::Top));
        }
        if (unit + DVec3::Z).abs().max_element() < NEAR_ZERO {
            return Some(DetectorHit::Pole(Hemisphere::Bottom));
        }
        Sph2::from_cartesian(point).map(|sph| DetectorHit::Direction(to_detector_frame(sph)))
    }
}

/// Remaps raw spherical angles to the detector frame.
///
/// The polar angle becomes the elevation above the specimen plane in the top
/// hemisphere (`pi - elevation` below it) and the azimuth is rotated by pi.
pub fn to_detector_frame(sph: Sph2) -> Sph2 {
    let theta = if sph.theta < FRAC_PI_2 {
        FRAC_PI_2 - sph.theta
    } else {
        FRAC_PI_2 + PI - sph.theta
    };
    let phi = if sph.phi < PI { PI + sph.phi } else { sph.phi - PI };
    Sph2::new(theta, phi)
}

/// A detector that can be driven by [`perform_measurement`].
pub trait Detector {
    /// Radius of the detector sphere.
    fn radius(&self) -> f64;

    /// Discards the results of any previous pass.
    fn begin_pass(&mut self);

    /// Adds the power of one trial.
    fn deposit(&mut self, hit: DetectorHit, power: f64);

    /// Turns accumulated power into ratios given the power actually emitted.
    fn end_pass(&mut self, incident_power: f64);
}

/// Result of the sampling loop.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PassOutcome {
    /// How the loop ended.
    pub status: MeasurementStatus,
    /// Power emitted by the trials that ran.
    pub emitted_power: f64,
}

/// Runs a full measurement pass: resets the detector, samples
/// `outer × inner` trials and normalizes the result.
///
/// The progress callback, if any, is polled every `progress_rate` outer
/// iterations and once more with `(1, 1)` at the end.
pub fn perform_measurement<D: Detector + ?Sized>(
    detector: &mut D,
    setup: &MeasurementSetup,
    mut progress: Option<&mut (dyn ProgressCallback + '_)>,
    rng: &mut dyn RngCore,
) -> MeasurementStatus {
    let Some(spf) = setup.material.spf() else {
        log::debug!("Material has no scattering phase function, nothing to measure");
        return MeasurementStatus::NotMeasurable;
    };
    log::info!(
        "Measuring {} x {} samples, radiant power {}",
        setup.outer_samples,
        setup.inner_samples,
        setup.radiant_power
    );
    detector.begin_pass();
    let outcome = accumulate(
        detector,
        spf,
        setup,
        0..setup.outer_samples,
        progress.as_deref_mut(),
        rng,
    );
    if let Some(cb) = progress {
        cb.progress(1.0, 1.0);
    }
    detector.end_pass(outcome.emitted_power);
    if let MeasurementStatus::Cancelled { outer_done } = outcome.status {
        log::info!("Measurement cancelled after {} outer iterations", outer_done);
    }
    outcome.status
}

/// Sampling loop over the given outer iterations, without resetting or
/// normalizing the detector.
pub fn accumulate<D: Detector + ?Sized>(
    detector: &mut D,
    spf: &dyn ScatteringPhaseFunction,
    setup: &MeasurementSetup,
    outer: Range<u32>,
    mut progress: Option<&mut (dyn ProgressCallback + '_)>,
    rng: &mut dyn RngCore,
) -> PassOutcome {
    let power_each = setup.power_per_sample();
    let sphere = SphereGeometry::new(detector.radius());
    let mut scattered = ScatteredRays::new();
    let mut trials = 0u64;
    let mut status = MeasurementStatus::Completed;

    for i in outer {
        for _ in 0..setup.inner_samples {
            trials += 1;
            let (from, to) = (setup.emitter.sample_point(rng), setup.specimen.sample_point(rng));
            let Some(incident) = Ray::towards(from, to) else {
                log::warn!("Emitter and specimen points coincide at {}, trial skipped", from);
                continue;
            };
            let Some(ray) = scatter_once(spf, incident, None, &mut scattered, rng) else {
                continue;
            };
            let probe = Ray::new(ray.ray.org, ray.ray.dir.normalize());
            let Some(hit) = sphere.intersect(&probe, false, true) else {
                continue;
            };
            if let Some(hit) = DetectorHit::from_point(hit.point, sphere.radius) {
                detector.deposit(hit, power_each * ray.weight(false));
            }
        }
        if !poll_progress(&mut progress, i, setup.outer_samples, setup.progress_rate) {
            status = MeasurementStatus::Cancelled { outer_done: i + 1 };
            break;
        }
    }

    PassOutcome {
        status,
        emitted_power: power_each * trials as f64,
    }
}

/// Scatters an incident ray hitting the specimen at the origin and picks one
/// outgoing ray, or none if the trial was absorbed.
///
/// With a wavelength the spectral variant of the phase function is used and
/// the selection is weighted by the spectral reflectance.
pub(crate) fn scatter_once(
    spf: &dyn ScatteringPhaseFunction,
    incident: Ray,
    nm: Option<f64>,
    scattered: &mut ScatteredRays,
    rng: &mut dyn RngCore,
) -> Option<ScatteredRay> {
    scattered.clear();
    let isect = SurfaceInteraction::new(incident, DVec3::ZERO);
    match nm {
        Some(nm) => spf.scatter_nm(&isect, rng, nm, scattered),
        None => spf.scatter(&isect, rng, scattered),
    }
    scattered.random_select(canonical(rng), nm.is_some()).copied()
}

/// Polls the callback after outer iteration `i` when it is due. Returns
/// `false` if the callback asked to stop.
pub(crate) fn poll_progress(
    progress: &mut Option<&mut (dyn ProgressCallback + '_)>,
    i: u32,
    total: u32,
    rate: u32,
) -> bool {
    match progress {
        Some(cb) if i % rate.max(1) == 0 => cb.progress(i as f64, total as f64),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use base::math::sph_to_cart;
    use proptest::prelude::*;
    use std::f64::consts::TAU;

    #[test]
    fn test_detector_frame_top_and_bottom() {
        // Straight up is the pole of the top hemisphere, elevation pi/2.
        let up = to_detector_frame(Sph2::new(0.0, 0.0));
        assert_abs_diff_eq!(up.theta, FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(up.phi, PI, epsilon = 1e-12);
        // Grazing below the surface maps to pi.
        let below = to_detector_frame(Sph2::new(FRAC_PI_2 + 1e-9, 1.5 * PI));
        assert_abs_diff_eq!(below.theta, PI, epsilon = 1e-8);
        assert_abs_diff_eq!(below.phi, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_detector_hit_poles() {
        assert_eq!(
            DetectorHit::from_point(DVec3::new(0.0, 0.0, 2.0), 2.0),
            Some(DetectorHit::Pole(Hemisphere::Top))
        );
        assert_eq!(
            DetectorHit::from_point(DVec3::new(0.0, 0.0, -1.0), 1.0),
            Some(DetectorHit::Pole(Hemisphere::Bottom))
        );
        match DetectorHit::from_point(DVec3::new(1.0, 0.0, 0.0), 1.0) {
            Some(DetectorHit::Direction(sph)) => {
                // The equator belongs to the grazing edge of the bottom half.
                assert_abs_diff_eq!(sph.theta, PI, epsilon = 1e-6);
                assert_abs_diff_eq!(sph.phi, PI, epsilon = 1e-4);
            },
            other => panic!("unexpected hit {:?}", other),
        }
    }

    #[test]
    fn test_poll_progress_cadence() {
        let mut calls = Vec::new();
        let mut cb = |c: f64, _t: f64| {
            calls.push(c);
            c < 4.0
        };
        {
            let mut progress: Option<&mut dyn ProgressCallback> = Some(&mut cb);
            for i in 0..10 {
                if !poll_progress(&mut progress, i, 10, 2) {
                    break;
                }
            }
        }
        assert_eq!(calls, vec![0.0, 2.0, 4.0]);
        let mut none: Option<&mut dyn ProgressCallback> = None;
        assert!(poll_progress(&mut none, 0, 1, 0));
    }

    proptest! {
        #[test]
        fn test_detector_frame_ranges(theta in 0.001f64..(PI - 0.001), phi in 0.0f64..TAU) {
            let p = sph_to_cart(theta, phi);
            if let Some(DetectorHit::Direction(sph)) = DetectorHit::from_point(p, 1.0) {
                prop_assert!((0.0..=PI).contains(&sph.theta));
                prop_assert!((0.0..=TAU).contains(&sph.phi));
                if p.z > 1e-6 {
                    prop_assert!(sph.theta < FRAC_PI_2 + 1e-9);
                } else if p.z < -1e-6 {
                    prop_assert!(sph.theta > FRAC_PI_2 - 1e-9);
                }
            }
        }
    }
}
