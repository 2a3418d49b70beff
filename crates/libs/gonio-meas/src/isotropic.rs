//! Colour detector made of full rings around the polar axis.
//!
//! Only the polar angle of a hit matters, which suits isotropic materials.
//! Power is accumulated as CIE XYZ, either converted from the RGB weight of
//! the scattered rays or, in spectral mode, from the wavelength of each
//! trial.

use crate::{
    discretization::PatchDiscretization,
    engine::{poll_progress, scatter_once, DetectorHit, MeasurementStatus, ProgressCallback},
    geometry::{DetectorGeometry, SphereGeometry},
    normalize::{normalize, rms_error},
    patch::{projected_solid_angle, AngularPatch},
};
use base::{
    color::{xyz_from_nm, Xyz},
    math::{sph_to_cart, Ray, NEAR_ZERO},
    random::canonical,
    Hemisphere,
};
use bxdf::{Material, ScatteredRays};
use rand::RngCore;
use std::f64::consts::{FRAC_1_PI, FRAC_PI_2, PI, TAU};

/// Parameters of an isotropic measurement pass.
#[derive(Clone, Copy)]
pub struct IsotropicSetup<'a> {
    /// Polar angle of the emitter, radians from the surface normal.
    pub emitter_theta: f64,
    /// Total power emitted over the pass.
    pub radiant_power: f64,
    /// Material of the specimen.
    pub material: &'a dyn Material,
    /// Number of outer iterations.
    pub outer_samples: u32,
    /// Number of trials per outer iteration.
    pub inner_samples: u32,
    /// Wavelength range in nanometres; `None` measures with RGB weights.
    pub spectral: Option<(f64, f64)>,
    /// Progress is reported every `progress_rate` outer iterations.
    pub progress_rate: u32,
}

/// Ring detector on the unit sphere accumulating XYZ power.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotropicRgbDetector {
    rings: usize,
    discretization: PatchDiscretization,
    pole_ring: usize,
    top: Box<[AngularPatch<Xyz>]>,
    bottom: Box<[AngularPatch<Xyz>]>,
}

impl IsotropicRgbDetector {
    /// Creates `rings` rings per hemisphere.
    pub fn new(rings: usize, discretization: PatchDiscretization) -> Self {
        let scheme = discretization.scheme();
        let bounds = scheme.rings(rings);
        let uniform_psa = scheme.uniform_ring_psa(rings);
        let top: Box<[AngularPatch<Xyz>]> = bounds
            .iter()
            .map(|&(tb, te)| {
                let mut patch = AngularPatch::new((tb, te), (0.0, TAU));
                match uniform_psa {
                    Some(psa) => {
                        patch.solid_projected_angle = psa;
                        patch.known_value = FRAC_1_PI;
                    },
                    None => {
                        patch.solid_projected_angle = projected_solid_angle(tb, te, TAU);
                        patch.cos_theta_mean = (tb.cos().abs() + te.cos().abs()) * 0.5;
                        patch.area = TAU * (te.sin() - tb.sin()).abs();
                    },
                }
                patch
            })
            .collect();
        let bottom = top
            .iter()
            .map(|p| {
                let mut mirrored = p.clone();
                mirrored.theta_begin = PI - p.theta_end;
                mirrored.theta_end = PI - p.theta_begin;
                mirrored
            })
            .collect();
        Self {
            rings,
            discretization,
            pole_ring: bounds
                .iter()
                .position(|&(_, te)| te >= FRAC_PI_2 - NEAR_ZERO)
                .unwrap_or(0),
            top,
            bottom,
        }
    }

    /// Number of rings per hemisphere.
    pub fn n_rings(&self) -> usize { self.rings }

    /// Ring boundary policy.
    pub fn discretization(&self) -> PatchDiscretization { self.discretization }

    /// Rings of one hemisphere.
    pub fn patches(&self, hemisphere: Hemisphere) -> &[AngularPatch<Xyz>] {
        match hemisphere {
            Hemisphere::Top => &self.top,
            Hemisphere::Bottom => &self.bottom,
        }
    }

    /// Iterates over the rings of both hemispheres, top first.
    pub fn iter_patches(&self) -> impl Iterator<Item = &AngularPatch<Xyz>> {
        self.top.iter().chain(self.bottom.iter())
    }

    /// Finds the ring containing the given detector polar angle.
    pub fn ring_from_theta(&self, theta: f64) -> Option<(Hemisphere, usize)> {
        let find = |patches: &[AngularPatch<Xyz>]| {
            patches
                .iter()
                .position(|p| p.theta_begin <= theta && theta <= p.theta_end)
        };
        if theta <= FRAC_PI_2 {
            if let Some(ring) = find(&self.top) {
                return Some((Hemisphere::Top, ring));
            }
        }
        if theta >= FRAC_PI_2 {
            return find(&self.bottom).map(|ring| (Hemisphere::Bottom, ring));
        }
        None
    }

    /// Clears the power and ratios of every ring.
    pub fn reset(&mut self) {
        self.top.iter_mut().chain(self.bottom.iter_mut()).for_each(AngularPatch::clear);
    }

    /// Sum of the accumulated luminance (Y).
    pub fn total_luminance(&self) -> f64 { self.iter_patches().map(|p| p.power.y).sum() }

    /// Root mean square error of the ratios against the known values.
    pub fn rms_error(&self) -> f64 { rms_error(self.iter_patches()) }

    fn deposit(&mut self, hit: DetectorHit, power: Xyz) {
        let target = match hit {
            DetectorHit::Pole(hemisphere) => Some((hemisphere, self.pole_ring)),
            DetectorHit::Direction(sph) => self.ring_from_theta(sph.theta),
        };
        let patch = target.and_then(|(hemisphere, ring)| match hemisphere {
            Hemisphere::Top => self.top.get_mut(ring),
            Hemisphere::Bottom => self.bottom.get_mut(ring),
        });
        match patch {
            Some(patch) => patch.deposit(power),
            None => log::warn!("Couldn't find ring for hit {:?}", hit),
        }
    }

    /// Measures the material lit from a fixed direction.
    ///
    /// The emitter sits on the unit sphere at `(emitter_theta, 0)` and fires
    /// every trial at the origin. Wavelengths of spectral trials are drawn
    /// uniformly in the given range; those outside the colour matching
    /// tables contribute nothing.
    pub fn perform_measurement(
        &mut self,
        setup: &IsotropicSetup,
        mut progress: Option<&mut (dyn ProgressCallback + '_)>,
        rng: &mut dyn RngCore,
    ) -> MeasurementStatus {
        let Some(spf) = setup.material.spf() else {
            log::debug!("Material has no scattering phase function, nothing to measure");
            return MeasurementStatus::NotMeasurable;
        };
        log::info!(
            "Measuring isotropic response, emitter at {:.2}°, {} x {} samples",
            setup.emitter_theta.to_degrees(),
            setup.outer_samples,
            setup.inner_samples
        );
        self.reset();

        let total = setup.outer_samples as u64 * setup.inner_samples as u64;
        let power_each = if total == 0 {
            0.0
        } else {
            setup.radiant_power / total as f64
        };
        let emitter = sph_to_cart(setup.emitter_theta, 0.0);
        let incident = Ray::new(emitter, -emitter);
        let sphere = SphereGeometry::new(1.0);
        let mut scattered = ScatteredRays::new();
        let mut trials = 0u64;
        let mut status = MeasurementStatus::Completed;

        for i in 0..setup.outer_samples {
            for _ in 0..setup.inner_samples {
                trials += 1;
                let nm = setup
                    .spectral
                    .map(|(begin, end)| begin + canonical(rng) * (end - begin));
                let Some(ray) = scatter_once(spf, incident, nm, &mut scattered, rng) else {
                    continue;
                };
                let power = match nm {
                    Some(nm) => match xyz_from_nm(nm) {
                        Some(xyz) => xyz * (power_each * ray.kray_nm),
                        None => continue,
                    },
                    None => Xyz::from(ray.kray * power_each),
                };
                let probe = Ray::new(ray.ray.org, ray.ray.dir.normalize());
                let hit = sphere
                    .intersect(&probe, false, true)
                    .and_then(|hit| DetectorHit::from_point(hit.point, sphere.radius));
                if let Some(hit) = hit {
                    self.deposit(hit, power);
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
        normalize(&mut self.top, emitted);
        normalize(&mut self.bottom, emitted);
        status
    }
}
