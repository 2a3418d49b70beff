//! Detector sphere tessellated into a fixed grid of patches.

use crate::{
    discretization::PatchDiscretization,
    engine::{
        perform_measurement, Detector, DetectorHit, MeasurementSetup, MeasurementStatus,
        ProgressCallback,
    },
    error::MergeError,
    normalize::{normalize, rms_error},
    patch::{projected_solid_angle, AngularPatch},
};
use base::{math::NEAR_ZERO, Hemisphere};
use rand::RngCore;
use std::f64::consts::{FRAC_1_PI, FRAC_PI_2, PI, TAU};

/// Detector sphere split into `rings × slices` patches per hemisphere.
///
/// Patches are stored ring by ring: patch `ring * slices + slice`. Bottom
/// patches mirror the top ones with `theta -> pi - theta`.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedGridDetector {
    radius: f64,
    rings: usize,
    slices: usize,
    discretization: PatchDiscretization,
    /// Ring that contains the pole (elevation pi/2) in both hemispheres.
    pole_ring: usize,
    top: Box<[AngularPatch]>,
    bottom: Box<[AngularPatch]>,
}

impl FixedGridDetector {
    /// Creates the patches of both hemispheres.
    ///
    /// # Arguments
    ///
    /// * `theta_rings` - number of rings over the whole sphere; each
    ///   hemisphere gets half of them.
    /// * `phi_slices` - number of azimuthal slices per ring.
    /// * `radius` - radius of the detector sphere.
    /// * `discretization` - placement of the ring boundaries.
    pub fn new(
        theta_rings: usize,
        phi_slices: usize,
        radius: f64,
        discretization: PatchDiscretization,
    ) -> Self {
        let rings = theta_rings / 2;
        let slices = phi_slices;
        let scheme = discretization.scheme();
        let delta_phi = TAU / slices.max(1) as f64;
        let bounds = scheme.rings(rings);

        let mut top = Vec::with_capacity(rings * slices);
        for &(tb, te) in &bounds {
            for j in 0..slices {
                let phi = (j as f64 * delta_phi, (j + 1) as f64 * delta_phi);
                top.push(AngularPatch::new((tb, te), phi));
            }
        }

        let mut detector = Self {
            radius,
            rings,
            slices,
            discretization,
            pole_ring: bounds
                .iter()
                .position(|&(_, te)| te >= FRAC_PI_2 - NEAR_ZERO)
                .unwrap_or(0),
            top: top.into_boxed_slice(),
            bottom: Box::new([]),
        };

        match scheme.uniform_ring_psa(rings) {
            Some(ring_psa) => {
                let psa = ring_psa / slices as f64;
                for patch in detector.top.iter_mut() {
                    patch.solid_projected_angle = psa;
                    patch.known_value = FRAC_1_PI;
                }
            },
            None => detector.compute_patch_areas(),
        }

        detector.bottom = detector
            .top
            .iter()
            .map(|p| {
                let mut mirrored = p.clone();
                mirrored.theta_begin = PI - p.theta_end;
                mirrored.theta_end = PI - p.theta_begin;
                mirrored
            })
            .collect();

        detector
    }

    /// Fills in projected solid angle, mean cosine and area of the top
    /// patches.
    fn compute_patch_areas(&mut self) {
        let sqr_radius = self.radius * self.radius;
        for patch in self.top.iter_mut() {
            let (tb, te, dphi) = (patch.theta_begin, patch.theta_end, patch.delta_phi());
            patch.solid_projected_angle = projected_solid_angle(tb, te, dphi);
            patch.cos_theta_mean = (tb.cos().abs() + te.cos().abs()) * 0.5;
            patch.area = sqr_radius * dphi * (te.sin() - tb.sin()).abs();
            patch.known_value = FRAC_1_PI;
        }
    }

    /// Radius of the detector sphere.
    pub fn radius(&self) -> f64 { self.radius }

    /// Number of rings per hemisphere.
    pub fn n_rings(&self) -> usize { self.rings }

    /// Number of azimuthal slices per ring.
    pub fn n_slices(&self) -> usize { self.slices }

    /// Ring boundary policy.
    pub fn discretization(&self) -> PatchDiscretization { self.discretization }

    /// Number of patches per hemisphere.
    pub fn n_patches(&self) -> usize { self.top.len() }

    /// Patches of one hemisphere.
    pub fn patches(&self, hemisphere: Hemisphere) -> &[AngularPatch] {
        match hemisphere {
            Hemisphere::Top => &self.top,
            Hemisphere::Bottom => &self.bottom,
        }
    }

    /// Mutable access to one patch.
    pub fn patch_mut(&mut self, hemisphere: Hemisphere, index: usize) -> Option<&mut AngularPatch> {
        match hemisphere {
            Hemisphere::Top => self.top.get_mut(index),
            Hemisphere::Bottom => self.bottom.get_mut(index),
        }
    }

    /// Iterates over the patches of both hemispheres, top first.
    pub fn iter_patches(&self) -> impl Iterator<Item = &AngularPatch> {
        self.top.iter().chain(self.bottom.iter())
    }

    /// Finds the patch containing a direction given in detector angles.
    ///
    /// Returns the hemisphere and the index of the patch, or `None` when no
    /// ring matches (out-of-range angles or boundary precision).
    pub fn patch_from_angles(&self, theta: f64, phi: f64) -> Option<(Hemisphere, usize)> {
        if self.slices == 0 || !(0.0..=TAU).contains(&phi) {
            return None;
        }
        let slice = ((phi / TAU * self.slices as f64) as usize).min(self.slices - 1);
        let find_ring = |patches: &[AngularPatch]| {
            (0..self.rings).find(|&ring| {
                let p = &patches[ring * self.slices];
                p.theta_begin <= theta && theta <= p.theta_end
            })
        };
        let hit = if theta <= FRAC_PI_2 {
            find_ring(&self.top).map(|ring| (Hemisphere::Top, ring))
        } else {
            None
        };
        let hit = hit.or_else(|| {
            (theta >= FRAC_PI_2)
                .then(|| find_ring(&self.bottom).map(|ring| (Hemisphere::Bottom, ring)))
                .flatten()
        });
        hit.map(|(hemisphere, ring)| (hemisphere, ring * self.slices + slice))
    }

    /// Clears the power and ratios of every patch.
    pub fn reset(&mut self) {
        self.top.iter_mut().chain(self.bottom.iter_mut()).for_each(AngularPatch::clear);
    }

    /// Adds the accumulated power of another detector with the same layout,
    /// patch by patch.
    pub fn merge(&mut self, other: &FixedGridDetector) -> Result<(), MergeError> {
        if self.rings != other.rings || self.slices != other.slices {
            return Err(MergeError::LayoutMismatch("ring or slice count"));
        }
        if self.discretization != other.discretization {
            return Err(MergeError::LayoutMismatch("discretization"));
        }
        if self.radius != other.radius {
            return Err(MergeError::LayoutMismatch("radius"));
        }
        self.add_power(other);
        Ok(())
    }

    /// Adds the power of a copy of this detector, patch by patch.
    pub(crate) fn add_power(&mut self, other: &FixedGridDetector) {
        let mine = self.top.iter_mut().chain(self.bottom.iter_mut());
        let theirs = other.top.iter().chain(other.bottom.iter());
        for (a, b) in mine.zip(theirs) {
            a.deposit(b.power);
        }
    }

    /// Sum of the power accumulated on every patch.
    pub fn total_power(&self) -> f64 { self.iter_patches().map(|p| p.power).sum() }

    /// Root mean square error of the ratios against the known values.
    pub fn rms_error(&self) -> f64 { rms_error(self.iter_patches()) }

    /// Runs a measurement pass on this detector.
    pub fn perform_measurement(
        &mut self,
        setup: &MeasurementSetup,
        progress: Option<&mut (dyn ProgressCallback + '_)>,
        rng: &mut dyn RngCore,
    ) -> MeasurementStatus {
        perform_measurement(self, setup, progress, rng)
    }

    fn deposit_pole(&mut self, hemisphere: Hemisphere, power: f64) {
        if self.rings == 0 || self.slices == 0 {
            return;
        }
        let share = power / self.slices as f64;
        let start = self.pole_ring * self.slices;
        let patches = match hemisphere {
            Hemisphere::Top => &mut self.top,
            Hemisphere::Bottom => &mut self.bottom,
        };
        for patch in &mut patches[start..start + self.slices] {
            patch.deposit(share);
        }
    }
}

impl Detector for FixedGridDetector {
    fn radius(&self) -> f64 { self.radius }

    fn begin_pass(&mut self) { self.reset(); }

    fn deposit(&mut self, hit: DetectorHit, power: f64) {
        match hit {
            DetectorHit::Pole(hemisphere) => self.deposit_pole(hemisphere, power),
            DetectorHit::Direction(sph) => match self.patch_from_angles(sph.theta, sph.phi) {
                Some((hemisphere, index)) => {
                    if let Some(patch) = self.patch_mut(hemisphere, index) {
                        patch.deposit(power);
                    }
                },
                None => log::warn!(
                    "Couldn't find patch, phi: {}, theta: {}",
                    sph.phi,
                    sph.theta
                ),
            },
        }
    }

    fn end_pass(&mut self, incident_power: f64) {
        normalize(&mut self.top, incident_power);
        normalize(&mut self.bottom, incident_power);
    }
}
