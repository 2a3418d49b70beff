//! Detector whose patches refine themselves where power accumulates.
//!
//! The angular domain is a quad-tree stored in an arena. A leaf keeps the
//! samples deposited into it; once its power exceeds the threshold (and the
//! patch budget allows) it splits into four quadrants and replays its
//! samples into them. Splitting may cascade when the samples are
//! concentrated; it stops at nodes narrower than `2 * NEAR_ZERO`, which keep
//! growing like leaves without budget.

use crate::{
    engine::{
        perform_measurement, Detector, DetectorHit, MeasurementSetup, MeasurementStatus,
        ProgressCallback,
    },
    normalize::normalize,
    patch::{projected_solid_angle, AngularPatch},
};
use base::math::NEAR_ZERO;
use rand::RngCore;
use std::f64::consts::{FRAC_1_PI, FRAC_PI_2, TAU};

/// A deposited sample kept by a leaf until it splits.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Sample {
    theta: f64,
    phi: f64,
    power: f64,
}

/// Angular bounds of a node.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Bounds {
    theta_begin: f64,
    theta_end: f64,
    phi_begin: f64,
    phi_end: f64,
}

impl Bounds {
    fn contains(&self, theta: f64, phi: f64) -> bool {
        self.theta_begin <= theta
            && theta <= self.theta_end
            && self.phi_begin <= phi
            && phi <= self.phi_end
    }

    fn mid(&self) -> (f64, f64) {
        (
            (self.theta_begin + self.theta_end) * 0.5,
            (self.phi_begin + self.phi_end) * 0.5,
        )
    }

    /// Whether the node is too narrow to be bisected again.
    fn is_saturated(&self) -> bool {
        let (tm, pm) = self.mid();
        self.theta_end - self.theta_begin <= 2.0 * NEAR_ZERO
            || self.phi_end - self.phi_begin <= 2.0 * NEAR_ZERO
            || tm <= self.theta_begin
            || tm >= self.theta_end
            || pm <= self.phi_begin
            || pm >= self.phi_end
    }

    /// Picks the quadrant a sample is routed to and the bounds that quadrant
    /// uses for its own routing.
    ///
    /// Only the midpoints are compared: a sample within `NEAR_ZERO` above
    /// the end of a low half keeps going to the high side of each node
    /// instead of dropping into quadrant 3 along both axes.
    fn route(&self, theta: f64, phi: f64) -> (usize, Bounds) {
        let (tm, pm) = self.mid();
        let quadrant = match (theta < tm, phi < pm) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        (quadrant, self.child(quadrant))
    }

    /// Routing bounds of a quadrant. The low halves end `NEAR_ZERO` before
    /// the midpoint so that a sample on the split line belongs to the high
    /// half.
    fn child(&self, quadrant: usize) -> Bounds {
        let (tm, pm) = self.mid();
        let (theta_begin, theta_end) = if quadrant < 2 {
            (self.theta_begin, tm - NEAR_ZERO)
        } else {
            (tm, self.theta_end)
        };
        let (phi_begin, phi_end) = if quadrant % 2 == 0 {
            (self.phi_begin, pm - NEAR_ZERO)
        } else {
            (pm, self.phi_end)
        };
        Bounds {
            theta_begin,
            theta_end,
            phi_begin,
            phi_end,
        }
    }

    /// Exact bisection used when flattening.
    fn quadrant(&self, quadrant: usize) -> Bounds {
        let (tm, pm) = self.mid();
        let (theta_begin, theta_end) = if quadrant < 2 {
            (self.theta_begin, tm)
        } else {
            (tm, self.theta_end)
        };
        let (phi_begin, phi_end) = if quadrant % 2 == 0 {
            (self.phi_begin, pm)
        } else {
            (pm, self.phi_end)
        };
        Bounds {
            theta_begin,
            theta_end,
            phi_begin,
            phi_end,
        }
    }
}

/// Node of the quad-tree. Internal nodes own four consecutive nodes starting
/// at `first_child`.
#[derive(Debug, Clone, Default)]
struct Node {
    first_child: Option<usize>,
    total_power: f64,
    samples: Vec<Sample>,
}

const ROOT: usize = 0;

/// Adaptive quad-tree detector over the top hemisphere.
#[derive(Debug, Clone)]
pub struct AdaptiveQuadtreeDetector {
    radius: f64,
    threshold: f64,
    max_patches: usize,
    domain: Bounds,
    nodes: Vec<Node>,
    patches_used: usize,
    deposited: f64,
    /// Patches of the last measurement pass, normalized.
    patches: Vec<AngularPatch>,
}

impl AdaptiveQuadtreeDetector {
    /// Creates a detector covering `theta in [0, pi/2]`, `phi in [0, 2pi]`.
    ///
    /// # Arguments
    ///
    /// * `radius` - radius of the detector sphere.
    /// * `threshold` - power a leaf may hold before splitting.
    /// * `max_patches` - budget of patches created by splits.
    pub fn new(radius: f64, threshold: f64, max_patches: usize) -> Self {
        Self::with_domain(radius, threshold, max_patches, (0.0, FRAC_PI_2), (0.0, TAU))
    }

    /// Creates a detector covering the given angular ranges.
    pub fn with_domain(
        radius: f64,
        threshold: f64,
        max_patches: usize,
        theta: (f64, f64),
        phi: (f64, f64),
    ) -> Self {
        Self {
            radius,
            threshold,
            max_patches,
            domain: Bounds {
                theta_begin: theta.0,
                theta_end: theta.1,
                phi_begin: phi.0,
                phi_end: phi.1,
            },
            nodes: vec![Node::default()],
            patches_used: 0,
            deposited: 0.0,
            patches: Vec::new(),
        }
    }

    /// Discards the tree and starts again from a single root leaf.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::default());
        self.patches_used = 0;
        self.deposited = 0.0;
        self.patches.clear();
    }

    /// Radius of the detector sphere.
    pub fn radius(&self) -> f64 { self.radius }

    /// Split threshold.
    pub fn threshold(&self) -> f64 { self.threshold }

    /// Patch budget.
    pub fn max_patches(&self) -> usize { self.max_patches }

    /// Patches created by splits so far.
    pub fn patches_used(&self) -> usize { self.patches_used }

    /// Number of leaves of the tree.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.first_child.is_none())
            .count()
    }

    /// Whether the root has split.
    pub fn is_split(&self) -> bool { self.nodes[ROOT].first_child.is_some() }

    /// Sum of the power accepted by [`deposit_sample`](Self::deposit_sample).
    pub fn total_power(&self) -> f64 { self.deposited }

    /// Patches produced by the last measurement pass, with their ratios.
    pub fn patches(&self) -> &[AngularPatch] { &self.patches }

    /// Deposits power at a direction given in detector angles.
    ///
    /// Samples outside the detector domain are rejected and `false` is
    /// returned.
    pub fn deposit_sample(&mut self, theta: f64, phi: f64, power: f64) -> bool {
        if !self.domain.contains(theta, phi) {
            return false;
        }
        self.deposited += power;

        // Samples still to be routed, each with the node to start from. A
        // split pushes the samples of the split leaf in reverse so they are
        // replayed in deposit order before anything else.
        let mut pending = vec![(ROOT, self.domain, Sample { theta, phi, power })];
        while let Some((start, bounds, sample)) = pending.pop() {
            let (leaf, bounds) = self.descend(start, bounds, &sample);
            let node = &mut self.nodes[leaf];
            node.samples.push(sample);
            node.total_power += sample.power;
            if node.total_power <= self.threshold {
                continue;
            }
            if self.patches_used >= self.max_patches {
                log::trace!("Patch budget of {} exhausted, leaf keeps growing", self.max_patches);
            } else if bounds.is_saturated() {
                log::trace!("Leaf {:?} reached the angular resolution, keeps growing", bounds);
            } else {
                let samples = self.split(leaf);
                pending.extend(samples.into_iter().rev().map(|s| (leaf, bounds, s)));
            }
        }
        true
    }

    /// Follows the routing from `node` down to the leaf receiving `sample`.
    fn descend(&self, mut node: usize, mut bounds: Bounds, sample: &Sample) -> (usize, Bounds) {
        while let Some(first) = self.nodes[node].first_child {
            let (quadrant, child) = bounds.route(sample.theta, sample.phi);
            node = first + quadrant;
            bounds = child;
        }
        (node, bounds)
    }

    /// Turns a leaf into an internal node and returns the samples it held.
    fn split(&mut self, node: usize) -> Vec<Sample> {
        let first = self.nodes.len();
        self.nodes.resize_with(first + 4, Node::default);
        self.patches_used += 4;
        self.nodes[node].first_child = Some(first);
        std::mem::take(&mut self.nodes[node].samples)
    }

    /// Collects the leaves, depth first with quadrants in order, as patches
    /// holding their accumulated power. Does not modify the tree.
    pub fn flatten_tree(&self) -> Vec<AngularPatch> {
        let mut patches = Vec::new();
        let mut stack = vec![(ROOT, self.domain)];
        while let Some((node, bounds)) = stack.pop() {
            match self.nodes[node].first_child {
                Some(first) => {
                    // Reversed so that quadrant 0 is visited first.
                    for quadrant in (0..4).rev() {
                        stack.push((first + quadrant, bounds.quadrant(quadrant)));
                    }
                },
                None => {
                    let mut patch = AngularPatch::new(
                        (bounds.theta_begin, bounds.theta_end),
                        (bounds.phi_begin, bounds.phi_end),
                    );
                    patch.power = self.nodes[node].total_power;
                    patch.known_value = FRAC_1_PI;
                    patch.solid_projected_angle = projected_solid_angle(
                        bounds.theta_begin,
                        bounds.theta_end,
                        bounds.phi_end - bounds.phi_begin,
                    );
                    patches.push(patch);
                },
            }
        }
        patches
    }

    /// Runs a measurement pass on this detector.
    pub fn perform_measurement(
        &mut self,
        setup: &MeasurementSetup,
        progress: Option<&mut (dyn ProgressCallback + '_)>,
        rng: &mut dyn RngCore,
    ) -> MeasurementStatus {
        perform_measurement(self, setup, progress, rng)
    }
}

impl Detector for AdaptiveQuadtreeDetector {
    fn radius(&self) -> f64 { self.radius }

    fn begin_pass(&mut self) { self.reset(); }

    fn deposit(&mut self, hit: DetectorHit, power: f64) {
        match hit {
            DetectorHit::Direction(sph) => {
                if !self.deposit_sample(sph.theta, sph.phi, power) {
                    log::trace!("Sample outside the detector domain: {:?}", sph);
                }
            },
            DetectorHit::Pole(hemisphere) => {
                log::trace!("Ignoring hit on the pole of the {}", hemisphere);
            },
        }
    }

    fn end_pass(&mut self, incident_power: f64) {
        if self.patches_used >= self.max_patches {
            log::debug!(
                "Adaptive detector used its whole budget of {} patches",
                self.max_patches
            );
        }
        self.patches = self.flatten_tree();
        normalize(&mut self.patches, incident_power);
    }
}

impl AdaptiveQuadtreeDetector {
    /// Checks the structural invariants of the tree; used by tests.
    #[cfg(test)]
    fn check_invariants(&self) -> Result<(), String> {
        let mut stack = vec![(ROOT, self.domain)];
        while let Some((i, bounds)) = stack.pop() {
            let node = &self.nodes[i];
            if bounds.theta_begin >= bounds.theta_end || bounds.phi_begin >= bounds.phi_end {
                return Err(format!("node {} has empty bounds {:?}", i, bounds));
            }
            match node.first_child {
                Some(first) => {
                    if !node.samples.is_empty() {
                        return Err(format!("internal node {} keeps samples", i));
                    }
                    stack.extend((0..4).map(|q| (first + q, bounds.child(q))));
                },
                None => {
                    if node.total_power > self.threshold
                        && self.patches_used < self.max_patches
                        && !bounds.is_saturated()
                    {
                        return Err(format!("leaf {} exceeds the threshold with budget left", i));
                    }
                    let slack = Bounds {
                        theta_begin: bounds.theta_begin - 2.0 * NEAR_ZERO,
                        theta_end: bounds.theta_end + 2.0 * NEAR_ZERO,
                        phi_begin: bounds.phi_begin - 2.0 * NEAR_ZERO,
                        phi_end: bounds.phi_end + 2.0 * NEAR_ZERO,
                    };
                    let foreign = node.samples.iter().find(|s| !slack.contains(s.theta, s.phi));
                    if let Some(s) = foreign {
                        return Err(format!("leaf {} holds foreign sample {:?}", i, s));
                    }
                },
            }
        }
        Ok(())
    }
}
