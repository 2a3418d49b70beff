//! Measurement of a grid detector spread over the rayon thread pool.

use crate::{
    engine::{accumulate, Detector, MeasurementSetup, MeasurementStatus},
    grid::FixedGridDetector,
};
use base::random::seeded_rng;
use rayon::prelude::*;

/// Outer iterations handled by one task.
///
/// Fixed so that results depend only on the seed, not on the number of
/// worker threads.
const OUTER_ITERATIONS_PER_TASK: u32 = 8;

/// Measures `detector` with the outer loop split across rayon tasks.
///
/// Every task samples into its own copy of the detector with a generator
/// seeded from `seed` and the task index; the copies are merged back and
/// normalized once by the total emitted power. The copies share the layout
/// of `detector`, so merging them cannot fail. The pass cannot be cancelled
/// and reports no progress.
pub fn measure_grid_parallel(
    detector: &mut FixedGridDetector,
    setup: &MeasurementSetup,
    seed: u64,
) -> MeasurementStatus {
    let Some(spf) = setup.material.spf() else {
        log::debug!("Material has no scattering phase function, nothing to measure");
        return MeasurementStatus::NotMeasurable;
    };
    let n_tasks = setup.outer_samples.div_ceil(OUTER_ITERATIONS_PER_TASK);
    log::info!(
        "Measuring {} x {} samples in {} tasks",
        setup.outer_samples,
        setup.inner_samples,
        n_tasks
    );
    detector.begin_pass();

    let template = &*detector;
    let partials: Vec<(FixedGridDetector, f64)> = (0..n_tasks)
        .into_par_iter()
        .map(|task| {
            let begin = task * OUTER_ITERATIONS_PER_TASK;
            let end = (begin + OUTER_ITERATIONS_PER_TASK).min(setup.outer_samples);
            let mut partial = template.clone();
            let mut rng = seeded_rng(seed, task as u64);
            let outcome = accumulate(&mut partial, spf, setup, begin..end, None, &mut rng);
            (partial, outcome.emitted_power)
        })
        .collect();

    log::debug!("Merging {} partial detectors", partials.len());
    let mut emitted = 0.0;
    for (partial, power) in &partials {
        detector.add_power(partial);
        emitted += power;
    }
    detector.end_pass(emitted);
    MeasurementStatus::Completed
}
