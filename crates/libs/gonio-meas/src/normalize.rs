//! Conversion of accumulated power into reflectance-like ratios.

use crate::patch::AngularPatch;
use base::color::Radiometric;

/// Ratio of the power reaching a patch to the incident power times the
/// patch's projected solid angle.
///
/// Degenerate denominators give a zero ratio.
pub fn ratio<P: Radiometric>(power: P, incident_power: f64, solid_projected_angle: f64) -> P {
    let denom = incident_power * solid_projected_angle;
    if denom > 0.0 {
        power * (1.0 / denom)
    } else {
        P::default()
    }
}

/// Normalizes every patch against the incident power.
pub fn normalize<P: Radiometric>(patches: &mut [AngularPatch<P>], incident_power: f64) {
    for patch in patches.iter_mut() {
        patch.ratio = ratio(patch.power, incident_power, patch.solid_projected_angle);
    }
}

/// Root mean square difference between the measured ratios and the known
/// reference values.
///
/// For tristimulus patches the largest channel of the ratio is compared.
pub fn rms_error<'a, P, I>(patches: I) -> f64
where
    P: Radiometric + 'a,
    I: IntoIterator<Item = &'a AngularPatch<P>>,
{
    let (sum, count) = patches.into_iter().fold((0.0, 0usize), |(sum, count), patch| {
        let diff = patch.ratio.max_value() - patch.known_value;
        (sum + diff * diff, count + 1)
    });
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}
