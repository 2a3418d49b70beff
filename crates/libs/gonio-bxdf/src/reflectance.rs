//! Reflectance carried by scattered rays.

use base::color::Rgb;
use serde::{Deserialize, Serialize};

/// Reflectance of a surface, either as an RGB triple or as a sampled
/// spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reflectance {
    /// Constant RGB reflectance.
    Rgb(Rgb),
    /// Spectral reflectance given as `(wavelength in nm, value)` pairs sorted
    /// by wavelength.
    Spectral(Vec<(f64, f64)>),
}

impl Default for Reflectance {
    fn default() -> Self { Self::grey(1.0) }
}

impl Reflectance {
    /// Reflectance with the same value on every channel.
    pub const fn grey(value: f64) -> Self { Self::Rgb(Rgb::splat(value)) }

    /// RGB reflectance. A spectrum is reduced to its mean sample value.
    pub fn rgb(&self) -> Rgb {
        match self {
            Reflectance::Rgb(rgb) => *rgb,
            Reflectance::Spectral(samples) => {
                if samples.is_empty() {
                    return Rgb::default();
                }
                let mean = samples.iter().map(|(_, v)| v).sum::<f64>() / samples.len() as f64;
                Rgb::splat(mean)
            },
        }
    }

    /// Reflectance at the given wavelength.
    ///
    /// RGB reflectance yields the mean of its channels. Spectra are
    /// interpolated linearly and clamped to their end values.
    pub fn at_nm(&self, nm: f64) -> f64 {
        match self {
            Reflectance::Rgb(rgb) => rgb.mean(),
            Reflectance::Spectral(samples) => match samples.as_slice() {
                [] => 0.0,
                [(_, v)] => *v,
                [(first_nm, first), .., (last_nm, last)] => {
                    if nm <= *first_nm {
                        return *first;
                    }
                    if nm >= *last_nm {
                        return *last;
                    }
                    let idx = samples.partition_point(|(x, _)| *x <= nm);
                    let (x0, y0) = samples[idx - 1];
                    let (x1, y1) = samples[idx];
                    if x1 == x0 {
                        y0
                    } else {
                        y0 + (y1 - y0) * (nm - x0) / (x1 - x0)
                    }
                },
            },
        }
    }
}
