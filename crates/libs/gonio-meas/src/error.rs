//! Error kinds raised outside the sampling loop.

use base::error::GonioError;

/// Reasons a set of measurement parameters is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    /// Outer or inner sample count is zero.
    #[error("the number of {0} samples must be positive")]
    ZeroSamples(&'static str),

    /// Radiant power is zero, negative or not finite.
    #[error("the radiant power must be positive, got {0}")]
    NonPositivePower(f64),

    /// A radius is zero, negative or not finite.
    #[error("the {what} radius must be positive, got {value}")]
    NonPositiveRadius {
        /// Which radius.
        what: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Ring count of a grid is odd or too small.
    #[error("the number of theta rings must be even and at least 2, got {0}")]
    InvalidRingCount(usize),

    /// A count that must be positive is zero.
    #[error("the number of {0} must be positive")]
    ZeroCount(&'static str),

    /// Adaptive split threshold is not positive.
    #[error("the split threshold must be positive, got {0}")]
    NonPositiveThreshold(f64),

    /// Wavelength range is empty, reversed or negative.
    #[error("invalid wavelength range [{0}, {1}] nm")]
    InvalidWavelengthRange(f64, f64),

    /// Emitter polar angle outside `[0, 90]` degrees.
    #[error("the emitter polar angle must lie in [0, 90] degrees, got {0}")]
    InvalidEmitterTheta(f64),
}

impl From<ParamsError> for GonioError {
    fn from(err: ParamsError) -> Self {
        GonioError::new("Invalid measurement parameters", Some(Box::new(err)))
    }
}

/// Reasons two detectors cannot be merged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    /// Ring, slice, radius or discretization differ.
    #[error("detector layouts differ: {0}")]
    LayoutMismatch(&'static str),
}
