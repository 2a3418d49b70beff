//! Colour and radiometric quantities.

use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    ops::{Add, AddAssign, Mul},
};

/// Quantity of power that can be accumulated on a detector.
///
/// Implemented for plain scalars and for tristimulus values.
pub trait Radiometric:
    Copy + Default + Debug + PartialEq + Add<Output = Self> + AddAssign + Mul<f64, Output = Self>
{
    /// Returns the largest channel.
    fn max_value(&self) -> f64;
}

impl Radiometric for f64 {
    fn max_value(&self) -> f64 { *self }
}

macro_rules! impl_tristimulus {
    ($name:ident, $a:ident, $b:ident, $c:ident) => {
        impl $name {
            /// Creates a new value from its three channels.
            pub const fn new($a: f64, $b: f64, $c: f64) -> Self { Self { $a, $b, $c } }

            /// Creates a value with all three channels set to `v`.
            pub const fn splat(v: f64) -> Self { Self::new(v, v, v) }

            /// Returns the channels as an array.
            pub const fn to_array(&self) -> [f64; 3] { [self.$a, self.$b, self.$c] }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self::new(self.$a + rhs.$a, self.$b + rhs.$b, self.$c + rhs.$c)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.$a += rhs.$a;
                self.$b += rhs.$b;
                self.$c += rhs.$c;
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;

            fn mul(self, rhs: f64) -> Self {
                Self::new(self.$a * rhs, self.$b * rhs, self.$c * rhs)
            }
        }

        impl Radiometric for $name {
            fn max_value(&self) -> f64 { self.$a.max(self.$b).max(self.$c) }
        }
    };
}

/// Linear RGB triple.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
}

/// CIE 1931 XYZ tristimulus value.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Xyz {
    /// X channel.
    pub x: f64,
    /// Y channel (luminance).
    pub y: f64,
    /// Z channel.
    pub z: f64,
}

impl_tristimulus!(Rgb, r, g, b);
impl_tristimulus!(Xyz, x, y, z);

impl Rgb {
    /// Mean of the three channels.
    pub fn mean(&self) -> f64 { (self.r + self.g + self.b) / 3.0 }
}

impl From<Rgb> for Xyz {
    /// Linear Rec. 709 primaries with a D65 white point.
    fn from(c: Rgb) -> Self {
        Xyz::new(
            0.4124564 * c.r + 0.3575761 * c.g + 0.1804375 * c.b,
            0.2126729 * c.r + 0.7151522 * c.g + 0.0721750 * c.b,
            0.0193339 * c.r + 0.1191920 * c.g + 0.9503041 * c.b,
        )
    }
}

/// Shortest wavelength (nm) covered by [`xyz_from_nm`].
pub const CIE_NM_MIN: f64 = 360.0;

/// Longest wavelength (nm) covered by [`xyz_from_nm`].
pub const CIE_NM_MAX: f64 = 830.0;

/// Piecewise gaussian lobe used by the colour matching function fit.
fn lobe(nm: f64, mu: f64, sigma_lo: f64, sigma_hi: f64) -> f64 {
    let t = (nm - mu) / if nm < mu { sigma_lo } else { sigma_hi };
    (-0.5 * t * t).exp()
}

/// Returns the CIE 1931 2° colour matching functions at the given wavelength.
///
/// Uses the multi-lobe analytic fit of Wyman, Sloan and Shirley (2013).
/// Wavelengths outside `[CIE_NM_MIN, CIE_NM_MAX]` yield `None`.
pub fn xyz_from_nm(nm: f64) -> Option<Xyz> {
    if !(CIE_NM_MIN..=CIE_NM_MAX).contains(&nm) {
        return None;
    }
    let x = 1.056 * lobe(nm, 599.8, 37.9, 31.0) + 0.362 * lobe(nm, 442.0, 16.0, 26.7)
        - 0.065 * lobe(nm, 501.1, 20.4, 26.2);
    let y = 0.821 * lobe(nm, 568.8, 46.9, 40.5) + 0.286 * lobe(nm, 530.9, 16.3, 31.1);
    let z = 1.217 * lobe(nm, 437.0, 11.8, 36.0) + 0.681 * lobe(nm, 459.0, 26.0, 13.8);
    Some(Xyz::new(x, y, z))
}
