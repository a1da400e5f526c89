//! Gamma correction from 8-bit channel intensities to [`BITS`]-bit
//! modulation thresholds.
//!
//! The curve is `t = ((v + 1)^2 - 1) >> (16 - BITS)`: squaring gives a
//! perceptually even ramp, and the `+1`/`-1` pins both ends so that 0 maps to
//! 0 and 255 maps to the full `2^BITS - 1`.
//!
//! The driver chips sink current on a lit lane, so the corrected pixel is
//! stored bit-complemented: a *cleared* bit means the lane is lit for that
//! bit-plane. Bits above `BITS` in each half are therefore always set, which
//! makes bit-plane `BITS` permanently dark.

use crate::{Pixel, BITS};

/// Maps one 8-bit channel value to its `BITS`-bit threshold.
#[must_use]
pub const fn threshold(value: u8) -> u16 {
    let v = value as u32 + 1;
    ((v * v - 1) >> (16 - BITS)) as u16
}

/// A gamma-corrected, bit-complemented pixel.
///
/// - Bits 31-16: complemented channel B threshold
/// - Bits 15-0: complemented channel A threshold
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct GammaPixel(pub u32);

impl GammaPixel {
    /// Corrects both channels of `pixel`.
    #[must_use]
    pub const fn correct(pixel: Pixel) -> Self {
        let raw = pixel.raw();
        let a = threshold(raw as u8) as u32;
        let b = threshold((raw >> 8) as u8) as u32;
        Self(!(a | (b << 16)))
    }

    /// The complemented 16-bit half for `channel` (0 = A, 1 = B).
    #[must_use]
    pub const fn channel(self, channel: usize) -> u16 {
        (self.0 >> (16 * channel)) as u16
    }

    /// Whether `channel` is lit during bit-plane `bit`.
    #[must_use]
    pub const fn is_lit(self, channel: usize, bit: usize) -> bool {
        self.channel(channel) & (1 << bit) == 0
    }
}

impl From<Pixel> for GammaPixel {
    fn from(pixel: Pixel) -> Self {
        Self::correct(pixel)
    }
}
