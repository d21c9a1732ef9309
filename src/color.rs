use embedded_graphics_core::{pixelcolor::Bgr565, prelude::RgbColor};

use crate::BitDepth;

/// Color with 6 bits per channel, the form the controller's drawing
/// commands take.
///
/// Red and blue come from 5-bit (or narrower) sources, so their LSB is
/// usually zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb6 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb6 {
    pub const MAX: u8 = 0x3F;

    /// Creates a color, dropping bits above the sixth.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r & Self::MAX,
            g: g & Self::MAX,
            b: b & Self::MAX,
        }
    }

    /// Decodes a packed pixel value as it would be streamed in the given
    /// bit depth: `BBBBBGGGGGGRRRRR` for 16-bit, `BBBGGGRR` in the low byte
    /// for 8-bit.
    pub const fn from_packed(color: u16, bit_depth: BitDepth) -> Self {
        match bit_depth {
            BitDepth::Sixteen => {
                let r = (color & 0x1F) as u8;
                let g = ((color >> 5) & 0x3F) as u8;
                let b = ((color >> 11) & 0x1F) as u8;
                Self::new(r << 1, g, b << 1)
            }
            BitDepth::Eight => {
                let r = (color & 0x03) as u8;
                let g = ((color >> 2) & 0x07) as u8;
                let b = ((color >> 5) & 0x07) as u8;
                // Repeat the bits to span the full range.
                Self::new(r | (r << 2) | (r << 4), g | (g << 3), b | (b << 3))
            }
        }
    }
}

impl From<Bgr565> for Rgb6 {
    fn from(c: Bgr565) -> Self {
        Self::new(c.r() << 1, c.g(), c.b() << 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_bit_decoding_keeps_every_channel_value() {
        for r in 0..=31u16 {
            for g in 0..=63u16 {
                for b in 0..=31u16 {
                    let c = Rgb6::from_packed((b << 11) | (g << 5) | r, BitDepth::Sixteen);
                    assert_eq!((c.r >> 1, c.g, c.b >> 1), (r as u8, g as u8, b as u8));
                    assert_eq!(c.r & 1, 0);
                    assert_eq!(c.b & 1, 0);
                }
            }
        }
    }

    #[test]
    fn eight_bit_decoding_expands_to_full_scale() {
        for r in 0..=3u16 {
            for g in 0..=7u16 {
                for b in 0..=7u16 {
                    let c = Rgb6::from_packed((b << 5) | (g << 2) | r, BitDepth::Eight);
                    assert_eq!((c.r & 3, c.g & 7, c.b & 7), (r as u8, g as u8, b as u8));
                }
            }
        }
        assert_eq!(Rgb6::from_packed(0xFF, BitDepth::Eight), Rgb6::new(63, 63, 63));
        assert_eq!(Rgb6::from_packed(0x00, BitDepth::Eight), Rgb6::default());
    }

    #[test]
    fn eight_bit_ignores_high_byte() {
        assert_eq!(
            Rgb6::from_packed(0xFF03, BitDepth::Eight),
            Rgb6::from_packed(0x0003, BitDepth::Eight)
        );
    }

    #[test]
    fn converts_bgr565_and_bit_replicates() {
        assert_eq!(Rgb6::from(Bgr565::new(31, 0, 1)), Rgb6::new(62, 0, 2));
        assert_eq!(Rgb6::from(Bgr565::WHITE), Rgb6::new(62, 63, 62));
        assert_eq!(
            Rgb6::from_packed(0b011_010_01, BitDepth::Eight),
            Rgb6::new(21, 18, 27)
        );
    }

    #[test]
    fn new_masks_to_six_bits() {
        assert_eq!(Rgb6::new(0xFF, 0x40, 0x3F), Rgb6::new(0x3F, 0, 0x3F));
    }
}
