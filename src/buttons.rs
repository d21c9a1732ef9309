use core::ops::{BitAnd, BitOr};

use embedded_hal_async::delay::DelayNs;

use crate::control::ControlLines;
use crate::transport::{BlockTransfer, ByteTransfer};
use crate::{DriverError, Error, Ssd1331};

/// Set of the four corner buttons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buttons(u8);

impl Buttons {
    pub const NONE: Self = Self(0);
    pub const LOWER_LEFT: Self = Self(1 << 0);
    pub const UPPER_LEFT: Self = Self(1 << 1);
    pub const UPPER_RIGHT: Self = Self(1 << 2);
    pub const LOWER_RIGHT: Self = Self(1 << 3);
    pub const ALL: Self = Self(0x0F);

    /// Buttons from the four low bits of `bits`.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Remaps the corners for a flipped panel: upper left swaps with lower
    /// left, upper right with lower right. Applying it twice is a no-op.
    pub const fn flipped(self) -> Self {
        Self(((self.0 & 0b0101) << 1) | ((self.0 & 0b1010) >> 1))
    }
}

impl BitOr for Buttons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Buttons {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl<BUS, CTL, D, DMA> Ssd1331<BUS, CTL, D, DMA>
where
    BUS: ByteTransfer,
    CTL: ControlLines,
    D: DelayNs,
    DMA: BlockTransfer,
{
    /// Returns which of the buttons in `mask` are pressed.
    ///
    /// With [crate::Config::flip] set, buttons are named after where they
    /// appear on the flipped panel.
    pub async fn read_buttons(&mut self, mask: Buttons) -> Result<Buttons, DriverError<BUS, CTL>> {
        let raw = self
            .lines
            .read_raw_buttons()
            .await
            .map_err(Error::Control)?;
        let mut buttons = Buttons::from_bits(raw);
        if self.config.flip {
            buttons = buttons.flipped();
        }
        Ok(buttons & mask)
    }

    /// Returns all pressed buttons.
    pub async fn read_all_buttons(&mut self) -> Result<Buttons, DriverError<BUS, CTL>> {
        self.read_buttons(Buttons::ALL).await
    }
}
