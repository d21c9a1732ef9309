//! Control lines of the display: chip select, data/command, reset, boost
//! converter enable, and the four buttons.
//!
//! The original TinyScreen routes these through an SX1505 I2C GPIO
//! expander ([Expander]); the TinyScreen+ wires them to MCU pins
//! ([DirectIo]). Both implement [ControlLines], which is all the driver
//! core depends on.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

/// Framing and auxiliary signals around SPI transfers.
#[allow(async_fn_in_trait)]
pub trait ControlLines {
    type Error;

    /// Puts the lines in their idle state and pulses the controller reset.
    async fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Self::Error>;

    /// Asserts chip select with data/command signalling a command.
    async fn begin_command(&mut self) -> Result<(), Self::Error>;

    /// Asserts chip select with data/command signalling data.
    async fn begin_data(&mut self) -> Result<(), Self::Error>;

    /// Deasserts chip select.
    async fn end_frame(&mut self) -> Result<(), Self::Error>;

    /// Enables the boost converter that powers the panel.
    async fn power_up(&mut self) -> Result<(), Self::Error>;

    /// Disables the boost converter.
    async fn shutdown(&mut self) -> Result<(), Self::Error>;

    /// Pressed buttons in the four low bits, in wiring order (see
    /// [crate::Buttons]). Not remapped for flip.
    async fn read_raw_buttons(&mut self) -> Result<u8, Self::Error>;
}

/// Control lines wired straight to MCU pins.
///
/// The HAL is expected to hand over the outputs configured as push-pull
/// and the button inputs with pull-ups enabled. Buttons are active low and
/// are reported in the order they are given.
pub struct DirectIo<DC, CS, SHDN, RST, BTN> {
    dc: DC,
    cs: CS,
    shdn: SHDN,
    rst: RST,
    buttons: [BTN; 4],
}

impl<DC, CS, SHDN, RST, BTN> DirectIo<DC, CS, SHDN, RST, BTN> {
    pub fn new(dc: DC, cs: CS, shdn: SHDN, rst: RST, buttons: [BTN; 4]) -> Self {
        Self {
            dc,
            cs,
            shdn,
            rst,
            buttons,
        }
    }

    /// Returns the pins to you.
    pub fn release(self) -> (DC, CS, SHDN, RST, [BTN; 4]) {
        (self.dc, self.cs, self.shdn, self.rst, self.buttons)
    }
}

impl<DC, CS, SHDN, RST, BTN, E> ControlLines for DirectIo<DC, CS, SHDN, RST, BTN>
where
    DC: OutputPin<Error = E>,
    CS: OutputPin<Error = E>,
    SHDN: OutputPin<Error = E>,
    RST: OutputPin<Error = E>,
    BTN: InputPin<Error = E>,
{
    type Error = E;

    async fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.shdn.set_low()?;
        self.dc.set_high()?;
        self.cs.set_high()?;
        self.rst.set_high()?;
        // RST is active low.
        self.rst.set_low()?;
        delay.delay_ms(5).await;
        self.rst.set_high()
    }

    async fn begin_command(&mut self) -> Result<(), E> {
        self.dc.set_low()?;
        self.cs.set_low()
    }

    async fn begin_data(&mut self) -> Result<(), E> {
        self.dc.set_high()?;
        self.cs.set_low()
    }

    async fn end_frame(&mut self) -> Result<(), E> {
        self.cs.set_high()
    }

    async fn power_up(&mut self) -> Result<(), E> {
        self.shdn.set_high()
    }

    async fn shutdown(&mut self) -> Result<(), E> {
        self.shdn.set_low()
    }

    async fn read_raw_buttons(&mut self) -> Result<u8, E> {
        let mut bits = 0;
        for (i, pin) in self.buttons.iter_mut().enumerate() {
            if pin.is_low()? {
                bits |= 1 << i;
            }
        }
        Ok(bits)
    }
}

/// Register access on a remote device, such as a GPIO expander.
#[allow(async_fn_in_trait)]
pub trait RegisterIo {
    type Error;

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;

    async fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error>;
}

/// [RegisterIo] over an `embedded-hal-async` I2C bus.
pub struct I2cRegisters<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cRegisters<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterIo for I2cRegisters<I2C> {
    type Error = I2C::Error;

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[reg, value]).await
    }

    async fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
        let mut value = [0];
        self.i2c.write_read(self.address, &[reg], &mut value).await?;
        Ok(value[0])
    }
}

/// SX1505 register addresses.
pub mod register {
    pub const DATA: u8 = 0x00;
    pub const DIRECTION: u8 = 0x01;
    pub const PULL_UP: u8 = 0x02;
    pub const INTERRUPT_MASK: u8 = 0x05;
    pub const SENSE_HIGH: u8 = 0x06;
    pub const INTERRUPT_SOURCE: u8 = 0x08;
}

/// SX1505 I2C address with the address resistor in the default position.
pub const EXPANDER_ADDRESS: u8 = 0x20;

// Expander pin assignment.
const DC: u8 = 0x01;
const CS: u8 = 0x02;
const SHDN: u8 = 0x04;
const RES: u8 = 0x08;
const BUTTONS: u8 = 0xF0;

const COMMAND_START: u8 = !(CS | DC);
const DATA_START: u8 = !CS;
const TRANSFER_END: u8 = CS | SHDN;
const BOOST_OFF: u8 = !SHDN;

/// Control lines behind an SX1505 GPIO expander.
///
/// Every write to the data register drives all outputs at once, including
/// the boost converter enable. All framing patterns keep SHDN high, so any
/// frame after [ControlLines::shutdown] turns the boost converter back on;
/// [Self::boost_enabled] tracks the last state written.
pub struct Expander<R> {
    regs: R,
    boost_enabled: bool,
}

impl<I2C: I2c> Expander<I2cRegisters<I2C>> {
    /// Creates an expander on the I2C bus. `alternate_address` selects
    /// 0x21 instead of 0x20, matching the address resistor on the board.
    pub fn i2c(i2c: I2C, alternate_address: bool) -> Self {
        Self::new(I2cRegisters::new(
            i2c,
            EXPANDER_ADDRESS + alternate_address as u8,
        ))
    }
}

impl<R: RegisterIo> Expander<R> {
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            boost_enabled: false,
        }
    }

    pub fn release(self) -> R {
        self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Whether the last data register write left the boost converter on.
    pub fn boost_enabled(&self) -> bool {
        self.boost_enabled
    }

    /// Unmasks interrupts on the four button pins, triggering on both
    /// edges.
    pub async fn enable_button_interrupts(&mut self) -> Result<(), R::Error> {
        self.regs
            .write_register(register::SENSE_HIGH, 0xFF)
            .await?;
        self.regs
            .write_register(register::INTERRUPT_MASK, !BUTTONS)
            .await
    }

    /// Reads and clears pending button interrupts. Returns the buttons
    /// that changed, in the same bit layout as the raw button state.
    pub async fn take_button_interrupts(&mut self) -> Result<u8, R::Error> {
        let source = self.regs.read_register(register::INTERRUPT_SOURCE).await?;
        let pending = source & BUTTONS;
        if pending != 0 {
            // Bits are cleared by writing ones.
            self.regs
                .write_register(register::INTERRUPT_SOURCE, pending)
                .await?;
        }
        Ok(pending >> 4)
    }

    async fn write_data(&mut self, value: u8) -> Result<(), R::Error> {
        self.regs.write_register(register::DATA, value).await?;
        self.boost_enabled = value & SHDN != 0;
        Ok(())
    }
}

impl<R: RegisterIo> ControlLines for Expander<R> {
    type Error = R::Error;

    async fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), R::Error> {
        // Reset low, everything else high, then make reset an output.
        self.write_data(!RES).await?;
        self.regs.write_register(register::DIRECTION, !RES).await?;
        delay.delay_ms(5).await;
        // Release reset by turning it back into an input.
        self.regs
            .write_register(register::DIRECTION, !(CS | DC | SHDN))
            .await?;
        self.regs.write_register(register::PULL_UP, BUTTONS).await
    }

    async fn begin_command(&mut self) -> Result<(), R::Error> {
        self.write_data(COMMAND_START).await
    }

    async fn begin_data(&mut self) -> Result<(), R::Error> {
        self.write_data(DATA_START).await
    }

    async fn end_frame(&mut self) -> Result<(), R::Error> {
        self.write_data(TRANSFER_END).await
    }

    async fn power_up(&mut self) -> Result<(), R::Error> {
        // The next frame write does it.
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), R::Error> {
        self.write_data(BOOST_OFF).await
    }

    async fn read_raw_buttons(&mut self) -> Result<u8, R::Error> {
        let value = self.regs.read_register(register::DATA).await?;
        // Buttons are active low and sit in the upper nibble.
        Ok((!value >> 4) & 0x0F)
    }
}
