//! Async driver for SSD1331-based OLED modules such as the TinyScreen.
//!
//! The 96x64 panel is fed over SPI. The chip select, data/command, reset
//! and boost converter lines are wired either directly to MCU pins
//! ([DirectIo]) or to an SX1505 I2C GPIO expander ([Expander]), which also
//! reads the four corner buttons.
//!
//! Besides the controller's accelerated primitives (lines, rectangles,
//! window clears), the driver streams raw pixel data into an addressed RAM
//! window, and renders bitmap fonts.

#![cfg_attr(not(test), no_std)]

use command::Command;
use embedded_graphics_core::prelude::{OriginDimensions, Size};
use embedded_hal::spi::MODE_0;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

mod buttons;
mod color;
mod command;
mod control;
mod draw;
mod font;
#[cfg(test)]
mod mock;
mod transport;

pub use buttons::Buttons;
pub use color::Rgb6;
pub use control::{
    register, ControlLines, DirectIo, Expander, I2cRegisters, RegisterIo, EXPANDER_ADDRESS,
};
pub use embedded_graphics_core::pixelcolor::Bgr565;
pub use font::{CharInfo, Font};
pub use transport::{BlockTransfer, ByteTransfer, NoDma, SpiTransfer};

pub const DISPLAY_WIDTH: u32 = 96;
pub const DISPLAY_HEIGHT: u32 = 64;

/// Largest column index.
pub const X_MAX: u8 = DISPLAY_WIDTH as u8 - 1;
/// Largest row index.
pub const Y_MAX: u8 = DISPLAY_HEIGHT as u8 - 1;

/// SPI clock divisor requested from buses that support
/// [ByteTransfer::set_bus_mode].
pub const BUS_CLOCK_DIVISOR: u8 = 4;

/// Number of bits per pixel in a data transfer.
///
/// 8-bit pixels are `BBBGGGRR`, 16-bit pixels are [Bgr565] sent in
/// big-endian order. The built-in display RAM always uses 16 bits per pixel; when
/// sending 8-bit data, the display controller fills in the lower bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BitDepth {
    #[default]
    Eight = 0x00,
    Sixteen = 0x40,
}

impl BitDepth {
    pub fn bytes(&self) -> usize {
        match self {
            Self::Eight => 1,
            Self::Sixteen => 2,
        }
    }
}

/// Order of the color channels in pixel data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ColorOrder {
    Rgb = 0x00,
    #[default]
    Bgr = 0x04,
}

/// Order in which a data transfer populates a given RAM row.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ColumnDirection {
    LeftToRight = 0x00,
    RightToLeft = 0x02,
}

/// Mapping between RAM rows and physical display rows.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RowDirection {
    Normal = 0x00,
    Reversed = 0x10,
}

/// The TinyScreen panel interleaves odd and even COM lines.
const ROW_INTERLEAVE: u8 = 0x20;

/// Display orientation, pixel format and timing options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Rotate the picture by 180 degrees (upside down).
    pub flip: bool,
    /// Mirror the picture horizontally.
    pub mirror: bool,
    pub bit_depth: BitDepth,
    pub color_order: ColorOrder,
    /// Wait after accelerated drawing commands so the controller can
    /// finish writing its RAM before the next command arrives.
    pub draw_delays: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flip: false,
            mirror: false,
            bit_depth: BitDepth::Eight,
            color_order: ColorOrder::Bgr,
            draw_delays: true,
        }
    }
}

impl Config {
    pub fn with_flip(self, flip: bool) -> Self {
        Self { flip, ..self }
    }

    pub fn with_mirror(self, mirror: bool) -> Self {
        Self { mirror, ..self }
    }

    pub fn with_bit_depth(self, bit_depth: BitDepth) -> Self {
        Self { bit_depth, ..self }
    }

    pub fn with_color_order(self, color_order: ColorOrder) -> Self {
        Self {
            color_order,
            ..self
        }
    }

    pub fn with_draw_delays(self, draw_delays: bool) -> Self {
        Self {
            draw_delays,
            ..self
        }
    }

    /// Value of the controller's remap register for this configuration.
    pub fn remap(&self) -> u8 {
        // Mirroring a flipped panel undoes the column reversal.
        let column_direction = if self.flip != self.mirror {
            ColumnDirection::RightToLeft
        } else {
            ColumnDirection::LeftToRight
        };
        let row_direction = if self.flip {
            RowDirection::Reversed
        } else {
            RowDirection::Normal
        };
        (column_direction as u8)
            | (row_direction as u8)
            | ROW_INTERLEAVE
            | (self.bit_depth as u8)
            | (self.color_order as u8)
    }
}

/// Error type for this driver.
///
/// Only used to propagate errors from the HAL: invalid coordinates are
/// clamped or ignored, never reported.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<BusE, CtlE> {
    Bus(BusE),
    Control(CtlE),
}

/// Error type of a driver built from the given bus and control lines.
pub type DriverError<BUS, CTL> =
    Error<<BUS as ByteTransfer>::Error, <CTL as ControlLines>::Error>;

/// Kind of the currently open transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    Command,
    Data,
}

/// The implementation of the driver.
///
/// Owns the SPI transmit path (`BUS`), the control lines (`CTL`), a delay
/// provider (`D`) and optionally a DMA engine (`DMA`, see
/// [Self::with_dma]).
///
/// All traffic to the controller happens in frames: a command or data
/// transaction bounded by chip select. Drawing methods open and close their
/// own frames. The raw streaming methods ([Self::write_pixel],
/// [Self::write_buffer], [Self::write_buffer_dma]) expect the caller to
/// have positioned a window and opened a data frame with
/// [Self::begin_data], and to close it with [Self::end_frame].
///
/// The driver dutifully propagates all errors from the HAL, but the display
/// controller is stateful and the driver doesn't attempt to return it to a
/// known good state after an error. You can call `init()` to hard-reset the
/// display and reinitialize the driver after an error.
pub struct Ssd1331<BUS, CTL, D, DMA = NoDma> {
    config: Config,

    bus: BUS,
    lines: CTL,
    delay: D,
    dma: DMA,

    frame: Option<Frame>,
    text: font::TextState,

    command_buf: Vec<u8, 16>,
}

impl<BUS, CTL, D, DMA> OriginDimensions for Ssd1331<BUS, CTL, D, DMA> {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl<BUS, CTL, D> Ssd1331<BUS, CTL, D, NoDma>
where
    BUS: ByteTransfer,
    CTL: ControlLines,
    D: DelayNs,
{
    /// Creates a new driver instance and initializes the display.
    ///
    /// The SPI side should run in mode 0, MSB first. Buses that implement
    /// [ByteTransfer::set_bus_mode] are configured during init.
    pub async fn new(
        config: Config,
        bus: BUS,
        lines: CTL,
        delay: D,
    ) -> Result<Self, DriverError<BUS, CTL>> {
        let mut d = Self {
            config,
            bus,
            lines,
            delay,
            dma: NoDma,
            frame: None,
            text: font::TextState::default(),
            command_buf: Vec::new(),
        };

        d.init().await?;

        Ok(d)
    }
}

impl<BUS, CTL, D, DMA> Ssd1331<BUS, CTL, D, DMA> {
    /// Attaches a DMA engine for [Self::write_buffer_dma].
    pub fn with_dma<DMA2: BlockTransfer>(self, mut dma: DMA2) -> Ssd1331<BUS, CTL, D, DMA2> {
        dma.init();
        Ssd1331 {
            config: self.config,
            bus: self.bus,
            lines: self.lines,
            delay: self.delay,
            dma,
            frame: self.frame,
            text: self.text,
            command_buf: self.command_buf,
        }
    }

    /// Consumes the driver and returns the peripherals to you.
    pub fn release(self) -> (BUS, CTL, D, DMA) {
        (self.bus, self.lines, self.delay, self.dma)
    }

    /// Current configuration, including changes made by the setters.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The control lines backend.
    pub fn lines(&self) -> &CTL {
        &self.lines
    }

    /// Access to the control lines, e.g. for expander interrupt setup.
    /// Must not be used to frame transfers behind the driver's back.
    pub fn lines_mut(&mut self) -> &mut CTL {
        &mut self.lines
    }

    /// The frame currently open, if any.
    pub fn open_frame(&self) -> Option<Frame> {
        self.frame
    }
}

impl<BUS, CTL, D, DMA> Ssd1331<BUS, CTL, D, DMA>
where
    BUS: ByteTransfer,
    CTL: ControlLines,
    D: DelayNs,
    DMA: BlockTransfer,
{
    /// Hard-resets and re-initializes the display.
    ///
    /// Also clears the display RAM and turns the panel on. This will take
    /// a few tens of milliseconds. Instances returned by [Self::new] are
    /// already initialized.
    pub async fn init(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("ssd1331: init, remap {=u8:#04x}", self.config.remap());

        self.frame = None;
        self.command_buf.clear();

        self.bus
            .set_bus_mode(MODE_0, BUS_CLOCK_DIVISOR)
            .map_err(Error::Bus)?;
        self.lines
            .reset(&mut self.delay)
            .await
            .map_err(Error::Control)?;
        self.delay.delay_ms(10).await;

        self.off().await?;
        self.command_frame(&command::INIT_SEQUENCE).await?;
        // Default is 15, results in grays saturating at about 50%.
        self.set_brightness(5).await?;
        self.write_remap().await?;
        self.clear_screen().await?;
        self.on().await
    }

    /// Powers the panel up and turns the display on.
    pub async fn on(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("ssd1331: on");

        self.lines.power_up().await.map_err(Error::Control)?;
        // On the expander, opening the frame is what re-enables the boost
        // converter, so the supply settles with chip select asserted.
        self.begin_command().await?;
        self.delay.delay_ms(10).await;
        let sent = self
            .bus
            .transfer(command::DISPLAY_ON)
            .await
            .map_err(Error::Bus);
        let ended = self.end_frame().await;
        sent.and(ended)
    }

    /// Turns the display off and shuts the boost converter down.
    ///
    /// On the expander, any later frame turns the boost converter back on
    /// without turning the display on.
    pub async fn off(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("ssd1331: off");

        self.send_commands(&[Command::DisplayOn(false)]).await?;
        self.lines.shutdown().await.map_err(Error::Control)
    }

    /// Rotates the picture by 180 degrees. Also remaps [Self::read_buttons].
    pub async fn set_flip(&mut self, flip: bool) -> Result<(), DriverError<BUS, CTL>> {
        self.config.flip = flip;
        self.write_remap().await
    }

    pub async fn set_mirror(&mut self, mirror: bool) -> Result<(), DriverError<BUS, CTL>> {
        self.config.mirror = mirror;
        self.write_remap().await
    }

    pub async fn set_bit_depth(
        &mut self,
        bit_depth: BitDepth,
    ) -> Result<(), DriverError<BUS, CTL>> {
        self.config.bit_depth = bit_depth;
        self.write_remap().await
    }

    pub async fn set_color_order(
        &mut self,
        color_order: ColorOrder,
    ) -> Result<(), DriverError<BUS, CTL>> {
        self.config.color_order = color_order;
        self.write_remap().await
    }

    /// Sends the remap register for the current configuration.
    pub async fn write_remap(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        self.send_commands(&[Command::Remap(self.config.remap())])
            .await
    }

    /// Opens a command frame.
    pub async fn begin_command(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        debug_assert!(self.frame.is_none(), "frame already open");
        self.lines.begin_command().await.map_err(Error::Control)?;
        self.frame = Some(Frame::Command);
        Ok(())
    }

    /// Opens a data frame. Pixel data goes to the current RAM window.
    pub async fn begin_data(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        debug_assert!(self.frame.is_none(), "frame already open");
        self.lines.begin_data().await.map_err(Error::Control)?;
        self.frame = Some(Frame::Data);
        Ok(())
    }

    /// Closes the open frame.
    pub async fn end_frame(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        debug_assert!(self.frame.is_some(), "no frame open");
        self.frame = None;
        self.lines.end_frame().await.map_err(Error::Control)
    }

    async fn send_commands(&mut self, commands: &[Command]) -> Result<(), DriverError<BUS, CTL>> {
        for command in commands {
            if command.push(&mut self.command_buf) {
                continue;
            }
            self.flush_commands().await?;
            assert!(command.push(&mut self.command_buf));
        }
        self.flush_commands().await
    }

    async fn flush_commands(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        if self.command_buf.is_empty() {
            return Ok(());
        }
        let buf = core::mem::take(&mut self.command_buf);
        self.command_frame(&buf).await
    }

    /// Sends `bytes` in one command frame. The frame is closed even if the
    /// transfer fails.
    async fn command_frame(&mut self, bytes: &[u8]) -> Result<(), DriverError<BUS, CTL>> {
        self.begin_command().await?;
        let sent = transport::write_pipelined(&mut self.bus, bytes.iter().copied())
            .await
            .map_err(Error::Bus);
        let ended = self.end_frame().await;
        sent.and(ended)
    }
}
