//! Byte and block transfer capabilities the driver needs from the SPI side.
//!
//! The display only ever receives data, so the driver never reads from the
//! bus. What it needs is a way to load the next byte into the transmit
//! register and to learn when the previous one has left it. Targets with a
//! register-level SPI implement [ByteTransfer] directly; anything that
//! implements the `embedded-hal-async` [SpiBus] can be wrapped in
//! [SpiTransfer].

use embedded_hal::spi::Mode;
use embedded_hal_async::spi::SpiBus;

/// Single-byte transmit path of a SPI peripheral.
///
/// The waits are `async` so that an implementation can yield to an
/// executor or await an interrupt. The default [Self::wait_complete] spins
/// on [Self::transfer_complete], and has no timeout: a stalled bus hangs the
/// caller.
#[allow(async_fn_in_trait)]
pub trait ByteTransfer {
    type Error;

    /// Configures SPI mode and clock divisor. Buses that were already
    /// configured by the HAL can leave the default, which does nothing.
    fn set_bus_mode(&mut self, _mode: Mode, _clock_divisor: u8) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Loads a byte into the transmit register, starting its transfer.
    async fn load(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Whether the last loaded byte has been sent. Must not block.
    fn transfer_complete(&mut self) -> Result<bool, Self::Error>;

    /// Waits until the last loaded byte has been sent.
    async fn wait_complete(&mut self) -> Result<(), Self::Error> {
        while !self.transfer_complete()? {}
        Ok(())
    }

    /// Sends one byte and waits for it to finish.
    async fn transfer(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.load(byte).await?;
        self.wait_complete().await
    }
}

/// Descriptor-based block transfer engine (DMA) feeding the SPI transmit
/// register.
///
/// Completion is usually signalled by an interrupt handler setting a flag
/// that [Self::is_ready] reads. At most one transfer may be in flight; the
/// driver always waits for [Self::wait_ready] before calling [Self::start].
#[allow(async_fn_in_trait)]
pub trait BlockTransfer {
    /// Whether this engine exists at all. When it returns `false`, the
    /// driver sends DMA buffers with the synchronous byte writer instead.
    fn is_available(&self) -> bool {
        true
    }

    /// One-time setup of the controller, called when the engine is
    /// attached to the driver.
    fn init(&mut self) {}

    /// Whether the previous transfer has completed.
    fn is_ready(&self) -> bool;

    /// Waits for the previous transfer to complete.
    async fn wait_ready(&mut self) {
        while !self.is_ready() {}
    }

    /// Starts sending `data` and returns immediately.
    fn start(&mut self, data: &'static [u8]);
}

/// Placeholder for targets without a DMA engine.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoDma;

impl BlockTransfer for NoDma {
    fn is_available(&self) -> bool {
        false
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn start(&mut self, _data: &'static [u8]) {}
}

/// [ByteTransfer] on top of an `embedded-hal-async` SPI bus.
///
/// Each load is a one-byte write; waiting for completion flushes the bus.
/// This loses the overlap a register-level implementation gets, but works
/// with any HAL.
pub struct SpiTransfer<SPI> {
    spi: SPI,
    pending: bool,
}

impl<SPI> SpiTransfer<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            pending: false,
        }
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiBus> ByteTransfer for SpiTransfer<SPI> {
    type Error = SPI::Error;

    async fn load(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.spi.write(&[byte]).await?;
        self.pending = true;
        Ok(())
    }

    fn transfer_complete(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pending)
    }

    async fn wait_complete(&mut self) -> Result<(), Self::Error> {
        if self.pending {
            self.spi.flush().await?;
            self.pending = false;
        }
        Ok(())
    }
}

/// Streams bytes with the next load issued as soon as the previous byte
/// has left the transmit register.
///
/// Issues exactly one load per byte and waits for completion before every
/// load except the first, plus once at the end.
pub(crate) async fn write_pipelined<B: ByteTransfer>(
    bus: &mut B,
    bytes: impl IntoIterator<Item = u8>,
) -> Result<(), B::Error> {
    let mut bytes = bytes.into_iter();
    let Some(first) = bytes.next() else {
        return Ok(());
    };
    bus.load(first).await?;
    for byte in bytes {
        bus.wait_complete().await?;
        bus.load(byte).await?;
    }
    bus.wait_complete().await
}
