//! RAM window addressing, accelerated drawing commands and raw pixel
//! streaming.
//!
//! Coordinates are RAM indices, `0..=X_MAX` and `0..=Y_MAX`. Window-like
//! operations clamp out-of-range ends to the panel edge; operations that
//! start outside the panel are ignored.

use embedded_hal_async::delay::DelayNs;

use crate::color::Rgb6;
use crate::command::{Command, Window};
use crate::control::ControlLines;
use crate::transport::{self, BlockTransfer, ByteTransfer};
use crate::{BitDepth, DriverError, Error, Frame, Ssd1331, X_MAX, Y_MAX};

// Time the controller needs to execute accelerated commands.
const CLEAR_DELAY_US: u32 = 400;
const RECT_DELAY_US: u32 = 400;
const LINE_DELAY_US: u32 = 100;

/// Clamps both ends of a span to `max`. An end before the start extends
/// the span to `max` instead of wrapping.
fn clamp_span(start: u8, end: u8, max: u8) -> (u8, u8) {
    let start = start.min(max);
    let end = end.min(max);
    if end < start {
        (start, max)
    } else {
        (start, end)
    }
}

/// Window covering `w` by `h` pixels from (x, y), cut at the panel edge.
/// `None` if the start is off the panel or the size is zero.
fn sized_window(x: u8, y: u8, w: u8, h: u8) -> Option<Window> {
    if x > X_MAX || y > Y_MAX || w == 0 || h == 0 {
        return None;
    }
    Some(Window {
        x0: x,
        y0: y,
        x1: x.saturating_add(w - 1).min(X_MAX),
        y1: y.saturating_add(h - 1).min(Y_MAX),
    })
}

impl<BUS, CTL, D, DMA> Ssd1331<BUS, CTL, D, DMA>
where
    BUS: ByteTransfer,
    CTL: ControlLines,
    D: DelayNs,
    DMA: BlockTransfer,
{
    /// Sets the column range of the RAM window. Pixel data wraps to the
    /// next row after `end`.
    pub async fn set_column_window(
        &mut self,
        start: u8,
        end: u8,
    ) -> Result<(), DriverError<BUS, CTL>> {
        let (start, end) = clamp_span(start, end, X_MAX);
        self.send_commands(&[Command::ColumnAddress(start, end)])
            .await
    }

    /// Sets the row range of the RAM window. Pixel data wraps to the top of
    /// the window after `end`.
    pub async fn set_row_window(
        &mut self,
        start: u8,
        end: u8,
    ) -> Result<(), DriverError<BUS, CTL>> {
        let (start, end) = clamp_span(start, end, Y_MAX);
        self.send_commands(&[Command::RowAddress(start, end)]).await
    }

    /// Points the RAM write position at (x, y), with the window extending to
    /// the bottom right corner. Does nothing if the pixel is off the panel.
    pub async fn goto_pixel(&mut self, x: u8, y: u8) -> Result<(), DriverError<BUS, CTL>> {
        if x > X_MAX || y > Y_MAX {
            return Ok(());
        }
        self.set_column_window(x, X_MAX).await?;
        self.set_row_window(y, Y_MAX).await
    }

    /// Clears `w` by `h` pixels starting at (x, y) to black.
    pub async fn clear_window(
        &mut self,
        x: u8,
        y: u8,
        w: u8,
        h: u8,
    ) -> Result<(), DriverError<BUS, CTL>> {
        let Some(window) = sized_window(x, y, w, h) else {
            return Ok(());
        };
        self.send_commands(&[Command::ClearWindow(window)]).await?;
        self.settle(CLEAR_DELAY_US).await;
        Ok(())
    }

    /// Clears the whole panel.
    pub async fn clear_screen(&mut self) -> Result<(), DriverError<BUS, CTL>> {
        self.clear_window(0, 0, X_MAX + 1, Y_MAX + 1).await
    }

    /// Draws a `w` by `h` rectangle at (x, y), outlined or filled with
    /// `color`.
    pub async fn draw_rect(
        &mut self,
        x: u8,
        y: u8,
        w: u8,
        h: u8,
        filled: bool,
        color: Rgb6,
    ) -> Result<(), DriverError<BUS, CTL>> {
        let Some(window) = sized_window(x, y, w, h) else {
            return Ok(());
        };
        self.send_commands(&[
            Command::SetFillEnabled(filled),
            Command::DrawRectangle(window, color, color),
        ])
        .await?;
        self.settle(RECT_DELAY_US).await;
        Ok(())
    }

    /// [Self::draw_rect] with a packed color in the configured bit depth.
    pub async fn draw_rect_packed(
        &mut self,
        x: u8,
        y: u8,
        w: u8,
        h: u8,
        filled: bool,
        color: u16,
    ) -> Result<(), DriverError<BUS, CTL>> {
        let color = Rgb6::from_packed(color, self.config.bit_depth);
        self.draw_rect(x, y, w, h, filled, color).await
    }

    /// Draws a line from (x0, y0) to (x1, y1).
    ///
    /// Each coordinate is clamped to the panel on its own, so a line that
    /// leaves the panel changes direction rather than being clipped.
    pub async fn draw_line(
        &mut self,
        x0: u8,
        y0: u8,
        x1: u8,
        y1: u8,
        color: Rgb6,
    ) -> Result<(), DriverError<BUS, CTL>> {
        self.send_commands(&[Command::DrawLine(
            x0.min(X_MAX),
            y0.min(Y_MAX),
            x1.min(X_MAX),
            y1.min(Y_MAX),
            color,
        )])
        .await?;
        self.settle(LINE_DELAY_US).await;
        Ok(())
    }

    /// [Self::draw_line] with a packed color in the configured bit depth.
    pub async fn draw_line_packed(
        &mut self,
        x0: u8,
        y0: u8,
        x1: u8,
        y1: u8,
        color: u16,
    ) -> Result<(), DriverError<BUS, CTL>> {
        let color = Rgb6::from_packed(color, self.config.bit_depth);
        self.draw_line(x0, y0, x1, y1, color).await
    }

    /// Sets one pixel to a packed color. This is slow: it takes two
    /// command frames and a data frame.
    pub async fn draw_pixel(
        &mut self,
        x: u8,
        y: u8,
        color: u16,
    ) -> Result<(), DriverError<BUS, CTL>> {
        if x > X_MAX || y > Y_MAX {
            return Ok(());
        }
        self.goto_pixel(x, y).await?;
        self.begin_data().await?;
        let written = self.write_pixel(color).await;
        let ended = self.end_frame().await;
        written.and(ended)
    }

    /// Sets the master current, 0 (dimmest) to 15.
    pub async fn set_brightness(&mut self, level: u8) -> Result<(), DriverError<BUS, CTL>> {
        self.send_commands(&[Command::MasterCurrent(level.min(15))])
            .await
    }

    /// Sets the per-channel contrast.
    pub async fn set_contrast(
        &mut self,
        r: u8,
        g: u8,
        b: u8,
    ) -> Result<(), DriverError<BUS, CTL>> {
        self.send_commands(&[Command::Contrast(r, g, b)]).await
    }

    /// Writes one pixel at the current RAM position: the high byte, then
    /// the low byte in 16-bit mode, only the low byte in 8-bit mode.
    ///
    /// Requires an open data frame.
    pub async fn write_pixel(&mut self, color: u16) -> Result<(), DriverError<BUS, CTL>> {
        debug_assert_eq!(self.frame, Some(Frame::Data));
        if self.config.bit_depth == BitDepth::Sixteen {
            self.bus.transfer((color >> 8) as u8).await.map_err(Error::Bus)?;
        }
        self.bus.transfer(color as u8).await.map_err(Error::Bus)
    }

    /// Streams pixel data to the current RAM window as fast as the bus
    /// allows, loading each byte as soon as the previous one is out.
    ///
    /// Requires an open data frame; any number of calls may share it.
    pub async fn write_buffer(&mut self, data: &[u8]) -> Result<(), DriverError<BUS, CTL>> {
        debug_assert_eq!(self.frame, Some(Frame::Data));
        transport::write_pipelined(&mut self.bus, data.iter().copied())
            .await
            .map_err(Error::Bus)
    }

    /// Hands `data` to the DMA engine and returns once the transfer has
    /// started. Waits for the previous DMA transfer first.
    ///
    /// Requires an open data frame, which must stay open until
    /// [Self::dma_ready]. Without a DMA engine this is [Self::write_buffer].
    pub async fn write_buffer_dma(
        &mut self,
        data: &'static [u8],
    ) -> Result<(), DriverError<BUS, CTL>> {
        if !self.dma.is_available() {
            #[cfg(feature = "defmt")]
            defmt::trace!("ssd1331: no DMA, writing {=usize} bytes", data.len());
            return self.write_buffer(data).await;
        }
        debug_assert_eq!(self.frame, Some(Frame::Data));
        self.dma.wait_ready().await;
        self.dma.start(data);
        Ok(())
    }

    /// Writes a `w` by `h` block of pixel data at (x, y) in its own data
    /// frame. `data` holds the rows back to back in the configured bit
    /// depth.
    ///
    /// Parts of the block beyond the panel edge are skipped; a block
    /// starting off the panel is ignored.
    pub async fn write_pixels(
        &mut self,
        data: &[u8],
        x: u8,
        y: u8,
        w: u8,
        h: u8,
    ) -> Result<(), DriverError<BUS, CTL>> {
        let Some(window) = sized_window(x, y, w, h) else {
            return Ok(());
        };
        self.set_column_window(window.x0, window.x1).await?;
        self.set_row_window(window.y0, window.y1).await?;

        let bpp = self.config.bit_depth.bytes();
        let visible = (window.x1 - window.x0 + 1) as usize * bpp;
        let rows = (window.y1 - window.y0 + 1) as usize;

        self.begin_data().await?;
        let mut sent = Ok(());
        for row in data.chunks(w as usize * bpp).take(rows) {
            sent = self.write_buffer(&row[..visible.min(row.len())]).await;
            if sent.is_err() {
                break;
            }
        }
        let ended = self.end_frame().await;
        sent.and(ended)
    }

    /// Whether the last DMA transfer has completed. Always true without a
    /// DMA engine.
    pub fn dma_ready(&self) -> bool {
        self.dma.is_ready()
    }

    /// Waits for the last DMA transfer to complete.
    pub async fn wait_dma(&mut self) {
        self.dma.wait_ready().await
    }

    async fn settle(&mut self, us: u32) {
        if self.config.draw_delays {
            self.delay.delay_us(us).await;
        }
    }
}
