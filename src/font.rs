//! Bitmap font text rendering.
//!
//! Glyphs are streamed straight into a RAM window sized to the character,
//! so text needs no pixel buffer. Fonts use the layout of the TinyScreen
//! font tables; see [Font].

use embedded_hal_async::delay::DelayNs;

use crate::control::ControlLines;
use crate::transport::{self, BlockTransfer, ByteTransfer};
use crate::{DriverError, Error, Ssd1331, X_MAX, Y_MAX};

/// Width and bitmap position of one character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharInfo {
    pub width: u8,
    pub offset: u16,
}

/// A monochrome bitmap font covering the character codes `first..=last`.
///
/// `chars` is indexed by `code - first`. A glyph `width` pixels wide takes
/// `bytes_per_row = ceil(width / 8)` bytes per row and
/// `bytes_per_row * height` bytes in total starting at its `offset`. The
/// bytes are stored back to front: byte `b` of row `y` sits at
/// `offset + bytes_per_row * height - 1 - y - (bytes_per_row - 1 - b) * height`.
/// The most significant bit of a byte is its leftmost pixel.
#[derive(Clone, Copy, Debug)]
pub struct Font<'a> {
    pub height: u8,
    pub first: u8,
    pub last: u8,
    pub chars: &'a [CharInfo],
    pub bitmap: &'a [u8],
}

impl<'a> Font<'a> {
    /// Metrics of `code`, if the font has it.
    pub fn char_info(&self, code: u8) -> Option<CharInfo> {
        if code < self.first || code > self.last {
            return None;
        }
        self.chars.get((code - self.first) as usize).copied()
    }

    /// Whether pixel (x, y) of the glyph is set. Pixels outside the bitmap
    /// read as unset.
    pub fn pixel(&self, info: CharInfo, x: u8, y: u8) -> bool {
        let height = self.height as usize;
        let bytes_per_row = (info.width as usize).div_ceil(8);
        let byte = x as usize / 8;
        if byte >= bytes_per_row || y as usize >= height {
            return false;
        }
        let last = info.offset as usize + bytes_per_row * height - 1;
        let index = last - y as usize - (bytes_per_row - 1 - byte) * height;
        let bits = self.bitmap.get(index).copied().unwrap_or(0);
        bits & (0x80 >> (x % 8)) != 0
    }

    /// Pixels taken by `text` including one column of spacing per
    /// character. Codes outside the font take no space.
    pub fn print_width(&self, text: &str) -> u32 {
        text.bytes()
            .filter_map(|code| self.char_info(code))
            .map(|info| info.width as u32 + 1)
            .sum()
    }
}

/// Cursor, colors and font used by the text methods of the driver.
pub(crate) struct TextState {
    font: Option<Font<'static>>,
    x: u8,
    y: u8,
    foreground: u16,
    background: u16,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            x: 0,
            y: 0,
            foreground: 0xFFFF,
            background: 0x0000,
        }
    }
}

impl<BUS, CTL, D, DMA> Ssd1331<BUS, CTL, D, DMA>
where
    BUS: ByteTransfer,
    CTL: ControlLines,
    D: DelayNs,
    DMA: BlockTransfer,
{
    /// Selects the font used by the text methods.
    pub fn set_font(&mut self, font: Font<'static>) {
        self.text.font = Some(font);
    }

    /// Height of the current font, 0 without one.
    pub fn font_height(&self) -> u8 {
        self.text.font.map_or(0, |f| f.height)
    }

    /// Moves the text cursor to (x, y), the top left corner of the next
    /// character.
    pub fn set_cursor(&mut self, x: u8, y: u8) {
        self.text.x = x;
        self.text.y = y;
    }

    pub fn cursor(&self) -> (u8, u8) {
        (self.text.x, self.text.y)
    }

    /// Sets text and background colors, as packed values in the bit depth
    /// the text will be drawn in.
    pub fn font_color(&mut self, foreground: u16, background: u16) {
        self.text.foreground = foreground;
        self.text.background = background;
    }

    /// Width `text` would take in the current font, 0 without one.
    pub fn print_width(&self, text: &str) -> u32 {
        self.text.font.map_or(0, |f| f.print_width(text))
    }

    /// Draws one character at the cursor and advances the cursor past it.
    ///
    /// Nothing is drawn if no font is set, the font lacks the character,
    /// or the cursor is off the panel. Glyphs running off the right or
    /// bottom edge are cut.
    pub async fn write_char(&mut self, code: u8) -> Result<(), DriverError<BUS, CTL>> {
        let Some(font) = self.text.font else {
            return Ok(());
        };
        let Some(info) = font.char_info(code) else {
            return Ok(());
        };
        let (x, y) = (self.text.x, self.text.y);
        if x > X_MAX || y > Y_MAX {
            return Ok(());
        }

        // One extra column on the right for spacing.
        self.set_column_window(x, x.saturating_add(info.width)).await?;
        self.set_row_window(y, y.saturating_add(font.height.saturating_sub(1)))
            .await?;

        let columns = info.width.min(X_MAX - x + 1);
        let rows = font.height.min(Y_MAX - y + 1);
        let spacing = x as u16 + info.width as u16 <= X_MAX as u16;
        let (fg, bg) = (self.text.foreground, self.text.background);
        let skip = 2 - self.config.bit_depth.bytes();

        let pixels = (0..rows).flat_map(move |row| {
            (0..columns)
                .map(move |col| if font.pixel(info, col, row) { fg } else { bg })
                .chain(spacing.then_some(bg))
        });
        let bytes = pixels.flat_map(move |color| color.to_be_bytes().into_iter().skip(skip));

        self.begin_data().await?;
        let sent = transport::write_pipelined(&mut self.bus, bytes)
            .await
            .map_err(Error::Bus);
        let ended = self.end_frame().await;
        sent.and(ended)?;

        self.text.x = x.saturating_add(info.width).saturating_add(1);
        Ok(())
    }

    /// Draws `text` character by character. See [Self::write_char].
    pub async fn write_str(&mut self, text: &str) -> Result<(), DriverError<BUS, CTL>> {
        for code in text.bytes() {
            self.write_char(code).await?;
        }
        Ok(())
    }
}
