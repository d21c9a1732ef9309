//! Commands for the SSD1331 controller.
//!
//! The code in this module originated from [ssd1331] crate. Thanks to James
//! Waples and contributors.
//!
//! [ssd1331]:  https://github.com/rust-embedded-community/ssd1331

use heapless::Vec;

use crate::color::Rgb6;

/// Datasheet power-up sequence, sent once during init before the driver
/// applies its own brightness, remap and clear.
pub(crate) const INIT_SEQUENCE: [u8; 32] = [
    0xAE, // display off
    0xA1, 0x00, // start line
    0xA2, 0x00, // display offset
    0xA4, // normal display
    0xA8, 0x3F, // multiplex ratio 1/64
    0xAD, 0x8E, // master configuration, external VCC
    0xB0, 0x0B, // power save off
    0xB1, 0x31, // phase 1 and 2 periods
    0xB3, 0xF0, // clock divider and oscillator frequency
    0x8A, 0x64, 0x8B, 0x78, 0x8C, 0x64, // second pre-charge speed for A, B, C
    0xBB, 0x3A, // pre-charge level
    0xBE, 0x3E, // VCOMH
    0x81, 0x91, 0x82, 0x50, 0x83, 0x7D, // contrast for A, B, C
];

pub(crate) const DISPLAY_ON: u8 = 0xAF;

/// Inclusive rectangle in RAM coordinates, already clamped to the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Window {
    pub x0: u8,
    pub y0: u8,
    pub x1: u8,
    pub y1: u8,
}

#[derive(Clone, Copy)]
pub(crate) enum Command {
    /// Set column start and end address of the RAM window.
    ColumnAddress(u8, u8),
    /// Set row start and end address of the RAM window.
    RowAddress(u8, u8),
    /// Set master current, 0..15 corresponding to 1/16 - 16/16 attenuation.
    MasterCurrent(u8),
    /// Set (r, g, b) contrast. Higher number is higher contrast.
    Contrast(u8, u8, u8),
    /// Turn display on or off.
    DisplayOn(bool),
    /// Set the remap and color depth register.
    Remap(u8),
    /// Fill the given window of RAM with zeros. The controller needs time
    /// to write to the RAM, so you may need a delay after this command.
    ClearWindow(Window),
    /// Draw a line of the given color.
    DrawLine(u8, u8, u8, u8, Rgb6),
    /// Draw rectangle with given border and (if fill mode is enabled)
    /// interior colors.
    DrawRectangle(Window, Rgb6, Rgb6),
    /// Set fill enabled or disabled for DrawRectangle command.
    SetFillEnabled(bool),
}

impl Command {
    pub fn push<const N: usize>(&self, buf: &mut Vec<u8, N>) -> bool {
        // The controller takes colors as (C, B, A) = (blue, green, red).
        let result = match *self {
            Command::ColumnAddress(start, end) => &[0x15, start, end] as &[u8],
            Command::RowAddress(start, end) => &[0x75, start, end],
            Command::MasterCurrent(current) => &[0x87, current.min(15)],
            Command::Contrast(r, g, b) => &[0x81, r, 0x82, g, 0x83, b],
            Command::DisplayOn(on) => &[0xAE | (on as u8)],
            Command::Remap(remap) => &[0xA0, remap],
            Command::ClearWindow(w) => &[0x25, w.x0, w.y0, w.x1, w.y1],
            Command::DrawLine(x0, y0, x1, y1, color) => {
                &[0x21, x0, y0, x1, y1, color.b, color.g, color.r]
            }
            Command::DrawRectangle(w, border, fill) => &[
                0x22, w.x0, w.y0, w.x1, w.y1, border.b, border.g, border.r, fill.b, fill.g,
                fill.r,
            ],
            Command::SetFillEnabled(enabled) => &[0x26, enabled as u8],
        };

        buf.extend_from_slice(result).is_ok()
    }
}
