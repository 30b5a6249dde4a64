//! Escape Sequence Vocabulary
//!
//! The VT/ANSI control sequences the driver emits. Helpers append to a
//! `String` so a whole row can be assembled before it is written.

use std::fmt::Write;

use crate::core::{Attribute, Color};

/// Show the cursor (DECTCEM set)
pub const SHOW_CURSOR: &str = "\x1b[?25h";
/// Hide the cursor (DECTCEM reset)
pub const HIDE_CURSOR: &str = "\x1b[?25l";
/// Save the cursor and switch to the alternate screen buffer
pub const ENTER_ALTERNATE_SCREEN: &str = "\x1b[?1049h";
/// Return to the main screen buffer and restore the cursor
pub const LEAVE_ALTERNATE_SCREEN: &str = "\x1b[?1049l";
/// Report any-motion mouse events in SGR encoding, plus focus changes
pub const ENABLE_MOUSE_REPORTING: &str = "\x1b[?1003h\x1b[?1006h\x1b[?1004h";
pub const DISABLE_MOUSE_REPORTING: &str = "\x1b[?1004l\x1b[?1006l\x1b[?1003l";

/// Cursor styles selectable with DECSCUSR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    UserDefault = 0,
    BlinkingBlock = 1,
    SteadyBlock = 2,
    BlinkingUnderline = 3,
    SteadyUnderline = 4,
    BlinkingBar = 5,
    SteadyBar = 6,
}

/// Absolute cursor position (CUP), 1-based
pub fn cursor_position(out: &mut String, row: usize, col: usize) {
    let _ = write!(out, "\x1b[{};{}H", row, col);
}

/// Set the cursor style (DECSCUSR)
pub fn cursor_style(out: &mut String, style: CursorStyle) {
    let _ = write!(out, "\x1b[{} q", style as u8);
}

pub fn foreground_rgb(out: &mut String, r: u8, g: u8, b: u8) {
    let _ = write!(out, "\x1b[38;2;{};{};{}m", r, g, b);
}

pub fn background_rgb(out: &mut String, r: u8, g: u8, b: u8) {
    let _ = write!(out, "\x1b[48;2;{};{};{}m", r, g, b);
}

pub fn foreground_indexed(out: &mut String, color: Color) {
    let _ = write!(out, "\x1b[{}m", color.ansi_fg_code());
}

pub fn background_indexed(out: &mut String, color: Color) {
    let _ = write!(out, "\x1b[{}m", color.ansi_bg_code());
}

/// Select an attribute's colors, in true color or approximated to the
/// 16-color palette
pub fn set_attribute(out: &mut String, attribute: Attribute, force_16_colors: bool) {
    if force_16_colors {
        foreground_indexed(out, attribute.foreground);
        background_indexed(out, attribute.background);
    } else {
        let (r, g, b) = attribute.foreground.to_rgb();
        foreground_rgb(out, r, g, b);
        let (r, g, b) = attribute.background.to_rgb();
        background_rgb(out, r, g, b);
    }
}
