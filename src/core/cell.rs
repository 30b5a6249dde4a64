//! Screen Cell
//!
//! Represents a single position of the driver's logical screen: the rune,
//! its colors, any attached combining marks, and whether the renderer still
//! owes the terminal an update for it.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

/// Color representation supporting the 16 console colors and RGB colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// Standard 16-color palette (0-15)
    Indexed(u8),
    /// 24-bit RGB color
    Rgb(u8, u8, u8),
}

impl Color {
    /// Standard ANSI colors (0-7)
    pub const BLACK: Color = Color::Indexed(0);
    pub const RED: Color = Color::Indexed(1);
    pub const GREEN: Color = Color::Indexed(2);
    pub const YELLOW: Color = Color::Indexed(3);
    pub const BLUE: Color = Color::Indexed(4);
    pub const MAGENTA: Color = Color::Indexed(5);
    pub const CYAN: Color = Color::Indexed(6);
    pub const WHITE: Color = Color::Indexed(7);

    /// Bright ANSI colors (8-15)
    pub const BRIGHT_BLACK: Color = Color::Indexed(8);
    pub const BRIGHT_RED: Color = Color::Indexed(9);
    pub const BRIGHT_GREEN: Color = Color::Indexed(10);
    pub const BRIGHT_YELLOW: Color = Color::Indexed(11);
    pub const BRIGHT_BLUE: Color = Color::Indexed(12);
    pub const BRIGHT_MAGENTA: Color = Color::Indexed(13);
    pub const BRIGHT_CYAN: Color = Color::Indexed(14);
    pub const BRIGHT_WHITE: Color = Color::Indexed(15);

    /// Convert a palette index to RGB using typical xterm defaults
    pub fn indexed_to_rgb(index: u8) -> (u8, u8, u8) {
        PALETTE[(index & 0x0f) as usize]
    }

    /// Get the RGB value of this color
    pub fn to_rgb(self) -> (u8, u8, u8) {
        match self {
            Color::Indexed(i) => Self::indexed_to_rgb(i),
            Color::Rgb(r, g, b) => (r, g, b),
        }
    }

    /// Get the nearest entry of the 16-color palette
    pub fn to_indexed(self) -> u8 {
        match self {
            Color::Indexed(i) => i & 0x0f,
            Color::Rgb(r, g, b) => nearest_palette_index(r, g, b),
        }
    }

    /// SGR parameter selecting this color as foreground in 16-color mode
    pub fn ansi_fg_code(self) -> u8 {
        match self.to_indexed() {
            i @ 0..=7 => 30 + i,
            i => 90 + (i - 8),
        }
    }

    /// SGR parameter selecting this color as background in 16-color mode
    pub fn ansi_bg_code(self) -> u8 {
        self.ansi_fg_code() + 10
    }
}

const PALETTE: [(u8, u8, u8); 16] = [
    (0, 0, 0),       // Black
    (205, 0, 0),     // Red
    (0, 205, 0),     // Green
    (205, 205, 0),   // Yellow
    (0, 0, 238),     // Blue
    (205, 0, 205),   // Magenta
    (0, 205, 205),   // Cyan
    (229, 229, 229), // White
    (127, 127, 127), // Bright Black
    (255, 0, 0),     // Bright Red
    (0, 255, 0),     // Bright Green
    (255, 255, 0),   // Bright Yellow
    (92, 92, 255),   // Bright Blue
    (255, 0, 255),   // Bright Magenta
    (0, 255, 255),   // Bright Cyan
    (255, 255, 255), // Bright White
];

fn nearest_palette_index(r: u8, g: u8, b: u8) -> u8 {
    let distance = |&(pr, pg, pb): &(u8, u8, u8)| {
        let dr = pr as i32 - r as i32;
        let dg = pg as i32 - g as i32;
        let db = pb as i32 - b as i32;
        dr * dr + dg * dg + db * db
    };
    PALETTE
        .iter()
        .enumerate()
        .min_by_key(|(_, entry)| distance(entry))
        .map(|(i, _)| i as u8)
        .unwrap_or(7)
}

/// Foreground and background pair applied to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub foreground: Color,
    pub background: Color,
}

impl Attribute {
    pub const fn new(foreground: Color, background: Color) -> Self {
        Self {
            foreground,
            background,
        }
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::new(Color::WHITE, Color::BLACK)
    }
}

/// A single cell in the screen grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// The base rune displayed in this cell
    pub rune: char,
    /// Colors the rune is drawn with
    pub attribute: Attribute,
    /// Zero-width marks drawn on top of the base rune
    pub combining_marks: Vec<char>,
    dirty: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            rune: ' ',
            attribute: Attribute::default(),
            combining_marks: Vec::new(),
            dirty: false,
        }
    }
}

impl Cell {
    /// Create a new dirty cell holding a rune
    pub fn new(rune: char, attribute: Attribute) -> Self {
        Self {
            rune,
            attribute,
            combining_marks: Vec::new(),
            dirty: true,
        }
    }

    /// Whether the terminal has not yet been updated with this cell
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Display width of the base rune (control runes count as one column)
    pub fn width(&self) -> usize {
        self.rune.width().unwrap_or(1).max(1)
    }

    /// Whether the rune occupies two terminal columns
    pub fn is_wide(&self) -> bool {
        self.width() == 2
    }

    /// Whether the rune lies outside the Basic Multilingual Plane
    pub fn is_astral(&self) -> bool {
        self.rune as u32 > 0xFFFF
    }

    /// Terminals disagree about how far the cursor moves after wide runes,
    /// astral runes and combined sequences, so output is written up to and
    /// including such a cell before anything else is appended.
    pub fn forces_flush(&self) -> bool {
        self.is_wide() || self.is_astral() || !self.combining_marks.is_empty()
    }

    /// Reset the cell to a blank and mark it dirty
    pub fn erase(&mut self, attribute: Attribute) {
        self.rune = ' ';
        self.attribute = attribute;
        self.combining_marks.clear();
        self.dirty = true;
    }
}
