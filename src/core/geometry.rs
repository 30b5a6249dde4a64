//! Screen Geometry
//!
//! Points and sizes in character cells.

use serde::{Deserialize, Serialize};

/// A position in character cells, origin at the top-left corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Dimensions of the visible window in character cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub cols: usize,
    pub rows: usize,
}

impl Size {
    pub const fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.cols == 0 && self.rows == 0
    }
}
