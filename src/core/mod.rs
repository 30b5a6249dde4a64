//! Screen Core Module
//!
//! Platform-independent screen state owned by the driver:
//! - Cell representation with colors and combining marks
//! - The grid and its damage region
//! - Points and sizes in character cells
//!
//! Everything here is deterministic; the renderer turns dirty cells into
//! escape sequences and clears them.

mod cell;
mod geometry;
mod grid;

pub use cell::{Attribute, Cell, Color};
pub use geometry::{Point, Size};
pub use grid::{DamageRegion, Grid, Row};
