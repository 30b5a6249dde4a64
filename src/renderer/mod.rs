//! Renderer Module
//!
//! Turns the driver's grid into VT/ANSI output:
//! - `ansi`: the escape-sequence vocabulary
//! - `diff`: the screen differ that writes only dirty cells

pub mod ansi;
mod diff;

pub use ansi::CursorStyle;
pub use diff::{RenderStats, ScreenRenderer};
