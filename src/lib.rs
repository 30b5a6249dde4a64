//! ANSI Console Driver Library
//!
//! The layer between a text UI and a VT-compatible terminal:
//!
//! - `core`: Cells, attributes and the screen grid
//! - `renderer`: Screen differ emitting minimal escape sequences
//! - `input`: Raw input records, key decoding and mouse gesture tracking
//! - `console`: The terminal I/O port (Unix raw mode, fake console)
//! - `mainloop`: Cooperative timer/idle scheduler and its drivers
//! - `driver`: One console session tying the pieces together
//! - `app`: Driver configuration

pub mod app;
pub mod console;
pub mod core;
pub mod driver;
pub mod input;
pub mod mainloop;
pub mod renderer;

pub use driver::{ConsoleDriver, ConsoleEvent};
pub use mainloop::MainLoop;
