//! Input Decoding Module
//!
//! Turns console input records into normalized key and mouse events.
//!
//! # Keyboard Decoding
//!
//! Key records carry a virtual-key code, the typed character and the
//! control-key state. `key::decode` maps them to a `KeyCode` (base key plus
//! Ctrl/Alt/Shift mask bits) and tracks the Alt latch across records.
//!
//! # Mouse Decoding
//!
//! Mouse records carry raw button bits and event flags. The
//! `MouseGestureTracker` turns them into pressed/released/clicked/double and
//! triple clicked, wheel and motion events.
//!
//! # Unix Input
//!
//! `VtInputTranslator` turns the byte stream of a VT terminal in raw mode
//! into the same records.

pub mod key;
pub mod mouse;
pub mod records;
pub mod vt;

pub use key::{KeyCode, KeyDecoder, KeyEvent};
pub use mouse::{MouseEvent, MouseFlags, MouseGestureTracker};
pub use records::{ControlKeyState, KeyEventRecord, MouseEventRecord, RawInputRecord};
pub use vt::VtInputTranslator;
