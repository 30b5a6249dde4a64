//! Console Input Records
//!
//! The record model consumed by the decoders. It mirrors the console input
//! records of the Windows console API: key records carry a virtual-key code,
//! a character and the control-key state; mouse records carry raw button
//! bits and event flags. The Unix translator produces the same records from
//! VT byte streams.

use bitflags::bitflags;

use crate::core::{Point, Size};

bitflags! {
    /// Modifier and lock-key state reported with key and mouse records
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ControlKeyState: u32 {
        const RIGHT_ALT_PRESSED = 0x0001;
        const LEFT_ALT_PRESSED = 0x0002;
        const RIGHT_CTRL_PRESSED = 0x0004;
        const LEFT_CTRL_PRESSED = 0x0008;
        const SHIFT_PRESSED = 0x0010;
        const NUMLOCK_ON = 0x0020;
        const SCROLLLOCK_ON = 0x0040;
        const CAPSLOCK_ON = 0x0080;
        const ENHANCED_KEY = 0x0100;
    }
}

impl ControlKeyState {
    pub fn alt(self) -> bool {
        self.intersects(Self::LEFT_ALT_PRESSED | Self::RIGHT_ALT_PRESSED)
    }

    pub fn ctrl(self) -> bool {
        self.intersects(Self::LEFT_CTRL_PRESSED | Self::RIGHT_CTRL_PRESSED)
    }

    pub fn shift(self) -> bool {
        self.contains(Self::SHIFT_PRESSED)
    }

    pub fn caps_lock(self) -> bool {
        self.contains(Self::CAPSLOCK_ON)
    }

    pub fn num_lock(self) -> bool {
        self.contains(Self::NUMLOCK_ON)
    }

    pub fn scroll_lock(self) -> bool {
        self.contains(Self::SCROLLLOCK_ON)
    }
}

bitflags! {
    /// Raw mouse button bits. For wheel records the high word carries the
    /// signed wheel delta instead.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ButtonState: u32 {
        const FROM_LEFT_1ST_BUTTON_PRESSED = 0x0001;
        const RIGHTMOST_BUTTON_PRESSED = 0x0002;
        const FROM_LEFT_2ND_BUTTON_PRESSED = 0x0004;
        const FROM_LEFT_3RD_BUTTON_PRESSED = 0x0008;
        const FROM_LEFT_4TH_BUTTON_PRESSED = 0x0010;
    }
}

impl ButtonState {
    /// Button state of a wheel record carrying the given delta
    pub fn wheel_delta(delta: i16) -> Self {
        Self::from_bits_retain(((delta as i32) << 16) as u32)
    }

    /// Sign of the whole field read as a signed integer
    pub fn signum(self) -> i32 {
        (self.bits() as i32).signum()
    }
}

bitflags! {
    /// Kind of mouse record; empty means a button press or release
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MouseEventFlags: u32 {
        const MOUSE_MOVED = 0x0001;
        const DOUBLE_CLICK = 0x0002;
        const MOUSE_WHEELED = 0x0004;
        const MOUSE_HWHEELED = 0x0008;
    }
}

/// Virtual-key codes understood by the key decoder
pub mod vk {
    pub const BACK: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const CLEAR: u16 = 0x0C;
    pub const RETURN: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12;
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PRIOR: u16 = 0x21;
    pub const NEXT: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const SNAPSHOT: u16 = 0x2C;
    pub const INSERT: u16 = 0x2D;
    pub const DELETE: u16 = 0x2E;
    pub const KEY_0: u16 = 0x30;
    pub const KEY_9: u16 = 0x39;
    pub const KEY_A: u16 = 0x41;
    pub const KEY_Z: u16 = 0x5A;
    pub const F1: u16 = 0x70;
    pub const F12: u16 = 0x7B;
    pub const F24: u16 = 0x87;
    pub const OEM_1: u16 = 0xBA;
    pub const OEM_PLUS: u16 = 0xBB;
    pub const OEM_COMMA: u16 = 0xBC;
    pub const OEM_MINUS: u16 = 0xBD;
    pub const OEM_PERIOD: u16 = 0xBE;
    pub const OEM_2: u16 = 0xBF;
    pub const OEM_3: u16 = 0xC0;
    pub const OEM_4: u16 = 0xDB;
    pub const OEM_5: u16 = 0xDC;
    pub const OEM_6: u16 = 0xDD;
    pub const OEM_7: u16 = 0xDE;
    pub const OEM_8: u16 = 0xDF;
    pub const OEM_102: u16 = 0xE2;
    /// The character was injected as text and carries no real key
    pub const PACKET: u16 = 0xE7;
}

/// A key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEventRecord {
    pub key_down: bool,
    pub repeat_count: u16,
    pub virtual_key_code: u16,
    pub virtual_scan_code: u16,
    pub unicode_char: char,
    pub control_key_state: ControlKeyState,
}

impl KeyEventRecord {
    pub fn new(key_down: bool, virtual_key_code: u16, unicode_char: char, control_key_state: ControlKeyState) -> Self {
        Self {
            key_down,
            repeat_count: 1,
            virtual_key_code,
            virtual_scan_code: 0,
            unicode_char,
            control_key_state,
        }
    }

    /// The matching key-up record
    pub fn released(mut self) -> Self {
        self.key_down = false;
        self
    }
}

/// A mouse button, motion or wheel event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEventRecord {
    pub position: Point,
    pub button_state: ButtonState,
    pub control_key_state: ControlKeyState,
    pub event_flags: MouseEventFlags,
}

impl MouseEventRecord {
    pub fn new(x: i32, y: i32, button_state: ButtonState, event_flags: MouseEventFlags) -> Self {
        Self {
            position: Point::new(x, y),
            button_state,
            control_key_state: ControlKeyState::empty(),
            event_flags,
        }
    }

    pub fn with_control_keys(mut self, control_key_state: ControlKeyState) -> Self {
        self.control_key_state = control_key_state;
        self
    }
}

/// A raw record read from the console input queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInputRecord {
    Key(KeyEventRecord),
    Mouse(MouseEventRecord),
    Focus(bool),
    Resize(Size),
}
