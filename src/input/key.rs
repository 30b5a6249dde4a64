//! Key Decoding
//!
//! Turns console key records into `KeyCode`s: a base key combined with
//! Ctrl/Alt/Shift mask bits. Named keys go through one modifier-mapping
//! helper; letters, digits and function keys follow short priority chains
//! so that Ctrl/Alt intent wins over the literal character while the typed
//! character wins when neither is held.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use bitflags::bitflags;

use super::records::{vk, ControlKeyState, KeyEventRecord};

/// A decoded key: base key in the low bits, modifier masks in the high bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const NULL: KeyCode = KeyCode(0);
    pub const BACKSPACE: KeyCode = KeyCode(8);
    pub const TAB: KeyCode = KeyCode(9);
    pub const CLEAR: KeyCode = KeyCode(12);
    pub const ENTER: KeyCode = KeyCode(13);
    pub const ESC: KeyCode = KeyCode(27);
    pub const SPACE: KeyCode = KeyCode(32);

    pub const D0: KeyCode = KeyCode(48);
    pub const D1: KeyCode = KeyCode(49);
    pub const D9: KeyCode = KeyCode(57);

    pub const A: KeyCode = KeyCode(65);
    pub const C: KeyCode = KeyCode(67);
    pub const Q: KeyCode = KeyCode(81);
    pub const X: KeyCode = KeyCode(88);
    pub const Z: KeyCode = KeyCode(90);

    pub const MAX_CODE_POINT: u32 = 0x10FFFF;

    pub const CURSOR_UP: KeyCode = KeyCode(Self::MAX_CODE_POINT + 1);
    pub const CURSOR_DOWN: KeyCode = KeyCode(Self::MAX_CODE_POINT + 2);
    pub const CURSOR_LEFT: KeyCode = KeyCode(Self::MAX_CODE_POINT + 3);
    pub const CURSOR_RIGHT: KeyCode = KeyCode(Self::MAX_CODE_POINT + 4);
    pub const PAGE_UP: KeyCode = KeyCode(Self::MAX_CODE_POINT + 5);
    pub const PAGE_DOWN: KeyCode = KeyCode(Self::MAX_CODE_POINT + 6);
    pub const HOME: KeyCode = KeyCode(Self::MAX_CODE_POINT + 7);
    pub const END: KeyCode = KeyCode(Self::MAX_CODE_POINT + 8);
    pub const INSERT_CHAR: KeyCode = KeyCode(Self::MAX_CODE_POINT + 9);
    pub const DELETE_CHAR: KeyCode = KeyCode(Self::MAX_CODE_POINT + 10);
    pub const PRINT_SCREEN: KeyCode = KeyCode(Self::MAX_CODE_POINT + 11);
    pub const F1: KeyCode = KeyCode(Self::MAX_CODE_POINT + 12);
    pub const F12: KeyCode = KeyCode(Self::MAX_CODE_POINT + 23);
    pub const F24: KeyCode = KeyCode(Self::MAX_CODE_POINT + 35);

    pub const SHIFT_MASK: KeyCode = KeyCode(0x1000_0000);
    pub const CTRL_MASK: KeyCode = KeyCode(0x4000_0000);
    pub const ALT_MASK: KeyCode = KeyCode(0x8000_0000);

    const MODIFIER_MASK: u32 = 0x1000_0000 | 0x4000_0000 | 0x8000_0000;

    /// The n-th function key, 1-based
    pub fn function(n: u32) -> KeyCode {
        KeyCode(Self::F1.0 + n.saturating_sub(1))
    }

    /// The key with all modifier bits removed
    pub fn base(self) -> KeyCode {
        KeyCode(self.0 & !Self::MODIFIER_MASK)
    }

    pub fn is_shift(self) -> bool {
        self.0 & Self::SHIFT_MASK.0 != 0
    }

    pub fn is_ctrl(self) -> bool {
        self.0 & Self::CTRL_MASK.0 != 0
    }

    pub fn is_alt(self) -> bool {
        self.0 & Self::ALT_MASK.0 != 0
    }

    /// The base key as a character, when it is one
    pub fn as_char(self) -> Option<char> {
        let base = self.base().0;
        if base <= Self::MAX_CODE_POINT {
            char::from_u32(base)
        } else {
            None
        }
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            KeyCode::NULL => "Null",
            KeyCode::BACKSPACE => "Backspace",
            KeyCode::TAB => "Tab",
            KeyCode::CLEAR => "Clear",
            KeyCode::ENTER => "Enter",
            KeyCode::ESC => "Esc",
            KeyCode::SPACE => "Space",
            KeyCode::CURSOR_UP => "CursorUp",
            KeyCode::CURSOR_DOWN => "CursorDown",
            KeyCode::CURSOR_LEFT => "CursorLeft",
            KeyCode::CURSOR_RIGHT => "CursorRight",
            KeyCode::PAGE_UP => "PageUp",
            KeyCode::PAGE_DOWN => "PageDown",
            KeyCode::HOME => "Home",
            KeyCode::END => "End",
            KeyCode::INSERT_CHAR => "InsertChar",
            KeyCode::DELETE_CHAR => "DeleteChar",
            KeyCode::PRINT_SCREEN => "PrintScreen",
            _ => return None,
        })
    }
}

impl BitOr for KeyCode {
    type Output = KeyCode;

    fn bitor(self, rhs: KeyCode) -> KeyCode {
        KeyCode(self.0 | rhs.0)
    }
}

impl BitAnd for KeyCode {
    type Output = KeyCode;

    fn bitand(self, rhs: KeyCode) -> KeyCode {
        KeyCode(self.0 & rhs.0)
    }
}

impl Not for KeyCode {
    type Output = KeyCode;

    fn not(self) -> KeyCode {
        KeyCode(!self.0)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ctrl() {
            f.write_str("Ctrl+")?;
        }
        if self.is_alt() {
            f.write_str("Alt+")?;
        }
        if self.is_shift() {
            f.write_str("Shift+")?;
        }
        let base = self.base();
        if let Some(name) = base.name() {
            return f.write_str(name);
        }
        if base >= KeyCode::F1 && base <= KeyCode::F24 {
            return write!(f, "F{}", base.0 - KeyCode::F1.0 + 1);
        }
        match base.as_char() {
            Some(c) if !c.is_control() => write!(f, "{}", c),
            _ => write!(f, "0x{:X}", base.0),
        }
    }
}

bitflags! {
    /// Modifier keys held while a key was pressed
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0x1;
        const ALT = 0x2;
        const CONTROL = 0x4;
    }
}

impl Modifiers {
    pub fn from_control_keys(state: ControlKeyState) -> Self {
        let mut modifiers = Modifiers::empty();
        if state.shift() {
            modifiers |= Modifiers::SHIFT;
        }
        if state.alt() {
            modifiers |= Modifiers::ALT;
        }
        if state.ctrl() {
            modifiers |= Modifiers::CONTROL;
        }
        modifiers
    }
}

/// A key record reduced to what the mapping rules look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub ch: char,
    pub virtual_key: u16,
    pub modifiers: Modifiers,
    pub caps_lock: bool,
    pub num_lock: bool,
    pub scroll_lock: bool,
}

impl KeyInfo {
    pub fn from_record(record: &KeyEventRecord) -> Self {
        let state = record.control_key_state;
        Self {
            ch: record.unicode_char,
            virtual_key: record.virtual_key_code,
            modifiers: Modifiers::from_control_keys(state),
            caps_lock: state.caps_lock(),
            num_lock: state.num_lock(),
            scroll_lock: state.scroll_lock(),
        }
    }
}

/// OR the held modifiers onto a key
pub fn apply_modifiers(modifiers: Modifiers, key: KeyCode) -> KeyCode {
    let mut key = key;
    if modifiers.contains(Modifiers::SHIFT) {
        key = key | KeyCode::SHIFT_MASK;
    }
    if modifiers.contains(Modifiers::CONTROL) {
        key = key | KeyCode::CTRL_MASK;
    }
    if modifiers.contains(Modifiers::ALT) {
        key = key | KeyCode::ALT_MASK;
    }
    key
}

/// Map a key record to a `KeyCode`
pub fn map_key(info: &KeyInfo) -> KeyCode {
    let ch = KeyCode(info.ch as u32);
    let mapped = |key: KeyCode| apply_modifiers(info.modifiers, key);

    match info.virtual_key {
        vk::ESCAPE => mapped(KeyCode::ESC),
        vk::TAB => mapped(KeyCode::TAB),
        vk::CLEAR => mapped(KeyCode::CLEAR),
        vk::HOME => mapped(KeyCode::HOME),
        vk::END => mapped(KeyCode::END),
        vk::LEFT => mapped(KeyCode::CURSOR_LEFT),
        vk::RIGHT => mapped(KeyCode::CURSOR_RIGHT),
        vk::UP => mapped(KeyCode::CURSOR_UP),
        vk::DOWN => mapped(KeyCode::CURSOR_DOWN),
        vk::PRIOR => mapped(KeyCode::PAGE_UP),
        vk::NEXT => mapped(KeyCode::PAGE_DOWN),
        vk::RETURN => mapped(KeyCode::ENTER),
        vk::SPACE => mapped(if info.ch == '\0' { KeyCode::SPACE } else { ch }),
        vk::BACK => mapped(KeyCode::BACKSPACE),
        vk::DELETE => mapped(KeyCode::DELETE_CHAR),
        vk::INSERT => mapped(KeyCode::INSERT_CHAR),
        vk::SNAPSHOT => mapped(KeyCode::PRINT_SCREEN),
        vk::OEM_1
        | vk::OEM_2
        | vk::OEM_3
        | vk::OEM_4
        | vk::OEM_5
        | vk::OEM_6
        | vk::OEM_7
        | vk::OEM_8
        | vk::OEM_102 => {
            // The shifted character is already in `ch`
            mapped(ch) & !KeyCode::SHIFT_MASK
        }
        vk::OEM_PERIOD | vk::OEM_COMMA | vk::OEM_PLUS | vk::OEM_MINUS => ch,
        vk::KEY_A..=vk::KEY_Z => map_letter(info),
        vk::KEY_0..=vk::KEY_9 => map_digit(info),
        vk::F1..=vk::F12 => {
            let key = KeyCode(KeyCode::F1.0 + (info.virtual_key - vk::F1) as u32);
            mapped(key)
        }
        vk::SHIFT => KeyCode::NULL | KeyCode::SHIFT_MASK,
        vk::CONTROL => KeyCode::NULL | KeyCode::CTRL_MASK,
        vk::MENU => KeyCode::NULL | KeyCode::ALT_MASK,
        _ => mapped(ch),
    }
}

fn map_letter(info: &KeyInfo) -> KeyCode {
    let letter = KeyCode(KeyCode::A.0 + (info.virtual_key - vk::KEY_A) as u32);
    let modifiers = info.modifiers;
    let ch = info.ch as u32;

    if modifiers == Modifiers::CONTROL {
        return letter | KeyCode::CTRL_MASK;
    }
    if modifiers == Modifiers::ALT {
        return letter | KeyCode::ALT_MASK;
    }
    if modifiers == Modifiers::SHIFT | Modifiers::ALT {
        return apply_modifiers(modifiers, letter);
    }
    if modifiers.intersects(Modifiers::ALT | Modifiers::CONTROL) && ch <= 26 {
        // Control-character forms synthesized by the OS
        return apply_modifiers(modifiers, letter);
    }
    if (modifiers == Modifiers::SHIFT) ^ info.caps_lock && ch <= KeyCode::Z.0 {
        return letter | KeyCode::SHIFT_MASK;
    }

    // Layout-dependent character typed without Ctrl or Alt
    let folded = ch & !KeyCode::SPACE.0;
    if ch & KeyCode::SPACE.0 == 0 || folded == info.virtual_key as u32 {
        KeyCode(folded)
    } else {
        KeyCode(ch)
    }
}

fn map_digit(info: &KeyInfo) -> KeyCode {
    let digit = KeyCode(KeyCode::D0.0 + (info.virtual_key - vk::KEY_0) as u32);
    let modifiers = info.modifiers;
    let ch = info.ch as u32;

    if modifiers == Modifiers::ALT {
        return digit | KeyCode::ALT_MASK;
    }
    if modifiers == Modifiers::CONTROL {
        return digit | KeyCode::CTRL_MASK;
    }
    if modifiers == Modifiers::SHIFT | Modifiers::ALT {
        return apply_modifiers(modifiers, digit);
    }
    if modifiers.intersects(Modifiers::ALT | Modifiers::CONTROL)
        && (ch == 0 || ch == 30 || ch == digit.0)
    {
        return apply_modifiers(modifiers, digit);
    }
    KeyCode(ch)
}

/// Rewrite a record carrying the packet virtual key (text injected without
/// a physical key) into one with the virtual key the character implies.
pub fn packet_to_virtual_key(record: &KeyEventRecord) -> KeyEventRecord {
    if record.virtual_key_code != vk::PACKET {
        return *record;
    }
    let ch = record.unicode_char;
    let virtual_key = match ch {
        'a'..='z' => vk::KEY_A + (ch as u16 - 'a' as u16),
        'A'..='Z' => vk::KEY_A + (ch as u16 - 'A' as u16),
        '0'..='9' => vk::KEY_0 + (ch as u16 - '0' as u16),
        ' ' => vk::SPACE,
        '\r' | '\n' => vk::RETURN,
        '\t' => vk::TAB,
        '\x1b' => vk::ESCAPE,
        '\x08' | '\x7f' => vk::BACK,
        _ => 0,
    };
    KeyEventRecord {
        virtual_key_code: virtual_key,
        ..*record
    }
}

/// A decoded key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub is_down: bool,
}

impl KeyEvent {
    pub fn down(code: KeyCode) -> Self {
        Self {
            code,
            is_down: true,
        }
    }

    pub fn up(code: KeyCode) -> Self {
        Self {
            code,
            is_down: false,
        }
    }
}

/// State carried between key records of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderState {
    pub caps_lock: bool,
    pub num_lock: bool,
    pub scroll_lock: bool,
    /// Set by a key-down whose only modifier is Alt
    pub alt_down: bool,
    /// An Alt chord was released while Alt is still held
    pub alt_consumed: bool,
}

/// Decode one key record.
///
/// Returns `None` only for the bare Alt key-up that follows an Alt chord:
/// the chord's own key-up already reported the combination.
pub fn decode(record: &KeyEventRecord, state: DecoderState) -> (Option<KeyEvent>, DecoderState) {
    let info = KeyInfo::from_record(record);
    let code = map_key(&info);
    let mut next = DecoderState {
        caps_lock: info.caps_lock,
        num_lock: info.num_lock,
        scroll_lock: info.scroll_lock,
        ..state
    };

    if record.key_down {
        next.alt_down = info.modifiers == Modifiers::ALT;
        return (Some(KeyEvent::down(code)), next);
    }

    if code != KeyCode::ALT_MASK {
        if info.modifiers.contains(Modifiers::ALT) && state.alt_down {
            next.alt_consumed = true;
        }
        next.alt_down = false;
        return (Some(KeyEvent::up(code)), next);
    }

    let suppress = state.alt_consumed;
    next.alt_down = false;
    next.alt_consumed = false;
    if suppress {
        (None, next)
    } else {
        (Some(KeyEvent::up(code)), next)
    }
}

/// Owns the decoder state for one session
#[derive(Debug, Default)]
pub struct KeyDecoder {
    state: DecoderState,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn decode(&mut self, record: &KeyEventRecord) -> Option<KeyEvent> {
        let (event, state) = decode(record, self.state);
        self.state = state;
        event
    }
}
