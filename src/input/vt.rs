//! VT Input Translation
//!
//! Converts the byte stream a VT terminal sends in raw mode into console
//! input records, so that Unix input flows through the same key decoder and
//! mouse gesture tracker as native console records.
//!
//! Handled input:
//! - UTF-8 text (as packet key records, down then up)
//! - C0 controls (Ctrl+letter, Enter, Tab, Backspace, Escape)
//! - ESC-prefixed keys (Alt+key)
//! - CSI and SS3 cursor, editing and function keys with xterm modifiers
//! - SGR mouse reports (`ESC [ < b ; x ; y M/m`); a release is followed by
//!   a motion record at the same cell
//! - Focus in/out reports (`ESC [ I`, `ESC [ O`)
//!
//! The translator handles arbitrary chunk boundaries, except that a chunk
//! ending in a lone ESC is taken to be the Escape key.

use tracing::trace;

use super::records::{
    vk, ButtonState, ControlKeyState, KeyEventRecord, MouseEventFlags, MouseEventRecord, RawInputRecord,
};

/// Translator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    Ss3,
}

/// Wheel delta of one notch
const WHEEL_DELTA: i16 = 120;

/// The VT input translator
#[derive(Debug)]
pub struct VtInputTranslator {
    state: State,
    /// Parameters for CSI sequences
    params: Vec<u32>,
    /// Current parameter being built
    current_param: u32,
    /// Whether we've seen a digit for the current parameter
    param_has_digit: bool,
    /// CSI started with `<` (SGR mouse)
    sgr_mouse: bool,
    /// UTF-8 decoder state
    utf8_buffer: Vec<u8>,
    utf8_remaining: u8,
}

impl Default for VtInputTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl VtInputTranslator {
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Vec::with_capacity(8),
            current_param: 0,
            param_has_digit: false,
            sgr_mouse: false,
            utf8_buffer: Vec::with_capacity(4),
            utf8_remaining: 0,
        }
    }

    /// Reset the translator to the ground state
    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.clear_params();
        self.utf8_buffer.clear();
        self.utf8_remaining = 0;
    }

    fn clear_params(&mut self) {
        self.params.clear();
        self.current_param = 0;
        self.param_has_digit = false;
        self.sgr_mouse = false;
    }

    /// Translate a chunk of bytes into input records
    pub fn feed(&mut self, data: &[u8]) -> Vec<RawInputRecord> {
        let mut records = Vec::new();
        for &byte in data {
            self.process_byte(byte, &mut records);
        }
        if self.state == State::Escape {
            self.state = State::Ground;
            push_key(&mut records, vk::ESCAPE, '\x1b', ControlKeyState::empty());
        }
        records
    }

    fn process_byte(&mut self, byte: u8, out: &mut Vec<RawInputRecord>) {
        match self.state {
            State::Ground => self.process_ground(byte, out, ControlKeyState::empty()),
            State::Escape => self.process_escape(byte, out),
            State::Csi => self.process_csi(byte, out),
            State::Ss3 => self.process_ss3(byte, out),
        }
    }

    fn process_ground(&mut self, byte: u8, out: &mut Vec<RawInputRecord>, mods: ControlKeyState) {
        if self.utf8_remaining > 0 {
            self.process_utf8_continuation(byte, out, mods);
            return;
        }
        match byte {
            0x1B => self.state = State::Escape,
            0x0D | 0x0A => push_key(out, vk::RETURN, '\r', mods),
            0x09 => push_key(out, vk::TAB, '\t', mods),
            0x7F | 0x08 => push_key(out, vk::BACK, '\x08', mods),
            0x00 => push_key(out, vk::SPACE, '\0', mods | ControlKeyState::LEFT_CTRL_PRESSED),
            0x01..=0x1A => {
                let letter = vk::KEY_A + (byte - 1) as u16;
                push_key(out, letter, byte as char, mods | ControlKeyState::LEFT_CTRL_PRESSED);
            }
            0x1C..=0x1F => push_key(out, 0, byte as char, mods | ControlKeyState::LEFT_CTRL_PRESSED),
            0x20..=0x7E => push_text(out, byte as char, mods),
            0xC0..=0xF7 => self.start_utf8(byte),
            _ => push_text(out, '\u{FFFD}', mods),
        }
    }

    fn start_utf8(&mut self, byte: u8) {
        self.utf8_buffer.clear();
        self.utf8_buffer.push(byte);
        self.utf8_remaining = if byte < 0xE0 {
            1
        } else if byte < 0xF0 {
            2
        } else {
            3
        };
    }

    fn process_utf8_continuation(&mut self, byte: u8, out: &mut Vec<RawInputRecord>, mods: ControlKeyState) {
        if (0x80..=0xBF).contains(&byte) {
            self.utf8_buffer.push(byte);
            self.utf8_remaining -= 1;
            if self.utf8_remaining == 0 {
                let text = String::from_utf8_lossy(&self.utf8_buffer);
                let c = text.chars().next().unwrap_or('\u{FFFD}');
                self.utf8_buffer.clear();
                push_text(out, c, mods);
            }
        } else {
            // Incomplete sequence: replace it and reprocess the byte
            self.utf8_buffer.clear();
            self.utf8_remaining = 0;
            push_text(out, '\u{FFFD}', mods);
            self.process_ground(byte, out, mods);
        }
    }

    fn process_escape(&mut self, byte: u8, out: &mut Vec<RawInputRecord>) {
        match byte {
            b'[' => {
                self.clear_params();
                self.state = State::Csi;
            }
            b'O' => self.state = State::Ss3,
            0x1B => {
                // ESC ESC: the first one was a plain Escape key
                push_key(out, vk::ESCAPE, '\x1b', ControlKeyState::empty());
            }
            _ => {
                self.state = State::Ground;
                self.process_ground(byte, out, ControlKeyState::LEFT_ALT_PRESSED);
            }
        }
    }

    fn process_csi(&mut self, byte: u8, out: &mut Vec<RawInputRecord>) {
        match byte {
            b'0'..=b'9' => {
                self.current_param = self
                    .current_param
                    .saturating_mul(10)
                    .saturating_add((byte - b'0') as u32);
                self.param_has_digit = true;
            }
            b';' => self.finish_param(),
            b'<' if self.params.is_empty() && !self.param_has_digit => self.sgr_mouse = true,
            0x40..=0x7E => {
                self.finish_param();
                self.state = State::Ground;
                if self.sgr_mouse {
                    self.dispatch_sgr_mouse(byte, out);
                } else {
                    self.dispatch_csi(byte, out);
                }
                self.clear_params();
            }
            0x1B => {
                trace!("aborted CSI sequence");
                self.clear_params();
                self.state = State::Escape;
            }
            _ => {}
        }
    }

    fn finish_param(&mut self) {
        self.params.push(if self.param_has_digit { self.current_param } else { 0 });
        self.current_param = 0;
        self.param_has_digit = false;
    }

    fn param(&self, index: usize) -> Option<u32> {
        self.params.get(index).copied().filter(|&p| p != 0)
    }

    /// Modifier state from an xterm modifier parameter (1 + bitmask)
    fn modifiers(&self, index: usize) -> ControlKeyState {
        let bits = self.param(index).map_or(0, |p| p.saturating_sub(1));
        let mut state = ControlKeyState::empty();
        if bits & 1 != 0 {
            state |= ControlKeyState::SHIFT_PRESSED;
        }
        if bits & 2 != 0 {
            state |= ControlKeyState::LEFT_ALT_PRESSED;
        }
        if bits & 4 != 0 {
            state |= ControlKeyState::LEFT_CTRL_PRESSED;
        }
        state
    }

    fn dispatch_csi(&mut self, final_byte: u8, out: &mut Vec<RawInputRecord>) {
        let mods = self.modifiers(1);
        let key = match final_byte {
            b'A' => Some(vk::UP),
            b'B' => Some(vk::DOWN),
            b'C' => Some(vk::RIGHT),
            b'D' => Some(vk::LEFT),
            b'H' => Some(vk::HOME),
            b'F' => Some(vk::END),
            b'P' => Some(vk::F1),
            b'Q' => Some(vk::F1 + 1),
            b'R' => Some(vk::F1 + 2),
            b'S' => Some(vk::F1 + 3),
            b'~' => self.param(0).and_then(tilde_key),
            b'Z' => {
                push_key(out, vk::TAB, '\t', ControlKeyState::SHIFT_PRESSED);
                return;
            }
            b'I' => {
                out.push(RawInputRecord::Focus(true));
                return;
            }
            b'O' => {
                out.push(RawInputRecord::Focus(false));
                return;
            }
            _ => None,
        };

        match key {
            Some(key) => push_key(out, key, '\0', mods | ControlKeyState::ENHANCED_KEY),
            None => trace!(final_byte = final_byte, params = ?self.params, "unhandled CSI sequence"),
        }
    }

    fn dispatch_sgr_mouse(&mut self, final_byte: u8, out: &mut Vec<RawInputRecord>) {
        if self.params.len() < 3 || !matches!(final_byte, b'M' | b'm') {
            trace!(final_byte = final_byte, params = ?self.params, "malformed SGR mouse report");
            return;
        }
        let code = self.params[0];
        let x = self.params[1].saturating_sub(1) as i32;
        let y = self.params[2].saturating_sub(1) as i32;

        let mut keys = ControlKeyState::empty();
        if code & 4 != 0 {
            keys |= ControlKeyState::SHIFT_PRESSED;
        }
        if code & 8 != 0 {
            keys |= ControlKeyState::LEFT_ALT_PRESSED;
        }
        if code & 16 != 0 {
            keys |= ControlKeyState::LEFT_CTRL_PRESSED;
        }

        let motion = code & 32 != 0;
        let (buttons, flags) = if code & 64 != 0 {
            match code & 3 {
                0 => (ButtonState::wheel_delta(WHEEL_DELTA), MouseEventFlags::MOUSE_WHEELED),
                1 => (ButtonState::wheel_delta(-WHEEL_DELTA), MouseEventFlags::MOUSE_WHEELED),
                2 => (ButtonState::wheel_delta(-WHEEL_DELTA), MouseEventFlags::MOUSE_HWHEELED),
                _ => (ButtonState::wheel_delta(WHEEL_DELTA), MouseEventFlags::MOUSE_HWHEELED),
            }
        } else {
            let held = match code & 3 {
                0 => ButtonState::FROM_LEFT_1ST_BUTTON_PRESSED,
                1 => ButtonState::FROM_LEFT_2ND_BUTTON_PRESSED,
                2 => ButtonState::RIGHTMOST_BUTTON_PRESSED,
                _ => ButtonState::empty(),
            };
            let buttons = if final_byte == b'm' { ButtonState::empty() } else { held };
            let flags = if motion {
                MouseEventFlags::MOUSE_MOVED
            } else {
                MouseEventFlags::empty()
            };
            (buttons, flags)
        };

        out.push(RawInputRecord::Mouse(
            MouseEventRecord::new(x, y, buttons, flags).with_control_keys(keys),
        ));

        // Terminals report motion only on a change of cell, so the motion
        // that confirms a click at the release position is synthesized.
        if final_byte == b'm' && code & 64 == 0 && !motion {
            out.push(RawInputRecord::Mouse(
                MouseEventRecord::new(x, y, ButtonState::empty(), MouseEventFlags::MOUSE_MOVED)
                    .with_control_keys(keys),
            ));
        }
    }

    fn process_ss3(&mut self, byte: u8, out: &mut Vec<RawInputRecord>) {
        self.state = State::Ground;
        let key = match byte {
            b'A' => vk::UP,
            b'B' => vk::DOWN,
            b'C' => vk::RIGHT,
            b'D' => vk::LEFT,
            b'H' => vk::HOME,
            b'F' => vk::END,
            b'P' => vk::F1,
            b'Q' => vk::F1 + 1,
            b'R' => vk::F1 + 2,
            b'S' => vk::F1 + 3,
            b'M' => {
                push_key(out, vk::RETURN, '\r', ControlKeyState::empty());
                return;
            }
            _ => {
                trace!(byte = byte, "unhandled SS3 sequence");
                return;
            }
        };
        push_key(out, key, '\0', ControlKeyState::ENHANCED_KEY);
    }
}

fn tilde_key(code: u32) -> Option<u16> {
    Some(match code {
        1 | 7 => vk::HOME,
        2 => vk::INSERT,
        3 => vk::DELETE,
        4 | 8 => vk::END,
        5 => vk::PRIOR,
        6 => vk::NEXT,
        11..=15 => vk::F1 + (code - 11) as u16,
        17..=21 => vk::F1 + 5 + (code - 17) as u16,
        23 | 24 => vk::F1 + 10 + (code - 23) as u16,
        _ => return None,
    })
}

/// Push a key-down and key-up pair
fn push_key(out: &mut Vec<RawInputRecord>, virtual_key: u16, ch: char, state: ControlKeyState) {
    let down = KeyEventRecord::new(true, virtual_key, ch, state);
    out.push(RawInputRecord::Key(down));
    out.push(RawInputRecord::Key(down.released()));
}

/// Push typed text as packet records; uppercase ASCII carries Shift
fn push_text(out: &mut Vec<RawInputRecord>, ch: char, state: ControlKeyState) {
    let state = if ch.is_ascii_uppercase() {
        state | ControlKeyState::SHIFT_PRESSED
    } else {
        state
    };
    push_key(out, vk::PACKET, ch, state);
}
