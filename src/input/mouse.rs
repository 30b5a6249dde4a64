//! Mouse Gesture Tracking
//!
//! Turns raw mouse records (button bits, event flags, position) into
//! `MouseFlags` events: pressed, released, clicked, double and triple
//! clicked, wheel and motion reports.
//!
//! # Rules
//!
//! Each record is first classified into one `GestureRule`, checked in
//! priority order (see `classify`), then the rule is applied to the state.
//! The order is significant: the deferred click confirmation must be
//! checked before plain motion, or clicks are reported as drags.
//!
//! A click is reported only after the release: the release arms it when it
//! happens at the press position, and the next motion record at that
//! position confirms it.

use bitflags::bitflags;

use super::records::{ButtonState, MouseEventFlags, MouseEventRecord};
use crate::core::Point;

bitflags! {
    /// Flags of a decoded mouse event
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MouseFlags: u32 {
        const BUTTON1_PRESSED = 0x2;
        const BUTTON1_RELEASED = 0x1;
        const BUTTON1_CLICKED = 0x4;
        const BUTTON1_DOUBLE_CLICKED = 0x8;
        const BUTTON1_TRIPLE_CLICKED = 0x10;
        const BUTTON2_PRESSED = 0x80;
        const BUTTON2_RELEASED = 0x40;
        const BUTTON2_CLICKED = 0x100;
        const BUTTON2_DOUBLE_CLICKED = 0x200;
        const BUTTON2_TRIPLE_CLICKED = 0x400;
        const BUTTON3_PRESSED = 0x2000;
        const BUTTON3_RELEASED = 0x1000;
        const BUTTON3_CLICKED = 0x4000;
        const BUTTON3_DOUBLE_CLICKED = 0x8000;
        const BUTTON3_TRIPLE_CLICKED = 0x10000;
        const BUTTON_CTRL = 0x100_0000;
        const BUTTON_SHIFT = 0x200_0000;
        const BUTTON_ALT = 0x400_0000;
        const REPORT_MOUSE_POSITION = 0x800_0000;
        const WHEELED_UP = 0x1000_0000;
        const WHEELED_DOWN = 0x2000_0000;
        const WHEELED_LEFT = Self::BUTTON_CTRL.bits() | Self::WHEELED_UP.bits();
        const WHEELED_RIGHT = Self::BUTTON_CTRL.bits() | Self::WHEELED_DOWN.bits();
        /// Sentinel for records no rule recognizes
        const ALL_EVENTS = 0x7ff_ffff;
    }
}

/// The buttons the tracker distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Leftmost button
    Button1,
    /// Second button from the left (usually the middle one)
    Button2,
    /// Rightmost button
    Button3,
}

impl MouseButton {
    /// Identify a single held button; chords and wheel deltas are `None`
    pub fn from_state(state: ButtonState) -> Option<Self> {
        match state {
            ButtonState::FROM_LEFT_1ST_BUTTON_PRESSED => Some(MouseButton::Button1),
            ButtonState::FROM_LEFT_2ND_BUTTON_PRESSED => Some(MouseButton::Button2),
            ButtonState::RIGHTMOST_BUTTON_PRESSED => Some(MouseButton::Button3),
            _ => None,
        }
    }

    pub fn pressed(self) -> MouseFlags {
        match self {
            MouseButton::Button1 => MouseFlags::BUTTON1_PRESSED,
            MouseButton::Button2 => MouseFlags::BUTTON2_PRESSED,
            MouseButton::Button3 => MouseFlags::BUTTON3_PRESSED,
        }
    }

    pub fn released(self) -> MouseFlags {
        match self {
            MouseButton::Button1 => MouseFlags::BUTTON1_RELEASED,
            MouseButton::Button2 => MouseFlags::BUTTON2_RELEASED,
            MouseButton::Button3 => MouseFlags::BUTTON3_RELEASED,
        }
    }

    pub fn clicked(self) -> MouseFlags {
        match self {
            MouseButton::Button1 => MouseFlags::BUTTON1_CLICKED,
            MouseButton::Button2 => MouseFlags::BUTTON2_CLICKED,
            MouseButton::Button3 => MouseFlags::BUTTON3_CLICKED,
        }
    }

    pub fn double_clicked(self) -> MouseFlags {
        match self {
            MouseButton::Button1 => MouseFlags::BUTTON1_DOUBLE_CLICKED,
            MouseButton::Button2 => MouseFlags::BUTTON2_DOUBLE_CLICKED,
            MouseButton::Button3 => MouseFlags::BUTTON3_DOUBLE_CLICKED,
        }
    }

    pub fn triple_clicked(self) -> MouseFlags {
        match self {
            MouseButton::Button1 => MouseFlags::BUTTON1_TRIPLE_CLICKED,
            MouseButton::Button2 => MouseFlags::BUTTON2_TRIPLE_CLICKED,
            MouseButton::Button3 => MouseFlags::BUTTON3_TRIPLE_CLICKED,
        }
    }
}

/// Flags for a button transition, `ALL_EVENTS` when the button state is
/// not a single recognized button
fn button_flags(state: ButtonState, flags: impl Fn(MouseButton) -> MouseFlags) -> MouseFlags {
    MouseButton::from_state(state).map_or(MouseFlags::ALL_EVENTS, flags)
}

/// A decoded mouse event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    pub flags: MouseFlags,
}

impl MouseEvent {
    pub fn new(position: Point, flags: MouseFlags) -> Self {
        Self {
            x: position.x,
            y: position.y,
            flags,
        }
    }
}

/// Gesture state carried between mouse records of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseGestureState {
    /// Raw button bits of the press not yet released
    pub last_button_pressed: Option<ButtonState>,
    pub is_button_pressed: bool,
    pub is_button_released: bool,
    /// Latched by an OS double click until a third press or the latch timer
    pub is_button_double_clicked: bool,
    /// Where the current gesture started
    pub anchor_point: Option<Point>,
    /// Position used by synthetic continuous-press events
    pub last_move_point: Point,
    /// The release happened at the anchor; a motion record there confirms a click
    pub click_armed: bool,
    /// The held button has moved since it was pressed
    pub is_dragging: bool,
}

/// Tagged view of `MouseGestureState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Pressed(Option<MouseButton>),
    Dragging(Option<MouseButton>),
    Released(Option<MouseButton>),
    ArmedForClick(Option<MouseButton>),
    DoubleClicked,
}

impl MouseGestureState {
    pub fn phase(&self) -> GesturePhase {
        let button = self.last_button_pressed.and_then(MouseButton::from_state);
        if self.is_button_double_clicked {
            GesturePhase::DoubleClicked
        } else if self.is_button_pressed && self.is_dragging {
            GesturePhase::Dragging(button)
        } else if self.is_button_pressed {
            GesturePhase::Pressed(button)
        } else if self.is_button_released && self.click_armed {
            GesturePhase::ArmedForClick(button)
        } else if self.is_button_released {
            GesturePhase::Released(button)
        } else {
            GesturePhase::Idle
        }
    }

    fn reset_gesture(&mut self) {
        self.last_button_pressed = None;
        self.is_button_pressed = false;
        self.is_button_released = false;
        self.click_armed = false;
        self.is_dragging = false;
        self.anchor_point = None;
    }
}

/// Which transition a record triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureRule {
    Press { moved: bool },
    Release,
    ConfirmClick,
    /// Motion without buttons while a press is still recorded: the release
    /// record never arrived
    ImplicitRelease,
    DoubleClick,
    TripleClick,
    Wheel,
    HorizontalWheel,
    Move,
    Nothing,
    Unrecognized,
}

/// Pick the rule for a record. `state` must already have been normalized
/// by `begin_record`.
pub fn classify(state: &MouseGestureState, record: &MouseEventRecord) -> GestureRule {
    let buttons = record.button_state;
    let flags = record.event_flags;
    let moved = flags.contains(MouseEventFlags::MOUSE_MOVED);
    let double = state.is_button_double_clicked;
    let at_anchor = state.anchor_point == Some(record.position);

    match () {
        _ if !buttons.is_empty()
            && !double
            && state.last_button_pressed.is_none()
            && (flags.is_empty() || (moved && !state.is_button_released)) =>
        {
            GestureRule::Press { moved }
        }
        _ if state.last_button_pressed.is_some()
            && flags.is_empty()
            && !state.is_button_released
            && !double =>
        {
            GestureRule::Release
        }
        _ if moved && state.click_armed && at_anchor => GestureRule::ConfirmClick,
        _ if moved
            && buttons.is_empty()
            && state.is_button_pressed
            && state.last_button_pressed.is_some()
            && !double =>
        {
            GestureRule::ImplicitRelease
        }
        _ if flags.contains(MouseEventFlags::DOUBLE_CLICK) => GestureRule::DoubleClick,
        _ if flags.is_empty() && !buttons.is_empty() && double => GestureRule::TripleClick,
        _ if flags == MouseEventFlags::MOUSE_WHEELED => GestureRule::Wheel,
        _ if flags == MouseEventFlags::MOUSE_HWHEELED => GestureRule::HorizontalWheel,
        _ if flags == MouseEventFlags::MOUSE_MOVED => GestureRule::Move,
        _ if buttons.is_empty() && flags.is_empty() => GestureRule::Nothing,
        _ => GestureRule::Unrecognized,
    }
}

/// Result of processing one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureOutcome {
    pub event: MouseEvent,
    pub rule: GestureRule,
    /// Start re-emitting these flags while the button stays down
    pub start_continuous_press: Option<MouseFlags>,
    /// Clear the double-click latch after the latch window
    pub schedule_latch_reset: bool,
}

/// Owns the gesture state for one session
#[derive(Debug, Default)]
pub struct MouseGestureTracker {
    state: MouseGestureState,
}

impl MouseGestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MouseGestureState {
        &self.state
    }

    pub fn phase(&self) -> GesturePhase {
        self.state.phase()
    }

    /// Process one raw mouse record
    pub fn process(&mut self, record: &MouseEventRecord) -> GestureOutcome {
        let (outcome, state) = track(record, self.state);
        self.state = state;
        outcome
    }

    /// Latch timer expired without a third press
    pub fn clear_double_click(&mut self) {
        self.state.is_button_double_clicked = false;
    }

    /// The synthetic event to re-emit while a button is held, or `None`
    /// once it has been released
    pub fn continuous_press_event(&self, flags: MouseFlags) -> Option<MouseEvent> {
        if self.state.is_button_pressed && !flags.contains(MouseFlags::REPORT_MOUSE_POSITION) {
            Some(MouseEvent::new(self.state.last_move_point, flags))
        } else {
            None
        }
    }
}

/// Any new button bits start a fresh gesture
fn begin_record(state: &mut MouseGestureState, record: &MouseEventRecord) {
    if (state.last_button_pressed.is_some() || state.is_button_released)
        && !record.button_state.is_empty()
    {
        state.last_button_pressed = None;
        state.is_button_released = false;
        state.click_armed = false;
    }
}

/// Process one record against a gesture state, returning the outcome and
/// the updated state
pub fn track(record: &MouseEventRecord, state: MouseGestureState) -> (GestureOutcome, MouseGestureState) {
    let mut state = state;
    begin_record(&mut state, record);

    let position = record.position;
    let buttons = record.button_state;
    let rule = classify(&state, record);
    let mut start_continuous_press = None;
    let mut schedule_latch_reset = false;

    let flags = match rule {
        GestureRule::Press { moved } => {
            let mut flags = button_flags(buttons, MouseButton::pressed);
            if state.anchor_point.is_none() {
                state.anchor_point = Some(position);
            }
            if moved {
                flags |= MouseFlags::REPORT_MOUSE_POSITION;
                state.is_button_released = false;
                state.click_armed = false;
            }
            state.is_dragging = moved;
            state.last_button_pressed = Some(buttons);
            state.is_button_pressed = true;
            state.last_move_point = position;
            if !moved {
                start_continuous_press = Some(flags);
            }
            flags
        }
        GestureRule::Release => {
            let last = state.last_button_pressed.unwrap_or_default();
            let flags = button_flags(last, MouseButton::released);
            state.is_button_pressed = false;
            state.is_button_released = true;
            state.is_dragging = false;
            if state.anchor_point == Some(position) {
                state.click_armed = true;
            } else {
                state.anchor_point = None;
            }
            flags
        }
        GestureRule::ConfirmClick => {
            let last = state.last_button_pressed.unwrap_or_default();
            let flags = button_flags(last, MouseButton::clicked);
            state.reset_gesture();
            state.last_move_point = position;
            flags
        }
        GestureRule::ImplicitRelease => {
            let last = state.last_button_pressed.unwrap_or_default();
            let flags = if state.anchor_point == Some(position) {
                button_flags(last, MouseButton::clicked)
            } else {
                MouseFlags::REPORT_MOUSE_POSITION
            };
            state.reset_gesture();
            state.last_move_point = position;
            flags
        }
        GestureRule::DoubleClick => {
            state.is_button_double_clicked = true;
            state.anchor_point = None;
            schedule_latch_reset = true;
            button_flags(buttons, MouseButton::double_clicked)
        }
        GestureRule::TripleClick => {
            state.is_button_double_clicked = false;
            state.anchor_point = None;
            button_flags(buttons, MouseButton::triple_clicked)
        }
        GestureRule::Wheel => {
            let horizontal = record.control_key_state.shift();
            match (buttons.signum(), horizontal) {
                (1, false) => MouseFlags::WHEELED_UP,
                (-1, false) => MouseFlags::WHEELED_DOWN,
                (1, true) => MouseFlags::WHEELED_LEFT,
                (-1, true) => MouseFlags::WHEELED_RIGHT,
                _ => MouseFlags::ALL_EVENTS,
            }
        }
        GestureRule::HorizontalWheel => match buttons.signum() {
            -1 => MouseFlags::WHEELED_LEFT,
            1 => MouseFlags::WHEELED_RIGHT,
            _ => MouseFlags::ALL_EVENTS,
        },
        GestureRule::Move => {
            if state.is_button_released {
                // Moving away from a release disarms its click
                state.reset_gesture();
            }
            state.last_move_point = position;
            MouseFlags::REPORT_MOUSE_POSITION
        }
        GestureRule::Nothing => MouseFlags::empty(),
        GestureRule::Unrecognized => MouseFlags::ALL_EVENTS,
    };

    let outcome = GestureOutcome {
        event: MouseEvent::new(position, with_control_keys(record, flags)),
        rule,
        start_continuous_press,
        schedule_latch_reset,
    };
    (outcome, state)
}

fn with_control_keys(record: &MouseEventRecord, flags: MouseFlags) -> MouseFlags {
    let keys = record.control_key_state;
    let mut flags = flags;
    if keys.ctrl() {
        flags |= MouseFlags::BUTTON_CTRL;
    }
    if keys.shift() {
        flags |= MouseFlags::BUTTON_SHIFT;
    }
    if keys.alt() {
        flags |= MouseFlags::BUTTON_ALT;
    }
    flags
}
