//! Console I/O Port
//!
//! The narrow boundary between the driver and the operating system: write
//! text, read raw input records, position the cursor, manage its visibility
//! and query the window size. Failures are handled here and surface to the
//! rest of the crate as `bool`, `Option` or empty results.

pub mod fake;
#[cfg(unix)]
mod unix;

pub use fake::FakeConsole;
#[cfg(unix)]
pub use unix::UnixConsole;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::Size;
use crate::input::RawInputRecord;
use crate::renderer::ansi::{self, CursorStyle};

/// Error type for console operations
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Standard input or output is not a terminal")]
    NotATerminal,

    #[error("Failed to read terminal attributes: {0}")]
    GetAttributes(#[source] nix::Error),

    #[error("Failed to set terminal attributes: {0}")]
    SetAttributes(#[source] nix::Error),

    #[error("Failed to query window size: {0}")]
    WindowSize(#[source] nix::Error),

    #[error("Failed to poll console input: {0}")]
    Poll(#[source] nix::Error),

    #[error("Console has been closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Visible window dimensions and their origin in the screen buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: usize,
    pub rows: usize,
    pub origin_x: usize,
    pub origin_y: usize,
}

impl WindowSize {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            origin_x: 0,
            origin_y: 0,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.cols, self.rows)
    }
}

/// Cursor shapes a console can be asked to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorVisibility {
    Invisible,
    Default,
    Box,
    BoxFix,
    Underline,
    UnderlineFix,
    Vertical,
    VerticalFix,
}

impl CursorVisibility {
    /// DECSCUSR style for a visible cursor; `None` when invisible
    pub fn style(self) -> Option<CursorStyle> {
        match self {
            CursorVisibility::Invisible => None,
            CursorVisibility::Default => Some(CursorStyle::UserDefault),
            CursorVisibility::Box => Some(CursorStyle::BlinkingBlock),
            CursorVisibility::BoxFix => Some(CursorStyle::SteadyBlock),
            CursorVisibility::Underline => Some(CursorStyle::BlinkingUnderline),
            CursorVisibility::UnderlineFix => Some(CursorStyle::SteadyUnderline),
            CursorVisibility::Vertical => Some(CursorStyle::BlinkingBar),
            CursorVisibility::VerticalFix => Some(CursorStyle::SteadyBar),
        }
    }

    /// Escape sequence that puts the terminal cursor into this state
    pub fn escape_sequence(self) -> String {
        match self.style() {
            None => ansi::HIDE_CURSOR.to_string(),
            Some(style) => {
                let mut out = String::from(ansi::SHOW_CURSOR);
                ansi::cursor_style(&mut out, style);
                out
            }
        }
    }
}

/// What a visibility change asks the port to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityUpdate {
    /// Not applied: the initial visibility is unknown or nothing is pending
    Skipped,
    /// Already in the requested state
    Unchanged,
    /// Write this sequence to the terminal
    Write(String),
}

/// Initial, current and pending cursor visibility of one console
///
/// A request made before the initial visibility is known is parked as
/// pending and applied by [`CursorVisibilityCache::ensure`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorVisibilityCache {
    initial: Option<CursorVisibility>,
    current: Option<CursorVisibility>,
    pending: Option<CursorVisibility>,
}

impl CursorVisibilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(&self) -> Option<CursorVisibility> {
        self.initial
    }

    pub fn current(&self) -> Option<CursorVisibility> {
        self.current
    }

    pub fn pending(&self) -> Option<CursorVisibility> {
        self.pending
    }

    /// Record the visibility the session started with; only the first call counts
    pub fn set_initial(&mut self, visibility: CursorVisibility) {
        if self.initial.is_none() {
            self.initial = Some(visibility);
        }
    }

    pub fn set(&mut self, visibility: CursorVisibility) -> VisibilityUpdate {
        if self.initial.is_none() {
            self.pending = Some(visibility);
            return VisibilityUpdate::Skipped;
        }
        if self.current == Some(visibility) {
            return VisibilityUpdate::Unchanged;
        }
        self.current = Some(visibility);
        VisibilityUpdate::Write(visibility.escape_sequence())
    }

    /// Apply a parked request once the initial visibility is known
    pub fn ensure(&mut self) -> VisibilityUpdate {
        match (self.initial, self.pending) {
            (Some(_), Some(pending)) => {
                self.pending = None;
                self.set(pending)
            }
            _ => VisibilityUpdate::Skipped,
        }
    }

    /// Forget what the terminal shows so the next `ensure` re-emits it
    pub fn force_refresh(&mut self) {
        if let Some(current) = self.current.take() {
            self.pending = Some(current);
        }
    }

    /// Sequence that returns the terminal to the initial visibility
    pub fn restore(&mut self) -> Option<String> {
        let initial = self.initial?;
        self.current = Some(initial);
        self.pending = None;
        Some(initial.escape_sequence())
    }
}

/// The operations the driver needs from a terminal
///
/// Implementations own the OS handles. Cursor visibility is implemented
/// once here on top of [`ConsolePort::cursor_cache`] and
/// [`ConsolePort::write`].
pub trait ConsolePort: Send + Sync {
    /// Best-effort write; false on failure
    fn write(&self, text: &str) -> bool;

    /// Block until input is available; empty on failure or cancellation
    fn read_input_records(&self) -> Vec<RawInputRecord>;

    /// Current window size and origin
    fn window_size(&self) -> ConsoleResult<WindowSize>;

    /// Visibility state shared by the default cursor methods
    fn cursor_cache(&self) -> &Mutex<CursorVisibilityCache>;

    /// Visibility reported by the OS, when it can be queried
    fn query_cursor_visibility(&self) -> Option<CursorVisibility> {
        Some(CursorVisibility::Default)
    }

    /// Unblock a pending `read_input_records` call
    fn cancel_read(&self) {}

    /// Restore the terminal to the state it had before the session
    fn cleanup(&self) {
        self.restore_cursor_visibility();
    }

    /// Move the terminal cursor to a zero-based cell
    fn set_cursor_position(&self, col: usize, row: usize) -> bool {
        let mut out = String::with_capacity(12);
        ansi::cursor_position(&mut out, row + 1, col + 1);
        self.write(&out)
    }

    fn cursor_visibility(&self) -> Option<CursorVisibility> {
        let cache = self.cursor_cache().lock();
        cache.current().or(cache.initial())
    }

    /// Returns false when the request was parked until the initial
    /// visibility is known
    fn set_cursor_visibility(&self, visibility: CursorVisibility) -> bool {
        let update = self.cursor_cache().lock().set(visibility);
        apply_update(self, update)
    }

    fn ensure_cursor_visibility(&self) -> bool {
        let update = self.cursor_cache().lock().ensure();
        apply_update(self, update)
    }

    fn force_refresh_cursor_visibility(&self) {
        self.cursor_cache().lock().force_refresh();
    }

    fn capture_initial_cursor_visibility(&self) {
        if let Some(visibility) = self.query_cursor_visibility() {
            self.cursor_cache().lock().set_initial(visibility);
        }
    }

    fn restore_cursor_visibility(&self) {
        let restore = self.cursor_cache().lock().restore();
        if let Some(seq) = restore {
            self.write(&seq);
        }
    }
}

fn apply_update<P: ConsolePort + ?Sized>(port: &P, update: VisibilityUpdate) -> bool {
    match update {
        VisibilityUpdate::Skipped => false,
        VisibilityUpdate::Unchanged => true,
        VisibilityUpdate::Write(seq) => {
            port.write(&seq);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_sequences() {
        assert_eq!(CursorVisibility::Invisible.escape_sequence(), "\x1b[?25l");
        assert_eq!(CursorVisibility::Box.escape_sequence(), "\x1b[?25h\x1b[1 q");
        assert_eq!(CursorVisibility::BoxFix.escape_sequence(), "\x1b[?25h\x1b[2 q");
        assert_eq!(CursorVisibility::Underline.escape_sequence(), "\x1b[?25h\x1b[3 q");
        assert_eq!(CursorVisibility::UnderlineFix.escape_sequence(), "\x1b[?25h\x1b[4 q");
        assert_eq!(CursorVisibility::Vertical.escape_sequence(), "\x1b[?25h\x1b[5 q");
        assert_eq!(CursorVisibility::VerticalFix.escape_sequence(), "\x1b[?25h\x1b[6 q");
        assert_eq!(CursorVisibility::Default.escape_sequence(), "\x1b[?25h\x1b[0 q");
    }

    #[test]
    fn test_set_before_initial_is_pending() {
        let mut cache = CursorVisibilityCache::new();
        assert_eq!(cache.set(CursorVisibility::Box), VisibilityUpdate::Skipped);
        assert_eq!(cache.pending(), Some(CursorVisibility::Box));
        assert_eq!(cache.current(), None);

        assert_eq!(cache.ensure(), VisibilityUpdate::Skipped);

        cache.set_initial(CursorVisibility::Default);
        assert_eq!(
            cache.ensure(),
            VisibilityUpdate::Write("\x1b[?25h\x1b[1 q".to_string())
        );
        assert_eq!(cache.pending(), None);
        assert_eq!(cache.current(), Some(CursorVisibility::Box));
    }

    #[test]
    fn test_repeated_set_is_unchanged() {
        let mut cache = CursorVisibilityCache::new();
        cache.set_initial(CursorVisibility::Default);
        assert!(matches!(cache.set(CursorVisibility::Invisible), VisibilityUpdate::Write(_)));
        assert_eq!(cache.set(CursorVisibility::Invisible), VisibilityUpdate::Unchanged);
    }

    #[test]
    fn test_initial_only_set_once() {
        let mut cache = CursorVisibilityCache::new();
        cache.set_initial(CursorVisibility::Box);
        cache.set_initial(CursorVisibility::Invisible);
        assert_eq!(cache.initial(), Some(CursorVisibility::Box));
    }

    #[test]
    fn test_force_refresh_reemits() {
        let mut cache = CursorVisibilityCache::new();
        cache.set_initial(CursorVisibility::Default);
        cache.set(CursorVisibility::Vertical);

        cache.force_refresh();
        assert_eq!(cache.current(), None);
        assert_eq!(cache.pending(), Some(CursorVisibility::Vertical));
        assert_eq!(
            cache.ensure(),
            VisibilityUpdate::Write("\x1b[?25h\x1b[5 q".to_string())
        );
    }

    #[test]
    fn test_restore_initial() {
        let mut cache = CursorVisibilityCache::new();
        assert_eq!(cache.restore(), None);

        cache.set_initial(CursorVisibility::Underline);
        cache.set(CursorVisibility::Invisible);
        assert_eq!(cache.restore().as_deref(), Some("\x1b[?25h\x1b[3 q"));
        assert_eq!(cache.current(), Some(CursorVisibility::Underline));
    }
}
