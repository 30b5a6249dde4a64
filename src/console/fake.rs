//! Fake console
//!
//! An in-memory [`ConsolePort`] for tests and headless runs: input is
//! scripted with [`FakeConsole::push_input`], writes are captured, and the
//! window size can be changed at will.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::{ConsoleError, ConsolePort, ConsoleResult, CursorVisibility, CursorVisibilityCache, WindowSize};
use crate::input::RawInputRecord;

#[derive(Debug, Default)]
struct FakeState {
    input: VecDeque<Vec<RawInputRecord>>,
    writes: Vec<String>,
    size: WindowSize,
    fail_writes: bool,
    fail_window_size: bool,
    cancelled: bool,
    cleaned_up: bool,
}

/// Scripted console
#[derive(Debug)]
pub struct FakeConsole {
    state: Mutex<FakeState>,
    input_ready: Condvar,
    cursor: Mutex<CursorVisibilityCache>,
    initial_visibility: CursorVisibility,
}

impl Default for FakeConsole {
    fn default() -> Self {
        Self::new(80, 25)
    }
}

impl FakeConsole {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            state: Mutex::new(FakeState {
                size: WindowSize::new(cols, rows),
                ..FakeState::default()
            }),
            input_ready: Condvar::new(),
            cursor: Mutex::new(CursorVisibilityCache::new()),
            initial_visibility: CursorVisibility::Default,
        }
    }

    /// Queue one batch of records for a later `read_input_records`
    pub fn push_input(&self, records: Vec<RawInputRecord>) {
        self.state.lock().input.push_back(records);
        self.input_ready.notify_all();
    }

    pub fn pending_input(&self) -> usize {
        self.state.lock().input.len()
    }

    /// Everything written so far, one entry per `write` call
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    /// Drain the captured writes
    pub fn take_writes(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().writes)
    }

    /// All captured writes concatenated
    pub fn output(&self) -> String {
        self.state.lock().writes.concat()
    }

    pub fn set_window_size(&self, cols: usize, rows: usize) {
        self.state.lock().size = WindowSize::new(cols, rows);
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make subsequent window size queries fail
    pub fn set_fail_window_size(&self, fail: bool) {
        self.state.lock().fail_window_size = fail;
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.state.lock().cleaned_up
    }

    /// Block up to `timeout` for queued input; true if any is queued
    pub fn wait_for_input(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if state.input.is_empty() {
            let _ = self.input_ready.wait_for(&mut state, timeout);
        }
        !state.input.is_empty()
    }
}

impl ConsolePort for FakeConsole {
    fn write(&self, text: &str) -> bool {
        let mut state = self.state.lock();
        if state.fail_writes {
            return false;
        }
        state.writes.push(text.to_string());
        true
    }

    fn read_input_records(&self) -> Vec<RawInputRecord> {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return Vec::new();
            }
            if let Some(records) = state.input.pop_front() {
                return records;
            }
            self.input_ready.wait(&mut state);
        }
    }

    fn window_size(&self) -> ConsoleResult<WindowSize> {
        let state = self.state.lock();
        if state.fail_window_size {
            return Err(ConsoleError::Closed);
        }
        Ok(state.size)
    }

    fn cursor_cache(&self) -> &Mutex<CursorVisibilityCache> {
        &self.cursor
    }

    fn query_cursor_visibility(&self) -> Option<CursorVisibility> {
        Some(self.initial_visibility)
    }

    fn cancel_read(&self) {
        self.state.lock().cancelled = true;
        self.input_ready.notify_all();
    }

    fn cleanup(&self) {
        self.restore_cursor_visibility();
        self.state.lock().cleaned_up = true;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::core::Size;

    #[test]
    fn test_captures_writes() {
        let console = FakeConsole::new(10, 5);
        assert!(console.write("a"));
        assert!(console.write("b"));
        assert_eq!(console.writes(), vec!["a", "b"]);
        assert_eq!(console.output(), "ab");
        assert_eq!(console.take_writes().len(), 2);
        assert!(console.writes().is_empty());
    }

    #[test]
    fn test_failed_writes() {
        let console = FakeConsole::new(10, 5);
        console.set_fail_writes(true);
        assert!(!console.write("a"));
        assert!(console.writes().is_empty());
    }

    #[test]
    fn test_read_returns_batches_in_order() {
        let console = FakeConsole::new(10, 5);
        console.push_input(vec![RawInputRecord::Focus(true)]);
        console.push_input(vec![RawInputRecord::Resize(Size::new(3, 4))]);
        assert_eq!(console.read_input_records(), vec![RawInputRecord::Focus(true)]);
        assert_eq!(
            console.read_input_records(),
            vec![RawInputRecord::Resize(Size::new(3, 4))]
        );
    }

    #[test]
    fn test_cancel_unblocks_read() {
        let console = Arc::new(FakeConsole::new(10, 5));
        let reader = {
            let console = Arc::clone(&console);
            thread::spawn(move || console.read_input_records())
        };
        thread::sleep(Duration::from_millis(20));
        console.cancel_read();
        assert!(reader.join().unwrap().is_empty());
    }

    #[test]
    fn test_cursor_visibility_through_port() {
        let console = FakeConsole::new(10, 5);
        assert!(!console.set_cursor_visibility(CursorVisibility::Invisible));
        assert!(console.writes().is_empty());

        console.capture_initial_cursor_visibility();
        assert!(console.ensure_cursor_visibility());
        assert_eq!(console.output(), "\x1b[?25l");
        assert_eq!(console.cursor_visibility(), Some(CursorVisibility::Invisible));

        console.cleanup();
        assert!(console.output().ends_with("\x1b[?25h\x1b[0 q"));
        assert!(console.is_cleaned_up());
    }

    #[test]
    fn test_window_size_failure() {
        let console = FakeConsole::new(10, 5);
        assert_eq!(console.window_size().unwrap().size(), Size::new(10, 5));
        console.set_fail_window_size(true);
        assert!(console.window_size().is_err());
    }
}
