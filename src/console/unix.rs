//! Unix console
//!
//! Puts the controlling terminal into raw mode, enables SGR mouse reporting
//! and translates stdin bytes into input records. Window-size changes are
//! noticed between reads and reported as resize records.

use std::io::{self, IsTerminal, Write};
use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::libc::{self, STDIN_FILENO, STDOUT_FILENO};
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::termios::{self, SetArg, Termios};
use nix::unistd::read;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::{ConsoleError, ConsolePort, ConsoleResult, CursorVisibilityCache, WindowSize};
use crate::core::Size;
use crate::input::{RawInputRecord, VtInputTranslator};
use crate::renderer::ansi;

/// How long one poll waits before checking for cancellation and resizes
const POLL_INTERVAL_MS: i32 = 100;

/// The process's controlling terminal in raw mode
pub struct UnixConsole {
    original_termios: Mutex<Termios>,
    translator: Mutex<VtInputTranslator>,
    cursor: Mutex<CursorVisibilityCache>,
    last_size: Mutex<Option<Size>>,
    cancelled: AtomicBool,
    input_closed: AtomicBool,
    restored: AtomicBool,
}

impl UnixConsole {
    /// Take over stdin/stdout
    ///
    /// Fails when either is not a terminal; the terminal is left untouched
    /// in that case.
    pub fn open() -> ConsoleResult<Self> {
        if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
            return Err(ConsoleError::NotATerminal);
        }

        let original = termios::tcgetattr(io::stdin()).map_err(ConsoleError::GetAttributes)?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw).map_err(ConsoleError::SetAttributes)?;

        let size = query_window_size(STDOUT_FILENO).ok().map(|ws| ws.size());
        let console = Self {
            original_termios: Mutex::new(original),
            translator: Mutex::new(VtInputTranslator::new()),
            cursor: Mutex::new(CursorVisibilityCache::new()),
            last_size: Mutex::new(size),
            cancelled: AtomicBool::new(false),
            input_closed: AtomicBool::new(false),
            restored: AtomicBool::new(false),
        };
        console.write(ansi::ENABLE_MOUSE_REPORTING);
        debug!(?size, "console opened in raw mode");
        Ok(console)
    }

    /// Poll stdin for data
    ///
    /// Returns true if data is available, false if the timeout expired.
    fn poll_input(&self, timeout_ms: i32) -> ConsoleResult<bool> {
        // SAFETY: stdin stays open for the lifetime of the process
        let borrowed_fd = unsafe { BorrowedFd::borrow_raw(STDIN_FILENO) };
        let mut fds = [PollFd::new(&borrowed_fd, PollFlags::POLLIN)];
        match poll(&mut fds, timeout_ms) {
            Ok(n) => Ok(n > 0
                && fds[0]
                    .revents()
                    .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(ConsoleError::Poll(e)),
        }
    }

    /// A resize record if the window changed since the last check
    fn check_resize(&self) -> Option<RawInputRecord> {
        let current = query_window_size(STDOUT_FILENO).ok()?.size();
        let mut last = self.last_size.lock();
        if *last == Some(current) {
            return None;
        }
        *last = Some(current);
        debug!(cols = current.cols, rows = current.rows, "terminal resized");
        Some(RawInputRecord::Resize(current))
    }
}

impl ConsolePort for UnixConsole {
    fn write(&self, text: &str) -> bool {
        match write_flushed(&mut io::stdout().lock(), text) {
            Ok(()) => true,
            Err(e) => {
                trace!(error = %e, "console write failed");
                false
            }
        }
    }

    fn read_input_records(&self) -> Vec<RawInputRecord> {
        let mut buf = [0u8; 1024];
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return Vec::new();
            }

            if self.input_closed.load(Ordering::Acquire) {
                std::thread::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS as u64));
                if let Some(record) = self.check_resize() {
                    return vec![record];
                }
                continue;
            }

            match self.poll_input(POLL_INTERVAL_MS) {
                Ok(true) => {}
                Ok(false) => {
                    if let Some(record) = self.check_resize() {
                        return vec![record];
                    }
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "console input poll failed");
                    return Vec::new();
                }
            }

            match read(STDIN_FILENO, &mut buf) {
                Ok(0) => {
                    debug!("console input closed");
                    self.input_closed.store(true, Ordering::Release);
                }
                Ok(n) => {
                    let records = self.translator.lock().feed(&buf[..n]);
                    trace!(bytes = n, records = records.len(), "console input");
                    if !records.is_empty() {
                        return records;
                    }
                }
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => {}
                Err(e) => {
                    warn!(error = %e, "console read failed");
                    return Vec::new();
                }
            }
        }
    }

    fn window_size(&self) -> ConsoleResult<WindowSize> {
        query_window_size(STDOUT_FILENO)
    }

    fn cursor_cache(&self) -> &Mutex<CursorVisibilityCache> {
        &self.cursor
    }

    fn cancel_read(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn cleanup(&self) {
        if self.restored.swap(true, Ordering::AcqRel) {
            return;
        }
        self.write(ansi::DISABLE_MOUSE_REPORTING);
        self.restore_cursor_visibility();
        let original = self.original_termios.lock();
        if let Err(e) = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &original) {
            warn!(error = %e, "failed to restore terminal attributes");
        }
        debug!("console restored");
    }
}

impl Drop for UnixConsole {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Query the window size of a terminal file descriptor
fn query_window_size(fd: i32) -> ConsoleResult<WindowSize> {
    let mut winsize = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCGWINSZ is a valid ioctl for getting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut winsize) };

    if result < 0 {
        Err(ConsoleError::WindowSize(Errno::last()))
    } else {
        Ok(WindowSize::new(winsize.ws_col as usize, winsize.ws_row as usize))
    }
}

fn write_flushed(out: &mut impl Write, text: &str) -> ConsoleResult<()> {
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let err = write_flushed(&mut BrokenPipe, "x").unwrap_err();
        assert!(matches!(err, ConsoleError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_write_flushed_writes_text() {
        let mut out = Vec::new();
        write_flushed(&mut out, "\x1b[1;1Hok").unwrap();
        assert_eq!(out, b"\x1b[1;1Hok");
    }

    #[test]
    fn test_window_size_of_non_terminal_fails() {
        let file = tempfile::tempfile().unwrap();
        let fd = std::os::fd::AsRawFd::as_raw_fd(&file);
        assert!(matches!(query_window_size(fd), Err(ConsoleError::WindowSize(_))));
    }

    #[test]
    fn test_open_without_terminal() {
        // Test harnesses normally capture stdout, in which case opening fails
        // without touching terminal state.
        if io::stdout().is_terminal() && io::stdin().is_terminal() {
            return;
        }
        assert!(matches!(UnixConsole::open(), Err(ConsoleError::NotATerminal)));
    }
}
