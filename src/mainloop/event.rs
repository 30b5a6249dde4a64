//! Synchronization Primitives
//!
//! A manual-reset event and a shared cancellation flag used by the main
//! loop driver to hand work between the loop thread and its helpers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// An event that stays signaled until explicitly reset
#[derive(Debug, Default)]
pub struct ResetEvent {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl ResetEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the event, releasing all waiters
    pub fn set(&self) {
        *self.signaled.lock() = true;
        self.condvar.notify_all();
    }

    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.signaled.lock()
    }

    /// Wait until the event is signaled or the timeout elapses
    ///
    /// `None` waits indefinitely. Returns whether the event was signaled.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut signaled = self.signaled.lock();
        match timeout {
            None => {
                while !*signaled {
                    self.condvar.wait(&mut signaled);
                }
                true
            }
            Some(timeout) => {
                if !*signaled {
                    let _ = self.condvar.wait_for(&mut signaled, timeout);
                }
                *signaled
            }
        }
    }
}

/// A cloneable cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
