//! Main Loop
//!
//! A cooperative scheduler for timers and idle handlers. Each iteration
//! fires the due timers, lets the platform driver drain its input, then
//! runs the idle handlers. Timers and idle handlers may be added from any
//! thread; callbacks always run on the thread that drives the loop.
//!
//! Both collections are swapped out before their callbacks run, so work
//! scheduled from inside a callback is deferred to the next iteration.

pub mod driver;
pub mod event;
pub mod resize;

pub use driver::{AnsiMainLoopDriver, FakeMainLoopDriver, InputSink, MainLoopDriver};
pub use event::{CancelToken, ResetEvent};
pub use resize::ResizeStrategy;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

/// Source of monotonic time in nanoseconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-independent time since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

type TimeoutCallback = Box<dyn FnMut(&MainLoop) -> bool + Send>;
type IdleCallback = Box<dyn FnMut() -> bool + Send>;

/// Handle for removing a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutToken(u64);

/// Handle for removing an idle handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleToken(u64);

struct Timeout {
    id: u64,
    span: Duration,
    callback: TimeoutCallback,
}

/// The scheduler
pub struct MainLoop {
    driver: Box<dyn MainLoopDriver>,
    clock: Arc<dyn Clock>,
    /// Keyed by fire time; keys are unique
    timeouts: Mutex<BTreeMap<u64, Timeout>>,
    idle_handlers: Mutex<Vec<(u64, IdleCallback)>>,
    next_id: AtomicU64,
    running: AtomicBool,
    torn_down: AtomicBool,
}

impl MainLoop {
    pub fn new(driver: Box<dyn MainLoopDriver>) -> Self {
        Self::with_clock(driver, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(driver: Box<dyn MainLoopDriver>, clock: Arc<dyn Clock>) -> Self {
        let main_loop = Self {
            driver,
            clock,
            timeouts: Mutex::new(BTreeMap::new()),
            idle_handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        };
        main_loop.driver.setup(&main_loop);
        debug!("main loop set up");
        main_loop
    }

    pub fn driver(&self) -> &dyn MainLoopDriver {
        self.driver.as_ref()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run `callback` once `span` has elapsed
    ///
    /// If the callback returns true it is scheduled again `span` after the
    /// time it actually ran; returning false removes it.
    pub fn add_timeout<F>(&self, span: Duration, callback: F) -> TimeoutToken
    where
        F: FnMut(&MainLoop) -> bool + Send + 'static,
    {
        let id = self.next_id();
        self.insert_timeout(Timeout {
            id,
            span,
            callback: Box::new(callback),
        });
        self.driver.wakeup();
        TimeoutToken(id)
    }

    fn insert_timeout(&self, timeout: Timeout) {
        let fire_at = self.clock.now().saturating_add(timeout.span.as_nanos() as u64);
        let mut timeouts = self.timeouts.lock();
        let key = nudge_to_unique_key(&timeouts, fire_at);
        timeouts.insert(key, timeout);
    }

    /// Returns false if the timeout already fired for the last time or was removed
    pub fn remove_timeout(&self, token: TimeoutToken) -> bool {
        let mut timeouts = self.timeouts.lock();
        let key = timeouts
            .iter()
            .find(|(_, timeout)| timeout.id == token.0)
            .map(|(key, _)| *key);
        match key {
            Some(key) => timeouts.remove(&key).is_some(),
            None => false,
        }
    }

    /// Run `handler` once per iteration for as long as it returns true
    pub fn add_idle<F>(&self, handler: F) -> IdleToken
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let id = self.next_id();
        self.idle_handlers.lock().push((id, Box::new(handler)));
        self.driver.wakeup();
        IdleToken(id)
    }

    pub fn remove_idle(&self, token: IdleToken) -> bool {
        let mut handlers = self.idle_handlers.lock();
        match handlers.iter().position(|(id, _)| *id == token.0) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Run `action` once on the loop thread
    pub fn invoke<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut action = Some(action);
        self.add_idle(move || {
            if let Some(action) = action.take() {
                action();
            }
            false
        });
    }

    /// Whether any timer or idle handler exists, and how long a caller may
    /// block before the first timer is due
    ///
    /// The wait is `Some` whenever a timer exists (zero when it is already
    /// due) and `None` when only idle handlers or nothing is scheduled.
    pub fn check_timers_and_idle(&self) -> (bool, Option<Duration>) {
        let now = self.clock.now();
        {
            let timeouts = self.timeouts.lock();
            if let Some(first) = timeouts.keys().next() {
                return (true, Some(Duration::from_nanos(first.saturating_sub(now))));
            }
        }
        (!self.idle_handlers.lock().is_empty(), None)
    }

    /// Ask the driver whether there is work; may block
    pub fn events_pending(&self) -> bool {
        self.driver.events_pending(self)
    }

    /// Fire due timers, drain driver input, then run idle handlers
    pub fn run_iteration(&self) {
        let has_timers = !self.timeouts.lock().is_empty();
        if has_timers {
            self.run_timers();
        }

        self.driver.iteration(self);

        let has_idle = !self.idle_handlers.lock().is_empty();
        if has_idle {
            self.run_idle();
        }
    }

    fn run_timers(&self) {
        let now = self.clock.now();
        let copy = std::mem::take(&mut *self.timeouts.lock());
        let mut fired = 0usize;

        for (key, mut timeout) in copy {
            if key < now {
                fired += 1;
                if (timeout.callback)(self) {
                    self.insert_timeout(timeout);
                }
            } else {
                let mut timeouts = self.timeouts.lock();
                let key = nudge_to_unique_key(&timeouts, key);
                timeouts.insert(key, timeout);
            }
        }
        trace!(fired, "timers run");
    }

    fn run_idle(&self) {
        let batch = std::mem::take(&mut *self.idle_handlers.lock());
        let count = batch.len();

        for (id, mut handler) in batch {
            if handler() {
                self.idle_handlers.lock().push((id, handler));
            }
        }
        trace!(count, "idle handlers run");
    }

    /// Run until [`MainLoop::stop`] is called
    pub fn run(&self) {
        let previous = self.running.swap(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            self.events_pending();
            self.run_iteration();
        }
        self.running.store(previous, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Make `run` return after the current iteration; callable from callbacks
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.driver.wakeup();
    }

    pub fn timeouts_len(&self) -> usize {
        self.timeouts.lock().len()
    }

    /// Fire times of the scheduled timers, in firing order
    pub fn timeout_keys(&self) -> Vec<u64> {
        self.timeouts.lock().keys().copied().collect()
    }

    pub fn idle_len(&self) -> usize {
        self.idle_handlers.lock().len()
    }

    pub fn has_idle_handlers(&self) -> bool {
        !self.idle_handlers.lock().is_empty()
    }
}

impl Drop for MainLoop {
    fn drop(&mut self) {
        self.stop();
        if !self.torn_down.swap(true, Ordering::SeqCst) {
            self.driver.teardown();
            debug!("main loop torn down");
        }
    }
}

/// The first key at or after `key` that is not taken
fn nudge_to_unique_key<V>(map: &BTreeMap<u64, V>, mut key: u64) -> u64 {
    while map.contains_key(&key) {
        key += 1;
    }
    key
}
