//! Resize Detection
//!
//! Some hosts report window-size changes as input records, others only
//! reveal them when the size is queried. The strategy is chosen at startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Size;

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// How the driver learns about window-size changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResizeStrategy {
    /// Trust resize records delivered with the input stream
    EventDriven,
    /// Ignore resize records and query the size on an interval
    Polling {
        #[serde(default = "default_interval_ms")]
        interval_ms: u64,
    },
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for ResizeStrategy {
    fn default() -> Self {
        ResizeStrategy::EventDriven
    }
}

impl ResizeStrategy {
    pub fn polling() -> Self {
        ResizeStrategy::Polling {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Whether resize records from the input stream are acted on
    pub fn accepts_resize_records(&self) -> bool {
        matches!(self, ResizeStrategy::EventDriven)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        match self {
            ResizeStrategy::EventDriven => None,
            ResizeStrategy::Polling { interval_ms } => Some(Duration::from_millis(*interval_ms)),
        }
    }

    /// The new size if a queried size differs from the known one
    ///
    /// An empty size means the query told us nothing.
    pub fn detect(known: Size, current: Size) -> Option<Size> {
        if current.is_empty() || current == known {
            None
        } else {
            Some(current)
        }
    }
}
