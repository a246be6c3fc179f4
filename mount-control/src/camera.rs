//! Camera shutter triggering.
//!
//! The planner only needs a fire-and-forget shutter line; the actual
//! camera protocol lives behind the trait. The debounce wrapper
//! enforces a minimum interval between releases so a misbehaving
//! caller cannot hammer the shutter.

use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum spacing between shutter releases.
pub const MIN_SNAP_INTERVAL: Duration = Duration::from_millis(2000);

/// Fire-and-forget shutter release.
pub trait CameraTrigger {
    fn fire(&mut self);
}

/// Drops releases arriving faster than a minimum interval.
pub struct DebouncedTrigger<C: CameraTrigger> {
    inner: C,
    min_interval: Duration,
    last_fired: Option<Instant>,
}

impl<C: CameraTrigger> DebouncedTrigger<C> {
    pub fn new(inner: C, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_fired: None,
        }
    }

    pub fn with_default_interval(inner: C) -> Self {
        Self::new(inner, MIN_SNAP_INTERVAL)
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: CameraTrigger> CameraTrigger for DebouncedTrigger<C> {
    fn fire(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_fired {
            if now.duration_since(last) < self.min_interval {
                debug!("shutter release debounced");
                return;
            }
        }
        self.last_fired = Some(now);
        self.inner.fire();
    }
}
