//! Host-side loop scheduling.
//!
//! The engine never sleeps or spins. When playback starts it asks the host
//! for a repeating loop at some cadence and receives a [`LoopHandle`]; the
//! host then wakes the session with that handle once per period until the
//! loop is cancelled. Wakes carrying any other handle are stale and ignored.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopHandle(pub u64);

/// How often a driver needs to be woken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Cadence {
    /// Fixed wall-clock period in milliseconds.
    Interval { period_ms: f64 },
    /// Once per rendered frame.
    Frame,
}

pub trait Scheduler: Send {
    /// Start a repeating loop. `None` means the host cannot schedule anything.
    fn schedule(&mut self, cadence: Cadence) -> Option<LoopHandle>;

    /// Stop a loop. Cancelling an unknown or already-cancelled handle is a no-op.
    fn cancel(&mut self, handle: LoopHandle);
}

/// Scheduler for environments with no timer or frame primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScheduler;

impl Scheduler for NullScheduler {
    fn schedule(&mut self, _cadence: Cadence) -> Option<LoopHandle> {
        None
    }

    fn cancel(&mut self, _handle: LoopHandle) {}
}

#[derive(Debug, Default)]
struct ManualInner {
    next: u64,
    active: HashSet<LoopHandle>,
    last_cadence: Option<Cadence>,
    scheduled: usize,
    cancelled: usize,
    unavailable: bool,
}

/// Scheduler whose loops only fire when the host says so.
///
/// Clones share state, so a host (or test) can keep one clone to inspect
/// the active loops while the transport owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut ManualInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut inner)
    }

    pub fn is_active(&self, handle: LoopHandle) -> bool {
        self.with(|inner| inner.active.contains(&handle))
    }

    pub fn active_count(&self) -> usize {
        self.with(|inner| inner.active.len())
    }

    /// The single active loop, if exactly one is running.
    pub fn active(&self) -> Option<LoopHandle> {
        self.with(|inner| {
            if inner.active.len() == 1 {
                inner.active.iter().next().copied()
            } else {
                None
            }
        })
    }

    pub fn last_cadence(&self) -> Option<Cadence> {
        self.with(|inner| inner.last_cadence)
    }

    pub fn scheduled_count(&self) -> usize {
        self.with(|inner| inner.scheduled)
    }

    pub fn cancelled_count(&self) -> usize {
        self.with(|inner| inner.cancelled)
    }

    /// While unavailable, `schedule` refuses like [`NullScheduler`].
    pub fn set_available(&self, available: bool) {
        self.with(|inner| inner.unavailable = !available);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, cadence: Cadence) -> Option<LoopHandle> {
        self.with(|inner| {
            if inner.unavailable {
                return None;
            }
            inner.next += 1;
            let handle = LoopHandle(inner.next);
            inner.active.insert(handle);
            inner.last_cadence = Some(cadence);
            inner.scheduled += 1;
            Some(handle)
        })
    }

    fn cancel(&mut self, handle: LoopHandle) {
        self.with(|inner| {
            if inner.active.remove(&handle) {
                inner.cancelled += 1;
            }
        });
    }
}
