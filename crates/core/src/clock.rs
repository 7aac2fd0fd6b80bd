//! Wall-clock sources and the shared playback-speed cell.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic real time in milliseconds.
pub trait WallClock: Send {
    fn now(&self) -> f64;
}

/// Real time measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for InstantClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven wall clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: f64) {
        self.set(self.now() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.store(ms.to_bits(), Ordering::Relaxed);
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::Relaxed))
    }
}

/// Playback speed multiplier shared between the transport and its driver.
///
/// Drivers hold a clone and read it on every tick, so a change lands on the
/// next tick without restarting the loop.
#[derive(Debug, Clone)]
pub struct SpeedCell(Arc<AtomicU64>);

impl SpeedCell {
    pub fn new(speed: f64) -> Self {
        Self(Arc::new(AtomicU64::new(speed.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, speed: f64) {
        self.0.store(speed.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SpeedCell {
    fn default() -> Self {
        Self::new(1.0)
    }
}
