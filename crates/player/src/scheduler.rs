//! Tokio-backed loop scheduling for the headless player.
//!
//! Each scheduled loop is a task ticking a `tokio::time::interval` and
//! sending its handle down a channel. The main loop receives the handles and
//! wakes the practice session with them.

use std::collections::HashMap;
use std::time::Duration;

use fretflow_core::{Cadence, LoopHandle, Scheduler};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

const MIN_PERIOD_MS: f64 = 1.0;

pub struct TokioScheduler {
    frame_interval_ms: f64,
    wakes: mpsc::UnboundedSender<LoopHandle>,
    tasks: HashMap<LoopHandle, JoinHandle<()>>,
    next: u64,
}

impl TokioScheduler {
    /// `frame_interval_ms` is the period used for per-frame loops.
    pub fn new(frame_interval_ms: f64) -> (Self, mpsc::UnboundedReceiver<LoopHandle>) {
        let (wakes, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            frame_interval_ms,
            wakes,
            tasks: HashMap::new(),
            next: 0,
        };
        (scheduler, receiver)
    }

    fn period(&self, cadence: Cadence) -> Duration {
        let ms = match cadence {
            Cadence::Interval { period_ms } => period_ms,
            Cadence::Frame => self.frame_interval_ms,
        };
        let ms = if ms.is_finite() { ms.max(MIN_PERIOD_MS) } else { MIN_PERIOD_MS };
        Duration::from_secs_f64(ms / 1000.0)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, cadence: Cadence) -> Option<LoopHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, cannot schedule playback loop");
            return None;
        };

        self.next += 1;
        let handle = LoopHandle(self.next);
        let period = self.period(cadence);
        let wakes = self.wakes.clone();

        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if wakes.send(handle).is_err() {
                    break;
                }
            }
        });
        self.tasks.insert(handle, task);
        Some(handle)
    }

    fn cancel(&mut self, handle: LoopHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
