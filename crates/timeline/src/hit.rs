use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{EventKey, Payload, TimedEvent};

/// Symmetric tolerance bands (ms) around an event's time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitWindows {
    pub perfect_ms: f64,
    pub good_ms: f64,
}

impl HitWindows {
    pub fn new(perfect_ms: f64, good_ms: f64) -> Self {
        Self {
            perfect_ms,
            good_ms: good_ms.max(perfect_ms),
        }
    }

    /// Classify `delta = t - event.time`. Band edges are inclusive.
    pub fn classify(&self, delta: f64) -> Option<HitQuality> {
        let abs = delta.abs();
        if abs <= self.perfect_ms {
            Some(HitQuality::Perfect)
        } else if abs <= self.good_ms {
            Some(HitQuality::Good)
        } else {
            None
        }
    }
}

impl Default for HitWindows {
    fn default() -> Self {
        Self::new(40.0, 80.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitQuality {
    Perfect,
    Good,
}

impl std::fmt::Display for HitQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HitQuality::Perfect => write!(f, "perfect"),
            HitQuality::Good => write!(f, "good"),
        }
    }
}

/// A fired hit, as delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub event_time: f64,
    pub payload: Payload,
    pub quality: HitQuality,
    /// `t - event_time` at the moment the hit fired.
    pub delta: f64,
}

type HitListener = Box<dyn FnMut(&Hit) + Send>;

/// Fires each event at most once as time sweeps through its hit window.
///
/// Fired keys are remembered until the event falls further than the
/// cleanup horizon into the past, which bounds memory on long or looping
/// sessions.
pub struct HitDetector {
    windows: HitWindows,
    cleanup_horizon: f64,
    fired: HashSet<EventKey>,
    listeners: Vec<HitListener>,
}

impl HitDetector {
    /// `cleanup_horizon` is raised to twice the good window if smaller, so a
    /// key is never purged while its event could still re-enter the window.
    pub fn new(windows: HitWindows, cleanup_horizon: f64) -> Self {
        Self {
            windows,
            cleanup_horizon: cleanup_horizon.max(windows.good_ms * 2.0),
            fired: HashSet::new(),
            listeners: Vec::new(),
        }
    }

    pub fn windows(&self) -> HitWindows {
        self.windows
    }

    pub fn cleanup_horizon(&self) -> f64 {
        self.cleanup_horizon
    }

    pub fn on_hit(&mut self, listener: impl FnMut(&Hit) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn has_fired(&self, event: &TimedEvent) -> bool {
        self.fired.contains(&event.key())
    }

    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }

    /// Fire `event` if `t` is inside its good window and it has not fired yet.
    pub fn check_and_fire(&mut self, event: &TimedEvent, t: f64) -> Option<Hit> {
        let delta = t - event.time;
        let quality = self.windows.classify(delta)?;
        if !self.fired.insert(event.key()) {
            return None;
        }

        let hit = Hit {
            event_time: event.time,
            payload: event.payload.clone(),
            quality,
            delta,
        };
        trace!(event_time = hit.event_time, %quality, delta, "hit");
        for listener in &mut self.listeners {
            listener(&hit);
        }
        Some(hit)
    }

    /// Forget keys for events older than `t - cleanup_horizon`.
    pub fn collect_garbage(&mut self, t: f64) {
        let cutoff = t - self.cleanup_horizon;
        self.fired.retain(|key| key.time() >= cutoff);
    }

    /// Re-arm every event that can be reached again after jumping to `target`.
    pub fn invalidate_from(&mut self, target: f64) {
        let from = target - self.windows.good_ms;
        let before = self.fired.len();
        self.fired.retain(|key| key.time() < from);
        debug!(
            target,
            rearmed = before - self.fired.len(),
            "invalidated hit record"
        );
    }

    pub fn clear(&mut self) {
        self.fired.clear();
    }
}

impl std::fmt::Debug for HitDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HitDetector")
            .field("windows", &self.windows)
            .field("cleanup_horizon", &self.cleanup_horizon)
            .field("fired", &self.fired.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
