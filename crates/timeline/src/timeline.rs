use crate::TimedEvent;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimelineError {
    #[error("invalid timeline duration: {0}")]
    InvalidDuration(f64),
}

/// Where an event sits relative to a query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Upcoming,
    Active,
    Passed,
}

/// Immutable, time-sorted sequence of events plus the song duration (ms).
///
/// Events sharing a start time (the strings of a chord shape) are kept
/// adjacent, so every group query can hand them back together.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    events: Vec<TimedEvent>,
    duration: f64,
}

impl Timeline {
    /// Build a timeline, dropping malformed events.
    ///
    /// The duration is raised to the end of the last event if it falls
    /// short. A negative or non-finite duration rejects the whole timeline.
    pub fn new(events: Vec<TimedEvent>, duration: f64) -> Result<Self, TimelineError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(TimelineError::InvalidDuration(duration));
        }

        let total = events.len();
        let mut events: Vec<TimedEvent> = events.into_iter().filter(TimedEvent::is_valid).collect();
        if events.len() < total {
            warn!(
                dropped = total - events.len(),
                "dropped malformed timeline events"
            );
        }

        // Stable sort keeps the original string order inside a chord group.
        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        let last_end = events.iter().map(TimedEvent::end).fold(0.0, f64::max);
        let duration = if last_end > duration {
            debug!(duration, last_end, "extending timeline to cover last event");
            last_end
        } else {
            duration
        };

        Ok(Self { events, duration })
    }

    pub fn empty(duration: f64) -> Result<Self, TimelineError> {
        Self::new(Vec::new(), duration)
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the first event starting strictly after `t`.
    fn first_after(&self, t: f64) -> usize {
        self.events.partition_point(|e| e.time <= t)
    }

    /// The active event group at `t`.
    ///
    /// Among events containing `t`, the one that started most recently wins;
    /// every event sharing its start time that also contains `t` is returned
    /// with it. Empty when nothing is active.
    pub fn find_active(&self, t: f64) -> Vec<&TimedEvent> {
        // Instantaneous events count as active slightly past their time.
        let end = self.first_after(t + crate::INSTANT_EPSILON_MS);
        let Some(latest) = self.events[..end].iter().rev().find(|e| e.contains(t)) else {
            return Vec::new();
        };

        let start_time = latest.time;
        let group_start = self.events.partition_point(|e| e.time < start_time);
        self.events[group_start..end]
            .iter()
            .filter(|e| e.time == start_time && e.contains(t))
            .collect()
    }

    /// The earliest group of events starting strictly after `t`.
    ///
    /// With `within`, the group is only returned if it starts no later than
    /// `t + within`.
    pub fn find_upcoming(&self, t: f64, within: Option<f64>) -> &[TimedEvent] {
        let start = self.first_after(t);
        let Some(next) = self.events.get(start) else {
            return &[];
        };
        if within.is_some_and(|w| next.time - t > w) {
            return &[];
        }
        let end = start + self.events[start..].partition_point(|e| e.time <= next.time);
        &self.events[start..end]
    }

    /// Events whose span intersects `[t - lookbehind, t + lookahead]`.
    ///
    /// Held events occupy `[time, end)`; instantaneous ones are points.
    pub fn find_visible(&self, t: f64, lookbehind: f64, lookahead: f64) -> Vec<&TimedEvent> {
        let from = t - lookbehind;
        let to = t + lookahead;
        let end = self.first_after(to);
        self.events[..end]
            .iter()
            .filter(|e| {
                if e.is_instantaneous() {
                    e.time >= from
                } else {
                    e.end() > from
                }
            })
            .collect()
    }

    pub fn phase_of(&self, event: &TimedEvent, t: f64) -> EventPhase {
        if event.contains(t) {
            EventPhase::Active
        } else if t < event.time {
            EventPhase::Upcoming
        } else {
            EventPhase::Passed
        }
    }

    /// Fraction of the song played at `t`, clamped to `[0, 1]`.
    pub fn progress(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (t / self.duration).clamp(0.0, 1.0)
    }
}
