mod hit;
mod timeline;

use serde::{Deserialize, Serialize};

pub use hit::{Hit, HitDetector, HitQuality, HitWindows};
pub use timeline::{EventPhase, Timeline, TimelineError};

/// Number of strings on the fretboard (standard six-string guitar).
pub const STRING_COUNT: u8 = 6;

/// Highest fret an event may reference.
pub const MAX_FRET: u8 = 24;

/// Window (ms) around an instantaneous event's time in which it counts as active.
pub const INSTANT_EPSILON_MS: f64 = 1.0;

/// A position on the neck. `string` 0 is the low E, 5 the high e.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FretPosition {
    pub string: u8,
    pub fret: u8,
}

impl FretPosition {
    pub fn new(string: u8, fret: u8) -> Self {
        Self { string, fret }
    }

    pub fn is_open(&self) -> bool {
        self.fret == 0
    }
}

/// What an event asks the player to play.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Chord(String),
    Note(FretPosition),
}

impl Payload {
    pub fn chord_label(&self) -> Option<&str> {
        match self {
            Payload::Chord(label) => Some(label),
            Payload::Note(_) => None,
        }
    }

    pub fn position(&self) -> Option<FretPosition> {
        match self {
            Payload::Note(pos) => Some(*pos),
            Payload::Chord(_) => None,
        }
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Chord(label) => write!(f, "{label}"),
            Payload::Note(pos) => write!(f, "s{}f{}", pos.string, pos.fret),
        }
    }
}

/// One chord or note on the song timeline.
///
/// `time` and `duration` are milliseconds from the start of the song. Notes
/// may have no duration, in which case they are instantaneous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub payload: Payload,
}

impl TimedEvent {
    pub fn chord(time: f64, duration: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            duration: Some(duration),
            payload: Payload::Chord(label.into()),
        }
    }

    pub fn note(time: f64, string: u8, fret: u8) -> Self {
        Self {
            time,
            duration: None,
            payload: Payload::Note(FretPosition::new(string, fret)),
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// End of the event; equal to `time` for instantaneous events.
    pub fn end(&self) -> f64 {
        self.time + self.duration.unwrap_or(0.0)
    }

    pub fn is_instantaneous(&self) -> bool {
        self.duration.is_none_or(|d| d <= 0.0)
    }

    /// Whether `t` lies inside the event: `[time, end)` for held events,
    /// within [`INSTANT_EPSILON_MS`] of `time` for instantaneous ones.
    pub fn contains(&self, t: f64) -> bool {
        if self.is_instantaneous() {
            (t - self.time).abs() <= INSTANT_EPSILON_MS
        } else {
            self.time <= t && t < self.end()
        }
    }

    /// Stable identity used for hit deduplication.
    pub fn key(&self) -> EventKey {
        EventKey {
            time_micros: (self.time * 1000.0).round() as i64,
            payload: self.payload.clone(),
        }
    }

    /// Rejects negative or non-finite times and positions off the neck.
    pub fn is_valid(&self) -> bool {
        if !self.time.is_finite() || self.time < 0.0 {
            return false;
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                return false;
            }
        }
        match &self.payload {
            Payload::Chord(label) => !label.trim().is_empty(),
            Payload::Note(pos) => pos.string < STRING_COUNT && pos.fret <= MAX_FRET,
        }
    }
}

/// Identity of an event: its start time (rounded to microseconds) plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    time_micros: i64,
    payload: Payload,
}

impl EventKey {
    /// Start time of the keyed event in milliseconds.
    pub fn time(&self) -> f64 {
        self.time_micros as f64 / 1000.0
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}
