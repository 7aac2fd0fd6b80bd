use std::collections::HashMap;

use fretflow_timeline::{FretPosition, STRING_COUNT, TimedEvent};

/// How long a fretboard cell keeps glowing after its note passes.
pub const FADE_OUT_MS: f64 = 300.0;

/// Extra room below the hit line a note may fall to before it is pinned.
const HIT_LINE_OVERSHOOT: f64 = 20.0;

const HIT_ZONE_HALF_HEIGHT: f64 = 25.0;

const MAX_NOTE_SIZE: f64 = 36.0;

/// Maps song time onto a vertical note highway with one lane per string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighwayProjection {
    pub width: f64,
    pub hit_line_y: f64,
    pub lookahead_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotePlacement {
    pub x: f64,
    pub y: f64,
    pub in_hit_zone: bool,
}

impl HighwayProjection {
    pub fn new(width: f64, hit_line_y: f64, lookahead_ms: f64) -> Self {
        Self {
            width,
            hit_line_y,
            lookahead_ms,
        }
    }

    pub fn lane_width(&self) -> f64 {
        self.width / STRING_COUNT as f64
    }

    pub fn note_size(&self) -> f64 {
        (self.lane_width() * 0.6).min(MAX_NOTE_SIZE)
    }

    /// Horizontal centre of a string's lane.
    pub fn lane_x(&self, string: u8) -> f64 {
        (string as f64 + 0.5) * self.lane_width()
    }

    /// 0 when the event is a full lookahead away, 1 at the hit line.
    pub fn progress(&self, event_time: f64, t: f64) -> f64 {
        if self.lookahead_ms <= 0.0 {
            return 1.0;
        }
        1.0 - (event_time - t) / self.lookahead_ms
    }

    pub fn y(&self, event_time: f64, t: f64) -> f64 {
        let y = self.progress(event_time, t) * self.hit_line_y;
        y.clamp(-self.note_size(), self.hit_line_y + HIT_LINE_OVERSHOOT)
    }

    /// Screen placement of a note event. Chords have no lane.
    pub fn place(&self, event: &TimedEvent, t: f64) -> Option<NotePlacement> {
        let position = event.payload.position()?;
        let y = self.y(event.time, t);
        Some(NotePlacement {
            x: self.lane_x(position.string),
            y,
            in_hit_zone: (y - self.hit_line_y).abs() <= HIT_ZONE_HALF_HEIGHT,
        })
    }
}

/// Fretboard cell highlight: fills up as a note approaches, then fades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteFill {
    pub fill: f64,
    pub opacity: f64,
}

impl NoteFill {
    /// `None` once the note is out of the lookahead or fully faded.
    pub fn at(event_time: f64, t: f64, lookahead_ms: f64) -> Option<Self> {
        let dt = event_time - t;
        if dt > lookahead_ms || dt < -FADE_OUT_MS {
            return None;
        }
        if dt >= 0.0 {
            let fill = if lookahead_ms > 0.0 { 1.0 - dt / lookahead_ms } else { 1.0 };
            Some(Self { fill, opacity: 1.0 })
        } else {
            Some(Self {
                fill: 1.0,
                opacity: (1.0 + dt / FADE_OUT_MS).max(0.0),
            })
        }
    }
}

/// Fill per fretboard cell. Where several notes share a cell the fullest wins.
pub fn fretboard_fill<'a>(
    events: impl IntoIterator<Item = &'a TimedEvent>,
    t: f64,
    lookahead_ms: f64,
) -> HashMap<FretPosition, NoteFill> {
    let mut cells: HashMap<FretPosition, NoteFill> = HashMap::new();
    for event in events {
        let Some(position) = event.payload.position() else {
            continue;
        };
        let Some(fill) = NoteFill::at(event.time, t, lookahead_ms) else {
            continue;
        };
        cells
            .entry(position)
            .and_modify(|current| {
                if fill.fill > current.fill {
                    *current = fill;
                }
            })
            .or_insert(fill);
    }
    cells
}

/// Song position as `m:ss.mmm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPosition {
    pub minutes: u32,
    pub seconds: u32,
    pub millis: u32,
}

impl PlaybackPosition {
    pub fn from_ms(ms: f64) -> Self {
        let total = if ms.is_finite() { ms.max(0.0).round() as u64 } else { 0 };
        Self {
            minutes: (total / 60_000) as u32,
            seconds: ((total / 1000) % 60) as u32,
            millis: (total % 1000) as u32,
        }
    }
}

impl std::fmt::Display for PlaybackPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}.{:03}", self.minutes, self.seconds, self.millis)
    }
}
