//! The three interchangeable time sources behind the clock.
//!
//! * [`TickDriver`] accumulates `real delta * speed` on every fixed-period tick.
//! * [`FrameDriver`] computes `anchor + real elapsed * speed` on every frame.
//! * [`MediaDriver`] reads a media element's own position.
//!
//! Drivers only do arithmetic. Scheduling, clamping to the song duration and
//! the play/pause state machine live in [`crate::ClockSource`] and
//! [`crate::Transport`].

use tracing::warn;

use crate::clock::SpeedCell;
use crate::scheduler::Cadence;

pub const DEFAULT_TICK_PERIOD_MS: f64 = 50.0;

/// Position jumps smaller than this are not pushed to a media element.
const MEDIA_SEEK_TOLERANCE_MS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Tick,
    Frame,
    Media,
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverKind::Tick => write!(f, "tick"),
            DriverKind::Frame => write!(f, "frame"),
            DriverKind::Media => write!(f, "media"),
        }
    }
}

pub trait ClockDriver: Send {
    fn kind(&self) -> DriverKind;

    /// How often the host must wake this driver while it runs.
    fn cadence(&self) -> Cadence;

    /// Begin advancing from `from` (ms of song time) at wall time `now`.
    fn start(&mut self, from: f64, now: f64);

    /// Current song position at wall time `now`. Read once per wake.
    fn sample(&mut self, now: f64) -> f64;

    /// Stop advancing and return the position reached at `now`.
    fn stop(&mut self, now: f64) -> f64;

    /// Move the position while stopped.
    fn seek(&mut self, position: f64);

    fn is_running(&self) -> bool;
}

/// A playable media handle the media driver can follow.
///
/// Positions are milliseconds; implementations convert from whatever unit
/// the underlying element uses.
pub trait MediaElement: Send {
    fn position(&self) -> f64;
    fn set_position(&mut self, position: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn set_rate(&mut self, rate: f64);
}

/// Which driver a clock should use.
pub enum DriverSpec {
    Tick { period_ms: f64 },
    Frame,
    Media(Box<dyn MediaElement>),
}

impl DriverSpec {
    pub fn kind(&self) -> DriverKind {
        match self {
            DriverSpec::Tick { .. } => DriverKind::Tick,
            DriverSpec::Frame => DriverKind::Frame,
            DriverSpec::Media(_) => DriverKind::Media,
        }
    }

    pub fn build(self, speed: SpeedCell) -> Box<dyn ClockDriver> {
        match self {
            DriverSpec::Tick { period_ms } => Box::new(TickDriver::new(period_ms, speed)),
            DriverSpec::Frame => Box::new(FrameDriver::new(speed)),
            DriverSpec::Media(media) => Box::new(MediaDriver::new(media, speed)),
        }
    }
}

impl std::fmt::Debug for DriverSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverSpec::Tick { period_ms } => f.debug_struct("Tick").field("period_ms", period_ms).finish(),
            DriverSpec::Frame => write!(f, "Frame"),
            DriverSpec::Media(_) => write!(f, "Media"),
        }
    }
}

#[derive(Debug)]
pub struct TickDriver {
    period_ms: f64,
    speed: SpeedCell,
    position: f64,
    last_tick: f64,
    running: bool,
}

impl TickDriver {
    pub fn new(period_ms: f64, speed: SpeedCell) -> Self {
        let period_ms = if period_ms.is_finite() && period_ms > 0.0 {
            period_ms
        } else {
            warn!(period_ms, "invalid tick period, using default");
            DEFAULT_TICK_PERIOD_MS
        };
        Self {
            period_ms,
            speed,
            position: 0.0,
            last_tick: 0.0,
            running: false,
        }
    }

    pub fn period_ms(&self) -> f64 {
        self.period_ms
    }
}

impl ClockDriver for TickDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Tick
    }

    fn cadence(&self) -> Cadence {
        Cadence::Interval {
            period_ms: self.period_ms,
        }
    }

    fn start(&mut self, from: f64, now: f64) {
        self.position = from;
        self.last_tick = now;
        self.running = true;
    }

    fn sample(&mut self, now: f64) -> f64 {
        if self.running {
            let real = (now - self.last_tick).max(0.0);
            self.position += real * self.speed.get();
            self.last_tick = now;
        }
        self.position
    }

    fn stop(&mut self, now: f64) -> f64 {
        let position = self.sample(now);
        self.running = false;
        position
    }

    fn seek(&mut self, position: f64) {
        self.position = position;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Per-frame driver: `position = anchor + (now - anchor_wall) * speed`.
///
/// The anchor is the position frozen at the last pause or seek. When the
/// speed changes mid-play the anchor moves to the last sampled frame, so the
/// position stays continuous across the change.
#[derive(Debug)]
pub struct FrameDriver {
    speed: SpeedCell,
    anchor: f64,
    anchor_wall: f64,
    anchor_speed: f64,
    last_wall: f64,
    last_position: f64,
    running: bool,
}

impl FrameDriver {
    pub fn new(speed: SpeedCell) -> Self {
        let anchor_speed = speed.get();
        Self {
            speed,
            anchor: 0.0,
            anchor_wall: 0.0,
            anchor_speed,
            last_wall: 0.0,
            last_position: 0.0,
            running: false,
        }
    }
}

impl ClockDriver for FrameDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Frame
    }

    fn cadence(&self) -> Cadence {
        Cadence::Frame
    }

    fn start(&mut self, from: f64, now: f64) {
        self.anchor = from;
        self.anchor_wall = now;
        self.anchor_speed = self.speed.get();
        self.last_wall = now;
        self.last_position = from;
        self.running = true;
    }

    fn sample(&mut self, now: f64) -> f64 {
        if !self.running {
            return self.last_position;
        }

        let speed = self.speed.get();
        if speed != self.anchor_speed {
            self.anchor = self.last_position;
            self.anchor_wall = self.last_wall;
            self.anchor_speed = speed;
        }

        let real = (now - self.anchor_wall).max(0.0);
        let position = self.anchor + real * speed;
        self.last_wall = now.max(self.last_wall);
        self.last_position = position;
        position
    }

    fn stop(&mut self, now: f64) -> f64 {
        let position = self.sample(now);
        self.anchor = position;
        self.running = false;
        position
    }

    fn seek(&mut self, position: f64) {
        self.anchor = position;
        self.last_position = position;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Follows a media element's native clock. The element's playback rate
/// stands in for the speed multiplier.
pub struct MediaDriver {
    media: Box<dyn MediaElement>,
    speed: SpeedCell,
    applied_rate: Option<f64>,
    running: bool,
}

impl MediaDriver {
    pub fn new(media: Box<dyn MediaElement>, speed: SpeedCell) -> Self {
        Self {
            media,
            speed,
            applied_rate: None,
            running: false,
        }
    }

    fn sync_rate(&mut self) {
        let speed = self.speed.get();
        if self.applied_rate != Some(speed) {
            self.media.set_rate(speed);
            self.applied_rate = Some(speed);
        }
    }
}

impl ClockDriver for MediaDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Media
    }

    fn cadence(&self) -> Cadence {
        Cadence::Frame
    }

    fn start(&mut self, from: f64, _now: f64) {
        if (self.media.position() - from).abs() > MEDIA_SEEK_TOLERANCE_MS {
            self.media.set_position(from);
        }
        self.sync_rate();
        self.media.play();
        self.running = true;
    }

    fn sample(&mut self, _now: f64) -> f64 {
        if self.running {
            self.sync_rate();
        }
        self.media.position().max(0.0)
    }

    fn stop(&mut self, _now: f64) -> f64 {
        let position = self.media.position().max(0.0);
        if self.running {
            self.media.pause();
        }
        self.running = false;
        position
    }

    fn seek(&mut self, position: f64) {
        self.media.set_position(position);
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl std::fmt::Debug for MediaDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDriver")
            .field("position", &self.media.position())
            .field("applied_rate", &self.applied_rate)
            .field("running", &self.running)
            .finish()
    }
}
