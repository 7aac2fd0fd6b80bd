use std::sync::Arc;

use fretflow_timeline::{Hit, HitDetector, TimedEvent, Timeline};
use tracing::debug;

use crate::clock::{InstantClock, WallClock};
use crate::config::PracticeConfig;
use crate::driver::DriverSpec;
use crate::scheduler::{LoopHandle, Scheduler};
use crate::transport::{PlaybackState, Transport, TransportError};

/// What the embedding host provides: a way to schedule loops and a clock.
pub struct HostEnvironment {
    pub scheduler: Box<dyn Scheduler>,
    pub clock: Box<dyn WallClock>,
}

impl HostEnvironment {
    pub fn new(scheduler: impl Scheduler + 'static, clock: impl WallClock + 'static) -> Self {
        Self {
            scheduler: Box::new(scheduler),
            clock: Box::new(clock),
        }
    }

    /// Real time with the given scheduler.
    pub fn realtime(scheduler: impl Scheduler + 'static) -> Self {
        Self::new(scheduler, InstantClock::new())
    }
}

/// Everything a renderer needs for one cycle, computed from a single clock read.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub time: f64,
    pub state: PlaybackState,
    pub active: Vec<TimedEvent>,
    pub upcoming: Vec<TimedEvent>,
    pub visible: Vec<TimedEvent>,
    pub hits: Vec<Hit>,
}

impl Frame {
    pub fn active_chord(&self) -> Option<&str> {
        self.active.iter().find_map(|e| e.payload.chord_label())
    }

    pub fn upcoming_chord(&self) -> Option<&str> {
        self.upcoming.iter().find_map(|e| e.payload.chord_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type FrameListener = Box<dyn FnMut(&Frame) + Send>;

/// One song being practised: timeline, transport and hit record together.
pub struct PracticeSession {
    timeline: Arc<Timeline>,
    transport: Transport,
    hits: HitDetector,
    lookahead_ms: f64,
    lookbehind_ms: f64,
    upcoming_within_ms: Option<f64>,
    subscribers: Vec<(SubscriberId, FrameListener)>,
    next_subscriber: u64,
}

impl PracticeSession {
    pub fn new(
        timeline: impl Into<Arc<Timeline>>,
        config: &PracticeConfig,
        driver: DriverSpec,
        host: HostEnvironment,
    ) -> Self {
        let timeline = timeline.into();
        let transport = Transport::with_driver(driver, timeline.duration(), host.scheduler, host.clock);
        debug!(
            events = timeline.len(),
            duration = timeline.duration(),
            driver = %transport.clock().driver_kind(),
            "practice session created"
        );

        Self {
            timeline,
            transport,
            hits: config.hit_detector(),
            lookahead_ms: config.lookahead_ms,
            lookbehind_ms: config.lookbehind_ms,
            upcoming_within_ms: config.upcoming_within_ms,
            subscribers: Vec::new(),
            next_subscriber: 0,
        }
    }

    /// Use the driver named in `config`.
    pub fn from_config(timeline: impl Into<Arc<Timeline>>, config: &PracticeConfig, host: HostEnvironment) -> Self {
        Self::new(timeline, config, config.driver.spec(), host)
    }

    pub fn play(&mut self) {
        let before = self.transport.elapsed();
        let from = self.transport.play();
        if from < before {
            self.hits.invalidate_from(from);
        }
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    pub fn stop(&mut self) {
        self.transport.stop();
        self.hits.clear();
    }

    pub fn replay(&mut self) {
        self.transport.replay();
        self.hits.clear();
    }

    pub fn seek(&mut self, target: f64) -> Result<f64, TransportError> {
        let before = self.transport.elapsed();
        let position = self.transport.seek(target)?;
        if position < before {
            self.hits.invalidate_from(position);
        }
        Ok(position)
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), TransportError> {
        self.transport.set_speed(speed)
    }

    pub fn replace_driver(&mut self, driver: DriverSpec) {
        self.transport.replace_driver(driver);
    }

    /// Handle a wake from the host's loop.
    ///
    /// The clock is read exactly once; active/upcoming/visible events and
    /// hit detection all use that value. Stale wakes return `None`.
    pub fn on_wake(&mut self, handle: LoopHandle) -> Option<Frame> {
        let t = self.transport.on_wake(handle)?;

        let window = self.hits.windows().good_ms;
        let mut hits = Vec::new();
        for event in self.timeline.find_visible(t, window, window) {
            if let Some(hit) = self.hits.check_and_fire(event, t) {
                hits.push(hit);
            }
        }
        self.hits.collect_garbage(t);

        let frame = self.snapshot(t, hits);
        for (_, listener) in &mut self.subscribers {
            listener(&frame);
        }
        Some(frame)
    }

    /// The current view without advancing the clock or firing hits.
    pub fn frame(&self) -> Frame {
        self.snapshot(self.transport.elapsed(), Vec::new())
    }

    fn snapshot(&self, t: f64, hits: Vec<Hit>) -> Frame {
        let timeline = &self.timeline;
        Frame {
            time: t,
            state: self.transport.state(),
            active: timeline.find_active(t).into_iter().cloned().collect(),
            upcoming: timeline.find_upcoming(t, self.upcoming_within_ms).to_vec(),
            visible: timeline
                .find_visible(t, self.lookbehind_ms, self.lookahead_ms)
                .into_iter()
                .cloned()
                .collect(),
            hits,
        }
    }

    pub fn on_hit(&mut self, listener: impl FnMut(&Hit) + Send + 'static) {
        self.hits.on_hit(listener);
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Frame) + Send + 'static) -> SubscriberId {
        self.next_subscriber += 1;
        let id = SubscriberId(self.next_subscriber);
        self.subscribers.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn hit_detector(&self) -> &HitDetector {
        &self.hits
    }

    pub fn elapsed(&self) -> f64 {
        self.transport.elapsed()
    }

    pub fn state(&self) -> PlaybackState {
        self.transport.state()
    }

    pub fn active_loop(&self) -> Option<LoopHandle> {
        self.transport.active_loop()
    }
}

impl std::fmt::Debug for PracticeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PracticeSession")
            .field("events", &self.timeline.len())
            .field("transport", &self.transport)
            .field("hits", &self.hits)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
