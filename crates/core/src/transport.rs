use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::WallClock;
use crate::driver::DriverSpec;
use crate::scheduler::{LoopHandle, Scheduler};
use crate::source::ClockSource;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TransportError {
    #[error("cannot seek while playing")]
    SeekWhilePlaying,
    #[error("invalid seek target: {0}")]
    InvalidSeekTarget(f64),
    #[error("invalid playback speed: {0}")]
    InvalidSpeed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Ended,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Ended => write!(f, "ended"),
        }
    }
}

/// Play/pause/stop/seek state machine over a [`ClockSource`].
#[derive(Debug)]
pub struct Transport {
    clock: ClockSource,
    state: PlaybackState,
}

impl Transport {
    pub fn new(clock: ClockSource) -> Self {
        Self {
            clock,
            state: PlaybackState::Stopped,
        }
    }

    pub fn with_driver(
        spec: DriverSpec,
        duration: f64,
        scheduler: Box<dyn Scheduler>,
        wall: Box<dyn WallClock>,
    ) -> Self {
        Self::new(ClockSource::new(spec, duration, scheduler, wall))
    }

    /// Start or resume from the current position and return it.
    ///
    /// From `Ended` the position is rewound to 0 first. Playing again on a
    /// degraded clock retries scheduling its loop.
    pub fn play(&mut self) -> f64 {
        if self.state.is_playing() {
            if self.clock.is_degraded() {
                self.clock.start();
            }
            return self.clock.elapsed();
        }
        if self.state == PlaybackState::Ended && self.clock.is_at_end() {
            self.clock.seek(0.0);
        }
        self.clock.start();
        self.transition(PlaybackState::Playing);
        self.clock.elapsed()
    }

    pub fn pause(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        self.clock.halt();
        self.transition(PlaybackState::Paused);
    }

    pub fn stop(&mut self) {
        self.clock.halt();
        self.clock.seek(0.0);
        self.transition(PlaybackState::Stopped);
    }

    pub fn replay(&mut self) {
        self.clock.halt();
        self.clock.seek(0.0);
        self.clock.start();
        self.transition(PlaybackState::Playing);
    }

    /// Jump to `target` ms, clamped to the song. Only allowed while not playing.
    pub fn seek(&mut self, target: f64) -> Result<f64, TransportError> {
        if self.state.is_playing() {
            warn!(target, "seek rejected while playing");
            return Err(TransportError::SeekWhilePlaying);
        }
        if target.is_nan() {
            warn!("seek rejected, target is NaN");
            return Err(TransportError::InvalidSeekTarget(target));
        }

        let position = self
            .clock
            .seek(target)
            .ok_or(TransportError::SeekWhilePlaying)?;

        let next = match self.state {
            PlaybackState::Stopped if position == 0.0 => PlaybackState::Stopped,
            PlaybackState::Paused | PlaybackState::Stopped | PlaybackState::Ended => PlaybackState::Paused,
            PlaybackState::Playing => PlaybackState::Playing,
        };
        self.transition(next);
        Ok(position)
    }

    /// Change the speed multiplier. Applies from the driver's next sample.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), TransportError> {
        if !speed.is_finite() || speed <= 0.0 {
            warn!(speed, "rejected playback speed");
            return Err(TransportError::InvalidSpeed(speed));
        }
        self.clock.set_speed(speed);
        debug!(speed, "playback speed changed");
        Ok(())
    }

    /// Advance the clock for a wake of `handle`.
    ///
    /// Reaching the end of the song halts the clock and moves to `Ended`
    /// exactly once. Stale handles return `None`.
    pub fn on_wake(&mut self, handle: LoopHandle) -> Option<f64> {
        let t = self.clock.advance(handle)?;
        if self.state.is_playing() && self.clock.is_at_end() {
            self.clock.halt();
            self.transition(PlaybackState::Ended);
            info!(elapsed = t, "playback reached the end");
        }
        Some(t)
    }

    pub fn replace_driver(&mut self, spec: DriverSpec) {
        self.clock.replace_driver(spec);
    }

    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    pub fn speed(&self) -> f64 {
        self.clock.speed()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn active_loop(&self) -> Option<LoopHandle> {
        self.clock.active_loop()
    }

    pub fn clock(&self) -> &ClockSource {
        &self.clock
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, at = self.clock.elapsed(), "transport");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::driver::tests::FakeMedia;
    use crate::scheduler::{ManualScheduler, NullScheduler};

    fn transport(duration: f64) -> (Transport, ManualScheduler, ManualClock) {
        let scheduler = ManualScheduler::new();
        let wall = ManualClock::new();
        let transport = Transport::with_driver(
            DriverSpec::Tick { period_ms: 50.0 },
            duration,
            Box::new(scheduler.clone()),
            Box::new(wall.clone()),
        );
        (transport, scheduler, wall)
    }

    fn tick(transport: &mut Transport, scheduler: &ManualScheduler, wall: &ManualClock, ms: f64) -> Option<f64> {
        wall.advance(ms);
        transport.on_wake(scheduler.active()?)
    }

    #[test]
    fn test_state_machine() {
        let (mut t, scheduler, wall) = transport(10_000.0);
        assert_eq!(t.state(), PlaybackState::Stopped);

        t.play();
        assert_eq!(t.state(), PlaybackState::Playing);
        tick(&mut t, &scheduler, &wall, 200.0);

        t.pause();
        assert_eq!(t.state(), PlaybackState::Paused);
        assert_eq!(t.elapsed(), 200.0);
        assert_eq!(scheduler.active_count(), 0);

        t.stop();
        assert_eq!(t.state(), PlaybackState::Stopped);
        assert_eq!(t.elapsed(), 0.0);
    }

    #[test]
    fn test_pause_when_not_playing_is_noop() {
        let (mut t, _scheduler, _wall) = transport(1_000.0);
        t.pause();
        assert_eq!(t.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_play_twice_keeps_one_loop() {
        let (mut t, scheduler, _wall) = transport(1_000.0);
        t.play();
        t.play();
        assert_eq!(scheduler.scheduled_count(), 1);
    }

    #[test]
    fn test_seek_while_playing_is_rejected() {
        let (mut t, scheduler, wall) = transport(10_000.0);
        t.play();
        tick(&mut t, &scheduler, &wall, 100.0);

        assert_eq!(t.seek(5_000.0), Err(TransportError::SeekWhilePlaying));
        assert_eq!(t.elapsed(), 100.0);
        assert!(t.is_playing());
    }

    #[test]
    fn test_seek_from_stopped_moves_to_paused() {
        let (mut t, _scheduler, _wall) = transport(10_000.0);
        assert_eq!(t.seek(0.0), Ok(0.0));
        assert_eq!(t.state(), PlaybackState::Stopped);
        assert_eq!(t.seek(4_000.0), Ok(4_000.0));
        assert_eq!(t.state(), PlaybackState::Paused);
        assert!(matches!(t.seek(f64::NAN), Err(TransportError::InvalidSeekTarget(_))));
    }

    #[test]
    fn test_invalid_speed_leaves_speed_unchanged() {
        let (mut t, _scheduler, _wall) = transport(1_000.0);
        t.set_speed(0.5).unwrap();
        assert_eq!(t.set_speed(0.0), Err(TransportError::InvalidSpeed(0.0)));
        assert!(t.set_speed(f64::INFINITY).is_err());
        assert_eq!(t.speed(), 0.5);
    }

    #[test]
    fn test_end_is_reached_once() {
        let (mut t, scheduler, wall) = transport(100.0);
        t.play();
        let handle = scheduler.active().unwrap();

        wall.advance(150.0);
        assert_eq!(t.on_wake(handle), Some(100.0));
        assert_eq!(t.state(), PlaybackState::Ended);
        assert_eq!(scheduler.active_count(), 0);

        // A late wake from the cancelled loop changes nothing.
        assert_eq!(t.on_wake(handle), None);
        assert_eq!(t.state(), PlaybackState::Ended);
    }

    #[test]
    fn test_play_after_end_restarts_from_zero() {
        let (mut t, scheduler, wall) = transport(100.0);
        t.play();
        tick(&mut t, &scheduler, &wall, 150.0);
        assert_eq!(t.state(), PlaybackState::Ended);

        assert_eq!(t.play(), 0.0);
        assert_eq!(tick(&mut t, &scheduler, &wall, 30.0), Some(30.0));
    }

    #[test]
    fn test_replay_resets_and_plays() {
        let (mut t, scheduler, wall) = transport(1_000.0);
        t.play();
        tick(&mut t, &scheduler, &wall, 400.0);

        t.replay();
        assert_eq!(t.elapsed(), 0.0);
        assert!(t.is_playing());
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(tick(&mut t, &scheduler, &wall, 50.0), Some(50.0));
    }

    #[test]
    fn test_degraded_clock_stays_put() {
        let wall = ManualClock::new();
        let mut t = Transport::with_driver(
            DriverSpec::Frame,
            1_000.0,
            Box::new(NullScheduler),
            Box::new(wall.clone()),
        );
        t.play();
        wall.advance(500.0);
        assert!(t.clock().is_degraded());
        assert_eq!(t.elapsed(), 0.0);
        t.pause();
        assert_eq!(t.elapsed(), 0.0);
    }

    #[test]
    fn test_play_again_recovers_degraded_clock() {
        let (mut t, scheduler, wall) = transport(10_000.0);
        scheduler.set_available(false);
        t.play();
        assert!(t.clock().is_degraded());
        assert_eq!(t.active_loop(), None);

        scheduler.set_available(true);
        t.play();
        assert!(!t.clock().is_degraded());
        assert_eq!(t.state(), PlaybackState::Playing);
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(tick(&mut t, &scheduler, &wall, 100.0), Some(100.0));
    }

    #[test]
    fn test_replace_driver_recovers_degraded_clock() {
        let (mut t, scheduler, wall) = transport(10_000.0);
        scheduler.set_available(false);
        t.play();
        assert!(t.clock().is_degraded());

        scheduler.set_available(true);
        t.replace_driver(DriverSpec::Frame);
        assert!(t.clock().is_running());
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(tick(&mut t, &scheduler, &wall, 40.0), Some(40.0));
    }

    #[test]
    fn test_media_driver_pause_and_resume() {
        let scheduler = ManualScheduler::new();
        let media = FakeMedia::default();
        let mut t = Transport::with_driver(
            DriverSpec::Media(Box::new(media.clone())),
            60_000.0,
            Box::new(scheduler.clone()),
            Box::new(ManualClock::new()),
        );

        t.play();
        assert!(media.state().playing);
        media.run_for(300.0);
        assert_eq!(t.on_wake(scheduler.active().unwrap()), Some(300.0));

        t.pause();
        assert!(!media.state().playing);
        media.run_for(10_000.0);
        assert_eq!(t.elapsed(), 300.0);
        assert_eq!(scheduler.active_count(), 0);

        t.play();
        media.run_for(200.0);
        assert_eq!(t.on_wake(scheduler.active().unwrap()), Some(500.0));
        assert_eq!(media.state().seeks, 0);
    }
}
