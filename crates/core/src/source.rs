use tracing::{debug, warn};

use crate::clock::{SpeedCell, WallClock};
use crate::driver::{ClockDriver, DriverKind, DriverSpec};
use crate::scheduler::{LoopHandle, Scheduler};

/// One clock, one driver, at most one scheduled loop.
///
/// The source owns the elapsed song time. It is advanced only through
/// [`ClockSource::advance`] with the handle of the currently scheduled
/// loop, and it is always kept inside `[0, duration]`.
pub struct ClockSource {
    driver: Box<dyn ClockDriver>,
    scheduler: Box<dyn Scheduler>,
    wall: Box<dyn WallClock>,
    speed: SpeedCell,
    duration: f64,
    elapsed: f64,
    active: Option<LoopHandle>,
    degraded: bool,
}

impl ClockSource {
    pub fn new(
        spec: DriverSpec,
        duration: f64,
        scheduler: Box<dyn Scheduler>,
        wall: Box<dyn WallClock>,
    ) -> Self {
        let speed = SpeedCell::default();
        Self {
            driver: spec.build(speed.clone()),
            scheduler,
            wall,
            speed,
            duration: duration.max(0.0),
            elapsed: 0.0,
            active: None,
            degraded: false,
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn speed(&self) -> f64 {
        self.speed.get()
    }

    pub fn driver_kind(&self) -> DriverKind {
        self.driver.kind()
    }

    pub fn active_loop(&self) -> Option<LoopHandle> {
        self.active
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// True after a start the host could not schedule. The clock then holds
    /// its last value until a later start succeeds.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_at_end(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Schedule the driver's loop and start it from the current elapsed time.
    ///
    /// Returns `false` when the host has no scheduling primitive.
    pub fn start(&mut self) -> bool {
        if self.active.is_some() {
            return true;
        }

        let cadence = self.driver.cadence();
        let Some(handle) = self.scheduler.schedule(cadence) else {
            if !self.degraded {
                warn!(driver = %self.driver.kind(), "no scheduler available, clock is stationary");
            }
            self.degraded = true;
            return false;
        };

        self.degraded = false;
        self.driver.start(self.elapsed, self.wall.now());
        self.active = Some(handle);
        debug!(driver = %self.driver.kind(), ?handle, from = self.elapsed, "clock started");
        true
    }

    /// Cancel the loop and freeze the elapsed time. Safe to call repeatedly.
    pub fn halt(&mut self) -> f64 {
        if let Some(handle) = self.active.take() {
            self.scheduler.cancel(handle);
            let stopped = self.driver.stop(self.wall.now());
            let reached = self.clamp(stopped);
            self.elapsed = reached.max(self.elapsed);
            debug!(?handle, at = self.elapsed, "clock halted");
        }
        self.elapsed
    }

    /// Move to `target`, clamped to `[0, duration]`. Refused while running.
    pub fn seek(&mut self, target: f64) -> Option<f64> {
        if self.active.is_some() {
            return None;
        }
        let target = self.clamp(target);
        self.driver.seek(target);
        self.elapsed = target;
        Some(target)
    }

    /// Read the driver once for a wake of `handle`.
    ///
    /// Returns `None` for a handle that is not the active loop, which is how
    /// late wakes from a cancelled loop are dropped.
    pub fn advance(&mut self, handle: LoopHandle) -> Option<f64> {
        if self.active != Some(handle) {
            debug!(?handle, active = ?self.active, "ignoring stale wake");
            return None;
        }
        let sampled = self.driver.sample(self.wall.now());
        let sampled = self.clamp(sampled);
        self.elapsed = sampled.max(self.elapsed);
        Some(self.elapsed)
    }

    /// Takes effect on the driver's next sample.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed.set(speed);
    }

    /// Tear down the current driver and continue with a new one from the same
    /// elapsed time. Only one loop exists at any moment.
    pub fn replace_driver(&mut self, spec: DriverSpec) {
        let was_running = self.active.is_some() || self.degraded;
        self.halt();

        let from = self.driver.kind();
        self.driver = spec.build(self.speed.clone());
        self.driver.seek(self.elapsed);
        debug!(%from, to = %self.driver.kind(), at = self.elapsed, "driver replaced");

        if was_running {
            self.start();
        }
    }

    fn clamp(&self, t: f64) -> f64 {
        if t.is_nan() {
            return self.elapsed;
        }
        t.clamp(0.0, self.duration)
    }
}

impl Drop for ClockSource {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            self.scheduler.cancel(handle);
        }
    }
}

impl std::fmt::Debug for ClockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockSource")
            .field("driver", &self.driver.kind())
            .field("elapsed", &self.elapsed)
            .field("duration", &self.duration)
            .field("speed", &self.speed.get())
            .field("active", &self.active)
            .field("degraded", &self.degraded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::driver::tests::FakeMedia;
    use crate::scheduler::{Cadence, ManualScheduler, NullScheduler};

    fn tick_source(duration: f64) -> (ClockSource, ManualScheduler, ManualClock) {
        let scheduler = ManualScheduler::new();
        let wall = ManualClock::new();
        let source = ClockSource::new(
            DriverSpec::Tick { period_ms: 50.0 },
            duration,
            Box::new(scheduler.clone()),
            Box::new(wall.clone()),
        );
        (source, scheduler, wall)
    }

    #[test]
    fn test_advance_clamps_to_duration() {
        let (mut source, scheduler, wall) = tick_source(100.0);
        assert!(source.start());
        let handle = scheduler.active().unwrap();

        wall.advance(80.0);
        assert_eq!(source.advance(handle), Some(80.0));
        wall.advance(80.0);
        assert_eq!(source.advance(handle), Some(100.0));
        assert!(source.is_at_end());
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let (mut source, scheduler, wall) = tick_source(10_000.0);
        source.start();
        let old = scheduler.active().unwrap();
        source.halt();
        source.start();

        wall.advance(500.0);
        assert_eq!(source.advance(old), None);
        assert_eq!(source.elapsed(), 0.0);
    }

    #[test]
    fn test_halt_is_idempotent() {
        let (mut source, scheduler, wall) = tick_source(10_000.0);
        source.start();
        wall.advance(120.0);
        assert_eq!(source.halt(), 120.0);
        assert_eq!(source.halt(), 120.0);
        assert_eq!(scheduler.cancelled_count(), 1);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_seek_refused_while_running() {
        let (mut source, _scheduler, _wall) = tick_source(1_000.0);
        source.start();
        assert_eq!(source.seek(500.0), None);
        source.halt();
        assert_eq!(source.seek(-5.0), Some(0.0));
        assert_eq!(source.seek(5_000.0), Some(1_000.0));
    }

    #[test]
    fn test_null_scheduler_degrades_to_stationary_clock() {
        let wall = ManualClock::new();
        let mut source = ClockSource::new(
            DriverSpec::Frame,
            1_000.0,
            Box::new(NullScheduler),
            Box::new(wall.clone()),
        );
        assert!(!source.start());
        assert!(source.is_degraded());
        assert!(!source.is_running());

        wall.advance(500.0);
        assert_eq!(source.elapsed(), 0.0);
        assert_eq!(source.halt(), 0.0);
    }

    #[test]
    fn test_replace_driver_keeps_one_loop_and_position() {
        let (mut source, scheduler, wall) = tick_source(10_000.0);
        source.start();
        let tick = scheduler.active().unwrap();
        wall.advance(300.0);
        source.advance(tick);

        source.replace_driver(DriverSpec::Frame);
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(scheduler.last_cadence(), Some(Cadence::Frame));
        assert_eq!(source.driver_kind(), DriverKind::Frame);

        let frame = scheduler.active().unwrap();
        assert_ne!(frame, tick);
        wall.advance(100.0);
        assert_eq!(source.advance(frame), Some(400.0));
    }

    #[test]
    fn test_media_driver_position_is_authoritative() {
        let scheduler = ManualScheduler::new();
        let media = FakeMedia::default();
        let mut source = ClockSource::new(
            DriverSpec::Media(Box::new(media.clone())),
            5_000.0,
            Box::new(scheduler.clone()),
            Box::new(ManualClock::new()),
        );
        source.start();
        let handle = scheduler.active().unwrap();

        media.run_for(1_250.0);
        assert_eq!(source.advance(handle), Some(1_250.0));

        media.run_for(10_000.0);
        assert_eq!(source.advance(handle), Some(5_000.0));
    }

    #[test]
    fn test_drop_cancels_active_loop() {
        let (mut source, scheduler, _wall) = tick_source(1_000.0);
        source.start();
        drop(source);
        assert_eq!(scheduler.active_count(), 0);
    }
}
