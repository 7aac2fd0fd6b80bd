use std::sync::{Arc, Mutex};

use fretflow_core::{
    DriverSpec, HitQuality, HostEnvironment, ManualClock, ManualScheduler, MediaElement, NullScheduler,
    PlaybackState, PracticeConfig, PracticeSession, TimedEvent, Timeline, TransportError, WallClock,
};

#[derive(Debug, Default)]
struct Playhead {
    base: f64,
    started_at: Option<f64>,
    rate: f64,
}

/// Media element that plays along with a manual wall clock.
#[derive(Debug, Clone)]
struct ClockedMedia {
    wall: ManualClock,
    playhead: Arc<Mutex<Playhead>>,
}

impl ClockedMedia {
    fn new(wall: ManualClock) -> Self {
        Self {
            wall,
            playhead: Arc::new(Mutex::new(Playhead {
                rate: 1.0,
                ..Default::default()
            })),
        }
    }

    fn fold(&self, playhead: &mut Playhead) {
        let now = self.wall.now();
        if let Some(started) = playhead.started_at {
            playhead.base += (now - started) * playhead.rate;
            playhead.started_at = Some(now);
        }
    }
}

impl MediaElement for ClockedMedia {
    fn position(&self) -> f64 {
        let mut playhead = self.playhead.lock().unwrap();
        self.fold(&mut playhead);
        playhead.base
    }

    fn set_position(&mut self, position: f64) {
        let mut playhead = self.playhead.lock().unwrap();
        self.fold(&mut playhead);
        playhead.base = position;
    }

    fn play(&mut self) {
        let mut playhead = self.playhead.lock().unwrap();
        if playhead.started_at.is_none() {
            playhead.started_at = Some(self.wall.now());
        }
    }

    fn pause(&mut self) {
        let mut playhead = self.playhead.lock().unwrap();
        self.fold(&mut playhead);
        playhead.started_at = None;
    }

    fn set_rate(&mut self, rate: f64) {
        let mut playhead = self.playhead.lock().unwrap();
        self.fold(&mut playhead);
        playhead.rate = rate;
    }
}

struct Rig {
    session: PracticeSession,
    scheduler: ManualScheduler,
    wall: ManualClock,
}

impl Rig {
    fn new(events: Vec<TimedEvent>, duration: f64, driver: DriverSpec) -> Self {
        Self::with_wall(events, duration, driver, ManualClock::new())
    }

    fn media(events: Vec<TimedEvent>, duration: f64) -> Self {
        let wall = ManualClock::new();
        let media = ClockedMedia::new(wall.clone());
        Self::with_wall(events, duration, DriverSpec::Media(Box::new(media)), wall)
    }

    fn with_wall(events: Vec<TimedEvent>, duration: f64, driver: DriverSpec, wall: ManualClock) -> Self {
        let scheduler = ManualScheduler::new();
        let timeline = Timeline::new(events, duration).unwrap();
        let session = PracticeSession::new(
            timeline,
            &PracticeConfig::default(),
            driver,
            HostEnvironment::new(scheduler.clone(), wall.clone()),
        );
        Self {
            session,
            scheduler,
            wall,
        }
    }

    fn tick_driver(events: Vec<TimedEvent>, duration: f64) -> Self {
        Self::new(events, duration, DriverSpec::Tick { period_ms: 50.0 })
    }

    /// Let `ms` of wall time pass, then deliver one wake.
    fn wake_after(&mut self, ms: f64) -> Option<fretflow_core::Frame> {
        self.wall.advance(ms);
        let handle = self.scheduler.active()?;
        self.session.on_wake(handle)
    }
}

fn chord_song() -> Vec<TimedEvent> {
    vec![
        TimedEvent::chord(0.0, 2500.0, "C"),
        TimedEvent::chord(2500.0, 2500.0, "G"),
    ]
}

#[test]
fn chord_progression_plays_to_the_end() {
    let mut rig = Rig::tick_driver(chord_song(), 5000.0);
    assert_eq!(rig.session.frame().active_chord(), Some("C"));

    rig.session.play();
    let frame = rig.wake_after(2499.0).unwrap();
    assert_eq!(frame.active_chord(), Some("C"));
    assert_eq!(frame.upcoming_chord(), Some("G"));

    let frame = rig.wake_after(1.0).unwrap();
    assert_eq!(frame.active_chord(), Some("G"));
    assert_eq!(frame.upcoming_chord(), None);

    let frame = rig.wake_after(2600.0).unwrap();
    assert_eq!(frame.time, 5000.0);
    assert_eq!(frame.state, PlaybackState::Ended);
    assert_eq!(rig.session.elapsed(), 5000.0);
    assert_eq!(rig.scheduler.active_count(), 0);

    // Nothing left to wake; the clock stays put.
    assert!(rig.wake_after(500.0).is_none());
    assert_eq!(rig.session.elapsed(), 5000.0);
}

#[test]
fn double_speed_covers_the_same_ground_in_half_the_ticks() {
    let mut fast = Rig::tick_driver(Vec::new(), 10_000.0);
    fast.session.set_speed(2.0).unwrap();
    fast.session.play();
    for _ in 0..5 {
        fast.wake_after(50.0);
    }

    let mut normal = Rig::tick_driver(Vec::new(), 10_000.0);
    normal.session.play();
    for _ in 0..10 {
        normal.wake_after(50.0);
    }

    assert!((fast.session.elapsed() - normal.session.elapsed()).abs() < 1e-9);
    assert_eq!(normal.session.elapsed(), 500.0);
}

#[test]
fn pause_freezes_time_for_every_builtin_driver() {
    let rigs = vec![
        Rig::new(Vec::new(), 60_000.0, DriverSpec::Tick { period_ms: 50.0 }),
        Rig::new(Vec::new(), 60_000.0, DriverSpec::Frame),
        Rig::media(Vec::new(), 60_000.0),
    ];
    for mut rig in rigs {
        rig.session.play();
        rig.wake_after(300.0);
        rig.session.pause();

        rig.wall.advance(10_000.0);
        assert!(rig.wake_after(0.0).is_none());
        assert_eq!(rig.session.elapsed(), 300.0);

        rig.session.play();
        rig.wake_after(200.0);
        assert_eq!(rig.session.elapsed(), 500.0);
    }
}

#[test]
fn seek_is_clamped_to_the_song() {
    let mut rig = Rig::tick_driver(chord_song(), 5000.0);
    assert_eq!(rig.session.seek(-50.0), Ok(0.0));
    assert_eq!(rig.session.elapsed(), 0.0);
    assert_eq!(rig.session.seek(6000.0), Ok(5000.0));
    assert_eq!(rig.session.elapsed(), 5000.0);
}

#[test]
fn seek_is_rejected_while_playing() {
    let mut rig = Rig::tick_driver(chord_song(), 5000.0);
    rig.session.play();
    rig.wake_after(1000.0);
    assert_eq!(rig.session.seek(3000.0), Err(TransportError::SeekWhilePlaying));
    assert_eq!(rig.session.elapsed(), 1000.0);
}

#[test]
fn note_fires_once_as_it_crosses_the_hit_line() {
    let mut rig = Rig::tick_driver(vec![TimedEvent::note(10_000.0, 2, 3)], 20_000.0);
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    rig.session.on_hit(move |hit| sink.lock().unwrap().push(hit.quality));

    rig.session.seek(9_900.0).unwrap();
    rig.session.play();

    assert!(rig.wake_after(10.0).unwrap().hits.is_empty()); // 9.91 s
    let frame = rig.wake_after(20.0).unwrap(); // 9.93 s
    assert_eq!(frame.hits.len(), 1);
    assert_eq!(frame.hits[0].quality, HitQuality::Good);

    for _ in 0..13 {
        // 9.94 s through 10.06 s
        assert!(rig.wake_after(10.0).unwrap().hits.is_empty());
    }
    assert!(rig.wake_after(30.0).unwrap().hits.is_empty()); // 10.09 s

    assert_eq!(*fired.lock().unwrap(), vec![HitQuality::Good]);
}

#[test]
fn seeking_past_a_note_does_not_fire_it() {
    let mut rig = Rig::tick_driver(vec![TimedEvent::note(1_000.0, 0, 5)], 5_000.0);
    rig.session.seek(2_000.0).unwrap();
    rig.session.play();
    assert!(rig.wake_after(50.0).unwrap().hits.is_empty());
    assert_eq!(rig.session.hit_detector().fired_count(), 0);
}

#[test]
fn replay_lets_notes_fire_again() {
    let mut rig = Rig::tick_driver(vec![TimedEvent::note(100.0, 1, 1)], 1_000.0);
    rig.session.play();
    assert_eq!(rig.wake_after(100.0).unwrap().hits.len(), 1);

    rig.session.replay();
    assert_eq!(rig.wake_after(100.0).unwrap().hits.len(), 1);
}

#[test]
fn wakes_from_a_cancelled_loop_are_ignored() {
    let mut rig = Rig::tick_driver(Vec::new(), 10_000.0);
    rig.session.play();
    let first = rig.session.active_loop().unwrap();
    rig.session.pause();
    rig.session.play();

    rig.wall.advance(1_000.0);
    assert!(rig.session.on_wake(first).is_none());
    assert_eq!(rig.session.elapsed(), 0.0);
}

#[test]
fn missing_scheduler_leaves_a_stationary_clock() {
    let wall = ManualClock::new();
    let mut session = PracticeSession::new(
        Timeline::new(chord_song(), 5000.0).unwrap(),
        &PracticeConfig::default(),
        DriverSpec::Frame,
        HostEnvironment::new(NullScheduler, wall.clone()),
    );
    session.play();
    wall.advance(1_000.0);

    assert!(session.active_loop().is_none());
    assert!(session.transport().clock().is_degraded());
    assert_eq!(session.elapsed(), 0.0);
    assert_eq!(session.frame().active_chord(), Some("C"));
}

#[test]
fn switching_drivers_never_runs_two_loops() {
    let mut rig = Rig::tick_driver(Vec::new(), 10_000.0);
    rig.session.play();
    rig.wake_after(400.0);

    rig.session.replace_driver(DriverSpec::Frame);
    assert_eq!(rig.scheduler.active_count(), 1);
    rig.session.replace_driver(DriverSpec::Tick { period_ms: 25.0 });
    assert_eq!(rig.scheduler.active_count(), 1);

    assert_eq!(rig.wake_after(100.0).unwrap().time, 500.0);
}

#[test]
fn speed_change_mid_play_has_no_jump() {
    let mut rig = Rig::new(Vec::new(), 60_000.0, DriverSpec::Frame);
    rig.session.play();
    rig.wake_after(1_000.0);

    rig.session.set_speed(0.5).unwrap();
    let frame = rig.wake_after(16.0).unwrap();
    assert_eq!(frame.time, 1_008.0);
    let frame = rig.wake_after(984.0).unwrap();
    assert_eq!(frame.time, 1_500.0);
}

#[test]
fn stop_tears_down_the_loop() {
    let mut rig = Rig::tick_driver(chord_song(), 5000.0);
    rig.session.play();
    rig.wake_after(700.0);
    rig.session.stop();
    rig.session.stop();

    assert_eq!(rig.session.state(), PlaybackState::Stopped);
    assert_eq!(rig.session.elapsed(), 0.0);
    assert_eq!(rig.scheduler.active_count(), 0);
    assert_eq!(rig.scheduler.cancelled_count(), 1);
}
