pub mod clock;
pub mod config;
pub mod driver;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod time;
pub mod transport;

pub use clock::{InstantClock, ManualClock, SpeedCell, WallClock};
pub use config::{DriverConfig, PracticeConfig};
pub use driver::{ClockDriver, DriverKind, DriverSpec, FrameDriver, MediaDriver, MediaElement, TickDriver};
pub use scheduler::{Cadence, LoopHandle, ManualScheduler, NullScheduler, Scheduler};
pub use session::{Frame, HostEnvironment, PracticeSession, SubscriberId};
pub use source::ClockSource;
pub use time::{HighwayProjection, NoteFill, NotePlacement, PlaybackPosition, fretboard_fill};
pub use transport::{PlaybackState, Transport, TransportError};

pub use fretflow_timeline::{
    EventPhase, FretPosition, Hit, HitDetector, HitQuality, HitWindows, Payload, TimedEvent, Timeline,
    TimelineError,
};
