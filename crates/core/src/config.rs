use fretflow_timeline::{HitDetector, HitWindows};
use serde::{Deserialize, Serialize};

use crate::driver::{DEFAULT_TICK_PERIOD_MS, DriverSpec};

fn default_tick_period() -> f64 {
    DEFAULT_TICK_PERIOD_MS
}

/// Which built-in driver a practice session runs on. Media playback is
/// chosen at runtime, since it needs a live element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DriverConfig {
    Tick {
        #[serde(default = "default_tick_period")]
        period_ms: f64,
    },
    Frame,
}

impl DriverConfig {
    pub fn spec(&self) -> DriverSpec {
        match *self {
            DriverConfig::Tick { period_ms } => DriverSpec::Tick { period_ms },
            DriverConfig::Frame => DriverSpec::Frame,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig::Tick {
            period_ms: DEFAULT_TICK_PERIOD_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub driver: DriverConfig,
    pub hit: HitWindows,
    pub cleanup_horizon_ms: f64,
    pub lookahead_ms: f64,
    pub lookbehind_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming_within_ms: Option<f64>,
    /// Period a host uses to emulate per-frame callbacks.
    pub frame_interval_ms: f64,
}

impl PracticeConfig {
    pub fn hit_detector(&self) -> HitDetector {
        HitDetector::new(
            HitWindows::new(self.hit.perfect_ms, self.hit.good_ms),
            self.cleanup_horizon_ms,
        )
    }
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            hit: HitWindows::default(),
            cleanup_horizon_ms: 500.0,
            lookahead_ms: 3000.0,
            lookbehind_ms: 250.0,
            upcoming_within_ms: None,
            frame_interval_ms: 16.0,
        }
    }
}
