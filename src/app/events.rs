//! Outbound application events.
//!
//! The [`BootDispatcher`](super::service::BootDispatcher) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, count in tests, etc.

use serde::Serialize;

use crate::error::{Error, PublishError};
use crate::fsm::StateId;
use crate::retained::{Level, WakeCause, WallClock};
use crate::scheduler::SleepPlan;

/// Structured events emitted by one boot cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// Cold start finished; carries the previous cycle's observability data.
    Booted {
        boot_count: u32,
        wake_cause: WakeCause,
        previous_cause: WakeCause,
        last_sync: WallClock,
        button: Level,
        /// `false` when retained memory was empty or invalid.
        restored: bool,
    },

    BatterySampled { volts: f32 },

    /// The dispatcher moved between states.
    StateChanged { from: StateId, to: StateId },

    /// A step failed; the cycle carries on.
    StepFailed(Error),

    TimeSynced { time: WallClock, attempts: u32 },

    TelemetrySent { bytes: usize },

    /// Entered the low-battery alert.
    LowBattery { volts: f32, threshold: f32 },

    /// The alert hit its cycle limit without the voltage recovering.
    LowBatteryAbandoned { cycles: u32, volts: f32 },

    /// Wake sources armed; suspension follows.
    SleepScheduled(SleepPlan),
}

/// The status message published once per cycle.
///
/// Serialises to `{"time":"YYYY-MM-DD HH:MM:SS","wakeup_reason":N,"battery":V}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPayload {
    pub time: String,
    pub wakeup_reason: u8,
    /// Volts, rounded to two decimals.
    pub battery: f32,
}

impl TelemetryPayload {
    pub fn new(time: WallClock, cause: WakeCause, battery_volts: f32) -> Self {
        Self {
            time: time.to_string(),
            wakeup_reason: cause.code(),
            battery: (battery_volts * 100.0).round() / 100.0,
        }
    }

    pub fn to_json(&self) -> Result<String, PublishError> {
        serde_json::to_string(self).map_err(|_| PublishError::Encode)
    }
}
