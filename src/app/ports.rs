//! Port traits: the hexagonal boundary between the wake cycle and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BootDispatcher (domain)
//! ```
//!
//! Driven adapters (battery, radio, clock, broker, indicator, sleep
//! controller, retained memory) implement these traits.  The
//! [`BootDispatcher`](super::service::BootDispatcher) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! ## Contract notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - `leave` and `disconnect` MUST be idempotent: tearing down a session
//!   that never came up is a no-op, not an error.
//! - All port errors are typed; see [`crate::error`].

use embedded_hal::delay::DelayNs;

use crate::config::FeederConfig;
use crate::error::{ConfigError, ConnectivityError, PublishError, StorageError, TimeSyncError};
use crate::retained::{Level, RetainedState, WakeCause, WallClock};

// ───────────────────────────────────────────────────────────────
// Battery port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

pub trait BatteryPort {
    /// One battery sample, in volts at the cell (divider already undone).
    /// `None` when the sense path has produced no reading this boot.
    fn sample_volts(&mut self) -> Option<f32>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain ↔ Wi-Fi)
// ───────────────────────────────────────────────────────────────

pub trait ConnectivityPort {
    /// Join the configured network.  Bounded by the adapter's join timeout.
    fn join(&mut self) -> Result<(), ConnectivityError>;

    /// Tear the session down.  Idempotent.
    fn leave(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Time port (driven adapter: SNTP / RTC → domain)
// ───────────────────────────────────────────────────────────────

pub trait TimePort {
    /// Start synchronising the wall clock.  Returns immediately; progress
    /// is observed through [`now`](Self::now).
    fn begin_sync(&mut self) -> Result<(), TimeSyncError>;

    /// Current local time, or `None` while the clock is not plausible.
    fn now(&mut self) -> Option<WallClock>;
}

// ───────────────────────────────────────────────────────────────
// Telemetry port (driven adapter: domain → MQTT)
// ───────────────────────────────────────────────────────────────

pub trait TelemetryPort {
    fn connect(&mut self) -> Result<(), PublishError>;

    /// Send one status message on the configured topic.
    fn publish(&mut self, payload: &str) -> Result<(), PublishError>;

    /// Close the session.  Idempotent.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Indicator port (driven adapter: domain → LED)
// ───────────────────────────────────────────────────────────────

pub trait IndicatorPort {
    /// Drive the indicator.  ON must survive deep sleep.
    fn set_indicator(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Wake source port (driven adapter: domain ↔ sleep controller)
// ───────────────────────────────────────────────────────────────

pub trait WakeSourcePort {
    /// Platform-reported reason this execution started.
    fn wake_cause(&self) -> WakeCause;

    /// Level of the feed button, as captured before any other I/O.
    fn signal_level(&self) -> Level;

    /// Wake after `seconds`.
    fn arm_timer(&mut self, seconds: u64);

    /// Wake when the feed button reaches `level`.
    fn arm_signal(&mut self, level: Level);

    /// Enter deep sleep.  Does not return on hardware.
    fn suspend(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Retained store port (driven adapter: domain ↔ RTC memory)
// ───────────────────────────────────────────────────────────────

pub trait RetainedStorePort {
    /// The snapshot written before the last suspension, or `None` after a
    /// power loss or if the image fails validation.
    fn restore(&mut self) -> Option<RetainedState>;

    fn persist(&mut self, state: &RetainedState) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists feeder configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Returns [`FeederConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<FeederConfig, ConfigError>;

    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`CycleEvent`](super::events::CycleEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::CycleEvent);
}

// ───────────────────────────────────────────────────────────────
// Aggregate
// ───────────────────────────────────────────────────────────────

/// Everything the boot cycle drives, bundled so one `&mut` reaches it all.
///
/// Blanket-implemented: any type that implements every port is a device.
pub trait DevicePorts:
    BatteryPort
    + ConnectivityPort
    + TimePort
    + TelemetryPort
    + IndicatorPort
    + WakeSourcePort
    + RetainedStorePort
    + DelayNs
{
}

impl<T> DevicePorts for T where
    T: BatteryPort
        + ConnectivityPort
        + TimePort
        + TelemetryPort
        + IndicatorPort
        + WakeSourcePort
        + RetainedStorePort
        + DelayNs
{
}
