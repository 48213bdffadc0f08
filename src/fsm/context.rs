//! Shared mutable context threaded through every FSM handler.
//!
//! `CycleContext` is the single struct that state handlers read from and
//! write to during one wake cycle: the device ports, the event sink, the
//! configuration, the retained state being carried to the next cycle, and
//! the few values that only live for this cycle.

use log::warn;

use crate::app::events::CycleEvent;
use crate::app::ports::{DevicePorts, EventSink};
use crate::config::FeederConfig;
use crate::error::Error;
use crate::retained::{Level, RetainedState, WakeCause};
use crate::scheduler::{SleepPlan, WakeScheduler};

/// The shared context passed to every state handler function.
pub struct CycleContext<D, S> {
    // -- Collaborators --
    pub dev: D,
    pub sink: S,

    // -- Configuration --
    pub config: FeederConfig,
    pub scheduler: WakeScheduler,

    // -- Carried across sleep --
    /// Restored at cold start, persisted just before suspension.
    pub retained: RetainedState,

    // -- This cycle only --
    /// Platform wake cause for this execution, captured at cold start.
    pub wake_cause: WakeCause,
    /// Whether `retained` came from a valid snapshot.
    pub restored: bool,
    /// Whether Measuring got a reading; without one the alert is skipped.
    pub battery_sampled: bool,
    /// Blink cycles completed in the low-battery alert.
    pub alert_cycles: u32,
    /// Latest sample taken by the low-battery alert.
    pub alert_volts: f32,
    /// Decided by Scheduling (or the alert), consumed by Sleeping.
    pub plan: Option<SleepPlan>,
}

impl<D: DevicePorts, S: EventSink> CycleContext<D, S> {
    pub fn new(config: FeederConfig, dev: D, sink: S) -> Self {
        let scheduler = config.wake_scheduler();
        Self {
            dev,
            sink,
            config,
            scheduler,
            retained: RetainedState::default(),
            wake_cause: WakeCause::Undefined,
            restored: false,
            battery_sampled: false,
            alert_cycles: 0,
            alert_volts: 0.0,
            plan: None,
        }
    }

    pub fn emit(&mut self, event: CycleEvent) {
        self.sink.emit(&event);
    }

    /// Report a non-fatal step failure.
    pub fn step_failed(&mut self, err: impl Into<Error>) {
        let err = err.into();
        warn!("step failed: {}", err);
        self.emit(CycleEvent::StepFailed(err));
    }

    /// Level that wakes the device early: the opposite of the level seen at
    /// cold start, so the next press (or release) is what triggers.
    pub fn wake_level(&self) -> Level {
        self.retained.feed_button_state.opposite()
    }

    /// Whether the degradation branch must take over scheduling.
    pub fn needs_recovery(&self) -> bool {
        self.retained.wifi_failed || self.retained.sync_time_failed
    }
}
