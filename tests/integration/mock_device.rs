//! Mock device for integration tests.
//!
//! Implements every port the boot cycle drives and records each call in
//! order, so tests can assert on the full interaction history without
//! touching real GPIO, radio, or RTC registers.

use std::cell::RefCell;
use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use feedfish::app::events::CycleEvent;
use feedfish::app::ports::{
    BatteryPort, ConnectivityPort, EventSink, IndicatorPort, RetainedStorePort, TelemetryPort,
    TimePort, WakeSourcePort,
};
use feedfish::error::{ConnectivityError, PublishError, StorageError, TimeSyncError};
use feedfish::retained::{Level, RetainedState, WakeCause, WallClock};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    ReadButton,
    ReadWakeCause,
    Restore,
    SampleBattery,
    Join,
    Leave,
    BeginSync,
    Now,
    Connect,
    Publish(String),
    Disconnect,
    SetIndicator(bool),
    DelayMs(u32),
    Persist(RetainedState),
    ArmSignal(Level),
    ArmTimer(u64),
    Suspend,
}

// ── MockDevice ────────────────────────────────────────────────

pub struct MockDevice {
    calls: RefCell<Vec<DeviceCall>>,

    pub cause: WakeCause,
    pub button: Level,
    pub stored: Option<RetainedState>,
    /// Samples handed out in order; the last one repeats.  `None` is a
    /// failed conversion.
    pub battery: VecDeque<Option<f32>>,
    pub join_result: Result<(), ConnectivityError>,
    pub begin_sync_result: Result<(), TimeSyncError>,
    /// What a valid clock reads; `None` never becomes valid.
    pub clock: Option<WallClock>,
    /// Polls of `now()` before the clock becomes valid.
    pub clock_polls_needed: u32,
    clock_polls: u32,
    synced: bool,
    pub connect_result: Result<(), PublishError>,
    pub publish_result: Result<(), PublishError>,
    pub persist_result: Result<(), StorageError>,
}

#[allow(dead_code)]
impl MockDevice {
    /// A healthy device: 3.9 V, network up, clock valid on the first poll.
    pub fn new(cause: WakeCause, button: Level, clock: Option<WallClock>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            cause,
            button,
            stored: None,
            battery: VecDeque::from([Some(3.9)]),
            join_result: Ok(()),
            begin_sync_result: Ok(()),
            clock,
            clock_polls_needed: 1,
            clock_polls: 0,
            synced: false,
            connect_result: Ok(()),
            publish_result: Ok(()),
            persist_result: Ok(()),
        }
    }

    pub fn with_battery(mut self, samples: &[f32]) -> Self {
        self.battery = samples.iter().copied().map(Some).collect();
        self
    }

    pub fn with_battery_readings(mut self, samples: &[Option<f32>]) -> Self {
        self.battery = samples.iter().copied().collect();
        self
    }

    pub fn with_stored(mut self, state: RetainedState) -> Self {
        self.stored = Some(state);
        self
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &DeviceCall) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&DeviceCall) -> bool) -> Option<usize> {
        self.calls.borrow().iter().position(pred)
    }

    pub fn published(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Publish(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn persisted(&self) -> Option<RetainedState> {
        self.calls.borrow().iter().rev().find_map(|c| match c {
            DeviceCall::Persist(s) => Some(*s),
            _ => None,
        })
    }

    pub fn indicator_writes(&self) -> Vec<bool> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetIndicator(on) => Some(*on),
                _ => None,
            })
            .collect()
    }

    pub fn total_delay_ms(&self) -> u64 {
        self.calls
            .borrow()
            .iter()
            .map(|c| match c {
                DeviceCall::DelayMs(ms) => u64::from(*ms),
                _ => 0,
            })
            .sum()
    }

    fn record(&self, call: DeviceCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl BatteryPort for MockDevice {
    fn sample_volts(&mut self) -> Option<f32> {
        self.record(DeviceCall::SampleBattery);
        if self.battery.len() > 1 {
            self.battery.pop_front().flatten()
        } else {
            self.battery.front().copied().flatten()
        }
    }
}

impl ConnectivityPort for MockDevice {
    fn join(&mut self) -> Result<(), ConnectivityError> {
        self.record(DeviceCall::Join);
        self.join_result
    }

    fn leave(&mut self) {
        self.record(DeviceCall::Leave);
    }
}

impl TimePort for MockDevice {
    fn begin_sync(&mut self) -> Result<(), TimeSyncError> {
        self.record(DeviceCall::BeginSync);
        self.synced = self.begin_sync_result.is_ok();
        self.begin_sync_result
    }

    fn now(&mut self) -> Option<WallClock> {
        self.record(DeviceCall::Now);
        if !self.synced {
            return None;
        }
        self.clock_polls += 1;
        if self.clock_polls < self.clock_polls_needed {
            return None;
        }
        self.clock
    }
}

impl TelemetryPort for MockDevice {
    fn connect(&mut self) -> Result<(), PublishError> {
        self.record(DeviceCall::Connect);
        self.connect_result
    }

    fn publish(&mut self, payload: &str) -> Result<(), PublishError> {
        self.record(DeviceCall::Publish(payload.to_string()));
        self.publish_result
    }

    fn disconnect(&mut self) {
        self.record(DeviceCall::Disconnect);
    }
}

impl IndicatorPort for MockDevice {
    fn set_indicator(&mut self, on: bool) {
        self.record(DeviceCall::SetIndicator(on));
    }
}

impl WakeSourcePort for MockDevice {
    fn wake_cause(&self) -> WakeCause {
        self.record(DeviceCall::ReadWakeCause);
        self.cause
    }

    fn signal_level(&self) -> Level {
        self.record(DeviceCall::ReadButton);
        self.button
    }

    fn arm_timer(&mut self, seconds: u64) {
        self.record(DeviceCall::ArmTimer(seconds));
    }

    fn arm_signal(&mut self, level: Level) {
        self.record(DeviceCall::ArmSignal(level));
    }

    fn suspend(&mut self) {
        self.record(DeviceCall::Suspend);
    }
}

impl RetainedStorePort for MockDevice {
    fn restore(&mut self) -> Option<RetainedState> {
        self.record(DeviceCall::Restore);
        self.stored
    }

    fn persist(&mut self, state: &RetainedState) -> Result<(), StorageError> {
        self.record(DeviceCall::Persist(*state));
        self.persist_result?;
        self.stored = Some(*state);
        Ok(())
    }
}

impl DelayNs for MockDevice {
    fn delay_ns(&mut self, ns: u32) {
        self.record(DeviceCall::DelayMs(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(DeviceCall::DelayMs(ms));
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<CycleEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&CycleEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn failures(&self) -> Vec<feedfish::error::Error> {
        self.events
            .iter()
            .filter_map(|e| match e {
                CycleEvent::StepFailed(err) => Some(*err),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CycleEvent) {
        self.events.push(event.clone());
    }
}
