//! The feeder board: every adapter behind every port.
//!
//! [`BootDispatcher`](crate::app::service::BootDispatcher) is generic over a
//! single device type.  `FeederBoard` is that type for the real hardware
//! (and its host twin); each port method delegates to the adapter that
//! owns the concern.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{
    BatteryPort, ConnectivityPort, IndicatorPort, RetainedStorePort, TelemetryPort, TimePort,
    WakeSourcePort,
};
use crate::drivers::indicator::Indicator;
use crate::error::{ConnectivityError, PublishError, StorageError, TimeSyncError};
use crate::retained::{Level, RetainedState, WakeCause, WallClock};
use crate::sensors::battery::BatterySensor;

use super::mqtt::MqttAdapter;
use super::retained_store::RtcRetainedStore;
use super::sleep::DeepSleepController;
use super::time::ClockAdapter;
use super::wifi::WifiAdapter;

#[cfg(target_os = "espidf")]
type BoardDelay = esp_idf_svc::hal::delay::FreeRtos;
#[cfg(not(target_os = "espidf"))]
type BoardDelay = SimDelay;

#[cfg(target_os = "espidf")]
fn board_delay() -> BoardDelay {
    esp_idf_svc::hal::delay::FreeRtos
}

#[cfg(not(target_os = "espidf"))]
fn board_delay() -> BoardDelay {
    SimDelay::default()
}

/// Host delay: advances a virtual clock instead of blocking.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimDelay {
    elapsed_ns: u64,
}

#[cfg(not(target_os = "espidf"))]
impl SimDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

#[cfg(not(target_os = "espidf"))]
impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns = self.elapsed_ns.saturating_add(u64::from(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ns = self.elapsed_ns.saturating_add(u64::from(ms) * 1_000_000);
    }
}

pub struct FeederBoard {
    pub battery: BatterySensor,
    pub indicator: Indicator,
    pub wifi: WifiAdapter,
    pub clock: ClockAdapter,
    pub mqtt: MqttAdapter,
    pub sleep: DeepSleepController,
    pub store: RtcRetainedStore,
    delay: BoardDelay,
}

impl FeederBoard {
    pub fn new(
        battery: BatterySensor,
        indicator: Indicator,
        wifi: WifiAdapter,
        clock: ClockAdapter,
        mqtt: MqttAdapter,
        sleep: DeepSleepController,
        store: RtcRetainedStore,
    ) -> Self {
        Self {
            battery,
            indicator,
            wifi,
            clock,
            mqtt,
            sleep,
            store,
            delay: board_delay(),
        }
    }

    /// A host board where every network step succeeds and the clock reads
    /// `time` on the first poll.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(
        config: &crate::config::FeederConfig,
        cause: WakeCause,
        button: Level,
        time: Option<WallClock>,
    ) -> Self {
        use crate::pins;

        Self::new(
            BatterySensor::new(pins::BATTERY_ADC_CHANNEL),
            Indicator::new(pins::LED_GPIO),
            WifiAdapter::simulated(config, true),
            ClockAdapter::simulated(config, time, 1),
            MqttAdapter::simulated(config, true),
            DeepSleepController::simulated(cause, button),
            RtcRetainedStore::new(),
        )
    }

    /// Virtual time spent in delays so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_elapsed_ms(&self) -> u64 {
        self.delay.elapsed_ms()
    }
}

impl BatteryPort for FeederBoard {
    fn sample_volts(&mut self) -> Option<f32> {
        self.battery.read().map(|r| r.volts)
    }
}

impl ConnectivityPort for FeederBoard {
    fn join(&mut self) -> Result<(), ConnectivityError> {
        self.wifi.join()
    }

    fn leave(&mut self) {
        self.wifi.leave()
    }
}

impl TimePort for FeederBoard {
    fn begin_sync(&mut self) -> Result<(), TimeSyncError> {
        self.clock.begin_sync()
    }

    fn now(&mut self) -> Option<WallClock> {
        self.clock.now()
    }
}

impl TelemetryPort for FeederBoard {
    fn connect(&mut self) -> Result<(), PublishError> {
        self.mqtt.connect()
    }

    fn publish(&mut self, payload: &str) -> Result<(), PublishError> {
        self.mqtt.publish(payload)
    }

    fn disconnect(&mut self) {
        self.mqtt.disconnect()
    }
}

impl IndicatorPort for FeederBoard {
    fn set_indicator(&mut self, on: bool) {
        self.indicator.set(on)
    }
}

impl WakeSourcePort for FeederBoard {
    fn wake_cause(&self) -> WakeCause {
        self.sleep.wake_cause()
    }

    fn signal_level(&self) -> Level {
        self.sleep.signal_level()
    }

    fn arm_timer(&mut self, seconds: u64) {
        self.sleep.arm_timer(seconds)
    }

    fn arm_signal(&mut self, level: Level) {
        self.sleep.arm_signal(level)
    }

    fn suspend(&mut self) {
        self.sleep.suspend()
    }
}

impl RetainedStorePort for FeederBoard {
    fn restore(&mut self) -> Option<RetainedState> {
        self.store.restore()
    }

    fn persist(&mut self, state: &RetainedState) -> Result<(), StorageError> {
        self.store.persist(state)
    }
}

impl DelayNs for FeederBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms)
    }
}
