//! FeedFish Firmware: Main Entry Point
//!
//! One execution per wake.  Every physical wake re-runs this from the top;
//! nothing but the RTC snapshot survives the previous cycle.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BatterySensor   Indicator     WifiAdapter   ClockAdapter      │
//! │  (BatteryPort)   (Indicator)   (Connectivity)(TimePort)        │
//! │  MqttAdapter     DeepSleep     RtcRetained   NvsAdapter        │
//! │  (Telemetry)     (WakeSource)  (RetainedStore)(ConfigPort)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            BootDispatcher (pure logic)                 │    │
//! │  │  FSM · WakeScheduler · Retry                           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use feedfish::adapters::board::FeederBoard;
use feedfish::adapters::log_sink::LogEventSink;
use feedfish::adapters::mqtt::MqttAdapter;
use feedfish::adapters::nvs::NvsAdapter;
use feedfish::adapters::retained_store::RtcRetainedStore;
use feedfish::adapters::sleep::DeepSleepController;
use feedfish::adapters::time::ClockAdapter;
use feedfish::adapters::wifi::WifiAdapter;
use feedfish::app::ports::ConfigPort;
use feedfish::app::service::BootDispatcher;
use feedfish::config::FeederConfig;
use feedfish::drivers::{hw_init, indicator::Indicator};
use feedfish::pins;
use feedfish::sensors::battery::BatterySensor;

fn main() {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    if let Err(e) = esp_idf_logger::init() {
        println!("logger init failed: {}", e);
    }

    // ── 2. Feed button + wake cause, before any other I/O ─────
    let sleep = DeepSleepController::new();

    info!("FeedFish v{}", env!("CARGO_PKG_VERSION"));

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let nvs_partition = match EspDefaultNvsPartition::take() {
        Ok(p) => Some(p),
        Err(e) => {
            warn!("NVS partition unavailable ({}), running with defaults", e);
            None
        }
    };
    let config = match &nvs_partition {
        Some(p) => NvsAdapter::new(p.clone()).load().unwrap_or_else(|e| {
            warn!("NVS config load failed ({}), using defaults", e);
            FeederConfig::default()
        }),
        None => FeederConfig::default(),
    };

    // ── 4. Peripherals + network driver ───────────────────────
    let wifi = match setup(nvs_partition, &config) {
        Ok(wifi) => wifi,
        Err(e) => {
            error!("Setup failed: {:#}, sleeping {} s", e, config.recovery_sleep_secs);
            recover(sleep, &config);
        }
    };

    // ── 5. Construct adapters ─────────────────────────────────
    let board = FeederBoard::new(
        BatterySensor::new(pins::BATTERY_ADC_CHANNEL),
        Indicator::new(pins::LED_GPIO),
        wifi,
        ClockAdapter::new(&config),
        MqttAdapter::new(&config),
        sleep,
        RtcRetainedStore::new(),
    );

    // ── 6. Run the cycle ──────────────────────────────────────
    let mut dispatcher = BootDispatcher::new(config.clone(), board, LogEventSink::new());
    let plan = dispatcher.run();

    // Deep sleep does not return; reaching this means it was refused.
    warn!("Deep sleep returned unexpectedly (plan: {:?})", plan);
    let (board, _) = dispatcher.into_parts();
    recover(board.sleep, &config);
}

/// Everything between config load and the cycle that can fail.
fn setup(nvs: Option<EspDefaultNvsPartition>, config: &FeederConfig) -> Result<WifiAdapter> {
    // Without the ADC the cycle would read an empty cell and alert.
    hw_init::init_peripherals()?;
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    WifiAdapter::new(peripherals.modem, sysloop, nvs, config)
}

/// Recovery sleep outside the cycle.  A refused sleep restarts the chip so
/// the firmware never stays awake.
fn recover(mut sleep: DeepSleepController, config: &FeederConfig) -> ! {
    sleep.sleep_for_recovery(u64::from(config.recovery_sleep_secs));
    error!("Deep sleep refused, restarting");
    // SAFETY: no preconditions; does not return.
    unsafe { esp_idf_svc::sys::esp_restart() }
}
