//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured cycle events to the
//! ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::CycleEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`CycleEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CycleEvent) {
        match event {
            CycleEvent::Booted {
                boot_count,
                wake_cause,
                previous_cause,
                last_sync,
                button,
                restored,
            } => {
                info!(
                    "BOOT  | count={} | cause={} | prev_cause={} | last_sync={} | \
                     button={} | restored={}",
                    boot_count, wake_cause, previous_cause, last_sync, button, restored
                );
            }
            CycleEvent::BatterySampled { volts } => {
                info!("BATT  | volts={:.2}", volts);
            }
            CycleEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            CycleEvent::StepFailed(err) => {
                warn!("FAIL  | {}", err);
            }
            CycleEvent::TimeSynced { time, attempts } => {
                info!("SYNC  | time={} | polls={}", time, attempts);
            }
            CycleEvent::TelemetrySent { bytes } => {
                info!("MQTT  | sent={}B", bytes);
            }
            CycleEvent::LowBattery { volts, threshold } => {
                warn!("LOWB  | volts={:.2} | threshold={:.2}", volts, threshold);
            }
            CycleEvent::LowBatteryAbandoned { cycles, volts } => {
                warn!("LOWB  | abandoned after {} cycles | volts={:.2}", cycles, volts);
            }
            CycleEvent::SleepScheduled(plan) => {
                info!(
                    "SLEEP | reason={:?} | secs={} | wake_level={}",
                    plan.reason, plan.seconds, plan.wake_level
                );
            }
        }
    }
}
