//! Battery voltage sense through a resistive divider.
//!
//! The cell is scaled down by R_TOP / R_BOTTOM before reaching the ADC pad.
//! A single oneshot conversion is undone linearly; no calibration curve is
//! applied or persisted.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1_CH0 via the oneshot API (initialised by hw_init).
//! On host/test: reads an injectable raw value held by the sensor.

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::pins;

const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// Raw count that reads back as roughly 3.9 V, a healthy cell.
pub const SIM_DEFAULT_RAW: u16 = 2616;

/// Convert a 12-bit ADC count into volts at the cell.
pub fn raw_to_volts(raw: u16) -> f32 {
    let pad = f32::from(raw.min(ADC_MAX as u16)) * V_REF / ADC_MAX;
    pad * (pins::BATTERY_R_TOP_OHMS + pins::BATTERY_R_BOTTOM_OHMS) / pins::BATTERY_R_BOTTOM_OHMS
}

/// Raw count closest to `volts`, for seeding simulations.
pub fn volts_to_raw(volts: f32) -> u16 {
    let pad = volts * pins::BATTERY_R_BOTTOM_OHMS
        / (pins::BATTERY_R_TOP_OHMS + pins::BATTERY_R_BOTTOM_OHMS);
    (pad * ADC_MAX / V_REF).round().clamp(0.0, ADC_MAX) as u16
}

#[derive(Debug, Clone, Copy)]
pub struct BatteryReading {
    pub raw: u16,
    pub volts: f32,
}

pub struct BatterySensor {
    channel: u32,
    /// Last count the ADC actually produced this boot.
    last_raw: Option<u16>,
    #[cfg(not(target_os = "espidf"))]
    sim_raw: Option<u16>,
}

impl BatterySensor {
    pub fn new(channel: u32) -> Self {
        Self {
            channel,
            last_raw: None,
            #[cfg(not(target_os = "espidf"))]
            sim_raw: Some(SIM_DEFAULT_RAW),
        }
    }

    /// Sample the cell.  A failed conversion repeats the last good count;
    /// with no good count yet there is no reading at all, rather than an
    /// empty cell.
    pub fn read(&mut self) -> Option<BatteryReading> {
        let raw = match self.read_adc() {
            Some(raw) => {
                self.last_raw = Some(raw);
                raw
            }
            None => {
                log::warn!(
                    "battery: ADC1 CH{} read failed (last good: {:?})",
                    self.channel,
                    self.last_raw
                );
                self.last_raw?
            }
        };
        Some(BatteryReading {
            raw,
            volts: raw_to_volts(raw),
        })
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_raw(&mut self, raw: u16) {
        self.sim_raw = Some(raw);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_volts(&mut self, volts: f32) {
        self.sim_raw = Some(volts_to_raw(volts));
    }

    /// Make every following conversion fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_reads(&mut self) {
        self.sim_raw = None;
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Option<u16> {
        hw_init::adc1_read(self.channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Option<u16> {
        self.sim_raw
    }
}
