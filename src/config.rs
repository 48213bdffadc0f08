//! Feeder configuration parameters.
//!
//! Every tunable of the wake cycle lives here instead of as a literal in
//! the state handlers.  Values can be overridden via NVS; Wi-Fi credentials
//! default to the `FEEDFISH_WIFI_SSID` / `FEEDFISH_WIFI_PASS` build
//! environment.

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::scheduler::{MAX_TARGETS, WakeScheduler};

/// Fixed IPv4 settings for the station interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIp {
    pub address: [u8; 4],
    pub prefix_len: u8,
    pub gateway: [u8; 4],
    pub dns_primary: [u8; 4],
    pub dns_secondary: [u8; 4],
}

impl Default for StaticIp {
    fn default() -> Self {
        Self {
            address: [192, 168, 1, 111],
            prefix_len: 24,
            gateway: [192, 168, 1, 1],
            dns_primary: [8, 8, 8, 8],
            dns_secondary: [8, 8, 4, 4],
        }
    }
}

/// Core feeder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederConfig {
    // --- Battery ---
    /// Below this voltage the cycle enters the low-battery alert.
    pub low_battery_threshold_v: f32,
    /// Indicator half-period while alerting (milliseconds).
    pub alert_half_period_ms: u32,
    /// Blink cycles before the alert gives up and sleeps.  `None` alerts
    /// until the voltage recovers, however long that takes.
    pub low_battery_alert_limit: Option<u32>,
    /// Sleep length after the alert gives up (seconds).
    pub low_battery_sleep_secs: u32,
    /// Pause after sampling the battery, before the radio starts (ms).
    pub settle_ms: u32,

    // --- Schedule ---
    /// Daily wake targets, fractional hours in `[0, 24)`.
    pub wake_targets_h: Vec<f32, MAX_TARGETS>,
    /// A target this close (hours) or closer is skipped.
    pub min_lead_hours: f32,
    /// Sleep after a connectivity or time-sync failure (seconds).
    pub recovery_sleep_secs: u32,
    /// Sleep after a wake with no cause (seconds).
    pub cold_boot_sleep_secs: u32,
    /// Indicator pulse length on a cause-less wake (ms).
    pub cold_boot_pulse_ms: u32,

    // --- Time sync ---
    pub time_sync_attempts: u32,
    pub time_sync_interval_ms: u32,
    pub ntp_server: String<64>,
    /// POSIX TZ string applied before reading local time.
    pub timezone: String<64>,

    // --- Wi-Fi ---
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
    pub wifi_join_timeout_ms: u32,
    /// `None` uses DHCP.
    pub static_ip: Option<StaticIp>,

    // --- MQTT ---
    pub mqtt_host: String<64>,
    pub mqtt_port: u16,
    pub mqtt_client_id: String<32>,
    pub mqtt_topic: String<64>,
    pub mqtt_keep_alive_secs: u16,
}

/// Copy `s` into a fixed-capacity string, truncating at capacity.
pub(crate) fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Battery
            low_battery_threshold_v: 3.1,
            alert_half_period_ms: 500,
            low_battery_alert_limit: Some(1800), // ~30 min of 1 s blinks
            low_battery_sleep_secs: 3600,
            settle_ms: 900,

            // Schedule
            wake_targets_h: Vec::from_slice(&[7.0, 19.0]).unwrap_or_default(),
            min_lead_hours: 3.0,
            recovery_sleep_secs: 600,
            cold_boot_sleep_secs: 20,
            cold_boot_pulse_ms: 1000,

            // Time sync
            time_sync_attempts: 200,
            time_sync_interval_ms: 500,
            ntp_server: bounded("pool.ntp.org"),
            timezone: bounded("WET0WEST,M3.5.0/1,M10.5.0/2"),

            // Wi-Fi
            wifi_ssid: bounded(option_env!("FEEDFISH_WIFI_SSID").unwrap_or("")),
            wifi_password: bounded(option_env!("FEEDFISH_WIFI_PASS").unwrap_or("")),
            wifi_join_timeout_ms: 20_000,
            static_ip: Some(StaticIp::default()),

            // MQTT
            mqtt_host: bounded("192.168.1.14"),
            mqtt_port: 1883,
            mqtt_client_id: bounded("ESP32C3_Client"),
            mqtt_topic: bounded("v1/feedfish/esp32/"),
            mqtt_keep_alive_secs: 60,
        }
    }
}

/// Wi-Fi join is polled at this interval.
pub const WIFI_POLL_INTERVAL_MS: u32 = 500;

impl FeederConfig {
    /// Polling budget for the wall clock after SNTP has been started.
    pub fn retry_policy_for_time_sync(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.time_sync_attempts, self.time_sync_interval_ms)
    }

    /// Polling budget for the station to associate.
    pub fn retry_policy_for_wifi_join(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            (self.wifi_join_timeout_ms / WIFI_POLL_INTERVAL_MS).max(1),
            WIFI_POLL_INTERVAL_MS,
        )
    }

    pub fn wake_scheduler(&self) -> WakeScheduler {
        WakeScheduler::new(&self.wake_targets_h, self.min_lead_hours)
    }

    /// Range-check every field.  Rejects rather than clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2.5..=4.5).contains(&self.low_battery_threshold_v) {
            return Err(ConfigError::ValidationFailed(
                "low_battery_threshold_v must be 2.5–4.5",
            ));
        }
        if !(50..=5_000).contains(&self.alert_half_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "alert_half_period_ms must be 50–5000",
            ));
        }
        if self.low_battery_alert_limit == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "low_battery_alert_limit must be at least 1 when set",
            ));
        }
        if !(60..=86_400).contains(&self.low_battery_sleep_secs) {
            return Err(ConfigError::ValidationFailed(
                "low_battery_sleep_secs must be 60–86400",
            ));
        }
        if self.settle_ms > 10_000 {
            return Err(ConfigError::ValidationFailed("settle_ms must be 0–10000"));
        }
        if self.wake_targets_h.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "wake_targets_h needs at least one target",
            ));
        }
        if self
            .wake_targets_h
            .iter()
            .any(|t| !(0.0..24.0).contains(t))
        {
            return Err(ConfigError::ValidationFailed(
                "wake_targets_h entries must be 0.0–23.99",
            ));
        }
        if !(0.0..12.0).contains(&self.min_lead_hours) {
            return Err(ConfigError::ValidationFailed(
                "min_lead_hours must be 0.0–12.0",
            ));
        }
        if !(10..=86_400).contains(&self.recovery_sleep_secs) {
            return Err(ConfigError::ValidationFailed(
                "recovery_sleep_secs must be 10–86400",
            ));
        }
        if !(1..=3_600).contains(&self.cold_boot_sleep_secs) {
            return Err(ConfigError::ValidationFailed(
                "cold_boot_sleep_secs must be 1–3600",
            ));
        }
        if self.cold_boot_pulse_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "cold_boot_pulse_ms must be 0–10000",
            ));
        }
        if !(1..=1_000).contains(&self.time_sync_attempts) {
            return Err(ConfigError::ValidationFailed(
                "time_sync_attempts must be 1–1000",
            ));
        }
        if !(100..=5_000).contains(&self.time_sync_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "time_sync_interval_ms must be 100–5000",
            ));
        }
        if !(1_000..=120_000).contains(&self.wifi_join_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "wifi_join_timeout_ms must be 1000–120000",
            ));
        }
        if let Some(ip) = &self.static_ip {
            if !(1..=32).contains(&ip.prefix_len) {
                return Err(ConfigError::ValidationFailed(
                    "static_ip.prefix_len must be 1–32",
                ));
            }
        }
        if self.mqtt_host.is_empty() || self.mqtt_topic.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "mqtt_host and mqtt_topic must not be empty",
            ));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be non-zero"));
        }
        if !(10..=3_600).contains(&self.mqtt_keep_alive_secs) {
            return Err(ConfigError::ValidationFailed(
                "mqtt_keep_alive_secs must be 10–3600",
            ));
        }
        Ok(())
    }
}
