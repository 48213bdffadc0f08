//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements         | Connects to                  |
//! |------------------|--------------------|------------------------------|
//! | `board`          | every device port  | the adapters below           |
//! | `log_sink`       | EventSink          | Serial log output            |
//! | `mqtt`           | TelemetryPort      | ESP-IDF MQTT client          |
//! | `nvs`            | ConfigPort         | NVS / in-memory store        |
//! | `retained_store` | RetainedStorePort  | RTC slow memory              |
//! | `sleep`          | WakeSourcePort     | ESP-IDF sleep controller     |
//! | `time`           | TimePort           | SNTP + RTC wall clock        |
//! | `wifi`           | ConnectivityPort   | ESP-IDF WiFi STA             |
//!
//! The battery sense and indicator LED are plain drivers
//! ([`crate::sensors::battery`], [`crate::drivers::indicator`]) that the
//! board exposes through `BatteryPort` and `IndicatorPort` directly.

pub mod board;
mod credentials;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod retained_store;
pub mod sleep;
pub mod time;
pub mod wifi;
