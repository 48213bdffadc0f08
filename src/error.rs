//! Unified error types for the FeedFish firmware.
//!
//! Every port has its own small error enum; the boot cycle funnels them into
//! a single [`Error`] so step failures can be reported uniformly through the
//! event sink.  All variants are `Copy`: none of them carries heap data.
//!
//! None of these errors is fatal.  The dispatcher records each one in the
//! retained failure flags and picks a shorter sleep instead of aborting.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The Wi-Fi join did not complete.
    Connectivity(ConnectivityError),
    /// The wall clock could not be synchronised.
    TimeSync(TimeSyncError),
    /// The status message could not be delivered.
    Publish(PublishError),
    /// Retained memory or NVS could not be read or written.
    Storage(StorageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// The battery sense produced no reading.
    BatteryUnread,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
            Self::TimeSync(e) => write!(f, "time sync: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::BatteryUnread => write!(f, "battery: no ADC reading"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    /// The station did not associate within the join timeout.
    Timeout,
    /// The Wi-Fi driver returned an ESP-IDF error code.
    Driver(i32),
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::Timeout => write!(f, "join timed out"),
            Self::Driver(rc) => write!(f, "WiFi driver error (rc={rc})"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Time synchronisation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSyncError {
    /// The SNTP client could not be started.
    StartFailed,
    /// No plausible timestamp after the given number of polls.
    Timeout { attempts: u32 },
}

impl fmt::Display for TimeSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed => write!(f, "SNTP client failed to start"),
            Self::Timeout { attempts } => {
                write!(f, "no plausible time after {attempts} polls")
            }
        }
    }
}

impl From<TimeSyncError> for Error {
    fn from(e: TimeSyncError) -> Self {
        Self::TimeSync(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The broker session could not be established.
    ConnectFailed,
    /// `publish` was called without an open session.
    NotConnected,
    /// The client refused or failed to send the message.
    Rejected,
    /// The payload could not be serialised.
    Encode,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "broker connection failed"),
            Self::NotConnected => write!(f, "not connected to broker"),
            Self::Rejected => write!(f, "message rejected"),
            Self::Encode => write!(f, "payload encoding failed"),
        }
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No image has been stored yet.
    Empty,
    /// Magic, version, length, or digest check failed.
    Corrupted,
    /// The encoded record does not fit the reserved region.
    TooLarge,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "nothing stored"),
            Self::Corrupted => write!(f, "stored image corrupted"),
            Self::TooLarge => write!(f, "record too large"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
