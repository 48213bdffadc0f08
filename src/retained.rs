//! State carried across deep sleep.
//!
//! Deep sleep powers down working memory, so nothing survives except a small
//! RTC region.  Instead of scattering `static mut` globals into that region,
//! the boot cycle works on an ordinary [`RetainedState`] value and crosses
//! the sleep boundary through an explicit snapshot:
//!
//! ```text
//!   cold start ──▶ decode(rtc image) ──▶ RetainedState ──▶ boot cycle
//!                                                            │
//!   deep sleep ◀── rtc image ◀── encode(RetainedState) ◀─────┘
//! ```
//!
//! The image layout is fixed-size so it can live in a `.rtc.data` static:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | magic `0xFEED_F15B` (LE)                |
//! | 4      | 1    | format version                          |
//! | 5      | 1    | payload length                          |
//! | 6      | 8    | SHA-256 prefix of the payload           |
//! | 14     | ≤114 | postcard-encoded [`RetainedState`]      |

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

// ---------------------------------------------------------------------------
// Wake cause
// ---------------------------------------------------------------------------

/// Why the device is executing: the platform-reported wake cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WakeCause {
    /// The armed sleep timer expired.
    Timer,
    /// The feed button reached the armed level.
    ExternalSignal,
    /// Power-on, reset, or any source the firmware does not arm.
    #[default]
    Undefined,
}

impl WakeCause {
    /// Numeric code matching the ESP-IDF `esp_sleep_source_t` numbering.
    /// Published in telemetry so dashboards keep their existing mapping.
    pub const fn code(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Timer => 4,
            Self::ExternalSignal => 7,
        }
    }
}

impl fmt::Display for WakeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer => write!(f, "timer"),
            Self::ExternalSignal => write!(f, "feed button"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pin level
// ---------------------------------------------------------------------------

/// Logic level of the feed button pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Level {
    #[default]
    High,
    Low,
}

impl Level {
    pub const fn from_raw(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::High => Self::Low,
            Self::Low => Self::High,
        }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wall clock
// ---------------------------------------------------------------------------

/// Broken-down local time as reported by the synchronised clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WallClock {
    pub year: u16,
    /// 1–12 (0 only in [`WallClock::ZERO`]).
    pub month: u8,
    /// 1–31 (0 only in [`WallClock::ZERO`]).
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl WallClock {
    /// The value before the first successful synchronisation.
    pub const ZERO: Self = Self {
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Fractional hour of day in `[0, 24)`.
    pub fn hour_of_day(&self) -> f32 {
        self.hour as f32 + self.minute as f32 / 60.0 + self.second as f32 / 3600.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

// ---------------------------------------------------------------------------
// Retained state
// ---------------------------------------------------------------------------

/// Device history carried from one wake cycle to the next.
///
/// Every field is written by exactly one step of the boot cycle; see
/// [`crate::fsm::states`] for which.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetainedState {
    /// Power-ons since the last full power loss.
    pub boot_count: u32,
    /// Latched outcome of the last Wi-Fi join.
    pub wifi_failed: bool,
    /// Latched outcome of the last broker connect/publish.
    pub mqtt_failed: bool,
    /// Latched outcome of the last clock synchronisation.
    pub sync_time_failed: bool,
    /// Last timestamp obtained from a successful synchronisation.
    pub last_sync_time: WallClock,
    /// Wake cause of the cycle that wrote this snapshot.
    pub last_wakeup_reason: WakeCause,
    /// Battery voltage sampled at the start of the last cycle.
    pub last_battery_level: f32,
    /// Feed button level captured at the very start of the last boot.
    pub feed_button_state: Level,
}

impl Default for RetainedState {
    fn default() -> Self {
        Self {
            boot_count: 0,
            wifi_failed: false,
            mqtt_failed: false,
            sync_time_failed: false,
            last_sync_time: WallClock::ZERO,
            last_wakeup_reason: WakeCause::Undefined,
            last_battery_level: 0.0,
            feed_button_state: Level::High,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot image codec
// ---------------------------------------------------------------------------

/// Size of the reserved RTC region.
pub const IMAGE_SIZE: usize = 128;

const MAGIC: u32 = 0xFEED_F15B;
const FORMAT_VERSION: u8 = 1;
const DIGEST_LEN: usize = 8;
const HEADER_LEN: usize = 4 + 1 + 1 + DIGEST_LEN;

/// A fixed-size retained-memory image.
pub type RetainedImage = [u8; IMAGE_SIZE];

fn digest(payload: &[u8]) -> [u8; DIGEST_LEN] {
    let full = hmac_sha256::Hash::hash(payload);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&full[..DIGEST_LEN]);
    out
}

/// Serialise `state` into a self-validating image.
pub fn encode(state: &RetainedState) -> Result<RetainedImage, StorageError> {
    let mut image = [0u8; IMAGE_SIZE];
    let used = postcard::to_slice(state, &mut image[HEADER_LEN..])
        .map_err(|_| StorageError::TooLarge)?
        .len();

    let sum = digest(&image[HEADER_LEN..HEADER_LEN + used]);
    image[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    image[4] = FORMAT_VERSION;
    image[5] = used as u8;
    image[6..HEADER_LEN].copy_from_slice(&sum);
    Ok(image)
}

/// Validate and deserialise an image.
///
/// Returns [`StorageError::Empty`] for a never-written (all-zero magic)
/// region and [`StorageError::Corrupted`] for anything else that fails a
/// check.
pub fn decode(image: &[u8]) -> Result<RetainedState, StorageError> {
    if image.len() < HEADER_LEN {
        return Err(StorageError::Corrupted);
    }

    let magic = u32::from_le_bytes([image[0], image[1], image[2], image[3]]);
    if magic == 0 {
        return Err(StorageError::Empty);
    }
    if magic != MAGIC || image[4] != FORMAT_VERSION {
        return Err(StorageError::Corrupted);
    }

    let len = image[5] as usize;
    if len == 0 || HEADER_LEN + len > image.len() {
        return Err(StorageError::Corrupted);
    }

    let payload = &image[HEADER_LEN..HEADER_LEN + len];
    if digest(payload) != image[6..HEADER_LEN] {
        return Err(StorageError::Corrupted);
    }

    postcard::from_bytes(payload).map_err(|_| StorageError::Corrupted)
}
