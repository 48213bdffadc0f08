//! GPIO / peripheral pin assignments for the FeedFish board (ESP32-C3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Indicator LED
// ---------------------------------------------------------------------------

/// Digital output, active HIGH.  Pad hold keeps the level through deep sleep.
pub const LED_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Feed button
// ---------------------------------------------------------------------------

/// Digital input, external pull.  Must be a deep-sleep wake capable pad
/// (GPIO0–5 on the C3).
pub const FEED_BUTTON_GPIO: i32 = 3;

// ---------------------------------------------------------------------------
// Battery sense (ADC1)
// ---------------------------------------------------------------------------

/// Battery divider tap on GPIO0 = ADC1 channel 0.
pub const BATTERY_ADC_CHANNEL: u32 = 0;

/// Divider resistors between the cell and the ADC pad.
pub const BATTERY_R_TOP_OHMS: f32 = 85_000.0;
pub const BATTERY_R_BOTTOM_OHMS: f32 = 100_000.0;
