//! Deep-sleep controller.
//!
//! Implements [`WakeSourcePort`].  Constructed before anything else at boot
//! so the feed button level and the platform wake cause are captured before
//! any other I/O can disturb them.
//!
//! - **`target_os = "espidf"`**: `esp_sleep_get_wakeup_cause`, GPIO and
//!   timer wake sources, pad-hold enable, `esp_deep_sleep_start`.
//! - **`not(target_os = "espidf")`**: records what was armed so host tests
//!   can inspect it; `suspend` returns.

use log::{info, warn};

use crate::app::ports::WakeSourcePort;
use crate::drivers::hw_init::HwInitError;
use crate::retained::{Level, WakeCause};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

/// `esp_sleep_source_t` codes the firmware arms.
const SLEEP_SOURCE_TIMER: u32 = 4;
const SLEEP_SOURCE_GPIO: u32 = 7;

/// Map a raw `esp_sleep_source_t` to a wake cause.  Sources the firmware
/// never arms (undefined, EXT0/1, touch, ULP …) all read as `Undefined`.
pub fn classify_wake_source(code: u32) -> WakeCause {
    match code {
        SLEEP_SOURCE_TIMER => WakeCause::Timer,
        SLEEP_SOURCE_GPIO => WakeCause::ExternalSignal,
        _ => WakeCause::Undefined,
    }
}

/// Button level from a pad read.  An unconfigurable pad reads as the idle
/// (released) level so the next sleep still arms a press wake.
pub fn button_level(read: Result<bool, HwInitError>) -> Level {
    match read {
        Ok(high) => Level::from_raw(high),
        Err(e) => {
            warn!("Sleep: feed button unreadable ({}), assuming released", e);
            Level::High
        }
    }
}

/// Timer wake sources take microseconds.
fn secs_to_us(seconds: u64) -> u64 {
    seconds.saturating_mul(1_000_000)
}

pub struct DeepSleepController {
    cause: WakeCause,
    level: Level,
    armed_timer_secs: Option<u64>,
    armed_level: Option<Level>,
    suspend_count: u32,
}

impl DeepSleepController {
    /// Configure the button pad, then latch its level and the wake cause.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        let level = button_level(
            hw_init::init_feed_button().map(|()| hw_init::gpio_read(pins::FEED_BUTTON_GPIO)),
        );
        // SAFETY: read-only query of the sleep subsystem.
        let raw = unsafe { esp_idf_svc::sys::esp_sleep_get_wakeup_cause() };
        let cause = classify_wake_source(raw as u32);
        info!("Sleep: wake source {} -> {}, button {}", raw, cause, level);
        Self::captured(cause, level)
    }

    /// Host twin with an injected wake cause and button level.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(cause: WakeCause, level: Level) -> Self {
        info!("Sleep(sim): wake cause {}, button {}", cause, level);
        Self::captured(cause, level)
    }

    fn captured(cause: WakeCause, level: Level) -> Self {
        Self {
            cause,
            level,
            armed_timer_secs: None,
            armed_level: None,
            suspend_count: 0,
        }
    }

    /// Sleep for `seconds` outside the normal cycle, still waking early on a
    /// button press.  Used when the cycle cannot be started at all.
    pub fn sleep_for_recovery(&mut self, seconds: u64) {
        let level = self.level.opposite();
        self.arm_signal(level);
        self.arm_timer(seconds);
        self.suspend();
    }

    pub fn armed_timer_secs(&self) -> Option<u64> {
        self.armed_timer_secs
    }

    pub fn armed_level(&self) -> Option<Level> {
        self.armed_level
    }

    /// How many times `suspend` returned.  Always 0 on hardware.
    pub fn suspend_count(&self) -> u32 {
        self.suspend_count
    }

    #[cfg(target_os = "espidf")]
    fn platform_arm_timer(&mut self, us: u64) {
        // SAFETY: configures a wake source; takes effect at sleep entry.
        let rc = unsafe { esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(us) };
        if rc != esp_idf_svc::sys::ESP_OK as i32 {
            log::error!("Sleep: timer wakeup rejected (rc={})", rc);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_arm_timer(&mut self, _us: u64) {}

    #[cfg(target_os = "espidf")]
    fn platform_arm_signal(&mut self, level: Level) {
        use esp_idf_svc::sys::*;
        let mode = if level.is_high() {
            esp_deepsleep_gpio_wake_up_mode_t_ESP_GPIO_WAKEUP_GPIO_HIGH
        } else {
            esp_deepsleep_gpio_wake_up_mode_t_ESP_GPIO_WAKEUP_GPIO_LOW
        };
        // SAFETY: configures a wake source on an RTC-capable pad.
        let rc = unsafe { esp_deep_sleep_enable_gpio_wakeup(1u64 << pins::FEED_BUTTON_GPIO, mode) };
        if rc != ESP_OK as i32 {
            log::error!("Sleep: GPIO wakeup rejected (rc={})", rc);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_arm_signal(&mut self, _level: Level) {}

    #[cfg(target_os = "espidf")]
    fn platform_suspend(&mut self) {
        hw_init::enable_deep_sleep_hold();
        // SAFETY: never returns; RTC memory and held pads survive.
        unsafe { esp_idf_svc::sys::esp_deep_sleep_start() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_suspend(&mut self) {
        self.suspend_count += 1;
    }
}

impl WakeSourcePort for DeepSleepController {
    fn wake_cause(&self) -> WakeCause {
        self.cause
    }

    fn signal_level(&self) -> Level {
        self.level
    }

    fn arm_timer(&mut self, seconds: u64) {
        self.platform_arm_timer(secs_to_us(seconds));
        self.armed_timer_secs = Some(seconds);
    }

    fn arm_signal(&mut self, level: Level) {
        self.platform_arm_signal(level);
        self.armed_level = Some(level);
    }

    fn suspend(&mut self) {
        info!(
            "Sleep: entering deep sleep (timer={:?} s, button wake={:?})",
            self.armed_timer_secs, self.armed_level
        );
        self.platform_suspend();
    }
}
