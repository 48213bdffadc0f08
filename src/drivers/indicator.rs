//! Single-colour indicator LED.
//!
//! The LED doubles as the feed actuator signal, so an ON level must stay
//! latched while the chip is in deep sleep.  Every write releases the pad
//! hold, drives the new level, and re-latches it when ON.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO configured by hw_init and manages its hold.
//! On host/test: tracks state in-memory only.

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

pub struct Indicator {
    gpio: i32,
    on: bool,
    held: bool,
}

impl Indicator {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            on: false,
            held: false,
        }
    }

    pub fn set(&mut self, on: bool) {
        self.platform_write(on);
        self.on = on;
        self.held = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Whether the pad is latched for sleep.
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    #[cfg(target_os = "espidf")]
    fn platform_write(&mut self, on: bool) {
        hw_init::gpio_hold(self.gpio, false);
        hw_init::gpio_write(self.gpio, on);
        if on {
            hw_init::gpio_hold(self.gpio, true);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_write(&mut self, on: bool) {
        log::debug!("Indicator(sim): GPIO{} -> {}", self.gpio, u8::from(on));
    }
}
