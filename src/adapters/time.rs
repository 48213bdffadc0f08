//! Wall-clock adapter.
//!
//! Implements [`TimePort`] for the feeder.
//!
//! - **`target_os = "espidf"`**: applies the POSIX TZ string, starts SNTP
//!   against the configured server, and reads local time through
//!   `gettimeofday` + `localtime_r`.  The RTC keeps counting through deep
//!   sleep, so a clock set in an earlier cycle stays plausible.
//! - **`not(target_os = "espidf")`**: a scripted clock that becomes valid
//!   after a configurable number of polls, for host-side testing and
//!   simulation.

use log::info;

use crate::app::ports::TimePort;
use crate::config::FeederConfig;
use crate::error::TimeSyncError;
use crate::retained::WallClock;

/// Anything before 2020-01-01T00:00:00Z is an unset RTC.
pub const EPOCH_2020: i64 = 1_577_836_800;

pub struct ClockAdapter {
    ntp_server: heapless::String<64>,
    timezone: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimClock,
}

#[cfg(not(target_os = "espidf"))]
struct SimClock {
    started: bool,
    time: Option<WallClock>,
    polls_needed: u32,
    polls: u32,
}

impl ClockAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(config: &FeederConfig) -> Self {
        Self {
            ntp_server: config.ntp_server.clone(),
            timezone: config.timezone.clone(),
            sntp: None,
        }
    }

    /// Host twin that reports `time` from the `polls_needed`-th poll after
    /// `begin_sync`.  `None` never becomes valid.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(config: &FeederConfig, time: Option<WallClock>, polls_needed: u32) -> Self {
        Self {
            ntp_server: config.ntp_server.clone(),
            timezone: config.timezone.clone(),
            sim: SimClock {
                started: false,
                time,
                polls_needed: polls_needed.max(1),
                polls: 0,
            },
        }
    }

    pub fn ntp_server(&self) -> &str {
        &self.ntp_server
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_polls(&self) -> u32 {
        self.sim.polls
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_time(&mut self, time: Option<WallClock>) {
        self.sim.time = time;
    }
}

#[cfg(target_os = "espidf")]
impl TimePort for ClockAdapter {
    fn begin_sync(&mut self) -> Result<(), TimeSyncError> {
        use esp_idf_svc::sntp::{EspSntp, SntpConf};

        // SAFETY: single-threaded boot path; no other thread reads the
        // environment.
        unsafe { std::env::set_var("TZ", self.timezone.as_str()) };
        unsafe { esp_idf_svc::sys::tzset() };

        if self.sntp.is_some() {
            return Ok(());
        }
        // SNTP keeps a pointer to the server name for as long as it runs.
        let server: &'static str = Box::leak(self.ntp_server.as_str().into());
        let mut conf = SntpConf::default();
        conf.servers[0] = server;
        let sntp = EspSntp::new(&conf).map_err(|_| TimeSyncError::StartFailed)?;
        self.sntp = Some(sntp);
        info!("Clock: SNTP started ({}), TZ={}", self.ntp_server, self.timezone);
        Ok(())
    }

    fn now(&mut self) -> Option<WallClock> {
        use esp_idf_svc::sys;

        let mut tv = sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as sys::time_t;
        let mut tm: sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        Some(WallClock::new(
            (tm.tm_year + 1900) as u16,
            (tm.tm_mon + 1) as u8,
            tm.tm_mday as u8,
            tm.tm_hour as u8,
            tm.tm_min as u8,
            tm.tm_sec as u8,
        ))
    }
}

#[cfg(not(target_os = "espidf"))]
impl TimePort for ClockAdapter {
    fn begin_sync(&mut self) -> Result<(), TimeSyncError> {
        self.sim.started = true;
        self.sim.polls = 0;
        info!("Clock(sim): sync started ({}), TZ={}", self.ntp_server, self.timezone);
        Ok(())
    }

    fn now(&mut self) -> Option<WallClock> {
        if !self.sim.started {
            return None;
        }
        self.sim.polls = self.sim.polls.saturating_add(1);
        if self.sim.polls < self.sim.polls_needed {
            return None;
        }
        self.sim.time
    }
}
