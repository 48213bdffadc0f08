//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity.  One join per wake: credentials are validated, the
//! station is started, and association is polled every 500 ms until the
//! join timeout.  `leave` stops the driver so the radio is off before sleep.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use log::{error, info, warn};

use crate::app::ports::ConnectivityPort;
use crate::config::{FeederConfig, StaticIp};
use crate::error::ConnectivityError;
use crate::retry::RetryPolicy;

use super::credentials::{validate_password, validate_ssid};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Joining,
    Connected,
    Failed,
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    static_ip: Option<StaticIp>,
    join_policy: RetryPolicy,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    /// Simulation: whether the access point answers.
    #[cfg(not(target_os = "espidf"))]
    sim_reachable: bool,
    /// Simulation: counts platform_join() calls.
    #[cfg(not(target_os = "espidf"))]
    sim_join_count: u32,
}

impl WifiAdapter {
    /// Bring up the driver (stopped) with the configured credentials and
    /// addressing.
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &FeederConfig,
    ) -> anyhow::Result<Self> {
        use esp_idf_svc::netif::{EspNetif, NetifStack};
        use esp_idf_svc::wifi::WifiDriver;

        let driver = WifiDriver::new(modem, sysloop, nvs)?;
        let sta = match config.static_ip {
            Some(ip) => EspNetif::new_with_conf(&static_netif_conf(&ip))?,
            None => EspNetif::new(NetifStack::Sta)?,
        };
        let wifi = EspWifi::wrap_all(driver, sta, EspNetif::new(NetifStack::Ap)?)?;
        Ok(Self::with_parts(config, wifi))
    }

    #[cfg(target_os = "espidf")]
    fn with_parts(config: &FeederConfig, wifi: EspWifi<'static>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: config.wifi_ssid.clone(),
            password: config.wifi_password.clone(),
            static_ip: config.static_ip,
            join_policy: config.retry_policy_for_wifi_join(),
            wifi,
        }
    }

    /// Host twin.  `reachable = false` makes every join time out.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(config: &FeederConfig, reachable: bool) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: config.wifi_ssid.clone(),
            password: config.wifi_password.clone(),
            static_ip: config.static_ip,
            join_policy: config.retry_policy_for_wifi_join(),
            sim_reachable: reachable,
            sim_join_count: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn static_ip(&self) -> Option<StaticIp> {
        self.static_ip
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_reachable(&mut self, reachable: bool) {
        self.sim_reachable = reachable;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_join_count(&self) -> u32 {
        self.sim_join_count
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_join(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::hal::delay::FreeRtos;

        let client = ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|e| ConnectivityError::Driver(e.code()))?;
        self.wifi.start().map_err(|e| ConnectivityError::Driver(e.code()))?;
        self.wifi.connect().map_err(|e| ConnectivityError::Driver(e.code()))?;

        let wifi = &self.wifi;
        let polls = crate::retry::poll_until(self.join_policy, &mut FreeRtos, |_| {
            wifi.is_connected().unwrap_or(false) && wifi.is_up().unwrap_or(false)
        })
        .map_err(|_| ConnectivityError::Timeout)?;
        info!("WiFi(espidf): link up after {} polls", polls);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_join(&mut self) -> Result<(), ConnectivityError> {
        self.sim_join_count = self.sim_join_count.wrapping_add(1);
        if !self.sim_reachable {
            warn!(
                "WiFi(sim): '{}' unreachable, timing out after {} polls",
                self.ssid, self.join_policy.max_attempts
            );
            return Err(ConnectivityError::Timeout);
        }
        info!("WiFi(sim): joined '{}' (join #{})", self.ssid, self.sim_join_count);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_leave(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi(espidf): disconnect failed: {}", e);
        }
        if let Err(e) = self.wifi.stop() {
            warn!("WiFi(espidf): stop failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_leave(&mut self) {
        info!("WiFi(sim): radio off");
    }
}

#[cfg(target_os = "espidf")]
fn static_netif_conf(ip: &StaticIp) -> esp_idf_svc::netif::NetifConfiguration {
    use core::net::Ipv4Addr;
    use esp_idf_svc::ipv4::{self, ClientSettings, Mask, Subnet};
    use esp_idf_svc::netif::NetifConfiguration;

    NetifConfiguration {
        ip_configuration: Some(ipv4::Configuration::Client(
            ipv4::ClientConfiguration::Fixed(ClientSettings {
                ip: Ipv4Addr::from(ip.address),
                subnet: Subnet {
                    gateway: Ipv4Addr::from(ip.gateway),
                    mask: Mask(ip.prefix_len),
                },
                dns: Some(Ipv4Addr::from(ip.dns_primary)),
                secondary_dns: Some(Ipv4Addr::from(ip.dns_secondary)),
            }),
        )),
        ..NetifConfiguration::wifi_default_client()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn join(&mut self) -> Result<(), ConnectivityError> {
        if let Err(e) = validate_ssid(&self.ssid).and_then(|()| validate_password(&self.password)) {
            self.state = WifiState::Failed;
            return Err(e);
        }
        if self.state == WifiState::Connected {
            return Ok(());
        }

        info!("WiFi: joining '{}'", self.ssid);
        self.state = WifiState::Joining;

        match self.platform_join() {
            Ok(()) => {
                self.state = WifiState::Connected;
                info!("WiFi: connected");
                Ok(())
            }
            Err(e) => {
                error!("WiFi: join failed: {}", e);
                self.state = WifiState::Failed;
                Err(e)
            }
        }
    }

    fn leave(&mut self) {
        if self.state == WifiState::Disconnected {
            return;
        }
        self.platform_leave();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
