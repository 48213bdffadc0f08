//! MQTT telemetry adapter.
//!
//! Implements [`TelemetryPort`]: one broker session per wake, opened after
//! the station has joined, used for a single QoS 1 status message, and
//! closed before the radio goes down.
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with an event callback
//!   that mirrors session state into atomics; connect and publish are
//!   bounded polls on those atomics.
//! - **`not(target_os = "espidf")`**: records every published payload.

use log::{info, warn};

use crate::app::ports::TelemetryPort;
use crate::config::FeederConfig;
use crate::error::PublishError;
#[cfg(target_os = "espidf")]
use crate::retry::{RetryPolicy, poll_until};

/// Broker CONNACK wait: 20 polls of 250 ms.
#[cfg(target_os = "espidf")]
const CONNECT_POLICY: RetryPolicy = RetryPolicy::fixed(20, 250);
/// Flush window after a publish: 10 polls of 5 ms.
#[cfg(target_os = "espidf")]
const FLUSH_POLICY: RetryPolicy = RetryPolicy::fixed(10, 5);

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
#[cfg(target_os = "espidf")]
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

#[cfg(target_os = "espidf")]
#[derive(Default)]
struct SessionFlags {
    connected: AtomicBool,
    last_acked: AtomicU32,
}

pub struct MqttAdapter {
    url: std::string::String,
    client_id: heapless::String<32>,
    topic: heapless::String<64>,
    keep_alive_secs: u16,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    flags: Arc<SessionFlags>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

#[cfg(not(target_os = "espidf"))]
struct SimBroker {
    reachable: bool,
    accepts: bool,
    connected: bool,
    published: std::vec::Vec<std::string::String>,
}

impl MqttAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(config: &FeederConfig) -> Self {
        Self {
            url: broker_url(config),
            client_id: config.mqtt_client_id.clone(),
            topic: config.mqtt_topic.clone(),
            keep_alive_secs: config.mqtt_keep_alive_secs,
            client: None,
            flags: Arc::new(SessionFlags::default()),
        }
    }

    /// Host twin.  `reachable = false` fails every connect.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(config: &FeederConfig, reachable: bool) -> Self {
        Self {
            url: broker_url(config),
            client_id: config.mqtt_client_id.clone(),
            topic: config.mqtt_topic.clone(),
            keep_alive_secs: config.mqtt_keep_alive_secs,
            sim: SimBroker {
                reachable,
                accepts: true,
                connected: false,
                published: std::vec::Vec::new(),
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn keep_alive_secs(&self) -> u16 {
        self.keep_alive_secs
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[std::string::String] {
        &self.sim.published
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_reachable(&mut self, reachable: bool) {
        self.sim.reachable = reachable;
    }

    /// Make the broker refuse publishes while still accepting sessions.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_accepts(&mut self, accepts: bool) {
        self.sim.accepts = accepts;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_is_connected(&self) -> bool {
        self.sim.connected
    }
}

fn broker_url(config: &FeederConfig) -> std::string::String {
    format!("mqtt://{}:{}", config.mqtt_host, config.mqtt_port)
}

#[cfg(target_os = "espidf")]
impl TelemetryPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), PublishError> {
        use core::time::Duration;
        use esp_idf_svc::hal::delay::FreeRtos;

        if self.client.is_some() && self.flags.connected.load(Ordering::Acquire) {
            return Ok(());
        }

        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            keep_alive_interval: Some(Duration::from_secs(u64::from(self.keep_alive_secs))),
            ..Default::default()
        };
        let flags = self.flags.clone();
        flags.connected.store(false, Ordering::Release);
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => flags.connected.store(true, Ordering::Release),
                EventPayload::Disconnected => flags.connected.store(false, Ordering::Release),
                EventPayload::Published(id) => flags.last_acked.store(id, Ordering::Release),
                EventPayload::Error(e) => log::warn!("MQTT: event error {:?}", e),
                _ => {}
            }
        })
        .map_err(|_| PublishError::ConnectFailed)?;
        self.client = Some(client);

        let flags = &self.flags;
        match poll_until(CONNECT_POLICY, &mut FreeRtos, |_| {
            flags.connected.load(Ordering::Acquire)
        }) {
            Ok(_) => {
                info!("MQTT: connected to {}", self.url);
                Ok(())
            }
            Err(_) => {
                self.client = None;
                Err(PublishError::ConnectFailed)
            }
        }
    }

    fn publish(&mut self, payload: &str) -> Result<(), PublishError> {
        use esp_idf_svc::hal::delay::FreeRtos;

        if !self.flags.connected.load(Ordering::Acquire) {
            return Err(PublishError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(PublishError::NotConnected)?;
        let id = client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload.as_bytes())
            .map_err(|_| PublishError::Rejected)?;

        let flags = &self.flags;
        if poll_until(FLUSH_POLICY, &mut FreeRtos, |_| {
            flags.last_acked.load(Ordering::Acquire) == id
        })
        .is_err()
        {
            warn!("MQTT: message {} not acknowledged within the flush window", id);
        }
        info!("MQTT: published {} bytes to {}", payload.len(), self.topic);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            self.flags.connected.store(false, Ordering::Release);
            info!("MQTT: session closed");
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl TelemetryPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), PublishError> {
        if !self.sim.reachable {
            warn!("MQTT(sim): broker {} unreachable", self.url);
            return Err(PublishError::ConnectFailed);
        }
        self.sim.connected = true;
        info!("MQTT(sim): connected to {} as {}", self.url, self.client_id);
        Ok(())
    }

    fn publish(&mut self, payload: &str) -> Result<(), PublishError> {
        if !self.sim.connected {
            return Err(PublishError::NotConnected);
        }
        if !self.sim.accepts {
            return Err(PublishError::Rejected);
        }
        self.sim.published.push(payload.into());
        info!("MQTT(sim): published {} bytes to {}", payload.len(), self.topic);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.sim.connected {
            self.sim.connected = false;
            info!("MQTT(sim): session closed");
        }
    }
}
