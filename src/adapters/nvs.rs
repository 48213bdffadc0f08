//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the feeder.  The whole [`FeederConfig`] is
//! one postcard blob under namespace `feedfish`, key `feedcfg`.
//!
//! - Config validation: every field is range-checked before persistence
//!   and again after loading, so a blob from an older build cannot slip
//!   out-of-range values into the cycle.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The simulation backend keeps the blob in memory (dev/test only).

use log::info;

use crate::app::ports::ConfigPort;
use crate::config::FeederConfig;
use crate::error::ConfigError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};

const CONFIG_NAMESPACE: &str = "feedfish";
const CONFIG_KEY: &str = "feedcfg";

const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    partition: EspDefaultNvsPartition,
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<Option<std::vec::Vec<u8>>>,
}

impl NvsAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        info!("NvsAdapter: ESP-IDF NVS namespace '{}'", CONFIG_NAMESPACE);
        Self { partition }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        info!("NvsAdapter: simulation backend");
        Self {
            store: std::cell::RefCell::new(None),
        }
    }

    /// Overwrite the stored blob with arbitrary bytes, bypassing validation.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_put_raw(&self, bytes: &[u8]) {
        *self.store.borrow_mut() = Some(bytes.to_vec());
    }

    #[cfg(target_os = "espidf")]
    fn read_blob<'b>(&self, buf: &'b mut [u8]) -> Result<Option<&'b [u8]>, ConfigError> {
        let nvs = EspNvs::new(self.partition.clone(), CONFIG_NAMESPACE, true)
            .map_err(|_| ConfigError::IoError)?;
        nvs.get_raw(CONFIG_KEY, buf).map_err(|_| ConfigError::IoError)
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let mut nvs = EspNvs::new(self.partition.clone(), CONFIG_NAMESPACE, true)
            .map_err(|_| ConfigError::IoError)?;
        nvs.set_raw(CONFIG_KEY, bytes).map_err(|_| ConfigError::IoError)?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob<'b>(&self, buf: &'b mut [u8]) -> Result<Option<&'b [u8]>, ConfigError> {
        match self.store.borrow().as_deref() {
            Some(bytes) if bytes.len() > buf.len() => Err(ConfigError::Corrupted),
            Some(bytes) => {
                buf[..bytes.len()].copy_from_slice(bytes);
                Ok(Some(&buf[..bytes.len()]))
            }
            None => Ok(None),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        *self.store.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read_blob(&mut buf)? {
            Some(bytes) => {
                let cfg: FeederConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(FeederConfig::default())
            }
        }
    }

    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let bytes = postcard::to_slice(config, &mut buf).map_err(|_| ConfigError::IoError)?;
        self.write_blob(bytes)?;
        info!("NvsAdapter: saved config ({} bytes)", bytes.len());
        Ok(())
    }
}
