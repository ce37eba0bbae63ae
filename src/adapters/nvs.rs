//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`].
//!
//! - Config blobs are `postcard`-encoded and validated before every save.
//! - Each subsystem uses its own namespace; credential records live in
//!   `access`, the device config in `portatec`.
//! - Writes are atomic per key: ESP-IDF commits a blob in one step.
//!
//! The adapter is cheap to clone; clones share the same backing store, so
//! the credential store and the config loader can each own one.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::DeviceConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, collections::HashMap, rc::Rc};

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "portatec";
const CONFIG_KEY: &str = "devcfg";

/// Largest config blob accepted on load.
const MAX_CONFIG_BLOB: usize = 1024;

#[derive(Clone)]
pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    partition: EspDefaultNvsPartition,
    #[cfg(not(target_os = "espidf"))]
    store: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl NvsAdapter {
    /// Take the default NVS partition (initialising flash on first boot).
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            let partition = EspDefaultNvsPartition::take().map_err(|e| {
                warn!("NVS: partition unavailable: {:?}", e);
                ConfigError::IoError
            })?;
            info!("NVS: default partition ready");
            Ok(Self { partition })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NVS: simulation backend");
            Ok(Self {
                store: Rc::new(RefCell::new(HashMap::new())),
            })
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    #[cfg(target_os = "espidf")]
    fn open(&self, namespace: &str, write: bool) -> Result<EspNvs<NvsDefault>, StorageError> {
        EspNvs::new(self.partition.clone(), namespace, write).map_err(|e| {
            warn!("NVS: open '{}' failed: {:?}", namespace, e);
            StorageError::IoError
        })
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let mut buf = [0u8; MAX_CONFIG_BLOB];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("NVS: no stored config, using defaults");
                return Ok(DeviceConfig::default());
            }
            Err(StorageError::TooLarge) => return Err(ConfigError::Corrupted),
            Err(_) => return Err(ConfigError::IoError),
        };
        let cfg: DeviceConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        info!("NVS: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_CONFIG_BLOB {
            return Err(ConfigError::StorageFull);
        }
        // `StoragePort::write` takes `&mut self`; a clone shares the backend.
        let mut handle = self.clone();
        handle
            .write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|e| match e {
                StorageError::Full => ConfigError::StorageFull,
                _ => ConfigError::IoError,
            })?;
        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            let store = self.store.borrow();
            let data = store.get(&composite).ok_or(StorageError::NotFound)?;
            if data.len() > buf.len() {
                return Err(StorageError::TooLarge);
            }
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        #[cfg(target_os = "espidf")]
        {
            let nvs = self.open(namespace, false)?;
            let len = nvs
                .blob_len(key)
                .map_err(|_| StorageError::IoError)?
                .ok_or(StorageError::NotFound)?;
            if len > buf.len() {
                return Err(StorageError::TooLarge);
            }
            match nvs.get_blob(key, buf) {
                Ok(Some(data)) => Ok(data.len()),
                Ok(None) => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NVS: read {}::{} failed: {:?}", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let mut nvs = self.open(namespace, true)?;
            nvs.set_blob(key, data).map_err(|e| {
                warn!("NVS: write {}::{} failed: {:?}", namespace, key, e);
                if e.code() == esp_idf_svc::sys::ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let mut nvs = self.open(namespace, true)?;
            nvs.remove(key).map(|_| ()).map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            self.open(namespace, false)
                .ok()
                .and_then(|nvs| nvs.contains(key).ok())
                .unwrap_or(false)
        }
    }
}
