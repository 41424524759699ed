//! Runtime configuration
//!
//! Timing and persistence parameters for the scheduler and the record
//! stores. Stored on the medium as postcard binary data; any problem
//! reading it falls back to the built-in defaults.

use cryoloop_hal::{FileStorage, StorageError};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ErrorLog, Severity};

/// File holding the serialized configuration
pub const CONFIG_FILE: &str = "runtime.cfg";

/// Current configuration format version
pub const CONFIG_VERSION: u8 = 1;

/// Maximum serialized config size
const MAX_CONFIG_SIZE: usize = 64;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Storage operation failed
    Storage(StorageError),
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// Config version mismatch
    VersionMismatch,
    /// A parameter is out of its sane range
    Invalid(&'static str),
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        ConfigError::Storage(e)
    }
}

/// Runtime timing and persistence parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RuntimeConfig {
    /// Data format version
    pub version: u8,
    /// Scheduler tick period (ms)
    pub tick_period_ms: u32,
    /// Watchdog deadline after start (ms)
    pub watchdog_timeout_ms: u32,
    /// Minimum time between two writes of the same record (ms)
    pub min_write_interval_ms: u32,
    /// Records per bank before rotating to the other bank
    pub max_entries: u16,
    /// Consecutive clean ticks after which fault markers are cleared
    ///
    /// Zero disables automatic clearing.
    pub healthy_ticks_to_clear: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            tick_period_ms: 100,
            watchdog_timeout_ms: 5000,
            min_write_interval_ms: 10_000,
            max_entries: 64,
            healthy_ticks_to_clear: 600,
        }
    }
}

impl RuntimeConfig {
    /// Check parameters for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("tick period is zero"));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid("max entries is zero"));
        }
        if self.watchdog_timeout_ms < self.tick_period_ms {
            return Err(ConfigError::Invalid("watchdog shorter than a tick"));
        }
        Ok(())
    }

    /// Load configuration from storage
    ///
    /// Returns the stored config, or an error if it is missing, unreadable
    /// or from a different format version.
    pub fn try_load<S: FileStorage + ?Sized>(storage: &mut S) -> Result<Self, ConfigError> {
        let mut buffer = [0u8; MAX_CONFIG_SIZE];
        let len = storage.read_at(CONFIG_FILE, 0, &mut buffer)?;

        let config: RuntimeConfig =
            postcard::from_bytes(&buffer[..len]).map_err(|_| ConfigError::Deserialize)?;

        if config.version != CONFIG_VERSION {
            warn!(
                "Config version mismatch: found {}, expected {}",
                config.version, CONFIG_VERSION
            );
            return Err(ConfigError::VersionMismatch);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from storage, falling back to defaults
    ///
    /// A config that is present but unusable is recorded in `errors`.
    pub fn load<S: FileStorage + ?Sized>(storage: &mut S, errors: &mut ErrorLog) -> Self {
        match Self::try_load(storage) {
            Ok(config) => {
                debug!("Loaded runtime config from {}", CONFIG_FILE);
                config
            }
            Err(ConfigError::Storage(StorageError::NotFound)) => {
                debug!("No runtime config stored, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!("Failed to load runtime config: {:?}, using defaults", e);
                errors.record(ErrorCode::Config, "stored config unusable", Severity::Warning, 0);
                Self::default()
            }
        }
    }

    /// Write configuration to storage
    pub fn store<S: FileStorage + ?Sized>(&self, storage: &mut S) -> Result<(), ConfigError> {
        self.validate()?;
        let mut buffer = [0u8; MAX_CONFIG_SIZE];
        let bytes = postcard::to_slice(self, &mut buffer).map_err(|_| ConfigError::Serialize)?;
        storage.write(CONFIG_FILE, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryoloop_hal::RamStorage;

    fn mounted() -> RamStorage {
        let mut storage = RamStorage::new();
        storage.mount().unwrap();
        storage
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.tick_period_ms, 100);
        assert_eq!(config.watchdog_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_and_load() {
        let mut storage = mounted();
        let config = RuntimeConfig {
            max_entries: 8,
            min_write_interval_ms: 250,
            ..Default::default()
        };
        config.store(&mut storage).unwrap();

        let mut errors = ErrorLog::new();
        assert_eq!(RuntimeConfig::load(&mut storage, &mut errors), config);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let mut storage = mounted();
        assert_eq!(
            RuntimeConfig::try_load(&mut storage),
            Err(ConfigError::Storage(StorageError::NotFound))
        );
        let mut errors = ErrorLog::new();
        assert_eq!(RuntimeConfig::load(&mut storage, &mut errors), RuntimeConfig::default());
        assert_eq!(errors.count(ErrorCode::Config), 0);
    }

    #[test]
    fn test_garbage_uses_defaults() {
        let mut storage = mounted();
        storage.insert_raw(CONFIG_FILE, &[0xFF; 3]);
        let mut errors = ErrorLog::new();
        assert_eq!(RuntimeConfig::load(&mut storage, &mut errors), RuntimeConfig::default());
        assert_eq!(errors.count(ErrorCode::Config), 1);
    }

    #[test]
    fn test_version_mismatch() {
        let mut storage = mounted();
        let config = RuntimeConfig {
            version: CONFIG_VERSION + 1,
            ..Default::default()
        };
        let mut buffer = [0u8; MAX_CONFIG_SIZE];
        let bytes = postcard::to_slice(&config, &mut buffer).unwrap();
        storage.write(CONFIG_FILE, bytes).unwrap();

        assert_eq!(
            RuntimeConfig::try_load(&mut storage),
            Err(ConfigError::VersionMismatch)
        );
    }

    #[test]
    fn test_rejects_invalid() {
        let config = RuntimeConfig {
            watchdog_timeout_ms: 50,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut storage = mounted();
        assert!(config.store(&mut storage).is_err());
    }
}
