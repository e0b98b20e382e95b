//! Configuration store
//!
//! Owns the in-memory [`Configuration`] and the flash record it is saved to.
//! The stored record is a version byte followed by the postcard encoding
//! of a [`ConfigDocument`]. Live values are never persisted.

use duty_hal::{FlashError, FlashStorage, StorageKey};
use serde::Serialize;

use super::types::{ConfigDocument, ConfigError, ConfigSnapshot, Configuration, CONFIG_VERSION};

/// Maximum size of an encoded record
///
/// Version byte, two length-prefixed lists of [`super::MAX_PORTS`] bytes and
/// a varint `u32` fit comfortably.
pub const MAX_RECORD_SIZE: usize = 64;

/// Errors from loading or saving the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Flash operation failed (includes a missing record)
    Flash(FlashError),
    /// Stored bytes are not a valid record
    Deserialize,
    /// Record could not be encoded
    Serialize,
    /// Record was written by an incompatible layout version
    VersionMismatch(u8),
    /// Record decoded but violates configuration invariants
    Invalid(ConfigError),
}

impl From<FlashError> for StoreError {
    fn from(e: FlashError) -> Self {
        StoreError::Flash(e)
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        StoreError::Invalid(e)
    }
}

/// Outcome of bringing up the storage partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MountStatus {
    /// Partition mounted as found
    Mounted,
    /// Partition was unreadable and has been formatted
    Formatted,
    /// Partition stays unusable after formatting
    Unavailable(FlashError),
}

/// Where the boot configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigSource {
    /// Stored record
    Flash,
    /// Canonical defaults, with the reason the record was not used
    Defaults(StoreError),
}

/// Everything boot did to storage and configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    pub mount: MountStatus,
    pub source: ConfigSource,
}

#[derive(Serialize)]
struct StoredConfig<'a> {
    version: u8,
    document: &'a ConfigDocument,
}

/// Encode a document into a versioned record
pub fn encode_record<'a>(
    document: &ConfigDocument,
    buffer: &'a mut [u8],
) -> Result<&'a [u8], StoreError> {
    let stored = StoredConfig {
        version: CONFIG_VERSION,
        document,
    };
    let used = postcard::to_slice(&stored, buffer).map_err(|_| StoreError::Serialize)?;
    Ok(used)
}

/// Decode a versioned record and validate the document inside
pub fn decode_record(bytes: &[u8]) -> Result<ConfigDocument, StoreError> {
    let (version, rest) =
        postcard::take_from_bytes::<u8>(bytes).map_err(|_| StoreError::Deserialize)?;
    if version != CONFIG_VERSION {
        return Err(StoreError::VersionMismatch(version));
    }
    let document: ConfigDocument =
        postcard::from_bytes(rest).map_err(|_| StoreError::Deserialize)?;
    document.validate()?;
    Ok(document)
}

/// In-memory configuration backed by a flash record
pub struct ConfigStore<S> {
    storage: S,
    config: Configuration,
    available: bool,
}

impl<S: FlashStorage> ConfigStore<S> {
    /// Create a store holding the canonical default configuration
    ///
    /// Nothing is read until [`ConfigStore::boot`] or [`ConfigStore::load`].
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            config: Configuration::canonical(),
            available: true,
        }
    }

    /// Mount storage, formatting once if needed, then load the configuration
    ///
    /// Never fails: any problem leaves the canonical defaults in place and
    /// is described in the returned report.
    pub async fn boot(&mut self) -> BootReport {
        let mount = self.mount().await;

        let source = match mount {
            MountStatus::Unavailable(e) => {
                self.load_default();
                ConfigSource::Defaults(StoreError::Flash(e))
            }
            MountStatus::Mounted | MountStatus::Formatted => match self.load().await {
                Ok(()) => ConfigSource::Flash,
                Err(e) => {
                    self.load_default();
                    ConfigSource::Defaults(e)
                }
            },
        };

        BootReport { mount, source }
    }

    /// Mount the partition, formatting it once when the first mount fails
    pub async fn mount(&mut self) -> MountStatus {
        if self.storage.mount().await.is_ok() {
            self.available = true;
            return MountStatus::Mounted;
        }

        let formatted = match self.storage.erase_all().await {
            Ok(()) => self.storage.mount().await,
            Err(e) => Err(e),
        };

        match formatted {
            Ok(()) => {
                self.available = true;
                MountStatus::Formatted
            }
            Err(e) => {
                self.available = false;
                MountStatus::Unavailable(e)
            }
        }
    }

    /// Whether the last mount left storage usable
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Replace the configuration with the stored record
    ///
    /// On error the current configuration is kept.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let len = self
            .storage
            .read(StorageKey::PortConfig, &mut buffer)
            .await?;
        let document = decode_record(&buffer[..len])?;
        self.load_from_document(document)?;
        Ok(())
    }

    /// Replace the configuration with the canonical default
    pub fn load_default(&mut self) {
        self.config = Configuration::canonical();
    }

    /// Replace the configuration with a host-supplied document
    ///
    /// Live values reset to the document's defaults. On error nothing changes.
    pub fn load_from_document(&mut self, document: ConfigDocument) -> Result<(), ConfigError> {
        self.config = Configuration::from_document(document)?;
        Ok(())
    }

    /// Write the persisted subset of the configuration to flash
    ///
    /// The flash write runs on the caller's task; nothing else in the
    /// control loop progresses until it completes.
    pub async fn dump(&mut self) -> Result<(), StoreError> {
        if !self.available {
            return Err(StoreError::Flash(FlashError::Storage));
        }
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let record = encode_record(&self.config.document(), &mut buffer)?;
        self.storage.write(StorageKey::PortConfig, record).await?;
        Ok(())
    }

    /// Persisted subset plus live values
    pub fn to_document(&self) -> ConfigSnapshot {
        self.config.snapshot()
    }

    /// Current configuration
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Mutable access for live-only changes that skip persistence
    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// Swap in a fully validated configuration
    pub fn replace(&mut self, config: Configuration) {
        self.config = config;
    }

    /// Erase the storage partition
    ///
    /// The in-memory configuration is left alone; the next boot finds no
    /// record and falls back to defaults.
    pub async fn wipe(&mut self) -> Result<(), StoreError> {
        self.storage.erase_all().await?;
        Ok(())
    }

    /// Underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consume the store and return the storage
    pub fn into_storage(self) -> S {
        self.storage
    }
}
