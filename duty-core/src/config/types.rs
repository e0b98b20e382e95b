//! Configuration type definitions
//!
//! [`ConfigDocument`] is the persisted subset of the configuration.
//! [`Configuration`] adds the live output values, which never reach flash.

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Maximum number of output ports
pub const MAX_PORTS: usize = 16;

/// Upper bound of an output value (percent)
pub const MAX_VALUE: u8 = 100;

/// Value given to new ports by `ports-setup`
pub const INITIAL_VALUE: u8 = 0;

/// Port of the canonical default configuration
pub const DEFAULT_PORT: u8 = 25;

/// Default value of the canonical default configuration
pub const DEFAULT_VALUE: u8 = 100;

/// Update interval of the canonical default configuration
pub const DEFAULT_UPDATE_TIME_MS: u32 = 120;

/// Layout version written in front of every stored document
pub const CONFIG_VERSION: u8 = 1;

/// Ordered port identifiers (GPIO numbers)
pub type PortList = Vec<u8, MAX_PORTS>;

/// Ordered output values, positionally paired with a [`PortList`]
pub type ValueList = Vec<u8, MAX_PORTS>;

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Port list is empty
    NoPorts,
    /// More than [`MAX_PORTS`] ports
    TooManyPorts,
    /// The same port appears twice
    DuplicatePort,
    /// Port identifier is negative or does not fit a GPIO number
    PortOutOfRange,
    /// Ports and default values differ in length
    LengthMismatch,
    /// Value outside `0..=MAX_VALUE`
    ValueOutOfRange,
    /// Update interval negative or too large
    UpdateTimeOutOfRange,
    /// Output index beyond the port list
    IndexOutOfRange,
    /// Document is not valid JSON of the expected shape
    Malformed,
}

/// Persisted configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigDocument {
    /// Port identifiers
    pub ports: PortList,
    /// Value each port starts at after boot or reconfiguration
    pub default_values: ValueList,
    /// Update interval in milliseconds
    pub update_time: u32,
}

impl ConfigDocument {
    /// The canonical default: one port (25) at full output
    pub fn canonical() -> Self {
        let mut ports = PortList::new();
        let mut default_values = ValueList::new();
        // Capacity is MAX_PORTS, a single push cannot fail
        let _ = ports.push(DEFAULT_PORT);
        let _ = default_values.push(DEFAULT_VALUE);
        Self {
            ports,
            default_values,
            update_time: DEFAULT_UPDATE_TIME_MS,
        }
    }

    /// Check the invariants a document must satisfy before adoption
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ports(&self.ports)?;
        if self.default_values.len() != self.ports.len() {
            return Err(ConfigError::LengthMismatch);
        }
        validate_values(&self.default_values)
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Check a port list: non-empty, bounded, no duplicates
pub fn validate_ports(ports: &[u8]) -> Result<(), ConfigError> {
    if ports.is_empty() {
        return Err(ConfigError::NoPorts);
    }
    if ports.len() > MAX_PORTS {
        return Err(ConfigError::TooManyPorts);
    }
    for (i, port) in ports.iter().enumerate() {
        if ports[i + 1..].contains(port) {
            return Err(ConfigError::DuplicatePort);
        }
    }
    Ok(())
}

/// Check that every value is within `0..=MAX_VALUE`
pub fn validate_values(values: &[u8]) -> Result<(), ConfigError> {
    if values.iter().any(|&v| v > MAX_VALUE) {
        return Err(ConfigError::ValueOutOfRange);
    }
    Ok(())
}

/// Document received from a host, before range checks
///
/// Numbers are read as `i64` so that negative or oversized entries are
/// reported as range errors instead of parse errors.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateDocument {
    pub ports: Vec<i64, MAX_PORTS>,
    pub default_values: Vec<i64, MAX_PORTS>,
    #[serde(default)]
    pub update_time: Option<i64>,
}

impl CandidateDocument {
    /// Parse a JSON document such as
    /// `{"ports":[2,3],"default_values":[0,50],"update_time":200}`
    ///
    /// More than [`MAX_PORTS`] entries in either list is a parse failure.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        serde_json_core::from_str::<Self>(json)
            .map(|(doc, _)| doc)
            .map_err(|_| ConfigError::Malformed)
    }

    /// Range-check and narrow into a [`ConfigDocument`]
    ///
    /// A missing `update_time` keeps `current_update_time`.
    pub fn into_document(self, current_update_time: u32) -> Result<ConfigDocument, ConfigError> {
        let mut ports = PortList::new();
        for &port in &self.ports {
            let port = u8::try_from(port).map_err(|_| ConfigError::PortOutOfRange)?;
            ports.push(port).map_err(|_| ConfigError::TooManyPorts)?;
        }

        let mut default_values = ValueList::new();
        for &value in &self.default_values {
            let value = u8::try_from(value).map_err(|_| ConfigError::ValueOutOfRange)?;
            default_values
                .push(value)
                .map_err(|_| ConfigError::TooManyPorts)?;
        }

        let update_time = match self.update_time {
            Some(ms) => u32::try_from(ms).map_err(|_| ConfigError::UpdateTimeOutOfRange)?,
            None => current_update_time,
        };

        let doc = ConfigDocument {
            ports,
            default_values,
            update_time,
        };
        doc.validate()?;
        Ok(doc)
    }
}

/// Persisted configuration plus live values, as reported by `get-config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    pub ports: PortList,
    pub default_values: ValueList,
    pub update_time: u32,
    pub values: ValueList,
}

/// The authoritative in-memory configuration
///
/// `ports`, `default_values` and `values` always have the same length.
/// Fields are private; every mutator validates before it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Configuration {
    ports: PortList,
    default_values: ValueList,
    values: ValueList,
    update_time: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::canonical()
    }
}

impl Configuration {
    /// The canonical default configuration with values at their defaults
    pub fn canonical() -> Self {
        Self::from_valid(ConfigDocument::canonical())
    }

    /// Adopt a document, resetting live values to its defaults
    pub fn from_document(doc: ConfigDocument) -> Result<Self, ConfigError> {
        doc.validate()?;
        Ok(Self::from_valid(doc))
    }

    fn from_valid(doc: ConfigDocument) -> Self {
        Self {
            values: doc.default_values.clone(),
            ports: doc.ports,
            default_values: doc.default_values,
            update_time: doc.update_time,
        }
    }

    /// Port identifiers
    pub fn ports(&self) -> &[u8] {
        &self.ports
    }

    /// Persisted default values
    pub fn default_values(&self) -> &[u8] {
        &self.default_values
    }

    /// Live output values
    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Update interval in milliseconds
    pub fn update_time(&self) -> u32 {
        self.update_time
    }

    /// Number of configured ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// True when no port is configured (never the case after validation)
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Replace the port list; defaults and live values become [`INITIAL_VALUE`]
    pub fn set_ports(&mut self, ports: &[u8]) -> Result<(), ConfigError> {
        validate_ports(ports)?;

        let mut new_ports = PortList::new();
        new_ports
            .extend_from_slice(ports)
            .map_err(|_| ConfigError::TooManyPorts)?;
        let mut zeros = ValueList::new();
        zeros
            .resize(ports.len(), INITIAL_VALUE)
            .map_err(|_| ConfigError::TooManyPorts)?;

        self.ports = new_ports;
        self.default_values = zeros.clone();
        self.values = zeros;
        Ok(())
    }

    /// Set the live value of output `index`
    pub fn set_value(&mut self, index: usize, value: u8) -> Result<(), ConfigError> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(ConfigError::IndexOutOfRange)?;
        if value > MAX_VALUE {
            return Err(ConfigError::ValueOutOfRange);
        }
        *slot = value;
        Ok(())
    }

    /// Set the persisted default value of output `index`
    pub fn set_default_value(&mut self, index: usize, value: u8) -> Result<(), ConfigError> {
        let slot = self
            .default_values
            .get_mut(index)
            .ok_or(ConfigError::IndexOutOfRange)?;
        if value > MAX_VALUE {
            return Err(ConfigError::ValueOutOfRange);
        }
        *slot = value;
        Ok(())
    }

    /// Set the update interval
    pub fn set_update_time(&mut self, ms: u32) {
        self.update_time = ms;
    }

    /// Persisted subset
    pub fn document(&self) -> ConfigDocument {
        ConfigDocument {
            ports: self.ports.clone(),
            default_values: self.default_values.clone(),
            update_time: self.update_time,
        }
    }

    /// Persisted subset plus live values
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            ports: self.ports.clone(),
            default_values: self.default_values.clone(),
            update_time: self.update_time,
            values: self.values.clone(),
        }
    }
}
