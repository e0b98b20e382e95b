//! Channel bookkeeping between configuration and PWM driver

use duty_hal::{PwmDriver, PwmError};
use heapless::Vec;

use super::{duty_level, duty_top};
use crate::config::MAX_PORTS;

/// Number of PWM outputs that can be driven at once
pub const MAX_CHANNELS: usize = MAX_PORTS;

/// A port bound to a PWM output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    /// GPIO number
    pub port: u8,
    /// Position of the port in the configuration
    pub slot: usize,
    /// Last level written, `None` until the first write
    pub level: Option<u16>,
}

/// Result of a provisioning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProvisionReport {
    /// Ports now driving an output
    pub provisioned: usize,
    /// Ports beyond [`MAX_CHANNELS`] that were ignored
    pub truncated: usize,
    /// Ports the driver refused, with the reason
    pub rejected: Vec<(u8, PwmError), MAX_CHANNELS>,
}

impl ProvisionReport {
    /// True when every configured port got an output
    pub fn is_complete(&self) -> bool {
        self.truncated == 0 && self.rejected.is_empty()
    }
}

/// Rebuild the driver state from the `old` channel set to one for `new_ports`
///
/// Every old pin is detached and the PWM block is reset before the new
/// ports are attached, so no slice configuration survives a rebuild. The
/// driver may refuse some ports; those are reported and left unprovisioned.
pub fn reconcile<D: PwmDriver>(
    driver: &mut D,
    old: &[Channel],
    new_ports: &[u8],
) -> (Vec<Channel, MAX_CHANNELS>, ProvisionReport) {
    if !old.is_empty() {
        for channel in old {
            driver.detach(channel.port);
        }
        driver.reset();
    }

    let mut report = ProvisionReport {
        truncated: new_ports.len().saturating_sub(MAX_CHANNELS),
        ..ProvisionReport::default()
    };
    let mut channels = Vec::new();

    let top = duty_top();
    for (slot, &port) in new_ports.iter().take(MAX_CHANNELS).enumerate() {
        if let Err(e) = driver.attach(port, top) {
            // Capacity matches the iteration bound
            let _ = report.rejected.push((port, e));
            continue;
        }
        let _ = channels.push(Channel {
            port,
            slot,
            level: None,
        });
    }

    report.provisioned = channels.len();
    (channels, report)
}

/// Set of PWM outputs mirroring the configured ports
pub struct OutputChannels<D> {
    driver: D,
    channels: Vec<Channel, MAX_CHANNELS>,
}

impl<D: PwmDriver> OutputChannels<D> {
    /// Take ownership of the driver and reset it
    pub fn new(mut driver: D) -> Self {
        driver.reset();
        Self {
            driver,
            channels: Vec::new(),
        }
    }

    /// Reconfigure outputs for a new port list
    pub fn provision(&mut self, ports: &[u8]) -> ProvisionReport {
        let (channels, report) = reconcile(&mut self.driver, &self.channels, ports);
        self.channels = channels;
        report
    }

    /// Write levels for `values`, indexed by configuration slot
    ///
    /// Only outputs whose level changed are written. Returns the number of
    /// writes performed.
    pub fn apply(&mut self, values: &[u8]) -> usize {
        let top = duty_top();
        let mut writes = 0;
        for channel in self.channels.iter_mut() {
            let value = values.get(channel.slot).copied().unwrap_or(0);
            let level = duty_level(value, top);
            if channel.level != Some(level) {
                self.driver.set_level(channel.port, level);
                channel.level = Some(level);
                writes += 1;
            }
        }
        writes
    }

    /// Currently provisioned channels
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Underlying driver
    pub fn driver(&self) -> &D {
        &self.driver
    }
}
