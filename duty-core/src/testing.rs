//! In-memory hardware doubles for host tests

use std::collections::BTreeMap;
use std::vec::Vec;

use duty_hal::{FlashError, FlashStorage, PwmDriver, PwmError, StorageKey};

/// Flash storage holding a single record in RAM
#[derive(Debug, Default)]
pub struct MemFlash {
    /// Stored `PortConfig` record
    pub record: Option<Vec<u8>>,
    /// Remaining mount attempts that report corruption
    pub failing_mounts: usize,
    /// Reject every write
    pub fail_writes: bool,
    pub mounts: usize,
    pub writes: usize,
    pub erases: usize,
}

impl MemFlash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(bytes: &[u8]) -> Self {
        Self {
            record: Some(bytes.to_vec()),
            ..Self::default()
        }
    }

    /// Storage whose first `failures` mounts fail
    pub fn unmountable(failures: usize) -> Self {
        Self {
            failing_mounts: failures,
            ..Self::default()
        }
    }
}

impl FlashStorage for MemFlash {
    async fn mount(&mut self) -> Result<(), FlashError> {
        self.mounts += 1;
        if self.failing_mounts > 0 {
            self.failing_mounts -= 1;
            return Err(FlashError::Corrupted);
        }
        Ok(())
    }

    async fn read(&mut self, _key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let data = self.record.as_ref().ok_or(FlashError::NotFound)?;
        let dest = buffer
            .get_mut(..data.len())
            .ok_or(FlashError::BufferTooSmall)?;
        dest.copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, _key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Flash);
        }
        self.record = Some(data.to_vec());
        self.writes += 1;
        Ok(())
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.erases += 1;
        self.record = None;
        Ok(())
    }
}

/// Driver call recorded by [`MockPwm`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmEvent {
    Attach(u8, u16),
    Detach(u8),
    Reset,
    Level(u8, u16),
}

/// PWM driver that records calls instead of touching hardware
#[derive(Debug, Default)]
pub struct MockPwm {
    pub events: Vec<PwmEvent>,
    attached: Vec<u8>,
    levels: BTreeMap<u8, u16>,
    refused: BTreeMap<u8, PwmError>,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `attach` fail for `pin`
    pub fn refuse(&mut self, pin: u8, error: PwmError) {
        self.refused.insert(pin, error);
    }

    /// Currently attached pins in attach order
    pub fn attached(&self) -> Vec<u8> {
        self.attached.clone()
    }

    /// Last level written to `pin` since the last reset
    pub fn level(&self, pin: u8) -> Option<u16> {
        self.levels.get(&pin).copied()
    }
}

impl PwmDriver for MockPwm {
    fn attach(&mut self, pin: u8, top: u16) -> Result<(), PwmError> {
        if let Some(&e) = self.refused.get(&pin) {
            return Err(e);
        }
        if self.attached.contains(&pin) {
            return Err(PwmError::ChannelInUse);
        }
        self.attached.push(pin);
        self.events.push(PwmEvent::Attach(pin, top));
        Ok(())
    }

    fn detach(&mut self, pin: u8) {
        self.attached.retain(|&p| p != pin);
        self.levels.remove(&pin);
        self.events.push(PwmEvent::Detach(pin));
    }

    fn reset(&mut self) {
        self.attached.clear();
        self.levels.clear();
        self.events.push(PwmEvent::Reset);
    }

    fn set_level(&mut self, pin: u8, level: u16) {
        self.levels.insert(pin, level);
        self.events.push(PwmEvent::Level(pin, level));
    }
}
