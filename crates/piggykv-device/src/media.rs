//! Write-back media behind the value log.
//!
//! The value log seals fixed-size entries and eventually evicts them
//! here. Real firmware would program NAND pages; the library ships an
//! in-memory implementation so the device model is fully testable.

use piggykv_core::{Error, Result};
use rustc_hash::FxHashMap;

/// Opaque write-back target for sealed value-log entries.
pub trait PageMedia: Send {
    /// Persist one sealed entry under its unit number.
    fn write_back(&mut self, unit: u64, bytes: &[u8]) -> Result<()>;

    /// Read a previously written entry back in full.
    fn read_back(&self, unit: u64) -> Result<Vec<u8>>;
}

/// In-memory media: a map from unit number to entry bytes.
#[derive(Debug, Default)]
pub struct MemMedia {
    units: FxHashMap<u64, Vec<u8>>,
}

impl MemMedia {
    /// Create empty media.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries written back so far.
    #[must_use]
    pub fn written_units(&self) -> usize {
        self.units.len()
    }
}

impl PageMedia for MemMedia {
    fn write_back(&mut self, unit: u64, bytes: &[u8]) -> Result<()> {
        self.units.insert(unit, bytes.to_vec());
        Ok(())
    }

    fn read_back(&self, unit: u64) -> Result<Vec<u8>> {
        self.units.get(&unit).cloned().ok_or_else(|| {
            Error::ProtocolViolation(format!("value log unit {unit} missing from media"))
        })
    }
}
