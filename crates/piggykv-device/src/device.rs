//! Opcode dispatch: the device model behind the transport seam.
//!
//! Implements [`Transport`] directly so the host client runs against it
//! in-process, exercising the exact frame sequences real hardware sees.
//! A flat key index stands in for LSM insertion, which is out of scope;
//! lookups and round trips behave identically either way.

use crate::media::{MemMedia, PageMedia};
use crate::session::{CompletedValue, Decoder};
use crate::vlog::{ValueLocation, ValueLog, VlogConfig};
use piggykv_core::frame::{CommandFrame, DW_LOOKUP_KEY};
use piggykv_core::transport::{
    Completion, Transport, STATUS_NO_SUCH_KEY, STATUS_PROTOCOL_ERROR, STATUS_UNSUPPORTED_OPCODE,
};
use piggykv_core::{Error, Opcode, Result};
use rustc_hash::FxHashMap;

/// Device-side configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// DMA page size in bytes. Must match the host's and be a power of two.
    pub page_size: usize,
    /// Value-log geometry.
    pub vlog: VlogConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { page_size: 4096, vlog: VlogConfig::default() }
    }
}

impl DeviceConfig {
    /// Validate internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() {
            return Err(Error::InvalidInput(format!(
                "page_size {} is not a power of two",
                self.page_size
            )));
        }
        self.vlog.validate(self.page_size)
    }
}

/// The device model: value log, frame decoder, and key index.
#[derive(Debug)]
pub struct KvDevice<M: PageMedia> {
    vlog: ValueLog<M>,
    decoder: Decoder,
    index: FxHashMap<u32, ValueLocation>,
    page_size: usize,
}

impl KvDevice<MemMedia> {
    /// A device over in-memory media with default geometry.
    #[must_use]
    pub fn in_memory() -> Self {
        match Self::new(MemMedia::new(), DeviceConfig::default()) {
            Ok(device) => device,
            Err(_) => unreachable!("default device config is valid"),
        }
    }
}

impl<M: PageMedia> KvDevice<M> {
    /// Create a device over `media`.
    pub fn new(media: M, config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            vlog: ValueLog::new(media, config.vlog, config.page_size)?,
            decoder: Decoder::new(),
            index: FxHashMap::default(),
            page_size: config.page_size,
        })
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Fold a decoder outcome into a completion, indexing finished
    /// values and downgrading protocol violations to an error status
    /// (the host sees a rejected command, not a broken transport).
    fn complete_write(&mut self, outcome: Result<Option<CompletedValue>>) -> Result<Completion> {
        match outcome {
            Ok(Some(value)) => {
                tracing::debug!(
                    key = value.key.as_u32(),
                    unit = value.location.unit,
                    offset = value.location.offset,
                    len = value.location.len,
                    "value stored"
                );
                self.index.insert(value.key.as_u32(), value.location);
                Ok(Completion::ok(0))
            }
            Ok(None) => Ok(Completion::ok(0)),
            Err(Error::ProtocolViolation(msg)) => {
                tracing::warn!(%msg, "rejecting write-class frame");
                Ok(Completion::error(STATUS_PROTOCOL_ERROR))
            }
            Err(other) => Err(other),
        }
    }

    fn lookup(&self, frame: &CommandFrame, data: &mut [u8]) -> Result<Completion> {
        let key = frame.dwords[DW_LOOKUP_KEY];
        let Some(location) = self.index.get(&key) else {
            return Ok(Completion::error(STATUS_NO_SUCH_KEY));
        };
        let value = self.vlog.read(*location)?;
        if value.len() > data.len() {
            tracing::warn!(key, len = value.len(), "read buffer too small for value");
            return Ok(Completion::error(STATUS_PROTOCOL_ERROR));
        }
        data[..value.len()].copy_from_slice(&value);
        Ok(Completion::ok(value.len() as u32))
    }

    fn remove(&mut self, frame: &CommandFrame) -> Completion {
        let key = frame.dwords[DW_LOOKUP_KEY];
        if self.index.remove(&key).is_some() {
            Completion::ok(0)
        } else {
            Completion::error(STATUS_NO_SUCH_KEY)
        }
    }
}

impl<M: PageMedia> Transport for KvDevice<M> {
    fn submit(&mut self, frame: &CommandFrame, data: &mut [u8]) -> Result<Completion> {
        match frame.opcode {
            Opcode::Put => {
                let outcome =
                    self.decoder
                        .decode_paged_frame(&mut self.vlog, frame, data, self.page_size);
                self.complete_write(outcome)
            }
            Opcode::PiggybackWrite => {
                let outcome = self.decoder.decode_write_frame(&mut self.vlog, frame);
                self.complete_write(outcome)
            }
            Opcode::PiggybackTransfer => {
                let outcome = self.decoder.decode_transfer_frame(&mut self.vlog, frame);
                self.complete_write(outcome)
            }
            Opcode::Get => self.lookup(frame, data),
            Opcode::Delete => Ok(self.remove(frame)),
            Opcode::Report => {
                let units = u32::try_from(self.vlog.units_consumed()).unwrap_or(u32::MAX);
                Ok(Completion::ok(units))
            }
            Opcode::IterCreate | Opcode::IterSeek | Opcode::IterNext | Opcode::IterDestroy => {
                tracing::warn!(opcode = ?frame.opcode, "native iterators not implemented");
                Ok(Completion::error(STATUS_UNSUPPORTED_OPCODE))
            }
        }
    }
}
