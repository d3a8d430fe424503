//! Value-log buffer manager.
//!
//! Values accumulate in a fixed ring of entry buffers. The active entry
//! takes byte-granular appends (piggybacked bytes) and page-aligned
//! appends (DMA units). When an entry cannot hold what comes next it is
//! sealed and a fresh one opened; sealed entries stay in the ring until
//! FIFO eviction writes them back to media.
//!
//! Entry layout guarantees reads never have to stitch scattered
//! fragments: a value's bytes are contiguous in (unit, offset) space,
//! wrapping only at an entry boundary.

use crate::media::PageMedia;
use piggykv_core::{Error, Result};
use std::collections::VecDeque;

/// Value-log geometry.
#[derive(Debug, Clone)]
pub struct VlogConfig {
    /// Bytes per entry buffer.
    pub entry_capacity: usize,
    /// Sealed entries kept in memory before FIFO eviction to media.
    pub ring_size: usize,
}

impl Default for VlogConfig {
    fn default() -> Self {
        Self { entry_capacity: 16 * 1024, ring_size: 8 }
    }
}

impl VlogConfig {
    /// Validate geometry against the device page size.
    pub fn validate(&self, page_size: usize) -> Result<()> {
        if self.entry_capacity == 0 || self.entry_capacity % page_size != 0 {
            return Err(Error::InvalidInput(format!(
                "entry_capacity {} is not a multiple of page size {page_size}",
                self.entry_capacity
            )));
        }
        if self.ring_size == 0 {
            return Err(Error::InvalidInput("ring_size must be nonzero".into()));
        }
        Ok(())
    }
}

/// Where a stored value lives in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLocation {
    /// Entry unit number of the first byte.
    pub unit: u64,
    /// Byte offset of the first byte within that entry.
    pub offset: u32,
    /// Value length in bytes.
    pub len: u32,
}

/// The value log: one active entry plus a ring of sealed entries.
#[derive(Debug)]
pub struct ValueLog<M: PageMedia> {
    media: M,
    config: VlogConfig,
    active: Vec<u8>,
    cursor: usize,
    unit: u64,
    ring: VecDeque<(u64, Vec<u8>)>,
}

impl<M: PageMedia> ValueLog<M> {
    /// Create an empty log over `media`.
    pub fn new(media: M, config: VlogConfig, page_size: usize) -> Result<Self> {
        config.validate(page_size)?;
        let active = vec![0; config.entry_capacity];
        Ok(Self { media, config, active, cursor: 0, unit: 0, ring: VecDeque::new() })
    }

    /// Free bytes left in the active entry.
    #[must_use]
    pub fn space(&self) -> usize {
        self.config.entry_capacity - self.cursor
    }

    /// Entries the log has opened so far (the space-amplification
    /// signal reported to the host).
    #[must_use]
    pub fn units_consumed(&self) -> u64 {
        self.unit + u64::from(self.cursor > 0)
    }

    /// Ensure the active entry can hold `needed` contiguous bytes,
    /// sealing it first when it cannot.
    ///
    /// This is the whole-value window rule: a transfer reserves room for
    /// everything still outstanding before its first byte lands, so a
    /// value's piggybacked bytes never straddle a seal mid-stream.
    pub fn reserve(&mut self, needed: usize) -> Result<()> {
        if needed > self.config.entry_capacity {
            return Err(Error::ResourceExhausted { needed });
        }
        if needed > self.space() {
            self.seal()?;
        }
        Ok(())
    }

    /// Append bytes at the cursor. The caller must have reserved room.
    pub fn append(&mut self, bytes: &[u8]) -> Result<ValueLocation> {
        if bytes.len() > self.space() {
            return Err(Error::ProtocolViolation(format!(
                "append of {} bytes overruns entry with {} free",
                bytes.len(),
                self.space()
            )));
        }
        let location = ValueLocation {
            unit: self.unit,
            offset: self.cursor as u32,
            len: bytes.len() as u32,
        };
        self.active[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
        Ok(location)
    }

    /// Append one DMA unit at the next page-aligned offset, sealing the
    /// entry first if the unit does not fit. `chunk` is at most one page
    /// (a short final chunk packs the tail tightly).
    pub fn append_page(&mut self, chunk: &[u8], page_size: usize) -> Result<ValueLocation> {
        let aligned = self.cursor.div_ceil(page_size) * page_size;
        if aligned + chunk.len() > self.config.entry_capacity {
            self.seal()?;
        } else {
            self.cursor = aligned;
        }
        self.append(chunk)
    }

    /// Seal the active entry into the ring and open a fresh one,
    /// evicting the oldest sealed entry to media when the ring is full.
    pub fn seal(&mut self) -> Result<()> {
        let capacity = self.config.entry_capacity;
        let sealed = std::mem::replace(&mut self.active, vec![0; capacity]);
        self.ring.push_back((self.unit, sealed));
        tracing::debug!(unit = self.unit, "sealed value log entry");
        if self.ring.len() > self.config.ring_size {
            if let Some((unit, bytes)) = self.ring.pop_front() {
                tracing::debug!(unit, "evicting value log entry to media");
                self.media.write_back(unit, &bytes)?;
            }
        }
        self.unit += 1;
        self.cursor = 0;
        Ok(())
    }

    /// Read a stored value back, walking entry boundaries as needed.
    pub fn read(&self, location: ValueLocation) -> Result<Vec<u8>> {
        let capacity = self.config.entry_capacity;
        let mut out = Vec::with_capacity(location.len as usize);
        let mut unit = location.unit;
        let mut offset = location.offset as usize;
        let mut remaining = location.len as usize;
        while remaining > 0 {
            let take = remaining.min(capacity - offset);
            self.with_entry(unit, |bytes| {
                out.extend_from_slice(&bytes[offset..offset + take]);
            })?;
            remaining -= take;
            unit += 1;
            offset = 0;
        }
        Ok(out)
    }

    fn with_entry(&self, unit: u64, mut f: impl FnMut(&[u8])) -> Result<()> {
        if unit == self.unit {
            f(&self.active);
            return Ok(());
        }
        if let Some((_, bytes)) = self.ring.iter().find(|(u, _)| *u == unit) {
            f(bytes);
            return Ok(());
        }
        let bytes = self.media.read_back(unit)?;
        f(&bytes);
        Ok(())
    }
}
