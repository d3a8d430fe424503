//! Transfer thresholds and mode selection.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a value's bytes travel to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Page-granular DMA only.
    PageOnly,
    /// Command-field piggybacking only.
    PiggybackOnly,
    /// Page-aligned bulk via DMA, non-aligned remainder piggybacked.
    Combined,
}

/// Runtime transfer configuration.
///
/// Host and device must agree on `page_size` and `combined`; the rest is
/// host-side policy. A smaller `adaptive_threshold` routes more values
/// through the combined path, trading frames-per-value for latency on
/// small values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Largest value (bytes) the piggyback-only path accepts. Values at
    /// or below `adaptive_threshold` always satisfy this bound.
    pub piggyback_max: u32,
    /// Values of this many bytes or fewer go piggyback-only; larger
    /// values use the paged (or combined) path.
    pub adaptive_threshold: u32,
    /// DMA page size in bytes. Must be a power of two.
    pub page_size: u32,
    /// Largest value accepted at all (transport MDTS).
    pub max_transfer_size: u32,
    /// Whether large values split the non-page-aligned tail into
    /// piggyback Transfer frames instead of padding a final DMA page.
    pub combined: bool,
    /// Consecutive probe misses before iterator emulation reports
    /// `NotFound`.
    pub probe_limit: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            piggyback_max: 16 * 1024,
            adaptive_threshold: 127,
            page_size: 4096,
            max_transfer_size: 512 * 1024,
            combined: true,
            probe_limit: 4096,
        }
    }
}

impl TransferConfig {
    /// Validate internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() {
            return Err(Error::InvalidInput(format!(
                "page_size {} is not a power of two",
                self.page_size
            )));
        }
        if self.adaptive_threshold > self.piggyback_max {
            return Err(Error::InvalidInput(format!(
                "adaptive_threshold {} exceeds piggyback_max {}",
                self.adaptive_threshold, self.piggyback_max
            )));
        }
        if self.max_transfer_size < self.page_size {
            return Err(Error::InvalidInput(format!(
                "max_transfer_size {} below page_size {}",
                self.max_transfer_size, self.page_size
            )));
        }
        if self.probe_limit == 0 {
            return Err(Error::InvalidInput("probe_limit must be nonzero".into()));
        }
        Ok(())
    }

    /// Select the transfer mode for a value of `len` bytes.
    ///
    /// An exact page multiple degenerates to `PageOnly` even with
    /// combining enabled, as does a value smaller than one page (which
    /// still transfers one full page unit). Both sides of the wire rely
    /// on this exact boundary rule.
    #[must_use]
    pub fn mode_for(&self, len: usize) -> TransferMode {
        if len <= self.adaptive_threshold as usize {
            return TransferMode::PiggybackOnly;
        }
        if !self.combined {
            return TransferMode::PageOnly;
        }
        let prp_len = self.prp_len(len);
        if prp_len == 0 || prp_len == len {
            TransferMode::PageOnly
        } else {
            TransferMode::Combined
        }
    }

    /// Page-aligned byte count carried by DMA in combined mode.
    #[must_use]
    pub fn prp_len(&self, len: usize) -> usize {
        (len / self.page_size as usize) * self.page_size as usize
    }

    /// Round `len` up to a whole number of pages (at least one).
    #[must_use]
    pub fn page_round_up(&self, len: usize) -> usize {
        let page = self.page_size as usize;
        let pages = len.div_ceil(page).max(1);
        pages * page
    }
}
