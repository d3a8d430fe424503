//! Host-side key/value client: transfer-mode selection and frame encoding.

use crate::config::{TransferConfig, TransferMode};
use crate::frame::{
    CommandFrame, Key, Opcode, DW_KEY, DW_KEY_LEN, DW_LOOKUP_KEY, DW_NLB, DW_VALUE_LEN,
    TRANSFER_PAYLOAD_SLOTS, WRITE_PAYLOAD_SLOTS,
};
use crate::iter::{IterId, IterTable};
use crate::stats::{ClientStats, OpKind, StatsSnapshot};
use crate::transport::{expect_ok, CommandIssuer, Transport};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Aggregate report: device-side value-log consumption plus the host's
/// latency counters.
#[derive(Debug, Clone)]
pub struct Report {
    /// Cumulative value-log units consumed by the device (advisory
    /// space-amplification signal).
    pub log_units: u32,
    /// Host latency counters at the time of the report.
    pub stats: StatsSnapshot,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        writeln!(f, "value log units consumed: {}", self.log_units)
    }
}

/// Key/value client over a command transport.
///
/// Values travel either inside command fields (piggyback), via
/// page-granular DMA, or split across both, selected per value from the
/// configured thresholds. All transport access is serialized internally,
/// so the client is safe to share across threads.
pub struct KvClient<T: Transport> {
    issuer: CommandIssuer<T>,
    config: TransferConfig,
    iters: IterTable,
    stats: Arc<ClientStats>,
}

impl<T: Transport> KvClient<T> {
    /// Create a client over `transport` after validating `config`.
    pub fn new(transport: T, config: TransferConfig) -> Result<Self> {
        config.validate()?;
        let stats = Arc::new(ClientStats::new());
        Ok(Self {
            issuer: CommandIssuer::new(transport, Arc::clone(&stats)),
            config,
            iters: IterTable::new(),
            stats,
        })
    }

    /// The active transfer configuration.
    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Snapshot of the latency counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Store `value` under `key`.
    ///
    /// The whole frame sequence for one value is submitted under a single
    /// transport lock; there is no abort path once the first frame went
    /// out (a documented protocol limitation).
    pub fn put(&self, key: Key, value: &[u8]) -> Result<()> {
        self.timed(OpKind::Put, |client| client.put_inner(key, value))
    }

    /// Fetch the value stored under `key`, or `None` if absent.
    pub fn get(&self, key: Key) -> Result<Option<Vec<u8>>> {
        self.timed(OpKind::Get, |client| client.get_inner(key))
    }

    /// Delete `key`. Returns whether the key existed.
    pub fn delete(&self, key: Key) -> Result<bool> {
        self.timed(OpKind::Delete, |client| {
            let mut frame = CommandFrame::new(Opcode::Delete);
            frame.dwords[DW_LOOKUP_KEY] = key.as_u32();
            let completion = client.issuer.submit(&frame, &mut [])?;
            if completion.is_no_such_key() {
                return Ok(false);
            }
            expect_ok(completion)?;
            Ok(true)
        })
    }

    /// Create an emulated iterator.
    pub fn create_iter(&self) -> Result<IterId> {
        self.timed(OpKind::CreateIter, |client| Ok(client.iters.create()))
    }

    /// Destroy an emulated iterator.
    pub fn destroy_iter(&self, iter: IterId) -> Result<()> {
        self.timed(OpKind::DestroyIter, |client| client.iters.destroy(iter))
    }

    /// Position `iter` at the first present key at or after `key`
    /// (treating keys as dense little-endian integers) and return its
    /// value. Fails with [`Error::NotFound`] once the probe bound is
    /// exhausted.
    pub fn seek(&self, iter: IterId, key: Key) -> Result<Vec<u8>> {
        self.timed(OpKind::Seek, |client| {
            client.probe_from(iter, key.as_u32(), OpKind::Seek)
        })
    }

    /// Advance `iter` to the next present key and return its value.
    pub fn next(&self, iter: IterId) -> Result<Vec<u8>> {
        self.timed(OpKind::Next, |client| {
            let cursor = client.iters.cursor(iter)?;
            let start = cursor.checked_add(1).ok_or(Error::NotFound)?;
            client.probe_from(iter, start, OpKind::Next)
        })
    }

    /// Fetch the device's cumulative value-log consumption together with
    /// the host latency counters.
    pub fn report(&self) -> Result<Report> {
        let frame = CommandFrame::new(Opcode::Report);
        let completion = expect_ok(self.issuer.submit(&frame, &mut [])?)?;
        Ok(Report { log_units: completion.result, stats: self.stats.snapshot() })
    }

    fn timed<R>(&self, op: OpKind, body: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let start = Instant::now();
        let result = body(self);
        self.stats.record_op(op, start.elapsed());
        result
    }

    fn put_inner(&self, key: Key, value: &[u8]) -> Result<()> {
        if value.len() > self.config.max_transfer_size as usize {
            return Err(Error::InvalidInput(format!(
                "value of {} bytes exceeds max transfer size {}",
                value.len(),
                self.config.max_transfer_size
            )));
        }
        let mode = self.config.mode_for(value.len());
        tracing::debug!(key = key.as_u32(), len = value.len(), ?mode, "put");
        match mode {
            TransferMode::PiggybackOnly => self.put_piggyback(key, value),
            TransferMode::PageOnly => self.put_paged(key, value),
            TransferMode::Combined => self.put_combined(key, value),
        }
    }

    /// Piggyback-only: one Write frame with leading bytes, then Transfer
    /// frames until the value is fully consumed. A zero-length value is
    /// a single metadata-only Write frame.
    fn put_piggyback(&self, key: Key, value: &[u8]) -> Result<()> {
        let mut frame = CommandFrame::new(Opcode::PiggybackWrite);
        Self::write_metadata(&mut frame, key, value.len());
        let mut pos = frame.pack_payload(WRITE_PAYLOAD_SLOTS, value);

        let mut guard = self.issuer.begin_transfer();
        expect_ok(guard.submit(&frame, &mut [])?)?;
        while pos < value.len() {
            let mut transfer = CommandFrame::new(Opcode::PiggybackTransfer);
            pos += transfer.pack_payload(TRANSFER_PAYLOAD_SLOTS, &value[pos..]);
            expect_ok(guard.submit(&transfer, &mut [])?)?;
        }
        Ok(())
    }

    /// Page-only: one Put frame whose DMA buffer covers the whole value,
    /// rounded up to at least one full page.
    fn put_paged(&self, key: Key, value: &[u8]) -> Result<()> {
        let staged_len = self.config.page_round_up(value.len());
        let mut staging = self.stage(value, staged_len)?;

        let mut frame = CommandFrame::new(Opcode::Put);
        Self::write_metadata(&mut frame, key, value.len());
        frame.dwords[DW_NLB] = self.nlb(value.len());

        let mut guard = self.issuer.begin_transfer();
        expect_ok(guard.submit(&frame, &mut staging)?)?;
        Ok(())
    }

    /// Combined: the page-aligned prefix goes out with the Put frame's
    /// DMA buffer, the remainder follows in Transfer frames.
    fn put_combined(&self, key: Key, value: &[u8]) -> Result<()> {
        let prp_len = self.config.prp_len(value.len());
        debug_assert!(prp_len > 0 && prp_len < value.len());
        let mut staging = self.stage(&value[..prp_len], prp_len)?;

        let mut frame = CommandFrame::new(Opcode::Put);
        Self::write_metadata(&mut frame, key, value.len());
        frame.dwords[DW_NLB] = self.nlb(value.len());

        let mut guard = self.issuer.begin_transfer();
        expect_ok(guard.submit(&frame, &mut staging)?)?;

        let mut pos = prp_len;
        while pos < value.len() {
            let mut transfer = CommandFrame::new(Opcode::PiggybackTransfer);
            pos += transfer.pack_payload(TRANSFER_PAYLOAD_SLOTS, &value[pos..]);
            expect_ok(guard.submit(&transfer, &mut [])?)?;
        }
        Ok(())
    }

    fn get_inner(&self, key: Key) -> Result<Option<Vec<u8>>> {
        let mut data = self.read_buffer()?;
        let mut frame = CommandFrame::new(Opcode::Get);
        frame.dwords[DW_LOOKUP_KEY] = key.as_u32();
        frame.dwords[DW_NLB] = self.nlb(data.len());

        let completion = self.issuer.submit(&frame, &mut data)?;
        if completion.is_no_such_key() {
            return Ok(None);
        }
        let completion = expect_ok(completion)?;
        let len = completion.result as usize;
        if len > data.len() {
            return Err(Error::ProtocolViolation(format!(
                "device reported {len} value bytes, read buffer holds {}",
                data.len()
            )));
        }
        data.truncate(len);
        Ok(Some(data))
    }

    fn probe_from(&self, iter: IterId, start: u32, kind: OpKind) -> Result<Vec<u8>> {
        // Validate the id before issuing any lookup.
        self.iters.cursor(iter)?;

        let mut cursor = start;
        for _ in 0..self.config.probe_limit {
            match kind {
                OpKind::Seek => self.stats.count_probe_for_seek(),
                _ => self.stats.count_probe_for_next(),
            }
            if let Some(value) = self.get_inner(Key::from(cursor))? {
                self.iters.set_cursor(iter, cursor)?;
                return Ok(value);
            }
            cursor = match cursor.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
        Err(Error::NotFound)
    }

    fn write_metadata(frame: &mut CommandFrame, key: Key, len: usize) {
        frame.dwords[DW_KEY] = key.as_u32();
        frame.dwords[DW_KEY_LEN] = Key::LEN;
        frame.dwords[DW_VALUE_LEN] = len as u32;
    }

    fn nlb(&self, len: usize) -> u32 {
        if len == 0 {
            return 0;
        }
        0xFFFF & ((len as u32 - 1) / self.config.page_size)
    }

    /// Page-padded staging copy of `value`, allocated before any frame
    /// is sent so allocation failure cannot leave a partial transfer.
    fn stage(&self, value: &[u8], staged_len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(staged_len)
            .map_err(|_| Error::ResourceExhausted { needed: staged_len })?;
        buf.resize(staged_len, 0);
        buf[..value.len()].copy_from_slice(value);
        Ok(buf)
    }

    fn read_buffer(&self) -> Result<Vec<u8>> {
        let len = self.config.max_transfer_size as usize;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| Error::ResourceExhausted { needed: len })?;
        buf.resize(len, 0);
        Ok(buf)
    }
}
