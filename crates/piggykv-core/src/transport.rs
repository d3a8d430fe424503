//! Command transport seam.
//!
//! The [`Transport`] trait is the single boundary between the encoder
//! and whatever actually carries frames: the real passthru ioctl path
//! or the in-process device model used as a test double.

use crate::frame::CommandFrame;
use crate::stats::ClientStats;
use crate::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Instant;

/// Completion status meaning "no such key" (a normal negative outcome).
pub const STATUS_NO_SUCH_KEY: u32 = 0x7C1;

/// Completion status reported for a protocol violation (e.g. a Transfer
/// frame with no active session).
pub const STATUS_PROTOCOL_ERROR: u32 = 0x7C2;

/// Completion status for an opcode the device does not implement.
pub const STATUS_UNSUPPORTED_OPCODE: u32 = 0x01;

/// Result of one frame submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Status word; 0 means success.
    pub status: u32,
    /// Command-specific result (value length, iterator id, unit count).
    pub result: u32,
}

impl Completion {
    /// A successful completion carrying `result`.
    #[must_use]
    pub fn ok(result: u32) -> Self {
        Self { status: 0, result }
    }

    /// A failed completion with the given status.
    #[must_use]
    pub fn error(status: u32) -> Self {
        Self { status, result: 0 }
    }

    /// True when the device reported success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 0
    }

    /// True when the device reported the no-such-key sentinel.
    #[must_use]
    pub fn is_no_such_key(&self) -> bool {
        self.status == STATUS_NO_SUCH_KEY
    }
}

/// A synchronous command transport.
///
/// `data` is the DMA buffer attached to the frame: written by the caller
/// for store opcodes, filled by the device for read opcodes. Piggyback
/// frames pass an empty slice.
pub trait Transport: Send {
    /// Submit one frame and wait for its completion.
    fn submit(&mut self, frame: &CommandFrame, data: &mut [u8]) -> Result<Completion>;
}

/// Serializing wrapper around a transport.
///
/// All submissions funnel through one mutex so concurrent callers cannot
/// interleave frames, and every submission is timed per opcode.
pub struct CommandIssuer<T: Transport> {
    inner: Mutex<T>,
    stats: Arc<ClientStats>,
}

impl<T: Transport> CommandIssuer<T> {
    /// Wrap a transport.
    pub fn new(transport: T, stats: Arc<ClientStats>) -> Self {
        Self { inner: Mutex::new(transport), stats }
    }

    /// Submit a single self-contained frame.
    pub fn submit(&self, frame: &CommandFrame, data: &mut [u8]) -> Result<Completion> {
        let mut transport = self.inner.lock();
        timed_submit(&mut *transport, &self.stats, frame, data)
    }

    /// Begin a multi-frame transfer.
    ///
    /// The returned guard holds the transport lock for the whole frame
    /// sequence, so frames of one logical value transfer can never
    /// interleave with another caller's frames.
    pub fn begin_transfer(&self) -> TransferGuard<'_, T> {
        TransferGuard { transport: self.inner.lock(), stats: &self.stats }
    }
}

/// Exclusive transport access for the duration of one frame sequence.
pub struct TransferGuard<'a, T: Transport> {
    transport: MutexGuard<'a, T>,
    stats: &'a ClientStats,
}

impl<T: Transport> TransferGuard<'_, T> {
    /// Submit the next frame of the sequence.
    pub fn submit(&mut self, frame: &CommandFrame, data: &mut [u8]) -> Result<Completion> {
        timed_submit(&mut *self.transport, self.stats, frame, data)
    }
}

fn timed_submit<T: Transport>(
    transport: &mut T,
    stats: &ClientStats,
    frame: &CommandFrame,
    data: &mut [u8],
) -> Result<Completion> {
    let start = Instant::now();
    let completion = transport.submit(frame, data)?;
    stats.record_submit(frame.opcode, start.elapsed());
    tracing::trace!(
        opcode = ?frame.opcode,
        status = completion.status,
        result = completion.result,
        "frame completed"
    );
    Ok(completion)
}

/// Convert a completion into an error unless the device reported success.
pub fn expect_ok(completion: Completion) -> Result<Completion> {
    if completion.is_ok() {
        Ok(completion)
    } else {
        Err(Error::DeviceRejected { status: completion.status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CommandFrame, Opcode};

    /// Transport double that fakes success and records opcodes.
    struct FakeTransport {
        seen: Vec<Opcode>,
    }

    impl Transport for FakeTransport {
        fn submit(&mut self, frame: &CommandFrame, _data: &mut [u8]) -> Result<Completion> {
            self.seen.push(frame.opcode);
            Ok(Completion::ok(7))
        }
    }

    #[test]
    fn test_issuer_records_per_opcode_latency() {
        let stats = Arc::new(ClientStats::new());
        let issuer = CommandIssuer::new(FakeTransport { seen: Vec::new() }, Arc::clone(&stats));

        let frame = CommandFrame::new(Opcode::Get);
        let completion = issuer.submit(&frame, &mut []).unwrap();
        assert_eq!(completion.result, 7);

        let snap = stats.snapshot();
        let get = snap
            .opcodes
            .iter()
            .find(|(op, _)| *op == Opcode::Get)
            .map(|(_, s)| *s)
            .unwrap();
        assert_eq!(get.count, 1);
    }

    #[test]
    fn test_transfer_guard_submits_in_order() {
        let stats = Arc::new(ClientStats::new());
        let issuer = CommandIssuer::new(FakeTransport { seen: Vec::new() }, stats);

        let mut guard = issuer.begin_transfer();
        guard
            .submit(&CommandFrame::new(Opcode::PiggybackWrite), &mut [])
            .unwrap();
        guard
            .submit(&CommandFrame::new(Opcode::PiggybackTransfer), &mut [])
            .unwrap();
        drop(guard);

        let transport = issuer.inner.lock();
        assert_eq!(
            transport.seen,
            vec![Opcode::PiggybackWrite, Opcode::PiggybackTransfer]
        );
    }

    #[test]
    fn test_expect_ok_maps_nonzero_status() {
        let err = expect_ok(Completion::error(0x42)).unwrap_err();
        assert!(matches!(err, Error::DeviceRejected { status: 0x42 }));
        assert!(expect_ok(Completion::ok(0)).is_ok());
    }

    #[test]
    fn test_no_such_key_sentinel() {
        let completion = Completion::error(STATUS_NO_SUCH_KEY);
        assert!(completion.is_no_such_key());
        assert!(!completion.is_ok());
    }
}
