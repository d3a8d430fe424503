//! Transfer session state and frame decoding.
//!
//! A value that spans several frames opens a session on its first frame;
//! continuation frames append into the window that frame reserved. The
//! device holds at most one session, and a continuation frame with no
//! session to attach to is a protocol violation.

use crate::media::PageMedia;
use crate::vlog::{ValueLog, ValueLocation};
use piggykv_core::frame::{
    CommandFrame, Key, TRANSFER_PAYLOAD_BYTES, TRANSFER_PAYLOAD_SLOTS, WRITE_PAYLOAD_BYTES,
    WRITE_PAYLOAD_SLOTS,
};
use piggykv_core::{Error, Result};

/// A fully received value, ready for index insertion.
#[derive(Debug, Clone, Copy)]
pub struct CompletedValue {
    /// The value's key.
    pub key: Key,
    /// Where the value's bytes live in the log.
    pub location: ValueLocation,
}

#[derive(Debug)]
struct Session {
    key: Key,
    total: u32,
    received: u32,
    start: ValueLocation,
}

/// Decodes incoming write-class frames into value-log placements.
#[derive(Debug, Default)]
pub struct Decoder {
    session: Option<Session>,
}

impl Decoder {
    /// Create a decoder with no active session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a multi-frame transfer is in progress.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Decode a piggyback Write frame: key and length metadata plus the
    /// leading payload bytes. Reserves a window for the whole value so
    /// its bytes stay contiguous within one entry.
    pub fn decode_write_frame<M: PageMedia>(
        &mut self,
        vlog: &mut ValueLog<M>,
        frame: &CommandFrame,
    ) -> Result<Option<CompletedValue>> {
        if self.session.is_some() {
            return Err(Error::ProtocolViolation(
                "write frame while a transfer is in progress".into(),
            ));
        }
        frame.check_key_len()?;
        let total = frame.value_len() as usize;

        let mut payload = Vec::with_capacity(WRITE_PAYLOAD_BYTES);
        frame.unpack_payload(WRITE_PAYLOAD_SLOTS, total.min(WRITE_PAYLOAD_BYTES), &mut payload);

        vlog.reserve(total)?;
        let first = vlog.append(&payload)?;
        let location = ValueLocation { unit: first.unit, offset: first.offset, len: total as u32 };

        self.finish_or_park(frame.key(), total as u32, payload.len() as u32, location)
    }

    /// Decode a Transfer continuation frame into the current session.
    pub fn decode_transfer_frame<M: PageMedia>(
        &mut self,
        vlog: &mut ValueLog<M>,
        frame: &CommandFrame,
    ) -> Result<Option<CompletedValue>> {
        let session = self.session.as_mut().ok_or_else(|| {
            Error::ProtocolViolation("transfer frame with no active session".into())
        })?;

        let remaining = (session.total - session.received) as usize;
        let take = remaining.min(TRANSFER_PAYLOAD_BYTES);
        let mut payload = Vec::with_capacity(take);
        frame.unpack_payload(TRANSFER_PAYLOAD_SLOTS, take, &mut payload);

        vlog.append(&payload)?;
        session.received += take as u32;

        if session.received == session.total {
            let done = self.session.take().map(|s| CompletedValue {
                key: s.key,
                location: s.start,
            });
            tracing::debug!("transfer session complete");
            return Ok(done);
        }
        Ok(None)
    }

    /// Decode a paged Put frame: `data` holds whole DMA pages. In
    /// combined mode the declared value length exceeds the buffer and a
    /// session stays open for the piggybacked tail.
    pub fn decode_paged_frame<M: PageMedia>(
        &mut self,
        vlog: &mut ValueLog<M>,
        frame: &CommandFrame,
        data: &[u8],
        page_size: usize,
    ) -> Result<Option<CompletedValue>> {
        if self.session.is_some() {
            return Err(Error::ProtocolViolation(
                "paged frame while a transfer is in progress".into(),
            ));
        }
        frame.check_key_len()?;
        let total = frame.value_len() as usize;
        if data.is_empty() || data.len() % page_size != 0 {
            return Err(Error::ProtocolViolation(format!(
                "paged frame buffer of {} bytes is not whole pages",
                data.len()
            )));
        }
        if total == 0 {
            return Err(Error::ProtocolViolation(
                "paged frame with zero-length value".into(),
            ));
        }

        // A short final chunk packs only the value's tail bytes, keeping
        // the cursor tight; padding pages never occupy log space.
        let consumed = total.min(data.len());
        let mut chunk = consumed.min(page_size);
        let start = vlog.append_page(&data[..chunk], page_size)?;
        let mut pos = chunk;
        while pos < consumed {
            chunk = (consumed - pos).min(page_size);
            vlog.append_page(&data[pos..pos + chunk], page_size)?;
            pos += chunk;
        }
        let location = ValueLocation { unit: start.unit, offset: start.offset, len: total as u32 };

        if consumed < total {
            // Window for the piggybacked tail before the first Transfer
            // frame arrives.
            vlog.reserve(total - consumed)?;
        }
        self.finish_or_park(frame.key(), total as u32, consumed as u32, location)
    }

    fn finish_or_park(
        &mut self,
        key: Key,
        total: u32,
        received: u32,
        start: ValueLocation,
    ) -> Result<Option<CompletedValue>> {
        if received == total {
            return Ok(Some(CompletedValue { key, location: start }));
        }
        tracing::debug!(key = key.as_u32(), total, received, "transfer session opened");
        self.session = Some(Session { key, total, received, start });
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MemMedia;
    use crate::vlog::VlogConfig;
    use piggykv_core::frame::{DW_KEY, DW_KEY_LEN, DW_VALUE_LEN};
    use piggykv_core::Opcode;

    const PAGE: usize = 4096;

    fn vlog() -> ValueLog<MemMedia> {
        ValueLog::new(MemMedia::new(), VlogConfig::default(), PAGE).unwrap()
    }

    fn write_frame(key: u32, value: &[u8]) -> (CommandFrame, usize) {
        let mut frame = CommandFrame::new(Opcode::PiggybackWrite);
        frame.dwords[DW_KEY] = key;
        frame.dwords[DW_KEY_LEN] = 4;
        frame.dwords[DW_VALUE_LEN] = value.len() as u32;
        let packed = frame.pack_payload(WRITE_PAYLOAD_SLOTS, value);
        (frame, packed)
    }

    fn transfer_frame(rest: &[u8]) -> (CommandFrame, usize) {
        let mut frame = CommandFrame::new(Opcode::PiggybackTransfer);
        let packed = frame.pack_payload(TRANSFER_PAYLOAD_SLOTS, rest);
        (frame, packed)
    }

    fn put_frame(key: u32, total: usize) -> CommandFrame {
        let mut frame = CommandFrame::new(Opcode::Put);
        frame.dwords[DW_KEY] = key;
        frame.dwords[DW_KEY_LEN] = 4;
        frame.dwords[DW_VALUE_LEN] = total as u32;
        frame
    }

    #[test]
    fn test_single_frame_value_completes_immediately() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        let (frame, _) = write_frame(1, b"tiny");

        let done = decoder.decode_write_frame(&mut vlog, &frame).unwrap().unwrap();
        assert_eq!(done.key.as_u32(), 1);
        assert_eq!(vlog.read(done.location).unwrap(), b"tiny");
        assert!(!decoder.has_session());
    }

    #[test]
    fn test_multi_frame_value_reassembles() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        let value: Vec<u8> = (0..100u8).collect();

        let (frame, mut pos) = write_frame(2, &value);
        assert!(decoder.decode_write_frame(&mut vlog, &frame).unwrap().is_none());
        assert!(decoder.has_session());

        let mut done = None;
        while pos < value.len() {
            let (frame, packed) = transfer_frame(&value[pos..]);
            pos += packed;
            done = decoder.decode_transfer_frame(&mut vlog, &frame).unwrap();
        }
        let done = done.unwrap();
        assert_eq!(vlog.read(done.location).unwrap(), value);
    }

    #[test]
    fn test_transfer_without_session_is_a_violation() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        let (frame, _) = transfer_frame(&[1, 2, 3]);
        assert!(matches!(
            decoder.decode_transfer_frame(&mut vlog, &frame),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_write_during_session_is_a_violation() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        let (frame, _) = write_frame(3, &[0; 200]);
        decoder.decode_write_frame(&mut vlog, &frame).unwrap();

        let (second, _) = write_frame(4, b"x");
        assert!(matches!(
            decoder.decode_write_frame(&mut vlog, &second),
            Err(Error::ProtocolViolation(_))
        ));
        // The open session survives a rejected frame.
        assert!(decoder.has_session());
    }

    #[test]
    fn test_zero_length_value() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        let (frame, _) = write_frame(5, &[]);
        let done = decoder.decode_write_frame(&mut vlog, &frame).unwrap().unwrap();
        assert_eq!(done.location.len, 0);
        assert_eq!(vlog.read(done.location).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_paged_value_with_padded_tail() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        // 200-byte value in one padded page unit.
        let mut data = vec![0u8; PAGE];
        data[..200].copy_from_slice(&[9; 200]);

        let frame = put_frame(6, 200);
        let done = decoder
            .decode_paged_frame(&mut vlog, &frame, &data, PAGE)
            .unwrap()
            .unwrap();
        assert_eq!(vlog.read(done.location).unwrap(), vec![9; 200]);
        // Only the value tail advanced the cursor, not the padding.
        assert_eq!(vlog.space(), VlogConfig::default().entry_capacity - 200);
    }

    #[test]
    fn test_combined_value_pages_then_tail() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        let value: Vec<u8> = (0..(2 * PAGE + 200)).map(|i| (i % 251) as u8).collect();

        let frame = put_frame(7, value.len());
        let parked = decoder
            .decode_paged_frame(&mut vlog, &frame, &value[..2 * PAGE], PAGE)
            .unwrap();
        assert!(parked.is_none());

        let mut pos = 2 * PAGE;
        let mut done = None;
        while pos < value.len() {
            let (frame, packed) = transfer_frame(&value[pos..]);
            pos += packed;
            done = decoder.decode_transfer_frame(&mut vlog, &frame).unwrap();
        }
        assert_eq!(vlog.read(done.unwrap().location).unwrap(), value);
    }

    #[test]
    fn test_paged_frame_requires_whole_pages() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();
        let frame = put_frame(8, 100);
        assert!(matches!(
            decoder.decode_paged_frame(&mut vlog, &frame, &[0; 100], PAGE),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_full_entry_forces_fresh_window_for_next_value() {
        let mut vlog = vlog();
        let mut decoder = Decoder::new();

        // Fill most of the first entry.
        let big = vec![1u8; 16000];
        let (frame, mut pos) = write_frame(9, &big);
        decoder.decode_write_frame(&mut vlog, &frame).unwrap();
        while pos < big.len() {
            let (frame, packed) = transfer_frame(&big[pos..]);
            pos += packed;
            decoder.decode_transfer_frame(&mut vlog, &frame).unwrap();
        }

        // 36 bytes still fit in the 348 free bytes of unit 0.
        let (frame, _) = write_frame(10, &[2; 36]);
        let done = decoder.decode_write_frame(&mut vlog, &frame).unwrap().unwrap();
        assert_eq!(done.location.unit, 0);

        let next = vec![3u8; 500];
        let (frame, mut pos) = write_frame(11, &next);
        assert!(decoder.decode_write_frame(&mut vlog, &frame).unwrap().is_none());
        while pos < next.len() {
            let (frame, packed) = transfer_frame(&next[pos..]);
            pos += packed;
            if let Some(done) = decoder.decode_transfer_frame(&mut vlog, &frame).unwrap() {
                assert_eq!(done.location.unit, 1);
                assert_eq!(done.location.offset, 0);
                assert_eq!(vlog.read(done.location).unwrap(), next);
            }
        }
    }
}
