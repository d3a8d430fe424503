//! Command frame layout and payload slot packing.
//!
//! A frame models the command dwords of one submission queue entry.
//! Metadata and payload occupy fixed dword slots; the slot order is part
//! of the wire contract and must match on both sides byte for byte.

use crate::{Error, Result};

/// A fixed 4-byte lookup key.
///
/// Keys are opaque comparison tokens on the wire. The iterator emulation
/// layer additionally interprets them as little-endian unsigned integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub [u8; 4]);

impl Key {
    /// Key length on the wire, in bytes.
    pub const LEN: u32 = 4;

    /// The key as a little-endian integer.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl From<u32> for Key {
    fn from(v: u32) -> Self {
        Self(v.to_le_bytes())
    }
}

impl From<[u8; 4]> for Key {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

/// Command opcodes.
///
/// Wire values live in the vendor IO opcode space and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Store a value via page-granular DMA (optionally combined with
    /// trailing piggyback Transfer frames).
    Put = 0xA0,
    /// Point lookup.
    Get = 0xA1,
    /// Point delete.
    Delete = 0xA2,
    /// Create a device-native iterator.
    IterCreate = 0xA3,
    /// Seek a device-native iterator.
    IterSeek = 0xA4,
    /// Advance a device-native iterator.
    IterNext = 0xA5,
    /// Destroy a device-native iterator.
    IterDestroy = 0xA6,
    /// First frame of a piggyback-only value transfer (carries key and
    /// length metadata plus leading payload bytes in command fields).
    PiggybackWrite = 0xA7,
    /// Read the device's cumulative value-log consumption.
    Report = 0xA8,
    /// Continuation frame carrying payload bytes only.
    PiggybackTransfer = 0xA9,
}

impl Opcode {
    /// All opcodes, in wire-value order. Used for stats indexing.
    pub const ALL: [Opcode; 10] = [
        Opcode::Put,
        Opcode::Get,
        Opcode::Delete,
        Opcode::IterCreate,
        Opcode::IterSeek,
        Opcode::IterNext,
        Opcode::IterDestroy,
        Opcode::PiggybackWrite,
        Opcode::Report,
        Opcode::PiggybackTransfer,
    ];

    /// Stable index of this opcode in [`Opcode::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        (self as u8 - 0xA0) as usize
    }

    /// True for the two frame kinds that carry payload in command fields.
    #[must_use]
    pub fn is_piggyback(self) -> bool {
        matches!(self, Opcode::PiggybackWrite | Opcode::PiggybackTransfer)
    }
}

/// Dword index carrying the key on Put/PiggybackWrite frames.
pub const DW_KEY: usize = 2;
/// Dword index carrying the key length on Put/PiggybackWrite frames.
pub const DW_KEY_LEN: usize = 3;
/// Dword index carrying the value length.
pub const DW_VALUE_LEN: usize = 10;
/// Dword index carrying the lookup key on Get/Delete/IterSeek frames.
pub const DW_LOOKUP_KEY: usize = 10;
/// Dword index carrying the zero-based page count of the DMA buffer.
pub const DW_NLB: usize = 12;
/// Dword index carrying the iterator id on iterator frames.
pub const DW_ITER_ID: usize = 13;

/// Payload slot order for a PiggybackWrite frame.
///
/// dw2/dw3 hold the key, dw10 the value length; dw14/dw15 stay reserved
/// for wider keys. The two 8-byte fields (dw4_5, dw6_7) behave as two
/// 4-byte slots each in piggyback mode.
pub const WRITE_PAYLOAD_SLOTS: &[usize] = &[4, 5, 6, 7, 8, 9, 11, 12, 13];

/// Payload slot order for a PiggybackTransfer frame: every dword is payload.
pub const TRANSFER_PAYLOAD_SLOTS: &[usize] =
    &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Payload capacity of a PiggybackWrite frame, in bytes.
pub const WRITE_PAYLOAD_BYTES: usize = WRITE_PAYLOAD_SLOTS.len() * 4;

/// Payload capacity of a PiggybackTransfer frame, in bytes.
pub const TRANSFER_PAYLOAD_BYTES: usize = TRANSFER_PAYLOAD_SLOTS.len() * 4;

/// One command frame: an opcode plus dwords 0..=15.
///
/// Dwords 0 and 1 belong to the transport header and are never touched
/// here; indices follow the submission queue entry numbering so the
/// layout reads the same as the device handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Command opcode.
    pub opcode: Opcode,
    /// Command dwords, indexed by SQE dword number.
    pub dwords: [u32; 16],
}

impl CommandFrame {
    /// Create a zeroed frame for the given opcode.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, dwords: [0; 16] }
    }

    /// Pack as many leading bytes of `src` as fit into the given payload
    /// slots, in slot order, 4 bytes per slot little-endian. Returns the
    /// number of bytes consumed.
    pub fn pack_payload(&mut self, slots: &[usize], src: &[u8]) -> usize {
        let mut pos = 0;
        for &slot in slots {
            if pos >= src.len() {
                break;
            }
            let take = (src.len() - pos).min(4);
            let mut word = [0u8; 4];
            word[..take].copy_from_slice(&src[pos..pos + take]);
            self.dwords[slot] = u32::from_le_bytes(word);
            pos += take;
        }
        pos
    }

    /// Unpack up to `len` payload bytes from the given slots, in slot
    /// order, appending them to `dst`. Returns the number of bytes read.
    pub fn unpack_payload(&self, slots: &[usize], len: usize, dst: &mut Vec<u8>) -> usize {
        let mut pos = 0;
        for &slot in slots {
            if pos >= len {
                break;
            }
            let take = (len - pos).min(4);
            dst.extend_from_slice(&self.dwords[slot].to_le_bytes()[..take]);
            pos += take;
        }
        pos
    }

    /// The key carried in dw2 of Put/PiggybackWrite frames.
    #[must_use]
    pub fn key(&self) -> Key {
        Key(self.dwords[DW_KEY].to_le_bytes())
    }

    /// The value length carried in dw10.
    #[must_use]
    pub fn value_len(&self) -> u32 {
        self.dwords[DW_VALUE_LEN]
    }

    /// Validate the declared key length of a write-class frame.
    pub fn check_key_len(&self) -> Result<()> {
        let kl = self.dwords[DW_KEY_LEN];
        if kl != Key::LEN {
            return Err(Error::ProtocolViolation(format!(
                "unsupported key length {kl}, expected {}",
                Key::LEN
            )));
        }
        Ok(())
    }
}
