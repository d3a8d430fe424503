//! NVMe passthru transport (Linux).
//!
//! Submits frames through the kernel's IO passthru ioctl on a namespace
//! block device. Piggyback frames repurpose the metadata/data pointer and
//! length fields of the passthru structure as four extra payload dwords,
//! so the kernel never sees them as buffer addresses.

use crate::frame::CommandFrame;
use crate::transport::{Completion, Transport};
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Mirror of the kernel's `struct nvme_passthru_cmd`. Field order and
/// width are ABI.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct PassthruCmd {
    opcode: u8,
    flags: u8,
    rsvd1: u16,
    nsid: u32,
    cdw2: u32,
    cdw3: u32,
    metadata: u64,
    addr: u64,
    metadata_len: u32,
    data_len: u32,
    cdw10: u32,
    cdw11: u32,
    cdw12: u32,
    cdw13: u32,
    cdw14: u32,
    cdw15: u32,
    timeout_ms: u32,
    result: u32,
}

const _: () = assert!(mem::size_of::<PassthruCmd>() == 72);

const fn iowr(ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    // _IOWR: dir = read|write = 3.
    (3 << 30) | ((size as libc::c_ulong) << 16) | ((ty as libc::c_ulong) << 8) | nr as libc::c_ulong
}

const NVME_IOCTL_IO_CMD: libc::c_ulong = iowr(b'N', 0x43, mem::size_of::<PassthruCmd>());

/// Transport over an NVMe namespace device node (`/dev/nvme0n1`).
pub struct PassthruTransport {
    file: File,
    nsid: u32,
    timeout_ms: u32,
}

impl PassthruTransport {
    /// Open a namespace device for command submission.
    pub fn open(path: impl AsRef<Path>, nsid: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map_err(|e| Error::Transport(format!("open {}: {e}", path.as_ref().display())))?;
        Ok(Self { file, nsid, timeout_ms: 0 })
    }

    /// Set a per-command timeout in milliseconds (0 = driver default).
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn encode(&self, frame: &CommandFrame, data: &mut [u8]) -> PassthruCmd {
        let mut cmd = PassthruCmd {
            opcode: frame.opcode as u8,
            nsid: self.nsid,
            cdw2: frame.dwords[2],
            cdw3: frame.dwords[3],
            cdw10: frame.dwords[10],
            cdw11: frame.dwords[11],
            cdw12: frame.dwords[12],
            cdw13: frame.dwords[13],
            cdw14: frame.dwords[14],
            cdw15: frame.dwords[15],
            timeout_ms: self.timeout_ms,
            ..PassthruCmd::default()
        };
        if frame.opcode.is_piggyback() {
            cmd.metadata = u64::from(frame.dwords[4]) | (u64::from(frame.dwords[5]) << 32);
            cmd.addr = u64::from(frame.dwords[6]) | (u64::from(frame.dwords[7]) << 32);
            cmd.metadata_len = frame.dwords[8];
            cmd.data_len = frame.dwords[9];
        } else if !data.is_empty() {
            cmd.addr = data.as_mut_ptr() as u64;
            cmd.data_len = data.len() as u32;
        }
        cmd
    }
}

impl Transport for PassthruTransport {
    fn submit(&mut self, frame: &CommandFrame, data: &mut [u8]) -> Result<Completion> {
        let mut cmd = self.encode(frame, data);
        // Safety: cmd is a properly initialized passthru structure and any
        // buffer address it carries stays alive across the blocking ioctl.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), NVME_IOCTL_IO_CMD, &mut cmd) };
        if rc < 0 {
            return Err(Error::Transport(format!(
                "passthru ioctl: {}",
                io::Error::last_os_error()
            )));
        }
        Ok(Completion { status: rc as u32, result: cmd.result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Opcode, TRANSFER_PAYLOAD_SLOTS};
    use std::fs::OpenOptions;

    fn transport() -> PassthruTransport {
        let file = OpenOptions::new().read(true).open("/dev/null").unwrap();
        PassthruTransport { file, nsid: 1, timeout_ms: 0 }
    }

    #[test]
    fn test_ioctl_number() {
        // _IOWR('N', 0x43, 72-byte struct)
        assert_eq!(NVME_IOCTL_IO_CMD, 0xC048_4E43);
    }

    #[test]
    fn test_piggyback_payload_rides_in_pointer_fields() {
        let mut frame = CommandFrame::new(Opcode::PiggybackTransfer);
        let data: Vec<u8> = (0u8..56).collect();
        frame.pack_payload(TRANSFER_PAYLOAD_SLOTS, &data);

        let cmd = transport().encode(&frame, &mut []);
        assert_eq!(cmd.metadata, u64::from(frame.dwords[4]) | (u64::from(frame.dwords[5]) << 32));
        assert_eq!(cmd.addr, u64::from(frame.dwords[6]) | (u64::from(frame.dwords[7]) << 32));
        assert_eq!(cmd.metadata_len, frame.dwords[8]);
        assert_eq!(cmd.data_len, frame.dwords[9]);
        assert_eq!(cmd.cdw10, frame.dwords[10]);
        assert_eq!(cmd.cdw15, frame.dwords[15]);
    }

    #[test]
    fn test_dma_opcode_maps_buffer_address() {
        let frame = CommandFrame::new(Opcode::Get);
        let mut buf = vec![0u8; 4096];
        let expected = buf.as_mut_ptr() as u64;

        let cmd = transport().encode(&frame, &mut buf);
        assert_eq!(cmd.addr, expected);
        assert_eq!(cmd.data_len, 4096);
        assert_eq!(cmd.metadata, 0);
    }

    #[test]
    fn test_empty_buffer_leaves_pointers_clear() {
        let cmd = transport().encode(&CommandFrame::new(Opcode::Report), &mut []);
        assert_eq!(cmd.addr, 0);
        assert_eq!(cmd.data_len, 0);
    }
}
