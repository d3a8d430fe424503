//! Adaptive piggyback value transfer for key/value storage devices.
//!
//! Facade crate re-exporting the host side ([`piggykv_core`]) and the
//! device model ([`piggykv_device`]). Small values ride inside command
//! dwords, large values go via page-granular DMA, and values in between
//! split across both; the host picks the mode per value.
//!
//! # Example
//!
//! ```
//! use piggykv::{KvClient, KvDevice, Key, TransferConfig};
//!
//! let client = KvClient::new(KvDevice::in_memory(), TransferConfig::default()).unwrap();
//! client.put(Key::from(42), &vec![7u8; 10_000]).unwrap();
//! assert_eq!(client.get(Key::from(42)).unwrap().unwrap(), vec![7u8; 10_000]);
//! ```

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]

pub use piggykv_core::{
    ClientStats, CommandFrame, Completion, Error, IterId, Key, KvClient, LatencySnapshot, OpKind,
    Opcode, Report, Result, StatsSnapshot, TransferConfig, TransferMode, Transport,
};
pub use piggykv_device::{DeviceConfig, KvDevice, MemMedia, PageMedia, VlogConfig};

#[cfg(target_os = "linux")]
pub use piggykv_core::nvme::PassthruTransport;
