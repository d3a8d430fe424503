//! Device-side model for adaptive piggyback value transfer.
//!
//! Reimplements the firmware's receive path as a library: a value-log
//! buffer manager, a frame decoder with single-session transfer state,
//! and an opcode dispatcher that implements the host's `Transport`
//! trait. The same code serves as the in-process test double for the
//! host client and as a reference for real firmware behavior.
//!
//! # Example
//!
//! ```
//! use piggykv_core::{KvClient, Key, TransferConfig};
//! use piggykv_device::KvDevice;
//!
//! let client = KvClient::new(KvDevice::in_memory(), TransferConfig::default()).unwrap();
//! client.put(Key::from(1), b"round trip").unwrap();
//! assert_eq!(client.get(Key::from(1)).unwrap().unwrap(), b"round trip");
//! ```

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod device;
pub mod media;
mod session;
pub mod vlog;

pub use device::{DeviceConfig, KvDevice};
pub use media::{MemMedia, PageMedia};
pub use session::{CompletedValue, Decoder};
pub use vlog::{ValueLocation, ValueLog, VlogConfig};
