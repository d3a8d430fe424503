//! Host-side adaptive piggyback value transfer for key/value devices.
//!
//! Small values travel inside command dwords (piggyback), large values go
//! out via page-granular DMA, and values in between split across both.
//! The mode is selected per value from [`TransferConfig`] thresholds.
//!
//! # Example
//!
//! ```
//! use piggykv_core::{KvClient, Key, TransferConfig, Transport, CommandFrame, Completion};
//!
//! struct NullTransport;
//! impl Transport for NullTransport {
//!     fn submit(
//!         &mut self,
//!         _frame: &CommandFrame,
//!         _data: &mut [u8],
//!     ) -> piggykv_core::Result<Completion> {
//!         Ok(Completion::ok(0))
//!     }
//! }
//!
//! let client = KvClient::new(NullTransport, TransferConfig::default()).unwrap();
//! client.put(Key::from(7), b"small values ride in command fields").unwrap();
//! ```

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod client;
pub mod config;
mod error;
pub mod frame;
mod iter;
#[cfg(target_os = "linux")]
pub mod nvme;
pub mod stats;
pub mod transport;

pub use client::{KvClient, Report};
pub use config::{TransferConfig, TransferMode};
pub use error::{Error, Result};
pub use frame::{CommandFrame, Key, Opcode};
pub use iter::{IterId, IterTable};
pub use stats::{ClientStats, LatencySnapshot, OpKind, StatsSnapshot};
pub use transport::{Completion, Transport};
