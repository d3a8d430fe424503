//! Error types for piggykv-core.

use thiserror::Error;

/// Errors that can occur during transfer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying command transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The device completed the command with a nonzero status.
    #[error("device rejected command: status {status:#x}")]
    DeviceRejected {
        /// Completion status word reported by the device.
        status: u32,
    },

    /// No matching key was found (a normal negative outcome for
    /// iterator seek/next; point lookups report absence as `Ok(None)`).
    #[error("no such key")]
    NotFound,

    /// A frame violated the transfer protocol (e.g. a Transfer frame
    /// arrived with no active session, or byte accounting went wrong).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A staging buffer could not be allocated before any frame was sent.
    #[error("resource exhausted: cannot allocate {needed} byte staging buffer")]
    ResourceExhausted {
        /// Bytes that could not be allocated.
        needed: usize,
    },

    /// Input or configuration is invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The iterator id is not registered (already destroyed or never created).
    #[error("unknown iterator id {0}")]
    UnknownIterator(u32),
}

/// Result type for transfer operations.
pub type Result<T> = std::result::Result<T, Error>;
