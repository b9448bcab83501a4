//! Error taxonomy for the bridge
//!
//! `WireError` covers everything the decoder can find wrong with a buffer.
//! `BridgeError` is what a round trip through the native engine can report.
//! Nothing here ever crosses the C ABI; the exported functions turn these
//! into null pointers and `false` flags.

use thiserror::Error;

use crate::ownership::ProtocolViolation;
use crate::wire::PayloadKind;

/// Structural problems found while reading a wire buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("buffer truncated: need {needed} bytes at offset {offset}, buffer has {len}")]
    Truncated { offset: usize, needed: usize, len: usize },

    #[error("offset {offset} points outside a buffer of {len} bytes")]
    OutOfBounds { offset: i64, len: usize },

    #[error("offset {offset} is not aligned to {align} bytes")]
    MisalignedOffset { offset: usize, align: usize },

    #[error("invalid vtable at {offset}: {reason}")]
    InvalidVtable { offset: usize, reason: &'static str },

    #[error("unknown payload type tag {0}")]
    UnknownTypeTag(u8),

    #[error("expected {expected:?} payload, envelope carries {found:?}")]
    TypeTagMismatch { expected: PayloadKind, found: PayloadKind },

    #[error("face {face} references vertex {index}, mesh has {vertex_count} vertices")]
    FaceIndexOutOfRange { face: usize, index: i32, vertex_count: usize },
}

/// Failures of a call across the native boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The native side reported failure or returned a null output pointer
    #[error("native call `{entry}` produced no buffer")]
    AllocationFailure { entry: &'static str },

    /// The native side reported a zero or negative size
    #[error("native call `{entry}` reported invalid size {size}")]
    SizeMismatch { entry: &'static str, size: i64 },

    #[error("malformed buffer: {0}")]
    MalformedBuffer(#[from] WireError),

    #[error("entry point `{0}` is not available in the resolved library")]
    MissingEntryPoint(&'static str),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}

impl BridgeError {
    /// Failures that degrade to an empty/default entity
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::AllocationFailure { .. } | BridgeError::SizeMismatch { .. }
        )
    }
}
