//! Buffer ownership protocol across the foreign-function boundary
//!
//! `Unowned -> OwnedByProducer -> Transferred -> OwnedByConsumer -> Freed`.
//! The consumer copies a transferred buffer exactly once and releases it
//! exactly once; a null pointer or non-positive size means "no buffer" and
//! triggers neither.
//!
//! # Submodules
//! - `handle` - Consumer-side `NativeBuffer` and copy helpers
//! - `registry` - Producer-side registry of handed-out buffers

mod handle;
pub mod registry;

pub use handle::{
    copy_and_release,
    copy_foreign,
    BufferState,
    NativeBuffer,
    ProtocolViolation,
    ReleaseFn,
};

pub use registry::ProducedBuffer;
