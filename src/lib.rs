//! Geometry bridge between a managed front-end and a native engine
//!
//! Geometric entities (vectors, point arrays, meshes, integer/double arrays)
//! are encoded into a FlatBuffers-compatible wire format, passed across a C
//! ABI and rebuilt on the far side. Buffers returned by the native side are
//! copied once and released once through the ownership protocol.
//!
//! # Module Structure
//! - `geometry` - Vec2/Vec3 and the polygon mesh
//! - `wire` - Wire schema, builder and bounds-checked reader
//! - `codec` - Entity <-> buffer encode/decode, tagged envelope
//! - `ownership` - Buffer ownership protocol (consumer handle, producer registry)
//! - `platform` - Native library loading and entry-point resolution
//! - `ffi` - Exported C ABI (pass-through engine)
//! - `service` - Round trips through the resolved engine
//! - `diagnostics` - Logger setup and bounded diagnostic log
//! - `config` - Bridge configuration
//! - `error` - Error types

pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ffi;
pub mod geometry;
pub mod ownership;
pub mod platform;
pub mod service;
pub mod wire;

// Re-export key types for convenience
pub use codec::{decode, decode_any, encode, encode_with, EncodeOptions, Payload, WireFormat, WirePayload};
pub use config::BridgeConfig;
pub use diagnostics::{init_logging, DiagnosticLog};
pub use error::{BridgeError, WireError};
pub use geometry::{Mesh, Vec2, Vec3};
pub use platform::EntryPoints;
pub use service::RoundTripService;
pub use wire::PayloadKind;
