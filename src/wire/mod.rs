//! Wire schema for buffers exchanged with the native engine
//!
//! The layout is FlatBuffers-compatible: a buffer starts with a 32-bit
//! offset to its root table, tables reach their fields through a vtable,
//! vectors carry a 32-bit count ahead of their elements, and all numbers are
//! little-endian.
//!
//! # Submodules
//! - `schema` - Payload tags, field slots and inline struct layouts
//! - `builder` - Back-to-front buffer builder
//! - `reader` - Bounds-checked table/vector access

mod schema;
mod builder;
mod reader;

pub use schema::{
    PayloadKind,
    WireStruct,
    slots,
};

pub use builder::{
    WireBuilder,
    WOffset,
};

pub use reader::{
    root_table,
    Table,
    Vector,
};
