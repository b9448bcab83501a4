//! Encode/decode between geometry entities and wire buffers
//!
//! The default shape is the tagged envelope: a `GeoWrapper` root table whose
//! type tag names the payload table that follows. The flat shape (payload
//! table as root, no tag) is what older native builds expect and is only
//! used when configured.
//!
//! Decoding never panics. Absent fields fall back to their documented
//! defaults (zero vector, empty sequence); anything structurally wrong comes
//! back as a `WireError`.
//!
//! # Submodules
//! - `payloads` - `WirePayload` impls for every entity type
//! - `envelope` - Tag-dispatched decoding into `Payload`

mod payloads;
mod envelope;

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::wire::{root_table, slots, PayloadKind, Table, WOffset, WireBuilder};

pub use envelope::{
    decode_any,
    peek_kind,
    Payload,
};

/// Smallest builder allocation, enough for any single-vector payload header
pub const DEFAULT_BUILDER_CAPACITY: usize = 1024;

/// Envelope-wrapped or flat per-entity root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Envelope,
    Flat,
}

/// Knobs that change what `encode_with` emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Fan-triangulate mesh quads before writing them
    pub triangulate: bool,
    /// Lower bound for the builder's first allocation; never affects output
    pub min_capacity: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            triangulate: false,
            min_capacity: DEFAULT_BUILDER_CAPACITY,
        }
    }
}

impl EncodeOptions {
    pub fn triangulated() -> Self {
        Self { triangulate: true, ..Self::default() }
    }
}

/// An entity with a payload table in the wire schema
pub trait WirePayload: Sized + Default {
    const KIND: PayloadKind;

    /// Write the payload table and return its offset
    fn write_table(&self, builder: &mut WireBuilder, options: &EncodeOptions) -> WOffset;

    /// Rebuild the entity from its payload table
    fn read_table(table: Table<'_>) -> Result<Self, WireError>;

    /// Upper estimate of the encoded size, used to size the builder
    fn size_hint(&self) -> usize {
        64
    }
}

fn new_builder<T: WirePayload>(value: &T, options: &EncodeOptions) -> WireBuilder {
    WireBuilder::new(value.size_hint().max(options.min_capacity))
}

/// Encode inside the tagged envelope
pub fn encode<T: WirePayload>(value: &T) -> Vec<u8> {
    encode_with(value, &EncodeOptions::default())
}

pub fn encode_with<T: WirePayload>(value: &T, options: &EncodeOptions) -> Vec<u8> {
    let mut builder = new_builder(value, options);
    let payload = value.write_table(&mut builder, options);
    let root = write_envelope(&mut builder, T::KIND, Some(payload));
    builder.finish(root)
}

pub(crate) fn write_envelope(builder: &mut WireBuilder, kind: PayloadKind, payload: Option<WOffset>) -> WOffset {
    builder.start_table();
    builder.add_field_u8(slots::WRAPPER_DATA_TYPE, kind.tag());
    if let Some(payload) = payload {
        builder.add_field_offset(slots::WRAPPER_DATA, payload);
    }
    builder.end_table()
}

/// Decode an envelope, insisting that its tag names `T`'s payload.
/// A zero-length buffer decodes to `T::default()`.
pub fn decode<T: WirePayload>(bytes: &[u8]) -> Result<T, WireError> {
    if bytes.is_empty() {
        return Ok(T::default());
    }
    let wrapper = root_table(bytes)?;
    let found = PayloadKind::from_tag(wrapper.read_u8(slots::WRAPPER_DATA_TYPE)?.unwrap_or(0))?;
    if found != T::KIND {
        return Err(WireError::TypeTagMismatch { expected: T::KIND, found });
    }
    match wrapper.read_table(slots::WRAPPER_DATA)? {
        Some(table) => T::read_table(table),
        None => Ok(T::default()),
    }
}

/// Encode with the payload table as root (legacy shape, no type tag)
pub fn encode_flat<T: WirePayload>(value: &T) -> Vec<u8> {
    encode_flat_with(value, &EncodeOptions::default())
}

pub fn encode_flat_with<T: WirePayload>(value: &T, options: &EncodeOptions) -> Vec<u8> {
    let mut builder = new_builder(value, options);
    let root = value.write_table(&mut builder, options);
    builder.finish(root)
}

/// Decode a flat buffer. The shape carries no tag, so the caller's `T` is
/// trusted.
pub fn decode_flat<T: WirePayload>(bytes: &[u8]) -> Result<T, WireError> {
    if bytes.is_empty() {
        return Ok(T::default());
    }
    T::read_table(root_table(bytes)?)
}

pub fn encode_as<T: WirePayload>(format: WireFormat, value: &T, options: &EncodeOptions) -> Vec<u8> {
    match format {
        WireFormat::Envelope => encode_with(value, options),
        WireFormat::Flat => encode_flat_with(value, options),
    }
}

pub fn decode_as<T: WirePayload>(format: WireFormat, bytes: &[u8]) -> Result<T, WireError> {
    match format {
        WireFormat::Envelope => decode(bytes),
        WireFormat::Flat => decode_flat(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Mesh, Vec3};

    #[test]
    fn test_decode_checks_type_tag() {
        let bytes = encode(&Vec3::new(1.0, 2.0, 3.0));
        let err = decode::<Vec<i32>>(&bytes).unwrap_err();
        assert_eq!(
            err,
            WireError::TypeTagMismatch {
                expected: PayloadKind::IntArrayData,
                found: PayloadKind::PointData,
            }
        );
    }

    #[test]
    fn test_empty_buffer_decodes_to_default() {
        assert_eq!(decode::<Vec3>(&[]).unwrap(), Vec3::ZERO);
        assert_eq!(decode::<Mesh>(&[]).unwrap(), Mesh::default());
        assert!(decode_flat::<Vec<f64>>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_envelope_without_payload_decodes_to_default() {
        let mut builder = WireBuilder::new(64);
        let root = write_envelope(&mut builder, PayloadKind::PointData, None);
        let bytes = builder.finish(root);
        assert_eq!(decode::<Vec3>(&bytes).unwrap(), Vec3::ZERO);
    }

    #[test]
    fn test_encode_is_deterministic_across_capacities() {
        let points: Vec<Vec3> = (0..100).map(|i| Vec3::new(i as f64, 0.5, -1.0)).collect();
        let small = encode_with(&points, &EncodeOptions { triangulate: false, min_capacity: 16 });
        let large = encode_with(&points, &EncodeOptions { triangulate: false, min_capacity: 1 << 16 });
        assert_eq!(small, large);
    }

    #[test]
    fn test_flat_and_envelope_differ_but_both_round_trip() {
        let points = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)];
        let flat = encode_as(WireFormat::Flat, &points, &EncodeOptions::default());
        let wrapped = encode_as(WireFormat::Envelope, &points, &EncodeOptions::default());
        assert_ne!(flat, wrapped);
        assert_eq!(decode_as::<Vec<Vec3>>(WireFormat::Flat, &flat).unwrap(), points);
        assert_eq!(decode_as::<Vec<Vec3>>(WireFormat::Envelope, &wrapped).unwrap(), points);
    }
}
