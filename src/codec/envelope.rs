//! Tag-dispatched decoding of envelopes whose payload type is not known
//! up front

use serde::Serialize;

use super::{write_envelope, EncodeOptions, WirePayload};
use crate::error::WireError;
use crate::geometry::{Mesh, Vec2, Vec3};
use crate::wire::{root_table, slots, PayloadKind, Table, WireBuilder};

/// Any entity an envelope can carry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data")]
pub enum Payload {
    None,
    Point(Vec3),
    PointArray(Vec<Vec3>),
    Mesh(Mesh),
    IntArray(Vec<i32>),
    DoubleArray(Vec<f64>),
    IntPairArray(Vec<(i32, i32)>),
    DoublePairArray(Vec<(f64, f64)>),
    NestedIntArray(Vec<Vec<i32>>),
    Point2(Vec2),
    Point2Array(Vec<Vec2>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::None => PayloadKind::None,
            Payload::Point(_) => PayloadKind::PointData,
            Payload::PointArray(_) => PayloadKind::PointArrayData,
            Payload::Mesh(_) => PayloadKind::MeshData,
            Payload::IntArray(_) => PayloadKind::IntArrayData,
            Payload::DoubleArray(_) => PayloadKind::DoubleArrayData,
            Payload::IntPairArray(_) => PayloadKind::IntPairArrayData,
            Payload::DoublePairArray(_) => PayloadKind::DoublePairArrayData,
            Payload::NestedIntArray(_) => PayloadKind::NestedIntArrayData,
            Payload::Point2(_) => PayloadKind::Point2Data,
            Payload::Point2Array(_) => PayloadKind::Point2ArrayData,
        }
    }

    /// Number of top-level elements (1 for single points, vertices for meshes)
    pub fn element_count(&self) -> usize {
        match self {
            Payload::None => 0,
            Payload::Point(_) | Payload::Point2(_) => 1,
            Payload::PointArray(v) => v.len(),
            Payload::Mesh(m) => m.vertex_count(),
            Payload::IntArray(v) => v.len(),
            Payload::DoubleArray(v) => v.len(),
            Payload::IntPairArray(v) => v.len(),
            Payload::DoublePairArray(v) => v.len(),
            Payload::NestedIntArray(v) => v.len(),
            Payload::Point2Array(v) => v.len(),
        }
    }

    /// Encode inside the envelope. `Payload::None` produces an envelope with
    /// tag 0 and no data field.
    pub fn encode(&self, options: &EncodeOptions) -> Vec<u8> {
        match self {
            Payload::None => {
                let mut builder = WireBuilder::new(options.min_capacity);
                let root = write_envelope(&mut builder, PayloadKind::None, None);
                builder.finish(root)
            }
            Payload::Point(v) => super::encode_with(v, options),
            Payload::PointArray(v) => super::encode_with(v, options),
            Payload::Mesh(m) => super::encode_with(m, options),
            Payload::IntArray(v) => super::encode_with(v, options),
            Payload::DoubleArray(v) => super::encode_with(v, options),
            Payload::IntPairArray(v) => super::encode_with(v, options),
            Payload::DoublePairArray(v) => super::encode_with(v, options),
            Payload::NestedIntArray(v) => super::encode_with(v, options),
            Payload::Point2(v) => super::encode_with(v, options),
            Payload::Point2Array(v) => super::encode_with(v, options),
        }
    }
}

fn read_or_default<T: WirePayload>(table: Option<Table<'_>>) -> Result<T, WireError> {
    match table {
        Some(table) => T::read_table(table),
        None => Ok(T::default()),
    }
}

/// Payload kind named by an envelope's tag, without decoding the payload
pub fn peek_kind(bytes: &[u8]) -> Result<PayloadKind, WireError> {
    if bytes.is_empty() {
        return Ok(PayloadKind::None);
    }
    let wrapper = root_table(bytes)?;
    PayloadKind::from_tag(wrapper.read_u8(slots::WRAPPER_DATA_TYPE)?.unwrap_or(0))
}

/// Decode whatever the envelope's tag names
pub fn decode_any(bytes: &[u8]) -> Result<Payload, WireError> {
    if bytes.is_empty() {
        return Ok(Payload::None);
    }
    let wrapper = root_table(bytes)?;
    let kind = PayloadKind::from_tag(wrapper.read_u8(slots::WRAPPER_DATA_TYPE)?.unwrap_or(0))?;
    if kind == PayloadKind::None {
        return Ok(Payload::None);
    }
    let data = wrapper.read_table(slots::WRAPPER_DATA)?;

    Ok(match kind {
        PayloadKind::None => Payload::None,
        PayloadKind::PointData => Payload::Point(read_or_default(data)?),
        PayloadKind::PointArrayData => Payload::PointArray(read_or_default(data)?),
        PayloadKind::MeshData => Payload::Mesh(read_or_default(data)?),
        PayloadKind::IntArrayData => Payload::IntArray(read_or_default(data)?),
        PayloadKind::DoubleArrayData => Payload::DoubleArray(read_or_default(data)?),
        PayloadKind::IntPairArrayData => Payload::IntPairArray(read_or_default(data)?),
        PayloadKind::DoublePairArrayData => Payload::DoublePairArray(read_or_default(data)?),
        PayloadKind::NestedIntArrayData => Payload::NestedIntArray(read_or_default(data)?),
        PayloadKind::Point2Data => Payload::Point2(read_or_default(data)?),
        PayloadKind::Point2ArrayData => Payload::Point2Array(read_or_default(data)?),
    })
}
