//! Wire schema: payload tags, table field slots and inline struct layouts
//!
//! Structs are fixed-size little-endian records written inline. Tables are
//! variable records addressed through a vtable; any table field may be absent.
//!
//! Layout summary:
//! ```text
//! struct Vec2       { x: f64, y: f64 }              16 bytes, align 8
//! struct Vec3       { x: f64, y: f64, z: f64 }      24 bytes, align 8
//! struct Int3       { i: i32, j: i32, k: i32 }      12 bytes, align 4
//! struct Int4       { i, j, k, l: i32 }             16 bytes, align 4
//! struct IntPair    { a: i32, b: i32 }               8 bytes, align 4
//! struct DoublePair { a: f64, b: f64 }              16 bytes, align 8
//!
//! table GeoWrapper { data_type: u8 (0), data: union (1) }
//! ```

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::WireError;
use crate::geometry::{QuadFace, TriFace, Vec2, Vec3};

/// Which payload table an envelope carries
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadKind {
    None = 0,
    PointData = 1,
    PointArrayData = 2,
    MeshData = 3,
    IntArrayData = 4,
    DoubleArrayData = 5,
    IntPairArrayData = 6,
    DoublePairArrayData = 7,
    NestedIntArrayData = 8,
    Point2Data = 9,
    Point2ArrayData = 10,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 10] = [
        PayloadKind::PointData,
        PayloadKind::PointArrayData,
        PayloadKind::MeshData,
        PayloadKind::IntArrayData,
        PayloadKind::DoubleArrayData,
        PayloadKind::IntPairArrayData,
        PayloadKind::DoublePairArrayData,
        PayloadKind::NestedIntArrayData,
        PayloadKind::Point2Data,
        PayloadKind::Point2ArrayData,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(PayloadKind::None),
            1 => Ok(PayloadKind::PointData),
            2 => Ok(PayloadKind::PointArrayData),
            3 => Ok(PayloadKind::MeshData),
            4 => Ok(PayloadKind::IntArrayData),
            5 => Ok(PayloadKind::DoubleArrayData),
            6 => Ok(PayloadKind::IntPairArrayData),
            7 => Ok(PayloadKind::DoublePairArrayData),
            8 => Ok(PayloadKind::NestedIntArrayData),
            9 => Ok(PayloadKind::Point2Data),
            10 => Ok(PayloadKind::Point2ArrayData),
            other => Err(WireError::UnknownTypeTag(other)),
        }
    }

    /// Schema name of the payload table
    pub fn table_name(self) -> &'static str {
        match self {
            PayloadKind::None => "NONE",
            PayloadKind::PointData => "PointData",
            PayloadKind::PointArrayData => "PointArrayData",
            PayloadKind::MeshData => "MeshData",
            PayloadKind::IntArrayData => "IntArrayData",
            PayloadKind::DoubleArrayData => "DoubleArrayData",
            PayloadKind::IntPairArrayData => "IntPairArrayData",
            PayloadKind::DoublePairArrayData => "DoublePairArrayData",
            PayloadKind::NestedIntArrayData => "NestedIntArrayData",
            PayloadKind::Point2Data => "Point2Data",
            PayloadKind::Point2ArrayData => "Point2ArrayData",
        }
    }
}

/// Field slots of every table
pub mod slots {
    pub const WRAPPER_DATA_TYPE: u16 = 0;
    pub const WRAPPER_DATA: u16 = 1;

    pub const POINT: u16 = 0;
    pub const POINTS: u16 = 0;

    pub const MESH_VERTICES: u16 = 0;
    pub const MESH_TRI_FACES: u16 = 1;
    pub const MESH_QUAD_FACES: u16 = 2;

    pub const VALUES: u16 = 0;
    pub const PAIRS: u16 = 0;
    pub const ARRAYS: u16 = 0;
}

/// Fixed-size record stored inline in tables and vectors
pub trait WireStruct: Sized + Copy {
    const SIZE: usize;
    const ALIGN: usize;

    /// Write the forward (read-order) layout into exactly `SIZE` bytes
    fn write_le(&self, out: &mut [u8]);

    /// Read from exactly `SIZE` bytes
    fn read_le(bytes: &[u8]) -> Self;
}

impl WireStruct for i32 {
    const SIZE: usize = 4;
    const ALIGN: usize = 4;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_i32(out, *self);
    }

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_i32(bytes)
    }
}

impl WireStruct for f64 {
    const SIZE: usize = 8;
    const ALIGN: usize = 8;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_f64(out, *self);
    }

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_f64(bytes)
    }
}

impl WireStruct for Vec2 {
    const SIZE: usize = 16;
    const ALIGN: usize = 8;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_f64_into(&[self.x, self.y], out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        Vec2::new(LittleEndian::read_f64(&bytes[0..8]), LittleEndian::read_f64(&bytes[8..16]))
    }
}

impl WireStruct for Vec3 {
    const SIZE: usize = 24;
    const ALIGN: usize = 8;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_f64_into(&[self.x, self.y, self.z], out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut v = [0.0f64; 3];
        LittleEndian::read_f64_into(&bytes[..24], &mut v);
        Vec3::from(v)
    }
}

// Int3
impl WireStruct for TriFace {
    const SIZE: usize = 12;
    const ALIGN: usize = 4;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_i32_into(self, out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut f = [0i32; 3];
        LittleEndian::read_i32_into(&bytes[..12], &mut f);
        f
    }
}

// Int4
impl WireStruct for QuadFace {
    const SIZE: usize = 16;
    const ALIGN: usize = 4;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_i32_into(self, out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut f = [0i32; 4];
        LittleEndian::read_i32_into(&bytes[..16], &mut f);
        f
    }
}

// IntPair
impl WireStruct for (i32, i32) {
    const SIZE: usize = 8;
    const ALIGN: usize = 4;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_i32_into(&[self.0, self.1], out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        (LittleEndian::read_i32(&bytes[0..4]), LittleEndian::read_i32(&bytes[4..8]))
    }
}

// DoublePair
impl WireStruct for (f64, f64) {
    const SIZE: usize = 16;
    const ALIGN: usize = 8;

    fn write_le(&self, out: &mut [u8]) {
        LittleEndian::write_f64_into(&[self.0, self.1], out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        (LittleEndian::read_f64(&bytes[0..8]), LittleEndian::read_f64(&bytes[8..16]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_mapping() {
        for kind in PayloadKind::ALL {
            assert_eq!(PayloadKind::from_tag(kind.tag()).unwrap(), kind);
        }
        assert_eq!(PayloadKind::from_tag(0).unwrap(), PayloadKind::None);
        assert_eq!(PayloadKind::from_tag(42), Err(WireError::UnknownTypeTag(42)));
    }

    #[test]
    fn test_vec3_layout_is_x_y_z() {
        let mut out = [0u8; 24];
        Vec3::new(1.0, 2.0, 3.0).write_le(&mut out);
        assert_eq!(&out[0..8], &1.0f64.to_le_bytes());
        assert_eq!(&out[8..16], &2.0f64.to_le_bytes());
        assert_eq!(&out[16..24], &3.0f64.to_le_bytes());
        assert_eq!(Vec3::read_le(&out), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_quad_layout() {
        let quad: QuadFace = [4, 7, 6, 5];
        let mut out = [0u8; 16];
        quad.write_le(&mut out);
        assert_eq!(&out[4..8], &7i32.to_le_bytes());
        assert_eq!(QuadFace::read_le(&out), [4, 7, 6, 5]);
    }
}
