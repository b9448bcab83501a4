//! Payload tables for every entity type
//!
//! Vector fields are always written, empty or not, so a decoded sequence is
//! never confused with an absent one. Absent fields still decode to their
//! defaults for buffers built elsewhere.

use std::borrow::Cow;

use super::{EncodeOptions, WirePayload};
use crate::error::WireError;
use crate::geometry::{Mesh, QuadFace, TriFace, Vec2, Vec3};
use crate::wire::{slots, PayloadKind, Table, WOffset, WireBuilder, WireStruct};

/// Table holding a single inline struct
fn write_struct_table<T: WireStruct>(builder: &mut WireBuilder, slot: u16, value: &T) -> WOffset {
    builder.start_table();
    builder.add_field_struct(slot, value);
    builder.end_table()
}

/// Table holding a single vector of structs
fn write_vector_table<T: WireStruct>(builder: &mut WireBuilder, slot: u16, items: &[T]) -> WOffset {
    let vector = builder.create_vector(items);
    builder.start_table();
    builder.add_field_offset(slot, vector);
    builder.end_table()
}

fn vector_hint<T: WireStruct>(len: usize) -> usize {
    64 + len * T::SIZE
}

// PointData
impl WirePayload for Vec3 {
    const KIND: PayloadKind = PayloadKind::PointData;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_struct_table(builder, slots::POINT, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        Ok(table.read_struct::<Vec3>(slots::POINT)?.unwrap_or(Vec3::ZERO))
    }
}

// Point2Data
impl WirePayload for Vec2 {
    const KIND: PayloadKind = PayloadKind::Point2Data;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_struct_table(builder, slots::POINT, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        Ok(table.read_struct::<Vec2>(slots::POINT)?.unwrap_or(Vec2::ZERO))
    }
}

// PointArrayData
impl WirePayload for Vec<Vec3> {
    const KIND: PayloadKind = PayloadKind::PointArrayData;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_vector_table(builder, slots::POINTS, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        table.structs_or_empty(slots::POINTS)
    }

    fn size_hint(&self) -> usize {
        vector_hint::<Vec3>(self.len())
    }
}

// Point2ArrayData
impl WirePayload for Vec<Vec2> {
    const KIND: PayloadKind = PayloadKind::Point2ArrayData;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_vector_table(builder, slots::POINTS, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        table.structs_or_empty(slots::POINTS)
    }

    fn size_hint(&self) -> usize {
        vector_hint::<Vec2>(self.len())
    }
}

// MeshData
impl WirePayload for Mesh {
    const KIND: PayloadKind = PayloadKind::MeshData;

    fn write_table(&self, builder: &mut WireBuilder, options: &EncodeOptions) -> WOffset {
        let mesh = if options.triangulate && self.has_quads() {
            Cow::Owned(self.triangulated())
        } else {
            Cow::Borrowed(self)
        };

        let vertices = builder.create_vector(&mesh.vertices);
        let tri_faces = builder.create_vector(&mesh.triangle_faces);
        let quad_faces = builder.create_vector(&mesh.quad_faces);

        builder.start_table();
        builder.add_field_offset(slots::MESH_VERTICES, vertices);
        builder.add_field_offset(slots::MESH_TRI_FACES, tri_faces);
        builder.add_field_offset(slots::MESH_QUAD_FACES, quad_faces);
        builder.end_table()
    }

    /// Face indices are checked against the decoded vertices; an
    /// out-of-range index is reported, never clamped.
    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        let mesh = Mesh::new(
            table.structs_or_empty::<Vec3>(slots::MESH_VERTICES)?,
            table.structs_or_empty::<TriFace>(slots::MESH_TRI_FACES)?,
            table.structs_or_empty::<QuadFace>(slots::MESH_QUAD_FACES)?,
        );
        mesh.validate().map_err(|e| WireError::FaceIndexOutOfRange {
            face: e.face,
            index: e.index,
            vertex_count: e.vertex_count,
        })?;
        Ok(mesh)
    }

    fn size_hint(&self) -> usize {
        // triangulation at most doubles the quad count into triangles
        128 + self.vertices.len() * Vec3::SIZE
            + (self.triangle_faces.len() + 2 * self.quad_faces.len()) * TriFace::SIZE
            + self.quad_faces.len() * QuadFace::SIZE
    }
}

// IntArrayData
impl WirePayload for Vec<i32> {
    const KIND: PayloadKind = PayloadKind::IntArrayData;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_vector_table(builder, slots::VALUES, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        table.structs_or_empty(slots::VALUES)
    }

    fn size_hint(&self) -> usize {
        vector_hint::<i32>(self.len())
    }
}

// DoubleArrayData
impl WirePayload for Vec<f64> {
    const KIND: PayloadKind = PayloadKind::DoubleArrayData;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_vector_table(builder, slots::VALUES, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        table.structs_or_empty(slots::VALUES)
    }

    fn size_hint(&self) -> usize {
        vector_hint::<f64>(self.len())
    }
}

// IntPairArrayData
impl WirePayload for Vec<(i32, i32)> {
    const KIND: PayloadKind = PayloadKind::IntPairArrayData;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_vector_table(builder, slots::PAIRS, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        table.structs_or_empty(slots::PAIRS)
    }

    fn size_hint(&self) -> usize {
        vector_hint::<(i32, i32)>(self.len())
    }
}

// DoublePairArrayData
impl WirePayload for Vec<(f64, f64)> {
    const KIND: PayloadKind = PayloadKind::DoublePairArrayData;

    fn write_table(&self, builder: &mut WireBuilder, _options: &EncodeOptions) -> WOffset {
        write_vector_table(builder, slots::PAIRS, self)
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        table.structs_or_empty(slots::PAIRS)
    }

    fn size_hint(&self) -> usize {
        vector_hint::<(f64, f64)>(self.len())
    }
}

// NestedIntArrayData: a vector of IntArrayData tables
impl WirePayload for Vec<Vec<i32>> {
    const KIND: PayloadKind = PayloadKind::NestedIntArrayData;

    fn write_table(&self, builder: &mut WireBuilder, options: &EncodeOptions) -> WOffset {
        let mut inner = Vec::with_capacity(self.len());
        for values in self {
            inner.push(values.write_table(builder, options));
        }
        let arrays = builder.create_vector_of_offsets(&inner);

        builder.start_table();
        builder.add_field_offset(slots::ARRAYS, arrays);
        builder.end_table()
    }

    fn read_table(table: Table<'_>) -> Result<Self, WireError> {
        match table.read_vector(slots::ARRAYS)? {
            Some(arrays) => arrays
                .tables()?
                .into_iter()
                .map(<Vec<i32> as WirePayload>::read_table)
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    fn size_hint(&self) -> usize {
        64 + self.iter().map(|v| 32 + v.len() * 4).sum::<usize>()
    }
}
