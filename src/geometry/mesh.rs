//! Polygon mesh with triangle and quad faces
//!
//! Faces index into `vertices`. A quad `(a, b, c, d)` fan-triangulates into
//! `(a, b, c)` and `(a, c, d)`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::vector::Vec3;

/// Triangle face (i, j, k)
pub type TriFace = [i32; 3];

/// Quad face (i, j, k, l)
pub type QuadFace = [i32; 4];

/// A face whose index does not address a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("face {face} references vertex {index}, mesh has {vertex_count} vertices")]
pub struct FaceIndexError {
    /// Position of the face, triangles first then quads
    pub face: usize,
    pub index: i32,
    pub vertex_count: usize,
}

/// Indexed polygon mesh
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub triangle_faces: Vec<TriFace>,
    pub quad_faces: Vec<QuadFace>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vec3>, triangle_faces: Vec<TriFace>, quad_faces: Vec<QuadFace>) -> Self {
        Self { vertices, triangle_faces, quad_faces }
    }

    pub fn from_triangles(vertices: Vec<Vec3>, faces: Vec<TriFace>) -> Self {
        Self::new(vertices, faces, Vec::new())
    }

    pub fn from_quads(vertices: Vec<Vec3>, faces: Vec<QuadFace>) -> Self {
        Self::new(vertices, Vec::new(), faces)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Triangles plus quads
    pub fn face_count(&self) -> usize {
        self.triangle_faces.len() + self.quad_faces.len()
    }

    pub fn has_triangles(&self) -> bool {
        !self.triangle_faces.is_empty()
    }

    pub fn has_quads(&self) -> bool {
        !self.quad_faces.is_empty()
    }

    /// Non-empty vertices, at least one face, every index in range
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && self.face_count() > 0 && self.validate().is_ok()
    }

    /// Report the first face referencing a vertex outside `vertices`
    pub fn validate(&self) -> Result<(), FaceIndexError> {
        let vertex_count = self.vertices.len();
        let out_of_range = |i: i32| i < 0 || i as usize >= vertex_count;

        let bad_tri = self
            .triangle_faces
            .par_iter()
            .enumerate()
            .find_map_first(|(face, tri)| tri.iter().copied().find(|&i| out_of_range(i)).map(|index| (face, index)));
        if let Some((face, index)) = bad_tri {
            return Err(FaceIndexError { face, index, vertex_count });
        }

        let tri_count = self.triangle_faces.len();
        let bad_quad = self
            .quad_faces
            .par_iter()
            .enumerate()
            .find_map_first(|(face, quad)| quad.iter().copied().find(|&i| out_of_range(i)).map(|index| (tri_count + face, index)));
        match bad_quad {
            Some((face, index)) => Err(FaceIndexError { face, index, vertex_count }),
            None => Ok(()),
        }
    }

    /// Fan-triangulate every quad in place; existing triangles keep their order
    pub fn triangulate(&mut self) {
        if self.quad_faces.is_empty() {
            return;
        }
        let quads = std::mem::take(&mut self.quad_faces);
        let split: Vec<TriFace> = quads
            .par_iter()
            .flat_map_iter(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
            .collect();
        self.triangle_faces.extend(split);
    }

    /// Triangulated copy, leaving `self` untouched
    pub fn triangulated(&self) -> Mesh {
        let mut mesh = self.clone();
        mesh.triangulate();
        mesh
    }

    /// Axis-aligned bounds as (min, max); zero for an empty mesh
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        let mut iter = self.vertices.iter().copied();
        let first = match iter.next() {
            Some(v) => v,
            None => return (Vec3::ZERO, Vec3::ZERO),
        };
        iter.fold((first, first), |(min, max), v| (min.min(v), max.max(v)))
    }
}

impl fmt::Display for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mesh(V:{}, T:{}, Q:{})",
            self.vertices.len(),
            self.triangle_faces.len(),
            self.quad_faces.len()
        )
    }
}
