//! Geometry data model exchanged with the native engine
//!
//! # Submodules
//! - `vector` - Vec2 / Vec3 value types
//! - `mesh` - Indexed triangle/quad mesh

mod vector;
mod mesh;

pub use vector::{
    Vec2,
    Vec3,
    DEFAULT_EPSILON,
};

pub use mesh::{
    Mesh,
    TriFace,
    QuadFace,
    FaceIndexError,
};
