//! Entry-point names and signatures of the native engine, per platform

use std::ffi::c_void;

use serde::Serialize;

use crate::ownership::ReleaseFn;
use crate::wire::PayloadKind;

/// `bool f(const uint8_t* in, int in_size, uint8_t** out, int* out_size)`
pub type RoundTripFn = unsafe extern "C" fn(*const u8, i32, *mut *mut u8, *mut i32) -> bool;

/// `void* f(const uint8_t* buffer, size_t size)`
pub type CreateBufferFn = unsafe extern "C" fn(*const u8, usize) -> *mut c_void;

/// `void* f(const double* vertices, size_t vertex_count, const int* faces, size_t face_count)`
pub type CreateMeshBufferFn = unsafe extern "C" fn(*const f64, usize, *const i32, usize) -> *mut c_void;

/// `int f(void* buffer)`
pub type BufferSizeFn = unsafe extern "C" fn(*mut c_void) -> i32;

/// `void f(void* buffer)`
pub type FreeBufferFn = ReleaseFn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// The platform this crate was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn library_file_name(self) -> &'static str {
        match self {
            Platform::Windows => "geobridge_native.dll",
            Platform::MacOs => "libgeobridge_native.dylib",
            Platform::Linux => "libgeobridge_native.so",
        }
    }

    /// Exported name of `entry`; cdecl exports are undecorated on every
    /// supported target, so only the library file name varies
    pub fn symbol(self, entry: EntryPoint) -> &'static str {
        entry.default_symbol()
    }
}

/// Every function the bridge calls on the native side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntryPoint {
    RoundTrip(PayloadKind),
    CreatePoint3dBuffer,
    CreatePoint3dArrayBuffer,
    CreateMeshBuffer,
    GetBufferSize,
    FreeBuffer,
}

impl EntryPoint {
    pub fn default_symbol(self) -> &'static str {
        match self {
            EntryPoint::RoundTrip(kind) => round_trip_symbol(kind),
            EntryPoint::CreatePoint3dBuffer => "create_point3d_buffer",
            EntryPoint::CreatePoint3dArrayBuffer => "create_point3d_array_buffer",
            EntryPoint::CreateMeshBuffer => "create_mesh_buffer",
            EntryPoint::GetBufferSize => "get_buffer_size",
            EntryPoint::FreeBuffer => "free_buffer",
        }
    }
}

fn round_trip_symbol(kind: PayloadKind) -> &'static str {
    match kind {
        PayloadKind::None => "",
        PayloadKind::PointData => "point3d_roundtrip",
        PayloadKind::PointArrayData => "point3d_array_roundtrip",
        PayloadKind::MeshData => "mesh_roundtrip",
        PayloadKind::IntArrayData => "int_array_roundtrip",
        PayloadKind::DoubleArrayData => "double_array_roundtrip",
        PayloadKind::IntPairArrayData => "int_pair_array_roundtrip",
        PayloadKind::DoublePairArrayData => "double_pair_array_roundtrip",
        PayloadKind::NestedIntArrayData => "nested_int_array_roundtrip",
        PayloadKind::Point2Data => "point2d_roundtrip",
        PayloadKind::Point2ArrayData => "point2d_array_roundtrip",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_payload_has_a_round_trip_symbol() {
        for platform in [Platform::Windows, Platform::MacOs, Platform::Linux] {
            for kind in PayloadKind::ALL {
                let symbol = platform.symbol(EntryPoint::RoundTrip(kind));
                assert!(symbol.ends_with("_roundtrip"), "{:?} -> {}", kind, symbol);
            }
            assert_eq!(platform.symbol(EntryPoint::RoundTrip(PayloadKind::PointData)), "point3d_roundtrip");
            assert_eq!(platform.symbol(EntryPoint::CreateMeshBuffer), "create_mesh_buffer");
            assert_eq!(platform.symbol(EntryPoint::FreeBuffer), "free_buffer");
        }
    }

    #[test]
    fn test_library_names() {
        assert_eq!(Platform::Windows.library_file_name(), "geobridge_native.dll");
        assert_eq!(Platform::MacOs.library_file_name(), "libgeobridge_native.dylib");
        assert_eq!(Platform::Linux.library_file_name(), "libgeobridge_native.so");
    }

    #[test]
    fn test_current_platform_matches_target() {
        #[cfg(target_os = "linux")]
        assert_eq!(Platform::current(), Platform::Linux);
        #[cfg(windows)]
        assert_eq!(Platform::current(), Platform::Windows);
        #[cfg(target_os = "macos")]
        assert_eq!(Platform::current(), Platform::MacOs);
    }
}
