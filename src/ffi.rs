//! C ABI exported by the crate: a pass-through geometry engine
//!
//! Each `*_roundtrip` function decodes its input envelope, re-encodes the
//! entity unchanged and hands the result back as a buffer the caller must
//! release with `free_buffer`. Buffers are owned by the producer registry in
//! `ownership::registry` until then.
//!
//! Nothing unwinds across this boundary: failures come back as `false` or a
//! null pointer.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use log::{debug, error, warn};

use crate::codec::{self, WirePayload};
use crate::error::WireError;
use crate::geometry::{Mesh, Vec2, Vec3};
use crate::ownership::{copy_foreign, registry};
use crate::platform::RoundTripFn;
use crate::wire::PayloadKind;

/// Hand `bytes` to the caller as a registry-owned buffer
fn hand_out(entry: &str, bytes: Vec<u8>) -> Option<(*mut u8, i32)> {
    let (ptr, len) = registry::produce(bytes)?;
    match i32::try_from(len) {
        Ok(size) => Some((ptr, size)),
        Err(_) => {
            warn!("{}: {} byte result does not fit the size out-parameter", entry, len);
            if let Err(err) = registry::release(ptr) {
                debug!("{}: {}", entry, err);
            }
            None
        }
    }
}

unsafe fn round_trip<T: WirePayload>(
    entry: &str,
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    if out_buffer.is_null() || out_size.is_null() {
        return false;
    }
    *out_buffer = ptr::null_mut();
    *out_size = 0;
    if input.is_null() || input_size <= 0 {
        warn!("{}: no input buffer (size {})", entry, input_size);
        return false;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let bytes = copy_foreign(input, input_size as i64);
        let value: T = codec::decode(&bytes)?;
        Ok::<_, WireError>(codec::encode(&value))
    }));

    let encoded = match result {
        Ok(Ok(encoded)) => encoded,
        Ok(Err(err)) => {
            warn!("{}: rejected input: {}", entry, err);
            return false;
        }
        Err(_) => {
            error!("{}: panicked while processing input", entry);
            return false;
        }
    };

    match hand_out(entry, encoded) {
        Some((ptr, size)) => {
            *out_buffer = ptr;
            *out_size = size;
            true
        }
        None => false,
    }
}

/// # Safety
/// - `input` must point to `input_size` readable bytes (or be null)
/// - `out_buffer`/`out_size` must be valid for writes
/// - a returned buffer must be released with `free_buffer` exactly once
#[no_mangle]
pub unsafe extern "C" fn point3d_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec3>("point3d_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn point3d_array_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec<Vec3>>("point3d_array_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn point2d_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec2>("point2d_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn point2d_array_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec<Vec2>>("point2d_array_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn mesh_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Mesh>("mesh_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn int_array_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec<i32>>("int_array_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn double_array_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec<f64>>("double_array_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn int_pair_array_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec<(i32, i32)>>("int_pair_array_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn double_pair_array_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec<(f64, f64)>>("double_pair_array_roundtrip", input, input_size, out_buffer, out_size)
}

/// # Safety
/// Same contract as [`point3d_roundtrip`].
#[no_mangle]
pub unsafe extern "C" fn nested_int_array_roundtrip(
    input: *const u8,
    input_size: i32,
    out_buffer: *mut *mut u8,
    out_size: *mut i32,
) -> bool {
    round_trip::<Vec<Vec<i32>>>("nested_int_array_roundtrip", input, input_size, out_buffer, out_size)
}

/// Round-trip export for a payload kind, `None` for the NONE tag
pub fn builtin_round_trip(kind: PayloadKind) -> Option<RoundTripFn> {
    let f: RoundTripFn = match kind {
        PayloadKind::None => return None,
        PayloadKind::PointData => point3d_roundtrip,
        PayloadKind::PointArrayData => point3d_array_roundtrip,
        PayloadKind::MeshData => mesh_roundtrip,
        PayloadKind::IntArrayData => int_array_roundtrip,
        PayloadKind::DoubleArrayData => double_array_roundtrip,
        PayloadKind::IntPairArrayData => int_pair_array_roundtrip,
        PayloadKind::DoublePairArrayData => double_pair_array_roundtrip,
        PayloadKind::NestedIntArrayData => nested_int_array_roundtrip,
        PayloadKind::Point2Data => point2d_roundtrip,
        PayloadKind::Point2ArrayData => point2d_array_roundtrip,
    };
    Some(f)
}

/// Copy a verified envelope of type `T` into a registry buffer
unsafe fn create_verified<T: WirePayload>(entry: &str, buffer: *const u8, size: usize) -> *mut c_void {
    if buffer.is_null() || size == 0 {
        return ptr::null_mut();
    }
    let bytes = slice::from_raw_parts(buffer, size).to_vec();
    if let Err(err) = codec::decode::<T>(&bytes) {
        warn!("{}: input is not a valid {} envelope: {}", entry, T::KIND.table_name(), err);
        return ptr::null_mut();
    }
    match hand_out(entry, bytes) {
        Some((ptr, _)) => ptr.cast(),
        None => ptr::null_mut(),
    }
}

/// Copy a `PointData` envelope into a buffer owned by this library.
/// Returns null if the input does not verify.
///
/// # Safety
/// `buffer` must point to `size` readable bytes (or be null).
#[no_mangle]
pub unsafe extern "C" fn create_point3d_buffer(buffer: *const u8, size: usize) -> *mut c_void {
    create_verified::<Vec3>("create_point3d_buffer", buffer, size)
}

/// Same as [`create_point3d_buffer`] for `PointArrayData`.
///
/// # Safety
/// `buffer` must point to `size` readable bytes (or be null).
#[no_mangle]
pub unsafe extern "C" fn create_point3d_array_buffer(buffer: *const u8, size: usize) -> *mut c_void {
    create_verified::<Vec<Vec3>>("create_point3d_array_buffer", buffer, size)
}

/// Encode a triangle mesh from flat arrays.
///
/// `vertices` holds `vertex_count * 3` doubles; `faces` holds `face_count`
/// indices, three per triangle. Returns null on any inconsistency.
///
/// # Safety
/// Both arrays must be readable for the stated lengths.
#[no_mangle]
pub unsafe extern "C" fn create_mesh_buffer(
    vertices: *const f64,
    vertex_count: usize,
    faces: *const i32,
    face_count: usize,
) -> *mut c_void {
    if (vertices.is_null() && vertex_count > 0) || (faces.is_null() && face_count > 0) {
        return ptr::null_mut();
    }
    if face_count % 3 != 0 {
        warn!("create_mesh_buffer: {} face indices is not a multiple of 3", face_count);
        return ptr::null_mut();
    }

    let Some(coord_count) = vertex_count.checked_mul(3) else {
        warn!("create_mesh_buffer: vertex count {} overflows", vertex_count);
        return ptr::null_mut();
    };
    let coords = if coord_count == 0 { &[][..] } else { slice::from_raw_parts(vertices, coord_count) };
    let indices = if face_count == 0 { &[][..] } else { slice::from_raw_parts(faces, face_count) };

    let mesh = Mesh::from_triangles(
        coords.chunks_exact(3).map(Vec3::from_slice).collect(),
        indices.chunks_exact(3).map(|f| [f[0], f[1], f[2]]).collect(),
    );
    if let Err(err) = mesh.validate() {
        warn!("create_mesh_buffer: {}", err);
        return ptr::null_mut();
    }

    match hand_out("create_mesh_buffer", codec::encode(&mesh)) {
        Some((ptr, _)) => ptr.cast(),
        None => ptr::null_mut(),
    }
}

/// Size of a buffer returned by this library, 0 for null or unknown
///
/// # Safety
/// `buffer` is only compared against outstanding addresses, never read.
#[no_mangle]
pub unsafe extern "C" fn get_buffer_size(buffer: *mut c_void) -> i32 {
    if buffer.is_null() {
        return 0;
    }
    registry::size_of(buffer.cast::<u8>())
        .and_then(|len| i32::try_from(len).ok())
        .unwrap_or(0)
}

/// Release a buffer returned by this library. Null and unknown addresses
/// are ignored.
///
/// # Safety
/// `buffer` must not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn free_buffer(buffer: *mut c_void) {
    if buffer.is_null() {
        return;
    }
    // unknown addresses are already logged by the registry
    if let Err(err) = registry::release(buffer.cast::<u8>()) {
        debug!("free_buffer: {}", err);
    }
}
