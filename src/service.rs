//! Round trips through the native engine
//!
//! encode -> call the resolved entry point -> adopt the returned buffer ->
//! copy and release it -> decode. Allocation failures and bad sizes from the
//! native side are recoverable and can degrade to the default entity;
//! malformed output never is.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use log::debug;

use crate::codec::{self, EncodeOptions, WirePayload};
use crate::config::BridgeConfig;
use crate::diagnostics::DiagnosticLog;
use crate::error::BridgeError;
use crate::geometry::{Mesh, Vec3};
use crate::ownership::NativeBuffer;
use crate::platform::{EntryPoint, EntryPoints};
use crate::wire::PayloadKind;

pub struct RoundTripService {
    entries: EntryPoints,
    config: BridgeConfig,
    log: Arc<DiagnosticLog>,
}

impl RoundTripService {
    pub fn new(entries: EntryPoints, config: BridgeConfig, log: Arc<DiagnosticLog>) -> Self {
        Self { entries, config, log }
    }

    /// Service over the engine compiled into this crate
    pub fn builtin(config: BridgeConfig) -> Self {
        let log = Arc::new(DiagnosticLog::new(config.log_capacity));
        Self::new(EntryPoints::builtin(), config, log)
    }

    /// Service over the native library named by `config`
    pub fn load(config: BridgeConfig) -> Result<Self, anyhow::Error> {
        let log = Arc::new(DiagnosticLog::new(config.log_capacity));
        let entries = EntryPoints::load(&config, &log)?;
        Ok(Self::new(entries, config, log))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<DiagnosticLog> {
        &self.log
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entries
    }

    fn options_for(&self, kind: PayloadKind) -> EncodeOptions {
        if kind == PayloadKind::MeshData {
            self.config.mesh_encode_options()
        } else {
            self.config.encode_options()
        }
    }

    fn symbol(&self, entry: EntryPoint) -> &'static str {
        self.entries.platform().symbol(entry)
    }

    /// Send `value` through the native engine and decode what comes back
    pub fn round_trip<T: WirePayload>(&self, value: &T) -> Result<T, BridgeError> {
        let call = self.entries.round_trip(T::KIND)?;
        let entry = self.symbol(EntryPoint::RoundTrip(T::KIND));
        let format = self.config.wire_format;

        let input = codec::encode_as(format, value, &self.options_for(T::KIND));
        let input_size = i32::try_from(input.len()).map_err(|_| BridgeError::SizeMismatch {
            entry,
            size: input.len() as i64,
        })?;

        let mut out_buffer: *mut u8 = ptr::null_mut();
        let mut out_size: i32 = 0;
        // SAFETY: input outlives the call and the out-params are valid locals
        let ok = unsafe { call(input.as_ptr(), input_size, &mut out_buffer, &mut out_size) };
        debug!(
            "{}: sent {} bytes, got {:p} ({} bytes, ok={})",
            entry,
            input.len(),
            out_buffer,
            out_size,
            ok
        );

        let output = self.take_output(entry, ok, out_buffer, out_size as i64)?;
        Ok(codec::decode_as(format, &output)?)
    }

    /// Mesh round trip; quads are triangulated first when configured
    pub fn round_trip_mesh(&self, mesh: &Mesh) -> Result<Mesh, BridgeError> {
        self.round_trip(mesh)
    }

    /// Like `round_trip`, but a recoverable failure yields `T::default()`
    pub fn round_trip_or_default<T: WirePayload>(&self, value: &T) -> Result<T, BridgeError> {
        match self.round_trip(value) {
            Err(err) if err.is_recoverable() => {
                self.log.warn(format!(
                    "{} round trip degraded to default: {}",
                    T::KIND.table_name(),
                    err
                ));
                Ok(T::default())
            }
            other => other,
        }
    }

    /// Adopt the buffer a round-trip call returned
    fn take_output(&self, entry: &'static str, ok: bool, out_buffer: *mut u8, out_size: i64) -> Result<Vec<u8>, BridgeError> {
        // a failed call leaves the out-params unspecified: never read or free them
        if !ok || out_buffer.is_null() {
            return Err(BridgeError::AllocationFailure { entry });
        }
        // SAFETY: on success out_buffer holds out_size bytes allocated by the
        // engine, to be released with its free_buffer
        match unsafe { NativeBuffer::adopt(out_buffer, out_size, self.entries.free_buffer()) } {
            Some(buffer) => Ok(buffer.into_vec()?),
            None => Err(BridgeError::SizeMismatch { entry, size: out_size }),
        }
    }

    /// Adopt a buffer returned by one of the `create_*` entry points
    fn take_created(&self, entry: &'static str, handle: *mut c_void) -> Result<Vec<u8>, BridgeError> {
        if handle.is_null() {
            return Err(BridgeError::AllocationFailure { entry });
        }
        // SAFETY: handle came from the engine that exports buffer_size/free_buffer
        let size = unsafe { (self.entries.buffer_size())(handle) } as i64;
        match unsafe { NativeBuffer::adopt(handle.cast(), size, self.entries.free_buffer()) } {
            Some(buffer) => Ok(buffer.into_vec()?),
            None => Err(BridgeError::SizeMismatch { entry, size }),
        }
    }

    /// Have the engine copy a point envelope into its own buffer, then take
    /// it back
    pub fn create_buffer(&self, point: &Vec3) -> Result<Vec<u8>, BridgeError> {
        let create = self.entries.create_point3d_buffer()?;
        let input = codec::encode_with(point, &self.config.encode_options());
        // SAFETY: input is a live slice of input.len() bytes
        let handle = unsafe { create(input.as_ptr(), input.len()) };
        self.take_created(self.symbol(EntryPoint::CreatePoint3dBuffer), handle)
    }

    pub fn create_point_array_buffer(&self, points: &[Vec3]) -> Result<Vec<u8>, BridgeError> {
        let create = self.entries.create_point3d_array_buffer()?;
        let input = codec::encode_with(&points.to_vec(), &self.config.encode_options());
        // SAFETY: input is a live slice of input.len() bytes
        let handle = unsafe { create(input.as_ptr(), input.len()) };
        self.take_created(self.symbol(EntryPoint::CreatePoint3dArrayBuffer), handle)
    }

    /// Have the engine encode `mesh` from flat vertex/index arrays. Quads are
    /// triangulated since the flat form only carries triangles.
    pub fn create_mesh_buffer(&self, mesh: &Mesh) -> Result<Vec<u8>, BridgeError> {
        let create = self.entries.create_mesh_buffer()?;
        let mesh = mesh.triangulated();
        let vertices: Vec<f64> = mesh.vertices.iter().flat_map(|v| v.to_array()).collect();
        let faces: Vec<i32> = mesh.triangle_faces.iter().flatten().copied().collect();
        // SAFETY: both arrays are live for the stated lengths
        let handle = unsafe { create(vertices.as_ptr(), mesh.vertex_count(), faces.as_ptr(), faces.len()) };
        self.take_created(self.symbol(EntryPoint::CreateMeshBuffer), handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireFormat;
    use crate::error::WireError;
    use crate::ownership::registry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C" fn refuse(_: *const u8, _: i32, out: *mut *mut u8, out_size: *mut i32) -> bool {
        *out = ptr::null_mut();
        *out_size = 0;
        false
    }

    static STALE_OUTPUT: AtomicUsize = AtomicUsize::new(0);

    // reports failure but leaves a live buffer in the out-param
    unsafe extern "C" fn fail_with_stale_output(_: *const u8, _: i32, out: *mut *mut u8, out_size: *mut i32) -> bool {
        match registry::produce(vec![1, 2, 3, 4]) {
            Some((ptr, len)) => {
                STALE_OUTPUT.store(ptr as usize, Ordering::SeqCst);
                *out = ptr;
                *out_size = len as i32;
            }
            None => *out = ptr::null_mut(),
        }
        false
    }

    #[test]
    fn test_point_round_trip_over_builtin_engine() {
        let service = RoundTripService::builtin(BridgeConfig::default());
        let point = Vec3::new(1.5, -2.5, 1e10);
        assert_eq!(service.round_trip(&point).unwrap(), point);
    }

    #[test]
    fn test_configured_triangulation_applies_to_meshes() {
        let config = BridgeConfig { triangulate_meshes: true, ..BridgeConfig::default() };
        let service = RoundTripService::builtin(config);
        let quad = Mesh::from_quads(
            vec![Vec3::ZERO, Vec3::UNIT_X, Vec3::new(1.0, 1.0, 0.0), Vec3::UNIT_Y],
            vec![[0, 1, 2, 3]],
        );
        let result = service.round_trip_mesh(&quad).unwrap();
        assert_eq!(result.triangle_faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(result.quad_faces.is_empty());
    }

    #[test]
    fn test_refusing_engine_degrades_to_default() {
        let mut entries = EntryPoints::builtin();
        entries.override_round_trip(PayloadKind::IntArrayData, refuse);
        let service = RoundTripService::new(entries, BridgeConfig::default(), Arc::new(DiagnosticLog::default()));

        let err = service.round_trip(&vec![1, 2, 3]).unwrap_err();
        assert_eq!(err, BridgeError::AllocationFailure { entry: "int_array_roundtrip" });
        assert!(service.round_trip_or_default(&vec![1, 2, 3]).unwrap().is_empty());
        assert_eq!(service.log().len(), 1);
    }

    #[test]
    fn test_non_positive_size_is_size_mismatch() {
        let service = RoundTripService::builtin(BridgeConfig::default());
        let mut local = [0u8; 4];
        let err = service
            .take_output("int_array_roundtrip", true, local.as_mut_ptr(), -1)
            .unwrap_err();
        assert_eq!(err, BridgeError::SizeMismatch { entry: "int_array_roundtrip", size: -1 });
    }

    #[test]
    fn test_flat_format_is_rejected_by_envelope_engine() {
        let config = BridgeConfig { wire_format: WireFormat::Flat, ..BridgeConfig::default() };
        let service = RoundTripService::builtin(config);
        let err = service.round_trip(&vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, BridgeError::AllocationFailure { entry: "double_array_roundtrip" });
    }

    #[test]
    fn test_malformed_output_is_not_recoverable() {
        let service = RoundTripService::builtin(BridgeConfig::default());
        // the engine rejects the mesh on decode, so nothing comes back
        let err = service.round_trip(&Mesh::from_triangles(vec![Vec3::ZERO], vec![[0, 0, 5]])).unwrap_err();
        assert!(err.is_recoverable());

        let bogus = codec::encode(&vec![1, 2, 3]);
        let decoded = codec::decode::<Vec<f64>>(&bogus).map_err(BridgeError::from).unwrap_err();
        assert!(matches!(decoded, BridgeError::MalformedBuffer(WireError::TypeTagMismatch { .. })));
        assert!(!decoded.is_recoverable());
    }

    #[test]
    fn test_create_buffer_helpers() {
        let service = RoundTripService::builtin(BridgeConfig::default());
        let bytes = service.create_buffer(&Vec3::new(7.0, 8.0, 9.0)).unwrap();
        assert_eq!(codec::decode::<Vec3>(&bytes).unwrap(), Vec3::new(7.0, 8.0, 9.0));

        let cube = Mesh::from_quads(vec![Vec3::ZERO; 8], vec![[0, 1, 2, 3], [4, 5, 6, 7]]);
        let bytes = service.create_mesh_buffer(&cube).unwrap();
        let mesh: Mesh = codec::decode(&bytes).unwrap();
        assert_eq!(mesh.triangle_faces.len(), 4);
    }

    #[test]
    fn test_failed_call_leaves_output_untouched() {
        let mut entries = EntryPoints::builtin();
        entries.override_round_trip(PayloadKind::IntArrayData, fail_with_stale_output);
        let service = RoundTripService::new(entries, BridgeConfig::default(), Arc::new(DiagnosticLog::default()));

        let err = service.round_trip(&vec![1, 2, 3]).unwrap_err();
        assert_eq!(err, BridgeError::AllocationFailure { entry: "int_array_roundtrip" });

        let stale = STALE_OUTPUT.load(Ordering::SeqCst) as *mut u8;
        assert!(!stale.is_null());
        // still outstanding: the service neither copied nor freed it
        assert_eq!(registry::size_of(stale), Some(4));
        assert!(registry::release(stale).is_ok());
    }
}
