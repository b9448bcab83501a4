//! Platform-specific entry-point resolution
//!
//! The native engine's functions are resolved once into an `EntryPoints`
//! table; callers use the table and never branch on the OS.
//!
//! # Submodules
//! - `symbols` - Platform names, library file names and function signatures
//! - `library` - Shared library search and loading

mod symbols;
mod library;

use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::path::Path;
use std::ptr::NonNull;

use indexmap::IndexMap;

use crate::config::BridgeConfig;
use crate::diagnostics::DiagnosticLog;
use crate::error::BridgeError;
use crate::ffi;
use crate::wire::PayloadKind;

pub use symbols::{
    BufferSizeFn,
    CreateBufferFn,
    CreateMeshBufferFn,
    EntryPoint,
    FreeBufferFn,
    Platform,
    RoundTripFn,
};

pub use library::{
    candidate_paths,
    library_file_name,
    locate,
    NativeLibrary,
};

/// Reinterpret a resolved symbol as a function pointer of type `F`
///
/// # Safety
/// `F` must be an `extern "C"` fn pointer matching the symbol's real signature.
unsafe fn as_fn<F: Copy>(symbol: NonNull<c_void>) -> F {
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
    mem::transmute_copy(&symbol.as_ptr())
}

/// Resolved native functions, plus the library that backs them
pub struct EntryPoints {
    platform: Platform,
    round_trips: IndexMap<PayloadKind, RoundTripFn>,
    create_point3d: Option<CreateBufferFn>,
    create_point3d_array: Option<CreateBufferFn>,
    create_mesh: Option<CreateMeshBufferFn>,
    buffer_size: BufferSizeFn,
    free_buffer: FreeBufferFn,
    library: Option<NativeLibrary>,
}

impl EntryPoints {
    /// Bind to the engine compiled into this crate (no dynamic loading)
    pub fn builtin() -> Self {
        let round_trips = PayloadKind::ALL
            .iter()
            .filter_map(|&kind| ffi::builtin_round_trip(kind).map(|f| (kind, f)))
            .collect();
        Self {
            platform: Platform::current(),
            round_trips,
            create_point3d: Some(ffi::create_point3d_buffer as CreateBufferFn),
            create_point3d_array: Some(ffi::create_point3d_array_buffer as CreateBufferFn),
            create_mesh: Some(ffi::create_mesh_buffer as CreateMeshBufferFn),
            buffer_size: ffi::get_buffer_size as BufferSizeFn,
            free_buffer: ffi::free_buffer as FreeBufferFn,
            library: None,
        }
    }

    /// Resolve every entry point from a loaded library. `free_buffer` and
    /// `get_buffer_size` are mandatory; anything else missing is logged and
    /// reported when called.
    pub fn resolve(library: NativeLibrary, log: &DiagnosticLog) -> Result<Self, BridgeError> {
        let platform = Platform::current();
        let lookup = |entry: EntryPoint| library.symbol(platform.symbol(entry));
        let required = |entry: EntryPoint| {
            lookup(entry).ok_or(BridgeError::MissingEntryPoint(platform.symbol(entry)))
        };

        // SAFETY: symbol tables pair each name with the signature it is exported with
        let free_buffer: FreeBufferFn = unsafe { as_fn(required(EntryPoint::FreeBuffer)?) };
        let buffer_size: BufferSizeFn = unsafe { as_fn(required(EntryPoint::GetBufferSize)?) };

        let mut round_trips = IndexMap::new();
        for kind in PayloadKind::ALL {
            let entry = EntryPoint::RoundTrip(kind);
            match lookup(entry) {
                Some(symbol) => {
                    round_trips.insert(kind, unsafe { as_fn::<RoundTripFn>(symbol) });
                }
                None => log.warn(format!(
                    "{} does not export {}",
                    library.path().display(),
                    platform.symbol(entry)
                )),
            }
        }
        let create_point3d = lookup(EntryPoint::CreatePoint3dBuffer).map(|s| unsafe { as_fn::<CreateBufferFn>(s) });
        let create_point3d_array =
            lookup(EntryPoint::CreatePoint3dArrayBuffer).map(|s| unsafe { as_fn::<CreateBufferFn>(s) });
        let create_mesh = lookup(EntryPoint::CreateMeshBuffer).map(|s| unsafe { as_fn::<CreateMeshBufferFn>(s) });

        log.info(format!(
            "Resolved {} round-trip entry points from {}",
            round_trips.len(),
            library.path().display()
        ));

        Ok(Self {
            platform,
            round_trips,
            create_point3d,
            create_point3d_array,
            create_mesh,
            buffer_size,
            free_buffer,
            library: Some(library),
        })
    }

    /// Locate the library per `config` and resolve it
    pub fn load(config: &BridgeConfig, log: &DiagnosticLog) -> Result<Self, anyhow::Error> {
        let library = locate(config, log)?;
        Ok(Self::resolve(library, log)?)
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Path of the backing library, `None` for the builtin engine
    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_ref().map(NativeLibrary::path)
    }

    pub fn round_trip(&self, kind: PayloadKind) -> Result<RoundTripFn, BridgeError> {
        self.round_trips
            .get(&kind)
            .copied()
            .ok_or(BridgeError::MissingEntryPoint(self.platform.symbol(EntryPoint::RoundTrip(kind))))
    }

    /// Replace the round-trip function for one payload kind, e.g. to wrap
    /// the engine's export with instrumentation
    pub fn override_round_trip(&mut self, kind: PayloadKind, f: RoundTripFn) {
        self.round_trips.insert(kind, f);
    }

    /// Payload kinds with a resolved round-trip function, in tag order
    pub fn supported_kinds(&self) -> impl Iterator<Item = PayloadKind> + '_ {
        self.round_trips.keys().copied()
    }

    pub fn create_point3d_buffer(&self) -> Result<CreateBufferFn, BridgeError> {
        self.create_point3d
            .ok_or(BridgeError::MissingEntryPoint(self.platform.symbol(EntryPoint::CreatePoint3dBuffer)))
    }

    pub fn create_point3d_array_buffer(&self) -> Result<CreateBufferFn, BridgeError> {
        self.create_point3d_array.ok_or(BridgeError::MissingEntryPoint(
            self.platform.symbol(EntryPoint::CreatePoint3dArrayBuffer),
        ))
    }

    pub fn create_mesh_buffer(&self) -> Result<CreateMeshBufferFn, BridgeError> {
        self.create_mesh
            .ok_or(BridgeError::MissingEntryPoint(self.platform.symbol(EntryPoint::CreateMeshBuffer)))
    }

    pub fn buffer_size(&self) -> BufferSizeFn {
        self.buffer_size
    }

    pub fn free_buffer(&self) -> FreeBufferFn {
        self.free_buffer
    }
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints")
            .field("platform", &self.platform)
            .field("round_trips", &self.round_trips.keys().collect::<Vec<_>>())
            .field("library", &self.library_path())
            .finish()
    }
}
