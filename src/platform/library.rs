//! Locating and loading the native engine's shared library
//!
//! Search order: configured search paths, the executable's directory, its
//! parent, the current directory, then the bare file name so the system
//! loader can try its own search path. Every attempt is written to the
//! diagnostic log.

use std::env;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use indexmap::IndexSet;

use super::symbols::Platform;
use crate::config::BridgeConfig;
use crate::diagnostics::DiagnosticLog;

/// Loaded shared library. Closed on drop.
#[derive(Debug)]
pub struct NativeLibrary {
    handle: NonNull<c_void>,
    path: PathBuf,
}

// SAFETY: a module handle is process-global and the loader APIs are
// thread-safe; the handle is only closed in Drop.
unsafe impl Send for NativeLibrary {}
unsafe impl Sync for NativeLibrary {}

impl NativeLibrary {
    pub fn open(path: &Path) -> Result<Self, anyhow::Error> {
        let handle = sys::open(path)
            .map_err(|err| anyhow::anyhow!("Failed to load {}: {}", path.display(), err))?;
        let handle = NonNull::new(handle)
            .ok_or_else(|| anyhow::anyhow!("Loader returned a null handle for {}", path.display()))?;
        Ok(Self { handle, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw address of an exported symbol
    pub fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        NonNull::new(sys::symbol(self.handle.as_ptr(), name))
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        sys::close(self.handle.as_ptr());
    }
}

/// File name to look for: the configured override or the platform default
pub fn library_file_name(config: &BridgeConfig) -> String {
    config
        .library_name
        .clone()
        .unwrap_or_else(|| Platform::current().library_file_name().to_string())
}

/// Every path `locate` will try, in order, without duplicates
pub fn candidate_paths(config: &BridgeConfig) -> Vec<PathBuf> {
    let file_name = library_file_name(config);
    let mut candidates = IndexSet::new();

    for dir in &config.search_paths {
        candidates.insert(dir.join(&file_name));
    }
    if let Some(exe_dir) = env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        candidates.insert(exe_dir.join(&file_name));
        if let Some(parent) = exe_dir.parent() {
            candidates.insert(parent.join(&file_name));
        }
    }
    if let Ok(cwd) = env::current_dir() {
        candidates.insert(cwd.join(&file_name));
    }
    candidates.insert(PathBuf::from(&file_name));

    candidates.into_iter().collect()
}

/// Load the native library from the first candidate that works
pub fn locate(config: &BridgeConfig, log: &DiagnosticLog) -> Result<NativeLibrary, anyhow::Error> {
    let candidates = candidate_paths(config);
    let bare = PathBuf::from(library_file_name(config));

    for candidate in &candidates {
        // the bare name is resolved by the system loader, not the filesystem
        if *candidate != bare && !candidate.exists() {
            log.info(format!("Native library not found at {}", candidate.display()));
            continue;
        }
        match NativeLibrary::open(candidate) {
            Ok(library) => {
                log.info(format!("Loaded native library from {}", candidate.display()));
                return Ok(library);
            }
            Err(err) => log.warn(format!("{:#}", err)),
        }
    }

    let message = format!(
        "Native library {} not found after {} attempts",
        bare.display(),
        candidates.len()
    );
    log.error(message.clone());
    Err(anyhow::anyhow!(message))
}

#[cfg(unix)]
mod sys {
    use std::ffi::{c_void, CStr, CString};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;

    fn last_error() -> String {
        // SAFETY: dlerror returns null or a thread-local C string
        unsafe {
            let err = libc::dlerror();
            if err.is_null() {
                "unknown loader error".to_string()
            } else {
                CStr::from_ptr(err).to_string_lossy().into_owned()
            }
        }
    }

    pub fn open(path: &Path) -> Result<*mut c_void, String> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| "path contains a NUL byte".to_string())?;
        // SAFETY: c_path is a valid NUL-terminated string
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            Err(last_error())
        } else {
            Ok(handle)
        }
    }

    pub fn symbol(handle: *mut c_void, name: &str) -> *mut c_void {
        match CString::new(name) {
            // SAFETY: handle came from dlopen and is still open
            Ok(name) => unsafe { libc::dlsym(handle, name.as_ptr()) },
            Err(_) => ptr::null_mut(),
        }
    }

    pub fn close(handle: *mut c_void) {
        // SAFETY: called once from NativeLibrary::drop
        unsafe {
            libc::dlclose(handle);
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::ffi::{c_void, CString};
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;

    use winapi::shared::minwindef::HMODULE;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::libloaderapi::{FreeLibrary, GetProcAddress, LoadLibraryW};

    pub fn open(path: &Path) -> Result<*mut c_void, String> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
        // SAFETY: wide is NUL-terminated
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            Err(format!("LoadLibraryW failed with error {}", unsafe { GetLastError() }))
        } else {
            Ok(handle.cast())
        }
    }

    pub fn symbol(handle: *mut c_void, name: &str) -> *mut c_void {
        match CString::new(name) {
            // SAFETY: handle came from LoadLibraryW and is still loaded
            Ok(name) => unsafe { GetProcAddress(handle as HMODULE, name.as_ptr()) as *mut c_void },
            Err(_) => ptr::null_mut(),
        }
    }

    pub fn close(handle: *mut c_void) {
        // SAFETY: called once from NativeLibrary::drop
        unsafe {
            FreeLibrary(handle as HMODULE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_start_with_search_paths_and_end_with_bare_name() {
        let config = BridgeConfig {
            library_name: Some("libcustom_engine.so".to_string()),
            search_paths: vec![PathBuf::from("/opt/geo/lib"), PathBuf::from("/opt/geo/lib")],
            ..BridgeConfig::default()
        };
        let candidates = candidate_paths(&config);
        assert_eq!(candidates[0], PathBuf::from("/opt/geo/lib/libcustom_engine.so"));
        assert_eq!(candidates.last(), Some(&PathBuf::from("libcustom_engine.so")));
        // duplicates collapse
        assert_eq!(
            candidates.iter().filter(|c| c.starts_with("/opt/geo/lib")).count(),
            1
        );
    }

    #[test]
    fn test_missing_library_logs_every_attempt() {
        let config = BridgeConfig {
            library_name: Some("definitely_not_a_real_geobridge_library.so".to_string()),
            ..BridgeConfig::default()
        };
        let log = DiagnosticLog::new(50);
        assert!(locate(&config, &log).is_err());

        let messages = log.messages();
        let expected = candidate_paths(&config).len();
        // one entry per attempt plus the final failure
        assert_eq!(messages.len(), expected + 1);
        assert!(messages.last().unwrap().contains("not found after"));
    }
}
