//! Loading the hosted runtime shared library.
//!
//! # Platform-specific behaviour
//!
//! - **Unix**: `dlopen(RTLD_NOW | RTLD_GLOBAL)`, so extension modules loaded
//!   later by the runtime resolve against its symbols.
//! - **Windows**: `LoadLibraryExW(LOAD_WITH_ALTERED_SEARCH_PATH)`, after a
//!   best-effort load of a bundled `ucrtbase.dll` for systems without the
//!   universal C runtime update.

use std::path::{Path, PathBuf};

use tracing::debug;
#[cfg(windows)]
use tracing::warn;

use crate::error::{BindingError, Result};

/// C runtime compatibility shim loaded ahead of the runtime library on Windows.
#[cfg(windows)]
const CRT_SHIM: &str = "ucrtbase.dll";

/// An opened runtime library. Symbols copied out of it are only valid while
/// this value is alive.
pub struct RuntimeLibrary {
    library: libloading::Library,
    path: PathBuf,
    #[cfg(windows)]
    _crt_shim: Option<libloading::Library>,
}

impl std::fmt::Debug for RuntimeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeLibrary")
            .field("path", &self.path)
            .finish()
    }
}

impl RuntimeLibrary {
    /// Load `name` from the first of `search_dirs` that contains it.
    pub fn load(search_dirs: &[&Path], name: &str) -> Result<Self> {
        let path = search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| BindingError::LibraryNotFound {
                name: name.to_string(),
                searched: search_dirs
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        #[cfg(windows)]
        let crt_shim = path.parent().and_then(load_crt_shim);

        let library = open(&path).map_err(|source| BindingError::LibraryLoad {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "runtime library loaded");

        Ok(Self {
            library,
            path,
            #[cfg(windows)]
            _crt_shim: crt_shim,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a symbol that must exist.
    ///
    /// # Safety
    ///
    /// `T` must match the symbol's real type: a function pointer with the
    /// exact C signature, or a raw pointer for data symbols.
    pub unsafe fn required<T: Copy>(&self, name: &'static str) -> Result<T> {
        self.library
            .get::<T>(name.as_bytes())
            .map(|symbol| *symbol)
            .map_err(|source| BindingError::MissingSymbol {
                symbol: name,
                source,
            })
    }

    /// Resolve a symbol that older runtime versions may lack.
    ///
    /// # Safety
    ///
    /// Same contract as [`RuntimeLibrary::required`].
    pub unsafe fn optional<T: Copy>(&self, name: &'static str) -> Option<T> {
        match self.library.get::<T>(name.as_bytes()) {
            Ok(symbol) => Some(*symbol),
            Err(_) => {
                debug!(symbol = name, "optional runtime symbol not present");
                None
            }
        }
    }
}

#[cfg(unix)]
fn open(path: &Path) -> std::result::Result<libloading::Library, libloading::Error> {
    use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_NOW};
    // SAFETY: loading runs the library's initialisers; the runtime library
    // is trusted content of the archive.
    unsafe { Library::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map(Into::into)
}

#[cfg(windows)]
fn open(path: &Path) -> std::result::Result<libloading::Library, libloading::Error> {
    use libloading::os::windows::{Library, LOAD_WITH_ALTERED_SEARCH_PATH};
    unsafe { Library::load_with_flags(path, LOAD_WITH_ALTERED_SEARCH_PATH) }.map(Into::into)
}

#[cfg(windows)]
fn load_crt_shim(dir: &Path) -> Option<libloading::Library> {
    let shim = dir.join(CRT_SHIM);
    if !shim.is_file() {
        return None;
    }
    match open(&shim) {
        Ok(library) => {
            debug!(path = %shim.display(), "C runtime shim loaded");
            Some(library)
        }
        Err(e) => {
            warn!(path = %shim.display(), error = %e, "C runtime shim failed to load");
            None
        }
    }
}
