//! Making the home directory visible to the dynamic loader.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

#[cfg(not(windows))]
use bootpack_core::config::env_keys::libpath::{original_var, LIBRARY_PATH_VAR};
#[cfg(not(windows))]
use bootpack_core::config::{env_os, set_env_var};
use tracing::debug;

use crate::error::Result;

/// Whether `home` is already one of the entries of `current`.
pub fn contains_home(home: &Path, current: Option<&OsStr>) -> bool {
    current
        .map(|value| std::env::split_paths(value).any(|p| p == home))
        .unwrap_or(false)
}

/// `home` followed by the existing entries of `current`.
pub fn augmented_value(home: &Path, current: Option<&OsStr>) -> Result<OsString> {
    let mut entries: Vec<PathBuf> = vec![home.to_path_buf()];
    if let Some(value) = current {
        entries.extend(std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty()));
    }
    std::env::join_paths(entries)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e).into())
}

/// Prepend `home` to the library search path variable, keeping the previous
/// value in `<VAR>_ORIG`. Returns `true` when the variable changed.
#[cfg(not(windows))]
pub fn expose_home(home: &Path) -> Result<bool> {
    let current = env_os(LIBRARY_PATH_VAR);
    if contains_home(home, current.as_deref()) {
        return Ok(false);
    }
    if let Some(original) = &current {
        let original_key = original_var();
        if env_os(&original_key).is_none() {
            set_env_var(&original_key, original);
        }
    }
    let value = augmented_value(home, current.as_deref())?;
    debug!(var = LIBRARY_PATH_VAR, home = %home.display(), "library search path augmented");
    set_env_var(LIBRARY_PATH_VAR, value);
    Ok(true)
}

/// Register `home` as the DLL search directory. `PATH` is left alone.
#[cfg(windows)]
pub fn expose_home(home: &Path) -> Result<bool> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::System::LibraryLoader::SetDllDirectoryW;

    let wide: Vec<u16> = home.as_os_str().encode_wide().chain(Some(0)).collect();
    // SAFETY: `wide` is NUL-terminated and outlives the call.
    let ok = unsafe { SetDllDirectoryW(wide.as_ptr()) };
    if ok == 0 {
        return Err(io::Error::last_os_error().into());
    }
    debug!(home = %home.display(), "DLL directory set");
    Ok(false)
}
