//! Environment variable names.
//!
//! Every variable the launcher reads or writes is named here; business code
//! goes through `loader` / `schema` instead of spelling keys inline.

/// Parent → child handshake.
pub mod handshake {
    /// Extraction directory created by the onefile parent. Its presence tells
    /// the child that extraction already happened.
    pub const BOOTPACK_EXTRACT_DIR: &str = "BOOTPACK_EXTRACT_DIR";

    /// Transient marker set on a process that re-executed itself in place
    /// (single process, no fork) to pick up an augmented library path.
    pub const BOOTPACK_RESTARTED: &str = "BOOTPACK_RESTARTED";
}

/// Extraction behaviour.
pub mod unpack {
    /// When truthy, overwriting an existing file during extraction is an error
    /// instead of a warning.
    pub const BOOTPACK_STRICT_UNPACK_MODE: &str = "BOOTPACK_STRICT_UNPACK_MODE";
}

/// Logging.
pub mod observability {
    pub const BOOTPACK_QUIET: &str = "BOOTPACK_QUIET";
    pub const BOOTPACK_LOG_LEVEL: &str = "BOOTPACK_LOG_LEVEL";
    pub const BOOTPACK_LOG_JSON: &str = "BOOTPACK_LOG_JSON";
}

/// Shared-library search path variable of the current platform.
pub mod libpath {
    #[cfg(target_os = "macos")]
    pub const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";

    #[cfg(target_os = "aix")]
    pub const LIBRARY_PATH_VAR: &str = "LIBPATH";

    #[cfg(all(unix, not(any(target_os = "macos", target_os = "aix"))))]
    pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

    #[cfg(windows)]
    pub const LIBRARY_PATH_VAR: &str = "PATH";

    /// Suffix of the variable that keeps the value seen before augmentation.
    pub const ORIGINAL_SUFFIX: &str = "_ORIG";

    /// Name of the variable holding the pre-augmentation value.
    pub fn original_var() -> String {
        format!("{}{}", LIBRARY_PATH_VAR, ORIGINAL_SUFFIX)
    }
}
