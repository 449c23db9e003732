//! `#[repr(C)]` mirrors of the runtime's initialisation records.
//!
//! The runtime's headers are never compiled against. Records whose layout is
//! stable across all supported versions live here; the configuration record
//! differs per minor version and has one module each. [`InitConfig`] picks
//! the layout from the version tag in the archive cookie.

use std::ffi::{c_char, c_int, c_ulong, c_void};

use crate::error::{BindingError, Result};

mod v308;
mod v309;
mod v310;
mod v311;
mod v312;

pub use v308::PyConfigV308;
pub use v309::PyConfigV309;
pub use v310::PyConfigV310;
pub use v311::PyConfigV311;
pub use v312::PyConfigV312;

/// Platform `wchar_t`.
#[cfg(windows)]
pub type WChar = u16;
#[cfg(not(windows))]
pub type WChar = i32;

pub const STATUS_TYPE_OK: c_int = 0;
pub const STATUS_TYPE_ERROR: c_int = 1;
pub const STATUS_TYPE_EXIT: c_int = 2;

/// Result record returned by value from the initialisation API.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PyStatus {
    pub _type: c_int,
    pub func: *const c_char,
    pub err_msg: *const c_char,
    pub exitcode: c_int,
}

impl PyStatus {
    pub fn is_ok(&self) -> bool {
        self._type == STATUS_TYPE_OK
    }

    pub fn is_exit(&self) -> bool {
        self._type == STATUS_TYPE_EXIT
    }

    /// `func: err_msg`, or a placeholder when the runtime left them unset.
    pub fn describe(&self) -> String {
        // SAFETY: when non-null both point at static NUL-terminated strings
        // owned by the runtime.
        let text = |ptr: *const c_char| {
            if ptr.is_null() {
                None
            } else {
                Some(unsafe { std::ffi::CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
            }
        };
        match (text(self.func), text(self.err_msg)) {
            (Some(func), Some(msg)) => format!("{}: {}", func, msg),
            (None, Some(msg)) => msg,
            (Some(func), None) => func,
            (None, None) => format!("status type {}", self._type),
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct PyWideStringList {
    pub length: isize,
    pub items: *mut *mut WChar,
}

/// Pre-initialisation record; identical for every supported version.
#[repr(C)]
#[derive(Debug)]
pub struct PyPreConfig {
    pub _config_init: c_int,
    pub parse_argv: c_int,
    pub isolated: c_int,
    pub use_environment: c_int,
    pub configure_locale: c_int,
    pub coerce_c_locale: c_int,
    pub coerce_c_locale_warn: c_int,
    #[cfg(windows)]
    pub legacy_windows_fs_encoding: c_int,
    pub utf8_mode: c_int,
    pub dev_mode: c_int,
    pub allocator: c_int,
}

impl PyPreConfig {
    pub fn zeroed() -> Self {
        // SAFETY: plain integers; all-zero is a valid bit pattern and the
        // runtime's init function overwrites it before use.
        unsafe { std::mem::zeroed() }
    }
}

/// Mutable views of the configuration fields the launcher writes.
///
/// Every layout exposes the same set, so population code is written once.
pub struct ConfigFields<'a> {
    pub isolated: &'a mut c_int,
    pub use_environment: &'a mut c_int,
    pub dev_mode: &'a mut c_int,
    pub install_signal_handlers: &'a mut c_int,
    pub use_hash_seed: &'a mut c_int,
    pub hash_seed: &'a mut c_ulong,
    pub parse_argv: &'a mut c_int,
    pub argv: &'a mut PyWideStringList,
    pub program_name: &'a mut *mut WChar,
    pub xoptions: &'a mut PyWideStringList,
    pub warnoptions: &'a mut PyWideStringList,
    pub site_import: &'a mut c_int,
    pub optimization_level: &'a mut c_int,
    pub write_bytecode: &'a mut c_int,
    pub verbose: &'a mut c_int,
    pub user_site_directory: &'a mut c_int,
    pub configure_c_stdio: &'a mut c_int,
    pub buffered_stdio: &'a mut c_int,
    pub home: &'a mut *mut WChar,
    pub module_search_paths_set: &'a mut c_int,
    pub module_search_paths: &'a mut PyWideStringList,
}

/// A per-version configuration record.
pub trait ConfigLayout: Sized {
    /// `major * 100 + minor`.
    const VERSION: u32;

    fn fields(&mut self) -> ConfigFields<'_>;

    fn zeroed() -> Box<Self> {
        // SAFETY: layouts hold only integers and raw pointers.
        Box::new(unsafe { std::mem::zeroed() })
    }
}

macro_rules! config_layout {
    ($ty:ident, $version:expr) => {
        impl $crate::layout::ConfigLayout for $ty {
            const VERSION: u32 = $version;

            fn fields(&mut self) -> $crate::layout::ConfigFields<'_> {
                $crate::layout::ConfigFields {
                    isolated: &mut self.isolated,
                    use_environment: &mut self.use_environment,
                    dev_mode: &mut self.dev_mode,
                    install_signal_handlers: &mut self.install_signal_handlers,
                    use_hash_seed: &mut self.use_hash_seed,
                    hash_seed: &mut self.hash_seed,
                    parse_argv: &mut self.parse_argv,
                    argv: &mut self.argv,
                    program_name: &mut self.program_name,
                    xoptions: &mut self.xoptions,
                    warnoptions: &mut self.warnoptions,
                    site_import: &mut self.site_import,
                    optimization_level: &mut self.optimization_level,
                    write_bytecode: &mut self.write_bytecode,
                    verbose: &mut self.verbose,
                    user_site_directory: &mut self.user_site_directory,
                    configure_c_stdio: &mut self.configure_c_stdio,
                    buffered_stdio: &mut self.buffered_stdio,
                    home: &mut self.home,
                    module_search_paths_set: &mut self.module_search_paths_set,
                    module_search_paths: &mut self.module_search_paths,
                }
            }
        }
    };
}
pub(crate) use config_layout;

/// Supported version tags.
pub const SUPPORTED_VERSIONS: [u32; 5] = [
    PyConfigV308::VERSION,
    PyConfigV309::VERSION,
    PyConfigV310::VERSION,
    PyConfigV311::VERSION,
    PyConfigV312::VERSION,
];

pub fn is_supported(version: u32) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// A configuration record with its layout fixed by version.
pub enum InitConfig {
    V308(Box<PyConfigV308>),
    V309(Box<PyConfigV309>),
    V310(Box<PyConfigV310>),
    V311(Box<PyConfigV311>),
    V312(Box<PyConfigV312>),
}

impl InitConfig {
    /// Allocate a zeroed record for `version`. Unknown versions fail before
    /// anything is allocated.
    pub fn allocate(version: u32) -> Result<Self> {
        Ok(match version {
            308 => Self::V308(PyConfigV308::zeroed()),
            309 => Self::V309(PyConfigV309::zeroed()),
            310 => Self::V310(PyConfigV310::zeroed()),
            311 => Self::V311(PyConfigV311::zeroed()),
            312 => Self::V312(PyConfigV312::zeroed()),
            other => return Err(BindingError::UnsupportedVersion(other)),
        })
    }

    pub fn version(&self) -> u32 {
        match self {
            Self::V308(_) => PyConfigV308::VERSION,
            Self::V309(_) => PyConfigV309::VERSION,
            Self::V310(_) => PyConfigV310::VERSION,
            Self::V311(_) => PyConfigV311::VERSION,
            Self::V312(_) => PyConfigV312::VERSION,
        }
    }

    pub fn fields(&mut self) -> ConfigFields<'_> {
        match self {
            Self::V308(c) => c.fields(),
            Self::V309(c) => c.fields(),
            Self::V310(c) => c.fields(),
            Self::V311(c) => c.fields(),
            Self::V312(c) => c.fields(),
        }
    }

    /// Opaque pointer handed to the runtime's config functions.
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        match self {
            Self::V308(c) => &mut **c as *mut PyConfigV308 as *mut c_void,
            Self::V309(c) => &mut **c as *mut PyConfigV309 as *mut c_void,
            Self::V310(c) => &mut **c as *mut PyConfigV310 as *mut c_void,
            Self::V311(c) => &mut **c as *mut PyConfigV311 as *mut c_void,
            Self::V312(c) => &mut **c as *mut PyConfigV312 as *mut c_void,
        }
    }
}
