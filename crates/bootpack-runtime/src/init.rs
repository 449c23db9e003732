//! Building the runtime's initialisation record.
//!
//! [`InitSettings`] is the runtime-independent description of a start-up;
//! [`build_init_config`] turns it into the version-specific record through
//! the runtime's own setter functions.

use std::ffi::{c_char, c_int, c_ulong, c_void, CString, OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::api::RuntimeApi;
use crate::error::{BindingError, Result};
use crate::layout::{InitConfig, PyStatus, PyWideStringList, WChar};
use crate::options::RuntimeOptions;

/// Entries under home that make up the module search path, in order.
pub const SEARCH_SUBPATHS: [&str; 2] = ["base_library.zip", "lib-dynload"];

/// Module search path for a given home directory.
pub fn module_search_paths(home: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = SEARCH_SUBPATHS.iter().map(|sub| home.join(sub)).collect();
    paths.push(home.to_path_buf());
    paths
}

/// Everything the runtime needs to know at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSettings {
    /// Reported as the program name; the launcher's own executable.
    pub program_name: PathBuf,
    pub home: PathBuf,
    pub module_search_paths: Vec<PathBuf>,
    pub argv: Vec<OsString>,
    pub options: RuntimeOptions,
}

impl InitSettings {
    pub fn new(
        program_name: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
        argv: Vec<OsString>,
        options: RuntimeOptions,
    ) -> Self {
        let home = home.into();
        Self {
            program_name: program_name.into(),
            module_search_paths: module_search_paths(&home),
            home,
            argv,
            options,
        }
    }
}

/// A populated record. Released through `PyConfig_Clear` on drop.
pub struct OwnedConfig {
    config: InitConfig,
    clear: unsafe extern "C" fn(*mut c_void),
}

impl OwnedConfig {
    pub fn version(&self) -> u32 {
        self.config.version()
    }

    pub fn as_ptr(&mut self) -> *const c_void {
        self.config.as_mut_ptr()
    }
}

impl Drop for OwnedConfig {
    fn drop(&mut self) {
        // SAFETY: the record was initialised by PyConfig_InitIsolatedConfig.
        unsafe { (self.clear)(self.config.as_mut_ptr()) };
    }
}

/// Allocate the record for `version` and populate it from `settings`.
///
/// An unsupported version fails before any allocation or runtime call.
pub fn build_init_config(
    api: &RuntimeApi,
    version: u32,
    settings: &InitSettings,
) -> Result<OwnedConfig> {
    let mut config = InitConfig::allocate(version)?;
    // SAFETY: the pointer addresses a zeroed record of this version's layout.
    unsafe { (api.PyConfig_InitIsolatedConfig)(config.as_mut_ptr()) };
    let mut owned = OwnedConfig {
        config,
        clear: api.PyConfig_Clear,
    };
    populate(api, &mut owned.config, settings)?;
    Ok(owned)
}

fn populate(api: &RuntimeApi, config: &mut InitConfig, settings: &InitSettings) -> Result<()> {
    let opts = &settings.options;

    let (program_name, home, search_paths, warnoptions, xoptions) = {
        let f = config.fields();
        *f.isolated = 1;
        *f.use_environment = 0;
        *f.parse_argv = 0;
        *f.install_signal_handlers = 1;
        *f.site_import = 0;
        *f.write_bytecode = 0;
        *f.user_site_directory = 0;
        *f.configure_c_stdio = 1;
        *f.verbose = opts.verbose as c_int;
        *f.optimization_level = opts.optimize as c_int;
        *f.buffered_stdio = c_int::from(!opts.unbuffered);
        *f.dev_mode = c_int::from(opts.dev_mode);
        if let Some(seed) = opts.hash_seed {
            *f.use_hash_seed = 1;
            *f.hash_seed = seed as c_ulong;
        }
        *f.module_search_paths_set = 1;

        let program_name: *mut *mut WChar = f.program_name;
        let home: *mut *mut WChar = f.home;
        let search_paths: *mut PyWideStringList = f.module_search_paths;
        let warnoptions: *mut PyWideStringList = f.warnoptions;
        let xoptions: *mut PyWideStringList = f.xoptions;
        (program_name, home, search_paths, warnoptions, xoptions)
    };
    let record = config.as_mut_ptr();

    // SAFETY: all field pointers point into `record`, which stays allocated
    // and initialised for the duration of these calls.
    unsafe {
        set_string(api, record, program_name, settings.program_name.as_os_str(), "program_name")?;
        set_string(api, record, home, settings.home.as_os_str(), "home")?;
        for path in &settings.module_search_paths {
            append_wide(api, search_paths, path.as_os_str(), "module_search_paths")?;
        }
        for warning in &opts.warn_options {
            append_wide(api, warnoptions, OsStr::new(warning), "warnoptions")?;
        }
        for x in &opts.x_options {
            append_wide(api, xoptions, OsStr::new(x), "xoptions")?;
        }
        set_argv(api, record, &settings.argv)?;
    }
    Ok(())
}

pub(crate) fn os_cstring(value: &OsStr) -> Result<CString> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        value.as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = value.to_string_lossy().into_owned().into_bytes();

    CString::new(bytes)
        .map_err(|_| BindingError::InvalidString(value.to_string_lossy().into_owned()))
}

fn check(status: PyStatus, what: &str) -> Result<()> {
    if status.is_ok() {
        Ok(())
    } else {
        Err(BindingError::Config(format!("{}: {}", what, status.describe())))
    }
}

unsafe fn set_string(
    api: &RuntimeApi,
    record: *mut c_void,
    field: *mut *mut WChar,
    value: &OsStr,
    what: &str,
) -> Result<()> {
    let value = os_cstring(value)?;
    check((api.PyConfig_SetBytesString)(record, field, value.as_ptr()), what)
}

unsafe fn append_wide(
    api: &RuntimeApi,
    list: *mut PyWideStringList,
    value: &OsStr,
    what: &str,
) -> Result<()> {
    let value = os_cstring(value)?;
    let wide = (api.Py_DecodeLocale)(value.as_ptr(), std::ptr::null_mut());
    if wide.is_null() {
        return Err(BindingError::Config(format!(
            "{}: cannot decode {:?}",
            what,
            value.to_string_lossy()
        )));
    }
    let status = (api.PyWideStringList_Append)(list, wide);
    (api.PyMem_RawFree)(wide as *mut c_void);
    check(status, what)
}

unsafe fn set_argv(api: &RuntimeApi, record: *mut c_void, argv: &[OsString]) -> Result<()> {
    let owned = argv
        .iter()
        .map(|arg| os_cstring(arg))
        .collect::<Result<Vec<_>>>()?;
    let pointers: Vec<*mut c_char> = owned.iter().map(|arg| arg.as_ptr() as *mut c_char).collect();
    check(
        (api.PyConfig_SetBytesArgv)(record, pointers.len() as isize, pointers.as_ptr()),
        "argv",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_paths_are_under_home() {
        let home = Path::new("/opt/app");
        assert_eq!(
            module_search_paths(home),
            vec![
                PathBuf::from("/opt/app/base_library.zip"),
                PathBuf::from("/opt/app/lib-dynload"),
                PathBuf::from("/opt/app"),
            ]
        );
    }

    #[test]
    fn test_settings_derive_search_paths() {
        let settings = InitSettings::new(
            "/opt/app/tool",
            "/tmp/_bpX",
            vec![OsString::from("tool"), OsString::from("--flag")],
            RuntimeOptions::default(),
        );
        assert_eq!(settings.module_search_paths.len(), 3);
        assert_eq!(settings.module_search_paths[2], PathBuf::from("/tmp/_bpX"));
        assert_eq!(settings.argv.len(), 2);
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        assert!(matches!(
            os_cstring(OsStr::new("a\0b")),
            Err(BindingError::InvalidString(_))
        ));
        assert_eq!(os_cstring(OsStr::new("ok")).unwrap().as_bytes(), b"ok");
    }
}
