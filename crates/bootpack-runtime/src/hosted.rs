use std::ffi::{c_char, CString};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::api::{RuntimeApi, PY_FILE_INPUT};
use crate::error::{BindingError, Result};
use crate::init::{build_init_config, os_cstring, InitSettings};
use crate::layout::{self, PyPreConfig};
use crate::library::RuntimeLibrary;

/// Exit status the hosted runtime uses for an unhandled exception.
pub const UNHANDLED_ERROR_EXIT: i32 = 1;

/// How start-up ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Running,
    /// Initialisation asked for a clean exit with this code.
    Exit(i32),
}

/// A hosted runtime the launcher can drive.
///
/// Implemented by [`DynamicRuntime`] for a real shared library; tests use a
/// scripted in-process implementation.
pub trait HostedRuntime {
    /// Initialise from `settings`.
    fn start(&mut self, settings: &InitSettings) -> Result<StartOutcome>;

    /// Execute one compiled bootstrap module under `name`.
    fn run_module(&mut self, name: &str, code: &[u8]) -> Result<()>;

    /// Put a code-bundle location on the module search path.
    fn add_code_bundle(&mut self, location: &str) -> Result<()>;

    /// Run one payload script in the main namespace.
    fn run_script(&mut self, name: &str, source: &[u8]) -> Result<()>;

    /// Flush and shut down. No-op unless started.
    fn finalize(&mut self);
}

/// The real runtime, bound by name from its shared library.
pub struct DynamicRuntime {
    // Field order matters: `api` holds addresses into `library`.
    api: RuntimeApi,
    library: RuntimeLibrary,
    version: u32,
    home: PathBuf,
    started: bool,
}

impl std::fmt::Debug for DynamicRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicRuntime")
            .field("library", &self.library)
            .field("version", &self.version)
            .field("started", &self.started)
            .finish()
    }
}

impl DynamicRuntime {
    /// Load `library_name` from `search_dirs` and bind its symbols.
    ///
    /// The version is checked first so an unsupported runtime is never loaded.
    pub fn load(search_dirs: &[&Path], library_name: &str, version: u32) -> Result<Self> {
        if !layout::is_supported(version) {
            return Err(BindingError::UnsupportedVersion(version));
        }
        let library = RuntimeLibrary::load(search_dirs, library_name)?;
        let api = RuntimeApi::bind(&library)?;
        info!(
            library = %library.path().display(),
            version,
            "runtime symbols bound"
        );
        Ok(Self {
            api,
            library,
            version,
            home: PathBuf::new(),
            started: false,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn pre_initialize(&self, settings: &InitSettings) -> Result<()> {
        let mut pre = PyPreConfig::zeroed();
        // SAFETY: `pre` matches the runtime's pre-config layout.
        let status = unsafe {
            (self.api.PyPreConfig_InitIsolatedConfig)(&mut pre);
            pre.configure_locale = 1;
            if let Some(utf8) = settings.options.utf8_mode {
                pre.utf8_mode = i32::from(utf8);
            }
            pre.dev_mode = i32::from(settings.options.dev_mode);
            (self.api.Py_PreInitialize)(&pre)
        };
        if status.is_ok() {
            Ok(())
        } else {
            Err(BindingError::PreInit(status.describe()))
        }
    }

    /// Report and clear a pending runtime exception, if any.
    fn report_exception(&self) {
        // SAFETY: only called while the runtime is initialised.
        unsafe {
            if !(self.api.PyErr_Occurred)().is_null() {
                (self.api.PyErr_Print)();
            }
        }
    }

    fn discard_exception(&self) {
        // SAFETY: only called while the runtime is initialised.
        unsafe {
            if !(self.api.PyErr_Occurred)().is_null() {
                (self.api.PyErr_Clear)();
            }
        }
    }

    /// `sys.frozen = 1`, `sys._bootpack_home = <home>`.
    fn set_frozen_markers(&self, home: &Path) -> Result<()> {
        let home_c = os_cstring(home.as_os_str())?;
        // SAFETY: runtime is initialised; every new reference is released.
        unsafe {
            let one = (self.api.PyLong_FromLong)(1);
            if one.is_null() {
                self.discard_exception();
                return Err(BindingError::Call("sys.frozen".to_string()));
            }
            let rc = (self.api.PySys_SetObject)(c"frozen".as_ptr(), one);
            (self.api.Py_DecRef)(one);
            if rc != 0 {
                self.discard_exception();
                return Err(BindingError::Call("sys.frozen".to_string()));
            }

            let value = (self.api.PyUnicode_DecodeFSDefault)(home_c.as_ptr());
            if value.is_null() {
                self.discard_exception();
                return Err(BindingError::Call("sys._bootpack_home".to_string()));
            }
            let rc = (self.api.PySys_SetObject)(c"_bootpack_home".as_ptr(), value);
            (self.api.Py_DecRef)(value);
            if rc != 0 {
                self.discard_exception();
                return Err(BindingError::Call("sys._bootpack_home".to_string()));
            }
        }
        Ok(())
    }

    fn ensure_started(&self) -> Result<()> {
        if self.started {
            Ok(())
        } else {
            Err(BindingError::NotStarted)
        }
    }
}

impl HostedRuntime for DynamicRuntime {
    fn start(&mut self, settings: &InitSettings) -> Result<StartOutcome> {
        if let Some(flag) = self.api.Py_FrozenFlag {
            // SAFETY: address of the runtime's global `int Py_FrozenFlag`.
            unsafe { *flag = 1 };
        }
        self.pre_initialize(settings)?;

        let mut config = build_init_config(&self.api, self.version, settings)?;
        // SAFETY: `config` is a fully populated record of this version.
        let status = unsafe { (self.api.Py_InitializeFromConfig)(config.as_ptr()) };
        drop(config);

        if status.is_exit() {
            info!(code = status.exitcode, "runtime requested exit during start-up");
            return Ok(StartOutcome::Exit(status.exitcode));
        }
        if !status.is_ok() {
            return Err(BindingError::Init(status.describe()));
        }
        self.started = true;
        self.home = settings.home.clone();
        self.set_frozen_markers(&settings.home)?;
        info!(version = self.version, home = %settings.home.display(), "runtime started");
        Ok(StartOutcome::Running)
    }

    fn run_module(&mut self, name: &str, code: &[u8]) -> Result<()> {
        self.ensure_started()?;
        let name_c = CString::new(name).map_err(|_| BindingError::InvalidString(name.to_string()))?;
        // SAFETY: runtime is initialised; `code` outlives the unmarshal call.
        unsafe {
            let object = (self.api.PyMarshal_ReadObjectFromString)(
                code.as_ptr() as *const c_char,
                code.len() as isize,
            );
            if object.is_null() {
                self.report_exception();
                return Err(BindingError::Module(name.to_string()));
            }
            let module = (self.api.PyImport_ExecCodeModule)(name_c.as_ptr(), object);
            (self.api.Py_DecRef)(object);
            if module.is_null() {
                self.report_exception();
                return Err(BindingError::Module(name.to_string()));
            }
            (self.api.Py_DecRef)(module);
        }
        debug!(module = name, "bootstrap module executed");
        Ok(())
    }

    fn add_code_bundle(&mut self, location: &str) -> Result<()> {
        self.ensure_started()?;
        let location_c =
            CString::new(location).map_err(|_| BindingError::InvalidString(location.to_string()))?;
        // SAFETY: runtime is initialised; `sys.path` is a borrowed reference.
        unsafe {
            let sys_path = (self.api.PySys_GetObject)(c"path".as_ptr());
            if sys_path.is_null() {
                return Err(BindingError::Call("sys.path is missing".to_string()));
            }
            let entry = (self.api.PyUnicode_DecodeFSDefault)(location_c.as_ptr());
            if entry.is_null() {
                self.discard_exception();
                return Err(BindingError::Call(format!("cannot decode {}", location)));
            }
            let rc = (self.api.PyList_Append)(sys_path, entry);
            (self.api.Py_DecRef)(entry);
            if rc != 0 {
                self.discard_exception();
                return Err(BindingError::Call(format!("cannot append {} to sys.path", location)));
            }
        }
        debug!(location, "code bundle installed");
        Ok(())
    }

    fn run_script(&mut self, name: &str, source: &[u8]) -> Result<()> {
        self.ensure_started()?;
        let source_c = CString::new(source)
            .map_err(|_| BindingError::InvalidString(format!("source of {}", name)))?;
        let file_c = os_cstring(self.home.join(format!("{}.py", name)).as_os_str())?;

        // SAFETY: runtime is initialised; `__main__` and its dict are borrowed
        // references, every new reference is released.
        unsafe {
            let code =
                (self.api.Py_CompileString)(source_c.as_ptr(), file_c.as_ptr(), PY_FILE_INPUT);
            if code.is_null() {
                self.report_exception();
                return Err(BindingError::Script(name.to_string()));
            }
            let main = (self.api.PyImport_AddModule)(c"__main__".as_ptr());
            if main.is_null() {
                (self.api.Py_DecRef)(code);
                self.report_exception();
                return Err(BindingError::Call("__main__ is unavailable".to_string()));
            }
            let file = (self.api.PyUnicode_DecodeFSDefault)(file_c.as_ptr());
            if file.is_null() {
                self.discard_exception();
            } else {
                if (self.api.PyObject_SetAttrString)(main, c"__file__".as_ptr(), file) != 0 {
                    self.discard_exception();
                }
                (self.api.Py_DecRef)(file);
            }

            let globals = (self.api.PyModule_GetDict)(main);
            let result = (self.api.PyEval_EvalCode)(code, globals, globals);
            (self.api.Py_DecRef)(code);
            if result.is_null() {
                self.report_exception();
                return Err(BindingError::Script(name.to_string()));
            }
            (self.api.Py_DecRef)(result);
        }
        debug!(script = name, "script finished");
        Ok(())
    }

    fn finalize(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        if let Some(is_initialized) = self.api.Py_IsInitialized {
            // SAFETY: no-argument query.
            if unsafe { is_initialized() } == 0 {
                return;
            }
        }
        // SAFETY: runtime was started by this value and not finalised yet.
        let rc = unsafe { (self.api.Py_FinalizeEx)() };
        if rc != 0 {
            warn!("runtime reported an error while flushing buffered data at shutdown");
        }
        debug!("runtime finalized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unsupported_version_is_rejected_before_loading() {
        // The directory is empty: a version check that ran after loading
        // would report LibraryNotFound instead.
        let dir = TempDir::new().unwrap();
        let err = DynamicRuntime::load(&[dir.path()], "libruntime.so", 307).unwrap_err();
        assert!(matches!(err, BindingError::UnsupportedVersion(307)));
    }

    #[test]
    fn test_supported_version_reaches_library_search() {
        let dir = TempDir::new().unwrap();
        let err = DynamicRuntime::load(&[dir.path()], "libruntime.so", 311).unwrap_err();
        assert!(matches!(err, BindingError::LibraryNotFound { .. }));
    }
}
