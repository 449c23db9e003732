use std::ffi::{c_int, c_ulong};

use super::{config_layout, PyWideStringList, WChar};

/// Configuration record of runtime 3.11.
#[repr(C)]
pub struct PyConfigV311 {
    pub _config_init: c_int,
    pub isolated: c_int,
    pub use_environment: c_int,
    pub dev_mode: c_int,
    pub install_signal_handlers: c_int,
    pub use_hash_seed: c_int,
    pub hash_seed: c_ulong,
    pub faulthandler: c_int,
    pub tracemalloc: c_int,
    pub import_time: c_int,
    pub code_debug_ranges: c_int,
    pub show_ref_count: c_int,
    pub dump_refs: c_int,
    pub dump_refs_file: *mut WChar,
    pub malloc_stats: c_int,
    pub filesystem_encoding: *mut WChar,
    pub filesystem_errors: *mut WChar,
    pub pycache_prefix: *mut WChar,
    pub parse_argv: c_int,
    pub orig_argv: PyWideStringList,
    pub argv: PyWideStringList,
    pub xoptions: PyWideStringList,
    pub warnoptions: PyWideStringList,
    pub site_import: c_int,
    pub bytes_warning: c_int,
    pub warn_default_encoding: c_int,
    pub inspect: c_int,
    pub interactive: c_int,
    pub optimization_level: c_int,
    pub parser_debug: c_int,
    pub write_bytecode: c_int,
    pub verbose: c_int,
    pub quiet: c_int,
    pub user_site_directory: c_int,
    pub configure_c_stdio: c_int,
    pub buffered_stdio: c_int,
    pub stdio_encoding: *mut WChar,
    pub stdio_errors: *mut WChar,
    #[cfg(windows)]
    pub legacy_windows_stdio: c_int,
    pub check_hash_pycs_mode: *mut WChar,
    pub use_frozen_modules: c_int,
    pub safe_path: c_int,
    pub int_max_str_digits: c_int,
    pub pathconfig_warnings: c_int,
    pub program_name: *mut WChar,
    pub pythonpath_env: *mut WChar,
    pub home: *mut WChar,
    pub platlibdir: *mut WChar,
    pub module_search_paths_set: c_int,
    pub module_search_paths: PyWideStringList,
    pub stdlib_dir: *mut WChar,
    pub executable: *mut WChar,
    pub base_executable: *mut WChar,
    pub prefix: *mut WChar,
    pub base_prefix: *mut WChar,
    pub exec_prefix: *mut WChar,
    pub base_exec_prefix: *mut WChar,
    pub skip_source_first_line: c_int,
    pub run_command: *mut WChar,
    pub run_module: *mut WChar,
    pub run_filename: *mut WChar,
    pub _install_importlib: c_int,
    pub _init_main: c_int,
    pub _isolated_interpreter: c_int,
    pub _is_python_build: c_int,
}

config_layout!(PyConfigV311, 311);
