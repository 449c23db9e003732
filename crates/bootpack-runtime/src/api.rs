//! Name-based symbol table for the hosted runtime.
//!
//! The launcher never links against the runtime. Every entry point it calls
//! is listed once below with its C signature and resolved by name from the
//! loaded library. Required symbols abort binding when missing. Optional
//! symbols are `None` on runtime versions that lack them.

use std::ffi::{c_char, c_int, c_long, c_void};

use crate::error::Result;
use crate::layout::{PyPreConfig, PyStatus, PyWideStringList, WChar};
use crate::library::RuntimeLibrary;

/// Opaque runtime object.
#[repr(C)]
pub struct PyObject {
    _private: [u8; 0],
}

/// Start symbol for source compiled as a module body.
pub const PY_FILE_INPUT: c_int = 257;

macro_rules! runtime_api {
    (
        required {
            $( fn $name:ident ( $( $arg:ty ),* ) $( -> $ret:ty )? ; )*
        }
        optional {
            $( $oname:ident : $otype:ty ; )*
        }
    ) => {
        /// Resolved runtime entry points.
        ///
        /// Copies of raw addresses: the [`RuntimeLibrary`] they came from must
        /// outlive this table.
        #[allow(non_snake_case)]
        pub struct RuntimeApi {
            $( pub $name: unsafe extern "C" fn( $( $arg ),* ) $( -> $ret )?, )*
            $( pub $oname: Option<$otype>, )*
        }

        impl RuntimeApi {
            /// Names of every required symbol, in declaration order.
            pub const REQUIRED: &'static [&'static str] = &[ $( stringify!($name) ),* ];

            /// Names of every optional symbol.
            pub const OPTIONAL: &'static [&'static str] = &[ $( stringify!($oname) ),* ];

            /// Resolve the whole table. The first missing required symbol fails.
            pub fn bind(library: &RuntimeLibrary) -> Result<Self> {
                // SAFETY: each type below is the symbol's declared C signature.
                unsafe {
                    Ok(Self {
                        $( $name: library.required::<
                            unsafe extern "C" fn( $( $arg ),* ) $( -> $ret )?
                        >(stringify!($name))?, )*
                        $( $oname: library.optional::<$otype>(stringify!($oname)), )*
                    })
                }
            }
        }
    };
}

runtime_api! {
    required {
        fn Py_DecRef(*mut PyObject);
        fn Py_DecodeLocale(*const c_char, *mut usize) -> *mut WChar;
        fn PyMem_RawFree(*mut c_void);

        fn PyPreConfig_InitIsolatedConfig(*mut PyPreConfig);
        fn Py_PreInitialize(*const PyPreConfig) -> PyStatus;
        fn PyConfig_InitIsolatedConfig(*mut c_void);
        fn PyConfig_Clear(*mut c_void);
        fn PyConfig_SetBytesString(*mut c_void, *mut *mut WChar, *const c_char) -> PyStatus;
        fn PyConfig_SetBytesArgv(*mut c_void, isize, *const *mut c_char) -> PyStatus;
        fn PyWideStringList_Append(*mut PyWideStringList, *const WChar) -> PyStatus;
        fn Py_InitializeFromConfig(*const c_void) -> PyStatus;
        fn Py_FinalizeEx() -> c_int;

        fn Py_CompileString(*const c_char, *const c_char, c_int) -> *mut PyObject;
        fn PyEval_EvalCode(*mut PyObject, *mut PyObject, *mut PyObject) -> *mut PyObject;
        fn PyImport_AddModule(*const c_char) -> *mut PyObject;
        fn PyImport_ExecCodeModule(*const c_char, *mut PyObject) -> *mut PyObject;
        fn PyModule_GetDict(*mut PyObject) -> *mut PyObject;
        fn PyMarshal_ReadObjectFromString(*const c_char, isize) -> *mut PyObject;

        fn PyErr_Occurred() -> *mut PyObject;
        fn PyErr_Print();
        fn PyErr_Clear();

        fn PySys_GetObject(*const c_char) -> *mut PyObject;
        fn PySys_SetObject(*const c_char, *mut PyObject) -> c_int;
        fn PyObject_SetAttrString(*mut PyObject, *const c_char, *mut PyObject) -> c_int;
        fn PyList_Append(*mut PyObject, *mut PyObject) -> c_int;
        fn PyLong_FromLong(c_long) -> *mut PyObject;
        fn PyUnicode_DecodeFSDefault(*const c_char) -> *mut PyObject;
    }
    optional {
        // Deprecated data symbol; still consulted by path setup before 3.12.
        Py_FrozenFlag: *mut c_int;
        Py_IsInitialized: unsafe extern "C" fn() -> c_int;
    }
}

impl std::fmt::Debug for RuntimeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeApi")
            .field("required", &Self::REQUIRED.len())
            .field("frozen_flag", &self.Py_FrozenFlag.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lists() {
        assert!(RuntimeApi::REQUIRED.contains(&"Py_InitializeFromConfig"));
        assert!(RuntimeApi::REQUIRED.contains(&"PyMarshal_ReadObjectFromString"));
        assert_eq!(RuntimeApi::OPTIONAL, &["Py_FrozenFlag", "Py_IsInitialized"]);
        let unique: std::collections::HashSet<_> = RuntimeApi::REQUIRED.iter().collect();
        assert_eq!(unique.len(), RuntimeApi::REQUIRED.len());
    }
}
