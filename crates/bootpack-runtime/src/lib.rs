//! Dynamic binding to the hosted scripting runtime.
//!
//! The runtime library is opened at launch time and its entry points are
//! resolved by name ([`api`]); the initialisation record is laid out per
//! runtime version ([`layout`]). [`HostedRuntime`] is the seam the launcher
//! drives, with [`DynamicRuntime`] as the real implementation.

pub mod api;
pub mod bootstrap;
mod error;
mod hosted;
pub mod init;
pub mod layout;
mod library;
pub mod options;
#[cfg(any(test, feature = "test-support"))]
mod scripted;

pub use bootstrap::{
    install_code_bundles, run_embedded_modules, run_payload_scripts, BootstrapReport,
};
pub use error::{BindingError, Result};
pub use hosted::{DynamicRuntime, HostedRuntime, StartOutcome, UNHANDLED_ERROR_EXIT};
pub use init::{build_init_config, InitSettings};
pub use library::RuntimeLibrary;
pub use options::{LauncherOptions, RuntimeOptions};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::{Journal, ScriptedRuntime};
