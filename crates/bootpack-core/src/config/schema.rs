//! Typed configuration, grouped by concern and loaded from the environment.

use super::env_keys::{handshake as hs_keys, observability as obv_keys, unpack as unpack_keys};
use super::loader::{env_bool, env_optional, env_or, env_path_optional, remove_env_var};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Logging configuration: quiet, log_level, log_json.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            let quiet = env_bool(obv_keys::BOOTPACK_QUIET, &[], false);
            let log_level = env_or(obv_keys::BOOTPACK_LOG_LEVEL, &[], || {
                "bootpack=warn".to_string()
            });
            let log_json = env_bool(obv_keys::BOOTPACK_LOG_JSON, &[], false);
            Self {
                quiet,
                log_level,
                log_json,
            }
        })
    }
}

/// Extraction policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackConfig {
    /// Overwriting an existing file is a hard error rather than a warning.
    pub strict: bool,
}

impl UnpackConfig {
    pub fn from_env() -> Self {
        Self {
            strict: env_bool(unpack_keys::BOOTPACK_STRICT_UNPACK_MODE, &[], false),
        }
    }
}

/// The parent → child message carried in the environment.
///
/// A onefile parent extracts into a temp directory and starts a copy of
/// itself with [`Handshake::env_pairs`] applied; the child reads it back
/// with [`Handshake::from_env`] and skips extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    /// Directory the parent already extracted into.
    pub extract_dir: Option<PathBuf>,
    /// This process is an in-place re-exec of itself.
    pub restarted: bool,
}

impl Handshake {
    pub fn from_env() -> Self {
        Self {
            extract_dir: env_path_optional(hs_keys::BOOTPACK_EXTRACT_DIR),
            restarted: env_optional(hs_keys::BOOTPACK_RESTARTED, &[]).is_some(),
        }
    }

    /// Message handed to a child that should run from `extract_dir`.
    pub fn for_child(extract_dir: &Path) -> Self {
        Self {
            extract_dir: Some(extract_dir.to_path_buf()),
            restarted: false,
        }
    }

    /// Message for an in-place single-process restart.
    pub fn for_restart() -> Self {
        Self {
            extract_dir: None,
            restarted: true,
        }
    }

    /// True when a previous invocation already extracted for us.
    pub fn is_child(&self) -> bool {
        self.extract_dir.is_some()
    }

    /// Variables to set on the spawned process.
    pub fn env_pairs(&self) -> Vec<(&'static str, OsString)> {
        let mut pairs = Vec::new();
        if let Some(dir) = &self.extract_dir {
            pairs.push((hs_keys::BOOTPACK_EXTRACT_DIR, dir.clone().into_os_string()));
        }
        if self.restarted {
            pairs.push((hs_keys::BOOTPACK_RESTARTED, OsString::from("1")));
        }
        pairs
    }

    /// Drop both markers from this process so packaged programs spawned by
    /// the payload start their own fresh launch.
    pub fn clear_env() {
        remove_env_var(hs_keys::BOOTPACK_EXTRACT_DIR);
        remove_env_var(hs_keys::BOOTPACK_RESTARTED);
    }
}
