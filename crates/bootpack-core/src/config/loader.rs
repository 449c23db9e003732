//! Environment variable helpers.
//!
//! Fallback chains live here so call sites never repeat `or_else` ladders.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Read `primary` (then each alias), falling back to `default` when unset or empty.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read `primary` (then each alias); empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Path-valued variable read without a UTF-8 round trip; empty counts as unset.
pub fn env_path_optional(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Raw value of a variable, if set.
pub fn env_os(key: &str) -> Option<OsString> {
    env::var_os(key)
}

// ─── Process environment mutation ───────────────────────────────────────────
//
// Every `set_var` / `remove_var` goes through the two functions below.
// Callers must invoke them before any thread is spawned; the launcher is
// single-threaded until the hosted runtime starts.

/// Set one environment variable.
#[allow(unsafe_code)]
pub fn set_env_var<V: AsRef<OsStr>>(key: &str, value: V) {
    unsafe { env::set_var(key, value) };
}

/// Remove one environment variable.
#[allow(unsafe_code)]
pub fn remove_env_var(key: &str) {
    unsafe { env::remove_var(key) };
}
