//! Runtime option entries.
//!
//! Each `o` entry's name is one option. Runtime flags mirror the hosted
//! runtime's own command-line switches; `bootpack-*` options steer the
//! launcher itself.

use tracing::warn;

/// Launcher-side options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LauncherOptions {
    /// Parent directory for the onefile extraction directory.
    pub runtime_tmpdir: Option<String>,
    /// Subdirectory of the executable's directory used as home in place runs.
    pub contents_directory: Option<String>,
    /// The onefile parent ignores termination signals instead of forwarding.
    pub ignore_signals: bool,
    /// Re-exec once so the dynamic loader sees the augmented library path.
    pub restart_libpath: bool,
}

/// Every option parsed out of an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub verbose: i32,
    pub unbuffered: bool,
    pub optimize: i32,
    pub warn_options: Vec<String>,
    pub x_options: Vec<String>,
    pub hash_seed: Option<u64>,
    /// `X utf8` / `X utf8=0|1`; `None` keeps the runtime default.
    pub utf8_mode: Option<bool>,
    /// `X dev`.
    pub dev_mode: bool,
    pub launcher: LauncherOptions,
}

impl RuntimeOptions {
    /// Parse option strings in stored order. Unknown or malformed options are
    /// logged and skipped.
    pub fn parse<'a>(options: impl IntoIterator<Item = &'a str>) -> Self {
        let mut parsed = Self::default();
        for option in options {
            parsed.apply(option.trim());
        }
        parsed
    }

    fn apply(&mut self, option: &str) {
        let (key, value) = match option.split_once(' ') {
            Some((key, value)) => (key, Some(value.trim())),
            None => (option, None),
        };

        match (key, value) {
            ("v", None) => self.verbose += 1,
            ("u", None) => self.unbuffered = true,
            ("O", None) => self.optimize += 1,
            ("W", Some(warning)) if !warning.is_empty() => {
                self.warn_options.push(warning.to_string())
            }
            ("X", Some(x)) if !x.is_empty() => self.apply_x_option(x),
            ("bootpack-runtime-tmpdir", Some(dir)) if !dir.is_empty() => {
                self.launcher.runtime_tmpdir = Some(dir.to_string())
            }
            ("bootpack-contents-directory", Some(dir)) if !dir.is_empty() => {
                self.launcher.contents_directory = Some(dir.to_string())
            }
            ("bootpack-ignore-signals", None) => self.launcher.ignore_signals = true,
            ("bootpack-restart-libpath", None) => self.launcher.restart_libpath = true,
            _ => {
                if let Some(seed) = option.strip_prefix("hash_seed=") {
                    match seed.trim().parse::<u64>() {
                        Ok(seed) => self.hash_seed = Some(seed),
                        Err(_) => warn!(option, "invalid hash seed, ignoring"),
                    }
                } else {
                    warn!(option, "unknown runtime option, ignoring");
                }
            }
        }
    }

    fn apply_x_option(&mut self, x: &str) {
        match x {
            "utf8" | "utf8=1" => self.utf8_mode = Some(true),
            "utf8=0" => self.utf8_mode = Some(false),
            "dev" => self.dev_mode = true,
            other => self.x_options.push(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_flags_accumulate() {
        let opts = RuntimeOptions::parse(["v", "v", "O", "O", "u", "W ignore", "X faulthandler"]);
        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.optimize, 2);
        assert!(opts.unbuffered);
        assert_eq!(opts.warn_options, vec!["ignore"]);
        assert_eq!(opts.x_options, vec!["faulthandler"]);
    }

    #[test]
    fn test_hash_seed() {
        assert_eq!(RuntimeOptions::parse(["hash_seed=42"]).hash_seed, Some(42));
        assert_eq!(RuntimeOptions::parse(["hash_seed=nope"]).hash_seed, None);
    }

    #[test]
    fn test_utf8_and_dev_mode_are_not_passed_through() {
        let opts = RuntimeOptions::parse(["X utf8", "X dev"]);
        assert_eq!(opts.utf8_mode, Some(true));
        assert!(opts.dev_mode);
        assert!(opts.x_options.is_empty());
        assert_eq!(RuntimeOptions::parse(["X utf8=0"]).utf8_mode, Some(false));
    }

    #[test]
    fn test_launcher_options() {
        let opts = RuntimeOptions::parse([
            "bootpack-runtime-tmpdir ~/cache",
            "bootpack-contents-directory _internal",
            "bootpack-ignore-signals",
            "bootpack-restart-libpath",
        ]);
        assert_eq!(opts.launcher.runtime_tmpdir.as_deref(), Some("~/cache"));
        assert_eq!(opts.launcher.contents_directory.as_deref(), Some("_internal"));
        assert!(opts.launcher.ignore_signals);
        assert!(opts.launcher.restart_libpath);
    }

    #[test]
    fn test_unknown_and_incomplete_options_are_ignored() {
        let opts = RuntimeOptions::parse(["frobnicate", "W", "bootpack-runtime-tmpdir", "v extra"]);
        assert_eq!(opts, RuntimeOptions::default());
    }
}
