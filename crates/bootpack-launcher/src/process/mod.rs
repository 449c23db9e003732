//! The process boundary: respawning, in-place restart, signal handling.
//!
//! [`ProcessControl`] is the seam the orchestrator drives; [`NativeProcess`]
//! is the real implementation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use bootpack_core::config::Handshake;

use crate::error::Result;
use crate::session::LaunchSession;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as platform;
#[cfg(windows)]
use windows as platform;

/// How a spawned process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Code(i32),
    /// Terminated by this signal number.
    Signal(i32),
}

/// Operations that cross the process boundary.
pub trait ProcessControl {
    /// Canonical path of the running executable.
    fn current_executable(&self, argv0: Option<&OsStr>) -> Result<PathBuf>;

    /// Run a copy of the executable with `handshake` in its environment and
    /// wait for it. Termination signals are forwarded to the child unless
    /// `ignore_signals` is set.
    fn respawn(
        &mut self,
        session: &LaunchSession,
        handshake: &Handshake,
        ignore_signals: bool,
    ) -> Result<ChildExit>;

    /// Make `home` visible to the dynamic loader. Returns `true` when the
    /// process environment had to change for that.
    fn expose_home(&mut self, home: &Path) -> Result<bool>;

    /// Replace this process with a fresh copy marked as restarted. Returns
    /// only where replacement is unavailable and a child was run instead.
    fn restart(&mut self, session: &LaunchSession) -> Result<ChildExit>;

    /// Drop the handshake markers so programs started by the payload launch
    /// from scratch.
    fn clear_handshake(&mut self);
}

/// The running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProcess;

impl ProcessControl for NativeProcess {
    fn current_executable(&self, argv0: Option<&OsStr>) -> Result<PathBuf> {
        crate::executable::resolve_executable(argv0)
    }

    fn respawn(
        &mut self,
        session: &LaunchSession,
        handshake: &Handshake,
        ignore_signals: bool,
    ) -> Result<ChildExit> {
        platform::run_child(session, handshake, ignore_signals)
    }

    fn expose_home(&mut self, home: &Path) -> Result<bool> {
        crate::libpath::expose_home(home)
    }

    fn restart(&mut self, session: &LaunchSession) -> Result<ChildExit> {
        platform::restart(session)
    }

    fn clear_handshake(&mut self) {
        Handshake::clear_env();
    }
}

/// Terminate the way the child did: re-raise `signo` on this process.
/// Returns the exit status to use if the signal does not end the process.
pub fn reraise(signo: i32) -> i32 {
    platform::reraise(signo)
}
