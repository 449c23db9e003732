use std::process::Command;

use bootpack_core::config::Handshake;
use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{BOOL, TRUE};
use windows_sys::Win32::System::Console::SetConsoleCtrlHandler;

use super::ChildExit;
use crate::error::{LaunchError, Result};
use crate::session::LaunchSession;

/// Console events reach the child directly; the parent only has to survive
/// them long enough to clean up.
unsafe extern "system" fn ignore_console_event(_ctrl_type: u32) -> BOOL {
    TRUE
}

fn spawn_and_wait(session: &LaunchSession, handshake: &Handshake) -> Result<ChildExit> {
    let mut cmd = Command::new(&session.executable);
    cmd.args(session.argv.iter().skip(1));
    cmd.envs(handshake.env_pairs());
    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: session.executable.clone(),
        source,
    })?;
    debug!(pid = child.id(), "child started");
    let status = child.wait()?;
    Ok(ChildExit::Code(status.code().unwrap_or(-1)))
}

pub(super) fn run_child(
    session: &LaunchSession,
    handshake: &Handshake,
    _ignore_signals: bool,
) -> Result<ChildExit> {
    // SAFETY: registering a handler with the 'system' ABI.
    if unsafe { SetConsoleCtrlHandler(Some(ignore_console_event), TRUE) } == 0 {
        warn!(error = %std::io::Error::last_os_error(), "failed to install console handler");
    }
    spawn_and_wait(session, handshake)
}

/// No exec(2) here; the restarted copy runs as a child instead.
pub(super) fn restart(session: &LaunchSession) -> Result<ChildExit> {
    spawn_and_wait(session, &Handshake::for_restart())
}

pub(super) fn reraise(signo: i32) -> i32 {
    128 + signo
}
