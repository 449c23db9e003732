use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::Command;
use std::sync::atomic::{AtomicI32, Ordering};

use bootpack_core::config::Handshake;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{debug, warn};

use super::ChildExit;
use crate::error::{LaunchError, Result};
use crate::session::LaunchSession;

/// Signals the parent relays to its child.
const FORWARDED: [Signal; 7] = [
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTERM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGALRM,
];

/// Pid of the running child; zero when there is none.
static CHILD_PID: AtomicI32 = AtomicI32::new(0);

extern "C" fn forward_to_child(signo: libc::c_int) {
    let pid = CHILD_PID.load(Ordering::SeqCst);
    if pid > 0 {
        // SAFETY: kill(2) is async-signal-safe.
        unsafe {
            libc::kill(pid, signo);
        }
    }
}

/// Install `handler` for every forwarded signal and return the dispositions
/// it replaced.
fn install_handlers(handler: SigHandler) -> Vec<(Signal, SigAction)> {
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
    let mut previous = Vec::with_capacity(FORWARDED.len());
    for sig in FORWARDED {
        // SAFETY: the handler only touches an atomic and calls kill(2).
        match unsafe { signal::sigaction(sig, &action) } {
            Ok(old) => previous.push((sig, old)),
            Err(e) => warn!(signal = ?sig, error = %e, "failed to install signal handler"),
        }
    }
    previous
}

fn restore_handlers(previous: &[(Signal, SigAction)]) {
    for (sig, action) in previous {
        // SAFETY: reinstating a disposition sigaction(2) handed back to us.
        if let Err(e) = unsafe { signal::sigaction(*sig, action) } {
            warn!(signal = ?sig, error = %e, "failed to restore signal handler");
        }
    }
}

fn command_for(session: &LaunchSession) -> Command {
    let mut cmd = Command::new(&session.executable);
    let mut args = session.argv.iter();
    if let Some(argv0) = args.next() {
        cmd.arg0(argv0);
    }
    cmd.args(args);
    cmd
}

pub(super) fn run_child(
    session: &LaunchSession,
    handshake: &Handshake,
    ignore_signals: bool,
) -> Result<ChildExit> {
    let mut cmd = command_for(session);
    cmd.envs(handshake.env_pairs());

    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: session.executable.clone(),
        source,
    })?;
    CHILD_PID.store(child.id() as i32, Ordering::SeqCst);
    let previous = install_handlers(if ignore_signals {
        SigHandler::SigIgn
    } else {
        SigHandler::Handler(forward_to_child)
    });
    debug!(pid = child.id(), ignore_signals, "child started");

    let status = child.wait();
    CHILD_PID.store(0, Ordering::SeqCst);
    restore_handlers(&previous);

    let status = status?;
    Ok(match (status.code(), status.signal()) {
        (Some(code), _) => ChildExit::Code(code),
        (None, Some(signo)) => ChildExit::Signal(signo),
        (None, None) => ChildExit::Code(-1),
    })
}

/// exec(2) a fresh copy of ourselves marked as restarted.
pub(super) fn restart(session: &LaunchSession) -> Result<ChildExit> {
    let mut cmd = command_for(session);
    cmd.envs(Handshake::for_restart().env_pairs());
    debug!(exe = %session.executable.display(), "restarting in place");
    let source = cmd.exec();
    Err(LaunchError::Spawn {
        program: session.executable.clone(),
        source,
    })
}

pub(super) fn reraise(signo: i32) -> i32 {
    if let Ok(sig) = Signal::try_from(signo) {
        let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        // SAFETY: restoring the default disposition.
        let _ = unsafe { signal::sigaction(sig, &action) };
        let _ = signal::raise(sig);
    }
    128 + signo
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Signal dispositions are process-wide; tests that spawn take turns.
    static SIGNALS: Mutex<()> = Mutex::new(());

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        SIGNALS.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session_for(program: &str, args: &[&str]) -> LaunchSession {
        let mut session = LaunchSession::new(
            std::iter::once(program)
                .chain(args.iter().copied())
                .map(OsString::from)
                .collect(),
        );
        session.executable = PathBuf::from(program);
        session
    }

    #[test]
    fn test_child_exit_code() {
        let _serial = serial();
        let session = session_for("/bin/sh", &["-c", "exit 7"]);
        let exit = run_child(&session, &Handshake::default(), false).unwrap();
        assert_eq!(exit, ChildExit::Code(7));
    }

    #[test]
    fn test_child_sees_handshake() {
        let _serial = serial();
        let session = session_for("/bin/sh", &["-c", "test \"$BOOTPACK_EXTRACT_DIR\" = /tmp/_bpX"]);
        let handshake = Handshake::for_child(std::path::Path::new("/tmp/_bpX"));
        assert_eq!(
            run_child(&session, &handshake, true).unwrap(),
            ChildExit::Code(0)
        );
    }

    #[test]
    fn test_child_killed_by_signal() {
        let _serial = serial();
        let session = session_for("/bin/sh", &["-c", "kill -TERM $$"]);
        let exit = run_child(&session, &Handshake::default(), false).unwrap();
        assert_eq!(exit, ChildExit::Signal(libc::SIGTERM));
    }

    #[test]
    fn test_spawn_failure() {
        let _serial = serial();
        let session = session_for("/nonexistent/bootpack-child", &[]);
        assert!(matches!(
            run_child(&session, &Handshake::default(), false),
            Err(LaunchError::Spawn { .. })
        ));
    }

    #[test]
    fn test_previous_handlers_are_restored() {
        let _serial = serial();
        extern "C" fn marker(_signo: libc::c_int) {}

        let custom = SigAction::new(
            SigHandler::Handler(marker),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: the handler does nothing.
        let original = unsafe { signal::sigaction(Signal::SIGUSR2, &custom) }.unwrap();

        let session = session_for("/bin/sh", &["-c", "exit 0"]);
        run_child(&session, &Handshake::default(), true).unwrap();

        // SAFETY: reading back the disposition and reinstating the original.
        let after = unsafe { signal::sigaction(Signal::SIGUSR2, &original) }.unwrap();
        assert_eq!(after.handler(), SigHandler::Handler(marker));
    }
}
