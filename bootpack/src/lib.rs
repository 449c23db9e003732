//! The `bootpack` launcher stub and the `bootpack-inspect` tool.

pub mod inspect;
pub mod observability;

use bootpack_launcher::LaunchOutcome;

/// Exit status for failures inside the launcher itself.
pub const LAUNCHER_FAILURE_EXIT: i32 = -1;

/// Process exit status for a finished launch. A child killed by a signal is
/// re-raised on this process first.
pub fn exit_code(outcome: LaunchOutcome) -> i32 {
    match outcome {
        LaunchOutcome::Exit(code) => code,
        LaunchOutcome::Signal(signo) => bootpack_launcher::process::reraise(signo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_passthrough() {
        assert_eq!(exit_code(LaunchOutcome::Exit(0)), 0);
        assert_eq!(exit_code(LaunchOutcome::Exit(3)), 3);
    }
}
