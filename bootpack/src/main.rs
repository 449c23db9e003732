use std::process::ExitCode;

use bootpack::{exit_code, observability, LAUNCHER_FAILURE_EXIT};
use bootpack_launcher::Launcher;
use tracing::debug;

fn main() -> ExitCode {
    observability::init_tracing();
    let argv: Vec<_> = std::env::args_os().collect();

    let code = match Launcher::from_env().run(argv) {
        Ok(outcome) => exit_code(outcome),
        Err(e) => {
            eprintln!("[bootpack] {:#}", anyhow::Error::from(e));
            LAUNCHER_FAILURE_EXIT
        }
    };
    debug!(code, "launcher exiting");
    // Exit codes are truncated to a byte, as the OS reports them.
    ExitCode::from(code as u8)
}
