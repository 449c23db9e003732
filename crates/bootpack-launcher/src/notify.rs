use std::io::Write;

use tracing::error;

/// Reports a payload script that ended with an unhandled error. The
/// runtime has already printed its own traceback by then.
pub trait ErrorNotifier {
    fn unhandled_error(&mut self, script: &str);
}

/// Writes the report to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl ErrorNotifier for ConsoleNotifier {
    fn unhandled_error(&mut self, script: &str) {
        error!(script, "payload script failed");
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[bootpack] Failed to execute script '{}' due to unhandled exception!",
            script
        );
    }
}
