use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Removal attempts for the extraction directory. Files can stay locked for
/// a moment after the child exits on some platforms.
pub const REMOVE_ATTEMPTS: u32 = 5;
const REMOVE_BACKOFF: Duration = Duration::from_millis(100);

/// One end-to-end run of the launcher.
#[derive(Debug, Default)]
pub struct LaunchSession {
    /// Command line as received, program name included.
    pub argv: Vec<OsString>,
    /// Canonical path of the running executable.
    pub executable: PathBuf,
    /// Directory the runtime treats as home.
    pub home: PathBuf,
    /// A previous invocation already extracted for this process.
    pub is_child: bool,
    owned_extraction_dir: Option<PathBuf>,
}

impl LaunchSession {
    pub fn new(argv: Vec<OsString>) -> Self {
        Self {
            argv,
            executable: PathBuf::new(),
            home: PathBuf::new(),
            is_child: false,
            owned_extraction_dir: None,
        }
    }

    /// Directory containing the executable.
    pub fn executable_dir(&self) -> &Path {
        self.executable.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Take ownership of a freshly created extraction directory; it is
    /// removed by [`LaunchSession::cleanup`].
    pub fn adopt_extraction_dir(&mut self, dir: PathBuf) {
        self.owned_extraction_dir = Some(dir);
    }

    pub fn extraction_dir(&self) -> Option<&Path> {
        self.owned_extraction_dir.as_deref()
    }

    /// Release cleanup obligations. Safe to call repeatedly; the directory is
    /// removed at most once.
    pub fn cleanup(&mut self) {
        if let Some(dir) = self.owned_extraction_dir.take() {
            remove_dir_with_retries(&dir, REMOVE_ATTEMPTS);
        }
    }
}

impl Drop for LaunchSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Remove `dir` recursively, retrying a few times. Failure is logged only.
pub fn remove_dir_with_retries(dir: &Path, attempts: u32) -> bool {
    for attempt in 1..=attempts.max(1) {
        match fs::remove_dir_all(dir) {
            Ok(()) => {
                debug!(dir = %dir.display(), attempt, "extraction directory removed");
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                if attempt == attempts.max(1) {
                    warn!(
                        dir = %dir.display(),
                        error = %e,
                        "failed to remove extraction directory"
                    );
                } else {
                    thread::sleep(REMOVE_BACKOFF);
                }
            }
        }
    }
    false
}
