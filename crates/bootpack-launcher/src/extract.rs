//! Onefile extraction: temp directory creation and the extraction pass.

use std::path::{Path, PathBuf};

use bootpack_archive::{Archive, EntryKind};
use bootpack_core::config::UnpackConfig;
use bootpack_core::paths::expand_home;
use tracing::{debug, info};

use crate::dependency::DependencyResolver;
use crate::error::{LaunchError, Result};

/// Prefix of every extraction directory name.
pub const EXTRACT_DIR_PREFIX: &str = "_bp";

/// Receives progress during extraction, one call per entry name.
pub trait ExtractionObserver {
    fn entry_extracting(&mut self, name: &str);
}

/// Default observer: logs each name at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ExtractionObserver for LoggingObserver {
    fn entry_extracting(&mut self, name: &str) {
        debug!(name, "extracting");
    }
}

/// Parent directory for the extraction directory.
///
/// `runtime_tmpdir` comes from the `bootpack-runtime-tmpdir` option; `~` is
/// expanded and relative paths are taken under the system temp directory.
pub fn extraction_parent(runtime_tmpdir: Option<&str>) -> PathBuf {
    match runtime_tmpdir {
        Some(dir) => {
            let dir = expand_home(dir);
            if dir.is_absolute() {
                dir
            } else {
                std::env::temp_dir().join(dir)
            }
        }
        None => std::env::temp_dir(),
    }
}

/// Create a fresh, uniquely named extraction directory under `parent`,
/// readable only by the owner where the platform supports it.
pub fn create_extraction_dir(parent: &Path) -> Result<PathBuf> {
    let wrap = |source| LaunchError::ExtractionDir {
        dir: parent.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(parent).map_err(wrap)?;
    let dir = tempfile::Builder::new()
        .prefix(EXTRACT_DIR_PREFIX)
        .keep(true)
        .tempdir_in(parent)
        .map_err(wrap)?
        .path()
        .to_path_buf();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700)).map_err(wrap)?;
    }

    info!(dir = %dir.display(), "extraction directory created");
    Ok(dir)
}

/// Extract every filesystem entry of `archive` into `dir`, in stored order.
///
/// Dependency entries go through `resolver`; the others are written by the
/// archive itself.
pub fn extract_all(
    archive: &Archive,
    dir: &Path,
    policy: UnpackConfig,
    resolver: &mut DependencyResolver,
    observer: &mut dyn ExtractionObserver,
) -> Result<usize> {
    let mut count = 0;
    for entry in archive.entries() {
        let entry = entry?;
        if !entry.kind.is_extractable() {
            continue;
        }
        observer.entry_extracting(entry.name);
        if entry.kind == EntryKind::Dependency {
            resolver.resolve(entry.name, dir)?;
        } else {
            archive.extract_to_filesystem(&entry, dir, policy)?;
        }
        count += 1;
    }
    info!(count, dir = %dir.display(), "extraction complete");
    Ok(count)
}
