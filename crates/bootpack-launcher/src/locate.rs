//! Finding the container for the running executable.

use std::fs::File;
use std::path::{Path, PathBuf};

use bootpack_archive::cookie::{rfind_pattern, sideload_marker};
use bootpack_archive::{Archive, ArchiveError};
use tracing::{debug, info};

use crate::error::{LaunchError, Result};

/// Extension of the side-load container placed next to the executable.
pub const SIDELOAD_EXTENSION: &str = "pkg";

pub fn sideload_path(executable: &Path) -> PathBuf {
    executable.with_extension(SIDELOAD_EXTENSION)
}

/// Open the container embedded in `executable`, or else its side-load
/// container. The latter is only accepted when the executable carries the
/// side-load marker.
pub fn open_archive(executable: &Path) -> Result<Archive> {
    let embedded_err = match Archive::open(executable) {
        Ok(archive) => {
            debug!(path = %executable.display(), "using embedded archive");
            return Ok(archive);
        }
        Err(e @ ArchiveError::CookieNotFound(_)) => e,
        Err(e) => return Err(e.into()),
    };

    let sidecar = sideload_path(executable);
    if !sidecar.is_file() {
        return Err(LaunchError::ArchiveMissing {
            exe: executable.to_path_buf(),
            source: embedded_err,
        });
    }
    if !sideload_permitted(executable)? {
        return Err(LaunchError::SideLoadRefused(sidecar));
    }
    info!(path = %sidecar.display(), "using side-load archive");
    Ok(Archive::open(&sidecar)?)
}

fn sideload_permitted(executable: &Path) -> Result<bool> {
    let mut file = File::open(executable)?;
    let len = file.metadata()?.len();
    Ok(rfind_pattern(&mut file, len, &sideload_marker())?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootpack_archive::{ArchiveBuilder, EntryKind};
    use std::fs;
    use tempfile::TempDir;

    fn container() -> ArchiveBuilder {
        ArchiveBuilder::new().entry(EntryKind::Script, "main", b"x = 1", false)
    }

    #[test]
    fn test_embedded_archive_wins() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("app");
        container().prefix(vec![0u8; 5000]).write_to(&exe).unwrap();
        let archive = open_archive(&exe).unwrap();
        assert_eq!(archive.path(), exe.as_path());
        assert_eq!(archive.base_offset(), 5000);
    }

    #[test]
    fn test_sideload_requires_marker() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("app");
        fs::write(&exe, b"\x7fELF plain executable").unwrap();
        container().write_to(sideload_path(&exe)).unwrap();

        assert!(matches!(
            open_archive(&exe),
            Err(LaunchError::SideLoadRefused(_))
        ));

        let mut bytes = b"\x7fELF permitting executable".to_vec();
        bytes.extend_from_slice(&sideload_marker());
        bytes.extend_from_slice(b"trailing");
        fs::write(&exe, bytes).unwrap();
        let archive = open_archive(&exe).unwrap();
        assert_eq!(archive.path(), sideload_path(&exe).as_path());
    }

    #[test]
    fn test_missing_everywhere() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("app");
        fs::write(&exe, vec![0u8; 200]).unwrap();
        assert!(matches!(
            open_archive(&exe),
            Err(LaunchError::ArchiveMissing { .. })
        ));
    }

    #[test]
    fn test_corrupt_embedded_archive_is_not_masked_by_sidecar() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("app");
        let mut bytes = container().build();
        // A container longer than the file itself.
        let cookie_start = bytes.len() - bootpack_archive::cookie::COOKIE_LEN;
        bytes[cookie_start + 8..cookie_start + 12].copy_from_slice(&u32::MAX.to_be_bytes());
        fs::write(&exe, bytes).unwrap();
        container().write_to(sideload_path(&exe)).unwrap();
        assert!(matches!(open_archive(&exe), Err(LaunchError::Archive(_))));
    }

    #[test]
    fn test_sideload_path_replaces_extension() {
        assert_eq!(sideload_path(Path::new("/opt/app")), PathBuf::from("/opt/app.pkg"));
        assert_eq!(
            sideload_path(Path::new("C:/apps/tool.exe")),
            PathBuf::from("C:/apps/tool.pkg")
        );
    }
}
