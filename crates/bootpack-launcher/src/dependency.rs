//! Resolution of `location:member` references into sibling packages.
//!
//! A sibling deployed unpacked (onedir) is copied from disk; otherwise the
//! sibling executable is opened as an archive and the member extracted.

use std::fs;
use std::path::{Path, PathBuf};

use bootpack_archive::{Archive, ArchiveError};
use bootpack_core::config::UnpackConfig;
use bootpack_core::paths::{contained_join, normalize_relative, resolve_under};
use tracing::{debug, warn};

use crate::error::{LaunchError, Result};

/// Open sibling archives kept for reuse during one extraction pass.
pub const POOL_CAPACITY: usize = 20;

/// File name suffixes tried for a sibling executable, in order.
#[cfg(windows)]
pub const SIBLING_SUFFIXES: [&str; 2] = [".exe", ".pkg"];
#[cfg(not(windows))]
pub const SIBLING_SUFFIXES: [&str; 2] = ["", ".pkg"];

/// Split `location:member` at the first colon. Both halves must be non-empty.
///
/// Only the first colon separates, so `"a:::"` yields `("a", "::")`.
pub fn split_reference(text: &str) -> Result<(&str, &str)> {
    match text.split_once(':') {
        Some((location, member)) if !location.is_empty() && !member.is_empty() => {
            Ok((location, member))
        }
        _ => Err(LaunchError::InvalidReference(text.to_string())),
    }
}

/// Sibling archives opened so far, keyed by path. Bounded at
/// [`POOL_CAPACITY`]; once full, further siblings are opened for a single
/// lookup and released.
#[derive(Debug, Default)]
pub struct ArchivePool {
    archives: Vec<Archive>,
}

impl ArchivePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.archives.iter().any(|a| a.path() == path)
    }

    /// Run `f` against the archive at `path`, opening it if needed.
    pub fn with_archive<T>(
        &mut self,
        path: &Path,
        f: impl FnOnce(&Archive) -> Result<T>,
    ) -> Result<T> {
        if let Some(archive) = self.archives.iter().find(|a| a.path() == path) {
            return f(archive);
        }
        let archive = Archive::open(path)?;
        if self.archives.len() < POOL_CAPACITY {
            self.archives.push(archive);
            let last = self.archives.len() - 1;
            f(&self.archives[last])
        } else {
            debug!(path = %path.display(), "archive pool full, opening transiently");
            f(&archive)
        }
    }
}

/// Resolves dependency entries relative to the running executable.
#[derive(Debug)]
pub struct DependencyResolver {
    executable_dir: PathBuf,
    policy: UnpackConfig,
    pool: ArchivePool,
}

impl DependencyResolver {
    pub fn new(executable_dir: impl Into<PathBuf>, policy: UnpackConfig) -> Self {
        Self {
            executable_dir: executable_dir.into(),
            policy,
            pool: ArchivePool::new(),
        }
    }

    pub fn pool(&self) -> &ArchivePool {
        &self.pool
    }

    /// Materialise the member named by `reference` under `output_dir`.
    pub fn resolve(&mut self, reference: &str, output_dir: &Path) -> Result<PathBuf> {
        let (location, member) = split_reference(reference)?;

        if let Some(path) = self.copy_from_onedir(location, member, output_dir)? {
            return Ok(path);
        }

        let not_found = || LaunchError::DependencyNotFound {
            location: location.to_string(),
            member: member.to_string(),
        };
        let sibling = self.sibling_archive_path(location).ok_or_else(not_found)?;
        let policy = self.policy;
        self.pool.with_archive(&sibling, |archive| {
            let entry = archive.find(member).ok_or_else(not_found)?;
            debug!(
                member,
                sibling = %sibling.display(),
                "extracting dependency from sibling archive"
            );
            Ok(archive.extract_to_filesystem(&entry, output_dir, policy)?)
        })
    }

    /// `<exe dir>/<dirname(location)>/<member>`, copied when it exists.
    fn copy_from_onedir(
        &self,
        location: &str,
        member: &str,
        output_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let relative = Path::new(location)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(member);
        let Some(relative) = normalize_relative(&relative) else {
            return Ok(None);
        };
        let source = self.executable_dir.join(relative);
        if !source.is_file() {
            return Ok(None);
        }

        let unsafe_name = || LaunchError::Archive(ArchiveError::UnsafeName(member.to_string()));
        let target = contained_join(output_dir, member).ok_or_else(unsafe_name)?;
        fs::create_dir_all(output_dir)?;
        let root = fs::canonicalize(output_dir)?;
        if let Some(dir) = target.parent() {
            if resolve_under(&root, dir)?.is_none() {
                return Err(unsafe_name());
            }
            fs::create_dir_all(dir)?;
        }
        if fs::symlink_metadata(&target).is_ok() {
            if self.policy.strict {
                return Err(ArchiveError::Overwrite(target).into());
            }
            warn!(path = %target.display(), "overwriting existing file with dependency");
            fs::remove_file(&target)?;
        }
        fs::copy(&source, &target)?;
        debug!(
            source = %source.display(),
            target = %target.display(),
            "copied dependency from unpacked sibling"
        );
        Ok(Some(target))
    }

    fn sibling_archive_path(&self, location: &str) -> Option<PathBuf> {
        SIBLING_SUFFIXES.iter().find_map(|suffix| {
            let name = format!("{}{}", location, suffix);
            let candidate = contained_join(&self.executable_dir, &name)?;
            candidate.is_file().then_some(candidate)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootpack_archive::{ArchiveBuilder, EntryKind};
    use tempfile::TempDir;

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("a:b").unwrap(), ("a", "b"));
        assert_eq!(split_reference("a:::").unwrap(), ("a", "::"));
        assert_eq!(split_reference("dir/app:lib/x.so").unwrap(), ("dir/app", "lib/x.so"));
        for bad in ["", ":", "a", "a:", ":b"] {
            assert!(
                matches!(split_reference(bad), Err(LaunchError::InvalidReference(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    fn write_sibling(dir: &Path, name: &str, member: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(format!("{}{}", name, SIBLING_SUFFIXES[0]));
        ArchiveBuilder::new()
            .prefix(vec![0x7f; 64])
            .entry(EntryKind::Binary, member, data, true)
            .write_to(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_resolve_from_sibling_archive() {
        let exe_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_sibling(exe_dir.path(), "other", "libshared.so", b"shared bytes");

        let mut resolver = DependencyResolver::new(exe_dir.path(), UnpackConfig::default());
        let path = resolver.resolve("other:libshared.so", out.path()).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"shared bytes");
        assert_eq!(resolver.pool().len(), 1);
    }

    #[test]
    fn test_sibling_archive_reused() {
        let exe_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = exe_dir.path().join(format!("other{}", SIBLING_SUFFIXES[0]));
        ArchiveBuilder::new()
            .entry(EntryKind::Data, "a.dat", b"a", false)
            .entry(EntryKind::Data, "b.dat", b"b", false)
            .write_to(&path)
            .unwrap();

        let mut resolver = DependencyResolver::new(exe_dir.path(), UnpackConfig::default());
        resolver.resolve("other:a.dat", out.path()).unwrap();
        resolver.resolve("other:b.dat", out.path()).unwrap();
        assert_eq!(resolver.pool().len(), 1);
        assert!(resolver.pool().contains(&path));
    }

    #[test]
    fn test_resolve_prefers_unpacked_sibling() {
        let exe_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::create_dir_all(exe_dir.path().join("tools")).unwrap();
        fs::write(exe_dir.path().join("tools/libdep.so"), b"on disk").unwrap();

        let mut resolver = DependencyResolver::new(exe_dir.path(), UnpackConfig::default());
        let path = resolver.resolve("tools/helper:libdep.so", out.path()).unwrap();
        assert_eq!(path, out.path().join("libdep.so"));
        assert_eq!(fs::read(path).unwrap(), b"on disk");
        assert!(resolver.pool().is_empty());
    }

    #[test]
    fn test_unpacked_dependency_respects_overwrite_policy() {
        let exe_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(exe_dir.path().join("libdep.so"), b"on disk").unwrap();
        fs::write(out.path().join("libdep.so"), b"already here").unwrap();

        let mut strict = DependencyResolver::new(exe_dir.path(), UnpackConfig { strict: true });
        let err = strict.resolve("helper:libdep.so", out.path()).unwrap_err();
        assert!(matches!(err, LaunchError::Archive(ArchiveError::Overwrite(_))));
        assert_eq!(fs::read(out.path().join("libdep.so")).unwrap(), b"already here");

        let mut lenient = DependencyResolver::new(exe_dir.path(), UnpackConfig::default());
        let path = lenient.resolve("helper:libdep.so", out.path()).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"on disk");
    }

    #[test]
    fn test_resolve_missing_everything() {
        let exe_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut resolver = DependencyResolver::new(exe_dir.path(), UnpackConfig::default());
        assert!(matches!(
            resolver.resolve("nowhere:lib.so", out.path()),
            Err(LaunchError::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_missing_member() {
        let exe_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_sibling(exe_dir.path(), "other", "present.so", b"x");
        let mut resolver = DependencyResolver::new(exe_dir.path(), UnpackConfig::default());
        assert!(matches!(
            resolver.resolve("other:absent.so", out.path()),
            Err(LaunchError::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn test_pool_is_bounded() {
        let exe_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for i in 0..POOL_CAPACITY + 2 {
            write_sibling(exe_dir.path(), &format!("s{}", i), &format!("m{}", i), b"x");
        }
        let mut resolver = DependencyResolver::new(exe_dir.path(), UnpackConfig::default());
        for i in 0..POOL_CAPACITY + 2 {
            resolver
                .resolve(&format!("s{}:m{}", i, i), out.path())
                .unwrap();
        }
        assert_eq!(resolver.pool().len(), POOL_CAPACITY);
    }
}
