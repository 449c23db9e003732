//! Path containment helpers.
//!
//! Extraction targets are derived from names stored inside an archive; these
//! helpers keep every such path under its extraction root.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Join an archive-relative `name` under `root`.
///
/// Returns `None` when the name is empty, absolute, carries a drive prefix,
/// or would climb above `root` via `..`.
pub fn contained_join(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = normalize_relative(Path::new(name))?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(relative))
}

/// Lexically normalise a relative path, rejecting anything that escapes.
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Resolve `path` through the filesystem and return where it lands, or
/// `None` when that is outside `root`. `root` must already be canonical.
///
/// The deepest existing ancestor is canonicalized, so links already on disk
/// are followed. The part that does not exist yet is normalised lexically.
/// A dangling link on the way is refused since its destination is unknown.
pub fn resolve_under(root: &Path, path: &Path) -> io::Result<Option<PathBuf>> {
    let mut existing = path;
    let mut pending = Vec::new();
    let resolved = loop {
        match fs::canonicalize(existing) {
            Ok(resolved) => break resolved,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if fs::symlink_metadata(existing).is_ok() {
                    return Ok(None);
                }
                let last = existing.components().next_back();
                let (Some(last), Some(parent)) = (last, existing.parent()) else {
                    return Ok(None);
                };
                pending.push(last.as_os_str().to_owned());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    };
    let rest: PathBuf = pending.iter().rev().collect();
    let Some(rest) = normalize_relative(&rest) else {
        return Ok(None);
    };
    let landed = resolved.join(rest);
    Ok(landed.starts_with(root).then_some(landed))
}

/// Whether a symlink at `link` pointing at `target` resolves inside `root`,
/// following links that already exist under `root`. `root` must be
/// canonical.
pub fn link_target_contained(root: &Path, link: &Path, target: &Path) -> io::Result<bool> {
    if target.is_absolute() {
        return Ok(false);
    }
    let parent = link.parent().unwrap_or_else(|| Path::new(""));
    Ok(resolve_under(root, &parent.join(target))?.is_some())
}

/// Expand a leading `~` against the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contained_join_accepts_nested_names() {
        let root = Path::new("/extract");
        assert_eq!(
            contained_join(root, "lib/python/os.pyc"),
            Some(PathBuf::from("/extract/lib/python/os.pyc"))
        );
        assert_eq!(
            contained_join(root, "a/../b"),
            Some(PathBuf::from("/extract/b"))
        );
    }

    #[test]
    fn test_contained_join_rejects_escapes() {
        let root = Path::new("/extract");
        assert_eq!(contained_join(root, "../etc/passwd"), None);
        assert_eq!(contained_join(root, "a/../../b"), None);
        assert_eq!(contained_join(root, "/etc/passwd"), None);
        assert_eq!(contained_join(root, ""), None);
        assert_eq!(contained_join(root, "."), None);
    }

    #[test]
    fn test_link_target_containment() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::create_dir_all(root.join("other")).unwrap();
        let link = root.join("lib/libfoo.so");
        assert!(link_target_contained(&root, &link, Path::new("libfoo.so.1")).unwrap());
        assert!(link_target_contained(&root, &link, Path::new("../other/libfoo.so.1")).unwrap());
        assert!(!link_target_contained(&root, &link, Path::new("../../outside")).unwrap());
        assert!(!link_target_contained(&root, &link, Path::new("/usr/lib/libfoo.so")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_link_chain_cannot_leave_root() {
        let outer = tempfile::TempDir::new().unwrap();
        let root = fs::canonicalize(outer.path()).unwrap().join("root");
        fs::create_dir_all(root.join("a")).unwrap();

        // a/b -> .. lands on root itself, which is fine on its own.
        assert!(link_target_contained(&root, &root.join("a/b"), Path::new("..")).unwrap());
        std::os::unix::fs::symlink("..", root.join("a/b")).unwrap();

        // Through a/b, "a/b/.." is the parent of root.
        assert!(!link_target_contained(&root, &root.join("x"), Path::new("a/b/..")).unwrap());
        assert!(resolve_under(&root, &root.join("a/b/../outside.txt")).unwrap().is_none());
        assert!(resolve_under(&root, &root.join("a/b/a/new")).unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_is_refused() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        std::os::unix::fs::symlink("/nonexistent/bootpack", root.join("gone")).unwrap();
        assert!(resolve_under(&root, &root.join("gone/file")).unwrap().is_none());
        assert_eq!(
            resolve_under(&root, &root.join("new/dir/file")).unwrap(),
            Some(root.join("new/dir/file"))
        );
    }

    #[test]
    fn test_expand_home_passthrough() {
        assert_eq!(expand_home("/var/tmp"), PathBuf::from("/var/tmp"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
    }
}
