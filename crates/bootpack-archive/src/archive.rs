use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bootpack_core::config::UnpackConfig;
use bootpack_core::paths::{contained_join, link_target_contained, resolve_under};
use tracing::{debug, warn};

use crate::cookie::{find_cookie, Cookie, COOKIE_LEN};
use crate::error::{ArchiveError, Result};
use crate::stream::{copy_stored, inflate, CHUNK_SIZE};
use crate::toc::{EntryKind, TocEntry, TocIter};

/// Platforms whose default filesystems compare names case-insensitively.
pub const CASE_INSENSITIVE_FS: bool = cfg!(any(windows, target_os = "macos"));

/// One opened container.
///
/// The TOC is read and validated once on open; entry payloads are read on
/// demand through the retained file handle.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    file: File,
    file_len: u64,
    base_offset: u64,
    cookie: Cookie,
    toc: Vec<u8>,
    needs_extraction: bool,
}

impl Archive {
    /// Locate the cookie in `path` and load the TOC.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|source| ArchiveError::Open {
            path: path.clone(),
            source,
        })?;
        let file_len = file.metadata()?.len();
        if file_len < COOKIE_LEN as u64 {
            return Err(ArchiveError::CookieNotFound(path));
        }

        let cookie_pos = find_cookie(&mut file, file_len)?
            .ok_or_else(|| ArchiveError::CookieNotFound(path.clone()))?;
        let cookie_end = cookie_pos + COOKIE_LEN as u64;
        if cookie_end > file_len {
            return Err(ArchiveError::Truncated(format!(
                "cookie at {} extends past end of file ({} bytes)",
                cookie_pos, file_len
            )));
        }

        let mut raw = [0u8; COOKIE_LEN];
        file.seek(SeekFrom::Start(cookie_pos))?;
        file.read_exact(&mut raw)?;
        let cookie = Cookie::parse(&raw)?;

        let base_offset = cookie_end
            .checked_sub(u64::from(cookie.container_len))
            .ok_or_else(|| {
                ArchiveError::Malformed(format!(
                    "declared container length {} exceeds file position {}",
                    cookie.container_len, cookie_end
                ))
            })?;
        let toc_start = base_offset + u64::from(cookie.toc_offset);
        let toc_end = toc_start + u64::from(cookie.toc_len);
        if toc_end > cookie_pos {
            return Err(ArchiveError::Truncated(format!(
                "TOC [{}..{}) overlaps the cookie at {}",
                toc_start, toc_end, cookie_pos
            )));
        }

        let mut toc = vec![0u8; cookie.toc_len as usize];
        file.seek(SeekFrom::Start(toc_start))?;
        file.read_exact(&mut toc)?;

        let mut needs_extraction = false;
        for entry in TocIter::new(&toc) {
            needs_extraction |= entry?.kind.is_extractable();
        }

        debug!(
            path = %path.display(),
            base_offset,
            toc_len = cookie.toc_len,
            runtime_version = cookie.runtime_version,
            "archive opened"
        );

        Ok(Self {
            path,
            file,
            file_len,
            base_offset,
            cookie,
            toc,
            needs_extraction,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Position of the container start within the file; non-zero when the
    /// container is appended to an executable.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn cookie(&self) -> &Cookie {
        &self.cookie
    }

    pub fn runtime_version(&self) -> u32 {
        self.cookie.runtime_version
    }

    pub fn runtime_library(&self) -> &str {
        &self.cookie.runtime_library
    }

    /// Whether any entry has to exist on disk before the runtime starts.
    pub fn needs_extraction(&self) -> bool {
        self.needs_extraction
    }

    /// Entries in stored order. The TOC was validated on open, but the
    /// iterator still reports malformed records rather than assuming it.
    pub fn entries(&self) -> TocIter<'_> {
        TocIter::new(&self.toc)
    }

    /// First entry named `name`.
    pub fn find(&self, name: &str) -> Option<TocEntry<'_>> {
        self.entries()
            .map_while(Result::ok)
            .find(|entry| names_match(entry, name, CASE_INSENSITIVE_FS))
    }

    /// Names of the runtime option entries, in stored order.
    pub fn runtime_options(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries()
            .map_while(Result::ok)
            .filter(|entry| entry.kind == EntryKind::RuntimeOption)
            .map(|entry| entry.name)
    }

    /// Decode an entry's payload into memory.
    pub fn extract_to_memory(&self, entry: &TocEntry<'_>) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(initial_capacity(entry));
        self.extract_to_writer(entry, &mut data)
            .map_err(|e| e.in_entry(entry.name))?;
        Ok(data)
    }

    /// Stream an entry's decoded payload into `out`.
    pub fn extract_to_writer<W: Write>(&self, entry: &TocEntry<'_>, out: &mut W) -> Result<u64> {
        let start = self.base_offset + u64::from(entry.offset);
        let end = start + u64::from(entry.compressed_len);
        if end > self.file_len {
            return Err(ArchiveError::Truncated(format!(
                "payload [{}..{}) beyond end of file ({} bytes)",
                start, end, self.file_len
            )));
        }
        let mut reader = &self.file;
        reader.seek(SeekFrom::Start(start))?;
        if entry.compressed {
            inflate(
                &mut reader,
                u64::from(entry.compressed_len),
                u64::from(entry.uncompressed_len),
                out,
            )
        } else {
            copy_stored(&mut reader, u64::from(entry.compressed_len), out)
        }
    }

    /// Materialise an entry under `output_dir` and return the created path.
    ///
    /// Symlink entries become symlinks whose target is the decoded payload.
    /// Everything else is streamed to a regular file. Dependency references
    /// and in-memory kinds are rejected; they are resolved elsewhere.
    pub fn extract_to_filesystem(
        &self,
        entry: &TocEntry<'_>,
        output_dir: &Path,
        policy: UnpackConfig,
    ) -> Result<PathBuf> {
        self.extract_entry_file(entry, output_dir, policy)
            .map_err(|e| e.in_entry(entry.name))
    }

    fn extract_entry_file(
        &self,
        entry: &TocEntry<'_>,
        output_dir: &Path,
        policy: UnpackConfig,
    ) -> Result<PathBuf> {
        if !matches!(
            entry.kind,
            EntryKind::Binary | EntryKind::Data | EntryKind::ZipFile | EntryKind::Symlink
        ) {
            return Err(ArchiveError::NotExtractable(entry.kind.code() as char));
        }
        let target = contained_join(output_dir, entry.name)
            .ok_or_else(|| ArchiveError::UnsafeName(entry.name.to_string()))?;
        fs::create_dir_all(output_dir)?;
        let root = fs::canonicalize(output_dir)?;
        // Earlier symlink entries may redirect a parent directory.
        if let Some(parent) = target.parent() {
            if resolve_under(&root, parent)?.is_none() {
                return Err(ArchiveError::UnsafeName(entry.name.to_string()));
            }
            fs::create_dir_all(parent)?;
        }
        if fs::symlink_metadata(&target).is_ok() {
            if policy.strict {
                return Err(ArchiveError::Overwrite(target));
            }
            warn!(path = %target.display(), "overwriting existing file during extraction");
            fs::remove_file(&target)?;
        }

        if entry.kind == EntryKind::Symlink {
            self.create_symlink(entry, &root, &target)?;
        } else {
            self.write_regular_file(entry, &target)?;
        }
        debug!(name = entry.name, path = %target.display(), "extracted");
        Ok(target)
    }

    fn write_regular_file(&self, entry: &TocEntry<'_>, target: &Path) -> Result<()> {
        let file = File::create(target)?;
        let mut writer = BufWriter::new(file);
        let written = self
            .extract_to_writer(entry, &mut writer)
            .and_then(|n| writer.flush().map(|_| n).map_err(ArchiveError::from));
        if let Err(e) = written {
            drop(writer);
            let _ = fs::remove_file(target);
            return Err(e);
        }
        set_entry_permissions(target, entry.kind)
    }

    fn create_symlink(&self, entry: &TocEntry<'_>, root: &Path, link: &Path) -> Result<()> {
        let bytes = self.extract_to_memory(entry)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            ArchiveError::Malformed("symlink target is not valid UTF-8".to_string())
        })?;
        let link_target = Path::new(text.trim_end_matches('\0'));
        if !link_target_contained(root, link, link_target)? {
            return Err(ArchiveError::UnsafeName(format!(
                "{} -> {}",
                entry.name,
                link_target.display()
            )));
        }
        make_symlink(link_target, link)?;
        Ok(())
    }
}

/// Header lengths are untrusted; the buffer grows as data arrives.
fn initial_capacity(entry: &TocEntry<'_>) -> usize {
    let declared = if entry.compressed {
        entry.uncompressed_len.min(entry.compressed_len.saturating_mul(4))
    } else {
        entry.compressed_len
    };
    (declared as usize).min(CHUNK_SIZE)
}

fn names_match(entry: &TocEntry<'_>, wanted: &str, case_insensitive: bool) -> bool {
    if case_insensitive && entry.kind.is_extractable() {
        entry.name.eq_ignore_ascii_case(wanted)
    } else {
        entry.name == wanted
    }
}

#[cfg(unix)]
fn set_entry_permissions(path: &Path, kind: EntryKind) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if kind == EntryKind::Binary { 0o700 } else { 0o600 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_entry_permissions(_path: &Path, _kind: EntryKind) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
