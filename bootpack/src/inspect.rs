//! Read-only views of an archive for `bootpack-inspect`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bootpack_archive::{Archive, EntryInfo};
use serde::Serialize;
use tracing::debug;

/// Cookie fields plus a few derived facts.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub base_offset: u64,
    pub container_len: u32,
    pub toc_offset: u32,
    pub toc_len: u32,
    pub runtime_version: u32,
    pub runtime_library: String,
    pub entries: usize,
    pub needs_extraction: bool,
}

pub fn entries(archive: &Archive) -> Result<Vec<EntryInfo>> {
    let mut listed = Vec::new();
    for entry in archive.entries() {
        listed.push(EntryInfo::from(&entry?));
    }
    Ok(listed)
}

pub fn info(archive: &Archive) -> Result<ArchiveInfo> {
    let cookie = archive.cookie();
    Ok(ArchiveInfo {
        path: archive.path().to_path_buf(),
        base_offset: archive.base_offset(),
        container_len: cookie.container_len,
        toc_offset: cookie.toc_offset,
        toc_len: cookie.toc_len,
        runtime_version: cookie.runtime_version,
        runtime_library: cookie.runtime_library.clone(),
        entries: entries(archive)?.len(),
        needs_extraction: archive.needs_extraction(),
    })
}

/// Fixed-width listing, one entry per line.
pub fn render_table(entries: &[EntryInfo]) -> String {
    let mut out = format!(
        "{:>10}  {:>10}  {:>10}  {:>4}  {:>4}  {}\n",
        "offset", "stored", "size", "zlib", "type", "name"
    );
    for entry in entries {
        out.push_str(&format!(
            "{:>10}  {:>10}  {:>10}  {:>4}  {:>4}  {}\n",
            entry.offset,
            entry.compressed_len,
            entry.uncompressed_len,
            if entry.compressed { "yes" } else { "no" },
            entry.type_code,
            entry.name
        ));
    }
    out
}

/// Render `info` as `key: value` lines.
pub fn render_info(info: &ArchiveInfo) -> String {
    format!(
        "path: {}\nbase offset: {}\ncontainer length: {}\ntoc offset: {}\ntoc length: {}\n\
         runtime version: {}.{}\nruntime library: {}\nentries: {}\nneeds extraction: {}\n",
        info.path.display(),
        info.base_offset,
        info.container_len,
        info.toc_offset,
        info.toc_len,
        info.runtime_version / 100,
        info.runtime_version % 100,
        info.runtime_library,
        info.entries,
        info.needs_extraction
    )
}

/// Write the decoded payload of `name` to `output`, or stdout when `None`.
pub fn extract(archive: &Archive, name: &str, output: Option<&Path>) -> Result<u64> {
    let entry = archive
        .find(name)
        .with_context(|| format!("no entry named '{}' in {}", name, archive.path().display()))?;
    debug!(name, kind = ?entry.kind, "extracting entry");
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            let written = archive.extract_to_writer(&entry, &mut writer)?;
            writer.flush()?;
            Ok(written)
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            let written = archive.extract_to_writer(&entry, &mut lock)?;
            lock.flush()?;
            Ok(written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootpack_archive::{ArchiveBuilder, EntryKind};
    use tempfile::TempDir;

    fn sample(dir: &Path) -> Archive {
        let path = dir.join("app");
        ArchiveBuilder::new()
            .prefix(vec![0u8; 100])
            .option("u")
            .entry(EntryKind::Binary, "libfoo.so", b"binary bytes", true)
            .entry(EntryKind::Script, "main", b"x = 1", false)
            .write_to(&path)
            .unwrap();
        Archive::open(&path).unwrap()
    }

    #[test]
    fn test_info_fields() {
        let dir = TempDir::new().unwrap();
        let archive = sample(dir.path());
        let info = info(&archive).unwrap();
        assert_eq!(info.base_offset, 100);
        assert_eq!(info.entries, 3);
        assert_eq!(info.runtime_version, 311);
        assert!(info.needs_extraction);
        assert!(render_info(&info).contains("runtime version: 3.11"));
    }

    #[test]
    fn test_table_and_json_listing() {
        let dir = TempDir::new().unwrap();
        let archive = sample(dir.path());
        let listed = entries(&archive).unwrap();
        let table = render_table(&listed);
        assert_eq!(table.lines().count(), 4);
        assert!(table.lines().nth(2).unwrap().ends_with("b  libfoo.so"));

        let json = serde_json::to_value(&listed).unwrap();
        assert_eq!(json[1]["name"], "libfoo.so");
        assert_eq!(json[1]["compressed"], true);
        assert_eq!(json[2]["type_code"], "s");
    }

    #[test]
    fn test_extract_to_file() {
        let dir = TempDir::new().unwrap();
        let archive = sample(dir.path());
        let out = dir.path().join("out.so");
        let written = extract(&archive, "libfoo.so", Some(&out)).unwrap();
        assert_eq!(written, 12);
        assert_eq!(std::fs::read(&out).unwrap(), b"binary bytes");
        assert!(extract(&archive, "missing", Some(&out)).is_err());
    }
}
