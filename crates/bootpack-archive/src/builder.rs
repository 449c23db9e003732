//! Synthesises containers for tests. Compiled only with `test-support`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::cookie::{Cookie, COOKIE_LEN};
use crate::toc::{encode_record, EntryKind};

struct PendingEntry {
    kind: EntryKind,
    name: String,
    stored: Vec<u8>,
    compressed: bool,
    uncompressed_len: u32,
}

/// In-memory container writer.
///
/// ```ignore
/// let bytes = ArchiveBuilder::new()
///     .prefix(b"MZ...".to_vec())
///     .entry(EntryKind::Script, "main", b"print(1)", true)
///     .build();
/// ```
pub struct ArchiveBuilder {
    prefix: Vec<u8>,
    runtime_version: u32,
    runtime_library: String,
    entries: Vec<PendingEntry>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            prefix: Vec::new(),
            runtime_version: 311,
            runtime_library: "libpython3.11.so.1.0".to_string(),
            entries: Vec::new(),
        }
    }

    /// Bytes placed before the container, standing in for an executable.
    pub fn prefix(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.prefix = bytes.into();
        self
    }

    pub fn runtime(mut self, version: u32, library: &str) -> Self {
        self.runtime_version = version;
        self.runtime_library = library.to_string();
        self
    }

    /// Append an entry, deflating `data` when `compress` is set.
    pub fn entry(
        mut self,
        kind: EntryKind,
        name: &str,
        data: impl AsRef<[u8]>,
        compress: bool,
    ) -> Self {
        let data = data.as_ref();
        let stored = if compress { deflate(data) } else { data.to_vec() };
        self.entries.push(PendingEntry {
            kind,
            name: name.to_string(),
            stored,
            compressed: compress,
            uncompressed_len: data.len() as u32,
        });
        self
    }

    /// Append an entry with exactly the given stored bytes and header fields.
    pub fn raw_entry(
        mut self,
        kind: EntryKind,
        name: &str,
        stored: &[u8],
        compressed: bool,
        uncompressed_len: u32,
    ) -> Self {
        self.entries.push(PendingEntry {
            kind,
            name: name.to_string(),
            stored: stored.to_vec(),
            compressed,
            uncompressed_len,
        });
        self
    }

    /// Append a runtime option entry.
    pub fn option(self, text: &str) -> Self {
        self.entry(EntryKind::RuntimeOption, text, b"", false)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut container = Vec::new();
        let mut toc = Vec::new();
        for entry in &self.entries {
            let offset = container.len() as u32;
            container.extend_from_slice(&entry.stored);
            toc.extend(encode_record(
                offset,
                entry.stored.len() as u32,
                entry.uncompressed_len,
                entry.compressed,
                entry.kind,
                &entry.name,
            ));
        }
        let toc_offset = container.len() as u32;
        container.extend_from_slice(&toc);

        let cookie = Cookie {
            container_len: (container.len() + COOKIE_LEN) as u32,
            toc_offset,
            toc_len: toc.len() as u32,
            runtime_version: self.runtime_version,
            runtime_library: self.runtime_library.clone(),
        };

        let mut out = self.prefix.clone();
        out.extend_from_slice(&container);
        out.extend_from_slice(&cookie.encode());
        out
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, self.build())
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}
