//! Table-of-contents records and the validating cursor over them.
//!
//! Record layout (big-endian):
//!
//! ```text
//! u32 record_len | u32 offset | u32 compressed_len | u32 uncompressed_len
//! u8  compressed | u8  type   | name bytes, NUL terminated, padded to record_len
//! ```

use serde::Serialize;

use crate::error::{ArchiveError, Result};

/// Fixed part of a TOC record.
pub const ENTRY_HEADER_LEN: usize = 18;

/// What a TOC entry holds. The type byte decides how the launcher treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntryKind {
    /// Native shared library or executable (`b`).
    Binary,
    /// Opaque data file (`x`).
    Data,
    /// Bundled zip resource (`Z`).
    ZipFile,
    /// Symbolic link; payload is the link target (`n`).
    Symlink,
    /// Reference into a sibling archive, `location:member` (`d`).
    Dependency,
    /// Interpreter source text run as payload (`s`).
    Script,
    /// Compiled module executed during bootstrap (`m`).
    Module,
    /// Compiled package executed during bootstrap (`M`).
    Package,
    /// Compiled-code bundle put on the module search path (`z`).
    CodeBundle,
    /// Runtime option string; only the name matters (`o`).
    RuntimeOption,
    /// Splash-screen resources, consumed by the splash collaborator (`l`).
    Splash,
    /// Any other type byte; ignored.
    Unknown(u8),
}

impl EntryKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            b'b' => Self::Binary,
            b'x' => Self::Data,
            b'Z' => Self::ZipFile,
            b'n' => Self::Symlink,
            b'd' => Self::Dependency,
            b's' => Self::Script,
            b'm' => Self::Module,
            b'M' => Self::Package,
            b'z' => Self::CodeBundle,
            b'o' => Self::RuntimeOption,
            b'l' => Self::Splash,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Binary => b'b',
            Self::Data => b'x',
            Self::ZipFile => b'Z',
            Self::Symlink => b'n',
            Self::Dependency => b'd',
            Self::Script => b's',
            Self::Module => b'm',
            Self::Package => b'M',
            Self::CodeBundle => b'z',
            Self::RuntimeOption => b'o',
            Self::Splash => b'l',
            Self::Unknown(code) => code,
        }
    }

    /// Entries that must exist on disk before the runtime starts.
    pub fn is_extractable(self) -> bool {
        matches!(
            self,
            Self::Binary | Self::Data | Self::ZipFile | Self::Symlink | Self::Dependency
        )
    }

    /// Compiled bootstrap code executed before any payload script.
    pub fn is_bootstrap(self) -> bool {
        matches!(self, Self::Module | Self::Package)
    }
}

/// A view of one TOC record, borrowed from the archive's TOC buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry<'a> {
    /// Byte position of the record within the TOC.
    pub position: usize,
    pub record_len: u32,
    /// Payload offset relative to the container start.
    pub offset: u32,
    pub compressed_len: u32,
    pub uncompressed_len: u32,
    pub compressed: bool,
    pub kind: EntryKind,
    pub name: &'a str,
}

/// Cursor over a TOC buffer.
///
/// Every step is bounds- and progress-checked before the record is yielded.
/// The first malformed record produces one `Err` and ends the iteration.
#[derive(Debug, Clone)]
pub struct TocIter<'a> {
    toc: &'a [u8],
    cursor: usize,
    done: bool,
}

impl<'a> TocIter<'a> {
    pub fn new(toc: &'a [u8]) -> Self {
        Self {
            toc,
            cursor: 0,
            done: false,
        }
    }

    fn parse_at(&self, pos: usize) -> Result<(TocEntry<'a>, usize)> {
        let remaining = self.toc.len() - pos;
        if remaining < ENTRY_HEADER_LEN {
            return Err(ArchiveError::Malformed(format!(
                "TOC record at {} is truncated ({} bytes left)",
                pos, remaining
            )));
        }
        let header = &self.toc[pos..pos + ENTRY_HEADER_LEN];
        let word = |i: usize| {
            u32::from_be_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]])
        };

        let record_len = word(0);
        if (record_len as usize) <= ENTRY_HEADER_LEN {
            return Err(ArchiveError::Malformed(format!(
                "TOC record at {} declares invalid length {}",
                pos, record_len
            )));
        }
        let next = pos
            .checked_add(record_len as usize)
            .filter(|&next| next <= self.toc.len())
            .ok_or_else(|| {
                ArchiveError::Malformed(format!(
                    "TOC record at {} (length {}) runs past the end of the TOC",
                    pos, record_len
                ))
            })?;

        let name_field = &self.toc[pos + ENTRY_HEADER_LEN..next];
        let name_end = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_field.len());
        let name = std::str::from_utf8(&name_field[..name_end]).map_err(|_| {
            ArchiveError::Malformed(format!("TOC record at {} has a non UTF-8 name", pos))
        })?;

        let entry = TocEntry {
            position: pos,
            record_len,
            offset: word(4),
            compressed_len: word(8),
            uncompressed_len: word(12),
            compressed: header[16] != 0,
            kind: EntryKind::from_code(header[17]),
            name,
        };
        Ok((entry, next))
    }
}

impl<'a> Iterator for TocIter<'a> {
    type Item = Result<TocEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.toc.len() {
            return None;
        }
        match self.parse_at(self.cursor) {
            Ok((entry, next)) => {
                // record_len > ENTRY_HEADER_LEN, so the cursor always advances.
                self.cursor = next;
                Some(Ok(entry))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for TocIter<'_> {}

/// Owned, serializable summary of an entry, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub type_code: char,
    pub offset: u32,
    pub compressed_len: u32,
    pub uncompressed_len: u32,
    pub compressed: bool,
}

impl From<&TocEntry<'_>> for EntryInfo {
    fn from(entry: &TocEntry<'_>) -> Self {
        Self {
            name: entry.name.to_string(),
            kind: entry.kind,
            type_code: entry.kind.code() as char,
            offset: entry.offset,
            compressed_len: entry.compressed_len,
            uncompressed_len: entry.uncompressed_len,
            compressed: entry.compressed,
        }
    }
}

/// Encode one record, padding the name to a 16-byte boundary.
#[cfg(any(test, feature = "test-support"))]
pub(crate) fn encode_record(
    offset: u32,
    compressed_len: u32,
    uncompressed_len: u32,
    compressed: bool,
    kind: EntryKind,
    name: &str,
) -> Vec<u8> {
    let name_len = name.len() + 1;
    let padded = (name_len + 15) / 16 * 16;
    let record_len = ENTRY_HEADER_LEN + padded;

    let mut out = Vec::with_capacity(record_len);
    out.extend_from_slice(&(record_len as u32).to_be_bytes());
    out.extend_from_slice(&offset.to_be_bytes());
    out.extend_from_slice(&compressed_len.to_be_bytes());
    out.extend_from_slice(&uncompressed_len.to_be_bytes());
    out.push(u8::from(compressed));
    out.push(kind.code());
    out.extend_from_slice(name.as_bytes());
    out.resize(record_len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_records() -> Vec<u8> {
        let mut toc = encode_record(0, 10, 10, false, EntryKind::Data, "data/a.txt");
        toc.extend(encode_record(10, 4, 9, true, EntryKind::Module, "bootstrap"));
        toc
    }

    #[test]
    fn test_iterates_records_in_order() {
        let toc = two_records();
        let entries: Vec<_> = TocIter::new(&toc).collect::<Result<_>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "data/a.txt");
        assert_eq!(entries[0].kind, EntryKind::Data);
        assert_eq!(entries[1].name, "bootstrap");
        assert!(entries[1].compressed);
        assert_eq!(entries[1].uncompressed_len, 9);
        assert_eq!(entries[1].position, entries[0].record_len as usize);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let toc = two_records();
        let first: Vec<_> = TocIter::new(&toc).map(|e| e.unwrap().name).collect();
        let second: Vec<_> = TocIter::new(&toc).map(|e| e.unwrap().name).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_length_record_stops_iteration() {
        let mut toc = encode_record(0, 1, 1, false, EntryKind::Data, "ok");
        let mut bad = encode_record(0, 1, 1, false, EntryKind::Data, "bad");
        bad[..4].copy_from_slice(&0u32.to_be_bytes());
        toc.extend(bad);

        let mut iter = TocIter::new(&toc);
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(iter.next(), Some(Err(ArchiveError::Malformed(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_header_sized_record_is_rejected() {
        let mut toc = encode_record(0, 1, 1, false, EntryKind::Data, "x");
        toc[..4].copy_from_slice(&(ENTRY_HEADER_LEN as u32).to_be_bytes());
        let results: Vec<_> = TocIter::new(&toc).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_record_past_end_is_rejected() {
        let mut toc = encode_record(0, 1, 1, false, EntryKind::Data, "x");
        toc[..4].copy_from_slice(&u32::MAX.to_be_bytes());
        let results: Vec<_> = TocIter::new(&toc).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ArchiveError::Malformed(_))));
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        let mut toc = encode_record(0, 1, 1, false, EntryKind::Data, "x");
        toc.extend_from_slice(&[0u8; 5]);
        let results: Vec<_> = TocIter::new(&toc).collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_kind_codes_roundtrip() {
        for code in [b'b', b'x', b'Z', b'n', b'd', b's', b'm', b'M', b'z', b'o', b'l', b'?'] {
            assert_eq!(EntryKind::from_code(code).code(), code);
        }
        assert!(EntryKind::Symlink.is_extractable());
        assert!(!EntryKind::Script.is_extractable());
        assert!(EntryKind::Package.is_bootstrap());
    }
}
