//! The fixed-size trailer ("cookie") that identifies a container.
//!
//! ```text
//! ┌──────────────────────────┐
//! │ host executable (any)    │  ← optional, arbitrary size
//! ├──────────────────────────┤  ← base offset
//! │ entry payloads           │
//! ├──────────────────────────┤
//! │ table of contents        │  ← toc_offset / toc_len (relative to base)
//! ├──────────────────────────┤
//! │ cookie (88 bytes)        │  ← magic + header, all integers big-endian
//! └──────────────────────────┘
//! ```
//!
//! The cookie is located by scanning the file back to front. The magic is
//! kept masked in the binary and unmasked at run time, so scanning an
//! executable that embeds this very reader never matches the reader's own
//! constant.

use std::hint::black_box;
use std::io::{Read, Seek, SeekFrom};

use crate::error::{ArchiveError, Result};

/// Length of the magic pattern.
pub const MAGIC_LEN: usize = 8;

/// Length of the runtime library name field.
pub const RUNTIME_LIBRARY_LEN: usize = 64;

/// Total cookie size: magic, four u32 fields, library name.
pub const COOKIE_LEN: usize = MAGIC_LEN + 4 * 4 + RUNTIME_LIBRARY_LEN;

/// Chunk size of the backward scan.
pub const SCAN_CHUNK: usize = 8192;

const MAGIC_MASK: u8 = 0x5a;

const fn mask(bytes: [u8; MAGIC_LEN]) -> [u8; MAGIC_LEN] {
    let mut out = [0u8; MAGIC_LEN];
    let mut i = 0;
    while i < MAGIC_LEN {
        out[i] = bytes[i] ^ MAGIC_MASK;
        i += 1;
    }
    out
}

const MAGIC_MASKED: [u8; MAGIC_LEN] = mask(*b"BPK\x0c\x0b\x0a\x0b\x0e");
const SIDELOAD_MASKED: [u8; MAGIC_LEN] = mask(*b"BPK\x0c\x0bSLD");

fn unmask(masked: [u8; MAGIC_LEN]) -> [u8; MAGIC_LEN] {
    let key = black_box(MAGIC_MASK);
    let mut out = black_box(masked);
    for byte in out.iter_mut() {
        *byte ^= key;
    }
    out
}

/// The cookie magic, assembled at run time.
pub fn magic() -> [u8; MAGIC_LEN] {
    unmask(MAGIC_MASKED)
}

/// Marker a packager writes into an executable that may run from a
/// separate side-load container.
pub fn sideload_marker() -> [u8; MAGIC_LEN] {
    unmask(SIDELOAD_MASKED)
}

/// Decoded cookie fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Length of the whole container, cookie included.
    pub container_len: u32,
    /// TOC offset relative to the container start.
    pub toc_offset: u32,
    /// TOC length in bytes.
    pub toc_len: u32,
    /// Hosted runtime version tag (`major * 100 + minor`).
    pub runtime_version: u32,
    /// File name of the hosted runtime shared library.
    pub runtime_library: String,
}

impl Cookie {
    /// Decode a cookie. The magic must match.
    pub fn parse(bytes: &[u8; COOKIE_LEN]) -> Result<Self> {
        if bytes[..MAGIC_LEN] != magic() {
            return Err(ArchiveError::Malformed("cookie magic mismatch".to_string()));
        }
        let field = |index: usize| {
            let start = MAGIC_LEN + index * 4;
            u32::from_be_bytes([
                bytes[start],
                bytes[start + 1],
                bytes[start + 2],
                bytes[start + 3],
            ])
        };
        let name_field = &bytes[MAGIC_LEN + 16..];
        let name_end = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RUNTIME_LIBRARY_LEN);
        let runtime_library = std::str::from_utf8(&name_field[..name_end])
            .map_err(|_| {
                ArchiveError::Malformed("runtime library name is not valid UTF-8".to_string())
            })?
            .to_string();

        Ok(Self {
            container_len: field(0),
            toc_offset: field(1),
            toc_len: field(2),
            runtime_version: field(3),
            runtime_library,
        })
    }

    /// Encode into the on-disk layout. The library name is truncated to 63 bytes.
    #[cfg(any(test, feature = "test-support"))]
    pub fn encode(&self) -> [u8; COOKIE_LEN] {
        let mut out = [0u8; COOKIE_LEN];
        out[..MAGIC_LEN].copy_from_slice(&magic());
        let fields = [
            self.container_len,
            self.toc_offset,
            self.toc_len,
            self.runtime_version,
        ];
        for (i, value) in fields.iter().enumerate() {
            let start = MAGIC_LEN + i * 4;
            out[start..start + 4].copy_from_slice(&value.to_be_bytes());
        }
        let name = self.runtime_library.as_bytes();
        let len = name.len().min(RUNTIME_LIBRARY_LEN - 1);
        out[MAGIC_LEN + 16..MAGIC_LEN + 16 + len].copy_from_slice(&name[..len]);
        out
    }
}

/// Scan `reader` (of total length `file_len`) back to front for the magic.
///
/// Returns the absolute position of the last occurrence.
pub fn find_cookie<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<Option<u64>> {
    rfind_pattern(reader, file_len, &magic())
}

/// Position of the last occurrence of `pattern`, scanning back to front in
/// [`SCAN_CHUNK`] windows. Consecutive windows overlap by `pattern.len() - 1`
/// bytes so a match straddling two chunks is found.
pub fn rfind_pattern<R: Read + Seek>(
    reader: &mut R,
    file_len: u64,
    pattern: &[u8],
) -> Result<Option<u64>> {
    if pattern.is_empty() || pattern.len() > SCAN_CHUNK || file_len < pattern.len() as u64 {
        return Ok(None);
    }

    let mut buf = vec![0u8; SCAN_CHUNK];
    let mut end = file_len;
    loop {
        let start = end.saturating_sub(SCAN_CHUNK as u64);
        let len = (end - start) as usize;
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut buf[..len])?;

        if let Some(pos) = buf[..len].windows(pattern.len()).rposition(|w| w == pattern) {
            return Ok(Some(start + pos as u64));
        }
        if start == 0 {
            return Ok(None);
        }
        end = start + (pattern.len() - 1) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Cookie {
        Cookie {
            container_len: 4096,
            toc_offset: 1000,
            toc_len: 200,
            runtime_version: 311,
            runtime_library: "libpython3.11.so.1.0".to_string(),
        }
    }

    #[test]
    fn test_cookie_len() {
        assert_eq!(COOKIE_LEN, 88);
    }

    #[test]
    fn test_magic_is_not_stored_verbatim() {
        assert_ne!(MAGIC_MASKED, magic());
        assert_eq!(&magic()[..3], b"BPK");
        assert_ne!(SIDELOAD_MASKED, sideload_marker());
        assert_ne!(magic(), sideload_marker());
    }

    #[test]
    fn test_cookie_fields_are_big_endian() {
        let bytes = sample().encode();
        assert_eq!(&bytes[8..12], &4096u32.to_be_bytes());
        assert_eq!(&bytes[20..24], &311u32.to_be_bytes());
        assert_eq!(Cookie::parse(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_cookie_rejects_bad_magic() {
        let mut bytes = sample().encode();
        bytes[0] ^= 0xff;
        assert!(matches!(
            Cookie::parse(&bytes),
            Err(ArchiveError::Malformed(_))
        ));
    }

    #[test]
    fn test_find_cookie_in_short_buffer() {
        let mut data = vec![0u8; 100];
        data.extend_from_slice(&magic());
        data.extend_from_slice(&[1, 2, 3]);
        let len = data.len() as u64;
        let found = find_cookie(&mut Cursor::new(data), len).unwrap();
        assert_eq!(found, Some(100));
    }

    #[test]
    fn test_find_cookie_straddling_chunk_boundary() {
        // Every split of the magic across the boundary between the last two
        // scan windows.
        for split in 1..MAGIC_LEN {
            let total = SCAN_CHUNK * 2 + 5;
            let magic_pos = total - SCAN_CHUNK - split;
            let mut data = vec![0xAAu8; total];
            data[magic_pos..magic_pos + MAGIC_LEN].copy_from_slice(&magic());
            let found = find_cookie(&mut Cursor::new(data), total as u64).unwrap();
            assert_eq!(found, Some(magic_pos as u64), "split {}", split);
        }
    }

    #[test]
    fn test_find_cookie_at_file_start_with_exact_multiple() {
        let total = SCAN_CHUNK * 3;
        let mut data = vec![0u8; total];
        data[..MAGIC_LEN].copy_from_slice(&magic());
        let found = find_cookie(&mut Cursor::new(data), total as u64).unwrap();
        assert_eq!(found, Some(0));
    }

    #[test]
    fn test_rfind_pattern_prefers_last_match() {
        let mut data = b"xxMARKxxxxMARKxx".to_vec();
        data.extend(vec![0u8; SCAN_CHUNK]);
        let len = data.len() as u64;
        let found = rfind_pattern(&mut Cursor::new(data), len, b"MARK").unwrap();
        assert_eq!(found, Some(10));
    }

    #[test]
    fn test_find_cookie_absent() {
        let data = vec![0x42u8; SCAN_CHUNK * 2 + 17];
        let len = data.len() as u64;
        assert_eq!(find_cookie(&mut Cursor::new(data), len).unwrap(), None);
    }
}
