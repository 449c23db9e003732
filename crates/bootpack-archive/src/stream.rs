//! Chunked payload copy and zlib inflate.
//!
//! Both paths move data through fixed-size buffers so large entries never
//! need a whole-file intermediate.

use std::io::{self, Read, Write};

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{ArchiveError, Result};

/// Buffer size for reads, inflate input and inflate output.
pub const CHUNK_SIZE: usize = 8192;

fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            ArchiveError::Truncated("entry payload ends early".to_string())
        }
        _ => ArchiveError::Io(e),
    })
}

/// Copy `len` stored (uncompressed) bytes from `reader` to `out`.
pub fn copy_stored<R: Read, W: Write>(reader: &mut R, len: u64, out: &mut W) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(CHUNK_SIZE as u64) as usize;
        read_chunk(reader, &mut buf[..n])?;
        out.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(len)
}

/// Inflate exactly `compressed_len` bytes of a zlib stream into `out`.
///
/// Fails when the input is empty, ends before the stream-end marker, is
/// corrupt, or produces a byte count other than `expected_len`. Bytes already
/// written to `out` must be discarded by the caller on error.
pub fn inflate<R: Read, W: Write>(
    reader: &mut R,
    compressed_len: u64,
    expected_len: u64,
    out: &mut W,
) -> Result<u64> {
    if compressed_len == 0 {
        return Err(ArchiveError::Inflate(
            "entry is flagged compressed but has no data".to_string(),
        ));
    }

    let mut decoder = Decompress::new(true);
    let mut input = vec![0u8; CHUNK_SIZE];
    let mut output = vec![0u8; CHUNK_SIZE];
    let mut remaining = compressed_len;

    loop {
        if remaining == 0 {
            return Err(ArchiveError::Inflate(
                "input exhausted before end of stream".to_string(),
            ));
        }
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        read_chunk(reader, &mut input[..want])?;
        remaining -= want as u64;

        let mut consumed = 0usize;
        loop {
            let in_before = decoder.total_in();
            let out_before = decoder.total_out();
            let status = decoder
                .decompress(&input[consumed..want], &mut output, FlushDecompress::None)
                .map_err(|e| ArchiveError::Inflate(e.to_string()))?;
            let used = (decoder.total_in() - in_before) as usize;
            let produced = (decoder.total_out() - out_before) as usize;
            consumed += used;
            if decoder.total_out() > expected_len {
                return Err(ArchiveError::Inflate(format!(
                    "inflated past the declared {} bytes",
                    expected_len
                )));
            }
            out.write_all(&output[..produced])?;

            if status == Status::StreamEnd {
                let total = decoder.total_out();
                if total != expected_len {
                    return Err(ArchiveError::Inflate(format!(
                        "inflated {} bytes, expected {}",
                        total, expected_len
                    )));
                }
                return Ok(total);
            }
            if consumed == want && produced < output.len() {
                break;
            }
            if used == 0 && produced == 0 {
                return Err(ArchiveError::Inflate("inflate made no progress".to_string()));
            }
        }
    }
}
