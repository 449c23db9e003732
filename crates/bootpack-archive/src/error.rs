use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating, parsing or extracting an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no archive cookie found in {0}")]
    CookieNotFound(PathBuf),

    #[error("archive truncated: {0}")]
    Truncated(String),

    #[error("malformed archive: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("decompression failed: {0}")]
    Inflate(String),

    #[error("refusing to overwrite existing file {0}")]
    Overwrite(PathBuf),

    #[error("name escapes the extraction directory: {0}")]
    UnsafeName(String),

    #[error("entry type '{0}' cannot be extracted to the filesystem")]
    NotExtractable(char),

    #[error("entry '{name}': {source}")]
    Entry {
        name: String,
        #[source]
        source: Box<ArchiveError>,
    },
}

impl ArchiveError {
    /// Attach the offending entry name, unless already attached.
    pub fn in_entry(self, name: &str) -> Self {
        match self {
            e @ ArchiveError::Entry { .. } => e,
            other => ArchiveError::Entry {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with entry context peeled off.
    pub fn root(&self) -> &ArchiveError {
        match self {
            ArchiveError::Entry { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
