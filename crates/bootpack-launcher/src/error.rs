use std::io;
use std::path::PathBuf;

use bootpack_archive::ArchiveError;
use bootpack_runtime::BindingError;
use thiserror::Error;

/// Fatal launch failures.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("cannot determine the path of the running executable: {0}")]
    Executable(String),

    #[error("no archive embedded in {exe} and no side-load archive next to it")]
    ArchiveMissing {
        exe: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("side-load archive {0} found, but the executable does not permit side-loading")]
    SideLoadRefused(PathBuf),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("cannot create extraction directory under {dir}: {source}")]
    ExtractionDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid dependency reference {0:?}: expected location:member")]
    InvalidReference(String),

    #[error("dependency {member} not found via {location}")]
    DependencyNotFound { location: String, member: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Runtime(#[from] BindingError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LaunchError>;
