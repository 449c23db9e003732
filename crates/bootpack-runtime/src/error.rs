use std::path::PathBuf;

use bootpack_archive::ArchiveError;
use thiserror::Error;

/// Errors raised while loading, binding or driving the hosted runtime.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("runtime library {name} not found in {searched}")]
    LibraryNotFound { name: String, searched: String },

    #[error("failed to load runtime library {path}: {source}")]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("required symbol {symbol} missing from runtime library: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("unsupported runtime version {0} (no configuration layout registered)")]
    UnsupportedVersion(u32),

    #[error("string contains an interior NUL byte: {0:?}")]
    InvalidString(String),

    #[error("runtime pre-initialization failed: {0}")]
    PreInit(String),

    #[error("runtime configuration failed: {0}")]
    Config(String),

    #[error("runtime initialization failed: {0}")]
    Init(String),

    #[error("runtime is not running")]
    NotStarted,

    #[error("bootstrap module '{0}' raised an exception")]
    Module(String),

    #[error("script '{0}' raised an unhandled exception")]
    Script(String),

    #[error("runtime call failed: {0}")]
    Call(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

pub type Result<T> = std::result::Result<T, BindingError>;
