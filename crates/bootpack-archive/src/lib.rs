//! Reader for the bootpack container format.
//!
//! A container is a run of entry payloads followed by a table of contents and
//! a fixed-size cookie. It may stand alone or be appended to an executable;
//! [`Archive::open`] finds it either way by scanning for the cookie magic.
//!
//! - `cookie`: magic, trailer layout, backward scan
//! - `toc`: entry kinds and the validating TOC cursor
//! - `stream`: chunked copy and inflate
//! - `archive`: [`Archive`], lookup and extraction

mod archive;
#[cfg(any(test, feature = "test-support"))]
mod builder;
pub mod cookie;
mod error;
pub mod stream;
pub mod toc;

pub use archive::{Archive, CASE_INSENSITIVE_FS};
#[cfg(any(test, feature = "test-support"))]
pub use builder::ArchiveBuilder;
pub use cookie::Cookie;
pub use error::{ArchiveError, Result};
pub use toc::{EntryInfo, EntryKind, TocEntry, TocIter};
