//! Shared configuration for the bootpack launcher crates.

pub mod config;
pub mod paths;
