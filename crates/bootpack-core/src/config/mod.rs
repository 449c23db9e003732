//! Configuration layer.
//!
//! All environment access is concentrated here; the rest of the workspace
//! reads structured config instead of calling `std::env::var` directly.
//!
//! - `env_keys`: variable names
//! - `loader`: env_or, env_optional, env_bool and the env mutation wrappers
//! - `schema`: ObservabilityConfig, UnpackConfig, Handshake

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{
    env_bool, env_optional, env_or, env_os, env_path_optional, remove_env_var, set_env_var,
};
pub use schema::{Handshake, ObservabilityConfig, UnpackConfig};
