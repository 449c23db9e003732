//! Tracing initialisation.
//!
//! Uses `ObservabilityConfig` for BOOTPACK_QUIET, BOOTPACK_LOG_LEVEL and
//! BOOTPACK_LOG_JSON; `RUST_LOG` overrides the level when set. Everything
//! goes to stderr so the payload owns stdout.

use bootpack_core::config::ObservabilityConfig;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Filter directive derived from the configuration.
pub fn level_directive(cfg: &ObservabilityConfig) -> String {
    if cfg.quiet {
        "bootpack=warn".to_string()
    } else {
        cfg.log_level.clone()
    }
}

/// Initialize tracing. Call once at process startup.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = level_directive(cfg);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_forces_warn() {
        let cfg = ObservabilityConfig {
            quiet: true,
            log_level: "bootpack=debug".to_string(),
            log_json: false,
        };
        assert_eq!(level_directive(&cfg), "bootpack=warn");

        let cfg = ObservabilityConfig {
            quiet: false,
            ..cfg
        };
        assert_eq!(level_directive(&cfg), "bootpack=debug");
    }
}
