//! Logging setup for Folio binaries.
//!
//! Logs go to stderr so stdout stays clean for command output. `RUST_LOG`
//! overrides the configured filter:
//!
//! ```bash
//! RUST_LOG=folio_client=trace folio fmt page.md
//! ```

use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter: `RUST_LOG` if set and valid, else `default_filter`,
/// else `info`.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(default_filter: &str) -> bool {
    let ansi = std::io::stderr().is_terminal();
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_target(true),
        )
        .try_init()
        .is_ok()
}
