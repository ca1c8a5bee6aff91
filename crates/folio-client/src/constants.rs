//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Quiet period after the last edit before autosave writes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Log filter used when neither the config file nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_FILTER: &str = "warn,folio=info,folio_client=info,folio_editor=info";

/// File name looked up when no `--config` path is given.
pub const CONFIG_FILE_NAME: &str = "folio.ron";
