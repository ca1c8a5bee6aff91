//! Persistence and autosave for Folio.
//!
//! - [`gateway`]: the async contract with the remote page store
//! - [`memory`]: in-process gateway for tests and the CLI
//! - [`autosave`]: debounced, coalescing save worker
//! - [`session`]: open / create / delete / edit / save flows
//! - [`config`]: RON configuration

pub mod autosave;
pub mod config;
pub mod constants;
pub mod gateway;
pub mod memory;
pub mod session;

pub use autosave::{AutosaveHandle, AutosaveStatus, SaveError, SaveTarget, spawn_autosave};
pub use config::{AutosaveConfig, ConfigError, FolioConfig};
pub use gateway::{
    CreatePageRequest, CreatedPage, GatewayError, GatewayResult, PersistenceGateway,
    UpdatePageRequest,
};
pub use memory::MemoryGateway;
pub use session::{EditorSession, SessionError, SessionResult};
