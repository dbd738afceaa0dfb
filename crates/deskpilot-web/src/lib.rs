//! HTTP surface for DeskPilot.
//!
//! - Action endpoints (`/os/...`, `/window/...`, `/app/run`, `/browser/...`,
//!   `/screen/screenshot`) over the shared [`deskpilot_adapters::ActionSurface`].
//! - Control endpoints: `/panic`, `/enable`, `/status`.
//! - Command endpoints: `/agent/command` (deterministic planner) and
//!   `/agent/llm` (tool-calling loop).
//!
//! Configuration comes from a TOML file plus environment overrides, see
//! [`config`].

pub mod agent;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use config::{DeskPilotConfig, LoadedConfig, load_config};
pub use error::{ApiError, WebError};
pub use server::WebServer;
pub use state::AppState;

/// Web server bind configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: config::DEFAULT_HOST.into(),
            port: config::DEFAULT_PORT,
        }
    }
}

impl From<&DeskPilotConfig> for WebConfig {
    fn from(config: &DeskPilotConfig) -> Self {
        Self {
            bind_addr: config.server.host.clone(),
            port: config.server.port,
        }
    }
}
