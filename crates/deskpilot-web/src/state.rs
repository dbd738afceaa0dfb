//! Shared application state.
//!
//! [`AppState`] is wrapped in an `Arc` and shared by every handler.  It owns
//! the action surface (and through it the panic switch), the interpreter and
//! executor for `/agent/command`, and the settings `/agent/llm` needs.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use deskpilot_adapters::{ActionSurface, BrowserDriver, Desktop, PanicSwitch};
use deskpilot_intent::{CommandInterpreter, PlanExecutor};

use crate::config::DeskPilotConfig;
use crate::error::Result;

pub struct AppState {
    pub config: DeskPilotConfig,
    /// File the configuration was loaded from (reported by `/status`).
    pub config_path: PathBuf,
    pub surface: Arc<ActionSurface>,
    pub interpreter: CommandInterpreter,
    pub executor: PlanExecutor,
    local_url: OnceLock<String>,
}

impl AppState {
    /// Build the state over a desktop backend.
    pub fn new(
        config: DeskPilotConfig,
        config_path: PathBuf,
        desktop: Arc<dyn Desktop>,
    ) -> Result<Self> {
        let mut browser = BrowserDriver::new(config.browser.debug_port);
        if let Some(path) = &config.browser.chrome_path {
            browser = browser.with_chrome_path(path.clone());
        }

        let surface = Arc::new(
            ActionSurface::new(desktop)
                .with_features(config.features.clone())
                .with_allowlist(config.run.allowlist.clone())
                .with_panic_switch(Arc::new(PanicSwitch::new(config.security.disabled)))
                .with_browser(browser)
                .with_shots_dir(config.paths.shots_dir.clone()),
        );

        Ok(Self {
            interpreter: CommandInterpreter::new()?,
            executor: PlanExecutor::new(Arc::clone(&surface)),
            surface,
            config,
            config_path,
            local_url: OnceLock::new(),
        })
    }

    pub fn panic_switch(&self) -> &PanicSwitch {
        self.surface.panic_switch()
    }

    pub fn token(&self) -> Option<&str> {
        self.config.token()
    }

    /// Record the address the server actually listens on.
    pub fn set_local_addr(&self, addr: SocketAddr) {
        let _ = self.local_url.set(local_base_url(addr));
    }

    /// Base URL the LLM tools use to reach this service.
    pub fn local_url(&self) -> String {
        self.local_url.get().cloned().unwrap_or_else(|| {
            let server = &self.config.server;
            match server.host.parse::<IpAddr>() {
                Ok(ip) => local_base_url(SocketAddr::new(ip, server.port)),
                Err(_) => format!("http://{}:{}", server.host, server.port),
            }
        })
    }
}

/// `http://` base URL reaching `addr` from this host.  Wildcard binds map to
/// the loopback address of the same family.
pub fn local_base_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}
