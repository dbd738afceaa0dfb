//! Router composition and startup.
//!
//! [`WebServer`] registers every route over a shared [`AppState`].  All
//! routes except `/panic` sit behind the token check so an emergency stop
//! always goes through.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::WebConfig;
use crate::auth::require_token;
use crate::error::{Result, WebError};
use crate::state::AppState;
use crate::{agent, api};

/// The DeskPilot HTTP server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a server bound to the host and port from the state's config.
    pub fn new(state: AppState) -> Self {
        Self {
            config: WebConfig::from(&state.config),
            state: Arc::new(state),
        }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let protected = Router::new()
            // Control.
            .route("/enable", get(api::enable))
            .route("/status", get(api::status))
            // Mouse, keyboard, clipboard.
            .route("/os/mouse/move", get(api::mouse_move))
            .route("/os/mouse/click", get(api::mouse_click))
            .route("/os/keyboard/type", get(api::keyboard_type))
            .route("/os/keyboard/hotkey", get(api::keyboard_hotkey))
            .route("/os/keyboard/paste", get(api::keyboard_paste))
            .route("/os/clipboard/set", get(api::clipboard_set))
            // Windows, screen, apps, browser.
            .route("/window/activate", get(api::window_activate))
            .route("/window/click_center", get(api::window_click_center))
            .route("/screen/screenshot", get(api::screenshot))
            .route("/app/run", get(api::app_run))
            .route("/browser/open", get(api::browser_open))
            .route("/browser/script", post(api::browser_script))
            // Planners.
            .route("/agent/command", post(agent::command))
            .route("/agent/llm", post(agent::llm))
            // Captures.
            .nest_service("/shots", ServeDir::new(self.state.surface.shots_dir()))
            .route_layer(from_fn_with_state(Arc::clone(&self.state), require_token));

        Router::new()
            .route("/panic", get(api::panic))
            .merge(protected)
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Bind`] if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<()> {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| WebError::Bind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        self.state.set_local_addr(local);
        let router = self.router();

        tracing::info!(
            addr = %local,
            backend = self.state.surface.backend_id(),
            auth = self.state.token().is_some(),
            "starting web server"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
