//! CLI entry point for DeskPilot.
//!
//! This binary provides the `deskpilot` command with subcommands for
//! serving the HTTP agent, previewing a command's plan, and printing the
//! resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deskpilot_adapters::{Desktop, DryRunDesktop, X11Desktop};
use deskpilot_intent::CommandInterpreter;
use deskpilot_web::{AppState, WebServer, load_config};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// DeskPilot -- a local desktop automation agent.
#[derive(Parser)]
#[command(
    name = "deskpilot",
    version,
    about = "DeskPilot -- local desktop automation over HTTP",
    long_about = "Exposes mouse, keyboard, window, app and browser actions over HTTP, \
                  with a French command planner and an LLM tool-calling planner on top."
)]
struct Cli {
    /// Config file (defaults to $DESKPILOT_CONFIG, then ./config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    Serve {
        /// Record actions instead of driving the desktop.
        #[arg(long)]
        dry_run: bool,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },

    /// Print the plan for a command without executing it.
    Plan {
        /// The command, e.g. `ouvre notepad et tape "Bonjour"`.
        command: String,
    },

    /// Show the resolved configuration.
    Status,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { dry_run, log_json } => {
            init_tracing("info", log_json);
            cmd_serve(cli.config, dry_run).await
        }
        Commands::Plan { command } => {
            init_tracing("warn", false);
            cmd_plan(&command)
        }
        Commands::Status => {
            init_tracing("warn", false);
            cmd_status(cli.config)
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_serve(config: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let loaded = load_config(config.as_deref()).context("failed to load configuration")?;

    let desktop: Arc<dyn Desktop> = if dry_run {
        Arc::new(DryRunDesktop::new())
    } else {
        Arc::new(X11Desktop::new())
    };
    info!(backend = desktop.backend_id(), "desktop backend ready");

    let state = AppState::new(loaded.config, loaded.path, desktop)
        .context("failed to build application state")?;
    WebServer::new(state)
        .start()
        .await
        .context("web server failed")?;
    Ok(())
}

fn cmd_plan(command: &str) -> Result<()> {
    let interpreter = CommandInterpreter::new().context("failed to build the intent table")?;
    let plan = interpreter.interpret(command);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_status(config: Option<PathBuf>) -> Result<()> {
    let loaded = load_config(config.as_deref()).context("failed to load configuration")?;
    let config = &loaded.config;
    let status = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "config_path": loaded.path.to_string_lossy(),
        "listen": format!("{}:{}", config.server.host, config.server.port),
        "token": config.token().is_some(),
        "disabled": config.security.disabled,
        "features": config.features.effective(),
        "allowlist": config.run.allowlist.keys(),
        "llm": {
            "model": config.llm.model,
            "base_url": config.llm.base_url,
            "api_key": !config.llm.api_key.is_empty(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
