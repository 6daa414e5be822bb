//! # smartlink
//!
//! Command-line control panel for a smart-module device. Loads settings,
//! opens one session, runs a single subcommand, and closes the session.

#![deny(unsafe_code)]

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use smartlink_core::logging::{init_json_subscriber, init_subscriber};
use smartlink_session::{Session, SessionConfig};
use smartlink_settings::{SmartlinkSettings, load_settings, load_settings_from_path};
use tracing::{debug, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = resolve_settings(&args)?;
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(&settings.logging.level);
    if args.json_logs {
        init_json_subscriber(level);
    } else {
        init_subscriber(level);
    }

    let config = SessionConfig::from_settings(&settings);
    debug!(url = %config.url, "starting session");
    let session = Session::websocket(config);
    session.on_notice(|notice| eprintln!("[{notice}]"));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let open_timeout = args.open_timeout();
    let outcome = commands::execute(&session, args.command, open_timeout, shutdown).await;
    session.close().await;

    if let Some(output) = outcome? {
        println!("{output}");
    }
    Ok(())
}

/// Settings file (explicit or default) with the `--url` override applied.
fn resolve_settings(args: &Cli) -> Result<SmartlinkSettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => load_settings().context("failed to load settings")?,
    };
    if let Some(url) = &args.url {
        settings.device.url.clone_from(url);
    }
    Ok(settings)
}
