//! Subcommand execution against an unopened session.
//!
//! Each command registers the handlers it needs, opens the session, waits
//! for it to become reachable, and does its work. The caller closes the
//! session afterwards.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use smartlink_core::ota::OtaEvent;
use smartlink_core::protocol::{DeviceCommand, UpgradeStatus};
use smartlink_session::Session;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::Command;

/// Run `command`. Returns text for stdout, if any.
///
/// `shutdown` ends the long-running commands (`watch`, `upgrade`).
pub async fn execute(
    session: &Session,
    command: Command,
    open_timeout: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<Option<String>> {
    match command {
        Command::Watch => {
            watch(session, open_timeout, shutdown).await?;
            Ok(None)
        }
        Command::Config => config(session, open_timeout).await.map(Some),
        Command::CheckUpgrade => {
            connect(session, open_timeout).await?;
            let status = session.check_for_upgrades().await?;
            Ok(Some(describe_upgrade(&status)))
        }
        Command::Upgrade => upgrade(session, open_timeout, shutdown).await.map(Some),
        Command::ResetSoc { shunt_id } => {
            send(session, open_timeout, DeviceCommand::ResetSoc { shunt_id }).await
        }
        Command::Reset => send(session, open_timeout, DeviceCommand::Reset).await,
        Command::ConfigMode { mode } => {
            send(session, open_timeout, DeviceCommand::UpdateConfigMode(mode)).await
        }
        Command::Settings(args) => {
            let update = args.to_update()?;
            send(session, open_timeout, DeviceCommand::UpdateSettings(update)).await
        }
    }
}

async fn connect(session: &Session, open_timeout: Duration) -> Result<()> {
    session.open();
    session
        .wait_until_open(open_timeout)
        .await
        .with_context(|| {
            format!(
                "device at {} not reachable within {} ms",
                session.config().url,
                open_timeout.as_millis()
            )
        })?;
    debug!(connection_id = ?session.connection_id(), "device reachable");
    Ok(())
}

/// Send one command, awaiting the reply when the firmware sends one.
async fn send(
    session: &Session,
    open_timeout: Duration,
    command: DeviceCommand,
) -> Result<Option<String>> {
    command.validate()?;
    connect(session, open_timeout).await?;
    let reply = session
        .execute(&command)
        .await
        .with_context(|| format!("{} failed", command.name()))?;
    info!(command = command.name(), "command accepted");
    Ok(Some(match reply {
        Some(reply) => serde_json::to_string_pretty(&reply)?,
        None => format!("{} sent", command.name()),
    }))
}

async fn config(session: &Session, open_timeout: Duration) -> Result<String> {
    let (tx, mut snapshots) = mpsc::unbounded_channel();
    session.on_config_data(move |snapshot| {
        let _ = tx.send(snapshot.clone());
    });
    connect(session, open_timeout).await?;

    let snapshot = tokio::time::timeout(open_timeout, snapshots.recv())
        .await
        .ok()
        .flatten()
        .ok_or_else(|| anyhow!("device sent no configuration snapshot"))?;
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

async fn watch(
    session: &Session,
    open_timeout: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    session.on_config_data(|snapshot| {
        println!(
            "configData: {} (firmware {})",
            snapshot.mod_name, snapshot.firmware_version
        );
    });
    session.on_upgrade_progress(|progress| {
        let line = progress_line(progress.status.as_deref(), progress.progress);
        println!("upgradeProgress: {line}");
    });
    session.on_ota_progress(|event| println!("otaProgress: {}", describe_ota(*event)));
    connect(session, open_timeout).await?;

    shutdown.await;
    Ok(())
}

async fn upgrade(
    session: &Session,
    open_timeout: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<String> {
    let (tx, mut events) = mpsc::unbounded_channel();
    session.on_ota_progress(move |event| {
        let _ = tx.send(*event);
    });
    session.on_upgrade_progress(|progress| {
        let line = progress_line(progress.status.as_deref(), progress.progress);
        println!("upgrade: {line}");
    });
    connect(session, open_timeout).await?;
    session.send_command(&DeviceCommand::StartUpgrade)?;

    tokio::pin!(shutdown);
    loop {
        let event = tokio::select! {
            () = &mut shutdown => bail!("upgrade interrupted before completion"),
            event = events.recv() => event.ok_or_else(|| anyhow!("session ended during upgrade"))?,
        };
        match event {
            OtaEvent::Progress(percent) => println!("flashing: {percent}%"),
            OtaEvent::Completed => return Ok("upgrade completed".to_owned()),
            OtaEvent::Failed => bail!("device reported upgrade failure"),
        }
    }
}

fn describe_upgrade(status: &UpgradeStatus) -> String {
    match (&status.latest_version, status.available) {
        (Some(latest), true) => format!(
            "firmware {} installed, {latest} available",
            status.current_version
        ),
        (None, true) => format!("firmware {} installed, update available", status.current_version),
        (_, false) => format!("firmware {} is up to date", status.current_version),
    }
}

fn describe_ota(event: OtaEvent) -> String {
    match event {
        OtaEvent::Progress(percent) => format!("{percent}%"),
        OtaEvent::Completed => "completed".to_owned(),
        OtaEvent::Failed => "failed".to_owned(),
    }
}

fn progress_line(status: Option<&str>, progress: Option<i64>) -> String {
    match (status, progress) {
        (Some(status), Some(progress)) => format!("{status} ({progress}%)"),
        (Some(status), None) => status.to_owned(),
        (None, Some(progress)) => format!("{progress}%"),
        (None, None) => "started".to_owned(),
    }
}
