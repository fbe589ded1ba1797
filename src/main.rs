use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use serde_json::Value;

use opstrack_lib::{
    init_logging, LiveView, LiveViewController, RevisionId, SettingsStore, SilentPlayer, TaskId,
    ThreadId, ViewSink, ViewSubject,
};

#[derive(Parser)]
#[command(name = "opstrack", about = "Follow live generations and builds for one chat thread")]
struct Cli {
    /// Chat thread to follow.
    #[arg(long)]
    thread: String,
    /// Revision whose builds to follow.
    #[arg(long)]
    revision: Option<String>,
    #[arg(long, default_value = "./opstrack.json")]
    settings: PathBuf,
}

/// Logs every rendered view as one JSON line.
struct LogSink;

impl ViewSink for LogSink {
    fn render(&self, view: &LiveView) {
        match serde_json::to_string(view) {
            Ok(json) => info!("{json}"),
            Err(err) => warn!("could not serialize view: {err}"),
        }
    }

    fn show_errors(&self, task_id: &TaskId, errors: &[String]) {
        for error in errors {
            warn!("generation {task_id}: {error}");
        }
    }

    fn refresh(&self, view_data: &Value) {
        info!("view data refreshed: {view_data}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let store = SettingsStore::load(&cli.settings)?;
    let settings = store.current();
    info!(
        "opstrack following thread {} via {} and {}",
        cli.thread, settings.channel_url, settings.api_base_url
    );

    let controller =
        LiveViewController::from_settings(&settings, Arc::new(LogSink), Arc::new(SilentPlayer))?;
    let subject = ViewSubject::new(
        ThreadId::new(cli.thread),
        cli.revision.map(RevisionId::new),
    );
    controller
        .mount(subject)
        .await
        .context("failed to mount the live view")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    controller.unmount().await;
    Ok(())
}
