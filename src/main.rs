//! Headless host for the task timer.
//!
//! Reads newline-delimited JSON `Command`s from stdin and writes a JSON
//! `Snapshot` line to stdout after each one and after every tick while a
//! task is running.
//! Tracing goes to stderr so stdout stays a clean JSON channel.

use std::io::Write;

use anyhow::Context;
use task_timer::config::Config;
use task_timer::driver::{self, Command, Driver, Snapshot};
use task_timer::effects::Effects;
use task_timer::store::FileStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const COMMAND_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        tick = ?config.tick_interval,
        "task timer starting"
    );

    let store = FileStore::new(&config.data_dir);
    let timer = Driver::load(store, Effects::headless());
    emit(&timer.snapshot());

    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let reader = tokio::spawn(read_commands(tx));

    driver::run(timer, rx, config.tick_interval, |snapshot| emit(&snapshot)).await;

    reader.await.context("stdin reader panicked")??;
    tracing::info!("task timer shut down cleanly");
    Ok(())
}

// Forward stdin lines as commands until EOF or the driver goes away.
async fn read_commands(tx: mpsc::Sender<Command>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read from stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command: Command = match serde_json::from_str(line) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed command");
                continue;
            }
        };
        if tx.send(command).await.is_err() {
            break;
        }
    }

    tracing::info!("stdin closed (EOF)");
    Ok(())
}

fn emit(snapshot: &Snapshot) {
    let json = match serde_json::to_string(snapshot) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize snapshot; skipping");
            return;
        }
    };
    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{json}").and_then(|_| out.flush()) {
        tracing::warn!(error = %e, "failed to write snapshot to stdout");
    }
}
