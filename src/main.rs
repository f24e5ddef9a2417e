//! interval-timer: Background daemon for a work/rest interval workout timer
//!
//! This daemon provides:
//! - Explicit phase state machine (Idle, Prep, Work, Rest, Done)
//! - One-second phase clock with cancel-safe pause and reset
//! - Audio cues at phase transitions
//! - Persisted settings with the 3-hour session cap
//! - IPC server for UI clients (commands, status, event push)

mod audio;
mod clock;
mod config;
mod engine;
mod events;
mod ipc;
mod lifecycle;
mod settings;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::audio::{BellPlayer, CommandPlayer, CuePlayer};
use crate::config::Config;
use crate::engine::Engine;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::settings::{SettingsStore, SettingsWriter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "interval-timer starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.settings_path, "configuration loaded");

    // Register signal handlers before anything can block
    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Load persisted settings; never fatal
    let store = SettingsStore::new(&config.settings_path);
    let settings = store.load();
    info!(
        ?settings,
        session_seconds = settings.session_seconds(),
        "settings loaded"
    );

    let engine = Engine::new(settings, SettingsWriter::spawn(store));

    // Audio cues run off the event bus
    let player: Arc<dyn CuePlayer> = match config
        .cue_command
        .as_deref()
        .and_then(|command| CommandPlayer::from_command_line(command, &config.sound_dir))
    {
        Some(player) => {
            info!(command = ?config.cue_command, sound_dir = ?config.sound_dir, "using sound command for cues");
            Arc::new(player)
        }
        None => {
            info!("using terminal bell for cues");
            Arc::new(BellPlayer)
        }
    };
    tokio::spawn(audio::run_cue_player(player, engine.subscribe()));

    let server = Server::bind(&config.socket_path, engine.clone())?;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Wait for shutdown signal
        signal = shutdown.wait() => {
            info!(signal, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;
    engine.shutdown().await;

    info!("interval-timer stopped");

    Ok(())
}
