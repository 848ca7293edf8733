//! YTDJ Player - demo entry point
//!
//! Plays a JSON playlist through two simulated media players, crossfading
//! at each track's mix-out point, and logs every transition event.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytdj_common::config::ConfigResolver;
use ytdj_common::events::TransitionEvent;
use ytdj_player::playlist::{load_playlist, media_catalog};
use ytdj_player::sim::SimulatedPlayer;
use ytdj_player::{EngineConfig, TransitionEngine};

/// Command-line arguments for ytdj-player
#[derive(Parser, Debug)]
#[command(name = "ytdj-player")]
#[command(about = "Dual-slot crossfading playback core for YTDJ playlists")]
#[command(version)]
struct Args {
    /// Playlist JSON file
    #[arg(short, long, env = "YTDJ_PLAYLIST")]
    playlist: PathBuf,

    /// Configuration file (overrides YTDJ_CONFIG and the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default crossfade length in seconds (5-30)
    #[arg(long)]
    crossfade: Option<f64>,

    /// Master volume (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first so its log level can seed the filter
    let mut config = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ytdj_player={0},ytdj_common={0}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(secs) = args.crossfade {
        config.transition.default_crossfade_secs = secs;
    }
    if let Some(volume) = args.volume {
        config.master_volume = volume;
    }

    let entries = load_playlist(&args.playlist)
        .with_context(|| format!("Failed to load playlist {}", args.playlist.display()))?;
    info!(
        "Loaded {} entries from {}",
        entries.len(),
        args.playlist.display()
    );

    let catalog = media_catalog(&entries);
    let (handle, task) = TransitionEngine::spawn(
        entries,
        Box::new(SimulatedPlayer::new(catalog.clone())),
        Box::new(SimulatedPlayer::new(catalog)),
        EngineConfig::from(&config),
    );
    let mut events = handle.subscribe();
    handle.play(None).context("Failed to start playback")?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let finished = matches!(event, TransitionEvent::PlaylistFinished { .. });
                    info!("{}", serde_json::to_string(&event)?);
                    if finished {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Event log lagged by {} events", n),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => break,
        }
    }

    handle.shutdown().await.ok();
    task.await.context("Engine task failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
