use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ttyrec_tv::discovery::ProcScanner;
use ttyrec_tv::server::BroadcastServer;
use ttyrec_tv::{BroadcastConfig, Broadcaster, Pacing};

#[derive(Parser)]
#[command(name = "ttyrec-tv")]
#[command(about = "Broadcast live ttyrec recordings to TCP viewers", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address viewers connect to
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Clip length in seconds
    #[arg(short, long)]
    window: Option<f64>,

    /// Never wait longer than this many seconds between frames
    #[arg(long, value_name = "SECONDS", conflicts_with = "pacing_scale")]
    pacing_cap: Option<f64>,

    /// Multiply recorded delays by this factor (0 < k <= 1)
    #[arg(long, value_name = "FACTOR")]
    pacing_scale: Option<f64>,

    /// Finished recordings to broadcast once at startup
    #[arg(long, value_name = "FILE", num_args = 1..)]
    replay: Vec<PathBuf>,

    /// Do not scan for running ttyrec processes
    #[arg(long)]
    no_discovery: bool,
}

impl Cli {
    fn load_config(&self) -> Result<BroadcastConfig> {
        let mut config = match &self.config {
            Some(path) => BroadcastConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BroadcastConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(window) = self.window {
            config.window_seconds = window;
        }
        if let Some(cap) = self.pacing_cap {
            config.pacing = Pacing::Capped(cap);
        }
        if let Some(scale) = self.pacing_scale {
            config.pacing = Pacing::Scaled(scale);
        }

        config.validate().context("invalid command line options")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    info!("Starting ttyrec-tv v{}", env!("CARGO_PKG_VERSION"));

    let broadcaster = Arc::new(Broadcaster::new(config.clone())?);
    let server = BroadcastServer::bind(
        config.listen,
        broadcaster.distributor(),
        config.pacing,
        config.reset_bytes(),
    )
    .await?;

    for path in &cli.replay {
        if let Err(e) = broadcaster.enqueue_file(path) {
            warn!(path = %path.display(), "Skipping replay file: {}", e);
        }
    }

    let cancel = CancellationToken::new();
    let discovery = (!cli.no_discovery).then(|| {
        let broadcaster = Arc::clone(&broadcaster);
        let cancel = cancel.clone();
        tokio::spawn(async move { broadcaster.run_discovery(ProcScanner::default(), cancel).await })
    });
    let server = tokio::spawn(server.run(cancel.clone()));

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down");
    cancel.cancel();

    if let Some(discovery) = discovery {
        discovery.await.context("discovery task")?;
    }
    server.await.context("server task")??;
    broadcaster.shutdown().await;
    Ok(())
}
