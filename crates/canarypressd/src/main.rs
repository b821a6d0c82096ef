//! canarypressd — the push-button canary release daemon.
//!
//! Single binary that assembles the release controller:
//! - Backend API client (reqwest)
//! - Reconciler + weight planner
//! - Device feedback runner behind the loopback transport
//!
//! # Usage
//!
//! ```text
//! canarypressd run --config canarypress.toml
//! canarypressd simulate --press-interval-ms 3000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use canarypress_api::fake::FakeReleaseApi;
use canarypress_api::ApiClient;

use canarypressd::config::{self, FileConfig, Overrides, Settings};
use canarypressd::controller::Controller;
use canarypressd::loopback::{loopback, LoopbackHandle};

const DEFAULT_CONFIG_PATH: &str = "canarypress.toml";

#[derive(Parser)]
#[command(name = "canarypressd", about = "Push-button canary release controller")]
struct Cli {
    /// Path to canarypress.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run against the real backend.
    Run {
        /// Backend API key.
        #[arg(long)]
        api_key: Option<String>,

        /// Backend zone name.
        #[arg(long)]
        zone: Option<String>,

        /// Release group to control.
        #[arg(long)]
        release_group: Option<String>,

        /// Peripheral device name.
        #[arg(long)]
        device: Option<String>,

        /// Backend base URL.
        #[arg(long)]
        base_url: Option<String>,

        /// Release state poll interval in milliseconds.
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Run against an in-memory backend with a scripted button.
    Simulate {
        /// Interval between simulated button presses in milliseconds.
        #[arg(long, default_value = "3000")]
        press_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,canarypressd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let file = load_file_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            api_key,
            zone,
            release_group,
            device,
            base_url,
            poll_interval_ms,
        } => {
            let settings = Settings::resolve(
                file,
                Overrides {
                    api_key,
                    zone,
                    release_group,
                    device,
                    base_url,
                    poll_interval_ms,
                },
            )?;
            run(settings).await
        }
        Command::Simulate { press_interval_ms } => {
            simulate(Duration::from_millis(press_interval_ms)).await
        }
    }
}

fn load_file_config(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    match path {
        Some(path) => FileConfig::from_file(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                FileConfig::from_file(default)
            } else {
                Ok(FileConfig::default())
            }
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(
        zone = %settings.zone,
        release_group = %settings.release_group,
        device = %settings.device,
        base_url = %settings.base_url,
        "canarypress daemon starting"
    );

    let api = ApiClient::new(&settings.base_url, &settings.api_key);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_ctrl_c(shutdown_tx);

    // The handle keeps the runner's button channel open for the whole run.
    let (peripheral, _handle) = loopback(shutdown_rx.clone());
    let controller = Controller::new(
        api,
        peripheral,
        settings.release_group,
        settings.poll_interval,
    );
    let result = controller.run(shutdown_rx).await;

    info!("canarypress daemon stopped");
    result
}

async fn simulate(press_interval: Duration) -> anyhow::Result<()> {
    info!("canarypress daemon starting in simulate mode");

    let api = FakeReleaseApi::new();
    seed_fake_backend(&api)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_ctrl_c(shutdown_tx);

    let (peripheral, handle) = loopback(shutdown_rx.clone());
    let presser = tokio::spawn(press_loop(handle, press_interval, shutdown_rx.clone()));

    let controller = Controller::new(
        api,
        peripheral,
        "simulated-group",
        Duration::from_millis(config::DEFAULT_POLL_INTERVAL_MS),
    );
    let result = controller.run(shutdown_rx).await;
    let _ = presser.await;

    info!("canarypress daemon stopped");
    result
}

fn spawn_ctrl_c(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown.send(true);
    });
}

/// Periodic scripted button presses until shutdown.
async fn press_loop(
    mut handle: LoopbackHandle,
    press_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cadence = tokio::time::interval(press_interval);
    cadence.tick().await;
    loop {
        tokio::select! {
            _ = cadence.tick() => {
                if handle.press().await.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// A two-version world: stable v1 serving, one v2 instance already deployed.
fn seed_fake_backend(api: &FakeReleaseApi) -> anyhow::Result<()> {
    let group = serde_json::from_value(serde_json::json!({
        "result": {
            "default": {
                "light": [{
                    "cluster_key": "simulated-cluster",
                    "metadata": [
                        {"key": "stage", "value": "prod"},
                        {"key": "version", "value": "v1"}
                    ],
                    "weight": 10000
                }]
            }
        }
    }))?;
    let cluster = serde_json::from_value(serde_json::json!({
        "result": {
            "instances": [
                {"metadata": [{"key": "stage", "value": "prod"}, {"key": "version", "value": "v1"}]},
                {"metadata": [{"key": "stage", "value": "prod"}, {"key": "version", "value": "v1"}]},
                {"metadata": [{"key": "stage", "value": "prod"}, {"key": "version", "value": "v2"}]}
            ]
        }
    }))?;
    api.set_release_group(group);
    api.set_cluster(cluster);
    Ok(())
}
