//! CLI entry point for camctl.
//!
//! Drives the coordinator against the mock camera provider so the
//! switch/coalesce/retry behavior can be observed without real hardware.
//!
//! # Usage
//!
//! Toggle between QR and ML modes a few times:
//! ```bash
//! camctl toggle --cycles 3
//! ```
//!
//! Watch the state sequence of a failing open:
//! ```bash
//! camctl fail-open
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use camctl::hardware::mock::MockCamera;
use camctl::{CameraCoordinator, CameraError, CameraMode, Settings};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "camctl")]
#[command(about = "Exclusive-access camera coordinator demo", long_about = None)]
struct Cli {
    /// Optional settings file (TOML)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alternate between QR and ML modes against the mock camera
    Toggle {
        /// Number of QR→ML round trips
        #[arg(long, default_value = "2")]
        cycles: u32,
    },

    /// Exhaust the retry policy against a camera that never opens
    FailOpen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.application.log_level.clone().into()),
        )
        .init();

    let camera = Arc::new(MockCamera::new());
    let coordinator = CameraCoordinator::new(camera.clone(), settings.coordinator());

    // Print every state change as it is published.
    let mut updates = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(state) = updates.recv().await {
            println!(
                "state: mode={} status={}{}",
                state.mode,
                state.status,
                state
                    .error_message
                    .as_deref()
                    .map(|m| format!(" error={m:?}"))
                    .unwrap_or_default()
            );
        }
    });

    match cli.command {
        Commands::Toggle { cycles } => {
            for cycle in 0..cycles {
                let qr = coordinator.request_camera(CameraMode::QrScanning).await?;
                tracing::info!(cycle, id = %qr.id(), "QR scanning owns the camera");
                tokio::time::sleep(Duration::from_millis(100)).await;

                let ml = coordinator.request_camera(CameraMode::MlDetection).await?;
                tracing::info!(cycle, id = %ml.id(), "ML detection owns the camera");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            coordinator.release_camera().await?;
            println!(
                "hardware cycles: {} opens / {} closes, peak concurrent opens: {}",
                camera.opens().await,
                camera.closes().await,
                camera.max_concurrent_open().await
            );
        }

        Commands::FailOpen => {
            camera
                .fail_next_opens(vec![
                    CameraError::HardwareUnavailable("sensor busy".into());
                    settings.camera.retry_max_attempts as usize
                ])
                .await;
            match coordinator.request_camera(CameraMode::QrScanning).await {
                Ok(_) => println!("unexpectedly opened"),
                Err(err) => println!(
                    "gave up after {} attempts: {err}",
                    camera.open_attempts().await
                ),
            }
        }
    }

    coordinator.shutdown().await;
    printer.abort();
    Ok(())
}
