//! SunGuard server
//!
//! Reads signal lines from stdin, drives the configured controllers and
//! writes every bus event to stdout as JSON.

use anyhow::{Context as _, Result};
use sg_config::{ControllerConfig, SunGuardConfig};
use sg_controller::{CoverActuator, SystemClock};
use sg_event_bus::EventBus;
use sg_server::{ControllerManager, LoggingActuator, SignalUpdate};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "sunguard.yaml";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SUNGUARD_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string())
        .into()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries events
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting SunGuard");

    let path = config_path();
    let config = SunGuardConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    let bus = Arc::new(EventBus::new());
    let manager = ControllerManager::new(
        bus.clone(),
        Arc::new(SystemClock),
        Arc::new(|config: &ControllerConfig| {
            Arc::new(LoggingActuator::new(config.id.clone())) as Arc<dyn CoverActuator>
        }),
    );
    manager.load(&config)?;

    let mut events = bus.subscribe_all();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event output lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    info!("SunGuard is running with {} controller(s)", manager.count());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let routed = match SignalUpdate::parse(&line) {
                        Ok(update) => manager.route(&update).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = routed {
                        warn!("Ignoring signal line: {}", e);
                    }
                }
                None => {
                    info!("Signal feed closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    manager.shutdown_all().await;
    printer.abort();

    Ok(())
}
