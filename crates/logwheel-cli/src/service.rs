//! `run` and `once`: drive the orchestrator from the command line.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use logwheel_config::RotationPolicy;
use logwheel_rotate::{Logger, Orchestrator, TracingLogger};

/// Load and validate the policies, logging a fatal record on failure.
fn load(config: &Path) -> anyhow::Result<Vec<RotationPolicy>> {
    logwheel_config::load_policies(config)
        .inspect_err(|e| {
            TracingLogger.fatal(&format!(
                "Invalid config {}: {e}. Aborting program.",
                config.display()
            ))
        })
        .with_context(|| format!("Failed to load config {}", config.display()))
}

/// Poll all policies until Ctrl-C.
pub fn run(config: &Path, tick: Duration) -> anyhow::Result<()> {
    let policies = load(config)?;
    info!(
        config = %config.display(),
        policies = policies.len(),
        "Starting rotation service"
    );

    let orchestrator = Orchestrator::new(policies, Arc::new(TracingLogger));
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(orchestrator.run(tick, shutdown_signal()));
    Ok(())
}

/// Single pass over every policy.
pub fn once(config: &Path, force: bool) -> anyhow::Result<()> {
    let mut orchestrator = Orchestrator::new(load(config)?, Arc::new(TracingLogger));
    let rotated = orchestrator.run_once(force);
    if rotated > 0 {
        info!("Rotated {rotated} file(s)");
    } else {
        info!("No action");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
