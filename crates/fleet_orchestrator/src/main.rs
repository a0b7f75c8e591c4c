// amr-fleet/crates/fleet_orchestrator/src/main.rs
mod config;
mod control;
mod metrics;
mod runtime;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fleet_sim::FleetCoordinator;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Cli;
use crate::metrics::Metrics;
use crate::runtime::TickDriver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let fleet_config = cli.to_fleet_config().context("invalid fleet configuration")?;
    tracing::info!(
        grid_width = fleet_config.grid_width,
        grid_height = fleet_config.grid_height,
        fleet_size = fleet_config.fleet_size,
        stations = fleet_config.station_cells.len(),
        "Loaded configuration"
    );

    let mut fleet = FleetCoordinator::new(fleet_config)?;
    for _ in 0..cli.initial_tasks {
        fleet
            .submit_random_task()
            .context("failed to seed initial task backlog")?;
    }
    tracing::info!(initial_tasks = cli.initial_tasks, "Fleet initialized");

    let metrics = Arc::new(Metrics::new());

    // Spawn the metrics server
    let metrics_handle = {
        let router = metrics.router();
        let addr = cli.metrics_listen_addr;
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
            tracing::info!(addr = %addr, "Metrics server listening");
            axum::serve(listener, router.into_make_service()).await?;
            Ok::<(), anyhow::Error>(())
        })
    };

    let auto_task_interval = if cli.auto_task_interval_ms == 0 {
        None
    } else {
        Some(Duration::from_millis(cli.auto_task_interval_ms))
    };
    let (driver, handle) = TickDriver::new(
        fleet,
        Duration::from_millis(cli.tick_interval_ms),
        auto_task_interval,
        metrics,
    );

    // Spawn the stdin operator console and the periodic status reporter;
    // the console ends quietly when stdin closes.
    let console_handle = tokio::spawn(control::run_stdin_console(handle.clone()));
    let reporter_handle = tokio::spawn(control::run_status_reporter(handle));

    // The tick driver runs on the main task until ctrl-c.
    let final_snapshot = driver.run().await?;
    tracing::info!(
        ticks = final_snapshot.tick_index,
        sim_time_s = final_snapshot.sim_time_s,
        completed_tasks = final_snapshot.metrics.completed_tasks,
        pending_tasks = final_snapshot.metrics.pending_tasks,
        "Fleet orchestrator shut down gracefully"
    );

    metrics_handle.abort();
    console_handle.abort();
    reporter_handle.abort();
    Ok(())
}
