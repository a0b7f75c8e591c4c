// amr-fleet/crates/fleet_orchestrator/src/runtime.rs
//! The tick driver and the command/snapshot channels around the core.
//!
//! All mutation happens on the driver task. Commands arrive on an mpsc
//! channel and are drained at the start of the next tick, never mid-tick,
//! so no consumer can observe a half-updated fleet; each tick's snapshot
//! goes out on a watch channel as plain owned data.

use std::sync::Arc;
use std::time::Duration;

use fleet_sim::{FleetCoordinator, FleetSnapshot, TaskSpec};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::metrics::Metrics;

/// Operator commands, applied atomically at the next tick boundary.
#[derive(Debug)]
pub enum FleetCommand {
    SubmitTask(TaskSpec),
    SubmitRandomTask,
    EmergencyStop,
    SetSpeedMultiplier(f64),
    ChargeAll,
}

/// Cloneable handle for external collaborators: send commands in, read the
/// latest snapshot out.
#[derive(Clone)]
pub struct FleetHandle {
    commands: mpsc::Sender<FleetCommand>,
    snapshots: watch::Receiver<FleetSnapshot>,
}

impl FleetHandle {
    pub async fn send(&self, command: FleetCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("fleet driver has shut down"))
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> FleetSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Resolves whenever a new snapshot is published.
    pub async fn changed(&mut self) -> anyhow::Result<()> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| anyhow::anyhow!("fleet driver has shut down"))
    }
}

pub struct TickDriver {
    fleet: FleetCoordinator,
    tick_interval: Duration,
    /// Submit a demo task every this many ticks; `None` disables it.
    auto_task_every: Option<u64>,
    commands: mpsc::Receiver<FleetCommand>,
    snapshots: watch::Sender<FleetSnapshot>,
    metrics: Arc<Metrics>,
}

impl TickDriver {
    pub fn new(
        fleet: FleetCoordinator,
        tick_interval: Duration,
        auto_task_interval: Option<Duration>,
        metrics: Arc<Metrics>,
    ) -> (Self, FleetHandle) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(fleet.snapshot());
        let auto_task_every = auto_task_interval.map(|interval| {
            (interval.as_millis() / tick_interval.as_millis().max(1)).max(1) as u64
        });
        let driver = Self {
            fleet,
            tick_interval,
            auto_task_every,
            commands: command_rx,
            snapshots: snapshot_tx,
            metrics,
        };
        let handle = FleetHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (driver, handle)
    }

    /// Runs until ctrl-c. Returns the final snapshot for the shutdown log.
    pub async fn run(mut self) -> anyhow::Result<FleetSnapshot> {
        let dt = self.tick_interval.as_secs_f64();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        tracing::info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "tick driver started"
        );
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                _ = interval.tick() => {
                    while let Ok(command) = self.commands.try_recv() {
                        self.apply(command);
                    }
                    if let Some(every) = self.auto_task_every {
                        if ticks % every == 0 {
                            match self.fleet.submit_random_task() {
                                Ok(id) => tracing::debug!(task_id = %id, "demo task submitted"),
                                Err(err) => tracing::warn!(error = %err, "demo task rejected"),
                            }
                        }
                    }
                    let snapshot = self.fleet.tick(dt);
                    self.metrics.observe(&snapshot);
                    let _ = self.snapshots.send(snapshot);
                    ticks += 1;
                }
            }
        }
        Ok(self.fleet.snapshot())
    }

    fn apply(&mut self, command: FleetCommand) {
        self.metrics.commands_total.inc();
        match command {
            FleetCommand::SubmitTask(spec) => match self.fleet.submit_task(spec) {
                Ok(id) => tracing::info!(task_id = %id, "operator task accepted"),
                Err(err) => tracing::warn!(error = %err, "operator task rejected"),
            },
            FleetCommand::SubmitRandomTask => match self.fleet.submit_random_task() {
                Ok(id) => tracing::info!(task_id = %id, "random task accepted"),
                Err(err) => tracing::warn!(error = %err, "random task rejected"),
            },
            FleetCommand::EmergencyStop => self.fleet.emergency_stop_all(),
            FleetCommand::SetSpeedMultiplier(factor) => {
                if let Err(err) = self.fleet.set_speed_multiplier(factor) {
                    tracing::warn!(error = %err, "speed change rejected");
                }
            }
            FleetCommand::ChargeAll => self.fleet.send_all_to_charge(),
        }
    }
}
