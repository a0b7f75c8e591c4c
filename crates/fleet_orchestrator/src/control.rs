//! Minimal operator console on stdin, the command-injection collaborator
//! from the snapshot/command split: it only reads published snapshots and
//! feeds commands through the handle.
//!
//! Commands:
//!   task                        submit a random demo task
//!   task SX SY GX GY [PRIO]     submit a delivery task
//!   stop                        emergency-stop the whole fleet
//!   speed FACTOR                set the speed multiplier (0.1..=3.0)
//!   charge                      send every robot below 90% to a station
//!   status                      log a one-line fleet summary

use fleet_sim::{Point, TaskKind, TaskSpec};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::runtime::{FleetCommand, FleetHandle};

/// Ticks between periodic status lines; 100 ticks is 10 s at the default
/// tick interval.
const STATUS_LOG_EVERY_TICKS: u64 = 100;

/// Follows the snapshot stream and logs a fleet summary on a fixed cadence.
pub async fn run_status_reporter(mut handle: FleetHandle) -> anyhow::Result<()> {
    loop {
        handle.changed().await?;
        let tick = handle.latest().tick_index;
        if tick > 0 && tick % STATUS_LOG_EVERY_TICKS == 0 {
            log_status(&handle);
        }
    }
}

pub async fn run_stdin_console(handle: FleetHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Ok(Some(command)) => handle.send(command).await?,
            Ok(None) => log_status(&handle),
            Err(err) => tracing::warn!(input = %line.trim(), error = %err, "unrecognized command"),
        }
    }
    Ok(())
}

/// `Ok(Some(_))` for a command, `Ok(None)` for a status request.
fn parse(line: &str) -> anyhow::Result<Option<FleetCommand>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Err(anyhow::anyhow!("empty line")),
        ["task"] => Ok(Some(FleetCommand::SubmitRandomTask)),
        ["task", sx, sy, gx, gy, rest @ ..] => {
            let priority = match rest {
                [] => 3,
                [p] => p.parse()?,
                _ => return Err(anyhow::anyhow!("too many arguments")),
            };
            Ok(Some(FleetCommand::SubmitTask(TaskSpec {
                kind: TaskKind::Delivery,
                priority,
                start: Point::new(sx.parse()?, sy.parse()?),
                goal: Point::new(gx.parse()?, gy.parse()?),
                est_duration_s: 10.0,
            })))
        }
        ["stop"] => Ok(Some(FleetCommand::EmergencyStop)),
        ["speed", factor] => Ok(Some(FleetCommand::SetSpeedMultiplier(factor.parse()?))),
        ["charge"] => Ok(Some(FleetCommand::ChargeAll)),
        ["status"] => Ok(None),
        _ => Err(anyhow::anyhow!("unknown command")),
    }
}

fn log_status(handle: &FleetHandle) {
    let snapshot = handle.latest();
    tracing::info!(
        tick = snapshot.tick_index,
        sim_time_s = snapshot.sim_time_s,
        completed = snapshot.metrics.completed_tasks,
        pending = snapshot.metrics.pending_tasks,
        utilization = snapshot.metrics.utilization,
        avg_battery = snapshot.metrics.average_battery_pct,
        "fleet status"
    );
}
