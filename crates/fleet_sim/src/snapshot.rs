//! Read-only views of the fleet at a tick boundary.
//!
//! A snapshot is plain owned data, recomputed from coordinator state each
//! tick and never mutated afterwards, so it can be handed to any number of
//! concurrent consumers (dashboards, metrics exporters) without
//! synchronization.

use chrono::{DateTime, Utc};

use crate::grid::{Cell, Point};
use crate::robot::{RobotId, RobotStatus};
use crate::station::StationId;
use crate::task::{TaskId, TaskKind, TaskState};

#[derive(Debug, Clone, PartialEq)]
pub struct RobotView {
    pub id: RobotId,
    pub position: Point,
    pub cell: Cell,
    pub battery_pct: f64,
    pub status: RobotStatus,
    pub task: Option<TaskId>,
    pub distance_traveled: f64,
    pub tasks_completed: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: u8,
    pub state: TaskState,
    pub start: Point,
    pub goal: Point,
    pub assigned_to: Option<RobotId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationView {
    pub id: StationId,
    pub cell: Cell,
    pub capacity: usize,
    pub occupants: Vec<RobotId>,
}

/// Robots per status, for the status-distribution readout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub idle: u32,
    pub moving: u32,
    pub working: u32,
    pub charging: u32,
    pub maintenance: u32,
}

impl StatusCounts {
    pub fn record(&mut self, status: RobotStatus) {
        match status {
            RobotStatus::Idle => self.idle += 1,
            RobotStatus::Moving => self.moving += 1,
            RobotStatus::Working => self.working += 1,
            RobotStatus::Charging => self.charging += 1,
            RobotStatus::Maintenance => self.maintenance += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.idle + self.moving + self.working + self.charging + self.maintenance
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FleetMetrics {
    pub completed_tasks: u64,
    pub pending_tasks: usize,
    pub active_tasks: usize,
    /// Completed tasks per second of simulated time.
    pub efficiency: f64,
    /// Fraction of the fleet not Idle, 0.0..=1.0.
    pub utilization: f64,
    pub average_battery_pct: f64,
    pub status_counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetSnapshot {
    pub tick_index: u64,
    pub sim_time_s: f64,
    pub wall_time: DateTime<Utc>,
    pub speed_multiplier: f64,
    pub robots: Vec<RobotView>,
    pub tasks: Vec<TaskView>,
    pub stations: Vec<StationView>,
    pub metrics: FleetMetrics,
}

impl FleetSnapshot {
    /// An empty snapshot for channel initialization, before the first tick.
    pub fn empty() -> Self {
        Self {
            tick_index: 0,
            sim_time_s: 0.0,
            wall_time: Utc::now(),
            speed_multiplier: 1.0,
            robots: Vec::new(),
            tasks: Vec::new(),
            stations: Vec::new(),
            metrics: FleetMetrics::default(),
        }
    }
}
