//! Deterministic simulation engine for a fleet of autonomous mobile robots
//! (AMRs) on a 2-D occupancy grid.
//!
//! - `grid`: static workspace model (bounds, obstacles, 4/8-connectivity).
//! - `planner`: A* shortest-path search with integer milli-costs.
//! - `robot`: per-robot state machine stepped once per simulation tick.
//! - `task`: task model with a one-way lifecycle.
//! - `scheduler`: pending queue and greedy best-robot assignment.
//! - `station`: charging stations with capacity-guarded occupancy.
//! - `fleet`: the coordinator that owns everything and drives the tick.
//! - `snapshot`: read-only per-tick view handed to external consumers.
//!
//! The whole crate is synchronous and free of global state: one
//! [`fleet::FleetCoordinator`] owns all mutable data, `tick(dt)` advances it,
//! and every tick produces a [`snapshot::FleetSnapshot`] that can be shared
//! freely. Robots and tasks reference each other only by id, never by
//! pointer, so the coordinator's lookup tables are the single source of
//! truth.

pub mod config;
pub mod error;
pub mod fleet;
pub mod grid;
pub mod planner;
pub mod robot;
pub mod scheduler;
pub mod snapshot;
pub mod station;
pub mod task;

pub use config::FleetConfig;
pub use error::{CommandError, ConfigError, PlanError, StationError};
pub use fleet::FleetCoordinator;
pub use grid::{Cell, Connectivity, GridWorkspace, Point};
pub use robot::{Robot, RobotId, RobotStatus};
pub use snapshot::{FleetMetrics, FleetSnapshot};
pub use station::StationId;
pub use task::{Task, TaskId, TaskKind, TaskSpec, TaskState};
