use crate::grid::Cell;
use crate::station::StationId;
use crate::task::TaskId;
use thiserror::Error;

/// Path planning failures. All recoverable: the coordinator returns the
/// affected task to the pending queue instead of aborting the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("start cell {0} is blocked or out of bounds")]
    StartBlocked(Cell),
    #[error("goal cell {0} is blocked or out of bounds")]
    GoalBlocked(Cell),
    #[error("no traversable path from {start} to {goal}")]
    UnreachableGoal { start: Cell, goal: Cell },
}

/// Rejected external commands. Surfaced to the caller; never enqueued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("invalid task spec: {0}")]
    InvalidTaskSpec(String),
    #[error("duplicate task id {0}")]
    DuplicateTask(TaskId),
    #[error("speed multiplier {0} outside supported range 0.1..=3.0")]
    InvalidSpeedFactor(f64),
}

/// Charging station occupancy failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StationError {
    #[error("charging station {0} is at capacity")]
    StationFull(StationId),
    #[error("unknown charging station {0}")]
    UnknownStation(StationId),
}

/// Fatal configuration problems. Checked once at construction, before any
/// tick runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid must be at least 1x1 (got {width}x{height})")]
    EmptyGrid { width: u32, height: u32 },
    #[error("fleet size must be at least 1")]
    EmptyFleet,
    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("low-battery threshold {0} must lie in 0..100")]
    BadLowBatteryThreshold(f64),
    #[error("arrival epsilon {0} must lie strictly between 0 and 1 cell")]
    BadArrivalEpsilon(f64),
    #[error("charging station at {0} is blocked or out of bounds")]
    StationUnreachable(Cell),
    #[error("obstacle at {0} is out of bounds")]
    ObstacleOutOfBounds(Cell),
    #[error("fleet size {fleet} exceeds traversable cells {cells}")]
    FleetTooLarge { fleet: u32, cells: usize },
}
