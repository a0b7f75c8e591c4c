use chrono::{DateTime, Utc};

use crate::error::CommandError;
use crate::grid::{GridWorkspace, Point};
use crate::robot::RobotId;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;

/// Stable task identity, unique for the lifetime of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T-{:04}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Pickup,
    Delivery,
    Inspection,
    Cleaning,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Pickup,
        TaskKind::Delivery,
        TaskKind::Inspection,
        TaskKind::Cleaning,
    ];
}

/// One-way lifecycle: Pending -> Assigned -> InProgress -> Completed.
///
/// The only sanctioned way back is [`Task::release`], which rebuilds the
/// pending state for a task whose robot gave it up (low battery, emergency
/// stop, unreachable goal). Completed tasks are never released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Assigned,
    InProgress,
    Completed,
}

impl TaskState {
    fn rank(self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::Assigned => 1,
            TaskState::InProgress => 2,
            TaskState::Completed => 3,
        }
    }
}

/// Unvalidated task parameters as submitted by an external collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub kind: TaskKind,
    /// 1..=5, 5 most urgent.
    pub priority: u8,
    pub start: Point,
    pub goal: Point,
    pub est_duration_s: f64,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: u8,
    pub start: Point,
    pub goal: Point,
    pub est_duration_s: f64,
    pub created_at: DateTime<Utc>,
    pub state: TaskState,
    pub assigned_to: Option<RobotId>,
    /// How many times route planning for this task has failed. Kept so a
    /// repeatedly unreachable task is visible in snapshots rather than
    /// silently looping forever.
    pub plan_failures: u32,
}

impl Task {
    /// Validates a spec against the workspace and mints a task.
    ///
    /// Rejections (`InvalidTaskSpec`) cover out-of-range priority,
    /// non-positive duration, and start/goal positions that fall outside the
    /// grid or on an obstacle.
    pub fn from_spec(id: TaskId, spec: TaskSpec, grid: &GridWorkspace) -> Result<Self, CommandError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&spec.priority) {
            return Err(CommandError::InvalidTaskSpec(format!(
                "priority {} outside {}..={}",
                spec.priority, MIN_PRIORITY, MAX_PRIORITY
            )));
        }
        if !spec.est_duration_s.is_finite() || spec.est_duration_s <= 0.0 {
            return Err(CommandError::InvalidTaskSpec(format!(
                "estimated duration {} must be positive",
                spec.est_duration_s
            )));
        }
        for (name, pos) in [("start", spec.start), ("goal", spec.goal)] {
            if !pos.x.is_finite() || !pos.y.is_finite() {
                return Err(CommandError::InvalidTaskSpec(format!(
                    "{name} position is not finite"
                )));
            }
            if !grid.is_traversable(pos.cell()) {
                return Err(CommandError::InvalidTaskSpec(format!(
                    "{name} cell {} is blocked or out of bounds",
                    pos.cell()
                )));
            }
        }

        Ok(Self {
            id,
            kind: spec.kind,
            priority: spec.priority,
            start: spec.start,
            goal: spec.goal,
            est_duration_s: spec.est_duration_s,
            created_at: Utc::now(),
            state: TaskState::Pending,
            assigned_to: None,
            plan_failures: 0,
        })
    }

    /// Moves the lifecycle forward. Regression is a programming error.
    pub fn advance_to(&mut self, next: TaskState) {
        debug_assert!(
            next.rank() >= self.state.rank(),
            "task {} lifecycle regression: {:?} -> {:?}",
            self.id,
            self.state,
            next
        );
        self.state = next;
    }

    /// Returns an unfinished task to the pending pool with no assignee.
    pub fn release(&mut self) {
        debug_assert!(self.state != TaskState::Completed, "released a completed task");
        self.state = TaskState::Pending;
        self.assigned_to = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, Connectivity};

    fn grid() -> GridWorkspace {
        GridWorkspace::new(10, 10, Connectivity::Four, [Cell::new(4, 4)])
    }

    fn spec() -> TaskSpec {
        TaskSpec {
            kind: TaskKind::Delivery,
            priority: 3,
            start: Point::new(1.0, 1.0),
            goal: Point::new(8.0, 8.0),
            est_duration_s: 10.0,
        }
    }

    #[test]
    fn valid_spec_becomes_pending_task() {
        let task = Task::from_spec(TaskId(1), spec(), &grid()).unwrap();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.assigned_to, None);
        assert_eq!(task.id.to_string(), "T-0001");
    }

    #[test]
    fn out_of_range_priority_rejected() {
        for priority in [0, 6] {
            let s = TaskSpec { priority, ..spec() };
            assert!(matches!(
                Task::from_spec(TaskId(1), s, &grid()),
                Err(CommandError::InvalidTaskSpec(_))
            ));
        }
    }

    #[test]
    fn blocked_or_outside_positions_rejected() {
        let on_obstacle = TaskSpec {
            start: Point::new(4.0, 4.0),
            ..spec()
        };
        assert!(Task::from_spec(TaskId(1), on_obstacle, &grid()).is_err());

        let outside = TaskSpec {
            goal: Point::new(40.0, 2.0),
            ..spec()
        };
        assert!(Task::from_spec(TaskId(1), outside, &grid()).is_err());
    }

    #[test]
    fn non_positive_duration_rejected() {
        let s = TaskSpec {
            est_duration_s: 0.0,
            ..spec()
        };
        assert!(Task::from_spec(TaskId(1), s, &grid()).is_err());
    }

    #[test]
    fn release_clears_assignee() {
        let mut task = Task::from_spec(TaskId(1), spec(), &grid()).unwrap();
        task.assigned_to = Some(RobotId(2));
        task.advance_to(TaskState::Assigned);
        task.advance_to(TaskState::InProgress);
        task.release();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.assigned_to, None);
    }
}
