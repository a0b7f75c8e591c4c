// amr-fleet/crates/fleet_sim/src/scheduler.rs
//! Pending task queue and the greedy assignment pass.
//!
//! Assignment is a documented heuristic, not an optimal matching: tasks are
//! considered in priority order and each takes the cheapest eligible robot
//! left in the pool. No Hungarian-style global guarantee is made; tasks that
//! find no eligible robot simply stay pending and are retried next tick.

use std::collections::{BTreeMap, HashSet};

use crate::error::CommandError;
use crate::robot::{Robot, RobotId};
use crate::task::{Task, TaskId};

/// One task/robot pairing produced by an assignment pass. The coordinator
/// still has to plan the route before the match becomes binding.
#[derive(Debug)]
pub struct Assignment {
    pub task: Task,
    pub robot: RobotId,
}

#[derive(Debug)]
pub struct Scheduler {
    pending: Vec<Task>,
    /// Weight of the low-battery penalty in the robot score.
    battery_weight: f64,
    low_battery_pct: f64,
}

impl Scheduler {
    pub fn new(battery_weight: f64, low_battery_pct: f64) -> Self {
        Self {
            pending: Vec::new(),
            battery_weight,
            low_battery_pct,
        }
    }

    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Appends a new task. Duplicate ids are rejected.
    pub fn add(&mut self, task: Task) -> Result<(), CommandError> {
        if self.pending.iter().any(|t| t.id == task.id) {
            return Err(CommandError::DuplicateTask(task.id));
        }
        self.pending.push(task);
        Ok(())
    }

    /// Re-queues a task its robot gave up. The task is already back in the
    /// Pending state; ordering falls out of the usual priority sort.
    pub fn release(&mut self, task: Task) {
        debug_assert!(
            !self.pending.iter().any(|t| t.id == task.id),
            "released task {} is already pending",
            task.id
        );
        self.pending.push(task);
    }

    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let idx = self.pending.iter().position(|t| t.id == id)?;
        Some(self.pending.remove(idx))
    }

    /// One greedy pass: pending tasks in descending priority (ties by
    /// earliest creation, then id), each matched to the eligible robot with
    /// the lowest score. A robot takes at most one task per pass; matched
    /// tasks leave the pending queue.
    ///
    /// Eligible means Idle, task-free, not flagged for charging, and at or
    /// above the low-battery threshold. Score is distance to the task start
    /// plus a penalty growing as the battery empties.
    pub fn assign(&mut self, robots: &BTreeMap<RobotId, Robot>) -> Vec<Assignment> {
        self.pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut claimed: HashSet<RobotId> = HashSet::new();
        let mut matched_tasks: Vec<(TaskId, RobotId)> = Vec::new();

        for task in &self.pending {
            let mut best: Option<(f64, RobotId)> = None;
            for robot in robots.values() {
                if claimed.contains(&robot.id()) || !robot.available_for_tasks(self.low_battery_pct)
                {
                    continue;
                }
                let score = self.score(task, robot);
                // Strict less-than keeps the lowest robot id on ties, since
                // the map iterates in id order.
                if best.map_or(true, |(s, _)| score < s) {
                    best = Some((score, robot.id()));
                }
            }
            if let Some((_, robot)) = best {
                claimed.insert(robot);
                matched_tasks.push((task.id, robot));
            }
        }

        matched_tasks
            .into_iter()
            .filter_map(|(task_id, robot)| {
                self.remove(task_id).map(|task| Assignment { task, robot })
            })
            .collect()
    }

    fn score(&self, task: &Task, robot: &Robot) -> f64 {
        let distance = robot.position().distance_to(task.start);
        let battery_penalty = (100.0 - robot.battery()) * self.battery_weight;
        distance + battery_penalty
    }
}
