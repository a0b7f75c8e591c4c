// amr-fleet/crates/fleet_sim/src/fleet.rs
//! The fleet coordinator: single owner of all mutable simulation state.
//!
//! Each `tick(dt)` runs the same pipeline: assignment pass, robot stepping
//! (in id order, reacting to events as they surface), the charging pass,
//! then metric aggregation into a fresh [`FleetSnapshot`]. External commands
//! mutate state only between ticks, via the methods on this type; nothing
//! else holds a mutable reference to a robot, task, or station.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::FleetConfig;
use crate::error::{CommandError, ConfigError};
use crate::grid::{GridWorkspace, Point};
use crate::planner;
use crate::robot::{MotionParams, Robot, RobotEvent, RobotId, RobotStatus};
use crate::scheduler::{Assignment, Scheduler};
use crate::snapshot::{
    FleetMetrics, FleetSnapshot, RobotView, StationView, StatusCounts, TaskView,
};
use crate::station::StationSet;
use crate::task::{Task, TaskId, TaskKind, TaskSpec, TaskState, MAX_PRIORITY, MIN_PRIORITY};

pub const SPEED_MULTIPLIER_MIN: f64 = 0.1;
pub const SPEED_MULTIPLIER_MAX: f64 = 3.0;

/// Battery fraction below which "send all to charge" includes a robot.
const CHARGE_ALL_THRESHOLD: f64 = 0.9;

pub struct FleetCoordinator {
    config: FleetConfig,
    grid: Arc<GridWorkspace>,
    params: MotionParams,
    robots: BTreeMap<RobotId, Robot>,
    scheduler: Scheduler,
    stations: StationSet,
    /// Tasks currently Assigned or InProgress, keyed for id-based lookup.
    active_tasks: BTreeMap<TaskId, Task>,
    completed_tasks: u64,
    next_task_id: u64,
    tick_index: u64,
    sim_time_s: f64,
    speed_multiplier: f64,
    rng: StdRng,
}

impl FleetCoordinator {
    /// Validates the configuration and builds the fleet. Robots are spread
    /// evenly over the traversable cells, deterministically for a given
    /// grid.
    pub fn new(config: FleetConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let grid = Arc::new(GridWorkspace::new(
            config.grid_width,
            config.grid_height,
            config.connectivity,
            config.obstacles.iter().copied(),
        ));
        let open_cells = grid.traversable_cells();
        if (config.fleet_size as usize) > open_cells.len() {
            return Err(ConfigError::FleetTooLarge {
                fleet: config.fleet_size,
                cells: open_cells.len(),
            });
        }

        let stride = open_cells.len() / config.fleet_size as usize;
        let robots = (0..config.fleet_size)
            .map(|i| {
                let cell = open_cells[(i as usize * stride + stride / 2).min(open_cells.len() - 1)];
                let id = RobotId(i + 1);
                (id, Robot::new(id, cell.center(), config.battery_capacity))
            })
            .collect();

        let scheduler = Scheduler::new(config.battery_weight, config.low_battery_pct);
        let stations = StationSet::new(&config.station_cells, config.station_capacity);
        let params = config.motion_params();
        let rng = StdRng::seed_from_u64(config.rng_seed);

        Ok(Self {
            config,
            grid,
            params,
            robots,
            scheduler,
            stations,
            active_tasks: BTreeMap::new(),
            completed_tasks: 0,
            next_task_id: 1,
            tick_index: 0,
            sim_time_s: 0.0,
            speed_multiplier: 1.0,
            rng,
        })
    }

    pub fn grid(&self) -> &GridWorkspace {
        &self.grid
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn robot_ids(&self) -> Vec<RobotId> {
        self.robots.keys().copied().collect()
    }

    pub fn robot(&self, id: RobotId) -> Option<&Robot> {
        self.robots.get(&id)
    }

    /// Fault-injection hook: force a robot's battery level. Used by tests
    /// and operator tooling; clamped to the valid range.
    pub fn set_robot_battery(&mut self, id: RobotId, pct: f64) -> bool {
        match self.robots.get_mut(&id) {
            Some(robot) => {
                robot.set_battery(pct, &self.params);
                true
            }
            None => false,
        }
    }

    // ---- Command interface (applied between ticks) ----

    /// Validates and enqueues a task. Rejected specs are never enqueued.
    pub fn submit_task(&mut self, spec: TaskSpec) -> Result<TaskId, CommandError> {
        let id = TaskId(self.next_task_id);
        let task = Task::from_spec(id, spec, &self.grid)?;
        self.scheduler.add(task)?;
        self.next_task_id += 1;
        tracing::info!(task_id = %id, "task submitted");
        Ok(id)
    }

    /// Forces every robot to Idle with cleared route and task. In-flight
    /// tasks return to Pending; station slots are freed. Idempotent.
    pub fn emergency_stop_all(&mut self) {
        for (id, robot) in self.robots.iter_mut() {
            if let Some(task_id) = robot.task() {
                if let Some(mut task) = self.active_tasks.remove(&task_id) {
                    task.release();
                    self.scheduler.release(task);
                }
            }
            self.stations.release_everywhere(*id);
            robot.emergency_stop();
        }
        tracing::warn!("emergency stop: all robots idled");
    }

    pub fn set_speed_multiplier(&mut self, factor: f64) -> Result<(), CommandError> {
        if !factor.is_finite()
            || !(SPEED_MULTIPLIER_MIN..=SPEED_MULTIPLIER_MAX).contains(&factor)
        {
            return Err(CommandError::InvalidSpeedFactor(factor));
        }
        self.speed_multiplier = factor;
        tracing::info!(factor, "speed multiplier updated");
        Ok(())
    }

    /// Routes every robot below 90% battery (and not already charging) to a
    /// station. Operator convenience command; in-flight tasks are released.
    pub fn send_all_to_charge(&mut self) {
        let threshold = CHARGE_ALL_THRESHOLD * self.params.battery_capacity;
        for id in self.robot_ids() {
            let robot = &self.robots[&id];
            if robot.battery() < threshold
                && !robot.is_charging_bound()
                && matches!(robot.status(), RobotStatus::Idle | RobotStatus::Moving)
            {
                self.dispatch_to_charge(id);
            }
        }
    }

    // ---- Demo task generation ----

    /// Uniform random spec within the workspace, margins and ranges matching
    /// the configured bounds. Seeded, so demo runs reproduce.
    pub fn generate_random_task(&mut self) -> TaskSpec {
        let kind = TaskKind::ALL[self.rng.gen_range(0..TaskKind::ALL.len())];
        let start = self.sample_point();
        let goal = self.sample_point();
        TaskSpec {
            kind,
            priority: self.rng.gen_range(MIN_PRIORITY..=MAX_PRIORITY),
            start,
            goal,
            est_duration_s: self.rng.gen_range(5.0..=30.0),
        }
    }

    /// Generates and submits a random task, re-sampling a few times if a
    /// sample lands on an obstacle.
    pub fn submit_random_task(&mut self) -> Result<TaskId, CommandError> {
        let mut last = CommandError::InvalidTaskSpec("no traversable sample found".into());
        for _ in 0..8 {
            let spec = self.generate_random_task();
            match self.submit_task(spec) {
                Ok(id) => return Ok(id),
                Err(err @ CommandError::InvalidTaskSpec(_)) => last = err,
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }

    fn sample_point(&mut self) -> Point {
        let width = f64::from(self.config.grid_width);
        let height = f64::from(self.config.grid_height);
        // A 2-cell margin keeps demo tasks off the workspace edge, when the
        // grid is big enough to afford one.
        let margin = if width > 6.0 && height > 6.0 { 2.0 } else { 0.0 };
        Point::new(
            self.rng.gen_range(margin..=width - 1.0 - margin),
            self.rng.gen_range(margin..=height - 1.0 - margin),
        )
    }

    // ---- Tick pipeline ----

    /// Advances the whole fleet by `dt` seconds of simulated time and
    /// returns the resulting snapshot. Deterministic for a given command
    /// history and seed.
    pub fn tick(&mut self, dt: f64) -> FleetSnapshot {
        debug_assert!(dt > 0.0 && dt.is_finite());

        self.run_assignment_pass();

        let ids = self.robot_ids();
        for id in &ids {
            let events = self
                .robots
                .get_mut(id)
                .expect("robot ids are stable")
                .step(dt, self.speed_multiplier, &self.params);
            for event in events {
                self.handle_robot_event(*id, event);
            }
        }

        for id in &ids {
            self.maybe_dispatch_to_charge(*id);
        }

        #[cfg(debug_assertions)]
        self.stations.assert_capacity_invariant();

        self.tick_index += 1;
        self.sim_time_s += dt;
        self.snapshot()
    }

    fn run_assignment_pass(&mut self) {
        let assignments = self.scheduler.assign(&self.robots);
        for Assignment { mut task, robot } in assignments {
            let from = self.robots[&robot].cell();
            match planner::plan(&self.grid, from, task.start.cell()) {
                Ok(route) => {
                    task.assigned_to = Some(robot);
                    task.advance_to(TaskState::Assigned);
                    tracing::info!(
                        task_id = %task.id,
                        robot_id = %robot,
                        priority = task.priority,
                        route_len = route.len(),
                        "task assigned"
                    );
                    self.robots
                        .get_mut(&robot)
                        .expect("assignment robot exists")
                        .begin_task_leg(task.id, route);
                    self.active_tasks.insert(task.id, task);
                }
                Err(err) => {
                    tracing::warn!(
                        task_id = %task.id,
                        robot_id = %robot,
                        error = %err,
                        "route to task start failed; task returned to pending"
                    );
                    task.plan_failures += 1;
                    task.release();
                    self.scheduler.release(task);
                }
            }
        }
    }

    fn handle_robot_event(&mut self, robot_id: RobotId, event: RobotEvent) {
        match event {
            RobotEvent::ReachedTaskStart(task_id) => {
                let Some(task) = self.active_tasks.get(&task_id) else {
                    // Task was cancelled while the robot was en route.
                    self.robots.get_mut(&robot_id).unwrap().clear_task();
                    return;
                };
                let goal = task.goal.cell();
                let duration = task.est_duration_s;
                let from = self.robots[&robot_id].cell();
                match planner::plan(&self.grid, from, goal) {
                    Ok(route) => {
                        let task = self.active_tasks.get_mut(&task_id).unwrap();
                        task.advance_to(TaskState::InProgress);
                        tracing::debug!(
                            task_id = %task_id,
                            robot_id = %robot_id,
                            "task start reached; working"
                        );
                        self.robots
                            .get_mut(&robot_id)
                            .unwrap()
                            .begin_work(task_id, route, duration);
                    }
                    Err(err) => {
                        tracing::warn!(
                            task_id = %task_id,
                            robot_id = %robot_id,
                            error = %err,
                            "goal unreachable; task returned to pending"
                        );
                        let mut task = self.active_tasks.remove(&task_id).unwrap();
                        task.plan_failures += 1;
                        task.release();
                        self.scheduler.release(task);
                        self.robots.get_mut(&robot_id).unwrap().clear_task();
                    }
                }
            }
            RobotEvent::TaskCompleted(task_id) => {
                if let Some(mut task) = self.active_tasks.remove(&task_id) {
                    task.advance_to(TaskState::Completed);
                    self.completed_tasks += 1;
                    tracing::info!(task_id = %task_id, robot_id = %robot_id, "task completed");
                }
            }
            RobotEvent::ArrivedAtStation(station) => {
                tracing::debug!(robot_id = %robot_id, station = %station, "charging started");
            }
            RobotEvent::FullyCharged(station) => {
                self.stations.release(station, robot_id);
                tracing::info!(robot_id = %robot_id, station = %station, "fully charged");
            }
        }
    }

    /// Charging policy: a robot below the low-battery threshold that is Idle
    /// or Moving gets routed to the nearest station with a free slot; any
    /// in-progress task goes back to Pending. With no free slot anywhere the
    /// robot is flagged and retried each tick.
    fn maybe_dispatch_to_charge(&mut self, id: RobotId) {
        let robot = &self.robots[&id];
        if robot.is_charging_bound() {
            return;
        }
        let low = robot.battery() < self.params.low_battery_pct;
        let movable = matches!(robot.status(), RobotStatus::Idle | RobotStatus::Moving);
        let retry = robot.needs_charge() && robot.status() == RobotStatus::Idle;
        if (low && movable) || retry {
            self.dispatch_to_charge(id);
        }
    }

    fn dispatch_to_charge(&mut self, id: RobotId) {
        let (position, from, task_id) = {
            let robot = &self.robots[&id];
            (robot.position(), robot.cell(), robot.task())
        };
        let Some(station) = self.stations.nearest_with_slot(position) else {
            tracing::debug!(robot_id = %id, "no free charging slot; will retry");
            self.robots.get_mut(&id).unwrap().flag_needs_charge();
            return;
        };
        let target = self.stations.get(station).expect("station exists").cell();
        match planner::plan(&self.grid, from, target) {
            Ok(route) => {
                if let Err(err) = self.stations.occupy(station, id) {
                    tracing::warn!(robot_id = %id, error = %err, "slot reservation failed");
                    self.robots.get_mut(&id).unwrap().flag_needs_charge();
                    return;
                }
                if let Some(task_id) = task_id {
                    if let Some(mut task) = self.active_tasks.remove(&task_id) {
                        task.release();
                        tracing::info!(
                            task_id = %task_id,
                            robot_id = %id,
                            "task released for charging"
                        );
                        self.scheduler.release(task);
                    }
                }
                let robot = self.robots.get_mut(&id).unwrap();
                robot.clear_task();
                robot.head_to_station(station, route);
                tracing::info!(robot_id = %id, station = %station, "dispatched to charge");
            }
            Err(err) => {
                tracing::warn!(
                    robot_id = %id,
                    station = %station,
                    error = %err,
                    "no route to charging station"
                );
                self.robots.get_mut(&id).unwrap().flag_needs_charge();
            }
        }
    }

    // ---- Snapshot ----

    /// Recomputes the read-only view of the whole fleet. Cheap enough to run
    /// every tick; consumers get owned data and never see a half-updated
    /// fleet.
    pub fn snapshot(&self) -> FleetSnapshot {
        let mut status_counts = StatusCounts::default();
        let mut battery_sum = 0.0;
        let robots: Vec<RobotView> = self
            .robots
            .values()
            .map(|robot| {
                status_counts.record(robot.status());
                battery_sum += robot.battery();
                RobotView {
                    id: robot.id(),
                    position: robot.position(),
                    cell: robot.cell(),
                    battery_pct: robot.battery(),
                    status: robot.status(),
                    task: robot.task(),
                    distance_traveled: robot.distance_traveled(),
                    tasks_completed: robot.tasks_completed(),
                }
            })
            .collect();

        let task_view = |task: &Task| TaskView {
            id: task.id,
            kind: task.kind,
            priority: task.priority,
            state: task.state,
            start: task.start,
            goal: task.goal,
            assigned_to: task.assigned_to,
        };
        let mut tasks: Vec<TaskView> = self.scheduler.pending().iter().map(task_view).collect();
        tasks.extend(self.active_tasks.values().map(task_view));
        tasks.sort_by_key(|t| t.id);

        let stations: Vec<StationView> = self
            .stations
            .iter()
            .map(|station| {
                let mut occupants: Vec<RobotId> = station.occupants().iter().copied().collect();
                occupants.sort();
                StationView {
                    id: station.id(),
                    cell: station.cell(),
                    capacity: station.capacity(),
                    occupants,
                }
            })
            .collect();

        let total = robots.len() as f64;
        let metrics = FleetMetrics {
            completed_tasks: self.completed_tasks,
            pending_tasks: self.scheduler.pending_count(),
            active_tasks: self.active_tasks.len(),
            efficiency: if self.sim_time_s > 0.0 {
                self.completed_tasks as f64 / self.sim_time_s
            } else {
                0.0
            },
            utilization: if total > 0.0 {
                f64::from(status_counts.total() - status_counts.idle) / total
            } else {
                0.0
            },
            average_battery_pct: if total > 0.0 { battery_sum / total } else { 0.0 },
            status_counts,
        };

        FleetSnapshot {
            tick_index: self.tick_index,
            sim_time_s: self.sim_time_s,
            wall_time: chrono::Utc::now(),
            speed_multiplier: self.speed_multiplier,
            robots,
            tasks,
            stations,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    fn small_config() -> FleetConfig {
        FleetConfig {
            grid_width: 10,
            grid_height: 10,
            fleet_size: 2,
            station_cells: vec![Cell::new(0, 9)],
            station_capacity: 1,
            ..Default::default()
        }
    }

    fn spec(priority: u8) -> TaskSpec {
        TaskSpec {
            kind: TaskKind::Inspection,
            priority,
            start: Point::new(3.0, 3.0),
            goal: Point::new(7.0, 7.0),
            est_duration_s: 5.0,
        }
    }

    #[test]
    fn invalid_spec_is_rejected_and_not_enqueued() {
        let mut fleet = FleetCoordinator::new(small_config()).unwrap();
        let bad = TaskSpec {
            priority: 9,
            ..spec(1)
        };
        assert!(fleet.submit_task(bad).is_err());
        assert_eq!(fleet.snapshot().tasks.len(), 0);
    }

    #[test]
    fn speed_multiplier_range_enforced() {
        let mut fleet = FleetCoordinator::new(small_config()).unwrap();
        assert!(fleet.set_speed_multiplier(0.05).is_err());
        assert!(fleet.set_speed_multiplier(3.5).is_err());
        assert!(fleet.set_speed_multiplier(f64::NAN).is_err());
        fleet.set_speed_multiplier(2.0).unwrap();
        assert_eq!(fleet.speed_multiplier(), 2.0);
    }

    #[test]
    fn tick_assigns_pending_task_to_a_robot() {
        let mut fleet = FleetCoordinator::new(small_config()).unwrap();
        let id = fleet.submit_task(spec(5)).unwrap();
        let snap = fleet.tick(0.1);
        let task = snap.tasks.iter().find(|t| t.id == id).unwrap();
        assert_eq!(task.state, TaskState::Assigned);
        assert!(task.assigned_to.is_some());
        assert_eq!(snap.metrics.status_counts.moving, 1);
    }

    #[test]
    fn emergency_stop_idles_everyone_and_requeues_tasks() {
        let mut fleet = FleetCoordinator::new(small_config()).unwrap();
        let id = fleet.submit_task(spec(4)).unwrap();
        fleet.tick(0.1);

        fleet.emergency_stop_all();
        let snap = fleet.snapshot();
        assert!(snap
            .robots
            .iter()
            .all(|r| r.status == RobotStatus::Idle && r.task.is_none()));
        let task = snap.tasks.iter().find(|t| t.id == id).unwrap();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.assigned_to, None);

        // Idempotent.
        fleet.emergency_stop_all();
        assert!(snap.stations.iter().all(|s| s.occupants.is_empty()));
    }

    #[test]
    fn fleet_too_large_for_grid_is_a_config_error() {
        let cfg = FleetConfig {
            grid_width: 2,
            grid_height: 2,
            fleet_size: 10,
            station_cells: vec![Cell::new(0, 0)],
            obstacles: vec![],
            ..Default::default()
        };
        assert!(matches!(
            FleetCoordinator::new(cfg),
            Err(ConfigError::FleetTooLarge { .. })
        ));
    }

    #[test]
    fn random_tasks_respect_configured_bounds() {
        let mut fleet = FleetCoordinator::new(small_config()).unwrap();
        for _ in 0..50 {
            let spec = fleet.generate_random_task();
            assert!((MIN_PRIORITY..=MAX_PRIORITY).contains(&spec.priority));
            assert!(spec.est_duration_s >= 5.0 && spec.est_duration_s <= 30.0);
            for p in [spec.start, spec.goal] {
                assert!(p.x >= 0.0 && p.x <= 9.0);
                assert!(p.y >= 0.0 && p.y <= 9.0);
            }
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut a = FleetCoordinator::new(small_config()).unwrap();
        let mut b = FleetCoordinator::new(small_config()).unwrap();
        for _ in 0..5 {
            let sa = a.generate_random_task();
            let sb = b.generate_random_task();
            assert_eq!(sa, sb);
        }
    }

    #[test]
    fn snapshot_reports_station_occupancy() {
        let mut fleet = FleetCoordinator::new(small_config()).unwrap();
        let ids = fleet.robot_ids();
        fleet.set_robot_battery(ids[0], 10.0);
        let snap = fleet.tick(0.1);
        let total_occupants: usize = snap.stations.iter().map(|s| s.occupants.len()).sum();
        assert_eq!(total_occupants, 1);
        for station in &snap.stations {
            assert!(station.occupants.len() <= station.capacity);
        }
    }
}
