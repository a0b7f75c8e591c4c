// amr-fleet/crates/fleet_sim/src/robot.rs
//! The per-robot state machine.
//!
//! A robot is stepped exactly once per simulation tick and never reaches
//! into coordinator state: everything the rest of the fleet must react to
//! comes back as [`RobotEvent`]s. Cross-robot bookkeeping (task tables,
//! station slots, re-planning) happens in the coordinator.

use std::collections::VecDeque;

use crate::grid::{Cell, Point};
use crate::planner::Route;
use crate::station::StationId;
use crate::task::TaskId;

/// Stable robot identity, fixed at fleet construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RobotId(pub u32);

impl std::fmt::Display for RobotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AMR-{:02}", self.0)
    }
}

/// Exactly one status is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotStatus {
    Idle,
    Moving,
    Working,
    Charging,
    /// Parked with a fault. Nothing transitions into this state during
    /// normal simulation; the scheduler skips it like any non-Idle status.
    Maintenance,
}

/// What the current route is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    TaskStart(TaskId),
    TaskGoal(TaskId),
    Station(StationId),
}

/// Emitted by [`Robot::step`]; handled by the coordinator within the same
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotEvent {
    /// Route to the task's start cell is exhausted; the coordinator plans
    /// the goal leg and the robot starts Working.
    ReachedTaskStart(TaskId),
    /// Work finished; the task is done and the robot is Idle again.
    TaskCompleted(TaskId),
    /// Route to a charging station is exhausted; charging has begun.
    ArrivedAtStation(StationId),
    /// Battery is back at capacity; the station slot can be freed.
    FullyCharged(StationId),
}

/// Motion and battery parameters shared by the whole fleet, fixed at
/// construction.
#[derive(Debug, Clone, Copy)]
pub struct MotionParams {
    /// Cells per second at speed multiplier 1.0.
    pub speed: f64,
    /// Full battery, in percent (normally 100.0).
    pub battery_capacity: f64,
    /// Below this a robot is routed to charge and accepts no tasks.
    pub low_battery_pct: f64,
    /// Battery percent drained per cell of distance while driving.
    pub drain_per_cell: f64,
    /// Battery percent drained per second while executing task work.
    pub work_drain_per_s: f64,
    /// Battery percent recovered per second while charging.
    pub charge_per_s: f64,
    /// Within this distance of the next route cell the robot snaps to it.
    pub arrival_epsilon: f64,
}

#[derive(Debug)]
pub struct Robot {
    id: RobotId,
    position: Point,
    battery: f64,
    status: RobotStatus,
    task: Option<TaskId>,
    route: VecDeque<Cell>,
    objective: Option<Objective>,
    work_remaining_s: f64,
    /// Set when the robot needs to charge but no station slot was free;
    /// retried by the coordinator each tick.
    needs_charge: bool,
    station: Option<StationId>,
    distance_traveled: f64,
    tasks_completed: u32,
}

impl Robot {
    pub fn new(id: RobotId, position: Point, battery_capacity: f64) -> Self {
        Self {
            id,
            position,
            battery: battery_capacity,
            status: RobotStatus::Idle,
            task: None,
            route: VecDeque::new(),
            objective: None,
            work_remaining_s: 0.0,
            needs_charge: false,
            station: None,
            distance_traveled: 0.0,
            tasks_completed: 0,
        }
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn cell(&self) -> Cell {
        self.position.cell()
    }

    pub fn battery(&self) -> f64 {
        self.battery
    }

    pub fn status(&self) -> RobotStatus {
        self.status
    }

    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    pub fn station(&self) -> Option<StationId> {
        self.station
    }

    pub fn needs_charge(&self) -> bool {
        self.needs_charge
    }

    /// True while charging or driving toward a reserved station slot.
    pub fn is_charging_bound(&self) -> bool {
        self.status == RobotStatus::Charging
            || matches!(self.objective, Some(Objective::Station(_)))
    }

    pub fn route_remaining(&self) -> usize {
        self.route.len()
    }

    pub fn distance_traveled(&self) -> f64 {
        self.distance_traveled
    }

    pub fn tasks_completed(&self) -> u32 {
        self.tasks_completed
    }

    /// Whether the scheduler may hand this robot a task.
    pub fn available_for_tasks(&self, low_battery_pct: f64) -> bool {
        self.status == RobotStatus::Idle
            && self.task.is_none()
            && !self.needs_charge
            && self.battery >= low_battery_pct
    }

    /// Idle -> Moving with a route to the task's start cell.
    pub fn begin_task_leg(&mut self, task: TaskId, route: Route) {
        debug_assert_eq!(self.status, RobotStatus::Idle);
        self.task = Some(task);
        self.objective = Some(Objective::TaskStart(task));
        self.route = route.into_cells().into();
        self.status = RobotStatus::Moving;
    }

    /// Moving -> Working at the task's start cell: traverse the goal leg,
    /// then run down the work timer.
    pub fn begin_work(&mut self, task: TaskId, route: Route, duration_s: f64) {
        debug_assert_eq!(self.task, Some(task));
        self.objective = Some(Objective::TaskGoal(task));
        self.route = route.into_cells().into();
        self.work_remaining_s = duration_s;
        self.status = RobotStatus::Working;
    }

    /// Moving/Idle -> Moving toward a reserved charging station slot.
    pub fn head_to_station(&mut self, station: StationId, route: Route) {
        debug_assert!(self.task.is_none(), "task must be released before charging");
        self.objective = Some(Objective::Station(station));
        self.route = route.into_cells().into();
        self.work_remaining_s = 0.0;
        self.needs_charge = false;
        self.status = RobotStatus::Moving;
    }

    /// Remember that charging is needed once a slot or route frees up.
    pub fn flag_needs_charge(&mut self) {
        self.needs_charge = true;
    }

    /// Drops the current task reference and parks Idle. Used when the goal
    /// leg turns out to be unplannable or the task is released for charging.
    pub fn clear_task(&mut self) {
        self.task = None;
        self.objective = None;
        self.route.clear();
        self.work_remaining_s = 0.0;
        if self.status == RobotStatus::Moving || self.status == RobotStatus::Working {
            self.status = RobotStatus::Idle;
        }
    }

    /// Any state -> Idle, route and task cleared. Idempotent.
    pub fn emergency_stop(&mut self) {
        self.task = None;
        self.objective = None;
        self.route.clear();
        self.work_remaining_s = 0.0;
        self.needs_charge = false;
        self.station = None;
        self.status = RobotStatus::Idle;
    }

    /// Fault-injection hook for tests and operator intervention; clamps to
    /// the valid range.
    pub fn set_battery(&mut self, pct: f64, params: &MotionParams) {
        self.battery = pct.clamp(0.0, params.battery_capacity);
    }

    /// Advances one simulation tick. Battery drains while Moving or Working
    /// and recovers while Charging, never both in the same tick.
    pub fn step(
        &mut self,
        dt: f64,
        speed_multiplier: f64,
        params: &MotionParams,
    ) -> Vec<RobotEvent> {
        let mut events = Vec::new();
        match self.status {
            RobotStatus::Idle | RobotStatus::Maintenance => {}
            RobotStatus::Moving => {
                self.advance_route(dt, speed_multiplier, params);
                if self.route.is_empty() {
                    match self.objective {
                        Some(Objective::TaskStart(task)) => {
                            // Coordinator reacts by calling begin_work.
                            events.push(RobotEvent::ReachedTaskStart(task));
                        }
                        Some(Objective::Station(station)) => {
                            self.objective = None;
                            self.station = Some(station);
                            self.status = RobotStatus::Charging;
                            events.push(RobotEvent::ArrivedAtStation(station));
                        }
                        Some(Objective::TaskGoal(_)) | None => {
                            // A goal leg is only ever traversed while
                            // Working; an objective-less route means the
                            // drive was cancelled under us.
                            self.objective = None;
                            self.status = RobotStatus::Idle;
                        }
                    }
                }
            }
            RobotStatus::Working => {
                if !self.route.is_empty() {
                    // Carrying the task to its goal cell.
                    self.advance_route(dt, speed_multiplier, params);
                } else {
                    self.work_remaining_s -= dt;
                    self.battery = (self.battery - params.work_drain_per_s * dt).max(0.0);
                    if self.work_remaining_s <= 0.0 {
                        self.work_remaining_s = 0.0;
                        self.objective = None;
                        self.status = RobotStatus::Idle;
                        if let Some(task) = self.task.take() {
                            self.tasks_completed += 1;
                            events.push(RobotEvent::TaskCompleted(task));
                        }
                    }
                }
            }
            RobotStatus::Charging => {
                self.battery = (self.battery + params.charge_per_s * dt).min(params.battery_capacity);
                if self.battery >= params.battery_capacity {
                    self.needs_charge = false;
                    self.status = RobotStatus::Idle;
                    if let Some(station) = self.station.take() {
                        events.push(RobotEvent::FullyCharged(station));
                    }
                }
            }
        }
        events
    }

    /// Moves along the route, consuming at most `speed * multiplier * dt`
    /// of distance. Snaps to a route cell once within the arrival epsilon
    /// and pops it.
    fn advance_route(&mut self, dt: f64, speed_multiplier: f64, params: &MotionParams) {
        let mut budget = params.speed * speed_multiplier * dt;
        while budget > 0.0 {
            let Some(&next) = self.route.front() else {
                break;
            };
            let target = next.center();
            let dist = self.position.distance_to(target);
            if dist <= params.arrival_epsilon {
                self.position = target;
                self.route.pop_front();
                continue;
            }
            let moved = budget.min(dist);
            self.position.x += (target.x - self.position.x) / dist * moved;
            self.position.y += (target.y - self.position.y) / dist * moved;
            self.distance_traveled += moved;
            self.battery = (self.battery - moved * params.drain_per_cell).max(0.0);
            budget -= moved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Connectivity, GridWorkspace};
    use crate::planner;

    fn params() -> MotionParams {
        MotionParams {
            speed: 2.0,
            battery_capacity: 100.0,
            low_battery_pct: 20.0,
            drain_per_cell: 0.1,
            work_drain_per_s: 1.0,
            charge_per_s: 20.0,
            arrival_epsilon: 0.25,
        }
    }

    fn route(from: Cell, to: Cell) -> Route {
        let grid = GridWorkspace::new(20, 20, Connectivity::Four, []);
        planner::plan(&grid, from, to).unwrap()
    }

    #[test]
    fn moves_toward_route_and_drains_battery() {
        let p = params();
        let mut robot = Robot::new(RobotId(1), Point::new(0.0, 0.0), p.battery_capacity);
        robot.begin_task_leg(TaskId(7), route(Cell::new(0, 0), Cell::new(5, 0)));
        assert_eq!(robot.status(), RobotStatus::Moving);

        let before = robot.battery();
        let events = robot.step(1.0, 1.0, &p);
        assert!(events.is_empty());
        assert!(robot.position().x > 1.5 && robot.position().x < 2.5);
        assert!(robot.battery() < before);
        assert!(robot.distance_traveled() > 0.0);
    }

    #[test]
    fn reaching_task_start_emits_event_once_route_is_consumed() {
        let p = params();
        let mut robot = Robot::new(RobotId(1), Point::new(0.0, 0.0), p.battery_capacity);
        robot.begin_task_leg(TaskId(3), route(Cell::new(0, 0), Cell::new(2, 0)));

        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.extend(robot.step(0.5, 1.0, &p));
        }
        assert!(seen.contains(&RobotEvent::ReachedTaskStart(TaskId(3))));
        assert_eq!(robot.cell(), Cell::new(2, 0));
    }

    #[test]
    fn working_traverses_goal_leg_then_runs_timer() {
        let p = params();
        let mut robot = Robot::new(RobotId(1), Point::new(0.0, 0.0), p.battery_capacity);
        robot.begin_task_leg(TaskId(9), route(Cell::new(0, 0), Cell::new(0, 0)));
        robot.step(0.1, 1.0, &p); // emits ReachedTaskStart
        robot.begin_work(TaskId(9), route(Cell::new(0, 0), Cell::new(3, 0)), 2.0);
        assert_eq!(robot.status(), RobotStatus::Working);

        let mut completed = false;
        for _ in 0..40 {
            for ev in robot.step(0.25, 1.0, &p) {
                if ev == RobotEvent::TaskCompleted(TaskId(9)) {
                    completed = true;
                }
            }
        }
        assert!(completed);
        assert_eq!(robot.status(), RobotStatus::Idle);
        assert_eq!(robot.cell(), Cell::new(3, 0));
        assert_eq!(robot.tasks_completed(), 1);
        assert_eq!(robot.task(), None);
    }

    #[test]
    fn battery_stays_in_bounds_and_is_monotonic_per_mode() {
        let p = params();
        let mut robot = Robot::new(RobotId(1), Point::new(0.0, 0.0), p.battery_capacity);
        robot.begin_task_leg(TaskId(1), route(Cell::new(0, 0), Cell::new(10, 0)));

        let mut prev = robot.battery();
        while robot.route_remaining() > 0 {
            robot.step(0.5, 1.0, &p);
            assert!(robot.battery() <= prev);
            assert!((0.0..=p.battery_capacity).contains(&robot.battery()));
            prev = robot.battery();
        }
    }

    #[test]
    fn charging_recovers_to_full_then_idles() {
        let p = params();
        let mut robot = Robot::new(RobotId(2), Point::new(5.0, 5.0), p.battery_capacity);
        robot.set_battery(15.0, &p);
        robot.head_to_station(StationId(0), route(Cell::new(5, 5), Cell::new(5, 5)));

        let events = robot.step(0.1, 1.0, &p);
        assert_eq!(events, vec![RobotEvent::ArrivedAtStation(StationId(0))]);
        assert_eq!(robot.status(), RobotStatus::Charging);

        let mut prev = robot.battery();
        let mut charged = false;
        for _ in 0..100 {
            for ev in robot.step(0.5, 1.0, &p) {
                if ev == RobotEvent::FullyCharged(StationId(0)) {
                    charged = true;
                }
            }
            assert!(robot.battery() >= prev);
            prev = robot.battery();
        }
        assert!(charged);
        assert_eq!(robot.status(), RobotStatus::Idle);
        assert!((robot.battery() - p.battery_capacity).abs() < 1e-9);
    }

    #[test]
    fn emergency_stop_clears_everything_and_is_idempotent() {
        let p = params();
        let mut robot = Robot::new(RobotId(1), Point::new(0.0, 0.0), p.battery_capacity);
        robot.begin_task_leg(TaskId(4), route(Cell::new(0, 0), Cell::new(8, 0)));
        robot.step(0.5, 1.0, &p);

        robot.emergency_stop();
        assert_eq!(robot.status(), RobotStatus::Idle);
        assert_eq!(robot.task(), None);
        assert_eq!(robot.route_remaining(), 0);

        robot.emergency_stop();
        assert_eq!(robot.status(), RobotStatus::Idle);
    }

    #[test]
    fn low_battery_robot_not_available_for_tasks() {
        let p = params();
        let mut robot = Robot::new(RobotId(1), Point::new(0.0, 0.0), p.battery_capacity);
        assert!(robot.available_for_tasks(p.low_battery_pct));
        robot.set_battery(15.0, &p);
        assert!(!robot.available_for_tasks(p.low_battery_pct));
    }

    #[test]
    fn speed_multiplier_scales_distance_covered() {
        let p = params();
        let mut slow = Robot::new(RobotId(1), Point::new(0.0, 0.0), p.battery_capacity);
        let mut fast = Robot::new(RobotId(2), Point::new(0.0, 0.0), p.battery_capacity);
        slow.begin_task_leg(TaskId(1), route(Cell::new(0, 0), Cell::new(12, 0)));
        fast.begin_task_leg(TaskId(2), route(Cell::new(0, 0), Cell::new(12, 0)));

        slow.step(1.0, 0.5, &p);
        fast.step(1.0, 3.0, &p);
        assert!(fast.position().x > slow.position().x);
    }
}
