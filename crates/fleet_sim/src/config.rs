use crate::error::ConfigError;
use crate::grid::{Cell, Connectivity};
use crate::robot::MotionParams;

/// All knobs the coordinator is built from. Validated once, before any tick
/// runs; a bad configuration never produces a running fleet.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub connectivity: Connectivity,
    pub obstacles: Vec<Cell>,
    pub fleet_size: u32,
    pub station_cells: Vec<Cell>,
    /// Robots each station can host concurrently.
    pub station_capacity: usize,
    pub battery_capacity: f64,
    /// Cells per second at speed multiplier 1.0.
    pub robot_speed: f64,
    pub low_battery_pct: f64,
    pub drain_per_cell: f64,
    pub work_drain_per_s: f64,
    pub charge_per_s: f64,
    pub arrival_epsilon: f64,
    /// Weight of the low-battery penalty in assignment scoring.
    pub battery_weight: f64,
    /// Seed for the demo task generator.
    pub rng_seed: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            grid_width: 50,
            grid_height: 30,
            connectivity: Connectivity::Four,
            obstacles: Vec::new(),
            fleet_size: 6,
            station_cells: vec![Cell::new(5, 5), Cell::new(45, 5), Cell::new(25, 25)],
            station_capacity: 2,
            battery_capacity: 100.0,
            robot_speed: 2.0,
            low_battery_pct: 20.0,
            drain_per_cell: 0.1,
            work_drain_per_s: 1.0,
            charge_per_s: 20.0,
            arrival_epsilon: 0.25,
            battery_weight: 0.1,
            rng_seed: 42,
        }
    }
}

impl FleetConfig {
    /// Fatal-misconfiguration gate. Everything here would corrupt the
    /// simulation if allowed through, so it fails construction instead of
    /// surfacing later as a tick-loop error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.fleet_size == 0 {
            return Err(ConfigError::EmptyFleet);
        }
        for (name, value) in [
            ("battery_capacity", self.battery_capacity),
            ("robot_speed", self.robot_speed),
            ("drain_per_cell", self.drain_per_cell),
            ("work_drain_per_s", self.work_drain_per_s),
            ("charge_per_s", self.charge_per_s),
            ("battery_weight", self.battery_weight),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if !(0.0..self.battery_capacity).contains(&self.low_battery_pct) {
            return Err(ConfigError::BadLowBatteryThreshold(self.low_battery_pct));
        }
        // The snap distance must stay below a cell, or routes collapse.
        if !self.arrival_epsilon.is_finite()
            || self.arrival_epsilon <= 0.0
            || self.arrival_epsilon >= 1.0
        {
            return Err(ConfigError::BadArrivalEpsilon(self.arrival_epsilon));
        }
        let in_bounds = |c: &Cell| {
            c.x >= 0
                && c.y >= 0
                && (c.x as u32) < self.grid_width
                && (c.y as u32) < self.grid_height
        };
        for obstacle in &self.obstacles {
            if !in_bounds(obstacle) {
                return Err(ConfigError::ObstacleOutOfBounds(*obstacle));
            }
        }
        for station in &self.station_cells {
            if !in_bounds(station) || self.obstacles.contains(station) {
                return Err(ConfigError::StationUnreachable(*station));
            }
        }
        Ok(())
    }

    pub fn motion_params(&self) -> MotionParams {
        MotionParams {
            speed: self.robot_speed,
            battery_capacity: self.battery_capacity,
            low_battery_pct: self.low_battery_pct,
            drain_per_cell: self.drain_per_cell,
            work_drain_per_s: self.work_drain_per_s,
            charge_per_s: self.charge_per_s,
            arrival_epsilon: self.arrival_epsilon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        FleetConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_grid_rejected() {
        let cfg = FleetConfig {
            grid_width: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyGrid { .. })));
    }

    #[test]
    fn negative_battery_capacity_rejected() {
        let cfg = FleetConfig {
            battery_capacity: -5.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonPositive {
                name: "battery_capacity",
                ..
            })
        ));
    }

    #[test]
    fn station_on_obstacle_rejected() {
        let cfg = FleetConfig {
            obstacles: vec![Cell::new(5, 5)],
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::StationUnreachable(_))
        ));
    }

    #[test]
    fn out_of_range_arrival_epsilon_rejected() {
        for epsilon in [0.0, -0.5, 1.0, 1.5, f64::NAN] {
            let cfg = FleetConfig {
                arrival_epsilon: epsilon,
                ..Default::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::BadArrivalEpsilon(_))
            ));
        }
    }

    #[test]
    fn threshold_must_be_below_capacity() {
        let cfg = FleetConfig {
            low_battery_pct: 120.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::BadLowBatteryThreshold(_))
        ));
    }
}
