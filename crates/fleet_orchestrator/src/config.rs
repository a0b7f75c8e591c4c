use anyhow::Context;
use clap::{Parser, ValueEnum};
use fleet_sim::{Cell, Connectivity, FleetConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConnectivityArg {
    Four,
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

/// `fleet_orchestrator` - tick driver for the AMR fleet simulation.
///
/// Runs the simulation on a fixed tick interval, accepts operator commands
/// on stdin, and exposes fleet metrics for Prometheus scraping.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Workspace width in cells.
    #[arg(long, env = "FLEET_GRID_WIDTH", default_value_t = 50)]
    pub grid_width: u32,

    /// Workspace height in cells.
    #[arg(long, env = "FLEET_GRID_HEIGHT", default_value_t = 30)]
    pub grid_height: u32,

    /// Movement connectivity for planning.
    #[arg(long, env = "FLEET_CONNECTIVITY", value_enum, default_value_t = ConnectivityArg::Four)]
    pub connectivity: ConnectivityArg,

    /// Static obstacles as "x,y;x,y;...".
    #[arg(long, env = "FLEET_OBSTACLES")]
    pub obstacles: Option<String>,

    /// Number of robots in the fleet.
    #[arg(long, env = "FLEET_SIZE", default_value_t = 6)]
    pub fleet_size: u32,

    /// Charging station cells as "x,y;x,y;...".
    #[arg(long, env = "FLEET_STATIONS", default_value = "5,5;45,5;25,25")]
    pub stations: String,

    /// Robots each station can host at once.
    #[arg(long, env = "FLEET_STATION_CAPACITY", default_value_t = 2)]
    pub station_capacity: usize,

    /// Full battery level, percent.
    #[arg(long, env = "FLEET_BATTERY_CAPACITY", default_value_t = 100.0)]
    pub battery_capacity: f64,

    /// Robot speed in cells per second at multiplier 1.0.
    #[arg(long, env = "FLEET_ROBOT_SPEED", default_value_t = 2.0)]
    pub robot_speed: f64,

    /// Battery percentage below which robots are routed to charge.
    #[arg(long, env = "FLEET_LOW_BATTERY_PCT", default_value_t = 20.0)]
    pub low_battery_pct: f64,

    /// Simulation tick interval in milliseconds.
    #[arg(long, env = "FLEET_TICK_INTERVAL_MS", default_value_t = 100)]
    pub tick_interval_ms: u64,

    /// Interval for the demo task generator in milliseconds; 0 disables it.
    #[arg(long, env = "FLEET_AUTO_TASK_INTERVAL_MS", default_value_t = 10_000)]
    pub auto_task_interval_ms: u64,

    /// Random tasks enqueued at startup.
    #[arg(long, env = "FLEET_INITIAL_TASKS", default_value_t = 8)]
    pub initial_tasks: u32,

    /// Seed for the demo task generator.
    #[arg(long, env = "FLEET_RNG_SEED", default_value_t = 42)]
    pub rng_seed: u64,

    /// Listen address for the Prometheus metrics server.
    #[arg(long, env = "FLEET_METRICS_LISTEN_ADDR", default_value = "0.0.0.0:9091")]
    pub metrics_listen_addr: String,
}

impl Cli {
    pub fn to_fleet_config(&self) -> anyhow::Result<FleetConfig> {
        Ok(FleetConfig {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            connectivity: self.connectivity.into(),
            obstacles: match &self.obstacles {
                Some(s) => parse_cells(s).context("failed to parse FLEET_OBSTACLES")?,
                None => Vec::new(),
            },
            fleet_size: self.fleet_size,
            station_cells: parse_cells(&self.stations).context("failed to parse FLEET_STATIONS")?,
            station_capacity: self.station_capacity,
            battery_capacity: self.battery_capacity,
            robot_speed: self.robot_speed,
            low_battery_pct: self.low_battery_pct,
            rng_seed: self.rng_seed,
            ..FleetConfig::default()
        })
    }
}

/// Parses "x,y;x,y;..." into cells. Whitespace around separators is fine.
fn parse_cells(input: &str) -> anyhow::Result<Vec<Cell>> {
    input
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("expected \"x,y\", got {pair:?}"))?;
            Ok(Cell::new(
                x.trim().parse().with_context(|| format!("bad x in {pair:?}"))?,
                y.trim().parse().with_context(|| format!("bad y in {pair:?}"))?,
            ))
        })
        .collect()
}
