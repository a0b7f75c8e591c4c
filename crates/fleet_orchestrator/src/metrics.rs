use axum::{response::IntoResponse, routing::get, Router};
use fleet_sim::FleetSnapshot;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

/// Prometheus collectors for the orchestrator, shared behind an `Arc`
/// between the tick driver and the metrics server.
pub struct Metrics {
    pub registry: Registry,
    /// Total simulation ticks executed.
    pub ticks_total: IntCounter,
    /// Total operator commands applied at tick boundaries.
    pub commands_total: IntCounter,
    /// Tasks completed since startup.
    pub tasks_completed: IntGauge,
    /// Tasks waiting for an eligible robot.
    pub tasks_pending: IntGauge,
    /// Tasks assigned or in progress.
    pub tasks_active: IntGauge,
    /// Fraction of robots not Idle, 0.0 to 1.0.
    pub fleet_utilization: Gauge,
    /// Completed tasks per second of simulated time.
    pub fleet_efficiency: Gauge,
    /// Mean battery level across the fleet, percent.
    pub fleet_average_battery_pct: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("fleet_orchestrator".into()), None)
            .expect("Failed to create custom metrics registry");

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric;
                registry
                    .register(Box::new(collector.clone()))
                    .expect("Failed to register metric");
                collector
            }};
        }

        Self {
            ticks_total: reg!(IntCounter::new(
                "ticks_total",
                "Total simulation ticks executed"
            )
            .unwrap()),
            commands_total: reg!(IntCounter::new(
                "commands_total",
                "Total operator commands applied"
            )
            .unwrap()),
            tasks_completed: reg!(IntGauge::new(
                "tasks_completed",
                "Tasks completed since startup"
            )
            .unwrap()),
            tasks_pending: reg!(IntGauge::new(
                "tasks_pending",
                "Tasks waiting for an eligible robot"
            )
            .unwrap()),
            tasks_active: reg!(IntGauge::new(
                "tasks_active",
                "Tasks assigned or in progress"
            )
            .unwrap()),
            fleet_utilization: reg!(Gauge::new(
                "fleet_utilization",
                "Fraction of robots not Idle"
            )
            .unwrap()),
            fleet_efficiency: reg!(Gauge::new(
                "fleet_efficiency",
                "Completed tasks per second of simulated time"
            )
            .unwrap()),
            fleet_average_battery_pct: reg!(Gauge::new(
                "fleet_average_battery_pct",
                "Mean battery level across the fleet"
            )
            .unwrap()),
            registry,
        }
    }

    /// Folds one tick's snapshot into the collectors.
    pub fn observe(&self, snapshot: &FleetSnapshot) {
        self.ticks_total.inc();
        self.tasks_completed
            .set(snapshot.metrics.completed_tasks as i64);
        self.tasks_pending.set(snapshot.metrics.pending_tasks as i64);
        self.tasks_active.set(snapshot.metrics.active_tasks as i64);
        self.fleet_utilization.set(snapshot.metrics.utilization);
        self.fleet_efficiency.set(snapshot.metrics.efficiency);
        self.fleet_average_battery_pct
            .set(snapshot.metrics.average_battery_pct);
    }

    /// An `axum::Router` serving the collectors on `/metrics`.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    let encoder = TextEncoder::new();
                    encoder
                        .encode(&metric_families, &mut buffer)
                        .expect("Failed to encode metrics");
                    String::from_utf8(buffer)
                        .expect("Metrics buffer is not valid UTF-8")
                        .into_response()
                }
            }),
        )
    }
}
