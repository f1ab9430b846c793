//! Observability: health probes. Metrics are recorded through the
//! `metrics` facade and rendered by `metrics-exporter-prometheus` on a
//! separate listener.

pub mod health;

pub use health::{health_router, HealthState};
