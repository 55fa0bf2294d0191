mod health_monitor;
mod quality_monitor;

pub use health_monitor::{HealthCheck, HealthMonitor, is_degraded};
pub use quality_monitor::{LossClass, QualityMonitor, adjust_encoding, classify_loss};
