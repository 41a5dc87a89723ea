pub mod health;
pub mod metrics;

pub use self::health::{get_status, health_check};
pub use self::metrics::metrics_endpoint;
