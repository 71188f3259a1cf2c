mod aggregator;

pub use aggregator::{HealthAggregator, HealthDetails, HealthSnapshot, HEALTH_GRACE_PERIOD};
