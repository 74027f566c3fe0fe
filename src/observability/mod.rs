pub mod metrics;
pub mod collector;
pub mod monitor;

pub use metrics::JobMetrics;
pub use collector::{MetricsCollector, MetricsSnapshot};
pub use monitor::ChannelMonitor;
