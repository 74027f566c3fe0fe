use super::MetricsCollector;
use log::info;

pub struct ChannelMonitor {
    collector: MetricsCollector,
}

impl ChannelMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();

        let mut report = String::from("=== Compute Channel Metrics ===\n");

        for metrics in snapshot.iter().filter(|m| m.dispatched > 0) {
            report.push_str(&format!(
                "\n[{}]\n  Jobs: {} dispatched, {} completed\n  Errors: {}\n  Avg Latency: {}μs\n",
                metrics.job,
                metrics.dispatched,
                metrics.completed,
                if metrics.errors_count > 0 {
                    format!("{} error{}", metrics.errors_count, if metrics.errors_count == 1 { "" } else { "s" })
                } else {
                    "0 errors".to_string()
                },
                metrics.avg_latency_us
            ));
        }

        report
    }

    pub fn log_report(&self) {
        for line in self.generate_report().lines().filter(|l| !l.is_empty()) {
            info!("{}", line);
        }
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
