use super::JobMetrics;
use crate::engine::JobName;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub job: JobName,
    pub dispatched: u64,
    pub completed: u64,
    pub errors_count: u64,
    pub avg_latency_us: u64,
}

/// Per-job-kind metrics; clones share the same counters
#[derive(Clone)]
pub struct MetricsCollector {
    metrics: HashMap<JobName, Arc<JobMetrics>>,
}

impl MetricsCollector {
    /// Collector with one entry for every job kind
    pub fn for_jobs() -> Self {
        let metrics = JobName::ALL
            .iter()
            .map(|&job| (job, Arc::new(JobMetrics::new(job))))
            .collect();
        Self { metrics }
    }

    pub fn job(&self, job: JobName) -> Arc<JobMetrics> {
        match self.metrics.get(&job) {
            Some(metrics) => Arc::clone(metrics),
            None => Arc::new(JobMetrics::new(job)),
        }
    }

    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        JobName::ALL
            .iter()
            .filter_map(|job| self.metrics.get(job))
            .map(|metrics| MetricsSnapshot {
                job: metrics.job(),
                dispatched: metrics.dispatched(),
                completed: metrics.completed(),
                errors_count: metrics.errors_count(),
                avg_latency_us: metrics.avg_latency_us(),
            })
            .collect()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::for_jobs()
    }
}
