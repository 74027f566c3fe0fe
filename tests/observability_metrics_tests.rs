use colorizer_engine::engine::JobName;
use colorizer_engine::observability::{ChannelMonitor, JobMetrics, MetricsCollector};
use std::sync::Arc;

#[test]
fn test_metrics_creation() {
    let metrics = JobMetrics::new(JobName::LoadUrl);
    assert_eq!(metrics.job(), JobName::LoadUrl);
    assert_eq!(metrics.dispatched(), 0);
    assert_eq!(metrics.completed(), 0);
    assert_eq!(metrics.errors_count(), 0);
    assert_eq!(metrics.avg_latency_us(), 0);
}

#[test]
fn test_metrics_increment() {
    let metrics = Arc::new(JobMetrics::new(JobName::GetCorrelations));

    metrics.record_dispatched();
    metrics.record_dispatched();
    metrics.record_completed();
    metrics.record_error();

    assert_eq!(metrics.dispatched(), 2);
    assert_eq!(metrics.completed(), 1);
    assert_eq!(metrics.errors_count(), 1);
}

#[tokio::test]
async fn test_metrics_latency_tracking() {
    let metrics = JobMetrics::new(JobName::GetMotionDeltas);

    let start = metrics.start_processing();
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    metrics.finish_processing(start);

    assert!(metrics.avg_latency_us() >= 10_000);
}

#[test]
fn test_collector_clones_share_counters() {
    let collector = MetricsCollector::for_jobs();
    let clone = collector.clone();

    clone.job(JobName::LoadUrl).record_dispatched();
    assert_eq!(collector.job(JobName::LoadUrl).dispatched(), 1);
}

#[test]
fn test_snapshot_covers_every_job_kind() {
    let collector = MetricsCollector::default();
    collector.job(JobName::GetCorrelations).record_completed();

    let snapshot = collector.snapshot();
    let jobs: Vec<JobName> = snapshot.iter().map(|m| m.job).collect();
    assert_eq!(jobs, JobName::ALL.to_vec());
    assert_eq!(snapshot[1].completed, 1);
}

#[test]
fn test_report_lists_only_active_jobs() {
    let collector = MetricsCollector::for_jobs();
    let load = collector.job(JobName::LoadUrl);
    load.record_dispatched();
    load.record_error();

    let report = ChannelMonitor::new(collector).generate_report();
    assert!(report.contains("Compute Channel Metrics"));
    assert!(report.contains("[load-url]"));
    assert!(report.contains("1 error"));
    assert!(!report.contains("get-correlations"));
}
