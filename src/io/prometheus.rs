//! Prometheus text exposition for the `/metrics` endpoint

use crate::infra::metrics::{Metrics, MetricsSnapshot, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use crate::store::StoreCounts;
use std::fmt::Write;

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, site: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {cumulative}");
}

/// Format metrics in Prometheus text exposition format
///
/// Reads cumulative counters only, so scrapes never disturb the periodic
/// summary log and every series is monotonic.
pub fn format_prometheus_metrics(metrics: &Metrics, counts: StoreCounts, site_id: &str) -> String {
    let snapshot = metrics.snapshot(counts.vehicles, counts.transitions);
    let mut output = String::with_capacity(4096);

    write_report_metrics(&mut output, site_id, &snapshot);
    write_transition_metrics(&mut output, site_id, &snapshot);
    write_histogram(
        &mut output,
        "geofence_report_latency_us",
        "Report processing latency in microseconds",
        site_id,
        &snapshot.lat_buckets,
        &METRICS_BUCKET_BOUNDS,
        snapshot.latency_sum_us,
    );

    output
}

fn write_report_metrics(output: &mut String, site: &str, snapshot: &MetricsSnapshot) {
    write_metric(
        output,
        "geofence_reports_total",
        "Position reports processed",
        MetricType::Counter,
        site,
        snapshot.reports_total,
    );
    write_metric(
        output,
        "geofence_reports_rejected_total",
        "Position reports rejected by validation",
        MetricType::Counter,
        site,
        snapshot.reports_rejected,
    );
    write_metric(
        output,
        "geofence_reports_failed_total",
        "Position reports that failed on storage",
        MetricType::Counter,
        site,
        snapshot.reports_failed,
    );
}

fn write_transition_metrics(output: &mut String, site: &str, snapshot: &MetricsSnapshot) {
    let _ = writeln!(output, "# HELP geofence_transitions_total Zone transitions written");
    let _ = writeln!(output, "# TYPE geofence_transitions_total counter");
    let _ = writeln!(
        output,
        "geofence_transitions_total{{site=\"{site}\",kind=\"enter\"}} {}",
        snapshot.enters_total
    );
    let _ = writeln!(
        output,
        "geofence_transitions_total{{site=\"{site}\",kind=\"exit\"}} {}",
        snapshot.exits_total
    );

    write_metric(
        output,
        "geofence_tracked_vehicles",
        "Vehicles with a stored state",
        MetricType::Gauge,
        site,
        snapshot.tracked_vehicles as u64,
    );
    write_metric(
        output,
        "geofence_stored_transitions",
        "Records in the transition log",
        MetricType::Gauge,
        site,
        snapshot.stored_transitions as u64,
    );
}
