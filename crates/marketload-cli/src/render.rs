use std::fmt::Write;

use marketload_core::results::RunReport;

/// Render the aggregated report as plain text: the textual counterpart of
/// the original latency and call-count charts, labeled with the run
/// parameters.
pub fn render_text(report: &RunReport) -> String {
    let label = format!(
        "[Test duration: {}s / Concurrently connected users: {} / Conversion rate multiplier: {}]",
        report.duration_seconds, report.concurrent_users, report.conversion_multiplier
    );

    let mut out = String::new();
    let _ = writeln!(out, "Average wait time for each API call");
    let _ = writeln!(out, "{label}");
    if report.metrics.is_empty() {
        let _ = writeln!(out, "  (no calls recorded)");
    }
    for (endpoint, metric) in &report.metrics {
        let _ = writeln!(
            out,
            "  {:<12} {:>8}",
            endpoint.to_string(),
            format!("{}ms", metric.weighted_average_latency_ms)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Total number of calls made to APIs");
    let _ = writeln!(out, "{label}");
    if report.metrics.is_empty() {
        let _ = writeln!(out, "  (no calls recorded)");
    }
    for (endpoint, metric) in &report.metrics {
        let _ = writeln!(
            out,
            "  {:<12} successes: {:>8}  errors: {:>8}",
            endpoint.to_string(),
            metric.total_successes,
            metric.total_errors
        );
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
