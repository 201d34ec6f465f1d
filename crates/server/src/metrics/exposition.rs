use std::fmt::Write;

use super::coordinator_metrics::CoordinatorMetrics;

pub fn render_prometheus(m: &CoordinatorMetrics) -> String {
    let mut out = String::with_capacity(1024);

    let counters = [
        ("idemgate_executions_total", m.executions_total()),
        ("idemgate_replays_total", m.replays_total()),
        ("idemgate_waits_total", m.waits_total()),
        ("idemgate_inflight_timeouts_total", m.inflight_timeouts_total()),
        ("idemgate_payload_mismatches_total", m.payload_mismatches_total()),
        ("idemgate_stale_reclaims_total", m.stale_reclaims_total()),
        ("idemgate_rejected_completions_total", m.rejected_completions_total()),
        ("idemgate_validation_errors_total", m.validation_errors_total()),
        ("idemgate_storage_errors_total", m.storage_errors_total()),
        ("idemgate_records_swept_total", m.records_swept_total()),
    ];
    for (name, val) in counters {
        write_counter(&mut out, name, val);
    }

    let (sum, count) = m.operation_latency_vals();
    write_summary(&mut out, "idemgate_operation_latency_us", sum, count);

    out
}

fn write_counter(out: &mut String, name: &str, val: u64) {
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {val}");
}

fn write_summary(out: &mut String, name: &str, sum: u64, count: u64) {
    let _ = writeln!(out, "# TYPE {name} summary");
    let _ = writeln!(out, "{name}_sum {sum}");
    let _ = writeln!(out, "{name}_count {count}");
}
