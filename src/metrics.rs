use tracing::trace;

// Trace-level counters; the Prometheus recorder installed in `main` renders
// `/metrics`, these events feed log-based dashboards.

pub fn inc_requests(route: &'static str) {
    trace!(target = "fba.metrics", route = route, "requests_total_inc");
}

pub fn inc_failures(route: &'static str, stage: &'static str) {
    trace!(
        target = "fba.metrics",
        route = route,
        stage = stage,
        "request_failures_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "fba.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}
