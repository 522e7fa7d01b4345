use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

pub struct Metrics {
    // Query stages
    pub count_queries_total: AtomicU64,
    pub select_queries_total: AtomicU64,
    pub rows_returned_total: AtomicU64,

    // Recovery
    pub recovered_errors_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            count_queries_total: AtomicU64::new(0),
            select_queries_total: AtomicU64::new(0),
            rows_returned_total: AtomicU64::new(0),
            recovered_errors_total: AtomicU64::new(0),
        }
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::default)
}

pub fn render_prometheus() -> String {
    let m = metrics();
    let mut s = String::new();
    // stages
    let _ = writeln!(
        s,
        "# TYPE count_queries_total counter\ncount_queries_total {}",
        m.count_queries_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE select_queries_total counter\nselect_queries_total {}",
        m.select_queries_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE rows_returned_total counter\nrows_returned_total {}",
        m.rows_returned_total.load(Ordering::Relaxed)
    );
    // recovery
    let _ = writeln!(
        s,
        "# TYPE recovered_errors_total counter\nrecovered_errors_total {}",
        m.recovered_errors_total.load(Ordering::Relaxed)
    );
    s
}
