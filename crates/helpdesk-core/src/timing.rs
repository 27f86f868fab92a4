//! Per-request latency samples for `--timing`.
//!
//! Samples go into a process-wide buffer because a send may be dispatched
//! from a worker thread while the report is collected on the main one.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub operations: Vec<OpTiming>,
}

/// Latency percentiles for one named operation (`api.fetch_ticket`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpTiming {
    pub name: String,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub count: usize,
}

#[derive(Debug, Clone)]
struct Sample {
    name: &'static str,
    elapsed: Duration,
}

static SAMPLES: Mutex<Vec<Sample>> = Mutex::new(Vec::new());
static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Returns true when `HELPDESK_TIMING` is `1`, `true`, `yes` or `on`.
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("HELPDESK_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(value.as_str()))
}

pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

pub fn clear_timings() {
    with_samples(Vec::clear);
}

/// Run `f`, recording its duration under `name` when timing is enabled.
pub fn timed<R>(name: &'static str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    record_sample(name, started.elapsed());
    result
}

/// Drain all recorded samples into a report.
#[must_use]
pub fn collect_report() -> TimingReport {
    let samples = with_samples(std::mem::take);

    let mut grouped: BTreeMap<&'static str, Vec<Duration>> = BTreeMap::new();
    for sample in samples {
        grouped.entry(sample.name).or_default().push(sample.elapsed);
    }

    let operations = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            OpTiming {
                name: name.to_string(),
                p50: percentile(&values, 50),
                p95: percentile(&values, 95),
                p99: percentile(&values, 99),
                count: values.len(),
            }
        })
        .collect();

    TimingReport { operations }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let operations = self
            .operations
            .iter()
            .map(|op| {
                json!({
                    "name": op.name,
                    "count": op.count,
                    "p50_ms": millis(op.p50),
                    "p95_ms": millis(op.p95),
                    "p99_ms": millis(op.p99),
                })
            })
            .collect::<Vec<_>>();

        json!({ "requests": operations })
    }

    #[must_use]
    pub fn display_table(&self) -> String {
        use std::fmt::Write as _;

        if self.operations.is_empty() {
            return "No requests timed.".to_string();
        }

        let mut out = String::new();
        out.push_str("request                      count      p50      p95      p99\n");
        out.push_str("--------------------------------------------------------------\n");

        for op in &self.operations {
            let _ = writeln!(
                out,
                "{:<28} {:>6} {:>8} {:>8} {:>8}",
                op.name,
                op.count,
                format_duration(op.p50),
                format_duration(op.p95),
                format_duration(op.p99)
            );
        }

        out
    }
}

fn with_samples<R>(f: impl FnOnce(&mut Vec<Sample>) -> R) -> R {
    let mut guard = SAMPLES
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    f(&mut guard)
}

fn record_sample(name: &'static str, elapsed: Duration) {
    with_samples(|samples| samples.push(Sample { name, elapsed }));
}

fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }

    let rank = pct.min(100).saturating_mul(sorted.len()).saturating_add(99) / 100;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros >= 1_000_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if micros >= 1_000 {
        format!("{:.1}ms", millis(duration))
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|t| value.trim().eq_ignore_ascii_case(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_GUARD: Mutex<()> = Mutex::new(());

    fn guard() -> std::sync::MutexGuard<'static, ()> {
        TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[test]
    fn disabled_timing_records_nothing() {
        let _guard = guard();
        set_timing_enabled(false);

        assert_eq!(timed("api.fetch_ticket", || 7_u8), 7);
        assert!(collect_report().is_empty());
    }

    #[test]
    fn enabled_timing_records_samples() {
        let _guard = guard();
        set_timing_enabled(true);
        clear_timings();

        let value = timed("api.fetch_ticket", || {
            std::thread::sleep(Duration::from_millis(1));
            42_u8
        });
        assert_eq!(value, 42);

        let report = collect_report();
        assert_eq!(report.operations.len(), 1);
        assert_eq!(report.operations[0].name, "api.fetch_ticket");
        assert!(report.operations[0].p50 >= Duration::from_millis(1));

        set_timing_enabled(false);
    }

    #[test]
    fn samples_from_other_threads_are_collected() {
        let _guard = guard();
        set_timing_enabled(true);
        clear_timings();

        std::thread::spawn(|| timed("api.post_report", || ()))
            .join()
            .expect("worker thread");

        let report = collect_report();
        assert_eq!(report.operations.len(), 1);
        assert_eq!(report.operations[0].name, "api.post_report");

        set_timing_enabled(false);
    }

    #[test]
    fn percentiles_group_by_name() {
        let _guard = guard();
        clear_timings();

        record_sample("api.fetch_reports", Duration::from_micros(3_000));
        record_sample("api.fetch_reports", Duration::from_micros(1_000));
        record_sample("api.fetch_reports", Duration::from_micros(2_000));
        record_sample("api.update_ticket", Duration::from_micros(5_000));

        let report = collect_report();
        assert_eq!(report.operations.len(), 2);
        let reports = &report.operations[0];
        assert_eq!(reports.name, "api.fetch_reports");
        assert_eq!(reports.count, 3);
        assert_eq!(reports.p50, Duration::from_micros(2_000));
        assert_eq!(reports.p99, Duration::from_micros(3_000));

        let table = report.display_table();
        assert!(table.contains("api.update_ticket"));
        let json = report.to_json();
        assert_eq!(json["requests"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("On"));
        assert!(is_truthy(" 1 "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("nope"));
    }
}
