use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use trace2pass_common::CheckKind;

/// All-atomic-fields counters, no internal mutex, covering exactly what
/// the collector's `/api/v1/stats` endpoint needs.
pub struct Metrics {
    pub reports_total: AtomicU64,
    pub records_total: AtomicU64,
    pub rejected_total: AtomicU64,
    per_kind: [AtomicU64; 8],
    start_time: SystemTime,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            reports_total: AtomicU64::new(0),
            records_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
            per_kind: std::array::from_fn(|_| AtomicU64::new(0)),
            start_time: SystemTime::now(),
        }
    }

    pub fn record_report(&self, kind: CheckKind, is_new_record: bool) {
        self.reports_total.fetch_add(1, Ordering::Relaxed);
        if is_new_record {
            self.records_total.fetch_add(1, Ordering::Relaxed);
        }
        self.per_kind[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn per_kind_breakdown(&self) -> Vec<(CheckKind, u64)> {
        CheckKind::ALL
            .iter()
            .map(|&kind| (kind, self.per_kind[kind_index(kind)].load(Ordering::Relaxed)))
            .collect()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().map(|d| d.as_secs()).unwrap_or(0)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_index(kind: CheckKind) -> usize {
    CheckKind::ALL.iter().position(|&k| k == kind).expect("CheckKind::ALL is exhaustive")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_increments_records_total_existing_does_not() {
        let metrics = Metrics::new();
        metrics.record_report(CheckKind::ArithOverflow, true);
        metrics.record_report(CheckKind::ArithOverflow, false);
        assert_eq!(metrics.reports_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.records_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn per_kind_breakdown_covers_all_kinds() {
        let metrics = Metrics::new();
        metrics.record_report(CheckKind::DivByZero, true);
        let breakdown = metrics.per_kind_breakdown();
        assert_eq!(breakdown.len(), 8);
        let div = breakdown.iter().find(|(k, _)| *k == CheckKind::DivByZero).unwrap();
        assert_eq!(div.1, 1);
    }
}
