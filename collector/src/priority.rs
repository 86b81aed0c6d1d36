use trace2pass_common::{severity_weight, CheckKind};

const NANOS_PER_HOUR: f64 = 3_600_000_000_000.0;

/// `priority = occurrence_count * severity_weight(kind) * recency_factor` (§4.3).
/// Recency is keyed off last-seen, not first-seen, so a long-dormant
/// fingerprint doesn't permanently outrank a record that's actively firing.
pub fn priority(kind: CheckKind, occurrence_count: i64, last_seen_ns: i64, now_ns: i64) -> f64 {
    let age_hours = ((now_ns - last_seen_ns).max(0) as f64) / NANOS_PER_HOUR;
    let recency_factor = 1.0 / (1.0 + age_hours);
    occurrence_count as f64 * severity_weight(kind) * recency_factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_outranks_stale_one_at_equal_count() {
        let fresh = priority(CheckKind::ArithOverflow, 5, 1_000, 1_000);
        let stale = priority(CheckKind::ArithOverflow, 5, 0, (NANOS_PER_HOUR * 100.0) as i64);
        assert!(fresh > stale);
    }

    #[test]
    fn wrong_code_outranks_reliability_hint_at_equal_count_and_recency() {
        let now = 10_000;
        let wrong_code = priority(CheckKind::ArithOverflow, 3, now, now);
        let reliability_hint = priority(CheckKind::LoopBoundExceeded, 3, now, now);
        assert!(wrong_code > reliability_hint);
    }

    #[test]
    fn more_occurrences_outranks_fewer_at_equal_kind_and_recency() {
        let now = 10_000;
        let frequent = priority(CheckKind::DivByZero, 10, now, now);
        let rare = priority(CheckKind::DivByZero, 1, now, now);
        assert!(frequent > rare);
    }
}
