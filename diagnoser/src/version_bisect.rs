use std::collections::HashMap;

use crate::oracle::OracleOutcome;

/// One point in the ordered sequence of toolchain builds under test (§4.5).
/// Ordering is the caller's responsibility — this module only ever indexes
/// into the slice it's given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerVersion(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BisectOutcome {
    Bisected { first_bad: String, last_good: String },
    AllPass,
    AllFail,
    Error(String),
}

/// Binary search for the first version in `versions` at which the oracle
/// regresses. `Ice` is treated as a stronger form of `Fail`. `Skip` versions
/// are stepped over rather than counted either way (§4.5).
///
/// Each distinct index is probed at most once: the oracle is typically a
/// full compiler build plus a test run, so repeat probes are not a
/// correctness concern here but a cost one.
pub fn bisect_versions<F>(versions: &[CompilerVersion], oracle: F) -> BisectOutcome
where
    F: Fn(&CompilerVersion) -> OracleOutcome,
{
    if versions.is_empty() {
        return BisectOutcome::Error("no versions supplied".to_string());
    }

    let mut cache: HashMap<usize, OracleOutcome> = HashMap::new();
    let mut classify = |idx: usize| -> OracleOutcome {
        *cache.entry(idx).or_insert_with(|| oracle(&versions[idx]))
    };
    let is_fail = |o: OracleOutcome| matches!(o, OracleOutcome::Fail | OracleOutcome::Ice);

    let mut lo = 0usize;
    while lo < versions.len() && classify(lo) == OracleOutcome::Skip {
        lo += 1;
    }
    if lo == versions.len() {
        return BisectOutcome::Error("every version was skipped".to_string());
    }
    if is_fail(classify(lo)) {
        return BisectOutcome::AllFail;
    }

    let mut hi = versions.len() - 1;
    while hi > lo && classify(hi) == OracleOutcome::Skip {
        hi -= 1;
    }
    if !is_fail(classify(hi)) {
        return BisectOutcome::AllPass;
    }

    // invariant: classify(lo) passes, classify(hi) fails, lo < hi.
    while hi - lo > 1 {
        let mut mid = lo + (hi - lo) / 2;
        while mid < hi && classify(mid) == OracleOutcome::Skip {
            mid += 1;
        }
        if mid == hi {
            // nothing usable strictly between lo and hi
            break;
        }
        if is_fail(classify(mid)) {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    BisectOutcome::Bisected {
        first_bad: versions[hi].0.clone(),
        last_good: versions[lo].0.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(n: usize) -> Vec<CompilerVersion> {
        (0..n).map(|i| CompilerVersion(format!("v{i}"))).collect()
    }

    #[test]
    fn finds_the_exact_regression_boundary() {
        let vs = versions(10);
        let outcome = bisect_versions(&vs, |v| {
            let idx: usize = v.0[1..].parse().unwrap();
            if idx < 6 { OracleOutcome::Pass } else { OracleOutcome::Fail }
        });
        assert_eq!(
            outcome,
            BisectOutcome::Bisected {
                first_bad: "v6".to_string(),
                last_good: "v5".to_string(),
            }
        );
    }

    #[test]
    fn all_versions_passing_reports_all_pass() {
        let vs = versions(5);
        let outcome = bisect_versions(&vs, |_| OracleOutcome::Pass);
        assert_eq!(outcome, BisectOutcome::AllPass);
    }

    #[test]
    fn all_versions_failing_reports_all_fail() {
        let vs = versions(5);
        let outcome = bisect_versions(&vs, |_| OracleOutcome::Fail);
        assert_eq!(outcome, BisectOutcome::AllFail);
    }

    #[test]
    fn ice_counts_as_a_failure() {
        let vs = versions(4);
        let outcome = bisect_versions(&vs, |v| {
            let idx: usize = v.0[1..].parse().unwrap();
            if idx < 2 { OracleOutcome::Pass } else { OracleOutcome::Ice }
        });
        assert_eq!(
            outcome,
            BisectOutcome::Bisected {
                first_bad: "v2".to_string(),
                last_good: "v1".to_string(),
            }
        );
    }

    #[test]
    fn skipped_versions_inside_the_range_are_stepped_over() {
        let vs = versions(6);
        let outcome = bisect_versions(&vs, |v| {
            let idx: usize = v.0[1..].parse().unwrap();
            if idx == 3 {
                OracleOutcome::Skip
            } else if idx < 4 {
                OracleOutcome::Pass
            } else {
                OracleOutcome::Fail
            }
        });
        assert_eq!(
            outcome,
            BisectOutcome::Bisected {
                first_bad: "v4".to_string(),
                last_good: "v2".to_string(),
            }
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        let outcome = bisect_versions(&[], |_| OracleOutcome::Pass);
        assert_eq!(outcome, BisectOutcome::Error("no versions supplied".to_string()));
    }

    #[test]
    fn fully_skipped_range_is_an_error() {
        let vs = versions(3);
        let outcome = bisect_versions(&vs, |_| OracleOutcome::Skip);
        assert_eq!(outcome, BisectOutcome::Error("every version was skipped".to_string()));
    }
}
