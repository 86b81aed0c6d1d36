use serde::{Deserialize, Serialize};

/// The closed set of instrumentable anomaly kinds.
///
/// Adding a variant here without a matching [`crate::CheckDetails`] arm is a
/// compile error everywhere `CheckDetails` is matched — there are no
/// catch-all arms in this crate on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ArithOverflow,
    ShiftOverflow,
    UnreachableExecuted,
    BoundsViolation,
    SignConversion,
    DivByZero,
    PureInconsistency,
    LoopBoundExceeded,
}

impl CheckKind {
    pub const ALL: [CheckKind; 8] = [
        CheckKind::ArithOverflow,
        CheckKind::ShiftOverflow,
        CheckKind::UnreachableExecuted,
        CheckKind::BoundsViolation,
        CheckKind::SignConversion,
        CheckKind::DivByZero,
        CheckKind::PureInconsistency,
        CheckKind::LoopBoundExceeded,
    ];

    /// The five categories enabled in production mode (§4.1).
    pub const PRODUCTION: [CheckKind; 5] = [
        CheckKind::ArithOverflow,
        CheckKind::UnreachableExecuted,
        CheckKind::DivByZero,
        CheckKind::PureInconsistency,
        CheckKind::LoopBoundExceeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::ArithOverflow => "arith_overflow",
            CheckKind::ShiftOverflow => "shift_overflow",
            CheckKind::UnreachableExecuted => "unreachable_executed",
            CheckKind::BoundsViolation => "bounds_violation",
            CheckKind::SignConversion => "sign_conversion",
            CheckKind::DivByZero => "div_by_zero",
            CheckKind::PureInconsistency => "pure_inconsistency",
            CheckKind::LoopBoundExceeded => "loop_bound_exceeded",
        }
    }
}

/// Fixed per-kind severity scalar used by the collector's priority function.
///
/// Wrong-code kinds outrank reliability hints: a pure-function result that
/// silently disagreed with a cached one is worse news than a loop that ran
/// ten million iterations.
pub fn severity_weight(kind: CheckKind) -> f64 {
    match kind {
        CheckKind::ArithOverflow => 1.0,
        CheckKind::PureInconsistency => 1.0,
        CheckKind::SignConversion => 0.8,
        CheckKind::BoundsViolation => 0.8,
        CheckKind::DivByZero => 0.5,
        CheckKind::ShiftOverflow => 0.5,
        CheckKind::UnreachableExecuted => 0.3,
        CheckKind::LoopBoundExceeded => 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_subset_of_all() {
        for kind in CheckKind::PRODUCTION {
            assert!(CheckKind::ALL.contains(&kind));
        }
        assert_eq!(CheckKind::PRODUCTION.len(), 5);
        assert_eq!(CheckKind::ALL.len(), 8);
    }

    #[test]
    fn wrong_code_outranks_reliability_hints() {
        assert!(severity_weight(CheckKind::ArithOverflow) > severity_weight(CheckKind::LoopBoundExceeded));
        assert!(severity_weight(CheckKind::PureInconsistency) > severity_weight(CheckKind::UnreachableExecuted));
    }

    #[test]
    fn serde_round_trip_is_snake_case() {
        let json = serde_json::to_string(&CheckKind::ArithOverflow).unwrap();
        assert_eq!(json, "\"arith_overflow\"");
        let back: CheckKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CheckKind::ArithOverflow);
    }
}
