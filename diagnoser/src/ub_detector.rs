/// One piece of evidence feeding the weighted vote (§4.4). `value` is in
/// `[0.0, 1.0]`: 1.0 is strong evidence of a compiler bug, 0.0 is strong
/// evidence of user-program UB. `Unavailable` means the signal could not be
/// computed at all (e.g. sanitizer build failed to produce a clean run) —
/// it contributes zero to the weighted sum rather than a default-positive
/// guess, which is why missing signals can leave the verdict inconclusive
/// instead of resolving it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Available(f64),
    Unavailable,
}

impl Signal {
    fn contribution(self) -> f64 {
        match self {
            Signal::Available(v) => v.clamp(0.0, 1.0),
            Signal::Unavailable => 0.0,
        }
    }
}

const SANITIZER_WEIGHT: f64 = 0.5;
const OPT_LEVEL_WEIGHT: f64 = 0.3;
const CROSS_COMPILER_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    CompilerBug { confidence: f64 },
    UserUb { confidence: f64 },
    Inconclusive { confidence: f64 },
}

/// Combines the sanitizer-clean, optimization-level-sensitivity, and
/// cross-compiler-differential signals into one verdict (§4.4). Thresholds
/// are fixed at 0.6 and 0.3: at or above 0.6 is a compiler bug, at or below
/// 0.3 is user UB, and the open band between is reported rather than forced
/// one way or the other.
pub fn detect(sanitizer: Signal, opt_level: Signal, cross_compiler: Signal) -> Verdict {
    let confidence = SANITIZER_WEIGHT * sanitizer.contribution()
        + OPT_LEVEL_WEIGHT * opt_level.contribution()
        + CROSS_COMPILER_WEIGHT * cross_compiler.contribution();

    if confidence >= 0.6 {
        Verdict::CompilerBug { confidence }
    } else if confidence <= 0.3 {
        Verdict::UserUb { confidence }
    } else {
        Verdict::Inconclusive { confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_signals_pointing_at_compiler_bug_clears_the_upper_threshold() {
        let verdict = detect(Signal::Available(1.0), Signal::Available(1.0), Signal::Available(1.0));
        assert!(matches!(verdict, Verdict::CompilerBug { .. }));
    }

    #[test]
    fn all_signals_pointing_at_user_ub_clears_the_lower_threshold() {
        let verdict = detect(Signal::Available(0.0), Signal::Available(0.0), Signal::Available(0.0));
        assert_eq!(verdict, Verdict::UserUb { confidence: 0.0 });
    }

    #[test]
    fn mixed_signals_land_in_the_inconclusive_band() {
        let verdict = detect(Signal::Available(0.5), Signal::Available(0.5), Signal::Available(0.5));
        assert!(matches!(verdict, Verdict::Inconclusive { .. }));
    }

    #[test]
    fn missing_signals_reduce_confidence_rather_than_default_to_compiler_bug() {
        let verdict = detect(Signal::Unavailable, Signal::Unavailable, Signal::Available(1.0));
        // only cross-compiler contributes: 0.2 * 1.0 = 0.2
        assert_eq!(verdict, Verdict::UserUb { confidence: 0.2 });
    }

    #[test]
    fn sanitizer_signal_alone_cannot_clear_the_compiler_bug_threshold() {
        // weight 0.5 caps out below the 0.6 bar on its own
        let verdict = detect(Signal::Available(1.0), Signal::Unavailable, Signal::Unavailable);
        assert!(matches!(verdict, Verdict::Inconclusive { .. }));
    }
}
