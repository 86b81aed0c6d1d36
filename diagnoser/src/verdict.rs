use serde::Serialize;

use crate::pass_bisect::PassBisectOutcome;
use crate::ub_detector::Verdict as UbVerdict;
use crate::version_bisect::BisectOutcome;

/// The shape every diagnoser subcommand prints to stdout as its final line
/// (§6 "Diagnoser command interface"). `verdict` is always present; the
/// process exit code is zero exactly when `verdict` is not `"error"`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum DiagnoserVerdict {
    CompilerBug { confidence: f64 },
    UserUb { confidence: f64 },
    Inconclusive { confidence: f64 },
    VersionBisected { first_bad: String, last_good: String },
    AllPass,
    AllFail,
    PassBisected { culprit: String, index: usize, context_below: Vec<String>, context_above: Vec<String> },
    BaselineFails,
    FullPasses,
    Analyzed { kind: String, occurrence_weight: f64, suggested_next: &'static str },
    Error { message: String },
}

impl DiagnoserVerdict {
    /// Process exit code the CLI should use for this verdict (§6: zero on
    /// success, non-zero on error or an incomplete diagnosis).
    pub fn exit_code(&self) -> i32 {
        match self {
            DiagnoserVerdict::Error { .. } => 1,
            _ => 0,
        }
    }
}

impl From<UbVerdict> for DiagnoserVerdict {
    fn from(v: UbVerdict) -> Self {
        match v {
            UbVerdict::CompilerBug { confidence } => DiagnoserVerdict::CompilerBug { confidence },
            UbVerdict::UserUb { confidence } => DiagnoserVerdict::UserUb { confidence },
            UbVerdict::Inconclusive { confidence } => DiagnoserVerdict::Inconclusive { confidence },
        }
    }
}

impl From<BisectOutcome> for DiagnoserVerdict {
    fn from(o: BisectOutcome) -> Self {
        match o {
            BisectOutcome::Bisected { first_bad, last_good } => DiagnoserVerdict::VersionBisected { first_bad, last_good },
            BisectOutcome::AllPass => DiagnoserVerdict::AllPass,
            BisectOutcome::AllFail => DiagnoserVerdict::AllFail,
            BisectOutcome::Error(message) => DiagnoserVerdict::Error { message },
        }
    }
}

impl From<PassBisectOutcome> for DiagnoserVerdict {
    fn from(o: PassBisectOutcome) -> Self {
        match o {
            PassBisectOutcome::Bisected { culprit, index, context_below, context_above } => {
                DiagnoserVerdict::PassBisected { culprit, index, context_below, context_above }
            }
            PassBisectOutcome::BaselineFails => DiagnoserVerdict::BaselineFails,
            PassBisectOutcome::FullPasses => DiagnoserVerdict::FullPasses,
            PassBisectOutcome::Error(message) => DiagnoserVerdict::Error { message },
        }
    }
}
