use serde::{Deserialize, Serialize};

use crate::kind::CheckKind;

/// Source location attached by the front end's debug info, when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl SourceLocation {
    pub fn unknown() -> Self {
        Self {
            file: "unknown".to_string(),
            line: 0,
            function: "unknown".to_string(),
        }
    }
}

/// Build identity, when the engine was told it (§4.2 "known limitation").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub compiler: String,
    pub version: String,
    pub flags: Vec<String>,
    pub source_hash: String,
}

impl BuildMetadata {
    pub fn unknown() -> Self {
        Self {
            compiler: "unknown".to_string(),
            version: "unknown".to_string(),
            flags: Vec::new(),
            source_hash: "unknown".to_string(),
        }
    }
}

/// Kind-specific payload. One emission function per kind upstream in the
/// runtime maps to exactly one variant here — no untyped "any payload"
/// channel (§9 design note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CheckDetails {
    ArithOverflow {
        expr: String,
        lhs: i64,
        rhs: i64,
    },
    ShiftOverflow {
        value: i64,
        shift_amount: u64,
        bit_width: u32,
    },
    UnreachableExecuted,
    BoundsViolation {
        base_ptr: u64,
        offset: u64,
        size: u64,
    },
    SignConversion {
        original: i64,
        widened: u64,
        src_width: u32,
        dst_width: u32,
    },
    DivByZero {
        op: String,
    },
    PureInconsistency {
        function: String,
        arg1: i64,
        arg2: Option<i64>,
        cached_result: i64,
        observed_result: i64,
    },
    LoopBoundExceeded {
        iterations: u64,
        threshold: u64,
    },
}

impl CheckDetails {
    pub fn kind(&self) -> CheckKind {
        match self {
            CheckDetails::ArithOverflow { .. } => CheckKind::ArithOverflow,
            CheckDetails::ShiftOverflow { .. } => CheckKind::ShiftOverflow,
            CheckDetails::UnreachableExecuted => CheckKind::UnreachableExecuted,
            CheckDetails::BoundsViolation { .. } => CheckKind::BoundsViolation,
            CheckDetails::SignConversion { .. } => CheckKind::SignConversion,
            CheckDetails::DivByZero { .. } => CheckKind::DivByZero,
            CheckDetails::PureInconsistency { .. } => CheckKind::PureInconsistency,
            CheckDetails::LoopBoundExceeded { .. } => CheckKind::LoopBoundExceeded,
        }
    }
}

/// One occurrence produced by the runtime. Immutable after construction —
/// there are no setters, only [`AnomalyReportBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub id: String,
    pub kind: CheckKind,
    pub pc: u64,
    pub source: Option<SourceLocation>,
    pub build: Option<BuildMetadata>,
    pub details: CheckDetails,
    pub timestamp_ns: u64,
    pub thread_id: u64,
}

/// Builds an [`AnomalyReport`], filling absent optional fields with the
/// "unknown" placeholders §6 specifies rather than leaving them `None` on
/// the wire.
pub struct AnomalyReportBuilder {
    pc: u64,
    source: Option<SourceLocation>,
    build: Option<BuildMetadata>,
    details: CheckDetails,
    timestamp_ns: u64,
    thread_id: u64,
}

impl AnomalyReportBuilder {
    pub fn new(details: CheckDetails, pc: u64, timestamp_ns: u64, thread_id: u64) -> Self {
        Self {
            pc,
            source: None,
            build: None,
            details,
            timestamp_ns,
            thread_id,
        }
    }

    pub fn source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(mut self, build: BuildMetadata) -> Self {
        self.build = Some(build);
        self
    }

    pub fn finish(self) -> AnomalyReport {
        let kind = self.details.kind();
        let id = format!("{:016x}-{:016x}", self.pc, self.timestamp_ns);
        AnomalyReport {
            id,
            kind,
            pc: self.pc,
            source: self.source,
            build: self.build,
            details: self.details,
            timestamp_ns: self.timestamp_ns,
            thread_id: self.thread_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_derives_kind_from_details() {
        let report = AnomalyReportBuilder::new(
            CheckDetails::DivByZero { op: "sdiv".to_string() },
            0x1000,
            42,
            7,
        )
        .finish();
        assert_eq!(report.kind, CheckKind::DivByZero);
        assert!(report.source.is_none());
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = AnomalyReportBuilder::new(
            CheckDetails::ArithOverflow {
                expr: "x mul y".to_string(),
                lhs: 1_000_000,
                rhs: 1_000_000,
            },
            0x2000,
            1,
            1,
        )
        .source(SourceLocation::unknown())
        .finish();
        let json = serde_json::to_string(&report).unwrap();
        let back: AnomalyReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
