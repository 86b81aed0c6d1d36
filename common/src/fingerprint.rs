use std::fmt;

use sha2::{Digest, Sha256};

use crate::report::{AnomalyReport, BuildMetadata, SourceLocation};

/// Stable identifier for "the same anomaly" across occurrences.
///
/// Two reports fingerprint identically iff they share
/// `(kind, source-location-or-pc, function name, compiler identity, flag
/// set)` — never timestamp, thread id, or operand values (§3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Compute the fingerprint of a report. Pure — depends only on the
    /// fields the Deduplication Fingerprint invariant names.
    pub fn of(report: &AnomalyReport) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(report.kind.as_str().as_bytes());
        hasher.update(b"\0");

        match &report.source {
            Some(SourceLocation { file, line, function }) => {
                hasher.update(file.as_bytes());
                hasher.update(line.to_le_bytes());
                hasher.update(b"\0");
                hasher.update(function.as_bytes());
            }
            None => {
                // No debug info: fall back to the PC, and an explicit marker
                // so "no source, function X" never collides with "source
                // file X, no function".
                hasher.update(b"<no-source>");
                hasher.update(report.pc.to_le_bytes());
            }
        }
        hasher.update(b"\0");

        match &report.build {
            Some(BuildMetadata {
                compiler,
                version,
                flags,
                ..
            }) => {
                hasher.update(compiler.as_bytes());
                hasher.update(b"\0");
                hasher.update(version.as_bytes());
                hasher.update(b"\0");
                for flag in flags {
                    hasher.update(flag.as_bytes());
                    hasher.update(b",");
                }
            }
            None => hasher.update(b"<no-build>"),
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Fingerprint(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{AnomalyReportBuilder, CheckDetails};

    fn report_with(source: Option<SourceLocation>, build: Option<BuildMetadata>) -> AnomalyReport {
        let mut builder = AnomalyReportBuilder::new(
            CheckDetails::ArithOverflow {
                expr: "x mul y".to_string(),
                lhs: 2,
                rhs: 3,
            },
            0x1000,
            0,
            0,
        );
        if let Some(s) = source {
            builder = builder.source(s);
        }
        if let Some(b) = build {
            builder = builder.build(b);
        }
        builder.finish()
    }

    fn loc(function: &str) -> SourceLocation {
        SourceLocation {
            file: "a.c".to_string(),
            line: 10,
            function: function.to_string(),
        }
    }

    #[test]
    fn identical_inputs_fingerprint_identically() {
        let a = report_with(Some(loc("f")), Some(BuildMetadata::unknown()));
        let mut b = report_with(Some(loc("f")), Some(BuildMetadata::unknown()));
        b.timestamp_ns = 999;
        b.thread_id = 42;
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn differing_function_name_differs() {
        let a = report_with(Some(loc("f")), None);
        let b = report_with(Some(loc("g")), None);
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn hex_round_trip() {
        let report = report_with(Some(loc("f")), None);
        let fp = Fingerprint::of(&report);
        let text = fp.to_string();
        assert_eq!(Fingerprint::from_hex(&text), Some(fp));
    }
}
