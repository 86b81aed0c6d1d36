use std::sync::atomic::{AtomicU64, Ordering};

use trace2pass_common::Fingerprint;

/// Number of hash functions used per insertion/test.
const NUM_HASHES: usize = 4;
/// Bits in the set: ~131K bits (16KB) gives a false-positive rate well
/// under 1% at up to 1e4 distinct fingerprints per process.
const NUM_BITS: usize = 1 << 17;
const NUM_WORDS: usize = NUM_BITS / 64;

/// Space-efficient process-global membership structure. No locks: every
/// mutation is a single atomic fetch-or (§4.2 "no non-atomic shared
/// state").
pub struct DedupSet {
    words: Vec<AtomicU64>,
}

impl DedupSet {
    pub fn new() -> Self {
        let mut words = Vec::with_capacity(NUM_WORDS);
        words.resize_with(NUM_WORDS, || AtomicU64::new(0));
        Self { words }
    }

    /// Derives `NUM_HASHES` bit positions from one 16-byte fingerprint by
    /// splitting it into two 64-bit halves and mixing each with a distinct
    /// odd multiplier per hash slot (the classic double-hashing trick —
    /// avoids running a separate hash function per slot).
    fn bit_indices(fp: &Fingerprint) -> [usize; NUM_HASHES] {
        let bytes = fp.as_bytes();
        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&bytes[0..8]);
        hi.copy_from_slice(&bytes[8..16]);
        let a = u64::from_le_bytes(lo);
        let b = u64::from_le_bytes(hi);

        let mut indices = [0usize; NUM_HASHES];
        for (i, index) in indices.iter_mut().enumerate() {
            let h = a.wrapping_add((i as u64).wrapping_mul(b).wrapping_mul(0x9E3779B97F4A7C15));
            *index = (h as usize) % NUM_BITS;
        }
        indices
    }

    fn test(&self, index: usize) -> bool {
        let word = index / 64;
        let bit = index % 64;
        self.words[word].load(Ordering::Relaxed) & (1 << bit) != 0
    }

    fn set(&self, index: usize) {
        let word = index / 64;
        let bit = index % 64;
        self.words[word].fetch_or(1 << bit, Ordering::Relaxed);
    }

    /// Returns `true` if `fp` was already (probably) present, inserting it
    /// if not. The first occurrence of a fingerprint is never dropped
    /// (§3 invariant) — a fresh fingerprint always returns `false` here
    /// unless every one of its bits happened to already be set by
    /// unrelated fingerprints (a false positive, the structure's accepted
    /// failure mode at this capacity).
    pub fn insert_and_test(&self, fp: &Fingerprint) -> bool {
        let indices = Self::bit_indices(fp);
        let already_present = indices.iter().all(|&i| self.test(i));
        if !already_present {
            for &i in &indices {
                self.set(i);
            }
        }
        already_present
    }
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace2pass_common::{AnomalyReportBuilder, CheckDetails, SourceLocation};

    fn fp_for(function: &str) -> Fingerprint {
        let report = AnomalyReportBuilder::new(
            CheckDetails::ArithOverflow {
                expr: "x mul y".to_string(),
                lhs: 1,
                rhs: 2,
            },
            0,
            0,
            0,
        )
        .source(SourceLocation {
            file: "a.c".to_string(),
            line: 1,
            function: function.to_string(),
        })
        .finish();
        Fingerprint::of(&report)
    }

    #[test]
    fn first_occurrence_never_dropped() {
        let set = DedupSet::new();
        let fp = fp_for("f");
        assert!(!set.insert_and_test(&fp), "first occurrence must pass");
    }

    #[test]
    fn second_occurrence_is_suppressed() {
        let set = DedupSet::new();
        let fp = fp_for("f");
        assert!(!set.insert_and_test(&fp));
        assert!(set.insert_and_test(&fp), "duplicate must be suppressed");
    }

    #[test]
    fn distinct_fingerprints_usually_both_pass() {
        let set = DedupSet::new();
        let a = fp_for("f");
        let b = fp_for("g");
        assert!(!set.insert_and_test(&a));
        assert!(!set.insert_and_test(&b));
    }
}
