use crate::error::DiagnoserError;

/// One top-level entry in a flattened optimization pipeline. Nested groups
/// (a pass manager printing "module(function(...))" style output) are kept
/// as an opaque string rather than recursively modeled — the bisector only
/// ever needs to cut the pipeline at a top-level boundary (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassEntry {
    pub name: String,
    raw: String,
}

impl PassEntry {
    fn from_raw(raw: &str) -> Self {
        let name = raw.split('(').next().unwrap_or(raw).trim().to_string();
        Self { name, raw: raw.to_string() }
    }
}

/// Parses a "print pipeline" style dump into top-level entries, splitting on
/// commas at bracket depth zero so a nested group's internal commas don't
/// fracture it (§4.6).
///
/// Rejects a pipeline whose parentheses don't balance — a negative depth
/// mid-string or a nonzero depth at end-of-string means the bisector would
/// otherwise silently split inside what was meant to be one opaque group.
pub fn parse_pipeline(text: &str) -> Result<Vec<PassEntry>, DiagnoserError> {
    let mut entries = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;

    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(DiagnoserError::InvalidPipeline(format!(
                        "unbalanced ')' at byte {i} in {text:?}"
                    )));
                }
            }
            ',' if depth == 0 => {
                let raw = text[start..i].trim();
                if !raw.is_empty() {
                    entries.push(PassEntry::from_raw(raw));
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(DiagnoserError::InvalidPipeline(format!(
            "{depth} unclosed '(' in {text:?}"
        )));
    }
    let raw = text[start..].trim();
    if !raw.is_empty() {
        entries.push(PassEntry::from_raw(raw));
    }
    Ok(entries)
}

/// Reconstructs the exact text of the first `n` top-level entries, suitable
/// for handing back to the optimizer as a truncated pipeline.
pub fn prefix_text(pipeline: &[PassEntry], n: usize) -> String {
    pipeline[..n.min(pipeline.len())]
        .iter()
        .map(|e| e.raw.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Two-valued oracle result for a candidate pipeline prefix. Unlike the
/// version bisector's oracle, a prefix probe has no meaningful "skip" or
/// "ice" outcome — the pass manager either accepts the truncated pipeline
/// and the result matches the baseline, or it doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassBisectOutcome {
    Bisected {
        culprit: String,
        index: usize,
        context_below: Vec<String>,
        context_above: Vec<String>,
    },
    /// The empty prefix already reproduces the failure — the bug predates
    /// optimization entirely.
    BaselineFails,
    /// The full pipeline passes — there is nothing to bisect.
    FullPasses,
    Error(String),
}

/// Binary search on prefix length over `pipeline` for the pass whose
/// inclusion first turns a passing prefix into a failing one (§4.6).
///
/// Mixing tool versions across the pipeline (front end, optimizer, lowerer)
/// is a caller-side defect this module has no way to detect; the oracle is
/// assumed to hold the toolchain fixed across every probe it makes.
pub fn bisect_passes<F>(pipeline: &[PassEntry], oracle: F) -> PassBisectOutcome
where
    F: Fn(usize) -> PassOutcome,
{
    let n = pipeline.len();
    if oracle(0) == PassOutcome::Fail {
        return PassBisectOutcome::BaselineFails;
    }
    if oracle(n) == PassOutcome::Pass {
        return PassBisectOutcome::FullPasses;
    }

    // invariant: oracle(lo) passes, oracle(hi) fails, lo < hi.
    let mut lo = 0usize;
    let mut hi = n;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        match oracle(mid) {
            PassOutcome::Pass => lo = mid,
            PassOutcome::Fail => hi = mid,
        }
    }

    let culprit_index = hi - 1;
    let below_start = culprit_index.saturating_sub(2);
    let above_end = (culprit_index + 3).min(n);

    PassBisectOutcome::Bisected {
        culprit: pipeline[culprit_index].name.clone(),
        index: culprit_index,
        context_below: pipeline[below_start..culprit_index].iter().map(|e| e.name.clone()).collect(),
        context_above: pipeline[(culprit_index + 1)..above_end].iter().map(|e| e.name.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_pipeline() {
        let entries = parse_pipeline("instcombine,gvn,dce").unwrap();
        assert_eq!(entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["instcombine", "gvn", "dce"]);
    }

    #[test]
    fn flattens_nested_groups_as_one_opaque_entry() {
        let entries = parse_pipeline("function(instcombine,simplifycfg),module(inline)").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "function");
        assert_eq!(entries[1].name, "module");
        assert_eq!(entries[0].raw, "function(instcombine,simplifycfg)");
    }

    #[test]
    fn prefix_text_reconstructs_exact_substring() {
        let entries = parse_pipeline("instcombine,gvn,dce").unwrap();
        assert_eq!(prefix_text(&entries, 2), "instcombine,gvn");
    }

    #[test]
    fn rejects_unclosed_group() {
        let err = parse_pipeline("function(instcombine,gvn").unwrap_err();
        assert!(matches!(err, DiagnoserError::InvalidPipeline(_)));
    }

    #[test]
    fn rejects_unopened_group() {
        let err = parse_pipeline("instcombine),gvn").unwrap_err();
        assert!(matches!(err, DiagnoserError::InvalidPipeline(_)));
    }

    fn sample_pipeline() -> Vec<PassEntry> {
        parse_pipeline("early-cse,instcombine,gvn,licm,dce").unwrap()
    }

    #[test]
    fn finds_the_culprit_pass() {
        let pipeline = sample_pipeline();
        // fails once "gvn" (index 2) is included, i.e. for any prefix length >= 3
        let outcome = bisect_passes(&pipeline, |n| if n >= 3 { PassOutcome::Fail } else { PassOutcome::Pass });
        assert_eq!(
            outcome,
            PassBisectOutcome::Bisected {
                culprit: "gvn".to_string(),
                index: 2,
                context_below: vec!["early-cse".to_string(), "instcombine".to_string()],
                context_above: vec!["licm".to_string(), "dce".to_string()],
            }
        );
    }

    #[test]
    fn empty_prefix_already_failing_is_baseline_fails() {
        let pipeline = sample_pipeline();
        let outcome = bisect_passes(&pipeline, |_| PassOutcome::Fail);
        assert_eq!(outcome, PassBisectOutcome::BaselineFails);
    }

    #[test]
    fn full_pipeline_passing_is_full_passes() {
        let pipeline = sample_pipeline();
        let outcome = bisect_passes(&pipeline, |_| PassOutcome::Pass);
        assert_eq!(outcome, PassBisectOutcome::FullPasses);
    }

    #[test]
    fn empty_pipeline_with_failing_full_run_is_baseline_fails() {
        let outcome = bisect_passes(&[], |_| PassOutcome::Fail);
        assert_eq!(outcome, PassBisectOutcome::BaselineFails);
    }
}
