//! `extern "C"` entry points the instrumentation engine's inserted calls
//! target. Each function corresponds to exactly one [`trace2pass_common::CheckKind`]
//! (§4.1's "one callback per kind" table) and follows the same shape:
//! build a [`CheckDetails`], run it through sampling/dedup, and hand the
//! finished report to the emitter — never panicking, never blocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use trace2pass_common::{AnomalyReportBuilder, CheckDetails, Fingerprint};

use crate::purecache;
use crate::sampling::should_sample;
use crate::state::global;
use trace2pass_common::ffi::SiteInfo;

static NEXT_PC: AtomicU64 = AtomicU64::new(1);

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn current_thread_id() -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// Routes a finished report through dedup and sampling and, if it survives
/// both, to the emitter. Called by every kind-specific entry point below.
fn report(details: CheckDetails, site: *const SiteInfo) {
    let state = global();
    if !state.config.all_checks_enabled
        && !trace2pass_common::CheckKind::PRODUCTION.contains(&details.kind())
    {
        return;
    }

    let pc = NEXT_PC.fetch_add(1, Ordering::Relaxed);
    let mut builder = AnomalyReportBuilder::new(details, pc, now_ns(), current_thread_id());
    // Safety: every caller of `report` passes through one of this module's
    // `extern "C"` entry points, each of which documents the same
    // requirement on `site` that `SiteInfo::read` does.
    if let Some(source) = unsafe { SiteInfo::read(site) } {
        builder = builder.source(source);
    }
    let report = builder.finish();

    // Sampling runs before dedup insertion: a fingerprint that loses the
    // sampling roll must never be marked as seen, or its first actually
    // reported occurrence would be dedup-blocked forever.
    if !should_sample(state.config.sample_rate) {
        return;
    }
    let fp = Fingerprint::of(&report);
    if state.dedup.insert_and_test(&fp) {
        return;
    }
    state.emitter.submit(report);
}

/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_arith_overflow(
    site: *const SiteInfo,
    expr: *const u8,
    expr_len: usize,
    lhs: i64,
    rhs: i64,
) {
    let expr = read_cstr(expr, expr_len);
    report(CheckDetails::ArithOverflow { expr, lhs, rhs }, site);
}

/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_shift_overflow(
    site: *const SiteInfo,
    value: i64,
    shift_amount: u64,
    bit_width: u32,
) {
    report(
        CheckDetails::ShiftOverflow {
            value,
            shift_amount,
            bit_width,
        },
        site,
    );
}

/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_unreachable_executed(site: *const SiteInfo) {
    report(CheckDetails::UnreachableExecuted, site);
}

/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_bounds_violation(
    site: *const SiteInfo,
    base_ptr: u64,
    offset: u64,
    size: u64,
) {
    report(
        CheckDetails::BoundsViolation {
            base_ptr,
            offset,
            size,
        },
        site,
    );
}

/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_sign_conversion(
    site: *const SiteInfo,
    original: i64,
    widened: u64,
    src_width: u32,
    dst_width: u32,
) {
    report(
        CheckDetails::SignConversion {
            original,
            widened,
            src_width,
            dst_width,
        },
        site,
    );
}

/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_div_by_zero(
    site: *const SiteInfo,
    op: *const u8,
    op_len: usize,
) {
    let op = read_cstr(op, op_len);
    report(CheckDetails::DivByZero { op }, site);
}

/// Checks `(function_name, arg1, arg2)` against the calling thread's
/// pure-function cache and reports only on disagreement — most calls return
/// silently (§4.1 "reports only on observed disagreement").
///
/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
/// `function_name` must point to `function_name_len` valid UTF-8 bytes.
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_pure_inconsistency(
    site: *const SiteInfo,
    function_name: *const u8,
    function_name_len: usize,
    arg1: i64,
    arg2_present: bool,
    arg2: i64,
    observed: i64,
) {
    let function = read_cstr(function_name, function_name_len);
    let arg2 = arg2_present.then_some(arg2);
    if let Some(cached_result) = purecache::check_and_update(&function, arg1, arg2, observed) {
        if cached_result != observed {
            report(
                CheckDetails::PureInconsistency {
                    function,
                    arg1,
                    arg2,
                    cached_result,
                    observed_result: observed,
                },
                site,
            );
        }
    }
}

/// Ticks the global counter for `loop_id` and reports exactly once when it
/// first crosses [`crate::loopcounters::THRESHOLD`].
///
/// # Safety
/// `site` must be null or a valid `SiteInfo` per [`SiteInfo::read`].
#[no_mangle]
pub unsafe extern "C" fn trace2pass_report_loop_tick(site: *const SiteInfo, loop_id: u64) {
    if let Some(iterations) = global().loop_counters.tick(loop_id) {
        report(
            CheckDetails::LoopBoundExceeded {
                iterations,
                threshold: crate::loopcounters::THRESHOLD,
            },
            site,
        );
    }
}

/// # Safety
/// `ptr` must be null or point to at least `len` valid UTF-8 bytes.
unsafe fn read_cstr(ptr: *const u8, len: usize) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let slice = std::slice::from_raw_parts(ptr, len);
    String::from_utf8_lossy(slice).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_callback_does_not_panic_with_null_site() {
        unsafe {
            trace2pass_report_unreachable_executed(std::ptr::null());
        }
    }

    #[test]
    fn pure_inconsistency_callback_does_not_panic() {
        unsafe {
            trace2pass_report_pure_inconsistency(
                std::ptr::null(),
                b"f".as_ptr(),
                1,
                1,
                false,
                0,
                10,
            );
            trace2pass_report_pure_inconsistency(
                std::ptr::null(),
                b"f".as_ptr(),
                1,
                1,
                false,
                0,
                11,
            );
        }
    }
}
