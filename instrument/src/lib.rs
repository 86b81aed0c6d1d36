//! Rewrites LLVM IR to insert the runtime's anomaly-detection callbacks
//! (§4.1). The rewriter walks every defined function in a module, skipping
//! declarations and the runtime's own namespace, and dispatches each
//! instruction to a per-kind instrumenter gated by the active
//! [`InstrumentMode`].

pub mod block_splitter;
pub mod checks;
pub mod error;
pub mod mode;
pub mod rewriter;

use std::ffi::{CStr, CString};

use llvm_sys::core::*;
use llvm_sys::prelude::*;

pub use error::InstrumentError;
pub use mode::InstrumentMode;
pub use rewriter::FunctionRewriter;

/// Parses textual LLVM IR into a module owned by `context`.
///
/// Safety: `context` must outlive the returned module.
pub unsafe fn parse_module(context: LLVMContextRef, ir: &str, module_name: &str) -> Result<LLVMModuleRef, InstrumentError> {
    let buffer_name = CString::new(module_name).unwrap_or_else(|_| CString::new("module").unwrap());
    let buffer = LLVMCreateMemoryBufferWithMemoryRangeCopy(ir.as_ptr() as *const i8, ir.len(), buffer_name.as_ptr());

    let mut module = std::ptr::null_mut();
    let mut error_msg = std::ptr::null_mut();
    let failed = llvm_sys::ir_reader::LLVMParseIRInContext(context, buffer, &mut module, &mut error_msg);
    if failed != 0 {
        let message = if error_msg.is_null() {
            "unknown parse error".to_string()
        } else {
            let msg = CStr::from_ptr(error_msg).to_string_lossy().into_owned();
            LLVMDisposeMessage(error_msg);
            msg
        };
        return Err(InstrumentError::ParseFailed(message));
    }
    Ok(module)
}

/// Rewrites every defined function in `module` under `mode`. Returns the
/// total number of instrumentation sites inserted across the module.
///
/// Safety: `module` must have been created against `context`.
pub unsafe fn rewrite_module(context: LLVMContextRef, module: LLVMModuleRef, mode: InstrumentMode) -> u64 {
    let report_fns = checks::ReportFunctions::declare_in_module(module, context);
    let mut rewriter = FunctionRewriter::new(context, mode, report_fns);

    let mut total = 0u64;
    let mut function = LLVMGetFirstFunction(module);
    while !function.is_null() {
        let next = LLVMGetNextFunction(function);
        rewriter.rewrite_function(function);
        total += rewriter.sites_instrumented();
        function = next;
    }
    total
}

/// Verifies `module` with LLVM's built-in verifier, surfacing its diagnostic
/// text on failure instead of letting `LLVMVerifyModule`'s default action
/// print to stderr and abort the process.
///
/// Safety: `module` must be a live module.
pub unsafe fn verify_module(module: LLVMModuleRef) -> Result<(), InstrumentError> {
    let mut error_msg = std::ptr::null_mut();
    let failed = llvm_sys::analysis::LLVMVerifyModule(
        module,
        llvm_sys::analysis::LLVMVerifierFailureAction::LLVMReturnStatusAction,
        &mut error_msg,
    );
    if failed != 0 {
        let message = if error_msg.is_null() {
            "unknown verification error".to_string()
        } else {
            CStr::from_ptr(error_msg).to_string_lossy().into_owned()
        };
        if !error_msg.is_null() {
            LLVMDisposeMessage(error_msg);
        }
        return Err(InstrumentError::VerificationFailed(message));
    }
    Ok(())
}

/// Renders `module` back to textual IR.
///
/// Safety: `module` must be a live module.
pub unsafe fn print_module(module: LLVMModuleRef) -> String {
    let c_str = LLVMPrintModuleToString(module);
    let text = CStr::from_ptr(c_str).to_string_lossy().into_owned();
    LLVMDisposeMessage(c_str);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_FN_IR: &str = r#"
define i32 @add_two(i32 %a, i32 %b) {
entry:
  %sum = add nsw i32 %a, %b
  ret i32 %sum
}
"#;

    unsafe fn with_context<F: FnOnce(LLVMContextRef)>(f: F) {
        let context = LLVMContextCreate();
        f(context);
        LLVMContextDispose(context);
    }

    #[test]
    fn parses_valid_ir() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, ADD_FN_IR, "t").expect("parses");
                assert!(!module.is_null());
                LLVMDisposeModule(module);
            });
        }
    }

    #[test]
    fn rejects_malformed_ir() {
        unsafe {
            with_context(|context| {
                let result = parse_module(context, "define i32 @broken(", "t");
                assert!(result.is_err());
            });
        }
    }

    #[test]
    fn rewriting_an_overflow_candidate_instruments_at_least_one_site() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, ADD_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert!(sites >= 1);
                verify_module(module).expect("rewritten module stays well-formed");
                LLVMDisposeModule(module);
            });
        }
    }

    #[test]
    fn production_mode_still_instruments_arith_overflow() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, ADD_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::Production);
                assert!(sites >= 1);
                LLVMDisposeModule(module);
            });
        }
    }

    const DIV_FN_IR: &str = r#"
define i32 @divide(i32 %a, i32 %b) {
entry:
  %q = sdiv i32 %a, %b
  ret i32 %q
}
"#;

    #[test]
    fn division_is_instrumented_and_stays_verifiable() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, DIV_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert!(sites >= 1);
                verify_module(module).expect("rewritten module stays well-formed");
                LLVMDisposeModule(module);
            });
        }
    }

    const GEP_FN_IR: &str = r#"
define i32 @index(ptr %base, i64 %row, i64 %col) {
entry:
  %elem = getelementptr i32, ptr %base, i64 %row, i64 %col
  %v = load i32, ptr %elem
  ret i32 %v
}
"#;

    #[test]
    fn multi_index_gep_is_instrumented() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, GEP_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert!(sites >= 1);
                verify_module(module).expect("rewritten module stays well-formed");
                LLVMDisposeModule(module);
            });
        }
    }

    const SHL_FN_IR: &str = r#"
define i32 @shift(i32 %a, i32 %amount) {
entry:
  %s = shl i32 %a, %amount
  ret i32 %s
}
"#;

    #[test]
    fn shift_is_instrumented() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, SHL_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert!(sites >= 1);
                verify_module(module).expect("rewritten module stays well-formed");
                LLVMDisposeModule(module);
            });
        }
    }

    const ZEXT_FN_IR: &str = r#"
define i32 @widen(i8 %narrow) {
entry:
  %wide = zext i8 %narrow to i32
  ret i32 %wide
}
"#;

    #[test]
    fn narrow_to_wide_zext_is_instrumented() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, ZEXT_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert!(sites >= 1);
                verify_module(module).expect("rewritten module stays well-formed");
                LLVMDisposeModule(module);
            });
        }
    }

    const UNREACHABLE_FN_IR: &str = r#"
define i32 @dead(i32 %a) {
entry:
  unreachable
}
"#;

    #[test]
    fn unreachable_terminator_is_instrumented() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, UNREACHABLE_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert!(sites >= 1);
                verify_module(module).expect("rewritten module stays well-formed");
                LLVMDisposeModule(module);
            });
        }
    }

    const LOOP_FN_IR: &str = r#"
define i32 @count_to(i32 %n) {
entry:
  br label %loop
loop:
  %i = phi i32 [ 0, %entry ], [ %i.next, %loop ]
  %i.next = add i32 %i, 1
  %done = icmp sge i32 %i.next, %n
  br i1 %done, label %exit, label %loop
exit:
  ret i32 %i.next
}
"#;

    #[test]
    fn loop_header_is_ticked() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, LOOP_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert!(sites >= 1);
                verify_module(module).expect("rewritten module stays well-formed");
                LLVMDisposeModule(module);
            });
        }
    }

    const RUNTIME_FN_IR: &str = r#"
define void @trace2pass_internal_helper(i32 %a, i32 %b) {
entry:
  %sum = add i32 %a, %b
  ret void
}
"#;

    #[test]
    fn runtime_namespace_functions_are_never_rewritten() {
        unsafe {
            with_context(|context| {
                let module = parse_module(context, RUNTIME_FN_IR, "t").expect("parses");
                let sites = rewrite_module(context, module, InstrumentMode::AllChecks);
                assert_eq!(sites, 0);
                LLVMDisposeModule(module);
            });
        }
    }
}
