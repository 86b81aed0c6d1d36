pub mod arith_overflow;
pub mod bounds;
pub mod div_by_zero;
pub mod loop_bounds;
pub mod pure_consistency;
pub mod sign_conversion;
pub mod unreachable;

use std::ffi::CString;

use llvm_sys::core::*;
use llvm_sys::prelude::*;

/// What happened when an instrumenter looked at one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentOutcome {
    Instrumented,
    /// The instruction matched this kind's opcode but the operand shape
    /// couldn't be expressed (§4.1 "Failure semantics" — skip silently,
    /// never abort).
    Skipped,
    NotApplicable,
}

/// Declarations of the runtime's `extern "C"` report callbacks
/// (`trace2pass-runtime`'s `callbacks.rs`), one per [`trace2pass_common::CheckKind`].
/// Declared once per module and reused by every per-kind instrumenter.
pub struct ReportFunctions {
    pub arith_overflow: LLVMValueRef,
    pub shift_overflow: LLVMValueRef,
    pub unreachable_executed: LLVMValueRef,
    pub bounds_violation: LLVMValueRef,
    pub sign_conversion: LLVMValueRef,
    pub div_by_zero: LLVMValueRef,
    pub pure_inconsistency: LLVMValueRef,
    pub loop_tick: LLVMValueRef,
}

impl ReportFunctions {
    /// Declares every report callback as an external function in `module`
    /// if it isn't already present, matching the exact C ABI the runtime
    /// exposes. Safe to call once per module; repeat calls reuse the
    /// existing declarations by name.
    ///
    /// Safety: `module` and `context` must be a matched, live module/context
    /// pair.
    pub unsafe fn declare_in_module(module: LLVMModuleRef, context: LLVMContextRef) -> Self {
        let void = LLVMVoidTypeInContext(context);
        let i8p = LLVMPointerTypeInContext(context, 0);
        let i64_ty = LLVMInt64TypeInContext(context);
        let i32_ty = LLVMInt32TypeInContext(context);
        let i1 = LLVMInt1TypeInContext(context);
        let isize_ty = i64_ty;

        let declare = |name: &str, params: &mut [LLVMTypeRef]| -> LLVMValueRef {
            let c_name = CString::new(name).unwrap();
            let existing = LLVMGetNamedFunction(module, c_name.as_ptr());
            if !existing.is_null() {
                return existing;
            }
            let fn_ty = LLVMFunctionType(void, params.as_mut_ptr(), params.len() as u32, 0);
            LLVMAddFunction(module, c_name.as_ptr(), fn_ty)
        };

        Self {
            arith_overflow: declare(
                "trace2pass_report_arith_overflow",
                &mut [i8p, i8p, isize_ty, i64_ty, i64_ty],
            ),
            shift_overflow: declare(
                "trace2pass_report_shift_overflow",
                &mut [i8p, i64_ty, i64_ty, i32_ty],
            ),
            unreachable_executed: declare("trace2pass_report_unreachable_executed", &mut [i8p]),
            bounds_violation: declare(
                "trace2pass_report_bounds_violation",
                &mut [i8p, i64_ty, i64_ty, i64_ty],
            ),
            sign_conversion: declare(
                "trace2pass_report_sign_conversion",
                &mut [i8p, i64_ty, i64_ty, i32_ty, i32_ty],
            ),
            div_by_zero: declare("trace2pass_report_div_by_zero", &mut [i8p, i8p, isize_ty]),
            pure_inconsistency: declare(
                "trace2pass_report_pure_inconsistency",
                &mut [i8p, i8p, isize_ty, i64_ty, i1, i64_ty, i64_ty],
            ),
            loop_tick: declare("trace2pass_report_loop_tick", &mut [i8p, i64_ty]),
        }
    }
}

/// Builds a private global string constant and returns a pointer to its
/// first byte plus its byte length, the `(*const u8, usize)` shape every
/// string-carrying callback expects.
///
/// Safety: `builder` must be positioned in a live basic block.
pub(crate) unsafe fn build_string_arg(
    context: LLVMContextRef,
    module: LLVMModuleRef,
    builder: LLVMBuilderRef,
    text: &str,
) -> (LLVMValueRef, LLVMValueRef) {
    let i64_ty = LLVMInt64TypeInContext(context);
    let c_text = CString::new(text).unwrap_or_else(|_| CString::new("?").unwrap());
    let name = CString::new("t2p.str").unwrap();
    let global = LLVMAddGlobal(
        module,
        LLVMArrayType2(LLVMInt8TypeInContext(context), text.len() as u64),
        name.as_ptr(),
    );
    let initializer = LLVMConstStringInContext2(context, c_text.as_ptr(), text.len(), 1);
    LLVMSetInitializer(global, initializer);
    LLVMSetGlobalConstant(global, 1);
    let _ = builder;
    (global, LLVMConstInt(i64_ty, text.len() as u64, 0))
}
