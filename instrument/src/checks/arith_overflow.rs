use llvm_sys::core::*;
use llvm_sys::prelude::*;

use crate::block_splitter::BlockSplitter;
use crate::checks::{build_string_arg, InstrumentOutcome, ReportFunctions};

/// Instruments a single `add`/`sub`/`mul` binary operator (§4.1 "Arithmetic
/// overflow"). Selects the signed or unsigned overflow intrinsic by
/// inspecting the operator's `nsw`/`nuw` flags, and replaces the plain
/// operator with the value-equivalent result extracted from the intrinsic
/// call so defined results are bit-for-bit unchanged.
///
/// Safety: `inst` must be a live `add`/`sub`/`mul` instruction in `block`,
/// which must belong to `function`.
pub unsafe fn instrument(
    splitter: &BlockSplitter,
    function: LLVMValueRef,
    block: LLVMBasicBlockRef,
    inst: LLVMValueRef,
    report_fns: &ReportFunctions,
) -> InstrumentOutcome {
    let operand_ty = LLVMTypeOf(LLVMGetOperand(inst, 0));
    if LLVMGetTypeKind(operand_ty) != llvm_sys::LLVMTypeKind::LLVMIntegerTypeKind {
        return InstrumentOutcome::Skipped;
    }

    // §4.1: select signed vs. unsigned overflow intrinsic from the
    // operator's own nsw/nuw flags rather than guessing from operand types.
    let use_signed = LLVMGetNSW(inst) != 0 || LLVMGetNUW(inst) == 0;
    let lhs = LLVMGetOperand(inst, 0);
    let rhs = LLVMGetOperand(inst, 1);

    let context = splitter.context();
    let module = LLVMGetGlobalParent(function);
    let builder = splitter.builder();

    let intrinsic_name = overflow_intrinsic_name(inst, use_signed);
    let Some(intrinsic_name) = intrinsic_name else {
        return InstrumentOutcome::Skipped;
    };

    LLVMPositionBuilderBefore(builder, inst);
    let struct_ty = {
        let int_ty = operand_ty;
        let i1 = LLVMInt1TypeInContext(context);
        let mut elems = [int_ty, i1];
        LLVMStructTypeInContext(context, elems.as_mut_ptr(), elems.len() as u32, 0)
    };
    let decl_name = std::ffi::CString::new(intrinsic_name.clone()).unwrap();
    let callee = {
        let existing = LLVMGetNamedFunction(module, decl_name.as_ptr());
        if !existing.is_null() {
            existing
        } else {
            let mut params = [operand_ty, operand_ty];
            let fn_ty = LLVMFunctionType(struct_ty, params.as_mut_ptr(), params.len() as u32, 0);
            LLVMAddFunction(module, decl_name.as_ptr(), fn_ty)
        }
    };
    let mut call_args = [lhs, rhs];
    let call_name = std::ffi::CString::new("t2p.ovf").unwrap();
    let call = LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(callee),
        callee,
        call_args.as_mut_ptr(),
        call_args.len() as u32,
        call_name.as_ptr(),
    );

    let result_name = std::ffi::CString::new("t2p.ovf.result").unwrap();
    let overflowed_name = std::ffi::CString::new("t2p.ovf.flag").unwrap();
    let result = LLVMBuildExtractValue(builder, call, 0, result_name.as_ptr());
    let overflowed = LLVMBuildExtractValue(builder, call, 1, overflowed_name.as_ptr());

    // Replace every use of the original operator with the intrinsic's
    // value-equivalent result, then remove the original operator — this is
    // the "replace, never remove an observable effect" carve-out §3 grants.
    LLVMReplaceAllUsesWith(inst, result);
    LLVMInstructionRemoveFromParent(inst);

    let continuation = splitter.split_before(function, LLVMGetNextInstruction(result), "t2p.arith.cont");
    let then_block = splitter.insert_guard(function, block, continuation, overflowed, "t2p.arith.then");

    let (expr_ptr, expr_len) = build_string_arg(context, module, builder, &intrinsic_name);
    let lhs64 = widen_to_i64(builder, lhs, context);
    let rhs64 = widen_to_i64(builder, rhs, context);

    LLVMPositionBuilderAtEnd(builder, then_block);
    let mut args = [
        LLVMConstNull(LLVMPointerTypeInContext(context, 0)),
        expr_ptr,
        expr_len,
        lhs64,
        rhs64,
    ];
    let call_name = std::ffi::CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.arith_overflow),
        report_fns.arith_overflow,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );
    splitter.close_then_block(then_block, continuation);

    InstrumentOutcome::Instrumented
}

unsafe fn overflow_intrinsic_name(inst: LLVMValueRef, use_signed: bool) -> Option<String> {
    let opcode = LLVMGetInstructionOpcode(inst);
    let op = match opcode {
        llvm_sys::LLVMOpcode::LLVMAdd => "add",
        llvm_sys::LLVMOpcode::LLVMSub => "sub",
        llvm_sys::LLVMOpcode::LLVMMul => "mul",
        _ => return None,
    };
    let sign = if use_signed { "s" } else { "u" };
    let ty = LLVMTypeOf(LLVMGetOperand(inst, 0));
    let width = LLVMGetIntTypeWidth(ty);
    Some(format!("llvm.{sign}{op}.with.overflow.i{width}"))
}

unsafe fn widen_to_i64(builder: LLVMBuilderRef, value: LLVMValueRef, context: LLVMContextRef) -> LLVMValueRef {
    let i64_ty = LLVMInt64TypeInContext(context);
    let name = std::ffi::CString::new("t2p.widen").unwrap();
    let width = LLVMGetIntTypeWidth(LLVMTypeOf(value));
    if width == 64 {
        value
    } else {
        LLVMBuildSExt(builder, value, i64_ty, name.as_ptr())
    }
}
