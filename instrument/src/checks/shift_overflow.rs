use llvm_sys::core::*;
use llvm_sys::prelude::*;
use llvm_sys::LLVMIntPredicate;

use crate::block_splitter::BlockSplitter;
use crate::checks::{InstrumentOutcome, ReportFunctions};

/// Instruments a left-shift: reports when the shift amount is at least the
/// operand's bit width (§4.1 "Shift overflow is checked by comparing the
/// shift amount ... to the integer bit-width").
///
/// Safety: `inst` must be a live `shl` instruction in `block`, which must
/// belong to `function`.
pub unsafe fn instrument(
    splitter: &BlockSplitter,
    function: LLVMValueRef,
    block: LLVMBasicBlockRef,
    inst: LLVMValueRef,
    report_fns: &ReportFunctions,
) -> InstrumentOutcome {
    let value = LLVMGetOperand(inst, 0);
    let shift_amount = LLVMGetOperand(inst, 1);
    let operand_ty = LLVMTypeOf(value);
    if LLVMGetTypeKind(operand_ty) != llvm_sys::LLVMTypeKind::LLVMIntegerTypeKind {
        return InstrumentOutcome::Skipped;
    }
    let bit_width = LLVMGetIntTypeWidth(operand_ty);

    let context = splitter.context();
    let builder = splitter.builder();

    LLVMPositionBuilderBefore(builder, inst);
    let width_const = LLVMConstInt(operand_ty, bit_width as u64, 0);
    let cmp_name = std::ffi::CString::new("t2p.shift.oob").unwrap();
    let predicate = LLVMBuildICmp(builder, LLVMIntPredicate::LLVMIntUGE, shift_amount, width_const, cmp_name.as_ptr());

    let continuation = splitter.split_before(function, inst, "t2p.shift.cont");
    let then_block = splitter.insert_guard(function, block, continuation, predicate, "t2p.shift.then");

    LLVMPositionBuilderAtEnd(builder, then_block);
    let i64_ty = LLVMInt64TypeInContext(context);
    let value64 = widen_to_i64(builder, value, i64_ty);
    let shift64 = zwiden_to_i64(builder, shift_amount, i64_ty);
    let i32_ty = LLVMInt32TypeInContext(context);
    let width_arg = LLVMConstInt(i32_ty, bit_width as u64, 0);

    let mut args = [
        LLVMConstNull(LLVMPointerTypeInContext(context, 0)),
        value64,
        shift64,
        width_arg,
    ];
    let call_name = std::ffi::CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.shift_overflow),
        report_fns.shift_overflow,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );
    splitter.close_then_block(then_block, continuation);

    InstrumentOutcome::Instrumented
}

unsafe fn widen_to_i64(builder: LLVMBuilderRef, value: LLVMValueRef, i64_ty: LLVMTypeRef) -> LLVMValueRef {
    let name = std::ffi::CString::new("t2p.sext").unwrap();
    if LLVMGetIntTypeWidth(LLVMTypeOf(value)) == 64 {
        value
    } else {
        LLVMBuildSExt(builder, value, i64_ty, name.as_ptr())
    }
}

unsafe fn zwiden_to_i64(builder: LLVMBuilderRef, value: LLVMValueRef, i64_ty: LLVMTypeRef) -> LLVMValueRef {
    let name = std::ffi::CString::new("t2p.zext").unwrap();
    if LLVMGetIntTypeWidth(LLVMTypeOf(value)) == 64 {
        value
    } else {
        LLVMBuildZExt(builder, value, i64_ty, name.as_ptr())
    }
}
