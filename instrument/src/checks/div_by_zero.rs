use llvm_sys::core::*;
use llvm_sys::prelude::*;
use llvm_sys::LLVMIntPredicate;
use llvm_sys::LLVMOpcode;

use crate::block_splitter::BlockSplitter;
use crate::checks::{build_string_arg, InstrumentOutcome, ReportFunctions};

/// Instruments `sdiv`/`udiv`/`srem`/`urem`: before the division, splits the
/// block and checks the divisor for zero (§4.1 "Division by zero"). The
/// original division is left exactly where it was — only a guard is added
/// ahead of it.
///
/// Safety: `inst` must be a live division/remainder instruction in `block`,
/// which must belong to `function`.
pub unsafe fn instrument(
    splitter: &BlockSplitter,
    function: LLVMValueRef,
    block: LLVMBasicBlockRef,
    inst: LLVMValueRef,
    report_fns: &ReportFunctions,
) -> InstrumentOutcome {
    let divisor = LLVMGetOperand(inst, 1);
    let operand_ty = LLVMTypeOf(divisor);
    if LLVMGetTypeKind(operand_ty) != llvm_sys::LLVMTypeKind::LLVMIntegerTypeKind {
        return InstrumentOutcome::Skipped;
    }

    let op_tag = match LLVMGetInstructionOpcode(inst) {
        LLVMOpcode::LLVMSDiv => "sdiv",
        LLVMOpcode::LLVMUDiv => "udiv",
        LLVMOpcode::LLVMSRem => "srem",
        LLVMOpcode::LLVMURem => "urem",
        _ => return InstrumentOutcome::NotApplicable,
    };

    let context = splitter.context();
    let module = LLVMGetGlobalParent(function);
    let builder = splitter.builder();

    LLVMPositionBuilderBefore(builder, inst);
    let zero = LLVMConstInt(operand_ty, 0, 0);
    let cmp_name = std::ffi::CString::new("t2p.div.iszero").unwrap();
    let predicate = LLVMBuildICmp(builder, LLVMIntPredicate::LLVMIntEQ, divisor, zero, cmp_name.as_ptr());

    // `inst` itself stays in `block`; we split right before it so the
    // divide-by-zero guard runs strictly ahead of the division.
    let continuation = splitter.split_before(function, inst, "t2p.div.cont");
    let then_block = splitter.insert_guard(function, block, continuation, predicate, "t2p.div.then");

    LLVMPositionBuilderAtEnd(builder, then_block);
    let (op_ptr, op_len) = build_string_arg(context, module, builder, op_tag);
    let mut args = [LLVMConstNull(LLVMPointerTypeInContext(context, 0)), op_ptr, op_len];
    let call_name = std::ffi::CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.div_by_zero),
        report_fns.div_by_zero,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );
    splitter.close_then_block(then_block, continuation);

    InstrumentOutcome::Instrumented
}
