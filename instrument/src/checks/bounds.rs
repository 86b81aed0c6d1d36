use llvm_sys::core::*;
use llvm_sys::prelude::*;
use llvm_sys::LLVMIntPredicate;

use crate::block_splitter::BlockSplitter;
use crate::checks::{InstrumentOutcome, ReportFunctions};

/// Instruments an element-pointer computation with two or more indices
/// (§4.1 "Memory bounds"). Struct field selection (a single index) is not a
/// candidate — this only fires for array/pointer-arithmetic GEPs.
///
/// Safety: `inst` must be a live `getelementptr` instruction in `block`,
/// which must belong to `function`.
pub unsafe fn instrument(
    splitter: &BlockSplitter,
    function: LLVMValueRef,
    block: LLVMBasicBlockRef,
    inst: LLVMValueRef,
    report_fns: &ReportFunctions,
) -> InstrumentOutcome {
    let num_operands = LLVMGetNumOperands(inst);
    let num_indices = num_operands - 1;
    if num_indices < 2 {
        return InstrumentOutcome::NotApplicable;
    }

    let base_ptr = LLVMGetOperand(inst, 0);
    let last_index = LLVMGetOperand(inst, (num_operands - 1) as u32);
    let index_ty = LLVMTypeOf(last_index);
    if LLVMGetTypeKind(index_ty) != llvm_sys::LLVMTypeKind::LLVMIntegerTypeKind {
        return InstrumentOutcome::Skipped;
    }

    let context = splitter.context();
    let builder = splitter.builder();
    let i64_ty = LLVMInt64TypeInContext(context);

    LLVMPositionBuilderBefore(builder, inst);
    let index_sext_name = std::ffi::CString::new("t2p.bounds.index").unwrap();
    let index64 = if LLVMGetIntTypeWidth(index_ty) == 64 {
        last_index
    } else {
        LLVMBuildSExt(builder, last_index, i64_ty, index_sext_name.as_ptr())
    };
    let zero = LLVMConstInt(i64_ty, 0, 0);
    let cmp_name = std::ffi::CString::new("t2p.bounds.negative").unwrap();
    let predicate = LLVMBuildICmp(builder, LLVMIntPredicate::LLVMIntSLT, index64, zero, cmp_name.as_ptr());

    let continuation = splitter.split_before(function, inst, "t2p.bounds.cont");
    let then_block = splitter.insert_guard(function, block, continuation, predicate, "t2p.bounds.then");

    LLVMPositionBuilderAtEnd(builder, then_block);
    let ptrtoint_name = std::ffi::CString::new("t2p.bounds.base").unwrap();
    let base_as_int = LLVMBuildPtrToInt(builder, base_ptr, i64_ty, ptrtoint_name.as_ptr());

    let mut args = [
        LLVMConstNull(LLVMPointerTypeInContext(context, 0)),
        base_as_int,
        index64,
        LLVMConstInt(i64_ty, 0, 0),
    ];
    let call_name = std::ffi::CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.bounds_violation),
        report_fns.bounds_violation,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );
    splitter.close_then_block(then_block, continuation);

    InstrumentOutcome::Instrumented
}
