use llvm_sys::core::*;
use llvm_sys::prelude::*;
use llvm_sys::LLVMIntPredicate;

use crate::block_splitter::BlockSplitter;
use crate::checks::{InstrumentOutcome, ReportFunctions};

/// Instruments a narrow-to-wide zero extension (§4.1 "Sign conversion").
/// Only `i8`/`i16` sources widened into `i32`/`i64` are candidates; wider
/// sources and bitcasts are left untouched on purpose, to bound overhead.
///
/// Safety: `inst` must be a live `zext` instruction in `block`, which must
/// belong to `function`.
pub unsafe fn instrument(
    splitter: &BlockSplitter,
    function: LLVMValueRef,
    block: LLVMBasicBlockRef,
    inst: LLVMValueRef,
    report_fns: &ReportFunctions,
) -> InstrumentOutcome {
    let original = LLVMGetOperand(inst, 0);
    let src_ty = LLVMTypeOf(original);
    let dst_ty = LLVMTypeOf(inst);
    if LLVMGetTypeKind(src_ty) != llvm_sys::LLVMTypeKind::LLVMIntegerTypeKind {
        return InstrumentOutcome::Skipped;
    }
    let src_width = LLVMGetIntTypeWidth(src_ty);
    let dst_width = LLVMGetIntTypeWidth(dst_ty);
    if !matches!(src_width, 8 | 16) || !matches!(dst_width, 32 | 64) {
        return InstrumentOutcome::Skipped;
    }

    let context = splitter.context();
    let builder = splitter.builder();

    LLVMPositionBuilderAfter(builder, inst);
    let zero = LLVMConstInt(src_ty, 0, 0);
    let cmp_name = std::ffi::CString::new("t2p.sign.negative").unwrap();
    let predicate = LLVMBuildICmp(builder, LLVMIntPredicate::LLVMIntSLT, original, zero, cmp_name.as_ptr());

    let continuation = splitter.split_before(function, LLVMGetNextInstruction(inst), "t2p.sign.cont");
    let then_block = splitter.insert_guard(function, block, continuation, predicate, "t2p.sign.then");

    LLVMPositionBuilderAtEnd(builder, then_block);
    let i64_ty = LLVMInt64TypeInContext(context);
    let i32_ty = LLVMInt32TypeInContext(context);
    let original64_name = std::ffi::CString::new("t2p.sign.orig64").unwrap();
    let widened64_name = std::ffi::CString::new("t2p.sign.wide64").unwrap();
    let original64 = LLVMBuildSExt(builder, original, i64_ty, original64_name.as_ptr());
    let widened64 = if dst_width == 64 {
        inst
    } else {
        LLVMBuildZExt(builder, inst, i64_ty, widened64_name.as_ptr())
    };

    let mut args = [
        LLVMConstNull(LLVMPointerTypeInContext(context, 0)),
        original64,
        widened64,
        LLVMConstInt(i32_ty, src_width as u64, 0),
        LLVMConstInt(i32_ty, dst_width as u64, 0),
    ];
    let call_name = std::ffi::CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.sign_conversion),
        report_fns.sign_conversion,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );
    splitter.close_then_block(then_block, continuation);

    InstrumentOutcome::Instrumented
}
