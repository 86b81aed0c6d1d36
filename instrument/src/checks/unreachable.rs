use llvm_sys::core::*;
use llvm_sys::prelude::*;

use crate::block_splitter::BlockSplitter;
use crate::checks::{InstrumentOutcome, ReportFunctions};

/// Inserts a report call immediately before an `unreachable` terminator
/// (§4.1 "Unreachable execution"). The terminator itself is left in place —
/// only a call is spliced ahead of it, no new block is needed.
///
/// Safety: `inst` must be a live `unreachable` terminator in `block`.
pub unsafe fn instrument(
    splitter: &BlockSplitter,
    _function: LLVMValueRef,
    _block: LLVMBasicBlockRef,
    inst: LLVMValueRef,
    report_fns: &ReportFunctions,
) -> InstrumentOutcome {
    let context = splitter.context();
    let builder = splitter.builder();

    LLVMPositionBuilderBefore(builder, inst);
    let mut args = [LLVMConstNull(LLVMPointerTypeInContext(context, 0))];
    let call_name = std::ffi::CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.unreachable_executed),
        report_fns.unreachable_executed,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );

    InstrumentOutcome::Instrumented
}
