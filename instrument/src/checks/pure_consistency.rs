use std::ffi::CString;

use llvm_sys::core::*;
use llvm_sys::prelude::*;

use crate::block_splitter::BlockSplitter;
use crate::checks::{build_string_arg, InstrumentOutcome, ReportFunctions};
use crate::rewriter::RUNTIME_NAMESPACE_PREFIX;

/// Instruments a direct call to a function LLVM has marked `readnone`
/// (§4.1 "Pure-function inconsistency" — the same inputs must always produce
/// the same output). Indirect calls, intrinsics, and the runtime's own
/// callbacks are never candidates.
///
/// Safety: `inst` must be a live `call` instruction in `block`.
pub unsafe fn instrument(
    splitter: &BlockSplitter,
    function: LLVMValueRef,
    _block: LLVMBasicBlockRef,
    inst: LLVMValueRef,
    report_fns: &ReportFunctions,
) -> InstrumentOutcome {
    let callee = LLVMGetCalledValue(inst);
    if callee.is_null() || LLVMIsAFunction(callee).is_null() {
        return InstrumentOutcome::NotApplicable;
    }

    let mut len = 0usize;
    let name_ptr = LLVMGetValueName2(callee, &mut len);
    if name_ptr.is_null() {
        return InstrumentOutcome::NotApplicable;
    }
    let callee_name = std::slice::from_utf8(std::slice::from_raw_parts(name_ptr as *const u8, len)).unwrap_or("");
    if callee_name.starts_with("llvm.") || callee_name.starts_with(RUNTIME_NAMESPACE_PREFIX) {
        return InstrumentOutcome::NotApplicable;
    }
    if !is_readnone(callee) {
        return InstrumentOutcome::NotApplicable;
    }

    let return_ty = LLVMTypeOf(inst);
    if LLVMGetTypeKind(return_ty) != llvm_sys::LLVMTypeKind::LLVMIntegerTypeKind {
        return InstrumentOutcome::Skipped;
    }

    let num_args = LLVMGetNumArgOperands(inst);
    if num_args > 2 {
        return InstrumentOutcome::Skipped;
    }
    let mut arg_values = Vec::with_capacity(num_args as usize);
    for i in 0..num_args {
        let arg = LLVMGetOperand(inst, i);
        let arg_ty = LLVMTypeOf(arg);
        if LLVMGetTypeKind(arg_ty) != llvm_sys::LLVMTypeKind::LLVMIntegerTypeKind {
            return InstrumentOutcome::Skipped;
        }
        arg_values.push(arg);
    }

    let context = splitter.context();
    let module = LLVMGetGlobalParent(function);
    let builder = splitter.builder();
    let i64_ty = LLVMInt64TypeInContext(context);
    let i1_ty = LLVMInt1TypeInContext(context);

    LLVMPositionBuilderAfter(builder, inst);

    let arg1 = arg_values
        .first()
        .map(|v| widen_to_i64(builder, *v, i64_ty, "t2p.pure.arg1"))
        .unwrap_or_else(|| LLVMConstInt(i64_ty, 0, 0));
    let arg2_present = LLVMConstInt(i1_ty, (arg_values.len() >= 2) as u64, 0);
    let arg2 = arg_values
        .get(1)
        .map(|v| widen_to_i64(builder, *v, i64_ty, "t2p.pure.arg2"))
        .unwrap_or_else(|| LLVMConstInt(i64_ty, 0, 0));
    let observed = widen_to_i64(builder, inst, i64_ty, "t2p.pure.observed");

    let (name_ptr_arg, name_len_arg) = build_string_arg(context, module, builder, callee_name);

    let mut args = [
        LLVMConstNull(LLVMPointerTypeInContext(context, 0)),
        name_ptr_arg,
        name_len_arg,
        arg1,
        arg2_present,
        arg2,
        observed,
    ];
    let call_name = CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.pure_inconsistency),
        report_fns.pure_inconsistency,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );

    InstrumentOutcome::Instrumented
}

unsafe fn is_readnone(function: LLVMValueRef) -> bool {
    let name = CString::new("readnone").unwrap();
    let kind_id = LLVMGetEnumAttributeKindForName(name.as_ptr(), 8);
    if kind_id == 0 {
        return false;
    }
    let attr = LLVMGetEnumAttributeAtIndex(function, llvm_sys::LLVMAttributeFunctionIndex, kind_id);
    !attr.is_null()
}

unsafe fn widen_to_i64(builder: LLVMBuilderRef, value: LLVMValueRef, i64_ty: LLVMTypeRef, name: &str) -> LLVMValueRef {
    if LLVMGetIntTypeWidth(LLVMTypeOf(value)) == 64 {
        return value;
    }
    let c_name = CString::new(name).unwrap();
    LLVMBuildSExt(builder, value, i64_ty, c_name.as_ptr())
}
