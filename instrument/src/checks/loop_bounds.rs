use std::collections::HashMap;
use std::ffi::CString;

use llvm_sys::core::*;
use llvm_sys::prelude::*;

use crate::block_splitter::BlockSplitter;
use crate::checks::ReportFunctions;

/// Ticks a per-loop counter at the top of every loop header (§4.1 "Loop
/// bound exceeded" — the runtime owns the threshold, this pass only needs to
/// identify headers and report one tick per execution). Runs once per block
/// regardless of what else in the block got instrumented, since a block can
/// be a loop header independent of its instruction mix.
///
/// A block is treated as a loop header when it has a predecessor that
/// appears at or after it in the function's layout order — a back edge.
/// This is a conservative approximation of dominator-based loop detection,
/// sufficient for IR lowered from structured source.
///
/// Safety: `block` must belong to `function`.
pub unsafe fn instrument_block(
    splitter: &BlockSplitter,
    function: LLVMValueRef,
    block: LLVMBasicBlockRef,
    report_fns: &ReportFunctions,
    enabled: bool,
) -> bool {
    if !enabled || !is_loop_header(function, block) {
        return false;
    }

    let terminator = LLVMGetBasicBlockTerminator(block);
    if terminator.is_null() {
        return false;
    }

    let context = splitter.context();
    let builder = splitter.builder();
    LLVMPositionBuilderBefore(builder, terminator);

    let i64_ty = LLVMInt64TypeInContext(context);
    let loop_id = LLVMConstInt(i64_ty, block as usize as u64, 0);
    let mut args = [LLVMConstNull(LLVMPointerTypeInContext(context, 0)), loop_id];
    let call_name = CString::new("").unwrap();
    LLVMBuildCall2(
        builder,
        LLVMGlobalGetValueType(report_fns.loop_tick),
        report_fns.loop_tick,
        args.as_mut_ptr(),
        args.len() as u32,
        call_name.as_ptr(),
    );

    true
}

unsafe fn is_loop_header(function: LLVMValueRef, block: LLVMBasicBlockRef) -> bool {
    let mut index_of = HashMap::new();
    let mut cursor = LLVMGetFirstBasicBlock(function);
    let mut idx = 0usize;
    let mut target_idx = None;
    while !cursor.is_null() {
        index_of.insert(cursor, idx);
        if cursor == block {
            target_idx = Some(idx);
        }
        idx += 1;
        cursor = LLVMGetNextBasicBlock(cursor);
    }
    let target_idx = match target_idx {
        Some(i) => i,
        None => return false,
    };

    let block_value = LLVMBasicBlockAsValue(block);
    let mut use_iter = LLVMGetFirstUse(block_value);
    while !use_iter.is_null() {
        let user = LLVMGetUser(use_iter);
        let parent = LLVMGetInstructionParent(user);
        if let Some(&pred_idx) = index_of.get(&parent) {
            if pred_idx >= target_idx {
                return true;
            }
        }
        use_iter = LLVMGetNextUse(use_iter);
    }
    false
}
