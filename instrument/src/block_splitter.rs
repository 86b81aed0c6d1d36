use std::ffi::CString;

use llvm_sys::core::*;
use llvm_sys::prelude::*;

/// The *only* sanctioned way to introduce a conditional check into a block
/// (§4.1 "CFG manipulation discipline"). Every per-kind instrumenter routes
/// through this rather than splicing blocks by hand, so the CFGs later
/// optimization passes see are always one of a small number of shapes.
pub struct BlockSplitter {
    context: LLVMContextRef,
    builder: LLVMBuilderRef,
}

impl BlockSplitter {
    pub fn new(context: LLVMContextRef) -> Self {
        let builder = unsafe { LLVMCreateBuilderInContext(context) };
        Self { context, builder }
    }

    /// Splits `block` immediately before `split_point`, moving `split_point`
    /// and every instruction after it into a fresh "continuation" block.
    /// Returns the continuation so callers can redirect control flow into
    /// it once they've inserted their guard.
    ///
    /// Safety: `split_point` must be an instruction belonging to `block`,
    /// and `function` must be the function that owns `block`.
    pub unsafe fn split_before(
        &self,
        function: LLVMValueRef,
        split_point: LLVMValueRef,
        name: &str,
    ) -> LLVMBasicBlockRef {
        let c_name = CString::new(name).unwrap_or_else(|_| CString::new("t2p.cont").unwrap());
        let continuation = LLVMAppendBasicBlockInContext(self.context, function, c_name.as_ptr());

        LLVMPositionBuilderAtEnd(self.builder, continuation);
        let mut inst = split_point;
        while !inst.is_null() {
            let next = LLVMGetNextInstruction(inst);
            LLVMInstructionRemoveFromParent(inst);
            LLVMInsertIntoBuilder(self.builder, inst);
            inst = next;
        }
        continuation
    }

    /// Inserts a predicate-guarded "then" block between `origin` and
    /// `continuation`: `origin` branches to `then_block` when `predicate` is
    /// true, otherwise straight to `continuation`; `then_block` itself
    /// unconditionally falls through to `continuation` once the caller has
    /// populated it with the report call.
    ///
    /// Safety: `origin` must not already have a terminator, and
    /// `continuation` must be a block in the same function as `origin`.
    pub unsafe fn insert_guard(
        &self,
        function: LLVMValueRef,
        origin: LLVMBasicBlockRef,
        continuation: LLVMBasicBlockRef,
        predicate: LLVMValueRef,
        then_name: &str,
    ) -> LLVMBasicBlockRef {
        let c_name = CString::new(then_name).unwrap_or_else(|_| CString::new("t2p.then").unwrap());
        let then_block = LLVMInsertBasicBlockInContext(self.context, continuation, c_name.as_ptr());
        let _ = function;

        LLVMPositionBuilderAtEnd(self.builder, origin);
        LLVMBuildCondBr(self.builder, predicate, then_block, continuation);

        LLVMPositionBuilderAtEnd(self.builder, then_block);
        then_block
    }

    /// Finishes a "then" block by branching it into `continuation`. Called
    /// after the per-kind instrumenter has appended its report call.
    pub unsafe fn close_then_block(&self, then_block: LLVMBasicBlockRef, continuation: LLVMBasicBlockRef) {
        LLVMPositionBuilderAtEnd(self.builder, then_block);
        LLVMBuildBr(self.builder, continuation);
    }

    pub fn builder(&self) -> LLVMBuilderRef {
        self.builder
    }

    pub fn context(&self) -> LLVMContextRef {
        self.context
    }
}

impl Drop for BlockSplitter {
    fn drop(&mut self) {
        unsafe { LLVMDisposeBuilder(self.builder) };
    }
}
