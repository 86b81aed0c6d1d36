use llvm_sys::core::*;
use llvm_sys::prelude::*;
use llvm_sys::LLVMOpcode;

use crate::block_splitter::BlockSplitter;
use crate::checks;
use crate::mode::InstrumentMode;

/// Prefix reserved for runtime-library symbols. A function whose name
/// begins with this is never instrumented (§4.1 "must skip any function
/// whose name is in the runtime namespace").
pub const RUNTIME_NAMESPACE_PREFIX: &str = "trace2pass_";

/// Per-function rewrite state. Counters here are diagnostic only (rewrite
/// site counts for `tracing`), reset at the top of every
/// [`rewrite_function`](FunctionRewriter::rewrite_function) call — they must
/// never accumulate across a module (§4.1 "Counter hygiene").
pub struct FunctionRewriter {
    context: LLVMContextRef,
    mode: InstrumentMode,
    report_fns: checks::ReportFunctions,
    sites_instrumented: u64,
    sites_skipped: u64,
}

impl FunctionRewriter {
    pub fn new(context: LLVMContextRef, mode: InstrumentMode, report_fns: checks::ReportFunctions) -> Self {
        Self {
            context,
            mode,
            report_fns,
            sites_instrumented: 0,
            sites_skipped: 0,
        }
    }

    pub fn sites_instrumented(&self) -> u64 {
        self.sites_instrumented
    }

    pub fn sites_skipped(&self) -> u64 {
        self.sites_skipped
    }

    /// Rewrites `function` in place. Returns whether any modification was
    /// made (§4.1's single public contract). Idempotent: re-running against
    /// an already-instrumented function inserts no further checks, because
    /// every already-rewritten site either no longer matches an
    /// instrumenter's pattern (the overflow intrinsic has replaced the plain
    /// binary op) or is skipped as belonging to the runtime namespace.
    ///
    /// Safety: `function` must be a valid `LLVMValueRef` function belonging
    /// to a module built against `self.context`.
    pub unsafe fn rewrite_function(&mut self, function: LLVMValueRef) -> bool {
        self.sites_instrumented = 0;
        self.sites_skipped = 0;

        if LLVMIsDeclaration(function) != 0 {
            return false;
        }
        if self.is_runtime_function(function) {
            return false;
        }

        let splitter = BlockSplitter::new(self.context);
        let mut modified = false;

        // Collect blocks up front: instrumenters append new blocks as they
        // go, and we must not walk into blocks this invocation created.
        let mut block = LLVMGetFirstBasicBlock(function);
        let mut blocks = Vec::new();
        while !block.is_null() {
            blocks.push(block);
            block = LLVMGetNextBasicBlock(block);
        }

        for block in blocks {
            modified |= self.rewrite_block(function, block, &splitter);
        }

        modified
    }

    unsafe fn is_runtime_function(&self, function: LLVMValueRef) -> bool {
        let mut len = 0usize;
        let name_ptr = LLVMGetValueName2(function, &mut len);
        if name_ptr.is_null() {
            return false;
        }
        let name = std::slice::from_utf8(std::slice::from_raw_parts(name_ptr as *const u8, len)).unwrap_or("");
        name.starts_with(RUNTIME_NAMESPACE_PREFIX)
    }

    unsafe fn rewrite_block(&mut self, function: LLVMValueRef, block: LLVMBasicBlockRef, splitter: &BlockSplitter) -> bool {
        let mut modified = false;
        let mut inst = LLVMGetFirstInstruction(block);
        while !inst.is_null() {
            // Fetch the successor before any instrumenter might move or
            // replace `inst`.
            let next = LLVMGetNextInstruction(inst);
            let opcode = LLVMGetInstructionOpcode(inst);

            let outcome = match opcode {
                LLVMOpcode::LLVMAdd | LLVMOpcode::LLVMSub | LLVMOpcode::LLVMMul if self.check_enabled_arith() => {
                    checks::arith_overflow::instrument(splitter, function, block, inst, &self.report_fns)
                }
                LLVMOpcode::LLVMShl if self.check_enabled_shift() => {
                    checks::shift_overflow::instrument(splitter, function, block, inst, &self.report_fns)
                }
                LLVMOpcode::LLVMSDiv | LLVMOpcode::LLVMUDiv | LLVMOpcode::LLVMSRem | LLVMOpcode::LLVMURem
                    if self.check_enabled_div() =>
                {
                    checks::div_by_zero::instrument(splitter, function, block, inst, &self.report_fns)
                }
                LLVMOpcode::LLVMUnreachable if self.check_enabled_unreachable() => {
                    checks::unreachable::instrument(splitter, function, block, inst, &self.report_fns)
                }
                LLVMOpcode::LLVMZExt if self.check_enabled_sign_conversion() => {
                    checks::sign_conversion::instrument(splitter, function, block, inst, &self.report_fns)
                }
                LLVMOpcode::LLVMGetElementPtr if self.check_enabled_bounds() => {
                    checks::bounds::instrument(splitter, function, block, inst, &self.report_fns)
                }
                LLVMOpcode::LLVMCall if self.check_enabled_pure_consistency() => {
                    checks::pure_consistency::instrument(splitter, function, block, inst, &self.report_fns)
                }
                _ => checks::InstrumentOutcome::NotApplicable,
            };

            match outcome {
                checks::InstrumentOutcome::Instrumented => {
                    self.sites_instrumented += 1;
                    modified = true;
                }
                checks::InstrumentOutcome::Skipped => {
                    self.sites_skipped += 1;
                }
                checks::InstrumentOutcome::NotApplicable => {}
            }

            inst = next;
        }

        modified |= checks::loop_bounds::instrument_block(splitter, function, block, &self.report_fns, self.check_enabled_loop_bounds());
        modified
    }

    fn check_enabled_arith(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::ArithOverflow)
    }
    fn check_enabled_shift(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::ShiftOverflow)
    }
    fn check_enabled_div(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::DivByZero)
    }
    fn check_enabled_unreachable(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::UnreachableExecuted)
    }
    fn check_enabled_sign_conversion(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::SignConversion)
    }
    fn check_enabled_bounds(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::BoundsViolation)
    }
    fn check_enabled_pure_consistency(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::PureInconsistency)
    }
    fn check_enabled_loop_bounds(&self) -> bool {
        self.mode.enables(trace2pass_common::CheckKind::LoopBoundExceeded)
    }
}
