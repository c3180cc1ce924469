use mipsrec_isa::GuestMemory;
use tracing::debug;

use crate::cache::BlockCache;
use crate::compiler::Jit;
use crate::context::MipsContext;
use crate::error::JitError;
use crate::interp::{execute_block, BlockExit};

/// Result of one [`Dispatcher::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub entry_pc: u32,
    pub next_pc: u32,
    pub exit: BlockExit,
    /// Guest instructions in the executed block.
    pub num_insts: u32,
    /// Whether the block was compiled for this step (as opposed to found in the cache).
    pub compiled: bool,
    /// Whether the exit taken is linked to a cached block.
    pub linked: bool,
}

/// Compile-on-miss block runner.
pub struct Dispatcher<M> {
    jit: Jit<M>,
    cache: BlockCache,
}

impl<M: GuestMemory> Dispatcher<M> {
    pub fn new(jit: Jit<M>) -> Self {
        Self {
            jit,
            cache: BlockCache::new(),
        }
    }

    pub fn jit(&self) -> &Jit<M> {
        &self.jit
    }

    pub fn jit_mut(&mut self) -> &mut Jit<M> {
        &mut self.jit
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut BlockCache {
        &mut self.cache
    }

    /// Runs the block at `ctx.pc`, compiling it first if it is not cached.
    pub fn step(
        &mut self,
        ctx: &mut MipsContext,
        syscall: &mut dyn FnMut(u32, &mut MipsContext),
    ) -> Result<StepOutcome, JitError> {
        let entry_pc = ctx.pc;
        let compiled = !self.cache.contains(entry_pc);
        if compiled {
            let block = self.jit.compile_block(entry_pc)?;
            self.cache.insert(block);
        }

        let Some(block) = self.cache.get(entry_pc) else {
            unreachable!("block {entry_pc:#010x} missing right after insertion");
        };
        let num_insts = block.num_insts;
        let exit = execute_block(block, ctx, syscall);

        let linked = match exit {
            BlockExit::Linked { slot, .. } => self.cache.linked_target(entry_pc, slot).is_some(),
            BlockExit::Indirect { .. } | BlockExit::Syscall { .. } => false,
        };
        debug!(entry_pc, next_pc = ctx.pc, compiled, linked, "step {exit:?}");

        Ok(StepOutcome {
            entry_pc,
            next_pc: ctx.pc,
            exit,
            num_insts,
            compiled,
            linked,
        })
    }

    /// Steps until `max_steps` blocks have run or `stop` returns true for an outcome.
    pub fn run_until(
        &mut self,
        ctx: &mut MipsContext,
        max_steps: usize,
        syscall: &mut dyn FnMut(u32, &mut MipsContext),
        mut stop: impl FnMut(&StepOutcome) -> bool,
    ) -> Result<Vec<StepOutcome>, JitError> {
        let mut outcomes = Vec::new();
        for _ in 0..max_steps {
            let outcome = self.step(ctx, syscall)?;
            outcomes.push(outcome);
            if stop(&outcome) {
                break;
            }
        }
        Ok(outcomes)
    }
}
