//! Conditional branches, jumps and syscalls.
//!
//! Every delay-slot form goes through the same sequence:
//!
//! ```text
//! guard → compare setup → flush → enter slot ─┬─ likely:     b<!cc>, delay slot, flush
//!                                             └─ non-likely: mrs, delay slot, flush, msr, b<!cc>
//!       → leave slot → exit taken (slot 0) → bind fixup → exit pc+8 (slot 1)
//! ```
//!
//! The host branch is compiled with the *inverse* of the guest's taken condition, so it skips
//! over the taken exit when the branch is not taken.
//!
//! A `syscall` in the delay slot ends the block before any exit is written. Every form then
//! stores its resume PC (and link) ahead of the delay slot so the syscall returns to the right
//! guest address.

use mipsrec_isa::{decode_control, out_reg, writes_fpu_cond, writes_vfpu_cc};
use mipsrec_isa::{Gpr, GuestMemory, Opcode};
use mipsrec_isa::{DELAY_SLOT_FALLTHROUGH, INST_BYTES};
use tracing::trace;

use super::Jit;
use crate::context::MipsContext;
use crate::emitter::FixupBranch;
use crate::error::JitError;
use crate::host::{Cond, Operand2, JUMP_DEST, SCRATCH};
use crate::regcache::MapFlags;

/// How a conditional branch produces the host flags it tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Compare {
    /// `beq`/`bne` family.
    RsRt { rs: Gpr, rt: Gpr },
    /// `blez`/`bgtz`/`bltz`/`bgez` family.
    Zero { rs: Gpr },
    /// Bit 0 of the FPU condition word.
    FpuCond,
    /// One bit of the VFPU CC word.
    VfpuCc { bit: u32 },
}

impl<M: GuestMemory> Jit<M> {
    /// Compiles a conditional branch whose host condition `cc` is the inverse of the guest's
    /// taken condition.
    pub(super) fn compile_cond_branch(
        &mut self,
        op: Opcode,
        cc: Cond,
        likely: bool,
        compare: Compare,
    ) -> Result<(), JitError> {
        self.js.ensure_not_in_delay_slot()?;

        let pc = self.js.compiler_pc;
        let target = op.branch_target(pc);
        self.trace_delay_slot_niceness(pc, compare);

        self.emit_compare(compare, cc);
        self.flush_all();

        if self.delay_slot_ends_block(pc) {
            // Leaves the flags alone: pc + 8, or the target when taken.
            self.code.mov_imm(SCRATCH, pc.wrapping_add(DELAY_SLOT_FALLTHROUGH));
            self.code.mov_cc(cc.invert(), SCRATCH, target);
            self.code.str_ctx(SCRATCH, MipsContext::PC_OFFSET);
        }

        let slot = self.js.enter_delay_slot();
        let (fixup, delay_result) = if likely {
            let fixup = self.code.b_cc(cc);
            let result = self.compile_delay_slot(&slot);
            (Some(fixup), result)
        } else {
            let snapshot = self.save_flags(&slot);
            let result = self.compile_delay_slot(&slot);
            if self.js.compiling {
                self.restore_flags(snapshot);
                (Some(self.code.b_cc(cc)), result)
            } else {
                self.discard_flags(snapshot);
                (None, result)
            }
        };
        self.js.leave_delay_slot(slot);

        if self.js.compiling {
            self.write_exit(target, 0);
        }
        if let Some(fixup) = fixup {
            self.bind_not_taken_exit(fixup, pc);
        }

        self.js.compiling = false;
        delay_result
    }

    /// `j` / `jal`.
    pub(super) fn comp_jump_abs(&mut self, op: Opcode, link: bool) -> Result<(), JitError> {
        self.js.ensure_not_in_delay_slot()?;

        let pc = self.js.compiler_pc;
        let target = op.jump_target(pc);

        if self.delay_slot_ends_block(pc) {
            self.flush_all();
            self.store_pc_shadow(target);
            if link {
                self.store_link(Gpr::Ra, pc);
            }
        }

        let slot = self.js.enter_delay_slot();
        let delay_result = self.compile_delay_slot(&slot);
        self.js.leave_delay_slot(slot);

        if self.js.compiling {
            if link {
                self.store_link(Gpr::Ra, pc);
            }
            self.write_exit(target, 0);
        }

        self.js.compiling = false;
        delay_result
    }

    /// `jr` / `jalr`. `jalr` links into its `rd` field.
    pub(super) fn comp_jump_indirect(&mut self, op: Opcode, link: bool) -> Result<(), JitError> {
        self.js.ensure_not_in_delay_slot()?;

        let pc = self.js.compiler_pc;
        let rs = op.rs();
        let delay_op = Opcode(self.mem.read_u32_unchecked(pc.wrapping_add(INST_BYTES)));
        trace!(pc, nice = out_reg(delay_op) != Some(rs), "jump register {rs}");

        // The destination must be captured before the delay slot can overwrite `rs`.
        let src = self.gpr.map_reg(&mut self.code, rs, MapFlags::INIT_VAL);
        self.code.mov(JUMP_DEST, src);
        self.code.str_ctx(JUMP_DEST, MipsContext::PC_OFFSET);
        self.flush_all();
        if link && self.delay_slot_ends_block(pc) {
            self.store_link(op.rd(), pc);
        }

        let slot = self.js.enter_delay_slot();
        let delay_result = self.compile_delay_slot(&slot);
        self.js.leave_delay_slot(slot);

        if self.js.compiling {
            if link {
                self.store_link(op.rd(), pc);
            }
            self.write_exit_to_reg(JUMP_DEST);
        }

        self.js.compiling = false;
        delay_result
    }

    /// `syscall`: commits guest state and leaves through the native syscall dispatcher.
    pub(super) fn comp_syscall_exit(&mut self, op: Opcode) {
        self.flush_all();

        // Inside a delay slot the enclosing jump has already stored its destination.
        if !self.js.in_delay_slot() {
            self.store_pc_shadow(self.js.compiler_pc.wrapping_add(INST_BYTES));
        }

        self.code.call_syscall(op.word());
        self.write_syscall_exit();
        self.js.compiling = false;
    }

    fn emit_compare(&mut self, compare: Compare, cc: Cond) {
        match compare {
            Compare::RsRt { rs, rt } => self.compare_rs_rt(rs, rt, cc),
            Compare::Zero { rs } => {
                let r = self.gpr.map_reg(&mut self.code, rs, MapFlags::INIT_VAL);
                self.code.cmp(r, Operand2::Imm(0));
            }
            Compare::FpuCond => {
                self.flush_all();
                self.code.ldr_ctx(SCRATCH, MipsContext::FPCOND_OFFSET);
                self.code.tst(SCRATCH, Operand2::Imm(1));
            }
            Compare::VfpuCc { bit } => {
                self.flush_all();
                self.code.ldr_ctx(SCRATCH, MipsContext::VFPU_CC_OFFSET);
                self.code.tst(SCRATCH, Operand2::Imm(1 << bit));
            }
        }
    }

    fn compare_rs_rt(&mut self, rs: Gpr, rt: Gpr, cc: Cond) {
        if rt.is_zero() {
            let r = self.gpr.map_reg(&mut self.code, rs, MapFlags::INIT_VAL);
            self.code.cmp(r, Operand2::Imm(0));
        } else if rs.is_zero() && matches!(cc, Cond::Eq | Cond::Ne) {
            // Equality is symmetric, so the operands can swap.
            let r = self.gpr.map_reg(&mut self.code, rt, MapFlags::INIT_VAL);
            self.code.cmp(r, Operand2::Imm(0));
        } else {
            self.gpr.spill_lock(&[rs, rt]);
            let lhs = self.gpr.map_reg(&mut self.code, rs, MapFlags::INIT_VAL);
            let rhs = self.gpr.map_reg(&mut self.code, rt, MapFlags::INIT_VAL);
            self.gpr.release_spill_locks();
            self.code.cmp(lhs, Operand2::Reg(rhs));
        }
    }

    fn store_pc_shadow(&mut self, pc: u32) {
        self.code.mov_imm(SCRATCH, pc);
        self.code.str_ctx(SCRATCH, MipsContext::PC_OFFSET);
    }

    /// Whether the instruction after `pc` is a `syscall`, which ends the block from inside the
    /// delay slot.
    fn delay_slot_ends_block(&self, pc: u32) -> bool {
        let delay_op = Opcode(self.mem.read_u32_unchecked(pc.wrapping_add(INST_BYTES)));
        decode_control(delay_op).is_some_and(|ctrl| !ctrl.has_delay_slot())
    }

    /// Writes the return address `pc + 8` into `reg`. Register state must be flushed.
    fn store_link(&mut self, reg: Gpr, pc: u32) {
        if reg.is_zero() {
            return;
        }
        self.code.mov_imm(SCRATCH, pc.wrapping_add(DELAY_SLOT_FALLTHROUGH));
        self.code.str_ctx(SCRATCH, MipsContext::gpr_offset(reg));
    }

    fn bind_not_taken_exit(&mut self, fixup: FixupBranch, pc: u32) {
        self.code.set_jump_target(fixup);
        self.write_exit(pc.wrapping_add(DELAY_SLOT_FALLTHROUGH), 1);
    }

    /// Whether the delay slot leaves the branch's inputs alone. Only traced.
    fn trace_delay_slot_niceness(&self, pc: u32, compare: Compare) {
        let delay_op = Opcode(self.mem.read_u32_unchecked(pc.wrapping_add(INST_BYTES)));
        let nice = match compare {
            Compare::RsRt { rs, rt } => {
                !matches!(out_reg(delay_op), Some(out) if out == rs || out == rt)
            }
            Compare::Zero { rs } => out_reg(delay_op) != Some(rs),
            Compare::FpuCond => !writes_fpu_cond(delay_op),
            Compare::VfpuCc { .. } => !writes_vfpu_cc(delay_op),
        };
        trace!(pc, nice, ?compare, "delay slot {delay_op}");
    }
}
