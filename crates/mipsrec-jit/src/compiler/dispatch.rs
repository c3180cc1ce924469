//! Routing of control-flow opcodes to their compilers.

use mipsrec_isa::{decode_control, ControlOp, GuestMemory, Opcode, RsRtCond, ZeroCond};

use super::branch::Compare;
use super::Jit;
use crate::error::JitError;
use crate::host::Cond;

/// Host condition under which the branch is *not* taken.
fn not_taken_cond(ctrl: ControlOp) -> Option<Cond> {
    let cond = match ctrl {
        ControlOp::BranchRsRt { cond, .. } => match cond {
            RsRtCond::Eq => Cond::Ne,
            RsRtCond::Ne => Cond::Eq,
        },
        ControlOp::BranchZero { cond, .. } => match cond {
            ZeroCond::Lez => Cond::Gt,
            ZeroCond::Gtz => Cond::Le,
            ZeroCond::Ltz => Cond::Ge,
            ZeroCond::Gez => Cond::Lt,
        },
        // TST sets Z when the bit is clear.
        ControlOp::BranchFpu { on_true, .. } | ControlOp::BranchVfpu { on_true, .. } => {
            if on_true {
                Cond::Eq
            } else {
                Cond::Ne
            }
        }
        ControlOp::Jump { .. } | ControlOp::JumpReg { .. } | ControlOp::Syscall => return None,
    };
    Some(cond)
}

#[cold]
#[inline(never)]
#[track_caller]
fn dispatch_failure(entry: &str, op: Opcode) -> ! {
    panic!("{entry}: opcode {op} is not handled by this entry point");
}

impl<M: GuestMemory> Jit<M> {
    /// Compiles the control-flow instruction `op`, already decoded as `ctrl`.
    ///
    /// Always ends the block unless it returns [`JitError::BranchInDelaySlot`] for the
    /// instruction itself.
    pub fn compile_control(&mut self, ctrl: ControlOp, op: Opcode) -> Result<(), JitError> {
        match ctrl {
            ControlOp::BranchRsRt { likely, .. } => self.compile_cond_branch(
                op,
                Self::branch_cond(ctrl),
                likely,
                Compare::RsRt {
                    rs: op.rs(),
                    rt: op.rt(),
                },
            ),
            ControlOp::BranchZero { likely, .. } => self.compile_cond_branch(
                op,
                Self::branch_cond(ctrl),
                likely,
                Compare::Zero { rs: op.rs() },
            ),
            ControlOp::BranchFpu { likely, .. } => {
                self.compile_cond_branch(op, Self::branch_cond(ctrl), likely, Compare::FpuCond)
            }
            ControlOp::BranchVfpu { likely, .. } => self.compile_cond_branch(
                op,
                Self::branch_cond(ctrl),
                likely,
                Compare::VfpuCc {
                    bit: op.vfpu_cc_bit(),
                },
            ),
            ControlOp::Jump { link } => self.comp_jump_abs(op, link),
            ControlOp::JumpReg { link } => self.comp_jump_indirect(op, link),
            ControlOp::Syscall => {
                self.comp_syscall_exit(op);
                Ok(())
            }
        }
    }

    fn branch_cond(ctrl: ControlOp) -> Cond {
        match not_taken_cond(ctrl) {
            Some(cond) => cond,
            None => unreachable!("{} has no branch condition", ctrl.mnemonic()),
        }
    }

    // ---- Raw-word family entry points ------------------------------------------------------
    //
    // Each accepts only the opcodes of its own family and panics on anything else.

    /// `beq`, `bne`, `beql`, `bnel`, `blez`, `bgtz`, `blezl`, `bgtzl`.
    #[track_caller]
    pub fn comp_rel_branch(&mut self, op: Opcode) -> Result<(), JitError> {
        match decode_control(op) {
            Some(ctrl @ (ControlOp::BranchRsRt { .. } | ControlOp::BranchZero { .. }))
                if op.primary() != 1 =>
            {
                self.compile_control(ctrl, op)
            }
            _ => dispatch_failure("comp_rel_branch", op),
        }
    }

    /// REGIMM branches: `bltz`, `bgez`, `bltzl`, `bgezl`.
    #[track_caller]
    pub fn comp_rel_branch_ri(&mut self, op: Opcode) -> Result<(), JitError> {
        match decode_control(op) {
            Some(ctrl @ ControlOp::BranchZero { .. }) if op.primary() == 1 => {
                self.compile_control(ctrl, op)
            }
            _ => dispatch_failure("comp_rel_branch_ri", op),
        }
    }

    /// `bc1f`, `bc1t`, `bc1fl`, `bc1tl`.
    #[track_caller]
    pub fn comp_fpu_branch(&mut self, op: Opcode) -> Result<(), JitError> {
        match decode_control(op) {
            Some(ctrl @ ControlOp::BranchFpu { .. }) => self.compile_control(ctrl, op),
            _ => dispatch_failure("comp_fpu_branch", op),
        }
    }

    /// `bvf`, `bvt`, `bvfl`, `bvtl`.
    #[track_caller]
    pub fn comp_vbranch(&mut self, op: Opcode) -> Result<(), JitError> {
        match decode_control(op) {
            Some(ctrl @ ControlOp::BranchVfpu { .. }) => self.compile_control(ctrl, op),
            _ => dispatch_failure("comp_vbranch", op),
        }
    }

    /// `j`, `jal`.
    #[track_caller]
    pub fn comp_jump(&mut self, op: Opcode) -> Result<(), JitError> {
        match decode_control(op) {
            Some(ctrl @ ControlOp::Jump { .. }) => self.compile_control(ctrl, op),
            _ => dispatch_failure("comp_jump", op),
        }
    }

    /// `jr`, `jalr`.
    #[track_caller]
    pub fn comp_jump_reg(&mut self, op: Opcode) -> Result<(), JitError> {
        match decode_control(op) {
            Some(ctrl @ ControlOp::JumpReg { .. }) => self.compile_control(ctrl, op),
            _ => dispatch_failure("comp_jump_reg", op),
        }
    }

    #[track_caller]
    pub fn comp_syscall(&mut self, op: Opcode) {
        match decode_control(op) {
            Some(ControlOp::Syscall) => self.comp_syscall_exit(op),
            _ => dispatch_failure("comp_syscall", op),
        }
    }
}
