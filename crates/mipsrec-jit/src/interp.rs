//! Executor for compiled host code.
//!
//! Runs a [`CompiledBlock`] against a [`MipsContext`] with exact NZCV semantics. This is how
//! tests observe what a block does: which exit it takes and what guest state it commits.

use crate::block::CompiledBlock;
use crate::context::MipsContext;
use crate::host::{HostInst, HostReg, Nzcv, Operand2, CALLER_SAVED};

/// Value left in caller-saved registers after a native call.
pub const CLOBBER_PATTERN: u32 = 0xdead_beef;

/// How a block handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExit {
    /// Left through a fixed-target exit.
    Linked { target: u32, slot: u8 },
    /// Left through a register-indirect jump.
    Indirect { target: u32 },
    /// Called the syscall dispatcher; execution resumes at the PC shadow.
    Syscall { resume_pc: u32 },
}

impl BlockExit {
    pub fn next_pc(&self) -> u32 {
        match *self {
            BlockExit::Linked { target, .. } | BlockExit::Indirect { target } => target,
            BlockExit::Syscall { resume_pc } => resume_pc,
        }
    }
}

#[derive(Debug, Clone)]
struct HostState {
    regs: [u32; HostReg::COUNT],
    flags: Nzcv,
}

impl HostState {
    fn get(&self, reg: HostReg) -> u32 {
        self.regs[reg.index()]
    }

    fn set(&mut self, reg: HostReg, value: u32) {
        self.regs[reg.index()] = value;
    }

    fn operand(&self, op: Operand2) -> u32 {
        match op {
            Operand2::Reg(r) => self.get(r),
            Operand2::Imm(v) => v,
        }
    }
}

/// Executes `block`, calling `syscall(op, ctx)` for every native syscall call.
///
/// On return `ctx.pc` holds the guest address execution continues at.
///
/// Panics if the code runs off its end without an exit, which the compiler never produces.
pub fn execute_block(
    block: &CompiledBlock,
    ctx: &mut MipsContext,
    syscall: &mut dyn FnMut(u32, &mut MipsContext),
) -> BlockExit {
    let mut st = HostState {
        regs: [0; HostReg::COUNT],
        flags: Nzcv::empty(),
    };
    let mut ip = 0usize;

    let exit = loop {
        let Some(&inst) = block.code.get(ip) else {
            panic!(
                "block {:#010x} fell off the end of its code at @{ip}",
                block.entry_pc
            );
        };
        ip += 1;

        match inst {
            HostInst::MovImm { dst, imm } => st.set(dst, imm),
            HostInst::Mov { dst, src } => st.set(dst, st.get(src)),
            HostInst::Mvn { dst, src } => st.set(dst, !st.get(src)),
            HostInst::MovCc { cond, dst, imm } => {
                if cond.eval(st.flags) {
                    st.set(dst, imm);
                }
            }
            HostInst::Ldr { dst, offset } => st.set(dst, ctx.read_offset(offset)),
            HostInst::Str { src, offset } => ctx.write_offset(offset, st.get(src)),
            HostInst::Alu { op, dst, lhs, rhs } => {
                let value = op.apply(st.get(lhs), st.operand(rhs));
                st.set(dst, value);
            }
            HostInst::Cmp { lhs, rhs } => {
                st.flags = Nzcv::from_sub(st.get(lhs), st.operand(rhs));
            }
            HostInst::Tst { lhs, rhs } => {
                st.flags = st.flags.after_test(st.get(lhs), st.operand(rhs));
            }
            HostInst::Mrs { dst } => st.set(dst, st.flags.bits()),
            HostInst::Msr { src } => st.flags = Nzcv::from_bits_truncate(st.get(src)),
            HostInst::BCc { cond, target } => {
                let Some(target) = target else {
                    panic!("unpatched branch at @{}", ip - 1);
                };
                if cond.eval(st.flags) {
                    ip = target;
                }
            }
            HostInst::CallSyscall { op } => {
                syscall(op, ctx);
                for reg in CALLER_SAVED {
                    st.set(reg, CLOBBER_PATTERN);
                }
                // The flags are not preserved across a native call either.
                st.flags = Nzcv::from_bits_truncate(CLOBBER_PATTERN);
            }
            HostInst::Exit { target, slot } => break BlockExit::Linked { target, slot },
            HostInst::ExitToReg { src } => break BlockExit::Indirect { target: st.get(src) },
            HostInst::SyscallExit => break BlockExit::Syscall { resume_pc: ctx.pc },
        }
    };

    ctx.pc = exit.next_pc();
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ExitDescriptor;
    use crate::host::{Cond, HostAluOp};
    use mipsrec_isa::Gpr;

    fn block(code: Vec<HostInst>) -> CompiledBlock {
        CompiledBlock {
            entry_pc: 0x1000,
            num_insts: 0,
            code,
            exits: Vec::<ExitDescriptor>::new(),
        }
    }

    #[test]
    fn msr_restores_flags_saved_by_mrs() {
        let r4 = HostReg::R4;
        let r8 = HostReg::R8;
        let code = vec![
            HostInst::MovImm { dst: r4, imm: 5 },
            HostInst::Cmp {
                lhs: r4,
                rhs: Operand2::Imm(5),
            },
            HostInst::Mrs { dst: r8 },
            // Clobber: 5 != 6.
            HostInst::Cmp {
                lhs: r4,
                rhs: Operand2::Imm(6),
            },
            HostInst::Msr { src: r8 },
            HostInst::BCc {
                cond: Cond::Ne,
                target: Some(7),
            },
            HostInst::Exit {
                target: 0x2000,
                slot: 0,
            },
            HostInst::Exit {
                target: 0x3000,
                slot: 1,
            },
        ];
        let mut ctx = MipsContext::new(0x1000);
        let exit = execute_block(&block(code), &mut ctx, &mut |_, _| {});
        assert_eq!(
            exit,
            BlockExit::Linked {
                target: 0x2000,
                slot: 0
            }
        );
        assert_eq!(ctx.pc, 0x2000);
    }

    #[test]
    fn syscall_clobbers_caller_saved_and_resumes_at_pc_shadow() {
        let code = vec![
            HostInst::MovImm {
                dst: HostReg::R0,
                imm: 0x1004,
            },
            HostInst::Str {
                src: HostReg::R0,
                offset: MipsContext::PC_OFFSET,
            },
            HostInst::MovImm {
                dst: HostReg::R2,
                imm: 7,
            },
            HostInst::CallSyscall { op: 0x0000_000c },
            HostInst::Alu {
                op: HostAluOp::Add,
                dst: HostReg::R4,
                lhs: HostReg::R2,
                rhs: Operand2::Imm(0),
            },
            HostInst::Str {
                src: HostReg::R4,
                offset: MipsContext::gpr_offset(Gpr::V0),
            },
            HostInst::SyscallExit,
        ];
        let mut ctx = MipsContext::new(0x1000);
        let mut calls = Vec::new();
        let exit = execute_block(&block(code), &mut ctx, &mut |op, ctx| {
            calls.push((op, ctx.pc));
        });

        assert_eq!(calls, vec![(0x0000_000c, 0x1004)]);
        assert_eq!(exit, BlockExit::Syscall { resume_pc: 0x1004 });
        assert_eq!(ctx.gpr(Gpr::V0), CLOBBER_PATTERN);
    }

    #[test]
    #[should_panic(expected = "fell off the end")]
    fn missing_exit_panics() {
        let mut ctx = MipsContext::new(0);
        execute_block(
            &block(vec![HostInst::MovImm {
                dst: HostReg::R0,
                imm: 1,
            }]),
            &mut ctx,
            &mut |_, _| {},
        );
    }
}
