//! Host code buffer with forward-branch fixups.

use core::fmt;

use crate::host::{Cond, HostAluOp, HostInst, HostReg, Operand2};

/// A conditional branch whose target has not been bound yet.
///
/// Must be passed to [`CodeBuffer::set_jump_target`] before the code is finalized.
#[must_use = "an unbound fixup leaves a branch without a target"]
#[derive(Debug)]
pub struct FixupBranch {
    at: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBuffer {
    insts: Vec<HostInst>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn insts(&self) -> &[HostInst] {
        &self.insts
    }

    pub fn clear(&mut self) {
        self.insts.clear();
    }

    /// Takes the emitted code, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<HostInst> {
        debug_assert!(
            self.insts
                .iter()
                .all(|inst| !matches!(inst, HostInst::BCc { target: None, .. })),
            "code taken with an unbound fixup:\n{self}"
        );
        core::mem::take(&mut self.insts)
    }

    #[inline]
    pub fn emit(&mut self, inst: HostInst) {
        self.insts.push(inst);
    }

    pub fn mov_imm(&mut self, dst: HostReg, imm: u32) {
        self.emit(HostInst::MovImm { dst, imm });
    }

    pub fn mov(&mut self, dst: HostReg, src: HostReg) {
        self.emit(HostInst::Mov { dst, src });
    }

    pub fn mvn(&mut self, dst: HostReg, src: HostReg) {
        self.emit(HostInst::Mvn { dst, src });
    }

    pub fn mov_cc(&mut self, cond: Cond, dst: HostReg, imm: u32) {
        self.emit(HostInst::MovCc { cond, dst, imm });
    }

    pub fn ldr_ctx(&mut self, dst: HostReg, offset: u32) {
        self.emit(HostInst::Ldr { dst, offset });
    }

    pub fn str_ctx(&mut self, src: HostReg, offset: u32) {
        self.emit(HostInst::Str { src, offset });
    }

    pub fn alu(&mut self, op: HostAluOp, dst: HostReg, lhs: HostReg, rhs: Operand2) {
        self.emit(HostInst::Alu { op, dst, lhs, rhs });
    }

    pub fn cmp(&mut self, lhs: HostReg, rhs: Operand2) {
        self.emit(HostInst::Cmp { lhs, rhs });
    }

    pub fn tst(&mut self, lhs: HostReg, rhs: Operand2) {
        self.emit(HostInst::Tst { lhs, rhs });
    }

    pub fn mrs(&mut self, dst: HostReg) {
        self.emit(HostInst::Mrs { dst });
    }

    pub fn msr(&mut self, src: HostReg) {
        self.emit(HostInst::Msr { src });
    }

    /// Emits `b<cond>` with an unbound target.
    pub fn b_cc(&mut self, cond: Cond) -> FixupBranch {
        let at = self.insts.len();
        self.emit(HostInst::BCc { cond, target: None });
        FixupBranch { at }
    }

    /// Binds `fixup` to the next instruction emitted.
    pub fn set_jump_target(&mut self, fixup: FixupBranch) {
        let here = self.insts.len();
        match &mut self.insts[fixup.at] {
            HostInst::BCc { target, .. } => {
                assert!(target.is_none(), "fixup at @{} bound twice", fixup.at);
                *target = Some(here);
            }
            other => panic!("fixup at @{} does not point at a branch: {other}", fixup.at),
        }
    }

    pub fn call_syscall(&mut self, op: u32) {
        self.emit(HostInst::CallSyscall { op });
    }

    pub fn exit(&mut self, target: u32, slot: u8) {
        self.emit(HostInst::Exit { target, slot });
    }

    pub fn exit_to_reg(&mut self, src: HostReg) {
        self.emit(HostInst::ExitToReg { src });
    }

    pub fn syscall_exit(&mut self) {
        self.emit(HostInst::SyscallExit);
    }
}

impl fmt::Display for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, inst) in self.insts.iter().enumerate() {
            writeln!(f, "{i:4}: {inst}")?;
        }
        Ok(())
    }
}
