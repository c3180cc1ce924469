//! Integer instructions compiled by the block driver (mostly to fill delay slots).
//!
//! Writes to `zero` compile to nothing. Set-on-less-than clobbers the host flags, which is
//! exactly what the branch compiler has to preserve across a delay slot.

use mipsrec_isa::{AluOp, Gpr, GuestMemory, ShiftOp};

use super::Jit;
use crate::host::{Cond, HostAluOp, HostReg, Operand2};
use crate::regcache::MapFlags;

/// Constant-folds `op` for the `rs == zero` forms.
fn fold(op: AluOp, lhs: u32, rhs: u32) -> u32 {
    match op {
        AluOp::Add => lhs.wrapping_add(rhs),
        AluOp::Sub => lhs.wrapping_sub(rhs),
        AluOp::And => lhs & rhs,
        AluOp::Or => lhs | rhs,
        AluOp::Xor => lhs ^ rhs,
        AluOp::Nor => !(lhs | rhs),
        AluOp::Slt => u32::from((lhs as i32) < (rhs as i32)),
        AluOp::Sltu => u32::from(lhs < rhs),
    }
}

impl<M: GuestMemory> Jit<M> {
    pub(super) fn comp_alu3(&mut self, op: AluOp, rd: Gpr, rs: Gpr, rt: Gpr) {
        if rd.is_zero() {
            return;
        }

        self.gpr.spill_lock(&[rd, rs, rt]);
        let lhs = self.gpr.map_reg(&mut self.code, rs, MapFlags::INIT_VAL);
        let rhs = self.gpr.map_reg(&mut self.code, rt, MapFlags::INIT_VAL);
        let dst = self.gpr.map_reg(&mut self.code, rd, MapFlags::DIRTY);
        self.gpr.release_spill_locks();

        self.emit_alu(op, dst, lhs, Operand2::Reg(rhs));
    }

    pub(super) fn comp_alu_imm(&mut self, op: AluOp, rt: Gpr, rs: Gpr, imm: u32) {
        if rt.is_zero() {
            return;
        }
        if rs.is_zero() {
            let dst = self.gpr.map_reg(&mut self.code, rt, MapFlags::DIRTY);
            self.code.mov_imm(dst, fold(op, 0, imm));
            return;
        }

        self.gpr.spill_lock(&[rt, rs]);
        let lhs = self.gpr.map_reg(&mut self.code, rs, MapFlags::INIT_VAL);
        let dst = self.gpr.map_reg(&mut self.code, rt, MapFlags::DIRTY);
        self.gpr.release_spill_locks();

        self.emit_alu(op, dst, lhs, Operand2::Imm(imm));
    }

    pub(super) fn comp_shift(&mut self, op: ShiftOp, rd: Gpr, rt: Gpr, sa: u8) {
        if rd.is_zero() {
            return;
        }

        self.gpr.spill_lock(&[rd, rt]);
        let src = self.gpr.map_reg(&mut self.code, rt, MapFlags::INIT_VAL);
        let dst = self.gpr.map_reg(&mut self.code, rd, MapFlags::DIRTY);
        self.gpr.release_spill_locks();

        let host_op = match op {
            ShiftOp::Sll => HostAluOp::Lsl,
            ShiftOp::Srl => HostAluOp::Lsr,
            ShiftOp::Sra => HostAluOp::Asr,
        };
        self.code.alu(host_op, dst, src, Operand2::Imm(u32::from(sa)));
    }

    pub(super) fn comp_lui(&mut self, rt: Gpr, imm: u16) {
        if rt.is_zero() {
            return;
        }
        let dst = self.gpr.map_reg(&mut self.code, rt, MapFlags::DIRTY);
        self.code.mov_imm(dst, u32::from(imm) << 16);
    }

    fn emit_alu(&mut self, op: AluOp, dst: HostReg, lhs: HostReg, rhs: Operand2) {
        let host_op = match op {
            AluOp::Add => HostAluOp::Add,
            AluOp::Sub => HostAluOp::Sub,
            AluOp::And => HostAluOp::And,
            AluOp::Or => HostAluOp::Orr,
            AluOp::Xor => HostAluOp::Eor,
            AluOp::Nor => {
                self.code.alu(HostAluOp::Orr, dst, lhs, rhs);
                self.code.mvn(dst, dst);
                return;
            }
            AluOp::Slt => return self.set_on_compare(Cond::Lt, dst, lhs, rhs),
            AluOp::Sltu => return self.set_on_compare(Cond::Lo, dst, lhs, rhs),
        };
        self.code.alu(host_op, dst, lhs, rhs);
    }

    /// `dst = (lhs <cond> rhs) as u32`. Clobbers the host flags.
    fn set_on_compare(&mut self, cond: Cond, dst: HostReg, lhs: HostReg, rhs: Operand2) {
        self.code.cmp(lhs, rhs);
        self.code.mov_imm(dst, 0);
        self.code.mov_cc(cond, dst, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_immediates() {
        assert_eq!(fold(AluOp::Add, 0, 0xffff_fff0), 0xffff_fff0);
        assert_eq!(fold(AluOp::Or, 0, 0xbeef), 0xbeef);
        assert_eq!(fold(AluOp::Slt, 0, 1), 1);
        assert_eq!(fold(AluOp::Slt, 0, 0xffff_ffff), 0);
        assert_eq!(fold(AluOp::Sltu, 0, 0xffff_ffff), 1);
        assert_eq!(fold(AluOp::Nor, 0, 0), 0xffff_ffff);
    }
}
