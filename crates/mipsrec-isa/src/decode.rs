//! Closed decode of the guest instructions the recompiler understands.
//!
//! Control-flow instructions decode into [`ControlOp`], which is matched exhaustively by the
//! branch compiler. Everything else the reference block driver can compile decodes into one of
//! the integer [`Inst`] variants; anything outside that set is [`Inst::Invalid`].

use crate::{Gpr, Opcode};

const OP_SPECIAL: u32 = 0;
const OP_REGIMM: u32 = 1;
const OP_J: u32 = 2;
const OP_JAL: u32 = 3;
const OP_BEQ: u32 = 4;
const OP_BNE: u32 = 5;
const OP_BLEZ: u32 = 6;
const OP_BGTZ: u32 = 7;
const OP_ADDI: u32 = 8;
const OP_ADDIU: u32 = 9;
const OP_SLTI: u32 = 10;
const OP_SLTIU: u32 = 11;
const OP_ANDI: u32 = 12;
const OP_ORI: u32 = 13;
const OP_XORI: u32 = 14;
const OP_LUI: u32 = 15;
const OP_COP1: u32 = 17;
const OP_COP2: u32 = 18;
const OP_BEQL: u32 = 20;
const OP_BNEL: u32 = 21;
const OP_BLEZL: u32 = 22;
const OP_BGTZL: u32 = 23;
const OP_VFPU1: u32 = 27;

const FUNCT_SLL: u32 = 0;
const FUNCT_SRL: u32 = 2;
const FUNCT_SRA: u32 = 3;
const FUNCT_JR: u32 = 8;
const FUNCT_JALR: u32 = 9;
const FUNCT_SYSCALL: u32 = 12;
const FUNCT_MFHI: u32 = 16;
const FUNCT_MFLO: u32 = 18;
const FUNCT_ADD: u32 = 32;
const FUNCT_ADDU: u32 = 33;
const FUNCT_SUB: u32 = 34;
const FUNCT_SUBU: u32 = 35;
const FUNCT_AND: u32 = 36;
const FUNCT_OR: u32 = 37;
const FUNCT_XOR: u32 = 38;
const FUNCT_NOR: u32 = 39;
const FUNCT_SLT: u32 = 42;
const FUNCT_SLTU: u32 = 43;

/// `rs` field value selecting the branch-on-condition subgroup of COP1/COP2.
const COP_BC: u32 = 8;
/// `rs` field value for single-precision COP1 arithmetic (`c.cond.s` lives here).
const COP1_FMT_S: u32 = 16;

/// Register/register comparison of `beq`/`bne`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsRtCond {
    Eq,
    Ne,
}

/// Register/zero comparison of `blez`/`bgtz`/`bltz`/`bgez`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroCond {
    Lez,
    Gtz,
    Ltz,
    Gez,
}

/// Every control-flow form the branch compiler handles.
///
/// `likely` variants discard their delay slot when the branch is not taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    /// `beq`, `bne`, `beql`, `bnel`.
    BranchRsRt { cond: RsRtCond, likely: bool },
    /// `blez`, `bgtz`, `bltz`, `bgez` and their likely forms.
    BranchZero { cond: ZeroCond, likely: bool },
    /// `bc1f`, `bc1t`, `bc1fl`, `bc1tl`: taken when the FPU condition equals `on_true`.
    BranchFpu { on_true: bool, likely: bool },
    /// `bvf`, `bvt`, `bvfl`, `bvtl`: taken when the selected VFPU CC bit equals `on_true`.
    BranchVfpu { on_true: bool, likely: bool },
    /// `j` / `jal`.
    Jump { link: bool },
    /// `jr` / `jalr`.
    JumpReg { link: bool },
    Syscall,
}

impl ControlOp {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            ControlOp::BranchRsRt { cond, likely } => match (cond, likely) {
                (RsRtCond::Eq, false) => "beq",
                (RsRtCond::Ne, false) => "bne",
                (RsRtCond::Eq, true) => "beql",
                (RsRtCond::Ne, true) => "bnel",
            },
            ControlOp::BranchZero { cond, likely } => match (cond, likely) {
                (ZeroCond::Lez, false) => "blez",
                (ZeroCond::Gtz, false) => "bgtz",
                (ZeroCond::Ltz, false) => "bltz",
                (ZeroCond::Gez, false) => "bgez",
                (ZeroCond::Lez, true) => "blezl",
                (ZeroCond::Gtz, true) => "bgtzl",
                (ZeroCond::Ltz, true) => "bltzl",
                (ZeroCond::Gez, true) => "bgezl",
            },
            ControlOp::BranchFpu { on_true, likely } => match (on_true, likely) {
                (false, false) => "bc1f",
                (true, false) => "bc1t",
                (false, true) => "bc1fl",
                (true, true) => "bc1tl",
            },
            ControlOp::BranchVfpu { on_true, likely } => match (on_true, likely) {
                (false, false) => "bvf",
                (true, false) => "bvt",
                (false, true) => "bvfl",
                (true, true) => "bvtl",
            },
            ControlOp::Jump { link: false } => "j",
            ControlOp::Jump { link: true } => "jal",
            ControlOp::JumpReg { link: false } => "jr",
            ControlOp::JumpReg { link: true } => "jalr",
            ControlOp::Syscall => "syscall",
        }
    }

    /// Whether this op is followed by a delay slot.
    pub const fn has_delay_slot(self) -> bool {
        !matches!(self, ControlOp::Syscall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Sll,
    Srl,
    Sra,
}

/// A decoded guest instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    Control(ControlOp),
    Nop,
    /// `rd = rs <op> rt`. `add`/`sub` decode as their non-trapping forms.
    Alu3 { op: AluOp, rd: Gpr, rs: Gpr, rt: Gpr },
    /// `rt = rs <op> imm`, with `imm` already sign- or zero-extended per the opcode.
    AluImm { op: AluOp, rt: Gpr, rs: Gpr, imm: u32 },
    Shift { op: ShiftOp, rd: Gpr, rt: Gpr, sa: u8 },
    Lui { rt: Gpr, imm: u16 },
    Invalid,
}

/// Decodes only the control-flow forms; `None` for everything else.
pub fn decode_control(op: Opcode) -> Option<ControlOp> {
    let ctrl = match op.primary() {
        OP_SPECIAL => match op.funct() {
            FUNCT_JR => ControlOp::JumpReg { link: false },
            FUNCT_JALR => ControlOp::JumpReg { link: true },
            FUNCT_SYSCALL => ControlOp::Syscall,
            _ => return None,
        },
        OP_REGIMM => {
            let (cond, likely) = match op.rt_field() {
                0 => (ZeroCond::Ltz, false),
                1 => (ZeroCond::Gez, false),
                2 => (ZeroCond::Ltz, true),
                3 => (ZeroCond::Gez, true),
                _ => return None,
            };
            ControlOp::BranchZero { cond, likely }
        }
        OP_J => ControlOp::Jump { link: false },
        OP_JAL => ControlOp::Jump { link: true },
        OP_BEQ => ControlOp::BranchRsRt {
            cond: RsRtCond::Eq,
            likely: false,
        },
        OP_BNE => ControlOp::BranchRsRt {
            cond: RsRtCond::Ne,
            likely: false,
        },
        OP_BEQL => ControlOp::BranchRsRt {
            cond: RsRtCond::Eq,
            likely: true,
        },
        OP_BNEL => ControlOp::BranchRsRt {
            cond: RsRtCond::Ne,
            likely: true,
        },
        OP_BLEZ => ControlOp::BranchZero {
            cond: ZeroCond::Lez,
            likely: false,
        },
        OP_BGTZ => ControlOp::BranchZero {
            cond: ZeroCond::Gtz,
            likely: false,
        },
        OP_BLEZL => ControlOp::BranchZero {
            cond: ZeroCond::Lez,
            likely: true,
        },
        OP_BGTZL => ControlOp::BranchZero {
            cond: ZeroCond::Gtz,
            likely: true,
        },
        OP_COP1 if op.rs_field() == COP_BC => {
            let sel = op.rt_field();
            if sel > 3 {
                return None;
            }
            ControlOp::BranchFpu {
                on_true: sel & 1 != 0,
                likely: sel & 2 != 0,
            }
        }
        OP_COP2 if op.rs_field() == COP_BC => {
            // The VFPU encodes the CC selector in bits 20..18, so only the low two bits of
            // `rt` pick the branch form.
            let sel = op.rt_field() & 3;
            ControlOp::BranchVfpu {
                on_true: sel & 1 != 0,
                likely: sel & 2 != 0,
            }
        }
        _ => return None,
    };
    Some(ctrl)
}

/// Full decode used by the block driver.
pub fn decode(op: Opcode) -> Inst {
    if op.word() == 0 {
        return Inst::Nop;
    }
    if let Some(ctrl) = decode_control(op) {
        return Inst::Control(ctrl);
    }

    let simm = op.simm16() as u32;
    let uimm = op.imm16() as u32;
    let alu_imm = |alu: AluOp, imm: u32| Inst::AluImm {
        op: alu,
        rt: op.rt(),
        rs: op.rs(),
        imm,
    };

    match op.primary() {
        OP_SPECIAL => {
            let alu3 = |alu: AluOp| Inst::Alu3 {
                op: alu,
                rd: op.rd(),
                rs: op.rs(),
                rt: op.rt(),
            };
            let shift = |sh: ShiftOp| Inst::Shift {
                op: sh,
                rd: op.rd(),
                rt: op.rt(),
                sa: op.sa() as u8,
            };
            match op.funct() {
                FUNCT_SLL => shift(ShiftOp::Sll),
                FUNCT_SRL => shift(ShiftOp::Srl),
                FUNCT_SRA => shift(ShiftOp::Sra),
                FUNCT_ADD | FUNCT_ADDU => alu3(AluOp::Add),
                FUNCT_SUB | FUNCT_SUBU => alu3(AluOp::Sub),
                FUNCT_AND => alu3(AluOp::And),
                FUNCT_OR => alu3(AluOp::Or),
                FUNCT_XOR => alu3(AluOp::Xor),
                FUNCT_NOR => alu3(AluOp::Nor),
                FUNCT_SLT => alu3(AluOp::Slt),
                FUNCT_SLTU => alu3(AluOp::Sltu),
                _ => Inst::Invalid,
            }
        }
        OP_ADDI | OP_ADDIU => alu_imm(AluOp::Add, simm),
        OP_SLTI => alu_imm(AluOp::Slt, simm),
        // sltiu sign-extends the immediate and then compares unsigned.
        OP_SLTIU => alu_imm(AluOp::Sltu, simm),
        OP_ANDI => alu_imm(AluOp::And, uimm),
        OP_ORI => alu_imm(AluOp::Or, uimm),
        OP_XORI => alu_imm(AluOp::Xor, uimm),
        OP_LUI => Inst::Lui {
            rt: op.rt(),
            imm: op.imm16(),
        },
        _ => Inst::Invalid,
    }
}

/// Guest GPR written by `op`, if any.
///
/// This covers more than [`decode`] does (loads, `mfhi`/`mflo`, ...): it only answers "which
/// register would this instruction clobber", which is what delay-slot aliasing checks need.
pub fn out_reg(op: Opcode) -> Option<Gpr> {
    let reg = match op.primary() {
        OP_SPECIAL => match op.funct() {
            FUNCT_SLL | FUNCT_SRL | FUNCT_SRA | FUNCT_JALR | FUNCT_MFHI | FUNCT_MFLO => op.rd(),
            // sllv..srav, movz/movn and the 3-operand ALU group.
            4..=7 | 10 | 11 | 32..=43 => op.rd(),
            _ => return None,
        },
        OP_JAL => Gpr::Ra,
        OP_ADDI..=OP_LUI => op.rt(),
        // lb, lh, lwl, lw, lbu, lhu, lwr
        32..=38 => op.rt(),
        _ => return None,
    };
    (!reg.is_zero()).then_some(reg)
}

/// Whether `op` is an FPU compare (`c.cond.s`), i.e. writes the condition read by `bc1*`.
pub fn writes_fpu_cond(op: Opcode) -> bool {
    op.primary() == OP_COP1 && op.rs_field() == COP1_FMT_S && op.funct() >= 48
}

/// Whether `op` belongs to the VFPU group that updates the CC control word (`vcmp` and friends).
pub fn writes_vfpu_cc(op: Opcode) -> bool {
    op.primary() == OP_VFPU1
}
