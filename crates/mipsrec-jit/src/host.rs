//! Host instruction set targeted by the recompiler.
//!
//! The host is a 32-bit, flag-based load/store machine modelled on ARM: 16 registers, NZCV
//! condition flags set only by explicit compare/test instructions, conditional branches, and
//! `MRS`/`MSR` to move the flags to and from a register. Guest state lives in a context block
//! addressed relative to [`CTX`].

use core::fmt;

use bitflags::bitflags;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostReg(u8);

impl HostReg {
    pub const COUNT: usize = 16;

    pub const R0: HostReg = HostReg(0);
    pub const R1: HostReg = HostReg(1);
    pub const R2: HostReg = HostReg(2);
    pub const R3: HostReg = HostReg(3);
    pub const R4: HostReg = HostReg(4);
    pub const R5: HostReg = HostReg(5);
    pub const R6: HostReg = HostReg(6);
    pub const R7: HostReg = HostReg(7);
    pub const R8: HostReg = HostReg(8);
    pub const R9: HostReg = HostReg(9);
    pub const R10: HostReg = HostReg(10);
    pub const R11: HostReg = HostReg(11);
    pub const R12: HostReg = HostReg(12);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for HostReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for HostReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Scratch register for short-lived values (link addresses, flag words). Never allocated.
pub const SCRATCH: HostReg = HostReg::R0;

/// Reserved register holding the saved NZCV word across a delay slot.
///
/// It survives native calls and is never handed out by the register cache.
pub const FLAGS_SAVE: HostReg = HostReg::R8;

/// Reserved register carrying a register-indirect jump destination across its delay slot.
///
/// Shares the physical register with [`FLAGS_SAVE`]: a jump never saves flags, and delay slots
/// cannot contain another branch, so the two uses are never live together.
pub const JUMP_DEST: HostReg = HostReg::R8;

/// Base pointer of the guest context block.
pub const CTX: HostReg = HostReg::R10;

/// Registers handed out by the register cache, in allocation order.
pub const ALLOCATABLE: [HostReg; 9] = [
    HostReg::R4,
    HostReg::R5,
    HostReg::R6,
    HostReg::R7,
    HostReg::R9,
    HostReg::R11,
    HostReg::R2,
    HostReg::R3,
    HostReg::R12,
];

/// Registers a native call may clobber.
pub const CALLER_SAVED: [HostReg; 5] = [
    HostReg::R0,
    HostReg::R1,
    HostReg::R2,
    HostReg::R3,
    HostReg::R12,
];

/// Second operand of data-processing and compare instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand2 {
    Reg(HostReg),
    Imm(u32),
}

impl fmt::Display for Operand2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand2::Reg(r) => write!(f, "{r}"),
            Operand2::Imm(v) => write!(f, "#{v:#x}"),
        }
    }
}

bitflags! {
    /// Host condition flags, at their CPSR bit positions (the word `MRS` produces).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Nzcv: u32 {
        const N = 1 << 31;
        const Z = 1 << 30;
        const C = 1 << 29;
        const V = 1 << 28;
    }
}

impl Nzcv {
    /// Flags produced by `CMP lhs, rhs` (a 32-bit subtraction).
    pub fn from_sub(lhs: u32, rhs: u32) -> Self {
        let result = lhs.wrapping_sub(rhs);
        let mut flags = Nzcv::empty();
        flags.set(Nzcv::N, result & 0x8000_0000 != 0);
        flags.set(Nzcv::Z, result == 0);
        // ARM's carry is "no borrow".
        flags.set(Nzcv::C, lhs >= rhs);
        flags.set(Nzcv::V, ((lhs ^ rhs) & (lhs ^ result)) & 0x8000_0000 != 0);
        flags
    }

    /// Flags produced by `TST lhs, rhs`: N and Z from the AND, C and V preserved.
    pub fn after_test(self, lhs: u32, rhs: u32) -> Self {
        let result = lhs & rhs;
        let mut flags = self & (Nzcv::C | Nzcv::V);
        flags.set(Nzcv::N, result & 0x8000_0000 != 0);
        flags.set(Nzcv::Z, result == 0);
        flags
    }
}

/// Host condition codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cond {
    Eq,
    Ne,
    /// Unsigned higher or same (C set).
    Hs,
    /// Unsigned lower (C clear).
    Lo,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
}

impl Cond {
    pub fn eval(self, flags: Nzcv) -> bool {
        let n = flags.contains(Nzcv::N);
        let z = flags.contains(Nzcv::Z);
        let c = flags.contains(Nzcv::C);
        let v = flags.contains(Nzcv::V);
        match self {
            Cond::Eq => z,
            Cond::Ne => !z,
            Cond::Hs => c,
            Cond::Lo => !c,
            Cond::Ge => n == v,
            Cond::Lt => n != v,
            Cond::Gt => !z && n == v,
            Cond::Le => z || n != v,
            Cond::Al => true,
        }
    }

    /// The complementary condition. `Al` has none and maps to itself.
    pub const fn invert(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Hs => Cond::Lo,
            Cond::Lo => Cond::Hs,
            Cond::Ge => Cond::Lt,
            Cond::Lt => Cond::Ge,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
            Cond::Al => Cond::Al,
        }
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Hs => "hs",
            Cond::Lo => "lo",
            Cond::Ge => "ge",
            Cond::Lt => "lt",
            Cond::Gt => "gt",
            Cond::Le => "le",
            Cond::Al => "",
        }
    }
}

/// Non-flag-setting data-processing operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostAluOp {
    Add,
    Sub,
    And,
    Orr,
    Eor,
    Lsl,
    Lsr,
    Asr,
}

impl HostAluOp {
    pub fn apply(self, lhs: u32, rhs: u32) -> u32 {
        match self {
            HostAluOp::Add => lhs.wrapping_add(rhs),
            HostAluOp::Sub => lhs.wrapping_sub(rhs),
            HostAluOp::And => lhs & rhs,
            HostAluOp::Orr => lhs | rhs,
            HostAluOp::Eor => lhs ^ rhs,
            HostAluOp::Lsl => lhs.wrapping_shl(rhs & 31),
            HostAluOp::Lsr => lhs.wrapping_shr(rhs & 31),
            HostAluOp::Asr => ((lhs as i32).wrapping_shr(rhs & 31)) as u32,
        }
    }

    const fn mnemonic(self) -> &'static str {
        match self {
            HostAluOp::Add => "add",
            HostAluOp::Sub => "sub",
            HostAluOp::And => "and",
            HostAluOp::Orr => "orr",
            HostAluOp::Eor => "eor",
            HostAluOp::Lsl => "lsl",
            HostAluOp::Lsr => "lsr",
            HostAluOp::Asr => "asr",
        }
    }
}

/// One emitted host instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostInst {
    MovImm {
        dst: HostReg,
        imm: u32,
    },
    Mov {
        dst: HostReg,
        src: HostReg,
    },
    Mvn {
        dst: HostReg,
        src: HostReg,
    },
    /// Conditional move of an immediate; does not touch the flags.
    MovCc {
        cond: Cond,
        dst: HostReg,
        imm: u32,
    },
    /// `ldr dst, [CTX, #offset]`
    Ldr {
        dst: HostReg,
        offset: u32,
    },
    /// `str src, [CTX, #offset]`
    Str {
        src: HostReg,
        offset: u32,
    },
    Alu {
        op: HostAluOp,
        dst: HostReg,
        lhs: HostReg,
        rhs: Operand2,
    },
    Cmp {
        lhs: HostReg,
        rhs: Operand2,
    },
    Tst {
        lhs: HostReg,
        rhs: Operand2,
    },
    /// Copy NZCV into `dst`.
    Mrs {
        dst: HostReg,
    },
    /// Copy the flag bits of `src` into NZCV.
    Msr {
        src: HostReg,
    },
    /// Conditional forward branch to instruction index `target` (`None` until patched).
    BCc {
        cond: Cond,
        target: Option<usize>,
    },
    /// Call the native syscall dispatcher with the raw guest opcode.
    CallSyscall {
        op: u32,
    },
    /// Leave the block towards a fixed guest address through exit slot `slot`.
    Exit {
        target: u32,
        slot: u8,
    },
    /// Leave the block towards the guest address held in `src`.
    ExitToReg {
        src: HostReg,
    },
    /// Return to the dispatcher after a syscall; the guest PC is already in the context.
    SyscallExit,
}

impl HostInst {
    /// Whether executing this instruction may change NZCV.
    pub const fn writes_flags(&self) -> bool {
        matches!(
            self,
            HostInst::Cmp { .. } | HostInst::Tst { .. } | HostInst::Msr { .. }
        )
    }
}

impl fmt::Display for HostInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HostInst::MovImm { dst, imm } => write!(f, "mov {dst}, #{imm:#x}"),
            HostInst::Mov { dst, src } => write!(f, "mov {dst}, {src}"),
            HostInst::Mvn { dst, src } => write!(f, "mvn {dst}, {src}"),
            HostInst::MovCc { cond, dst, imm } => {
                write!(f, "mov{} {dst}, #{imm:#x}", cond.suffix())
            }
            HostInst::Ldr { dst, offset } => write!(f, "ldr {dst}, [{CTX}, #{offset:#x}]"),
            HostInst::Str { src, offset } => write!(f, "str {src}, [{CTX}, #{offset:#x}]"),
            HostInst::Alu { op, dst, lhs, rhs } => {
                write!(f, "{} {dst}, {lhs}, {rhs}", op.mnemonic())
            }
            HostInst::Cmp { lhs, rhs } => write!(f, "cmp {lhs}, {rhs}"),
            HostInst::Tst { lhs, rhs } => write!(f, "tst {lhs}, {rhs}"),
            HostInst::Mrs { dst } => write!(f, "mrs {dst}, apsr"),
            HostInst::Msr { src } => write!(f, "msr apsr_nzcvq, {src}"),
            HostInst::BCc { cond, target } => match target {
                Some(t) => write!(f, "b{} @{t}", cond.suffix()),
                None => write!(f, "b{} <unpatched>", cond.suffix()),
            },
            HostInst::CallSyscall { op } => write!(f, "call syscall({op:#010x})"),
            HostInst::Exit { target, slot } => write!(f, "exit {target:#010x} (slot {slot})"),
            HostInst::ExitToReg { src } => write!(f, "exit [{src}]"),
            HostInst::SyscallExit => f.write_str("exit syscall"),
        }
    }
}
