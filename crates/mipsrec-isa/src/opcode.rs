use core::fmt;

use crate::{Gpr, INST_BYTES};

/// A raw 32-bit guest instruction word.
///
/// Field accessors follow the standard MIPS layouts:
///
/// ```text
///  31    26 25   21 20   16 15   11 10    6 5      0
/// | primary |  rs   |  rt   |  rd   |  sa   | funct  |   R-type
/// | primary |  rs   |  rt   |       imm16           |   I-type
/// | primary |            imm26                      |   J-type
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u32);

impl Opcode {
    #[inline]
    pub const fn word(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn primary(self) -> u32 {
        self.0 >> 26
    }

    #[inline]
    pub const fn rs(self) -> Gpr {
        Gpr::from_field(self.0 >> 21)
    }

    #[inline]
    pub const fn rt(self) -> Gpr {
        Gpr::from_field(self.0 >> 16)
    }

    #[inline]
    pub const fn rd(self) -> Gpr {
        Gpr::from_field(self.0 >> 11)
    }

    /// Raw `rs` field, for sub-dispatch on coprocessor opcodes.
    #[inline]
    pub const fn rs_field(self) -> u32 {
        (self.0 >> 21) & 0x1f
    }

    /// Raw `rt` field, for sub-dispatch on REGIMM / coprocessor branch opcodes.
    #[inline]
    pub const fn rt_field(self) -> u32 {
        (self.0 >> 16) & 0x1f
    }

    #[inline]
    pub const fn sa(self) -> u32 {
        (self.0 >> 6) & 0x1f
    }

    /// Bit-field size (`ext`/`ins` share the `rd` position).
    #[inline]
    pub const fn size(self) -> u32 {
        (self.0 >> 11) & 0x1f
    }

    #[inline]
    pub const fn funct(self) -> u32 {
        self.0 & 0x3f
    }

    #[inline]
    pub const fn imm16(self) -> u16 {
        self.0 as u16
    }

    #[inline]
    pub const fn simm16(self) -> i32 {
        self.0 as u16 as i16 as i32
    }

    #[inline]
    pub const fn imm26(self) -> u32 {
        self.0 & 0x03ff_ffff
    }

    /// VFPU condition bit selected by `bvf`/`bvt` (bits 20..18).
    #[inline]
    pub const fn vfpu_cc_bit(self) -> u32 {
        (self.0 >> 18) & 7
    }

    /// Taken target of a PC-relative branch at `pc`: `pc + 4 + (sext(imm16) << 2)`.
    #[inline]
    pub const fn branch_target(self, pc: u32) -> u32 {
        let offset = (self.simm16() << 2) as u32;
        pc.wrapping_add(INST_BYTES).wrapping_add(offset)
    }

    /// Target of an absolute `j`/`jal` at `pc`: the 256MiB region of `pc` plus `imm26 << 2`.
    #[inline]
    pub const fn jump_target(self, pc: u32) -> u32 {
        (pc & 0xf000_0000) | (self.imm26() << 2)
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opcode({:#010x})", self.0)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}
