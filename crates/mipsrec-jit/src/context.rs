//! Guest CPU context block shared with compiled code.

use mipsrec_isa::Gpr;

/// Architectural state compiled blocks read and write through [`crate::host::CTX`].
///
/// Layout (bytes, every field a little-endian `u32`):
/// - `gpr[0..32]`
/// - `pc`: guest PC shadow, written by register jumps and syscalls
/// - `hi`, `lo`
/// - `fpcond`: FPU condition bit (bit 0), read by `bc1*`
/// - `vfpu_cc`: VFPU CC control word (bits 0..6), read by `bv*`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct MipsContext {
    gpr: [u32; Gpr::COUNT],
    pub pc: u32,
    pub hi: u32,
    pub lo: u32,
    pub fpcond: u32,
    pub vfpu_cc: u32,
}

impl MipsContext {
    pub const GPR_OFFSET: u32 = 0;
    pub const PC_OFFSET: u32 = Self::GPR_OFFSET + (Gpr::COUNT as u32) * 4;
    pub const HI_OFFSET: u32 = Self::PC_OFFSET + 4;
    pub const LO_OFFSET: u32 = Self::HI_OFFSET + 4;
    pub const FPCOND_OFFSET: u32 = Self::LO_OFFSET + 4;
    pub const VFPU_CC_OFFSET: u32 = Self::FPCOND_OFFSET + 4;

    pub const BYTE_SIZE: usize = (Self::VFPU_CC_OFFSET + 4) as usize;

    pub fn new(pc: u32) -> Self {
        Self {
            pc,
            ..Self::default()
        }
    }

    #[inline]
    pub const fn gpr_offset(reg: Gpr) -> u32 {
        Self::GPR_OFFSET + (reg as u32) * 4
    }

    #[inline]
    pub fn gpr(&self, reg: Gpr) -> u32 {
        self.gpr[reg.index()]
    }

    /// Writes to `zero` are dropped.
    #[inline]
    pub fn set_gpr(&mut self, reg: Gpr, value: u32) {
        if !reg.is_zero() {
            self.gpr[reg.index()] = value;
        }
    }

    /// Reads the field at byte `offset`, as compiled code does.
    pub fn read_offset(&self, offset: u32) -> u32 {
        match offset {
            o if o < Self::PC_OFFSET => {
                assert!(o % 4 == 0, "unaligned context read at {o:#x}");
                self.gpr[(o / 4) as usize]
            }
            Self::PC_OFFSET => self.pc,
            Self::HI_OFFSET => self.hi,
            Self::LO_OFFSET => self.lo,
            Self::FPCOND_OFFSET => self.fpcond,
            Self::VFPU_CC_OFFSET => self.vfpu_cc,
            _ => panic!("context read out of bounds: offset={offset:#x}"),
        }
    }

    /// Writes the field at byte `offset`, as compiled code does.
    pub fn write_offset(&mut self, offset: u32, value: u32) {
        match offset {
            o if o < Self::PC_OFFSET => {
                assert!(o % 4 == 0, "unaligned context write at {o:#x}");
                self.set_gpr(Gpr::from_field(o / 4), value);
            }
            Self::PC_OFFSET => self.pc = value,
            Self::HI_OFFSET => self.hi = value,
            Self::LO_OFFSET => self.lo = value,
            Self::FPCOND_OFFSET => self.fpcond = value,
            Self::VFPU_CC_OFFSET => self.vfpu_cc = value,
            _ => panic!("context write out of bounds: offset={offset:#x}"),
        }
    }
}

const _: () = {
    assert!(MipsContext::BYTE_SIZE == core::mem::size_of::<MipsContext>());
    assert!(MipsContext::gpr_offset(Gpr::Ra) == 31 * 4);
};
