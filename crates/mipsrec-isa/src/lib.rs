//! Guest-side vocabulary for the MIPS recompiler.
//!
//! This crate knows nothing about host code generation. It provides:
//! - [`Opcode`]: field extraction and branch/jump target arithmetic for a raw instruction word.
//! - [`Gpr`]: guest general-purpose register names.
//! - [`decode`]: a closed decode of control-flow instructions ([`ControlOp`]) plus the small
//!   subset of integer instructions the reference block driver can compile.
//! - [`GuestMemory`]: the unchecked word fetch used while compiling.

mod decode;
mod gpr;
mod mem;
mod opcode;

pub use decode::{
    decode, decode_control, out_reg, writes_fpu_cond, writes_vfpu_cc, AluOp, ControlOp, Inst,
    RsRtCond, ShiftOp, ZeroCond,
};
pub use gpr::Gpr;
pub use mem::{FlatMemory, GuestMemory};
pub use opcode::Opcode;

/// Size of one guest instruction in bytes.
pub const INST_BYTES: u32 = 4;

/// Offset from a branch/jump to the first instruction after its delay slot.
pub const DELAY_SLOT_FALLTHROUGH: u32 = 2 * INST_BYTES;
