//! Guest → host block compiler.
//!
//! [`Jit::compile_block`] translates straight-line guest code until the first branch, jump or
//! syscall (or the block instruction limit). Control-flow instructions go through
//! [`Jit::compile_control`] and always end the block; the branch compilers re-enter
//! [`Jit::compile_at`] exactly once for the delay slot.

mod alu;
mod branch;
mod dispatch;

use mipsrec_isa::{decode, GuestMemory, Inst, Opcode, INST_BYTES};
use tracing::debug;

use crate::block::{CompiledBlock, ExitDescriptor};
use crate::emitter::CodeBuffer;
use crate::error::JitError;
use crate::host::{HostReg, FLAGS_SAVE};
use crate::options::JitOptions;
use crate::regcache::GprCache;
use crate::state::{DelaySlot, FlagsSnapshot, JitState};

pub struct Jit<M> {
    mem: M,
    options: JitOptions,
    js: JitState,
    gpr: GprCache,
    code: CodeBuffer,
    exits: Vec<ExitDescriptor>,
}

impl<M: GuestMemory> Jit<M> {
    pub fn new(mem: M) -> Self {
        Self::with_options(mem, JitOptions::default())
    }

    pub fn with_options(mem: M, options: JitOptions) -> Self {
        Self {
            mem,
            options,
            js: JitState::new(0),
            gpr: GprCache::new(options.host_regs),
            code: CodeBuffer::new(),
            exits: Vec::new(),
        }
    }

    pub fn options(&self) -> &JitOptions {
        &self.options
    }

    pub fn mem(&self) -> &M {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    /// State of the block being (or last) compiled.
    pub fn state(&self) -> &JitState {
        &self.js
    }

    /// Code emitted so far for the current block.
    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    /// Exits emitted so far for the current block.
    pub fn exits(&self) -> &[ExitDescriptor] {
        &self.exits
    }

    /// Discards any partial output and starts a new block at `entry_pc`.
    pub fn begin_block(&mut self, entry_pc: u32) {
        self.js = JitState::new(entry_pc);
        self.gpr.reset();
        self.code.clear();
        self.exits.clear();
    }

    /// Compiles the block starting at `entry_pc`.
    ///
    /// On error the partial output stays inspectable through [`Self::code`] / [`Self::exits`]
    /// until the next [`Self::begin_block`].
    pub fn compile_block(&mut self, entry_pc: u32) -> Result<CompiledBlock, JitError> {
        self.begin_block(entry_pc);
        let max_insts = self.options.block_limits.max_insts.max(1);

        while self.js.compiling {
            if self.js.num_insts >= max_insts {
                let next_pc = self.js.compiler_pc;
                self.flush_all();
                self.write_exit(next_pc, 0);
                self.js.compiling = false;
                break;
            }

            let pc = self.js.compiler_pc;
            self.compile_at(pc)?;
            self.js.compiler_pc = pc.wrapping_add(INST_BYTES);
        }

        Ok(self.finish_block(entry_pc))
    }

    /// Compiles the single guest instruction at `addr`.
    ///
    /// `compiler_pc` is `addr` for the duration of the call and restored afterwards, so a branch
    /// compiling its delay slot keeps its own PC.
    pub fn compile_at(&mut self, addr: u32) -> Result<(), JitError> {
        let saved_pc = self.js.compiler_pc;
        self.js.compiler_pc = addr;
        self.js.num_insts += 1;

        let op = Opcode(self.mem.read_u32_unchecked(addr));
        let result = self.compile_op(op);

        self.js.compiler_pc = saved_pc;
        result
    }

    fn compile_op(&mut self, op: Opcode) -> Result<(), JitError> {
        match decode(op) {
            Inst::Control(ctrl) => return self.compile_control(ctrl, op),
            Inst::Nop => {}
            Inst::Alu3 { op, rd, rs, rt } => self.comp_alu3(op, rd, rs, rt),
            Inst::AluImm { op, rt, rs, imm } => self.comp_alu_imm(op, rt, rs, imm),
            Inst::Shift { op, rd, rt, sa } => self.comp_shift(op, rd, rt, sa),
            Inst::Lui { rt, imm } => self.comp_lui(rt, imm),
            Inst::Invalid => {
                let pc = self.js.compiler_pc;
                debug!(pc, word = op.word(), "unsupported opcode {op} at {pc:#010x}");
                self.js.compiling = false;
                return Err(JitError::UnsupportedOpcode { pc, word: op.word() });
            }
        }
        Ok(())
    }

    fn finish_block(&mut self, entry_pc: u32) -> CompiledBlock {
        debug_assert!(!self.js.in_delay_slot());
        debug_assert_eq!(
            self.gpr.mapped_count(),
            0,
            "block ended with live register mappings"
        );

        let block = CompiledBlock {
            entry_pc,
            num_insts: self.js.num_insts,
            code: self.code.take(),
            exits: core::mem::take(&mut self.exits),
        };
        debug!(
            entry_pc,
            num_insts = block.num_insts,
            host_insts = block.code.len(),
            exits = block.exits.len(),
            "compiled block"
        );
        block
    }

    // ---- Shared helpers --------------------------------------------------------------------

    pub(crate) fn flush_all(&mut self) {
        self.gpr.flush_all(&mut self.code);
    }

    /// Compiles the delay-slot instruction and, if the block is still open, commits all
    /// register state.
    fn compile_delay_slot(&mut self, slot: &DelaySlot) -> Result<(), JitError> {
        let result = self.compile_at(slot.addr());
        if self.js.compiling {
            self.flush_all();
        }
        result
    }

    /// `MRS FLAGS_SAVE`. Only possible while a delay slot is open.
    fn save_flags(&mut self, slot: &DelaySlot) -> FlagsSnapshot {
        let snapshot = self.js.take_flags_slot(slot);
        self.code.mrs(FLAGS_SAVE);
        snapshot
    }

    /// `MSR FLAGS_SAVE`.
    fn restore_flags(&mut self, snapshot: FlagsSnapshot) {
        self.code.msr(FLAGS_SAVE);
        self.js.release_flags_slot(snapshot);
    }

    /// Gives up the saved flags without restoring them (the block already ended).
    fn discard_flags(&mut self, snapshot: FlagsSnapshot) {
        self.js.release_flags_slot(snapshot);
    }

    pub(crate) fn write_exit(&mut self, target: u32, slot: u8) {
        debug_assert_eq!(self.gpr.mapped_count(), 0, "exit with live register mappings");
        self.exits.push(ExitDescriptor {
            target,
            slot,
            code_offset: self.code.len(),
        });
        self.code.exit(target, slot);
    }

    fn write_exit_to_reg(&mut self, src: HostReg) {
        debug_assert_eq!(self.gpr.mapped_count(), 0, "exit with live register mappings");
        self.code.exit_to_reg(src);
    }

    fn write_syscall_exit(&mut self) {
        self.code.syscall_exit();
    }
}
