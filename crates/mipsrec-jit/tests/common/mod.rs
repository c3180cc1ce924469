// Shared helpers for the integration tests (kept in a submodule so it is not its own test
// target).
#![allow(dead_code)]

use mipsrec_isa::{FlatMemory, Gpr};
use mipsrec_jit::{execute_block, BlockExit, CompiledBlock, Jit, JitOptions, MipsContext};

pub const BASE: u32 = 0x1000;
pub const SYSCALL: u32 = 0x0000_000c;
pub const NOP: u32 = 0;

/// Routes compiler `tracing` output to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn r(reg: Gpr) -> u32 {
    u32::from(reg.as_u8())
}

fn i_type(primary: u32, rs: u32, rt: u32, imm: u16) -> u32 {
    (primary << 26) | (rs << 21) | (rt << 16) | u32::from(imm)
}

fn r_type(rs: Gpr, rt: Gpr, rd: Gpr, sa: u32, funct: u32) -> u32 {
    (r(rs) << 21) | (r(rt) << 16) | (r(rd) << 11) | (sa << 6) | funct
}

pub fn beq(rs: Gpr, rt: Gpr, off: i16) -> u32 {
    i_type(4, r(rs), r(rt), off as u16)
}

pub fn bne(rs: Gpr, rt: Gpr, off: i16) -> u32 {
    i_type(5, r(rs), r(rt), off as u16)
}

pub fn blez(rs: Gpr, off: i16) -> u32 {
    i_type(6, r(rs), 0, off as u16)
}

pub fn bgtz(rs: Gpr, off: i16) -> u32 {
    i_type(7, r(rs), 0, off as u16)
}

pub fn beql(rs: Gpr, rt: Gpr, off: i16) -> u32 {
    i_type(20, r(rs), r(rt), off as u16)
}

pub fn bnel(rs: Gpr, rt: Gpr, off: i16) -> u32 {
    i_type(21, r(rs), r(rt), off as u16)
}

pub fn bltz(rs: Gpr, off: i16) -> u32 {
    i_type(1, r(rs), 0, off as u16)
}

pub fn bgez(rs: Gpr, off: i16) -> u32 {
    i_type(1, r(rs), 1, off as u16)
}

pub fn bgezl(rs: Gpr, off: i16) -> u32 {
    i_type(1, r(rs), 3, off as u16)
}

pub fn bc1f(off: i16) -> u32 {
    i_type(17, 8, 0, off as u16)
}

pub fn bc1t(off: i16) -> u32 {
    i_type(17, 8, 1, off as u16)
}

pub fn bc1tl(off: i16) -> u32 {
    i_type(17, 8, 3, off as u16)
}

/// `bvf`/`bvt` on VFPU CC bit `bit`.
pub fn bv(on_true: bool, bit: u32, off: i16) -> u32 {
    i_type(18, 8, (bit << 2) | u32::from(on_true), off as u16)
}

pub fn j(target: u32) -> u32 {
    (2 << 26) | ((target >> 2) & 0x03ff_ffff)
}

pub fn jal(target: u32) -> u32 {
    (3 << 26) | ((target >> 2) & 0x03ff_ffff)
}

pub fn jr(rs: Gpr) -> u32 {
    r_type(rs, Gpr::Zero, Gpr::Zero, 0, 8)
}

pub fn jalr(rd: Gpr, rs: Gpr) -> u32 {
    r_type(rs, Gpr::Zero, rd, 0, 9)
}

pub fn addu(rd: Gpr, rs: Gpr, rt: Gpr) -> u32 {
    r_type(rs, rt, rd, 0, 33)
}

pub fn subu(rd: Gpr, rs: Gpr, rt: Gpr) -> u32 {
    r_type(rs, rt, rd, 0, 35)
}

pub fn slt(rd: Gpr, rs: Gpr, rt: Gpr) -> u32 {
    r_type(rs, rt, rd, 0, 42)
}

pub fn sltu(rd: Gpr, rs: Gpr, rt: Gpr) -> u32 {
    r_type(rs, rt, rd, 0, 43)
}

pub fn nor(rd: Gpr, rs: Gpr, rt: Gpr) -> u32 {
    r_type(rs, rt, rd, 0, 39)
}

pub fn sll(rd: Gpr, rt: Gpr, sa: u32) -> u32 {
    r_type(Gpr::Zero, rt, rd, sa, 0)
}

pub fn sra(rd: Gpr, rt: Gpr, sa: u32) -> u32 {
    r_type(Gpr::Zero, rt, rd, sa, 3)
}

pub fn addiu(rt: Gpr, rs: Gpr, imm: i16) -> u32 {
    i_type(9, r(rs), r(rt), imm as u16)
}

pub fn ori(rt: Gpr, rs: Gpr, imm: u16) -> u32 {
    i_type(13, r(rs), r(rt), imm)
}

pub fn lui(rt: Gpr, imm: u16) -> u32 {
    i_type(15, 0, r(rt), imm)
}

/// `lw`: outside the compiled subset.
pub fn lw(rt: Gpr, base: Gpr, off: i16) -> u32 {
    i_type(35, r(base), r(rt), off as u16)
}

pub fn memory_with(addr: u32, words: &[u32]) -> FlatMemory {
    let mut mem = FlatMemory::new(0, 0x1_0000);
    mem.load_words(addr, words);
    mem
}

pub fn jit_with(words: &[u32]) -> Jit<FlatMemory> {
    Jit::new(memory_with(BASE, words))
}

pub fn jit_with_options(words: &[u32], options: JitOptions) -> Jit<FlatMemory> {
    Jit::with_options(memory_with(BASE, words), options)
}

pub fn compile(words: &[u32]) -> CompiledBlock {
    init_tracing();
    jit_with(words)
        .compile_block(BASE)
        .unwrap_or_else(|err| panic!("compile failed: {err}"))
}

/// Context at `BASE` with the given registers set.
pub fn ctx_with(regs: &[(Gpr, u32)]) -> MipsContext {
    let mut ctx = MipsContext::new(BASE);
    for &(reg, value) in regs {
        ctx.set_gpr(reg, value);
    }
    ctx
}

/// Executes `block`, failing the test on any syscall.
pub fn run(block: &CompiledBlock, ctx: &mut MipsContext) -> BlockExit {
    execute_block(block, ctx, &mut |op, _| panic!("unexpected syscall {op:#010x}"))
}

/// Executes `block`, recording syscall opcodes together with the PC shadow at call time.
pub fn run_recording_syscalls(
    block: &CompiledBlock,
    ctx: &mut MipsContext,
) -> (BlockExit, Vec<(u32, u32)>) {
    let mut calls = Vec::new();
    let exit = execute_block(block, ctx, &mut |op, ctx| calls.push((op, ctx.pc)));
    (exit, calls)
}
