mod common;

use common::*;
use mipsrec_isa::Gpr;
use mipsrec_jit::host::{Cond, HostAluOp, HostInst, HostReg, Operand2, FLAGS_SAVE};
use mipsrec_jit::{BlockExit, BlockLimits, ExitDescriptor, JitOptions, MipsContext};
use pretty_assertions::assert_eq;

fn ldr(dst: HostReg, reg: Gpr) -> HostInst {
    HostInst::Ldr {
        dst,
        offset: MipsContext::gpr_offset(reg),
    }
}

fn str_(src: HostReg, reg: Gpr) -> HostInst {
    HostInst::Str {
        src,
        offset: MipsContext::gpr_offset(reg),
    }
}

#[test]
fn beq_with_addu_delay_slot_end_to_end() {
    init_tracing();
    let mut jit = jit_with(&[beq(Gpr::At, Gpr::V0, 2), addu(Gpr::V1, Gpr::A0, Gpr::A1)]);
    let block = jit.compile_block(BASE).unwrap();

    assert!(!jit.state().compiling);
    assert!(!jit.state().in_delay_slot());
    assert!(!jit.state().flags_saved());
    assert_eq!(block.num_insts, 2);
    assert_eq!(
        block.exits,
        vec![
            ExitDescriptor {
                target: 0x100c,
                slot: 0,
                code_offset: 10,
            },
            ExitDescriptor {
                target: 0x1008,
                slot: 1,
                code_offset: 11,
            },
        ]
    );

    // Taken: r1 == r2.
    let mut ctx = ctx_with(&[(Gpr::At, 7), (Gpr::V0, 7), (Gpr::A0, 40), (Gpr::A1, 2)]);
    assert_eq!(
        run(&block, &mut ctx),
        BlockExit::Linked {
            target: 0x100c,
            slot: 0
        }
    );
    assert_eq!(ctx.gpr(Gpr::V1), 42);
    assert_eq!(ctx.pc, 0x100c);

    // Not taken: the delay slot still executes.
    let mut ctx = ctx_with(&[(Gpr::At, 7), (Gpr::V0, 8), (Gpr::A0, 40), (Gpr::A1, 2)]);
    assert_eq!(
        run(&block, &mut ctx),
        BlockExit::Linked {
            target: 0x1008,
            slot: 1
        }
    );
    assert_eq!(ctx.gpr(Gpr::V1), 42);
    assert_eq!(ctx.pc, 0x1008);
}

#[test]
fn non_likely_branch_saves_flags_around_delay_slot() {
    let block = compile(&[beq(Gpr::At, Gpr::V0, 2), addu(Gpr::V1, Gpr::A0, Gpr::A1)]);
    let (r4, r5, r6) = (HostReg::R4, HostReg::R5, HostReg::R6);

    assert_eq!(
        block.code,
        vec![
            ldr(r4, Gpr::At),
            ldr(r5, Gpr::V0),
            HostInst::Cmp {
                lhs: r4,
                rhs: Operand2::Reg(r5),
            },
            HostInst::Mrs { dst: FLAGS_SAVE },
            ldr(r4, Gpr::A0),
            ldr(r5, Gpr::A1),
            HostInst::Alu {
                op: HostAluOp::Add,
                dst: r6,
                lhs: r4,
                rhs: Operand2::Reg(r5),
            },
            str_(r6, Gpr::V1),
            HostInst::Msr { src: FLAGS_SAVE },
            HostInst::BCc {
                cond: Cond::Ne,
                target: Some(11),
            },
            HostInst::Exit {
                target: 0x100c,
                slot: 0,
            },
            HostInst::Exit {
                target: 0x1008,
                slot: 1,
            },
        ]
    );
}

#[test]
fn likely_branch_tests_before_delay_slot_without_saving_flags() {
    let block = compile(&[beql(Gpr::At, Gpr::V0, 2), addu(Gpr::V1, Gpr::A0, Gpr::A1)]);

    assert!(!block
        .code
        .iter()
        .any(|inst| matches!(inst, HostInst::Mrs { .. } | HostInst::Msr { .. })));
    let bcc = block
        .code
        .iter()
        .position(|inst| matches!(inst, HostInst::BCc { .. }))
        .unwrap();
    let alu = block
        .code
        .iter()
        .position(|inst| matches!(inst, HostInst::Alu { .. }))
        .unwrap();
    assert!(bcc < alu, "branch must precede the delay slot:\n{block}");
}

#[test]
fn likely_delay_slot_runs_only_when_taken() {
    let block = compile(&[bnel(Gpr::At, Gpr::V0, 4), addiu(Gpr::T0, Gpr::T0, 1)]);

    let mut ctx = ctx_with(&[(Gpr::At, 1), (Gpr::V0, 2), (Gpr::T0, 10)]);
    assert_eq!(
        run(&block, &mut ctx),
        BlockExit::Linked {
            target: 0x1014,
            slot: 0
        }
    );
    assert_eq!(ctx.gpr(Gpr::T0), 11);

    let mut ctx = ctx_with(&[(Gpr::At, 2), (Gpr::V0, 2), (Gpr::T0, 10)]);
    assert_eq!(
        run(&block, &mut ctx),
        BlockExit::Linked {
            target: 0x1008,
            slot: 1
        }
    );
    assert_eq!(ctx.gpr(Gpr::T0), 10);
}

#[test]
fn likely_zero_compare_branch() {
    let block = compile(&[bgezl(Gpr::A0, -1), ori(Gpr::V0, Gpr::Zero, 0x55)]);

    let mut ctx = ctx_with(&[(Gpr::A0, 0)]);
    assert_eq!(run(&block, &mut ctx).next_pc(), 0x1000);
    assert_eq!(ctx.gpr(Gpr::V0), 0x55);

    let mut ctx = ctx_with(&[(Gpr::A0, 0x8000_0000)]);
    assert_eq!(run(&block, &mut ctx).next_pc(), 0x1008);
    assert_eq!(ctx.gpr(Gpr::V0), 0);
}

#[test]
fn rs_zero_equality_compares_rt_against_immediate() {
    let block = compile(&[beq(Gpr::Zero, Gpr::A0, 2), NOP]);
    assert!(block.code.contains(&HostInst::Cmp {
        lhs: HostReg::R4,
        rhs: Operand2::Imm(0),
    }));
    assert_eq!(block.code[0], ldr(HostReg::R4, Gpr::A0));

    let mut ctx = ctx_with(&[(Gpr::A0, 0)]);
    assert_eq!(run(&block, &mut ctx).next_pc(), 0x100c);
    let mut ctx = ctx_with(&[(Gpr::A0, 3)]);
    assert_eq!(run(&block, &mut ctx).next_pc(), 0x1008);
}

#[test]
fn rt_zero_compares_rs_against_immediate() {
    let block = compile(&[bne(Gpr::A1, Gpr::Zero, 2), NOP]);
    assert_eq!(block.code[0], ldr(HostReg::R4, Gpr::A1));
    assert_eq!(
        block.code[1],
        HostInst::Cmp {
            lhs: HostReg::R4,
            rhs: Operand2::Imm(0),
        }
    );
}

#[test]
fn fpu_branch_tests_condition_bit() {
    let block = compile(&[bc1t(8), NOP]);
    assert!(block.code.contains(&HostInst::Ldr {
        dst: mipsrec_jit::host::SCRATCH,
        offset: MipsContext::FPCOND_OFFSET,
    }));

    let mut ctx = ctx_with(&[]);
    ctx.fpcond = 1;
    assert_eq!(run(&block, &mut ctx).next_pc(), 0x1024);

    let mut ctx = ctx_with(&[]);
    assert_eq!(run(&block, &mut ctx).next_pc(), 0x1008);

    let block = compile(&[bc1f(8), NOP]);
    let mut ctx = ctx_with(&[]);
    assert_eq!(run(&block, &mut ctx).next_pc(), 0x1024);
}

#[test]
fn vfpu_branch_selects_cc_bit() {
    for bit in 0..6 {
        let block = compile(&[bv(true, bit, 2), NOP]);

        let mut ctx = ctx_with(&[]);
        ctx.vfpu_cc = 1 << bit;
        assert_eq!(run(&block, &mut ctx).next_pc(), 0x100c, "bit {bit}");

        // Every other bit set: still not taken.
        let mut ctx = ctx_with(&[]);
        ctx.vfpu_cc = 0x3f & !(1 << bit);
        assert_eq!(run(&block, &mut ctx).next_pc(), 0x1008, "bit {bit}");

        let block = compile(&[bv(false, bit, 2), NOP]);
        let mut ctx = ctx_with(&[]);
        ctx.vfpu_cc = 0x3f & !(1 << bit);
        assert_eq!(run(&block, &mut ctx).next_pc(), 0x100c, "bit {bit}");
    }
}

#[test]
fn straight_line_code_ends_at_block_limit() {
    let options = JitOptions {
        block_limits: BlockLimits { max_insts: 3 },
        ..JitOptions::default()
    };
    let mut jit = jit_with_options(
        &[
            addiu(Gpr::T0, Gpr::Zero, 1),
            addiu(Gpr::T1, Gpr::T0, 2),
            sll(Gpr::T2, Gpr::T1, 4),
            addiu(Gpr::T3, Gpr::Zero, 9),
        ],
        options,
    );
    let block = jit.compile_block(BASE).unwrap();

    assert_eq!(block.num_insts, 3);
    assert_eq!(block.exits.len(), 1);
    assert_eq!(block.exit(0).map(|e| e.target), Some(0x100c));

    let mut ctx = ctx_with(&[]);
    run(&block, &mut ctx);
    assert_eq!(ctx.gpr(Gpr::T0), 1);
    assert_eq!(ctx.gpr(Gpr::T1), 3);
    assert_eq!(ctx.gpr(Gpr::T2), 48);
    assert_eq!(ctx.gpr(Gpr::T3), 0);
}

#[test]
fn compile_block_output_is_readable() {
    let block = compile(&[beq(Gpr::At, Gpr::V0, 2), NOP]);
    let text = block.to_text();
    assert!(text.starts_with("block 0x00001000 (2 guest insts, 2 exits)"));
    assert!(text.contains("mrs r8, apsr"));
    assert!(text.contains("exit 0x0000100c (slot 0)"));
}

#[test]
fn nothing_touches_flags_between_restore_and_branch() {
    let forms = [
        beq(Gpr::At, Gpr::V0, 2),
        bne(Gpr::At, Gpr::Zero, 2),
        blez(Gpr::At, 2),
        bgez(Gpr::At, 2),
        bc1f(2),
        bv(false, 2, 2),
    ];
    for word in forms {
        let block = compile(&[word, slt(Gpr::T0, Gpr::A2, Gpr::A3)]);
        let msr = block
            .code
            .iter()
            .position(|inst| matches!(inst, HostInst::Msr { .. }))
            .unwrap();
        let bcc = block
            .code
            .iter()
            .position(|inst| matches!(inst, HostInst::BCc { .. }))
            .unwrap();
        let mrs = block
            .code
            .iter()
            .position(|inst| matches!(inst, HostInst::Mrs { .. }))
            .unwrap();

        assert_eq!(bcc, msr + 1, "{word:#010x}:\n{block}");
        // The delay slot's own compare lands between the save and the restore.
        assert!(
            block.code[mrs + 1..msr].iter().any(|inst| inst.writes_flags()),
            "{word:#010x}:\n{block}"
        );
        // What gets saved is the branch's own comparison.
        let saved = block.code[..mrs].iter().rev().find(|inst| inst.writes_flags());
        assert!(
            matches!(saved, Some(HostInst::Cmp { .. } | HostInst::Tst { .. })),
            "{word:#010x}:\n{block}"
        );
    }
}
