use itertools::Itertools;
use proptest::prelude::*;
use waitcnt::insert_wait_states;
use waitcnt::ir::{
    self, BlockIdx, BlockKind, Builder, Definition, GfxLevel, Instruction,
    MemorySyncInfo, Opcode, Operand, PhysReg, RegClass, StorageClass,
    TargetConfig, WaitImm, WaitType,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn v(n: u16) -> PhysReg {
    PhysReg::vgpr(n)
}

fn global_load(bld: &mut Builder, dst: u16, addr: u16) {
    bld.load(
        Opcode::GlobalLoadDword,
        Definition::new(v(dst), RegClass::V1),
        [Operand::reg(v(addr), RegClass::V2)],
    );
}

fn global_load_x2(bld: &mut Builder, dst: u16, addr: u16) {
    bld.load(
        Opcode::GlobalLoadDwordx2,
        Definition::new(v(dst), RegClass::V2),
        [Operand::reg(v(addr), RegClass::V2)],
    );
}

fn valu(bld: &mut Builder, op: Opcode, dst: u16, src: u16) {
    bld.alu(
        op,
        Definition::new(v(dst), RegClass::V1),
        [Operand::reg(v(src), RegClass::V1)],
    );
}

fn run(prog: ir::Program, gfx: GfxLevel, opts: &[&str]) -> ir::Program {
    init_logger();
    let mut ctx = ir::Context::new(prog, TargetConfig::new(gfx))
        .with_opts(opts.iter().copied());
    insert_wait_states(&mut ctx).unwrap();
    ctx.program
}

fn opcodes(prog: &ir::Program, b: BlockIdx) -> Vec<Opcode> {
    prog.block(b).instructions.iter().map(|i| i.opcode).collect()
}

fn waitcnt(gfx: GfxLevel, instr: &Instruction) -> WaitImm {
    assert_eq!(instr.opcode, Opcode::SWaitcnt);
    WaitImm::from_packed(gfx, instr.imm().unwrap())
}

fn single_block(build: impl FnOnce(&mut Builder)) -> (ir::Program, BlockIdx) {
    let mut prog = ir::Program::new();
    let b = prog.add_block(BlockKind::TOP_LEVEL);
    build(&mut Builder::for_block(prog.block_mut(b)));
    (prog, b)
}

#[test]
fn load_feeding_an_address_waits_for_it() {
    let gfx = GfxLevel::Gfx10_3;
    let (prog, b) = single_block(|bld| {
        global_load(bld, 0, 10);
        global_load(bld, 2, 0);
    });

    let prog = run(prog, gfx, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![
            Opcode::GlobalLoadDword,
            Opcode::SWaitcnt,
            Opcode::GlobalLoadDword
        ]
    );
    let wait = waitcnt(gfx, &prog.block(b).instructions[1]);
    assert_eq!(wait, WaitImm::zero([WaitType::Vm]));
}

#[test]
fn independent_instructions_do_not_wait() {
    let (prog, b) = single_block(|bld| {
        global_load(bld, 0, 10);
        valu(bld, Opcode::VAddF32, 5, 6);
    });

    let prog = run(prog, GfxLevel::Gfx10_3, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![Opcode::GlobalLoadDword, Opcode::VAddF32]
    );
}

#[test]
fn force_waitcnt_drains_before_every_instruction() {
    let (prog, b) = single_block(|bld| {
        global_load(bld, 0, 10);
        valu(bld, Opcode::VAddF32, 5, 6);
    });

    let prog =
        run(prog, GfxLevel::Gfx10_3, &["insert-waits:force-waitcnt"]);
    assert_eq!(
        opcodes(&prog, b),
        vec![Opcode::GlobalLoadDword, Opcode::SWaitcnt, Opcode::VAddF32]
    );
}

/// Builds `entry -> {left, right} -> merge`, with a load of v0 on the left
/// only when `load_left` is set, and a use of v0 in `merge`.
fn diamond(load_left: bool) -> (ir::Program, [BlockIdx; 4]) {
    let mut prog = ir::Program::new();
    let entry = prog.add_block(BlockKind::TOP_LEVEL | BlockKind::BRANCH);
    let left = prog.add_block(BlockKind::empty());
    let right = prog.add_block(BlockKind::empty());
    let merge = prog.add_block(BlockKind::TOP_LEVEL | BlockKind::MERGE);
    prog.add_edge(entry, left);
    prog.add_edge(entry, right);
    prog.add_edge(left, merge);
    prog.add_edge(right, merge);

    if load_left {
        global_load(&mut Builder::for_block(prog.block_mut(left)), 0, 10);
    }
    valu(
        &mut Builder::for_block(prog.block_mut(right)),
        Opcode::VAddF32,
        5,
        6,
    );
    valu(
        &mut Builder::for_block(prog.block_mut(merge)),
        Opcode::VAddF32,
        1,
        0,
    );
    (prog, [entry, left, right, merge])
}

#[test]
fn diamond_merge_keeps_the_pending_load() {
    let gfx = GfxLevel::Gfx10_3;
    let (prog, [_, left, right, merge]) = diamond(true);

    let prog = run(prog, gfx, &[]);
    assert_eq!(opcodes(&prog, left), vec![Opcode::GlobalLoadDword]);
    assert_eq!(opcodes(&prog, right), vec![Opcode::VAddF32]);
    assert_eq!(
        opcodes(&prog, merge),
        vec![Opcode::SWaitcnt, Opcode::VAddF32]
    );
    let wait = waitcnt(gfx, &prog.block(merge).instructions[0]);
    assert_eq!(wait[WaitType::Vm], 0);
}

#[test]
fn diamond_without_load_needs_no_wait() {
    let (prog, [_, _, _, merge]) = diamond(false);
    let prog = run(prog, GfxLevel::Gfx10_3, &[]);
    assert_eq!(opcodes(&prog, merge), vec![Opcode::VAddF32]);
}

/// Two nested loops. The inner header reads v0, which the inner body loads
/// for the next iteration.
fn nested_loops() -> (ir::Program, BlockIdx) {
    let mut prog = ir::Program::new();
    let entry = prog.add_block(BlockKind::TOP_LEVEL);
    let outer = prog.add_block(BlockKind::LOOP_HEADER);
    let inner = prog.add_block(BlockKind::LOOP_HEADER);
    let body = prog.add_block(BlockKind::empty());
    let latch = prog.add_block(BlockKind::LOOP_EXIT);
    let exit = prog.add_block(BlockKind::TOP_LEVEL | BlockKind::LOOP_EXIT);
    prog.add_edge(entry, outer);
    prog.add_edge(outer, inner);
    prog.add_edge(inner, body);
    prog.add_edge(body, inner);
    prog.add_edge(inner, latch);
    prog.add_edge(latch, outer);
    prog.add_edge(latch, exit);

    valu(
        &mut Builder::for_block(prog.block_mut(inner)),
        Opcode::VAddF32,
        2,
        0,
    );
    {
        let mut bld = Builder::for_block(prog.block_mut(body));
        global_load(&mut bld, 0, 10);
        bld.store(
            Opcode::GlobalStoreDword,
            [
                Operand::reg(v(12), RegClass::V2),
                Operand::reg(v(2), RegClass::V1),
            ],
        );
    }
    valu(
        &mut Builder::for_block(prog.block_mut(latch)),
        Opcode::VAddF32,
        3,
        0,
    );
    (prog, inner)
}

#[test]
fn nested_loops_reach_a_fixpoint() {
    let gfx = GfxLevel::Gfx10_3;
    let (prog, inner) = nested_loops();

    let prog = run(prog, gfx, &[]);
    assert_eq!(
        opcodes(&prog, inner),
        vec![Opcode::SWaitcnt, Opcode::VAddF32]
    );
    let wait = waitcnt(gfx, &prog.block(inner).instructions[0]);
    assert_eq!(wait[WaitType::Vm], 0);
}

#[test]
#[should_panic(expected = "without reaching a fixpoint")]
fn visit_cap_catches_revisits() {
    let (prog, _) = nested_loops();
    run(prog, GfxLevel::Gfx10_3, &["insert-waits:max-visits=1"]);
}

#[test]
fn clause_waits_are_hoisted_in_front_of_the_clause() {
    let gfx = GfxLevel::Gfx10_3;
    let (prog, b) = single_block(|bld| {
        // Address producers.
        global_load_x2(bld, 20, 30);
        global_load_x2(bld, 22, 30);
        global_load_x2(bld, 24, 30);
        valu(bld, Opcode::VMovB32, 40, 41);
        // The clause.
        global_load(bld, 0, 20);
        global_load(bld, 1, 22);
        global_load(bld, 2, 24);
        valu(bld, Opcode::VAddF32, 3, 2);
    });

    let prog = run(prog, gfx, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![
            Opcode::GlobalLoadDwordx2,
            Opcode::GlobalLoadDwordx2,
            Opcode::GlobalLoadDwordx2,
            Opcode::VMovB32,
            Opcode::SWaitcnt,
            Opcode::GlobalLoadDword,
            Opcode::GlobalLoadDword,
            Opcode::GlobalLoadDword,
            Opcode::SWaitcnt,
            Opcode::VAddF32,
        ]
    );
    let instrs = &prog.block(b).instructions;
    assert_eq!(waitcnt(gfx, &instrs[4])[WaitType::Vm], 0);
    assert_eq!(waitcnt(gfx, &instrs[8])[WaitType::Vm], 0);
}

#[test]
fn satisfied_waits_collapse() {
    let gfx = GfxLevel::Gfx10_3;
    let vm0 = WaitImm::zero([WaitType::Vm]).pack(gfx);
    let (prog, b) = single_block(|bld| {
        global_load(bld, 0, 10);
        bld.sopp(Opcode::SWaitcnt, vm0);
        bld.sopp(Opcode::SWaitcnt, vm0);
        valu(bld, Opcode::VAddF32, 1, 0);
    });

    let prog = run(prog, gfx, &[]);
    let expected =
        vec![Opcode::GlobalLoadDword, Opcode::SWaitcnt, Opcode::VAddF32];
    assert_eq!(opcodes(&prog, b), expected);

    // The output is already minimal.
    let again = run(prog, gfx, &[]);
    assert_eq!(opcodes(&again, b), expected);
    let wait = waitcnt(gfx, &again.block(b).instructions[1]);
    assert_eq!(wait, WaitImm::zero([WaitType::Vm]));
}

#[test]
fn gfx12_combines_load_and_ds_waits() {
    let (prog, b) = single_block(|bld| {
        global_load(bld, 0, 10);
        bld.load(
            Opcode::DsReadB32,
            Definition::new(v(1), RegClass::V1),
            [Operand::reg(v(12), RegClass::V1)],
        );
        bld.alu(
            Opcode::VAddF32,
            Definition::new(v(2), RegClass::V1),
            [
                Operand::reg(v(0), RegClass::V1),
                Operand::reg(v(1), RegClass::V1),
            ],
        );
    });

    let prog = run(prog, GfxLevel::Gfx12, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![
            Opcode::GlobalLoadDword,
            Opcode::DsReadB32,
            Opcode::SWaitLoadcntDscnt,
            Opcode::VAddF32
        ]
    );
    assert_eq!(prog.block(b).instructions[2].imm(), Some(0));
}

#[test]
fn gfx12_scalar_loads_wait_on_kmcnt() {
    let (prog, b) = single_block(|bld| {
        bld.load(
            Opcode::SLoadDword,
            Definition::new(PhysReg::sgpr(0), RegClass::S1),
            [Operand::reg(PhysReg::sgpr(2), RegClass::S2)],
        );
        bld.alu(
            Opcode::SAddU32,
            Definition::new(PhysReg::sgpr(1), RegClass::S1),
            [Operand::reg(PhysReg::sgpr(0), RegClass::S1)],
        );
    });

    let prog = run(prog, GfxLevel::Gfx12, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![Opcode::SLoadDword, Opcode::SWaitKmcnt, Opcode::SAddU32]
    );
    assert_eq!(prog.block(b).instructions[1].imm(), Some(0));
}

#[test]
fn transcendental_result_gets_a_delay() {
    let (prog, b) = single_block(|bld| {
        valu(bld, Opcode::VRcpF32, 0, 10);
        valu(bld, Opcode::VAddF32, 1, 0);
    });

    let prog = run(prog, GfxLevel::Gfx11, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![Opcode::VRcpF32, Opcode::SDelayAlu, Opcode::VAddF32]
    );
    // TRANS32_DEP_1
    assert_eq!(prog.block(b).instructions[1].imm(), Some(5));
}

#[test]
fn dependent_delays_are_coalesced() {
    let (prog, b) = single_block(|bld| {
        valu(bld, Opcode::VRcpF32, 0, 10);
        valu(bld, Opcode::VAddF32, 1, 0);
        valu(bld, Opcode::VAddF32, 2, 1);
    });

    let prog = run(prog, GfxLevel::Gfx11, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![
            Opcode::VRcpF32,
            Opcode::SDelayAlu,
            Opcode::VAddF32,
            Opcode::VAddF32
        ]
    );
    // TRANS32_DEP_1, skip one instruction, then VALU_DEP_1.
    assert_eq!(
        prog.block(b).instructions[1].imm(),
        Some(5 | (1 << 4) | (1 << 7))
    );
}

fn s(n: u16) -> PhysReg {
    PhysReg::sgpr(n)
}

fn buffer_load(bld: &mut Builder, dst: u16) {
    bld.load(
        Opcode::SBufferLoadDword,
        Definition::new(s(dst), RegClass::S1),
        [Operand::reg(s(0), RegClass::S4)],
    )
    .set_sync(MemorySyncInfo::storage(StorageClass::BUFFER));
}

fn buffer_store(bld: &mut Builder, data: u16) {
    bld.store(
        Opcode::SBufferStoreDword,
        [
            Operand::reg(s(0), RegClass::S4),
            Operand::reg(s(data), RegClass::S1),
        ],
    )
    .set_sync(MemorySyncInfo::storage(StorageClass::BUFFER));
}

#[test]
fn scalar_load_after_scalar_store_waits_for_the_store() {
    let gfx = GfxLevel::Gfx10_3;
    let (prog, b) = single_block(|bld| {
        buffer_store(bld, 8);
        buffer_load(bld, 9);
    });

    let prog = run(prog, gfx, &[]);
    assert_eq!(
        opcodes(&prog, b),
        vec![
            Opcode::SBufferStoreDword,
            Opcode::SWaitcnt,
            Opcode::SBufferLoadDword
        ]
    );
    let wait = waitcnt(gfx, &prog.block(b).instructions[1]);
    assert_eq!(wait, WaitImm::zero([WaitType::Lgkm]));
}

#[test]
fn scalar_store_pending_across_a_back_edge_is_waited_for() {
    let gfx = GfxLevel::Gfx10_3;
    let mut prog = ir::Program::new();
    let entry = prog.add_block(BlockKind::TOP_LEVEL);
    let header = prog.add_block(BlockKind::LOOP_HEADER);
    let body = prog.add_block(BlockKind::empty());
    let exit = prog.add_block(BlockKind::LOOP_EXIT);
    prog.add_edge(entry, header);
    prog.add_edge(header, body);
    prog.add_edge(body, header);
    prog.add_edge(body, exit);

    // The entry leaves a scalar load in flight so the counter is busy on
    // both incoming edges of the header.
    buffer_load(&mut Builder::for_block(prog.block_mut(entry)), 4);
    let mut bld = Builder::for_block(prog.block_mut(header));
    buffer_load(&mut bld, 9);
    bld.alu(
        Opcode::SAddU32,
        Definition::new(s(10), RegClass::S1),
        [Operand::reg(s(9), RegClass::S1)],
    );
    buffer_store(&mut Builder::for_block(prog.block_mut(body)), 8);

    let prog = run(prog, gfx, &[]);
    assert_eq!(
        opcodes(&prog, header),
        vec![
            Opcode::SWaitcnt,
            Opcode::SBufferLoadDword,
            Opcode::SWaitcnt,
            Opcode::SAddU32
        ]
    );
    let instrs = &prog.block(header).instructions;
    assert_eq!(waitcnt(gfx, &instrs[0]), WaitImm::zero([WaitType::Lgkm]));
}

#[test]
fn malformed_programs_are_rejected() {
    let mut prog = ir::Program::new();
    let a = prog.add_block(BlockKind::TOP_LEVEL);
    let b = prog.add_block(BlockKind::TOP_LEVEL);
    prog.add_linear_edge(a, b);
    prog.block_mut(b).linear_preds.clear();

    let mut ctx =
        ir::Context::new(prog, TargetConfig::new(GfxLevel::Gfx10_3));
    assert!(insert_wait_states(&mut ctx).is_err());
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Load { dst: u16, addr: u16 },
    Alu { dst: u16, src: u16 },
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0u16..8, 8u16..14).prop_map(|(dst, addr)| Op::Load { dst, addr }),
            (0u16..8, 0u16..8).prop_map(|(dst, src)| Op::Alu { dst, src }),
        ],
        1..32,
    )
}

fn build(ops: &[Op]) -> (ir::Program, BlockIdx) {
    single_block(|bld| {
        for op in ops {
            match *op {
                Op::Load { dst, addr } => global_load(bld, dst, addr),
                Op::Alu { dst, src } => valu(bld, Opcode::VAddF32, dst, src),
            }
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn only_waits_are_inserted(ops in arb_ops()) {
        let (prog, b) = build(&ops);
        let before = opcodes(&prog, b);
        let prog = run(prog, GfxLevel::Gfx9, &[]);
        let after = opcodes(&prog, b)
            .into_iter()
            .filter(|op| *op != Opcode::SWaitcnt)
            .collect_vec();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn loaded_values_are_waited_for(ops in arb_ops()) {
        let gfx = GfxLevel::Gfx9;
        let (prog, b) = build(&ops);
        let prog = run(prog, gfx, &[]);
        let instrs = &prog.block(b).instructions;

        for (use_pos, instr) in instrs.iter().enumerate() {
            let src = match instr.operands.first() {
                Some(Operand::Reg { reg, .. })
                    if instr.opcode == Opcode::VAddF32 => *reg,
                _ => continue,
            };
            // The last instruction writing the source before its use.
            let Some(def_pos) = instrs[..use_pos]
                .iter()
                .rposition(|i| i.definitions.iter().any(|d| d.reg == src))
            else {
                continue;
            };
            if instrs[def_pos].opcode != Opcode::GlobalLoadDword {
                continue;
            }
            // Some wait in between has to leave fewer loads in flight than
            // were issued after the producer.
            let satisfied = instrs[def_pos + 1..use_pos]
                .iter()
                .positions(|i| i.opcode == Opcode::SWaitcnt)
                .any(|rel| {
                    let wait_pos = def_pos + 1 + rel;
                    let vm = waitcnt(gfx, &instrs[wait_pos])[WaitType::Vm];
                    let issued_after = instrs[def_pos + 1..wait_pos]
                        .iter()
                        .filter(|i| i.opcode == Opcode::GlobalLoadDword)
                        .count();
                    vm != WaitImm::UNSET && issued_after >= vm as usize
                });
            prop_assert!(
                satisfied,
                "{} at {} reads the load at {} without waiting",
                instr,
                use_pos,
                def_pos
            );
        }
    }
}
