use criterion::{
    criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion,
};
use waitcnt::ir::{
    self, BlockIdx, BlockKind, Builder, Definition, GfxLevel, Opcode, Operand,
    PhysReg, RegClass, TargetConfig,
};

/// A loop nest of `depth` loops. Every header reads the value its body loads
/// for the next iteration, and every body issues a handful of loads and
/// stores so that several counters stay busy across the back edges.
fn loop_nest(depth: usize) -> ir::Program {
    let mut prog = ir::Program::new();
    let entry = prog.add_block(BlockKind::TOP_LEVEL);
    let mut pred = entry;
    let mut exits: Vec<(BlockIdx, BlockIdx)> = Vec::with_capacity(depth);

    for level in 0..depth {
        let header = prog.add_block(BlockKind::LOOP_HEADER);
        prog.add_edge(pred, header);
        let reg = level as u16 * 4;
        let mut bld = Builder::for_block(prog.block_mut(header));
        bld.alu(
            Opcode::VAddF32,
            Definition::new(PhysReg::vgpr(reg + 1), RegClass::V1),
            [Operand::reg(PhysReg::vgpr(reg), RegClass::V1)],
        );
        bld.load(
            Opcode::SLoadDword,
            Definition::new(PhysReg::sgpr(level as u16), RegClass::S1),
            [Operand::reg(PhysReg::sgpr(100), RegClass::S2)],
        );
        exits.push((header, prog.add_block(BlockKind::LOOP_EXIT)));
        pred = header;
    }

    let body = prog.add_block(BlockKind::empty());
    prog.add_edge(pred, body);
    let mut bld = Builder::for_block(prog.block_mut(body));
    for level in 0..depth {
        let reg = level as u16 * 4;
        bld.load(
            Opcode::GlobalLoadDword,
            Definition::new(PhysReg::vgpr(reg), RegClass::V1),
            [Operand::reg(PhysReg::vgpr(200), RegClass::V2)],
        );
        bld.store(
            Opcode::GlobalStoreDword,
            [
                Operand::reg(PhysReg::vgpr(202), RegClass::V2),
                Operand::reg(PhysReg::vgpr(reg + 1), RegClass::V1),
            ],
        );
        bld.load(
            Opcode::DsReadB32,
            Definition::new(PhysReg::vgpr(reg + 2), RegClass::V1),
            [Operand::reg(PhysReg::vgpr(204), RegClass::V1)],
        );
    }

    // Close the loops from the innermost outwards.
    let mut latch = body;
    for (header, exit) in exits.into_iter().rev() {
        prog.add_edge(latch, header);
        prog.add_edge(header, exit);
        latch = exit;
    }
    let end = prog.add_block(BlockKind::TOP_LEVEL);
    prog.add_edge(latch, end);
    Builder::for_block(prog.block_mut(end)).sopp(Opcode::SEndpgm, 0);
    prog
}

fn insert_waits_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested-loops");
    for depth in [2usize, 4, 8, 16] {
        for gfx in [GfxLevel::Gfx9, GfxLevel::Gfx11, GfxLevel::Gfx12] {
            group.bench_with_input(
                BenchmarkId::new(gfx.to_string(), depth),
                &depth,
                |b, &depth| {
                    b.iter_batched(
                        || {
                            ir::Context::new(
                                loop_nest(depth),
                                TargetConfig::new(gfx),
                            )
                        },
                        |mut ctx: ir::Context| {
                            waitcnt::insert_wait_states(&mut ctx).unwrap();
                        },
                        BatchSize::SmallInput,
                    )
                },
            );
        }
    }
    group.finish();
}

criterion_group! {
    name = insert_waits;
    config = Criterion::default().sample_size(20);
    targets = insert_waits_bench
}
criterion_main!(insert_waits);
