pub mod emit;

use crate::analysis::{
    cfg_order, AluDelayInfo, ClauseGrouper, TargetInfo, WaitCtx, WaitSettings,
};
use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use emit::{emit_delay_alu, emit_waitcnt};
use std::collections::BTreeSet;
use waitcnt_idx::IndexRef;
use waitcnt_ir::{
    self as ir, BlockKind, GfxLevel, InstrInfo, Instruction, Opcode, WaitImm,
    WaitType,
};
use waitcnt_utils::{Error, WaitcntResult};

/// Inserts the waits and ALU delays a program needs to observe the results of
/// asynchronous operations.
///
/// The pass runs in two phases:
/// 1. A forward dataflow analysis over the linear and logical CFG computes the
///    wait state at the start of every block. Blocks are visited from a
///    worklist ordered by reverse postorder until no in-context changes.
/// 2. Every block is rewritten once from its stable in-context. Existing
///    waits and delays in the input are absorbed and re-emitted as part of
///    the computed ones.
///
/// Requirements on counters with nothing in flight are dropped, and the
/// waits for a clause of memory instructions are placed before its first
/// instruction.
pub struct InsertWaits {
    /// Wait for everything outstanding before every instruction.
    force_waitcnt: bool,
    /// Visits of a single block after which the analysis gives up.
    max_visits: u32,
}

impl Named for InsertWaits {
    fn name() -> &'static str {
        "insert-waits"
    }

    fn description() -> &'static str {
        "insert waits for asynchronous counters and ALU delays"
    }

    fn opts() -> Vec<PassOpt> {
        vec![
            PassOpt::new(
                "force-waitcnt",
                "wait for all outstanding counters before every instruction",
                ParseVal::Bool(false),
                PassOpt::parse_bool,
            ),
            PassOpt::new(
                "max-visits",
                "number of visits of one block before the analysis aborts",
                ParseVal::Num(256),
                PassOpt::parse_num,
            ),
        ]
    }
}

impl ConstructVisitor for InsertWaits {
    fn from(ctx: &ir::Context) -> WaitcntResult<Self>
    where
        Self: Sized,
    {
        let opts = Self::get_opts(ctx);
        let max_visits = opts["max-visits"]
            .pos_num()
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                Error::invalid_option(format!(
                    "{}:max-visits must be a positive number, got {}",
                    Self::name(),
                    opts["max-visits"]
                ))
            })?;
        Ok(InsertWaits {
            force_waitcnt: opts["force-waitcnt"].bool(),
            max_visits,
        })
    }

    fn clear_data(&mut self) {
        /* All data can be transferred between programs */
    }
}

impl InsertWaits {
    /// Compute the wait state at the start of every block.
    fn analyze<'a>(
        &self,
        prog: &ir::Program,
        info: &'a TargetInfo,
        settings: WaitSettings,
    ) -> Vec<WaitCtx<'a>> {
        let n = prog.num_blocks();
        let order = cfg_order::reverse_postorder(prog);
        let mut rank = vec![0; n];
        for (pos, idx) in order.iter().enumerate() {
            rank[idx.index()] = pos;
        }

        let mut in_ctx: Vec<WaitCtx<'a>> =
            (0..n).map(|_| WaitCtx::new(info, settings)).collect();
        let mut out_ctx = in_ctx.clone();
        let mut visits = vec![0u32; n];
        if let Some(entry) = in_ctx.first_mut() {
            entry.seed_program_entry(prog);
        }

        let mut worklist: BTreeSet<usize> = (0..n).collect();
        let mut total = 0usize;
        while let Some(pos) = worklist.pop_first() {
            let block = prog.block(order[pos]);
            let b = block.index.index();
            if block.is(BlockKind::DISCARD_EARLY_EXIT) {
                continue;
            }

            let mut ctx = in_ctx[b].clone();
            let mut changed = false;
            for pred in &block.linear_preds {
                changed |= ctx.join(&out_ctx[pred.index()], false);
            }
            for pred in &block.logical_preds {
                changed |= ctx.join(&out_ctx[pred.index()], true);
            }
            if visits[b] > 0 && !changed {
                continue;
            }

            visits[b] += 1;
            total += 1;
            assert!(
                visits[b] <= self.max_visits,
                "{} visited {} times without reaching a fixpoint",
                block.index,
                visits[b]
            );
            log::trace!("{} in: {ctx}", block.index);
            in_ctx[b] = ctx.clone();

            handle_block(&mut ctx, block, None);
            if visits[b] == 1 || ctx != out_ctx[b] {
                out_ctx[b] = ctx;
                for succ in
                    block.linear_succs.iter().chain(&block.logical_succs)
                {
                    worklist.insert(rank[succ.index()]);
                }
            }
        }

        log::debug!(
            "{}: {total} block visits for {n} blocks, at most {} per block",
            Self::name(),
            visits.iter().max().copied().unwrap_or(0)
        );
        in_ctx
    }
}

impl Visitor for InsertWaits {
    fn start(
        &mut self,
        prog: &mut ir::Program,
        target: &ir::TargetConfig,
    ) -> VisResult {
        let info = TargetInfo::new(target);
        let settings = WaitSettings {
            force_waitcnt: self.force_waitcnt,
            ..WaitSettings::for_program(prog)
        };
        let in_ctx = self.analyze(prog, &info, settings);

        for (block, mut ctx) in prog.blocks.values_mut().zip(in_ctx) {
            if block.is(BlockKind::DISCARD_EARLY_EXIT) {
                continue;
            }
            let mut instructions = Vec::with_capacity(block.instructions.len());
            handle_block(&mut ctx, block, Some(&mut instructions));
            block.instructions = instructions;
        }

        // The rewrite covers every block.
        Ok(Action::Stop)
    }
}

fn is_absorbed(instr: &Instruction, is_wait: bool) -> bool {
    is_wait || instr.is_barrier() || instr.opcode == Opcode::SDelayAlu
}

/// Run the transfer function of `block` on `ctx`. With `out`, also append the
/// rewritten instructions of the block to it.
fn handle_block(
    ctx: &mut WaitCtx,
    block: &ir::Block,
    mut out: Option<&mut Vec<Instruction>>,
) {
    let gfx_level = ctx.gfx_level();
    let info = ctx.info();
    let instrs = &block.instructions;

    let mut queued_imm = WaitImm::default();
    let mut queued_delay = AluDelayInfo::default();
    let mut clause_end = 0;

    for (i, instr) in instrs.iter().enumerate() {
        let mut parsed = WaitImm::default();
        let is_wait = parsed.unpack(gfx_level, instr);
        if is_wait {
            ctx.drop_idle_counters(&mut parsed);
            queued_imm.combine(&parsed);
        }
        if let Some(delay) = AluDelayInfo::parse(instr) {
            queued_delay.combine(&delay);
        }

        ctx.kill(&mut queued_imm, &mut queued_delay, instr, instr.sync());

        // Pull the waits of the whole clause in front of its first
        // instruction.
        if i >= clause_end || !queued_imm.empty() {
            clause_end = i + 1;
            let mut clause: Option<ClauseGrouper> = None;
            while let Some(next) = instrs.get(clause_end) {
                if !Instruction::should_form_clause(instr, next) {
                    break;
                }
                let grouper =
                    clause.get_or_insert_with(|| ClauseGrouper::new(instr));
                if !grouper.admit(next) {
                    break;
                }
                ctx.kill(&mut queued_imm, &mut queued_delay, next, next.sync());
                clause_end += 1;
            }
        }

        if gfx_level >= GfxLevel::Gfx11 {
            ctx.gen_alu(instr);
        }
        ctx.gen(instr);

        if is_absorbed(instr, is_wait) {
            continue;
        }

        let mut absorbed_exp = None;
        if matches!(instr.info, InstrInfo::VinterpInreg { .. })
            && queued_imm.is_set(WaitType::Exp)
        {
            absorbed_exp = Some(queued_imm[WaitType::Exp]);
            queued_imm[WaitType::Exp] = WaitImm::UNSET;
        }

        flush(info, out.as_deref_mut(), &mut queued_imm, &mut queued_delay);
        if let Some(out) = out.as_deref_mut() {
            let mut instr = instr.clone();
            if let (Some(exp), InstrInfo::VinterpInreg { wait_exp }) =
                (absorbed_exp, &mut instr.info)
            {
                *wait_exp = (*wait_exp).min(exp);
            }
            out.push(instr);
        }

        ctx.after_issue(&mut queued_imm, instr);
    }

    if block.is(BlockKind::END_WITH_REGS) {
        ctx.force_waitcnt(&mut queued_imm);
    }
    flush(info, out, &mut queued_imm, &mut queued_delay);
}

/// Emit the queued wait and delay, if any, and reset both.
fn flush(
    info: &TargetInfo,
    out: Option<&mut Vec<Instruction>>,
    imm: &mut WaitImm,
    delay: &mut AluDelayInfo,
) {
    if let Some(out) = out {
        if !imm.empty() {
            emit_waitcnt(info, out, imm);
        }
        if !delay.empty() {
            emit_delay_alu(out, delay);
        }
    }
    *imm = WaitImm::default();
    *delay = AluDelayInfo::default();
}
