use crate::traversal::{Action, Named, VisResult, Visitor};
use waitcnt_idx::IndexRef;
use waitcnt_ir::{
    self as ir, BlockIdx, Format, InstrInfo, Instruction, Opcode, PhysReg,
    RegClass, RegType, NUM_REGS,
};
use waitcnt_utils::{Error, WaitcntResult};

/// Pass to check the structural properties the wait-state passes rely on:
/// 1. Every CFG edge is recorded on both of its ends and points at a block of
///    the program.
/// 2. Register operands and definitions lie inside the register file and the
///    register type of their class matches the register.
/// 3. Exports have an operand for every enabled channel.
/// 4. LDS direct loads and messages with a return value have a destination.
/// 5. Image instructions have a resource descriptor in scalar registers.
#[derive(Default)]
pub struct WellFormed;

impl Named for WellFormed {
    fn name() -> &'static str {
        "well-formed"
    }

    fn description() -> &'static str {
        "Check the structure of the CFG and the register operands"
    }
}

fn check_edges(
    prog: &ir::Program,
    from: BlockIdx,
    succs: &[BlockIdx],
    preds_of: impl Fn(&ir::Block) -> &[BlockIdx],
    graph: &str,
) -> WaitcntResult<()> {
    for succ in succs {
        if succ.index() >= prog.num_blocks() {
            return Err(Error::malformed_program(format!(
                "{from} has a {graph} edge to missing block {succ}"
            )));
        }
        if !preds_of(prog.block(*succ)).contains(&from) {
            return Err(Error::malformed_program(format!(
                "{graph} edge {from} -> {succ} is missing from the predecessors of {succ}"
            )));
        }
    }
    Ok(())
}

fn check_reg(
    instr: &Instruction,
    reg: PhysReg,
    rc: RegClass,
) -> WaitcntResult<()> {
    if reg.0 as usize + rc.size() as usize > NUM_REGS {
        return Err(Error::malformed_program(format!(
            "{reg} of class {rc} is outside of the register file in `{instr}'"
        )));
    }
    let is_vgpr = rc.ty() == RegType::Vgpr;
    if reg.is_vgpr() != is_vgpr {
        return Err(Error::malformed_program(format!(
            "{reg} does not match register class {rc} in `{instr}'"
        )));
    }
    Ok(())
}

fn check_instr(instr: &Instruction) -> WaitcntResult<()> {
    for op in &instr.operands {
        if let ir::Operand::Reg { reg, rc } = *op {
            check_reg(instr, reg, rc)?;
        }
    }
    for def in &instr.definitions {
        check_reg(instr, def.reg, def.rc)?;
    }

    match (instr.format(), instr.info) {
        (
            Format::Exp,
            InstrInfo::Export {
                enabled_mask,
                compressed,
                ..
            },
        ) => {
            let needed = (0..4)
                .filter(|i| enabled_mask & (1 << i) != 0)
                .map(|i| if compressed { (i >> 1) + 1 } else { i + 1 })
                .max()
                .unwrap_or(0);
            if instr.operands.len() < needed {
                return Err(Error::malformed_program(format!(
                    "export enables {needed} operands but has {} in `{instr}'",
                    instr.operands.len()
                )));
            }
        }
        (Format::Exp, _) => {
            return Err(Error::malformed_program(format!(
                "export without export info: `{instr}'"
            )));
        }
        (Format::Ldsdir, _) if instr.definitions.is_empty() => {
            return Err(Error::malformed_program(format!(
                "LDS direct load without destination: `{instr}'"
            )));
        }
        (Format::Mimg, _) => {
            let has_resource = instr
                .operands
                .first()
                .and_then(ir::Operand::reg_class)
                .is_some_and(|rc| rc.ty() == RegType::Sgpr);
            if !has_resource {
                return Err(Error::malformed_program(format!(
                    "image instruction without resource descriptor: `{instr}'"
                )));
            }
        }
        _ => (),
    }

    if matches!(instr.opcode, Opcode::SSendmsgRtnB32 | Opcode::SSendmsgRtnB64)
        && instr.definitions.is_empty()
    {
        return Err(Error::malformed_program(format!(
            "message with return without destination: `{instr}'"
        )));
    }
    Ok(())
}

impl Visitor for WellFormed {
    fn start(
        &mut self,
        prog: &mut ir::Program,
        _target: &ir::TargetConfig,
    ) -> VisResult {
        for block in prog.blocks.values() {
            let from = block.index;
            check_edges(
                prog,
                from,
                &block.linear_succs,
                |b| b.linear_preds.as_slice(),
                "linear",
            )?;
            check_edges(
                prog,
                from,
                &block.logical_succs,
                |b| b.logical_preds.as_slice(),
                "logical",
            )?;
            for pred in block.linear_preds.iter().chain(&block.logical_preds) {
                if pred.index() >= prog.num_blocks() {
                    return Err(Error::malformed_program(format!(
                        "{from} has missing predecessor {pred}"
                    )));
                }
            }
            for pred in &block.linear_preds {
                if !prog.block(*pred).linear_succs.contains(&from) {
                    return Err(Error::malformed_program(format!(
                        "linear edge {pred} -> {from} is missing from the successors of {pred}"
                    )));
                }
            }
            for pred in &block.logical_preds {
                if !prog.block(*pred).logical_succs.contains(&from) {
                    return Err(Error::malformed_program(format!(
                        "logical edge {pred} -> {from} is missing from the successors of {pred}"
                    )));
                }
            }
        }
        Ok(Action::Continue)
    }

    fn visit_block(
        &mut self,
        block: &mut ir::Block,
        _target: &ir::TargetConfig,
    ) -> VisResult {
        for instr in &block.instructions {
            check_instr(instr).map_err(|err| {
                err.with_post_msg(Some(format!("in block {}", block.index)))
            })?;
        }
        Ok(Action::Continue)
    }
}
