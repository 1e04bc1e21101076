use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use waitcnt_ir::{self as ir, GfxLevel, Opcode};
use waitcnt_utils::{Error, WaitcntResult};

/// Largest skip distance the `s_delay_alu` encoding can hold.
const MAX_SKIP: u64 = 5;

/// Merges an `s_delay_alu` into an earlier one in the same block.
///
/// The second condition field of `s_delay_alu` applies to the instruction
/// `skip + 1` instructions after the delay. When an earlier delay in the block
/// has its second field free and sits close enough, a later delay is folded
/// into it:
/// ```text
/// s_delay_alu instid0(VALU_DEP_1)
/// v_add_f32 v1, v0, v0
/// s_delay_alu instid0(VALU_DEP_2)
/// v_mul_f32 v2, v0, v0
/// ```
/// becomes
/// ```text
/// s_delay_alu instid0(VALU_DEP_1) | instskip(NEXT) | instid1(VALU_DEP_2)
/// v_add_f32 v1, v0, v0
/// v_mul_f32 v2, v0, v0
/// ```
pub struct CoalesceDelayAlu {
    max_skip: u64,
}

impl Named for CoalesceDelayAlu {
    fn name() -> &'static str {
        "coalesce-delay-alu"
    }

    fn description() -> &'static str {
        "fold s_delay_alu instructions into earlier ones using the skip field"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "max-skip",
            "largest number of instructions between two merged delays",
            ParseVal::Num(MAX_SKIP as i64),
            PassOpt::parse_num,
        )]
    }
}

impl ConstructVisitor for CoalesceDelayAlu {
    fn from(ctx: &ir::Context) -> WaitcntResult<Self>
    where
        Self: Sized,
    {
        let opts = Self::get_opts(ctx);
        let max_skip = opts["max-skip"]
            .pos_num()
            .filter(|n| *n <= MAX_SKIP)
            .ok_or_else(|| {
                Error::invalid_option(format!(
                    "{}:max-skip must be between 0 and {MAX_SKIP}, got {}",
                    Self::name(),
                    opts["max-skip"]
                ))
            })?;
        Ok(CoalesceDelayAlu { max_skip })
    }

    fn clear_data(&mut self) {}
}

impl Visitor for CoalesceDelayAlu {
    fn precondition(ctx: &ir::Context) -> Option<String>
    where
        Self: Sized,
    {
        if ctx.target.gfx_level < GfxLevel::Gfx11 {
            Some(format!("{} has no s_delay_alu", ctx.target.gfx_level))
        } else {
            None
        }
    }

    fn visit_block(
        &mut self,
        block: &mut ir::Block,
        _target: &ir::TargetConfig,
    ) -> VisResult {
        let old = std::mem::take(&mut block.instructions);
        let mut instructions = Vec::with_capacity(old.len());
        // Position in `instructions` of the delay whose second field is free.
        let mut prev: Option<usize> = None;

        for instr in old {
            if instr.opcode != Opcode::SDelayAlu {
                instructions.push(instr);
                continue;
            }
            let imm = instr.imm().unwrap_or(0);
            let pos = instructions.len();
            let merge_into = prev.filter(|p| {
                imm != 0
                    && imm >> 7 == 0
                    && (pos - p - 1) as u64 <= self.max_skip
            });

            match merge_into {
                Some(p) => {
                    let skip = (pos - p - 1) as u16;
                    if let Some(prev_imm) = instructions[p].imm_mut() {
                        *prev_imm |= (skip << 4) | (imm << 7);
                    }
                    prev = None;
                }
                None => {
                    prev = (imm >> 7 == 0).then_some(pos);
                    instructions.push(instr);
                }
            }
        }

        Ok(Action::change(instructions))
    }
}
