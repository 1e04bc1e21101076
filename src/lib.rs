//! # Wait-state insertion for GPU programs
//!
//! This crate plumbs together the waitcnt crates. Given a register-allocated
//! program and the hardware generation it targets, it inserts the counter
//! waits and ALU delays the program needs to read the results of asynchronous
//! operations safely.
//!
//! Most users only need [insert_wait_states]. The individual crates are
//! re-exported for building programs ([ir]) and for running passes with
//! options of their own ([opt]).
//!
//! ```
//! use waitcnt::ir::{self, BlockKind, Builder, GfxLevel, TargetConfig};
//! # fn main() -> waitcnt::utils::WaitcntResult<()> {
//! let mut prog = ir::Program::new();
//! let entry = prog.add_block(BlockKind::TOP_LEVEL);
//! Builder::for_block(prog.block_mut(entry))
//!     .sopp(ir::Opcode::SEndpgm, 0);
//! let mut ctx = ir::Context::new(prog, TargetConfig::new(GfxLevel::Gfx11));
//! waitcnt::insert_wait_states(&mut ctx)?;
//! # Ok(())
//! # }
//! ```
pub use waitcnt_idx as idx;
pub use waitcnt_ir as ir;
pub use waitcnt_opt as opt;
pub use waitcnt_utils as utils;

use opt::pass_manager::PassManager;
use utils::WaitcntResult;

/// Validate the program in `ctx`, insert waits and ALU delays, and coalesce
/// the delays. Pass options are taken from `ctx.extra_opts`.
pub fn insert_wait_states(ctx: &mut ir::Context) -> WaitcntResult<()> {
    let pm = PassManager::default_passes()?;
    log::debug!(
        "Inserting wait states for {} blocks on {}",
        ctx.program.num_blocks(),
        ctx.target.gfx_level
    );
    pm.execute_plan(ctx, &["all".to_string()], &[])
}
