//! Implements a visitor over the blocks of an [`ir::Program`].
//! Passes implemented as the Visitor are directly invoked on
//! [`ir::Context`] to transform the program using the pass.
use super::action::{Action, VisResult};
use super::{ConstructVisitor, Named};
use waitcnt_ir::{self as ir, Context};
use waitcnt_utils::WaitcntResult;

/// The visiting interface for an [`ir::Program`].
/// [Visitor::start] is called before the first block, [Visitor::visit_block]
/// on every block in index order, and [Visitor::finish] after the last block.
///
/// A pass will usually override one or more function and rely on the default
/// implementations for the rest.
pub trait Visitor {
    /// Precondition for this pass to run on the program. If this function returns
    /// None, the pass triggers. Otherwise it aborts and logs the string as the reason.
    fn precondition(_ctx: &ir::Context) -> Option<String>
    where
        Self: Sized,
    {
        None
    }

    /// Define the traversal over a program.
    /// Calls [Visitor::start], visits each block, and finally calls
    /// [Visitor::finish].
    fn traverse_program(
        &mut self,
        prog: &mut ir::Program,
        target: &ir::TargetConfig,
    ) -> WaitcntResult<()>
    where
        Self: Sized,
    {
        self.start(prog, target)?
            .and_then(|| {
                for block in prog.blocks.values_mut() {
                    let action = self
                        .visit_block(block, target)?
                        .apply_change(&mut block.instructions);
                    if matches!(action, Action::Stop) {
                        return Ok(Action::Stop);
                    }
                }
                Ok(Action::Continue)
            })?
            .and_then(|| self.finish(prog, target))?;
        Ok(())
    }

    /// Run the visitor on a given program [`ir::Context`].
    ///
    /// After visiting the program, it calls [ConstructVisitor::clear_data] to
    /// reset the struct.
    fn do_pass(&mut self, context: &mut Context) -> WaitcntResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        if let Some(msg) = Self::precondition(&*context) {
            log::info!("Skipping `{}': {msg}", Self::name());
            return Ok(());
        }

        self.traverse_program(&mut context.program, &context.target)?;
        self.clear_data();
        Ok(())
    }

    /// Build a [Default] implementation of this pass and call [Visitor::do_pass]
    /// using it.
    #[inline(always)]
    fn do_pass_default(context: &mut Context) -> WaitcntResult<Self>
    where
        Self: ConstructVisitor + Sized + Named,
    {
        let mut visitor = Self::from(&*context)?;
        visitor.do_pass(context)?;
        Ok(visitor)
    }

    /// Executed before the traversal begins.
    fn start(
        &mut self,
        _prog: &mut ir::Program,
        _target: &ir::TargetConfig,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed on every block.
    fn visit_block(
        &mut self,
        _block: &mut ir::Block,
        _target: &ir::TargetConfig,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after the traversal ends.
    fn finish(
        &mut self,
        _prog: &mut ir::Program,
        _target: &ir::TargetConfig,
    ) -> VisResult {
        Ok(Action::Continue)
    }
}
