//! Actions control the traversal of the blocks of a program.
use waitcnt_ir::Instruction;
use waitcnt_utils::WaitcntResult;

/// Result of performing a visit.
pub type VisResult = WaitcntResult<Action>;

/// Action performed at the end of visiting a block.
pub enum Action {
    /// Continue with the next block.
    Continue,
    /// Globally abort the traversal.
    Stop,
    /// Replace the instructions of the current block.
    Change(Vec<Instruction>),
}

impl Action {
    /// Run the traversal specified by `next` if this traversal succeeds.
    /// If the result of this traversal is not `Action::Continue`, do not
    /// run `next()`.
    pub(super) fn and_then<F>(self, mut next: F) -> VisResult
    where
        F: FnMut() -> VisResult,
    {
        match self {
            Action::Continue => next(),
            Action::Change(_) | Action::Stop => Ok(self),
        }
    }

    pub fn change(instructions: Vec<Instruction>) -> Self {
        Action::Change(instructions)
    }

    /// Applies the Change action if `self` is a Change action.
    /// Otherwise passes the action through unchanged
    pub(super) fn apply_change(
        self,
        instructions: &mut Vec<Instruction>,
    ) -> Action {
        match self {
            Action::Change(new) => {
                *instructions = new;
                Action::Continue
            }
            action => action,
        }
    }
}
