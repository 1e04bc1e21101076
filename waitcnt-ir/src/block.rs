use crate::Instruction;
use bitflags::bitflags;
use std::fmt;
use waitcnt_idx::impl_index;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Index of a block in its [crate::Program].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct BlockIdx(u32);
impl_index!(BlockIdx);

impl fmt::Display for BlockIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB{}", self.0)
    }
}

bitflags! {
    /// Structural role of a block in the control flow graph.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(Serialize))]
    pub struct BlockKind: u16 {
        const TOP_LEVEL = 1 << 0;
        const LOOP_PREHEADER = 1 << 1;
        const LOOP_HEADER = 1 << 2;
        const LOOP_EXIT = 1 << 3;
        const BRANCH = 1 << 4;
        const MERGE = 1 << 5;
        const UNIFORM = 1 << 6;
        /// Target of an early exit that may be jumped to from anywhere in a
        /// block. Its waits are handled by the exit sequence itself.
        const DISCARD_EARLY_EXIT = 1 << 7;
        /// Last block of a shader part that hands its registers to the next
        /// part.
        const END_WITH_REGS = 1 << 8;
    }
}

/// A basic block.
///
/// Blocks take part in two graphs: the linear graph follows the real control
/// flow of the wave, the logical graph follows the control flow of a single
/// lane. Every logical edge has a linear counterpart but not the other way
/// around.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Block {
    pub index: BlockIdx,
    pub kind: BlockKind,
    pub instructions: Vec<Instruction>,
    pub linear_preds: Vec<BlockIdx>,
    pub linear_succs: Vec<BlockIdx>,
    pub logical_preds: Vec<BlockIdx>,
    pub logical_succs: Vec<BlockIdx>,
    pub loop_nest_depth: u32,
}

impl Block {
    pub fn new(index: BlockIdx, kind: BlockKind) -> Self {
        Block {
            index,
            kind,
            instructions: Vec::new(),
            linear_preds: Vec::new(),
            linear_succs: Vec::new(),
            logical_preds: Vec::new(),
            logical_succs: Vec::new(),
            loop_nest_depth: 0,
        }
    }

    pub fn is(&self, kind: BlockKind) -> bool {
        self.kind.intersects(kind)
    }
}
