use crate::{Block, BlockIdx, BlockKind, Definition, Instruction};
use waitcnt_idx::maps::IndexedMap;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// A register-allocated shader: a control flow graph of blocks. Block 0 is the
/// entry.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Program {
    pub blocks: IndexedMap<BlockIdx, Block>,
    /// LDS accesses issued by a previous shader part may still be in flight on
    /// entry.
    pub pending_lds_access: bool,
    /// Argument registers still being loaded by vector memory on entry.
    pub args_pending_vmem: Vec<Definition>,
    /// The program issues scalar loads of buffer or global memory.
    pub has_smem_buffer_or_global_loads: bool,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty block.
    pub fn add_block(&mut self, kind: BlockKind) -> BlockIdx {
        let idx = self.blocks.peek_next_idx();
        self.blocks.push(Block::new(idx, kind))
    }

    /// Add an edge to both the linear and the logical graph.
    pub fn add_edge(&mut self, from: BlockIdx, to: BlockIdx) {
        self.add_linear_edge(from, to);
        self.add_logical_edge(from, to);
    }

    pub fn add_linear_edge(&mut self, from: BlockIdx, to: BlockIdx) {
        self.blocks[from].linear_succs.push(to);
        self.blocks[to].linear_preds.push(from);
    }

    pub fn add_logical_edge(&mut self, from: BlockIdx, to: BlockIdx) {
        self.blocks[from].logical_succs.push(to);
        self.blocks[to].logical_preds.push(from);
    }

    pub fn block(&self, idx: BlockIdx) -> &Block {
        &self.blocks[idx]
    }

    pub fn block_mut(&mut self, idx: BlockIdx) -> &mut Block {
        &mut self.blocks[idx]
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.values().flat_map(|b| b.instructions.iter())
    }
}
