//! Internal representation of register-allocated GPU programs.
//!
//! A [Program] is a control flow graph of [Block]s holding [Instruction]s whose
//! operands are already assigned to physical registers. The representation
//! carries exactly the information needed to reason about asynchronous
//! hardware counters: instruction formats and classes, memory synchronization
//! semantics, and the linear and logical control flow edges.

// Modules defining internal structures.
mod block;
mod builder;
mod context;
mod cycles;
mod instruction;
mod opcode;
mod printer;
mod program;
mod reg;
mod sync;
mod target;
mod wait;

// Re-export types at the module level.
pub use block::{Block, BlockIdx, BlockKind};
pub use builder::Builder;
pub use context::Context;
pub use cycles::{cycle_info, CycleInfo};
pub use instruction::{
    Definition, InstrInfo, Instruction, Operand, SENDMSG_ORDERED_PS_DONE,
};
pub use opcode::{Format, InstrClass, Opcode};
pub use printer::Printer;
pub use program::Program;
pub use reg::{PhysReg, RegClass, RegType, NUM_REGS};
pub use sync::{
    MemorySyncInfo, Semantics, StorageClass, SyncScope, STORAGE_COUNT,
};
pub use target::{Errata, GfxLevel, TargetConfig};
pub use wait::{AluDelayWait, WaitImm, WaitType};
