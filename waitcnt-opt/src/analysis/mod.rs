//! Dataflow state of wait-state insertion.
//!
//! [TargetInfo] is the static counter model of a hardware generation.
//! [WaitCtx] is the state at one program point: a [WaitEntry] per register
//! with pending producers, the counters in flight, and the per-storage
//! barrier table. Its transfer functions are split in two halves: the
//! effects of issuing an instruction (`gen`, `gen_alu`) and the waits an
//! instruction needs before issuing (`kill`).

mod alu_delay;
pub mod cfg_order;
mod clause;
mod target_info;
mod wait_ctx;
mod wait_entry;
mod wait_gen;
mod wait_kill;

pub use alu_delay::AluDelayInfo;
pub use clause::ClauseGrouper;
pub use target_info::{Counters, TargetInfo, WaitEvent, NUM_EVENTS};
pub use wait_ctx::{WaitCtx, WaitSettings};
pub use wait_entry::{VmemType, WaitEntry};
pub use wait_gen::{vmem_event, vmem_type};
