//! # Wait-state insertion
//!
//! GPUs complete memory accesses, exports and messages asynchronously and
//! track the number of operations still in flight in a handful of hardware
//! counters. A consumer of an asynchronous result has to wait until the
//! counter covering its producer drops low enough, and on newer generations
//! ALU results need explicit delays as well.
//!
//! This crate contains the analyses and passes that compute these waits for a
//! register-allocated [waitcnt_ir::Program]:
//! - [analysis] holds the dataflow state (per-register hazard entries, block
//!   contexts, the target counter model) and the transfer functions.
//! - [passes] holds the passes: validation, wait insertion, and delay
//!   coalescing.
//! - [pass_manager] and [traversal] provide the pass framework.
pub mod analysis;
pub mod default_passes;
pub mod pass_manager;
pub mod passes;
pub mod traversal;
