//! Shared utilities for the waitcnt compiler crates.
mod errors;
mod math;

pub use errors::{Error, WaitcntResult};
pub use math::{bits_needed_for, fits_in_bits};
