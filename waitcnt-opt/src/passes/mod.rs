mod coalesce_delay_alu;
pub mod insert_waits;
mod well_formed;

pub use coalesce_delay_alu::CoalesceDelayAlu;
pub use insert_waits::InsertWaits;
pub use well_formed::WellFormed;
