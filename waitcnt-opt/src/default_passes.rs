//! Defines the default passes available to [PassManager].
use crate::passes::{CoalesceDelayAlu, InsertWaits, WellFormed};
use crate::traversal::Named;
use crate::{pass_manager::PassManager, register_alias};
use waitcnt_utils::WaitcntResult;

impl PassManager {
    pub fn default_passes() -> WaitcntResult<Self> {
        // Construct the pass manager and register all passes.
        let mut pm = PassManager::default();

        // Validation passes
        pm.register_pass::<WellFormed>()?;

        // Wait-state passes
        pm.register_pass::<InsertWaits>()?;
        pm.register_pass::<CoalesceDelayAlu>()?;

        register_alias!(pm, "validate", [WellFormed]);
        register_alias!(pm, "waits", [InsertWaits, CoalesceDelayAlu]);
        register_alias!(pm, "all", ["validate", "waits"]);
        register_alias!(pm, "none", []);

        Ok(pm)
    }
}
