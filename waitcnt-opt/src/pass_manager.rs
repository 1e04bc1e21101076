//! Define the PassManager structure that is used to construct and run pass
//! passes.
use crate::traversal;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use waitcnt_ir as ir;
use waitcnt_utils::{Error, WaitcntResult};

pub type PassResult<T> = WaitcntResult<T>;

/// Top-level type for all passes that transform an [ir::Context]
pub type PassClosure = Box<dyn Fn(&mut ir::Context) -> PassResult<()>>;

/// Structure that tracks all registered passes for the compiler.
#[derive(Default)]
pub struct PassManager {
    /// All registered passes
    passes: HashMap<String, PassClosure>,
    /// Tracks alias for groups of passes that run together.
    aliases: HashMap<String, Vec<String>>,
}

impl PassManager {
    /// Register a new pass and return an error if another pass with the
    /// same name has already been registered.
    ///
    /// ## Example
    /// ```rust
    /// # use waitcnt_opt::{pass_manager::PassManager, passes::WellFormed};
    /// # fn main() -> waitcnt_utils::WaitcntResult<()> {
    /// let mut pm = PassManager::default();
    /// pm.register_pass::<WellFormed>()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn register_pass<Pass>(&mut self) -> PassResult<()>
    where
        Pass:
            traversal::Visitor + traversal::ConstructVisitor + traversal::Named,
    {
        let name = Pass::name().to_string();
        if self.passes.contains_key(&name) {
            return Err(Error::misc(format!(
                "Pass with name '{}' is already registered.",
                name
            )));
        }
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("Registered {name}: {}", Pass::description());
            for opt in Pass::opts() {
                log::debug!(
                    "  {name}:{}: {} (default: {})",
                    opt.name(),
                    opt.description(),
                    opt.default()
                );
            }
        }
        self.passes.insert(
            name,
            Box::new(|ctx| {
                Pass::do_pass_default(ctx)?;
                Ok(())
            }),
        );
        Ok(())
    }

    /// Adds a new alias for groups of passes. An alias is a list of strings
    /// that represent valid pass names OR an alias.
    /// The passes and aliases are executed in the order of specification.
    pub fn add_alias(
        &mut self,
        name: String,
        passes: Vec<String>,
    ) -> PassResult<()> {
        if self.aliases.contains_key(&name) {
            return Err(Error::misc(format!(
                "Alias with name '{}'  already registered.",
                name
            )));
        }
        // Expand any aliases used in defining this alias.
        let mut all_passes = Vec::with_capacity(passes.len());
        for pass in passes {
            if let Some(expanded) = self.aliases.get(&pass) {
                all_passes.extend(expanded.iter().cloned());
            } else if self.passes.contains_key(&pass) {
                all_passes.push(pass);
            } else {
                return Err(Error::misc(format!(
                    "No pass or alias named: {}",
                    pass
                )));
            }
        }
        self.aliases.insert(name, all_passes);
        Ok(())
    }

    /// Attempts to resolve the alias name. If there is no alias with this name,
    /// assumes that this is a pass instead.
    fn resolve_alias(&self, maybe_alias: &str) -> Vec<String> {
        self.aliases
            .get(maybe_alias)
            .cloned()
            .unwrap_or_else(|| vec![maybe_alias.to_string()])
    }

    /// Creates a plan using an inclusion and exclusion list which might contain
    /// aliases.
    fn create_plan(
        &self,
        incls: &[String],
        excls: &[String],
    ) -> PassResult<(Vec<String>, HashSet<String>)> {
        // Incls and excls can have aliases in them. Resolve them.
        let passes = incls
            .iter()
            .flat_map(|maybe_alias| self.resolve_alias(maybe_alias))
            .collect::<Vec<_>>();

        let excl_set = excls
            .iter()
            .flat_map(|maybe_alias| self.resolve_alias(maybe_alias))
            .collect::<HashSet<String>>();

        // Validate that names of passes in incl and excl sets are known
        passes.iter().chain(excl_set.iter()).try_for_each(|pass| {
            if !self.passes.contains_key(pass) {
                Err(Error::misc(format!("Unknown pass or alias: {pass}")))
            } else {
                Ok(())
            }
        })?;

        Ok((passes, excl_set))
    }

    /// Executes a given "plan" constructed using the incl and excl lists.
    /// With `trace` logging enabled, the program is logged after every pass.
    pub fn execute_plan(
        &self,
        ctx: &mut ir::Context,
        incl: &[String],
        excl: &[String],
    ) -> PassResult<()> {
        let (passes, excl_set) = self.create_plan(incl, excl)?;

        for name in passes {
            if excl_set.contains(&name) {
                log::info!("{name}: Ignored");
                continue;
            }
            // Pass is known to exist because create_plan validates the
            // names of passes.
            let pass = &self.passes[&name];

            let start = Instant::now();
            pass(ctx)?;
            let elapsed = start.elapsed();
            if log::log_enabled!(log::Level::Trace) {
                let mut buf = Vec::new();
                ir::Printer::write_program(&ctx.program, &mut buf)?;
                log::trace!(
                    "after {name}:\n{}",
                    String::from_utf8_lossy(&buf)
                );
            }
            // Warn if pass takes more than 5 seconds.
            if elapsed.as_secs() > 5 {
                log::warn!("{name}: {}ms", elapsed.as_millis());
            } else {
                log::info!("{name}: {}ms", elapsed.as_millis());
            }
        }

        Ok(())
    }
}

/// Simple macro to register an alias with a pass manager.
///
/// ## Example
/// ```ignore
/// let pm = PassManager::default();
/// // Register passes WellFormed and InsertWaits.
/// register_alias!(pm, "waits", [WellFormed, InsertWaits]);
/// ```
#[macro_export]
macro_rules! register_alias {
    (@unwrap_name $pass:ident) => {
        $pass::name().to_string()
    };

    (@unwrap_name $pass:literal) => {
        $pass.to_string()
    };

    ($manager:expr, $alias:literal, [ $($pass:tt),* $(,)? ]) => {
        $manager.add_alias($alias.to_string(), vec![
            $(register_alias!(@unwrap_name $pass)),*
        ])?;
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut pm = PassManager::default_passes().unwrap();
        assert!(pm.register_pass::<crate::passes::WellFormed>().is_err());
        assert!(pm.add_alias("all".into(), vec![]).is_err());
    }

    #[test]
    fn aliases_expand() {
        let pm = PassManager::default_passes().unwrap();
        let (plan, excl) = pm
            .create_plan(&names(&["all"]), &names(&["coalesce-delay-alu"]))
            .unwrap();
        assert_eq!(
            plan,
            names(&["well-formed", "insert-waits", "coalesce-delay-alu"])
        );
        assert!(excl.contains("coalesce-delay-alu"));
    }

    #[test]
    fn unknown_pass_is_an_error() {
        let pm = PassManager::default_passes().unwrap();
        assert!(pm.create_plan(&names(&["no-such-pass"]), &[]).is_err());
        let mut ctx =
            ir::Context::new(ir::Program::new(), ir::TargetConfig::default());
        assert!(pm
            .execute_plan(&mut ctx, &names(&["none"]), &[])
            .is_ok());
    }
}
