//! An IR context. This is the top-level object handed to every pass: the
//! program being compiled and the target it is compiled for.
use crate::{Program, TargetConfig};

pub struct Context {
    pub program: Program,
    pub target: TargetConfig,
    /// Extra options provided by the driver.
    /// Interpreted by individual passes
    pub extra_opts: Vec<String>,
}

impl Context {
    pub fn new(program: Program, target: TargetConfig) -> Self {
        Context {
            program,
            target,
            extra_opts: Vec::new(),
        }
    }

    pub fn with_opts<S: ToString>(
        mut self,
        opts: impl IntoIterator<Item = S>,
    ) -> Self {
        self.extra_opts
            .extend(opts.into_iter().map(|o| o.to_string()));
        self
    }
}
