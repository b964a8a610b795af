use std::sync::Arc;

use tracing::debug;

pub mod cancel;
pub mod context;
pub mod env;
pub mod expand;
pub mod shell_error;

use cancel::CancelFlag;
use context::{OperationContext, EXPANSION_LIMIT_DEFAULT};
use env::{EnvStack, Environment};
use expand::ExpandFlags;
use shell_error::{ShellError, ShellErrorKind};

pub const DEFAULT_RECURSION_LIMIT: usize = 64;

/// The interpreter instance. Owns the live variable stack and the interrupt
/// flag that every operation context built from it is wired to. Constructed
/// once at startup and passed by reference into the top-level entry points.
pub struct Shell {
    vars: Arc<EnvStack>,
    interrupt: CancelFlag,
    recursion_limit: usize,
    expansion_limit: usize,
}

impl Default for Shell {
    fn default() -> Self {
        Self::with_vars(Arc::new(EnvStack::new()))
    }
}

impl Shell {
    /// A shell over the process environment.
    pub fn new() -> Self {
        Self::with_vars(Arc::new(EnvStack::from_env()))
    }

    pub fn with_vars(vars: Arc<EnvStack>) -> Self {
        Shell {
            vars,
            interrupt: CancelFlag::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            expansion_limit: EXPANSION_LIMIT_DEFAULT,
        }
    }

    pub fn vars(&self) -> &EnvStack {
        &self.vars
    }

    pub fn interrupt(&self) -> &CancelFlag {
        &self.interrupt
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    pub fn set_expansion_limit(&mut self, limit: usize) {
        self.expansion_limit = limit;
    }

    /// The context for one top-level operation: this shell, its live
    /// variables, a checker over its interrupt flag, and the default limit.
    pub fn context(&self) -> OperationContext<'_> {
        OperationContext::new(
            self,
            &*self.vars,
            self.interrupt.checker(),
            self.expansion_limit,
        )
    }

    /// Expand one line of input, wrapping failures into a diagnostic that
    /// carries the named source line.
    pub fn expand_line(&self, name: &str, line: &str) -> Result<Vec<String>, ShellError> {
        let ctx = self.context();
        expand::expand_string(line, ExpandFlags::empty(), &ctx).map_err(|error| {
            ShellError::new(error, name.to_string(), line.to_string(), self.vars.get_names())
        })
    }

    /// Run a nested sub-evaluation on behalf of a `$(...)` substitution. The
    /// nested pass shares the caller's context, and with it the caller's
    /// cancellation signal and expansion limit.
    pub(crate) fn eval_substitution(
        &self,
        input: &str,
        flags: ExpandFlags,
        ctx: &OperationContext,
        depth: usize,
    ) -> Result<Vec<String>, ShellErrorKind> {
        if depth > self.recursion_limit {
            debug!(depth, "substitution depth limit hit");
            return Err(ShellErrorKind::MaxRecursion(self.recursion_limit));
        }
        expand::expand_words(input, flags, ctx, depth)
    }
}
