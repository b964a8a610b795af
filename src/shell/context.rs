use super::{
    cancel::{no_cancel, CancelChecker},
    env::{null_env, Environment},
    Shell,
};

/// Default cap on how many words a single expansion may produce.
pub const EXPANSION_LIMIT_DEFAULT: usize = 512 * 1024;

/// Tighter cap for speculative background expansions, e.g. completion
/// probing, where runaway output is never useful.
pub const EXPANSION_LIMIT_BACKGROUND: usize = 512;

/// The capability bundle handed to every expansion routine: the shell running
/// the operation, a view of its variables, a cancellation signal, and the
/// expansion limit. Built once per logical operation and passed down through
/// every recursive call; immutable after construction. Cloning duplicates
/// only references and the limit, never the environment or the shell.
#[derive(Clone)]
pub struct OperationContext<'a> {
    shell: Option<&'a Shell>,
    pub vars: &'a dyn Environment,
    pub expansion_limit: usize,
    cancel_checker: CancelChecker,
}

impl<'a> OperationContext<'a> {
    pub fn new(
        shell: &'a Shell,
        vars: &'a dyn Environment,
        cancel_checker: CancelChecker,
        expansion_limit: usize,
    ) -> Self {
        Self {
            shell: Some(shell),
            vars,
            expansion_limit,
            cancel_checker,
        }
    }

    /// A context with no shell attached, for background work. Command
    /// substitution is unavailable through such a context.
    pub fn background(
        vars: &'a dyn Environment,
        cancel_checker: CancelChecker,
        expansion_limit: usize,
    ) -> Self {
        Self {
            shell: None,
            vars,
            expansion_limit,
            cancel_checker,
        }
    }

    /// A context for context-free evaluation: no shell, the shared null
    /// environment, and a checker that never cancels.
    pub fn empty() -> OperationContext<'static> {
        OperationContext {
            shell: None,
            vars: null_env(),
            expansion_limit: EXPANSION_LIMIT_DEFAULT,
            cancel_checker: no_cancel(),
        }
    }

    pub fn has_shell(&self) -> bool {
        self.shell.is_some()
    }

    /// The shell running this operation.
    ///
    /// Panics if the context was built without one; routines that run
    /// sub-evaluations must hold a shell-backed context.
    pub fn shell(&self) -> &'a Shell {
        self.shell
            .expect("operation context has no shell attached")
    }

    /// Poll the cancellation signal.
    pub fn check_cancel(&self) -> bool {
        (self.cancel_checker)()
    }

    pub fn cancel_checker(&self) -> &CancelChecker {
        &self.cancel_checker
    }
}
