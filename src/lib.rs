pub mod shell;

pub use shell::{
    cancel::{cancel_after, no_cancel, CancelChecker, CancelFlag},
    context::{OperationContext, EXPANSION_LIMIT_BACKGROUND, EXPANSION_LIMIT_DEFAULT},
    env::{null_env, EnvStack, EnvVar, Environment, NullEnv},
    expand::{expand_one, expand_string, ExpandFlags},
    shell_error::{ShellError, ShellErrorKind},
    Shell,
};

pub type P<T> = Box<T>;
