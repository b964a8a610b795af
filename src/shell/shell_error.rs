use std::fmt;

use glob::{GlobError, PatternError};
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::P;

#[derive(Debug, Error)]
pub struct ShellError {
    pub error: ShellErrorKind,
    pub src: NamedSource<String>,
    pub len: usize,
    pub var_names: Vec<String>,
}

impl ShellError {
    pub fn new(error: ShellErrorKind, name: String, src: String, var_names: Vec<String>) -> Self {
        ShellError {
            error,
            len: src.len(),
            src: NamedSource::new(name, src),
            var_names,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self.error, ShellErrorKind::Interrupt)
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        self.error.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum ShellErrorKind {
    // Interrupt is not a real error, it reports that the operation was
    // cancelled before it could finish
    Interrupt,

    // real errors
    ExpansionLimit(usize),
    MaxRecursion(usize),
    NoMatch(String),
    VariableNotFound(String),
    UnclosedVariable,
    UnclosedSubstitution,
    SubstitutionNotAllowed,
    Glob(#[from] GlobError),
    Pattern(#[from] PatternError),
}

impl ShellErrorKind {
    /// Whether this outcome is a cooperative abort rather than a defect in
    /// the input.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, ShellErrorKind::Interrupt)
    }
}

impl fmt::Display for ShellErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ShellErrorKind::*;
        match self {
            Interrupt => write!(f, "^C"),
            ExpansionLimit(limit) => {
                write!(f, "Expansion produced more than {limit} words")
            }
            MaxRecursion(limit) => write!(f, "Max substitution depth of {limit} reached"),
            NoMatch(pattern) => write!(f, "No match found for pattern '{pattern}'"),
            VariableNotFound(name) => write!(f, "Variable with name '{name}' not found"),
            UnclosedVariable => write!(f, "Missing closing '}}' in variable reference"),
            UnclosedSubstitution => write!(f, "Missing closing ')' in substitution"),
            SubstitutionNotAllowed => {
                write!(f, "Substitution requires a live shell in this context")
            }
            Glob(error) => error.fmt(f),
            Pattern(error) => error.fmt(f),
        }
    }
}

impl Diagnostic for ShellError {
    fn labels(&self) -> Option<P<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }

    fn code<'a>(&'a self) -> Option<P<dyn fmt::Display + 'a>> {
        use ShellErrorKind::*;
        Some(match self.error {
            Interrupt => P::new("Interrupt"),
            ExpansionLimit(..) => P::new("Expansion Limit"),
            MaxRecursion(..) => P::new("Recursion Error"),
            Glob(..) | Pattern(..) | NoMatch(..) => P::new("Glob Error"),
            VariableNotFound(..) => P::new("Variable Error"),
            UnclosedVariable | UnclosedSubstitution | SubstitutionNotAllowed => {
                P::new("Substitution Error")
            }
        })
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn SourceCode)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self.error {
            ShellErrorKind::VariableNotFound(ref name) => {
                let mut options: Vec<_> = self
                    .var_names
                    .iter()
                    .filter_map(|candidate| {
                        let dist = distance::levenshtein(candidate, name);
                        if dist < 5 {
                            Some((candidate, dist))
                        } else {
                            None
                        }
                    })
                    .collect();
                options.sort_by_key(|(_, d)| *d);
                let closest = options.first()?;
                Some(P::new(format!("Did you mean ${}?", closest.0)))
            }
            _ => None,
        }
    }
}
