//! # Errors
//!
//! The four-way error taxonomy of `spec.md` §7, each carrying the
//! structured data its layer needs (line/column, file path, message), and a
//! crate-level [`Error`] that unifies them for callers that don't need to
//! distinguish — the same "layered error, unify at the top" shape the
//! teacher uses between `StorageError`/`InputLayerError` and their callers.

use std::path::PathBuf;
use thiserror::Error;

/// Lexer failure: an unexpected character or an unterminated string
/// (`spec.md` §4.1, §7.1).
#[derive(Debug, Clone, Error, PartialEq)]
#[error("lex error at {line}:{col}: {message}")]
pub struct LexError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

/// Parser failure: `expected X, got Y at L:C` (`spec.md` §4.2, §7.2).
#[derive(Debug, Clone, Error, PartialEq)]
#[error("parse error at {line}:{col}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

/// Engine evaluation failure: builtin arity/unknown-function, division by
/// zero, or an unbound head variable (`spec.md` §4.4.2, §7.3).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("function {name} expects {expected} argument(s), got {got}")]
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("value {0:?} cannot be coerced to a number")]
    NotNumeric(String),

    #[error("head variable ?{0} is unbound")]
    UnboundHeadVariable(String),

    #[error("fixpoint iteration cap ({0}) exceeded")]
    IterationCapExceeded(usize),

    #[error("fact store cap ({0}) exceeded")]
    FactCapExceeded(usize),
}

/// I/O or parse failure loading one rule file, carrying its path
/// (`spec.md` §7.4).
#[derive(Debug, Error)]
#[error("failed to load rule file {path:?}: {source}")]
pub struct RuleLoadError {
    pub path: PathBuf,
    #[source]
    pub source: RuleLoadCause,
}

/// What went wrong loading a single rule file.
#[derive(Debug, Error)]
pub enum RuleLoadCause {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Stratification(#[from] crate::engine::stratify::StratificationError),
}

/// Crate-level error unifying the four layers, for callers that propagate
/// rather than branch on the specific cause.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    RuleLoad(#[from] RuleLoadError),
}

pub type Result<T> = std::result::Result<T, Error>;
