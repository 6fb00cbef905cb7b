//! Grant predicates
//!
//! The engine never interprets predicate expressions itself. A
//! [`PredicateCompiler`] turns the expression text of a grant into a
//! [`Predicate`] once, at policy load time, and the policy calls
//! [`Predicate::evaluate`] for every authorization check that reaches the
//! grant. [`CelCompiler`] is the default implementation.

pub mod cel;
mod convert;

pub use cel::{CelCompiler, CelPredicate};

use crate::types::Subject;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Predicate compilation and evaluation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PredicateError {
    #[error("Predicate compilation failed: {0}")]
    Compilation(String),

    #[error("Predicate evaluation failed: {0}")]
    Evaluation(String),

    #[error("Predicate did not return a boolean result")]
    NonBooleanResult,
}

/// Compiled boolean condition over a subject
///
/// Implementations must be free of side effects; the engine may evaluate a
/// predicate any number of times, from any thread.
pub trait Predicate: Send + Sync {
    /// Evaluate against the subject
    fn evaluate(&self, subject: &Subject) -> Result<bool, PredicateError>;

    /// Expression text the predicate was compiled from
    fn source(&self) -> &str;
}

impl fmt::Debug for dyn Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.source()).finish()
    }
}

/// Turns expression text into predicates
pub trait PredicateCompiler: Send + Sync {
    /// Compile an expression
    ///
    /// # Errors
    ///
    /// Returns [`PredicateError::Compilation`] if the expression is invalid.
    fn compile(&self, expression: &str) -> Result<Arc<dyn Predicate>, PredicateError>;
}

/// Predicate with a fixed result, handy for tests and static policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantPredicate(pub bool);

impl Predicate for ConstantPredicate {
    fn evaluate(&self, _subject: &Subject) -> Result<bool, PredicateError> {
        Ok(self.0)
    }

    fn source(&self) -> &str {
        if self.0 {
            "true"
        } else {
            "false"
        }
    }
}

/// Predicate backed by a plain Rust closure
pub struct FnPredicate<F> {
    source: String,
    func: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&Subject) -> Result<bool, PredicateError> + Send + Sync,
{
    /// Wrap a closure; `source` is only used for diagnostics
    pub fn new(source: impl Into<String>, func: F) -> Self {
        Self {
            source: source.into(),
            func,
        }
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&Subject) -> Result<bool, PredicateError> + Send + Sync,
{
    fn evaluate(&self, subject: &Subject) -> Result<bool, PredicateError> {
        (self.func)(subject)
    }

    fn source(&self) -> &str {
        &self.source
    }
}
