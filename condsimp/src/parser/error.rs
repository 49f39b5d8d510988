//! The types for parser errors.

use crate::{ast::Operator, parser::Reserved};
use thiserror::Error;

/// The error type for the parser.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParserError {
    /// The line does not start with the `#cond` marker. Carries the first token of the line, or an
    /// empty string if the line has no tokens.
    #[error("expected line to start with '{}', got '{}'", Reserved::Cond, .0)]
    MissingCondMarker(String),

    /// The line has no `;` token ending the condition.
    #[error("condition is not terminated by '{}'", Reserved::Semicolon)]
    MissingSemicolon,

    /// A reserved word was found inside the condition.
    #[error("unexpected reserved word '{0}' in condition (token {1})")]
    UnexpectedReservedWord(Reserved, usize),

    /// An operator was applied when there were not enough operands on the stack.
    #[error(
        "operator '{}' (token {}) expects {} operands, but only {} are available",
        .operator,
        .token,
        .operator.arity(),
        .available
    )]
    StackUnderflow {
        operator: Operator,
        token: usize,
        available: usize,
    },

    /// There are no tokens between the marker and the semicolon.
    #[error("condition is empty")]
    EmptyCondition,

    /// After consuming all tokens, more than one expression was left on the stack.
    #[error("condition does not reduce to a single expression: {0} expressions are left")]
    UnreducedStack(usize),
}
