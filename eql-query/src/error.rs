//! Error and result types for the query crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A term was evaluated against bindings that do not cover one of its variables.
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),

    /// A constraint reads an attribute the candidate's runtime type does not declare.
    #[error("`{entity_type}` has no attribute `{attribute}`")]
    StructuralAttribute {
        entity_type: String,
        attribute: String,
    },

    #[error("no solution matches the query")]
    NoMatch,

    #[error("more than one solution matches the query")]
    MultipleMatches,

    #[error("malformed pattern: {0}")]
    MalformedPattern(String),

    #[error("cannot order {left} {op} {right}")]
    Incomparable {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("`{0}` is not a collection")]
    NotACollection(String),

    #[error("`{0}` does not evaluate to a boolean")]
    NotABoolean(String),

    /// `found` is the number of solutions seen when the violation was detected.
    #[error("expected {expected} solutions, got {found}")]
    QuantificationViolated { expected: String, found: usize },

    #[error("search limit of {0} candidate bindings exceeded")]
    SearchLimitExceeded(usize),
}
