//! Filter construction errors.

use thiserror::Error;

/// Errors raised while assembling filters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Connector text other than `and` / `or`.
    #[error("invalid connector '{0}', expected 'and' or 'or'")]
    InvalidConnector(String),

    /// Wrong number of parameters for an operator.
    #[error("operator '{operator}' expects {expected} parameter(s), got {actual}")]
    ParameterCount {
        operator: &'static str,
        expected: usize,
        actual: usize,
    },
}
