//! dataconn filter language
//!
//! Filters are written as a field, an operator and a `?` placeholder. The
//! position of the placeholder is fixed by the operator:
//!
//! ```text
//! username = ?
//! id <= ?
//! ? in title
//! ```
//!
//! Parameters are never part of the text; they are bound as typed values
//! when the expression is compiled into a [`Filter`].
//!
//! # Usage
//!
//! ```rust
//! use dataconn_lang::compile;
//! use dataconn_proto::{Operator, Value};
//!
//! let filter = compile("username = ?", vec![Value::from("Kredh")]).unwrap();
//! assert_eq!(filter.operator, Operator::Eq);
//! ```

pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use error::{LangError, ParseError, ParseErrorKind};
pub use parser::FilterExpression;
pub use span::{Span, Spanned};

use dataconn_proto::{Filter, Value};

/// Parse an expression without binding parameters.
pub fn parse(source: &str) -> Result<FilterExpression, ParseError> {
    parser::parse(source)
}

/// Parse an expression and bind its parameters.
pub fn compile(source: &str, parameters: Vec<Value>) -> Result<Filter, LangError> {
    let expr = parse(source)?;
    Ok(Filter::new(expr.field.value, expr.operator.value, parameters)?)
}

/// Tokenize an expression (for debugging/testing).
pub fn tokenize(source: &str) -> Result<Vec<lexer::SpannedToken>, ParseError> {
    lexer::tokenize(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataconn_proto::Operator;

    #[test]
    fn test_compile_binds_parameters() {
        let filter = compile("id < ?", vec![Value::Int64(4)]).unwrap();
        assert_eq!(filter.field, "id");
        assert_eq!(filter.operator, Operator::Lt);
        assert_eq!(filter.parameters, vec![Value::Int64(4)]);
    }

    #[test]
    fn test_compile_parameter_mismatch() {
        let err = compile("id < ?", vec![]).unwrap_err();
        assert!(matches!(err, LangError::Filter(_)));
    }

    #[test]
    fn test_compile_parse_error() {
        let err = compile("id ?? ?", vec![Value::Int64(1)]).unwrap_err();
        assert!(matches!(err, LangError::Parse(_)));
    }
}
