//! Parser for `field op ?` / `? op field` expressions.

use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::{Span, Spanned};
use dataconn_proto::{Operator, Orientation};

/// A parsed filter expression, before parameters are bound.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    /// The filtered field.
    pub field: Spanned<String>,
    /// The registered operator.
    pub operator: Spanned<Operator>,
    /// The syntax the expression was written in.
    pub orientation: Orientation,
}

impl FilterExpression {
    /// Span of the whole expression.
    pub fn span(&self) -> Span {
        self.field.span.merge(self.operator.span)
    }
}

const EXPECTED_SHAPE: &str = "expected '<field> <operator> ?' or '? <operator> <field>'";

/// Parse a filter expression.
pub fn parse(source: &str) -> Result<FilterExpression, ParseError> {
    let tokens = tokenize(source)?;
    let whole = Span::new(0, source.len());

    let (field, operator, orientation) = match tokens.as_slice() {
        [SpannedToken {
            token: Token::Ident(field),
            span: field_span,
        }, op, SpannedToken {
            token: Token::Placeholder,
            ..
        }] => (
            Spanned::new(field.clone(), *field_span),
            op,
            Orientation::FieldFirst,
        ),
        [SpannedToken {
            token: Token::Placeholder,
            ..
        }, op, SpannedToken {
            token: Token::Ident(field),
            span: field_span,
        }] => (
            Spanned::new(field.clone(), *field_span),
            op,
            Orientation::ValueFirst,
        ),
        _ => return Err(ParseError::syntax(EXPECTED_SHAPE, whole)),
    };

    let text = operator
        .token
        .operator_text()
        .ok_or_else(|| ParseError::syntax(EXPECTED_SHAPE, operator.span))?;
    let resolved = Operator::from_symbol(text).ok_or_else(|| {
        ParseError::unknown_operator(text, operator.span).with_hint(registered_operators())
    })?;

    if resolved.orientation() != orientation {
        let usage = match resolved.orientation() {
            Orientation::FieldFirst => format!("<field> {} ?", resolved),
            Orientation::ValueFirst => format!("? {} <field>", resolved),
        };
        return Err(ParseError::syntax(
            format!("operator '{}' is not valid in this position", resolved),
            operator.span,
        )
        .with_hint(format!("write it as '{}'", usage)));
    }

    Ok(FilterExpression {
        field,
        operator: Spanned::new(resolved, operator.span),
        orientation,
    })
}

fn registered_operators() -> String {
    let symbols: Vec<&str> = Operator::ALL.iter().map(|op| op.symbol()).collect();
    format!("registered operators: {}", symbols.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_field_first() {
        let expr = parse("username = ?").unwrap();
        assert_eq!(expr.field.value, "username");
        assert_eq!(expr.operator.value, Operator::Eq);
        assert_eq!(expr.orientation, Orientation::FieldFirst);
        assert_eq!(expr.span(), Span::new(0, 10));
    }

    #[test]
    fn test_parse_all_comparisons() {
        for (source, op) in [
            ("id != ?", Operator::Ne),
            ("id < ?", Operator::Lt),
            ("id <= ?", Operator::Le),
            ("id > ?", Operator::Gt),
            ("id >= ?", Operator::Ge),
        ] {
            assert_eq!(parse(source).unwrap().operator.value, op, "{}", source);
        }
    }

    #[test]
    fn test_parse_value_first() {
        let expr = parse("? in title").unwrap();
        assert_eq!(expr.field.value, "title");
        assert_eq!(expr.operator.value, Operator::Contains);
        assert_eq!(expr.orientation, Orientation::ValueFirst);
    }

    #[test]
    fn test_unknown_operator() {
        let err = parse("name ~ ?").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownOperator);
        assert_eq!(err.span, Span::new(5, 6));

        let err = parse("name like ?").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownOperator);
    }

    #[test]
    fn test_wrong_orientation() {
        let err = parse("title in ?").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Syntax);
        assert_eq!(err.hint.as_deref(), Some("write it as '? in <field>'"));

        let err = parse("? = id").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn test_malformed_expressions() {
        for source in ["", "name", "name =", "? = ?", "name = value", "name = ? and"] {
            let err = parse(source).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::Syntax, "{:?}", source);
        }
    }
}
