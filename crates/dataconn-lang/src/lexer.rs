//! Lexer for filter expressions using logos.

use crate::error::ParseError;
use crate::span::Span;
use logos::Logos;

/// Token types for filter expressions.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    /// Parameter placeholder.
    #[token("?")]
    Placeholder,

    /// Field name, or a keyword operator such as `in`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// Run of operator characters; looked up in the registry by the parser.
    #[regex(r"[=!<>~%^&|+*/-]+", |lex| lex.slice().to_string())]
    Symbol(String),
}

impl Token {
    /// Text usable as an operator, if any.
    pub fn operator_text(&self) -> Option<&str> {
        match self {
            Token::Ident(s) | Token::Symbol(s) => Some(s),
            Token::Placeholder => None,
        }
    }
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize an expression. Characters outside the grammar are a syntax error.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => {
                return Err(ParseError::syntax(
                    format!("unexpected character '{}'", span.text(source)),
                    span,
                ))
            }
        }
    }
    Ok(tokens)
}
