//! Error types for all pipeline phases.

use crate::span::Span;
use crate::value::ValueType;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexerError {
    #[error("unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

/// Parser errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParserError {
    #[error("expected {expected}, found '{found}' at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unexpected '{found}' in expression at {span}")]
    NoPrefixParse { found: String, span: Span },

    #[error("unexpected end of input at {0}")]
    UnexpectedEof(Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn no_prefix_parse(found: impl Into<String>, span: Span) -> Self {
        Self::NoPrefixParse {
            found: found.into(),
            span,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        let span = match err {
            LexerError::UnexpectedChar(_, span)
            | LexerError::UnterminatedString(span)
            | LexerError::InvalidEscape(_, span)
            | LexerError::InvalidNumber(_, span) => span,
        };
        Self::General {
            message: err.to_string(),
            span,
        }
    }
}

/// Bytecode compilation errors. The bytecode layer does not preserve
/// source positions, so these carry only the offending name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
}

/// Errors raised while the virtual machine executes bytecode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("unsupported types for binary operation: {left} {op} {right}")]
    UnsupportedBinary {
        op: &'static str,
        left: ValueType,
        right: ValueType,
    },

    #[error("type mismatch: {left} {op} {right}")]
    TypeMismatch {
        op: &'static str,
        left: ValueType,
        right: ValueType,
    },

    #[error("unknown operator: {op}{operand}")]
    UnknownPrefixOperator {
        op: &'static str,
        operand: ValueType,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("calling non-function")]
    NotCallable,

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArity { want: usize, got: usize },

    #[error("wrong number of arguments. Got {got}, want {want}.")]
    BuiltinArity { got: usize, want: usize },

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(ValueType),

    #[error("index operator not supported: {0}")]
    IndexNotSupported(ValueType),

    #[error("array index not integer")]
    NonIntegerIndex,

    #[error("stack overflow")]
    StackOverflow,

    #[error("not a function: {0}")]
    NotAFunction(ValueType),

    #[error("{0}")]
    General(String),
}

impl RuntimeError {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }
}

/// A unified error type covering the whole pipeline.
#[derive(Debug, Clone, Error)]
pub enum MonkeyError {
    #[error("{}", format_parse_errors(.0))]
    Parse(Vec<ParserError>),

    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Executing bytecode failed: {0}")]
    Runtime(#[from] RuntimeError),
}

fn format_parse_errors(errors: &[ParserError]) -> String {
    errors
        .iter()
        .map(|err| format!("Parser Error: {err}"))
        .collect::<Vec<_>>()
        .join("\n")
}
