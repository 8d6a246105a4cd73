//! Central error type for the crate.
//!
//! Individual subsystems (grammar parsing, the sanitizer pipeline) define their
//! own richer error types (`ParseError`, `SanitizerError`) because callers often
//! want more structure than a flat enum gives them. Both convert into [`Error`]
//! for call sites that just want a single `Result<T, Error>`.

use crate::grammar::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

/// The fourteen error kinds named by the wire protocol, plus the handful of
/// infrastructure errors (I/O, serialization) that show up at the edges.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("missing required argument '{0}'")]
    MissingArg(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("too many arguments: {0}")]
    TooManyArgs(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("value not allowed: {0}")]
    ValueNotAllowed(String),

    #[error("pattern mismatch: {0}")]
    PatternMismatch(String),

    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("routing denied: {0}")]
    RoutingDenied(String),

    #[error("unknown fold id: {0}")]
    UnknownFoldId(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// The error kind identifiers used on the wire (`ErrorStatement.code`) and in
/// the protocol's error table. Kept as a separate enum from [`Error`] so that
/// error statements round-trip losslessly even though [`Error`] carries message
/// text inline rather than as a structured payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParseError,
    InvalidExpression,
    DivisionByZero,
    MissingArg,
    TypeMismatch,
    TooManyArgs,
    InvalidArgs,
    ValueNotAllowed,
    PatternMismatch,
    ValueOutOfRange,
    PreconditionFailed,
    RoutingDenied,
    UnknownFoldId,
    InvalidAction,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::InvalidExpression => "INVALID_EXPRESSION",
            ErrorCode::DivisionByZero => "DIVISION_BY_ZERO",
            ErrorCode::MissingArg => "MISSING_ARG",
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::TooManyArgs => "TOO_MANY_ARGS",
            ErrorCode::InvalidArgs => "INVALID_ARGS",
            ErrorCode::ValueNotAllowed => "VALUE_NOT_ALLOWED",
            ErrorCode::PatternMismatch => "PATTERN_MISMATCH",
            ErrorCode::ValueOutOfRange => "VALUE_OUT_OF_RANGE",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::RoutingDenied => "ROUTING_DENIED",
            ErrorCode::UnknownFoldId => "UNKNOWN_FOLD_ID",
            ErrorCode::InvalidAction => "INVALID_ACTION",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse {
            line: e.line,
            column: e.column,
            message: e.message,
        }
    }
}

impl Error {
    /// The `ErrorCode` this error would carry if converted to an `ErrorStatement`.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Parse { .. } => ErrorCode::ParseError,
            Error::InvalidExpression(_) => ErrorCode::InvalidExpression,
            Error::DivisionByZero => ErrorCode::DivisionByZero,
            Error::MissingArg(_) => ErrorCode::MissingArg,
            Error::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Error::TooManyArgs(_) => ErrorCode::TooManyArgs,
            Error::InvalidArgs(_) => ErrorCode::InvalidArgs,
            Error::ValueNotAllowed(_) => ErrorCode::ValueNotAllowed,
            Error::PatternMismatch(_) => ErrorCode::PatternMismatch,
            Error::ValueOutOfRange(_) => ErrorCode::ValueOutOfRange,
            Error::PreconditionFailed(_) => ErrorCode::PreconditionFailed,
            Error::RoutingDenied(_) => ErrorCode::RoutingDenied,
            Error::UnknownFoldId(_) => ErrorCode::UnknownFoldId,
            Error::InvalidAction(_) => ErrorCode::InvalidAction,
            Error::Serialization(_) | Error::Io(_) | Error::Configuration(_) => {
                ErrorCode::InvalidAction
            }
        }
    }
}
