use crate::ast::SourceLocation;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub struct CompilerError {
    pub message: String,
    pub code: ErrorCodes,
    pub loc: Option<SourceLocation>,
}

impl PartialEq for CompilerError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.loc == other.loc
    }
}

impl CompilerError {
    pub fn new(code: ErrorCodes, loc: Option<SourceLocation>) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            loc,
        }
    }

    pub fn with_message(
        code: ErrorCodes,
        loc: Option<SourceLocation>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code,
            loc,
        }
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.loc {
            Some(loc) => write!(
                f,
                "Parse error on line {}, column {}: {}",
                loc.start.line, loc.start.column, self.message
            ),
            None => write!(f, "Parse error: {}", self.message),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ErrorCodes {
    // lexical errors
    UnterminatedMustache,
    UnterminatedComment,
    UnterminatedString,
    UnexpectedCharacter,
    // syntax errors
    UnexpectedToken,
    UnexpectedEof,
    InvalidPath,
    InvalidBlockParams,
    MismatchedCloseBlock,
    MissingCloseBlock,
    UnexpectedCloseBlock,
    UnexpectedElse,
    EmptyElseChain,
    // compile errors
    UnknownHelper,
}

impl ErrorCodes {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnterminatedMustache => "Unterminated mustache, expected '}}'",
            Self::UnterminatedComment => "Unterminated comment",
            Self::UnterminatedString => "Unterminated string literal",
            Self::UnexpectedCharacter => "Unexpected character inside mustache",
            Self::UnexpectedToken => "Unexpected token",
            Self::UnexpectedEof => "Unexpected end of input",
            Self::InvalidPath => "Invalid path",
            Self::InvalidBlockParams => "Invalid block params, expected 'as |name|'",
            Self::MismatchedCloseBlock => "Close block does not match open block",
            Self::MissingCloseBlock => "Block was never closed",
            Self::UnexpectedCloseBlock => "Close block without a matching open block",
            Self::UnexpectedElse => "'else' outside of a block",
            Self::EmptyElseChain => "Chained 'else' needs arguments for its helper",
            Self::UnknownHelper => "Unknown helper used while only known helpers are allowed",
        }
    }
}

/// Failures raised while a template renders. Missing data never ends up here;
/// only structural problems do (unknown helpers, strict-mode misses, broken
/// programs).
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("Missing helper: \"{0}\"")]
    MissingHelper(String),
    #[error("\"{path}\" not defined in {context}")]
    MissingField { path: String, context: String },
    #[error("helper \"{name}\" failed: {message}")]
    Helper { name: String, message: String },
    #[error("template references unknown program {0}")]
    UnknownProgram(usize),
}

impl RenderError {
    pub fn helper(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Helper {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Programming errors detected while a runtime is being set up or a
/// precompiled template is being instantiated.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot wrap helper \"{0}\": no helper is registered under that name")]
    UnknownHelper(String),
    #[error("template was compiled for namespace \"{found}\", runtime is \"{expected}\"")]
    NamespaceMismatch { expected: String, found: String },
    #[error("template was compiled with revision {found}, runtime expects {expected}")]
    RevisionMismatch { expected: u32, found: u32 },
    #[error("precompiled template source is malformed: {0}")]
    MalformedSource(#[from] serde_json::Error),
}

/// Anything that can go wrong turning template text into a renderable
/// template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Compile(#[from] CompilerError),
    #[error(transparent)]
    Setup(#[from] SetupError),
}
