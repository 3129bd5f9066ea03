use crate::source::SourceArea;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("invalid argument: {0}")]
    ArgumentError(String),

    #[error("lexical error: {0}")]
    LexError(String, SourceArea),

    #[error("preprocessor error: {0}")]
    PreprocessError(String, SourceArea),

    #[error("syntax error: {0}")]
    SyntaxError(String, SourceArea),

    #[error("semantic error: {0}")]
    SemanticError(String, SourceArea),

    #[error("target does not support this construct: {0}")]
    TargetUnsupported(String, SourceArea),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CompilerError {
    /// Source area the error points at, if it carries one.
    pub fn area(&self) -> Option<SourceArea> {
        match self {
            CompilerError::LexError(_, area)
            | CompilerError::PreprocessError(_, area)
            | CompilerError::SyntaxError(_, area)
            | CompilerError::SemanticError(_, area)
            | CompilerError::TargetUnsupported(_, area) => Some(*area),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;
