use thiserror::Error;

use crate::{
    backend::BackendError,
    ir::{BuildError, VerifyError},
    lexer::Position,
    validator::SyntaxError,
};

/// Failures inside the translator itself.
///
/// None of these should be reachable for a source that passed validation, seeing one means
/// the validator and the translator disagree and the compilation is abandoned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("Loop end at {position} has no open loop to close")]
    UnbalancedLoop { position: Position },

    #[error("Loop opened at {position} was never closed")]
    UnclosedLoop { position: Position },

    #[error("Memory size must be at-least 1 cell (got {size})")]
    InvalidMemorySize { size: usize },

    #[error("IR construction failed: {0}")]
    Build(
        #[from]
        BuildError,
    ),

    #[error("Generated IR is invalid: {0}")]
    Verify(
        #[from]
        VerifyError,
    ),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(
        #[from]
        SyntaxError,
    ),

    #[error("Translation error: {0}")]
    Translation(
        #[from]
        TranslationError,
    ),

    #[error("Backend error: {0}")]
    Backend(
        #[from]
        BackendError,
    ),
}

impl Error {
    /// Where in the source things went wrong, when that is known
    pub fn position(&self) -> Option<Position> {
        match self {
            Error::Syntax(e) => Some(e.position()),
            Error::Translation(TranslationError::UnbalancedLoop { position })
            | Error::Translation(TranslationError::UnclosedLoop { position }) => Some(*position),
            Error::Translation(_) | Error::Backend(_) => None,
        }
    }
}
