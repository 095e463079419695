use thiserror::Error;

use crate::lexer::{InstructionKind, Lexer, Position};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("Unmatched '[': source ended at {position} with loops still open")]
    UnmatchedOpenBracket { position: Position },

    #[error("Unmatched ']' at {position}")]
    UnmatchedCloseBracket { position: Position },
}

impl SyntaxError {
    pub fn position(&self) -> Position {
        match self {
            SyntaxError::UnmatchedOpenBracket { position }
            | SyntaxError::UnmatchedCloseBracket { position } => *position,
        }
    }
}

/// Checks that every `]` closes an earlier `[` and that no `[` is left open.
///
/// This only counts brackets, the translator's loop stack enforces the actual nesting
/// so this is just a fast rejection before anything gets built.
pub fn validate(source: &[u8]) -> Result<(), SyntaxError> {
    let mut lexer = Lexer::new(source);
    let mut balance: isize = 0;

    while let Some(token) = lexer.next_token() {
        match token.kind {
            InstructionKind::LoopStart => balance += 1,
            InstructionKind::LoopEnd => {
                if balance == 0 {
                    return Err(SyntaxError::UnmatchedCloseBracket {
                        position: token.position,
                    });
                }
                balance -= 1;
            }
            _ => {}
        }
    }

    if balance != 0 {
        return Err(SyntaxError::UnmatchedOpenBracket {
            position: lexer.current_position(),
        });
    }

    Ok(())
}
