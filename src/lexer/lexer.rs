use super::{InstructionKind, Position, Token};

/// Lazily turns source bytes into instruction tokens, skipping comments.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    /** Human Readable positions in file */
    pub cur_line: usize,
    pub cur_col: usize,

    /** 'raw' format / offset within the file (in bytes) */
    pub offset: usize,

    bytes: std::slice::Iter<'a, u8>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Lexer<'a> {
        Lexer {
            cur_col: 1,
            cur_line: 1,

            offset: 0,

            bytes: source.iter(),
        }
    }

    /// The position of the next byte to be consumed, once the stream is exhausted this is end-of-source
    pub fn current_position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.cur_line,
            column: self.cur_col,
        }
    }

    fn consume_byte(&mut self) -> Option<u8> {
        let byte = *self.bytes.next()?;
        self.cur_col += 1;
        if byte == b'\n' {
            self.cur_line += 1;
            self.cur_col = 1;
        }
        self.offset += 1;
        Some(byte)
    }

    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            let position = self.current_position();
            let byte = self.consume_byte()?;
            // comments are simply skipped, they never become tokens
            if let Some(kind) = InstructionKind::from_byte(byte) {
                return Some(Token { kind, position });
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}
