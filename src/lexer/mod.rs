use std::fmt;

pub mod lexer;

pub use self::lexer::Lexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstructionKind {
    // `>`: Move the cursor one cell to the right
    MoveRight,
    // `<`: Move the cursor one cell to the left
    MoveLeft,

    // `+`: Increment the byte at the cursor by one
    Increment,
    // `-`: Decrement the byte at the cursor by one
    Decrement,

    // `.`: Write the byte at the cursor to the output device
    Output,
    // `,`: Read the next byte from the input device and store it at the cursor
    Input,

    // `[`: If the byte at the cursor is zero, skip past the matching `]`
    LoopStart,
    // `]`: Jump back to the matching `[`
    LoopEnd,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 8] = [
        InstructionKind::MoveRight,
        InstructionKind::MoveLeft,
        InstructionKind::Increment,
        InstructionKind::Decrement,
        InstructionKind::Output,
        InstructionKind::Input,
        InstructionKind::LoopStart,
        InstructionKind::LoopEnd,
    ];

    /// Every other byte is a comment
    pub fn from_byte(byte: u8) -> Option<InstructionKind> {
        match byte {
            b'>' => Some(InstructionKind::MoveRight),
            b'<' => Some(InstructionKind::MoveLeft),
            b'+' => Some(InstructionKind::Increment),
            b'-' => Some(InstructionKind::Decrement),
            b'.' => Some(InstructionKind::Output),
            b',' => Some(InstructionKind::Input),
            b'[' => Some(InstructionKind::LoopStart),
            b']' => Some(InstructionKind::LoopEnd),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            InstructionKind::MoveRight => '>',
            InstructionKind::MoveLeft => '<',
            InstructionKind::Increment => '+',
            InstructionKind::Decrement => '-',
            InstructionKind::Output => '.',
            InstructionKind::Input => ',',
            InstructionKind::LoopStart => '[',
            InstructionKind::LoopEnd => ']',
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            InstructionKind::MoveRight => "move right",
            InstructionKind::MoveLeft => "move left",
            InstructionKind::Increment => "increment",
            InstructionKind::Decrement => "decrement",
            InstructionKind::Output => "output",
            InstructionKind::Input => "input",
            InstructionKind::LoopStart => "loop start",
            InstructionKind::LoopEnd => "loop end",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Where something lives in the source.
/// `offset` is in bytes, `line` and `column` are 1-based and human readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (offset {})", self.line, self.column, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: InstructionKind,
    pub position: Position,
}
