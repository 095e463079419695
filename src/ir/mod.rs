//! The intermediate representation handed to backends.
//!
//! A [`Module`] holds a single `main` function made of basic blocks. Values are virtual
//! registers defined exactly once, blocks end in exactly one [`Terminator`]. The tape and
//! cursor are module level state reached through dedicated instructions so backends are
//! free to place them wherever suits them (a `.bss` symbol, a `Vec<u8>`...).

pub mod builder;
pub mod display;
pub mod verify;

pub use self::builder::{BuildError, Builder};
pub use self::verify::{verify, VerifyError};

use crate::lexer::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(pub u32);

impl Value {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    I1,
    I8,
    I32,
    I64,
}

impl Ty {
    pub fn bits(self) -> u32 {
        match self {
            Ty::I1 => 1,
            Ty::I8 => 8,
            Ty::I32 => 32,
            Ty::I64 => 64,
        }
    }

    /// Clamp a raw register value to this type's width
    pub fn truncate(self, value: u64) -> u64 {
        match self {
            Ty::I64 => value,
            ty => value & ((1u64 << ty.bits()) - 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Value(Value),
    Const(u64),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<u64> for Operand {
    fn from(c: u64) -> Self {
        Operand::Const(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Wrapping addition at the operation's width
    Add,
    /// Wrapping subtraction at the operation's width
    Sub,
    /// Unsigned remainder, the divisor is never zero in translated code
    URem,
}

/// Runtime functions the generated program calls, provided by the execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// `int putchar(int)`
    PutByte,
    /// `int getchar(void)`
    GetByte,
}

impl Intrinsic {
    pub fn symbol(self) -> &'static str {
        match self {
            Intrinsic::PutByte => "putchar",
            Intrinsic::GetByte => "getchar",
        }
    }

    pub fn params(self) -> &'static [Ty] {
        match self {
            Intrinsic::PutByte => &[Ty::I32],
            Intrinsic::GetByte => &[],
        }
    }

    pub fn returns(self) -> Ty {
        Ty::I32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    /// Set every cell of the tape to `byte`
    FillTape { byte: u8 },
    LoadCursor { dst: Value },
    StoreCursor { src: Operand },
    /// Read the cell at `index`, result is I8
    LoadCell { dst: Value, index: Value },
    /// Write the low byte of `src` into the cell at `index`
    StoreCell { index: Value, src: Value },
    Binary {
        dst: Value,
        op: BinaryOp,
        ty: Ty,
        lhs: Value,
        rhs: Operand,
    },
    /// `dst: I1 = lhs == rhs`
    CmpEq {
        dst: Value,
        ty: Ty,
        lhs: Value,
        rhs: Operand,
    },
    ZExt { dst: Value, src: Value, to: Ty },
    Trunc { dst: Value, src: Value, to: Ty },
    Call {
        dst: Option<Value>,
        callee: Intrinsic,
        args: Vec<Value>,
    },
}

impl Inst {
    /// The value this instruction defines
    pub fn def(&self) -> Option<Value> {
        match *self {
            Inst::LoadCursor { dst }
            | Inst::LoadCell { dst, .. }
            | Inst::Binary { dst, .. }
            | Inst::CmpEq { dst, .. }
            | Inst::ZExt { dst, .. }
            | Inst::Trunc { dst, .. } => Some(dst),
            Inst::Call { dst, .. } => dst,
            Inst::FillTape { .. } | Inst::StoreCursor { .. } | Inst::StoreCell { .. } => None,
        }
    }

    pub fn uses(&self) -> Vec<Value> {
        fn operand(op: &Operand) -> Option<Value> {
            match *op {
                Operand::Value(v) => Some(v),
                Operand::Const(_) => None,
            }
        }

        match self {
            Inst::FillTape { .. } | Inst::LoadCursor { .. } => vec![],
            Inst::StoreCursor { src } => operand(src).into_iter().collect(),
            Inst::LoadCell { index, .. } => vec![*index],
            Inst::StoreCell { index, src } => vec![*index, *src],
            Inst::Binary { lhs, rhs, .. } | Inst::CmpEq { lhs, rhs, .. } => {
                std::iter::once(*lhs).chain(operand(rhs)).collect()
            }
            Inst::ZExt { src, .. } | Inst::Trunc { src, .. } => vec![*src],
            Inst::Call { args, .. } => args.clone(),
        }
    }

    /// Rewrite every used value through `f`
    pub fn map_uses(&mut self, mut f: impl FnMut(Value) -> Value) {
        fn operand(op: &mut Operand, f: &mut impl FnMut(Value) -> Value) {
            if let Operand::Value(v) = op {
                *v = f(*v);
            }
        }

        match self {
            Inst::FillTape { .. } | Inst::LoadCursor { .. } => {}
            Inst::StoreCursor { src } => operand(src, &mut f),
            Inst::LoadCell { index, .. } => *index = f(*index),
            Inst::StoreCell { index, src } => {
                *index = f(*index);
                *src = f(*src);
            }
            Inst::Binary { lhs, rhs, .. } | Inst::CmpEq { lhs, rhs, .. } => {
                *lhs = f(*lhs);
                operand(rhs, &mut f);
            }
            Inst::ZExt { src, .. } | Inst::Trunc { src, .. } => *src = f(*src),
            Inst::Call { args, .. } => args.iter_mut().for_each(|arg| *arg = f(*arg)),
        }
    }

    /// Whether removing this instruction could change observable behaviour
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Inst::FillTape { .. }
                | Inst::StoreCursor { .. }
                | Inst::StoreCell { .. }
                | Inst::Call { .. }
        )
    }
}

/// Debug location: the source instruction an IR instruction was generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub position: Position,
    pub instruction: char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstNode {
    pub inst: Inst,
    pub loc: Option<SourceLoc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Jump(BlockId),
    /// Go to `then_block` if `cond` is non-zero
    Branch {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return(i32),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match *self {
            Terminator::Jump(target) => vec![target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![then_block, else_block],
            Terminator::Return(_) => vec![],
        }
    }

    pub fn map_successors(&mut self, mut f: impl FnMut(BlockId) -> BlockId) {
        match self {
            Terminator::Jump(target) => *target = f(*target),
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => {
                *then_block = f(*then_block);
                *else_block = f(*else_block);
            }
            Terminator::Return(_) => {}
        }
    }

    pub fn uses(&self) -> Option<Value> {
        match *self {
            Terminator::Branch { cond, .. } => Some(cond),
            Terminator::Jump(_) | Terminator::Return(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub insts: Vec<InstNode>,
    pub terminator: Option<Terminator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// Block 0 is always the entry block
    pub blocks: Vec<Block>,
    /// Number of values allocated, every `Value` is below this
    pub value_count: u32,
}

impl Function {
    pub const ENTRY: BlockId = BlockId(0);

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn inst_count(&self) -> usize {
        self.blocks.iter().map(|block| block.insts.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    /// Number of cells on the tape
    pub tape_size: usize,
    pub main: Function,
    pub debug_info: Option<DebugInfo>,
}
