pub mod codegen;
pub mod instruction;
pub mod operand_encoding;
pub mod ops;
pub mod registers;

pub use self::codegen::{MachineCode, Relocation, RelocationKind, Symbol, X86_64Codegen};
