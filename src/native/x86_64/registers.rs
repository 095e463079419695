use arbitrary_int::u3;

/// A general purpose register, always named by its 64 bit form.
/// Narrower accesses are picked by the instruction (REX.W or not, byte opcodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub index: u8,
}

impl Register {
    pub const fn new(name: &'static str, index: u8) -> Self {
        Self { name, index }
    }

    /// R8-R15 need REX.R/X/B to reach the 4th bit
    pub fn requires_rex_flag(&self) -> bool {
        self.index & 0b1000 != 0
    }

    pub fn as_u3(&self) -> u3 {
        // just the 3 lower bits are encoded in ModRM/SIB/opcode
        u3::new(self.index & 0b0111)
    }
}

pub const RAX: Register = Register::new("rax", 0b0000);
pub const RCX: Register = Register::new("rcx", 0b0001);
pub const RDX: Register = Register::new("rdx", 0b0010);
pub const RBX: Register = Register::new("rbx", 0b0011);

pub const RSP: Register = Register::new("rsp", 0b0100);
pub const RBP: Register = Register::new("rbp", 0b0101);
pub const RSI: Register = Register::new("rsi", 0b0110);
pub const RDI: Register = Register::new("rdi", 0b0111);

pub const R8: Register = Register::new("r8", 0b1000);
pub const R9: Register = Register::new("r9", 0b1001);
pub const R10: Register = Register::new("r10", 0b1010);
pub const R11: Register = Register::new("r11", 0b1011);
pub const R12: Register = Register::new("r12", 0b1100);
pub const R13: Register = Register::new("r13", 0b1101);
pub const R14: Register = Register::new("r14", 0b1110);
pub const R15: Register = Register::new("r15", 0b1111);
