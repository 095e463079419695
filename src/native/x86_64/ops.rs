use super::{
    instruction::{Immediate, Instruction},
    operand_encoding::{InstructionInput, Memory, OperandEncoding, RegisterOrMemory},
    registers::Register,
};

/*
    http://ref.x86asm.net/coder64.html most instructions come from this
    https://www.felixcloutier.com/x86/ for some specific commands
    https://wiki.osdev.org/X86-64_Instruction_Encoding for more general stuff

    Every op here is the 64 bit form unless it says otherwise in the name.
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Equal = 0x4,
    NotEqual = 0x5,
}

fn reg(register: Register) -> RegisterOrMemory {
    RegisterOrMemory::Register(register)
}

fn mem(memory: Memory) -> RegisterOrMemory {
    RegisterOrMemory::Memory(memory)
}

/// `mov dst, qword [src]`
pub fn load(dst: Register, src: Memory) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x8B).wide(),
        OperandEncoding::RegisterMemory(dst, mem(src)),
    )
}

/// `mov qword [dst], src`
pub fn store(dst: Memory, src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x89).wide(),
        OperandEncoding::MemoryRegister(mem(dst), src),
    )
}

/// `mov byte [dst], src8`
pub fn store_byte(dst: Memory, src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x88),
        OperandEncoding::MemoryRegister(mem(dst), src),
    )
}

/// `mov dst, src`
pub fn mov(dst: Register, src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x89).wide(),
        OperandEncoding::MemoryRegister(reg(dst), src),
    )
}

/// `mov dst32, src32`, also clears the upper half of `dst`
pub fn mov32(dst: Register, src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x89),
        OperandEncoding::MemoryRegister(reg(dst), src),
    )
}

/// `mov dst, imm64`
pub fn mov_imm64(dst: Register, imm: u64) -> Instruction {
    Instruction::new(
        InstructionInput::new(0xB8).wide(),
        OperandEncoding::OpcodeImmediate(dst, Immediate::Imm64(imm)),
    )
}

/// `mov dst32, imm32`, zero extended
pub fn mov_imm32(dst: Register, imm: u32) -> Instruction {
    Instruction::new(
        InstructionInput::new(0xB8),
        OperandEncoding::OpcodeImmediate(dst, Immediate::Imm32(imm)),
    )
}

/// `movzx dst32, byte src`
pub fn movzx_byte(dst: Register, src: RegisterOrMemory) -> Instruction {
    Instruction::new(
        InstructionInput::new(0xB6).two_byte(),
        OperandEncoding::RegisterMemory(dst, src),
    )
}

/// `lea dst, [src]`
pub fn lea(dst: Register, src: Memory) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x8D).wide(),
        OperandEncoding::RegisterMemory(dst, mem(src)),
    )
}

fn math_op(opcode_mr: u8, dst: Register, src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(opcode_mr).wide(),
        OperandEncoding::MemoryRegister(reg(dst), src),
    )
}

pub fn add(dst: Register, src: Register) -> Instruction {
    math_op(0x01, dst, src)
}

pub fn sub(dst: Register, src: Register) -> Instruction {
    math_op(0x29, dst, src)
}

pub fn cmp(dst: Register, src: Register) -> Instruction {
    math_op(0x39, dst, src)
}

pub fn test(dst: Register, src: Register) -> Instruction {
    math_op(0x85, dst, src)
}

/// `xor dst32, src32`
pub fn xor32(dst: Register, src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x31),
        OperandEncoding::MemoryRegister(reg(dst), src),
    )
}

/// `sub dst, imm32`
pub fn sub_imm32(dst: Register, imm: u32) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x81).wide().with_extension(5),
        OperandEncoding::MemoryImmediate(reg(dst), Immediate::Imm32(imm)),
    )
}

/// `and dst32, imm8` (sign extended)
pub fn and32_imm8(dst: Register, imm: i8) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x83).with_extension(4),
        OperandEncoding::MemoryImmediate(reg(dst), Immediate::Imm8(imm as u8)),
    )
}

/// `cmp dst32, imm8` (sign extended)
pub fn cmp32_imm8(dst: Register, imm: i8) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x83).with_extension(7),
        OperandEncoding::MemoryImmediate(reg(dst), Immediate::Imm8(imm as u8)),
    )
}

/// Unsigned `rdx:rax / src`, quotient in rax, remainder in rdx
pub fn div(src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0xF7).wide().with_extension(6),
        OperandEncoding::Memory(reg(src)),
    )
}

/// `setcc dst8`
pub fn set(condition: Condition, dst: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x90 + condition as u8)
            .two_byte()
            .with_extension(0),
        OperandEncoding::Memory(reg(dst)),
    )
}

/// `cmovcc dst32, src32`
pub fn cmov32(condition: Condition, dst: Register, src: Register) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x40 + condition as u8).two_byte(),
        OperandEncoding::RegisterMemory(dst, reg(src)),
    )
}

pub fn push(register: Register) -> Instruction {
    Instruction::new(InstructionInput::new(0x50), OperandEncoding::Opcode(register))
}

pub fn leave() -> Instruction {
    Instruction::new(InstructionInput::new(0xC9), OperandEncoding::None)
}

pub fn ret() -> Instruction {
    Instruction::new(InstructionInput::new(0xC3), OperandEncoding::None)
}

/// `rep stosb`, fills `rcx` bytes at `[rdi]` with `al`
pub fn rep_stosb() -> Instruction {
    Instruction::new(InstructionInput::new(0xAA).with_prefix(0xF3), OperandEncoding::None)
}

/// `jmp rel32`
pub fn jmp(offset: i32) -> Instruction {
    Instruction::new(InstructionInput::new(0xE9), OperandEncoding::Relative(offset))
}

/// `jcc rel32`
pub fn jump_if(condition: Condition, offset: i32) -> Instruction {
    Instruction::new(
        InstructionInput::new(0x80 + condition as u8).two_byte(),
        OperandEncoding::Relative(offset),
    )
}

/// `call rel32`
pub fn call(offset: i32) -> Instruction {
    Instruction::new(InstructionInput::new(0xE8), OperandEncoding::Relative(offset))
}
