use arbitrary_int::{u2, u3};

use super::{
    instruction::{
        AddressingMode, Displacement, Immediate, Instruction, ModRM, Prefix, RexPrefixEncoding,
        ScaledIndexByte, TwoByteOpcode,
    },
    registers::Register,
};

/// A memory operand, always a qword/byte sized access decided by the opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Memory {
    /// `[base + displacement]`
    Base { base: Register, displacement: i32 },
    /// `[base + index]`
    BaseIndex { base: Register, index: Register },
    /// `[rip + disp32]`, the displacement is patched by a relocation
    RipRelative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOrMemory {
    Register(Register),
    Memory(Memory),
}

/// Operand layouts, named after the "Op/En" column of the Intel manual.
#[derive(Clone, Copy, Debug)]
pub enum OperandEncoding {
    /// "ZO", no operands
    None,

    /// "M", Operand 1 = ModRM:r/m, the reg field holds the opcode extension
    Memory(RegisterOrMemory),

    /// "MI", r/m then an immediate
    MemoryImmediate(RegisterOrMemory, Immediate),

    /// "MR", destination in r/m, source in reg
    MemoryRegister(RegisterOrMemory, Register),

    /// "RM", destination in reg, source in r/m
    RegisterMemory(Register, RegisterOrMemory),

    /// "O", Operand 1 = opcode + rd
    Opcode(Register),

    /// "OI", register in the opcode then an immediate
    OpcodeImmediate(Register, Immediate),

    /// "D", a rel32 offset relative to the end of the instruction
    Relative(i32),
}

pub struct InstructionInput {
    pub mandatory_prefix: Option<u8>,
    pub two_byte_opcode: bool,
    pub primary_opcode: u8,
    pub opcode_extension: Option<u3>,
    /// REX.W, operate on the 64 bit register
    pub wide: bool,
}

impl InstructionInput {
    pub fn new(primary_opcode: u8) -> InstructionInput {
        InstructionInput {
            mandatory_prefix: None,
            two_byte_opcode: false,
            primary_opcode,
            opcode_extension: None,
            wide: false,
        }
    }

    pub fn with_extension(mut self, opcode_extension: u8) -> InstructionInput {
        self.opcode_extension = Some(u3::new(opcode_extension));
        self
    }

    /// `0F xx`
    pub fn two_byte(mut self) -> InstructionInput {
        self.two_byte_opcode = true;
        self
    }

    pub fn with_prefix(mut self, prefix: u8) -> InstructionInput {
        self.mandatory_prefix = Some(prefix);
        self
    }

    pub fn wide(mut self) -> InstructionInput {
        self.wide = true;
        self
    }
}

impl Instruction {
    pub fn new(input: InstructionInput, encoding: OperandEncoding) -> Instruction {
        let mut inst = Instruction::bare(input.primary_opcode);
        inst.prefix = Prefix {
            mandatory_prefix: input.mandatory_prefix,
            two_byte_opcode: input.two_byte_opcode.then_some(TwoByteOpcode::Value),
            rex: None,
        };

        if input.wide {
            inst.set_rex(RexPrefixEncoding::W);
        }

        if let Some(extension) = input.opcode_extension {
            inst.set_modrm(|modrm| modrm.with_register(extension));
        }

        match encoding {
            OperandEncoding::None => {}
            OperandEncoding::Memory(rm) => inst.encode_memregister(rm),
            OperandEncoding::MemoryImmediate(rm, imm) => {
                inst.encode_memregister(rm);
                inst.immediate = Some(imm);
            }
            OperandEncoding::MemoryRegister(rm, reg) | OperandEncoding::RegisterMemory(reg, rm) => {
                inst.encode_memregister(rm);
                inst.encode_register(reg);
            }
            OperandEncoding::Opcode(reg) => inst.encode_opcode_register(reg),
            OperandEncoding::OpcodeImmediate(reg, imm) => {
                inst.encode_opcode_register(reg);
                inst.immediate = Some(imm);
            }
            OperandEncoding::Relative(offset) => {
                inst.immediate = Some(Immediate::Imm32(offset as u32));
            }
        }

        inst
    }

    fn set_rex(&mut self, rex: RexPrefixEncoding) {
        let current = self.prefix.rex.get_or_insert(RexPrefixEncoding::Base);
        current.insert(rex);
    }

    /// Sets `bit` when `register` is one of r8-r15
    fn extend(&mut self, register: Register, bit: RexPrefixEncoding) {
        if register.requires_rex_flag() {
            self.set_rex(bit);
        }
    }

    fn set_modrm(&mut self, update: impl FnOnce(ModRM) -> ModRM) {
        let mod_rm = self.mod_rm.unwrap_or_default();
        self.mod_rm = Some(update(mod_rm));
    }

    /// ModRM:reg
    fn encode_register(&mut self, register: Register) {
        self.extend(register, RexPrefixEncoding::R);
        self.set_modrm(|modrm| modrm.with_register(register.as_u3()));
    }

    /// opcode + rd
    fn encode_opcode_register(&mut self, register: Register) {
        self.extend(register, RexPrefixEncoding::B);
        self.primary_opcode += register.as_u3().value();
    }

    /// ModRM:r/m and whatever SIB/displacement it drags along
    fn encode_memregister(&mut self, rm: RegisterOrMemory) {
        match rm {
            RegisterOrMemory::Register(reg) => {
                self.extend(reg, RexPrefixEncoding::B);
                self.set_modrm(|m| {
                    m.with_addressing_mode(AddressingMode::RegisterDirect)
                        .with_register_memory(reg.as_u3())
                });
            }
            RegisterOrMemory::Memory(Memory::Base { base, displacement }) => {
                self.extend(base, RexPrefixEncoding::B);

                let mut displacement = Displacement::fit(displacement);
                if base.as_u3().value() == 0b101 && displacement == Displacement::ZeroByteDisplacement {
                    // mod 00 with rm 101 means RIP relative, RBP/R13 need an explicit zero displacement
                    displacement = Displacement::OneByteDisplacement(0);
                }

                if base.as_u3().value() == 0b100 {
                    // rm 100 means "SIB follows", RSP/R12 go through a SIB with no index
                    self.sib = Some(
                        ScaledIndexByte::default()
                            .with_scale(u2::new(0))
                            .with_index(u3::new(0b100))
                            .with_base(base.as_u3()),
                    );
                }

                let mode = AddressingMode::from_displacement(Some(displacement));
                self.set_modrm(|m| m.with_addressing_mode(mode).with_register_memory(base.as_u3()));
                self.displacement = Some(displacement);
            }
            RegisterOrMemory::Memory(Memory::BaseIndex { base, index }) => {
                self.extend(base, RexPrefixEncoding::B);
                self.extend(index, RexPrefixEncoding::X);

                let displacement = if base.as_u3().value() == 0b101 {
                    Displacement::OneByteDisplacement(0)
                } else {
                    Displacement::ZeroByteDisplacement
                };

                self.sib = Some(
                    ScaledIndexByte::default()
                        .with_scale(u2::new(0))
                        .with_index(index.as_u3())
                        .with_base(base.as_u3()),
                );
                let mode = AddressingMode::from_displacement(Some(displacement));
                self.set_modrm(|m| m.with_addressing_mode(mode).with_register_memory(u3::new(0b100)));
                self.displacement = Some(displacement);
            }
            RegisterOrMemory::Memory(Memory::RipRelative) => {
                self.set_modrm(|m| {
                    m.with_addressing_mode(AddressingMode::ZeroByteDisplacement)
                        .with_register_memory(u3::new(0b101))
                });
                self.displacement = Some(Displacement::FourByteDisplacement(0));
            }
        }
    }
}
