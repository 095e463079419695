use arbitrary_int::{u2, u3};
use bitbybit::{bitenum, bitfield};
use bitflags::bitflags;

use num_traits::ops::bytes::ToBytes;

/// One encoded x86_64 instruction, bytes go out in this order:
///
/// `[mandatory prefix] [0F] [REX] opcode [ModRM] [SIB] [disp8/disp32] [imm8/imm32/imm64]`
#[derive(Clone, Debug)]
pub struct Instruction {
    pub prefix: Prefix,

    pub primary_opcode: u8,
    pub mod_rm: Option<ModRM>,

    pub sib: Option<ScaledIndexByte>,
    pub displacement: Option<Displacement>,
    pub immediate: Option<Immediate>,
}

#[derive(Copy, Clone, Debug)]
#[repr(u8)]
pub enum TwoByteOpcode {
    Value = 0x0F,
}

/// Bytes ahead of the opcode, in the order they are written
#[derive(Clone, Debug, Default)]
pub struct Prefix {
    pub mandatory_prefix: Option<u8>,
    pub two_byte_opcode: Option<TwoByteOpcode>,
    pub rex: Option<RexPrefixEncoding>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Displacement {
    ZeroByteDisplacement,
    OneByteDisplacement(i8),
    FourByteDisplacement(i32),
}

impl Displacement {
    /// Smallest displacement that can hold `value`
    pub fn fit(value: i32) -> Displacement {
        match i8::try_from(value) {
            Ok(0) => Displacement::ZeroByteDisplacement,
            Ok(byte) => Displacement::OneByteDisplacement(byte),
            Err(_) => Displacement::FourByteDisplacement(value),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Immediate {
    Imm8(u8),
    Imm32(u32),
    /// only `mov r64, imm64` takes one of these
    Imm64(u64),
}

/// `mod`, the top two bits of ModRM
#[bitenum(u2, exhaustive: true)]
pub enum AddressingMode {
    /// `[reg]`
    ZeroByteDisplacement = 0b00,
    /// `[reg + disp8]`
    OneByteDisplacement = 0b01,
    /// `[reg + disp32]`
    FourByteDisplacement = 0b10,
    /// `reg` itself
    RegisterDirect = 0b11,
}

impl AddressingMode {
    pub fn from_displacement(displacement: Option<Displacement>) -> AddressingMode {
        match displacement {
            Some(Displacement::ZeroByteDisplacement) => AddressingMode::ZeroByteDisplacement,
            Some(Displacement::OneByteDisplacement(_)) => AddressingMode::OneByteDisplacement,
            Some(Displacement::FourByteDisplacement(_)) => AddressingMode::FourByteDisplacement,
            None => AddressingMode::RegisterDirect,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RexPrefixEncoding : u8 {
        const Base  = 0b0100_0000;
        /// 64 bit operand size
        const W     = 0b0000_1000;
        /// High bit of ModRM.reg
        const R     = 0b0000_0100;
        /// High bit of SIB.index
        const X     = 0b0000_0010;
        /// High bit of ModRM.rm, SIB.base or an opcode embedded register
        const B     = 0b0000_0001;
    }
}

/// Used when MOD/RM's `register_memory` is 100.
///
/// Defined as displacement (as usual) + base + index * 2^scale.
/// An index of 100 (RSP) means no index at all.
#[bitfield(u8, default: 0)]
#[derive(Debug)]
pub struct ScaledIndexByte {
    #[bits(6..=7, rw)]
    pub scale: u2,

    #[bits(3..=5, rw)]
    pub index: u3,

    #[bits(0..=2, rw)]
    pub base: u3,
}

/// `mod | reg | rm`. `reg` doubles as the `/digit` opcode extension.
/// Starts out register direct.
#[bitfield(u8, default: 0b11_000_000)]
#[derive(Debug)]
pub struct ModRM {
    #[bits(6..=7, rw)]
    pub addressing_mode: AddressingMode,

    #[bits(3..=5, rw)]
    pub register: u3,

    #[bits(0..=2, rw)]
    pub register_memory: u3,
}

impl Instruction {
    pub fn bare(primary_opcode: u8) -> Instruction {
        Instruction {
            prefix: Prefix::default(),
            primary_opcode,
            mod_rm: None,
            sib: None,
            displacement: None,
            immediate: None,
        }
    }

    fn put<const COUNT: usize, T: ToBytes<Bytes = [u8; COUNT]>>(out: &mut Vec<u8>, value: T) -> usize {
        out.extend_from_slice(&value.to_le_bytes());
        COUNT
    }

    pub fn len(&self) -> usize {
        let mut buf = Vec::with_capacity(15);
        self.write_out(&mut buf)
    }

    /// Appends the encoded instruction, returning how many bytes were written
    pub fn write_out(&self, out: &mut Vec<u8>) -> usize {
        let start = out.len();

        let prefix = &self.prefix;
        out.extend(prefix.mandatory_prefix);
        out.extend(prefix.two_byte_opcode.map(|escape| escape as u8));
        out.extend(prefix.rex.map(|rex| rex.bits()));
        out.push(self.primary_opcode);
        out.extend(self.mod_rm.map(|mod_rm| mod_rm.raw_value()));
        out.extend(self.sib.map(|sib| sib.raw_value()));

        match self.displacement {
            Some(Displacement::OneByteDisplacement(disp)) => Self::put(out, disp),
            Some(Displacement::FourByteDisplacement(disp)) => Self::put(out, disp),
            Some(Displacement::ZeroByteDisplacement) | None => 0,
        };
        match self.immediate {
            Some(Immediate::Imm8(imm)) => Self::put(out, imm),
            Some(Immediate::Imm32(imm)) => Self::put(out, imm),
            Some(Immediate::Imm64(imm)) => Self::put(out, imm),
            None => 0,
        };

        out.len() - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modrm_packs_fields() {
        let modrm = ModRM::default()
            .with_addressing_mode(AddressingMode::OneByteDisplacement)
            .with_register(u3::new(0b000))
            .with_register_memory(u3::new(0b101));
        assert_eq!(modrm.raw_value(), 0x45);
        assert_eq!(ModRM::default().raw_value(), 0b11_000_000);
    }

    #[test]
    fn sib_packs_fields() {
        let sib = ScaledIndexByte::default()
            .with_scale(u2::new(0))
            .with_index(u3::new(0b000))
            .with_base(u3::new(0b001));
        assert_eq!(sib.raw_value(), 0x01);
    }

    #[test]
    fn displacement_picks_smallest_form() {
        assert_eq!(Displacement::fit(0), Displacement::ZeroByteDisplacement);
        assert_eq!(Displacement::fit(-8), Displacement::OneByteDisplacement(-8));
        assert_eq!(Displacement::fit(-200), Displacement::FourByteDisplacement(-200));
    }

    #[test]
    fn writes_every_part_in_order() {
        // mov qword [rbp-8], 0x11223344 => 48 C7 45 F8 44 33 22 11
        let inst = Instruction {
            prefix: Prefix {
                rex: Some(RexPrefixEncoding::Base | RexPrefixEncoding::W),
                ..Prefix::default()
            },
            primary_opcode: 0xC7,
            mod_rm: Some(
                ModRM::default()
                    .with_addressing_mode(AddressingMode::OneByteDisplacement)
                    .with_register_memory(u3::new(0b101)),
            ),
            sib: None,
            displacement: Some(Displacement::OneByteDisplacement(-8)),
            immediate: Some(Immediate::Imm32(0x1122_3344)),
        };

        let mut out = vec![];
        assert_eq!(inst.write_out(&mut out), 8);
        assert_eq!(out, vec![0x48, 0xC7, 0x45, 0xF8, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(inst.len(), 8);
    }
}
