use log::debug;

use crate::{
    backend::{BackendError, EofPolicy},
    ir::{BinaryOp, BlockId, Function, Inst, InstNode, Intrinsic, Module, Operand, Terminator, Ty, Value},
};

use super::{
    instruction::Instruction,
    operand_encoding::{Memory, RegisterOrMemory},
    ops::{self, Condition},
    registers::{Register, R8, R9, RAX, RBP, RCX, RDI, RDX, RSI, RSP},
};

/*
    Frame layout, rbp based:
        [rbp - 8]           cursor
        [rbp - 8 * (s + 2)] slot `s`, one per virtual register

    Everything goes through rax/rcx/rdx and straight back to its slot, there is no register
    allocation.  The tape is a `.bss` symbol reached rip relative.
*/

const ARGUMENT_REGISTERS: [Register; 6] = [RDI, RSI, RDX, RCX, R8, R9];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    Tape,
    Function(Intrinsic),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelocationKind {
    /// `S + A - P`, data references
    PcRelative32,
    /// `L + A - P`, calls that may go through the PLT
    Plt32,
}

/// A rel32 in `text` that the object writer has to hand to the linker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub offset: usize,
    pub symbol: Symbol,
    pub kind: RelocationKind,
    pub addend: i64,
}

#[derive(Clone, Debug)]
pub struct MachineCode {
    /// Body of `main`
    pub text: Vec<u8>,
    pub relocations: Vec<Relocation>,
    pub tape_size: usize,
}

impl MachineCode {
    pub fn references(&self, symbol: Symbol) -> bool {
        self.relocations.iter().any(|relocation| relocation.symbol == symbol)
    }
}

#[derive(Debug, Default)]
struct Label {
    /// The offset of the label in the code
    label_offset: Option<usize>,

    /// Where the rel32 of every jump to this label lives
    jump_offsets: Vec<usize>,
}

/// Where every value lives on the stack
struct Frame {
    slots: Vec<u32>,
    size: u32,
}

impl Frame {
    const CURSOR: Memory = Memory::Base {
        base: RBP,
        displacement: -8,
    };

    /// Values never outlive their block in translated code, so slots get reused across
    /// blocks. Anything else falls back to one slot per value.
    fn new(function: &Function) -> Result<Frame, BackendError> {
        let count = function.value_count as usize;
        let mut slots = vec![0u32; count];
        let mut owner = vec![usize::MAX; count];
        let mut slot_count = 0u32;

        for (i, block) in function.blocks.iter().enumerate() {
            let mut next = 0u32;
            for node in block.insts.iter() {
                if let Some(dst) = node.inst.def() {
                    slots[dst.index()] = next;
                    owner[dst.index()] = i;
                    next += 1;
                }
            }
            slot_count = slot_count.max(next);
        }

        let block_local = function.blocks.iter().enumerate().all(|(i, block)| {
            block
                .insts
                .iter()
                .flat_map(|node| node.inst.uses())
                .chain(block.terminator.as_ref().and_then(|t| t.uses()))
                .all(|value| owner.get(value.index()) == Some(&i))
        });

        if !block_local {
            slots = (0..function.value_count).collect();
            slot_count = function.value_count;
        }

        // cursor + slots, keeping rsp 16 byte aligned at calls
        let size = (slot_count as u64 + 1) * 8;
        let size = (size + 15) & !15;
        let size = u32::try_from(size)
            .ok()
            .filter(|size| *size < i32::MAX as u32)
            .ok_or_else(|| BackendError::UnsupportedModule {
                reason: format!("{} values don't fit in a stack frame", slot_count),
            })?;

        Ok(Frame { slots, size })
    }

    fn value(&self, value: Value) -> Memory {
        Memory::Base {
            base: RBP,
            displacement: -8 * (self.slots[value.index()] as i32 + 2),
        }
    }
}

pub struct X86_64Codegen {
    code: Vec<u8>,
    labels: Vec<Label>,
    relocations: Vec<Relocation>,
    eof: EofPolicy,
}

impl X86_64Codegen {
    pub fn new(eof: EofPolicy) -> Self {
        Self {
            code: vec![],
            labels: vec![],
            relocations: vec![],
            eof,
        }
    }

    /// Lower `main` into a System V function, blocks are laid out in order
    pub fn compile(mut self, module: &Module) -> Result<MachineCode, BackendError> {
        let function = &module.main;
        let frame = Frame::new(function)?;
        self.labels = function.blocks.iter().map(|_| Label::default()).collect();

        self.push(ops::push(RBP));
        self.push(ops::mov(RBP, RSP));
        self.push(ops::sub_imm32(RSP, frame.size));

        for (i, block) in function.blocks.iter().enumerate() {
            self.labels[i].label_offset = Some(self.code.len());

            for node in block.insts.iter() {
                self.lower(node, &frame, module)?;
            }

            let terminator = block.terminator.as_ref().ok_or_else(|| BackendError::UnsupportedModule {
                reason: format!("block {} has no terminator", block.name),
            })?;
            let next = (i + 1 < function.blocks.len()).then(|| BlockId(i as u32 + 1));
            self.lower_terminator(terminator, &frame, next);
        }

        self.link_jumps()?;

        debug!(
            "lowered {} blocks into {} bytes of x86_64 ({} relocations, {} byte frame)",
            function.blocks.len(),
            self.code.len(),
            self.relocations.len(),
            frame.size
        );

        Ok(MachineCode {
            text: self.code,
            relocations: self.relocations,
            tape_size: module.tape_size,
        })
    }

    fn push(&mut self, inst: Instruction) {
        inst.write_out(&mut self.code);
    }

    /// The last 4 bytes emitted are a rel32 against `symbol`
    fn relocate_last(&mut self, symbol: Symbol, kind: RelocationKind) {
        self.relocations.push(Relocation {
            offset: self.code.len() - 4,
            symbol,
            kind,
            // rel32 is relative to the end of the field
            addend: -4,
        });
    }

    fn lea_tape(&mut self, dst: Register) {
        self.push(ops::lea(dst, Memory::RipRelative));
        self.relocate_last(Symbol::Tape, RelocationKind::PcRelative32);
    }

    fn jump_to(&mut self, inst: Instruction, target: BlockId) {
        self.push(inst);
        let at = self.code.len() - 4;
        self.labels[target.index()].jump_offsets.push(at);
    }

    fn operand(&mut self, dst: Register, operand: Operand, ty: Ty, frame: &Frame) {
        match operand {
            Operand::Value(value) => self.push(ops::load(dst, frame.value(value))),
            Operand::Const(constant) => {
                let constant = ty.truncate(constant);
                match u32::try_from(constant) {
                    Ok(small) => self.push(ops::mov_imm32(dst, small)),
                    Err(_) => self.push(ops::mov_imm64(dst, constant)),
                }
            }
        }
    }

    /// Clear everything above `ty`'s width in rax
    fn truncate_rax(&mut self, ty: Ty) {
        match ty {
            Ty::I1 => self.push(ops::and32_imm8(RAX, 1)),
            Ty::I8 => self.push(ops::movzx_byte(RAX, RegisterOrMemory::Register(RAX))),
            Ty::I32 => self.push(ops::mov32(RAX, RAX)),
            Ty::I64 => {}
        }
    }

    fn lower(&mut self, node: &InstNode, frame: &Frame, module: &Module) -> Result<(), BackendError> {
        match node.inst {
            Inst::FillTape { byte } => {
                self.lea_tape(RDI);
                self.push(ops::mov_imm64(RCX, module.tape_size as u64));
                self.push(ops::mov_imm32(RAX, byte as u32));
                self.push(ops::rep_stosb());
            }
            Inst::LoadCursor { dst } => {
                self.push(ops::load(RAX, Frame::CURSOR));
                self.push(ops::store(frame.value(dst), RAX));
            }
            Inst::StoreCursor { src } => {
                self.operand(RAX, src, Ty::I64, frame);
                self.push(ops::store(Frame::CURSOR, RAX));
            }
            Inst::LoadCell { dst, index } => {
                self.lea_tape(RCX);
                self.push(ops::load(RAX, frame.value(index)));
                self.push(ops::movzx_byte(
                    RAX,
                    RegisterOrMemory::Memory(Memory::BaseIndex {
                        base: RCX,
                        index: RAX,
                    }),
                ));
                self.push(ops::store(frame.value(dst), RAX));
            }
            Inst::StoreCell { index, src } => {
                self.lea_tape(RCX);
                self.push(ops::load(RAX, frame.value(index)));
                self.push(ops::add(RCX, RAX));
                self.push(ops::load(RAX, frame.value(src)));
                self.push(ops::store_byte(
                    Memory::Base {
                        base: RCX,
                        displacement: 0,
                    },
                    RAX,
                ));
            }
            Inst::Binary {
                dst,
                op,
                ty,
                lhs,
                rhs,
            } => {
                if let (BinaryOp::URem, Operand::Const(divisor)) = (op, rhs) {
                    if ty.truncate(divisor) == 0 {
                        return Err(BackendError::DivisionByZero);
                    }
                }

                self.push(ops::load(RAX, frame.value(lhs)));
                self.operand(RCX, rhs, ty, frame);
                match op {
                    BinaryOp::Add => self.push(ops::add(RAX, RCX)),
                    BinaryOp::Sub => self.push(ops::sub(RAX, RCX)),
                    BinaryOp::URem => {
                        self.push(ops::xor32(RDX, RDX));
                        self.push(ops::div(RCX));
                        self.push(ops::mov(RAX, RDX));
                    }
                }
                self.truncate_rax(ty);
                self.push(ops::store(frame.value(dst), RAX));
            }
            Inst::CmpEq { dst, ty, lhs, rhs } => {
                self.push(ops::load(RAX, frame.value(lhs)));
                self.truncate_rax(ty);
                self.operand(RCX, rhs, ty, frame);
                self.push(ops::cmp(RAX, RCX));
                self.push(ops::set(Condition::Equal, RAX));
                self.truncate_rax(Ty::I8);
                self.push(ops::store(frame.value(dst), RAX));
            }
            Inst::ZExt { dst, src, to } | Inst::Trunc { dst, src, to } => {
                self.push(ops::load(RAX, frame.value(src)));
                self.truncate_rax(to);
                self.push(ops::store(frame.value(dst), RAX));
            }
            Inst::Call {
                dst,
                callee,
                ref args,
            } => {
                if args.len() > ARGUMENT_REGISTERS.len() {
                    return Err(BackendError::UnsupportedModule {
                        reason: format!("{} takes {} arguments", callee.symbol(), args.len()),
                    });
                }
                for (arg, register) in args.iter().zip(ARGUMENT_REGISTERS) {
                    self.push(ops::load(register, frame.value(*arg)));
                }

                self.push(ops::call(0));
                self.relocate_last(Symbol::Function(callee), RelocationKind::Plt32);

                if callee == Intrinsic::GetByte && self.eof == EofPolicy::Zero {
                    // getchar hands back -1 (EOF), turn it into 0
                    self.push(ops::mov_imm32(RCX, 0));
                    self.push(ops::cmp32_imm8(RAX, -1));
                    self.push(ops::cmov32(Condition::Equal, RAX, RCX));
                }

                if let Some(dst) = dst {
                    self.truncate_rax(callee.returns());
                    self.push(ops::store(frame.value(dst), RAX));
                }
            }
        }
        Ok(())
    }

    fn lower_terminator(&mut self, terminator: &Terminator, frame: &Frame, next: Option<BlockId>) {
        match *terminator {
            Terminator::Jump(target) => {
                // falls through
                if Some(target) != next {
                    self.jump_to(ops::jmp(0), target);
                }
            }
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => {
                self.push(ops::load(RAX, frame.value(cond)));
                self.push(ops::test(RAX, RAX));
                if Some(then_block) == next {
                    self.jump_to(ops::jump_if(Condition::Equal, 0), else_block);
                } else {
                    self.jump_to(ops::jump_if(Condition::NotEqual, 0), then_block);
                    if Some(else_block) != next {
                        self.jump_to(ops::jmp(0), else_block);
                    }
                }
            }
            Terminator::Return(status) => {
                self.push(ops::mov_imm32(RAX, status as u32));
                self.push(ops::leave());
                self.push(ops::ret());
            }
        }
    }

    /// Patch every rel32 now that all the labels are placed
    fn link_jumps(&mut self) -> Result<(), BackendError> {
        for label in self.labels.iter() {
            let label_offset = match label.label_offset {
                Some(offset) => offset,
                None if label.jump_offsets.is_empty() => continue,
                None => {
                    return Err(BackendError::UnsupportedModule {
                        reason: "jump to a block that was never placed".to_string(),
                    })
                }
            };

            for &jump_offset in label.jump_offsets.iter() {
                // relative to the end of the rel32 field
                let distance = label_offset as i64 - (jump_offset as i64 + 4);
                let distance = i32::try_from(distance).map_err(|_| BackendError::UnsupportedModule {
                    reason: format!("jump of {} bytes doesn't fit in a rel32", distance),
                })?;
                self.code[jump_offset..jump_offset + 4].copy_from_slice(&distance.to_le_bytes());
            }
        }
        Ok(())
    }
}
