use log::trace;

use crate::{
    error::TranslationError,
    ir::{BinaryOp, Builder, Function, SourceLoc, Terminator, Ty},
    lexer::{InstructionKind, Lexer, Token},
    machine::MachineModel,
    stats::{Statistics, StatisticsCollector},
};

use super::loop_controller::LoopController;

/// One pass over the source, one instruction at a time, in order.
pub struct InstructionTranslator {
    builder: Builder,
    machine: MachineModel,
    loops: LoopController,
    statistics: StatisticsCollector,
    debug_info: bool,
}

impl InstructionTranslator {
    pub fn new(
        builder: Builder,
        machine: MachineModel,
        statistics: StatisticsCollector,
        debug_info: bool,
    ) -> InstructionTranslator {
        InstructionTranslator {
            builder,
            machine,
            loops: LoopController::new(),
            statistics,
            debug_info,
        }
    }

    /// The source must already have passed validation
    pub fn translate(mut self, source: &[u8]) -> Result<(Function, Statistics), TranslationError> {
        for token in Lexer::new(source) {
            self.statistics.record(token.kind.as_char());

            if self.debug_info {
                self.builder.set_location(Some(SourceLoc {
                    position: token.position,
                    instruction: token.kind.as_char(),
                }));
            }

            self.translate_instruction(token)?;
        }

        self.builder.set_location(None);
        self.loops.finish()?;
        self.builder.terminate(Terminator::Return(0))?;

        let function = self.builder.finish();
        trace!(
            "translated into {} blocks, {} instructions, {} values",
            function.blocks.len(),
            function.inst_count(),
            function.value_count
        );
        Ok((function, self.statistics.snapshot()))
    }

    fn translate_instruction(&mut self, token: Token) -> Result<(), TranslationError> {
        let builder = &mut self.builder;
        let machine = &self.machine;

        match token.kind {
            InstructionKind::MoveRight => machine.advance(builder, 1),
            InstructionKind::MoveLeft => machine.advance(builder, -1),
            InstructionKind::Increment => {
                let cell = machine.current_cell_ref(builder)?;
                let value = machine.load(builder, cell)?;
                let incremented = builder.binary(BinaryOp::Add, Ty::I8, value, 1u64)?;
                machine.store(builder, cell, incremented)
            }
            InstructionKind::Decrement => {
                let cell = machine.current_cell_ref(builder)?;
                let value = machine.load(builder, cell)?;
                let decremented = builder.binary(BinaryOp::Sub, Ty::I8, value, 1u64)?;
                machine.store(builder, cell, decremented)
            }
            InstructionKind::Output => {
                let cell = machine.current_cell_ref(builder)?;
                let value = machine.load(builder, cell)?;
                let widened = builder.zext(value, Ty::I32)?;
                builder.call_void(MachineModel::OUTPUT_PRIMITIVE, vec![widened])?;
                Ok(())
            }
            InstructionKind::Input => {
                let input = builder.call(MachineModel::INPUT_PRIMITIVE, vec![])?;
                let byte = builder.trunc(input, Ty::I8)?;
                let cell = machine.current_cell_ref(builder)?;
                machine.store(builder, cell, byte)
            }
            InstructionKind::LoopStart => self.loops.open(builder, machine, token.position),
            InstructionKind::LoopEnd => self.loops.close(builder, token.position),
        }
    }
}
