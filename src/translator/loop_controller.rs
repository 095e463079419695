use crate::{
    error::TranslationError,
    ir::{BlockId, Builder, Operand, Terminator, Ty},
    lexer::Position,
    machine::MachineModel,
};

/// The blocks of one loop that is still open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    pub header: BlockId,
    pub body: BlockId,
    pub exit: BlockId,
    pub opened_at: Position,
}

/// Turns `[` / `]` pairs into header/body/exit blocks.
///
/// ```text
/// [ ... ]  =>      br header
///          header: if *cursor == 0 { br exit } else { br body }
///          body:   ...
///                  br header
///          exit:   <emission continues here>
/// ```
#[derive(Debug, Default)]
pub struct LoopController {
    frames: Vec<LoopFrame>,
}

impl LoopController {
    pub fn new() -> Self {
        Self { frames: vec![] }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn open(
        &mut self,
        builder: &mut Builder,
        machine: &MachineModel,
        position: Position,
    ) -> Result<(), TranslationError> {
        let offset = position.offset;
        let header = builder.create_block(format!("loop_header_{}", offset));
        let body = builder.create_block(format!("loop_body_{}", offset));
        let exit = builder.create_block(format!("loop_exit_{}", offset));

        builder.terminate(Terminator::Jump(header))?;

        builder.position_at_end(header);
        let cell = machine.current_cell_ref(builder)?;
        let value = machine.load(builder, cell)?;
        let is_zero = builder.cmp_eq(Ty::I8, value, Operand::Const(0))?;
        builder.terminate(Terminator::Branch {
            cond: is_zero,
            then_block: exit,
            else_block: body,
        })?;

        builder.position_at_end(body);
        self.frames.push(LoopFrame {
            header,
            body,
            exit,
            opened_at: position,
        });
        Ok(())
    }

    pub fn close(&mut self, builder: &mut Builder, position: Position) -> Result<(), TranslationError> {
        let frame = self
            .frames
            .pop()
            .ok_or(TranslationError::UnbalancedLoop { position })?;

        builder.terminate(Terminator::Jump(frame.header))?;
        builder.position_at_end(frame.exit);
        Ok(())
    }

    /// Every loop must be closed once the source is exhausted
    pub fn finish(self) -> Result<(), TranslationError> {
        match self.frames.last() {
            Some(frame) => Err(TranslationError::UnclosedLoop {
                position: frame.opened_at,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset: usize) -> Position {
        Position {
            offset,
            line: 1,
            column: offset + 1,
        }
    }

    fn setup() -> (Builder, MachineModel) {
        let mut builder = Builder::new("main");
        let machine = MachineModel::initialize(&mut builder, 8).unwrap();
        (builder, machine)
    }

    #[test]
    fn open_and_close_wire_up_three_blocks() {
        let (mut builder, machine) = setup();
        let mut loops = LoopController::new();

        loops.open(&mut builder, &machine, at(3)).unwrap();
        assert_eq!(loops.depth(), 1);
        loops.close(&mut builder, at(5)).unwrap();
        assert_eq!(loops.depth(), 0);
        builder.terminate(Terminator::Return(0)).unwrap();
        loops.finish().unwrap();

        let function = builder.finish();
        let names: Vec<&str> = function.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["entry", "loop_header_3", "loop_body_3", "loop_exit_3"]);

        assert_eq!(function.blocks[0].terminator, Some(Terminator::Jump(BlockId(1))));
        assert!(matches!(
            function.blocks[1].terminator,
            Some(Terminator::Branch {
                then_block: BlockId(3),
                else_block: BlockId(2),
                ..
            })
        ));
        assert_eq!(function.blocks[2].terminator, Some(Terminator::Jump(BlockId(1))));
        assert_eq!(function.blocks[3].terminator, Some(Terminator::Return(0)));
    }

    #[test]
    fn nested_loops_close_innermost_first() {
        let (mut builder, machine) = setup();
        let mut loops = LoopController::new();

        loops.open(&mut builder, &machine, at(0)).unwrap();
        loops.open(&mut builder, &machine, at(1)).unwrap();
        assert_eq!(loops.depth(), 2);
        loops.close(&mut builder, at(2)).unwrap();
        // now emitting in the inner exit block which still belongs to the outer body
        assert_eq!(builder.insertion_point(), Some(BlockId(6)));
        loops.close(&mut builder, at(3)).unwrap();
        assert_eq!(builder.insertion_point(), Some(BlockId(3)));
    }

    #[test]
    fn close_without_open_is_an_internal_error() {
        let (mut builder, _) = setup();
        let mut loops = LoopController::new();
        assert_eq!(
            loops.close(&mut builder, at(4)),
            Err(TranslationError::UnbalancedLoop { position: at(4) })
        );
    }

    #[test]
    fn unclosed_loop_reports_innermost_open() {
        let (mut builder, machine) = setup();
        let mut loops = LoopController::new();
        loops.open(&mut builder, &machine, at(0)).unwrap();
        loops.open(&mut builder, &machine, at(2)).unwrap();
        assert_eq!(
            loops.finish(),
            Err(TranslationError::UnclosedLoop { position: at(2) })
        );
    }
}
