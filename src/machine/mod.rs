use crate::{
    error::TranslationError,
    ir::{BinaryOp, Builder, Intrinsic, Ty, Value},
};

/// The generated program's memory: a tape of `size` byte cells and one cursor into it.
///
/// Nothing here holds runtime state, it only knows how to emit the instructions that
/// manipulate the tape. Cells wrap modulo 256 and the cursor wraps modulo `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineModel {
    size: usize,
}

/// The cell the cursor pointed at when this was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub index: Value,
}

impl MachineModel {
    pub const DEFAULT_SIZE: usize = 30_000;

    /// I/O primitives called by generated code
    pub const OUTPUT_PRIMITIVE: Intrinsic = Intrinsic::PutByte;
    pub const INPUT_PRIMITIVE: Intrinsic = Intrinsic::GetByte;

    /// Zero the tape and park the cursor in the middle of it
    pub fn initialize(builder: &mut Builder, size: usize) -> Result<MachineModel, TranslationError> {
        if size == 0 {
            return Err(TranslationError::InvalidMemorySize { size });
        }

        let model = MachineModel { size };
        builder.fill_tape(0)?;
        builder.store_cursor(model.initial_cursor() as u64)?;
        Ok(model)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn initial_cursor(&self) -> usize {
        self.size / 2
    }

    /// `cursor = (cursor + delta) mod size`
    ///
    /// `delta` is reduced into `0..size` up front so the add never underflows and one
    /// unsigned remainder handles both directions.
    pub fn advance(&self, builder: &mut Builder, delta: i64) -> Result<(), TranslationError> {
        let shift = (delta as i128).rem_euclid(self.size as i128) as u64;
        let cursor = builder.load_cursor()?;
        let moved = builder.binary(BinaryOp::Add, Ty::I64, cursor, shift)?;
        let wrapped = builder.binary(BinaryOp::URem, Ty::I64, moved, self.size as u64)?;
        builder.store_cursor(wrapped)?;
        Ok(())
    }

    pub fn current_cell_ref(&self, builder: &mut Builder) -> Result<CellRef, TranslationError> {
        Ok(CellRef {
            index: builder.load_cursor()?,
        })
    }

    pub fn load(&self, builder: &mut Builder, cell: CellRef) -> Result<Value, TranslationError> {
        Ok(builder.load_cell(cell.index)?)
    }

    pub fn store(&self, builder: &mut Builder, cell: CellRef, value: Value) -> Result<(), TranslationError> {
        Ok(builder.store_cell(cell.index, value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Inst, Operand};

    fn insts(builder: Builder) -> Vec<Inst> {
        builder.finish().blocks[0]
            .insts
            .iter()
            .map(|node| node.inst.clone())
            .collect()
    }

    #[test]
    fn initialize_zeroes_and_centers_cursor() {
        let mut builder = Builder::new("main");
        let model = MachineModel::initialize(&mut builder, 30_000).unwrap();
        assert_eq!(model.initial_cursor(), 15_000);
        assert_eq!(
            insts(builder),
            vec![
                Inst::FillTape { byte: 0 },
                Inst::StoreCursor {
                    src: Operand::Const(15_000)
                },
            ]
        );
    }

    #[test]
    fn odd_sizes_round_down() {
        let mut builder = Builder::new("main");
        let model = MachineModel::initialize(&mut builder, 7).unwrap();
        assert_eq!(model.initial_cursor(), 3);

        let mut builder = Builder::new("main");
        let model = MachineModel::initialize(&mut builder, 1).unwrap();
        assert_eq!(model.initial_cursor(), 0);
    }

    #[test]
    fn zero_size_is_rejected() {
        let mut builder = Builder::new("main");
        assert_eq!(
            MachineModel::initialize(&mut builder, 0),
            Err(TranslationError::InvalidMemorySize { size: 0 })
        );
    }

    #[test]
    fn moving_left_adds_size_minus_one() {
        let mut builder = Builder::new("main");
        let model = MachineModel { size: 10 };
        model.advance(&mut builder, -1).unwrap();
        let insts = insts(builder);
        assert!(matches!(
            insts[1],
            Inst::Binary {
                op: BinaryOp::Add,
                rhs: Operand::Const(9),
                ..
            }
        ));
        assert!(matches!(
            insts[2],
            Inst::Binary {
                op: BinaryOp::URem,
                rhs: Operand::Const(10),
                ..
            }
        ));
    }
}
