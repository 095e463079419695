use thiserror::Error;

use super::{
    BinaryOp, Block, BlockId, Function, Inst, InstNode, Intrinsic, Operand, SourceLoc,
    Terminator, Ty, Value,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("No insertion point set")]
    NoInsertionPoint,

    #[error("Block {name} already has a terminator")]
    BlockTerminated { name: String },
}

/// Appends instructions to the end of one block at a time, much like an LLVM `IRBuilder`.
///
/// The builder owns the function being built; it is created per compilation and handed
/// around explicitly, there is no shared context.
#[derive(Debug)]
pub struct Builder {
    function: Function,
    insertion_point: Option<BlockId>,
    location: Option<SourceLoc>,
}

impl Builder {
    /// Creates a function with an `entry` block and positions at its end
    pub fn new(function_name: &str) -> Builder {
        let mut builder = Builder {
            function: Function {
                name: function_name.to_string(),
                blocks: vec![],
                value_count: 0,
            },
            insertion_point: None,
            location: None,
        };
        let entry = builder.create_block("entry");
        builder.position_at_end(entry);
        builder
    }

    pub fn create_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.function.blocks.len() as u32);
        self.function.blocks.push(Block {
            name: name.into(),
            insts: vec![],
            terminator: None,
        });
        id
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.insertion_point = Some(block);
    }

    pub fn insertion_point(&self) -> Option<BlockId> {
        self.insertion_point
    }

    /// Attach `location` to every instruction emitted from now on
    pub fn set_location(&mut self, location: Option<SourceLoc>) {
        self.location = location;
    }

    fn current_block(&mut self) -> Result<&mut Block, BuildError> {
        let id = self.insertion_point.ok_or(BuildError::NoInsertionPoint)?;
        let block = &mut self.function.blocks[id.index()];
        if block.terminator.is_some() {
            return Err(BuildError::BlockTerminated {
                name: block.name.clone(),
            });
        }
        Ok(block)
    }

    fn fresh_value(&mut self) -> Value {
        let value = Value(self.function.value_count);
        self.function.value_count += 1;
        value
    }

    pub fn emit(&mut self, inst: Inst) -> Result<(), BuildError> {
        let loc = self.location;
        self.current_block()?.insts.push(InstNode { inst, loc });
        Ok(())
    }

    /// Emit an instruction that defines a new value
    fn emit_value(&mut self, inst: impl FnOnce(Value) -> Inst) -> Result<Value, BuildError> {
        // check before allocating so a failed emit doesn't burn a value
        self.current_block()?;
        let dst = self.fresh_value();
        self.emit(inst(dst))?;
        Ok(dst)
    }

    pub fn terminate(&mut self, terminator: Terminator) -> Result<(), BuildError> {
        self.current_block()?.terminator = Some(terminator);
        Ok(())
    }

    pub fn fill_tape(&mut self, byte: u8) -> Result<(), BuildError> {
        self.emit(Inst::FillTape { byte })
    }

    pub fn load_cursor(&mut self) -> Result<Value, BuildError> {
        self.emit_value(|dst| Inst::LoadCursor { dst })
    }

    pub fn store_cursor(&mut self, src: impl Into<Operand>) -> Result<(), BuildError> {
        self.emit(Inst::StoreCursor { src: src.into() })
    }

    pub fn load_cell(&mut self, index: Value) -> Result<Value, BuildError> {
        self.emit_value(|dst| Inst::LoadCell { dst, index })
    }

    pub fn store_cell(&mut self, index: Value, src: Value) -> Result<(), BuildError> {
        self.emit(Inst::StoreCell { index, src })
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        ty: Ty,
        lhs: Value,
        rhs: impl Into<Operand>,
    ) -> Result<Value, BuildError> {
        let rhs = rhs.into();
        self.emit_value(|dst| Inst::Binary {
            dst,
            op,
            ty,
            lhs,
            rhs,
        })
    }

    pub fn cmp_eq(&mut self, ty: Ty, lhs: Value, rhs: impl Into<Operand>) -> Result<Value, BuildError> {
        let rhs = rhs.into();
        self.emit_value(|dst| Inst::CmpEq { dst, ty, lhs, rhs })
    }

    pub fn zext(&mut self, src: Value, to: Ty) -> Result<Value, BuildError> {
        self.emit_value(|dst| Inst::ZExt { dst, src, to })
    }

    pub fn trunc(&mut self, src: Value, to: Ty) -> Result<Value, BuildError> {
        self.emit_value(|dst| Inst::Trunc { dst, src, to })
    }

    pub fn call(&mut self, callee: Intrinsic, args: Vec<Value>) -> Result<Value, BuildError> {
        self.emit_value(|dst| Inst::Call {
            dst: Some(dst),
            callee,
            args,
        })
    }

    /// Call ignoring the result
    pub fn call_void(&mut self, callee: Intrinsic, args: Vec<Value>) -> Result<(), BuildError> {
        self.emit(Inst::Call {
            dst: None,
            callee,
            args,
        })
    }

    pub fn finish(self) -> Function {
        self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_entry() {
        let builder = Builder::new("main");
        assert_eq!(builder.insertion_point(), Some(Function::ENTRY));
        let function = builder.finish();
        assert_eq!(function.blocks[0].name, "entry");
    }

    #[test]
    fn values_are_numbered_in_order() {
        let mut builder = Builder::new("main");
        let cursor = builder.load_cursor().unwrap();
        let cell = builder.load_cell(cursor).unwrap();
        assert_eq!((cursor, cell), (Value(0), Value(1)));
        assert_eq!(builder.finish().value_count, 2);
    }

    #[test]
    fn cannot_append_after_terminator() {
        let mut builder = Builder::new("main");
        builder.terminate(Terminator::Return(0)).unwrap();
        assert_eq!(
            builder.load_cursor(),
            Err(BuildError::BlockTerminated {
                name: "entry".to_string()
            })
        );
        // the failed emit must not leave a dangling value behind
        assert_eq!(builder.finish().value_count, 0);
    }

    #[test]
    fn locations_are_attached() {
        let mut builder = Builder::new("main");
        let loc = SourceLoc {
            position: Default::default(),
            instruction: '+',
        };
        builder.set_location(Some(loc));
        builder.fill_tape(0).unwrap();
        builder.set_location(None);
        builder.fill_tape(0).unwrap();
        let function = builder.finish();
        assert_eq!(function.blocks[0].insts[0].loc, Some(loc));
        assert_eq!(function.blocks[0].insts[1].loc, None);
    }
}
