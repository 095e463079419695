use thiserror::Error;

use super::{Inst, Module, Value};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Function {function} has no entry block")]
    NoEntryBlock { function: String },

    #[error("Block {block} has no terminator")]
    MissingTerminator { block: String },

    #[error("Block {block} branches to a block that doesn't exist ({target})")]
    UnknownBlock { block: String, target: u32 },

    #[error("Value %{value} is defined more than once (again in {block})")]
    Redefined { block: String, value: u32 },

    #[error("Value %{value} is used in {block} but never defined")]
    Undefined { block: String, value: u32 },

    #[error("Value %{value} is out of range, function only has {count} values")]
    OutOfRange { value: u32, count: u32 },

    #[error("Call to {callee} in {block} passes {found} arguments, expected {expected}")]
    CallArity {
        block: String,
        callee: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Tape must have at-least one cell")]
    EmptyTape,
}

/// Structural checks run on every module before a backend touches it.
pub fn verify(module: &Module) -> Result<(), VerifyError> {
    let function = &module.main;

    if module.tape_size == 0 {
        return Err(VerifyError::EmptyTape);
    }

    if function.blocks.is_empty() {
        return Err(VerifyError::NoEntryBlock {
            function: function.name.clone(),
        });
    }

    let count = function.value_count;
    let check_range = |value: Value| {
        if value.0 >= count {
            Err(VerifyError::OutOfRange {
                value: value.0,
                count,
            })
        } else {
            Ok(())
        }
    };

    let mut defined = vec![false; count as usize];
    for block in function.blocks.iter() {
        for node in block.insts.iter() {
            if let Inst::Call { callee, args, .. } = &node.inst {
                if args.len() != callee.params().len() {
                    return Err(VerifyError::CallArity {
                        block: block.name.clone(),
                        callee: callee.symbol(),
                        expected: callee.params().len(),
                        found: args.len(),
                    });
                }
            }

            if let Some(dst) = node.inst.def() {
                check_range(dst)?;
                if defined[dst.index()] {
                    return Err(VerifyError::Redefined {
                        block: block.name.clone(),
                        value: dst.0,
                    });
                }
                defined[dst.index()] = true;
            }
        }
    }

    for block in function.blocks.iter() {
        let terminator = block
            .terminator
            .as_ref()
            .ok_or_else(|| VerifyError::MissingTerminator {
                block: block.name.clone(),
            })?;

        for target in terminator.successors() {
            if target.index() >= function.blocks.len() {
                return Err(VerifyError::UnknownBlock {
                    block: block.name.clone(),
                    target: target.0,
                });
            }
        }

        let used = block
            .insts
            .iter()
            .flat_map(|node| node.inst.uses())
            .chain(terminator.uses());
        for value in used {
            check_range(value)?;
            if !defined[value.index()] {
                return Err(VerifyError::Undefined {
                    block: block.name.clone(),
                    value: value.0,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, Builder, Function, Inst, InstNode, Terminator};

    fn module(main: Function) -> Module {
        Module {
            name: "test".to_string(),
            tape_size: 16,
            main,
            debug_info: None,
        }
    }

    #[test]
    fn accepts_a_minimal_function() {
        let mut builder = Builder::new("main");
        builder.terminate(Terminator::Return(0)).unwrap();
        assert_eq!(verify(&module(builder.finish())), Ok(()));
    }

    #[test]
    fn rejects_missing_terminator() {
        let builder = Builder::new("main");
        assert_eq!(
            verify(&module(builder.finish())),
            Err(VerifyError::MissingTerminator {
                block: "entry".to_string()
            })
        );
    }

    #[test]
    fn rejects_unknown_branch_target() {
        let mut builder = Builder::new("main");
        builder.terminate(Terminator::Jump(crate::ir::BlockId(7))).unwrap();
        assert!(matches!(
            verify(&module(builder.finish())),
            Err(VerifyError::UnknownBlock { target: 7, .. })
        ));
    }

    #[test]
    fn rejects_use_of_undefined_value() {
        let function = Function {
            name: "main".to_string(),
            blocks: vec![Block {
                name: "entry".to_string(),
                insts: vec![InstNode {
                    inst: Inst::StoreCursor {
                        src: Value(0).into(),
                    },
                    loc: None,
                }],
                terminator: Some(Terminator::Return(0)),
            }],
            value_count: 1,
        };
        assert!(matches!(
            verify(&module(function)),
            Err(VerifyError::Undefined { value: 0, .. })
        ));
    }

    #[test]
    fn rejects_call_with_wrong_arity() {
        let mut builder = Builder::new("main");
        builder.call_void(crate::ir::Intrinsic::PutByte, vec![]).unwrap();
        builder.terminate(Terminator::Return(0)).unwrap();
        assert!(matches!(
            verify(&module(builder.finish())),
            Err(VerifyError::CallArity {
                callee: "putchar",
                expected: 1,
                found: 0,
                ..
            })
        ));
    }

    #[test]
    fn rejects_empty_tape() {
        let mut builder = Builder::new("main");
        builder.terminate(Terminator::Return(0)).unwrap();
        let mut module = module(builder.finish());
        module.tape_size = 0;
        assert_eq!(verify(&module), Err(VerifyError::EmptyTape));
    }
}
