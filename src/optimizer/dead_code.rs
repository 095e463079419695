use crate::ir::Function;

/// Remove side-effect free instructions nobody reads.
/// Removing one can orphan its operands so we go until nothing changes.
pub fn dead_code(function: &mut Function) {
    loop {
        let mut used = vec![false; function.value_count as usize];
        for block in function.blocks.iter() {
            let uses = block
                .insts
                .iter()
                .flat_map(|node| node.inst.uses())
                .chain(block.terminator.as_ref().and_then(|t| t.uses()));
            for value in uses {
                if let Some(slot) = used.get_mut(value.index()) {
                    *slot = true;
                }
            }
        }

        let mut removed = 0;
        for block in function.blocks.iter_mut() {
            let before = block.insts.len();
            block.insts.retain(|node| {
                node.inst.has_side_effects()
                    || node
                        .inst
                        .def()
                        .map_or(true, |dst| used.get(dst.index()).copied().unwrap_or(true))
            });
            removed += before - block.insts.len();
        }

        if removed == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Builder, Intrinsic, Terminator, Ty};

    #[test]
    fn unused_chain_is_removed_entirely() {
        let mut builder = Builder::new("main");
        let cursor = builder.load_cursor().unwrap();
        let cell = builder.load_cell(cursor).unwrap();
        builder.binary(BinaryOp::Add, Ty::I8, cell, 1u64).unwrap();
        builder.terminate(Terminator::Return(0)).unwrap();

        let mut function = builder.finish();
        dead_code(&mut function);
        assert!(function.blocks[0].insts.is_empty());
    }

    #[test]
    fn side_effects_and_their_inputs_stay() {
        let mut builder = Builder::new("main");
        let cursor = builder.load_cursor().unwrap();
        let cell = builder.load_cell(cursor).unwrap();
        let wide = builder.zext(cell, Ty::I32).unwrap();
        builder.call_void(Intrinsic::PutByte, vec![wide]).unwrap();
        // result unused but the call reads input
        builder.call(Intrinsic::GetByte, vec![]).unwrap();
        builder.terminate(Terminator::Return(0)).unwrap();

        let mut function = builder.finish();
        let before = function.clone();
        dead_code(&mut function);
        assert_eq!(function, before);
    }

    #[test]
    fn branch_conditions_count_as_uses() {
        let mut builder = Builder::new("main");
        let exit = builder.create_block("exit");
        let cursor = builder.load_cursor().unwrap();
        let cell = builder.load_cell(cursor).unwrap();
        let cond = builder.cmp_eq(Ty::I8, cell, 0u64).unwrap();
        builder
            .terminate(Terminator::Branch {
                cond,
                then_block: exit,
                else_block: exit,
            })
            .unwrap();
        builder.position_at_end(exit);
        builder.terminate(Terminator::Return(0)).unwrap();

        let mut function = builder.finish();
        dead_code(&mut function);
        assert_eq!(function.blocks[0].insts.len(), 3);
    }
}
