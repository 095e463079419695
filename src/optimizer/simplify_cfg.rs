use std::collections::VecDeque;

use crate::ir::{BlockId, Function, Terminator};

/// Control flow clean-up: thread jumps through empty blocks, merge a block into its only
/// predecessor and delete whatever became unreachable. Runs until nothing changes.
pub fn simplify_cfg(function: &mut Function) {
    loop {
        let changed = thread_jumps(function) | merge_blocks(function) | remove_unreachable(function);
        if !changed {
            break;
        }
    }
}

/// `a: br b`, `b: br c` where `b` is empty becomes `a: br c`
fn thread_jumps(function: &mut Function) -> bool {
    let forward: Vec<Option<BlockId>> = function
        .blocks
        .iter()
        .enumerate()
        .map(|(i, block)| match block.terminator {
            Some(Terminator::Jump(target)) if block.insts.is_empty() && target.index() != i => Some(target),
            _ => None,
        })
        .collect();

    let limit = forward.len();
    let resolve = |mut block: BlockId| {
        // bounded so an empty infinite loop (`[]` on a non-zero cell) can't hang us
        for _ in 0..limit {
            match forward[block.index()] {
                Some(next) => block = next,
                None => break,
            }
        }
        block
    };

    let mut changed = false;
    for block in function.blocks.iter_mut() {
        if let Some(terminator) = &mut block.terminator {
            let before = terminator.clone();
            terminator.map_successors(resolve);

            if let Terminator::Branch {
                then_block,
                else_block,
                ..
            } = *terminator
            {
                if then_block == else_block {
                    *terminator = Terminator::Jump(then_block);
                }
            }

            changed |= *terminator != before;
        }
    }
    changed
}

/// `a: ...; br b` where `a` is `b`'s only predecessor, append `b` onto `a`
fn merge_blocks(function: &mut Function) -> bool {
    let mut predecessors = vec![0usize; function.blocks.len()];
    for block in function.blocks.iter() {
        if let Some(terminator) = &block.terminator {
            for successor in terminator.successors() {
                predecessors[successor.index()] += 1;
            }
        }
    }

    let mut merged = vec![false; function.blocks.len()];
    let mut changed = false;

    for a in 0..function.blocks.len() {
        if merged[a] {
            continue;
        }

        while let Some(Terminator::Jump(b)) = function.blocks[a].terminator {
            let b = b.index();
            if b == a || b == Function::ENTRY.index() || predecessors[b] != 1 || merged[b] {
                break;
            }

            let insts = std::mem::take(&mut function.blocks[b].insts);
            let terminator = function.blocks[b].terminator.take();
            function.blocks[a].insts.extend(insts);
            function.blocks[a].terminator = terminator;
            // keep it well formed until it gets removed
            function.blocks[b].terminator = Some(Terminator::Return(0));
            predecessors[b] = 0;
            merged[b] = true;
            changed = true;
        }
    }
    changed
}

fn remove_unreachable(function: &mut Function) -> bool {
    let mut reachable = vec![false; function.blocks.len()];
    let mut queue = VecDeque::from([Function::ENTRY]);
    reachable[Function::ENTRY.index()] = true;

    while let Some(block) = queue.pop_front() {
        if let Some(terminator) = &function.block(block).terminator {
            for successor in terminator.successors() {
                if !reachable[successor.index()] {
                    reachable[successor.index()] = true;
                    queue.push_back(successor);
                }
            }
        }
    }

    if reachable.iter().all(|r| *r) {
        return false;
    }

    let mut remap = vec![None; function.blocks.len()];
    let mut next = 0u32;
    for (i, r) in reachable.iter().enumerate() {
        if *r {
            remap[i] = Some(BlockId(next));
            next += 1;
        }
    }

    let blocks = std::mem::take(&mut function.blocks);
    function.blocks = blocks
        .into_iter()
        .zip(reachable)
        .filter_map(|(block, r)| r.then_some(block))
        .collect();

    for block in function.blocks.iter_mut() {
        if let Some(terminator) = &mut block.terminator {
            // every successor of a reachable block is reachable
            terminator.map_successors(|target| remap[target.index()].unwrap_or(target));
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{verify, Builder, Module, Ty};

    fn module(function: Function) -> Module {
        Module {
            name: "test".to_string(),
            tape_size: 8,
            main: function,
            debug_info: None,
        }
    }

    #[test]
    fn straight_line_chain_collapses_into_entry() {
        let mut builder = Builder::new("main");
        let b = builder.create_block("b");
        let c = builder.create_block("c");
        builder.fill_tape(0).unwrap();
        builder.terminate(Terminator::Jump(b)).unwrap();
        builder.position_at_end(b);
        builder.terminate(Terminator::Jump(c)).unwrap();
        builder.position_at_end(c);
        builder.store_cursor(0u64).unwrap();
        builder.terminate(Terminator::Return(0)).unwrap();

        let mut function = builder.finish();
        simplify_cfg(&mut function);

        assert_eq!(function.blocks.len(), 1);
        assert_eq!(function.blocks[0].insts.len(), 2);
        assert_eq!(function.blocks[0].terminator, Some(Terminator::Return(0)));
        assert_eq!(verify(&module(function)), Ok(()));
    }

    #[test]
    fn loops_survive() {
        let mut builder = Builder::new("main");
        let header = builder.create_block("header");
        let body = builder.create_block("body");
        let exit = builder.create_block("exit");
        builder.terminate(Terminator::Jump(header)).unwrap();

        builder.position_at_end(header);
        let cursor = builder.load_cursor().unwrap();
        let cell = builder.load_cell(cursor).unwrap();
        let cond = builder.cmp_eq(Ty::I8, cell, 0u64).unwrap();
        builder
            .terminate(Terminator::Branch {
                cond,
                then_block: exit,
                else_block: body,
            })
            .unwrap();

        builder.position_at_end(body);
        builder.terminate(Terminator::Jump(header)).unwrap();
        builder.position_at_end(exit);
        builder.terminate(Terminator::Return(0)).unwrap();

        let mut function = builder.finish();
        simplify_cfg(&mut function);

        // the empty body is threaded away so the header branches to itself
        assert_eq!(function.blocks.len(), 3);
        assert!(matches!(
            function.blocks[1].terminator,
            Some(Terminator::Branch {
                then_block: BlockId(2),
                else_block: BlockId(1),
                ..
            })
        ));
        assert_eq!(verify(&module(function)), Ok(()));
    }

    #[test]
    fn unreachable_blocks_are_dropped_and_ids_remapped() {
        let mut builder = Builder::new("main");
        let dead = builder.create_block("dead");
        let live = builder.create_block("live");
        builder.terminate(Terminator::Jump(live)).unwrap();
        builder.position_at_end(dead);
        builder.terminate(Terminator::Return(1)).unwrap();
        builder.position_at_end(live);
        builder.fill_tape(1).unwrap();
        builder.terminate(Terminator::Return(0)).unwrap();

        let mut function = builder.finish();
        simplify_cfg(&mut function);
        assert_eq!(function.blocks.len(), 1);
        assert_eq!(function.blocks[0].name, "entry");
        assert_eq!(verify(&module(function)), Ok(()));
    }

    #[test]
    fn empty_self_loop_terminates() {
        let mut builder = Builder::new("main");
        let spin = builder.create_block("spin");
        builder.terminate(Terminator::Jump(spin)).unwrap();
        builder.position_at_end(spin);
        builder.terminate(Terminator::Jump(spin)).unwrap();

        let mut function = builder.finish();
        simplify_cfg(&mut function);
        assert_eq!(verify(&module(function)), Ok(()));
    }
}
