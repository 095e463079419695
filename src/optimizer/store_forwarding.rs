use std::collections::{HashMap, HashSet};

use crate::ir::{Block, Function, Inst, Operand, Terminator, Ty, Value};

/// Block local load/store forwarding.
///
/// Every translated instruction re-reads the cursor and the current cell, so `+++` reads
/// the same cell three times and writes it three times. Within a block we know what the
/// last store wrote, so later loads can reuse that value and all but the last store go.
pub fn store_forwarding(function: &mut Function) {
    let types = value_types(function);
    let mut renames: HashMap<Value, Value> = HashMap::new();

    for block in function.blocks.iter_mut() {
        forward_loads(block, &types, &mut renames);
        drop_overwritten_stores(block);
    }

    // a value can be used outside of the block that renamed it
    if !renames.is_empty() {
        let rename = |value: Value| resolve(&renames, value);
        for block in function.blocks.iter_mut() {
            for node in block.insts.iter_mut() {
                node.inst.map_uses(rename);
            }
            if let Some(terminator) = &mut block.terminator {
                rename_condition(terminator, rename);
            }
        }
    }
}

fn resolve(renames: &HashMap<Value, Value>, mut value: Value) -> Value {
    while let Some(&renamed) = renames.get(&value) {
        value = renamed;
    }
    value
}

fn rename_condition(terminator: &mut Terminator, f: impl Fn(Value) -> Value) {
    if let Terminator::Branch { cond, .. } = terminator {
        *cond = f(*cond);
    }
}

/// The width of every value, as far as its definition tells us
fn value_types(function: &Function) -> Vec<Option<Ty>> {
    let mut types = vec![None; function.value_count as usize];
    for node in function.blocks.iter().flat_map(|block| block.insts.iter()) {
        let ty = match node.inst {
            Inst::LoadCursor { .. } => Ty::I64,
            Inst::LoadCell { .. } => Ty::I8,
            Inst::Binary { ty, .. } => ty,
            Inst::CmpEq { .. } => Ty::I1,
            Inst::ZExt { to, .. } | Inst::Trunc { to, .. } => to,
            Inst::Call { callee, .. } => callee.returns(),
            Inst::FillTape { .. } | Inst::StoreCursor { .. } | Inst::StoreCell { .. } => continue,
        };
        if let Some(dst) = node.inst.def() {
            if let Some(slot) = types.get_mut(dst.index()) {
                *slot = Some(ty);
            }
        }
    }
    types
}

fn forward_loads(block: &mut Block, types: &[Option<Ty>], renames: &mut HashMap<Value, Value>) {
    let mut cursor: Option<Value> = None;
    // cell index -> value the cell is known to hold
    let mut cells: HashMap<Value, Value> = HashMap::new();

    let mut kept = Vec::with_capacity(block.insts.len());
    for mut node in block.insts.drain(..) {
        node.inst.map_uses(|value| resolve(renames, value));

        match node.inst {
            Inst::LoadCursor { dst } => {
                if let Some(known) = cursor {
                    renames.insert(dst, known);
                    continue;
                }
                cursor = Some(dst);
            }
            Inst::StoreCursor { src } => {
                cursor = match src {
                    Operand::Value(value) => Some(value),
                    Operand::Const(_) => None,
                };
            }
            Inst::LoadCell { dst, index } => {
                if let Some(&known) = cells.get(&index) {
                    renames.insert(dst, known);
                    continue;
                }
                cells.insert(index, dst);
            }
            Inst::StoreCell { index, src } => {
                // another index value might point at the same cell
                cells.clear();
                let fits_in_cell = matches!(
                    types.get(src.index()).copied().flatten(),
                    Some(Ty::I8 | Ty::I1)
                );
                if fits_in_cell {
                    cells.insert(index, src);
                }
            }
            Inst::FillTape { .. } => cells.clear(),
            Inst::Binary { .. }
            | Inst::CmpEq { .. }
            | Inst::ZExt { .. }
            | Inst::Trunc { .. }
            | Inst::Call { .. } => {}
        }

        kept.push(node);
    }

    block.insts = kept;
    if let Some(terminator) = &mut block.terminator {
        rename_condition(terminator, |value| resolve(renames, value));
    }
}

/// Walk backwards remembering what gets overwritten before anything reads it
fn drop_overwritten_stores(block: &mut Block) {
    let mut overwritten_cells: HashSet<Value> = HashSet::new();
    let mut cursor_overwritten = false;
    let mut keep = vec![true; block.insts.len()];

    for (i, node) in block.insts.iter().enumerate().rev() {
        match node.inst {
            Inst::StoreCell { index, .. } => {
                if !overwritten_cells.insert(index) {
                    keep[i] = false;
                }
            }
            Inst::LoadCell { .. } | Inst::FillTape { .. } => overwritten_cells.clear(),
            Inst::StoreCursor { .. } => {
                if cursor_overwritten {
                    keep[i] = false;
                }
                cursor_overwritten = true;
            }
            Inst::LoadCursor { .. } => cursor_overwritten = false,
            _ => {}
        }
    }

    let mut keep = keep.into_iter();
    block.insts.retain(|_| keep.next().unwrap_or(true));
}
