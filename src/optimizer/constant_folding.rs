use std::collections::HashMap;

use crate::ir::{BinaryOp, Function, Inst, Operand, Ty, Value};

/// Folds chains of adds/subs by a constant into a single add from the chain's root.
///
/// `%2 = add i8 %1, 1; %3 = add i8 %2, 1` becomes `%3 = add i8 %1, 2`, which leaves `%2`
/// to dead code elimination. Only I8/I32 are folded, their arithmetic wraps at the
/// operation width so the constants simply sum up.
pub fn constant_folding(function: &mut Function) {
    // value -> (root, accumulated addend, width)
    let mut offsets: HashMap<Value, (Value, u64, Ty)> = HashMap::new();

    for block in function.blocks.iter_mut() {
        for node in block.insts.iter_mut() {
            if let Inst::Binary {
                dst,
                op,
                ty,
                lhs,
                rhs: Operand::Const(constant),
            } = &mut node.inst
            {
                if !matches!(ty, Ty::I8 | Ty::I32) {
                    continue;
                }

                let addend = match op {
                    BinaryOp::Add => *constant,
                    BinaryOp::Sub => constant.wrapping_neg(),
                    BinaryOp::URem => continue,
                };

                let (root, total) = match offsets.get(&*lhs) {
                    Some(&(root, prior, prior_ty)) if prior_ty == *ty => (root, prior.wrapping_add(addend)),
                    _ => (*lhs, addend),
                };
                let total = ty.truncate(total);

                *op = BinaryOp::Add;
                *lhs = root;
                *constant = total;
                offsets.insert(*dst, (root, total, *ty));
            }
        }
    }
}
