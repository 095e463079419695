use std::collections::HashSet;

use clap::ValueEnum;

use crate::ir::Module;

use self::{
    constant_folding::constant_folding, dead_code::dead_code, simplify_cfg::simplify_cfg,
    store_forwarding::store_forwarding,
};

pub mod constant_folding;
pub mod dead_code;
pub mod simplify_cfg;
pub mod store_forwarding;

#[derive(ValueEnum, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Optimizations {
    /// Reuse values already loaded/stored in the same block, drop overwritten stores
    StoreForwarding,
    /// Fold chains of constant adds/subs into one
    ConstantFolding,
    /// Remove unused side-effect free instructions
    DeadCode,
    /// Thread jumps, merge straight-line blocks & drop unreachable ones
    SimplifyCfg,
}

impl Optimizations {
    pub fn all() -> HashSet<Optimizations> {
        Optimizations::value_variants().iter().copied().collect()
    }
}

pub fn optimize(module: &Module, options: &HashSet<Optimizations>) -> Module {
    let mut copy = module.clone();
    let function = &mut copy.main;

    // order matters, each pass leaves work behind for the next one
    if options.contains(&Optimizations::StoreForwarding) {
        store_forwarding(function);
    }

    if options.contains(&Optimizations::ConstantFolding) {
        constant_folding(function);
    }

    if options.contains(&Optimizations::DeadCode) {
        dead_code(function);
    }

    if options.contains(&Optimizations::SimplifyCfg) {
        simplify_cfg(function);
    }

    copy
}
