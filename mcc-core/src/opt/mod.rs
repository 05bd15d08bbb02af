//! IR Optimization Pipeline
//!
//! One fixed-point loop over the whole pass group: mem2reg keeps the IR in
//! SSA form, then unrolling, simplification, inlining, the two DCE layers,
//! partial evaluation, global localization, array scalarization, value
//! numbering, and code motion each run once. Any pass that rewrites
//! anything sets the module's `changed` flag and the group repeats; a full
//! quiet round ends the loop, so re-running the pipeline on its own output
//! is a no-op.

pub mod adce;
pub mod array2var;
pub mod constfold;
pub mod dce;
pub mod funceval;
pub mod gcm;
pub mod gvlocal;
pub mod gvn;
pub mod inline;
pub mod labeller;
pub mod lvn;
pub mod mem2reg;
pub mod unroll;

use crate::analysis::CfgBuilder;
use crate::config::Config;
use crate::ir::{FuncId, Module};
use std::collections::HashSet;

pub use adce::AggressiveDce;
pub use array2var::Array2Var;
pub use constfold::ConstOptimizer;
pub use dce::Dce;
pub use funceval::FuncEval;
pub use gcm::Gcm;
pub use gvlocal::GvLocalizer;
pub use gvn::Gvn;
pub use inline::Inliner;
pub use labeller::RegLabeller;
pub use lvn::Lvn;
pub use mem2reg::Mem2Reg;
pub use unroll::LoopUnroll;

/// Drop functions unreachable from `main` in the call graph. The call
/// graph must be current.
pub(crate) fn remove_unreachable_funcs(module: &mut Module) {
    let mut reachable: HashSet<FuncId> = HashSet::new();
    let mut work = vec![module.main_func()];
    while let Some(func) = work.pop() {
        if !reachable.insert(func) {
            continue;
        }
        for &callee in module.func(func).callees.iter() {
            work.push(callee);
        }
    }
    for func in module.funcs.clone() {
        if reachable.contains(&func) {
            continue;
        }
        for block in module.func(func).blocks.clone() {
            module.destroy_block(block);
        }
        module.remove_func(func);
        module.changed = true;
    }
}

/// The IR pass pipeline driver.
pub struct IrOptimizer;

impl IrOptimizer {
    pub fn run(module: &mut Module, config: &Config) {
        let mut rounds = 0u32;
        loop {
            module.changed = false;
            if config.enable_ssa {
                Mem2Reg::run(module);
            }
            if config.enable_ir_opt {
                LoopUnroll::run(module, config);
                ConstOptimizer::run(module);
                Inliner::run(module);
                Dce::run(module);
                AggressiveDce::run(module);
                FuncEval::run(module, config);
                GvLocalizer::run(module);
                Array2Var::run(module);
                Lvn::run(module);
                Gvn::run(module);
                Gcm::run(module);
            }
            rounds += 1;
            if !module.changed {
                break;
            }
        }
        log::debug!("IR pipeline reached fixpoint after {} rounds", rounds);
        CfgBuilder::run(module);
        RegLabeller::run(module);
    }
}
