//! Register Labelling
//!
//! Assigns per-function sequential numbers to parameters, block labels, and
//! instruction results. The numbers drive IR printing, the reinsertion
//! order in global code motion, and the block ordering used by loop
//! unrolling, so passes that depend on them run this first.

use crate::ir::{Module, ValueId};
use std::collections::HashSet;

pub struct RegLabeller;

impl RegLabeller {
    pub fn run(module: &mut Module) {
        let mut labelled: HashSet<ValueId> = HashSet::new();
        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            let mut next = 0u32;
            for param in module.func(func).params.clone() {
                Self::label(module, &mut labelled, &mut next, param);
            }
            for block in module.func(func).blocks.clone() {
                let label = module.block(block).label;
                Self::label(module, &mut labelled, &mut next, label);
                for inst in module.block(block).insts.clone() {
                    let data = module.inst(inst);
                    if data.no_def || data.is_terminator() {
                        continue;
                    }
                    if let Some(&def) = data.operands.first() {
                        Self::label(module, &mut labelled, &mut next, def);
                    }
                }
            }
        }
    }

    fn label(module: &mut Module, labelled: &mut HashSet<ValueId>, next: &mut u32, value: ValueId) {
        if module.value(value).reg_id.is_none() {
            return;
        }
        if !labelled.insert(value) {
            return;
        }
        module.value_mut(value).reg_id = Some(*next);
        *next += 1;
    }
}
