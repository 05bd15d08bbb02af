//! Dead-Code Elimination
//!
//! Removes functions unreachable from `main` in the call graph, basic
//! blocks unreachable from the entry (dropping their contributions to
//! successor phis first), and side-effect-free instructions whose defined
//! value has no remaining use.

use crate::analysis::CfgBuilder;
use crate::ir::{BlockId, Module, Opcode};
use std::collections::HashSet;

pub struct Dce;

impl Dce {
    pub fn run(module: &mut Module) {
        CfgBuilder::run(module);
        crate::opt::remove_unreachable_funcs(module);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }

            // Unreachable blocks.
            let entry = module.func(func).blocks[0];
            let mut reachable: HashSet<BlockId> = HashSet::new();
            let mut work = vec![entry];
            while let Some(block) = work.pop() {
                if !reachable.insert(block) {
                    continue;
                }
                for &succ in module.block(block).succs.iter() {
                    work.push(succ);
                }
            }
            for block in module.func(func).blocks.clone() {
                if reachable.contains(&block) {
                    continue;
                }
                for succ in module.block(block).succs.clone() {
                    module.remove_phi_entry(succ, block);
                }
                module.destroy_block(block);
                module.remove_block(func, block);
                module.changed = true;
            }

            // Unused pure definitions, bottom-up so chains die in one pass.
            for block in module.func(func).blocks.clone().into_iter().rev() {
                for inst in module.block(block).insts.clone().into_iter().rev() {
                    let data = module.inst(inst);
                    if data.removed || data.no_def || data.is_terminator() {
                        continue;
                    }
                    if data.op == Opcode::Call {
                        continue;
                    }
                    let def = data.operands[0];
                    // The def itself is the value's only remaining use.
                    if module.value(def).uses.len() == 1 {
                        module.remove_inst(inst);
                        module.changed = true;
                    }
                }
            }
        }
    }
}
