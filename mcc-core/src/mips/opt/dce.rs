//! Machine Dead-Code Elimination
//!
//! Drops instructions whose defined virtual register is never read. Runs
//! before allocation only; physical defs are never touched.

use crate::mips::{MModule, Reg};
use std::collections::HashMap;

pub struct MipsDce;

impl MipsDce {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            let mut uses: HashMap<Reg, usize> = HashMap::new();
            for &block in module.func(func).blocks.iter() {
                for &inst in module.block(block).insts.iter() {
                    let data = module.inst(inst);
                    let first = if data.no_def() { 0 } else { 1 };
                    for operand in data.operands.iter().skip(first) {
                        if operand.is_virtual() {
                            *uses.entry(operand.clone()).or_insert(0) += 1;
                        }
                    }
                }
            }
            for block in module.func(func).blocks.clone() {
                for inst in module.block(block).insts.clone() {
                    let data = module.inst(inst);
                    if data.removed || data.no_def() || data.is_terminator() {
                        continue;
                    }
                    if !data.operands[0].is_virtual() {
                        continue;
                    }
                    if uses.get(&data.operands[0]).copied().unwrap_or(0) == 0 {
                        module.remove_inst(inst);
                    }
                }
            }
        }
    }
}
