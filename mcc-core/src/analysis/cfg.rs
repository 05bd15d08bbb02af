//! Control-Flow and Call-Graph Construction
//!
//! Rebuilds the predecessor/successor lists of every block and the
//! caller/callee lists of every function from the instruction stream.
//! Passes that rewrite terminators re-run this before relying on edges.

use crate::ir::{Module, Opcode};

pub struct CfgBuilder;

impl CfgBuilder {
    pub fn run(module: &mut Module) {
        for func in module.funcs.clone() {
            let data = module.func_mut(func);
            data.callees.clear();
            data.callers.clear();
        }
        for func in module.funcs.clone() {
            for block in module.func(func).blocks.clone() {
                module.block_mut(block).preds.clear();
                module.block_mut(block).succs.clear();
            }
        }

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            for block in module.func(func).blocks.clone() {
                for inst in module.block(block).insts.clone() {
                    match module.inst(inst).op {
                        Opcode::Jump => {
                            let target = module.as_block(module.operand(inst, 0));
                            module.add_cfg_edge(block, target);
                        }
                        Opcode::Branch => {
                            let t = module.as_block(module.operand(inst, 1));
                            let f = module.as_block(module.operand(inst, 2));
                            module.add_cfg_edge(block, t);
                            module.add_cfg_edge(block, f);
                        }
                        Opcode::Call => {
                            let index = if module.inst(inst).no_def { 0 } else { 1 };
                            let callee = module.as_func(module.operand(inst, index));
                            module.func_mut(func).callees.push(callee);
                            module.func_mut(callee).callers.push(func);
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
