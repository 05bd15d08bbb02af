//! Aggressive Dead-Code Elimination
//!
//! Assumes everything dead until proven live: terminators, stores, calls,
//! and returns are roots; liveness propagates through operands and, as a
//! control-dependence approximation, through the terminators of a live
//! block's predecessors. Whatever stays unmarked is deleted.

use crate::analysis::CfgBuilder;
use crate::ir::{BlockId, Module, Opcode, ValueId};
use std::collections::HashSet;

pub struct AggressiveDce;

enum Work {
    Value(ValueId),
    Block(BlockId),
}

impl AggressiveDce {
    pub fn run(module: &mut Module) {
        CfgBuilder::run(module);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            let mut live_values: HashSet<ValueId> = HashSet::new();
            let mut live_blocks: HashSet<BlockId> = HashSet::new();
            live_blocks.insert(module.func(func).blocks[0]);

            let mut work: Vec<Work> = Vec::new();
            for block in module.func(func).blocks.clone().into_iter().rev() {
                for inst in module.block(block).insts.clone().into_iter().rev() {
                    let data = module.inst(inst);
                    let is_root = matches!(
                        data.op,
                        Opcode::Call | Opcode::Ret | Opcode::Store | Opcode::Jump | Opcode::Branch
                    );
                    if is_root {
                        for &value in data.operands.iter() {
                            work.push(Work::Value(value));
                        }
                    }
                }
            }

            while let Some(item) = work.pop() {
                match item {
                    Work::Value(value) => {
                        if module.value(value).reg_id.is_none() {
                            continue;
                        }
                        if !live_values.insert(value) {
                            continue;
                        }
                        for u in module.value(value).uses.clone() {
                            if u.index > 0 {
                                continue;
                            }
                            let inst = module.inst(u.inst);
                            if inst.removed || inst.no_def {
                                continue;
                            }
                            for &op in inst.operands.iter() {
                                work.push(Work::Value(op));
                            }
                            work.push(Work::Block(inst.block));
                        }
                    }
                    Work::Block(block) => {
                        if !live_blocks.insert(block) {
                            continue;
                        }
                        if let Some(term) = module.block(block).insts.last().copied() {
                            for &op in module.inst(term).operands.iter() {
                                work.push(Work::Value(op));
                            }
                        }
                        for &pred in module.block(block).preds.iter() {
                            work.push(Work::Block(pred));
                        }
                    }
                }
            }

            for block in module.func(func).blocks.clone().into_iter().rev() {
                for inst in module.block(block).insts.clone().into_iter().rev() {
                    let data = module.inst(inst);
                    if data.removed || data.no_def || data.is_terminator() {
                        continue;
                    }
                    if !live_values.contains(&data.operands[0]) {
                        module.remove_inst(inst);
                        module.changed = true;
                    }
                }
            }
        }
    }
}
