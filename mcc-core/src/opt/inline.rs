//! Function Inlining
//!
//! Clones the body of every non-recursive, non-intrinsic callee into its
//! call sites. The call's block is split at the call; the callee's blocks
//! are copied with every defined value renamed through a mapping seeded by
//! the argument bindings; each cloned `ret` becomes a jump to the split
//! point, feeding a phi that merges the return values.

use crate::analysis::CfgBuilder;
use crate::ir::{FuncId, InstId, Module, Opcode, ValueId, ValueKind};
use std::collections::HashMap;

pub struct Inliner;

impl Inliner {
    pub fn run(module: &mut Module) {
        CfgBuilder::run(module);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            for block in module.func(func).blocks.clone() {
                if module.block(block).removed {
                    continue;
                }
                for inst in module.block(block).insts.clone() {
                    if module.inst(inst).removed || module.inst(inst).op != Opcode::Call {
                        continue;
                    }
                    let index = if module.inst(inst).no_def { 0 } else { 1 };
                    let callee = module.as_func(module.operand(inst, index));
                    if module.func(callee).reserved {
                        continue;
                    }
                    // Self-recursive callees stay out-of-line.
                    if module.func(callee).callees.contains(&callee) {
                        continue;
                    }
                    Self::inline_call(module, func, inst, callee);
                }
            }
        }
    }

    fn inline_call(module: &mut Module, func: FuncId, call: InstId, callee: FuncId) {
        module.changed = true;
        let mut mapping: HashMap<ValueId, ValueId> = HashMap::new();

        // Split the block at the call site.
        let cur_block = module.inst(call).block;
        let after_call = module.insert_block_after(func, cur_block);
        let call_pos = module
            .block(cur_block)
            .insts
            .iter()
            .position(|&i| i == call)
            .expect("call not in its block");
        let tail: Vec<InstId> = module.block_mut(cur_block).insts.split_off(call_pos + 1);
        for &inst in tail.iter() {
            module.inst_mut(inst).block = after_call;
        }
        module.block_mut(after_call).insts = tail;

        let cur_succs = module.block(cur_block).succs.clone();
        module.block_mut(after_call).succs = cur_succs.clone();
        let cur_value = module.block(cur_block).value;
        let after_value = module.block(after_call).value;
        for succ in cur_succs {
            for inst in module.block(succ).insts.clone() {
                if module.inst(inst).op != Opcode::Phi {
                    break;
                }
                let mut i = 2;
                while i < module.inst(inst).operands.len() {
                    if module.operand(inst, i) == cur_value {
                        module.set_operand(inst, i, after_value);
                    }
                    i += 2;
                }
            }
        }

        // Merge the return values through a phi at the join.
        let phi = if module.inst(call).no_def {
            None
        } else {
            let def = module.operand(call, 0);
            let ty = module.value(def).ty.clone();
            let phi = module.new_inst(Opcode::Phi, ty, false, &[def]);
            module.prepend_inst(after_call, phi);
            Some(phi)
        };

        // Bind parameters to the actual arguments.
        let index = if module.inst(call).no_def { 0 } else { 1 };
        let params = module.func(callee).params.clone();
        for (i, &param) in params.iter().enumerate() {
            mapping.insert(param, module.operand(call, i + index + 1));
        }

        // Copy the callee's blocks after the call site.
        let callee_blocks = module.func(callee).blocks.clone();
        let mut last_block = cur_block;
        for &src in callee_blocks.iter() {
            let dest = module.insert_block_after(func, last_block);
            last_block = dest;
            mapping.insert(module.block(src).value, module.block(dest).value);
            mapping.insert(module.block(src).label, module.block(dest).label);
        }
        let inline_entry_value = mapping[&module.block(callee_blocks[0]).value];

        for &src in callee_blocks.iter() {
            let dest = module.as_block(mapping[&module.block(src).value]);
            for src_inst in module.block(src).insts.clone() {
                let dest_inst = module.copy_inst(src_inst);
                module.append_inst(dest, dest_inst);
                for i in 0..module.inst(dest_inst).operands.len() {
                    let reg = module.operand(dest_inst, i);
                    if module.value(reg).reg_id.is_some() && !mapping.contains_key(&reg) {
                        let ty = module.value(reg).ty.clone();
                        let fresh = module.new_reg(ty);
                        mapping.insert(reg, fresh);
                    }
                    if let Some(&mapped) = mapping.get(&reg) {
                        module.set_operand(dest_inst, i, mapped);
                    }
                    if let ValueKind::Literal(v) = module.value(reg).kind {
                        let lit = module.new_literal(v);
                        module.set_operand(dest_inst, i, lit);
                    }
                }
                if module.inst(dest_inst).op == Opcode::Ret {
                    let jump = module.new_branch(None, after_value, None);
                    match phi {
                        None => {
                            module.replace_inst(dest_inst, jump);
                        }
                        Some(phi) => {
                            let ret_val = module.operand(dest_inst, 0);
                            module.replace_inst(dest_inst, jump);
                            module.add_operand(phi, ret_val);
                            let dest_value = module.block(dest).value;
                            module.add_operand(phi, dest_value);
                        }
                    }
                }
            }
        }

        let jump = module.new_branch(None, inline_entry_value, None);
        module.replace_inst(call, jump);
    }
}
