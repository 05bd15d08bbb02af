//! Phi Elimination
//!
//! Machine phis cannot survive to emission. For every edge into a block
//! with phis a fresh jump block is inserted; the phi's contribution along
//! that edge becomes a parallel-copy pseudo-instruction in the jump block,
//! and the phis are deleted. The parallel copies are then serialized
//! swap-free: copies whose destination is not the source of any
//! outstanding copy are emitted as moves; a remaining cycle is broken by
//! copying one source into a fresh temporary.

use crate::mips::{MBlockId, MFuncId, MInstId, MModule, MOp, Reg, ZERO};
use std::collections::HashMap;

pub struct PhiElimination;

impl PhiElimination {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            Self::run_func(module, func);
        }
    }

    fn run_func(module: &mut MModule, func: MFuncId) {
        let mut label2block: HashMap<Reg, MBlockId> = HashMap::new();
        for &block in module.func(func).blocks.iter() {
            label2block.insert(module.block(block).label.clone(), block);
        }

        // Edges from the terminator runs.
        let mut in_edges: HashMap<MBlockId, Vec<MBlockId>> = HashMap::new();
        for &block in module.func(func).blocks.iter() {
            for &inst in module.block(block).insts.iter().rev() {
                let data = module.inst(inst);
                if !data.is_terminator() {
                    break;
                }
                let target = match data.op {
                    MOp::J => data.operands[0].clone(),
                    MOp::Jr => break,
                    _ => data.operands.last().cloned().expect("branch has a target"),
                };
                if let Some(&to) = label2block.get(&target) {
                    in_edges.entry(to).or_default().push(block);
                }
            }
        }

        for block in module.func(func).blocks.clone() {
            Self::split_edges(module, func, block, &in_edges);
        }
        for block in module.func(func).blocks.clone() {
            Self::sequentialize(module, block);
        }
    }

    fn split_edges(
        module: &mut MModule,
        func: MFuncId,
        block: MBlockId,
        in_edges: &HashMap<MBlockId, Vec<MBlockId>>,
    ) {
        let has_phi = module
            .block(block)
            .insts
            .first()
            .map_or(false, |&i| module.inst(i).op == MOp::Phi);
        if !has_phi {
            return;
        }
        let block_label = module.block(block).label.clone();
        let func_name = module.func(func).name.clone();

        for &from in in_edges.get(&block).map(|v| v.as_slice()).unwrap_or(&[]) {
            let jump_label = Reg::Label(format!(
                "{}_jump_{}_{}",
                func_name, from.0, block.0
            ));
            let jump = module.new_block(func, jump_label.clone());
            module.block_mut(jump).loop_depth = module.block(from).loop_depth;

            // Retarget the edge through the jump block.
            for inst in module.block(from).insts.clone().into_iter().rev() {
                let data = module.inst(inst);
                if !data.is_terminator() || data.op == MOp::Jr {
                    break;
                }
                if data.op == MOp::J {
                    if data.operands[0] == block_label {
                        module.set_operand(inst, 0, jump_label.clone());
                    }
                } else {
                    let last = data.operands.len() - 1;
                    if data.operands[last] == block_label {
                        module.set_operand(inst, last, jump_label.clone());
                    }
                }
            }

            // One parallel copy per phi entry on this edge.
            let from_label = module.block(from).label.clone();
            for inst in module.block(block).insts.clone() {
                if module.inst(inst).op != MOp::Phi {
                    break;
                }
                let mut i = 1;
                while i + 1 < module.inst(inst).operands.len() {
                    if *module.operand(inst, i + 1) == from_label {
                        module.set_operand(inst, i + 1, jump_label.clone());
                        let dest = module.operand(inst, 0).clone();
                        let src = module.operand(inst, i).clone();
                        let pcopy = module.new_inst(MOp::PCopy, &[dest, src]);
                        module.append_inst(jump, pcopy);
                    }
                    i += 2;
                }
            }
            let jump_inst = module.new_inst(MOp::J, &[block_label.clone()]);
            module.append_inst(jump, jump_inst);
        }

        for inst in module.block(block).insts.clone() {
            if module.inst(inst).op != MOp::Phi {
                break;
            }
            module.remove_inst(inst);
        }
    }

    /// Serialize a jump block's parallel copies into plain moves.
    fn sequentialize(module: &mut MModule, block: MBlockId) {
        let starts_with_pcopy = module
            .block(block)
            .insts
            .first()
            .map_or(false, |&i| module.inst(i).op == MOp::PCopy);
        if !starts_with_pcopy {
            return;
        }
        let jump_inst = *module
            .block(block)
            .insts
            .last()
            .expect("jump block is terminated");

        loop {
            let mut use_count: HashMap<Reg, usize> = HashMap::new();
            let mut outstanding: Option<MInstId> = None;
            let mut pcopy_count = 0;
            for &inst in module.block(block).insts.iter() {
                let data = module.inst(inst);
                if data.op != MOp::PCopy {
                    continue;
                }
                if data.operands[1].is_virtual() {
                    *use_count.entry(data.operands[1].clone()).or_insert(0) += 1;
                }
                if data.operands[0] != data.operands[1] {
                    pcopy_count += 1;
                    outstanding = Some(inst);
                }
            }
            if pcopy_count == 0 {
                break;
            }

            let mut emitted = 0;
            for inst in module.block(block).insts.clone() {
                let data = module.inst(inst);
                if data.op != MOp::PCopy {
                    continue;
                }
                let dest = data.operands[0].clone();
                if use_count.get(&dest).copied().unwrap_or(0) == 0 {
                    let src = data.operands[1].clone();
                    let mv = module.new_inst(MOp::Add, &[dest, ZERO, src]);
                    module.insert_before(jump_inst, mv);
                    module.remove_inst(inst);
                    emitted += 1;
                }
            }
            if emitted > 0 {
                continue;
            }

            // Every remaining copy is in a cycle; peel one source into a
            // temporary.
            let pcopy = outstanding.expect("cycle has a member");
            let temp = module.new_vreg();
            let src = module.operand(pcopy, 1).clone();
            let mv = module.new_inst(MOp::Add, &[temp.clone(), ZERO, src]);
            module.insert_before(jump_inst, mv);
            module.set_operand(pcopy, 1, temp);
        }

        for inst in module.block(block).insts.clone() {
            if module.inst(inst).op == MOp::PCopy {
                module.remove_inst(inst);
            }
        }
    }
}
