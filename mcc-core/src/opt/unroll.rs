//! Loop Unrolling
//!
//! Recognizes the simple counted loop shape the front end emits for `for`
//! loops: a single exit at the header, an induction phi `i = phi(init,
//! step)` with constant `init`, a step `i = i + c` with constant `c`, and a
//! header compare of `i` against a constant bound. The trip count is
//! computed from the bound, and if the loop fits the instruction and block
//! budgets its body is cloned once per iteration with the back edge
//! rewritten into a straight chain.
//!
//! A counting loop whose body is empty apart from the induction update is
//! replaced outright by the closed-form final value of the phi.

use crate::analysis::{CfgBuilder, Dominance, Loop, LoopInfo};
use crate::config::Config;
use crate::ir::{BlockId, FuncId, IcmpCond, Module, Opcode, ValueId, ValueKind};
use std::collections::HashMap;

pub struct LoopUnroll;

impl LoopUnroll {
    pub fn run(module: &mut Module, config: &Config) {
        crate::opt::labeller::RegLabeller::run(module);
        CfgBuilder::run(module);
        let dominance = Dominance::compute(module);
        let loops = LoopInfo::compute(module, &dominance);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            for block in module.func(func).blocks.clone() {
                if module.block(block).removed || module.block(block).insts.is_empty() {
                    continue;
                }
                let Some(headed) = loops.headers.get(&block) else {
                    continue;
                };
                if headed.len() != 1 {
                    continue;
                }
                Self::try_unroll(module, config, &loops, func, &loops.loops[headed[0]]);
            }
        }
    }

    fn try_unroll(
        module: &mut Module,
        config: &Config,
        loops: &LoopInfo,
        func: FuncId,
        lp: &Loop,
    ) {
        if lp.exits.len() != 1 {
            return;
        }
        // Reject nested loops and non-intrinsic calls; count the body.
        let mut inst_cnt: u32 = 0;
        for &block in lp.body.iter() {
            if block != lp.header && loops.headers.contains_key(&block) {
                return;
            }
            for &inst in module.block(block).insts.iter() {
                if module.inst(inst).op == Opcode::Call {
                    let index = if module.inst(inst).no_def { 0 } else { 1 };
                    let callee = module.as_func(module.operand(inst, index));
                    if !module.func(callee).reserved {
                        return;
                    }
                }
                inst_cnt += 1;
            }
        }

        let (exiting, exit) = lp.exits[0];
        // Counted for-loops exit at the header.
        if exiting != lp.header {
            return;
        }

        let mut preheader = None;
        let mut latch = None;
        for &from in module.block(exiting).preds.iter() {
            if lp.body.contains(&from) {
                latch = Some(from);
            } else {
                preheader = Some(from);
            }
        }
        let (Some(preheader), Some(latch)) = (preheader, latch) else {
            return;
        };
        let mut target = None;
        for &to in module.block(exiting).succs.iter() {
            if lp.body.contains(&to) {
                target = Some(to);
            }
        }
        let Some(target) = target else {
            return;
        };

        // The exit condition: icmp of the induction phi against a constant.
        let Some(exit_inst) = module.terminator(exiting) else {
            return;
        };
        if module.inst(exit_inst).op != Opcode::Branch {
            return;
        }
        let Some(exit_cond) = module.defining_inst(module.operand(exit_inst, 0)) else {
            return;
        };
        let Opcode::Icmp(cond) = module.inst(exit_cond).op else {
            return;
        };
        let op1 = module.operand(exit_cond, 1);
        let op2 = module.operand(exit_cond, 2);
        let (var, bound) = if module.is_const(op1) {
            (op2, module.const_value(op1))
        } else if module.is_const(op2) {
            (op1, module.const_value(op2))
        } else {
            return;
        };

        let Some(phi_inst) = module.defining_inst(var) else {
            return;
        };
        if module.inst(phi_inst).op != Opcode::Phi || module.inst(phi_inst).block != exiting {
            return;
        }
        let mut init_var = None;
        let mut step_var = None;
        for (value, pred) in module.phi_pairs(phi_inst) {
            if pred == latch {
                step_var = Some(value);
            } else if pred == preheader {
                init_var = Some(value);
            }
        }
        let (Some(init_var), Some(step_var)) = (init_var, step_var) else {
            return;
        };
        if !module.is_const(init_var) {
            return;
        }
        let init = module.const_value(init_var);
        let Some(step_inst) = module.defining_inst(step_var) else {
            return;
        };
        if !lp.body.contains(&module.inst(step_inst).block) {
            return;
        }
        if module.inst(step_inst).op != Opcode::Add || module.operand(step_inst, 1) != var {
            return;
        }
        if !module.is_const(module.operand(step_inst, 2)) {
            return;
        }
        let step = module.const_value(module.operand(step_inst, 2));

        let trip = match (cond, step) {
            (IcmpCond::Slt, s) if s > 0 => (bound + s - 1 - init) / s,
            (IcmpCond::Sle, s) if s > 0 => (bound + s - init) / s,
            (IcmpCond::Sgt, s) if s < 0 => (bound + s + 1 - init) / s,
            (IcmpCond::Sge, s) if s < 0 => (bound + s - init) / s,
            _ => return,
        };
        let trip = trip.max(0);

        // A loop that only counts collapses to its final induction value.
        let header_insts = &module.block(exiting).insts;
        let target_insts = &module.block(target).insts;
        if target == latch
            && target_insts.first() == Some(&step_inst)
            && target_insts
                .get(1)
                .map_or(false, |&i| module.inst(i).is_terminator())
            && header_insts.first() == Some(&phi_inst)
            && header_insts.get(1) == Some(&exit_cond)
            && header_insts.get(2) == Some(&exit_inst)
        {
            let final_value = init.wrapping_add(trip.wrapping_mul(step));
            let def = module.operand(phi_inst, 0);
            let lit = module.new_literal(final_value);
            module.replace_all_uses(def, lit);
            module.changed = true;
            return;
        }

        let body_blocks = lp.body.len() as u32;
        if trip as i64 > (config.unroll_max_blocks / body_blocks.max(1)) as i64 {
            return;
        }
        if trip as i64 > (config.unroll_max_insts / inst_cnt.max(1)) as i64 {
            return;
        }

        log::debug!(
            "unrolling loop at header {:?}: trip count {}, {} insts",
            exiting,
            trip,
            inst_cnt
        );
        Self::unroll(
            module, func, lp, exiting, preheader, latch, target, exit, trip as usize,
        );
        module.changed = true;
    }

    #[allow(clippy::too_many_arguments)]
    fn unroll(
        module: &mut Module,
        func: FuncId,
        lp: &Loop,
        exiting: BlockId,
        preheader: BlockId,
        latch: BlockId,
        target: BlockId,
        exit: BlockId,
        trip: usize,
    ) {
        // Clone in label order so the header copy leads each iteration.
        let mut body: Vec<BlockId> = lp.body.iter().copied().collect();
        body.sort_by_key(|&b| {
            let label = module.block(b).label;
            module.value(label).reg_id.unwrap_or(u32::MAX)
        });

        let mut mapping: Vec<HashMap<ValueId, ValueId>> = vec![HashMap::new(); trip + 1];
        let mut last_block = *body.last().expect("loop body is non-empty");

        for i in 0..=trip {
            // Allocate iteration blocks (the final iteration only needs the
            // header copy, which carries the exit compare).
            for &src in body.iter() {
                if i == trip && src != exiting {
                    continue;
                }
                let dest = module.insert_block_after(func, last_block);
                last_block = dest;
                mapping[i].insert(module.block(src).value, module.block(dest).value);
                mapping[i].insert(module.block(src).label, module.block(dest).label);
            }
            // Copy instructions and mint fresh result registers.
            for &src in body.iter() {
                if i == trip && src != exiting {
                    continue;
                }
                let dest = module.as_block(mapping[i][&module.block(src).value]);
                for src_inst in module.block(src).insts.clone() {
                    let dest_inst = module.copy_inst(src_inst);
                    module.append_inst(dest, dest_inst);
                    if let Some(def) = module.inst(dest_inst).def() {
                        let ty = module.value(def).ty.clone();
                        let fresh = module.new_reg(ty);
                        mapping[i].insert(def, fresh);
                    }
                }
            }
            // Rewrite operands: current-iteration names first, previous
            // iteration for values flowing around the back edge; header-phi
            // incomings always read the previous iteration.
            for &src in body.iter() {
                if i == trip && src != exiting {
                    continue;
                }
                let dest = module.as_block(mapping[i][&module.block(src).value]);
                for dest_inst in module.block(dest).insts.clone() {
                    let is_header_phi =
                        src == exiting && module.inst(dest_inst).op == Opcode::Phi;
                    for j in 0..module.inst(dest_inst).operands.len() {
                        let reg = module.operand(dest_inst, j);
                        if mapping[i].contains_key(&reg) && !(is_header_phi && j > 0) {
                            let mapped = mapping[i][&reg];
                            module.set_operand(dest_inst, j, mapped);
                        } else if i > 0 && mapping[i - 1].contains_key(&reg) {
                            let mapped = mapping[i - 1][&reg];
                            module.set_operand(dest_inst, j, mapped);
                        }
                        if let ValueKind::Literal(v) = module.value(reg).kind {
                            let lit = module.new_literal(v);
                            module.set_operand(dest_inst, j, lit);
                        }
                    }
                }
            }
        }

        // Stitch iterations into a chain and retarget the exits.
        let exit_value = module.block(exit).value;
        for i in 0..=trip {
            let cur_exiting = module.as_block(mapping[i][&module.block(exiting).value]);
            if i < trip {
                let target_value = mapping[i][&module.block(target).value];
                let term = module.terminator(cur_exiting).expect("terminated block");
                let jump = module.new_branch(None, target_value, None);
                module.replace_inst(term, jump);

                let cur_latch = module.as_block(mapping[i][&module.block(latch).value]);
                let next_header = mapping[i + 1][&module.block(exiting).value];
                let term = module.terminator(cur_latch).expect("terminated block");
                let jump = module.new_branch(None, next_header, None);
                module.replace_inst(term, jump);
            } else {
                let term = module.terminator(cur_exiting).expect("terminated block");
                let jump = module.new_branch(None, exit_value, None);
                module.replace_inst(term, jump);
            }

            // Each header copy keeps exactly its live incoming: the
            // preheader pair on entry, the previous iteration afterwards.
            let preheader_value = module.block(preheader).value;
            let latch_value = module.block(latch).value;
            for inst in module.block(cur_exiting).insts.clone() {
                if module.inst(inst).op != Opcode::Phi {
                    break;
                }
                let mut j = 1;
                while j + 1 < module.inst(inst).operands.len() {
                    let label = module.operand(inst, j + 1);
                    let drop = if i == 0 {
                        label != preheader_value
                    } else {
                        label != latch_value
                    };
                    if drop {
                        module.remove_operand(inst, j + 1);
                        module.remove_operand(inst, j);
                        break;
                    }
                    j += 2;
                }
            }
        }

        // Enter the first iteration instead of the original header.
        let exiting_value = module.block(exiting).value;
        let first_header = mapping[0][&exiting_value];
        if let Some(term) = module.terminator(preheader) {
            for j in 0..module.inst(term).operands.len() {
                if module.operand(term, j) == exiting_value {
                    module.set_operand(term, j, first_header);
                }
            }
        }

        // Downstream users of loop definitions read the last copy made.
        for &block in body.iter() {
            for inst in module.block(block).insts.clone() {
                let Some(def) = module.inst(inst).def() else {
                    continue;
                };
                for i in (0..=trip).rev() {
                    if let Some(&mapped) = mapping[i].get(&def) {
                        module.replace_all_uses(def, mapped);
                        break;
                    }
                }
            }
            module.remove_block(func, block);
            module.destroy_block(block);
        }
    }
}
