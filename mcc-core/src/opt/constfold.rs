//! Constant Folding and Algebraic Simplification
//!
//! Local rewrite table applied to every instruction:
//!
//! - arithmetic: fold two-constant operands, strip identities (`x+0`,
//!   `x*1`, `x/1`, `x-0`), zero absorbers (`x*0`), self-cancellation
//!   (`x-x`, `x/x`), canonicalize constants to the right operand,
//!   reassociate chained constant adds/muls/divs, turn subtraction of a
//!   constant into addition, distribute `(x+c1)*c2`;
//! - comparisons: fold constant compares, collapse `icmp ne 0, zext(b)`
//!   (either order) back to `b`;
//! - getelementptr: merge chains whose indices are all constant;
//! - phi: a single-predecessor phi is its operand; a phi whose incomings
//!   agree collapses;
//! - branches: constant conditions become jumps (pruning the dead edge
//!   from the target's phis), identical arms become jumps, a jump into a
//!   single-predecessor block merges the blocks, and an empty forwarding
//!   block is redirected around.
//!
//! Each rewrite marks the module changed so the pipeline loops to a fixed
//! point.

use crate::analysis::CfgBuilder;
use crate::ir::{BlockId, InstId, Module, Opcode, ValueId};
use crate::opt::labeller::RegLabeller;

pub struct ConstOptimizer;

impl ConstOptimizer {
    pub fn run(module: &mut Module) {
        CfgBuilder::run(module);
        RegLabeller::run(module);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            for block in module.func(func).blocks.clone() {
                if module.block(block).removed {
                    continue;
                }
                for inst in module.block(block).insts.clone() {
                    if module.inst(inst).removed {
                        continue;
                    }
                    Self::visit_inst(module, inst);
                }
            }
        }
    }

    fn visit_inst(module: &mut Module, inst: InstId) {
        match module.inst(inst).op {
            Opcode::Add => Self::visit_add(module, inst),
            Opcode::Sub => Self::visit_sub(module, inst),
            Opcode::Mul => Self::visit_mul(module, inst),
            Opcode::Sdiv => Self::visit_sdiv(module, inst),
            Opcode::Srem => Self::visit_srem(module, inst),
            Opcode::Icmp(_) => Self::visit_icmp(module, inst),
            Opcode::GetPtr => Self::visit_getptr(module, inst),
            Opcode::Phi => Self::visit_phi(module, inst),
            Opcode::Jump | Opcode::Branch => Self::visit_branch(module, inst),
            _ => {}
        }
    }

    /// Replace the defined value with a literal and drop the instruction.
    fn fold_to(module: &mut Module, inst: InstId, value: i32) {
        let def = module.operand(inst, 0);
        let lit = module.new_literal(value);
        module.replace_all_uses(def, lit);
        module.remove_inst(inst);
        module.changed = true;
    }

    /// Replace the defined value with an existing value and drop the
    /// instruction.
    fn forward_to(module: &mut Module, inst: InstId, value: ValueId) {
        let def = module.operand(inst, 0);
        module.replace_all_uses(def, value);
        module.remove_inst(inst);
        module.changed = true;
    }

    fn visit_add(module: &mut Module, inst: InstId) {
        let a = module.operand(inst, 1);
        let b = module.operand(inst, 2);
        if module.is_const(a) && module.is_const(b) {
            let v = module.const_value(a).wrapping_add(module.const_value(b));
            Self::fold_to(module, inst, v);
            return;
        }
        // 0 + x = x
        if module.is_const(a) && module.const_value(a) == 0 {
            Self::forward_to(module, inst, b);
            return;
        }
        // x + 0 = x
        if module.is_const(b) && module.const_value(b) == 0 {
            Self::forward_to(module, inst, a);
            return;
        }
        // c + x -> x + c
        if module.is_const(a) {
            module.swap_operands(inst, 1, 2);
            module.changed = true;
            return;
        }
        // (x + c1) + c2 = x + (c1 + c2)
        if module.is_const(b) {
            if let Some(def) = module.defining_inst(a) {
                if module.inst(def).op == Opcode::Add {
                    let inner = module.operand(def, 2);
                    if module.is_const(inner) {
                        let sum = module
                            .const_value(b)
                            .wrapping_add(module.const_value(inner));
                        let result = module.operand(inst, 0);
                        let base = module.operand(def, 1);
                        let lit = module.new_literal(sum);
                        let ty = module.inst(inst).ty.clone();
                        let new =
                            module.new_inst(Opcode::Add, ty, false, &[result, base, lit]);
                        module.replace_inst(inst, new);
                        module.changed = true;
                    }
                }
            }
        }
    }

    fn visit_sub(module: &mut Module, inst: InstId) {
        let a = module.operand(inst, 1);
        let b = module.operand(inst, 2);
        if module.is_const(a) && module.is_const(b) {
            let v = module.const_value(a).wrapping_sub(module.const_value(b));
            Self::fold_to(module, inst, v);
            return;
        }
        // x - 0 = x
        if module.is_const(b) && module.const_value(b) == 0 {
            Self::forward_to(module, inst, a);
            return;
        }
        // x - x = 0
        if a == b {
            Self::fold_to(module, inst, 0);
            return;
        }
        // x - c = x + (-c)
        if module.is_const(b) {
            let result = module.operand(inst, 0);
            let lit = module.new_literal(module.const_value(b).wrapping_neg());
            let ty = module.inst(inst).ty.clone();
            let new = module.new_inst(Opcode::Add, ty, false, &[result, a, lit]);
            module.replace_inst(inst, new);
            module.changed = true;
        }
    }

    fn visit_mul(module: &mut Module, inst: InstId) {
        let a = module.operand(inst, 1);
        let b = module.operand(inst, 2);
        if module.is_const(a) && module.is_const(b) {
            let v = module.const_value(a).wrapping_mul(module.const_value(b));
            Self::fold_to(module, inst, v);
            return;
        }
        // 0 * x = 0, x * 0 = 0
        if (module.is_const(a) && module.const_value(a) == 0)
            || (module.is_const(b) && module.const_value(b) == 0)
        {
            Self::fold_to(module, inst, 0);
            return;
        }
        // 1 * x = x
        if module.is_const(a) && module.const_value(a) == 1 {
            Self::forward_to(module, inst, b);
            return;
        }
        // x * 1 = x
        if module.is_const(b) && module.const_value(b) == 1 {
            Self::forward_to(module, inst, a);
            return;
        }
        // c * x -> x * c
        if module.is_const(a) {
            module.swap_operands(inst, 1, 2);
            module.changed = true;
            return;
        }
        if module.is_const(b) {
            if let Some(def) = module.defining_inst(a) {
                // (x * c1) * c2 = x * (c1 * c2)
                if module.inst(def).op == Opcode::Mul {
                    let inner = module.operand(def, 2);
                    if module.is_const(inner) {
                        let prod = module
                            .const_value(b)
                            .wrapping_mul(module.const_value(inner));
                        let result = module.operand(inst, 0);
                        let base = module.operand(def, 1);
                        let lit = module.new_literal(prod);
                        let ty = module.inst(inst).ty.clone();
                        let new =
                            module.new_inst(Opcode::Mul, ty, false, &[result, base, lit]);
                        module.replace_inst(inst, new);
                        module.changed = true;
                        return;
                    }
                }
                // (x + c1) * c2 = x * c2 + c1 * c2
                if module.inst(def).op == Opcode::Add {
                    let inner = module.operand(def, 2);
                    if module.is_const(inner) {
                        let prod = module
                            .const_value(b)
                            .wrapping_mul(module.const_value(inner));
                        let result = module.operand(inst, 0);
                        let base = module.operand(def, 1);
                        let ty = module.inst(inst).ty.clone();
                        let mul_reg = module.new_reg(ty.clone());
                        let b_now = module.operand(inst, 2);
                        let mul = module.new_inst(
                            Opcode::Mul,
                            ty.clone(),
                            false,
                            &[mul_reg, base, b_now],
                        );
                        module.insert_before(inst, mul);
                        let lit = module.new_literal(prod);
                        let new =
                            module.new_inst(Opcode::Add, ty, false, &[result, mul_reg, lit]);
                        module.replace_inst(inst, new);
                        module.changed = true;
                    }
                }
            }
        }
    }

    fn visit_sdiv(module: &mut Module, inst: InstId) {
        let a = module.operand(inst, 1);
        let b = module.operand(inst, 2);
        if module.is_const(a) && module.is_const(b) {
            let bv = module.const_value(b);
            let v = if bv == 0 {
                0
            } else {
                module.const_value(a).wrapping_div(bv)
            };
            Self::fold_to(module, inst, v);
            return;
        }
        // x / 1 = x
        if module.is_const(b) && module.const_value(b) == 1 {
            Self::forward_to(module, inst, a);
            return;
        }
        // x / x = 1
        if a == b {
            Self::fold_to(module, inst, 1);
            return;
        }
        // (x / c1) / c2 = x / (c1 * c2)
        if module.is_const(b) {
            if let Some(def) = module.defining_inst(a) {
                if module.inst(def).op == Opcode::Sdiv {
                    let inner = module.operand(def, 2);
                    if module.is_const(inner) {
                        let prod = module
                            .const_value(b)
                            .wrapping_mul(module.const_value(inner));
                        let result = module.operand(inst, 0);
                        let base = module.operand(def, 1);
                        let lit = module.new_literal(prod);
                        let ty = module.inst(inst).ty.clone();
                        let new =
                            module.new_inst(Opcode::Sdiv, ty, false, &[result, base, lit]);
                        module.replace_inst(inst, new);
                        module.changed = true;
                    }
                }
            }
        }
    }

    fn visit_srem(module: &mut Module, inst: InstId) {
        let a = module.operand(inst, 1);
        let b = module.operand(inst, 2);
        if module.is_const(a) && module.is_const(b) {
            let bv = module.const_value(b);
            let v = if bv == 0 {
                0
            } else {
                module.const_value(a).wrapping_rem(bv)
            };
            Self::fold_to(module, inst, v);
            return;
        }
        // x % 1 = 0
        if module.is_const(b) && module.const_value(b) == 1 {
            Self::fold_to(module, inst, 0);
        }
    }

    fn visit_icmp(module: &mut Module, inst: InstId) {
        let Opcode::Icmp(cond) = module.inst(inst).op else {
            return;
        };
        let a = module.operand(inst, 1);
        let b = module.operand(inst, 2);
        if module.is_const(a) && module.is_const(b) {
            let v = cond.eval(module.const_value(a), module.const_value(b));
            Self::fold_to(module, inst, v);
            return;
        }

        // icmp ne 0, zext(b)  and its mirror collapse to b.
        if cond == crate::ir::IcmpCond::Ne {
            let zext_side = if module.is_const(a) && module.const_value(a) == 0 {
                Some(b)
            } else if module.is_const(b) && module.const_value(b) == 0 {
                Some(a)
            } else {
                None
            };
            if let Some(side) = zext_side {
                if let Some(def) = module.defining_inst(side) {
                    let is_bool_zext = module.inst(def).op == Opcode::Zext
                        && module.inst(def).ty == crate::ir::types::ValueType::bool_ty()
                        && module.inst(def).ty2 == Some(crate::ir::types::ValueType::int());
                    if is_bool_zext {
                        let bool_val = module.operand(def, 1);
                        let result = module.operand(inst, 0);
                        module.replace_all_uses(result, bool_val);
                        module.remove_inst(def);
                        module.remove_inst(inst);
                        module.changed = true;
                    }
                }
            }
        }
    }

    /// Merge a constant-index getelementptr into a constant-index
    /// getelementptr it indexes through.
    fn visit_getptr(module: &mut Module, inst: InstId) {
        let count = module.inst(inst).operands.len();
        for i in 2..count {
            if !module.is_const(module.operand(inst, i)) {
                return;
            }
        }
        let base = module.operand(inst, 1);
        let Some(def) = module.defining_inst(base) else {
            return;
        };
        if module.inst(def).op != Opcode::GetPtr {
            return;
        }
        let inner_count = module.inst(def).operands.len();
        for i in 2..inner_count {
            if !module.is_const(module.operand(def, i)) {
                return;
            }
        }

        let mut index: Vec<i32> = (2..inner_count)
            .map(|i| module.const_value(module.operand(def, i)))
            .collect();
        let last = index.len() - 1;
        index[last] = index[last].wrapping_add(module.const_value(module.operand(inst, 2)));
        for i in 3..count {
            index.push(module.const_value(module.operand(inst, i)));
        }

        for (i, &v) in index.iter().enumerate() {
            let lit = module.new_literal(v);
            if i + 2 < count {
                module.set_operand(inst, i + 2, lit);
            } else {
                module.add_operand(inst, lit);
            }
        }
        let inner_base = module.operand(def, 1);
        module.set_operand(inst, 1, inner_base);
        let (ty, ty2) = {
            let d = module.inst(def);
            (d.ty.clone(), d.ty2.clone())
        };
        module.inst_mut(inst).ty = ty;
        module.inst_mut(inst).ty2 = ty2;
        module.changed = true;
    }

    fn visit_phi(module: &mut Module, inst: InstId) {
        let block = module.inst(inst).block;
        let preds = module.block(block).preds.len();
        if preds == 1 {
            let value = module.operand(inst, 1);
            Self::forward_to(module, inst, value);
            return;
        }
        if preds > 1 {
            let def = module.operand(inst, 0);
            let mut value = module.operand(inst, 1);
            let mut same = true;
            let mut i = 1;
            while i < module.inst(inst).operands.len() {
                let cur = module.operand(inst, i);
                if value == def {
                    value = cur;
                    i += 2;
                    continue;
                }
                if cur == def {
                    i += 2;
                    continue;
                }
                let both_const = module.is_const(value) && module.is_const(cur);
                if both_const {
                    if module.const_value(value) != module.const_value(cur) {
                        same = false;
                        break;
                    }
                    i += 2;
                    continue;
                }
                if module.is_const(value) || module.is_const(cur) {
                    same = false;
                    break;
                }
                if value != cur {
                    same = false;
                    break;
                }
                i += 2;
            }
            if same {
                Self::forward_to(module, inst, value);
            }
        }
    }

    fn visit_branch(module: &mut Module, inst: InstId) {
        let block = module.inst(inst).block;
        if module.inst(inst).op == Opcode::Jump {
            let Some(&target) = module.block(block).succs.first() else {
                return;
            };
            let func = module.block(block).func;
            let entry = module.func(func).blocks[0];
            let target_starts_with_phi = module
                .block(target)
                .insts
                .first()
                .map_or(false, |&i| module.inst(i).op == Opcode::Phi);

            // A jump into a single-predecessor block merges the blocks.
            if module.block(target).preds.len() == 1 && block != target && !target_starts_with_phi
            {
                Self::merge_block(module, block, target);
                module.changed = true;
                return;
            }
            // A block that only forwards is redirected around.
            let only_jump = module.block(block).insts.first() == Some(&inst);
            if block != entry && only_jump && !target_starts_with_phi {
                let block_value = module.block(block).value;
                let target_value = module.block(target).value;
                module.replace_all_uses(block_value, target_value);
                module.remove_cfg_edge(block, target);
                for pred in module.block(block).preds.clone() {
                    let succs = module.block(pred).succs.clone();
                    for (i, s) in succs.iter().enumerate() {
                        if *s == block {
                            module.block_mut(pred).succs[i] = target;
                        }
                    }
                    module.block_mut(target).preds.push(pred);
                }
                module.block_mut(block).preds.clear();
                module.block_mut(block).succs.clear();
                module.remove_block(func, block);
                module.changed = true;
            }
            return;
        }

        // Conditional branch.
        let cond = module.operand(inst, 0);
        let true_value = module.operand(inst, 1);
        let false_value = module.operand(inst, 2);
        if true_value == false_value {
            let new = module.new_branch(None, true_value, None);
            module.replace_inst(inst, new);
            module.changed = true;
            return;
        }
        if module.is_const(cond) {
            let (taken, dead) = if module.const_value(cond) != 0 {
                (true_value, false_value)
            } else {
                (false_value, true_value)
            };
            let dead_block = module.as_block(dead);
            module.remove_phi_entry(dead_block, block);
            module.remove_cfg_edge(block, dead_block);
            let new = module.new_branch(None, taken, None);
            module.replace_inst(inst, new);
            module.changed = true;
        }
    }

    /// Fold `to` into `from`: `from`'s terminator is dropped, `to`'s
    /// instructions move over, and every reference to `to` now names
    /// `from`.
    fn merge_block(module: &mut Module, from: BlockId, to: BlockId) {
        let to_succs = module.block(to).succs.clone();
        module.block_mut(from).succs = to_succs.clone();
        for succ in to_succs {
            let preds = module.block(succ).preds.clone();
            for (i, p) in preds.iter().enumerate() {
                if *p == to {
                    module.block_mut(succ).preds[i] = from;
                }
            }
        }
        module.block_mut(to).preds.clear();
        module.block_mut(to).succs.clear();

        if let Some(term) = module.terminator(from) {
            module.remove_inst(term);
        }
        let to_value = module.block(to).value;
        let from_value = module.block(from).value;
        module.replace_all_uses(to_value, from_value);

        let moved = std::mem::take(&mut module.block_mut(to).insts);
        for inst in moved {
            module.inst_mut(inst).block = from;
            module.block_mut(from).insts.push(inst);
        }
        let func = module.block(to).func;
        module.remove_block(func, to);
    }
}
