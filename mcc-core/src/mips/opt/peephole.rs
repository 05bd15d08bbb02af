//! Peephole Rewrites
//!
//! Single- and two-instruction rewrites over the machine IR:
//!
//! - identity arithmetic (`addu r, r, $zero` and friends) disappears;
//! - `addu` on allocated registers with an immediate becomes `addiu`;
//! - a set-compare feeding `beq <set>, $zero, L` fuses into the inverted
//!   native branch (`bne`, `beq`, `blez`, `bltz`, `bgez`, `bgtz`);
//! - `sgt`/`sge` canonicalize to `slt`/`sle` with swapped operands;
//! - `sle r, a, imm` becomes `slti r, a, imm+1` (with a `li` fallback when
//!   the successor immediate leaves 16 bits, and a constant-true rewrite at
//!   `INT_MAX`);
//! - `la` off a register base is just an `addiu`.

use crate::mips::{MFuncId, MInstId, MModule, MOp, Reg, ZERO};

fn is_16_bits(value: i32) -> bool {
    (-32768..32768).contains(&value)
}

pub struct Peephole;

impl Peephole {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            for block in module.func(func).blocks.clone() {
                if module.block(block).removed {
                    continue;
                }
                for inst in module.block(block).insts.clone() {
                    if module.inst(inst).removed {
                        continue;
                    }
                    Self::visit(module, func, inst);
                }
            }
        }
    }

    fn visit(module: &mut MModule, func: MFuncId, inst: MInstId) {
        match module.inst(inst).op {
            MOp::Add => Self::visit_add(module, inst),
            MOp::Addu => Self::visit_addu(module, inst),
            MOp::Sub | MOp::Subu => Self::visit_sub(module, inst),
            MOp::Seq => Self::fuse_branch(module, func, inst, |a, b, t| (MOp::Bne, vec![a, b, t])),
            MOp::Sne => Self::fuse_branch(module, func, inst, |a, b, t| (MOp::Beq, vec![a, b, t])),
            MOp::Sgt => Self::visit_sgt(module, func, inst),
            MOp::Sge => Self::visit_sge(module, func, inst),
            MOp::Slti => Self::visit_slti(module, func, inst),
            MOp::Sle => Self::visit_sle(module, func, inst),
            MOp::La => Self::visit_la(module, inst),
            _ => {}
        }
    }

    /// `beq <dest>, $zero, L` branches anywhere in the function that test
    /// this compare's result.
    fn matching_branches(module: &MModule, func: MFuncId, dest: &Reg, op: MOp) -> Vec<MInstId> {
        let mut matches = Vec::new();
        for &block in module.func(func).blocks.iter() {
            for &inst in module.block(block).insts.iter().rev() {
                let data = module.inst(inst);
                if !data.is_terminator() {
                    break;
                }
                if data.op == op && data.operands[0] == *dest && data.operands[1] == ZERO {
                    matches.push(inst);
                }
            }
        }
        matches
    }

    fn visit_add(module: &mut MModule, inst: MInstId) {
        let data = module.inst(inst);
        let identity = data.operands[0] == data.operands[1]
            && (data.operands[2] == ZERO || data.operands[2] == Reg::Imm(0));
        if identity {
            module.remove_inst(inst);
            module.changed = true;
        }
    }

    fn visit_addu(module: &mut MModule, inst: MInstId) {
        let data = module.inst(inst);
        if data.operands[0] == data.operands[1] && data.operands[2] == ZERO {
            module.remove_inst(inst);
            module.changed = true;
            return;
        }
        if data.operands[2] == Reg::Imm(0) {
            module.set_operand(inst, 2, ZERO);
            module.changed = true;
            return;
        }
        let post_alloc = !data.operands[0].is_virtual()
            && !data.operands[1].is_virtual()
            && data.operands[2].is_imm();
        if post_alloc {
            let ops: Vec<Reg> = module.inst(inst).operands.to_vec();
            let new = module.new_inst(MOp::Addiu, &ops);
            module.replace_inst(inst, new);
            module.changed = true;
        }
    }

    fn visit_sub(module: &mut MModule, inst: MInstId) {
        let data = module.inst(inst);
        if data.operands[0] == data.operands[1] && data.operands[2] == ZERO {
            module.remove_inst(inst);
            module.changed = true;
        }
    }

    fn fuse_branch(
        module: &mut MModule,
        func: MFuncId,
        inst: MInstId,
        make: impl Fn(Reg, Reg, Reg) -> (MOp, Vec<Reg>),
    ) {
        let dest = module.operand(inst, 0).clone();
        if !dest.is_virtual() {
            return;
        }
        for branch in Self::matching_branches(module, func, &dest, MOp::Beq) {
            let a = module.operand(inst, 1).clone();
            let b = module.operand(inst, 2).clone();
            let target = module.operand(branch, 2).clone();
            let (op, operands) = make(a, b, target);
            let new = module.new_inst(op, &operands);
            module.replace_inst(branch, new);
            module.changed = true;
        }
    }

    fn is_zero(reg: &Reg) -> bool {
        *reg == ZERO || *reg == Reg::Imm(0)
    }

    fn visit_sgt(module: &mut MModule, func: MFuncId, inst: MInstId) {
        let dest = module.operand(inst, 0).clone();
        if !dest.is_virtual() {
            return;
        }
        if Self::is_zero(module.operand(inst, 2)) {
            for branch in Self::matching_branches(module, func, &dest, MOp::Beq) {
                let a = module.operand(inst, 1).clone();
                let target = module.operand(branch, 2).clone();
                let new = module.new_inst(MOp::Blez, &[a, target]);
                module.replace_inst(branch, new);
                module.changed = true;
            }
        }
        // sgt d, a, b -> slt d, b, a
        if module.operand(inst, 2).is_virtual() {
            let a = module.operand(inst, 1).clone();
            let b = module.operand(inst, 2).clone();
            let new = module.new_inst(MOp::Slt, &[dest, b, a]);
            module.replace_inst(inst, new);
            module.changed = true;
        }
    }

    fn visit_sge(module: &mut MModule, func: MFuncId, inst: MInstId) {
        let dest = module.operand(inst, 0).clone();
        if !dest.is_virtual() {
            return;
        }
        if Self::is_zero(module.operand(inst, 2)) {
            for branch in Self::matching_branches(module, func, &dest, MOp::Beq) {
                let a = module.operand(inst, 1).clone();
                let target = module.operand(branch, 2).clone();
                let new = module.new_inst(MOp::Bltz, &[a, target]);
                module.replace_inst(branch, new);
                module.changed = true;
            }
        }
        // sge d, a, b -> sle d, b, a
        if module.operand(inst, 2).is_virtual() {
            let a = module.operand(inst, 1).clone();
            let b = module.operand(inst, 2).clone();
            let new = module.new_inst(MOp::Sle, &[dest, b, a]);
            module.replace_inst(inst, new);
            module.changed = true;
        }
    }

    fn visit_slti(module: &mut MModule, func: MFuncId, inst: MInstId) {
        let dest = module.operand(inst, 0).clone();
        if !dest.is_virtual() {
            return;
        }
        if Self::is_zero(module.operand(inst, 2)) {
            for branch in Self::matching_branches(module, func, &dest, MOp::Beq) {
                let a = module.operand(inst, 1).clone();
                let target = module.operand(branch, 2).clone();
                let new = module.new_inst(MOp::Bgez, &[a, target]);
                module.replace_inst(branch, new);
                module.changed = true;
            }
        }
    }

    fn visit_sle(module: &mut MModule, func: MFuncId, inst: MInstId) {
        let dest = module.operand(inst, 0).clone();
        if !dest.is_virtual() {
            return;
        }
        if Self::is_zero(module.operand(inst, 2)) {
            for branch in Self::matching_branches(module, func, &dest, MOp::Beq) {
                let a = module.operand(inst, 1).clone();
                let target = module.operand(branch, 2).clone();
                let new = module.new_inst(MOp::Bgtz, &[a, target]);
                module.replace_inst(branch, new);
                module.changed = true;
            }
        }

        // sle d, a, b -> slt t, b, a; xori d, t, 1, with the branches on d
        // inverted onto t.
        if module.operand(inst, 2).is_virtual() {
            let a = module.operand(inst, 1).clone();
            let b = module.operand(inst, 2).clone();
            let slt_dest = module.new_vreg();
            let xori = module.new_inst(
                MOp::Xori,
                &[dest.clone(), slt_dest.clone(), Reg::Imm(1)],
            );
            module.insert_after(inst, xori);
            let slt = module.new_inst(MOp::Slt, &[slt_dest.clone(), b, a]);
            module.replace_inst(inst, slt);
            module.changed = true;
            for branch in Self::matching_branches(module, func, &dest, MOp::Beq) {
                let target = module.operand(branch, 2).clone();
                let new = module.new_inst(MOp::Bne, &[slt_dest.clone(), ZERO, target]);
                module.replace_inst(branch, new);
            }
            for branch in Self::matching_branches(module, func, &dest, MOp::Bne) {
                let target = module.operand(branch, 2).clone();
                let new = module.new_inst(MOp::Beq, &[slt_dest.clone(), ZERO, target]);
                module.replace_inst(branch, new);
            }
            return;
        }

        if let Reg::Imm(v) = *module.operand(inst, 2) {
            // Anything is <= INT_MAX.
            if v == i32::MAX {
                let new = module.new_inst(MOp::Addiu, &[dest, ZERO, Reg::Imm(1)]);
                module.replace_inst(inst, new);
                module.changed = true;
                return;
            }
            let next = v + 1;
            let a = module.operand(inst, 1).clone();
            if !is_16_bits(next) {
                let li_dest = module.new_vreg();
                let li = module.new_inst(MOp::Li, &[li_dest.clone(), Reg::Imm(next)]);
                module.insert_before(inst, li);
                let new = module.new_inst(MOp::Slt, &[dest, a, li_dest]);
                module.replace_inst(inst, new);
            } else {
                let new = module.new_inst(MOp::Slti, &[dest, a, Reg::Imm(next)]);
                module.replace_inst(inst, new);
            }
            module.changed = true;
        }
    }

    fn visit_la(module: &mut MModule, inst: MInstId) {
        // la d, imm($v) -> addiu d, $v, imm
        let data = module.inst(inst);
        if data.operands[1].is_imm() && data.operands[2].is_virtual() {
            let dest = data.operands[0].clone();
            let base = data.operands[2].clone();
            let offset = data.operands[1].clone();
            let new = module.new_inst(MOp::Addiu, &[dest, base, offset]);
            module.replace_inst(inst, new);
            module.changed = true;
        }
    }
}
