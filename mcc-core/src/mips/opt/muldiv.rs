//! Multiply / Divide Strength Reduction
//!
//! Multiplication by a constant lowers to shifts: single-bit and two-bit
//! patterns, plus the Booth forms that subtract after shifting when the
//! constant's signed-digit representation is short. Signed division by a
//! constant uses the Granlund–Montgomery magic-number multiplication with
//! an `sra`/`srl` sign correction (powers of two take the direct shift
//! path); remainder by a constant is rewritten as `x - (x / c) * c`.
//!
//! The division sequences use `$at` as scratch; `$at` is reserved for the
//! code generator and never allocated, and each sequence is emitted
//! contiguously, so no live value can occupy it here.

use crate::mips::{MInstId, MModule, MOp, Reg, AT, ZERO};

pub struct MulDiv;

impl MulDiv {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            for block in module.func(func).blocks.clone() {
                for inst in module.block(block).insts.clone() {
                    if module.inst(inst).removed {
                        continue;
                    }
                    match module.inst(inst).op {
                        MOp::Mul => Self::visit_mul(module, inst),
                        MOp::Div => Self::visit_div(module, inst),
                        MOp::Rem => Self::visit_rem(module, inst),
                        _ => {}
                    }
                }
            }
        }
    }

    fn visit_mul(module: &mut MModule, inst: MInstId) {
        let Reg::Imm(imm) = *module.operand(inst, 2) else {
            return;
        };
        let dest = module.operand(inst, 0).clone();
        let src = module.operand(inst, 1).clone();
        let abs = imm.unsigned_abs();

        if abs.count_ones() == 1 {
            let sll = module.new_inst(
                MOp::Sll,
                &[dest.clone(), src, Reg::Imm(abs.trailing_zeros() as i32)],
            );
            module.insert_before(inst, sll);
            if imm < 0 {
                let neg = module.new_inst(MOp::Subu, &[dest.clone(), ZERO, dest]);
                module.insert_before(inst, neg);
            }
            module.remove_inst(inst);
            module.changed = true;
            return;
        }
        if (imm as u32).count_ones() == 2 {
            let mut bits = imm as u32;
            let sll1 = module.new_vreg();
            let i1 = module.new_inst(
                MOp::Sll,
                &[sll1.clone(), src.clone(), Reg::Imm(bits.trailing_zeros() as i32)],
            );
            module.insert_before(inst, i1);
            bits ^= 1 << bits.trailing_zeros();
            let sll2 = module.new_vreg();
            let i2 = module.new_inst(
                MOp::Sll,
                &[sll2.clone(), src, Reg::Imm(bits.trailing_zeros() as i32)],
            );
            module.insert_before(inst, i2);
            let add = module.new_inst(MOp::Addu, &[dest, sll2, sll1]);
            module.insert_before(inst, add);
            module.remove_inst(inst);
            module.changed = true;
            return;
        }
        // Booth patterns over the signed-digit form.
        let diff = imm ^ (imm >> 1);
        if (diff as u32).count_ones() == 1 {
            let shift = (diff as u32).trailing_zeros() as i32 + 1;
            let sll = module.new_vreg();
            let i1 = module.new_inst(MOp::Sll, &[sll.clone(), src.clone(), Reg::Imm(shift)]);
            module.insert_before(inst, i1);
            let sub = module.new_inst(MOp::Subu, &[dest, sll, src]);
            module.insert_before(inst, sub);
            module.remove_inst(inst);
            module.changed = true;
            return;
        }
        if (diff as u32).count_ones() == 2 {
            let mut bits = diff as u32;
            let sll1 = module.new_vreg();
            let i1 = module.new_inst(
                MOp::Sll,
                &[
                    sll1.clone(),
                    src.clone(),
                    Reg::Imm(bits.trailing_zeros() as i32 + 1),
                ],
            );
            module.insert_before(inst, i1);
            bits ^= 1 << bits.trailing_zeros();
            let sll2 = module.new_vreg();
            let i2 = module.new_inst(
                MOp::Sll,
                &[sll2.clone(), src, Reg::Imm(bits.trailing_zeros() as i32 + 1)],
            );
            module.insert_before(inst, i2);
            let sub = module.new_inst(MOp::Subu, &[dest, sll2, sll1]);
            module.insert_before(inst, sub);
            module.remove_inst(inst);
            module.changed = true;
        }
    }

    fn visit_div(module: &mut MModule, inst: MInstId) {
        let Reg::Imm(imm) = *module.operand(inst, 2) else {
            return;
        };
        if imm == 0 {
            return;
        }
        let dest = module.operand(inst, 0).clone();
        let src = module.operand(inst, 1).clone();
        let abs = imm.unsigned_abs() as i64;

        // Choose the magic multiplier.
        let mut len: i32 = 1;
        let mut mult: i64 = 0;
        while len < 31 {
            mult = ((1i64 << (31 + len)) + (1i64 << len)) / abs;
            if mult * abs >= 1i64 << (31 + len) {
                break;
            }
            len += 1;
        }

        if abs == 1 {
            let mv = module.new_inst(MOp::Addu, &[dest.clone(), ZERO, src.clone()]);
            module.insert_before(inst, mv);
        } else if (abs as u64).count_ones() == 1 {
            let len = (abs as u64).trailing_zeros() as i32;
            let i1 = module.new_inst(MOp::Sra, &[AT, src.clone(), Reg::Imm(len - 1)]);
            module.insert_before(inst, i1);
            let i2 = module.new_inst(MOp::Srl, &[AT, AT, Reg::Imm(32 - len)]);
            module.insert_before(inst, i2);
            let i3 = module.new_inst(MOp::Addu, &[AT, AT, src.clone()]);
            module.insert_before(inst, i3);
            let i4 = module.new_inst(MOp::Sra, &[dest.clone(), AT, Reg::Imm(len)]);
            module.insert_before(inst, i4);
        } else if mult < 1i64 << 31 {
            let mut temp = module.new_vreg();
            let li = module.new_inst(MOp::Li, &[AT, Reg::Imm(mult as i32)]);
            module.insert_before(inst, li);
            let ml = module.new_inst(MOp::Mult, &[src.clone(), AT]);
            module.insert_before(inst, ml);
            let hi = module.new_inst(MOp::Mfhi, &[temp.clone()]);
            module.insert_before(inst, hi);
            if len > 1 {
                let shifted = module.new_vreg();
                let sra = module.new_inst(
                    MOp::Sra,
                    &[shifted.clone(), temp.clone(), Reg::Imm(len - 1)],
                );
                module.insert_before(inst, sra);
                temp = shifted;
            }
            let srl = module.new_inst(MOp::Srl, &[AT, temp.clone(), Reg::Imm(31)]);
            module.insert_before(inst, srl);
            let add = module.new_inst(MOp::Addu, &[dest.clone(), AT, temp]);
            module.insert_before(inst, add);
        } else {
            // The multiplier overflows 31 bits; multiply by (mult - 2^32)
            // and add the dividend back to the high half.
            let li = module.new_inst(
                MOp::Li,
                &[AT, Reg::Imm((mult - (1i64 << 32)) as i32)],
            );
            module.insert_before(inst, li);
            let ml = module.new_inst(MOp::Mult, &[src.clone(), AT]);
            module.insert_before(inst, ml);
            let hi = module.new_inst(MOp::Mfhi, &[AT]);
            module.insert_before(inst, hi);
            let mut temp = module.new_vreg();
            let add = module.new_inst(MOp::Addu, &[temp.clone(), AT, src.clone()]);
            module.insert_before(inst, add);
            if len > 1 {
                let shifted = module.new_vreg();
                let sra = module.new_inst(
                    MOp::Sra,
                    &[shifted.clone(), temp.clone(), Reg::Imm(len - 1)],
                );
                module.insert_before(inst, sra);
                temp = shifted;
            }
            let srl = module.new_inst(MOp::Srl, &[AT, temp.clone(), Reg::Imm(31)]);
            module.insert_before(inst, srl);
            let fin = module.new_inst(MOp::Addu, &[dest.clone(), AT, temp]);
            module.insert_before(inst, fin);
        }

        if imm < 0 {
            let neg = module.new_inst(MOp::Subu, &[dest.clone(), ZERO, dest]);
            module.insert_before(inst, neg);
        }
        module.remove_inst(inst);
        module.changed = true;
    }

    fn visit_rem(module: &mut MModule, inst: MInstId) {
        let imm = module.operand(inst, 2).clone();
        if !imm.is_imm() {
            return;
        }
        let dest = module.operand(inst, 0).clone();
        let src = module.operand(inst, 1).clone();
        let temp = module.new_vreg();
        let div = module.new_inst(MOp::Div, &[temp.clone(), src.clone(), imm.clone()]);
        module.insert_before(inst, div);
        let mul = module.new_inst(MOp::Mul, &[temp.clone(), temp.clone(), imm]);
        module.insert_before(inst, mul);
        let sub = module.new_inst(MOp::Subu, &[dest, src, temp]);
        module.insert_before(inst, sub);
        module.remove_inst(inst);
        module.changed = true;
    }
}
