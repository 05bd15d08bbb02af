//! Division / Remainder Expansion
//!
//! After allocation, any `div`/`rem` pseudo left with a register divisor
//! expands to the real two-operand `div` plus `mflo`/`mfhi`, keeping the
//! `hi`/`lo` pair's contract explicit in the instruction stream.

use crate::mips::{MModule, MOp};

pub struct ReplaceDivRem;

impl ReplaceDivRem {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            for block in module.func(func).blocks.clone() {
                for inst in module.block(block).insts.clone() {
                    let data = module.inst(inst);
                    if data.removed {
                        continue;
                    }
                    let move_from = match data.op {
                        MOp::Div => MOp::Mflo,
                        MOp::Rem => MOp::Mfhi,
                        _ => continue,
                    };
                    if data.operands[2].is_imm() {
                        continue;
                    }
                    let dest = data.operands[0].clone();
                    let a = data.operands[1].clone();
                    let b = data.operands[2].clone();
                    let read = module.new_inst(move_from, &[dest]);
                    module.insert_after(inst, read);
                    let div = module.new_inst(MOp::RawDiv, &[a, b]);
                    module.replace_inst(inst, div);
                    module.changed = true;
                }
            }
        }
    }
}
