//! Frame-Pointer Elimination
//!
//! Walks each function in layout order tracking the cumulative `$sp`
//! displacement from the explicit `add $sp, $sp, imm` adjustments around
//! calls; every `$fp`-relative memory operand is rewritten to the
//! equivalent `$sp`-relative form and the `$fp <- $sp` copies disappear.
//! Calls restore `$sp` symmetrically, so the displacement is zero again at
//! every block boundary.

use crate::mips::{MModule, MOp, Reg, FP, SP};

pub struct RemoveFp;

impl RemoveFp {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            let mut sp_offset: i32 = 0;
            for block in module.func(func).blocks.clone() {
                for inst in module.block(block).insts.clone() {
                    let data = module.inst(inst);
                    if data.removed {
                        continue;
                    }
                    match data.op {
                        MOp::Add => {
                            if data.operands[0] == FP {
                                module.remove_inst(inst);
                                continue;
                            }
                            if data.operands[0] == SP {
                                if let Reg::Imm(v) = data.operands[2] {
                                    sp_offset += v;
                                }
                            }
                        }
                        MOp::La | MOp::Lw | MOp::Sw => {
                            if data.operands[2] == FP {
                                let offset = data.operands[1].imm() - sp_offset;
                                module.set_operand(inst, 1, Reg::Imm(offset));
                                module.set_operand(inst, 2, SP);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
