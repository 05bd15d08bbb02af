//! Machine Local Value Numbering
//!
//! The IR-level scheme applied to machine arithmetic: pure `addu`, `subu`,
//! `mul`, `div`, `rem` over virtual or immediate operands. A repeated
//! computation becomes a move from the first result, which the coalescer
//! later folds away.

use crate::exprhash::{HashItem, HashTable};
use crate::mips::{MModule, MOp, Reg, ZERO};

fn op_tag(op: MOp) -> i32 {
    match op {
        MOp::Addu => 1,
        MOp::Subu => 2,
        MOp::Mul => 3,
        MOp::Div => 4,
        MOp::Rem => 5,
        _ => 0,
    }
}

fn reg_item(reg: &Reg) -> HashItem {
    match reg {
        Reg::Imm(v) => HashItem::Const(*v),
        Reg::Virt(id) => HashItem::Reg(*id as i64),
        Reg::Phys(p) => HashItem::Reg(-(*p as i64) - 1),
        _ => HashItem::Reg(i64::MIN),
    }
}

fn numberable(reg: &Reg) -> bool {
    matches!(reg, Reg::Virt(_) | Reg::Imm(_))
}

pub struct MipsLvn;

impl MipsLvn {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            for block in module.func(func).blocks.clone() {
                let mut table: HashTable<Reg> = HashTable::new();
                for inst in module.block(block).insts.clone() {
                    if module.inst(inst).removed {
                        continue;
                    }
                    let op = module.inst(inst).op;
                    let commutative = matches!(op, MOp::Addu | MOp::Mul);
                    if op_tag(op) == 0 {
                        continue;
                    }
                    let a = module.operand(inst, 1).clone();
                    let b = module.operand(inst, 2).clone();
                    if !numberable(&a) || !numberable(&b) {
                        continue;
                    }
                    let shape = if commutative {
                        HashItem::Array(vec![
                            HashItem::Const(op_tag(op)),
                            HashItem::Set(vec![reg_item(&a), reg_item(&b)]),
                        ])
                    } else {
                        HashItem::Array(vec![
                            HashItem::Const(op_tag(op)),
                            reg_item(&a),
                            reg_item(&b),
                        ])
                    };
                    match table.lookup(&shape) {
                        Some(prev) => {
                            let dest = module.operand(inst, 0).clone();
                            let mv = module.new_inst(MOp::Add, &[dest, ZERO, prev]);
                            module.replace_inst(inst, mv);
                            module.changed = true;
                        }
                        None => {
                            let dest = module.operand(inst, 0).clone();
                            table.insert(shape, dest);
                        }
                    }
                }
            }
        }
    }
}
