//! Local Value Numbering
//!
//! Within one basic block, pure instructions with the same canonical
//! operand shape define the same value; the later definition is replaced by
//! the earlier one. Commutative operations (`add`, `mul`) hash their
//! operands as an unordered pair; `getelementptr` and `phi` hash their full
//! operand sequence. The table resets at every block boundary.

use crate::exprhash::{HashItem, HashTable};
use crate::ir::{IcmpCond, InstId, Module, Opcode, ValueId};

fn op_tag(op: Opcode) -> i32 {
    match op {
        Opcode::Add => 1,
        Opcode::Sub => 2,
        Opcode::Mul => 3,
        Opcode::Sdiv => 4,
        Opcode::Srem => 5,
        Opcode::Icmp(_) => 6,
        Opcode::GetPtr => 7,
        Opcode::Phi => 8,
        Opcode::Zext => 9,
        Opcode::Trunc => 10,
        _ => 0,
    }
}

fn cond_tag(cond: IcmpCond) -> i32 {
    match cond {
        IcmpCond::Eq => 1,
        IcmpCond::Ne => 2,
        IcmpCond::Sgt => 3,
        IcmpCond::Sge => 4,
        IcmpCond::Slt => 5,
        IcmpCond::Sle => 6,
    }
}

fn reg(module: &Module, value: ValueId) -> HashItem {
    if module.is_const(value) {
        HashItem::Const(module.const_value(value))
    } else {
        HashItem::Reg(value.0 as i64)
    }
}

/// Canonical shape of a pure instruction's computation, or `None` for
/// instructions value numbering must not touch.
pub(crate) fn inst_shape(module: &Module, inst: InstId) -> Option<HashItem> {
    let data = module.inst(inst);
    let tag = HashItem::Const(op_tag(data.op));
    let r = |i: usize| reg(module, data.operands[i]);
    let shape = match data.op {
        Opcode::Add | Opcode::Mul => {
            HashItem::Array(vec![tag, HashItem::Set(vec![r(1), r(2)])])
        }
        Opcode::Sub | Opcode::Sdiv | Opcode::Srem => HashItem::Array(vec![tag, r(1), r(2)]),
        Opcode::Icmp(cond) => {
            // eq/ne still canonicalize by operand order here; the
            // commutative pair shape only applies to add/mul.
            HashItem::Array(vec![tag, HashItem::Const(cond_tag(cond)), r(1), r(2)])
        }
        Opcode::GetPtr => {
            let items: Vec<HashItem> = (1..data.operands.len()).map(r).collect();
            HashItem::Array(vec![tag, HashItem::Array(items)])
        }
        Opcode::Phi => {
            let mut pairs = Vec::new();
            let mut i = 1;
            while i + 1 < data.operands.len() {
                pairs.push(HashItem::Array(vec![r(i), r(i + 1)]));
                i += 2;
            }
            HashItem::Array(vec![tag, HashItem::Set(pairs)])
        }
        Opcode::Zext | Opcode::Trunc => HashItem::Array(vec![tag, r(1)]),
        _ => return None,
    };
    Some(shape)
}

pub struct Lvn;

impl Lvn {
    pub fn run(module: &mut Module) {
        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            for block in module.func(func).blocks.clone() {
                let mut table: HashTable<ValueId> = HashTable::new();
                for inst in module.block(block).insts.clone() {
                    if module.inst(inst).removed {
                        continue;
                    }
                    let Some(shape) = inst_shape(module, inst) else {
                        continue;
                    };
                    match table.lookup(&shape) {
                        Some(prev) => {
                            let def = module.operand(inst, 0);
                            module.replace_all_uses(def, prev);
                            module.remove_inst(inst);
                            module.changed = true;
                        }
                        None => {
                            let def = module.operand(inst, 0);
                            table.insert(shape, def);
                        }
                    }
                }
            }
        }
    }
}
