//! Global Value Numbering
//!
//! Local value numbering lifted over the dominator tree: the table is
//! scoped to the current tree path, so any hit is a computation in a
//! dominating block and replacing the dominated copy is always legal.
//! Insertions roll back when the walk leaves a subtree.

use crate::analysis::{CfgBuilder, Dominance};
use crate::exprhash::HashTable;
use crate::ir::{BlockId, Module, ValueId};
use crate::opt::lvn::inst_shape;

pub struct Gvn;

impl Gvn {
    pub fn run(module: &mut Module) {
        CfgBuilder::run(module);
        let dominance = Dominance::compute(module);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            let Some(&entry) = module.func(func).blocks.first() else {
                continue;
            };
            let mut table: HashTable<ValueId> = HashTable::new();
            Self::walk(module, &dominance, entry, &mut table);
        }
    }

    fn walk(
        module: &mut Module,
        dominance: &Dominance,
        block: BlockId,
        table: &mut HashTable<ValueId>,
    ) {
        let mut inserted = Vec::new();
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
                    table.insert(shape.clone(), def);
                    inserted.push(shape);
                }
            }
        }

        let children = dominance.children.get(&block).cloned().unwrap_or_default();
        for child in children {
            Self::walk(module, dominance, child, table);
        }

        for shape in inserted {
            table.remove(&shape);
        }
    }
}
