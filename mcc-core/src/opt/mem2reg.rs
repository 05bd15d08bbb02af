//! SSA Construction (mem2reg)
//!
//! Promotes scalar `alloca`/`load`/`store` traffic to phi-based SSA:
//!
//! 1. Phi placeholders are inserted at the iterated dominance frontier of
//!    every block touching a promotable slot.
//! 2. A dominator-tree walk renames accesses: loads take the reaching
//!    definition (a zero literal when none reaches), stores become the new
//!    reaching definition, inserted phis take over at join points and their
//!    predecessor contributions are backfilled when the predecessor is
//!    walked.
//! 3. The slots and their memory traffic are deleted.
//!
//! The pass also deletes basic blocks with no dominator parent (unreachable
//! after branch folding) and functions unreachable from `main`.

use crate::analysis::{CfgBuilder, Dominance};
use crate::ir::{BlockId, InstId, Module, Opcode, ValueId};
use bitvec::prelude::*;
use std::collections::{HashMap, HashSet};

pub struct Mem2Reg;

impl Mem2Reg {
    pub fn run(module: &mut Module) {
        CfgBuilder::run(module);
        let dominance = Dominance::compute(module);

        crate::opt::remove_unreachable_funcs(module);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            let mut ctx = RenameCtx {
                dominance: &dominance,
                var_addrs: HashSet::new(),
                reg_def_block: HashMap::new(),
                reaching_def: HashMap::new(),
                replace: HashMap::new(),
                inserted_phis: HashMap::new(),
            };
            ctx.run_func(module, func);
        }
    }
}

struct RenameCtx<'a> {
    dominance: &'a Dominance,
    /// Address values of the promotable allocas.
    var_addrs: HashSet<ValueId>,
    /// Block a renamed definition lives in; `None` marks a load result that
    /// forwards to its reaching definition.
    reg_def_block: HashMap<ValueId, Option<BlockId>>,
    reaching_def: HashMap<ValueId, Option<ValueId>>,
    /// Store-introduced forwarding values to their actual definition.
    replace: HashMap<ValueId, ValueId>,
    /// Phi placeholders inserted this round, keyed to their slot address.
    inserted_phis: HashMap<InstId, ValueId>,
}

impl<'a> RenameCtx<'a> {
    fn run_func(&mut self, module: &mut Module, func: crate::ir::FuncId) {
        let blocks = module.func(func).blocks.clone();
        let cnt = blocks.len();
        if cnt == 0 {
            return;
        }
        let index: HashMap<BlockId, usize> =
            blocks.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        // Promotable slots: scalar allocas.
        let mut var_allocs: Vec<InstId> = Vec::new();
        for &block in blocks.iter() {
            for inst in module.block(block).insts.clone() {
                let data = module.inst(inst);
                if data.op != Opcode::Alloca || data.ty.is_array() {
                    continue;
                }
                var_allocs.push(inst);
                self.var_addrs.insert(data.operands[0]);
            }
        }

        // Insert phi placeholders at the iterated dominance frontier of the
        // blocks touching each slot.
        for &alloca in var_allocs.iter() {
            let addr = module.inst(alloca).operands[0];
            let ty = module.inst(alloca).ty.clone();
            let mut defs = bitvec![0; cnt];
            let mut finished = bitvec![0; cnt];
            let mut waiting = bitvec![0; cnt];
            for u in module.value(addr).uses.clone() {
                let block = module.inst(u.inst).block;
                if let Some(&i) = index.get(&block) {
                    defs.set(i, true);
                    waiting.set(i, true);
                }
            }
            let alloca_index = index[&module.inst(alloca).block];
            while let Some(id) = waiting.first_one() {
                waiting.set(id, false);
                for i in (alloca_index + 1)..cnt {
                    let in_frontier = self
                        .dominance
                        .frontier
                        .get(&blocks[id])
                        .map_or(false, |f| f.contains(&blocks[i]));
                    if !in_frontier || finished[i] {
                        continue;
                    }
                    let reg = module.new_reg(ty.clone());
                    let phi = module.new_inst(Opcode::Phi, ty.clone(), false, &[reg]);
                    module.prepend_inst(blocks[i], phi);
                    self.inserted_phis.insert(phi, addr);
                    finished.set(i, true);
                    if !defs[i] {
                        waiting.set(i, true);
                    }
                    module.changed = true;
                }
            }
        }

        // Rename along the dominator tree.
        self.rename_block(module, blocks[0]);

        // Blocks with no dominator parent are unreachable.
        for &block in blocks.iter().skip(1) {
            let orphan = self.dominance.idom.get(&block).copied().flatten().is_none();
            if orphan && !module.block(block).removed {
                module.destroy_block(block);
                module.remove_block(func, block);
                module.changed = true;
            }
        }
    }

    fn get_reaching_def(&mut self, id: ValueId, block: BlockId) -> Option<ValueId> {
        let mut ret = self.reaching_def.get(&id).copied().flatten();
        while let Some(r) = ret {
            let def_block = self.reg_def_block.get(&r).copied().flatten();
            let dominates = def_block.map_or(false, |db| {
                self.dominance
                    .dom
                    .get(&block)
                    .map_or(false, |set| set.contains(&db))
            });
            if dominates {
                break;
            }
            ret = self.reaching_def.get(&r).copied().flatten();
        }
        self.reaching_def.insert(id, ret);
        ret
    }

    fn get_replaced(&self, value: Option<ValueId>) -> Option<ValueId> {
        let value = value?;
        Some(self.replace.get(&value).copied().unwrap_or(value))
    }

    fn rename_block(&mut self, module: &mut Module, block: BlockId) {
        for inst in module.block(block).insts.clone() {
            if module.inst(inst).removed {
                continue;
            }
            match module.inst(inst).op {
                Opcode::Alloca => {
                    let addr = module.inst(inst).operands[0];
                    if self.var_addrs.contains(&addr) {
                        module.remove_inst(inst);
                        continue;
                    }
                }
                Opcode::Load => {
                    let reg = module.inst(inst).operands[0];
                    let addr = module.inst(inst).operands[1];
                    if self.var_addrs.contains(&addr) {
                        let def = self.get_reaching_def(addr, block);
                        self.reaching_def.insert(reg, def);
                        if def.is_none() || def == Some(addr) {
                            // Nothing reaches: an uninitialized read is zero.
                            let zero = module.new_literal(0);
                            self.reaching_def.insert(reg, Some(zero));
                            self.reg_def_block.insert(zero, Some(block));
                        }
                        self.reg_def_block.insert(reg, None);
                        module.remove_inst(inst);
                        continue;
                    }
                }
                Opcode::Store => {
                    let value = module.inst(inst).operands[0];
                    let addr = module.inst(inst).operands[1];
                    if self.var_addrs.contains(&addr) {
                        let reached = self.get_reaching_def(value, block);
                        let def = self.get_replaced(reached).unwrap_or(value);
                        let ty = module.value(value).ty.clone();
                        let reg = module.new_reg(ty);
                        self.replace.insert(reg, def);
                        let old = self.get_reaching_def(addr, block);
                        self.reaching_def.insert(reg, old);
                        self.reg_def_block.insert(reg, Some(block));
                        self.reaching_def.insert(addr, Some(reg));
                        module.remove_inst(inst);
                        continue;
                    }
                }
                Opcode::Phi => {
                    if let Some(&addr) = self.inserted_phis.get(&inst) {
                        if self.var_addrs.contains(&addr) {
                            let reg = module.inst(inst).operands[0];
                            let old = self.get_reaching_def(addr, block);
                            self.reaching_def.insert(reg, old);
                            self.reg_def_block.insert(reg, Some(block));
                            self.reaching_def.insert(addr, Some(reg));
                            continue;
                        }
                    }
                }
                _ => {}
            }

            // Ordinary instruction: rewrite operands that name renamed
            // definitions.
            for i in 0..module.inst(inst).operands.len() {
                let value = module.inst(inst).operands[i];
                if self.reaching_def.contains_key(&value) {
                    let reached = self.get_reaching_def(value, block);
                    if let Some(def) = self.get_replaced(reached) {
                        module.set_operand(inst, i, def);
                    }
                }
            }
        }

        // Backfill this block's contribution to inserted phis of successors.
        for succ in module.block(block).succs.clone() {
            for inst in module.block(succ).insts.clone() {
                if module.inst(inst).op != Opcode::Phi {
                    break;
                }
                let Some(&addr) = self.inserted_phis.get(&inst) else {
                    continue;
                };
                let reached = self.get_reaching_def(addr, block);
                let def = match self.get_replaced(reached) {
                    Some(def) => def,
                    None => module.new_literal(0),
                };
                let block_value = module.block(block).value;
                module.add_operand(inst, def);
                module.add_operand(inst, block_value);
            }
        }

        let children = self
            .dominance
            .children
            .get(&block)
            .cloned()
            .unwrap_or_default();
        for child in children {
            self.rename_block(module, child);
        }
    }
}
