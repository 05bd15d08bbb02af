//! Global Code Motion
//!
//! Frees pure instructions from their blocks and reschedules them between
//! the earliest block their operands allow and the latest block their users
//! require, choosing the candidate with the smallest loop depth on that
//! dominator-tree path. Terminators, phis, calls, loads, and stores are
//! pinned.
//!
//! Relocated instructions are reinserted in register-id order relative to
//! the instructions already in the target block, which keeps the block
//! topologically ordered without a dependence scan.

use crate::analysis::{CfgBuilder, Dominance, LoopInfo};
use crate::ir::{BlockId, FuncId, InstId, Module, Opcode, ValueId};
use crate::opt::labeller::RegLabeller;
use std::collections::{HashMap, HashSet};

pub struct Gcm;

impl Gcm {
    pub fn run(module: &mut Module) {
        RegLabeller::run(module);
        CfgBuilder::run(module);
        let dominance = Dominance::compute(module);
        let loops = LoopInfo::compute(module, &dominance);

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            let mut ctx = GcmCtx {
                dominance: &dominance,
                loops: &loops,
                entry: module.func(func).blocks[0],
                visited: HashSet::new(),
                inst_block: HashMap::new(),
            };
            ctx.run_func(module, func);
        }
    }
}

struct GcmCtx<'a> {
    dominance: &'a Dominance,
    loops: &'a LoopInfo,
    entry: BlockId,
    visited: HashSet<InstId>,
    inst_block: HashMap<InstId, BlockId>,
}

fn is_pinned(module: &Module, inst: InstId) -> bool {
    let data = module.inst(inst);
    data.is_terminator()
        || matches!(
            data.op,
            Opcode::Phi | Opcode::Call | Opcode::Load | Opcode::Store
        )
}

fn def_inst(module: &Module, value: ValueId) -> Option<InstId> {
    module.defining_inst(value)
}

impl<'a> GcmCtx<'a> {
    fn depth(&self, block: BlockId) -> u32 {
        self.dominance.depth.get(&block).copied().unwrap_or(0)
    }

    fn run_func(&mut self, module: &mut Module, func: FuncId) {
        let blocks = module.func(func).blocks.clone();

        // Pinned instructions keep their block and seed the early pass.
        for &block in blocks.iter() {
            for inst in module.block(block).insts.clone() {
                if is_pinned(module, inst) {
                    self.inst_block.insert(inst, block);
                }
            }
        }

        self.visited.clear();
        for &block in blocks.iter() {
            for inst in module.block(block).insts.clone() {
                if !is_pinned(module, inst) {
                    continue;
                }
                self.visited.insert(inst);
                self.inst_block.insert(inst, block);
                let first = module.inst(inst).first_use_index();
                for i in first..module.inst(inst).operands.len() {
                    if let Some(def) = def_inst(module, module.operand(inst, i)) {
                        self.schedule_early(module, def);
                    }
                }
            }
        }

        self.visited.clear();
        for &block in blocks.iter() {
            for inst in module.block(block).insts.clone() {
                if is_pinned(module, inst) {
                    self.visited.insert(inst);
                } else {
                    self.schedule_late(module, inst);
                }
            }
        }

        // Detach everything whose chosen block differs and reinsert.
        let mut pending: HashMap<BlockId, Vec<InstId>> = HashMap::new();
        for &block in blocks.iter() {
            for inst in module.block(block).insts.clone() {
                let target = self.inst_block.get(&inst).copied().unwrap_or(block);
                if target == block {
                    continue;
                }
                module.block_mut(block).insts.retain(|&i| i != inst);
                pending.entry(target).or_default().push(inst);
                module.changed = true;
            }
        }
        for &block in blocks.iter() {
            let Some(mut list) = pending.remove(&block) else {
                continue;
            };
            list.sort_by_key(|&inst| self.def_reg_id(module, inst));
            self.reinsert(module, block, list);
        }
    }

    fn def_reg_id(&self, module: &Module, inst: InstId) -> u32 {
        module
            .value(module.operand(inst, 0))
            .reg_id
            .unwrap_or(u32::MAX)
    }

    fn schedule_early(&mut self, module: &Module, inst: InstId) {
        if self.visited.contains(&inst) || is_pinned(module, inst) {
            return;
        }
        self.visited.insert(inst);
        self.inst_block.insert(inst, self.entry);
        let first = module.inst(inst).first_use_index();
        for i in first..module.inst(inst).operands.len() {
            let Some(def) = def_inst(module, module.operand(inst, i)) else {
                continue;
            };
            self.schedule_early(module, def);
            let def_block = self.inst_block[&def];
            let my_block = self.inst_block[&inst];
            if self.depth(def_block) > self.depth(my_block) {
                self.inst_block.insert(inst, def_block);
            }
        }
    }

    fn schedule_late(&mut self, module: &Module, inst: InstId) {
        if self.visited.contains(&inst) || is_pinned(module, inst) {
            return;
        }
        self.visited.insert(inst);

        let value = module.operand(inst, 0);
        let mut lca: Option<BlockId> = None;
        for u in module.value(value).uses.clone() {
            if u.inst == inst && u.index == 0 {
                continue;
            }
            if module.inst(u.inst).removed {
                continue;
            }
            self.schedule_late(module, u.inst);
            let user_pos = if module.inst(u.inst).op == Opcode::Phi {
                // A phi use is positioned at the predecessor it flows from.
                module.as_block(module.operand(u.inst, u.index + 1))
            } else {
                self.inst_block
                    .get(&u.inst)
                    .copied()
                    .unwrap_or(module.inst(u.inst).block)
            };
            lca = match lca {
                None => Some(user_pos),
                Some(l) => self.dominance.lca(l, user_pos),
            };
        }

        let early = self.inst_block.get(&inst).copied().unwrap_or(self.entry);
        let Some(mut cur) = lca else {
            // No users left; leave the instruction where it is for DCE.
            return;
        };
        let mut best = cur;
        while cur != early {
            if self.loops.loop_depth(cur) < self.loops.loop_depth(best) {
                best = cur;
            }
            match self.dominance.idom.get(&cur).copied().flatten() {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        if self.loops.loop_depth(cur) < self.loops.loop_depth(best) {
            best = cur;
        }
        self.inst_block.insert(inst, best);
    }

    /// Reinsert relocated instructions into `block`, keeping them ordered
    /// by defined register id relative to the instructions already there.
    fn reinsert(&self, module: &mut Module, block: BlockId, pending: Vec<InstId>) {
        let mut it = 0usize;
        let mut last: Option<usize> = None;
        let mut cur_reg = 0u32;

        let first_def = |module: &Module, inst: InstId| -> Option<u32> {
            let data = module.inst(inst);
            if data.no_def || data.is_terminator() {
                None
            } else {
                module.value(data.operands[0]).reg_id
            }
        };

        if let Some(&first) = module.block(block).insts.first() {
            if let Some(reg) = first_def(module, first) {
                cur_reg = reg;
            }
        }
        while it < module.block(block).insts.len()
            && module.inst(module.block(block).insts[it]).op == Opcode::Phi
        {
            last = Some(it);
            it += 1;
            if let Some(&next) = module.block(block).insts.get(it) {
                if let Some(reg) = first_def(module, next) {
                    cur_reg = reg;
                }
            }
        }

        for inst in pending {
            let reg = self.def_reg_id(module, inst);
            loop {
                let cur_inst = module.block(block).insts[it];
                if cur_reg >= reg || module.inst(cur_inst).is_terminator() {
                    break;
                }
                if !module.inst(cur_inst).no_def {
                    last = Some(it);
                }
                it += 1;
                let next = module.block(block).insts[it];
                if let Some(r) = first_def(module, next) {
                    cur_reg = r;
                }
            }
            let pos = match last {
                Some(l) => l + 1,
                None => 0,
            };
            module.inst_mut(inst).block = block;
            module.block_mut(block).insts.insert(pos, inst);
            last = Some(pos);
            if pos <= it {
                it += 1;
            }
        }
    }
}
