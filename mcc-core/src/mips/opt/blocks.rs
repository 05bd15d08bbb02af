//! Block Rearrangement
//!
//! Four late layout transforms over the allocated machine code:
//!
//! 1. blocks containing only an unconditional jump are redirected around;
//! 2. a block with a single successor that has a single predecessor
//!    absorbs it;
//! 3. a conditional-branch/jump pair whose jump target is hotter (deeper
//!    loop) than the fall-through swaps the branch sense so the hot target
//!    falls through;
//! 4. blocks are laid out so that each block's jump target follows it when
//!    possible, weighting chains by loop depth, and the then-redundant
//!    tail jumps are deleted.

use crate::mips::{MBlockId, MFuncId, MModule, MOp, Reg};
use std::collections::{BTreeSet, HashMap};

pub struct BlockRearrange;

#[derive(Default)]
struct Cfg {
    label2block: HashMap<Reg, MBlockId>,
    in_edges: HashMap<MBlockId, BTreeSet<MBlockId>>,
    out_edges: HashMap<MBlockId, BTreeSet<MBlockId>>,
}

impl Cfg {
    fn build(module: &MModule, func: MFuncId) -> Self {
        let mut cfg = Cfg::default();
        for &block in module.func(func).blocks.iter() {
            cfg.label2block
                .insert(module.block(block).label.clone(), block);
        }
        for &block in module.func(func).blocks.iter() {
            for &inst in module.block(block).insts.iter().rev() {
                let data = module.inst(inst);
                if !data.is_terminator() {
                    break;
                }
                let target = match data.op {
                    MOp::J => data.operands[0].clone(),
                    MOp::Jr => break,
                    _ => data.operands.last().cloned().expect("branch has a target"),
                };
                if let Some(&to) = cfg.label2block.get(&target) {
                    cfg.add(block, to);
                }
            }
        }
        cfg
    }

    fn add(&mut self, from: MBlockId, to: MBlockId) {
        self.in_edges.entry(to).or_default().insert(from);
        self.out_edges.entry(from).or_default().insert(to);
    }

    fn remove(&mut self, from: MBlockId, to: MBlockId) {
        self.in_edges.entry(to).or_default().remove(&from);
        self.out_edges.entry(from).or_default().remove(&to);
    }

    fn out_count(&self, block: MBlockId) -> usize {
        self.out_edges.get(&block).map_or(0, |s| s.len())
    }
}

impl BlockRearrange {
    pub fn run(module: &mut MModule) {
        for func in module.funcs.clone() {
            let mut cfg = Cfg::build(module, func);
            Self::redirect_single_jumps(module, func, &mut cfg);
            Self::merge_blocks(module, func, &mut cfg);
            Self::reorder_jumps(module, func, &cfg);
            Self::rearrange(module, func, &cfg);
        }
    }

    /// Blocks holding only `j target` forward their predecessors straight
    /// to the target.
    fn redirect_single_jumps(module: &mut MModule, func: MFuncId, cfg: &mut Cfg) {
        let entry = module.func(func).blocks[0];
        for block in module.func(func).blocks.clone() {
            if block == entry || module.block(block).removed {
                continue;
            }
            let Some(&first) = module.block(block).insts.first() else {
                continue;
            };
            if module.inst(first).op != MOp::J {
                continue;
            }
            let target_label = module.operand(first, 0).clone();
            let Some(&target) = cfg.label2block.get(&target_label) else {
                continue;
            };
            cfg.remove(block, target);

            let block_label = module.block(block).label.clone();
            let preds: Vec<MBlockId> = cfg
                .in_edges
                .get(&block)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default();
            for &from in preds.iter() {
                for inst in module.block(from).insts.clone().into_iter().rev() {
                    let data = module.inst(inst);
                    if !data.is_terminator() {
                        break;
                    }
                    match data.op {
                        MOp::J => {
                            if data.operands[0] == block_label {
                                module.set_operand(inst, 0, target_label.clone());
                            }
                        }
                        MOp::Jr => break,
                        _ => {
                            let last = data.operands.len() - 1;
                            if data.operands[last] == block_label {
                                module.set_operand(inst, last, target_label.clone());
                            }
                        }
                    }
                }
            }
            for from in preds {
                cfg.remove(from, block);
                cfg.add(from, target);
            }
            module.remove_block(func, block);
        }
    }

    /// Absorb single-predecessor successors.
    fn merge_blocks(module: &mut MModule, func: MFuncId, cfg: &mut Cfg) {
        for block in module.func(func).blocks.clone() {
            if module.block(block).removed {
                continue;
            }
            loop {
                if cfg.out_count(block) != 1 {
                    break;
                }
                let target = *cfg.out_edges[&block].iter().next().expect("one successor");
                if cfg.in_edges.get(&target).map_or(0, |s| s.len()) != 1 {
                    break;
                }
                cfg.remove(block, target);
                let target_outs: Vec<MBlockId> = cfg
                    .out_edges
                    .get(&target)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();
                for to in target_outs {
                    cfg.remove(target, to);
                    cfg.add(block, to);
                }

                while let Some(&last) = module.block(block).insts.last() {
                    if !module.inst(last).is_terminator() {
                        break;
                    }
                    module.remove_inst(last);
                }
                let moved = std::mem::take(&mut module.block_mut(target).insts);
                for inst in moved {
                    module.inst_mut(inst).block = block;
                    module.block_mut(block).insts.push(inst);
                }
                module.remove_block(func, target);
            }
        }
    }

    /// Swap a `beq`/`bne` + `j` pair when the jump target is hotter.
    fn reorder_jumps(module: &mut MModule, func: MFuncId, cfg: &Cfg) {
        for block in module.func(func).blocks.clone() {
            if module.block(block).removed || cfg.out_count(block) <= 1 {
                continue;
            }
            let insts = module.block(block).insts.clone();
            if insts.len() < 2 {
                continue;
            }
            let jump = insts[insts.len() - 1];
            let cond_jump = insts[insts.len() - 2];
            if module.inst(jump).op != MOp::J {
                continue;
            }
            let flipped = match module.inst(cond_jump).op {
                MOp::Beq => MOp::Bne,
                MOp::Bne => MOp::Beq,
                _ => continue,
            };
            let jump_target = module.operand(jump, 0).clone();
            let cond_target = module.operand(cond_jump, 2).clone();
            let (Some(&jt), Some(&ct)) = (
                cfg.label2block.get(&jump_target),
                cfg.label2block.get(&cond_target),
            ) else {
                continue;
            };
            if module.block(jt).loop_depth > module.block(ct).loop_depth {
                let a = module.operand(cond_jump, 0).clone();
                let b = module.operand(cond_jump, 1).clone();
                let new_cond = module.new_inst(flipped, &[a, b, jump_target]);
                module.replace_inst(cond_jump, new_cond);
                let new_jump = module.new_inst(MOp::J, &[cond_target]);
                module.replace_inst(jump, new_jump);
            }
        }
    }

    /// Chain layout: every block names its jump target as its preferred
    /// follower; chains are glued together heaviest-first (loop depth as
    /// weight) and the glued-over jumps removed.
    fn rearrange(module: &mut MModule, func: MFuncId, cfg: &Cfg) {
        const ROOT: i64 = -1;
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut parent: HashMap<i64, i64> = HashMap::new();
        let mut belong: HashMap<i64, i64> = HashMap::new();
        let mut arrange_next: HashMap<i64, i64> = HashMap::new();

        fn get_belong(belong: &mut HashMap<i64, i64>, u: i64) -> i64 {
            match belong.get(&u).copied() {
                None => u,
                Some(p) => {
                    let root = get_belong(belong, p);
                    belong.insert(u, root);
                    root
                }
            }
        }

        let mut blocks = module.func(func).blocks.clone();
        blocks.sort_by_key(|&b| (module.block(b).loop_depth, cfg.out_count(b)));

        for &block in blocks.iter() {
            let Some(&last) = module.block(block).insts.last() else {
                continue;
            };
            let mut pid = ROOT;
            if module.inst(last).op == MOp::J {
                let target = module.operand(last, 0);
                if let Some(&t) = cfg.label2block.get(target) {
                    pid = t.0 as i64;
                }
            }
            let id = block.0 as i64;
            if get_belong(&mut belong, pid) == get_belong(&mut belong, id) {
                pid = ROOT;
            }
            parent.insert(id, pid);
            belong.insert(id, pid);
            children.entry(pid).or_default().push(id);
        }

        // Weight each node and pick the heaviest child as the block laid
        // out just before its jump target.
        let mut max_length: HashMap<i64, i64> = HashMap::new();
        let mut stack = vec![(ROOT, false)];
        while let Some((u, expanded)) = stack.pop() {
            if !expanded {
                stack.push((u, true));
                for &c in children.get(&u).map(|v| v.as_slice()).unwrap_or(&[]) {
                    stack.push((c, false));
                }
                continue;
            }
            let mut heavy: Option<i64> = None;
            for &c in children.get(&u).map(|v| v.as_slice()).unwrap_or(&[]) {
                if heavy.map_or(true, |h| max_length[&c] > max_length[&h]) {
                    heavy = Some(c);
                }
            }
            let depth = if u >= 0 {
                module.block(MBlockId(u as u32)).loop_depth
            } else {
                0
            };
            max_length.insert(u, 1i64 << (2 * depth as i64).min(10));
            if let Some(h) = heavy {
                if u >= 0 {
                    arrange_next.insert(h, u);
                }
            }
        }

        for block in module.func(func).blocks.clone() {
            let id = block.0 as i64;
            if !children.get(&id).map_or(true, |c| c.is_empty()) {
                continue;
            }
            let mut cur = block;
            while let Some(&next_id) = arrange_next.get(&(cur.0 as i64)) {
                if let Some(&last) = module.block(cur).insts.last() {
                    module.remove_inst(last);
                }
                let next = MBlockId(next_id as u32);
                let blocks = &mut module.func_mut(func).blocks;
                blocks.retain(|&b| b != next);
                let pos = blocks
                    .iter()
                    .position(|&b| b == cur)
                    .expect("current block in layout");
                blocks.insert(pos + 1, next);
                cur = next;
            }
        }
    }
}
