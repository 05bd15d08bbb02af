//! Dominance Analysis
//!
//! Iterative bitset fixpoint over each function's CFG: every block's
//! dominator set starts full (the entry starts as itself) and is refined to
//! `{n} ∪ ⋂ dom(pred)` until stable. The immediate dominator of `n` is the
//! unique member of `dom(n) \ {n}` whose dominator set is one smaller.
//! Dominance frontiers come from walking each join's predecessors up the
//! dominator tree; dominator-tree depth is the altitude used for LCA
//! queries and code-motion scheduling.
//!
//! Requires the CFG edges to be current (`CfgBuilder::run` first).

use crate::ir::{BlockId, Module};
use bitvec::prelude::*;
use std::collections::{HashMap, HashSet};

/// Dominator tree, dominator sets, and frontiers of every function.
#[derive(Debug, Default)]
pub struct Dominance {
    /// Immediate dominator; `None` for the entry and unreachable blocks.
    pub idom: HashMap<BlockId, Option<BlockId>>,
    /// Dominator-tree children, ordered by block id.
    pub children: HashMap<BlockId, Vec<BlockId>>,
    /// Full dominator sets.
    pub dom: HashMap<BlockId, HashSet<BlockId>>,
    /// Dominance frontiers.
    pub frontier: HashMap<BlockId, HashSet<BlockId>>,
    /// Dominator-tree depth (entry = 1); absent for unreachable blocks.
    pub depth: HashMap<BlockId, u32>,
}

impl Dominance {
    pub fn compute(module: &Module) -> Self {
        let mut dominance = Dominance::default();
        for &func in module.funcs.iter() {
            if !module.func(func).reserved {
                dominance.compute_func(module, func);
            }
        }
        dominance
    }

    fn compute_func(&mut self, module: &Module, func: crate::ir::FuncId) {
        let blocks = module.func(func).blocks.clone();
        let cnt = blocks.len();
        if cnt == 0 {
            return;
        }
        let index: HashMap<BlockId, usize> =
            blocks.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        let mut dom: Vec<BitVec> = vec![bitvec![1; cnt]; cnt];

        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..cnt {
                let mut cur: BitVec = if i > 0 {
                    bitvec![1; cnt]
                } else {
                    bitvec![0; cnt]
                };
                for &pred in module.block(blocks[i]).preds.iter() {
                    cur &= dom[index[&pred]].as_bitslice();
                }
                cur.set(i, true);
                if cur.count_ones() != dom[i].count_ones() {
                    changed = true;
                }
                dom[i] = cur;
            }
        }

        for i in 0..cnt {
            let set: HashSet<BlockId> = (0..cnt)
                .filter(|&j| dom[i][j])
                .map(|j| blocks[j])
                .collect();
            self.dom.insert(blocks[i], set);
        }

        // Immediate dominators by the cardinality rule.
        for i in 0..cnt {
            let block = blocks[i];
            self.idom.insert(block, None);
            if module.block(block).preds.is_empty() {
                continue;
            }
            for j in 0..cnt {
                if dom[i][j] && dom[j].count_ones() + 1 == dom[i].count_ones() {
                    self.idom.insert(block, Some(blocks[j]));
                    break;
                }
            }
            if let Some(Some(parent)) = self.idom.get(&block).copied() {
                if parent != block {
                    self.children.entry(parent).or_default().push(block);
                }
            }
        }
        for children in self.children.values_mut() {
            children.sort_unstable();
            children.dedup();
        }

        // Dominance frontiers: walk each join's predecessors upward until
        // the join's dominator is reached.
        for i in 0..cnt {
            let join = blocks[i];
            for &pred in module.block(join).preds.iter() {
                let mut cur = Some(pred);
                while let Some(c) = cur {
                    let dominates = self.dom[&join].contains(&c);
                    if dominates && join != c {
                        break;
                    }
                    self.frontier.entry(c).or_default().insert(join);
                    cur = self.idom.get(&c).copied().flatten();
                }
            }
        }

        // Dominator-tree depth, entry at 1.
        let mut stack = vec![(blocks[0], 1u32)];
        while let Some((block, depth)) = stack.pop() {
            self.depth.insert(block, depth);
            if let Some(children) = self.children.get(&block) {
                for &child in children.iter() {
                    stack.push((child, depth + 1));
                }
            }
        }
    }

    /// True when `a` dominates `b`.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.dom.get(&b).map_or(false, |set| set.contains(&a))
    }

    /// Least common ancestor of two blocks in the dominator tree; `None`
    /// when either is unreachable.
    pub fn lca(&self, u: BlockId, v: BlockId) -> Option<BlockId> {
        let mut u = u;
        let mut v = v;
        while self.depth.contains_key(&u) && self.depth.contains_key(&v) && u != v {
            if self.depth[&u] < self.depth[&v] {
                std::mem::swap(&mut u, &mut v);
            }
            u = self.idom.get(&u).copied().flatten()?;
        }
        if u != v {
            return None;
        }
        Some(u)
    }
}
