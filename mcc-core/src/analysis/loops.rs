//! Natural-Loop Analysis
//!
//! Depth-first search over each function's CFG: an edge into a block that
//! is still on the DFS stack proposes a loop; the body is collected by
//! walking predecessors back from the edge source, and the proposal is kept
//! only when the header dominates the whole body (the dominator-tree LCA of
//! the body is the header). Nested loops are merged into components with a
//! union-find so exit edges internal to an enclosing loop are not recorded.
//!
//! Loop depth of a block is the number of loop headers dominating it; it is
//! the hotness measure used by code motion, block layout, and spill
//! heuristics.

use crate::analysis::dominance::Dominance;
use crate::ir::{BlockId, FuncId, Module};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One natural loop.
#[derive(Debug)]
pub struct Loop {
    pub header: BlockId,
    pub body: HashSet<BlockId>,
    /// `(exiting block, exit target)` edges leaving the loop.
    pub exits: Vec<(BlockId, BlockId)>,
}

/// Loops and loop depths of every function.
#[derive(Debug, Default)]
pub struct LoopInfo {
    pub loops: Vec<Loop>,
    pub depth: HashMap<BlockId, u32>,
    /// Indices into `loops` of the loops headed by a block.
    pub headers: HashMap<BlockId, Vec<usize>>,
}

struct LoopFinder<'a> {
    module: &'a Module,
    dominance: &'a Dominance,
    visited: HashSet<BlockId>,
    component: HashMap<BlockId, BlockId>,
}

impl LoopInfo {
    pub fn compute(module: &Module, dominance: &Dominance) -> Self {
        let mut info = LoopInfo::default();
        for &func in module.funcs.iter() {
            if !module.func(func).reserved {
                info.compute_func(module, dominance, func);
            }
        }
        info
    }

    pub fn loop_depth(&self, block: BlockId) -> u32 {
        self.depth.get(&block).copied().unwrap_or(0)
    }

    fn compute_func(&mut self, module: &Module, dominance: &Dominance, func: FuncId) {
        let Some(&entry) = module.func(func).blocks.first() else {
            return;
        };
        let mut finder = LoopFinder {
            module,
            dominance,
            visited: HashSet::new(),
            component: HashMap::new(),
        };
        finder.find_loops(entry, self);
        self.set_loop_depth(dominance, entry);
    }

    /// Loop depth by dominator-tree walk: entering a header adds one level,
    /// and the level propagates to every body block it dominates.
    fn set_loop_depth(&mut self, dominance: &Dominance, entry: BlockId) {
        let mut stack = vec![entry];
        while let Some(block) = stack.pop() {
            if self.headers.contains_key(&block) {
                *self.depth.entry(block).or_insert(0) += 1;
            }
            let block_depth = self.depth.get(&block).copied().unwrap_or(0);
            let loop_ids = self.headers.get(&block).cloned().unwrap_or_default();
            let mut seen = HashSet::new();
            for loop_id in loop_ids {
                let body: Vec<BlockId> = self.loops[loop_id].body.iter().copied().collect();
                for desc in body {
                    if seen.insert(desc) {
                        let d = self.depth.entry(desc).or_insert(0);
                        *d = (*d).max(block_depth);
                    }
                }
            }
            if let Some(children) = dominance.children.get(&block) {
                for &child in children.iter() {
                    stack.push(child);
                }
            }
        }
    }
}

impl<'a> LoopFinder<'a> {
    fn get_component(&mut self, block: BlockId) -> BlockId {
        match self.component.get(&block).copied() {
            None => block,
            Some(parent) => {
                let root = self.get_component(parent);
                self.component.insert(block, root);
                root
            }
        }
    }

    /// Collect a candidate loop body by walking predecessors back from the
    /// back-edge source until the header.
    fn mark_loop(&mut self, block: BlockId, header: BlockId, body: &mut HashSet<BlockId>) {
        let mut work = vec![block];
        while let Some(cur) = work.pop() {
            if !body.insert(cur) {
                continue;
            }
            if self.get_component(cur) != self.get_component(header) {
                let root = self.get_component(cur);
                self.component.insert(root, header);
            }
            if cur == header {
                continue;
            }
            for &pred in self.module.block(cur).preds.iter() {
                work.push(pred);
            }
        }
    }

    fn find_loops(&mut self, entry: BlockId, info: &mut LoopInfo) {
        // Iterative DFS; edges to already-visited blocks propose loops and
        // the dominator check discards cross edges.
        let mut stack = vec![(entry, 0usize)];
        self.visited.insert(entry);
        loop {
            let Some(&(block, next)) = stack.last() else {
                break;
            };
            let succs = self.module.block(block).succs.clone();
            if next >= succs.len() {
                stack.pop();
                continue;
            }
            stack.last_mut().expect("non-empty stack").1 += 1;
            let succ = succs[next];

            if !self.visited.contains(&succ) {
                self.visited.insert(succ);
                stack.push((succ, 0));
                continue;
            }

            // Candidate back edge block -> succ.
            let header = succ;
            let mut body = HashSet::new();
            self.mark_loop(block, header, &mut body);

            let mut lca = Some(block);
            for &b in body.iter() {
                lca = match lca {
                    Some(l) => self.dominance.lca(l, b),
                    None => None,
                };
            }
            if lca != Some(header) {
                continue;
            }

            let mut exits = BTreeSet::new();
            for &b in body.iter() {
                for &dest in self.module.block(b).succs.iter() {
                    if body.contains(&dest) {
                        continue;
                    }
                    if self.get_component(dest) == self.get_component(b) {
                        continue;
                    }
                    exits.insert((b, dest));
                }
            }

            let loop_id = info.loops.len();
            info.loops.push(Loop {
                header,
                body,
                exits: exits.into_iter().collect(),
            });
            info.headers.entry(header).or_default().push(loop_id);
        }
    }
}
