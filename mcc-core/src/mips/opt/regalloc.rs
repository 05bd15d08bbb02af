//! Graph-Coloring Register Allocation
//!
//! Chaitin–Briggs with iterated coalescing over an 18-register pool
//! (`$t0-$t7`, `$s0-$s7`, `$t8`, `$t9`):
//!
//! 1. backward per-instruction liveness, collecting live-range length and
//!    def/use counts for the spill heuristic;
//! 2. interference build; canonical moves (`add rd, $0, rs` either way)
//!    become coalesce candidates instead of edges, and every call site
//!    interferes with the caller-saved set;
//! 3. the standard simplify / coalesce (George and Briggs tests) / freeze
//!    / spill-select worklist loop, spilling the candidate maximizing
//!    `(1 + live_length) / (1 + defs + uses)` optimistically;
//! 4. color assignment off the select stack; uncolored nodes spill:
//!    each gets a frame slot with a fresh virtual per local interval, or,
//!    when the single definition is a pure `la`/`li`, is rematerialized at
//!    each use (folding `la` addresses straight into `lw`/`sw` operands);
//!    then the whole round repeats;
//! 5. callee-saved registers actually assigned are stored in the prologue
//!    and reloaded before every `jr $ra`; `main` skips the convention.
//!
//! `$at` never enters the pool; it stays reserved for the code generator.

use crate::config::Config;
use crate::mips::{MFuncId, MInstId, MModule, MOp, PhysReg, Reg, ZERO};
use std::collections::{BTreeMap, BTreeSet, HashMap};

type RegSet = BTreeSet<Reg>;

const AVAIL_REGS: [PhysReg; 18] = [
    PhysReg::T0,
    PhysReg::T1,
    PhysReg::T2,
    PhysReg::T3,
    PhysReg::T4,
    PhysReg::T5,
    PhysReg::T6,
    PhysReg::T7,
    PhysReg::S0,
    PhysReg::S1,
    PhysReg::S2,
    PhysReg::S3,
    PhysReg::S4,
    PhysReg::S5,
    PhysReg::S6,
    PhysReg::S7,
    PhysReg::T8,
    PhysReg::T9,
];

const TEMP_REGS: [PhysReg; 16] = [
    PhysReg::T0,
    PhysReg::T1,
    PhysReg::T2,
    PhysReg::T3,
    PhysReg::T4,
    PhysReg::T5,
    PhysReg::T6,
    PhysReg::T7,
    PhysReg::T8,
    PhysReg::T9,
    PhysReg::A0,
    PhysReg::A1,
    PhysReg::A2,
    PhysReg::A3,
    PhysReg::V0,
    PhysReg::V1,
];

pub struct GcAllocator;

impl GcAllocator {
    pub fn run(module: &mut MModule, config: &Config) {
        let main = module.main_func();
        for func in module.funcs.clone() {
            let mut ctx = AllocCtx::new(module, config, func, main);
            ctx.allocate();
            ctx.replace_regs();
            ctx.callee_saved();
        }
    }
}

/// `add rd, $zero, rs` or `add rd, rs, $zero` (and the `addu` forms) are
/// the canonical moves the coalescer eats.
fn is_move(module: &MModule, inst: MInstId) -> bool {
    let data = module.inst(inst);
    if !matches!(data.op, MOp::Add | MOp::Addu) {
        return false;
    }
    (data.operands[1] == ZERO && !data.operands[2].is_imm()) || data.operands[2] == ZERO
}

fn move_operands(module: &MModule, inst: MInstId) -> (Reg, Reg) {
    let data = module.inst(inst);
    let x = data.operands[0].clone();
    let y = if data.operands[1] == ZERO {
        data.operands[2].clone()
    } else {
        data.operands[1].clone()
    };
    (x, y)
}

struct AllocCtx<'a> {
    module: &'a mut MModule,
    config: &'a Config,
    func: MFuncId,
    main: MFuncId,
    k: usize,

    // Liveness.
    live_in: HashMap<MInstId, RegSet>,
    live_out: HashMap<MInstId, RegSet>,
    defs: HashMap<MInstId, RegSet>,
    uses: HashMap<MInstId, RegSet>,
    active_length: BTreeMap<Reg, i64>,
    reg_defs: BTreeMap<Reg, BTreeSet<MInstId>>,
    reg_uses: BTreeMap<Reg, BTreeSet<MInstId>>,
    initial: RegSet,

    // Worklists (every node is in exactly one).
    simplify_worklist: RegSet,
    freeze_worklist: RegSet,
    spill_worklist: RegSet,
    spilled: RegSet,
    coalesced: RegSet,
    colored: RegSet,
    select_stack: Vec<Reg>,
    selected: RegSet,

    // Move sets.
    coalesced_moves: BTreeSet<MInstId>,
    constrained_moves: BTreeSet<MInstId>,
    frozen_moves: BTreeSet<MInstId>,
    worklist_moves: BTreeSet<MInstId>,
    active_moves: BTreeSet<MInstId>,

    adjacent: BTreeMap<Reg, RegSet>,
    degree: BTreeMap<Reg, i32>,
    move_list: BTreeMap<Reg, Vec<MInstId>>,
    alias: BTreeMap<Reg, Reg>,
    color: BTreeMap<Reg, Reg>,
}

impl<'a> AllocCtx<'a> {
    fn new(module: &'a mut MModule, config: &'a Config, func: MFuncId, main: MFuncId) -> Self {
        Self {
            module,
            config,
            func,
            main,
            k: AVAIL_REGS.len(),
            live_in: HashMap::new(),
            live_out: HashMap::new(),
            defs: HashMap::new(),
            uses: HashMap::new(),
            active_length: BTreeMap::new(),
            reg_defs: BTreeMap::new(),
            reg_uses: BTreeMap::new(),
            initial: RegSet::new(),
            simplify_worklist: RegSet::new(),
            freeze_worklist: RegSet::new(),
            spill_worklist: RegSet::new(),
            spilled: RegSet::new(),
            coalesced: RegSet::new(),
            colored: RegSet::new(),
            select_stack: Vec::new(),
            selected: RegSet::new(),
            coalesced_moves: BTreeSet::new(),
            constrained_moves: BTreeSet::new(),
            frozen_moves: BTreeSet::new(),
            worklist_moves: BTreeSet::new(),
            active_moves: BTreeSet::new(),
            adjacent: BTreeMap::new(),
            degree: BTreeMap::new(),
            move_list: BTreeMap::new(),
            alias: BTreeMap::new(),
            color: BTreeMap::new(),
        }
    }

    // --- Small helpers ---

    fn insert_virtual(set: &mut RegSet, reg: &Reg) {
        if reg.is_virtual() {
            set.insert(reg.clone());
        }
    }

    fn degree_of(&self, reg: &Reg) -> i32 {
        self.degree.get(reg).copied().unwrap_or(0)
    }

    fn adjacent_of(&self, reg: &Reg) -> RegSet {
        self.adjacent.get(reg).cloned().unwrap_or_default()
    }

    fn has_edge(&self, u: &Reg, v: &Reg) -> bool {
        if u.is_virtual() {
            return self.adjacent.get(u).map_or(false, |s| s.contains(v));
        }
        if v.is_virtual() {
            return self.adjacent.get(v).map_or(false, |s| s.contains(u));
        }
        false
    }

    fn add_edge(&mut self, u: &Reg, v: &Reg) {
        let material = |r: &Reg| matches!(r, Reg::Virt(_) | Reg::Phys(_));
        if !material(u) || !material(v) {
            return;
        }
        if u == v || self.has_edge(u, v) {
            return;
        }
        if u.is_virtual() {
            self.adjacent.entry(u.clone()).or_default().insert(v.clone());
            *self.degree.entry(u.clone()).or_insert(0) += 1;
        }
        if v.is_virtual() {
            self.adjacent.entry(v.clone()).or_default().insert(u.clone());
            *self.degree.entry(v.clone()).or_insert(0) += 1;
        }
    }

    fn get_alias(&mut self, reg: &Reg) -> Reg {
        if !self.coalesced.contains(reg) {
            return reg.clone();
        }
        let next = match self.alias.get(reg) {
            Some(a) => a.clone(),
            None => return reg.clone(),
        };
        let root = self.get_alias(&next);
        self.alias.insert(reg.clone(), root.clone());
        root
    }

    fn is_move_related(&self, reg: &Reg) -> bool {
        self.move_list
            .get(reg)
            .map_or(false, |moves| {
                moves
                    .iter()
                    .any(|m| self.active_moves.contains(m) || self.worklist_moves.contains(m))
            })
    }

    fn enable_moves(&mut self, reg: &Reg) {
        let moves = self.move_list.get(reg).cloned().unwrap_or_default();
        for m in moves {
            if self.active_moves.remove(&m) {
                self.worklist_moves.insert(m);
            }
        }
    }

    // --- Liveness ---

    fn analyse(&mut self) {
        self.defs.clear();
        self.uses.clear();
        self.live_in.clear();
        self.live_out.clear();
        self.active_length.clear();
        self.reg_defs.clear();
        self.reg_uses.clear();
        self.initial.clear();

        let mut label2entry: HashMap<Reg, MInstId> = HashMap::new();
        let blocks = self.module.func(self.func).blocks.clone();
        for &block in blocks.iter() {
            if let Some(&first) = self.module.block(block).insts.first() {
                label2entry.insert(self.module.block(block).label.clone(), first);
            }
            for &inst in self.module.block(block).insts.iter() {
                let data = self.module.inst(inst);
                let mut def = RegSet::new();
                let mut used = RegSet::new();
                let first = if data.no_def() { 0 } else { 1 };
                if !data.no_def() {
                    Self::insert_virtual(&mut def, &data.operands[0]);
                }
                for operand in data.operands.iter().skip(first) {
                    Self::insert_virtual(&mut used, operand);
                }
                for operand in data.operands.iter() {
                    Self::insert_virtual(&mut self.initial, operand);
                }
                self.defs.insert(inst, def);
                self.uses.insert(inst, used);
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &block in blocks.iter().rev() {
                let mut next_inst: Option<MInstId> = None;
                for &inst in self.module.block(block).insts.clone().iter().rev() {
                    let data = self.module.inst(inst);
                    let mut out = RegSet::new();
                    if data.is_terminator() {
                        match data.op {
                            MOp::J => {
                                if let Some(entry) =
                                    label2entry.get(&data.operands[0]).copied()
                                {
                                    if let Some(set) = self.live_in.get(&entry) {
                                        out.extend(set.iter().cloned());
                                    }
                                }
                            }
                            MOp::Jr => {}
                            _ => {
                                let target = data.operands.last().expect("branch target");
                                if let Some(entry) = label2entry.get(target).copied() {
                                    if let Some(set) = self.live_in.get(&entry) {
                                        out.extend(set.iter().cloned());
                                    }
                                }
                                if let Some(next) = next_inst {
                                    if let Some(set) = self.live_in.get(&next) {
                                        out.extend(set.iter().cloned());
                                    }
                                }
                            }
                        }
                    } else if let Some(next) = next_inst {
                        if let Some(set) = self.live_in.get(&next) {
                            out.extend(set.iter().cloned());
                        }
                    }

                    let mut live = out.clone();
                    for d in self.defs[&inst].iter() {
                        live.remove(d);
                    }
                    live.extend(self.uses[&inst].iter().cloned());

                    if self.live_in.get(&inst) != Some(&live)
                        || self.live_out.get(&inst) != Some(&out)
                    {
                        changed = true;
                        self.live_in.insert(inst, live);
                        self.live_out.insert(inst, out);
                    }
                    next_inst = Some(inst);
                }
            }
        }

        // Spill statistics over the converged solution.
        for &block in blocks.iter() {
            for &inst in self.module.block(block).insts.iter() {
                if let Some(set) = self.live_in.get(&inst) {
                    for reg in set.iter() {
                        *self.active_length.entry(reg.clone()).or_insert(0) += 1;
                    }
                }
                let data = self.module.inst(inst);
                let first = if data.no_def() { 0 } else { 1 };
                if !data.no_def() && data.operands[0].is_virtual() {
                    self.reg_defs
                        .entry(data.operands[0].clone())
                        .or_default()
                        .insert(inst);
                }
                for operand in data.operands.iter().skip(first) {
                    if operand.is_virtual() {
                        self.reg_uses.entry(operand.clone()).or_default().insert(inst);
                    }
                }
            }
        }
    }

    // --- Build ---

    fn build(&mut self) {
        self.adjacent.clear();
        self.degree.clear();
        self.alias.clear();
        self.move_list.clear();
        self.coalesced.clear();
        self.colored.clear();
        self.coalesced_moves.clear();
        self.constrained_moves.clear();
        self.frozen_moves.clear();
        self.worklist_moves.clear();
        self.active_moves.clear();

        for block in self.module.func(self.func).blocks.clone() {
            let insts = self.module.block(block).insts.clone();
            // Liveness at the bottom: out-set of the first terminator.
            let mut last = match insts.last() {
                Some(&i) => i,
                None => continue,
            };
            for &inst in insts.iter().rev() {
                if !self.module.inst(inst).is_terminator() {
                    break;
                }
                last = inst;
            }
            let mut live = self.live_out.get(&last).cloned().unwrap_or_default();

            for &inst in insts.iter().rev() {
                if is_move(self.module, inst) {
                    for u in self.uses[&inst].iter() {
                        live.remove(u);
                    }
                    for operand in self.module.inst(inst).operands.clone() {
                        if operand.is_virtual() {
                            self.move_list.entry(operand).or_default().push(inst);
                        }
                    }
                    self.worklist_moves.insert(inst);
                }
                let data = self.module.inst(inst).clone();
                if !data.no_def() {
                    Self::insert_virtual(&mut live, &data.operands[0]);
                    for reg in live.clone() {
                        self.add_edge(&reg, &data.operands[0]);
                    }
                }
                // Calls clobber the caller-saved temporaries.
                if data.op == MOp::Jal {
                    for reg in live.clone() {
                        for temp in TEMP_REGS {
                            self.add_edge(&reg, &Reg::Phys(temp));
                        }
                    }
                }
                for d in self.defs[&inst].iter() {
                    live.remove(d);
                }
                live.extend(self.uses[&inst].iter().cloned());
            }
        }

        for reg in std::mem::take(&mut self.initial) {
            if self.degree_of(&reg) >= self.k as i32 {
                self.spill_worklist.insert(reg);
            } else if self.is_move_related(&reg) {
                self.freeze_worklist.insert(reg);
            } else {
                self.simplify_worklist.insert(reg);
            }
        }
    }

    // --- Worklist steps ---

    fn dec_degree(&mut self, reg: &Reg) {
        let entry = self.degree.entry(reg.clone()).or_insert(0);
        *entry -= 1;
        if *entry == self.k as i32 {
            self.enable_moves(reg);
            for adj in self.adjacent_of(reg) {
                if self.selected.contains(&adj) || self.coalesced.contains(&adj) {
                    continue;
                }
                self.enable_moves(&adj);
            }
            self.spill_worklist.remove(reg);
            if self.is_move_related(reg) {
                self.freeze_worklist.insert(reg.clone());
            } else {
                self.simplify_worklist.insert(reg.clone());
            }
        }
    }

    fn add_worklist(&mut self, reg: &Reg) {
        if reg.is_virtual() && !self.is_move_related(reg) && self.degree_of(reg) < self.k as i32 {
            self.freeze_worklist.remove(reg);
            self.simplify_worklist.insert(reg.clone());
        }
    }

    fn simplify(&mut self) {
        let reg = self
            .simplify_worklist
            .iter()
            .next()
            .cloned()
            .expect("simplify worklist non-empty");
        self.simplify_worklist.remove(&reg);
        self.select_stack.push(reg.clone());
        self.selected.insert(reg.clone());
        for adj in self.adjacent_of(&reg) {
            if self.selected.contains(&adj) || self.coalesced.contains(&adj) {
                continue;
            }
            self.dec_degree(&adj);
        }
    }

    fn combine(&mut self, u: &Reg, v: &Reg) {
        self.freeze_worklist.remove(v);
        self.spill_worklist.remove(v);
        self.coalesced.insert(v.clone());
        self.alias.insert(v.clone(), u.clone());
        let moves = self.move_list.get(v).cloned().unwrap_or_default();
        self.move_list.entry(u.clone()).or_default().extend(moves);
        self.enable_moves(v);
        for adj in self.adjacent_of(v) {
            if self.selected.contains(&adj) || self.coalesced.contains(&adj) {
                continue;
            }
            self.add_edge(u, &adj);
            self.dec_degree(&adj);
        }
        if self.degree_of(u) >= self.k as i32 && self.freeze_worklist.contains(u) {
            self.freeze_worklist.remove(u);
            self.spill_worklist.insert(u.clone());
        }
    }

    fn coalesce(&mut self) {
        let m = *self
            .worklist_moves
            .iter()
            .next()
            .expect("move worklist non-empty");
        self.worklist_moves.remove(&m);
        let (x, y) = move_operands(self.module, m);
        let mut x = self.get_alias(&x);
        let mut y = self.get_alias(&y);
        if !y.is_virtual() {
            std::mem::swap(&mut x, &mut y);
        }
        if x == y {
            self.coalesced_moves.insert(m);
            self.add_worklist(&x);
            return;
        }
        if !y.is_virtual() || self.has_edge(&x, &y) {
            self.constrained_moves.insert(m);
            self.add_worklist(&x);
            self.add_worklist(&y);
            return;
        }
        if !x.is_virtual() {
            // George: every neighbor of y already fits with x.
            let mut valid = true;
            for adj in self.adjacent_of(&y) {
                if self.selected.contains(&adj) || self.coalesced.contains(&adj) {
                    continue;
                }
                if self.degree_of(&adj) < self.k as i32
                    || !adj.is_virtual()
                    || self.has_edge(&x, &adj)
                {
                    continue;
                }
                valid = false;
                break;
            }
            if valid {
                self.coalesced_moves.insert(m);
                self.combine(&x, &y);
                self.add_worklist(&x);
                return;
            }
        }
        if x.is_virtual() {
            // Briggs: the merged node keeps fewer than K heavy neighbors.
            let mut adjacents = self.adjacent_of(&x);
            adjacents.extend(self.adjacent_of(&y));
            let mut count = 0;
            for adj in adjacents {
                if self.selected.contains(&adj) || self.coalesced.contains(&adj) {
                    continue;
                }
                if self.degree_of(&adj) >= self.k as i32 {
                    count += 1;
                }
            }
            if count < self.k as i32 {
                self.coalesced_moves.insert(m);
                self.combine(&x, &y);
                self.add_worklist(&x);
                return;
            }
        }
        self.active_moves.insert(m);
    }

    fn freeze_moves(&mut self, reg: &Reg) {
        let moves = self.move_list.get(reg).cloned().unwrap_or_default();
        for m in moves {
            if !self.active_moves.contains(&m) && !self.worklist_moves.contains(&m) {
                continue;
            }
            self.active_moves.remove(&m);
            self.worklist_moves.remove(&m);
            self.frozen_moves.insert(m);
            let (x, y) = move_operands(self.module, m);
            let target = if self.get_alias(&x) == self.get_alias(reg) {
                self.get_alias(&y)
            } else {
                self.get_alias(&x)
            };
            if !self.is_move_related(&target) && self.degree_of(&target) < self.k as i32 {
                self.freeze_worklist.remove(&target);
                self.add_to_simplify(&target);
            }
        }
    }

    fn add_to_simplify(&mut self, reg: &Reg) {
        if reg.is_virtual() {
            self.simplify_worklist.insert(reg.clone());
        }
    }

    fn freeze(&mut self) {
        let reg = self
            .freeze_worklist
            .iter()
            .next()
            .cloned()
            .expect("freeze worklist non-empty");
        self.freeze_worklist.remove(&reg);
        self.simplify_worklist.insert(reg.clone());
        self.freeze_moves(&reg);
    }

    fn select_spill(&mut self) {
        let mut best: Option<Reg> = None;
        let mut best_cost = 0.0f64;
        for reg in self.spill_worklist.iter() {
            let use_count = self.reg_defs.get(reg).map_or(0, |s| s.len())
                + self.reg_uses.get(reg).map_or(0, |s| s.len());
            let length = self.active_length.get(reg).copied().unwrap_or(0);
            let cost = (1 + length) as f64 / (1 + use_count) as f64;
            if cost > best_cost || best.is_none() {
                best_cost = cost;
                best = Some(reg.clone());
            }
        }
        let reg = best.expect("spill worklist non-empty");
        self.spill_worklist.remove(&reg);
        self.simplify_worklist.insert(reg.clone());
        self.freeze_moves(&reg);
    }

    fn assign_colors(&mut self) {
        while let Some(reg) = self.select_stack.pop() {
            let mut candidates: RegSet =
                AVAIL_REGS.iter().map(|&p| Reg::Phys(p)).collect();
            for adj in self.adjacent_of(&reg) {
                let alias = self.get_alias(&adj);
                if !alias.is_virtual() {
                    candidates.remove(&alias);
                }
                if self.colored.contains(&alias) {
                    if let Some(color) = self.color.get(&alias) {
                        candidates.remove(color);
                    }
                }
            }
            match candidates.iter().next().cloned() {
                None => {
                    self.spilled.insert(reg);
                }
                Some(color) => {
                    self.colored.insert(reg.clone());
                    self.color.insert(reg, color);
                }
            }
        }
        self.selected.clear();
        for reg in self.coalesced.clone() {
            let alias = self.get_alias(&reg);
            let color = if !alias.is_virtual() {
                alias
            } else {
                match self.color.get(&alias) {
                    Some(c) => c.clone(),
                    None => continue,
                }
            };
            self.color.insert(reg, color);
        }
    }

    // --- Spill rewriting ---

    fn rewrite(&mut self) {
        for reg in self.spilled.clone() {
            if self.config.enable_addr_to_reg && self.try_rematerialize(&reg) {
                continue;
            }
            let slot = self.module.alloc_slot(self.func, 4);
            for inst in self.reg_defs.get(&reg).cloned().unwrap_or_default() {
                let fresh = self.module.new_vreg();
                self.module.set_operand(inst, 0, fresh.clone());
                let store = self.module.new_inst(
                    MOp::Sw,
                    &[fresh, Reg::Imm(slot.offset), slot.base.clone()],
                );
                self.module.insert_after(inst, store);
            }
            for inst in self.reg_uses.get(&reg).cloned().unwrap_or_default() {
                let fresh = self.module.new_vreg();
                let load = self.module.new_inst(
                    MOp::Lw,
                    &[fresh.clone(), Reg::Imm(slot.offset), slot.base.clone()],
                );
                self.module.insert_before(inst, load);
                let first = if self.module.inst(inst).no_def() { 0 } else { 1 };
                for i in first..self.module.inst(inst).operands.len() {
                    if *self.module.operand(inst, i) == reg {
                        self.module.set_operand(inst, i, fresh.clone());
                    }
                }
            }
        }
        self.spilled.clear();
        self.colored.clear();
        self.coalesced.clear();
    }

    /// A spill whose single definition is a pure `la`/`li` is recomputed at
    /// each use instead; `la` addresses fold straight into memory operands.
    fn try_rematerialize(&mut self, reg: &Reg) -> bool {
        let defs = self.reg_defs.get(reg).cloned().unwrap_or_default();
        if defs.len() != 1 {
            return false;
        }
        let def_inst = *defs.iter().next().expect("one definition");
        let def_op = self.module.inst(def_inst).op;
        if !matches!(def_op, MOp::La | MOp::Li) {
            return false;
        }
        let def_operands = self.module.inst(def_inst).operands.clone();
        if def_operands.iter().skip(1).any(Reg::is_virtual) {
            return false;
        }

        for inst in self.reg_uses.get(reg).cloned().unwrap_or_default() {
            let use_op = self.module.inst(inst).op;
            let foldable = def_op == MOp::La
                && matches!(use_op, MOp::Lw | MOp::Sw | MOp::La)
                && self.module.operand(inst, 1).imm() == 0;
            if foldable {
                self.module.set_operand(inst, 1, def_operands[1].clone());
                self.module.set_operand(inst, 2, def_operands[2].clone());
                continue;
            }
            let fresh = self.module.new_vreg();
            let copy = self.module.new_inst(
                def_op,
                &[fresh.clone(), def_operands[1].clone(), def_operands[2].clone()],
            );
            self.module.insert_before(inst, copy);
            let first = if self.module.inst(inst).no_def() { 0 } else { 1 };
            for i in first..self.module.inst(inst).operands.len() {
                if self.module.operand(inst, i) == reg {
                    self.module.set_operand(inst, i, fresh.clone());
                }
            }
        }
        self.module.remove_inst(def_inst);
        true
    }

    // --- Driver ---

    fn allocate(&mut self) {
        loop {
            self.analyse();
            self.build();
            loop {
                if !self.simplify_worklist.is_empty() {
                    self.simplify();
                } else if !self.worklist_moves.is_empty() {
                    self.coalesce();
                } else if !self.freeze_worklist.is_empty() {
                    self.freeze();
                } else if !self.spill_worklist.is_empty() {
                    self.select_spill();
                } else {
                    break;
                }
            }
            self.assign_colors();
            if self.spilled.is_empty() {
                break;
            }
            log::debug!(
                "{}: spilling {} registers, retrying",
                self.module.func(self.func).name,
                self.spilled.len()
            );
            self.rewrite();
        }
    }

    fn replace_regs(&mut self) {
        for block in self.module.func(self.func).blocks.clone() {
            for inst in self.module.block(block).insts.clone() {
                for i in 0..self.module.inst(inst).operands.len() {
                    let operand = self.module.operand(inst, i).clone();
                    if !operand.is_virtual() {
                        continue;
                    }
                    let color = self
                        .color
                        .get(&operand)
                        .cloned()
                        .expect("virtual register was colored");
                    self.module.set_operand(inst, i, color);
                }
            }
        }
        for m in self.coalesced_moves.clone() {
            self.module.remove_inst(m);
        }
    }

    /// Save assigned callee-saved registers in the prologue and restore
    /// them before each return; `main` never returns, so it saves nothing.
    fn callee_saved(&mut self) {
        let mut saved: RegSet = self
            .colored
            .iter()
            .filter_map(|reg| self.color.get(reg).cloned())
            .collect();
        if self.func != self.main {
            for temp in TEMP_REGS {
                saved.remove(&Reg::Phys(temp));
            }
        } else {
            for avail in AVAIL_REGS {
                saved.remove(&Reg::Phys(avail));
            }
        }
        if saved.is_empty() {
            return;
        }

        let entry = self.module.func(self.func).blocks[0];
        let first = *self
            .module
            .block(entry)
            .insts
            .first()
            .expect("entry block is non-empty");
        let mut slots: BTreeMap<Reg, crate::mips::MAddr> = BTreeMap::new();
        for reg in saved.iter() {
            let slot = self.module.alloc_slot(self.func, 4);
            let store = self.module.new_inst(
                MOp::Sw,
                &[reg.clone(), Reg::Imm(slot.offset), slot.base.clone()],
            );
            self.module.insert_after(first, store);
            slots.insert(reg.clone(), slot);
        }
        for block in self.module.func(self.func).blocks.clone() {
            for inst in self.module.block(block).insts.clone() {
                if self.module.inst(inst).op != MOp::Jr {
                    continue;
                }
                for reg in saved.iter() {
                    let slot = &slots[reg];
                    let load = self.module.new_inst(
                        MOp::Lw,
                        &[reg.clone(), Reg::Imm(slot.offset), slot.base.clone()],
                    );
                    self.module.insert_before(inst, load);
                }
            }
        }
    }
}
