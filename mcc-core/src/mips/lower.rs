//! Machine-IR Lowering
//!
//! Translates the optimized IR into virtual-register MIPS, one function at
//! a time:
//!
//! - callers allocate their callees' frames (`$sp` adjusted by a frame-size
//!   pseudo-immediate around the call), `$fp` snapshots `$sp` at entry;
//! - the first four arguments travel in `$a0-$a3` and are copied into
//!   fresh virtuals at entry (the argument registers are clobbered by any
//!   call), remaining arguments use frame slots;
//! - `$ra` is saved to a slot only in functions that call non-intrinsics;
//! - each IR instruction selects its obvious MIPS form; comparisons become
//!   set-instructions, branches a `beq`-against-zero plus a jump, and the
//!   I/O intrinsics the canonical syscalls (read-int 5, print-int 1,
//!   print-char 11, print-str 4); `main` returns by exit syscall;
//! - getelementptr folds constant index contributions into the address
//!   offset and emits `mul`/`addu` chains for the rest; addresses of
//!   globals with enough weighted uses are materialized once with `la`;
//! - IR phis survive as machine phis until phi elimination.

use crate::analysis::LoopInfo;
use crate::config::Config;
use crate::ir::types::BaseType;
use crate::ir::{
    FuncId, GlobalId, GlobalInit, IcmpCond, InstId, Module, Opcode, ValueId, ValueKind,
};
use crate::mips::{
    MAddr, MBlockId, MFuncId, MGlobalData, MModule, MOp, PhysReg, Reg, A0, FP, RA, SP, V0, ZERO,
};
use std::collections::HashMap;

const ARG_REGS: [PhysReg; 4] = [PhysReg::A0, PhysReg::A1, PhysReg::A2, PhysReg::A3];

fn is_16_bits(value: i32) -> bool {
    (-32768..32768).contains(&value)
}

/// Lowering state for one module.
pub struct MipsLowering<'a> {
    ir: &'a Module,
    loops: &'a LoopInfo,
    config: &'a Config,
    pub mmodule: MModule,

    value_reg: HashMap<ValueId, Reg>,
    const_reg: HashMap<ValueId, Reg>,
    /// `li`-materialized constants, cached per block: a folded literal node
    /// can be shared by uses in several blocks, and a register loaded in
    /// one block must not leak into another it does not dominate.
    const_li: HashMap<(MBlockId, ValueId), Reg>,
    value_addr: HashMap<ValueId, MAddr>,
    pointer_addr: HashMap<ValueId, MAddr>,
    func_map: HashMap<FuncId, MFuncId>,

    ir_main: FuncId,
    cur_ir_func: FuncId,
    cur_func: MFuncId,
    cur_block: MBlockId,
    has_call: bool,
}

impl<'a> MipsLowering<'a> {
    pub fn lower(ir: &'a Module, loops: &'a LoopInfo, config: &'a Config) -> MModule {
        let first_vreg = ir.values.len() as u32;
        let ir_main = ir.main_func();
        let mut lowering = MipsLowering {
            ir,
            loops,
            config,
            mmodule: MModule::new(first_vreg),
            value_reg: HashMap::new(),
            const_reg: HashMap::new(),
            const_li: HashMap::new(),
            value_addr: HashMap::new(),
            pointer_addr: HashMap::new(),
            func_map: HashMap::new(),
            ir_main,
            cur_ir_func: ir_main,
            cur_func: MFuncId(0),
            cur_block: MBlockId(0),
            has_call: false,
        };
        for &global in ir.globals.iter() {
            lowering.lower_global(global);
        }
        for &func in ir.funcs.iter() {
            if !ir.func(func).reserved {
                lowering.lower_func(func);
            }
        }
        lowering.mmodule
    }

    fn emit(&mut self, op: MOp, operands: &[Reg]) -> crate::mips::MInstId {
        let inst = self.mmodule.new_inst(op, operands);
        self.mmodule.append_inst(self.cur_block, inst);
        inst
    }

    // --- Value mapping ---

    fn set_reg(&mut self, value: ValueId, reg: Reg) {
        self.value_reg.insert(value, reg);
    }

    /// The register holding a value, loading or materializing it when the
    /// value lives in a frame slot or is a known address.
    fn get_reg(&mut self, value: ValueId) -> Reg {
        if let Some(reg) = self.value_reg.get(&value) {
            return reg.clone();
        }
        if self.ir.is_const(value) {
            if self.ir.const_value(value) == 0 {
                self.value_reg.insert(value, ZERO);
                return ZERO;
            }
            let key = (self.cur_block, value);
            if let Some(reg) = self.const_li.get(&key) {
                return reg.clone();
            }
            let reg = self.mmodule.new_vreg();
            let imm = self.get_val_reg(value);
            self.emit(MOp::Li, &[reg.clone(), imm]);
            self.const_li.insert(key, reg.clone());
            return reg;
        }
        if let Some(addr) = self.value_addr.get(&value).cloned() {
            let reg = self.mmodule.new_vreg();
            self.emit(
                MOp::Lw,
                &[reg.clone(), Reg::Imm(addr.offset), addr.base],
            );
            return reg;
        }
        if let Some(addr) = self.pointer_addr.get(&value).cloned() {
            let reg = self.mmodule.new_vreg();
            self.emit(
                MOp::La,
                &[reg.clone(), Reg::Imm(addr.offset), addr.base],
            );
            return reg;
        }
        let reg = Reg::Virt(value.0);
        self.value_reg.insert(value, reg.clone());
        reg
    }

    /// Like `get_reg` but constants stay immediates.
    fn get_val_reg(&mut self, value: ValueId) -> Reg {
        if let Some(reg) = self.const_reg.get(&value) {
            return reg.clone();
        }
        if self.ir.is_const(value) {
            let reg = Reg::Imm(self.ir.const_value(value));
            self.const_reg.insert(value, reg.clone());
            return reg;
        }
        self.get_reg(value)
    }

    fn set_pointer(&mut self, value: ValueId, addr: MAddr) {
        if addr.offset == 0 && addr.base.is_virtual() {
            self.value_reg.insert(value, addr.base.clone());
        }
        self.pointer_addr.insert(value, addr);
    }

    fn get_pointer(&mut self, value: ValueId) -> MAddr {
        if let Some(addr) = self.pointer_addr.get(&value) {
            return addr.clone();
        }
        MAddr {
            base: self.get_reg(value),
            offset: 0,
        }
    }

    /// Canonical move; large immediates need `li`.
    fn emit_move(&mut self, dest: Reg, src: Reg) {
        if let Reg::Imm(v) = src {
            if !is_16_bits(v) {
                self.emit(MOp::Li, &[dest, src]);
                return;
            }
        }
        self.emit(MOp::Add, &[dest, ZERO, src]);
    }

    // --- Globals ---

    fn lower_global(&mut self, global: GlobalId) {
        let data = self.ir.global(global);
        let mut label: String = data.name[1..].to_string();
        let top_level = !label.contains('.');
        label = label.replace('.', "_");
        if top_level {
            label = format!("_toplevel_{}", label);
        }
        label.push_str("_global");

        let reg = Reg::Label(label.clone());
        match &data.init {
            GlobalInit::Str(value) => {
                let text = match &self.ir.value(*value).kind {
                    ValueKind::Str(s) => s.clone(),
                    _ => String::new(),
                };
                self.mmodule.datas.push(MGlobalData::Ascii { label, text });
            }
            GlobalInit::Var(var) => {
                if data.ty.base != BaseType::I32 {
                    return;
                }
                let init = self.ir.var_init(*var);
                let count = data.ty.element_count().max(0) as usize;
                let values = (0..count).map(|i| init.value_at(i)).collect();
                self.mmodule.datas.push(MGlobalData::Word {
                    label,
                    size: data.ty.size(),
                    zero: init.zero_init || !init.init,
                    values,
                });
            }
        }
        self.set_reg(data.value, reg);
    }

    // --- Functions ---

    fn lower_func(&mut self, func: FuncId) {
        let data = self.ir.func(func);
        let name = &data.name[1..];
        let mfunc = self.mmodule.new_func(name);
        self.func_map.insert(func, mfunc);
        self.cur_ir_func = func;
        self.cur_func = mfunc;
        self.has_call = data
            .callees
            .iter()
            .any(|&callee| !self.ir.func(callee).reserved);

        // Parameter homes: every parameter owns a frame slot (the caller
        // stored slots past the fourth), the first four also a register.
        let params = data.params.clone();
        for (i, &param) in params.iter().enumerate() {
            let slot = self.mmodule.alloc_slot(mfunc, 4);
            self.value_addr.insert(param, slot);
            if i < 4 {
                self.set_reg(param, Reg::Phys(ARG_REGS[i]));
            }
        }

        let entry_label = Reg::Label(format!("{}_entry", name));
        self.cur_block = self.mmodule.new_block(mfunc, entry_label.clone());
        self.set_reg(data.value, entry_label);

        self.emit_move(FP, SP);
        if self.has_call && func != self.ir_main {
            let slot = self.mmodule.alloc_slot(mfunc, 4);
            self.emit(MOp::Sw, &[RA, Reg::Imm(slot.offset), slot.base.clone()]);
            self.mmodule.func_mut(mfunc).ret_addr = Some(slot);
        }
        self.save_func_args(&params);

        for &block in self.ir.func(func).blocks.iter() {
            let label = Reg::Label(format!(
                "{}_block_{}",
                name,
                self.ir.block(block).value.0
            ));
            self.set_reg(self.ir.block(block).value, label.clone());
            self.set_reg(self.ir.block(block).label, label);
        }

        let first = self.ir.func(func).blocks[0];
        let target = self.get_reg(self.ir.block(first).value);
        self.emit(MOp::J, &[target]);

        for block in self.ir.func(func).blocks.clone() {
            self.lower_block(block);
        }
    }

    /// Copy incoming argument registers out of `$a0-$a3` (calls clobber
    /// them) and reload stack-passed parameters.
    fn save_func_args(&mut self, params: &[ValueId]) {
        for (i, &param) in params.iter().enumerate() {
            if i < 4 {
                if let Some(reg) = self.value_reg.get(&param).cloned() {
                    if matches!(reg, Reg::Phys(p) if ARG_REGS.contains(&p)) {
                        let copy = self.mmodule.new_vreg();
                        self.emit_move(copy.clone(), reg);
                        self.set_reg(param, copy);
                    }
                }
            } else {
                let addr = self.value_addr[&param].clone();
                let copy = self.mmodule.new_vreg();
                self.emit(MOp::Lw, &[copy.clone(), Reg::Imm(addr.offset), addr.base]);
                self.set_reg(param, copy);
            }
        }
    }

    fn lower_block(&mut self, block: crate::ir::BlockId) {
        let label = self.get_reg(self.ir.block(block).value);
        self.cur_block = self.mmodule.new_block(self.cur_func, label);
        let depth = self.loops.loop_depth(block);
        self.mmodule.block_mut(self.cur_block).loop_depth = depth;
        for inst in self.ir.block(block).insts.clone() {
            self.lower_inst(inst);
        }
    }

    fn lower_inst(&mut self, inst: InstId) {
        let data = self.ir.inst(inst);
        let ops = data.operands.clone();
        match data.op {
            Opcode::Add => self.lower_bin(MOp::Addu, &ops),
            Opcode::Sub => self.lower_bin(MOp::Subu, &ops),
            Opcode::Mul => self.lower_bin(MOp::Mul, &ops),
            Opcode::Sdiv => self.lower_bin(MOp::Div, &ops),
            Opcode::Srem => self.lower_bin(MOp::Rem, &ops),
            Opcode::Icmp(cond) => self.lower_icmp(cond, &ops),
            Opcode::Call => self.lower_call(inst),
            Opcode::Alloca => {
                let size = self.ir.inst(inst).ty.size();
                let slot = self.mmodule.alloc_slot(self.cur_func, size);
                self.set_pointer(ops[0], slot);
            }
            Opcode::Load => {
                let addr = self.get_pointer(ops[1]);
                let dest = self.get_reg(ops[0]);
                self.emit(MOp::Lw, &[dest, Reg::Imm(addr.offset), addr.base]);
            }
            Opcode::Store => {
                let addr = self.get_pointer(ops[1]);
                let src = self.get_reg(ops[0]);
                self.emit(MOp::Sw, &[src, Reg::Imm(addr.offset), addr.base]);
            }
            Opcode::GetPtr => self.lower_getptr(inst),
            Opcode::Phi => {
                let dest = self.get_reg(ops[0]);
                let mut operands = vec![dest];
                for &op in ops.iter().skip(1) {
                    operands.push(self.get_val_reg(op));
                }
                self.emit(MOp::Phi, &operands);
            }
            Opcode::Zext | Opcode::Trunc => {
                // i32 <-> i1 conversions are register-level no-ops.
                let src = self.get_reg(ops[1]);
                self.set_reg(ops[0], src);
            }
            Opcode::Jump => {
                let target = self.get_reg(ops[0]);
                self.emit(MOp::J, &[target]);
            }
            Opcode::Branch => {
                let cond = self.get_reg(ops[0]);
                let false_target = self.get_reg(ops[2]);
                self.emit(MOp::Beq, &[cond, ZERO, false_target]);
                let true_target = self.get_reg(ops[1]);
                self.emit(MOp::J, &[true_target]);
            }
            Opcode::Ret => self.lower_ret(inst),
        }
    }

    fn lower_bin(&mut self, op: MOp, ops: &[ValueId]) {
        let dest = self.get_reg(ops[0]);
        let a = self.get_reg(ops[1]);
        let b = self.get_val_reg(ops[2]);
        self.emit(op, &[dest, a, b]);
    }

    fn lower_icmp(&mut self, cond: IcmpCond, ops: &[ValueId]) {
        let dest = self.get_reg(ops[0]);
        let a = self.get_reg(ops[1]);
        match cond {
            IcmpCond::Eq => {
                let b = self.get_val_reg(ops[2]);
                self.emit(MOp::Seq, &[dest, a, b]);
            }
            IcmpCond::Ne => {
                let b = self.get_val_reg(ops[2]);
                self.emit(MOp::Sne, &[dest, a, b]);
            }
            IcmpCond::Sgt => {
                let b = self.get_val_reg(ops[2]);
                self.emit(MOp::Sgt, &[dest, a, b]);
            }
            IcmpCond::Sge => {
                let b = self.get_val_reg(ops[2]);
                self.emit(MOp::Sge, &[dest, a, b]);
            }
            IcmpCond::Slt => {
                // `slt` has no pseudo expansion; keep 16-bit immediates in
                // `slti`, everything else in registers.
                if self.ir.is_const(ops[2]) && is_16_bits(self.ir.const_value(ops[2])) {
                    let b = self.get_val_reg(ops[2]);
                    self.emit(MOp::Slti, &[dest, a, b]);
                } else {
                    let b = self.get_reg(ops[2]);
                    self.emit(MOp::Slt, &[dest, a, b]);
                }
            }
            IcmpCond::Sle => {
                let b = self.get_val_reg(ops[2]);
                self.emit(MOp::Sle, &[dest, a, b]);
            }
        }
    }

    fn lower_call(&mut self, inst: InstId) {
        let data = self.ir.inst(inst);
        let no_def = data.no_def;
        let ops = data.operands.clone();
        let offset = if no_def { 1 } else { 2 };
        let callee = self.ir.as_func(ops[offset - 1]);

        // Intrinsics lower to syscalls.
        if callee == self.ir.getint {
            self.emit_move(V0, Reg::Imm(5));
            self.emit(MOp::Syscall, &[]);
            let dest = self.get_reg(ops[0]);
            self.emit_move(dest, V0);
            return;
        }
        if callee == self.ir.putint || callee == self.ir.putch || callee == self.ir.putstr {
            let code = if callee == self.ir.putint {
                1
            } else if callee == self.ir.putch {
                11
            } else {
                4
            };
            self.emit_move(V0, Reg::Imm(code));
            let arg = self.get_val_reg(ops[offset]);
            self.emit_move(A0, arg);
            self.emit(MOp::Syscall, &[]);
            return;
        }

        let param_cnt = ops.len() - offset;
        let mut params = Vec::with_capacity(param_cnt);
        for i in 0..param_cnt {
            let param = if i < 4 {
                self.get_val_reg(ops[i + offset])
            } else {
                self.get_reg(ops[i + offset])
            };
            params.push(param);
        }

        let mcallee = self.func_map[&callee];
        self.emit(
            MOp::Add,
            &[
                SP,
                SP,
                Reg::FrameSize {
                    func: mcallee.0,
                    pop: false,
                },
            ],
        );
        for (i, param) in params.into_iter().enumerate() {
            if i < 4 {
                self.emit_move(Reg::Phys(ARG_REGS[i]), param);
            } else {
                self.emit(MOp::Sw, &[param, Reg::Imm(4 * i as i32), SP]);
            }
        }
        let target = self.get_reg(self.ir.func(callee).value);
        self.emit(MOp::Jal, &[target]);
        self.emit(
            MOp::Add,
            &[
                SP,
                SP,
                Reg::FrameSize {
                    func: mcallee.0,
                    pop: true,
                },
            ],
        );
        self.emit_move(FP, SP);
        if !no_def {
            let dest = self.get_reg(ops[0]);
            self.emit_move(dest, V0);
        }
    }

    fn lower_getptr(&mut self, inst: InstId) {
        let data = self.ir.inst(inst);
        let ops = data.operands.clone();
        let base_ty = data.ty.clone();

        let base = self.get_pointer(ops[1]);
        let mut addr = MAddr {
            base: base.base.clone(),
            offset: base.offset,
        };
        // Constant index contributions fold into the offset.
        let mut ty = base_ty.clone();
        for &op in ops.iter().skip(2) {
            if self.ir.is_const(op) {
                addr.offset += self.ir.const_value(op) * ty.size();
            }
            ty.pop();
        }
        // Variable contributions become mul/addu chains off a materialized
        // base.
        let mut ty = base_ty;
        let mut reg: Option<Reg> = None;
        for &op in ops.iter().skip(2) {
            if self.ir.is_const(op) {
                ty.pop();
                continue;
            }
            let base_reg = match reg.clone() {
                Some(r) => r,
                None => {
                    let r = self.mmodule.new_vreg();
                    self.emit(
                        MOp::La,
                        &[r.clone(), Reg::Imm(addr.offset), addr.base.clone()],
                    );
                    r
                }
            };
            let size = self.mmodule.new_vreg();
            let index = self.get_reg(op);
            self.emit(MOp::Mul, &[size.clone(), index, Reg::Imm(ty.size())]);
            let next = self.mmodule.new_vreg();
            self.emit(MOp::Addu, &[next.clone(), base_reg, size]);
            reg = Some(next);
            ty.pop();
        }
        if let Some(r) = reg {
            addr = MAddr { base: r, offset: 0 };
        }

        // Frequently used global addresses are worth a register.
        if self.config.enable_addr_to_reg && matches!(addr.base, Reg::Label(_)) {
            let def = ops[0];
            let my_depth = self.loops.loop_depth(self.ir.inst(inst).block);
            let mut weight: u32 = 0;
            for u in self.ir.value(def).uses.iter() {
                let user = self.ir.inst(u.inst);
                if !user.no_def && u.index == 0 {
                    continue;
                }
                if user.op == Opcode::GetPtr {
                    continue;
                }
                let use_depth = self.loops.loop_depth(user.block);
                let diff = use_depth.saturating_sub(my_depth).min(5);
                weight += 1 << (2 * diff);
            }
            if weight >= 8 {
                let r = self.mmodule.new_vreg();
                self.emit(
                    MOp::La,
                    &[r.clone(), Reg::Imm(addr.offset), addr.base.clone()],
                );
                addr = MAddr { base: r, offset: 0 };
            }
        }

        self.set_pointer(ops[0], addr);
    }

    fn lower_ret(&mut self, inst: InstId) {
        let data = self.ir.inst(inst);
        let ops = data.operands.clone();
        let in_main = self.cur_ir_func == self.ir_main;
        if in_main {
            self.emit_move(V0, Reg::Imm(10));
            self.emit(MOp::Syscall, &[]);
        }
        if self.has_call && !in_main {
            let slot = self
                .mmodule
                .func(self.cur_func)
                .ret_addr
                .clone()
                .expect("call-bearing function saved $ra");
            self.emit(MOp::Lw, &[RA, Reg::Imm(slot.offset), slot.base]);
        }
        if !ops.is_empty() {
            let value = self.get_val_reg(ops[0]);
            self.emit_move(V0, value);
        }
        self.emit(MOp::Jr, &[RA]);
    }
}
