//! Intermediate Representation
//!
//! A typed SSA graph: a `Module` owns globals and functions, functions own
//! basic blocks, blocks own instructions, and every operand edge from an
//! instruction to a value is mirrored in the value's use list. The graph is
//! stored as arenas with stable indices; nodes are never reclaimed during a
//! compilation, only marked removed, so ids held by passes stay valid.
//!
//! Conventions inherited by every pass:
//!
//! - Operand 0 of an instruction is the value it defines, unless the
//!   instruction's `no_def` flag is set (stores, void calls, branches).
//! - A use is a `(instruction, operand index)` pair; all operand writes go
//!   through the `Module` methods below, which keep both sides of the edge
//!   consistent.
//! - Every block ends in exactly one terminator; phis sit at the head of
//!   their block with one `(value, predecessor)` pair per predecessor.
//! - Literal operands are fresh value nodes per occurrence.
//! - The function list keeps `main` last; the four I/O intrinsics are
//!   declared, `reserved`, and never optimized.

pub mod builder;
pub mod display;
pub mod types;

use crate::ir::types::{BaseType, ValueType};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarInitId(pub u32);

/// One operand edge, identified from the value's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub inst: InstId,
    pub index: usize,
}

/// What a value is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// An SSA register: an instruction result or a function parameter.
    Reg,
    /// An integer literal operand.
    Literal(i32),
    /// A string literal (interned printf segment).
    Str(String),
    /// A basic block used as a branch target or phi predecessor, and the
    /// block's printable label.
    Label(BlockId),
    /// A function used as a call target.
    Func(FuncId),
    /// The addressable token of a global variable.
    Global(GlobalId),
}

#[derive(Debug, Clone)]
pub struct ValueData {
    pub kind: ValueKind,
    pub ty: ValueType,
    /// Symbolic name for globals and functions (`@name`), empty otherwise.
    pub name: String,
    pub uses: Vec<Use>,
    /// Per-function sequential number assigned by the register labeller;
    /// `None` for values that are not registers (literals, labels, globals).
    pub reg_id: Option<u32>,
}

/// Comparison condition of an `icmp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcmpCond {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IcmpCond {
    pub fn eval(self, a: i32, b: i32) -> i32 {
        let r = match self {
            IcmpCond::Eq => a == b,
            IcmpCond::Ne => a != b,
            IcmpCond::Sgt => a > b,
            IcmpCond::Sge => a >= b,
            IcmpCond::Slt => a < b,
            IcmpCond::Sle => a <= b,
        };
        r as i32
    }
}

/// Instruction opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
    Icmp(IcmpCond),
    Call,
    Alloca,
    Load,
    Store,
    GetPtr,
    Phi,
    Zext,
    Trunc,
    Jump,
    Branch,
    Ret,
}

impl Opcode {
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Branch | Opcode::Ret)
    }

    pub fn is_icmp(self) -> bool {
        matches!(self, Opcode::Icmp(_))
    }
}

#[derive(Debug, Clone)]
pub struct InstData {
    pub op: Opcode,
    /// Primary type (result type for arithmetic, stored type for memory).
    pub ty: ValueType,
    /// Secondary type: zext/trunc target type, getelementptr pointer type.
    pub ty2: Option<ValueType>,
    pub operands: SmallVec<[ValueId; 4]>,
    pub block: BlockId,
    pub no_def: bool,
    pub removed: bool,
    /// Source variable behind an `alloca` (initializer data for the array
    /// scalarizer and the global localizer).
    pub var: Option<VarInitId>,
}

impl InstData {
    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }

    /// The value defined by this instruction, if any.
    pub fn def(&self) -> Option<ValueId> {
        if self.no_def || self.is_terminator() {
            None
        } else {
            self.operands.first().copied()
        }
    }

    /// Index of the first non-def operand.
    pub fn first_use_index(&self) -> usize {
        if self.no_def || self.is_terminator() {
            0
        } else {
            1
        }
    }
}

/// Flattened initializer data of a declared variable, carried by allocas
/// and globals.
#[derive(Debug, Clone)]
pub struct VarInit {
    pub name: String,
    pub ty: ValueType,
    /// Every element is compile-time known.
    pub init: bool,
    pub zero_init: bool,
    /// Row-major initializer values, zero padded.
    pub values: Vec<i32>,
}

impl VarInit {
    pub fn value_at(&self, index: usize) -> i32 {
        self.values.get(index).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct BlockData {
    pub func: FuncId,
    pub insts: Vec<InstId>,
    pub preds: SmallVec<[BlockId; 2]>,
    pub succs: SmallVec<[BlockId; 2]>,
    /// The block as a branch-target value.
    pub value: ValueId,
    /// The block's printable label value (numbered by the labeller).
    pub label: ValueId,
    pub removed: bool,
}

#[derive(Debug, Clone)]
pub struct FuncData {
    pub name: String,
    /// Return type.
    pub ty: ValueType,
    pub value: ValueId,
    pub params: Vec<ValueId>,
    pub blocks: Vec<BlockId>,
    /// Declared-only intrinsic; never visited by passes.
    pub reserved: bool,
    /// Call-graph edges, rebuilt by the CFG builder.
    pub callees: Vec<FuncId>,
    pub callers: Vec<FuncId>,
    pub removed: bool,
}

/// Initializer of a global.
#[derive(Debug, Clone)]
pub enum GlobalInit {
    Var(VarInitId),
    Str(ValueId),
}

#[derive(Debug, Clone)]
pub struct GlobalData {
    pub name: String,
    pub ty: ValueType,
    /// The addressable token other code refers to.
    pub value: ValueId,
    pub init: GlobalInit,
    pub removed: bool,
}

/// A compilation unit in SSA form.
#[derive(Debug)]
pub struct Module {
    pub values: Vec<ValueData>,
    pub inst_arena: Vec<InstData>,
    pub block_arena: Vec<BlockData>,
    pub func_arena: Vec<FuncData>,
    pub global_arena: Vec<GlobalData>,
    pub var_inits: Vec<VarInit>,

    /// Ordered globals.
    pub globals: Vec<GlobalId>,
    /// Ordered functions; `main` is last.
    pub funcs: Vec<FuncId>,

    /// Set by every rewriting pass; drives the fixpoint loop.
    pub changed: bool,

    pub getint: FuncId,
    pub putint: FuncId,
    pub putch: FuncId,
    pub putstr: FuncId,
}

impl Module {
    pub fn new() -> Self {
        let mut module = Self {
            values: Vec::new(),
            inst_arena: Vec::new(),
            block_arena: Vec::new(),
            func_arena: Vec::new(),
            global_arena: Vec::new(),
            var_inits: Vec::new(),
            globals: Vec::new(),
            funcs: Vec::new(),
            changed: false,
            getint: FuncId(0),
            putint: FuncId(0),
            putch: FuncId(0),
            putstr: FuncId(0),
        };

        module.getint = module.new_func("@getint", ValueType::int(), true);
        module.putint = module.new_func("@putint", ValueType::int(), true);
        let p = module.new_value(ValueKind::Reg, ValueType::int());
        module.func_mut(module.putint).params.push(p);
        module.putch = module.new_func("@putch", ValueType::int(), true);
        let p = module.new_value(ValueKind::Reg, ValueType::int());
        module.func_mut(module.putch).params.push(p);
        module.putstr = module.new_func("@putstr", ValueType::void(), true);
        let p = module.new_value(ValueKind::Reg, ValueType::byte_pointer());
        module.func_mut(module.putstr).params.push(p);

        module
    }

    /// The four declared-only I/O intrinsics.
    pub fn intrinsics(&self) -> [FuncId; 4] {
        [self.getint, self.putint, self.putch, self.putstr]
    }

    /// `main` is kept last in the function order.
    pub fn main_func(&self) -> FuncId {
        *self.funcs.last().expect("module has no functions")
    }

    // --- Accessors ---

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.0 as usize]
    }

    pub fn inst(&self, id: InstId) -> &InstData {
        &self.inst_arena[id.0 as usize]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut InstData {
        &mut self.inst_arena[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.block_arena[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BlockData {
        &mut self.block_arena[id.0 as usize]
    }

    pub fn func(&self, id: FuncId) -> &FuncData {
        &self.func_arena[id.0 as usize]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut FuncData {
        &mut self.func_arena[id.0 as usize]
    }

    pub fn global(&self, id: GlobalId) -> &GlobalData {
        &self.global_arena[id.0 as usize]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut GlobalData {
        &mut self.global_arena[id.0 as usize]
    }

    pub fn var_init(&self, id: VarInitId) -> &VarInit {
        &self.var_inits[id.0 as usize]
    }

    pub fn add_var_init(&mut self, var: VarInit) -> VarInitId {
        let id = VarInitId(self.var_inits.len() as u32);
        self.var_inits.push(var);
        id
    }

    /// Operand `index` of an instruction.
    pub fn operand(&self, inst: InstId, index: usize) -> ValueId {
        self.inst(inst).operands[index]
    }

    // --- Value creation ---

    pub fn new_value(&mut self, kind: ValueKind, ty: ValueType) -> ValueId {
        let reg_id = match kind {
            ValueKind::Reg => Some(0),
            _ => None,
        };
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData {
            kind,
            ty,
            name: String::new(),
            uses: Vec::new(),
            reg_id,
        });
        id
    }

    pub fn new_reg(&mut self, ty: ValueType) -> ValueId {
        self.new_value(ValueKind::Reg, ty)
    }

    /// A fresh literal node. Literals are not interned; each operand
    /// occurrence gets its own node.
    pub fn new_literal(&mut self, value: i32) -> ValueId {
        self.new_value(ValueKind::Literal(value), ValueType::int())
    }

    pub fn new_str_literal(&mut self, text: &str) -> ValueId {
        let mut ty = ValueType::scalar(BaseType::I8);
        ty.push_dim(text.len() as i32 + 1);
        self.new_value(ValueKind::Str(text.to_string()), ty)
    }

    pub fn is_const(&self, v: ValueId) -> bool {
        matches!(
            self.value(v).kind,
            ValueKind::Literal(_) | ValueKind::Str(_)
        )
    }

    pub fn const_value(&self, v: ValueId) -> i32 {
        match self.value(v).kind {
            ValueKind::Literal(n) => n,
            _ => 0,
        }
    }

    /// The block behind a label value.
    pub fn as_block(&self, v: ValueId) -> BlockId {
        match self.value(v).kind {
            ValueKind::Label(block) => block,
            _ => panic!("value is not a block label"),
        }
    }

    /// The function behind a function value.
    pub fn as_func(&self, v: ValueId) -> FuncId {
        match self.value(v).kind {
            ValueKind::Func(func) => func,
            _ => panic!("value is not a function"),
        }
    }

    // --- Function / block / global creation ---

    pub fn new_func(&mut self, name: &str, ret_ty: ValueType, reserved: bool) -> FuncId {
        let id = FuncId(self.func_arena.len() as u32);
        let value = self.new_value(ValueKind::Func(id), ret_ty.clone());
        self.value_mut(value).name = name.to_string();
        self.func_arena.push(FuncData {
            name: name.to_string(),
            ty: ret_ty,
            value,
            params: Vec::new(),
            blocks: Vec::new(),
            reserved,
            callees: Vec::new(),
            callers: Vec::new(),
            removed: false,
        });
        id
    }

    pub fn append_func(&mut self, func: FuncId) {
        self.funcs.push(func);
    }

    pub fn remove_func(&mut self, func: FuncId) {
        self.funcs.retain(|&f| f != func);
        self.func_mut(func).removed = true;
    }

    fn alloc_block(&mut self, func: FuncId) -> BlockId {
        let id = BlockId(self.block_arena.len() as u32);
        let value = self.new_value(ValueKind::Label(id), ValueType::void());
        let label = self.new_value(ValueKind::Label(id), ValueType::void());
        self.value_mut(label).reg_id = Some(0);
        self.block_arena.push(BlockData {
            func,
            insts: Vec::new(),
            preds: SmallVec::new(),
            succs: SmallVec::new(),
            value,
            label,
            removed: false,
        });
        id
    }

    /// Append a fresh block at the end of `func`.
    pub fn append_block(&mut self, func: FuncId) -> BlockId {
        let block = self.alloc_block(func);
        self.func_mut(func).blocks.push(block);
        block
    }

    /// Insert a fresh block right after `target` in `func`'s block order.
    pub fn insert_block_after(&mut self, func: FuncId, target: BlockId) -> BlockId {
        let block = self.alloc_block(func);
        let pos = self
            .func(func)
            .blocks
            .iter()
            .position(|&b| b == target)
            .expect("target block not in function");
        self.func_mut(func).blocks.insert(pos + 1, block);
        block
    }

    pub fn remove_block(&mut self, func: FuncId, block: BlockId) {
        self.func_mut(func).blocks.retain(|&b| b != block);
        self.block_mut(block).removed = true;
    }

    /// Remove every instruction of a block, clearing its operand edges.
    pub fn destroy_block(&mut self, block: BlockId) {
        for inst in self.block(block).insts.clone() {
            self.remove_inst(inst);
        }
    }

    pub fn new_global(
        &mut self,
        name: &str,
        ty: ValueType,
        init: GlobalInit,
    ) -> GlobalId {
        let id = GlobalId(self.global_arena.len() as u32);
        let value = self.new_value(ValueKind::Global(id), ty.clone());
        self.value_mut(value).name = name.to_string();
        self.global_arena.push(GlobalData {
            name: name.to_string(),
            ty,
            value,
            init,
            removed: false,
        });
        self.globals.push(id);
        id
    }

    pub fn remove_global(&mut self, global: GlobalId) {
        self.globals.retain(|&g| g != global);
        self.global_mut(global).removed = true;
    }

    // --- Instruction creation and operand maintenance ---

    /// Create a detached instruction, registering every operand use.
    pub fn new_inst(
        &mut self,
        op: Opcode,
        ty: ValueType,
        no_def: bool,
        operands: &[ValueId],
    ) -> InstId {
        let id = InstId(self.inst_arena.len() as u32);
        self.inst_arena.push(InstData {
            op,
            ty,
            ty2: None,
            operands: SmallVec::from_slice(operands),
            block: BlockId(u32::MAX),
            no_def,
            removed: false,
            var: None,
        });
        for (index, &value) in operands.iter().enumerate() {
            self.value_mut(value).uses.push(Use { inst: id, index });
        }
        id
    }

    /// Clone an instruction (detached), re-registering its operand uses.
    pub fn copy_inst(&mut self, inst: InstId) -> InstId {
        let data = self.inst(inst).clone();
        let id = self.new_inst(data.op, data.ty.clone(), data.no_def, &data.operands);
        self.inst_mut(id).ty2 = data.ty2;
        self.inst_mut(id).var = data.var;
        id
    }

    pub fn append_inst(&mut self, block: BlockId, inst: InstId) {
        self.inst_mut(inst).block = block;
        self.block_mut(block).insts.push(inst);
    }

    pub fn prepend_inst(&mut self, block: BlockId, inst: InstId) {
        self.inst_mut(inst).block = block;
        self.block_mut(block).insts.insert(0, inst);
    }

    fn inst_pos(&self, block: BlockId, inst: InstId) -> usize {
        self.block(block)
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not in block")
    }

    /// Insert `inst` before `target` (which must be attached).
    pub fn insert_before(&mut self, target: InstId, inst: InstId) {
        let block = self.inst(target).block;
        let pos = self.inst_pos(block, target);
        self.inst_mut(inst).block = block;
        self.block_mut(block).insts.insert(pos, inst);
    }

    /// Insert `inst` after `target` (which must be attached).
    pub fn insert_after(&mut self, target: InstId, inst: InstId) {
        let block = self.inst(target).block;
        let pos = self.inst_pos(block, target);
        self.inst_mut(inst).block = block;
        self.block_mut(block).insts.insert(pos + 1, inst);
    }

    /// Detach and clear an instruction. Its arena slot stays valid but
    /// `removed` is set and all its operand edges are dropped.
    pub fn remove_inst(&mut self, inst: InstId) {
        if self.inst(inst).removed {
            return;
        }
        for index in 0..self.inst(inst).operands.len() {
            let value = self.inst(inst).operands[index];
            self.unregister_use(value, inst, index);
        }
        let block = self.inst(inst).block;
        if block.0 != u32::MAX {
            self.block_mut(block).insts.retain(|&i| i != inst);
        }
        self.inst_mut(inst).removed = true;
    }

    /// Replace `old` in place with the detached `new`: insert after, remove.
    pub fn replace_inst(&mut self, old: InstId, new: InstId) {
        self.insert_after(old, new);
        self.remove_inst(old);
    }

    fn unregister_use(&mut self, value: ValueId, inst: InstId, index: usize) {
        let uses = &mut self.value_mut(value).uses;
        if let Some(pos) = uses
            .iter()
            .position(|u| u.inst == inst && u.index == index)
        {
            uses.remove(pos);
        }
    }

    /// Point operand `index` of `inst` at `value`, updating both use lists.
    pub fn set_operand(&mut self, inst: InstId, index: usize, value: ValueId) {
        let old = self.inst(inst).operands[index];
        if old == value {
            return;
        }
        self.unregister_use(old, inst, index);
        self.inst_mut(inst).operands[index] = value;
        self.value_mut(value).uses.push(Use { inst, index });
    }

    /// Append an operand to `inst`.
    pub fn add_operand(&mut self, inst: InstId, value: ValueId) {
        let index = self.inst(inst).operands.len();
        self.inst_mut(inst).operands.push(value);
        self.value_mut(value).uses.push(Use { inst, index });
    }

    /// Remove operand `index`, shifting later operands down and renumbering
    /// their use records.
    pub fn remove_operand(&mut self, inst: InstId, index: usize) {
        let value = self.inst(inst).operands[index];
        self.unregister_use(value, inst, index);
        self.inst_mut(inst).operands.remove(index);
        let len = self.inst(inst).operands.len();
        for i in index..len {
            let v = self.inst(inst).operands[i];
            for u in self.value_mut(v).uses.iter_mut() {
                if u.inst == inst && u.index == i + 1 {
                    u.index = i;
                    break;
                }
            }
        }
    }

    /// Swap two operands, fixing their use records.
    pub fn swap_operands(&mut self, inst: InstId, i: usize, j: usize) {
        let (a, b) = (self.inst(inst).operands[i], self.inst(inst).operands[j]);
        self.inst_mut(inst).operands.swap(i, j);
        for u in self.value_mut(a).uses.iter_mut() {
            if u.inst == inst && u.index == i {
                u.index = j;
                break;
            }
        }
        for u in self.value_mut(b).uses.iter_mut() {
            if u.inst == inst && u.index == j {
                u.index = i;
                break;
            }
        }
    }

    /// Rewrite every use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let uses = self.value(old).uses.clone();
        for u in uses {
            self.set_operand(u.inst, u.index, new);
        }
    }

    /// The instruction defining `value`: the one using it at operand 0 as a
    /// def. `None` for parameters, literals, labels, and globals.
    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        self.value(value).reg_id?;
        for u in self.value(value).uses.iter() {
            if u.index != 0 {
                continue;
            }
            let inst = self.inst(u.inst);
            if inst.removed || inst.no_def || inst.is_terminator() {
                continue;
            }
            return Some(u.inst);
        }
        None
    }

    // --- Phi and CFG edge helpers ---

    /// The `(value, predecessor block)` pairs of a phi.
    pub fn phi_pairs(&self, phi: InstId) -> Vec<(ValueId, BlockId)> {
        let data = self.inst(phi);
        let mut pairs = Vec::new();
        let mut i = 1;
        while i + 1 < data.operands.len() {
            pairs.push((data.operands[i], self.as_block(data.operands[i + 1])));
            i += 2;
        }
        pairs
    }

    /// Drop the `(value, from)` pair of every phi at the head of `block`.
    pub fn remove_phi_entry(&mut self, block: BlockId, from: BlockId) {
        for inst in self.block(block).insts.clone() {
            if self.inst(inst).op != Opcode::Phi {
                break;
            }
            let mut target = None;
            let mut i = 1;
            while i + 1 < self.inst(inst).operands.len() {
                let label = self.inst(inst).operands[i + 1];
                if self.as_block(label) == from {
                    target = Some(i);
                    break;
                }
                i += 2;
            }
            if let Some(i) = target {
                self.remove_operand(inst, i + 1);
                self.remove_operand(inst, i);
            }
        }
    }

    pub fn add_cfg_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succs.push(to);
        self.block_mut(to).preds.push(from);
    }

    pub fn remove_cfg_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succs.retain(|b| *b != to);
        self.block_mut(to).preds.retain(|b| *b != from);
    }

    /// The terminator of a block, if the block is non-empty and terminated.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let &last = self.block(block).insts.last()?;
        if self.inst(last).is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    /// Build an unconditional or conditional branch; a conditional branch
    /// whose arms agree degrades to a jump.
    pub fn new_branch(
        &mut self,
        cond: Option<ValueId>,
        true_target: ValueId,
        false_target: Option<ValueId>,
    ) -> InstId {
        match (cond, false_target) {
            (Some(cond), Some(false_target)) if true_target != false_target => self.new_inst(
                Opcode::Branch,
                ValueType::bool_ty(),
                true,
                &[cond, true_target, false_target],
            ),
            _ => self.new_inst(Opcode::Jump, ValueType::bool_ty(), true, &[true_target]),
        }
    }

    /// Build a getelementptr on `base`: pops a pointer pointee or prepends
    /// the leading zero index, and records the pointer result type.
    pub fn new_getptr(&mut self, result: ValueId, base: ValueId) -> InstId {
        let mut ty = self.value(base).ty.clone();
        let inst = self.new_inst(Opcode::GetPtr, ty.clone(), false, &[result, base]);
        if ty.is_pointer {
            ty.pop();
        } else {
            let zero = self.new_literal(0);
            self.add_operand(inst, zero);
        }
        self.inst_mut(inst).ty = ty.clone();
        self.inst_mut(inst).ty2 = Some(ty.to_pointer());
        inst
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}
