//! IR Construction
//!
//! Walks the decorated AST bottom-up and emits SSA-with-alloca form: locals
//! live in stack slots accessed through `load`/`store`, file-scope and
//! `const` variables become module globals (local consts are hoisted under
//! mangled names), and expressions the semantic analyzer already folded are
//! emitted as literals without touching the instruction stream.
//!
//! Control flow lowers structurally: `if` and `for` allocate their blocks
//! up front and condition lowering threads true/false target blocks through
//! `&&`/`||` so short-circuit operators branch directly instead of
//! materializing booleans. `break`/`continue` jump to targets kept on an
//! implicit stack of saved fields.
//!
//! `printf` is decomposed into its literal segments and `%d` holes: short
//! segments become `putch` calls, longer ones are interned as `.ascii`
//! globals printed with `putstr`.

use crate::config::Config;
use crate::frontend::ast::*;
use crate::frontend::symbol::SymbolTable;
use crate::ir::types::ValueType;
use crate::ir::{
    FuncId, GlobalInit, IcmpCond, InstId, Module, Opcode, ValueId, VarInit,
};

/// AST-to-IR lowering state.
pub struct IrBuilder<'a> {
    pub module: Module,
    table: &'a mut SymbolTable,
    config: &'a Config,

    cur_func: Option<FuncId>,
    cur_block: Option<crate::ir::BlockId>,

    /// Branch targets threaded through short-circuit condition lowering
    /// (block values).
    true_target: Option<ValueId>,
    false_target: Option<ValueId>,

    /// Innermost loop exits for `break`/`continue`.
    break_target: Option<ValueId>,
    continue_target: Option<ValueId>,

    printf_str_count: usize,
    const_count: usize,
}

impl<'a> IrBuilder<'a> {
    /// Lower a whole compilation unit.
    pub fn build(unit: &CompUnit, table: &'a mut SymbolTable, config: &'a Config) -> Module {
        let mut builder = IrBuilder {
            module: Module::new(),
            table,
            config,
            cur_func: None,
            cur_block: None,
            true_target: None,
            false_target: None,
            break_target: None,
            continue_target: None,
            printf_str_count: 0,
            const_count: 0,
        };
        builder.visit_unit(unit);
        builder.module
    }

    fn visit_unit(&mut self, unit: &CompUnit) {
        let intrinsics = self.module.intrinsics();
        for func in intrinsics {
            self.module.append_func(func);
        }
        for decl in unit.decls.iter() {
            self.visit_decl(decl, true);
        }
        for func in unit.funcs.iter() {
            self.visit_func(func);
        }
        if let Some(main) = unit.main.as_ref() {
            self.visit_func(main);
        }
    }

    // --- Emission helpers ---

    fn func(&self) -> FuncId {
        self.cur_func.expect("not inside a function")
    }

    /// Append to the current block, opening a fresh block when the current
    /// one is already terminated (code after `break`/`return`).
    fn emit(&mut self, inst: InstId) {
        let func = self.func();
        let mut block = match self.cur_block {
            Some(block) => block,
            None => {
                let block = self.module.append_block(func);
                self.cur_block = Some(block);
                block
            }
        };
        let terminated = self
            .module
            .terminator(block)
            .is_some();
        if terminated {
            block = self.module.insert_block_after(func, block);
            self.cur_block = Some(block);
        }
        self.module.append_inst(block, inst);
    }

    /// Allocate a block right after the current one.
    fn append_block(&mut self) -> crate::ir::BlockId {
        let func = self.func();
        let block = match self.cur_block {
            Some(block) => block,
            None => {
                let block = self.module.append_block(func);
                self.cur_block = Some(block);
                block
            }
        };
        self.module.insert_block_after(func, block)
    }

    fn block_value(&self, block: crate::ir::BlockId) -> ValueId {
        self.module.block(block).value
    }

    fn jump(&mut self, target: ValueId) {
        let inst = self.module.new_branch(None, target, None);
        self.emit(inst);
    }

    fn current_terminated(&self) -> bool {
        match self.cur_block {
            Some(block) => self.module.terminator(block).is_some(),
            None => false,
        }
    }

    // --- Declarations ---

    fn visit_decl(&mut self, decl: &Decl, at_global: bool) {
        for def in decl.defs.iter() {
            if !def.dummy {
                self.visit_var_def(def, at_global);
            }
        }
    }

    fn var_init_of(&self, def: &VarDef) -> VarInit {
        let var = self.table.var(def.var.expect("unresolved variable"));
        VarInit {
            name: var.name.clone(),
            ty: var.ty.clone(),
            init: var.init,
            zero_init: var.zero_init,
            values: var.init_values.clone(),
        }
    }

    fn visit_var_def(&mut self, def: &VarDef, at_global: bool) {
        let var_id = def.var.expect("unresolved variable");
        let var_ty = self.table.var(var_id).ty.clone();

        if def.is_const || at_global {
            // File-scope variables and all constants become globals; local
            // consts get a hoisted unique name.
            let name = if at_global {
                format!("@{}", self.table.var(var_id).name)
            } else {
                let n = self.const_count;
                self.const_count += 1;
                format!("@.const.{}.{}", n, self.table.var(var_id).name)
            };
            let init = self.var_init_of(def);
            let init_id = self.module.add_var_init(init);
            let global = self
                .module
                .new_global(&name, var_ty, GlobalInit::Var(init_id));
            let value = self.module.global(global).value;
            self.table.var_mut(var_id).ir_value = Some(value);
            return;
        }

        // Plain local: a stack slot at the current point.
        let reg = self.module.new_reg(var_ty.clone());
        let init = self.var_init_of(def);
        let init_id = self.module.add_var_init(init);
        let alloca = self
            .module
            .new_inst(Opcode::Alloca, var_ty, false, &[reg]);
        self.module.inst_mut(alloca).var = Some(init_id);
        self.emit(alloca);
        self.table.var_mut(var_id).ir_value = Some(reg);

        if let Some(init) = def.init.as_ref() {
            let mut path = Vec::new();
            self.store_init_val(init, reg, &mut path);
        }
    }

    /// Store an initializer into a fresh local, walking the brace nesting
    /// with the element path accumulated in `path`.
    fn store_init_val(&mut self, init: &InitVal, base: ValueId, path: &mut Vec<i32>) {
        match init {
            InitVal::List(items, _) => {
                for (dim, item) in items.iter().enumerate() {
                    path.push(dim as i32);
                    self.store_init_val(item, base, path);
                    path.pop();
                }
            }
            InitVal::Expr(expr) => {
                let value = self.lower_expr(expr);
                if path.is_empty() {
                    let store = self.module.new_inst(
                        Opcode::Store,
                        expr.ty.clone(),
                        true,
                        &[value, base],
                    );
                    self.emit(store);
                } else {
                    let addr = self.module.new_reg(expr.ty.clone());
                    let gep = self.module.new_getptr(addr, base);
                    for &dim in path.iter() {
                        let lit = self.module.new_literal(dim);
                        self.module.add_operand(gep, lit);
                    }
                    self.emit(gep);
                    let store = self.module.new_inst(
                        Opcode::Store,
                        expr.ty.clone(),
                        true,
                        &[value, addr],
                    );
                    self.emit(store);
                }
            }
        }
    }

    // --- Functions ---

    fn visit_func(&mut self, def: &FuncDef) {
        let sym_id = def.sym.expect("unresolved function");
        let name = format!("@{}", self.table.func(sym_id).name);
        let func = self.module.new_func(&name, def.ret_ty.clone(), false);
        self.module.append_func(func);
        self.table.func_mut(sym_id).ir_func = Some(func);

        self.cur_func = Some(func);
        self.cur_block = None;

        let param_ids: Vec<_> = self.table.func(sym_id).params.clone();
        for &var_id in param_ids.iter() {
            let ty = self.table.var(var_id).ty.clone();
            let param = self.module.new_reg(ty.clone());
            self.module.func_mut(func).params.push(param);
            if ty.is_pointer {
                self.table.var_mut(var_id).ir_value = Some(param);
            } else {
                // Scalar parameters are spilled to a slot; mem2reg will
                // promote them back.
                let reg = self.module.new_reg(ty.clone());
                let alloca = self
                    .module
                    .new_inst(Opcode::Alloca, ty.clone(), false, &[reg]);
                self.emit(alloca);
                let store = self
                    .module
                    .new_inst(Opcode::Store, ty, true, &[param, reg]);
                self.emit(store);
                self.table.var_mut(var_id).ir_value = Some(reg);
            }
        }

        self.visit_block(&def.body);

        let needs_ret = match self.cur_block {
            None => true,
            Some(block) => self.module.terminator(block).is_none(),
        };
        if needs_ret && !def.is_main {
            let ret = self
                .module
                .new_inst(Opcode::Ret, ValueType::void(), false, &[]);
            self.emit(ret);
        }
        self.cur_func = None;
        self.cur_block = None;
    }

    fn visit_block(&mut self, block: &Block) {
        for item in block.items.iter() {
            match item {
                BlockItem::Decl(decl) => self.visit_decl(decl, false),
                BlockItem::Stmt(stmt) => self.visit_stmt(stmt),
            }
        }
    }

    // --- Statements ---

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { lval, expr, .. } => {
                let addr = self.lower_lval_address(lval);
                let value = self.lower_expr(expr);
                let store = self
                    .module
                    .new_inst(Opcode::Store, lval.ty.clone(), true, &[value, addr]);
                self.emit(store);
            }
            Stmt::Expr(expr) => {
                if let Some(expr) = expr {
                    if expr.computed.is_none() {
                        self.lower_expr(expr);
                    }
                }
            }
            Stmt::Block(block) => self.visit_block(block),
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.visit_if(cond, then_stmt, else_stmt.as_deref()),
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.visit_for(init.as_ref(), cond.as_ref(), step.as_ref(), body),
            Stmt::Break(_) => {
                let target = self.break_target.expect("break outside loop");
                self.jump(target);
            }
            Stmt::Continue(_) => {
                let target = self.continue_target.expect("continue outside loop");
                self.jump(target);
            }
            Stmt::Return { expr, .. } => match expr {
                Some(expr) => {
                    let value = self.lower_expr(expr);
                    let ret = self
                        .module
                        .new_inst(Opcode::Ret, expr.ty.clone(), false, &[value]);
                    self.emit(ret);
                }
                None => {
                    let ret = self
                        .module
                        .new_inst(Opcode::Ret, ValueType::void(), false, &[]);
                    self.emit(ret);
                }
            },
            Stmt::GetInt { lval, .. } => {
                let addr = self.lower_lval_address(lval);
                let reg = self.module.new_reg(ValueType::int());
                let getint = self.module.getint;
                let func_val = self.module.func(getint).value;
                let call = self.module.new_inst(
                    Opcode::Call,
                    ValueType::int(),
                    false,
                    &[reg, func_val],
                );
                self.emit(call);
                let store = self
                    .module
                    .new_inst(Opcode::Store, lval.ty.clone(), true, &[reg, addr]);
                self.emit(store);
            }
            Stmt::Printf { args, segments, .. } => {
                let values: Vec<ValueId> = args.iter().map(|a| self.lower_expr(a)).collect();
                for (i, value) in values.iter().enumerate() {
                    self.print_string(&segments[i]);
                    let putint = self.module.putint;
                    let func_val = self.module.func(putint).value;
                    let call = self.module.new_inst(
                        Opcode::Call,
                        ValueType::void(),
                        true,
                        &[func_val, *value],
                    );
                    self.emit(call);
                }
                self.print_string(&segments[values.len()]);
            }
        }
    }

    fn visit_for_assign(&mut self, fa: &ForAssign) {
        let addr = self.lower_lval_address(&fa.lval);
        let value = self.lower_expr(&fa.expr);
        let store = self
            .module
            .new_inst(Opcode::Store, fa.lval.ty.clone(), true, &[value, addr]);
        self.emit(store);
    }

    fn visit_if(&mut self, cond: &Expr, then_stmt: &Stmt, else_stmt: Option<&Stmt>) {
        let end_block = self.append_block();
        let else_block = else_stmt.map(|_| self.append_block());
        let then_block = self.append_block();

        self.true_target = Some(self.block_value(then_block));
        self.false_target = Some(self.block_value(else_block.unwrap_or(end_block)));
        self.lower_cond(cond);

        self.cur_block = Some(then_block);
        self.visit_stmt(then_stmt);
        if !self.current_terminated() {
            let target = self.block_value(end_block);
            self.jump(target);
        }

        if let (Some(else_block), Some(else_stmt)) = (else_block, else_stmt) {
            self.cur_block = Some(else_block);
            self.visit_stmt(else_stmt);
            if !self.current_terminated() {
                let target = self.block_value(end_block);
                self.jump(target);
            }
        }
        self.cur_block = Some(end_block);
    }

    fn visit_for(
        &mut self,
        init: Option<&ForAssign>,
        cond: Option<&Expr>,
        step: Option<&ForAssign>,
        body: &Stmt,
    ) {
        let end_block = self.append_block();
        let step_block = step.map(|_| self.append_block());
        let body_block = self.append_block();
        let cond_block = cond.map(|_| self.append_block());

        let cond_entry = cond_block.unwrap_or(body_block);
        let step_entry = step_block.unwrap_or(cond_entry);

        let saved_break = self.break_target.replace(self.block_value(end_block));
        let saved_continue = self
            .continue_target
            .replace(self.block_value(step_entry));

        if let Some(init) = init {
            self.visit_for_assign(init);
        }
        let target = self.block_value(cond_entry);
        self.jump(target);

        if let Some(cond) = cond {
            self.cur_block = cond_block;
            self.true_target = Some(self.block_value(body_block));
            self.false_target = Some(self.block_value(end_block));
            self.lower_cond(cond);
        }

        self.cur_block = Some(body_block);
        self.visit_stmt(body);
        let target = self.block_value(step_entry);
        self.jump(target);

        if let Some(step) = step {
            self.cur_block = step_block;
            self.visit_for_assign(step);
            let target = self.block_value(cond_entry);
            self.jump(target);
        }

        self.cur_block = Some(end_block);
        self.break_target = saved_break;
        self.continue_target = saved_continue;
    }

    fn print_string(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if text.len() <= self.config.print_str_min_length {
            for c in text.chars() {
                let putch = self.module.putch;
                let func_val = self.module.func(putch).value;
                let lit = self.module.new_literal(c as i32);
                let call = self.module.new_inst(
                    Opcode::Call,
                    ValueType::void(),
                    true,
                    &[func_val, lit],
                );
                self.emit(call);
            }
            return;
        }

        let str_val = self.module.new_str_literal(text);
        let str_ty = self.module.value(str_val).ty.clone();
        let name = format!("@.printf_str.{}", self.printf_str_count);
        self.printf_str_count += 1;
        let global = self
            .module
            .new_global(&name, str_ty.clone(), GlobalInit::Str(str_val));
        let base = self.module.global(global).value;

        let addr = self.module.new_reg(str_ty);
        let gep = self.module.new_getptr(addr, base);
        let zero = self.module.new_literal(0);
        self.module.add_operand(gep, zero);
        self.emit(gep);

        let putstr = self.module.putstr;
        let func_val = self.module.func(putstr).value;
        let call = self
            .module
            .new_inst(Opcode::Call, ValueType::void(), true, &[func_val, addr]);
        self.emit(call);
    }

    // --- Expressions ---

    /// Lower an lval to the address (or array value) it denotes.
    fn lower_lval_address(&mut self, lval: &LVal) -> ValueId {
        let var_id = lval.var.expect("unresolved lval");
        let base = self
            .table
            .var(var_id)
            .ir_value
            .expect("variable without IR value");
        let var_is_array = self.table.var(var_id).ty.is_array();
        if lval.indices.is_empty() && !var_is_array {
            return base;
        }

        let result = self.module.new_reg(lval.ty.clone());
        let gep = self.module.new_getptr(result, base);
        for index in lval.indices.iter() {
            let value = self.lower_expr(index);
            self.module.add_operand(gep, value);
        }
        if lval.ty.is_array() {
            let zero = self.module.new_literal(0);
            self.module.add_operand(gep, zero);
        }
        self.emit(gep);
        result
    }

    /// Lower an expression in value position.
    fn lower_expr(&mut self, expr: &Expr) -> ValueId {
        if let Some(v) = expr.computed {
            return self.module.new_literal(v);
        }
        match &expr.kind {
            ExprKind::Number(n) => self.module.new_literal(*n),
            ExprKind::LVal(lval) => {
                let addr = self.lower_lval_address(lval);
                if lval.ty.is_array() {
                    addr
                } else {
                    let value = self.module.new_reg(lval.ty.clone());
                    let load = self.module.new_inst(
                        Opcode::Load,
                        lval.ty.clone(),
                        false,
                        &[value, addr],
                    );
                    self.emit(load);
                    value
                }
            }
            ExprKind::Call { args, func, .. } => {
                let sym = func.expect("unresolved call");
                let callee = self
                    .table
                    .func(sym)
                    .ir_func
                    .expect("function without IR body");
                let func_val = self.module.func(callee).value;
                let ret_ty = self.module.func(callee).ty.clone();
                let call = if ret_ty.is_void() {
                    self.module
                        .new_inst(Opcode::Call, ret_ty, true, &[func_val])
                } else {
                    let result = self.module.new_reg(ret_ty.clone());
                    self.module
                        .new_inst(Opcode::Call, ret_ty, false, &[result, func_val])
                };
                for arg in args.iter() {
                    let value = self.lower_expr(arg);
                    self.module.add_operand(call, value);
                }
                self.emit(call);
                if self.module.inst(call).no_def {
                    self.module.new_literal(0)
                } else {
                    self.module.operand(call, 0)
                }
            }
            ExprKind::Unary { op, expr: inner, .. } => {
                let value = self.lower_expr(inner);
                match op {
                    UnaryOp::Plus => value,
                    UnaryOp::Minus => {
                        let result = self.module.new_reg(ValueType::int());
                        let zero = self.module.new_literal(0);
                        let sub = self.module.new_inst(
                            Opcode::Sub,
                            ValueType::int(),
                            false,
                            &[result, zero, value],
                        );
                        self.emit(sub);
                        result
                    }
                    UnaryOp::Not => {
                        let bool_val = self.module.new_reg(ValueType::bool_ty());
                        let zero = self.module.new_literal(0);
                        let icmp = self.module.new_inst(
                            Opcode::Icmp(IcmpCond::Eq),
                            ValueType::int(),
                            false,
                            &[bool_val, zero, value],
                        );
                        self.emit(icmp);
                        self.zext(bool_val)
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs, .. } => {
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Sub => Opcode::Sub,
                    BinaryOp::Mul => Opcode::Mul,
                    BinaryOp::Div => Opcode::Sdiv,
                    BinaryOp::Mod => Opcode::Srem,
                    BinaryOp::Lt => Opcode::Icmp(IcmpCond::Slt),
                    BinaryOp::Gt => Opcode::Icmp(IcmpCond::Sgt),
                    BinaryOp::Le => Opcode::Icmp(IcmpCond::Sle),
                    BinaryOp::Ge => Opcode::Icmp(IcmpCond::Sge),
                    BinaryOp::Eq => Opcode::Icmp(IcmpCond::Eq),
                    BinaryOp::Ne => Opcode::Icmp(IcmpCond::Ne),
                    BinaryOp::And | BinaryOp::Or => {
                        unreachable!("logical operator lowered outside condition context")
                    }
                };
                let a = self.lower_expr(lhs);
                let b = self.lower_expr(rhs);
                if opcode.is_icmp() {
                    let bool_val = self.module.new_reg(ValueType::bool_ty());
                    let icmp = self.module.new_inst(
                        opcode,
                        ValueType::int(),
                        false,
                        &[bool_val, a, b],
                    );
                    self.emit(icmp);
                    self.zext(bool_val)
                } else {
                    let result = self.module.new_reg(ValueType::int());
                    let inst =
                        self.module
                            .new_inst(opcode, ValueType::int(), false, &[result, a, b]);
                    self.emit(inst);
                    result
                }
            }
        }
    }

    fn zext(&mut self, bool_val: ValueId) -> ValueId {
        let result = self.module.new_reg(ValueType::int());
        let zext = self.module.new_inst(
            Opcode::Zext,
            ValueType::bool_ty(),
            false,
            &[result, bool_val],
        );
        self.module.inst_mut(zext).ty2 = Some(ValueType::int());
        self.emit(zext);
        result
    }

    /// Lower a condition, branching to the threaded true/false targets.
    /// `&&` and `||` thread the targets through fresh blocks; everything
    /// else compares against zero and branches.
    fn lower_cond(&mut self, expr: &Expr) {
        if let Some(v) = expr.computed {
            let target = if v != 0 {
                self.true_target.expect("missing true target")
            } else {
                self.false_target.expect("missing false target")
            };
            self.jump(target);
            return;
        }
        match &expr.kind {
            ExprKind::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
                ..
            } => {
                let saved = self.true_target;
                let rhs_block = self.append_block();
                self.true_target = Some(self.block_value(rhs_block));
                self.lower_cond(lhs);
                self.cur_block = Some(rhs_block);
                self.true_target = saved;
                self.lower_cond(rhs);
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
                ..
            } => {
                let saved = self.false_target;
                let rhs_block = self.append_block();
                self.false_target = Some(self.block_value(rhs_block));
                self.lower_cond(lhs);
                self.cur_block = Some(rhs_block);
                self.false_target = saved;
                self.lower_cond(rhs);
            }
            _ => {
                let value = self.lower_expr(expr);
                let cond = self.module.new_reg(ValueType::bool_ty());
                let zero = self.module.new_literal(0);
                let icmp = self.module.new_inst(
                    Opcode::Icmp(IcmpCond::Ne),
                    ValueType::int(),
                    false,
                    &[cond, zero, value],
                );
                self.emit(icmp);
                let t = self.true_target.expect("missing true target");
                let f = self.false_target.expect("missing false target");
                let br = self.module.new_branch(Some(cond), t, Some(f));
                self.emit(br);
            }
        }
    }
}
