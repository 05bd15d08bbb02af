//! Semantic Analysis
//!
//! One pass over the AST that builds the scope tree, resolves every name,
//! types every expression, and folds compile-time values. The decorated
//! tree plus the symbol table is the contract consumed by IR construction.
//!
//! Compile-time values are folded over literals, const variables, const
//! array elements with constant indices, and any variable read at global
//! scope. Variables whose whole initializer folds record it flattened
//! (row-major, zero padded); the backend's global emission, the global
//! localizer, and array scalarization all read that form.
//!
//! A node that fails a check is marked dummy; dummy subtrees are skipped by
//! later checks so one mistake reports once.

use crate::errors::{DiagnosticKind, DiagnosticLog};
use crate::frontend::ast::*;
use crate::frontend::symbol::{FunctionSym, ScopeId, SymbolTable, Variable};
use crate::ir::types::{BaseType, ValueType};

use DiagnosticKind as Dk;

/// Semantic analyzer state.
pub struct SemanticAnalyzer<'a> {
    pub table: SymbolTable,
    diags: &'a mut DiagnosticLog,
    scope: ScopeId,
    /// Return type of the enclosing function, `None` at file scope.
    current_ret: Option<ValueType>,
    loop_depth: u32,
}

impl<'a> SemanticAnalyzer<'a> {
    /// Analyze a unit, decorating it in place. Returns the symbol table.
    pub fn analyze(unit: &mut CompUnit, diags: &'a mut DiagnosticLog) -> SymbolTable {
        let table = SymbolTable::new();
        let mut analyzer = SemanticAnalyzer {
            scope: table.root(),
            table,
            diags,
            current_ret: None,
            loop_depth: 0,
        };
        analyzer.visit_unit(unit);
        analyzer.table
    }

    fn visit_unit(&mut self, unit: &mut CompUnit) {
        for decl in unit.decls.iter_mut() {
            self.visit_decl(decl);
        }
        for func in unit.funcs.iter_mut() {
            self.visit_func(func);
        }
        if let Some(main) = unit.main.as_mut() {
            self.visit_func(main);
        }
    }

    // --- Declarations ---

    fn visit_decl(&mut self, decl: &mut Decl) {
        for def in decl.defs.iter_mut() {
            self.visit_var_def(def);
        }
    }

    fn visit_var_def(&mut self, def: &mut VarDef) {
        let mut ty = ValueType::int();
        ty.is_const = def.is_const;
        for dim in def.dims.iter_mut() {
            self.visit_expr(dim);
            def.dummy |= dim.dummy;
            match dim.computed {
                Some(n) if n >= 0 => ty.push_dim(n),
                Some(_) => {
                    self.diags.raise(dim.loc, Dk::NegativeArrayLength);
                    def.dummy = true;
                }
                None => {
                    self.diags.raise(dim.loc, Dk::IndeterminateArrayLength);
                    def.dummy = true;
                }
            }
        }
        if def.dummy {
            return;
        }

        let mut var = Variable::new(def.ident.text.clone(), def.ident.loc, ty);
        if let Some(init) = def.init.as_mut() {
            var.init = true;
            let element_count = var.ty.element_count().max(0) as usize;
            let mut values = Vec::with_capacity(element_count);
            let ty = var.ty.clone();
            self.visit_init_val(init, &ty, &mut values, &mut var.init, &mut def.dummy);
            values.resize(element_count.max(values.len()), 0);
            var.init_values = values;
        } else {
            var.zero_init = true;
        }

        if def.is_const && !var.init {
            self.diags.raise(def.ident.loc, Dk::IndeterminateInitVal);
            def.dummy = true;
            return;
        }

        match self.table.define_var(self.scope, var) {
            Ok(id) => def.var = Some(id),
            Err(()) => {
                self.diags.raise(def.ident.loc, Dk::DuplicateIdent);
                def.dummy = true;
            }
        }
    }

    /// Flatten one initializer level into `out`, clearing `init_ok` when an
    /// element is not compile-time known.
    fn visit_init_val(
        &mut self,
        iv: &mut InitVal,
        ty: &ValueType,
        out: &mut Vec<i32>,
        init_ok: &mut bool,
        dummy: &mut bool,
    ) {
        let base = out.len();
        match iv {
            InitVal::List(items, loc) => {
                if !ty.is_array() || items.len() > ty.dim(0).max(0) as usize {
                    self.diags.raise(*loc, Dk::InitValCount);
                    *init_ok = false;
                    *dummy = true;
                }
                let mut child_ty = ty.clone();
                child_ty.pop();
                let child_size = child_ty.element_count().max(0) as usize;
                for (i, item) in items.iter_mut().enumerate() {
                    self.visit_init_val(item, &child_ty, out, init_ok, dummy);
                    out.resize(base + (i + 1) * child_size, 0);
                }
                out.resize(base + ty.element_count().max(0) as usize, 0);
            }
            InitVal::Expr(expr) => {
                self.visit_expr(expr);
                *dummy |= expr.dummy;
                if ty.is_array() {
                    self.diags.raise(expr.loc, Dk::InitValCount);
                    *init_ok = false;
                    *dummy = true;
                } else if !expr.dummy && !expr.ty.is_int_scalar() {
                    self.diags.raise(expr.loc, Dk::InitValCount);
                    *dummy = true;
                }
                match expr.computed {
                    Some(v) => out.push(v),
                    None => {
                        out.push(0);
                        *init_ok = false;
                    }
                }
            }
        }
    }

    // --- Functions ---

    fn visit_func(&mut self, func: &mut FuncDef) {
        // Analyze parameter types in the enclosing scope.
        let mut param_vars: Vec<Option<Variable>> = Vec::new();
        for param in func.params.iter_mut() {
            let var = self.visit_param(param);
            param_vars.push(var);
            func.dummy |= param.dummy;
        }

        let sym = FunctionSym {
            name: func.ident.text.clone(),
            loc: func.ident.loc,
            ret_ty: func.ret_ty.clone(),
            params: Vec::new(),
            scope: None,
            ir_func: None,
        };
        let func_id = match self.table.define_func(self.scope, sym) {
            Ok(id) => {
                func.sym = Some(id);
                Some(id)
            }
            Err(()) => {
                self.diags.raise(func.ident.loc, Dk::DuplicateIdent);
                func.dummy = true;
                None
            }
        };

        let outer = self.scope;
        self.scope = self.table.new_scope(outer);
        if let Some(id) = func_id {
            self.table.func_mut(id).scope = Some(self.scope);
        }

        for (param, var) in func.params.iter_mut().zip(param_vars) {
            let Some(var) = var else {
                continue;
            };
            match self.table.define_var(self.scope, var) {
                Ok(id) => {
                    param.var = Some(id);
                    if let Some(fid) = func_id {
                        self.table.func_mut(fid).params.push(id);
                    }
                }
                Err(()) => {
                    self.diags.raise(param.ident.loc, Dk::DuplicateIdent);
                    func.dummy = true;
                }
            }
        }

        let prev_ret = self.current_ret.replace(func.ret_ty.clone());
        self.visit_block(&mut func.body, false);
        self.current_ret = prev_ret;

        // A non-void function must end in a return statement.
        if func.ret_ty.base == BaseType::I32 {
            let last_is_return = matches!(
                func.body.items.last(),
                Some(BlockItem::Stmt(Stmt::Return { .. }))
            );
            if !last_is_return {
                self.diags.raise(func.end_loc, Dk::MissingReturn);
                func.dummy = true;
            }
        }

        self.scope = outer;
    }

    fn visit_param(&mut self, param: &mut FuncParam) -> Option<Variable> {
        let mut ty = ValueType::int();
        if param.is_array {
            ty.is_pointer = true;
            ty.push_dim(0);
        }
        for dim in param.dims.iter_mut() {
            self.visit_expr(dim);
            param.dummy |= dim.dummy;
            match dim.computed {
                Some(n) if n >= 0 => ty.push_dim(n),
                Some(_) => {
                    self.diags.raise(dim.loc, Dk::NegativeArrayLength);
                    param.dummy = true;
                }
                None => {
                    self.diags.raise(dim.loc, Dk::IndeterminateArrayLength);
                    param.dummy = true;
                }
            }
        }
        if param.dummy {
            return None;
        }
        Some(Variable::new(param.ident.text.clone(), param.ident.loc, ty))
    }

    // --- Statements ---

    fn visit_block(&mut self, block: &mut Block, own_scope: bool) {
        let outer = self.scope;
        if own_scope {
            self.scope = self.table.new_scope(outer);
        }
        for item in block.items.iter_mut() {
            match item {
                BlockItem::Decl(decl) => self.visit_decl(decl),
                BlockItem::Stmt(stmt) => self.visit_stmt(stmt),
            }
        }
        self.scope = outer;
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Assign { lval, expr, dummy } => {
                self.visit_lval(lval);
                self.visit_expr(expr);
                *dummy |= lval.dummy | expr.dummy;
                self.check_assign_target(lval, dummy);
                if !*dummy {
                    if !lval.ty.is_int_scalar() {
                        self.diags.raise(lval.loc, Dk::InvalidOperandTypes);
                        *dummy = true;
                    }
                    if !expr.ty.is_int_scalar() {
                        self.diags.raise(expr.loc, Dk::InvalidOperandTypes);
                        *dummy = true;
                    }
                }
            }
            Stmt::Expr(expr) => {
                if let Some(expr) = expr {
                    self.visit_expr(expr);
                }
            }
            Stmt::Block(block) => self.visit_block(block, true),
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.visit_expr(cond);
                self.visit_stmt(then_stmt);
                if let Some(els) = else_stmt {
                    self.visit_stmt(els);
                }
                if !cond.dummy && !cond.ty.is_int_scalar() {
                    self.diags.raise(cond.loc, Dk::CondNotInt);
                }
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                self.loop_depth += 1;
                if let Some(init) = init {
                    self.visit_for_assign(init);
                }
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                    if !cond.dummy && !cond.ty.is_int_scalar() {
                        self.diags.raise(cond.loc, Dk::CondNotInt);
                    }
                }
                if let Some(step) = step {
                    self.visit_for_assign(step);
                }
                self.visit_stmt(body);
                self.loop_depth -= 1;
            }
            Stmt::Break(loc) | Stmt::Continue(loc) => {
                if self.loop_depth == 0 {
                    self.diags.raise(*loc, Dk::BreakContinueOutsideLoop);
                }
            }
            Stmt::Return { expr, loc } => {
                let ret_ty = self
                    .current_ret
                    .clone()
                    .unwrap_or_else(ValueType::int);
                if let Some(expr) = expr {
                    self.visit_expr(expr);
                    if !expr.dummy && expr.ty != ret_ty {
                        if ret_ty.is_void() {
                            self.diags.raise(*loc, Dk::UnexpectedReturn);
                        } else {
                            self.diags.raise(*loc, Dk::ReturnTypeMismatch);
                        }
                    }
                } else if !ret_ty.is_void() {
                    self.diags.raise(*loc, Dk::ReturnTypeMismatch);
                }
            }
            Stmt::GetInt { lval, dummy } => {
                self.visit_lval(lval);
                *dummy |= lval.dummy;
                self.check_assign_target(lval, dummy);
                if !*dummy && !lval.ty.is_int_scalar() {
                    self.diags.raise(lval.loc, Dk::InvalidOperandTypes);
                    *dummy = true;
                }
            }
            Stmt::Printf {
                format,
                args,
                segments,
                loc,
                dummy,
            } => {
                for arg in args.iter_mut() {
                    self.visit_expr(arg);
                    *dummy |= arg.dummy;
                    if !arg.dummy && !arg.ty.is_int_scalar() {
                        self.diags.raise(arg.loc, Dk::PrintfArgs);
                        *dummy = true;
                    }
                }
                match split_format(&format.str_val) {
                    Some(parts) => {
                        if parts.len() != args.len() + 1 {
                            self.diags.raise(*loc, Dk::PrintfArgs);
                            *dummy = true;
                        }
                        *segments = parts;
                    }
                    None => {
                        self.diags.raise(*loc, Dk::IllegalSymbol);
                        *dummy = true;
                    }
                }
            }
        }
    }

    fn visit_for_assign(&mut self, fa: &mut ForAssign) {
        self.visit_lval(&mut fa.lval);
        self.visit_expr(&mut fa.expr);
        fa.dummy |= fa.lval.dummy | fa.expr.dummy;
        let mut dummy = fa.dummy;
        self.check_assign_target(&fa.lval, &mut dummy);
        if !dummy {
            if !fa.lval.ty.is_int_scalar() {
                self.diags.raise(fa.lval.loc, Dk::InvalidOperandTypes);
                dummy = true;
            }
            if !fa.expr.ty.is_int_scalar() {
                self.diags.raise(fa.expr.loc, Dk::InvalidOperandTypes);
                dummy = true;
            }
        }
        fa.dummy = dummy;
    }

    fn check_assign_target(&mut self, lval: &LVal, dummy: &mut bool) {
        if lval.dummy {
            return;
        }
        if let Some(var) = lval.var {
            if self.table.var(var).is_const() {
                self.diags.raise(lval.loc, Dk::ConstAssign);
                *dummy = true;
            }
        }
    }

    // --- Expressions ---

    fn visit_lval(&mut self, lval: &mut LVal) {
        for index in lval.indices.iter_mut() {
            self.visit_expr(index);
            lval.dummy |= index.dummy;
        }
        let Some(var_id) = self.table.lookup_var(self.scope, &lval.ident.text) else {
            self.diags.raise(lval.ident.loc, Dk::UndefinedIdent);
            lval.dummy = true;
            return;
        };
        lval.var = Some(var_id);

        let var_ty = self.table.var(var_id).ty.clone();
        lval.ty = var_ty.clone();
        for index in lval.indices.iter() {
            if !index.dummy && !index.ty.is_int_scalar() {
                self.diags.raise(index.loc, Dk::IndexNotInt);
                lval.dummy = true;
            }
            lval.ty.pop();
        }
    }

    /// Compile-time evaluate an lval read, when legal: the variable's whole
    /// initializer is known, the access is const (or we are at file scope),
    /// and every index is a constant inside the declared bounds.
    fn fold_lval(&mut self, lval: &mut LVal) -> Option<i32> {
        let var_id = lval.var?;
        let var = self.table.var(var_id);
        if lval.dummy || !var.init {
            return None;
        }
        if !var.is_const() && self.current_ret.is_some() {
            return None;
        }

        let mut index_ty = var.ty.base_type();
        let mut all_const = true;
        for index in lval.indices.iter() {
            match index.computed {
                Some(v) => index_ty.push_dim(v),
                None => all_const = false,
            }
        }
        if !all_const {
            return None;
        }
        if !index_ty.index_within(&var.ty) {
            self.diags.raise(lval.ident.loc, Dk::ArrayDimMismatch);
            lval.dummy = true;
            return None;
        }

        let mut flat: i64 = 0;
        for i in 0..index_ty.dim_len() {
            flat = flat * var.ty.dim(i).max(0) as i64 + index_ty.dim(i) as i64;
        }
        Some(self.table.var(var_id).init_value_at(flat as usize))
    }

    fn visit_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Number(n) => {
                expr.ty = ValueType::int();
                expr.computed = Some(*n);
            }
            ExprKind::LVal(lval) => {
                self.visit_lval(lval);
                expr.ty = lval.ty.clone();
                expr.computed = self.fold_lval(lval);
                expr.dummy |= lval.dummy;
            }
            ExprKind::Call { ident, args, func } => {
                for arg in args.iter_mut() {
                    self.visit_expr(arg);
                    expr.dummy |= arg.dummy;
                }
                let Some(func_id) = self.table.lookup_func(self.scope, &ident.text) else {
                    self.diags.raise(ident.loc, Dk::UndefinedIdent);
                    expr.dummy = true;
                    return;
                };
                *func = Some(func_id);
                let sym = self.table.func(func_id);
                expr.ty = sym.ret_ty.clone();
                if sym.params.len() != args.len() {
                    self.diags.raise(expr.loc, Dk::FuncArgCount);
                    expr.dummy = true;
                } else if !expr.dummy {
                    let param_tys: Vec<ValueType> = sym
                        .params
                        .iter()
                        .map(|&p| self.table.var(p).ty.clone())
                        .collect();
                    for (arg, param_ty) in args.iter().zip(param_tys.iter()) {
                        if arg.ty != *param_ty {
                            self.diags.raise(expr.loc, Dk::FuncArgType);
                            expr.dummy = true;
                            break;
                        }
                    }
                }
            }
            ExprKind::Unary { op, op_loc, expr: inner } => {
                let (op, op_loc) = (*op, *op_loc);
                self.visit_expr(inner);
                expr.ty = inner.ty.clone();
                expr.computed = inner.computed;
                expr.dummy |= inner.dummy;
                if !expr.ty.is_int_scalar() {
                    self.diags.raise(op_loc, Dk::InvalidOperandTypes);
                    expr.dummy = true;
                } else if let Some(v) = expr.computed {
                    expr.computed = Some(match op {
                        UnaryOp::Plus => v,
                        UnaryOp::Minus => v.wrapping_neg(),
                        UnaryOp::Not => (v == 0) as i32,
                    });
                }
            }
            ExprKind::Binary {
                op,
                op_loc,
                lhs,
                rhs,
            } => {
                let (op, op_loc) = (*op, *op_loc);
                self.visit_expr(lhs);
                self.visit_expr(rhs);
                expr.ty = lhs.ty.clone();
                expr.dummy |= lhs.dummy | rhs.dummy;
                if !lhs.ty.is_int_scalar() || !rhs.ty.is_int_scalar() {
                    self.diags.raise(op_loc, Dk::InvalidOperandTypes);
                    expr.dummy = true;
                    return;
                }
                expr.ty = ValueType::int();
                let (Some(a), Some(b)) = (lhs.computed, rhs.computed) else {
                    return;
                };
                expr.computed = match op {
                    BinaryOp::Add => Some(a.wrapping_add(b)),
                    BinaryOp::Sub => Some(a.wrapping_sub(b)),
                    BinaryOp::Mul => Some(a.wrapping_mul(b)),
                    BinaryOp::Div => {
                        if b == 0 {
                            self.diags.raise(op_loc, Dk::DivisionByZero);
                            expr.dummy = true;
                            None
                        } else {
                            Some(a.wrapping_div(b))
                        }
                    }
                    BinaryOp::Mod => {
                        if b == 0 {
                            self.diags.raise(op_loc, Dk::DivisionByZero);
                            expr.dummy = true;
                            None
                        } else {
                            Some(a.wrapping_rem(b))
                        }
                    }
                    BinaryOp::Lt => Some((a < b) as i32),
                    BinaryOp::Gt => Some((a > b) as i32),
                    BinaryOp::Le => Some((a <= b) as i32),
                    BinaryOp::Ge => Some((a >= b) as i32),
                    BinaryOp::Eq => Some((a == b) as i32),
                    BinaryOp::Ne => Some((a != b) as i32),
                    BinaryOp::And => Some((a != 0 && b != 0) as i32),
                    BinaryOp::Or => Some((a != 0 || b != 0) as i32),
                };
            }
        }
    }
}

/// Validate a `printf` format string and split it into the literal segments
/// around the `%d` placeholders. Returns `None` when the format is illegal.
/// Only `%d` and `\n` are accepted; characters must be printable ASCII.
fn split_format(format: &str) -> Option<Vec<String>> {
    let bytes = format.as_bytes();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c < 32 || (33 < c && c < 40 && c != 37) || c > 126 {
            return None;
        }
        if c == b'\\' {
            if bytes.get(i + 1) != Some(&b'n') {
                return None;
            }
            current.push('\n');
            i += 2;
            continue;
        }
        if c == b'%' {
            if bytes.get(i + 1) != Some(&b'd') {
                return None;
            }
            segments.push(std::mem::take(&mut current));
            i += 2;
            continue;
        }
        current.push(c as char);
        i += 1;
    }
    segments.push(current);
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::split_format;

    #[test]
    fn format_splits_around_placeholders() {
        assert_eq!(
            split_format("a=%d, b=%d\n"),
            Some(vec!["a=".to_string(), ", b=".to_string(), "\n".to_string()])
        );
    }

    #[test]
    fn format_rejects_unknown_escape() {
        assert_eq!(split_format("bad\\t"), None);
        assert_eq!(split_format("bad%c"), None);
    }
}
