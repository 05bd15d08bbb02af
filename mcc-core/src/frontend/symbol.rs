//! Symbol Table
//!
//! Lexical scopes with parent links, plus the variable and function symbols
//! the semantic analyzer resolves names to. Symbols live in arenas owned by
//! the table; AST annotations and the IR builder refer to them by id.
//!
//! A variable records its flattened initializer (row-major, zero padded)
//! whenever every element is compile-time computable; constant folding of
//! const array accesses and the global-variable localizer both read it.

use crate::ir::types::ValueType;
use crate::ir::ValueId;
use crate::source::Location;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncSymId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// A declared variable or constant.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub loc: Location,
    pub ty: ValueType,
    /// Every element of the initializer is compile-time known.
    pub init: bool,
    /// No initializer was written (or it is all zeros).
    pub zero_init: bool,
    /// Flattened row-major initializer, padded with zeros; meaningful when
    /// `init` holds. A scalar stores one element.
    pub init_values: Vec<i32>,
    /// The IR value holding this variable's address (or its SSA value for
    /// pointer parameters); filled during IR construction.
    pub ir_value: Option<ValueId>,
}

impl Variable {
    pub fn new(name: impl Into<String>, loc: Location, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            loc,
            ty,
            init: false,
            zero_init: false,
            init_values: Vec::new(),
            ir_value: None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.ty.is_const
    }

    /// Initializer element at a flattened index (zero beyond the written
    /// prefix).
    pub fn init_value_at(&self, index: usize) -> i32 {
        self.init_values.get(index).copied().unwrap_or(0)
    }
}

/// A declared function.
#[derive(Debug, Clone)]
pub struct FunctionSym {
    pub name: String,
    pub loc: Location,
    /// Return type: `int` or `void`.
    pub ret_ty: ValueType,
    pub params: Vec<VarId>,
    pub scope: Option<ScopeId>,
    /// The IR function; filled during IR construction.
    pub ir_func: Option<crate::ir::FuncId>,
}

#[derive(Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    vars: HashMap<String, VarId>,
    funcs: HashMap<String, FuncSymId>,
}

/// All scopes and symbols of one compilation unit.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<ScopeData>,
    vars: Vec<Variable>,
    funcs: Vec<FunctionSym>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self::default();
        table.scopes.push(ScopeData::default());
        table
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent: Some(parent),
            ..Default::default()
        });
        id
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0 as usize]
    }

    pub fn func(&self, id: FuncSymId) -> &FunctionSym {
        &self.funcs[id.0 as usize]
    }

    pub fn func_mut(&mut self, id: FuncSymId) -> &mut FunctionSym {
        &mut self.funcs[id.0 as usize]
    }

    /// Define a variable in `scope`. Fails when the name collides with a
    /// variable or function already defined in the same scope.
    pub fn define_var(&mut self, scope: ScopeId, var: Variable) -> Result<VarId, ()> {
        let data = &self.scopes[scope.0 as usize];
        if data.vars.contains_key(&var.name) || data.funcs.contains_key(&var.name) {
            return Err(());
        }
        let id = VarId(self.vars.len() as u32);
        let name = var.name.clone();
        self.vars.push(var);
        self.scopes[scope.0 as usize].vars.insert(name, id);
        Ok(id)
    }

    /// Define a function in `scope`, with the same collision rule.
    pub fn define_func(&mut self, scope: ScopeId, func: FunctionSym) -> Result<FuncSymId, ()> {
        let data = &self.scopes[scope.0 as usize];
        if data.vars.contains_key(&func.name) || data.funcs.contains_key(&func.name) {
            return Err(());
        }
        let id = FuncSymId(self.funcs.len() as u32);
        let name = func.name.clone();
        self.funcs.push(func);
        self.scopes[scope.0 as usize].funcs.insert(name, id);
        Ok(id)
    }

    /// Resolve a variable name, walking parent scopes.
    pub fn lookup_var(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let data = &self.scopes[id.0 as usize];
            if let Some(&var) = data.vars.get(name) {
                return Some(var);
            }
            cur = data.parent;
        }
        None
    }

    /// Resolve a function name, walking parent scopes.
    pub fn lookup_func(&self, scope: ScopeId, name: &str) -> Option<FuncSymId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let data = &self.scopes[id.0 as usize];
            if let Some(&func) = data.funcs.get(name) {
                return Some(func);
            }
            cur = data.parent;
        }
        None
    }
}
