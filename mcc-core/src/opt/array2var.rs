//! Array Scalarization (array2var)
//!
//! An array (local or global) whose every access goes through a
//! constant-index getelementptr, with each element addressed by at most
//! one of them and every address consumed only by loads and stores, is
//! split into one scalar slot per referenced element. The getelementptrs
//! disappear; their result values become scalar allocas initialized from
//! the array's initializer, which mem2reg then promotes to SSA.

use crate::ir::types::ValueType;
use crate::ir::{InstId, Module, Opcode, ValueId, VarInit};
use std::collections::HashSet;

pub struct Array2Var;

impl Array2Var {
    pub fn run(module: &mut Module) {
        for global in module.globals.clone() {
            if !module.global(global).ty.is_array() {
                continue;
            }
            let crate::ir::GlobalInit::Var(var) = module.global(global).init else {
                continue;
            };
            let addr = module.global(global).value;
            let ty = module.global(global).ty.clone();
            if Self::check_accesses(module, addr, &ty, None) {
                Self::rewrite(module, addr, &ty, var, None);
                module.remove_global(global);
                module.changed = true;
            }
        }

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            for block in module.func(func).blocks.clone() {
                for inst in module.block(block).insts.clone() {
                    let data = module.inst(inst);
                    if data.removed || data.op != Opcode::Alloca || !data.ty.is_array() {
                        continue;
                    }
                    let Some(var) = data.var else {
                        continue;
                    };
                    let addr = data.operands[0];
                    let ty = data.ty.clone();
                    if Self::check_accesses(module, addr, &ty, Some(inst)) {
                        Self::rewrite(module, addr, &ty, var, Some(inst));
                        module.remove_inst(inst);
                        module.changed = true;
                    }
                }
            }
        }
    }

    /// Every use of the array address must be a full-depth constant-index
    /// getelementptr whose result feeds only loads and stores, and no two
    /// of them may name the same element.
    fn check_accesses(
        module: &Module,
        addr: ValueId,
        ty: &ValueType,
        self_inst: Option<InstId>,
    ) -> bool {
        let dim = ty.dim_len();
        let mut seen: HashSet<i64> = HashSet::new();
        for u in module.value(addr).uses.iter() {
            if Some(u.inst) == self_inst {
                continue;
            }
            let inst = module.inst(u.inst);
            if inst.op != Opcode::GetPtr {
                return false;
            }
            // Needs the leading zero plus one index per dimension.
            if inst.operands.len() < dim + 3 {
                return false;
            }
            let mut index = Vec::new();
            for i in 2..inst.operands.len() {
                if !module.is_const(inst.operands[i]) {
                    return false;
                }
                index.push(module.const_value(inst.operands[i]));
            }
            for gu in module.value(inst.operands[0]).uses.iter() {
                if gu.inst == u.inst {
                    continue;
                }
                if !matches!(module.inst(gu.inst).op, Opcode::Load | Opcode::Store) {
                    return false;
                }
            }
            let element = Self::element_index(ty, &index);
            if !seen.insert(element) {
                return false;
            }
        }
        true
    }

    /// Row-major flat index of a full constant index chain (index 0 is the
    /// leading zero over the whole aggregate).
    fn element_index(ty: &ValueType, index: &[i32]) -> i64 {
        let dim = ty.dim_len();
        let mut element: i64 = 0;
        for i in 0..=dim {
            element += index[i] as i64;
            if i < dim {
                element *= ty.dim(i).max(0) as i64;
            }
        }
        element
    }

    fn rewrite(
        module: &mut Module,
        addr: ValueId,
        ty: &ValueType,
        var: crate::ir::VarInitId,
        self_inst: Option<InstId>,
    ) {
        let mut remove: Vec<InstId> = Vec::new();
        for u in module.value(addr).uses.clone() {
            if Some(u.inst) == self_inst {
                continue;
            }
            if module.inst(u.inst).op != Opcode::GetPtr {
                continue;
            }
            let gep = u.inst;
            let index: Vec<i32> = (2..module.inst(gep).operands.len())
                .map(|i| module.const_value(module.operand(gep, i)))
                .collect();
            let element = Self::element_index(ty, &index);
            let parent = module.var_init(var);
            let scalar = VarInit {
                name: parent.name.clone(),
                ty: {
                    let mut t = ty.base_type();
                    t.is_const = ty.is_const;
                    t
                },
                init: parent.init,
                zero_init: parent.zero_init,
                values: vec![parent.value_at(element as usize)],
            };
            let init_value = scalar.values[0];
            let scalar_id = module.add_var_init(scalar);

            let reg = module.operand(gep, 0);
            let mut scalar_ty = ty.base_type();
            scalar_ty.is_const = ty.is_const;
            module.value_mut(reg).ty = scalar_ty.clone();

            let alloca = module.new_inst(Opcode::Alloca, scalar_ty.clone(), false, &[reg]);
            module.inst_mut(alloca).var = Some(scalar_id);
            module.insert_before(gep, alloca);
            let lit = module.new_literal(init_value);
            let store = module.new_inst(Opcode::Store, scalar_ty, true, &[lit, reg]);
            module.insert_after(gep, store);
            remove.push(gep);
        }
        for gep in remove {
            module.remove_inst(gep);
        }
    }
}
