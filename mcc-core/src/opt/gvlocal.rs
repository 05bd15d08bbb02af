//! Global-Variable Localization
//!
//! A scalar, non-const global whose every use sits inside `main` cannot be
//! observed by any other function, so it is demoted to a stack slot at
//! `main`'s entry, initialized from its compile-time value. Globals used
//! by any other function are left alone (they must keep their state across
//! calls).

use crate::ir::types::BaseType;
use crate::ir::{GlobalInit, Module, Opcode};

pub struct GvLocalizer;

impl GvLocalizer {
    pub fn run(module: &mut Module) {
        let main = module.main_func();

        for global in module.globals.clone() {
            let data = module.global(global);
            let scalar = data.ty.base == BaseType::I32 && !data.ty.is_array() && !data.ty.is_pointer;
            if !scalar || data.ty.is_const {
                continue;
            }
            let GlobalInit::Var(var) = data.init else {
                continue;
            };
            let value = data.value;

            let mut in_main = true;
            for u in module.value(value).uses.iter() {
                let block = module.inst(u.inst).block;
                if module.block(block).func != main {
                    in_main = false;
                    break;
                }
            }
            if !in_main {
                continue;
            }

            log::debug!("localizing global {} into main", module.global(global).name);
            module.changed = true;
            module.remove_global(global);

            let ty = module.global(global).ty.clone();
            let init_value = module.var_init(var).value_at(0);
            let entry = module.func(main).blocks[0];

            let reg = module.new_reg(ty.clone());
            let alloca = module.new_inst(Opcode::Alloca, ty.clone(), false, &[reg]);
            module.inst_mut(alloca).var = Some(var);
            let lit = module.new_literal(init_value);
            let store = module.new_inst(Opcode::Store, ty, true, &[lit, reg]);
            module.prepend_inst(entry, store);
            module.prepend_inst(entry, alloca);

            module.replace_all_uses(value, reg);
        }
    }
}
