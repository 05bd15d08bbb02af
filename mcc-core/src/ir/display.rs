//! Textual IR
//!
//! LLVM-flavored rendering of a module, used by the `--dump-ir` option and
//! by tests that assert on middle-end shape. Registers print as `%N` using
//! the numbers assigned by the register labeller.

use crate::ir::types::ValueType;
use crate::ir::{GlobalInit, InstId, Module, Opcode, ValueId, ValueKind};
use std::fmt::Write;

/// Render a whole module.
pub fn module_to_string(module: &Module) -> String {
    let mut out = String::new();
    out.push_str("; IR Module\n");
    out.push_str("declare i32 @getint()\n");
    out.push_str("declare void @putint(i32)\n");
    out.push_str("declare void @putch(i32)\n");
    out.push_str("declare void @putstr(i8*)\n");

    if !module.globals.is_empty() {
        out.push('\n');
        for &global in module.globals.iter() {
            write_global(module, global, &mut out);
        }
    }

    for &func in module.funcs.iter() {
        let data = module.func(func);
        if data.reserved {
            continue;
        }
        out.push('\n');
        let _ = write!(out, "define dso_local {} {}(", data.ty, data.name);
        for (i, &param) in data.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} {}", module.value(param).ty, value_str(module, param));
        }
        out.push_str(") {\n");
        for &block in data.blocks.iter() {
            let label = module.block(block).label;
            let _ = writeln!(out, "{}:", module.value(label).reg_id.unwrap_or(0));
            for &inst in module.block(block).insts.iter() {
                let _ = writeln!(out, "    {}", inst_str(module, inst));
            }
        }
        out.push_str("}\n");
    }
    out
}

fn write_global(module: &Module, global: crate::ir::GlobalId, out: &mut String) {
    let data = module.global(global);
    let _ = write!(out, "{} = dso_local global ", data.name);
    match &data.init {
        GlobalInit::Str(value) => {
            let _ = write!(out, "{} ", data.ty);
            out.push_str(&value_str(module, *value));
        }
        GlobalInit::Var(init) => {
            let var = module.var_init(*init);
            let mut cursor = 0usize;
            write_init(&var.ty, var.zero_init || !var.init, &var.values, &mut cursor, out);
        }
    }
    out.push('\n');
}

fn write_init(ty: &ValueType, zero: bool, values: &[i32], cursor: &mut usize, out: &mut String) {
    let _ = write!(out, "{} ", ty);
    if zero {
        if ty.is_array() {
            out.push_str("zeroinitializer");
        } else {
            out.push('0');
        }
        *cursor += ty.element_count().max(0) as usize;
        return;
    }
    if ty.is_array() {
        out.push('[');
        let mut elem_ty = ty.clone();
        elem_ty.pop();
        for i in 0..ty.dim(0).max(0) {
            if i > 0 {
                out.push_str(", ");
            }
            write_init(&elem_ty, false, values, cursor, out);
        }
        out.push(']');
    } else {
        let _ = write!(out, "{}", values.get(*cursor).copied().unwrap_or(0));
        *cursor += 1;
    }
}

/// Printable form of one value operand.
pub fn value_str(module: &Module, value: ValueId) -> String {
    let data = module.value(value);
    match &data.kind {
        ValueKind::Literal(n) => n.to_string(),
        ValueKind::Str(s) => {
            let mut out = String::from("c\"");
            for c in s.chars() {
                match c {
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\0a"),
                    _ => out.push(c),
                }
            }
            out.push_str("\\00\"");
            out
        }
        ValueKind::Label(block) => {
            let label = module.block(*block).label;
            format!("%{}", module.value(label).reg_id.unwrap_or(0))
        }
        _ => {
            if let Some(reg) = data.reg_id {
                format!("%{}", reg)
            } else if !data.name.is_empty() {
                data.name.clone()
            } else {
                "<value>".to_string()
            }
        }
    }
}

/// Printable form of one instruction.
pub fn inst_str(module: &Module, inst: InstId) -> String {
    let data = module.inst(inst);
    let ops = &data.operands;
    let v = |i: usize| value_str(module, ops[i]);
    match data.op {
        Opcode::Add => format!("{} = add {} {}, {}", v(0), data.ty, v(1), v(2)),
        Opcode::Sub => format!("{} = sub {} {}, {}", v(0), data.ty, v(1), v(2)),
        Opcode::Mul => format!("{} = mul {} {}, {}", v(0), data.ty, v(1), v(2)),
        Opcode::Sdiv => format!("{} = sdiv {} {}, {}", v(0), data.ty, v(1), v(2)),
        Opcode::Srem => format!("{} = srem {} {}, {}", v(0), data.ty, v(1), v(2)),
        Opcode::Icmp(cond) => {
            let cond = match cond {
                crate::ir::IcmpCond::Eq => "eq",
                crate::ir::IcmpCond::Ne => "ne",
                crate::ir::IcmpCond::Sgt => "sgt",
                crate::ir::IcmpCond::Sge => "sge",
                crate::ir::IcmpCond::Slt => "slt",
                crate::ir::IcmpCond::Sle => "sle",
            };
            format!("{} = icmp {} {} {}, {}", v(0), cond, data.ty, v(1), v(2))
        }
        Opcode::Call => {
            let (def, func_idx) = if data.no_def { (None, 0) } else { (Some(v(0)), 1) };
            let func = module.as_func(ops[func_idx]);
            let mut s = match def {
                Some(def) => format!("{} = call {} {}(", def, data.ty, module.func(func).name),
                None => format!("call {} {}(", data.ty, module.func(func).name),
            };
            for (i, &arg) in ops.iter().enumerate().skip(func_idx + 1) {
                if i > func_idx + 1 {
                    s.push_str(", ");
                }
                let _ = write!(s, "{} {}", module.value(arg).ty, value_str(module, arg));
            }
            s.push(')');
            s
        }
        Opcode::Alloca => format!("{} = alloca {}", v(0), data.ty),
        Opcode::Load => format!("{} = load {}, {}* {}", v(0), data.ty, data.ty, v(1)),
        Opcode::Store => format!("store {} {}, {}* {}", data.ty, v(0), data.ty, v(1)),
        Opcode::GetPtr => {
            let ptr_ty = data.ty2.clone().unwrap_or_else(|| data.ty.to_pointer());
            let mut s = format!(
                "{} = getelementptr {}, {} {}",
                v(0),
                data.ty,
                ptr_ty,
                v(1)
            );
            for i in 2..ops.len() {
                let _ = write!(s, ", {} {}", module.value(ops[i]).ty, v(i));
            }
            s
        }
        Opcode::Phi => {
            let mut s = format!("{} = phi {}", v(0), data.ty);
            let mut i = 1;
            while i + 1 < ops.len() {
                if i > 1 {
                    s.push(',');
                }
                let _ = write!(s, " [{}, {}]", v(i), v(i + 1));
                i += 2;
            }
            s
        }
        Opcode::Zext => {
            let to = data.ty2.clone().unwrap_or_else(ValueType::int);
            format!("{} = zext {} {} to {}", v(0), data.ty, v(1), to)
        }
        Opcode::Trunc => {
            let to = data.ty2.clone().unwrap_or_else(ValueType::bool_ty);
            format!("{} = trunc {} {} to {}", v(0), data.ty, v(1), to)
        }
        Opcode::Jump => format!("br label {}", v(0)),
        Opcode::Branch => format!("br i1 {}, label {}, label {}", v(0), v(1), v(2)),
        Opcode::Ret => {
            if ops.is_empty() {
                "ret void".to_string()
            } else {
                format!("ret {} {}", data.ty, v(0))
            }
        }
    }
}
