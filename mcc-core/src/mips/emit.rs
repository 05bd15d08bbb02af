//! Assembly Emission
//!
//! Renders the allocated machine module as MARS/SPIM-style MIPS text: a
//! `.data` section of `.word`/`.space`/`.ascii` directives, then `.text`
//! beginning at the fixed `libmain:` entry which allocates `main`'s frame,
//! `main` itself, and every other function after it.

use crate::mips::{MFuncId, MGlobalData, MInstId, MModule, MOp, Reg};
use std::fmt::Write;

pub fn reg_str(reg: &Reg) -> String {
    match reg {
        Reg::Phys(p) => p.name().to_string(),
        Reg::Virt(id) => format!("$virtual{}", id),
        Reg::Imm(v) => v.to_string(),
        Reg::FrameSize { .. } => "<frame>".to_string(),
        Reg::Label(label) => label.clone(),
    }
}

/// Render one instruction.
pub fn inst_str(module: &MModule, inst: MInstId) -> String {
    let data = module.inst(inst);
    match data.op {
        MOp::Lw | MOp::Sw | MOp::La => {
            // `op $r, label + off` or `op $r, off($base)`.
            let dest = reg_str(&data.operands[0]);
            let offset = &data.operands[1];
            let base = &data.operands[2];
            if matches!(base, Reg::Label(_)) {
                if offset.imm() != 0 {
                    format!(
                        "{} {}, {} + {}",
                        data.op.mnemonic(),
                        dest,
                        reg_str(base),
                        offset.imm()
                    )
                } else {
                    format!("{} {}, {}", data.op.mnemonic(), dest, reg_str(base))
                }
            } else {
                format!(
                    "{} {}, {}({})",
                    data.op.mnemonic(),
                    dest,
                    offset.imm(),
                    reg_str(base)
                )
            }
        }
        _ => {
            let mut out = data.op.mnemonic().to_string();
            for (i, operand) in data.operands.iter().enumerate() {
                out.push_str(if i == 0 { " " } else { ", " });
                out.push_str(&reg_str(operand));
            }
            out
        }
    }
}

fn write_func(module: &MModule, func: MFuncId, out: &mut String) {
    for &block in module.func(func).blocks.iter() {
        let _ = write!(out, "\n{}:\n", reg_str(&module.block(block).label));
        for &inst in module.block(block).insts.iter() {
            let _ = writeln!(out, "{}", inst_str(module, inst));
        }
    }
}

/// Render the whole module.
pub fn emit(module: &MModule) -> String {
    let mut out = String::new();

    out.push_str(".data\n");
    for data in module.datas.iter() {
        match data {
            MGlobalData::Word {
                label,
                size,
                zero,
                values,
            } => {
                if *zero {
                    let _ = writeln!(out, "{}: .space {}", label, size);
                } else {
                    let _ = write!(out, "{}: .word ", label);
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "{}", v);
                    }
                    out.push('\n');
                }
            }
            MGlobalData::Ascii { label, text } => {
                let _ = write!(out, "{}: .ascii \"", label);
                for c in text.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\0' => out.push_str("\\0"),
                        _ => out.push(c),
                    }
                }
                // Strings are NUL-terminated for the print-string syscall.
                out.push_str("\\0\"\n");
            }
        }
    }

    out.push_str("\n.text\n");
    out.push_str("libmain:\n");
    let main = module.main_func();
    let push = module.frame_delta(main, false);
    if push != 0 {
        let _ = writeln!(out, "add $sp, $sp, {}", push);
    }
    write_func(module, main, &mut out);
    for &func in module.funcs.iter() {
        if func != main {
            write_func(module, func, &mut out);
        }
    }
    out
}
