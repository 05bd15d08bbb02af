//! IR construction and invariant tests.

use mcc_core::config::Config;
use mcc_core::errors::DiagnosticLog;
use mcc_core::frontend::{Lexer, Parser, SemanticAnalyzer};
use mcc_core::ir::builder::IrBuilder;
use mcc_core::ir::{Module, Opcode};

fn build(source: &str) -> Module {
    let config = Config::default();
    let mut diags = DiagnosticLog::new();
    let (tokens, _src) = Lexer::new(source).scan(&mut diags);
    let (mut unit, fatal) = Parser::parse(&tokens, &mut diags);
    assert!(!fatal && !diags.has_errors(), "front end rejected test source");
    let mut table = SemanticAnalyzer::analyze(&mut unit, &mut diags);
    assert!(!diags.has_errors(), "semantic analysis rejected test source");
    IrBuilder::build(&unit, &mut table, &config)
}

/// Invariant: every operand edge is mirrored exactly once in the referent's
/// use list, and every use record points back at a live operand slot.
fn check_use_lists(module: &Module) {
    for (id, inst) in module.inst_arena.iter().enumerate() {
        if inst.removed {
            continue;
        }
        for (index, &value) in inst.operands.iter().enumerate() {
            let count = module
                .value(value)
                .uses
                .iter()
                .filter(|u| u.inst.0 as usize == id && u.index == index)
                .count();
            assert_eq!(
                count, 1,
                "operand {} of instruction {} recorded {} times",
                index, id, count
            );
        }
    }
    for (vid, value) in module.values.iter().enumerate() {
        for u in value.uses.iter() {
            let inst = module.inst(u.inst);
            assert!(!inst.removed, "use list of value {} names a removed instruction", vid);
            assert_eq!(
                inst.operands[u.index].0 as usize, vid,
                "use record of value {} does not match the operand slot",
                vid
            );
        }
    }
}

/// Invariant: every block ends in exactly one terminator and terminators
/// appear only at block ends.
fn check_terminators(module: &Module) {
    for &func in module.funcs.iter() {
        if module.func(func).reserved {
            continue;
        }
        for &block in module.func(func).blocks.iter() {
            let insts = &module.block(block).insts;
            assert!(!insts.is_empty(), "empty basic block");
            for (i, &inst) in insts.iter().enumerate() {
                let is_last = i + 1 == insts.len();
                assert_eq!(
                    module.inst(inst).is_terminator(),
                    is_last,
                    "terminator placement violated"
                );
            }
        }
    }
}

#[test]
fn builds_locals_as_allocas() {
    let module = build("int main() { int a = 1; return a; }");
    check_use_lists(&module);
    check_terminators(&module);
    let main = module.main_func();
    let allocas = module
        .func(main)
        .blocks
        .iter()
        .flat_map(|&b| module.block(b).insts.iter())
        .filter(|&&i| module.inst(i).op == Opcode::Alloca)
        .count();
    assert_eq!(allocas, 1);
}

#[test]
fn main_is_the_last_function() {
    let module = build("int f() { return 1; } int main() { return f(); }");
    let main = module.main_func();
    assert_eq!(module.func(main).name, "@main");
    for &func in module.funcs.iter().take(4) {
        assert!(module.func(func).reserved, "intrinsics lead the function order");
    }
}

#[test]
fn if_lowers_to_branches() {
    let module = build("int main() { int a = 1; if (a) { a = 2; } else { a = 3; } return a; }");
    check_use_lists(&module);
    check_terminators(&module);
    let main = module.main_func();
    let branches = module
        .func(main)
        .blocks
        .iter()
        .flat_map(|&b| module.block(b).insts.iter())
        .filter(|&&i| module.inst(i).op == Opcode::Branch)
        .count();
    assert!(branches >= 1);
}

#[test]
fn short_circuit_and_threads_blocks() {
    let module = build(
        "int main() { int a = 1; int b = 2; if (a && b) { return 1; } return 0; }",
    );
    check_use_lists(&module);
    check_terminators(&module);
    // Two conditional branches: one per operand of &&.
    let main = module.main_func();
    let branches = module
        .func(main)
        .blocks
        .iter()
        .flat_map(|&b| module.block(b).insts.iter())
        .filter(|&&i| module.inst(i).op == Opcode::Branch)
        .count();
    assert_eq!(branches, 2);
}

#[test]
fn computed_expressions_emit_no_arithmetic() {
    let module = build("const int c = 6; int main() { return c * 7; }");
    let main = module.main_func();
    let arith = module
        .func(main)
        .blocks
        .iter()
        .flat_map(|&b| module.block(b).insts.iter())
        .filter(|&&i| {
            matches!(
                module.inst(i).op,
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Sdiv
            )
        })
        .count();
    assert_eq!(arith, 0, "semantic folding should bypass instruction emission");
}

#[test]
fn printf_splits_into_intrinsic_calls() {
    let module = build("int main() { printf(\"sum=%d\\n\", 42); return 0; }");
    check_use_lists(&module);
    // "sum=" is long enough to intern; "\n" prints via putch.
    assert!(!module.globals.is_empty());
    let main = module.main_func();
    let calls: Vec<_> = module
        .func(main)
        .blocks
        .iter()
        .flat_map(|&b| module.block(b).insts.iter())
        .filter(|&&i| module.inst(i).op == Opcode::Call)
        .collect();
    assert_eq!(calls.len(), 3, "putstr + putint + putch");
}

#[test]
fn scalar_params_are_spilled_to_slots() {
    let module = build("int f(int x) { return x; } int main() { return f(1); }");
    check_use_lists(&module);
    let f = module.funcs[4];
    assert_eq!(module.func(f).name, "@f");
    let entry = module.func(f).blocks[0];
    let ops: Vec<Opcode> = module
        .block(entry)
        .insts
        .iter()
        .map(|&i| module.inst(i).op)
        .collect();
    assert!(ops.contains(&Opcode::Alloca));
    assert!(ops.contains(&Opcode::Store));
}

#[test]
fn use_lists_stay_consistent_after_optimization() {
    let source = "
        int fib(int n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
        int main() {
            int i;
            int s = 0;
            for (i = 0; i < 5; i = i + 1) { s = s + fib(i); }
            printf(\"%d\\n\", s);
            return 0;
        }
    ";
    let mut module = build(source);
    let config = Config::default();
    mcc_core::opt::IrOptimizer::run(&mut module, &config);
    check_use_lists(&module);
    check_terminators(&module);
}

#[test]
fn mem2reg_promotes_scalar_slots() {
    let source = "int main() { int a = 1; int b = a + 2; return b; }";
    let mut module = build(source);
    let config = Config {
        enable_ir_opt: false,
        ..Config::default()
    };
    mcc_core::opt::IrOptimizer::run(&mut module, &config);
    check_use_lists(&module);
    let main = module.main_func();
    let allocas = module
        .func(main)
        .blocks
        .iter()
        .flat_map(|&b| module.block(b).insts.iter())
        .filter(|&&i| module.inst(i).op == Opcode::Alloca)
        .count();
    assert_eq!(allocas, 0, "scalar slots should be promoted to SSA");

    // Invariant: each value has at most one defining instruction.
    for value in 0..module.values.len() {
        let defs = module
            .values[value]
            .uses
            .iter()
            .filter(|u| {
                let inst = module.inst(u.inst);
                u.index == 0 && !inst.removed && !inst.no_def && !inst.is_terminator()
            })
            .count();
        assert!(defs <= 1, "value {} defined {} times", value, defs);
    }
}
