//! Optimization pipeline tests.

use mcc_core::config::Config;
use mcc_core::errors::DiagnosticLog;
use mcc_core::frontend::{Lexer, Parser, SemanticAnalyzer};
use mcc_core::ir::builder::IrBuilder;
use mcc_core::ir::{display, Module};
use mcc_core::opt::IrOptimizer;

fn optimized(source: &str) -> Module {
    let config = Config::default();
    let mut diags = DiagnosticLog::new();
    let (tokens, _src) = Lexer::new(source).scan(&mut diags);
    let (mut unit, fatal) = Parser::parse(&tokens, &mut diags);
    assert!(!fatal && !diags.has_errors());
    let mut table = SemanticAnalyzer::analyze(&mut unit, &mut diags);
    assert!(!diags.has_errors());
    let mut module = IrBuilder::build(&unit, &mut table, &config);
    IrOptimizer::run(&mut module, &config);
    module
}

fn inst_count(module: &Module) -> usize {
    module
        .funcs
        .iter()
        .flat_map(|&f| module.func(f).blocks.iter())
        .map(|&b| module.block(b).insts.len())
        .sum()
}

#[test]
fn pipeline_output_is_a_fixpoint() {
    let source = "
        int square(int x) { return x * x; }
        int main() {
            int i;
            int s = 0;
            for (i = 0; i < 8; i = i + 1) { s = s + square(i); }
            printf(\"%d\\n\", s);
            return 0;
        }
    ";
    let mut module = optimized(source);
    let before = display::module_to_string(&module);
    let config = Config::default();
    IrOptimizer::run(&mut module, &config);
    let after = display::module_to_string(&module);
    assert_eq!(before, after, "re-running the pipeline must be a no-op");
}

#[test]
fn constant_folding_collapses_arithmetic() {
    let module = optimized("int main() { int a = 3; int b = 4; printf(\"%d\\n\", a * b + 2); return 0; }");
    let main = module.main_func();
    // One block: putint(14), putch, exit.
    assert_eq!(module.func(main).blocks.len(), 1);
    let has_fourteen = module
        .values
        .iter()
        .any(|v| matches!(v.kind, mcc_core::ir::ValueKind::Literal(14) if !v.uses.is_empty()));
    assert!(has_fourteen, "a*b+2 should fold to 14");
}

#[test]
fn dead_functions_are_removed() {
    let module = optimized(
        "int unused(int x) { return x * 31337; }
         int main() { return 0; }",
    );
    assert!(
        module
            .funcs
            .iter()
            .all(|&f| module.func(f).name != "@unused"),
        "functions unreachable from main are dropped"
    );
}

#[test]
fn evaluator_folds_recursive_calls() {
    let module = optimized(
        "int fib(int n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
         int main() { printf(\"%d\\n\", fib(10)); return 0; }",
    );
    // The call is evaluated away and fib becomes unreachable.
    assert!(module.funcs.iter().all(|&f| module.func(f).name != "@fib"));
    let has_55 = module
        .values
        .iter()
        .any(|v| matches!(v.kind, mcc_core::ir::ValueKind::Literal(55) if !v.uses.is_empty()));
    assert!(has_55, "fib(10) should evaluate to 55");
}

#[test]
fn evaluator_agrees_with_constant_folding() {
    // The same computation through a call and through folded arithmetic
    // must produce the same constant.
    let through_call = optimized(
        "int f(int a, int b) { return (a * 17 - b) / 3 % 100; }
         int main() { printf(\"%d\\n\", f(12, 9)); return 0; }",
    );
    let through_fold = optimized(
        "int main() { int a = 12; int b = 9; printf(\"%d\\n\", (a * 17 - b) / 3 % 100); return 0; }",
    );
    let literal_of = |module: &Module| {
        module
            .values
            .iter()
            .filter_map(|v| match v.kind {
                mcc_core::ir::ValueKind::Literal(n) if !v.uses.is_empty() && n > 10 => Some(n),
                _ => None,
            })
            .max()
    };
    let a = literal_of(&through_call);
    let b = literal_of(&through_fold);
    assert!(a.is_some());
    assert_eq!(a, b);
}

#[test]
fn counting_loops_collapse() {
    let module = optimized(
        "int main() {
             int i;
             int s = 0;
             for (i = 1; i <= 100; i = i + 1) { s = s + i; }
             printf(\"%d\\n\", s);
             return 0;
         }",
    );
    let has_sum = module
        .values
        .iter()
        .any(|v| matches!(v.kind, mcc_core::ir::ValueKind::Literal(5050) if !v.uses.is_empty()));
    assert!(has_sum, "the fully unrolled loop should fold to 5050");
    let main = module.main_func();
    assert_eq!(
        module.func(main).blocks.len(),
        1,
        "no control flow should remain"
    );
}

#[test]
fn dead_code_disappears() {
    let before = optimized("int main() { int a = 3; int b = a * 10449; return 0; }");
    let has_product = before
        .values
        .iter()
        .any(|v| matches!(v.kind, mcc_core::ir::ValueKind::Literal(31347) if !v.uses.is_empty()));
    assert!(!has_product, "the unused product must not survive");
    assert!(inst_count(&before) <= 2, "main reduces to its return");
}

#[test]
fn global_array_of_constants_scalarizes() {
    let module = optimized(
        "const int a[3] = {1, 2, 3};
         int main() {
             int i;
             int s = 0;
             for (i = 0; i < 3; i = i + 1) { s = s + a[i]; }
             printf(\"%d\\n\", s);
             return 0;
         }",
    );
    assert!(module.globals.is_empty(), "the const array becomes scalars");
    let has_six = module
        .values
        .iter()
        .any(|v| matches!(v.kind, mcc_core::ir::ValueKind::Literal(6) if !v.uses.is_empty()));
    assert!(has_six, "the element sum should fold to 6");
}
