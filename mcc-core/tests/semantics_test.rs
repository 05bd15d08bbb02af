//! Semantic analysis tests.

use mcc_core::errors::{DiagnosticKind, DiagnosticLog};
use mcc_core::frontend::{Lexer, Parser, SemanticAnalyzer, SymbolTable};

fn analyze(source: &str) -> (SymbolTable, DiagnosticLog) {
    let mut diags = DiagnosticLog::new();
    let (tokens, _src) = Lexer::new(source).scan(&mut diags);
    let (mut unit, fatal) = Parser::parse(&tokens, &mut diags);
    assert!(!fatal, "parse failed for test source");
    let table = SemanticAnalyzer::analyze(&mut unit, &mut diags);
    (table, diags)
}

fn kinds(diags: &DiagnosticLog) -> Vec<DiagnosticKind> {
    diags.diagnostics().iter().map(|d| d.kind).collect()
}

#[test]
fn accepts_a_well_typed_program() {
    let (_, diags) = analyze(
        "int f(int x) { return x * 2; }
         int main() { int a = 3; return f(a); }",
    );
    assert!(!diags.has_errors(), "{:?}", kinds(&diags));
}

#[test]
fn reports_duplicate_identifiers() {
    let (_, diags) = analyze("int main() { int a; int a; return 0; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::DuplicateIdent));
}

#[test]
fn reports_undefined_identifiers() {
    let (_, diags) = analyze("int main() { return x; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::UndefinedIdent));
}

#[test]
fn inner_scopes_shadow_outer_ones() {
    let (_, diags) = analyze("int main() { int a = 1; { int a = 2; a = 3; } return a; }");
    assert!(!diags.has_errors());
}

#[test]
fn reports_assignment_to_const() {
    let (_, diags) = analyze("const int c = 1; int main() { c = 2; return 0; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::ConstAssign));
}

#[test]
fn reports_break_outside_loop() {
    let (_, diags) = analyze("int main() { break; return 0; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::BreakContinueOutsideLoop));
}

#[test]
fn reports_argument_count_mismatch() {
    let (_, diags) = analyze(
        "int f(int a, int b) { return a + b; }
         int main() { return f(1); }",
    );
    assert!(kinds(&diags).contains(&DiagnosticKind::FuncArgCount));
}

#[test]
fn reports_array_argument_type_mismatch() {
    let (_, diags) = analyze(
        "int f(int a[]) { return a[0]; }
         int main() { int x; return f(x); }",
    );
    assert!(kinds(&diags).contains(&DiagnosticKind::FuncArgType));
}

#[test]
fn accepts_array_argument_of_matching_shape() {
    let (_, diags) = analyze(
        "int f(int a[][3]) { return a[0][0]; }
         int main() { int m[2][3]; return f(m); }",
    );
    assert!(!diags.has_errors(), "{:?}", kinds(&diags));
}

#[test]
fn reports_missing_return() {
    let (_, diags) = analyze("int f() { int a = 1; } int main() { return f(); }");
    assert!(kinds(&diags).contains(&DiagnosticKind::MissingReturn));
}

#[test]
fn reports_printf_arity_mismatch() {
    let (_, diags) = analyze("int main() { printf(\"%d %d\\n\", 1); return 0; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::PrintfArgs));
}

#[test]
fn reports_illegal_format_characters() {
    let (_, diags) = analyze("int main() { printf(\"%c\\n\"); return 0; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::IllegalSymbol));
}

#[test]
fn reports_compile_time_division_by_zero() {
    let (_, diags) = analyze("const int c = 1 / 0; int main() { return 0; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::DivisionByZero));
}

#[test]
fn reports_negative_array_length() {
    let (_, diags) = analyze("int main() { int a[-1]; return 0; }");
    assert!(kinds(&diags).contains(&DiagnosticKind::NegativeArrayLength));
}

#[test]
fn flattens_const_array_initializers() {
    let (table, diags) = analyze(
        "const int a[2][3] = {{1, 2}, {4, 5, 6}};
         int main() { return a[1][2]; }",
    );
    assert!(!diags.has_errors());
    let var = table.lookup_var(table.root(), "a").unwrap();
    // Row-major with the missing element zero padded.
    assert_eq!(table.var(var).init_values, vec![1, 2, 0, 4, 5, 6]);
    assert!(table.var(var).init);
}

#[test]
fn diagnostics_sort_by_position() {
    let mut diags = DiagnosticLog::new();
    let (tokens, _) = Lexer::new("int main() { y = 1; x = 2; return 0; }").scan(&mut diags);
    let (mut unit, _) = Parser::parse(&tokens, &mut diags);
    SemanticAnalyzer::analyze(&mut unit, &mut diags);
    let listing = diags.render_plain();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    // Both on line 1, both undefined-identifier.
    assert!(lines.iter().all(|l| l.ends_with(" c")));
}
