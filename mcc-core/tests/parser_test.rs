//! Parser tests.

use mcc_core::errors::{DiagnosticKind, DiagnosticLog};
use mcc_core::frontend::ast::*;
use mcc_core::frontend::{Lexer, Parser};

fn parse(source: &str) -> (CompUnit, bool, DiagnosticLog) {
    let mut diags = DiagnosticLog::new();
    let (tokens, _src) = Lexer::new(source).scan(&mut diags);
    let (unit, fatal) = Parser::parse(&tokens, &mut diags);
    (unit, fatal, diags)
}

#[test]
fn parses_declarations_functions_and_main() {
    let source = "
        const int N = 10;
        int g;
        int add(int a, int b) { return a + b; }
        int main() { return add(g, N); }
    ";
    let (unit, fatal, diags) = parse(source);
    assert!(!fatal);
    assert!(!diags.has_errors());
    assert_eq!(unit.decls.len(), 2);
    assert_eq!(unit.funcs.len(), 1);
    assert!(unit.main.is_some());
    assert!(unit.decls[0].is_const);
    assert_eq!(unit.funcs[0].ident.text, "add");
    assert_eq!(unit.funcs[0].params.len(), 2);
}

#[test]
fn parses_array_declarations() {
    let (unit, fatal, _) = parse("int a[2][3] = {{1, 2, 3}, {4, 5, 6}}; int main() { return 0; }");
    assert!(!fatal);
    let def = &unit.decls[0].defs[0];
    assert_eq!(def.dims.len(), 2);
    assert!(matches!(def.init, Some(InitVal::List(_, _))));
}

#[test]
fn parses_control_flow() {
    let source = "
        int main() {
            int i;
            int s = 0;
            for (i = 0; i < 10; i = i + 1) {
                if (i == 5) break;
                s = s + i;
            }
            return s;
        }
    ";
    let (unit, fatal, diags) = parse(source);
    assert!(!fatal);
    assert!(!diags.has_errors());
    let main = unit.main.unwrap();
    let has_for = main
        .body
        .items
        .iter()
        .any(|item| matches!(item, BlockItem::Stmt(Stmt::For { .. })));
    assert!(has_for);
}

#[test]
fn distinguishes_getint_from_assignment() {
    let (unit, fatal, _) = parse("int main() { int a; a = getint(); a = a + 1; return a; }");
    assert!(!fatal);
    let main = unit.main.unwrap();
    let stmts: Vec<&Stmt> = main
        .body
        .items
        .iter()
        .filter_map(|i| match i {
            BlockItem::Stmt(s) => Some(s),
            _ => None,
        })
        .collect();
    assert!(matches!(stmts[0], Stmt::GetInt { .. }));
    assert!(matches!(stmts[1], Stmt::Assign { .. }));
}

#[test]
fn expression_precedence_nests_left() {
    let (unit, _, _) = parse("int main() { return 1 + 2 * 3; }");
    let main = unit.main.unwrap();
    let BlockItem::Stmt(Stmt::Return { expr: Some(expr), .. }) = &main.body.items[0] else {
        panic!("expected return statement");
    };
    // Addition at the top, multiplication underneath.
    let ExprKind::Binary { op: BinaryOp::Add, rhs, .. } = &expr.kind else {
        panic!("expected addition at the root");
    };
    assert!(matches!(
        rhs.kind,
        ExprKind::Binary { op: BinaryOp::Mul, .. }
    ));
}

#[test]
fn inserts_missing_semicolon() {
    let (_, fatal, diags) = parse("int main() { int a = 1 return a; }");
    assert!(!fatal);
    assert!(diags
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::MissingSemicolon));
}

#[test]
fn inserts_missing_rparen() {
    let (_, fatal, diags) = parse("int main() { if (1 { } return 0; }");
    assert!(!fatal);
    assert!(diags
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::MissingRParen));
}

#[test]
fn missing_main_is_fatal() {
    let (_, fatal, _) = parse("int f() { return 0; }");
    assert!(fatal);
}
