//! Lexer tests.

use mcc_core::errors::DiagnosticLog;
use mcc_core::frontend::token::TokenKind;
use mcc_core::frontend::Lexer;

fn scan(source: &str) -> (Vec<mcc_core::frontend::token::Token>, DiagnosticLog) {
    let mut diags = DiagnosticLog::new();
    let (tokens, _src) = Lexer::new(source).scan(&mut diags);
    (tokens, diags)
}

#[test]
fn scans_keywords_and_identifiers() {
    let (tokens, diags) = scan("int main() { return mainx; }");
    assert!(!diags.has_errors());
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Int,
            TokenKind::Main,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Return,
            TokenKind::Ident,
            TokenKind::Semicolon,
            TokenKind::RBrace,
        ]
    );
    assert_eq!(tokens[6].text, "mainx");
}

#[test]
fn scans_numbers() {
    let (tokens, _) = scan("123 0 42");
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].num_val, 123);
    assert_eq!(tokens[1].num_val, 0);
    assert_eq!(tokens[2].num_val, 42);
}

#[test]
fn leading_zero_terminates_a_literal() {
    // "01" is the literal 0 followed by the literal 1.
    let (tokens, _) = scan("01");
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].num_val, 0);
    assert_eq!(tokens[1].num_val, 1);
}

#[test]
fn scans_two_char_operators() {
    let (tokens, _) = scan("a <= b == c && d || !e != f");
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert!(kinds.contains(&TokenKind::Le));
    assert!(kinds.contains(&TokenKind::Eq));
    assert!(kinds.contains(&TokenKind::And));
    assert!(kinds.contains(&TokenKind::Or));
    assert!(kinds.contains(&TokenKind::Not));
    assert!(kinds.contains(&TokenKind::Ne));
}

#[test]
fn skips_comments() {
    let (tokens, diags) = scan("int a; // line comment\n/* block\ncomment */ int b;");
    assert!(!diags.has_errors());
    let idents: Vec<&str> = tokens
        .iter()
        .filter(|t| t.is(TokenKind::Ident))
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(idents, vec!["a", "b"]);
}

#[test]
fn scans_string_literals() {
    let (tokens, _) = scan("printf(\"a=%d\\n\", a);");
    let string = tokens.iter().find(|t| t.is(TokenKind::StrConst)).unwrap();
    assert_eq!(string.str_val, "a=%d\\n");
}

#[test]
fn tracks_line_numbers() {
    let (tokens, _) = scan("int a;\nint b;");
    assert_eq!(tokens[0].loc.line, 1);
    assert_eq!(tokens[3].loc.line, 2);
}

#[test]
fn raises_on_unknown_character() {
    let (_, diags) = scan("int a = #;");
    assert!(diags.has_errors());
}
