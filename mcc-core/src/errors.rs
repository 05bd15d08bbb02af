//! Diagnostics and Error Handling
//!
//! Two error surfaces live here:
//!
//! - `CompileError`, the `thiserror` enum returned by pipeline stages to the
//!   driver (I/O failures, a front end that raised diagnostics).
//! - `DiagnosticLog`, the accumulator for user-facing front-end diagnostics.
//!   Diagnostics do not abort analysis; they collect with their source
//!   locations and are sorted by position before emission. Any recorded
//!   diagnostic prevents the backend from running.
//!
//! The backend itself never reports diagnostics: it runs on well-typed input
//! and treats invariant violations as programmer errors.

use crate::source::{Location, SourceCode};
use thiserror::Error;

/// Errors surfaced to the driver.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Reading the input or writing an output stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The front end raised diagnostics; the log has already been emitted.
    #[error("{0} error(s) in source program")]
    SourceErrors(usize),
}

/// Diagnostic kinds raised by the lexer, parser, and semantic analyzer.
///
/// The single-letter codes are the stable external identifiers used by the
/// plain-text error listing; kinds with an empty code are only reported in
/// the human-readable listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    IllegalSymbol,
    DuplicateIdent,
    UndefinedIdent,
    FuncArgCount,
    FuncArgType,
    UnexpectedReturn,
    MissingReturn,
    ConstAssign,
    MissingSemicolon,
    MissingRParen,
    MissingRBracket,
    PrintfArgs,
    BreakContinueOutsideLoop,
    UnknownToken,
    UnexpectedToken,
    DivisionByZero,
    NegativeArrayLength,
    IndeterminateArrayLength,
    InitValCount,
    IndeterminateInitVal,
    ArrayDimMismatch,
    InvalidOperandTypes,
    IndexNotInt,
    CondNotInt,
    ReturnTypeMismatch,
}

impl DiagnosticKind {
    /// Stable single-letter code, empty for internal-only kinds.
    pub fn code(self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            IllegalSymbol => "a",
            DuplicateIdent => "b",
            UndefinedIdent => "c",
            FuncArgCount => "d",
            FuncArgType => "e",
            UnexpectedReturn => "f",
            MissingReturn => "g",
            ConstAssign => "h",
            MissingSemicolon => "i",
            MissingRParen => "j",
            MissingRBracket => "k",
            PrintfArgs => "l",
            BreakContinueOutsideLoop => "m",
            _ => "",
        }
    }

    /// Human-readable message.
    pub fn message(self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            IllegalSymbol => "illegal symbol",
            DuplicateIdent => "duplicated identifier",
            UndefinedIdent => "undefined identifier",
            FuncArgCount => "function arguments count mismatched with definition",
            FuncArgType => "function argument type mismatched with definition",
            UnexpectedReturn => "unexpected return statement",
            MissingReturn => "return statement expected",
            ConstAssign => "cannot assign to constant",
            MissingSemicolon => "semicolon token ';' expected",
            MissingRParen => "right parenthesis token ')' expected",
            MissingRBracket => "right bracket token ']' expected",
            PrintfArgs => "arguments mismatched with format string",
            BreakContinueOutsideLoop => "unexpected break or continue statement without loop",
            UnknownToken => "unknown token",
            UnexpectedToken => "unexpected token",
            DivisionByZero => "division by zero",
            NegativeArrayLength => "array length should be non-negative integer",
            IndeterminateArrayLength => "array length cannot be determined",
            InitValCount => "initial value mismatched with definition",
            IndeterminateInitVal => "initial value cannot be determined",
            ArrayDimMismatch => "array dimensions mismatched with definition",
            InvalidOperandTypes => "operation should be applied to 'int' type",
            IndexNotInt => "array index should be 'int' type",
            CondNotInt => "condition should be int type",
            ReturnTypeMismatch => "return value type mismatched",
        }
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, Copy)]
pub struct Diagnostic {
    pub loc: Location,
    pub kind: DiagnosticKind,
}

/// Accumulator for front-end diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    diags: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, loc: Location, kind: DiagnosticKind) {
        log::debug!("diagnostic at {}:{}: {}", loc.line, loc.col, kind.message());
        self.diags.push(Diagnostic { loc, kind });
    }

    pub fn has_errors(&self) -> bool {
        !self.diags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// Render every diagnostic, sorted by source position, with the source
    /// line and a caret under the offending column.
    pub fn render(&self, src: &SourceCode) -> String {
        let mut sorted: Vec<Diagnostic> = self.diags.clone();
        sorted.sort_by_key(|d| (d.loc.line, d.loc.col));

        let mut out = String::new();
        for diag in sorted.iter() {
            out.push_str(&format!(
                "{}error: {}\n",
                diag.loc,
                diag.kind.message()
            ));
            out.push_str(&format!("{:>5} | {}\n", diag.loc.line, src.line(diag.loc.line)));
            out.push_str(&format!("      |{}^\n", " ".repeat(diag.loc.col)));
        }
        out
    }

    /// Render the plain-text listing: `line code` per diagnostic that carries
    /// a stable code, sorted by position.
    pub fn render_plain(&self) -> String {
        let mut sorted: Vec<Diagnostic> = self.diags.clone();
        sorted.sort_by_key(|d| (d.loc.line, d.loc.col));

        let mut out = String::new();
        for diag in sorted.iter() {
            let code = diag.kind.code();
            if !code.is_empty() {
                out.push_str(&format!("{} {}\n", diag.loc.line, code));
            }
        }
        out
    }
}
