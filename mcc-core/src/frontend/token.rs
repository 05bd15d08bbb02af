//! Token Definitions

use crate::source::Location;

/// Token kinds of the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    IntConst,
    StrConst,

    Main,
    Const,
    Int,
    Break,
    Continue,
    If,
    Else,
    For,
    GetInt,
    Printf,
    Return,
    Void,

    Not,
    And,
    Or,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    Assign,
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Eof,
}

/// A scanned token with its location and payload.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Location,
    /// Verbatim source text of the token.
    pub text: String,
    /// Value of an integer literal.
    pub num_val: i32,
    /// Unquoted content of a string literal.
    pub str_val: String,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Location, text: impl Into<String>) -> Self {
        Self {
            kind,
            loc,
            text: text.into(),
            num_val: 0,
            str_val: String::new(),
        }
    }

    pub fn eof(loc: Location) -> Self {
        Self::new(TokenKind::Eof, loc, "")
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}
