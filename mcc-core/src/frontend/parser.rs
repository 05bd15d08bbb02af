//! Syntactic Analysis
//!
//! Recursive descent over the token stream. Grammar:
//!
//! ```text
//! CompUnit   = {Decl} {FuncDef} MainFuncDef
//! Decl       = ['const'] 'int' VarDef {',' VarDef} ';'
//! VarDef     = Ident {'[' ConstExp ']'} ['=' InitVal]
//! InitVal    = Exp | '{' [InitVal {',' InitVal}] '}'
//! FuncDef    = ('void'|'int') Ident '(' [Params] ')' Block
//! Stmt       = LVal '=' Exp ';' | LVal '=' 'getint' '(' ')' ';'
//!            | [Exp] ';' | Block | 'if' ... | 'for' ... | 'break' ';'
//!            | 'continue' ';' | 'return' [Exp] ';' | 'printf' ... ';'
//! Exp chain  = LOr > LAnd > Eq > Rel > Add > Mul > Unary > Primary
//! ```
//!
//! Error recovery: a missing `;` `)` `]` is *inserted*: the dedicated
//! diagnostic is raised at the previous token and parsing continues as if
//! the token were present. Any other mismatch raises a generic diagnostic
//! once, skips to a synchronization token, and marks the parse fatal so the
//! driver aborts before semantic analysis.

use crate::errors::{DiagnosticKind, DiagnosticLog};
use crate::frontend::ast::*;
use crate::frontend::token::{Token, TokenKind};
use crate::ir::types::{BaseType, ValueType};
use crate::source::Location;

use TokenKind as Tk;

/// Recursive-descent parser state.
pub struct Parser<'a> {
    tokens: &'a [Token],
    cur: usize,
    last_loc: Location,
    skip: bool,
    /// Set when recovery consumed tokens it could not explain; the unit is
    /// not analyzable.
    pub fatal: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            cur: 0,
            last_loc: Location::new(1, 0),
            skip: false,
            fatal: false,
        }
    }

    /// Parse a whole compilation unit.
    pub fn parse(tokens: &'a [Token], diags: &mut DiagnosticLog) -> (CompUnit, bool) {
        let mut parser = Parser::new(tokens);
        let unit = parser.comp_unit(diags);
        (unit, parser.fatal)
    }

    fn lookahead(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.cur + ahead)
            .map(|t| t.kind)
            .unwrap_or(Tk::Eof)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.lookahead(0) == kind
    }

    fn at_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.lookahead(0))
    }

    fn at_seq(&self, kinds: &[TokenKind]) -> bool {
        kinds
            .iter()
            .enumerate()
            .all(|(i, &k)| self.lookahead(i) == k)
    }

    fn loc(&self) -> Location {
        self.tokens
            .get(self.cur)
            .map(|t| t.loc)
            .unwrap_or(self.last_loc)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.cur].clone();
        self.cur += 1;
        self.last_loc = token.loc;
        self.skip = false;
        token
    }

    /// Consume a token of `kind`, or recover. `;` `)` `]` are inserted with
    /// their dedicated diagnostics; anything else skips to a sync token.
    fn expect(&mut self, kind: TokenKind, diags: &mut DiagnosticLog) -> Token {
        if self.at(kind) {
            return self.bump();
        }

        let inserted = match kind {
            Tk::Semicolon => Some(DiagnosticKind::MissingSemicolon),
            Tk::RParen => Some(DiagnosticKind::MissingRParen),
            Tk::RBracket => Some(DiagnosticKind::MissingRBracket),
            _ => None,
        };
        if let Some(diag) = inserted {
            diags.raise(self.last_loc, diag);
            return Token::new(kind, self.last_loc, "");
        }

        if !self.skip {
            diags.raise(self.loc(), DiagnosticKind::UnexpectedToken);
            self.skip = true;
        }
        while !self.at_any(&[Tk::Semicolon, Tk::RBrace, Tk::LBrace, Tk::Eof]) {
            self.cur += 1;
        }
        self.fatal = true;
        Token::new(kind, self.last_loc, "")
    }

    // --- Declarations ---

    fn comp_unit(&mut self, diags: &mut DiagnosticLog) -> CompUnit {
        let mut decls = Vec::new();
        let mut funcs = Vec::new();

        while self.looks_like_decl() {
            decls.push(self.decl(diags));
        }
        while self.looks_like_func_def() {
            funcs.push(self.func_def(diags));
        }

        let main = if self.at_seq(&[Tk::Int, Tk::Main, Tk::LParen]) {
            Some(self.main_func_def(diags))
        } else {
            self.fatal = true;
            None
        };

        CompUnit { decls, funcs, main }
    }

    fn looks_like_decl(&self) -> bool {
        if self.at(Tk::Const) {
            return true;
        }
        self.at_seq(&[Tk::Int, Tk::Ident]) && self.lookahead(2) != Tk::LParen
    }

    fn looks_like_func_def(&self) -> bool {
        self.at(Tk::Void) || self.at_seq(&[Tk::Int, Tk::Ident, Tk::LParen])
    }

    fn decl(&mut self, diags: &mut DiagnosticLog) -> Decl {
        let is_const = self.at(Tk::Const);
        if is_const {
            self.bump();
        }
        self.expect(Tk::Int, diags);
        let mut defs = vec![self.var_def(is_const, diags)];
        while self.at(Tk::Comma) {
            self.bump();
            defs.push(self.var_def(is_const, diags));
        }
        self.expect(Tk::Semicolon, diags);
        Decl { is_const, defs }
    }

    fn var_def(&mut self, is_const: bool, diags: &mut DiagnosticLog) -> VarDef {
        let ident = self.expect(Tk::Ident, diags);
        let mut dims = Vec::new();
        while self.at(Tk::LBracket) {
            self.bump();
            dims.push(self.expr(diags));
            self.expect(Tk::RBracket, diags);
        }
        let init = if is_const {
            self.expect(Tk::Assign, diags);
            Some(self.init_val(diags))
        } else if self.at(Tk::Assign) {
            self.bump();
            Some(self.init_val(diags))
        } else {
            None
        };
        VarDef {
            ident,
            is_const,
            dims,
            init,
            var: None,
            dummy: false,
        }
    }

    fn init_val(&mut self, diags: &mut DiagnosticLog) -> InitVal {
        if self.at(Tk::LBrace) {
            let loc = self.loc();
            self.bump();
            let mut items = vec![self.init_val(diags)];
            while self.at(Tk::Comma) {
                self.bump();
                items.push(self.init_val(diags));
            }
            self.expect(Tk::RBrace, diags);
            InitVal::List(items, loc)
        } else {
            InitVal::Expr(self.expr(diags))
        }
    }

    // --- Functions ---

    fn func_def(&mut self, diags: &mut DiagnosticLog) -> FuncDef {
        let ret_ty = if self.at(Tk::Void) {
            self.bump();
            ValueType::void()
        } else {
            self.expect(Tk::Int, diags);
            ValueType::scalar(BaseType::I32)
        };
        let ident = self.expect(Tk::Ident, diags);
        self.expect(Tk::LParen, diags);
        let mut params = Vec::new();
        if !self.at_any(&[Tk::RParen, Tk::LBrace]) {
            params.push(self.func_param(diags));
            while self.at(Tk::Comma) {
                self.bump();
                params.push(self.func_param(diags));
            }
        }
        self.expect(Tk::RParen, diags);
        let body = self.block(diags);
        let end_loc = body.end_loc;
        FuncDef {
            ident,
            ret_ty,
            is_main: false,
            params,
            body,
            end_loc,
            sym: None,
            dummy: false,
        }
    }

    fn main_func_def(&mut self, diags: &mut DiagnosticLog) -> FuncDef {
        self.expect(Tk::Int, diags);
        let ident = self.expect(Tk::Main, diags);
        self.expect(Tk::LParen, diags);
        self.expect(Tk::RParen, diags);
        let body = self.block(diags);
        let end_loc = body.end_loc;
        FuncDef {
            ident,
            ret_ty: ValueType::scalar(BaseType::I32),
            is_main: true,
            params: Vec::new(),
            body,
            end_loc,
            sym: None,
            dummy: false,
        }
    }

    fn func_param(&mut self, diags: &mut DiagnosticLog) -> FuncParam {
        self.expect(Tk::Int, diags);
        let ident = self.expect(Tk::Ident, diags);
        let mut is_array = false;
        let mut dims = Vec::new();
        if self.at(Tk::LBracket) {
            is_array = true;
            self.bump();
            self.expect(Tk::RBracket, diags);
            while self.at(Tk::LBracket) {
                self.bump();
                dims.push(self.expr(diags));
                self.expect(Tk::RBracket, diags);
            }
        }
        FuncParam {
            ident,
            is_array,
            dims,
            var: None,
            dummy: false,
        }
    }

    // --- Statements ---

    fn block(&mut self, diags: &mut DiagnosticLog) -> Block {
        self.expect(Tk::LBrace, diags);
        let mut items = Vec::new();
        while !self.at(Tk::RBrace) && !self.at(Tk::Eof) {
            items.push(self.block_item(diags));
        }
        let end = self.expect(Tk::RBrace, diags);
        Block {
            items,
            end_loc: end.loc,
        }
    }

    fn block_item(&mut self, diags: &mut DiagnosticLog) -> BlockItem {
        if self.at_any(&[Tk::Const, Tk::Int]) {
            BlockItem::Decl(self.decl(diags))
        } else {
            BlockItem::Stmt(self.stmt(diags))
        }
    }

    fn stmt(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        match self.lookahead(0) {
            Tk::LBrace => Stmt::Block(self.block(diags)),
            Tk::If => self.stmt_if(diags),
            Tk::For => self.stmt_for(diags),
            Tk::Break => {
                let token = self.bump();
                self.expect(Tk::Semicolon, diags);
                Stmt::Break(token.loc)
            }
            Tk::Continue => {
                let token = self.bump();
                self.expect(Tk::Semicolon, diags);
                Stmt::Continue(token.loc)
            }
            Tk::Return => self.stmt_return(diags),
            Tk::Printf => self.stmt_printf(diags),
            _ => self.stmt_plain(diags),
        }
    }

    /// Disambiguate assignment / getint / expression statements by scanning
    /// forward for an `=` before the statement's `;`.
    fn stmt_plain(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        let mut pos = self.cur;
        while pos < self.tokens.len() && !self.tokens[pos].is(Tk::Semicolon) {
            if self.tokens[pos].is(Tk::Assign) {
                if self.tokens.get(pos + 1).map(|t| t.kind) == Some(Tk::GetInt) {
                    return self.stmt_getint(diags);
                }
                return self.stmt_assign(diags);
            }
            pos += 1;
        }
        // Expression (possibly empty) statement.
        let expr = if self.at_any(&[Tk::Semicolon, Tk::RBrace]) {
            None
        } else {
            Some(self.expr(diags))
        };
        self.expect(Tk::Semicolon, diags);
        Stmt::Expr(expr)
    }

    fn stmt_assign(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        let lval = self.lval(diags);
        self.expect(Tk::Assign, diags);
        let expr = self.expr(diags);
        self.expect(Tk::Semicolon, diags);
        Stmt::Assign {
            lval,
            expr,
            dummy: false,
        }
    }

    fn stmt_getint(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        let lval = self.lval(diags);
        self.expect(Tk::Assign, diags);
        self.expect(Tk::GetInt, diags);
        self.expect(Tk::LParen, diags);
        self.expect(Tk::RParen, diags);
        self.expect(Tk::Semicolon, diags);
        Stmt::GetInt { lval, dummy: false }
    }

    fn stmt_if(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        self.expect(Tk::If, diags);
        self.expect(Tk::LParen, diags);
        let cond = self.cond(diags);
        self.expect(Tk::RParen, diags);
        let then_stmt = Box::new(self.stmt(diags));
        let else_stmt = if self.at(Tk::Else) {
            self.bump();
            Some(Box::new(self.stmt(diags)))
        } else {
            None
        };
        Stmt::If {
            cond,
            then_stmt,
            else_stmt,
        }
    }

    fn stmt_for(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        self.expect(Tk::For, diags);
        self.expect(Tk::LParen, diags);
        let init = if self.at(Tk::Ident) {
            Some(self.for_assign(diags))
        } else {
            None
        };
        self.expect(Tk::Semicolon, diags);
        let cond = if !self.at(Tk::Semicolon) {
            Some(self.cond(diags))
        } else {
            None
        };
        self.expect(Tk::Semicolon, diags);
        let step = if self.at(Tk::Ident) {
            Some(self.for_assign(diags))
        } else {
            None
        };
        self.expect(Tk::RParen, diags);
        let body = Box::new(self.stmt(diags));
        Stmt::For {
            init,
            cond,
            step,
            body,
        }
    }

    fn for_assign(&mut self, diags: &mut DiagnosticLog) -> ForAssign {
        let lval = self.lval(diags);
        self.expect(Tk::Assign, diags);
        let expr = self.expr(diags);
        ForAssign {
            lval,
            expr,
            dummy: false,
        }
    }

    fn stmt_return(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        let token = self.expect(Tk::Return, diags);
        let expr = if !self.at(Tk::Semicolon) {
            Some(self.expr(diags))
        } else {
            None
        };
        self.expect(Tk::Semicolon, diags);
        Stmt::Return {
            expr,
            loc: token.loc,
        }
    }

    fn stmt_printf(&mut self, diags: &mut DiagnosticLog) -> Stmt {
        let token = self.expect(Tk::Printf, diags);
        self.expect(Tk::LParen, diags);
        let format = self.expect(Tk::StrConst, diags);
        let mut args = Vec::new();
        while self.at(Tk::Comma) {
            self.bump();
            args.push(self.expr(diags));
        }
        self.expect(Tk::RParen, diags);
        self.expect(Tk::Semicolon, diags);
        Stmt::Printf {
            format,
            args,
            segments: Vec::new(),
            loc: token.loc,
            dummy: false,
        }
    }

    // --- Expressions ---

    fn expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.add_expr(diags)
    }

    fn cond(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.lor_expr(diags)
    }

    fn lval(&mut self, diags: &mut DiagnosticLog) -> LVal {
        let ident = self.expect(Tk::Ident, diags);
        let loc = ident.loc;
        let mut indices = Vec::new();
        while self.at(Tk::LBracket) {
            self.bump();
            indices.push(self.expr(diags));
            self.expect(Tk::RBracket, diags);
        }
        LVal {
            ident,
            indices,
            loc,
            var: None,
            ty: ValueType::void(),
            dummy: false,
        }
    }

    fn primary_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        if self.at(Tk::LParen) {
            self.bump();
            let expr = self.expr(diags);
            self.expect(Tk::RParen, diags);
            expr
        } else if self.at(Tk::IntConst) {
            let token = self.bump();
            let loc = token.loc;
            Expr::new(ExprKind::Number(token.num_val), loc)
        } else {
            let lval = self.lval(diags);
            let loc = lval.loc;
            Expr::new(ExprKind::LVal(Box::new(lval)), loc)
        }
    }

    fn unary_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        if self.at_any(&[Tk::Plus, Tk::Minus, Tk::Not]) {
            let token = self.bump();
            let op = match token.kind {
                Tk::Plus => UnaryOp::Plus,
                Tk::Minus => UnaryOp::Minus,
                _ => UnaryOp::Not,
            };
            let expr = self.unary_expr(diags);
            let loc = token.loc;
            return Expr::new(
                ExprKind::Unary {
                    op,
                    op_loc: token.loc,
                    expr: Box::new(expr),
                },
                loc,
            );
        }
        if self.at_seq(&[Tk::Ident, Tk::LParen]) {
            let ident = self.bump();
            let loc = ident.loc;
            self.bump();
            let mut args = Vec::new();
            if !self.at(Tk::RParen) {
                args.push(self.expr(diags));
                while self.at(Tk::Comma) {
                    self.bump();
                    args.push(self.expr(diags));
                }
            }
            self.expect(Tk::RParen, diags);
            return Expr::new(
                ExprKind::Call {
                    ident,
                    args,
                    func: None,
                },
                loc,
            );
        }
        self.primary_expr(diags)
    }

    fn binary_chain(
        &mut self,
        diags: &mut DiagnosticLog,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self, &mut DiagnosticLog) -> Expr,
    ) -> Expr {
        let mut lhs = next(self, diags);
        loop {
            let Some(&(_, op)) = ops.iter().find(|(k, _)| self.at(*k)) else {
                break;
            };
            let token = self.bump();
            let rhs = next(self, diags);
            let loc = lhs.loc;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    op_loc: token.loc,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                loc,
            );
        }
        lhs
    }

    fn mul_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.binary_chain(
            diags,
            &[
                (Tk::Star, BinaryOp::Mul),
                (Tk::Slash, BinaryOp::Div),
                (Tk::Percent, BinaryOp::Mod),
            ],
            Self::unary_expr,
        )
    }

    fn add_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.binary_chain(
            diags,
            &[(Tk::Plus, BinaryOp::Add), (Tk::Minus, BinaryOp::Sub)],
            Self::mul_expr,
        )
    }

    fn rel_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.binary_chain(
            diags,
            &[
                (Tk::Lt, BinaryOp::Lt),
                (Tk::Gt, BinaryOp::Gt),
                (Tk::Le, BinaryOp::Le),
                (Tk::Ge, BinaryOp::Ge),
            ],
            Self::add_expr,
        )
    }

    fn eq_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.binary_chain(
            diags,
            &[(Tk::Eq, BinaryOp::Eq), (Tk::Ne, BinaryOp::Ne)],
            Self::rel_expr,
        )
    }

    fn land_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.binary_chain(diags, &[(Tk::And, BinaryOp::And)], Self::eq_expr)
    }

    fn lor_expr(&mut self, diags: &mut DiagnosticLog) -> Expr {
        self.binary_chain(diags, &[(Tk::Or, BinaryOp::Or)], Self::land_expr)
    }
}
