//! Recursive-descent parser producing the AST.
//!
//! Expression grammar, loosest binding first:
//!
//! ```text
//! expression  → additive ( ( "<" | "<=" | ">" | ">=" ) additive )* ;
//! additive    → primary ( ( "+" | "-" ) primary )* ;
//! primary     → ( NUMBER | IDENT | call ) ( "=" expression )?
//!             | if | loop | var ;
//! call        → IDENT "(" expression* ")" ;
//! if          → "if" expression "then" block "else" block "end" ;
//! loop        → "loop" IDENT "range" expression "," expression "," expression "->" block "end" ;
//! var         → "var" IDENT "=" expression ;
//! block       → ( expression ";"* )* ;
//! ```
//!
//! The parser never gives up on a malformed program. A mismatch is recorded
//! as a [`Diagnostic`] and parsing carries on with whatever structure it has,
//! so one pass reports several mistakes. A missing operand consumes nothing
//! when it sits on a token that closes the enclosing form.

use super::diagnostics::Diagnostic;
use super::lexer::{Token, TokenKind};
use crate::ir::ast::{self, BinOp, Block, Expr, FuncDef, Item, Program, SourcePos};

use TokenKind::*;

/// Tokens that may begin an expression, for diagnostics.
const EXPR_START: &[TokenKind] = &[If, Loop, Var, Ident, Number];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    /// The token buffer is terminated with an `Eof` token if it is not already.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != Eof) {
            let (line, col) = tokens
                .last()
                .map_or((1, 1), |t| (t.line, t.col + t.text.chars().count()));
            tokens.push(Token::eof(line, col));
        }
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Number of diagnostics recorded so far.
    pub fn errors(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    // ── Token buffer ────────────────────────────────────────────────────

    fn current(&self) -> &Token {
        self.lookahead(0)
    }

    /// Token `offset` positions ahead; past the end this is the `Eof` token.
    pub fn lookahead(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    pub fn at_end(&self) -> bool {
        self.current().kind == Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn current_pos(&self) -> SourcePos {
        let tok = self.current();
        SourcePos::new(tok.line, tok.col)
    }

    /// Consume the current token. The `Eof` token is never consumed.
    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    /// Consume the current token, recording a mismatch if it is not `expected`.
    fn accept(&mut self, expected: TokenKind) -> Token {
        if !self.check(expected) {
            self.error(expected);
        }
        self.advance()
    }

    fn accept_ident(&mut self) -> String {
        self.accept(Ident).text
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    fn record(&mut self, diagnostic: Diagnostic) {
        log::warn!("parse diagnostic: {diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn error(&mut self, expected: TokenKind) {
        let tok = self.current();
        let diagnostic = Diagnostic::Mismatch {
            expected,
            found: tok.kind,
            line: tok.line,
            col: tok.col,
        };
        self.record(diagnostic);
    }

    fn error_any(&mut self, expected: &[TokenKind]) {
        let tok = self.current();
        let diagnostic = Diagnostic::MismatchAny {
            expected: expected.to_vec(),
            found: tok.kind,
            line: tok.line,
            col: tok.col,
        };
        self.record(diagnostic);
    }

    fn error_eof(&mut self, context: &'static str) {
        let tok = self.current();
        let diagnostic = Diagnostic::UnexpectedEof {
            context,
            line: tok.line,
            col: tok.col,
        };
        self.record(diagnostic);
    }

    // ── Top level ───────────────────────────────────────────────────────

    /// Parse `extern` declarations and `def` functions until the end of input.
    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while !self.at_end() {
            match self.current().kind {
                Def => program.functions.push(self.parse_func_def()),
                Extern => program.externs.push(self.parse_extern()),
                Semicolon => {
                    self.advance();
                }
                _ => {
                    self.error_any(&[Def, Extern]);
                    self.advance();
                }
            }
        }
        program
    }

    /// Parse one interactive unit. A bare expression is wrapped as the
    /// anonymous zero-argument function. Returns `None` at end of input.
    pub fn parse_toplevel(&mut self) -> Option<Item> {
        loop {
            match self.current().kind {
                Eof => return None,
                Semicolon => {
                    self.advance();
                }
                Def => return Some(Item::Function(self.parse_func_def())),
                Extern => return Some(Item::Extern(self.parse_extern())),
                kind if kind.starts_expr() => {
                    let expr = self.parse_expression();
                    return Some(Item::Function(FuncDef::anonymous(expr)));
                }
                _ => {
                    let mut expected = vec![Def, Extern];
                    expected.extend_from_slice(EXPR_START);
                    self.error_any(&expected);
                    self.advance();
                }
            }
        }
    }

    fn parse_func_def(&mut self) -> FuncDef {
        let pos = self.current_pos();
        self.accept(Def);
        let name = self.accept_ident();
        let params = self.parse_params();
        self.accept(Arrow);
        let body = self.parse_block();
        self.accept(End);
        FuncDef {
            pos,
            name,
            params,
            body,
        }
    }

    fn parse_extern(&mut self) -> ast::Extern {
        let pos = self.current_pos();
        self.accept(Extern);
        let name = self.accept_ident();
        let params = self.parse_params();
        ast::Extern { pos, name, params }
    }

    fn parse_params(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        while self.check(Ident) {
            params.push(self.advance().text);
        }
        params
    }

    fn parse_block(&mut self) -> Block {
        let mut exprs = Vec::new();
        loop {
            while self.check(Semicolon) {
                self.advance();
            }
            if !self.current().kind.starts_expr() {
                break;
            }
            exprs.push(self.parse_expression());
        }
        Block { exprs }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    /// Parse a relational expression, the loosest-binding level.
    pub fn parse_expression(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        while let Some(op) = relational_op(self.current().kind) {
            self.advance();
            let rhs = self.parse_additive();
            lhs = Expr::binary(op, lhs, rhs);
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_primary();
        loop {
            let op = match self.current().kind {
                Plus => BinOp::Add,
                Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_primary();
            lhs = Expr::binary(op, lhs, rhs);
        }
        lhs
    }

    fn parse_primary(&mut self) -> Expr {
        let primary = match self.current().kind {
            Number => self.parse_number(),
            Ident if self.lookahead(1).kind == LParen => self.parse_call(),
            Ident => {
                let pos = self.current_pos();
                Expr::Variable(pos, self.advance().text)
            }
            If => return self.parse_if(),
            Loop => return self.parse_loop(),
            Var => return self.parse_var_init(),
            kind => {
                let pos = self.current_pos();
                self.error_any(EXPR_START);
                if !kind.closes_form() {
                    self.advance();
                }
                return Expr::Number(pos, 0.0);
            }
        };

        // Assignment continues a primary; whether the target is assignable
        // is decided by the generator.
        if self.check(Assign) {
            let pos = primary.pos();
            self.advance();
            let value = self.parse_expression();
            return Expr::Assign {
                pos,
                target: Box::new(primary),
                value: Box::new(value),
            };
        }
        primary
    }

    fn parse_number(&mut self) -> Expr {
        let pos = self.current_pos();
        let tok = self.accept(Number);
        match tok.text.parse::<f64>() {
            Ok(value) => Expr::Number(pos, value),
            Err(_) => {
                self.record(Diagnostic::InvalidNumber {
                    text: tok.text,
                    line: pos.line,
                    col: pos.col,
                });
                Expr::Number(pos, 0.0)
            }
        }
    }

    fn parse_call(&mut self) -> Expr {
        let pos = self.current_pos();
        let name = self.accept_ident();
        self.accept(LParen);

        let mut args = Vec::new();
        while !self.check(RParen) {
            match self.current().kind {
                Eof => {
                    self.error_eof("call arguments");
                    return Expr::Call { pos, name, args };
                }
                // Arguments are not comma separated; skip the stray one.
                Comma => {
                    self.error_any(EXPR_START);
                    self.advance();
                    continue;
                }
                kind if kind.closes_form() => {
                    self.error(RParen);
                    return Expr::Call { pos, name, args };
                }
                _ => {}
            }
            args.push(self.parse_expression());
        }
        self.accept(RParen);

        Expr::Call { pos, name, args }
    }

    fn parse_if(&mut self) -> Expr {
        let pos = self.current_pos();
        self.accept(If);
        let cond = self.parse_expression();
        self.accept(Then);
        let then_block = self.parse_block();
        self.accept(Else);
        let else_block = self.parse_block();
        self.accept(End);

        Expr::If {
            pos,
            cond: Box::new(cond),
            then_block,
            else_block,
        }
    }

    fn parse_loop(&mut self) -> Expr {
        let pos = self.current_pos();
        self.accept(Loop);
        let var = self.accept_ident();
        self.accept(Range);
        let start = self.parse_expression();
        self.accept(Comma);
        let end = self.parse_expression();
        self.accept(Comma);
        let step = self.parse_expression();
        self.accept(Arrow);
        let body = self.parse_block();
        self.accept(End);

        Expr::Loop {
            pos,
            var,
            start: Box::new(start),
            end: Box::new(end),
            step: Box::new(step),
            body,
        }
    }

    fn parse_var_init(&mut self) -> Expr {
        let pos = self.current_pos();
        self.accept(Var);
        let name = self.accept_ident();
        self.accept(Assign);
        let value = self.parse_expression();

        Expr::VarInit {
            pos,
            name,
            value: Box::new(value),
        }
    }
}

fn relational_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        Lt => Some(BinOp::Lt),
        Le => Some(BinOp::Le),
        Gt => Some(BinOp::Gt),
        Ge => Some(BinOp::Ge),
        _ => None,
    }
}
