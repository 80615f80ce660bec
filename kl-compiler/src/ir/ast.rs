//! Abstract syntax tree produced by the parser and consumed by the IR generator.
//!
//! The tree is a closed set of variants; every consumer (the generator, the
//! printer) matches it exhaustively. Nodes own their children outright and
//! are never mutated after parsing.

pub mod printer;

use std::fmt;

/// Name given to the zero-argument function wrapping a top-level expression.
pub const ANON_FN_NAME: &str = "__anon_expr";

/// 1-based source position of the token that started a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourcePos {
    pub line: usize,
    pub col: usize,
}

impl SourcePos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub externs: Vec<Extern>,
    pub functions: Vec<FuncDef>,
}

/// Body-less function signature resolved against external symbols.
#[derive(Debug, Clone)]
pub struct Extern {
    pub pos: SourcePos,
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub pos: SourcePos,
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

impl FuncDef {
    /// Wrap a single expression as the anonymous zero-argument function.
    pub fn anonymous(expr: Expr) -> Self {
        Self {
            pos: expr.pos(),
            name: ANON_FN_NAME.to_string(),
            params: Vec::new(),
            body: Block { exprs: vec![expr] },
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name == ANON_FN_NAME
    }
}

/// Ordered expressions; the value of a block is the value of its last one.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub exprs: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(SourcePos, f64),
    Variable(SourcePos, String),
    Binary {
        pos: SourcePos,
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `if cond then .. else .. end`; both branches are always present.
    If {
        pos: SourcePos,
        cond: Box<Expr>,
        then_block: Block,
        else_block: Block,
    },
    Call {
        pos: SourcePos,
        name: String,
        args: Vec<Expr>,
    },
    /// `loop var range start, end, step -> body end`
    Loop {
        pos: SourcePos,
        var: String,
        start: Box<Expr>,
        end: Box<Expr>,
        step: Box<Expr>,
        body: Block,
    },
    /// `var name = value`
    VarInit {
        pos: SourcePos,
        name: String,
        value: Box<Expr>,
    },
    /// `target = value`; only a variable is an assignable target.
    Assign {
        pos: SourcePos,
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn pos(&self) -> SourcePos {
        match self {
            Expr::Number(pos, _) => *pos,
            Expr::Variable(pos, _) => *pos,
            Expr::Binary { pos, .. } => *pos,
            Expr::If { pos, .. } => *pos,
            Expr::Call { pos, .. } => *pos,
            Expr::Loop { pos, .. } => *pos,
            Expr::VarInit { pos, .. } => *pos,
            Expr::Assign { pos, .. } => *pos,
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            pos: left.pos(),
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn is_relational(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single unit parsed in interactive mode.
#[derive(Debug, Clone)]
pub enum Item {
    Extern(Extern),
    Function(FuncDef),
}
