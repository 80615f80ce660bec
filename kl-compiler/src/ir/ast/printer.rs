//! Textual rendering of the AST.
//!
//! Items are printed as an indented outline, expressions as compact
//! s-expressions so that nesting (and therefore precedence) is explicit:
//! `1 + 2 < 3 - 1` prints as `(< (+ 1 2) (- 3 1))`.

use super::{Block, Expr, Extern, FuncDef, Item, Program};
use std::fmt::Write;

pub fn program_to_string(program: &Program) -> String {
    let mut out = String::from("Program\n");
    for e in &program.externs {
        write_extern(&mut out, e);
    }
    for f in &program.functions {
        write_func(&mut out, f);
    }
    out
}

pub fn item_to_string(item: &Item) -> String {
    let mut out = String::new();
    match item {
        Item::Extern(e) => write_extern(&mut out, e),
        Item::Function(f) => write_func(&mut out, f),
    }
    out
}

pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_extern(out: &mut String, e: &Extern) {
    let _ = writeln!(out, "  Extern {}{}", e.name, param_suffix(&e.params));
}

fn write_func(out: &mut String, f: &FuncDef) {
    let _ = writeln!(out, "  FuncDef {}{}", f.name, param_suffix(&f.params));
    for e in &f.body.exprs {
        let _ = writeln!(out, "    {}", expr_to_string(e));
    }
}

fn param_suffix(params: &[String]) -> String {
    params.iter().map(|p| format!(" {p}")).collect()
}

fn write_block(out: &mut String, tag: &str, block: &Block) {
    out.push('(');
    out.push_str(tag);
    for e in &block.exprs {
        out.push(' ');
        write_expr(out, e);
    }
    out.push(')');
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Number(_, n) => {
            let _ = write!(out, "{n}");
        }
        Expr::Variable(_, name) => out.push_str(name),
        Expr::Binary {
            op, left, right, ..
        } => {
            let _ = write!(out, "({op} ");
            write_expr(out, left);
            out.push(' ');
            write_expr(out, right);
            out.push(')');
        }
        Expr::If {
            cond,
            then_block,
            else_block,
            ..
        } => {
            out.push_str("(if ");
            write_expr(out, cond);
            out.push(' ');
            write_block(out, "then", then_block);
            out.push(' ');
            write_block(out, "else", else_block);
            out.push(')');
        }
        Expr::Call { name, args, .. } => {
            let _ = write!(out, "(call {name}");
            for a in args {
                out.push(' ');
                write_expr(out, a);
            }
            out.push(')');
        }
        Expr::Loop {
            var,
            start,
            end,
            step,
            body,
            ..
        } => {
            let _ = write!(out, "(loop {var} ");
            write_expr(out, start);
            out.push(' ');
            write_expr(out, end);
            out.push(' ');
            write_expr(out, step);
            out.push(' ');
            write_block(out, "body", body);
            out.push(')');
        }
        Expr::VarInit { name, value, .. } => {
            let _ = write!(out, "(var {name} ");
            write_expr(out, value);
            out.push(')');
        }
        Expr::Assign { target, value, .. } => {
            out.push_str("(= ");
            write_expr(out, target);
            out.push(' ');
            write_expr(out, value);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{BinOp, SourcePos};

    fn num(n: f64) -> Expr {
        Expr::Number(SourcePos::default(), n)
    }

    #[test]
    fn binary_nesting_is_explicit() {
        let e = Expr::binary(
            BinOp::Lt,
            Expr::binary(BinOp::Add, num(1.0), num(2.0)),
            Expr::binary(BinOp::Sub, num(3.0), num(1.0)),
        );
        assert_eq!(expr_to_string(&e), "(< (+ 1 2) (- 3 1))");
    }

    #[test]
    fn program_outline() {
        let program = Program {
            externs: vec![Extern {
                pos: SourcePos::default(),
                name: "sin".into(),
                params: vec!["x".into()],
            }],
            functions: vec![FuncDef {
                pos: SourcePos::default(),
                name: "f".into(),
                params: vec![],
                body: Block {
                    exprs: vec![num(2.5)],
                },
            }],
        };
        assert_eq!(
            program_to_string(&program),
            "Program\n  Extern sin x\n  FuncDef f\n    2.5\n"
        );
    }
}
