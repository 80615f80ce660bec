use kl_compiler::frontend::{lex, Diagnostic, Parser, TokenKind};
use kl_compiler::ir::ast::printer::{expr_to_string, program_to_string};
use kl_compiler::ir::ast::{Expr, Item, ANON_FN_NAME};
use kl_compiler::{parse_source, CompileError};

// ── Precedence and associativity ────────────────────────────────────────

#[test]
fn relational_binds_looser_than_additive() {
    assert_eq!(parse_expr("1 + 2 < 3 - 1"), "(< (+ 1 2) (- 3 1))");
}

#[test]
fn subtraction_is_left_associative() {
    assert_eq!(parse_expr("1 - 2 - 3"), "(- (- 1 2) 3)");
}

#[test]
fn relational_chain_is_left_associative() {
    assert_eq!(parse_expr("a < b >= c"), "(>= (< a b) c)");
}

#[test]
fn assignment_takes_the_rest_of_the_expression() {
    assert_eq!(parse_expr("x = y = 3 + 1"), "(= x (= y (+ 3 1)))");
}

// ── Primary forms ───────────────────────────────────────────────────────

#[test]
fn call_arguments_are_whitespace_delimited() {
    assert_eq!(parse_expr("f(1 x + 2 g())"), "(call f 1 (+ x 2) (call g))");
}

#[test]
fn if_loop_and_var_forms() {
    assert_eq!(
        parse_expr("if x then 1 else var y = 2 y end"),
        "(if x (then 1) (else (var y 2) y))"
    );
    assert_eq!(
        parse_expr("loop i range 0, n, 1 -> i end"),
        "(loop i 0 n 1 (body i))"
    );
}

#[test]
fn program_outline() {
    let program = parse_source("extern sin x\ndef f a b -> a + b end").unwrap();
    assert_eq!(
        program_to_string(&program),
        "Program\n  Extern sin x\n  FuncDef f a b\n    (+ a b)\n"
    );
}

#[test]
fn empty_body_and_separators() {
    let program = parse_source("def f -> end; def g -> 1; 2; end").unwrap();
    assert!(program.functions[0].body.exprs.is_empty());
    assert_eq!(program.functions[1].body.exprs.len(), 2);
}

#[test]
fn duplicate_parameters_are_accepted_by_the_parser() {
    let program = parse_source("def f x x -> x end").unwrap();
    assert_eq!(program.functions[0].params, vec!["x", "x"]);
}

#[test]
fn bare_expression_becomes_anonymous_function() {
    let mut parser = Parser::new(lex("1 + 2").unwrap());
    match parser.parse_toplevel() {
        Some(Item::Function(f)) => {
            assert_eq!(f.name, ANON_FN_NAME);
            assert!(f.params.is_empty());
            assert_eq!(f.body.exprs.len(), 1);
        }
        other => panic!("expected anonymous function, got {other:?}"),
    }
    assert!(parser.parse_toplevel().is_none());
}

#[test]
fn positions_point_at_the_first_token() {
    let mut parser = Parser::new(lex("\n  foo(1)").unwrap());
    let e = parser.parse_expression();
    assert!(matches!(e, Expr::Call { .. }));
    assert_eq!((e.pos().line, e.pos().col), (2, 3));
}

// ── Diagnostics and recovery ────────────────────────────────────────────

#[test]
fn two_independent_mistakes_give_two_diagnostics() {
    let mut parser = Parser::new(lex("def f x , x end def g y , y end").unwrap());
    let program = parser.parse_program();
    assert_eq!(parser.errors(), 2);
    assert_eq!(program.functions.len(), 2);
    for d in parser.diagnostics() {
        assert!(matches!(
            d,
            Diagnostic::Mismatch {
                expected: TokenKind::Arrow,
                found: TokenKind::Comma,
                ..
            }
        ));
    }
}

#[test]
fn end_of_input_inside_call_is_distinct() {
    let mut parser = Parser::new(lex("def f -> g(1 2").unwrap());
    parser.parse_program();
    assert_eq!(parser.errors(), 2);
    assert!(matches!(
        parser.diagnostics()[0],
        Diagnostic::UnexpectedEof { .. }
    ));
    assert!(matches!(
        parser.diagnostics()[1],
        Diagnostic::Mismatch {
            expected: TokenKind::End,
            found: TokenKind::Eof,
            ..
        }
    ));
}

#[test]
fn missing_operands_give_one_diagnostic_each() {
    let mut parser = Parser::new(lex("def f -> 1 + end def g -> 2 - end").unwrap());
    let program = parser.parse_program();
    assert_eq!(parser.errors(), 2, "{:?}", parser.diagnostics());
    assert_eq!(program.functions.len(), 2);
    for d in parser.diagnostics() {
        assert!(matches!(
            d,
            Diagnostic::MismatchAny {
                found: TokenKind::End,
                ..
            }
        ));
    }
    assert_eq!(program.functions[1].name, "g");
}

#[test]
fn missing_branch_value_keeps_the_if_intact() {
    let mut parser = Parser::new(lex("def f x -> if x < then 1 else 2 end end").unwrap());
    let program = parser.parse_program();
    assert_eq!(parser.errors(), 1, "{:?}", parser.diagnostics());
    assert!(matches!(program.functions[0].body.exprs[0], Expr::If { .. }));
    assert!(parser.at_end());
}

#[test]
fn unclosed_call_stops_at_the_enclosing_end() {
    let mut parser = Parser::new(lex("def f -> g(1 end def h -> 0 end").unwrap());
    let program = parser.parse_program();
    assert_eq!(parser.errors(), 1, "{:?}", parser.diagnostics());
    assert!(matches!(
        parser.diagnostics()[0],
        Diagnostic::Mismatch {
            expected: TokenKind::RParen,
            found: TokenKind::End,
            ..
        }
    ));
    assert_eq!(program.functions.len(), 2);
}

#[test]
fn comma_between_call_arguments_is_skipped() {
    let mut parser = Parser::new(lex("def f -> g(1, 2) end").unwrap());
    let program = parser.parse_program();
    assert_eq!(parser.errors(), 1);
    match &program.functions[0].body.exprs[0] {
        Expr::Call { args, .. } => assert_eq!(args.len(), 2),
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn stray_token_at_top_level_is_skipped() {
    let mut parser = Parser::new(lex("-> def f -> 1 end").unwrap());
    let program = parser.parse_program();
    assert_eq!(parser.errors(), 1);
    assert_eq!(program.functions.len(), 1);
}

#[test]
fn diagnostic_message_names_both_tokens() {
    let mut parser = Parser::new(lex("def f x , x end").unwrap());
    parser.parse_program();
    let message = parser.diagnostics()[0].to_string();
    assert!(message.contains("'->'"), "got: {message}");
    assert!(message.contains("','"), "got: {message}");
    assert!(message.contains("1:9"), "got: {message}");
}

#[test]
fn parse_source_reports_every_diagnostic() {
    match parse_source("def f x , x end def g y , y end") {
        Err(CompileError::Parse { count, diagnostics }) => {
            assert_eq!(count, 2);
            assert_eq!(diagnostics.len(), 2);
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn lookahead_past_the_end_is_eof() {
    let parser = Parser::new(lex("x").unwrap());
    assert_eq!(parser.lookahead(0).kind, TokenKind::Ident);
    assert_eq!(parser.lookahead(1).kind, TokenKind::Eof);
    assert_eq!(parser.lookahead(10).kind, TokenKind::Eof);
}

fn parse_expr(source: &str) -> String {
    let mut parser = Parser::new(lex(source).unwrap());
    let e = parser.parse_expression();
    assert_eq!(parser.errors(), 0, "{:?}", parser.diagnostics());
    assert!(parser.at_end(), "trailing input in {source:?}");
    expr_to_string(&e)
}
