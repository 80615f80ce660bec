use kl_compiler::ir::ast::ANON_FN_NAME;
use kl_compiler::ir::interp::{ExecConfig, RuntimeError};
use kl_compiler::session::Session;
use kl_compiler::{CodegenOptions, CompileError};

// ── Evaluation ──────────────────────────────────────────────────────────

#[test]
fn bare_expression_is_evaluated() {
    let mut session = session();
    let outcomes = session.eval("1 + 2").unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].name, ANON_FN_NAME);
    assert_eq!(outcomes[0].value, Some(3.0));
    assert!(outcomes[0].ir.starts_with(&format!("define num @{ANON_FN_NAME}()")));
}

#[test]
fn if_expression_in_the_repl() {
    let mut session = session();
    assert_eq!(session.eval("if 0 then 1 else 2 end").unwrap()[0].value, Some(2.0));
    assert_eq!(session.eval("if 1 then 1 else 2 end").unwrap()[0].value, Some(1.0));
}

#[test]
fn definitions_persist_between_lines() {
    let mut session = session();
    let outcomes = session.eval("def twice x -> x + x end").unwrap();
    assert_eq!(outcomes[0].value, None);
    assert_eq!(session.eval("twice(4)").unwrap()[0].value, Some(8.0));
}

#[test]
fn several_units_on_one_line() {
    let mut session = session();
    let outcomes = session.eval("def one -> 1 end one() + 1").unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1].value, Some(2.0));
}

#[test]
fn anonymous_functions_do_not_accumulate() {
    let mut session = session();
    session.eval("def one -> 1 end").unwrap();
    session.eval("one()").unwrap();
    session.eval("one() + one()").unwrap();
    assert_eq!(session.module().functions.len(), 1);
    assert!(session.module().get_function(ANON_FN_NAME).is_none());
}

#[test]
fn host_output_is_captured() {
    let mut session = session();
    session.eval("extern printd x").unwrap();
    let outcomes = session.eval("printd(3)").unwrap();
    assert_eq!(outcomes[0].output, "3\n");
    assert_eq!(outcomes[0].value, Some(0.0));
}

#[test]
fn later_definition_replaces_earlier_for_new_code() {
    let mut session = session();
    session.eval("def f -> 1 end def g -> f() end").unwrap();
    session.eval("def f -> 2 end").unwrap();
    assert_eq!(session.eval("g()").unwrap()[0].value, Some(1.0));
    assert_eq!(session.eval("f()").unwrap()[0].value, Some(2.0));
}

// ── Failures ────────────────────────────────────────────────────────────

#[test]
fn parse_error_lowers_nothing() {
    let mut session = session();
    match session.eval("def f x , x end") {
        Err(CompileError::Parse { count, .. }) => assert_eq!(count, 1),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(session.module().functions.is_empty());
}

#[test]
fn units_before_a_failure_are_kept() {
    let mut session = session();
    assert!(session.eval("def ok -> 1 end def bad -> nope end").is_err());
    assert!(session.module().get_function("ok").is_some());
    assert!(session.module().get_function("bad").is_none());
}

#[test]
fn runaway_expression_is_stopped() {
    let exec = ExecConfig {
        fuel: 100,
        max_call_depth: 8,
    };
    let mut session = Session::new(&CodegenOptions::default(), exec);
    match session.eval("loop i range 0, 0, 1 -> i end") {
        Err(CompileError::Runtime(RuntimeError::FuelExhausted(100))) => {}
        other => panic!("expected fuel exhaustion, got {other:?}"),
    }
    assert!(session.module().functions.is_empty());
}

#[test]
fn module_text_after_a_session() {
    let mut session = session();
    session.eval("extern putchard c").unwrap();
    session.eval("def nl -> putchard(10) end").unwrap();
    let module = session.into_module();
    let text = module.to_string();
    assert!(text.contains("declare num @putchard(num)"));
    assert!(text.contains("define num @nl() {"));
}

fn session() -> Session {
    let _ = env_logger::builder().is_test(true).try_init();
    Session::default()
}
