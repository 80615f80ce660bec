use kl_compiler::ir::Module;
use kl_compiler::session::Session;
use kl_compiler::{compile_to_ir, CompileError, SemanticErrorKind};

// ── Semantic error detection ────────────────────────────────────────────
// Each test verifies that an invalid program produces the correct error kind.

#[test]
fn undefined_variable() {
    let result = compile_to_ir("def f -> y end");
    assert_semantic_error(result, SemanticErrorKind::UndefinedVariable);
}

#[test]
fn undefined_variable_names_the_variable() {
    match compile_to_ir("def f x -> x + missing end") {
        Err(CompileError::Semantic { message, .. }) => {
            assert!(message.contains("'missing'"), "got: {message}");
        }
        other => panic!("expected semantic error, got {other:?}"),
    }
}

#[test]
fn variable_redefinition() {
    let source = "def f -> var x = 1 var x = 2 end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::VariableRedefinition);
}

#[test]
fn var_may_not_reuse_a_parameter_name() {
    let source = "def f x -> var x = 1 end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::VariableRedefinition);
}

#[test]
fn var_may_not_reuse_the_loop_variable() {
    let source = "def f -> loop i range 0, 3, 1 -> var i = 1 end end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::VariableRedefinition);
}

#[test]
fn parameter_redefinition() {
    let source = "def f x x -> x end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::ParameterRedefinition);
}

#[test]
fn loop_variable_does_not_outlive_the_loop() {
    let source = "def f -> loop i range 0, 3, 1 -> i end i end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::UndefinedVariable);
}

#[test]
fn undefined_function() {
    let source = "def f -> g(1) end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::UndefinedFunction);
}

#[test]
fn argument_count_mismatch() {
    let source = "def add a b -> a + b end def f -> add(1 2 3) end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::ArgumentCountMismatch);
}

#[test]
fn too_few_arguments() {
    let source = "extern sin x def f -> sin() end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::ArgumentCountMismatch);
}

#[test]
fn number_is_not_assignable() {
    let source = "def f -> 1 = 2 end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::InvalidAssignmentTarget);
}

#[test]
fn call_is_not_assignable() {
    let source = "def g -> 0 end def f -> g() = 2 end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::InvalidAssignmentTarget);
}

#[test]
fn assignment_to_unbound_name() {
    let source = "def f -> z = 2 end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::UndefinedVariable);
}

#[test]
fn extern_arity_conflict() {
    let source = "extern g x extern g x y";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::ConflictingDeclaration);
}

#[test]
fn definition_conflicts_with_extern_arity() {
    let source = "extern g x def g a b -> a end";
    assert_semantic_error(compile_to_ir(source), SemanticErrorKind::ConflictingDeclaration);
}

// ── Error location accuracy ─────────────────────────────────────────────

#[test]
fn error_location_multi_line() {
    let source = "def f ->\n  1\n  y\nend";
    match compile_to_ir(source) {
        Err(CompileError::Semantic { line, col, .. }) => {
            assert_eq!((line, col), (3, 3));
        }
        other => panic!("expected semantic error, got {other:?}"),
    }
}

#[test]
fn error_display_includes_kind_and_position() {
    let err = compile_to_ir("def f -> g() end").unwrap_err();
    assert_eq!(
        err.to_string(),
        "SemanticError:UndefinedFunction (1:10) - Function 'g' is not defined"
    );
}

// ── Front-end failures ──────────────────────────────────────────────────

#[test]
fn lexical_error() {
    let result = compile_to_ir("def f -> 1 @ 2 end");
    assert!(matches!(result, Err(CompileError::Lexical(_))));
}

#[test]
fn parse_errors_stop_before_generation() {
    match compile_to_ir("def f x , undefined end") {
        Err(CompileError::Parse { count, .. }) => assert_eq!(count, 1),
        other => panic!("expected parse error, got {other:?}"),
    }
}

// ── Failed definitions leave the module unchanged ───────────────────────

#[test]
fn failed_definition_is_discarded() {
    let mut session = Session::default();
    session.eval("def f x -> x end").unwrap();
    let before = snapshot(session.module());

    assert!(session.eval("def g -> y end").is_err());
    assert_eq!(snapshot(session.module()), before);
    assert!(session.module().get_function("g").is_none());
}

#[test]
fn failed_redefinition_keeps_the_old_function() {
    let mut session = Session::default();
    session.eval("def f x -> x end").unwrap();
    let before = snapshot(session.module());

    assert!(session.eval("def f -> nope end").is_err());
    assert_eq!(snapshot(session.module()), before);
    let outcome = session.eval("f(5)").unwrap();
    assert_eq!(outcome[0].value, Some(5.0));
}

#[test]
fn failed_body_for_extern_restores_the_declaration() {
    let mut session = Session::default();
    session.eval("extern h x").unwrap();
    let before = snapshot(session.module());

    assert!(session.eval("def h a -> b end").is_err());
    assert_eq!(snapshot(session.module()), before);
    assert_eq!(session.module().functions[0].params, vec!["x"]);
}

fn snapshot(module: &Module) -> Vec<String> {
    module.to_lines()
}

fn assert_semantic_error<T: std::fmt::Debug>(
    result: Result<T, CompileError>,
    expected: SemanticErrorKind,
) {
    match result {
        Ok(v) => panic!("Expected {:?} error, but compilation succeeded: {:?}", expected, v),
        Err(CompileError::Semantic { kind, .. }) => {
            assert_eq!(kind, expected);
        }
        Err(other) => panic!("Expected {:?} semantic error, got: {:?}", expected, other),
    }
}
