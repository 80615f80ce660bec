pub mod backend;
pub mod frontend;
pub mod ir;
pub mod session;

use thiserror::Error;

use backend::BackendError;
use frontend::{Diagnostic, LexicalError, Parser};
use ir::ast::Program;
use ir::interp::RuntimeError;
use ir::Module;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexical error: {0}")]
    Lexical(#[from] LexicalError),

    #[error("Parse error: {count} diagnostic(s)\n{}", fmt_diagnostics(.diagnostics))]
    Parse {
        count: usize,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("SemanticError:{kind} ({line}:{col}) - {message}")]
    Semantic {
        kind: SemanticErrorKind,
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl CompileError {
    pub(crate) fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        CompileError::Parse {
            count: diagnostics.len(),
            diagnostics,
        }
    }
}

fn fmt_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    UndefinedVariable,
    VariableRedefinition,
    ParameterRedefinition,
    UndefinedFunction,
    ArgumentCountMismatch,
    InvalidAssignmentTarget,
    ConflictingDeclaration,
}

impl std::fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticErrorKind::UndefinedVariable => write!(f, "UndefinedVariable"),
            SemanticErrorKind::VariableRedefinition => write!(f, "VariableRedefinition"),
            SemanticErrorKind::ParameterRedefinition => write!(f, "ParameterRedefinition"),
            SemanticErrorKind::UndefinedFunction => write!(f, "UndefinedFunction"),
            SemanticErrorKind::ArgumentCountMismatch => write!(f, "ArgumentCountMismatch"),
            SemanticErrorKind::InvalidAssignmentTarget => write!(f, "InvalidAssignmentTarget"),
            SemanticErrorKind::ConflictingDeclaration => write!(f, "ConflictingDeclaration"),
        }
    }
}

/// Knobs for turning a program into a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    pub module_name: String,
    /// Verify every function after it is emitted.
    pub verify: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            module_name: "kl".to_string(),
            verify: true,
        }
    }
}

/// Lex and parse a whole source file. Any diagnostic fails the parse.
pub fn parse_source(source: &str) -> Result<Program, CompileError> {
    let tokens = frontend::lex(source)?;
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    if parser.errors() > 0 {
        return Err(CompileError::from_diagnostics(parser.into_diagnostics()));
    }
    Ok(program)
}

pub fn compile_program(program: &Program, options: &CodegenOptions) -> Result<Module, CompileError> {
    ir::ir_generator::lower(program, &options.module_name, options.verify)
}

/// Compile source text straight to a verified module.
pub fn compile_to_ir(source: &str) -> Result<Module, CompileError> {
    let program = parse_source(source)?;
    compile_program(&program, &CodegenOptions::default())
}
