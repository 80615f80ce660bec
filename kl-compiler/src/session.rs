//! Interactive session: one generator and one module for the whole run.
//!
//! Definitions and externs accumulate in the module. A bare expression is
//! lowered as the anonymous function, executed, then removed again so the
//! next expression can reuse the name.

use crate::backend::{function_text, Backend, IrBackend};
use crate::frontend::{self, Parser};
use crate::ir::ast::Item;
use crate::ir::interp::{ExecConfig, Interpreter};
use crate::ir::ir_generator::Gen;
use crate::ir::Module;
use crate::{CodegenOptions, CompileError};

/// What one top-level unit produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub name: String,
    /// Textual IR of the lowered function.
    pub ir: String,
    /// Result of evaluating a bare expression.
    pub value: Option<f64>,
    /// Anything the expression printed through host functions.
    pub output: String,
}

pub struct Session {
    gen: Gen<IrBackend>,
    exec: ExecConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&CodegenOptions::default(), ExecConfig::default())
    }
}

impl Session {
    pub fn new(options: &CodegenOptions, exec: ExecConfig) -> Self {
        Self {
            gen: Gen::new(IrBackend::new(&options.module_name)).with_verify(options.verify),
            exec,
        }
    }

    pub fn module(&self) -> &Module {
        self.gen.backend.module()
    }

    pub fn into_module(self) -> Module {
        self.gen.finish().finish()
    }

    /// Evaluate every unit in `input`, stopping at the first failure. Units
    /// before the failure stay in the module; the failing one leaves no trace.
    pub fn eval(&mut self, input: &str) -> Result<Vec<Outcome>, CompileError> {
        let tokens = frontend::lex(input)?;
        let mut parser = Parser::new(tokens);
        let mut outcomes = Vec::new();

        loop {
            let seen = parser.errors();
            let Some(item) = parser.parse_toplevel() else {
                break;
            };
            if parser.errors() > seen {
                let diagnostics = parser.diagnostics()[seen..].to_vec();
                return Err(CompileError::from_diagnostics(diagnostics));
            }
            outcomes.push(self.eval_item(&item)?);
        }
        Ok(outcomes)
    }

    fn eval_item(&mut self, item: &Item) -> Result<Outcome, CompileError> {
        match item {
            Item::Extern(e) => {
                let func = self.gen.lower_extern(e)?;
                Ok(Outcome {
                    name: e.name.clone(),
                    ir: function_text(self.module(), func),
                    value: None,
                    output: String::new(),
                })
            }
            Item::Function(f) if f.is_anonymous() => {
                let func = self.gen.lower_function(f)?;
                let ir = function_text(self.module(), func);

                let mut interp =
                    Interpreter::new(self.gen.backend.module(), Vec::new()).with_config(self.exec);
                let result = interp.run_function(func, &[]);
                let output = String::from_utf8_lossy(&interp.into_sink()).into_owned();

                self.gen.backend.discard_function(func);
                log::debug!("evaluated anonymous expression: {result:?}");

                Ok(Outcome {
                    name: f.name.clone(),
                    ir,
                    value: Some(result?),
                    output,
                })
            }
            Item::Function(f) => {
                let func = self.gen.lower_function(f)?;
                Ok(Outcome {
                    name: f.name.clone(),
                    ir: function_text(self.module(), func),
                    value: None,
                    output: String::new(),
                })
            }
        }
    }
}
