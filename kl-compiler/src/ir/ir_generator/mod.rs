//! AST to IR lowering module.
//!
//! - `context`: the [`Gen`] lowering state and its helpers
//! - `item`: externs and function definitions
//! - `expr`: blocks and expressions

pub mod context;
pub mod expr;
pub mod item;

use crate::backend::IrBackend;
use crate::ir::ast::Program;
use crate::ir::Module;
use crate::CompileError;

/// The main Gen struct that orchestrates the lowering process.
pub use context::Gen;

/// Entry point for lowering a whole program into a fresh module.
pub fn lower(program: &Program, module_name: &str, verify: bool) -> Result<Module, CompileError> {
    let mut g = Gen::new(IrBackend::new(module_name)).with_verify(verify);
    g.lower_program(program)?;
    Ok(g.finish().finish())
}
