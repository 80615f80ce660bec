//! Intermediate Representation (IR) module.
//!
//! This module contains the AST, the basic-block IR, the AST-to-IR
//! generator with its scope stack, the structural verifier and the
//! reference interpreter.

pub mod ast;
pub mod interp;
pub mod ir;
pub use ir::*;
pub mod ir_generator;
pub mod symbol_table;
pub mod verify;
