//! Target backend seen by the IR generator.
//!
//! Module layout:
//! - `mod.rs`: the [`Backend`] capability trait and [`BackendError`]
//! - `builder`: [`IrBackend`], the in-memory basic-block builder producing an [`ir::Module`]

mod builder;

pub use builder::IrBackend;

use crate::ir::verify::VerifyError;
use crate::ir::{self, ArithOp, BlockId, CmpOp, FuncId, Slot, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error(
        "function '{name}' is already declared with {existing} parameter(s), cannot use it with {requested}"
    )]
    ArityConflict {
        name: String,
        existing: usize,
        requested: usize,
    },

    #[error("no insertion point set")]
    NoInsertionPoint,

    #[error("invalid function handle {0:?}")]
    InvalidFunction(FuncId),

    #[error("block '{0}' already has a terminator")]
    BlockTerminated(String),

    #[error("function '{function}' failed verification: {source}")]
    Verification {
        function: String,
        #[source]
        source: VerifyError,
    },
}

/// Capabilities the IR generator needs from a code-generation backend.
///
/// Emission methods append at the insertion point set by
/// [`Backend::position_at_end`]; values are only meaningful inside the
/// function they were built in.
pub trait Backend {
    /// Declare a body-less function. Redeclaring a name with the same arity
    /// returns the existing function.
    fn declare_function(&mut self, name: &str, params: &[String]) -> Result<FuncId, BackendError>;

    /// Start a function definition. A matching body-less declaration is
    /// reused; a name that already has a body is shadowed for later lookups.
    fn create_function(&mut self, name: &str, params: &[String]) -> Result<FuncId, BackendError>;

    /// Undo the most recent [`Backend::create_function`] for `func`.
    fn discard_function(&mut self, func: FuncId);

    fn resolve_function(&self, name: &str) -> Option<FuncId>;

    fn function_arity(&self, func: FuncId) -> Option<usize>;

    fn append_block(&mut self, func: FuncId, label: &str) -> Result<BlockId, BackendError>;

    fn position_at_end(&mut self, func: FuncId, block: BlockId);

    /// The block instructions are currently appended to.
    fn insert_block(&self) -> Option<BlockId>;

    fn param(&self, index: usize) -> Value;

    fn const_num(&self, value: f64) -> Value;

    /// Allocate a stack slot in the entry block of the current function.
    fn build_alloca(&mut self, name: &str) -> Result<Slot, BackendError>;

    fn build_load(&mut self, slot: Slot, name: &str) -> Result<Value, BackendError>;

    fn build_store(&mut self, value: Value, slot: Slot) -> Result<(), BackendError>;

    fn build_arith(
        &mut self,
        op: ArithOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BackendError>;

    /// Compare two numbers, producing a bool.
    fn build_cmp(
        &mut self,
        op: CmpOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BackendError>;

    /// Convert a bool to `0.0` / `1.0`.
    fn build_bool_to_num(&mut self, value: Value, name: &str) -> Result<Value, BackendError>;

    fn build_br(&mut self, target: BlockId) -> Result<(), BackendError>;

    fn build_cond_br(
        &mut self,
        cond: Value,
        then_bb: BlockId,
        else_bb: BlockId,
    ) -> Result<(), BackendError>;

    /// Join values arriving from the given predecessor blocks.
    fn build_phi(&mut self, incoming: &[(Value, BlockId)], name: &str)
        -> Result<Value, BackendError>;

    fn build_call(&mut self, func: FuncId, args: &[Value], name: &str)
        -> Result<Value, BackendError>;

    fn build_ret(&mut self, value: Value) -> Result<(), BackendError>;

    /// Structural well-formedness check of a finished function.
    fn verify_function(&self, func: FuncId) -> Result<(), BackendError>;
}

/// Convenience for callers that want the module text of one function.
pub fn function_text(module: &ir::Module, func: FuncId) -> String {
    module.function_lines(func).join("\n")
}
