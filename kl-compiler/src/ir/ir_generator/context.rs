use crate::backend::{Backend, BackendError};
use crate::ir::ast::SourcePos;
use crate::ir::symbol_table::ScopeStack;
use crate::ir::{BlockId, FuncId, Slot};
use crate::{CompileError, SemanticErrorKind};

#[derive(Debug, Clone, Copy)]
pub struct FunctionCtx {
    pub func: FuncId,
}

pub struct Gen<B: Backend> {
    pub backend: B,
    pub scopes: ScopeStack,
    pub fn_ctx: Option<FunctionCtx>,
    /// Run the structural verifier on every finished function.
    pub verify: bool,
}

impl<B: Backend> Gen<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            scopes: ScopeStack::new(),
            fn_ctx: None,
            verify: true,
        }
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn finish(self) -> B {
        self.backend
    }

    pub fn make_error(
        &self,
        kind: SemanticErrorKind,
        pos: SourcePos,
        message: String,
    ) -> CompileError {
        CompileError::Semantic {
            kind,
            line: pos.line,
            col: pos.col,
            message,
        }
    }

    /// Map a backend refusal to declare `name` into a positioned error.
    pub fn declaration_error(&self, err: BackendError, pos: SourcePos) -> CompileError {
        match err {
            BackendError::ArityConflict { .. } => self.make_error(
                SemanticErrorKind::ConflictingDeclaration,
                pos,
                err.to_string(),
            ),
            other => CompileError::Backend(other),
        }
    }

    pub fn current_function(&self) -> Result<FuncId, CompileError> {
        self.fn_ctx
            .as_ref()
            .map(|ctx| ctx.func)
            .ok_or(CompileError::Backend(BackendError::NoInsertionPoint))
    }

    pub fn current_block(&self) -> Result<BlockId, CompileError> {
        self.backend
            .insert_block()
            .ok_or(CompileError::Backend(BackendError::NoInsertionPoint))
    }

    pub fn new_block(&mut self, label: &str) -> Result<BlockId, CompileError> {
        let func = self.current_function()?;
        Ok(self.backend.append_block(func, label)?)
    }

    pub fn position_at_end(&mut self, block: BlockId) -> Result<(), CompileError> {
        let func = self.current_function()?;
        self.backend.position_at_end(func, block);
        Ok(())
    }

    /// Run `f` with `name` bound to `slot` as a loop induction variable. The
    /// binding is dropped again on every exit path, restoring whatever
    /// `name` meant before.
    pub fn with_loop_var<F, R>(&mut self, name: &str, slot: Slot, f: F) -> Result<R, CompileError>
    where
        F: FnOnce(&mut Self) -> Result<R, CompileError>,
    {
        self.scopes.bind_loop_var(name, slot);
        let result = f(self);
        self.scopes.pop_loop();
        result
    }
}
