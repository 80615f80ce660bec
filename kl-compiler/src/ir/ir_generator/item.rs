use super::context::{FunctionCtx, Gen};
use crate::backend::Backend;
use crate::ir::ast::{Extern, FuncDef, Program};
use crate::ir::FuncId;
use crate::{CompileError, SemanticErrorKind};

impl<B: Backend> Gen<B> {
    /// Externs first, then every definition's signature, then the bodies, so
    /// a body may call any function in the program. The first failure aborts.
    pub fn lower_program(&mut self, p: &Program) -> Result<(), CompileError> {
        for e in &p.externs {
            self.lower_extern(e)?;
        }
        for f in &p.functions {
            self.declare_signature(f)?;
        }
        for f in &p.functions {
            self.lower_function(f)?;
        }
        Ok(())
    }

    /// Declare `f` unless its name already resolves. The later
    /// `create_function` fills the declaration; a repeated `def` of the same
    /// name is left to be lowered as a redefinition.
    fn declare_signature(&mut self, f: &FuncDef) -> Result<(), CompileError> {
        if self.backend.resolve_function(&f.name).is_some() {
            return Ok(());
        }
        log::trace!("forward-declaring '{}' / {}", f.name, f.params.len());
        self.backend
            .declare_function(&f.name, &f.params)
            .map_err(|err| self.declaration_error(err, f.pos))?;
        Ok(())
    }

    pub fn lower_extern(&mut self, e: &Extern) -> Result<FuncId, CompileError> {
        log::debug!("declaring extern '{}' / {}", e.name, e.params.len());
        self.backend
            .declare_function(&e.name, &e.params)
            .map_err(|err| self.declaration_error(err, e.pos))
    }

    /// Lower a definition. If anything in the body fails, the partially built
    /// function is removed and the module looks as it did before.
    pub fn lower_function(&mut self, f: &FuncDef) -> Result<FuncId, CompileError> {
        log::debug!("lowering function '{}' / {}", f.name, f.params.len());
        let func = self
            .backend
            .create_function(&f.name, &f.params)
            .map_err(|err| self.declaration_error(err, f.pos))?;

        let prev_ctx = self.fn_ctx.replace(FunctionCtx { func });
        self.scopes.enter_function();

        let result = self.lower_function_body(func, f);

        self.scopes.exit_function();
        self.fn_ctx = prev_ctx;

        match result {
            Ok(()) => Ok(func),
            Err(err) => {
                log::debug!("discarding function '{}': {err}", f.name);
                self.backend.discard_function(func);
                Err(err)
            }
        }
    }

    fn lower_function_body(&mut self, func: FuncId, f: &FuncDef) -> Result<(), CompileError> {
        let entry = self.backend.append_block(func, "entry")?;
        self.backend.position_at_end(func, entry);

        for (i, param) in f.params.iter().enumerate() {
            let slot = self.backend.build_alloca(param)?;
            let arg = self.backend.param(i);
            self.backend.build_store(arg, slot)?;
            if self.scopes.declare(param, slot).is_err() {
                return Err(self.make_error(
                    SemanticErrorKind::ParameterRedefinition,
                    f.pos,
                    format!("Parameter '{}' defined multiple times", param),
                ));
            }
        }

        let ret = self.lower_block(&f.body)?;
        self.backend.build_ret(ret)?;

        if self.verify {
            self.backend.verify_function(func)?;
        }
        Ok(())
    }
}
