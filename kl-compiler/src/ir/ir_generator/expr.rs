use super::context::Gen;
use crate::backend::{Backend, BackendError};
use crate::ir::ast::{BinOp, Block, Expr, SourcePos};
use crate::ir::{ArithOp, CmpOp, Slot, Value};
use crate::{CompileError, SemanticErrorKind};

impl<B: Backend> Gen<B> {
    /// Value of the last expression, or `0.0` for an empty block.
    pub fn lower_block(&mut self, block: &Block) -> Result<Value, CompileError> {
        let mut last = self.backend.const_num(0.0);
        for e in &block.exprs {
            last = self.lower_expr(e)?;
        }
        Ok(last)
    }

    pub fn lower_expr(&mut self, e: &Expr) -> Result<Value, CompileError> {
        log::trace!("lowering expression at {}", e.pos());
        match e {
            Expr::Number(_, value) => Ok(self.backend.const_num(*value)),
            Expr::Variable(_, name) => {
                let slot = self.lower_place(e)?;
                Ok(self.backend.build_load(slot, name)?)
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let l = self.lower_expr(left)?;
                let r = self.lower_expr(right)?;
                self.lower_binary(*op, l, r)
            }
            Expr::If {
                cond,
                then_block,
                else_block,
                ..
            } => self.lower_if(cond, then_block, else_block),
            Expr::Call { pos, name, args } => self.lower_call(*pos, name, args),
            Expr::Loop {
                var,
                start,
                end,
                step,
                body,
                ..
            } => self.lower_loop(var, start, end, step, body),
            Expr::VarInit { pos, name, value } => self.lower_var_init(*pos, name, value),
            Expr::Assign { target, value, .. } => {
                let v = self.lower_expr(value)?;
                let slot = self.lower_place(target)?;
                self.backend.build_store(v, slot)?;
                Ok(v)
            }
        }
    }

    /// The storage location an expression denotes. Only variables have one.
    pub fn lower_place(&mut self, e: &Expr) -> Result<Slot, CompileError> {
        match e {
            Expr::Variable(pos, name) => self.scopes.lookup(name).ok_or_else(|| {
                self.make_error(
                    SemanticErrorKind::UndefinedVariable,
                    *pos,
                    format!("Variable '{}' is not defined", name),
                )
            }),
            other => Err(self.make_error(
                SemanticErrorKind::InvalidAssignmentTarget,
                other.pos(),
                "Left side of '=' is not an assignable target".to_string(),
            )),
        }
    }

    fn lower_binary(&mut self, op: BinOp, l: Value, r: Value) -> Result<Value, CompileError> {
        let v = match op {
            BinOp::Add => self.backend.build_arith(ArithOp::Add, l, r, "addtmp")?,
            BinOp::Sub => self.backend.build_arith(ArithOp::Sub, l, r, "subtmp")?,
            BinOp::Lt => self.lower_compare(CmpOp::Lt, l, r)?,
            BinOp::Le => self.lower_compare(CmpOp::Le, l, r)?,
            BinOp::Gt => self.lower_compare(CmpOp::Gt, l, r)?,
            BinOp::Ge => self.lower_compare(CmpOp::Ge, l, r)?,
        };
        Ok(v)
    }

    /// Comparisons yield `1.0` / `0.0`.
    fn lower_compare(&mut self, op: CmpOp, l: Value, r: Value) -> Result<Value, CompileError> {
        let cmp = self.backend.build_cmp(op, l, r, "cmptmp")?;
        Ok(self.backend.build_bool_to_num(cmp, "booltmp")?)
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        else_block: &Block,
    ) -> Result<Value, CompileError> {
        let c = self.lower_expr(cond)?;
        let zero = self.backend.const_num(0.0);
        let test = self.backend.build_cmp(CmpOp::Ne, c, zero, "ifcond")?;

        let then_bb = self.new_block("then")?;
        let else_bb = self.new_block("else")?;
        let merge_bb = self.new_block("ifcont")?;
        self.backend.build_cond_br(test, then_bb, else_bb)?;

        // Nested control flow may move the insertion point, so the phi takes
        // the block each branch actually ends in.
        self.position_at_end(then_bb)?;
        let then_v = self.lower_block(then_block)?;
        let then_exit = self.current_block()?;
        self.backend.build_br(merge_bb)?;

        self.position_at_end(else_bb)?;
        let else_v = self.lower_block(else_block)?;
        let else_exit = self.current_block()?;
        self.backend.build_br(merge_bb)?;

        self.position_at_end(merge_bb)?;
        Ok(self
            .backend
            .build_phi(&[(then_v, then_exit), (else_v, else_exit)], "iftmp")?)
    }

    fn lower_call(
        &mut self,
        pos: SourcePos,
        name: &str,
        args: &[Expr],
    ) -> Result<Value, CompileError> {
        let Some(func) = self.backend.resolve_function(name) else {
            return Err(self.make_error(
                SemanticErrorKind::UndefinedFunction,
                pos,
                format!("Function '{}' is not defined", name),
            ));
        };

        let expected = self
            .backend
            .function_arity(func)
            .ok_or(CompileError::Backend(BackendError::InvalidFunction(func)))?;
        if expected != args.len() {
            return Err(self.make_error(
                SemanticErrorKind::ArgumentCountMismatch,
                pos,
                format!(
                    "Function '{}' expects {} argument(s), got {}",
                    name,
                    expected,
                    args.len()
                ),
            ));
        }

        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.lower_expr(a)?);
        }
        Ok(self.backend.build_call(func, &values, "calltmp")?)
    }

    /// `loop v range start, end, step -> body end`
    ///
    /// The body runs at least once. `end` is evaluated once before entry;
    /// `step` is re-evaluated each iteration with `v` in scope. The loop
    /// exits once the updated variable equals `end`.
    fn lower_loop(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: &Expr,
        body: &Block,
    ) -> Result<Value, CompileError> {
        let start_v = self.lower_expr(start)?;
        let end_v = self.lower_expr(end)?;

        let slot = self.backend.build_alloca(var)?;
        self.backend.build_store(start_v, slot)?;

        let loop_bb = self.new_block("loop")?;
        let after_bb = self.new_block("afterloop")?;
        self.backend.build_br(loop_bb)?;
        self.position_at_end(loop_bb)?;

        self.with_loop_var(var, slot, |this| {
            this.lower_block(body)?;
            let step_v = this.lower_expr(step)?;
            let cur = this.backend.build_load(slot, var)?;
            let next = this
                .backend
                .build_arith(ArithOp::Add, cur, step_v, "nextvar")?;
            this.backend.build_store(next, slot)?;
            let test = this.backend.build_cmp(CmpOp::Ne, next, end_v, "loopcond")?;
            this.backend.build_cond_br(test, loop_bb, after_bb)?;
            Ok(())
        })?;

        self.position_at_end(after_bb)?;
        Ok(self.backend.const_num(0.0))
    }

    fn lower_var_init(
        &mut self,
        pos: SourcePos,
        name: &str,
        value: &Expr,
    ) -> Result<Value, CompileError> {
        if self.scopes.lookup(name).is_some() {
            return Err(self.make_error(
                SemanticErrorKind::VariableRedefinition,
                pos,
                format!("Variable '{}' already defined", name),
            ));
        }

        let v = self.lower_expr(value)?;
        let slot = self.backend.build_alloca(name)?;
        self.backend.build_store(v, slot)?;
        // A `var` nested in the initializer may have claimed the name.
        if self.scopes.declare(name, slot).is_err() {
            return Err(self.make_error(
                SemanticErrorKind::VariableRedefinition,
                pos,
                format!("Variable '{}' already defined", name),
            ));
        }
        Ok(v)
    }
}
