use super::{Backend, BackendError};
use crate::ir::verify::verify_function;
use crate::ir::{
    ArithOp, BasicBlock, BlockId, CmpOp, FuncId, Function, Instr, Module, Slot, Temp, TempInfo,
    Terminator, Ty, Value,
};

/// What [`IrBackend::discard_function`] has to undo.
#[derive(Debug, Clone)]
enum Pending {
    /// A new function was appended; `previous` is what its name resolved to before.
    Fresh {
        func: FuncId,
        previous: Option<FuncId>,
    },
    /// A body-less declaration is being filled in.
    Reused { func: FuncId, params: Vec<String> },
}

/// Builds an in-memory [`Module`].
pub struct IrBackend {
    module: Module,
    cursor: Option<(FuncId, BlockId)>,
    pending: Option<Pending>,
}

impl IrBackend {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module: Module::new(module_name),
            cursor: None,
            pending: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    fn current(&mut self) -> Result<(&mut Function, BlockId), BackendError> {
        let (func, block) = self.cursor.ok_or(BackendError::NoInsertionPoint)?;
        let f = self
            .module
            .function_mut(func)
            .ok_or(BackendError::InvalidFunction(func))?;
        Ok((f, block))
    }

    fn current_block(&mut self) -> Result<&mut BasicBlock, BackendError> {
        let (f, block) = self.current()?;
        let bb = f
            .blocks
            .get_mut(block.0)
            .ok_or(BackendError::NoInsertionPoint)?;
        if bb.terminator.is_some() {
            return Err(BackendError::BlockTerminated(bb.label.clone()));
        }
        Ok(bb)
    }

    /// Append an instruction defining a fresh temp of type `ty`.
    fn push_def(
        &mut self,
        name: &str,
        ty: Ty,
        make: impl FnOnce(Temp) -> Instr,
    ) -> Result<Value, BackendError> {
        self.current_block()?;
        let (f, block) = self.current()?;
        let dst = Temp(f.temps.len() as u32);
        f.temps.push(TempInfo {
            name: name.to_string(),
            ty,
        });
        f.blocks[block.0].instrs.push(make(dst));
        Ok(Value::Temp(dst))
    }

    fn terminate(&mut self, terminator: Terminator) -> Result<(), BackendError> {
        let bb = self.current_block()?;
        bb.terminator = Some(terminator);
        Ok(())
    }
}

impl Backend for IrBackend {
    fn declare_function(&mut self, name: &str, params: &[String]) -> Result<FuncId, BackendError> {
        if let Some(existing) = self.module.get_function(name) {
            let arity = self
                .function_arity(existing)
                .ok_or(BackendError::InvalidFunction(existing))?;
            if arity != params.len() {
                return Err(BackendError::ArityConflict {
                    name: name.to_string(),
                    existing: arity,
                    requested: params.len(),
                });
            }
            log::debug!("extern '{name}' already declared, reusing it");
            return Ok(existing);
        }
        Ok(self.module.push_declaration(name, params))
    }

    fn create_function(&mut self, name: &str, params: &[String]) -> Result<FuncId, BackendError> {
        let previous = self.module.get_function(name);

        if let Some(prev) = previous {
            let f = self
                .module
                .function_mut(prev)
                .ok_or(BackendError::InvalidFunction(prev))?;
            if f.is_declaration() {
                if f.arity() != params.len() {
                    return Err(BackendError::ArityConflict {
                        name: name.to_string(),
                        existing: f.arity(),
                        requested: params.len(),
                    });
                }
                let old = std::mem::replace(&mut f.params, params.to_vec());
                self.pending = Some(Pending::Reused {
                    func: prev,
                    params: old,
                });
                return Ok(prev);
            }
            log::debug!("function '{name}' redefined, earlier callers keep the old body");
        }

        let func = self.module.push_declaration(name, params);
        self.pending = Some(Pending::Fresh { func, previous });
        Ok(func)
    }

    fn discard_function(&mut self, func: FuncId) {
        if matches!(self.cursor, Some((f, _)) if f == func) {
            self.cursor = None;
        }
        match self.pending.take() {
            Some(Pending::Fresh { func: f, previous }) if f == func => {
                self.module.pop_function(previous);
            }
            Some(Pending::Reused { func: f, params }) if f == func => {
                if let Some(decl) = self.module.function_mut(func) {
                    decl.clear_body();
                    decl.params = params;
                }
            }
            other => {
                self.pending = other;
                if let Some(f) = self.module.function_mut(func) {
                    f.clear_body();
                }
            }
        }
    }

    fn resolve_function(&self, name: &str) -> Option<FuncId> {
        self.module.get_function(name)
    }

    fn function_arity(&self, func: FuncId) -> Option<usize> {
        self.module.function(func).map(Function::arity)
    }

    fn append_block(&mut self, func: FuncId, label: &str) -> Result<BlockId, BackendError> {
        let f = self
            .module
            .function_mut(func)
            .ok_or(BackendError::InvalidFunction(func))?;
        f.blocks.push(BasicBlock::new(label));
        Ok(BlockId(f.blocks.len() - 1))
    }

    fn position_at_end(&mut self, func: FuncId, block: BlockId) {
        self.cursor = Some((func, block));
    }

    fn insert_block(&self) -> Option<BlockId> {
        self.cursor.map(|(_, b)| b)
    }

    fn param(&self, index: usize) -> Value {
        Value::Arg(index as u32)
    }

    fn const_num(&self, value: f64) -> Value {
        Value::Num(value)
    }

    fn build_alloca(&mut self, name: &str) -> Result<Slot, BackendError> {
        let (f, _) = self.current()?;
        let slot = Slot(f.slots.len() as u32);
        f.slots.push(name.to_string());

        // Allocas sit together at the top of the entry block so they
        // dominate every use.
        let entry = f.blocks.first_mut().ok_or(BackendError::NoInsertionPoint)?;
        let at = entry
            .instrs
            .iter()
            .take_while(|i| matches!(i, Instr::Alloca { .. }))
            .count();
        entry.instrs.insert(at, Instr::Alloca { slot });
        Ok(slot)
    }

    fn build_load(&mut self, slot: Slot, name: &str) -> Result<Value, BackendError> {
        self.push_def(name, Ty::Num, |dst| Instr::Load { dst, slot })
    }

    fn build_store(&mut self, value: Value, slot: Slot) -> Result<(), BackendError> {
        let bb = self.current_block()?;
        bb.instrs.push(Instr::Store { slot, src: value });
        Ok(())
    }

    fn build_arith(
        &mut self,
        op: ArithOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BackendError> {
        self.push_def(name, Ty::Num, |dst| Instr::Binary {
            dst,
            op,
            left: lhs,
            right: rhs,
        })
    }

    fn build_cmp(
        &mut self,
        op: CmpOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BackendError> {
        self.push_def(name, Ty::Bool, |dst| Instr::Cmp {
            dst,
            op,
            left: lhs,
            right: rhs,
        })
    }

    fn build_bool_to_num(&mut self, value: Value, name: &str) -> Result<Value, BackendError> {
        self.push_def(name, Ty::Num, |dst| Instr::BoolToNum { dst, src: value })
    }

    fn build_br(&mut self, target: BlockId) -> Result<(), BackendError> {
        self.terminate(Terminator::Br(target))
    }

    fn build_cond_br(
        &mut self,
        cond: Value,
        then_bb: BlockId,
        else_bb: BlockId,
    ) -> Result<(), BackendError> {
        self.terminate(Terminator::CondBr {
            cond,
            then_bb,
            else_bb,
        })
    }

    fn build_phi(
        &mut self,
        incoming: &[(Value, BlockId)],
        name: &str,
    ) -> Result<Value, BackendError> {
        self.current_block()?;
        let (f, block) = self.current()?;
        let dst = Temp(f.temps.len() as u32);
        f.temps.push(TempInfo {
            name: name.to_string(),
            ty: Ty::Num,
        });

        // Phis stay grouped at the head of their block.
        let bb = &mut f.blocks[block.0];
        let at = bb
            .instrs
            .iter()
            .take_while(|i| matches!(i, Instr::Phi { .. }))
            .count();
        bb.instrs.insert(
            at,
            Instr::Phi {
                dst,
                incoming: incoming.to_vec(),
            },
        );
        Ok(Value::Temp(dst))
    }

    fn build_call(
        &mut self,
        func: FuncId,
        args: &[Value],
        name: &str,
    ) -> Result<Value, BackendError> {
        self.push_def(name, Ty::Num, |dst| Instr::Call {
            dst,
            func,
            args: args.to_vec(),
        })
    }

    fn build_ret(&mut self, value: Value) -> Result<(), BackendError> {
        self.terminate(Terminator::Ret(value))
    }

    fn verify_function(&self, func: FuncId) -> Result<(), BackendError> {
        verify_function(&self.module, func).map_err(|source| BackendError::Verification {
            function: self
                .module
                .function(func)
                .map_or_else(|| format!("<fn{}>", func.0), |f| f.symbol.clone()),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn allocas_are_hoisted_into_the_entry_block() {
        let mut b = IrBackend::new("t");
        let f = b.create_function("f", &[]).unwrap();
        let entry = b.append_block(f, "entry").unwrap();
        let body = b.append_block(f, "body").unwrap();
        b.position_at_end(f, entry);
        b.build_br(body).unwrap();
        b.position_at_end(f, body);
        let slot = b.build_alloca("x").unwrap();
        b.build_store(Value::Num(1.0), slot).unwrap();
        let v = b.build_load(slot, "x").unwrap();
        b.build_ret(v).unwrap();

        let func = b.module().function(f).unwrap();
        assert_eq!(func.blocks[0].instrs, vec![Instr::Alloca { slot }]);
        assert!(b.verify_function(f).is_ok());
    }

    #[test]
    fn emitting_after_a_terminator_is_rejected() {
        let mut b = IrBackend::new("t");
        let f = b.create_function("f", &[]).unwrap();
        let entry = b.append_block(f, "entry").unwrap();
        b.position_at_end(f, entry);
        b.build_ret(Value::Num(0.0)).unwrap();
        assert!(matches!(
            b.build_ret(Value::Num(1.0)),
            Err(BackendError::BlockTerminated(_))
        ));
    }

    #[test]
    fn discarding_a_fresh_function_restores_the_previous_binding() {
        let mut b = IrBackend::new("t");
        let first = b.create_function("f", &[]).unwrap();
        let entry = b.append_block(first, "entry").unwrap();
        b.position_at_end(first, entry);
        b.build_ret(Value::Num(1.0)).unwrap();

        let second = b.create_function("f", &params(&["x"])).unwrap();
        assert_ne!(first, second);
        assert_eq!(b.resolve_function("f"), Some(second));
        assert_eq!(b.module().function(second).unwrap().symbol, "f.1");

        b.discard_function(second);
        assert_eq!(b.resolve_function("f"), Some(first));
        assert_eq!(b.module().functions.len(), 1);
    }

    #[test]
    fn definition_fills_a_matching_declaration() {
        let mut b = IrBackend::new("t");
        let decl = b.declare_function("g", &params(&["a"])).unwrap();
        let def = b.create_function("g", &params(&["b"])).unwrap();
        assert_eq!(decl, def);

        b.discard_function(def);
        let f = b.module().function(decl).unwrap();
        assert!(f.is_declaration());
        assert_eq!(f.params, params(&["a"]));
    }

    #[test]
    fn unknown_handle_has_no_arity() {
        let mut b = IrBackend::new("t");
        b.declare_function("g", &params(&["a"])).unwrap();
        let stale = FuncId(3);
        assert_eq!(b.function_arity(stale), None);
        assert_eq!(
            b.append_block(stale, "entry"),
            Err(BackendError::InvalidFunction(stale))
        );
    }

    #[test]
    fn redeclaration_with_other_arity_conflicts() {
        let mut b = IrBackend::new("t");
        b.declare_function("g", &params(&["a"])).unwrap();
        assert!(b.declare_function("g", &params(&["a"])).is_ok());
        assert!(matches!(
            b.declare_function("g", &params(&["a", "b"])),
            Err(BackendError::ArityConflict {
                existing: 1,
                requested: 2,
                ..
            })
        ));
    }
}
