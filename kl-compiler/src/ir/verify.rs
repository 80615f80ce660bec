//! Structural checks over a finished function.
//!
//! The generator emits well-formed code by construction; these checks catch
//! lowering bugs before a module reaches the interpreter or the printer.

use super::ir::{BlockId, FuncId, Function, Instr, Module, Terminator, Ty, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("unknown function #{0}")]
    UnknownFunction(usize),

    #[error("function has no body")]
    NoBlocks,

    #[error("block '{0}' has no terminator")]
    Unterminated(String),

    #[error("block '{block}' branches to missing block #{target}")]
    BadTarget { block: String, target: usize },

    #[error("alloca outside the entry block in '{0}'")]
    MisplacedAlloca(String),

    #[error("phi after a non-phi instruction in '{0}'")]
    MisplacedPhi(String),

    #[error("phi in '{0}' does not list each predecessor exactly once")]
    PhiPredecessors(String),

    #[error("temp %{temp} is defined more than once")]
    Redefinition { temp: u32 },

    #[error("use of undefined temp %{temp} in '{block}'")]
    UnknownTemp { block: String, temp: u32 },

    #[error("temp %{temp} used in '{block}' before its definition")]
    UseBeforeDef { block: String, temp: u32 },

    #[error("unknown slot #{slot} in '{block}'")]
    UnknownSlot { block: String, slot: u32 },

    #[error("argument #{index} out of range in '{block}'")]
    UnknownArg { block: String, index: u32 },

    #[error("type mismatch in '{block}': expected {expected}, found {found}")]
    TypeMismatch {
        block: String,
        expected: Ty,
        found: Ty,
    },

    #[error("call to '{callee}' in '{block}' passes {found} argument(s), expected {expected}")]
    CallArity {
        block: String,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("call to unknown function #{func} in '{block}'")]
    UnknownCallee { block: String, func: usize },
}

pub fn verify_function(module: &Module, id: FuncId) -> Result<(), VerifyError> {
    let f = module
        .function(id)
        .ok_or(VerifyError::UnknownFunction(id.0))?;
    if f.is_declaration() {
        return Err(VerifyError::NoBlocks);
    }

    for bb in &f.blocks {
        let term = bb
            .terminator
            .as_ref()
            .ok_or_else(|| VerifyError::Unterminated(bb.label.clone()))?;
        for succ in term.successors() {
            if succ.0 >= f.blocks.len() {
                return Err(VerifyError::BadTarget {
                    block: bb.label.clone(),
                    target: succ.0,
                });
            }
        }
    }

    let checker = Checker::new(module, f)?;
    checker.run()
}

/// Verify every defined function of the module.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    for (i, f) in module.functions.iter().enumerate() {
        if !f.is_declaration() {
            verify_function(module, FuncId(i))?;
        }
    }
    Ok(())
}

struct Checker<'a> {
    module: &'a Module,
    func: &'a Function,
    preds: Vec<Vec<BlockId>>,
    doms: Vec<Vec<bool>>,
    /// (block, instruction index) defining each temp
    def_site: Vec<Option<(usize, usize)>>,
}

impl<'a> Checker<'a> {
    fn new(module: &'a Module, func: &'a Function) -> Result<Self, VerifyError> {
        let mut def_site = vec![None; func.temps.len()];
        for (b, bb) in func.blocks.iter().enumerate() {
            for (i, ins) in bb.instrs.iter().enumerate() {
                let Some(dst) = ins.dst() else { continue };
                let site = def_site
                    .get_mut(dst.0 as usize)
                    .ok_or_else(|| VerifyError::UnknownTemp {
                        block: bb.label.clone(),
                        temp: dst.0,
                    })?;
                if site.is_some() {
                    return Err(VerifyError::Redefinition { temp: dst.0 });
                }
                *site = Some((b, i));
            }
        }

        let preds = func.predecessors();
        let doms = dominators(&preds);
        Ok(Self {
            module,
            func,
            preds,
            doms,
            def_site,
        })
    }

    fn run(&self) -> Result<(), VerifyError> {
        for (b, bb) in self.func.blocks.iter().enumerate() {
            let mut in_phi_prefix = true;
            for (i, ins) in bb.instrs.iter().enumerate() {
                match ins {
                    Instr::Phi { incoming, .. } => {
                        if !in_phi_prefix {
                            return Err(VerifyError::MisplacedPhi(bb.label.clone()));
                        }
                        self.check_phi(b, incoming)?;
                    }
                    other => {
                        in_phi_prefix = false;
                        self.check_instr(b, i, other)?;
                    }
                }
            }

            let end = bb.instrs.len();
            match &bb.terminator {
                Some(Terminator::CondBr { cond, .. }) => {
                    self.check_use(b, end, *cond)?;
                    self.expect_ty(b, *cond, Ty::Bool)?;
                }
                Some(Terminator::Ret(v)) => {
                    self.check_use(b, end, *v)?;
                    self.expect_ty(b, *v, Ty::Num)?;
                }
                Some(Terminator::Br(_)) | None => {}
            }
        }
        Ok(())
    }

    fn label(&self, b: usize) -> String {
        self.func.blocks[b].label.clone()
    }

    fn check_instr(&self, b: usize, at: usize, ins: &Instr) -> Result<(), VerifyError> {
        for v in ins.operands() {
            self.check_use(b, at, v)?;
        }

        match ins {
            Instr::Alloca { slot } => {
                if b != 0 {
                    return Err(VerifyError::MisplacedAlloca(self.label(b)));
                }
                self.check_slot(b, slot.0)
            }
            Instr::Load { slot, .. } => self.check_slot(b, slot.0),
            Instr::Store { slot, src } => {
                self.check_slot(b, slot.0)?;
                self.expect_ty(b, *src, Ty::Num)
            }
            Instr::Binary { left, right, .. } | Instr::Cmp { left, right, .. } => {
                self.expect_ty(b, *left, Ty::Num)?;
                self.expect_ty(b, *right, Ty::Num)
            }
            Instr::BoolToNum { src, .. } => self.expect_ty(b, *src, Ty::Bool),
            Instr::Call { func, args, .. } => {
                let callee =
                    self.module
                        .function(*func)
                        .ok_or_else(|| VerifyError::UnknownCallee {
                            block: self.label(b),
                            func: func.0,
                        })?;
                if callee.arity() != args.len() {
                    return Err(VerifyError::CallArity {
                        block: self.label(b),
                        callee: callee.symbol.clone(),
                        expected: callee.arity(),
                        found: args.len(),
                    });
                }
                args.iter().try_for_each(|a| self.expect_ty(b, *a, Ty::Num))
            }
            Instr::Phi { .. } => Ok(()),
        }
    }

    fn check_phi(&self, b: usize, incoming: &[(Value, BlockId)]) -> Result<(), VerifyError> {
        let preds = &self.preds[b];
        let listed_once = preds
            .iter()
            .all(|p| incoming.iter().filter(|(_, from)| from == p).count() == 1);
        if incoming.len() != preds.len() || !listed_once {
            return Err(VerifyError::PhiPredecessors(self.label(b)));
        }
        for (v, from) in incoming {
            // The value must be available at the end of the incoming edge.
            self.check_use(from.0, usize::MAX, *v)?;
            self.expect_ty(b, *v, Ty::Num)?;
        }
        Ok(())
    }

    fn check_slot(&self, b: usize, slot: u32) -> Result<(), VerifyError> {
        if (slot as usize) < self.func.slots.len() {
            Ok(())
        } else {
            Err(VerifyError::UnknownSlot {
                block: self.label(b),
                slot,
            })
        }
    }

    /// `v` is used in block `b` at instruction index `at`.
    fn check_use(&self, b: usize, at: usize, v: Value) -> Result<(), VerifyError> {
        match v {
            Value::Num(_) => Ok(()),
            Value::Arg(index) => {
                if (index as usize) < self.func.arity() {
                    Ok(())
                } else {
                    Err(VerifyError::UnknownArg {
                        block: self.label(b),
                        index,
                    })
                }
            }
            Value::Temp(t) => {
                let (def_block, def_at) = self
                    .def_site
                    .get(t.0 as usize)
                    .copied()
                    .flatten()
                    .ok_or_else(|| VerifyError::UnknownTemp {
                        block: self.label(b),
                        temp: t.0,
                    })?;
                let available = if def_block == b {
                    def_at < at
                } else {
                    self.doms[b][def_block]
                };
                if available {
                    Ok(())
                } else {
                    Err(VerifyError::UseBeforeDef {
                        block: self.label(b),
                        temp: t.0,
                    })
                }
            }
        }
    }

    fn expect_ty(&self, b: usize, v: Value, expected: Ty) -> Result<(), VerifyError> {
        match self.func.value_ty(v) {
            Some(found) if found != expected => Err(VerifyError::TypeMismatch {
                block: self.label(b),
                expected,
                found,
            }),
            _ => Ok(()),
        }
    }
}

/// `doms[b][d]` is true when block `d` dominates block `b`. Blocks without
/// predecessors other than the entry are treated as dominated by everything.
fn dominators(preds: &[Vec<BlockId>]) -> Vec<Vec<bool>> {
    let n = preds.len();
    let mut doms = vec![vec![true; n]; n];
    if n == 0 {
        return doms;
    }
    doms[0] = vec![false; n];
    doms[0][0] = true;

    let mut changed = true;
    while changed {
        changed = false;
        for b in 1..n {
            if preds[b].is_empty() {
                continue;
            }
            let mut next = vec![true; n];
            for p in &preds[b] {
                for (d, slot) in next.iter_mut().enumerate() {
                    *slot &= doms[p.0][d];
                }
            }
            next[b] = true;
            if next != doms[b] {
                doms[b] = next;
                changed = true;
            }
        }
    }
    doms
}
