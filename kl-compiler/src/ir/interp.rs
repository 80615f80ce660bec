//! Reference interpreter for [`Module`]s.
//!
//! Executes defined functions block by block. Stack slots start at `0.0`,
//! phis pick the value for the edge control arrived on, and calls to
//! body-less declarations go to registered host functions.

use std::collections::HashMap;
use std::io::Write;

use super::ir::{ArithOp, BlockId, FuncId, Function, Instr, Module, Temp, Terminator, Value};

/// A host implementation for an `extern`. Output goes to the interpreter's sink.
pub type HostFn = fn(&[f64], &mut dyn Write) -> std::io::Result<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecConfig {
    /// Instructions executed per top-level run before giving up.
    pub fuel: u64,
    pub max_call_depth: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            fuel: 10_000_000,
            max_call_depth: 512,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("extern '{0}' has no host implementation")]
    UnresolvedExtern(String),

    #[error("function '{function}' takes {expected} argument(s), got {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("fuel exhausted after {0} instructions")]
    FuelExhausted(u64),

    #[error("call depth exceeded {0}")]
    StackOverflow(usize),

    #[error("host function '{name}' failed: {message}")]
    Host { name: String, message: String },

    #[error("malformed IR: {0}")]
    MalformedIr(String),
}

fn putchard(args: &[f64], out: &mut dyn Write) -> std::io::Result<f64> {
    let c = args.first().copied().unwrap_or(0.0);
    let ch = char::from_u32(c as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
    write!(out, "{ch}")?;
    Ok(0.0)
}

fn printd(args: &[f64], out: &mut dyn Write) -> std::io::Result<f64> {
    let x = args.first().copied().unwrap_or(0.0);
    writeln!(out, "{x}")?;
    Ok(0.0)
}

pub struct Interpreter<'m, W: Write> {
    module: &'m Module,
    config: ExecConfig,
    hosts: HashMap<String, HostFn>,
    sink: W,
    fuel_left: u64,
    depth: usize,
}

impl<'m, W: Write> Interpreter<'m, W> {
    /// An interpreter with `putchard` and `printd` available to externs.
    pub fn new(module: &'m Module, sink: W) -> Self {
        let mut hosts: HashMap<String, HostFn> = HashMap::new();
        hosts.insert("putchard".to_string(), putchard);
        hosts.insert("printd".to_string(), printd);
        Self {
            module,
            config: ExecConfig::default(),
            hosts,
            sink,
            fuel_left: 0,
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: ExecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register_host(&mut self, name: &str, f: HostFn) {
        self.hosts.insert(name.to_string(), f);
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Call the function currently bound to `name`.
    pub fn run(&mut self, name: &str, args: &[f64]) -> Result<f64, RuntimeError> {
        let func = self
            .module
            .get_function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;
        self.run_function(func, args)
    }

    pub fn run_function(&mut self, func: FuncId, args: &[f64]) -> Result<f64, RuntimeError> {
        self.fuel_left = self.config.fuel;
        self.depth = 0;
        let result = self.call(func, args);
        log::trace!("run finished with {} fuel left", self.fuel_left);
        result
    }

    fn call(&mut self, id: FuncId, args: &[f64]) -> Result<f64, RuntimeError> {
        let module = self.module;
        let f = module
            .function(id)
            .ok_or_else(|| RuntimeError::MalformedIr(format!("no function #{}", id.0)))?;
        if f.arity() != args.len() {
            return Err(RuntimeError::ArgumentCount {
                function: f.name.clone(),
                expected: f.arity(),
                found: args.len(),
            });
        }

        if f.is_declaration() {
            let host = self
                .hosts
                .get(&f.name)
                .copied()
                .ok_or_else(|| RuntimeError::UnresolvedExtern(f.name.clone()))?;
            return host(args, &mut self.sink).map_err(|e| RuntimeError::Host {
                name: f.name.clone(),
                message: e.to_string(),
            });
        }

        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow(self.config.max_call_depth));
        }
        self.depth += 1;
        let result = self.exec(f, args);
        self.depth -= 1;
        result
    }

    fn burn(&mut self) -> Result<(), RuntimeError> {
        if self.fuel_left == 0 {
            return Err(RuntimeError::FuelExhausted(self.config.fuel));
        }
        self.fuel_left -= 1;
        Ok(())
    }

    fn exec(&mut self, f: &Function, args: &[f64]) -> Result<f64, RuntimeError> {
        let mut frame = Frame {
            args,
            slots: vec![0.0; f.slots.len()],
            temps: vec![0.0; f.temps.len()],
        };
        let mut block = BlockId(0);
        let mut came_from: Option<BlockId> = None;

        loop {
            let bb = f
                .block(block)
                .ok_or_else(|| malformed(f, format!("missing block #{}", block.0)))?;

            // Phis read their inputs before any of them is written.
            let mut joined = Vec::new();
            for ins in &bb.instrs {
                let Instr::Phi { dst, incoming } = ins else {
                    continue;
                };
                let from = came_from.ok_or_else(|| malformed(f, "phi in entry block".into()))?;
                let (v, _) = incoming
                    .iter()
                    .find(|(_, pred)| *pred == from)
                    .ok_or_else(|| malformed(f, format!("phi has no edge from #{}", from.0)))?;
                joined.push((*dst, frame.read(f, *v)?));
            }
            for (dst, v) in joined {
                frame.write(f, dst, v)?;
            }

            for ins in &bb.instrs {
                self.burn()?;
                match ins {
                    Instr::Alloca { .. } | Instr::Phi { .. } => {}
                    Instr::Load { dst, slot } => {
                        let v = *frame
                            .slots
                            .get(slot.0 as usize)
                            .ok_or_else(|| malformed(f, format!("no slot #{}", slot.0)))?;
                        frame.write(f, *dst, v)?;
                    }
                    Instr::Store { slot, src } => {
                        let v = frame.read(f, *src)?;
                        let cell = frame
                            .slots
                            .get_mut(slot.0 as usize)
                            .ok_or_else(|| malformed(f, format!("no slot #{}", slot.0)))?;
                        *cell = v;
                    }
                    Instr::Binary {
                        dst,
                        op,
                        left,
                        right,
                    } => {
                        let l = frame.read(f, *left)?;
                        let r = frame.read(f, *right)?;
                        let v = match op {
                            ArithOp::Add => l + r,
                            ArithOp::Sub => l - r,
                        };
                        frame.write(f, *dst, v)?;
                    }
                    Instr::Cmp {
                        dst,
                        op,
                        left,
                        right,
                    } => {
                        let l = frame.read(f, *left)?;
                        let r = frame.read(f, *right)?;
                        frame.write(f, *dst, bool_to_num(op.eval(l, r)))?;
                    }
                    Instr::BoolToNum { dst, src } => {
                        let v = frame.read(f, *src)?;
                        frame.write(f, *dst, bool_to_num(v != 0.0))?;
                    }
                    Instr::Call { dst, func, args } => {
                        let values = args
                            .iter()
                            .map(|a| frame.read(f, *a))
                            .collect::<Result<Vec<_>, _>>()?;
                        let v = self.call(*func, &values)?;
                        frame.write(f, *dst, v)?;
                    }
                }
            }

            self.burn()?;
            match &bb.terminator {
                Some(Terminator::Br(target)) => {
                    came_from = Some(block);
                    block = *target;
                }
                Some(Terminator::CondBr {
                    cond,
                    then_bb,
                    else_bb,
                }) => {
                    came_from = Some(block);
                    block = if frame.read(f, *cond)? != 0.0 {
                        *then_bb
                    } else {
                        *else_bb
                    };
                }
                Some(Terminator::Ret(v)) => return frame.read(f, *v),
                None => return Err(malformed(f, format!("block '{}' falls off", bb.label))),
            }
        }
    }
}

struct Frame<'a> {
    args: &'a [f64],
    slots: Vec<f64>,
    /// Bool temps hold `0.0` / `1.0`.
    temps: Vec<f64>,
}

impl Frame<'_> {
    fn read(&self, f: &Function, v: Value) -> Result<f64, RuntimeError> {
        match v {
            Value::Num(n) => Ok(n),
            Value::Arg(i) => self
                .args
                .get(i as usize)
                .copied()
                .ok_or_else(|| malformed(f, format!("no argument #{i}"))),
            Value::Temp(t) => self
                .temps
                .get(t.0 as usize)
                .copied()
                .ok_or_else(|| malformed(f, format!("no temp %{}", t.0))),
        }
    }

    fn write(&mut self, f: &Function, dst: Temp, v: f64) -> Result<(), RuntimeError> {
        let cell = self
            .temps
            .get_mut(dst.0 as usize)
            .ok_or_else(|| malformed(f, format!("no temp %{}", dst.0)))?;
        *cell = v;
        Ok(())
    }
}

fn bool_to_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn malformed(f: &Function, what: String) -> RuntimeError {
    RuntimeError::MalformedIr(format!("{}: {what}", f.symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ir::{BasicBlock, Slot, TempInfo, Ty};

    #[test]
    fn slots_start_at_zero() {
        let mut m = Module::new("t");
        let mut f = Function::declaration("f", "f".into(), &[]);
        f.slots.push("x".into());
        f.temps.push(TempInfo {
            name: "x".into(),
            ty: Ty::Num,
        });
        let mut entry = BasicBlock::new("entry");
        entry.instrs.push(Instr::Alloca { slot: Slot(0) });
        entry.instrs.push(Instr::Load {
            dst: Temp(0),
            slot: Slot(0),
        });
        entry.terminator = Some(Terminator::Ret(Value::Temp(Temp(0))));
        f.blocks.push(entry);
        m.functions.push(f);

        let mut interp = Interpreter::new(&m, Vec::new());
        assert_eq!(interp.run_function(FuncId(0), &[]), Ok(0.0));
    }

    #[test]
    fn host_functions_write_to_the_sink() {
        let mut out = Vec::new();
        putchard(&[72.0], &mut out).unwrap();
        printd(&[2.5], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "H2.5\n");
    }
}
