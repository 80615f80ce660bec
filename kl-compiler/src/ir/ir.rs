// Basic-block IR over a single scalar numeric type (f64), with stack slots
// for mutable storage and phi joins where control flow reconverges.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub usize);

/// Index of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// SSA temporary, defined exactly once within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(pub u32);

/// Stack slot holding one mutable binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Numeric constant
    Num(f64),
    Temp(Temp),
    /// Incoming function argument by position
    Arg(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Num,
    Bool,
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ty::Num => "num",
            Ty::Bool => "bool",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
}

impl CmpOp {
    pub fn eval(self, l: f64, r: f64) -> bool {
        match self {
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
            CmpOp::Ne => l != r,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
            CmpOp::Ne => "ne",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Reserve `slot` in the frame; only valid in the entry block.
    Alloca { slot: Slot },
    /// `dst = *slot`
    Load { dst: Temp, slot: Slot },
    /// `*slot = src`
    Store { slot: Slot, src: Value },
    /// `dst = left <op> right` over numbers
    Binary {
        dst: Temp,
        op: ArithOp,
        left: Value,
        right: Value,
    },
    /// `dst = left <op> right`, producing a bool
    Cmp {
        dst: Temp,
        op: CmpOp,
        left: Value,
        right: Value,
    },
    /// `dst = src ? 1.0 : 0.0`
    BoolToNum { dst: Temp, src: Value },
    /// Join point selecting a value by the predecessor control arrived from.
    Phi {
        dst: Temp,
        incoming: Vec<(Value, BlockId)>,
    },
    Call {
        dst: Temp,
        func: FuncId,
        args: Vec<Value>,
    },
}

impl Instr {
    pub fn dst(&self) -> Option<Temp> {
        match self {
            Instr::Alloca { .. } | Instr::Store { .. } => None,
            Instr::Load { dst, .. }
            | Instr::Binary { dst, .. }
            | Instr::Cmp { dst, .. }
            | Instr::BoolToNum { dst, .. }
            | Instr::Phi { dst, .. }
            | Instr::Call { dst, .. } => Some(*dst),
        }
    }

    /// Values read by the instruction, in operand order.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Instr::Alloca { .. } | Instr::Load { .. } => Vec::new(),
            Instr::Store { src, .. } => vec![*src],
            Instr::Binary { left, right, .. } | Instr::Cmp { left, right, .. } => {
                vec![*left, *right]
            }
            Instr::BoolToNum { src, .. } => vec![*src],
            Instr::Phi { incoming, .. } => incoming.iter().map(|(v, _)| *v).collect(),
            Instr::Call { args, .. } => args.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Value,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    Ret(Value),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                then_bb, else_bb, ..
            } => vec![*then_bb, *else_bb],
            Terminator::Ret(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: String,
    pub instrs: Vec<Instr>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instrs: Vec::new(),
            terminator: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TempInfo {
    pub name: String,
    pub ty: Ty,
}

#[derive(Debug, Clone)]
pub struct Function {
    /// Source-level name, used for resolution.
    pub name: String,
    /// Unique name in the printed module.
    pub symbol: String,
    pub params: Vec<String>,
    /// Empty for a declaration.
    pub blocks: Vec<BasicBlock>,
    pub slots: Vec<String>,
    pub temps: Vec<TempInfo>,
}

impl Function {
    pub fn declaration(name: &str, symbol: String, params: &[String]) -> Self {
        Self {
            name: name.to_string(),
            symbol,
            params: params.to_vec(),
            blocks: Vec::new(),
            slots: Vec::new(),
            temps: Vec::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0)
    }

    pub fn value_ty(&self, v: Value) -> Option<Ty> {
        match v {
            Value::Num(_) | Value::Arg(_) => Some(Ty::Num),
            Value::Temp(t) => self.temps.get(t.0 as usize).map(|info| info.ty),
        }
    }

    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id)
            .and_then(|b| b.terminator.as_ref())
            .map(Terminator::successors)
            .unwrap_or_default()
    }

    /// Predecessor lists for every block, in block order.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for i in 0..self.blocks.len() {
            for succ in self.successors(BlockId(i)) {
                if let Some(list) = preds.get_mut(succ.0) {
                    if !list.contains(&BlockId(i)) {
                        list.push(BlockId(i));
                    }
                }
            }
        }
        preds
    }

    /// Drop the body, turning the function back into a declaration.
    pub fn clear_body(&mut self) {
        self.blocks.clear();
        self.slots.clear();
        self.temps.clear();
    }
}

/// A compilation unit: functions in creation order plus the name table
/// used for call resolution.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    symbols: HashMap<String, FuncId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            symbols: HashMap::new(),
        }
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0)
    }

    pub fn function_mut(&mut self, id: FuncId) -> Option<&mut Function> {
        self.functions.get_mut(id.0)
    }

    /// The function currently bound to `name`.
    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.symbols.get(name).copied()
    }

    /// Append a declaration and bind `name` to it. A name that is already
    /// bound keeps its old function under the old symbol; the new one gets a
    /// fresh `name.N` symbol.
    pub(crate) fn push_declaration(&mut self, name: &str, params: &[String]) -> FuncId {
        let symbol = self.unique_symbol(name);
        let id = FuncId(self.functions.len());
        self.functions
            .push(Function::declaration(name, symbol, params));
        self.symbols.insert(name.to_string(), id);
        id
    }

    /// Remove the most recently pushed function and restore the binding its
    /// name had before.
    pub(crate) fn pop_function(&mut self, previous: Option<FuncId>) -> Option<Function> {
        let f = self.functions.pop()?;
        match previous {
            Some(prev) => self.symbols.insert(f.name.clone(), prev),
            None => self.symbols.remove(&f.name),
        };
        Some(f)
    }

    fn unique_symbol(&self, name: &str) -> String {
        if !self.functions.iter().any(|f| f.symbol == name) {
            return name.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{name}.{n}");
            if !self.functions.iter().any(|f| f.symbol == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn to_lines(&self) -> Vec<String> {
        let mut out = vec![format!("; module '{}'", self.name)];
        for (i, _) in self.functions.iter().enumerate() {
            out.push(String::new());
            out.extend(self.function_lines(FuncId(i)));
        }
        out
    }

    /// Textual form of a single function.
    pub fn function_lines(&self, id: FuncId) -> Vec<String> {
        let Some(f) = self.function(id) else {
            return Vec::new();
        };

        if f.is_declaration() {
            let params = vec!["num"; f.arity()].join(", ");
            return vec![format!("declare num @{}({params})", f.symbol)];
        }

        let printer = FunctionPrinter {
            module: self,
            func: f,
        };
        let params = f
            .params
            .iter()
            .map(|p| format!("num %{p}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = vec![format!("define num @{}({params}) {{", f.symbol)];
        for (i, bb) in f.blocks.iter().enumerate() {
            if i > 0 {
                out.push(String::new());
            }
            out.push(format!("{}:", printer.block(BlockId(i))));
            for ins in &bb.instrs {
                out.push(format!("  {}", printer.instr(ins)));
            }
            match &bb.terminator {
                Some(t) => out.push(format!("  {}", printer.terminator(t))),
                None => out.push("  ; <no terminator>".to_string()),
            }
        }
        out.push("}".to_string());
        out
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

struct FunctionPrinter<'a> {
    module: &'a Module,
    func: &'a Function,
}

impl FunctionPrinter<'_> {
    fn temp(&self, t: Temp) -> String {
        match self.func.temps.get(t.0 as usize) {
            Some(info) if !info.name.is_empty() => format!("%{}{}", info.name, t.0),
            _ => format!("%{}", t.0),
        }
    }

    fn slot(&self, s: Slot) -> String {
        let name = self.func.slots.get(s.0 as usize).map_or("", String::as_str);
        format!("%{name}.addr{}", s.0)
    }

    fn value(&self, v: Value) -> String {
        match v {
            Value::Num(n) => format!("{n}"),
            Value::Temp(t) => self.temp(t),
            Value::Arg(i) => match self.func.params.get(i as usize) {
                Some(p) => format!("%{p}"),
                None => format!("%arg{i}"),
            },
        }
    }

    fn block(&self, b: BlockId) -> String {
        match self.func.blocks.get(b.0) {
            Some(bb) => format!("{}{}", bb.label, b.0),
            None => format!("bb{}", b.0),
        }
    }

    fn instr(&self, ins: &Instr) -> String {
        match ins {
            Instr::Alloca { slot } => format!("{} = alloca num", self.slot(*slot)),
            Instr::Load { dst, slot } => {
                format!("{} = load num, {}", self.temp(*dst), self.slot(*slot))
            }
            Instr::Store { slot, src } => {
                format!("store num {}, {}", self.value(*src), self.slot(*slot))
            }
            Instr::Binary {
                dst,
                op,
                left,
                right,
            } => format!(
                "{} = {op} num {}, {}",
                self.temp(*dst),
                self.value(*left),
                self.value(*right)
            ),
            Instr::Cmp {
                dst,
                op,
                left,
                right,
            } => format!(
                "{} = cmp {op} num {}, {}",
                self.temp(*dst),
                self.value(*left),
                self.value(*right)
            ),
            Instr::BoolToNum { dst, src } => {
                format!("{} = booltonum bool {}", self.temp(*dst), self.value(*src))
            }
            Instr::Phi { dst, incoming } => {
                let arms = incoming
                    .iter()
                    .map(|(v, b)| format!("[ {}, %{} ]", self.value(*v), self.block(*b)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} = phi num {arms}", self.temp(*dst))
            }
            Instr::Call { dst, func, args } => {
                let callee = self
                    .module
                    .function(*func)
                    .map_or_else(|| format!("<fn{}>", func.0), |f| f.symbol.clone());
                let args = args
                    .iter()
                    .map(|a| format!("num {}", self.value(*a)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} = call num @{callee}({args})", self.temp(*dst))
            }
        }
    }

    fn terminator(&self, t: &Terminator) -> String {
        match t {
            Terminator::Br(target) => format!("br label %{}", self.block(*target)),
            Terminator::CondBr {
                cond,
                then_bb,
                else_bb,
            } => format!(
                "br bool {}, label %{}, label %{}",
                self.value(*cond),
                self.block(*then_bb),
                self.block(*else_bb)
            ),
            Terminator::Ret(v) => format!("ret num {}", self.value(*v)),
        }
    }
}
