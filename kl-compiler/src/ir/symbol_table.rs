use crate::ir::Slot;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Parameters and `var` bindings of the function being lowered
    Function,
    /// The induction variable of one loop
    Loop,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    bindings: HashMap<String, Slot>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            bindings: HashMap::new(),
        }
    }
}

/// Name-to-slot bindings visible while lowering one function.
///
/// The bottom frame belongs to the function; each loop pushes a frame for its
/// induction variable, so popping that frame makes any shadowed binding
/// visible again.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter function scope, dropping whatever the previous function left behind
    pub fn enter_function(&mut self) {
        self.frames.clear();
        self.frames.push(Frame::new(FrameKind::Function));
    }

    /// Exit function scope
    pub fn exit_function(&mut self) {
        self.frames.clear();
    }

    pub fn in_function(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind `name` in the function frame. Fails with the existing slot if the
    /// name is already visible anywhere in the activation.
    pub fn declare(&mut self, name: &str, slot: Slot) -> Result<(), Slot> {
        if let Some(existing) = self.lookup(name) {
            return Err(existing);
        }
        if self.frames.is_empty() {
            self.frames.push(Frame::new(FrameKind::Function));
        }
        self.frames[0].bindings.insert(name.to_string(), slot);
        Ok(())
    }

    /// Push a loop frame binding the induction variable. Shadowing an outer
    /// binding is allowed.
    pub fn bind_loop_var(&mut self, name: &str, slot: Slot) {
        let mut frame = Frame::new(FrameKind::Loop);
        frame.bindings.insert(name.to_string(), slot);
        self.frames.push(frame);
    }

    /// Pop the innermost loop frame. The function frame is never popped here.
    pub fn pop_loop(&mut self) -> Option<Slot> {
        match self.frames.last() {
            Some(frame) if frame.kind == FrameKind::Loop => self
                .frames
                .pop()
                .and_then(|f| f.bindings.into_values().next()),
            _ => None,
        }
    }

    /// Innermost binding of `name`
    pub fn lookup(&self, name: &str) -> Option<Slot> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_variable_shadows_and_restores() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function();
        scopes.declare("i", Slot(0)).unwrap();

        scopes.bind_loop_var("i", Slot(1));
        assert_eq!(scopes.lookup("i"), Some(Slot(1)));
        assert_eq!(scopes.pop_loop(), Some(Slot(1)));
        assert_eq!(scopes.lookup("i"), Some(Slot(0)));
    }

    #[test]
    fn loop_variable_is_removed_when_nothing_was_shadowed() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function();
        scopes.bind_loop_var("i", Slot(0));
        scopes.pop_loop();
        assert_eq!(scopes.lookup("i"), None);
    }

    #[test]
    fn declare_rejects_any_visible_name() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function();
        scopes.bind_loop_var("i", Slot(0));
        assert_eq!(scopes.declare("i", Slot(1)), Err(Slot(0)));
    }

    #[test]
    fn var_inside_loop_outlives_the_loop() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function();
        scopes.bind_loop_var("i", Slot(0));
        scopes.declare("acc", Slot(1)).unwrap();
        scopes.pop_loop();
        assert_eq!(scopes.lookup("acc"), Some(Slot(1)));
    }

    #[test]
    fn function_frame_is_never_popped_as_a_loop() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function();
        assert_eq!(scopes.pop_loop(), None);
        assert!(scopes.in_function());
        scopes.exit_function();
        assert!(!scopes.in_function());
    }
}
