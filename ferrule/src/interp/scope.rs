//! Scope Stack for nested binding environments
//!
//! Each scope is an ordered-keyed container of bindings. Index 0 is the
//! permanent global scope; popping a scope drops everything it owns.

use std::cell::RefCell;
use std::rc::Rc;

use super::coerce::{coerce, CastError};
use super::container::{OrderedMap, DEFAULT_ORDER};
use super::function::{Function, Signature};
use super::value::{Tag, Value};

/// A single named entry in a scope
#[derive(Debug, Clone)]
pub enum Binding {
    Variable(Value),
    /// Typed cell shared with the host; writes are coerced to `tag`
    Linked { tag: Tag, cell: Rc<RefCell<Value>> },
    Function(Rc<Function>),
}

impl Binding {
    /// Current value of the binding
    pub fn value(&self) -> Value {
        match self {
            Binding::Variable(value) => value.clone(),
            Binding::Linked { cell, .. } => cell.borrow().clone(),
            Binding::Function(function) => Value::Function(Rc::clone(function)),
        }
    }

    fn function(&self) -> Option<&Rc<Function>> {
        match self {
            Binding::Function(function) => Some(function),
            Binding::Variable(Value::Function(function)) => Some(function),
            _ => None,
        }
    }
}

pub type Scope = OrderedMap<Binding>;

/// Stack-based scope management
#[derive(Debug)]
pub struct ScopeStack {
    /// Stack of scopes, index 0 is global
    scopes: Vec<Scope>,
    /// Bucket order for newly pushed scopes
    order: u32,
}

impl ScopeStack {
    /// Create a new scope stack with a global scope
    pub fn new() -> Self {
        Self::with_order(DEFAULT_ORDER)
    }

    pub fn with_order(order: u32) -> Self {
        ScopeStack {
            scopes: vec![Scope::with_order(order)],
            order,
        }
    }

    /// Push a new scope onto the stack
    /// Returns the new scope depth (for debugging)
    pub fn push_scope(&mut self) -> usize {
        self.scopes.push(Scope::with_order(self.order));
        self.scopes.len() - 1
    }

    /// Pop the current scope from the stack
    /// Panics if trying to pop the global scope
    pub fn pop_scope(&mut self) {
        if self.scopes.len() <= 1 {
            panic!("Cannot pop global scope");
        }
        self.scopes.pop();
    }

    /// Current scope depth
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Pop scopes until `depth` remain; the global scope always survives
    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth.max(1));
    }

    /// Define a variable in the current (topmost) scope
    pub fn define(&mut self, name: &str, value: Value) {
        self.current_mut().set_keyed(name, Binding::Variable(value));
    }

    /// Bind a host-owned cell in the global scope
    pub fn link(&mut self, name: &str, tag: Tag, cell: Rc<RefCell<Value>>) {
        self.scopes[0].set_keyed(name, Binding::Linked { tag, cell });
    }

    /// Add a signature to the global scope; a function already bound there
    /// under the same name gains an overload
    pub fn define_global_function(&mut self, signature: Rc<Signature>) {
        bind_function(&mut self.scopes[0], signature);
    }

    /// Nearest binding for `name`, searching from current scope to global
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get_keyed(name))
    }

    /// Look up a variable, searching from current scope to global
    pub fn get(&self, name: &str) -> Option<Value> {
        self.binding(name).map(Binding::value)
    }

    /// Nearest callable bound under `name`
    pub fn lookup_function(&self, name: &str) -> Option<Rc<Function>> {
        self.binding(name).and_then(Binding::function).cloned()
    }

    /// Update the nearest existing binding.
    ///
    /// Returns `Ok(false)` if no binding exists. Linked bindings coerce the
    /// value to their declared tag; a failed cast leaves the cell untouched.
    pub fn set(&mut self, name: &str, value: Value) -> Result<bool, CastError> {
        let Some(binding) = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_keyed_mut(name))
        else {
            return Ok(false);
        };
        match binding {
            Binding::Linked { tag, cell } => {
                let value = coerce(&value, *tag)?;
                *cell.borrow_mut() = value;
            }
            other => *other = Binding::Variable(value),
        }
        Ok(true)
    }

    /// Assignment by name: update the nearest binding or create one in the
    /// innermost scope
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), CastError> {
        if !self.contains(name) {
            self.define(name, value);
            return Ok(());
        }
        self.set(name, value).map(|_| ())
    }

    /// Check if a name is bound in any scope
    pub fn contains(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains_key(name))
    }

    /// Remove a global binding, ignoring shadows in inner scopes.
    ///
    /// Removal tombstones the slot; once tombstones outnumber live entries
    /// the scope is compacted so repeated bind/unbind cycles stay bounded.
    pub fn unbind_global(&mut self, name: &str) -> Option<Binding> {
        remove_binding(&mut self.scopes[0], name)
    }

    /// Scope at `index`, counted from the global scope at 0
    pub fn scope_at(&self, index: usize) -> Option<&Scope> {
        self.scopes.get(index)
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Every bound name, innermost first, without duplicates
    pub fn visible_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for scope in self.scopes.iter().rev() {
            for name in scope.keys() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn current_mut(&mut self) -> &mut Scope {
        // The global scope is never popped, so the stack is never empty
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

fn bind_function(scope: &mut Scope, signature: Rc<Signature>) {
    if let Some(Binding::Function(function)) = scope.get_keyed_mut(signature.name()) {
        Rc::make_mut(function).push(signature);
        return;
    }
    let name = signature.name().to_string();
    scope.set_keyed(&name, Binding::Function(Rc::new(Function::from_rc(signature))));
}

fn remove_binding(scope: &mut Scope, name: &str) -> Option<Binding> {
    let removed = scope.delete_keyed(name);
    if scope.vacant_count() > scope.live_len() {
        scope.compact();
    }
    removed
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::InterpResult;
    use crate::interp::runtime::Runtime;

    fn noop(_: &mut Runtime, _: &mut [Value]) -> InterpResult<Value> {
        Ok(Value::void())
    }

    fn signature(name: &str, prototype: &str) -> Rc<Signature> {
        Rc::new(Signature::native(name, noop, prototype.len(), prototype, 'v').unwrap())
    }

    #[test]
    fn test_basic_define_get() {
        let mut stack = ScopeStack::new();
        stack.define("x", Value::Int(42));
        assert_eq!(stack.get("x"), Some(Value::Int(42)));
        assert_eq!(stack.get("y"), None);
    }

    #[test]
    fn test_scope_push_pop() {
        let mut stack = ScopeStack::new();
        stack.define("x", Value::Int(1));

        stack.push_scope();
        stack.define("y", Value::Int(2));

        // Both visible
        assert_eq!(stack.get("x"), Some(Value::Int(1)));
        assert_eq!(stack.get("y"), Some(Value::Int(2)));

        stack.pop_scope();

        // y is gone, x remains
        assert_eq!(stack.get("x"), Some(Value::Int(1)));
        assert_eq!(stack.get("y"), None);
    }

    #[test]
    fn test_shadowing() {
        let mut stack = ScopeStack::new();
        stack.define("x", Value::Int(1));

        stack.push_scope();
        stack.define("x", Value::Int(2));
        assert_eq!(stack.get("x"), Some(Value::Int(2)));

        stack.pop_scope();
        assert_eq!(stack.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_set_in_parent_scope() {
        let mut stack = ScopeStack::new();
        stack.define("x", Value::Int(1));

        stack.push_scope();
        assert_eq!(stack.set("x", Value::Int(99)), Ok(true));
        stack.pop_scope();

        // Change persisted
        assert_eq!(stack.get("x"), Some(Value::Int(99)));
    }

    #[test]
    fn test_set_does_not_create_variable() {
        let mut stack = ScopeStack::new();
        assert_eq!(stack.set("nonexistent", Value::Int(42)), Ok(false));
        assert!(!stack.contains("nonexistent"));
    }

    #[test]
    fn test_assign_creates_in_innermost_scope() {
        let mut stack = ScopeStack::new();
        stack.push_scope();
        stack.assign("fresh", Value::Int(1)).unwrap();
        assert!(stack.scope_at(stack.depth() - 1).unwrap().contains_key("fresh"));
        stack.pop_scope();
        assert!(!stack.contains("fresh"));
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let mut stack = ScopeStack::new();
        stack.define("x", Value::Int(1));
        stack.push_scope();
        stack.assign("x", Value::Int(2)).unwrap();
        assert!(stack.scope_at(stack.depth() - 1).unwrap().is_empty());
        stack.pop_scope();
        assert_eq!(stack.get("x"), Some(Value::Int(2)));
    }

    #[test]
    fn test_deep_nesting() {
        let mut stack = ScopeStack::new();

        for i in 0..1000 {
            stack.push_scope();
            stack.define(&format!("var_{}", i), Value::Int(i));
        }

        assert_eq!(stack.depth(), 1001); // global + 1000
        assert_eq!(stack.get("var_0"), Some(Value::Int(0)));
        assert_eq!(stack.get("var_999"), Some(Value::Int(999)));

        stack.truncate(1);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.get("var_0"), None);
    }

    #[test]
    fn test_truncate_never_drops_global() {
        let mut stack = ScopeStack::new();
        stack.define("g", Value::Int(1));
        stack.push_scope();
        stack.truncate(0);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.get("g"), Some(Value::Int(1)));
    }

    #[test]
    fn test_linked_binding_coerces_on_write() {
        let cell = Rc::new(RefCell::new(Value::Int(0)));
        let mut stack = ScopeStack::new();
        stack.link("counter", Tag::Int, Rc::clone(&cell));

        stack.assign("counter", Value::string("12 apples")).unwrap();
        assert_eq!(*cell.borrow(), Value::Int(12));
        assert_eq!(stack.get("counter"), Some(Value::Int(12)));

        *cell.borrow_mut() = Value::Int(5);
        assert_eq!(stack.get("counter"), Some(Value::Int(5)));
    }

    #[test]
    fn test_linked_binding_rejects_bad_cast() {
        let cell = Rc::new(RefCell::new(Value::Int(3)));
        let mut stack = ScopeStack::new();
        stack.link("n", Tag::Int, Rc::clone(&cell));

        let err = stack.assign("n", Value::empty_array()).unwrap_err();
        assert_eq!(err, CastError { from: Tag::Array, to: Tag::Int });
        assert_eq!(*cell.borrow(), Value::Int(3));
    }

    #[test]
    fn test_define_function_overloads() {
        let mut stack = ScopeStack::new();
        stack.define_global_function(signature("f", "I"));
        stack.define_global_function(signature("f", "II"));

        let function = stack.lookup_function("f").unwrap();
        assert_eq!(function.len(), 2);
        assert!(matches!(stack.get("f"), Some(Value::Function(_))));
    }

    #[test]
    fn test_lookup_function_through_variable() {
        let mut stack = ScopeStack::new();
        stack.define_global_function(signature("g", ""));
        let value = stack.get("g").unwrap();
        stack.push_scope();
        stack.define("alias", value);
        assert_eq!(stack.lookup_function("alias").map(|f| f.name().to_string()), Some("g".to_string()));
        stack.define("n", Value::Int(1));
        assert!(stack.lookup_function("n").is_none());
    }

    #[test]
    fn test_unbind_global_compacts_when_sparse() {
        let mut stack = ScopeStack::new();
        stack.define("keep", Value::Int(0));
        for i in 0..100 {
            let name = format!("tmp_{i}");
            stack.define(&name, Value::Int(i));
            assert!(stack.unbind_global(&name).is_some());
        }
        let global = stack.global();
        assert_eq!(global.live_len(), 1);
        assert!(global.len() <= 3, "global scope leaked slots: {}", global.len());
        assert_eq!(stack.get("keep"), Some(Value::Int(0)));
    }

    #[test]
    fn test_global_registration_from_inner_scope() {
        let mut stack = ScopeStack::new();
        stack.push_scope();
        stack.define_global_function(signature("h", ""));
        stack.link("linked", Tag::Int, Rc::new(RefCell::new(Value::Int(1))));
        stack.define("h", Value::Int(0));
        stack.pop_scope();

        assert!(stack.global().contains_key("h"));
        assert!(stack.global().contains_key("linked"));
        stack.push_scope();
        stack.define("h", Value::Int(0));
        assert!(stack.unbind_global("h").is_some());
        assert_eq!(stack.get("h"), Some(Value::Int(0)));
    }

    #[test]
    fn test_visible_names_innermost_first() {
        let mut stack = ScopeStack::new();
        stack.define("a", Value::Int(1));
        stack.define("b", Value::Int(1));
        stack.push_scope();
        stack.define("b", Value::Int(2));
        stack.define("c", Value::Int(3));
        assert_eq!(stack.visible_names(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_default() {
        let stack = ScopeStack::default();
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_scope_at_child_scope() {
        let mut stack = ScopeStack::new();
        stack.define("global", Value::Int(1));

        stack.push_scope();
        stack.define("local", Value::Int(2));

        let bindings = stack.scope_at(stack.depth() - 1).unwrap();
        assert_eq!(bindings.live_len(), 1);
        assert!(bindings.contains_key("local"));
        assert!(!bindings.contains_key("global"));
        assert!(stack.scope_at(0).unwrap().contains_key("global"));
        assert!(stack.scope_at(2).is_none());
    }

    #[test]
    fn test_push_scope_returns_depth() {
        let mut stack = ScopeStack::new();
        assert_eq!(stack.push_scope(), 1);
        assert_eq!(stack.push_scope(), 2);
    }

    #[test]
    #[should_panic(expected = "Cannot pop global scope")]
    fn test_pop_global_panics() {
        let mut stack = ScopeStack::new();
        stack.pop_scope();
    }

    #[test]
    fn test_set_updates_middle_scope() {
        let mut stack = ScopeStack::new();
        stack.define("a", Value::Int(1));

        stack.push_scope();
        stack.define("b", Value::Int(2));

        stack.push_scope();
        assert_eq!(stack.set("b", Value::Int(99)), Ok(true));

        stack.pop_scope();
        assert_eq!(stack.get("b"), Some(Value::Int(99)));

        stack.pop_scope();
        assert_eq!(stack.get("b"), None);
    }

    #[test]
    fn test_with_order_applies_to_new_scopes() {
        let mut stack = ScopeStack::with_order(5);
        stack.push_scope();
        assert_eq!(stack.scope_at(stack.depth() - 1).unwrap().bucket_count(), 32);
        assert_eq!(stack.global().order(), 5);
    }
}
