// ABOUTME: Environment — chained name-to-value store for lexical scoping

use crate::error::RuntimeError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child environment enclosing `parent`.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Unconditional insert into this frame. Redefinition is allowed — at
    /// global scope this supports REPL overwrites; in non-global scopes the
    /// resolver already rejects duplicate declarations before this runs.
    pub fn define(&self, name: String, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Looks up `name` in this frame, then delegates to the enclosing frame;
    /// the outermost (global) frame raises an undefined-variable error.
    pub fn get(&self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Ok(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.get(name, line),
            None => Err(RuntimeError::undefined_variable(name, line)),
        }
    }

    /// Overwrites an existing binding, searching outward; the outermost
    /// frame raises an undefined-variable error if none exists.
    pub fn assign(&self, name: &str, value: Value, line: usize) -> Result<(), RuntimeError> {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value, line),
            None => Err(RuntimeError::undefined_variable(name, line)),
        }
    }

    /// Walks exactly `depth` enclosing links, then reads by name. The name is
    /// guaranteed present at that depth by the resolver — this is the
    /// invariant the resolution table establishes.
    pub fn get_at(&self, depth: usize, name: &str) -> Value {
        self.ancestor(depth)
            .bindings
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| {
                panic!("resolver invariant violated: '{name}' missing at depth {depth}")
            })
    }

    pub fn assign_at(&self, depth: usize, name: &str, value: Value) {
        self.ancestor(depth)
            .bindings
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    fn ancestor(&self, depth: usize) -> &Environment {
        let mut env = self;
        for _ in 0..depth {
            env = env
                .parent
                .as_deref()
                .expect("resolver invariant violated: not enough enclosing frames");
        }
        env
    }
}
