//! Environment and bindings for the Procedural interpreter.

use std::collections::HashMap;

use crate::value::{Heap, Value};
use procedural_syntax::ast::Type;
use procedural_syntax::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Binding {
    /// The runtime value of this binding
    pub value: Value,
    /// Optional type annotation for runtime type checking
    pub ty: Option<Type>,
}

#[derive(Debug, Clone)]
pub struct Env<'a> {
    /// Variables defined in this scope
    vars: HashMap<String, Binding>,
    /// Reference to parent environment (None for root scope)
    parent: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    pub fn new_root() -> Self {
        Self {
            vars: HashMap::new(),
            parent: None,
        }
    }

    pub(crate) fn child(&'a self) -> Env<'a> {
        Env {
            vars: HashMap::new(),
            parent: Some(self),
        }
    }

    pub fn vars_snapshot(&self) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = self
            .vars
            .iter()
            .map(|(k, b)| (k.clone(), b.value.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        match self.vars.get(name) {
            Some(b) => Some(b),
            None => self.parent.and_then(|p| p.get(name)),
        }
    }

    pub(crate) fn define(&mut self, name: String, val: Value, ty: Option<Type>) {
        self.vars.insert(name, Binding { value: val, ty });
    }

    /// Rebinds a variable of this scope. Parent scopes are read-only.
    pub(crate) fn assign(&mut self, heap: &Heap, name: &str, val: Value) -> Result<()> {
        match self.vars.get_mut(name) {
            Some(b) => {
                if let Some(t) = &b.ty {
                    heap.check_type(&val, t)?;
                }
                b.value = val;
                Ok(())
            }
            None => Err(Error::AssignToUndefined { name: name.to_string() }),
        }
    }
}
