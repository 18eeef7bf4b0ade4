//! Value types and the object heap for the Procedural interpreter.
//!
//! Primitive values (`Int`, `Float`, `Bool`, `Unit`) live inline. Everything
//! else is an [`Object`] owned by the interpreter's [`Heap`] and named by a
//! copyable [`ObjRef`] handle, so object lifetimes are independent of the
//! evaluation stack.

use std::fmt;

use procedural_syntax::ast::Type;
use procedural_syntax::error::{Error, Result};

/// Opaque, non-owning handle to an object in a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(usize);

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A handle to a heap object
    Ref(ObjRef),
    /// A 64-bit signed integer value
    Int(i64),
    /// A 64-bit floating-point value
    Float(f64),
    /// A boolean value (true or false)
    Bool(bool),
    /// The unit value representing "no value"
    Unit,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Ref(_) => "reference",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Unit => "unit",
        }
    }
}

/// Host-managed values reachable through an [`ObjRef`].
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Str(String),
    List(Vec<Value>),
    /// A reference to a declared function, by name.
    Function(String),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Str(_) => "string",
            Object::List(_) => "list",
            Object::Function(_) => "function",
        }
    }
}

/// Append-only object store. Handles stay valid for the heap's lifetime.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, obj: Object) -> ObjRef {
        self.objects.push(obj);
        ObjRef(self.objects.len() - 1)
    }

    pub fn alloc_str(&mut self, s: impl Into<String>) -> Value {
        Value::Ref(self.alloc(Object::Str(s.into())))
    }

    pub fn get(&self, r: ObjRef) -> Result<&Object> {
        self.objects.get(r.0).ok_or(Error::DanglingReference { handle: r.0 })
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Result<&mut Object> {
        self.objects.get_mut(r.0).ok_or(Error::DanglingReference { handle: r.0 })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Reads a string object, or `None` when `v` is not one.
    pub fn as_str(&self, v: &Value) -> Option<&str> {
        match v {
            Value::Ref(r) => match self.objects.get(r.0) {
                Some(Object::Str(s)) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn type_name(&self, v: &Value) -> &'static str {
        match v {
            Value::Ref(r) => self.objects.get(r.0).map_or("reference", Object::type_name),
            other => other.type_name(),
        }
    }

    /// Structural equality: strings and lists compare by content, functions by
    /// name, primitives by value.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Ref(x), Value::Ref(y)) if x == y => true,
            (Value::Ref(x), Value::Ref(y)) => match (self.objects.get(x.0), self.objects.get(y.0)) {
                (Some(Object::List(xs)), Some(Object::List(ys))) => {
                    xs.len() == ys.len() && xs.iter().zip(ys).all(|(p, q)| self.values_equal(p, q))
                }
                (Some(p), Some(q)) => p == q,
                _ => false,
            },
            _ => a == b,
        }
    }

    pub fn check_type(&self, val: &Value, ty: &Type) -> Result<()> {
        let ok = match (val, ty) {
            (Value::Int(_), Type::Int)
            | (Value::Float(_), Type::Float)
            | (Value::Bool(_), Type::Bool)
            | (Value::Unit, Type::Unit) => true,
            (Value::Ref(r), _) => matches!(
                (self.get(*r)?, ty),
                (Object::Str(_), Type::String)
                    | (Object::List(_), Type::List)
                    | (Object::Function(_), Type::Function)
            ),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::type_mismatch(format!(
                "value of type {} does not match type {:?}",
                self.type_name(val),
                ty
            )))
        }
    }

    /// Renders a value the way `show`-style output would print it.
    pub fn display(&self, v: &Value) -> String {
        match v {
            Value::Int(n) => n.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Unit => "<unit>".to_string(),
            Value::Ref(r) => match self.objects.get(r.0) {
                Some(Object::Str(s)) => s.clone(),
                Some(Object::List(items)) => {
                    let parts: Vec<String> = items.iter().map(|it| self.display(it)).collect();
                    format!("[{}]", parts.join(", "))
                }
                Some(Object::Function(name)) => format!("<fun {}>", name),
                None => format!("<dangling {}>", r),
            },
        }
    }
}
