//! AST (abstract syntax tree) types for the Procedural language.
//!
//! Trees are built directly in code; there is no surface syntax. The helper
//! functions at the bottom of this module keep hand-built programs readable:
//!
//! ```rust
//! use procedural_syntax::ast::*;
//!
//! // fun answer(): if true: return 42 end end
//! let answer = Function::new(
//!     "answer",
//!     vec![],
//!     vec![if_then(boolean(true), vec![ret(int(42))])],
//! );
//! let program = Program::new(vec![
//!     Item::Function(answer),
//!     Item::Stmt(expr_stmt(call("answer", vec![]))),
//! ]);
//! assert_eq!(program.items.len(), 2);
//! ```

/// Static type tags used for runtime checks and annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    List,
    Function,
    Unit,
}

/// Expressions (literals, operations, calls, containers).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    LiteralInt(i64),
    LiteralFloat(f64),
    LiteralString(String),
    LiteralBool(bool),
    /// Resolves to a variable, or to a reference to a declared function.
    Ident(String),
    // arithmetic
    BinaryAdd(Box<Expr>, Box<Expr>),
    BinarySub(Box<Expr>, Box<Expr>),
    BinaryMul(Box<Expr>, Box<Expr>),
    BinaryDiv(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    // logical
    LogicalAnd(Box<Expr>, Box<Expr>),
    LogicalOr(Box<Expr>, Box<Expr>),
    LogicalNot(Box<Expr>),
    // comparisons
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
    List(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
}

/// Statements (variable bindings, control flow, etc.).
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        ty: Option<Type>,
        expr: Expr,
    },
    Assign {
        name: String,
        expr: Expr,
    },
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    /// A nested statement block.
    Block(Vec<Stmt>),
    /// Runs `body`; a language-level error raised inside it is bound to
    /// `catch_var` (as a string) and `handler` runs instead.
    Try {
        body: Vec<Stmt>,
        catch_var: String,
        handler: Vec<Stmt>,
    },
    /// Raises a language-level error carrying the value's text.
    Throw(Expr),
    ExprStmt(Expr),
}

/// Function parameter with optional type annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<Type>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ty: None }
    }

    pub fn typed(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty: Some(ty) }
    }
}

/// Function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub body: Vec<Stmt>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        Self { name: name.into(), params, return_type: None, body }
    }

    pub fn returning(mut self, ty: Type) -> Self {
        self.return_type = Some(ty);
        self
    }
}

/// Top-level program items.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(Function),
    Stmt(Stmt),
}

/// Entire program consisting of items.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }
}

// Builders for hand-written trees.

pub fn int(n: i64) -> Expr {
    Expr::LiteralInt(n)
}

pub fn float(x: f64) -> Expr {
    Expr::LiteralFloat(x)
}

pub fn string(s: impl Into<String>) -> Expr {
    Expr::LiteralString(s.into())
}

pub fn boolean(b: bool) -> Expr {
    Expr::LiteralBool(b)
}

pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call { name: name.into(), args }
}

pub fn add(a: Expr, b: Expr) -> Expr {
    Expr::BinaryAdd(Box::new(a), Box::new(b))
}

pub fn sub(a: Expr, b: Expr) -> Expr {
    Expr::BinarySub(Box::new(a), Box::new(b))
}

pub fn lt(a: Expr, b: Expr) -> Expr {
    Expr::Lt(Box::new(a), Box::new(b))
}

pub fn eq(a: Expr, b: Expr) -> Expr {
    Expr::Eq(Box::new(a), Box::new(b))
}

pub fn let_(name: impl Into<String>, expr: Expr) -> Stmt {
    Stmt::Let { name: name.into(), ty: None, expr }
}

pub fn assign(name: impl Into<String>, expr: Expr) -> Stmt {
    Stmt::Assign { name: name.into(), expr }
}

pub fn ret(expr: Expr) -> Stmt {
    Stmt::Return(Some(expr))
}

pub fn ret_unit() -> Stmt {
    Stmt::Return(None)
}

pub fn if_then(cond: Expr, then_body: Vec<Stmt>) -> Stmt {
    Stmt::If { cond, then_body, else_body: Vec::new() }
}

pub fn if_else(cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Stmt {
    Stmt::If { cond, then_body, else_body }
}

pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While { cond, body }
}

pub fn for_range(var: impl Into<String>, start: Expr, end: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::For { var: var.into(), start, end, body }
}

pub fn block(body: Vec<Stmt>) -> Stmt {
    Stmt::Block(body)
}

pub fn try_catch(body: Vec<Stmt>, catch_var: impl Into<String>, handler: Vec<Stmt>) -> Stmt {
    Stmt::Try { body, catch_var: catch_var.into(), handler }
}

pub fn throw(expr: Expr) -> Stmt {
    Stmt::Throw(expr)
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::ExprStmt(expr)
}

/// Wraps `inner` in `depth` nested blocks.
pub fn nest_blocks(depth: usize, inner: Vec<Stmt>) -> Vec<Stmt> {
    (0..depth).fold(inner, |body, _| vec![Stmt::Block(body)])
}
