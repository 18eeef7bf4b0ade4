//! Evaluator and call dispatcher.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::config::InterpreterConfig;
use crate::env::Env;
use crate::flow::{catch_error, catch_return, Completion, Exec, ReturnKind, ReturnSignal, Unwind};
use crate::value::{Heap, ObjRef, Object, Value};
use procedural_syntax::ast::{Expr, Function, Item, Program, Stmt, Type};
use procedural_syntax::error::{Error, Result};

/// Counters collected while a program runs.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExecStats {
    /// User function calls dispatched
    pub calls: u64,
    /// Calls whose body finished without an explicit `return`
    pub fall_throughs: u64,
    returns: [u64; 5],
}

impl ExecStats {
    /// Return signals of `kind` caught by the dispatcher.
    pub fn returns(&self, kind: ReturnKind) -> u64 {
        self.returns[kind as usize]
    }

    pub fn explicit_returns(&self) -> u64 {
        self.returns.iter().sum()
    }

    fn record_return(&mut self, kind: ReturnKind) {
        self.returns[kind as usize] += 1;
    }
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn verb(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "subtract",
            ArithOp::Mul => "multiply",
            ArithOp::Div => "divide",
        }
    }
}

pub struct Interpreter {
    /// Global function definitions available to all scopes
    functions: HashMap<String, Rc<Function>>,
    /// Objects reachable through `Value::Ref` handles
    heap: Heap,
    /// Shared handles for string literals, keyed by text
    literals: HashMap<String, ObjRef>,
    /// Shared handles for function references, keyed by function name
    function_refs: HashMap<String, ObjRef>,
    config: InterpreterConfig,
    stats: ExecStats,
    call_depth: usize,
    active_loops: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self {
            functions: HashMap::new(),
            heap: Heap::new(),
            literals: HashMap::new(),
            function_refs: HashMap::new(),
            config,
            stats: ExecStats::default(),
            call_depth: 0,
            active_loops: 0,
        }
    }

    pub fn stats(&self) -> &ExecStats {
        &self.stats
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Loops currently executing. Zero whenever no statement is running.
    pub fn active_loops(&self) -> usize {
        self.active_loops
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub fn define_function(&mut self, f: Function) {
        self.functions.insert(f.name.clone(), Rc::new(f));
    }

    pub fn run(&mut self, program: Program) -> Result<()> {
        let mut env = Env::new_root();
        let _ = self.run_with_env(program, &mut env)?;
        Ok(())
    }

    /// Runs `program` and returns the value of its last top-level statement.
    pub fn run_with_env(&mut self, program: Program, env: &mut Env<'_>) -> Result<Option<Value>> {
        let mut stmts = Vec::new();
        for item in program.items {
            match item {
                Item::Function(f) => self.define_function(f),
                Item::Stmt(s) => stmts.push(s),
            }
        }
        let mut last: Option<Value> = None;
        for s in &stmts {
            match self.exec_stmt(env, s) {
                Ok(v) => last = Some(v),
                Err(unwind) => {
                    if let Unwind::Return(signal) = &unwind {
                        warn!(kind = %signal.kind(), "return signal escaped past the outermost call");
                    }
                    return Err(unwind.into_escape_error());
                }
            }
        }
        Ok(last)
    }

    /// Calls a declared function from outside any program, as the embedder's
    /// entry point.
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.call_completion(name, args)?.into_value())
    }

    /// Like [`call_function`](Self::call_function) but reports whether the
    /// body returned explicitly or fell through.
    pub fn call_completion(&mut self, name: &str, args: Vec<Value>) -> Result<Completion> {
        let root = Env::new_root();
        let func = self.resolve_function(&root, name)?;
        self.dispatch(&root, &func, args)
    }

    fn exec_block(&mut self, env: &mut Env<'_>, body: &[Stmt]) -> Exec<Value> {
        let mut last = Value::Unit;
        for s in body {
            last = self.exec_stmt(env, s)?;
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, env: &mut Env<'_>, stmt: &Stmt) -> Exec<Value> {
        match stmt {
            Stmt::Let { name, ty, expr } => {
                let v = self.eval_expr(env, expr)?;
                if let Some(t) = ty {
                    self.heap.check_type(&v, t)?;
                }
                env.define(name.clone(), v, *ty);
                Ok(Value::Unit)
            }
            Stmt::Assign { name, expr } => {
                let v = self.eval_expr(env, expr)?;
                env.assign(&self.heap, name, v)?;
                Ok(Value::Unit)
            }
            Stmt::Return(opt) => {
                let signal = match opt {
                    Some(e) => ReturnSignal::from(self.eval_expr(env, e)?),
                    None => ReturnSignal::unit(),
                };
                Err(Unwind::Return(signal))
            }
            Stmt::If { cond, then_body, else_body } => match self.eval_expr(env, cond)? {
                Value::Bool(true) => self.exec_block(env, then_body),
                Value::Bool(false) => self.exec_block(env, else_body),
                other => Err(self.condition_error("if", &other).into()),
            },
            Stmt::While { cond, body } => {
                self.enter_loop();
                let outcome = self.exec_while(env, cond, body);
                self.leave_loop(&outcome);
                outcome
            }
            Stmt::For { var, start, end, body } => {
                self.enter_loop();
                let outcome = self.exec_for(env, var, start, end, body);
                self.leave_loop(&outcome);
                outcome
            }
            Stmt::Break => Err(Unwind::Break),
            Stmt::Continue => Err(Unwind::Continue),
            Stmt::Block(body) => self.exec_block(env, body),
            Stmt::Try { body, catch_var, handler } => match catch_error(self.exec_block(env, body))? {
                Ok(v) => Ok(v),
                Err(e) if e.is_internal() => Err(e.into()),
                Err(e) => {
                    debug!(error = %e, "try handler caught error");
                    let msg = self.heap.alloc_str(e.to_string());
                    let mut scope = env.child();
                    scope.define(catch_var.clone(), msg, None);
                    self.exec_block(&mut scope, handler)
                }
            },
            Stmt::Throw(e) => {
                let v = self.eval_expr(env, e)?;
                Err(Error::thrown(self.heap.display(&v)).into())
            }
            Stmt::ExprStmt(e) => Ok(self.eval_expr(env, e)?),
        }
    }

    fn enter_loop(&mut self) {
        self.active_loops += 1;
    }

    /// Releases loop bookkeeping on every exit path, before the outcome
    /// propagates any further.
    fn leave_loop(&mut self, outcome: &Exec<Value>) {
        self.active_loops -= 1;
        if let Err(Unwind::Return(signal)) = outcome {
            trace!(kind = %signal.kind(), depth = self.active_loops, "loop released during return unwind");
        }
    }

    fn tick(&self, iterations: &mut u64) -> Result<()> {
        *iterations += 1;
        match self.config.max_loop_iterations {
            Some(limit) if *iterations > limit => Err(Error::LoopLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    fn exec_while(&mut self, env: &mut Env<'_>, cond: &Expr, body: &[Stmt]) -> Exec<Value> {
        let mut iterations = 0u64;
        loop {
            let go = match self.eval_expr(env, cond)? {
                Value::Bool(b) => b,
                other => return Err(self.condition_error("while", &other).into()),
            };
            if !go {
                break;
            }
            self.tick(&mut iterations)?;
            match self.exec_block(env, body) {
                Ok(_) | Err(Unwind::Continue) => {}
                Err(Unwind::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Unit)
    }

    fn exec_for(
        &mut self,
        env: &mut Env<'_>,
        var: &str,
        start: &Expr,
        end: &Expr,
        body: &[Stmt],
    ) -> Exec<Value> {
        let s = self.eval_expr(env, start)?;
        let e = self.eval_expr(env, end)?;
        let (mut i, e) = match (s, e) {
            (Value::Int(a), Value::Int(b)) => (a, b),
            (a, b) => {
                return Err(Error::type_mismatch(format!(
                    "for bounds must be ints, got {} and {}",
                    self.heap.type_name(&a),
                    self.heap.type_name(&b)
                ))
                .into())
            }
        };
        let mut iterations = 0u64;
        while i < e {
            self.tick(&mut iterations)?;
            env.define(var.to_string(), Value::Int(i), Some(Type::Int));
            match self.exec_block(env, body) {
                Ok(_) | Err(Unwind::Continue) => {}
                Err(Unwind::Break) => break,
                Err(other) => return Err(other),
            }
            i += 1;
        }
        Ok(Value::Unit)
    }

    fn condition_error(&self, construct: &str, got: &Value) -> Error {
        Error::type_mismatch(format!(
            "{} condition must be bool, got {}",
            construct,
            self.heap.type_name(got)
        ))
    }

    fn eval_expr(&mut self, env: &Env<'_>, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::LiteralInt(n) => Ok(Value::Int(*n)),
            Expr::LiteralFloat(x) => Ok(Value::Float(*x)),
            Expr::LiteralString(s) => Ok(Value::Ref(self.intern_literal(s))),
            Expr::LiteralBool(b) => Ok(Value::Bool(*b)),
            Expr::Ident(name) => match env.get(name) {
                Some(b) => Ok(b.value.clone()),
                None if self.functions.contains_key(name) => Ok(Value::Ref(self.function_ref(name))),
                None => Err(Error::UndefinedVariable { name: name.clone() }),
            },
            Expr::BinaryAdd(a, b) => self.eval_arith(env, ArithOp::Add, a, b),
            Expr::BinarySub(a, b) => self.eval_arith(env, ArithOp::Sub, a, b),
            Expr::BinaryMul(a, b) => self.eval_arith(env, ArithOp::Mul, a, b),
            Expr::BinaryDiv(a, b) => self.eval_arith(env, ArithOp::Div, a, b),
            Expr::Negate(e) => match self.eval_expr(env, e)? {
                Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                Value::Float(x) => Ok(Value::Float(-x)),
                other => Err(Error::type_mismatch(format!("cannot negate {}", self.heap.type_name(&other)))),
            },
            Expr::Eq(a, b) => {
                let (x, y) = (self.eval_expr(env, a)?, self.eval_expr(env, b)?);
                Ok(Value::Bool(self.heap.values_equal(&x, &y)))
            }
            Expr::Ne(a, b) => {
                let (x, y) = (self.eval_expr(env, a)?, self.eval_expr(env, b)?);
                Ok(Value::Bool(!self.heap.values_equal(&x, &y)))
            }
            Expr::LogicalAnd(a, b) => match self.eval_expr(env, a)? {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => self.expect_bool(env, b, "&&"),
                other => Err(self.logic_error("&&", &other)),
            },
            Expr::LogicalOr(a, b) => match self.eval_expr(env, a)? {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => self.expect_bool(env, b, "||"),
                other => Err(self.logic_error("||", &other)),
            },
            Expr::LogicalNot(e) => match self.eval_expr(env, e)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(self.logic_error("!", &other)),
            },
            Expr::Lt(a, b) => self.eval_compare(env, a, b, "<", |o| o == Ordering::Less),
            Expr::Le(a, b) => self.eval_compare(env, a, b, "<=", |o| o != Ordering::Greater),
            Expr::Gt(a, b) => self.eval_compare(env, a, b, ">", |o| o == Ordering::Greater),
            Expr::Ge(a, b) => self.eval_compare(env, a, b, ">=", |o| o != Ordering::Less),
            Expr::List(elems) => {
                let mut v = Vec::with_capacity(elems.len());
                for e in elems {
                    v.push(self.eval_expr(env, e)?);
                }
                Ok(Value::Ref(self.heap.alloc(Object::List(v))))
            }
            Expr::Index(base, idx) => {
                let b = self.eval_expr(env, base)?;
                let ix = match self.eval_expr(env, idx)? {
                    Value::Int(n) => n,
                    other => {
                        return Err(Error::type_mismatch(format!(
                            "index expects int, got {}",
                            self.heap.type_name(&other)
                        )))
                    }
                };
                self.index(&b, ix)
            }
            Expr::Call { name, args } => self.eval_call(env, name, args),
        }
    }

    /// Strings are immutable, so every evaluation of the same literal text
    /// can share one object.
    fn intern_literal(&mut self, text: &str) -> ObjRef {
        if let Some(r) = self.literals.get(text) {
            return *r;
        }
        let r = self.heap.alloc(Object::Str(text.to_string()));
        self.literals.insert(text.to_string(), r);
        r
    }

    fn function_ref(&mut self, name: &str) -> ObjRef {
        if let Some(r) = self.function_refs.get(name) {
            return *r;
        }
        let r = self.heap.alloc(Object::Function(name.to_string()));
        self.function_refs.insert(name.to_string(), r);
        r
    }

    fn expect_bool(&mut self, env: &Env<'_>, e: &Expr, op: &str) -> Result<Value> {
        match self.eval_expr(env, e)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(self.logic_error(op, &other)),
        }
    }

    fn logic_error(&self, op: &str, got: &Value) -> Error {
        Error::type_mismatch(format!("{} expects bool, got {}", op, self.heap.type_name(got)))
    }

    fn eval_arith(&mut self, env: &Env<'_>, op: ArithOp, a: &Expr, b: &Expr) -> Result<Value> {
        let x = self.eval_expr(env, a)?;
        let y = self.eval_expr(env, b)?;
        match (op, &x, &y) {
            (_, Value::Int(p), Value::Int(q)) => match op {
                ArithOp::Add => Ok(Value::Int(p.wrapping_add(*q))),
                ArithOp::Sub => Ok(Value::Int(p.wrapping_sub(*q))),
                ArithOp::Mul => Ok(Value::Int(p.wrapping_mul(*q))),
                ArithOp::Div if *q == 0 => Err(Error::DivisionByZero),
                ArithOp::Div => Ok(Value::Int(p.wrapping_div(*q))),
            },
            (_, Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (p, q) = (as_f64(&x), as_f64(&y));
                Ok(Value::Float(match op {
                    ArithOp::Add => p + q,
                    ArithOp::Sub => p - q,
                    ArithOp::Mul => p * q,
                    ArithOp::Div => p / q,
                }))
            }
            (ArithOp::Add, Value::Ref(p), Value::Ref(q)) => match (self.heap.get(*p)?, self.heap.get(*q)?) {
                (Object::Str(s), Object::Str(t)) => {
                    let joined = format!("{}{}", s, t);
                    Ok(self.heap.alloc_str(joined))
                }
                (Object::List(s), Object::List(t)) => {
                    let joined: Vec<Value> = s.iter().chain(t.iter()).cloned().collect();
                    Ok(Value::Ref(self.heap.alloc(Object::List(joined))))
                }
                _ => Err(self.arith_error(op, &x, &y)),
            },
            _ => Err(self.arith_error(op, &x, &y)),
        }
    }

    fn arith_error(&self, op: ArithOp, x: &Value, y: &Value) -> Error {
        Error::type_mismatch(format!(
            "Cannot {} {} and {}",
            op.verb(),
            self.heap.type_name(x),
            self.heap.type_name(y)
        ))
    }

    fn eval_compare(
        &mut self,
        env: &Env<'_>,
        a: &Expr,
        b: &Expr,
        op: &str,
        test: impl Fn(Ordering) -> bool,
    ) -> Result<Value> {
        let x = self.eval_expr(env, a)?;
        let y = self.eval_expr(env, b)?;
        let ord = match (&x, &y) {
            (Value::Int(p), Value::Int(q)) => Some(p.cmp(q)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                as_f64(&x).partial_cmp(&as_f64(&y))
            }
            _ => {
                return Err(Error::type_mismatch(format!(
                    "{} expects numbers, got {} and {}",
                    op,
                    self.heap.type_name(&x),
                    self.heap.type_name(&y)
                )))
            }
        };
        // NaN compares false both ways.
        Ok(Value::Bool(ord.map_or(false, test)))
    }

    fn index(&mut self, base: &Value, ix: i64) -> Result<Value> {
        let r = match base {
            Value::Ref(r) => *r,
            other => {
                return Err(Error::type_mismatch(format!(
                    "indexing not supported for {}",
                    other.type_name()
                )))
            }
        };
        match self.heap.get(r)? {
            Object::List(items) => {
                let len = items.len();
                usize::try_from(ix)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or(Error::IndexOutOfBounds { index: ix, len })
            }
            Object::Str(s) => {
                let len = s.chars().count();
                let ch = usize::try_from(ix)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .ok_or(Error::IndexOutOfBounds { index: ix, len })?;
                Ok(self.heap.alloc_str(ch.to_string()))
            }
            other => Err(Error::type_mismatch(format!(
                "indexing not supported for {}",
                other.type_name()
            ))),
        }
    }

    fn eval_call(&mut self, env: &Env<'_>, name: &str, args: &[Expr]) -> Result<Value> {
        // builtins
        match name {
            "len" => return self.call_len(env, args),
            "push" => return self.call_push(env, args),
            _ => {}
        }
        let func = self.resolve_function(env, name)?;
        let mut evaluated = Vec::with_capacity(args.len());
        for a in args {
            evaluated.push(self.eval_expr(env, a)?);
        }
        Ok(self.dispatch(env, &func, evaluated)?.into_value())
    }

    /// Looks `name` up as a declared function, then as a variable holding a
    /// function reference.
    fn resolve_function(&self, env: &Env<'_>, name: &str) -> Result<Rc<Function>> {
        if let Some(f) = self.functions.get(name) {
            return Ok(Rc::clone(f));
        }
        if let Some(Value::Ref(r)) = env.get(name).map(|b| &b.value) {
            if let Object::Function(target) = self.heap.get(*r)? {
                if let Some(f) = self.functions.get(target) {
                    return Ok(Rc::clone(f));
                }
            }
        }
        Err(Error::UndefinedFunction { name: name.to_string() })
    }

    /// The call boundary: runs the body in a fresh frame and consumes the
    /// return signal, if any, that the body produced.
    fn dispatch(&mut self, env: &Env<'_>, func: &Function, args: Vec<Value>) -> Result<Completion> {
        if func.params.len() != args.len() {
            return Err(Error::ArityMismatch {
                name: func.name.clone(),
                expected: func.params.len(),
                received: args.len(),
            });
        }
        if self.call_depth >= self.config.max_call_depth {
            return Err(Error::CallDepthExceeded { limit: self.config.max_call_depth });
        }
        let mut frame = env.child();
        for (p, v) in func.params.iter().zip(args) {
            if let Some(t) = &p.ty {
                self.heap.check_type(&v, t)?;
            }
            frame.define(p.name.clone(), v, p.ty);
        }

        self.call_depth += 1;
        self.stats.calls += 1;
        let outcome = self.exec_block(&mut frame, &func.body);
        self.call_depth -= 1;

        let completion = match catch_return(outcome) {
            Ok(completion) => completion,
            Err(Unwind::Error(e)) => return Err(e),
            Err(escaped) => return Err(escaped.into_escape_error()),
        };
        match &completion {
            Completion::Returned(signal) => {
                trace!(function = %func.name, kind = %signal.kind(), "caught return signal");
                self.stats.record_return(signal.kind());
            }
            Completion::FellThrough(_) => self.stats.fall_throughs += 1,
        }
        if let Some(expected) = &func.return_type {
            self.heap.check_type(&completion.clone().into_value(), expected)?;
        }
        Ok(completion)
    }

    /// Length function - returns length of string or list
    fn call_len(&mut self, env: &Env<'_>, args: &[Expr]) -> Result<Value> {
        if args.len() != 1 {
            return Err(Error::ArityMismatch { name: "len".into(), expected: 1, received: args.len() });
        }
        let val = self.eval_expr(env, &args[0])?;
        if let Value::Ref(r) = val {
            match self.heap.get(r)? {
                Object::Str(s) => return Ok(Value::Int(s.chars().count() as i64)),
                Object::List(items) => return Ok(Value::Int(items.len() as i64)),
                Object::Function(_) => {}
            }
        }
        Err(Error::type_mismatch(format!(
            "len() expects string or list, got {}",
            self.heap.type_name(&val)
        )))
    }

    /// Push function - appends to a list in place; every handle to the list
    /// observes the change
    fn call_push(&mut self, env: &Env<'_>, args: &[Expr]) -> Result<Value> {
        if args.len() != 2 {
            return Err(Error::ArityMismatch { name: "push".into(), expected: 2, received: args.len() });
        }
        let list = self.eval_expr(env, &args[0])?;
        let item = self.eval_expr(env, &args[1])?;
        if let Value::Ref(r) = list {
            if let Object::List(items) = self.heap.get_mut(r)? {
                items.push(item);
                return Ok(Value::Unit);
            }
        }
        Err(Error::type_mismatch(format!(
            "push() expects a list, got {}",
            self.heap.type_name(&list)
        )))
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}
