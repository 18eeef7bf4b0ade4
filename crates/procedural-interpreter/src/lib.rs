//! Procedural interpreter: the return-signal carrier and a tree-walking
//! evaluator that produces and consumes it.
//!
//! [`flow`] holds the control-transfer types. A `return` anywhere inside a
//! function body becomes a [`ReturnSignal`] that travels up through blocks,
//! conditionals and loops as `Err(Unwind::Return(..))` until the call
//! dispatcher in [`interpreter`] catches it.

pub mod config;
pub mod env;
pub mod flow;
pub mod interpreter;
pub mod value;

pub use config::InterpreterConfig;
pub use env::Env;
pub use flow::{catch_error, catch_return, Completion, Exec, ReturnKind, ReturnSignal, Unwind};
pub use interpreter::{ExecStats, Interpreter};
pub use value::{Heap, ObjRef, Object, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use procedural_syntax::ast::*;
    use procedural_syntax::Error;

    fn run_program(items: Vec<Item>) -> (Interpreter, Result<Option<Value>, Error>) {
        let mut interpreter = Interpreter::new();
        let result = interpreter.run_with_env(Program::new(items), &mut Env::new_root());
        (interpreter, result)
    }

    fn expect_value(items: Vec<Item>, expected: Value) {
        match run_program(items) {
            (_, Ok(Some(actual))) => assert_eq!(actual, expected),
            (_, Ok(None)) => panic!("Expected value but got None"),
            (_, Err(e)) => panic!("Program failed: {}", e),
        }
    }

    fn expect_error(items: Vec<Item>, expected: Error) {
        match run_program(items) {
            (_, Ok(v)) => panic!("Expected error but program produced {:?}", v),
            (_, Err(e)) => assert_eq!(e, expected),
        }
    }

    fn fun(name: &str, params: &[&str], body: Vec<Stmt>) -> Item {
        Item::Function(Function::new(name, params.iter().map(|p| Param::new(*p)).collect(), body))
    }

    fn stmt(e: Expr) -> Item {
        Item::Stmt(expr_stmt(e))
    }

    #[test]
    fn test_return_integer() {
        expect_value(vec![fun("answer", &[], vec![ret(int(42))]), stmt(call("answer", vec![]))], Value::Int(42));
    }

    #[test]
    fn test_bare_return_is_unit() {
        let (interp, result) = run_program(vec![
            fun("nothing", &[], vec![expr_stmt(int(1)), ret_unit(), expr_stmt(int(2))]),
            stmt(call("nothing", vec![])),
        ]);
        assert_eq!(result, Ok(Some(Value::Unit)));
        assert_eq!(interp.stats().returns(ReturnKind::Unit), 1);
    }

    #[test]
    fn test_return_skips_rest_of_body() {
        // fun f(): let x = 1  if true: return x end  throw "unreachable" end
        let body = vec![
            let_("x", int(1)),
            if_then(boolean(true), vec![ret(ident("x"))]),
            throw(string("unreachable")),
        ];
        expect_value(vec![fun("f", &[], body), stmt(call("f", vec![]))], Value::Int(1));
    }

    #[test]
    fn test_fall_through_uses_last_value() {
        let (interp, result) = run_program(vec![
            fun("double", &["x"], vec![expr_stmt(add(ident("x"), ident("x")))]),
            stmt(call("double", vec![int(21)])),
        ]);
        assert_eq!(result, Ok(Some(Value::Int(42))));
        assert_eq!(interp.stats().fall_throughs, 1);
        assert_eq!(interp.stats().explicit_returns(), 0);
    }

    #[test]
    fn test_return_from_loops() {
        // fun find(): for i in 0..100: while true: if i == 7: return i * 1.5 end break end end end
        let body = vec![for_range(
            "i",
            int(0),
            int(100),
            vec![while_(
                boolean(true),
                vec![
                    if_then(eq(ident("i"), int(7)), vec![ret(Expr::BinaryMul(Box::new(ident("i")), Box::new(float(1.5))))]),
                    Stmt::Break,
                ],
            )],
        )];
        let (interp, result) = run_program(vec![fun("find", &[], body), stmt(call("find", vec![]))]);
        assert_eq!(result, Ok(Some(Value::Float(10.5))));
        assert_eq!(interp.active_loops(), 0);
        assert_eq!(interp.stats().returns(ReturnKind::Float), 1);
    }

    #[test]
    fn test_break_and_continue_stay_in_loop() {
        // let total = 0; for i in 0..10: if i == 3: continue end if i == 6: break end total = total + i end; total
        let items = vec![
            Item::Stmt(let_("total", int(0))),
            Item::Stmt(for_range(
                "i",
                int(0),
                int(10),
                vec![
                    if_then(eq(ident("i"), int(3)), vec![Stmt::Continue]),
                    if_then(eq(ident("i"), int(6)), vec![Stmt::Break]),
                    assign("total", add(ident("total"), ident("i"))),
                ],
            )),
            stmt(ident("total")),
        ];
        expect_value(items, Value::Int(12));
    }

    #[test]
    fn test_recursion_with_returns() {
        // fun fib(n): if n < 2: return n end return fib(n - 1) + fib(n - 2) end
        let fib = fun(
            "fib",
            &["n"],
            vec![
                if_then(lt(ident("n"), int(2)), vec![ret(ident("n"))]),
                ret(add(call("fib", vec![sub(ident("n"), int(1))]), call("fib", vec![sub(ident("n"), int(2))]))),
            ],
        );
        expect_value(vec![fib, stmt(call("fib", vec![int(10)]))], Value::Int(55));
    }

    #[test]
    fn test_return_reference_shares_object() {
        // let xs = [1]; fun same(l): return l end; push(same(xs), 2); len(xs)
        let items = vec![
            fun("same", &["l"], vec![ret(ident("l"))]),
            Item::Stmt(let_("xs", Expr::List(vec![int(1)]))),
            stmt(call("push", vec![call("same", vec![ident("xs")]), int(2)])),
            stmt(call("len", vec![ident("xs")])),
        ];
        expect_value(items, Value::Int(2));
    }

    #[test]
    fn test_function_reference_call() {
        // fun seven(): return 7 end; let f = seven; f()
        let items = vec![
            fun("seven", &[], vec![ret(int(7))]),
            Item::Stmt(let_("f", ident("seven"))),
            stmt(call("f", vec![])),
        ];
        expect_value(items, Value::Int(7));
    }

    #[test]
    fn test_escaped_signals_are_errors() {
        expect_error(vec![Item::Stmt(ret(int(1)))], Error::ReturnOutsideFunction);
        expect_error(vec![Item::Stmt(Stmt::Break)], Error::BreakOutsideLoop);
        expect_error(vec![fun("f", &[], vec![Stmt::Continue]), stmt(call("f", vec![]))], Error::ContinueOutsideLoop);
    }

    #[test]
    fn test_error_cases() {
        expect_error(vec![stmt(ident("undefined_var"))], Error::UndefinedVariable { name: "undefined_var".into() });
        expect_error(vec![stmt(call("nope", vec![]))], Error::UndefinedFunction { name: "nope".into() });
        expect_error(vec![stmt(Expr::BinaryDiv(Box::new(int(1)), Box::new(int(0))))], Error::DivisionByZero);
        expect_error(
            vec![stmt(Expr::Index(Box::new(Expr::List(vec![int(1)])), Box::new(int(5))))],
            Error::IndexOutOfBounds { index: 5, len: 1 },
        );
        expect_error(
            vec![fun("f", &["a"], vec![]), stmt(call("f", vec![]))],
            Error::ArityMismatch { name: "f".into(), expected: 1, received: 0 },
        );
    }

    #[test]
    fn test_return_type_annotation_is_checked() {
        let f = Function::new("f", vec![], vec![ret(boolean(true))]).returning(Type::Int);
        let (_, result) = run_program(vec![Item::Function(f), stmt(call("f", vec![]))]);
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_try_catches_errors_only() {
        // fun f(): try: return 5 catch e: return 0 end end
        let items = vec![
            fun("f", &[], vec![try_catch(vec![ret(int(5))], "e", vec![ret(int(0))])]),
            stmt(call("f", vec![])),
        ];
        expect_value(items, Value::Int(5));

        // try: throw "boom" catch e: e end
        let (interp, result) = run_program(vec![Item::Stmt(try_catch(
            vec![throw(string("boom"))],
            "e",
            vec![expr_stmt(ident("e"))],
        ))]);
        let caught = result.expect("try should recover").expect("handler value");
        assert_eq!(interp.heap().as_str(&caught), Some("boom"));
    }

    #[test]
    fn test_catch_binding_is_scoped_to_handler() {
        // try: throw "a" catch e: 0 end  e
        let items = vec![
            Item::Stmt(try_catch(vec![throw(string("a"))], "e", vec![expr_stmt(int(0))])),
            stmt(ident("e")),
        ];
        expect_error(items, Error::UndefinedVariable { name: "e".to_string() });
    }

    #[test]
    fn test_repeated_literals_and_function_refs_share_objects() {
        // fun f(): let s = "x" return f end
        let mut interp = Interpreter::new();
        interp.define_function(Function::new("f", vec![], vec![let_("s", string("x")), ret(ident("f"))]));

        let first = interp.call_function("f", vec![]).unwrap();
        let live = interp.heap().len();
        for _ in 0..1000 {
            assert_eq!(interp.call_function("f", vec![]).unwrap(), first);
        }
        assert_eq!(interp.heap().len(), live);
        assert_eq!(live, 2);
    }

    #[test]
    fn test_call_depth_limit() {
        let mut interp = Interpreter::with_config(InterpreterConfig::new().with_max_call_depth(8));
        let program = Program::new(vec![
            fun("down", &["n"], vec![ret(call("down", vec![add(ident("n"), int(1))]))]),
            stmt(call("down", vec![int(0)])),
        ]);
        assert_eq!(interp.run(program), Err(Error::CallDepthExceeded { limit: 8 }));
        assert_eq!(interp.call_depth(), 0);
    }

    #[test]
    fn test_loop_limit() {
        let mut interp = Interpreter::with_config(InterpreterConfig::new().with_max_loop_iterations(100));
        let program = Program::new(vec![Item::Stmt(while_(boolean(true), vec![]))]);
        assert_eq!(interp.run(program), Err(Error::LoopLimitExceeded { limit: 100 }));
        assert_eq!(interp.active_loops(), 0);
    }

    #[test]
    fn test_string_and_float_arithmetic() {
        let (interp, result) = run_program(vec![stmt(add(string("foo"), string("bar")))]);
        let v = result.unwrap().unwrap();
        assert_eq!(interp.heap().as_str(&v), Some("foobar"));

        expect_value(vec![stmt(add(int(1), float(0.5)))], Value::Float(1.5));
        expect_value(vec![stmt(Expr::Negate(Box::new(int(3))))], Value::Int(-3));
        expect_value(vec![stmt(lt(float(f64::NAN), int(1)))], Value::Bool(false));
    }
}
