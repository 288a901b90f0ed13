//! Expression evaluation

use crate::ast::*;
use crate::error::{RuntimeError, RuntimeResult};
use crate::interpreter::{ControlFlow, Interpreter};
use crate::symbol::{apply_binary, Pointer, Symbol};
use tracing::trace;

impl<'a> Interpreter<'a> {
    /// Evaluate an expression
    pub(super) fn eval_expr(&mut self, expr: &Expression) -> RuntimeResult<Symbol> {
        match expr {
            Expression::Literal(lit) => Ok(eval_literal(lit)),
            Expression::Memory(MemoryAccess::Variable(name)) => self.get_variable(name),
            Expression::Memory(MemoryAccess::Array { base, index }) => {
                let base = self.eval_expr(base)?;
                let index = self.eval_expr(index)?;
                base.element(&index)
            }
            Expression::Binary { op, left, right } => {
                // Both sides are always evaluated, `&&`/`||` included.
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                apply_binary(*op, &left, &right)
            }
            Expression::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                match op {
                    UnaryOperator::Neg => apply_binary(BinaryOperator::Sub, &Symbol::Int(0), &value),
                    UnaryOperator::Not => apply_binary(BinaryOperator::Eq, &value, &Symbol::Int(0)),
                }
            }
            Expression::Call(call) => self.eval_call(call),
            Expression::ArrayCreation(elements) => {
                let items = elements
                    .iter()
                    .map(|element| self.eval_expr(element))
                    .collect::<RuntimeResult<Vec<_>>>()?;
                Ok(Symbol::list(items))
            }
        }
    }

    /// Evaluate a function call
    fn eval_call(&mut self, call: &FunctionCall) -> RuntimeResult<Symbol> {
        // Arguments are evaluated left to right in the caller's frame, before
        // the callee is resolved.
        let args = call
            .args
            .iter()
            .map(|arg| self.eval_expr(arg))
            .collect::<RuntimeResult<Vec<_>>>()?;

        let callee = self
            .env
            .lookup(&Pointer::function(&call.name))?
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: call.name.clone(),
            })?;

        match callee {
            Symbol::External(ext) => ext.invoke(&args),
            Symbol::UserFn(name) => self.call_user_function(&name, args),
            other => Err(RuntimeError::type_mismatch(format!(
                "'{}' is a {}, not a function",
                call.name,
                other.kind()
            ))),
        }
    }

    /// Run a user function in a fresh frame whose parent is the program scope
    fn call_user_function(&mut self, name: &str, args: Vec<Symbol>) -> RuntimeResult<Symbol> {
        let func = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.to_string(),
            })?;

        if args.len() != func.params.len() {
            return Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected: func.params.len(),
                found: args.len(),
            });
        }

        self.call_depth += 1;
        trace!(function = name, depth = self.call_depth, "call");

        let frame = self.env.push_scope(self.program_scope);
        for (param, arg) in func.params.iter().zip(args) {
            self.env.define(frame, Pointer::variable(param), arg)?;
        }

        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.eval_block(&func.body.statements)?;
        self.loop_depth = saved_loop_depth;
        self.env.pop_scope()?;
        self.call_depth -= 1;

        // A call absorbs the return; falling off the end yields null.
        match std::mem::replace(&mut self.control_flow, ControlFlow::None) {
            ControlFlow::Return(value) => Ok(value),
            _ => Ok(Symbol::Null),
        }
    }
}

/// Evaluate a literal. String literals build a fresh list every time.
pub(super) fn eval_literal(lit: &Literal) -> Symbol {
    match lit {
        Literal::Integer(n) => Symbol::Int(*n),
        Literal::Character(c) => Symbol::Char(*c),
        Literal::String(s) => Symbol::string(s),
        Literal::Null => Symbol::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompilationUnit, Expression as E, FunctionDeclaration, Statement as S};
    use crate::interpreter::evaluate;
    use crate::stdlib::{prelude, Io};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn run(functions: Vec<FunctionDeclaration>, body: Vec<S>) -> (RuntimeResult<()>, String) {
        let (io, buffer) = Io::captured("");
        let externals = prelude(&io);
        let result = evaluate(&CompilationUnit::new(functions, body), &externals);
        (result, buffer.contents())
    }

    #[test]
    fn test_eval_literal() {
        assert_eq!(eval_literal(&Literal::Integer(42)), Symbol::Int(42));
        assert_eq!(eval_literal(&Literal::Character(b'x')), Symbol::Char(b'x'));
        assert_eq!(eval_literal(&Literal::Null), Symbol::Null);
        assert_eq!(
            eval_literal(&Literal::String("ok".into())).as_text().as_deref(),
            Some("ok")
        );
    }

    #[rstest]
    #[case(E::binary(BinaryOperator::Add, E::int(2), E::binary(BinaryOperator::Mul, E::int(3), E::int(4))), "14\n")]
    #[case(E::binary(BinaryOperator::Div, E::int(7), E::int(2)), "3\n")]
    #[case(E::binary(BinaryOperator::Mod, E::int(7), E::int(2)), "1\n")]
    #[case(E::unary(UnaryOperator::Neg, E::int(5)), "-5\n")]
    #[case(E::unary(UnaryOperator::Not, E::int(0)), "1\n")]
    #[case(E::var("true"), "1\n")]
    fn test_expression_output(#[case] expr: E, #[case] expected: &str) {
        let (result, output) = run(vec![], vec![S::write(expr)]);
        result.unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_frame_isolation() {
        let f = FunctionDeclaration::new(
            "f",
            &["x"],
            vec![
                S::assign("x", E::int(99)),
                S::ret(Some(E::var("x"))),
            ],
        );
        let body = vec![
            S::declare("x", Some(E::int(1))),
            S::write(E::call("f", vec![E::var("x")])),
            S::write(E::var("x")),
        ];
        assert_eq!(run(vec![f], body).1, "99\n1\n");
    }

    #[test]
    fn test_callee_cannot_see_caller_locals() {
        let peek = FunctionDeclaration::new("peek", &[], vec![S::write(E::var("secret"))]);
        let body = vec![
            S::declare("secret", Some(E::int(5))),
            S::call("peek", vec![]),
        ];
        assert_eq!(
            run(vec![peek], body).0,
            Err(RuntimeError::UndefinedVariable {
                name: "secret".to_string()
            })
        );
    }

    #[test]
    fn test_recursion() {
        let fact = FunctionDeclaration::new(
            "fact",
            &["n"],
            vec![S::if_chain(
                vec![(
                    E::binary(BinaryOperator::Le, E::var("n"), E::int(1)),
                    vec![S::ret(Some(E::int(1)))],
                )],
                Some(vec![S::ret(Some(E::binary(
                    BinaryOperator::Mul,
                    E::var("n"),
                    E::call(
                        "fact",
                        vec![E::binary(BinaryOperator::Sub, E::var("n"), E::int(1))],
                    ),
                )))]),
            )],
        );
        let (result, output) = run(vec![fact], vec![S::write(E::call("fact", vec![E::int(5)]))]);
        result.unwrap();
        assert_eq!(output, "120\n");
    }

    #[test]
    fn test_fall_off_end_returns_null() {
        let f = FunctionDeclaration::new("f", &[], vec![S::Skip]);
        let body = vec![S::write(E::call("f", vec![]))];
        assert_eq!(run(vec![f], body).0.unwrap_err().code(), "type-mismatch");
    }

    #[test]
    fn test_call_errors() {
        let f = FunctionDeclaration::new("f", &["a"], vec![]);
        assert_eq!(
            run(vec![f], vec![S::call("f", vec![])]).0.unwrap_err().code(),
            "arity-mismatch"
        );
        assert_eq!(
            run(vec![], vec![S::call("nope", vec![])]).0,
            Err(RuntimeError::UnknownFunction {
                name: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_array_store_and_load() {
        let body = vec![
            S::declare("a", Some(E::array(vec![E::int(1), E::int(2)]))),
            S::assign_index(E::var("a"), E::int(1), E::int(7)),
            S::write(E::index(E::var("a"), E::int(1))),
            S::write(E::call("arrlen", vec![E::var("a")])),
        ];
        assert_eq!(run(vec![], body).1, "7\n2\n");
    }

    #[test]
    fn test_external_is_read_only() {
        let (result, _) = run(vec![], vec![S::assign("true", E::int(0))]);
        assert_eq!(result.unwrap_err().code(), "external-reassignment");
    }
}
