//! AST interpreter (tree-walking)
//!
//! The reference semantics for the whole pipeline. Supports:
//! - Expression evaluation (literals, binary/unary ops, calls, indexing)
//! - Statement execution (declarations, assignments, structured control flow)
//! - Function calls with one fresh frame per call
//!
//! Variables are scoped per function frame, not per block, which is the same
//! model the bytecode uses (one slot table per function). Every frame's
//! parent is the program scope holding the function pointers, so a callee
//! never sees its caller's locals.

mod expr;
mod stmt;

use crate::ast::{CompilationUnit, FunctionDeclaration};
use crate::binder;
use crate::error::{RuntimeError, RuntimeResult};
use crate::scope::{Environment, Externals, ScopeId};
use crate::symbol::{Pointer, Symbol};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Control flow signal for handling break, continue, and return
#[derive(Debug, Clone, PartialEq)]
pub(super) enum ControlFlow {
    None,
    Break,
    Continue,
    Return(Symbol),
}

/// Interpreter state
pub struct Interpreter<'a> {
    externals: &'a Externals,
    pub(super) env: Environment<'a>,
    /// Scope holding one `Function` pointer per declared function
    pub(super) program_scope: Option<ScopeId>,
    /// User-defined function bodies, looked up by `UserFn` handles
    pub(super) functions: HashMap<String, Rc<FunctionDeclaration>>,
    /// Current control flow state
    pub(super) control_flow: ControlFlow,
    /// Enclosing loops in the current frame
    pub(super) loop_depth: usize,
    pub(super) call_depth: usize,
}

impl<'a> Interpreter<'a> {
    /// Create a new interpreter over an externals table
    pub fn new(externals: &'a Externals) -> Self {
        Self {
            externals,
            env: Environment::new(externals),
            program_scope: None,
            functions: HashMap::new(),
            control_flow: ControlFlow::None,
            loop_depth: 0,
            call_depth: 0,
        }
    }

    /// Evaluate a program: declare every function, then run the body as `main`
    pub fn evaluate(&mut self, unit: &CompilationUnit) -> RuntimeResult<()> {
        binder::check(unit)?;
        self.reset();
        debug!(functions = unit.functions.len(), "evaluating AST");

        let program = self.env.push_scope(None);
        self.program_scope = Some(program);
        self.declare_functions(program, &unit.functions)?;

        self.env.push_scope(Some(program));
        self.eval_block(&unit.body.statements)?;
        self.env.pop_scope()?;
        self.env.pop_scope()?;

        self.control_flow = ControlFlow::None;
        debug!("AST evaluation finished");
        Ok(())
    }

    fn reset(&mut self) {
        self.env = Environment::new(self.externals);
        self.program_scope = None;
        self.functions.clear();
        self.control_flow = ControlFlow::None;
        self.loop_depth = 0;
        self.call_depth = 0;
    }

    fn declare_functions(
        &mut self,
        program: ScopeId,
        functions: &[FunctionDeclaration],
    ) -> RuntimeResult<()> {
        for func in functions {
            self.env.define(
                program,
                Pointer::function(&func.name),
                Symbol::UserFn(Rc::from(func.name.as_str())),
            )?;
            self.functions
                .insert(func.name.clone(), Rc::new(func.clone()));
        }
        Ok(())
    }

    /// Read a variable
    pub(super) fn get_variable(&self, name: &str) -> RuntimeResult<Symbol> {
        self.env
            .lookup(&Pointer::variable(name))?
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Write a variable, creating it in the current frame if unbound
    pub(super) fn set_variable(&mut self, name: &str, value: Symbol) -> RuntimeResult<()> {
        self.env.put(Pointer::variable(name), value)
    }
}

/// Evaluate a compilation unit against an externals table
pub fn evaluate(unit: &CompilationUnit, externals: &Externals) -> RuntimeResult<()> {
    Interpreter::new(externals).evaluate(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, FunctionDeclaration, Statement};
    use crate::bytecode::MAIN;
    use crate::span::Span;
    use crate::stdlib::{prelude, Io};
    use pretty_assertions::assert_eq;

    fn run(unit: &CompilationUnit) -> (RuntimeResult<()>, String) {
        let (io, buffer) = Io::captured("");
        let externals = prelude(&io);
        let result = evaluate(unit, &externals);
        (result, buffer.contents())
    }

    #[test]
    fn test_empty_program() {
        let (result, output) = run(&CompilationUnit::default());
        assert_eq!(result, Ok(()));
        assert_eq!(output, "");
    }

    #[test]
    fn test_duplicate_function_names_both_spans() {
        let unit = CompilationUnit::new(
            vec![
                FunctionDeclaration::new("f", &[], vec![]).with_span(Span::new(0, 5)),
                FunctionDeclaration::new("f", &[], vec![]).with_span(Span::new(10, 15)),
            ],
            vec![],
        );
        assert_eq!(
            run(&unit).0,
            Err(RuntimeError::Redefinition {
                name: "f".to_string(),
                first: Span::new(0, 5),
                second: Span::new(10, 15),
            })
        );
    }

    #[test]
    fn test_function_named_main_rejected() {
        let unit = CompilationUnit::new(vec![FunctionDeclaration::new(MAIN, &[], vec![])], vec![]);
        assert_eq!(run(&unit).0.unwrap_err().code(), "redefinition");
    }

    #[test]
    fn test_interpreter_is_reusable() {
        let (io, buffer) = Io::captured("");
        let externals = prelude(&io);
        let unit = CompilationUnit::new(vec![], vec![Statement::write(Expression::int(3))]);
        let mut interp = Interpreter::new(&externals);
        interp.evaluate(&unit).unwrap();
        interp.evaluate(&unit).unwrap();
        assert_eq!(buffer.contents(), "3\n3\n");
        assert_eq!(interp.env.depth(), 0);
    }

    #[test]
    fn test_break_outside_loop() {
        let unit = CompilationUnit::new(vec![], vec![Statement::Break]);
        assert_eq!(run(&unit).0.unwrap_err().code(), "unsupported");
    }
}
