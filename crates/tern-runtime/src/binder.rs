//! Static name and shape checks
//!
//! Runs over the whole unit before any tier evaluates or lowers it, so a
//! program is either rejected by every tier or by none, whether or not the
//! offending code is ever reached:
//! - function names are unique, never `main`, never an external name
//! - parameters are unique and never external names
//! - calls to user functions and primitives have the declared arity
//! - constants are never called, primitives are never read as values
//! - externals are never assigned or declared
//! - `break`/`continue` sit inside a loop of the same function
//! - `goto`/`label` are rejected outright

use crate::ast::*;
use crate::bytecode::MAIN;
use crate::error::{CompileError, CompileResult};
use crate::span::Span;
use crate::stdlib;
use std::collections::HashMap;

/// Checker state for one unit
pub struct Binder<'u> {
    /// Arity of every user function
    arities: HashMap<&'u str, usize>,
    /// Enclosing loops in the function being checked
    loop_depth: usize,
}

impl<'u> Binder<'u> {
    pub fn new() -> Self {
        Self {
            arities: HashMap::new(),
            loop_depth: 0,
        }
    }

    /// Check a unit: hoist the function signatures, then walk every body
    pub fn check(&mut self, unit: &'u CompilationUnit) -> CompileResult<()> {
        self.arities.clear();
        self.hoist_functions(&unit.functions)?;

        for func in &unit.functions {
            self.check_params(func)?;
            self.check_body(&func.body.statements)?;
        }
        self.check_body(&unit.body.statements)
    }

    fn hoist_functions(&mut self, functions: &'u [FunctionDeclaration]) -> CompileResult<()> {
        let mut spans: HashMap<&str, Span> = HashMap::new();
        spans.insert(MAIN, Span::dummy());

        for func in functions {
            if let Some(first) = spans.get(func.name.as_str()) {
                return Err(CompileError::Redefinition {
                    name: func.name.clone(),
                    first: *first,
                    second: func.span,
                });
            }
            if is_external(&func.name) {
                return Err(CompileError::ExternalReassignment {
                    name: func.name.clone(),
                });
            }
            spans.insert(&func.name, func.span);
            self.arities.insert(&func.name, func.params.len());
        }
        Ok(())
    }

    fn check_params(&self, func: &FunctionDeclaration) -> CompileResult<()> {
        for (i, param) in func.params.iter().enumerate() {
            if is_external(param) {
                return Err(CompileError::ExternalReassignment {
                    name: param.clone(),
                });
            }
            if func.params[..i].contains(param) {
                return Err(CompileError::Redefinition {
                    name: param.clone(),
                    first: func.span,
                    second: func.span,
                });
            }
        }
        Ok(())
    }

    fn check_body(&mut self, statements: &[Statement]) -> CompileResult<()> {
        self.loop_depth = 0;
        self.check_block(statements)
    }

    fn check_block(&mut self, statements: &[Statement]) -> CompileResult<()> {
        statements.iter().try_for_each(|stmt| self.check_stmt(stmt))
    }

    fn check_stmt(&mut self, stmt: &Statement) -> CompileResult<()> {
        match stmt {
            Statement::Compound(block) => self.check_block(&block.statements),
            Statement::VariableDeclaration(decl) => {
                if let Some(init) = &decl.initializer {
                    self.check_expr(init)?;
                }
                check_writable(&decl.name)
            }
            Statement::Assignment(assign) => {
                match &assign.target {
                    MemoryAccess::Variable(name) => check_writable(name)?,
                    MemoryAccess::Array { base, index } => {
                        self.check_expr(base)?;
                        self.check_expr(index)?;
                    }
                }
                self.check_expr(&assign.value)
            }
            Statement::If(if_stmt) => {
                for case in &if_stmt.cases {
                    if let Some(cond) = &case.condition {
                        self.check_expr(cond)?;
                    }
                    self.check_block(&case.body.statements)?;
                }
                Ok(())
            }
            Statement::While(w) => {
                self.check_expr(&w.condition)?;
                self.check_loop_body(&w.body)
            }
            Statement::Repeat(r) => {
                self.check_loop_body(&r.body)?;
                self.check_expr(&r.condition)
            }
            Statement::For(f) => {
                if let Some(init) = &f.init {
                    self.check_stmt(init)?;
                }
                if let Some(cond) = &f.condition {
                    self.check_expr(cond)?;
                }
                self.check_loop_body(&f.body)?;
                // The step belongs to the enclosing context, not to the loop.
                match &f.step {
                    Some(step) => self.check_stmt(step),
                    None => Ok(()),
                }
            }
            Statement::Break => self.check_in_loop("break"),
            Statement::Continue => self.check_in_loop("continue"),
            Statement::Return(value) => match value {
                Some(expr) => self.check_expr(expr),
                None => Ok(()),
            },
            Statement::Goto(label) => Err(CompileError::Unsupported {
                construct: format!("goto {}", label),
            }),
            Statement::Label(label) => Err(CompileError::Unsupported {
                construct: format!("label {}", label),
            }),
            Statement::Skip => Ok(()),
            Statement::Expression(expr) => self.check_expr(expr),
        }
    }

    fn check_loop_body(&mut self, body: &CompoundStatement) -> CompileResult<()> {
        self.loop_depth += 1;
        let result = self.check_block(&body.statements);
        self.loop_depth -= 1;
        result
    }

    fn check_in_loop(&self, keyword: &str) -> CompileResult<()> {
        if self.loop_depth == 0 {
            return Err(loose_jump(keyword));
        }
        Ok(())
    }

    fn check_expr(&mut self, expr: &Expression) -> CompileResult<()> {
        match expr {
            Expression::Literal(_) => Ok(()),
            Expression::Memory(MemoryAccess::Variable(name)) => {
                if stdlib::signature(name).is_some() {
                    return Err(CompileError::TypeMismatch {
                        msg: format!("'{}' is a function, not a value", name),
                    });
                }
                Ok(())
            }
            Expression::Memory(MemoryAccess::Array { base, index }) => {
                self.check_expr(base)?;
                self.check_expr(index)
            }
            Expression::Binary { left, right, .. } => {
                self.check_expr(left)?;
                self.check_expr(right)
            }
            Expression::Unary { operand, .. } => self.check_expr(operand),
            Expression::Call(call) => {
                self.check_callee(call)?;
                call.args.iter().try_for_each(|arg| self.check_expr(arg))
            }
            Expression::ArrayCreation(elements) => {
                elements.iter().try_for_each(|element| self.check_expr(element))
            }
        }
    }

    /// Unknown callees pass; they fail when the call is reached
    fn check_callee(&self, call: &FunctionCall) -> CompileResult<()> {
        if stdlib::constant(&call.name).is_some() {
            return Err(CompileError::TypeMismatch {
                msg: format!("'{}' is a constant, not a function", call.name),
            });
        }
        let arity = self
            .arities
            .get(call.name.as_str())
            .copied()
            .or_else(|| stdlib::signature(&call.name).map(|sig| sig.arity));
        match arity {
            Some(expected) if expected != call.args.len() => Err(CompileError::ArityMismatch {
                name: call.name.clone(),
                expected,
                found: call.args.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for Binder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `name` belongs to the externals table
pub fn is_external(name: &str) -> bool {
    stdlib::constant(name).is_some() || stdlib::signature(name).is_some()
}

fn check_writable(name: &str) -> CompileResult<()> {
    if is_external(name) {
        return Err(CompileError::ExternalReassignment {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Error for a `break`/`continue` with no enclosing loop in its function
pub(crate) fn loose_jump(keyword: &str) -> CompileError {
    CompileError::Unsupported {
        construct: format!("'{}' outside of a loop", keyword),
    }
}

/// Check a unit with a fresh binder
pub fn check(unit: &CompilationUnit) -> CompileResult<()> {
    Binder::new().check(unit)
}
