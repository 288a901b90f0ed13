//! Statement execution

use crate::ast::*;
use crate::binder::loose_jump;
use crate::error::{RuntimeError, RuntimeResult};
use crate::interpreter::{ControlFlow, Interpreter};
use crate::symbol::{Pointer, Symbol};

/// What a loop should do after one run of its body
enum LoopStep {
    Next,
    Exit,
}

impl<'a> Interpreter<'a> {
    /// Execute statements in order, stopping as soon as control flow leaves
    /// the straight-line path
    pub(super) fn eval_block(&mut self, statements: &[Statement]) -> RuntimeResult<()> {
        for stmt in statements {
            self.eval_statement(stmt)?;
            if self.control_flow != ControlFlow::None {
                break;
            }
        }
        Ok(())
    }

    /// Execute a statement
    pub(super) fn eval_statement(&mut self, stmt: &Statement) -> RuntimeResult<()> {
        match stmt {
            Statement::Compound(block) => self.eval_block(&block.statements),
            Statement::VariableDeclaration(decl) => self.eval_var_decl(decl),
            Statement::Assignment(assign) => self.eval_assign(assign),
            Statement::If(if_stmt) => self.eval_if(if_stmt),
            Statement::While(while_stmt) => self.eval_while(while_stmt),
            Statement::Repeat(repeat) => self.eval_repeat(repeat),
            Statement::For(for_stmt) => self.eval_for(for_stmt),
            Statement::Break => {
                if self.loop_depth == 0 {
                    return Err(loose_jump("break").into());
                }
                self.control_flow = ControlFlow::Break;
                Ok(())
            }
            Statement::Continue => {
                if self.loop_depth == 0 {
                    return Err(loose_jump("continue").into());
                }
                self.control_flow = ControlFlow::Continue;
                Ok(())
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Symbol::Null,
                };
                self.control_flow = ControlFlow::Return(value);
                Ok(())
            }
            Statement::Goto(label) => Err(RuntimeError::Unsupported {
                construct: format!("goto {}", label),
            }),
            Statement::Label(label) => Err(RuntimeError::Unsupported {
                construct: format!("label {}", label),
            }),
            Statement::Skip => Ok(()),
            Statement::Expression(expr) => self.eval_expr(expr).map(|_| ()),
        }
    }

    /// Bind a variable in the current frame. Without an initializer it holds 0.
    fn eval_var_decl(&mut self, decl: &VariableDeclaration) -> RuntimeResult<()> {
        let value = match &decl.initializer {
            Some(expr) => self.eval_expr(expr)?,
            None => Symbol::Int(0),
        };
        let frame = self.env.current_scope()?;
        self.env.define(frame, Pointer::variable(&decl.name), value)
    }

    /// Evaluate an assignment. Element stores evaluate base, index, then value.
    fn eval_assign(&mut self, assign: &AssignmentStatement) -> RuntimeResult<()> {
        match &assign.target {
            MemoryAccess::Variable(name) => {
                let value = self.eval_expr(&assign.value)?;
                self.set_variable(name, value)
            }
            MemoryAccess::Array { base, index } => {
                let base = self.eval_expr(base)?;
                let index = self.eval_expr(index)?;
                let value = self.eval_expr(&assign.value)?;
                base.set_element(&index, value)
            }
        }
    }

    fn eval_if(&mut self, if_stmt: &IfStatement) -> RuntimeResult<()> {
        for case in &if_stmt.cases {
            let taken = match &case.condition {
                Some(cond) => self.eval_condition(cond, "if condition")?,
                None => true,
            };
            if taken {
                return self.eval_block(&case.body.statements);
            }
        }
        Ok(())
    }

    fn eval_while(&mut self, while_stmt: &WhileStatement) -> RuntimeResult<()> {
        self.in_loop(|interp| {
            while interp.eval_condition(&while_stmt.condition, "while condition")? {
                if let LoopStep::Exit = interp.eval_loop_body(&while_stmt.body)? {
                    break;
                }
            }
            Ok(())
        })
    }

    /// `repeat body until cond`: stops once the condition is nonzero
    fn eval_repeat(&mut self, repeat: &RepeatStatement) -> RuntimeResult<()> {
        self.in_loop(|interp| {
            loop {
                if let LoopStep::Exit = interp.eval_loop_body(&repeat.body)? {
                    break;
                }
                if interp.eval_condition(&repeat.condition, "until condition")? {
                    break;
                }
            }
            Ok(())
        })
    }

    fn eval_for(&mut self, for_stmt: &ForStatement) -> RuntimeResult<()> {
        if let Some(init) = &for_stmt.init {
            self.eval_statement(init)?;
        }

        loop {
            if let Some(cond) = &for_stmt.condition {
                if !self.eval_condition(cond, "for condition")? {
                    break;
                }
            }
            if let LoopStep::Exit = self.in_loop(|interp| interp.eval_loop_body(&for_stmt.body))? {
                break;
            }
            // The step runs in the enclosing context: a `break` or `return`
            // there leaves this loop with the flag still set.
            if let Some(step) = &for_stmt.step {
                self.eval_statement(step)?;
                if self.control_flow != ControlFlow::None {
                    break;
                }
            }
        }
        Ok(())
    }

    fn in_loop<T, F>(&mut self, body: F) -> RuntimeResult<T>
    where
        F: FnOnce(&mut Self) -> RuntimeResult<T>,
    {
        self.loop_depth += 1;
        let result = body(self);
        self.loop_depth -= 1;
        result
    }

    /// Run one iteration and absorb `break`/`continue`. A pending return
    /// leaves the flag set so the enclosing blocks unwind.
    fn eval_loop_body(&mut self, body: &CompoundStatement) -> RuntimeResult<LoopStep> {
        self.eval_block(&body.statements)?;
        match self.control_flow {
            ControlFlow::None => Ok(LoopStep::Next),
            ControlFlow::Continue => {
                self.control_flow = ControlFlow::None;
                Ok(LoopStep::Next)
            }
            ControlFlow::Break => {
                self.control_flow = ControlFlow::None;
                Ok(LoopStep::Exit)
            }
            ControlFlow::Return(_) => Ok(LoopStep::Exit),
        }
    }

    pub(super) fn eval_condition(&mut self, cond: &Expression, context: &str) -> RuntimeResult<bool> {
        self.eval_expr(cond)?.is_truthy(context)
    }
}
