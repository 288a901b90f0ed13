//! Statement compilation

use crate::ast::*;
use crate::binder::loose_jump;
use crate::bytecode::Instruction;
use crate::compiler::{Compiler, LoopContext, ValueKind};
use crate::error::{CompileError, CompileResult};

impl Compiler {
    /// Compile a statement
    pub(super) fn compile_stmt(&mut self, stmt: &Statement) -> CompileResult<()> {
        match stmt {
            Statement::Compound(block) => self.compile_block(&block.statements),
            Statement::VariableDeclaration(decl) => {
                match &decl.initializer {
                    Some(init) => self.compile_expr(init)?,
                    None => self.emit(Instruction::IConst(0)),
                }
                let kind = decl
                    .initializer
                    .as_ref()
                    .map_or(ValueKind::Scalar, |init| self.kind_of(init));
                self.store_variable(&decl.name, kind);
                Ok(())
            }
            Statement::Assignment(assign) => self.compile_assign(assign),
            Statement::If(if_stmt) => self.compile_if(if_stmt),
            Statement::While(while_stmt) => self.compile_while(while_stmt),
            Statement::Repeat(repeat) => self.compile_repeat(repeat),
            Statement::For(for_stmt) => self.compile_for(for_stmt),
            Statement::Break => {
                let target = self.innermost_loop("break")?.break_label.clone();
                self.emit(Instruction::Goto(target));
                Ok(())
            }
            Statement::Continue => {
                let target = self.innermost_loop("continue")?.continue_label.clone();
                self.emit(Instruction::Goto(target));
                Ok(())
            }
            Statement::Return(value) => self.compile_return(value.as_ref()),
            Statement::Goto(label) => Err(CompileError::Unsupported {
                construct: format!("goto {}", label),
            }),
            Statement::Label(label) => Err(CompileError::Unsupported {
                construct: format!("label {}", label),
            }),
            Statement::Skip => Ok(()),
            Statement::Expression(expr) => {
                if self.compile_expr_leaves_value(expr)? {
                    self.emit(Instruction::Pop);
                }
                Ok(())
            }
        }
    }

    fn compile_block(&mut self, statements: &[Statement]) -> CompileResult<()> {
        for stmt in statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    /// Store the value on top of the stack into a named slot
    fn store_variable(&mut self, name: &str, kind: ValueKind) {
        let id = self.names.id_of(name);
        let instr = if kind.is_scalar() {
            Instruction::IStore(id)
        } else {
            Instruction::AStore(id)
        };
        self.emit(instr);
        self.kinds.insert(id, kind);
    }

    /// Element stores push base, index, value, in that order
    fn compile_assign(&mut self, assign: &AssignmentStatement) -> CompileResult<()> {
        let kind = self.kind_of(&assign.value);
        match &assign.target {
            MemoryAccess::Variable(name) => {
                self.compile_expr(&assign.value)?;
                self.store_variable(name, kind);
                Ok(())
            }
            MemoryAccess::Array { base, index } => {
                self.compile_expr(base)?;
                self.compile_expr(index)?;
                self.compile_expr(&assign.value)?;
                self.emit(if kind.is_scalar() {
                    Instruction::IAStore
                } else {
                    Instruction::AAStore
                });
                Ok(())
            }
        }
    }

    /// One label per case plus an end label. Each case falls to the next
    /// case's label when its test fails.
    fn compile_if(&mut self, if_stmt: &IfStatement) -> CompileResult<()> {
        let case_labels: Vec<String> = if_stmt.cases.iter().map(|_| self.new_label()).collect();
        let end = self.new_label();

        for (i, case) in if_stmt.cases.iter().enumerate() {
            let next = case_labels.get(i + 1).unwrap_or(&end).clone();
            self.emit(Instruction::Label(case_labels[i].clone()));
            if let Some(cond) = &case.condition {
                self.compile_expr(cond)?;
                self.emit(Instruction::IfFalse(next));
            }
            self.compile_block(&case.body.statements)?;
            self.emit(Instruction::Goto(end.clone()));
        }
        self.emit(Instruction::Label(end));
        Ok(())
    }

    /// `test; if_false end; loop: body; cont: test; if_true loop; end:`
    fn compile_while(&mut self, while_stmt: &WhileStatement) -> CompileResult<()> {
        let start = self.new_label();
        let cont = self.new_label();
        let end = self.new_label();

        self.compile_expr(&while_stmt.condition)?;
        self.emit(Instruction::IfFalse(end.clone()));
        self.emit(Instruction::Label(start.clone()));
        self.compile_loop_body(&while_stmt.body, &cont, &end)?;
        self.emit(Instruction::Label(cont));
        self.compile_expr(&while_stmt.condition)?;
        self.emit(Instruction::IfTrue(start));
        self.emit(Instruction::Label(end));
        Ok(())
    }

    /// `loop: body; cont: test; if_false loop; end:`
    fn compile_repeat(&mut self, repeat: &RepeatStatement) -> CompileResult<()> {
        let start = self.new_label();
        let cont = self.new_label();
        let end = self.new_label();

        self.emit(Instruction::Label(start.clone()));
        self.compile_loop_body(&repeat.body, &cont, &end)?;
        self.emit(Instruction::Label(cont));
        self.compile_expr(&repeat.condition)?;
        self.emit(Instruction::IfFalse(start));
        self.emit(Instruction::Label(end));
        Ok(())
    }

    /// `init; loop: [test; if_false end]; body; cont: step; goto loop; end:`
    fn compile_for(&mut self, for_stmt: &ForStatement) -> CompileResult<()> {
        if let Some(init) = &for_stmt.init {
            self.compile_stmt(init)?;
        }
        let start = self.new_label();
        let cont = self.new_label();
        let end = self.new_label();

        self.emit(Instruction::Label(start.clone()));
        if let Some(cond) = &for_stmt.condition {
            self.compile_expr(cond)?;
            self.emit(Instruction::IfFalse(end.clone()));
        }
        self.compile_loop_body(&for_stmt.body, &cont, &end)?;
        self.emit(Instruction::Label(cont));
        if let Some(step) = &for_stmt.step {
            self.compile_stmt(step)?;
        }
        self.emit(Instruction::Goto(start));
        self.emit(Instruction::Label(end));
        Ok(())
    }

    fn compile_loop_body(
        &mut self,
        body: &CompoundStatement,
        continue_label: &str,
        break_label: &str,
    ) -> CompileResult<()> {
        self.loops.push(LoopContext {
            continue_label: continue_label.to_string(),
            break_label: break_label.to_string(),
        });
        let result = self.compile_block(&body.statements);
        self.loops.pop();
        result
    }

    fn innermost_loop(&self, keyword: &str) -> CompileResult<&LoopContext> {
        self.loops.last().ok_or_else(|| loose_jump(keyword))
    }

    /// Value functions always return through a typed return; in a void
    /// function (only `main` can carry a valued return) the value is dropped.
    fn compile_return(&mut self, value: Option<&Expression>) -> CompileResult<()> {
        if self.returns_value {
            match value {
                Some(expr) => {
                    self.compile_expr(expr)?;
                    let instr = if self.kind_of(expr).is_scalar() {
                        Instruction::IReturn
                    } else {
                        Instruction::AReturn
                    };
                    self.emit(instr);
                }
                None => {
                    self.emit(Instruction::AConstNull);
                    self.emit(Instruction::AReturn);
                }
            }
        } else {
            if let Some(expr) = value {
                if self.compile_expr_leaves_value(expr)? {
                    self.emit(Instruction::Pop);
                }
            }
            self.emit(Instruction::Return);
        }
        Ok(())
    }
}
