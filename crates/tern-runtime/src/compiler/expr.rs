//! Expression compilation

use crate::ast::*;
use crate::bytecode::Instruction;
use crate::compiler::{Compiler, ValueKind};
use crate::error::CompileResult;
use crate::stdlib;

impl Compiler {
    /// Compile an expression in value position: exactly one value is pushed.
    /// A call that returns nothing pushes `null` so it matches the tree
    /// evaluator, where such a call yields `Null`.
    pub(super) fn compile_expr(&mut self, expr: &Expression) -> CompileResult<()> {
        if !self.compile_expr_leaves_value(expr)? {
            self.emit(Instruction::AConstNull);
        }
        Ok(())
    }

    /// Compile an expression, reporting whether it left a value on the stack
    pub(super) fn compile_expr_leaves_value(&mut self, expr: &Expression) -> CompileResult<bool> {
        match expr {
            Expression::Literal(lit) => {
                self.emit(match lit {
                    Literal::Integer(n) => Instruction::IConst(*n),
                    Literal::Character(c) => Instruction::CConst(*c),
                    Literal::String(s) => Instruction::SConst(s.clone()),
                    Literal::Null => Instruction::AConstNull,
                });
            }
            Expression::Memory(MemoryAccess::Variable(name)) => self.compile_load(name),
            Expression::Memory(MemoryAccess::Array { base, index }) => {
                let element = self.kind_of(base).element();
                self.compile_expr(base)?;
                self.compile_expr(index)?;
                self.emit(if element.is_scalar() {
                    Instruction::IALoad
                } else {
                    Instruction::AALoad
                });
            }
            Expression::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(Instruction::BinOp(*op));
            }
            Expression::Unary { op, operand } => match op {
                UnaryOperator::Neg => {
                    self.emit(Instruction::IConst(0));
                    self.compile_expr(operand)?;
                    self.emit(Instruction::BinOp(BinaryOperator::Sub));
                }
                UnaryOperator::Not => {
                    self.compile_expr(operand)?;
                    self.emit(Instruction::IConst(0));
                    self.emit(Instruction::BinOp(BinaryOperator::Eq));
                }
            },
            Expression::Call(call) => return self.compile_call(call),
            Expression::ArrayCreation(elements) => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Instruction::NewArray(elements.len()));
            }
        }
        Ok(true)
    }

    /// Locals first, then the external constants. Any other name gets a
    /// slot that is never written, so reading it fails at run time exactly
    /// where the tree evaluator would fail.
    fn compile_load(&mut self, name: &str) {
        if let Some(id) = self.names.get(name) {
            let scalar = self.kinds.get(&id).map_or(true, ValueKind::is_scalar);
            self.emit(if scalar {
                Instruction::ILoad(id)
            } else {
                Instruction::ALoad(id)
            });
        } else if let Some(value) = stdlib::constant(name) {
            self.emit(Instruction::IConst(value));
        } else {
            let id = self.names.id_of(name);
            self.emit(Instruction::ILoad(id));
        }
    }

    /// Arguments left to right, then the call. Arity was checked up front;
    /// unknown callees are left for the evaluator to reject.
    fn compile_call(&mut self, call: &FunctionCall) -> CompileResult<bool> {
        let signature = self.signature(&call.name);
        for arg in &call.args {
            self.compile_expr(arg)?;
        }
        self.emit(Instruction::InvokeStatic(call.name.clone(), call.args.len()));
        Ok(signature.map_or(false, |sig| sig.returns_value))
    }

    /// Static kind estimate used to pick typed instruction flavours
    pub(super) fn kind_of(&self, expr: &Expression) -> ValueKind {
        match expr {
            Expression::Literal(Literal::String(_)) => ValueKind::Array(Box::new(ValueKind::Scalar)),
            Expression::Literal(Literal::Null) => ValueKind::Reference,
            Expression::Literal(_) | Expression::Binary { .. } | Expression::Unary { .. } => {
                ValueKind::Scalar
            }
            Expression::Memory(MemoryAccess::Variable(name)) => self
                .names
                .get(name)
                .and_then(|id| self.kinds.get(&id).cloned())
                .unwrap_or(ValueKind::Scalar),
            Expression::Memory(MemoryAccess::Array { base, .. }) => self.kind_of(base).element(),
            Expression::ArrayCreation(elements) => ValueKind::Array(Box::new(
                elements
                    .first()
                    .map_or(ValueKind::Scalar, |first| self.kind_of(first)),
            )),
            Expression::Call(call) => {
                if self.functions.contains_key(&call.name) {
                    return ValueKind::Reference;
                }
                match call.name.as_str() {
                    "strsub" | "strdup" | "strcat" | "strmake" => {
                        ValueKind::Array(Box::new(ValueKind::Scalar))
                    }
                    "arrmake" => ValueKind::Array(Box::new(
                        call.args
                            .get(1)
                            .map_or(ValueKind::Reference, |v| self.kind_of(v)),
                    )),
                    _ => ValueKind::Scalar,
                }
            }
        }
    }
}
