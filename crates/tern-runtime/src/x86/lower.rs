//! Bytecode to x86 lowering, one function at a time

use super::frame::Frame;
use super::instr::{Condition, LogicalOp, Operand, Register, X86Instruction};
use super::{runtime, DataEntry, X86Compiler, X86Function};
use crate::ast::BinaryOperator;
use crate::bytecode::{Instruction, VMFunction, VMProgram};
use crate::error::{CompileError, CompileResult};
use crate::stdlib;
use tracing::debug;

const ESP: Operand = Operand::Register(Register::Esp);
const EBP: Operand = Operand::Register(Register::Ebp);

/// What a call site needs to know about its callee
struct Callee {
    symbol: String,
    returns_value: bool,
}

impl X86Compiler {
    pub(super) fn lower_function(
        &mut self,
        program: &VMProgram,
        function: &VMFunction,
    ) -> CompileResult<X86Function> {
        self.function = function.name.clone();
        self.epilogue = format!(".Lend_{}", function.name);
        self.frame = Frame::new(function.argc, function.slot_count(), &self.pool);
        self.code = Vec::new();

        // The entry label becomes the symbol ahead of the prologue.
        let body = match function.code.first() {
            Some(Instruction::Label(name)) if *name == function.name => &function.code[1..],
            _ => &function.code[..],
        };
        for instr in body {
            self.lower(program, instr)?;
        }

        let body = std::mem::take(&mut self.code);
        let frame_size = self.frame.size();
        let mut code = Vec::with_capacity(body.len() + 2 * self.pool.len() + 10);
        code.push(X86Instruction::Label(function.name.clone()));
        code.push(X86Instruction::PushL(EBP));
        code.push(X86Instruction::MovL(ESP, EBP));
        if frame_size > 0 {
            code.push(X86Instruction::SubL(Operand::Immediate(frame_size), ESP));
        }
        for reg in &self.pool {
            code.push(X86Instruction::PushL(Operand::Register(*reg)));
        }
        // Only a body that can fall through needs the default return value.
        let ends_with_return =
            matches!(body.last(), Some(X86Instruction::Jmp(target)) if *target == self.epilogue);
        code.extend(body);
        if !ends_with_return {
            code.push(X86Instruction::MovL(Operand::Immediate(0), Operand::EAX));
        }
        code.push(X86Instruction::Label(self.epilogue.clone()));
        for reg in self.pool.iter().rev() {
            code.push(X86Instruction::PopL(Operand::Register(*reg)));
        }
        code.push(X86Instruction::MovL(EBP, ESP));
        code.push(X86Instruction::PopL(EBP));
        code.push(X86Instruction::Ret);

        debug!(
            function = function.name.as_str(),
            frame_size,
            instructions = code.len(),
            leftover_values = self.frame.depth(),
            "lowered function to x86"
        );
        Ok(X86Function {
            name: function.name.clone(),
            frame_size,
            code,
        })
    }

    fn lower(&mut self, program: &VMProgram, instr: &Instruction) -> CompileResult<()> {
        match instr {
            Instruction::Dup => {
                let top = self.frame.peek().cloned().ok_or_else(|| self.underflow())?;
                let copy = self.frame.allocate();
                self.mov(top, copy);
            }
            Instruction::Pop => {
                self.pop()?;
            }

            Instruction::ILoad(id) | Instruction::ALoad(id) => {
                let home = self.frame.variable(*id);
                let value = self.frame.allocate();
                self.mov(home, value);
            }
            Instruction::IStore(id) | Instruction::AStore(id) => {
                let value = self.pop()?;
                let home = self.frame.variable(*id);
                self.mov(value, home);
            }

            Instruction::IALoad | Instruction::AALoad => {
                let args = self.pop_n(2)?;
                self.call(runtime::ELEM_LOAD, args, true);
            }
            Instruction::IAStore | Instruction::AAStore => {
                let args = self.pop_n(3)?;
                self.call(runtime::ELEM_STORE, args, false);
            }

            Instruction::IConst(n) => self.constant(Operand::Immediate(*n)),
            Instruction::CConst(c) => self.constant(Operand::Immediate(i32::from(*c))),
            Instruction::AConstNull => self.constant(Operand::Immediate(0)),
            Instruction::SConst(text) => {
                let label = self.string_data(text);
                self.call(runtime::STRING, vec![Operand::Address(label)], true);
            }

            Instruction::BinOp(op) => self.binary(*op)?,

            Instruction::Label(name) => self.emit(X86Instruction::Label(name.clone())),
            Instruction::Goto(label) => self.emit(X86Instruction::Jmp(label.clone())),
            Instruction::IfTrue(label) | Instruction::IfFalse(label) => {
                let condition = self.pop()?;
                self.emit(X86Instruction::Cmp(Operand::Immediate(0), condition));
                let cc = if matches!(instr, Instruction::IfTrue(_)) {
                    Condition::Ne
                } else {
                    Condition::E
                };
                self.emit(X86Instruction::J(cc, label.clone()));
            }

            Instruction::InvokeStatic(name, argc) => {
                let callee = self.callee(program, name, *argc)?;
                let args = self.pop_n(*argc)?;
                self.call(&callee.symbol, args, callee.returns_value);
            }
            Instruction::Return => {
                self.mov(Operand::Immediate(0), Operand::EAX);
                self.emit(X86Instruction::Jmp(self.epilogue.clone()));
            }
            Instruction::IReturn | Instruction::AReturn => {
                let value = self.pop()?;
                self.mov(value, Operand::EAX);
                self.emit(X86Instruction::Jmp(self.epilogue.clone()));
            }

            Instruction::NewArray(n) => {
                let mut args = Vec::with_capacity(n + 1);
                args.push(Operand::Immediate(*n as i32));
                args.extend(self.pop_n(*n)?);
                self.call(runtime::ARRAY, args, true);
            }
        }
        Ok(())
    }

    /// Left operand goes through `%eax`; the result is copied into a fresh value
    fn binary(&mut self, op: BinaryOperator) -> CompileResult<()> {
        use BinaryOperator::*;

        let right = self.pop()?;
        let left = self.pop()?;
        let mut result = Operand::EAX;

        match op {
            Add | Sub | Mul | BitAnd | BitOr | BitXor => {
                self.mov(left, Operand::EAX);
                self.emit(match op {
                    Add => X86Instruction::AddL(right, Operand::EAX),
                    Sub => X86Instruction::SubL(right, Operand::EAX),
                    Mul => X86Instruction::ImulL(right, Operand::EAX),
                    BitAnd => X86Instruction::Logical(LogicalOp::And, right, Operand::EAX),
                    BitOr => X86Instruction::Logical(LogicalOp::Or, right, Operand::EAX),
                    _ => X86Instruction::Logical(LogicalOp::Xor, right, Operand::EAX),
                });
            }
            Div | Mod => {
                self.mov(left, Operand::EAX);
                self.emit(X86Instruction::Cltd);
                self.emit(X86Instruction::IDivL(right));
                if op == Mod {
                    result = Operand::EDX;
                }
            }
            Gt | Lt | Ge | Le | Eq | Ne => {
                self.mov(left, Operand::EAX);
                self.emit(X86Instruction::Cmp(right, Operand::EAX));
                self.set_flag(condition(op), Operand::EAX);
            }
            And | Or => {
                // Only an exact 1 counts as true for the logical operators.
                self.normalise(right, Operand::EDX);
                self.normalise(left, Operand::EAX);
                let kind = if op == And { LogicalOp::And } else { LogicalOp::Or };
                self.emit(X86Instruction::Logical(kind, Operand::EDX, Operand::EAX));
            }
        }

        let value = self.frame.allocate();
        self.mov(result, value);
        Ok(())
    }

    /// `dst = (value == 1)`
    fn normalise(&mut self, value: Operand, dst: Operand) {
        self.mov(value, Operand::EAX);
        self.emit(X86Instruction::Cmp(Operand::Immediate(1), Operand::EAX));
        self.set_flag(Condition::E, dst);
    }

    fn set_flag(&mut self, cc: Condition, dst: Operand) {
        self.emit(X86Instruction::Set(cc, Operand::AL));
        self.emit(X86Instruction::MovzbL(Operand::AL, dst));
    }

    fn constant(&mut self, value: Operand) {
        let dst = self.frame.allocate();
        self.mov(value, dst);
    }

    /// cdecl call: arguments pushed last to first, result in `%eax`, caller
    /// pops the arguments
    fn call(&mut self, symbol: &str, args: Vec<Operand>, returns_value: bool) {
        for arg in args.iter().rev() {
            self.emit(X86Instruction::PushL(arg.clone()));
        }
        self.emit(X86Instruction::Call(symbol.to_string()));
        if returns_value {
            let value = self.frame.allocate();
            self.mov(Operand::EAX, value);
        }
        for _ in &args {
            self.emit(X86Instruction::PopL(Operand::EDX));
        }
    }

    /// User functions first, then primitives. Unknown names are called as
    /// written and treated as returning nothing, matching the bytecode.
    fn callee(&self, program: &VMProgram, name: &str, argc: usize) -> CompileResult<Callee> {
        let (arity, returns_value, symbol) = if let Some(function) = program.function(name) {
            (function.argc, function.returns_value, name.to_string())
        } else if let Some(sig) = stdlib::signature(name) {
            (sig.arity, sig.returns_value, runtime::primitive(name))
        } else {
            return Ok(Callee {
                symbol: name.to_string(),
                returns_value: false,
            });
        };
        if arity != argc {
            return Err(CompileError::ArityMismatch {
                name: name.to_string(),
                expected: arity,
                found: argc,
            });
        }
        Ok(Callee {
            symbol,
            returns_value,
        })
    }

    fn string_data(&mut self, text: &str) -> String {
        let label = format!(".Lstr{}", self.data.len());
        self.data.push(DataEntry {
            label: label.clone(),
            text: text.to_string(),
        });
        label
    }

    /// `movl`, routed through `%eax` when both sides are memory
    fn mov(&mut self, src: Operand, dst: Operand) {
        if src == dst {
            return;
        }
        if src.is_memory() && dst.is_memory() {
            self.emit(X86Instruction::MovL(src, Operand::EAX));
            self.emit(X86Instruction::MovL(Operand::EAX, dst));
        } else {
            self.emit(X86Instruction::MovL(src, dst));
        }
    }

    fn pop(&mut self) -> CompileResult<Operand> {
        self.frame.pop().ok_or_else(|| self.underflow())
    }

    fn pop_n(&mut self, n: usize) -> CompileResult<Vec<Operand>> {
        self.frame.pop_n(n).ok_or_else(|| self.underflow())
    }

    fn underflow(&self) -> CompileError {
        CompileError::StackUnderflow {
            function: self.function.clone(),
        }
    }

    fn emit(&mut self, instr: X86Instruction) {
        self.code.push(instr);
    }
}

fn condition(op: BinaryOperator) -> Condition {
    match op {
        BinaryOperator::Gt => Condition::G,
        BinaryOperator::Ge => Condition::Ge,
        BinaryOperator::Lt => Condition::L,
        BinaryOperator::Le => Condition::Le,
        BinaryOperator::Eq => Condition::E,
        _ => Condition::Ne,
    }
}
