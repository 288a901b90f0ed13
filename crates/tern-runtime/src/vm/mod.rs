//! Stack-based virtual machine
//!
//! Executes a [`VMProgram`] with:
//! - an operand stack of [`Symbol`]s
//! - one scope per active call, keyed by slot id
//! - a call stack of resume positions
//! - a label table built once before execution
//!
//! Calls and returns set the position explicitly; every other instruction
//! advances it by one. Execution ends when `main` returns.

mod labels;

pub use labels::{LabelTable, Position};

use crate::bytecode::{Instruction, VMProgram, MAIN};
use crate::error::{RuntimeError, RuntimeResult, StackKind};
use crate::scope::{CallStack, Externals, ReturnSite, ScopeArena};
use crate::symbol::{apply_binary, Symbol};
use tern_config::VmConfig;
use tracing::{debug, trace};

/// What the dispatch loop does after an instruction
enum Flow {
    Next,
    Jump(Position),
    Halt,
}

/// Virtual machine state
pub struct VM<'a> {
    externals: &'a Externals,
    /// Emit a trace event per instruction
    trace: bool,
    /// Operand stack
    stack: Vec<Symbol>,
    /// Slot scopes, one per active call
    scopes: ScopeArena<u32>,
    /// Resume positions, one per active call
    calls: CallStack,
    /// Deepest call stack seen during the last run
    max_call_depth: usize,
}

impl<'a> VM<'a> {
    pub fn new(externals: &'a Externals) -> Self {
        Self::with_config(externals, &VmConfig::default())
    }

    pub fn with_config(externals: &'a Externals, config: &VmConfig) -> Self {
        Self {
            externals,
            trace: config.trace,
            stack: Vec::new(),
            scopes: ScopeArena::new(),
            calls: CallStack::new(),
            max_call_depth: 0,
        }
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.calls.depth()
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Link and run a program from the start of `main`
    pub fn run(&mut self, program: &VMProgram) -> RuntimeResult<()> {
        let labels = LabelTable::build(program)?;
        let entry = labels.resolve(MAIN).map_err(|_| RuntimeError::UnknownFunction {
            name: MAIN.to_string(),
        })?;
        debug!(
            functions = program.functions.len(),
            labels = labels.len(),
            "running bytecode"
        );

        self.stack.clear();
        self.scopes = ScopeArena::new();
        self.calls = CallStack::new();
        self.scopes.push(None);
        self.calls.push(ReturnSite {
            function: MAIN.to_string(),
            position: 0,
        });
        self.max_call_depth = 1;

        let mut pc = entry;
        loop {
            let function = &program.functions[pc.function];
            let instr = function.code.get(pc.index).ok_or_else(|| RuntimeError::Unsupported {
                construct: format!("execution past the end of '{}'", function.name),
            })?;
            if self.trace {
                trace!(
                    function = function.name.as_str(),
                    index = pc.index,
                    instr = %instr,
                    stack = self.stack.len(),
                    "step"
                );
            }

            match self.step(instr, program, pc, &labels)? {
                Flow::Next => pc.index += 1,
                Flow::Jump(target) => pc = target,
                Flow::Halt => break,
            }
        }

        debug!(max_call_depth = self.max_call_depth, "bytecode finished");
        Ok(())
    }

    /// Execute one instruction
    fn step(
        &mut self,
        instr: &Instruction,
        program: &VMProgram,
        pc: Position,
        labels: &LabelTable,
    ) -> RuntimeResult<Flow> {
        let function = &program.functions[pc.function];
        match instr {
            Instruction::Dup => {
                let top = self.peek()?.clone();
                self.push(top);
            }
            Instruction::Pop => {
                self.pop()?;
            }

            Instruction::ILoad(id) | Instruction::ALoad(id) => {
                let scope = self.scopes.current()?;
                let value = self.scopes.scope(scope).get(id).cloned().ok_or_else(|| {
                    RuntimeError::UndefinedVariable {
                        name: function
                            .variable_name(*id)
                            .map_or_else(|| format!("#{}", id), str::to_string),
                    }
                })?;
                self.push(value);
            }
            Instruction::IStore(id) | Instruction::AStore(id) => {
                let value = self.pop()?;
                let scope = self.scopes.current()?;
                self.scopes.scope_mut(scope).insert(*id, value);
            }

            Instruction::IALoad | Instruction::AALoad => {
                let index = self.pop()?;
                let array = self.pop()?;
                let value = array.element(&index)?;
                self.push(value);
            }
            Instruction::IAStore | Instruction::AAStore => {
                let value = self.pop()?;
                let index = self.pop()?;
                let array = self.pop()?;
                array.set_element(&index, value)?;
            }

            Instruction::IConst(n) => self.push(Symbol::Int(*n)),
            Instruction::CConst(c) => self.push(Symbol::Char(*c)),
            Instruction::SConst(s) => self.push(Symbol::string(s)),
            Instruction::AConstNull => self.push(Symbol::Null),

            Instruction::BinOp(op) => {
                // Operands were pushed in source order.
                let right = self.pop()?;
                let left = self.pop()?;
                let result = apply_binary(*op, &left, &right)?;
                self.push(result);
            }

            Instruction::Label(_) => {}
            Instruction::Goto(label) => return Ok(Flow::Jump(labels.resolve(label)?)),
            Instruction::IfTrue(label) | Instruction::IfFalse(label) => {
                let condition = self.pop()?.is_truthy("branch condition")?;
                if condition == matches!(instr, Instruction::IfTrue(_)) {
                    return Ok(Flow::Jump(labels.resolve(label)?));
                }
            }

            Instruction::InvokeStatic(name, argc) => {
                return self.invoke(name, *argc, program, pc, labels);
            }
            Instruction::Return => return self.return_from(None, labels),
            Instruction::IReturn | Instruction::AReturn => {
                let value = self.pop()?;
                return self.return_from(Some(value), labels);
            }

            Instruction::NewArray(n) => {
                let items = self.pop_n(*n)?;
                self.push(Symbol::list(items));
            }
        }
        Ok(Flow::Next)
    }

    /// Externals run in place; user functions get a fresh scope and a
    /// resume site, then execution jumps to their entry label.
    fn invoke(
        &mut self,
        name: &str,
        argc: usize,
        program: &VMProgram,
        pc: Position,
        labels: &LabelTable,
    ) -> RuntimeResult<Flow> {
        let externals = self.externals;
        if let Some(symbol) = externals.get(name) {
            let Symbol::External(ext) = symbol else {
                return Err(RuntimeError::type_mismatch(format!(
                    "'{}' is a {}, not a function",
                    name,
                    symbol.kind()
                )));
            };
            let args = self.pop_n(argc)?;
            let result = ext.invoke(&args)?;
            if !result.is_null() {
                self.push(result);
            }
            return Ok(Flow::Next);
        }

        let index = labels
            .function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.to_string(),
            })?;
        let callee = &program.functions[index];
        if callee.argc != argc {
            return Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected: callee.argc,
                found: argc,
            });
        }
        let target = labels.resolve(name)?;

        let args = self.pop_n(argc)?;
        let scope = self.scopes.push(None);
        for (slot, arg) in args.into_iter().enumerate() {
            self.scopes.scope_mut(scope).insert(slot as u32, arg);
        }
        self.calls.push(ReturnSite {
            function: program.functions[pc.function].name.clone(),
            position: pc.index + 1,
        });
        self.max_call_depth = self.max_call_depth.max(self.calls.depth());
        Ok(Flow::Jump(target))
    }

    /// Pop the callee's scope and resume site. Typed returns push their value
    /// onto the caller's stack.
    fn return_from(&mut self, value: Option<Symbol>, labels: &LabelTable) -> RuntimeResult<Flow> {
        self.scopes.pop()?;
        let site = self.calls.pop()?;
        if self.calls.is_empty() {
            return Ok(Flow::Halt);
        }
        let function = labels
            .function(&site.function)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: site.function.clone(),
            })?;
        if let Some(value) = value {
            self.push(value);
        }
        Ok(Flow::Jump(Position {
            function,
            index: site.position,
        }))
    }

    fn push(&mut self, value: Symbol) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> RuntimeResult<Symbol> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow(StackKind::Operand))
    }

    fn peek(&self) -> RuntimeResult<&Symbol> {
        self.stack
            .last()
            .ok_or(RuntimeError::StackUnderflow(StackKind::Operand))
    }

    /// Pop `n` values, returned in the order they were pushed
    fn pop_n(&mut self, n: usize) -> RuntimeResult<Vec<Symbol>> {
        if self.stack.len() < n {
            return Err(RuntimeError::StackUnderflow(StackKind::Operand));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }
}

/// Run a program against an externals table with default settings
pub fn evaluate(program: &VMProgram, externals: &Externals) -> RuntimeResult<()> {
    VM::new(externals).run(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, CompilationUnit, Expression as E, FunctionDeclaration, Statement as S};
    use crate::bytecode::VMFunction;
    use crate::compiler::compile;
    use crate::stdlib::{prelude, Io};
    use pretty_assertions::assert_eq;

    fn run_program(program: &VMProgram) -> (RuntimeResult<()>, String) {
        let (io, buffer) = Io::captured("");
        let externals = prelude(&io);
        let result = evaluate(program, &externals);
        (result, buffer.contents())
    }

    fn run_unit(unit: &CompilationUnit) -> (RuntimeResult<()>, String) {
        run_program(&compile(unit).unwrap())
    }

    fn main_with(code: Vec<Instruction>) -> VMProgram {
        let mut main = VMFunction::new(MAIN, 0);
        main.code.push(Instruction::Label(MAIN.to_string()));
        main.code.extend(code);
        VMProgram::new(vec![main])
    }

    fn double() -> FunctionDeclaration {
        FunctionDeclaration::new(
            "double",
            &["a"],
            vec![S::ret(Some(E::binary(BinaryOperator::Mul, E::var("a"), E::int(2))))],
        )
    }

    #[test]
    fn test_write() {
        let (result, output) = run_unit(&CompilationUnit::new(
            vec![],
            vec![S::write(E::binary(BinaryOperator::Add, E::int(2), E::int(3)))],
        ));
        assert_eq!(result, Ok(()));
        assert_eq!(output, "5\n");
    }

    #[test]
    fn test_typed_return_reaches_caller() {
        let unit = CompilationUnit::new(
            vec![double()],
            vec![S::write(E::call("double", vec![E::int(21)]))],
        );
        assert_eq!(run_unit(&unit).1, "42\n");
    }

    #[test]
    fn test_stacks_empty_after_run() {
        let (io, _buffer) = Io::captured("");
        let externals = prelude(&io);
        let unit = CompilationUnit::new(
            vec![double()],
            vec![S::declare("x", Some(E::call("double", vec![E::int(1)])))],
        );
        let program = compile(&unit).unwrap();
        let mut vm = VM::new(&externals);
        vm.run(&program).unwrap();
        assert_eq!(vm.stack_size(), 0);
        assert_eq!(vm.frame_depth(), 0);
        assert_eq!(vm.max_call_depth(), 2);
    }

    #[test]
    fn test_recursion() {
        let fact = FunctionDeclaration::new(
            "fact",
            &["n"],
            vec![
                S::if_chain(
                    vec![(
                        E::binary(BinaryOperator::Le, E::var("n"), E::int(1)),
                        vec![S::ret(Some(E::int(1)))],
                    )],
                    None,
                ),
                S::ret(Some(E::binary(
                    BinaryOperator::Mul,
                    E::var("n"),
                    E::call(
                        "fact",
                        vec![E::binary(BinaryOperator::Sub, E::var("n"), E::int(1))],
                    ),
                ))),
            ],
        );
        let unit = CompilationUnit::new(vec![fact], vec![S::write(E::call("fact", vec![E::int(5)]))]);
        assert_eq!(run_unit(&unit).1, "120\n");
    }

    #[test]
    fn test_unknown_function_fails_at_run_time() {
        let unit = CompilationUnit::new(vec![], vec![S::call("mystery", vec![])]);
        assert_eq!(
            run_unit(&unit).0,
            Err(RuntimeError::UnknownFunction {
                name: "mystery".into()
            })
        );
    }

    #[test]
    fn test_arity_checked_at_call() {
        let mut f = VMFunction::new("f", 1);
        f.code = vec![Instruction::Label("f".into()), Instruction::Return];
        let mut program = main_with(vec![
            Instruction::InvokeStatic("f".into(), 0),
            Instruction::Return,
        ]);
        program.functions.push(f);
        assert_eq!(
            run_program(&program).0,
            Err(RuntimeError::ArityMismatch {
                name: "f".into(),
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn test_operand_underflow() {
        let program = main_with(vec![Instruction::Pop, Instruction::Return]);
        assert_eq!(
            run_program(&program).0,
            Err(RuntimeError::StackUnderflow(StackKind::Operand))
        );
    }

    #[test]
    fn test_running_off_the_end() {
        let program = main_with(vec![Instruction::IConst(1), Instruction::Pop]);
        assert_eq!(run_program(&program).0.unwrap_err().code(), "unsupported");
    }

    #[test]
    fn test_duplicate_label_rejected_before_running() {
        let program = main_with(vec![
            Instruction::IConst(1),
            Instruction::InvokeStatic("write".into(), 1),
            Instruction::Label(".L0".into()),
            Instruction::Label(".L0".into()),
            Instruction::Return,
        ]);
        let (result, output) = run_program(&program);
        assert!(matches!(result, Err(RuntimeError::DuplicateLabel { .. })));
        assert_eq!(output, "");
    }

    #[test]
    fn test_undefined_variable_names_source_variable() {
        let unit = CompilationUnit::new(vec![], vec![S::write(E::var("ghost"))]);
        assert_eq!(
            run_unit(&unit).0,
            Err(RuntimeError::UndefinedVariable {
                name: "ghost".into()
            })
        );
    }

    #[test]
    fn test_callee_cannot_see_caller_slots() {
        let peek = FunctionDeclaration::new("peek", &[], vec![S::write(E::var("x"))]);
        let unit = CompilationUnit::new(
            vec![peek],
            vec![S::declare("x", Some(E::int(7))), S::call("peek", vec![])],
        );
        assert_eq!(run_unit(&unit).0.unwrap_err().code(), "undefined-variable");
    }

    #[test]
    fn test_branch_on_non_int_is_type_mismatch() {
        let program = main_with(vec![
            Instruction::AConstNull,
            Instruction::IfTrue(MAIN.into()),
            Instruction::Return,
        ]);
        assert_eq!(run_program(&program).0.unwrap_err().code(), "type-mismatch");
    }
}
