//! AST to bytecode compiler
//!
//! Lowers a compilation unit into one [`VMFunction`] per declared function
//! plus `main`, in a single post-order walk.
//! - Expressions leave exactly one value on the stack, except calls to
//!   functions that return nothing
//! - Variables become per-function slot ids (parameters first)
//! - Control flow uses labels from a counter owned by the compiler instance,
//!   so generated labels never repeat within one compiler's output

mod expr;
mod stmt;

use crate::ast::*;
use crate::binder;
use crate::bytecode::{Instruction, VMFunction, VMProgram, MAIN};
use crate::error::CompileResult;
use crate::scope::NameTable;
use crate::stdlib::{self, Signature};
use std::collections::HashMap;
use tracing::debug;

/// Static estimate of what a slot or expression holds
///
/// Only used to choose between the `I` and `A` instruction flavours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Array(Box<ValueKind>),
    Reference,
}

impl ValueKind {
    pub fn is_scalar(&self) -> bool {
        matches!(self, ValueKind::Scalar)
    }

    /// Kind of the elements, if this is known to be an array
    pub fn element(&self) -> ValueKind {
        match self {
            ValueKind::Array(inner) => (**inner).clone(),
            _ => ValueKind::Reference,
        }
    }
}

/// Loop context for break/continue
#[derive(Debug, Clone)]
pub(super) struct LoopContext {
    pub(super) continue_label: String,
    pub(super) break_label: String,
}

/// Compiler state
pub struct Compiler {
    /// Next generated label id; never reset
    next_label: usize,
    /// Signatures of the user functions of the unit being compiled
    pub(super) functions: HashMap<String, Signature>,

    // Per-function state
    pub(super) function: String,
    pub(super) returns_value: bool,
    pub(super) code: Vec<Instruction>,
    pub(super) names: NameTable,
    pub(super) kinds: HashMap<u32, ValueKind>,
    pub(super) loops: Vec<LoopContext>,
}

impl Compiler {
    /// Create a new compiler
    pub fn new() -> Self {
        Self {
            next_label: 0,
            functions: HashMap::new(),
            function: String::new(),
            returns_value: false,
            code: Vec::new(),
            names: NameTable::new(),
            kinds: HashMap::new(),
            loops: Vec::new(),
        }
    }

    /// Compile a whole unit: every declared function, then `main`
    pub fn compile(&mut self, unit: &CompilationUnit) -> CompileResult<VMProgram> {
        binder::check(unit)?;
        self.collect_signatures(&unit.functions);

        let mut functions = Vec::with_capacity(unit.functions.len() + 1);
        for func in &unit.functions {
            let returns_value = self.functions.get(&func.name).map_or(false, |s| s.returns_value);
            functions.push(self.compile_function(
                &func.name,
                &func.params,
                &func.body.statements,
                returns_value,
            )?);
        }
        functions.push(self.compile_function(MAIN, &[], &unit.body.statements, false)?);

        let program = VMProgram::new(functions);
        debug!(
            functions = program.functions.len(),
            instructions = program.instruction_count(),
            "compiled bytecode program"
        );
        Ok(program)
    }

    /// Record every user function's signature
    fn collect_signatures(&mut self, functions: &[FunctionDeclaration]) {
        self.functions = functions
            .iter()
            .map(|func| {
                let signature = Signature {
                    arity: func.params.len(),
                    returns_value: returns_value(&func.body.statements),
                };
                (func.name.clone(), signature)
            })
            .collect();
    }

    fn compile_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Statement],
        returns_value: bool,
    ) -> CompileResult<VMFunction> {
        self.function = name.to_string();
        self.returns_value = returns_value;
        self.code = Vec::new();
        self.names = NameTable::new();
        self.kinds.clear();
        self.loops.clear();

        for param in params {
            let id = self.names.id_of(param);
            self.kinds.insert(id, ValueKind::Reference);
        }

        self.emit(Instruction::Label(name.to_string()));
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        if returns_value {
            self.emit(Instruction::AConstNull);
            self.emit(Instruction::AReturn);
        } else {
            self.emit(Instruction::Return);
        }

        let code = std::mem::take(&mut self.code);
        debug!(function = name, instructions = code.len(), "compiled function");
        Ok(VMFunction {
            name: name.to_string(),
            argc: params.len(),
            returns_value,
            variables: std::mem::take(&mut self.names).into_names(),
            code,
        })
    }

    pub(super) fn emit(&mut self, instr: Instruction) {
        self.code.push(instr);
    }

    /// Fresh label, unique for the lifetime of this compiler
    pub(super) fn new_label(&mut self) -> String {
        let label = format!(".L{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Signature of a callee: user functions first, then the primitives
    pub(super) fn signature(&self, name: &str) -> Option<Signature> {
        self.functions
            .get(name)
            .copied()
            .or_else(|| stdlib::signature(name))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// A function returns a value when any `return` in its body carries one
fn returns_value(statements: &[Statement]) -> bool {
    statements.iter().any(statement_returns_value)
}

fn statement_returns_value(stmt: &Statement) -> bool {
    match stmt {
        Statement::Return(value) => value.is_some(),
        Statement::Compound(block) => returns_value(&block.statements),
        Statement::If(if_stmt) => if_stmt
            .cases
            .iter()
            .any(|case| returns_value(&case.body.statements)),
        Statement::While(w) => returns_value(&w.body.statements),
        Statement::Repeat(r) => returns_value(&r.body.statements),
        Statement::For(f) => {
            returns_value(&f.body.statements)
                || f.init.iter().chain(f.step.iter()).any(|s| statement_returns_value(s))
        }
        _ => false,
    }
}

/// Compile a unit with a fresh compiler
pub fn compile(unit: &CompilationUnit) -> CompileResult<VMProgram> {
    Compiler::new().compile(unit)
}
