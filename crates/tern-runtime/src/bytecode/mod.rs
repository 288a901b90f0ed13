//! Bytecode instruction set
//!
//! Stack-machine instructions with symbolic operands: variables are small
//! per-function slot ids, jumps target named labels, calls name their
//! callee. A [`VMProgram`] is a flat list of [`VMFunction`]s; each function's
//! code starts with a label carrying the function's own name, which is the
//! call target.

mod canonical;
mod disasm;

pub use canonical::canonicalize_labels;
pub use disasm::{disassemble, disassemble_function};

use crate::ast::BinaryOperator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Current bytecode format version
///
/// Written into JSON dumps; [`VMProgram::from_json`] rejects any other
/// version.
pub const BYTECODE_VERSION: u16 = 1;

/// Name of the entry function
pub const MAIN: &str = "main";

/// One stack-machine instruction
///
/// Load/store come in an `I` (scalar) and an `A` (reference) flavour. The
/// flavour reflects the compiler's static estimate of the slot's kind; the
/// evaluator treats both the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // Stack
    Dup,
    Pop,

    // Slots
    ILoad(u32),
    IStore(u32),
    ALoad(u32),
    AStore(u32),

    // Elements: [array, index] -> value, [array, index, value] -> []
    IALoad,
    IAStore,
    AALoad,
    AAStore,

    // Constants
    IConst(i32),
    CConst(u8),
    SConst(String),
    AConstNull,

    // Arithmetic, logic, comparison
    BinOp(BinaryOperator),

    // Control flow
    Label(String),
    Goto(String),
    IfTrue(String),
    IfFalse(String),

    // Calls
    InvokeStatic(String, usize),
    Return,
    IReturn,
    AReturn,

    /// Pop `n` values (last pushed is the last element) into a fresh list
    NewArray(usize),
}

impl Instruction {
    /// Label operand of a branch or label instruction
    pub fn label(&self) -> Option<&str> {
        match self {
            Instruction::Label(name)
            | Instruction::Goto(name)
            | Instruction::IfTrue(name)
            | Instruction::IfFalse(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Instruction::Return | Instruction::IReturn | Instruction::AReturn
        )
    }
}

/// One compiled function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VMFunction {
    pub name: String,
    /// Declared parameter count; parameters occupy slots `0..argc`
    pub argc: usize,
    /// Whether the function ends with a typed return
    pub returns_value: bool,
    /// Source name of each slot id, for diagnostics
    pub variables: Vec<String>,
    pub code: Vec<Instruction>,
}

impl VMFunction {
    pub fn new(name: &str, argc: usize) -> Self {
        Self {
            name: name.to_string(),
            argc,
            returns_value: false,
            variables: Vec::new(),
            code: Vec::new(),
        }
    }

    /// Number of slots referenced by the body
    pub fn slot_count(&self) -> usize {
        let highest = self
            .code
            .iter()
            .filter_map(|instr| match instr {
                Instruction::ILoad(id)
                | Instruction::IStore(id)
                | Instruction::ALoad(id)
                | Instruction::AStore(id) => Some(*id as usize + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        highest.max(self.argc).max(self.variables.len())
    }

    pub fn variable_name(&self, id: u32) -> Option<&str> {
        self.variables.get(id as usize).map(String::as_str)
    }
}

/// Whole compiled program
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VMProgram {
    pub functions: Vec<VMFunction>,
}

#[derive(Serialize, Deserialize)]
struct VersionedProgram {
    bytecode_version: u16,
    #[serde(flatten)]
    program: VMProgram,
}

impl VMProgram {
    pub fn new(functions: Vec<VMFunction>) -> Self {
        Self { functions }
    }

    pub fn function(&self, name: &str) -> Option<&VMFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn main(&self) -> Option<&VMFunction> {
        self.function(MAIN)
    }

    /// Set of function names
    pub fn function_names(&self) -> HashSet<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.code.len()).sum()
    }

    /// Serialize to a versioned JSON document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&VersionedProgram {
            bytecode_version: BYTECODE_VERSION,
            program: self.clone(),
        })
    }

    /// Deserialize from a versioned JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let versioned: VersionedProgram = serde_json::from_str(json)?;
        if versioned.bytecode_version != BYTECODE_VERSION {
            return Err(serde::de::Error::custom(format!(
                "unsupported bytecode version {} (expected {})",
                versioned.bytecode_version, BYTECODE_VERSION
            )));
        }
        Ok(versioned.program)
    }
}
