//! Link-time label table

use crate::bytecode::{Instruction, VMProgram};
use crate::error::{RuntimeError, RuntimeResult};
use std::collections::HashMap;

/// Location of one instruction inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Index into `VMProgram::functions`
    pub function: usize,
    /// Index into that function's code
    pub index: usize,
}

/// Every label of a program, resolved to its position
///
/// Built in one scan before execution starts. Labels are global to the
/// program, so a name defined twice anywhere is rejected.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: HashMap<String, Position>,
    functions: HashMap<String, usize>,
}

impl LabelTable {
    pub fn build(program: &VMProgram) -> RuntimeResult<Self> {
        let mut table = Self::default();
        for (function, func) in program.functions.iter().enumerate() {
            table.functions.entry(func.name.clone()).or_insert(function);
            for (index, instr) in func.code.iter().enumerate() {
                let Instruction::Label(name) = instr else {
                    continue;
                };
                if let Some(first) = table.labels.get(name) {
                    return Err(RuntimeError::DuplicateLabel {
                        label: name.clone(),
                        first: program.functions[first.function].name.clone(),
                        second: func.name.clone(),
                    });
                }
                table.labels.insert(name.clone(), Position { function, index });
            }
        }
        Ok(table)
    }

    pub fn resolve(&self, label: &str) -> RuntimeResult<Position> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownLabel {
                label: label.to_string(),
            })
    }

    /// Index of the function called `name`
    pub fn function(&self, name: &str) -> Option<usize> {
        self.functions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
