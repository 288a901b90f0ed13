//! Label canonicalization
//!
//! Two compilations of the same AST differ only in the generated label
//! names. Renaming every generated label by order of first appearance makes
//! such outputs comparable with plain equality. Function entry labels are
//! left alone.

use super::{Instruction, VMProgram};
use std::collections::HashMap;

/// Rename generated labels to `L0`, `L1`, ... by order of first appearance
pub fn canonicalize_labels(program: &VMProgram) -> VMProgram {
    let entries = program.function_names();
    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut canonical = program.clone();

    for function in &mut canonical.functions {
        for instr in &mut function.code {
            let slot = match instr {
                Instruction::Label(name)
                | Instruction::Goto(name)
                | Instruction::IfTrue(name)
                | Instruction::IfFalse(name) => name,
                _ => continue,
            };
            if entries.contains(slot.as_str()) {
                continue;
            }
            let next = renamed.len();
            let new_name = renamed
                .entry(slot.clone())
                .or_insert_with(|| format!("L{}", next))
                .clone();
            *slot = new_name;
        }
    }
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::VMFunction;
    use pretty_assertions::assert_eq;

    fn program(labels: [&str; 2]) -> VMProgram {
        let mut main = VMFunction::new("main", 0);
        main.code = vec![
            Instruction::Label("main".into()),
            Instruction::Goto(labels[1].into()),
            Instruction::Label(labels[0].into()),
            Instruction::Label(labels[1].into()),
            Instruction::IfTrue(labels[0].into()),
            Instruction::Return,
        ];
        VMProgram::new(vec![main])
    }

    #[test]
    fn test_renaming_is_by_first_appearance() {
        let canonical = canonicalize_labels(&program([".L7", ".L9"]));
        assert_eq!(
            canonical.functions[0].code[1..5],
            [
                Instruction::Goto("L0".into()),
                Instruction::Label("L1".into()),
                Instruction::Label("L0".into()),
                Instruction::IfTrue("L1".into()),
            ]
        );
        assert_eq!(canonical.functions[0].code[0], Instruction::Label("main".into()));
    }

    #[test]
    fn test_differently_numbered_programs_agree() {
        assert_eq!(
            canonicalize_labels(&program([".L0", ".L1"])),
            canonicalize_labels(&program([".L40", ".L41"]))
        );
        assert_ne!(program([".L0", ".L1"]), program([".L40", ".L41"]));
    }
}
