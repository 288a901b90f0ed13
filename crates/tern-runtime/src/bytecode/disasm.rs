//! Bytecode disassembler
//!
//! Renders programs in the numbered text format used for debugging and
//! snapshot tests.
//!
//! # Format
//! ```text
//! main(0):
//!    0  label main
//!    1  iconst 7
//!    2  invoke_static write,1
//!    3  return
//! ```

use super::{Instruction, VMFunction, VMProgram};
use std::fmt::{self, Write};

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Dup => write!(f, "dup"),
            Instruction::Pop => write!(f, "pop"),
            Instruction::ILoad(id) => write!(f, "iload {}", id),
            Instruction::IStore(id) => write!(f, "istore {}", id),
            Instruction::ALoad(id) => write!(f, "aload {}", id),
            Instruction::AStore(id) => write!(f, "astore {}", id),
            Instruction::IALoad => write!(f, "iaload"),
            Instruction::IAStore => write!(f, "iastore"),
            Instruction::AALoad => write!(f, "aaload"),
            Instruction::AAStore => write!(f, "aastore"),
            Instruction::IConst(n) => write!(f, "iconst {}", n),
            Instruction::CConst(c) => write!(f, "cconst {}", c),
            Instruction::SConst(s) => write!(f, "sconst {:?}", s),
            Instruction::AConstNull => write!(f, "aconst_null"),
            Instruction::BinOp(op) => write!(f, "binop {}", op),
            Instruction::Label(name) => write!(f, "label {}", name),
            Instruction::Goto(name) => write!(f, "goto {}", name),
            Instruction::IfTrue(name) => write!(f, "if_true {}", name),
            Instruction::IfFalse(name) => write!(f, "if_false {}", name),
            Instruction::InvokeStatic(name, argc) => write!(f, "invoke_static {},{}", name, argc),
            Instruction::Return => write!(f, "return"),
            Instruction::IReturn => write!(f, "ireturn"),
            Instruction::AReturn => write!(f, "areturn"),
            Instruction::NewArray(n) => write!(f, "new_array {}", n),
        }
    }
}

/// Disassemble one function
pub fn disassemble_function(function: &VMFunction) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(output, "{}({}):", function.name, function.argc);
    for (index, instr) in function.code.iter().enumerate() {
        let _ = writeln!(output, "{:>4}  {}", index, instr);
    }
    output
}

/// Disassemble a whole program, functions separated by a blank line
pub fn disassemble(program: &VMProgram) -> String {
    program
        .functions
        .iter()
        .map(disassemble_function)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_instruction_mnemonics() {
        assert_eq!(
            Instruction::InvokeStatic("write".into(), 1).to_string(),
            "invoke_static write,1"
        );
        assert_eq!(Instruction::BinOp(BinaryOperator::Le).to_string(), "binop <=");
        assert_eq!(Instruction::SConst("a\"b".into()).to_string(), "sconst \"a\\\"b\"");
        assert_eq!(Instruction::AConstNull.to_string(), "aconst_null");
        assert_eq!(Instruction::IfFalse(".L2".into()).to_string(), "if_false .L2");
    }

    #[test]
    fn test_disassemble_function() {
        let mut f = VMFunction::new("id", 1);
        f.code = vec![
            Instruction::Label("id".into()),
            Instruction::ILoad(0),
            Instruction::IReturn,
        ];
        insta::assert_snapshot!(disassemble_function(&f), @r"
        id(1):
           0  label id
           1  iload 0
           2  ireturn
        ");
    }
}
