//! Bytecode to x86 compiler (32-bit, AT&T syntax)
//!
//! Every bytecode function becomes one cdecl function with a fixed frame.
//! The bytecode operand stack is modelled at compile time by a virtual value
//! stack whose entries live in scratch registers or frame slots, so the
//! generated code never uses the machine stack for temporaries. Only calls
//! push, and they pop what they pushed.
//!
//! Heap values (strings, arrays) are handled by a small runtime library;
//! see [`runtime`] for the symbols the output expects at link time.

mod frame;
mod instr;
mod lower;

pub use instr::{ByteRegister, Condition, LogicalOp, Operand, Register, X86Instruction};

use crate::bytecode::{VMProgram, MAIN};
use crate::error::{CompileError, CompileResult};
use frame::Frame;
use std::fmt;
use tern_config::X86Config;
use tracing::debug;

/// Runtime support symbols referenced by generated code
pub mod runtime {
    /// `__tern_array(n, e0, .., en-1)` returns a new array
    pub const ARRAY: &str = "__tern_array";
    /// `__tern_elem_load(array, index)` returns the element
    pub const ELEM_LOAD: &str = "__tern_elem_load";
    /// `__tern_elem_store(array, index, value)`
    pub const ELEM_STORE: &str = "__tern_elem_store";
    /// `__tern_string(text)` copies a NUL-terminated literal into a new string
    pub const STRING: &str = "__tern_string";

    /// Link name of a standard primitive such as `write`
    pub fn primitive(name: &str) -> String {
        format!("__tern_{}", name)
    }
}

/// A string literal placed in `.data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    pub label: String,
    pub text: String,
}

/// One lowered function, prologue and epilogue included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X86Function {
    pub name: String,
    /// Bytes reserved for locals and spilled temporaries
    pub frame_size: i32,
    pub code: Vec<X86Instruction>,
}

/// Whole lowered program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct X86Program {
    pub data: Vec<DataEntry>,
    pub functions: Vec<X86Function>,
}

impl X86Program {
    pub fn function(&self, name: &str) -> Option<&X86Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &X86Instruction> {
        self.functions.iter().flat_map(|f| f.code.iter())
    }

    pub fn push_count(&self) -> usize {
        self.instructions()
            .filter(|i| matches!(i, X86Instruction::PushL(_)))
            .count()
    }

    pub fn pop_count(&self) -> usize {
        self.instructions()
            .filter(|i| matches!(i, X86Instruction::PopL(_)))
            .count()
    }

    /// Every `pushl` must have a matching `popl`
    pub fn check_stack_balance(&self) -> CompileResult<()> {
        let (pushes, pops) = (self.push_count(), self.pop_count());
        if pushes != pops {
            return Err(CompileError::UnbalancedStack { pushes, pops });
        }
        Ok(())
    }
}

impl fmt::Display for X86Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".data")?;
        for entry in &self.data {
            writeln!(f, "{}:", entry.label)?;
            writeln!(f, "\t.asciz \"{}\"", escape(&entry.text))?;
        }
        writeln!(f, ".text")?;
        writeln!(f, ".globl {}", MAIN)?;
        for function in &self.functions {
            for instr in &function.code {
                if instr.is_label() {
                    writeln!(f, "{}", instr)?;
                } else {
                    writeln!(f, "\t{}", instr)?;
                }
            }
        }
        Ok(())
    }
}

/// Escape a literal for a GAS `.asciz` directive
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}

/// x86 compiler state
pub struct X86Compiler {
    /// Scratch registers, in claim order
    pool: Vec<Register>,
    verify_stack_balance: bool,
    /// String literals of the program being compiled
    data: Vec<DataEntry>,

    // Per-function state
    function: String,
    epilogue: String,
    frame: Frame,
    code: Vec<X86Instruction>,
}

impl X86Compiler {
    pub fn new() -> Self {
        Self::with_config(&X86Config::default())
    }

    pub fn with_config(config: &X86Config) -> Self {
        Self {
            pool: config
                .scratch_registers
                .iter()
                .map(|reg| Register::from(*reg))
                .collect(),
            verify_stack_balance: config.verify_stack_balance,
            data: Vec::new(),
            function: String::new(),
            epilogue: String::new(),
            frame: Frame::default(),
            code: Vec::new(),
        }
    }

    /// Lower every function of `program`, then check push/pop balance
    pub fn compile(&mut self, program: &VMProgram) -> CompileResult<X86Program> {
        if program.main().is_none() {
            return Err(CompileError::MissingMain);
        }
        self.data.clear();

        let functions = program
            .functions
            .iter()
            .map(|function| self.lower_function(program, function))
            .collect::<CompileResult<Vec<_>>>()?;
        let x86 = X86Program {
            data: std::mem::take(&mut self.data),
            functions,
        };

        if self.verify_stack_balance {
            x86.check_stack_balance()?;
        }
        debug!(
            functions = x86.functions.len(),
            strings = x86.data.len(),
            pushes = x86.push_count(),
            "compiled x86 program"
        );
        Ok(x86)
    }
}

impl Default for X86Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower a program with the default register pool
pub fn compile(program: &VMProgram) -> CompileResult<X86Program> {
    X86Compiler::new().compile(program)
}
