//! One-call drivers for each tier
//!
//! A [`Pipeline`] carries a [`PipelineConfig`] into the tiers that read it:
//! the bytecode evaluator (`vm.trace`) and the x86 backend (`x86.*`). The
//! `*_captured` helpers run against fixed input and collect `write` output
//! in memory, which is how the cross-tier tests compare evaluators.

use crate::ast::CompilationUnit;
use crate::bytecode::VMProgram;
use crate::compiler::Compiler;
use crate::error::{CompileError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::stdlib::{prelude, Io};
use crate::vm::VM;
use crate::x86::{X86Compiler, X86Program};
use tern_config::PipelineConfig;
use thiserror::Error;

/// Failure anywhere in the pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Compile(err) => err.code(),
            PipelineError::Runtime(err) => err.code(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Outcome of a run with captured output
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub result: PipelineResult<()>,
    /// Everything written before the run ended, prompts included
    pub output: String,
}

/// Configured driver for all three tiers
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Evaluate the AST directly
    pub fn run_ast(&self, unit: &CompilationUnit, io: &Io) -> PipelineResult<()> {
        let externals = prelude(io);
        Interpreter::new(&externals).evaluate(unit)?;
        Ok(())
    }

    /// Compile to bytecode and evaluate it
    pub fn run_vm(&self, unit: &CompilationUnit, io: &Io) -> PipelineResult<()> {
        let program = self.compile_to_bytecode(unit)?;
        self.run_bytecode(&program, io)
    }

    /// Evaluate an already compiled program
    pub fn run_bytecode(&self, program: &VMProgram, io: &Io) -> PipelineResult<()> {
        let externals = prelude(io);
        VM::with_config(&externals, &self.config.vm).run(program)?;
        Ok(())
    }

    pub fn compile_to_bytecode(&self, unit: &CompilationUnit) -> PipelineResult<VMProgram> {
        Ok(Compiler::new().compile(unit)?)
    }

    pub fn compile_to_x86(&self, unit: &CompilationUnit) -> PipelineResult<X86Program> {
        let program = self.compile_to_bytecode(unit)?;
        Ok(X86Compiler::with_config(&self.config.x86).compile(&program)?)
    }

    pub fn run_ast_captured(&self, unit: &CompilationUnit, input: &str) -> Run {
        let (io, buffer) = Io::captured(input);
        let result = self.run_ast(unit, &io);
        Run {
            result,
            output: buffer.contents(),
        }
    }

    pub fn run_vm_captured(&self, unit: &CompilationUnit, input: &str) -> Run {
        let (io, buffer) = Io::captured(input);
        let result = self.run_vm(unit, &io);
        Run {
            result,
            output: buffer.contents(),
        }
    }
}

/// Evaluate the AST with default settings and captured I/O
pub fn run_ast(unit: &CompilationUnit, input: &str) -> Run {
    Pipeline::default().run_ast_captured(unit, input)
}

/// Compile and evaluate bytecode with default settings and captured I/O
pub fn run_vm(unit: &CompilationUnit, input: &str) -> Run {
    Pipeline::default().run_vm_captured(unit, input)
}

pub fn compile_to_bytecode(unit: &CompilationUnit) -> PipelineResult<VMProgram> {
    Pipeline::default().compile_to_bytecode(unit)
}

pub fn compile_to_x86(unit: &CompilationUnit) -> PipelineResult<X86Program> {
    Pipeline::default().compile_to_x86(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression as E, Statement as S};
    use pretty_assertions::assert_eq;
    use tern_config::X86Config;

    #[test]
    fn test_read_prompt_and_echo_match() {
        let unit = CompilationUnit::new(vec![], vec![S::write(E::call("read", vec![]))]);
        let ast = run_ast(&unit, "17");
        let vm = run_vm(&unit, "17");
        assert_eq!(ast, vm);
        assert_eq!(ast.output, "> 17\n");
    }

    #[test]
    fn test_compile_error_surfaces_from_vm_path() {
        let unit = CompilationUnit::new(vec![], vec![S::Continue]);
        let vm = run_vm(&unit, "");
        assert!(matches!(vm.result, Err(PipelineError::Compile(_))));
        assert_eq!(vm.result.unwrap_err().code(), run_ast(&unit, "").result.unwrap_err().code());
    }

    #[test]
    fn test_x86_settings_reach_backend() {
        let mut config = PipelineConfig::default();
        config.x86 = X86Config {
            scratch_registers: vec![],
            verify_stack_balance: true,
        };
        let pipeline = Pipeline::new(config);
        let unit = CompilationUnit::new(vec![], vec![S::write(E::int(1))]);
        let text = pipeline.compile_to_x86(&unit).unwrap().to_string();
        assert!(text.contains("movl $1, -4(%ebp)"));
        assert!(!text.contains("%esi"));
    }
}
