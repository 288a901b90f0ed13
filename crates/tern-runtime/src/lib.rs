//! Tern Runtime - three-tier execution pipeline
//!
//! This library provides:
//! - The shared symbol and scope model
//! - Static checks every tier runs before evaluating or lowering
//! - A tree-walking AST evaluator
//! - AST -> bytecode lowering and a bytecode evaluator
//! - Bytecode -> 32-bit x86 (AT&T) lowering
//! - The standard external functions (I/O, strings, arrays)

/// Tern runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod ast;
pub mod binder;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod interpreter;
pub mod pipeline;
pub mod scope;
pub mod span;
pub mod stdlib;
pub mod symbol;
pub mod vm;
pub mod x86;

// Re-export commonly used types
pub use ast::CompilationUnit;
pub use bytecode::{Instruction, VMFunction, VMProgram};
pub use compiler::Compiler;
pub use error::{CompileError, CompileResult, RuntimeError, RuntimeResult};
pub use interpreter::Interpreter;
pub use scope::Externals;
pub use span::Span;
pub use stdlib::{prelude, Io};
pub use symbol::{Pointer, Symbol, SymbolKind};
pub use vm::VM;
pub use x86::{X86Compiler, X86Program};
