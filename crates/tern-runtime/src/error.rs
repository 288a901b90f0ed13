//! Error types shared across the pipeline
//!
//! Every error here is fatal for the evaluation or compilation that raised
//! it. Callers decide how to report them.

use crate::span::Span;
use thiserror::Error;

/// Which runtime stack ran dry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Operand,
    Call,
    Scope,
}

impl std::fmt::Display for StackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackKind::Operand => write!(f, "operand"),
            StackKind::Call => write!(f, "call"),
            StackKind::Scope => write!(f, "scope"),
        }
    }
}

/// Errors raised while evaluating an AST or a bytecode program
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("'{name}' is declared twice (at {first} and at {second})")]
    Redefinition {
        name: String,
        first: Span,
        second: Span,
    },

    #[error("Type error: {msg}")]
    TypeMismatch { msg: String },

    #[error("'{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i32, len: usize },

    #[error("{0} stack underflow")]
    StackUnderflow(StackKind),

    #[error("Cannot assign to external symbol '{name}'")]
    ExternalReassignment { name: String },

    #[error("Label '{label}' defined twice (in {first} and in {second})")]
    DuplicateLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("Unknown label: {label}")]
    UnknownLabel { label: String },

    #[error("Unsupported construct: {construct}")]
    Unsupported { construct: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl RuntimeError {
    /// Stable short code, used to compare failures across evaluators
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::UndefinedVariable { .. } => "undefined-variable",
            RuntimeError::UnknownFunction { .. } => "unknown-function",
            RuntimeError::Redefinition { .. } => "redefinition",
            RuntimeError::TypeMismatch { .. } => "type-mismatch",
            RuntimeError::ArityMismatch { .. } => "arity-mismatch",
            RuntimeError::DivisionByZero => "division-by-zero",
            RuntimeError::IndexOutOfBounds { .. } => "index-out-of-bounds",
            RuntimeError::StackUnderflow(_) => "stack-underflow",
            RuntimeError::ExternalReassignment { .. } => "external-reassignment",
            RuntimeError::DuplicateLabel { .. } => "duplicate-label",
            RuntimeError::UnknownLabel { .. } => "unknown-label",
            RuntimeError::Unsupported { .. } => "unsupported",
            RuntimeError::Io { .. } => "io",
        }
    }

    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch { msg: msg.into() }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::Io {
            message: err.to_string(),
        }
    }
}

/// Errors raised while lowering AST -> bytecode or bytecode -> x86
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("'{name}' is declared twice (at {first} and at {second})")]
    Redefinition {
        name: String,
        first: Span,
        second: Span,
    },

    #[error("Cannot assign to external symbol '{name}'")]
    ExternalReassignment { name: String },

    #[error("Unsupported construct: {construct}")]
    Unsupported { construct: String },

    #[error("'{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Type error: {msg}")]
    TypeMismatch { msg: String },

    #[error("Program has no 'main' function")]
    MissingMain,

    #[error("Value stack underflow while compiling '{function}'")]
    StackUnderflow { function: String },

    #[error("Unbalanced machine stack: {pushes} pushl vs {pops} popl")]
    UnbalancedStack { pushes: usize, pops: usize },
}

impl CompileError {
    /// Stable kind name; shared kinds use the same name as [`RuntimeError::code`]
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Redefinition { .. } => "redefinition",
            CompileError::ExternalReassignment { .. } => "external-reassignment",
            CompileError::Unsupported { .. } => "unsupported",
            CompileError::ArityMismatch { .. } => "arity-mismatch",
            CompileError::TypeMismatch { .. } => "type-mismatch",
            CompileError::MissingMain => "missing-main",
            CompileError::StackUnderflow { .. } => "stack-underflow",
            CompileError::UnbalancedStack { .. } => "unbalanced-stack",
        }
    }
}

/// Static check failures surface from the AST evaluator under the same kind
impl From<CompileError> for RuntimeError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Redefinition {
                name,
                first,
                second,
            } => RuntimeError::Redefinition {
                name,
                first,
                second,
            },
            CompileError::ExternalReassignment { name } => {
                RuntimeError::ExternalReassignment { name }
            }
            CompileError::Unsupported { construct } => RuntimeError::Unsupported { construct },
            CompileError::ArityMismatch {
                name,
                expected,
                found,
            } => RuntimeError::ArityMismatch {
                name,
                expected,
                found,
            },
            CompileError::TypeMismatch { msg } => RuntimeError::TypeMismatch { msg },
            other => RuntimeError::Unsupported {
                construct: other.to_string(),
            },
        }
    }
}

/// Result alias for evaluators
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Result alias for compilers
pub type CompileResult<T> = Result<T, CompileError>;
