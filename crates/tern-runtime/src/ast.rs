//! Abstract Syntax Tree (AST) definitions
//!
//! The tree is produced once by the front end and never mutated afterwards.
//! Both the tree-walking evaluator and the bytecode compiler consume it.
//!
//! An external parser hands trees over either in memory or as JSON
//! (see [`CompilationUnit::from_json`]). The constructor helpers at the
//! bottom of this file are what hand-written ASTs in tests use.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// AST schema version
///
/// Included in JSON dumps so an external parser and this crate can detect
/// drift. Increment when making breaking changes to the AST structure.
pub const AST_VERSION: u32 = 1;

/// A whole program: top-level functions plus the body of `main`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub functions: Vec<FunctionDeclaration>,
    pub body: CompoundStatement,
}

/// Versioned AST wrapper for JSON serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedUnit {
    pub ast_version: u32,
    #[serde(flatten)]
    pub unit: CompilationUnit,
}

impl CompilationUnit {
    pub fn new(functions: Vec<FunctionDeclaration>, body: Vec<Statement>) -> Self {
        Self {
            functions,
            body: CompoundStatement::new(body),
        }
    }

    /// Serialize to a versioned JSON document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&VersionedUnit {
            ast_version: AST_VERSION,
            unit: self.clone(),
        })
    }

    /// Deserialize from a versioned JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let versioned: VersionedUnit = serde_json::from_str(json)?;
        if versioned.ast_version != AST_VERSION {
            return Err(serde::de::Error::custom(format!(
                "unsupported AST version {} (expected {})",
                versioned.ast_version, AST_VERSION
            )));
        }
        Ok(versioned.unit)
    }
}

/// Ordered list of statements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompoundStatement {
    pub statements: Vec<Statement>,
}

impl CompoundStatement {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub params: Vec<String>,
    pub body: CompoundStatement,
    pub span: Span,
}

impl FunctionDeclaration {
    pub fn new(name: &str, params: &[&str], body: Vec<Statement>) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: CompoundStatement::new(body),
            span: Span::dummy(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Local variable declaration. Without an initializer the variable holds 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub name: String,
    pub initializer: Option<Expression>,
    pub span: Span,
}

/// `target := value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStatement {
    pub target: MemoryAccess,
    pub value: Expression,
}

/// One arm of an if/elif/else chain. `condition == None` is the else arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfCase {
    pub condition: Option<Expression>,
    pub body: CompoundStatement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub cases: Vec<IfCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: CompoundStatement,
}

/// `repeat body until condition`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatStatement {
    pub body: CompoundStatement,
    pub condition: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    pub init: Option<Box<Statement>>,
    pub condition: Option<Expression>,
    pub step: Option<Box<Statement>>,
    pub body: CompoundStatement,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Compound(CompoundStatement),
    VariableDeclaration(VariableDeclaration),
    Assignment(AssignmentStatement),
    If(IfStatement),
    While(WhileStatement),
    Repeat(RepeatStatement),
    For(ForStatement),
    Goto(String),
    Label(String),
    Continue,
    Break,
    Return(Option<Expression>),
    Skip,
    Expression(Expression),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Bitwise
    BitAnd,
    BitXor,
    BitOr,
    // Logical
    And,
    Or,
    // Comparison
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 16] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Mod,
        BinaryOperator::BitAnd,
        BinaryOperator::BitXor,
        BinaryOperator::BitOr,
        BinaryOperator::And,
        BinaryOperator::Or,
        BinaryOperator::Gt,
        BinaryOperator::Lt,
        BinaryOperator::Ge,
        BinaryOperator::Le,
        BinaryOperator::Eq,
        BinaryOperator::Ne,
    ];

    /// Source-level spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitOr => "|",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Gt => ">",
            BinaryOperator::Lt => "<",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Le => "<=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Gt
                | BinaryOperator::Lt
                | BinaryOperator::Ge
                | BinaryOperator::Le
                | BinaryOperator::Eq
                | BinaryOperator::Ne
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// `-x`, evaluated as `0 - x`
    Neg,
    /// `!x`, evaluated as `x == 0`
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i32),
    Character(u8),
    String(String),
    Null,
}

/// Readable or writable storage location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemoryAccess {
    Variable(String),
    Array {
        base: Box<Expression>,
        index: Box<Expression>,
    },
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Call(FunctionCall),
    ArrayCreation(Vec<Expression>),
    Literal(Literal),
    Memory(MemoryAccess),
}

// ============================================================================
// Construction helpers
// ============================================================================

impl Expression {
    pub fn int(value: i32) -> Self {
        Expression::Literal(Literal::Integer(value))
    }

    pub fn char(value: u8) -> Self {
        Expression::Literal(Literal::Character(value))
    }

    pub fn string(value: &str) -> Self {
        Expression::Literal(Literal::String(value.to_string()))
    }

    pub fn null() -> Self {
        Expression::Literal(Literal::Null)
    }

    pub fn var(name: &str) -> Self {
        Expression::Memory(MemoryAccess::Variable(name.to_string()))
    }

    pub fn index(base: Expression, index: Expression) -> Self {
        Expression::Memory(MemoryAccess::Array {
            base: Box::new(base),
            index: Box::new(index),
        })
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Expression::Call(FunctionCall {
            name: name.to_string(),
            args,
        })
    }

    pub fn array(elements: Vec<Expression>) -> Self {
        Expression::ArrayCreation(elements)
    }
}

impl Statement {
    pub fn declare(name: &str, initializer: Option<Expression>) -> Self {
        Statement::VariableDeclaration(VariableDeclaration {
            name: name.to_string(),
            initializer,
            span: Span::dummy(),
        })
    }

    pub fn assign(name: &str, value: Expression) -> Self {
        Statement::Assignment(AssignmentStatement {
            target: MemoryAccess::Variable(name.to_string()),
            value,
        })
    }

    pub fn assign_index(base: Expression, index: Expression, value: Expression) -> Self {
        Statement::Assignment(AssignmentStatement {
            target: MemoryAccess::Array {
                base: Box::new(base),
                index: Box::new(index),
            },
            value,
        })
    }

    /// Call used as a statement
    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Statement::Expression(Expression::call(name, args))
    }

    /// `write(value)`
    pub fn write(value: Expression) -> Self {
        Statement::call("write", vec![value])
    }

    /// if/elif chain with an optional else body
    pub fn if_chain(
        arms: Vec<(Expression, Vec<Statement>)>,
        otherwise: Option<Vec<Statement>>,
    ) -> Self {
        let mut cases: Vec<IfCase> = arms
            .into_iter()
            .map(|(condition, body)| IfCase {
                condition: Some(condition),
                body: CompoundStatement::new(body),
            })
            .collect();
        if let Some(body) = otherwise {
            cases.push(IfCase {
                condition: None,
                body: CompoundStatement::new(body),
            });
        }
        Statement::If(IfStatement { cases })
    }

    pub fn while_loop(condition: Expression, body: Vec<Statement>) -> Self {
        Statement::While(WhileStatement {
            condition,
            body: CompoundStatement::new(body),
        })
    }

    pub fn repeat_until(body: Vec<Statement>, condition: Expression) -> Self {
        Statement::Repeat(RepeatStatement {
            body: CompoundStatement::new(body),
            condition,
        })
    }

    pub fn for_loop(
        init: Option<Statement>,
        condition: Option<Expression>,
        step: Option<Statement>,
        body: Vec<Statement>,
    ) -> Self {
        Statement::For(ForStatement {
            init: init.map(Box::new),
            condition,
            step: step.map(Box::new),
            body: CompoundStatement::new(body),
        })
    }

    pub fn ret(value: Option<Expression>) -> Self {
        Statement::Return(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_symbols_roundtrip() {
        for op in BinaryOperator::ALL {
            assert_eq!(BinaryOperator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(BinaryOperator::from_symbol("**"), None);
    }

    #[test]
    fn test_if_chain_appends_else_case() {
        let stmt = Statement::if_chain(
            vec![(Expression::int(1), vec![Statement::Skip])],
            Some(vec![Statement::Skip]),
        );
        match stmt {
            Statement::If(if_stmt) => {
                assert_eq!(if_stmt.cases.len(), 2);
                assert!(if_stmt.cases[0].condition.is_some());
                assert!(if_stmt.cases[1].condition.is_none());
            }
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let unit = CompilationUnit::new(
            vec![FunctionDeclaration::new(
                "id",
                &["x"],
                vec![Statement::ret(Some(Expression::var("x")))],
            )],
            vec![Statement::write(Expression::call("id", vec![Expression::int(7)]))],
        );
        let json = unit.to_json().unwrap();
        assert!(json.contains("\"ast_version\": 1"));
        assert_eq!(CompilationUnit::from_json(&json).unwrap(), unit);
    }

    #[test]
    fn test_json_version_mismatch_rejected() {
        let json = r#"{"ast_version": 99, "functions": [], "body": {"statements": []}}"#;
        assert!(CompilationUnit::from_json(json).is_err());
    }
}
