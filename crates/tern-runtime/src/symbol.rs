//! Runtime value representation
//!
//! Shared by the AST evaluator and the bytecode evaluator:
//! - `Int`, `Char`, `Null`: immediate values
//! - `List`: shared mutable vector (strings are lists of `Char`)
//! - `External`: host primitive such as `write`
//! - `UserFn`: handle to a function declared in the program
//!
//! Operator semantics live here too so both evaluators apply exactly the
//! same rules.

use crate::ast::BinaryOperator;
use crate::error::{RuntimeError, RuntimeResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Storage key. Variables and functions live in separate namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pointer {
    Variable(String),
    Function(String),
}

impl Pointer {
    pub fn variable(name: &str) -> Self {
        Pointer::Variable(name.to_string())
    }

    pub fn function(name: &str) -> Self {
        Pointer::Function(name.to_string())
    }

    pub fn name(&self) -> &str {
        match self {
            Pointer::Variable(name) | Pointer::Function(name) => name,
        }
    }
}

/// Shared, mutable list payload
pub type ListRef = Rc<RefCell<Vec<Symbol>>>;

/// Host primitive body
pub type ExternalBody = Rc<dyn Fn(&[Symbol]) -> RuntimeResult<Symbol>>;

/// Primitive supplied by the host environment
#[derive(Clone)]
pub struct ExternalFunction {
    pub name: Rc<str>,
    pub arity: usize,
    pub returns_value: bool,
    body: ExternalBody,
}

impl ExternalFunction {
    pub fn new(name: &str, arity: usize, returns_value: bool, body: ExternalBody) -> Self {
        Self {
            name: Rc::from(name),
            arity,
            returns_value,
            body,
        }
    }

    /// Invoke with arguments in source order. Void primitives yield `Null`.
    pub fn invoke(&self, args: &[Symbol]) -> RuntimeResult<Symbol> {
        if args.len() != self.arity {
            return Err(RuntimeError::ArityMismatch {
                name: self.name.to_string(),
                expected: self.arity,
                found: args.len(),
            });
        }
        let result = (self.body)(args)?;
        Ok(if self.returns_value {
            result
        } else {
            Symbol::Null
        })
    }
}

impl fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<external {}/{}>", self.name, self.arity)
    }
}

/// Dynamically typed runtime value
#[derive(Clone)]
pub enum Symbol {
    Int(i32),
    Char(u8),
    List(ListRef),
    External(ExternalFunction),
    UserFn(Rc<str>),
    Null,
}

/// Concrete kind of a [`Symbol`], used in type errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Int,
    Char,
    List,
    External,
    UserFn,
    Null,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolKind::Int => "int",
            SymbolKind::Char => "char",
            SymbolKind::List => "list",
            SymbolKind::External => "external function",
            SymbolKind::UserFn => "function",
            SymbolKind::Null => "null",
        };
        f.write_str(name)
    }
}

impl Symbol {
    pub fn list(items: Vec<Symbol>) -> Self {
        Symbol::List(Rc::new(RefCell::new(items)))
    }

    /// Build a fresh character list from text
    pub fn string(text: &str) -> Self {
        Symbol::list(text.bytes().map(Symbol::Char).collect())
    }

    pub fn kind(&self) -> SymbolKind {
        match self {
            Symbol::Int(_) => SymbolKind::Int,
            Symbol::Char(_) => SymbolKind::Char,
            Symbol::List(_) => SymbolKind::List,
            Symbol::External(_) => SymbolKind::External,
            Symbol::UserFn(_) => SymbolKind::UserFn,
            Symbol::Null => SymbolKind::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Symbol::Null)
    }

    pub fn as_int(&self, context: &str) -> RuntimeResult<i32> {
        match self {
            Symbol::Int(n) => Ok(*n),
            other => Err(RuntimeError::type_mismatch(format!(
                "{} expects int, got {}",
                context,
                other.kind()
            ))),
        }
    }

    pub fn as_char(&self, context: &str) -> RuntimeResult<u8> {
        match self {
            Symbol::Char(c) => Ok(*c),
            other => Err(RuntimeError::type_mismatch(format!(
                "{} expects char, got {}",
                context,
                other.kind()
            ))),
        }
    }

    pub fn as_list(&self, context: &str) -> RuntimeResult<ListRef> {
        match self {
            Symbol::List(items) => Ok(Rc::clone(items)),
            other => Err(RuntimeError::type_mismatch(format!(
                "{} expects list, got {}",
                context,
                other.kind()
            ))),
        }
    }

    /// Branch condition: any nonzero int is true
    pub fn is_truthy(&self, context: &str) -> RuntimeResult<bool> {
        Ok(self.as_int(context)? != 0)
    }

    /// Read a character list back as text, if this is one
    pub fn as_text(&self) -> Option<String> {
        let Symbol::List(items) = self else {
            return None;
        };
        items
            .borrow()
            .iter()
            .map(|item| match item {
                Symbol::Char(c) => Some(*c as char),
                _ => None,
            })
            .collect()
    }

    /// Element of a list
    pub fn element(&self, index: &Symbol) -> RuntimeResult<Symbol> {
        let items = self.as_list("element access")?;
        let idx = index.as_int("element index")?;
        let items = items.borrow();
        checked_index(idx, items.len()).map(|i| items[i].clone())
    }

    /// Overwrite an element of a list in place
    pub fn set_element(&self, index: &Symbol, value: Symbol) -> RuntimeResult<()> {
        let items = self.as_list("element store")?;
        let idx = index.as_int("element index")?;
        let mut items = items.borrow_mut();
        let i = checked_index(idx, items.len())?;
        items[i] = value;
        Ok(())
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Symbol::Int(n) => n.to_string(),
            Symbol::Char(c) => format!("'{}'", *c as char),
            Symbol::List(items) => match self.as_text() {
                Some(text) => format!("{:?}", text),
                None => {
                    let parts: Vec<String> =
                        items.borrow().iter().map(|s| s.to_display_string()).collect();
                    format!("[{}]", parts.join(", "))
                }
            },
            Symbol::External(ext) => format!("<external {}>", ext.name),
            Symbol::UserFn(name) => format!("<fn {}>", name),
            Symbol::Null => "null".to_string(),
        }
    }
}

/// Bounds-check a source-level index
pub(crate) fn checked_index(index: i32, len: usize) -> RuntimeResult<usize> {
    if index >= 0 && (index as usize) < len {
        Ok(index as usize)
    } else {
        Err(RuntimeError::IndexOutOfBounds { index, len })
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Symbol::Int(a), Symbol::Int(b)) => a == b,
            (Symbol::Char(a), Symbol::Char(b)) => a == b,
            (Symbol::List(a), Symbol::List(b)) => Rc::ptr_eq(a, b),
            (Symbol::External(a), Symbol::External(b)) => a.name == b.name,
            (Symbol::UserFn(a), Symbol::UserFn(b)) => a == b,
            (Symbol::Null, Symbol::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Int(n) => write!(f, "Int({})", n),
            Symbol::Char(c) => write!(f, "Char({:?})", *c as char),
            Symbol::List(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Symbol::External(ext) => write!(f, "{:?}", ext),
            Symbol::UserFn(name) => write!(f, "UserFn({})", name),
            Symbol::Null => write!(f, "Null"),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

fn flag(value: bool) -> Symbol {
    Symbol::Int(value as i32)
}

/// Apply a binary operator. Both operands must be of the same kind.
pub fn apply_binary(op: BinaryOperator, left: &Symbol, right: &Symbol) -> RuntimeResult<Symbol> {
    use BinaryOperator::*;

    match (left, right) {
        (Symbol::Int(a), Symbol::Int(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                Add => Symbol::Int(a.wrapping_add(b)),
                Sub => Symbol::Int(a.wrapping_sub(b)),
                Mul => Symbol::Int(a.wrapping_mul(b)),
                Div => {
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    Symbol::Int(a.wrapping_div(b))
                }
                Mod => {
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    Symbol::Int(a.wrapping_rem(b))
                }
                BitAnd => Symbol::Int(a & b),
                BitXor => Symbol::Int(a ^ b),
                BitOr => Symbol::Int(a | b),
                And => flag(a == 1 && b == 1),
                Or => flag(a == 1 || b == 1),
                Gt => flag(a > b),
                Lt => flag(a < b),
                Ge => flag(a >= b),
                Le => flag(a <= b),
                Eq => flag(a == b),
                Ne => flag(a != b),
            };
            Ok(value)
        }
        (Symbol::Char(a), Symbol::Char(b)) if op.is_comparison() => Ok(match op {
            Gt => flag(a > b),
            Lt => flag(a < b),
            Ge => flag(a >= b),
            Le => flag(a <= b),
            Eq => flag(a == b),
            _ => flag(a != b),
        }),
        (Symbol::Null, Symbol::Null) | (Symbol::List(_), Symbol::List(_))
            if matches!(op, Eq | Ne) =>
        {
            let same = left == right;
            Ok(flag(if op == Eq { same } else { !same }))
        }
        _ => Err(RuntimeError::type_mismatch(format!(
            "operator '{}' cannot be applied to {} and {}",
            op,
            left.kind(),
            right.kind()
        ))),
    }
}
