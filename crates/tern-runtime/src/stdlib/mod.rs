//! External function table
//!
//! Host-provided constants and primitives shared by both evaluators:
//! - `true` / `false`
//! - `read` / `write` (see [`io`])
//! - string primitives (see [`string`])
//! - array primitives (see [`array`])
//!
//! The compilers never see the table itself, only [`signature`] and
//! [`constant`], which describe the same names statically.

pub mod array;
pub mod io;
pub mod string;

use crate::scope::Externals;
use crate::symbol::{ExternalBody, ExternalFunction, Symbol};
use std::rc::Rc;

pub use io::{stdin_reader, stdout_writer, InputReader, Io, OutputWriter, SharedBuffer};

/// Static description of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub arity: usize,
    pub returns_value: bool,
}

const fn sig(arity: usize, returns_value: bool) -> Signature {
    Signature {
        arity,
        returns_value,
    }
}

/// Signature of a standard primitive, if `name` is one
pub fn signature(name: &str) -> Option<Signature> {
    let signature = match name {
        "read" => sig(0, true),
        "write" => sig(1, false),
        "strlen" => sig(1, true),
        "strget" => sig(2, true),
        "strset" => sig(3, false),
        "strsub" => sig(3, true),
        "strdup" => sig(1, true),
        "strcat" => sig(2, true),
        "strcmp" => sig(2, true),
        "strmake" => sig(2, true),
        "arrlen" => sig(1, true),
        "arrmake" => sig(2, true),
        _ => return None,
    };
    Some(signature)
}

/// Value of a standard constant, if `name` is one
pub fn constant(name: &str) -> Option<i32> {
    match name {
        "true" => Some(1),
        "false" => Some(0),
        _ => None,
    }
}

/// Names of every standard primitive
pub const PRIMITIVES: [&str; 12] = [
    "read", "write", "strlen", "strget", "strset", "strsub", "strdup", "strcat", "strcmp",
    "strmake", "arrlen", "arrmake",
];

fn primitive(name: &str, body: ExternalBody) -> Symbol {
    // PRIMITIVES and signature() are kept in lockstep.
    let Signature {
        arity,
        returns_value,
    } = signature(name).unwrap_or(sig(0, false));
    Symbol::External(ExternalFunction::new(name, arity, returns_value, body))
}

/// Build the standard external table around the given I/O handles
pub fn prelude(io: &Io) -> Externals {
    let output = io.output.clone();
    let input = io.input.clone();
    let prompt = io.output.clone();

    Externals::new()
        .with("true", Symbol::Int(1))
        .with("false", Symbol::Int(0))
        .with(
            "read",
            primitive("read", Rc::new(move |_: &[Symbol]| io::read(&input, &prompt))),
        )
        .with(
            "write",
            primitive("write", Rc::new(move |args: &[Symbol]| io::write(&output, &args[0]))),
        )
        .with("strlen", primitive("strlen", Rc::new(|a: &[Symbol]| string::strlen(&a[0]))))
        .with(
            "strget",
            primitive("strget", Rc::new(|a: &[Symbol]| string::strget(&a[0], &a[1]))),
        )
        .with(
            "strset",
            primitive("strset", Rc::new(|a: &[Symbol]| string::strset(&a[0], &a[1], &a[2]))),
        )
        .with(
            "strsub",
            primitive("strsub", Rc::new(|a: &[Symbol]| string::strsub(&a[0], &a[1], &a[2]))),
        )
        .with("strdup", primitive("strdup", Rc::new(|a: &[Symbol]| string::strdup(&a[0]))))
        .with(
            "strcat",
            primitive("strcat", Rc::new(|a: &[Symbol]| string::strcat(&a[0], &a[1]))),
        )
        .with(
            "strcmp",
            primitive("strcmp", Rc::new(|a: &[Symbol]| string::strcmp(&a[0], &a[1]))),
        )
        .with(
            "strmake",
            primitive("strmake", Rc::new(|a: &[Symbol]| string::strmake(&a[0], &a[1]))),
        )
        .with("arrlen", primitive("arrlen", Rc::new(|a: &[Symbol]| array::arrlen(&a[0]))))
        .with(
            "arrmake",
            primitive("arrmake", Rc::new(|a: &[Symbol]| array::arrmake(&a[0], &a[1]))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_registers_every_primitive() {
        let externals = prelude(&Io::captured("").0);
        for name in PRIMITIVES {
            let Some(Symbol::External(ext)) = externals.get(name) else {
                panic!("{} missing from prelude", name);
            };
            let expected = signature(name).unwrap();
            assert_eq!(ext.arity, expected.arity, "{}", name);
            assert_eq!(ext.returns_value, expected.returns_value, "{}", name);
        }
        assert_eq!(externals.get("true"), Some(&Symbol::Int(1)));
        assert_eq!(externals.get("false"), Some(&Symbol::Int(0)));
    }

    #[test]
    fn test_signature_unknown_name() {
        assert_eq!(signature("print"), None);
        assert_eq!(constant("maybe"), None);
    }
}
