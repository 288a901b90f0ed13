//! Shared test utilities
//!
//! Program builders plus helpers that run a unit through several tiers and
//! compare what they observed.

#![allow(dead_code)]

use tern_runtime::ast::{BinaryOperator as Op, CompilationUnit, Expression as E, FunctionDeclaration, Statement as S};
use tern_runtime::pipeline::{run_ast, run_vm, Run};
use pretty_assertions::assert_eq;
use tern_runtime::x86::{self, X86Program};

/// Run `unit` on both evaluators, assert they agree, and return the run
pub fn assert_tiers_agree(unit: &CompilationUnit, input: &str) -> Run {
    let ast = run_ast(unit, input);
    let vm = run_vm(unit, input);
    assert_eq!(ast.output, vm.output, "write output differs between tiers");
    assert_eq!(
        ast.result.as_ref().map_err(|e| e.code()),
        vm.result.as_ref().map_err(|e| e.code()),
        "result kind differs between tiers"
    );
    ast
}

/// Assert both evaluators succeed and print `expected`
pub fn assert_output(unit: &CompilationUnit, input: &str, expected: &str) {
    let run = assert_tiers_agree(unit, input);
    assert!(run.result.is_ok(), "run failed: {:?}", run.result);
    assert_eq!(run.output, expected);
}

/// Assert both tiers fail with the error kind `code`
pub fn assert_error_code(unit: &CompilationUnit, code: &str) {
    let ast = run_ast(unit, "");
    let vm = run_vm(unit, "");
    match (&ast.result, &vm.result) {
        (Err(a), Err(v)) => {
            assert_eq!(a.code(), code, "AST evaluator: {}", a);
            assert_eq!(v.code(), code, "VM path: {}", v);
        }
        other => panic!("Expected {} from both tiers, got {:?}", code, other),
    }
}

/// Lower `unit` to x86 with default settings
pub fn lower(unit: &CompilationUnit) -> X86Program {
    let program = tern_runtime::compiler::compile(unit).expect("bytecode compilation failed");
    x86::compile(&program).expect("x86 compilation failed")
}

// ============================================================================
// Program builders
// ============================================================================

pub fn program(body: Vec<S>) -> CompilationUnit {
    CompilationUnit::new(vec![], body)
}

pub fn bin(op: Op, left: E, right: E) -> E {
    E::binary(op, left, right)
}

/// `i := i + 1`
pub fn incr(name: &str) -> S {
    S::assign(name, bin(Op::Add, E::var(name), E::int(1)))
}

/// `fact(n)`, recursive
pub fn fact() -> FunctionDeclaration {
    FunctionDeclaration::new(
        "fact",
        &["n"],
        vec![
            S::if_chain(
                vec![(bin(Op::Le, E::var("n"), E::int(1)), vec![S::ret(Some(E::int(1)))])],
                None,
            ),
            S::ret(Some(bin(
                Op::Mul,
                E::var("n"),
                E::call("fact", vec![bin(Op::Sub, E::var("n"), E::int(1))]),
            ))),
        ],
    )
}

/// `fib(n)`, iterative
pub fn fib() -> FunctionDeclaration {
    FunctionDeclaration::new(
        "fib",
        &["n"],
        vec![
            S::declare("a", Some(E::int(0))),
            S::declare("b", Some(E::int(1))),
            S::declare("i", Some(E::int(0))),
            S::while_loop(
                bin(Op::Lt, E::var("i"), E::var("n")),
                vec![
                    S::declare("t", Some(bin(Op::Add, E::var("a"), E::var("b")))),
                    S::assign("a", E::var("b")),
                    S::assign("b", E::var("t")),
                    incr("i"),
                ],
            ),
            S::ret(Some(E::var("a"))),
        ],
    )
}

/// `i := 0; while i < n do write(i); i := i + 1 od`
pub fn count_to(n: i32) -> CompilationUnit {
    program(vec![
        S::declare("i", Some(E::int(0))),
        S::while_loop(
            bin(Op::Lt, E::var("i"), E::int(n)),
            vec![S::write(E::var("i")), incr("i")],
        ),
    ])
}

/// Writes of `0..n`, one per line
pub fn lines(n: i32) -> String {
    (0..n).map(|i| format!("{}\n", i)).collect()
}
