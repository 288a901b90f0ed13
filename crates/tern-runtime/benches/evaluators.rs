//! Evaluator benchmarks
//!
//! Runs the same programs through the AST evaluator and the bytecode
//! evaluator, plus the two lowering passes on their own.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tern_runtime::ast::{BinaryOperator as Op, CompilationUnit, Expression as E, FunctionDeclaration, Statement as S};
use tern_runtime::{compiler, interpreter, prelude, vm, x86, Io};

fn bin(op: Op, left: E, right: E) -> E {
    E::binary(op, left, right)
}

/// Recursive `fact(n)` called `reps` times
fn fact_program(n: i32, reps: i32) -> CompilationUnit {
    let fact = FunctionDeclaration::new(
        "fact",
        &["n"],
        vec![
            S::if_chain(vec![(bin(Op::Le, E::var("n"), E::int(1)), vec![S::ret(Some(E::int(1)))])], None),
            S::ret(Some(bin(
                Op::Mul,
                E::var("n"),
                E::call("fact", vec![bin(Op::Sub, E::var("n"), E::int(1))]),
            ))),
        ],
    );
    CompilationUnit::new(
        vec![fact],
        vec![S::for_loop(
            Some(S::declare("i", Some(E::int(0)))),
            Some(bin(Op::Lt, E::var("i"), E::int(reps))),
            Some(S::assign("i", bin(Op::Add, E::var("i"), E::int(1)))),
            vec![S::call("fact", vec![E::int(n)])],
        )],
    )
}

/// Naive recursive `fib(n)`
fn fib_program(n: i32) -> CompilationUnit {
    let fib = FunctionDeclaration::new(
        "fib",
        &["n"],
        vec![
            S::if_chain(vec![(bin(Op::Lt, E::var("n"), E::int(2)), vec![S::ret(Some(E::var("n")))])], None),
            S::ret(Some(bin(
                Op::Add,
                E::call("fib", vec![bin(Op::Sub, E::var("n"), E::int(1))]),
                E::call("fib", vec![bin(Op::Sub, E::var("n"), E::int(2))]),
            ))),
        ],
    );
    CompilationUnit::new(vec![fib], vec![S::write(E::call("fib", vec![E::int(n)]))])
}

/// Summing loop over `n` iterations
fn loop_program(n: i32) -> CompilationUnit {
    CompilationUnit::new(
        vec![],
        vec![
            S::declare("sum", Some(E::int(0))),
            S::declare("i", Some(E::int(0))),
            S::while_loop(
                bin(Op::Lt, E::var("i"), E::int(n)),
                vec![
                    S::assign("sum", bin(Op::Add, E::var("sum"), E::var("i"))),
                    S::assign("i", bin(Op::Add, E::var("i"), E::int(1))),
                ],
            ),
            S::write(E::var("sum")),
        ],
    )
}

fn run_ast(unit: &CompilationUnit) {
    let (io, _buffer) = Io::captured("");
    let externals = prelude(&io);
    let _ = interpreter::evaluate(unit, &externals);
}

fn run_vm(program: &tern_runtime::VMProgram) {
    let (io, _buffer) = Io::captured("");
    let externals = prelude(&io);
    let _ = vm::evaluate(program, &externals);
}

// ============================================================================
// Evaluation
// ============================================================================

fn bench_evaluators(c: &mut Criterion) {
    let programs = [
        ("fact_10x100", fact_program(10, 100)),
        ("fib_18", fib_program(18)),
        ("loop_10k", loop_program(10_000)),
    ];

    let mut group = c.benchmark_group("evaluate");
    for (name, unit) in &programs {
        group.bench_with_input(BenchmarkId::new("ast", name), unit, |b, unit| {
            b.iter(|| run_ast(black_box(unit)));
        });
        let Ok(program) = compiler::compile(unit) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("vm", name), &program, |b, program| {
            b.iter(|| run_vm(black_box(program)));
        });
    }
    group.finish();
}

// ============================================================================
// Lowering
// ============================================================================

fn bench_lowering(c: &mut Criterion) {
    let unit = fib_program(18);
    c.bench_function("compile_bytecode_fib", |b| {
        b.iter(|| compiler::compile(black_box(&unit)));
    });

    let Ok(program) = compiler::compile(&unit) else {
        return;
    };
    c.bench_function("compile_x86_fib", |b| {
        b.iter(|| x86::compile(black_box(&program)));
    });
}

criterion_group!(benches, bench_evaluators, bench_lowering);
criterion_main!(benches);
