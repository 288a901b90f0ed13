//! Bytecode compiler: label discipline, determinism and serialization

mod common;

use common::*;
use pretty_assertions::{assert_eq, assert_ne};
use std::collections::HashSet;
use tern_runtime::ast::{BinaryOperator as Op, CompilationUnit, Expression as E, Statement as S};
use tern_runtime::bytecode::{canonicalize_labels, disassemble, Instruction, VMProgram};
use tern_runtime::pipeline::Pipeline;
use tern_runtime::Compiler;

fn branchy() -> CompilationUnit {
    CompilationUnit::new(
        vec![fact(), fib()],
        vec![
            count_to(3).body.statements[0].clone(),
            count_to(3).body.statements[1].clone(),
            S::if_chain(
                vec![(bin(Op::Gt, E::var("i"), E::int(2)), vec![S::write(E::call("fact", vec![E::var("i")]))])],
                Some(vec![S::write(E::call("fib", vec![E::var("i")]))]),
            ),
            S::repeat_until(vec![S::assign("i", bin(Op::Sub, E::var("i"), E::int(1)))], bin(Op::Le, E::var("i"), E::int(0))),
        ],
    )
}

fn label_definitions(program: &VMProgram) -> Vec<String> {
    program
        .functions
        .iter()
        .flat_map(|f| f.code.iter())
        .filter_map(|i| match i {
            Instruction::Label(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_labels_unique_within_program() {
    let program = Compiler::new().compile(&branchy()).unwrap();
    let labels = label_definitions(&program);
    let unique: HashSet<&String> = labels.iter().collect();
    assert_eq!(unique.len(), labels.len());
}

#[test]
fn test_every_branch_target_is_defined() {
    let program = Compiler::new().compile(&branchy()).unwrap();
    let defined: HashSet<String> = label_definitions(&program).into_iter().collect();
    for instr in program.functions.iter().flat_map(|f| f.code.iter()) {
        if let Instruction::Goto(l) | Instruction::IfTrue(l) | Instruction::IfFalse(l) = instr {
            assert!(defined.contains(l), "undefined branch target {}", l);
        }
    }
}

#[test]
fn test_independent_compilers_agree_exactly() {
    let a = Compiler::new().compile(&branchy()).unwrap();
    let b = Compiler::new().compile(&branchy()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_reused_compiler_agrees_up_to_label_names() {
    let mut compiler = Compiler::new();
    let first = compiler.compile(&branchy()).unwrap();
    let second = compiler.compile(&branchy()).unwrap();
    assert_ne!(first, second);
    assert_eq!(canonicalize_labels(&first), canonicalize_labels(&second));
}

#[test]
fn test_json_round_trip_runs_identically() {
    let pipeline = Pipeline::default();
    let program = pipeline.compile_to_bytecode(&branchy()).unwrap();
    let restored = VMProgram::from_json(&program.to_json().unwrap()).unwrap();
    assert_eq!(restored, program);

    let (io, buffer) = tern_runtime::Io::captured("");
    pipeline.run_bytecode(&restored, &io).unwrap();
    let expected = assert_tiers_agree(&branchy(), "");
    assert_eq!(buffer.contents(), expected.output);
}

#[test]
fn test_disassembly_of_call() {
    let program = Compiler::new()
        .compile(&CompilationUnit::new(vec![fact()], vec![S::write(E::call("fact", vec![E::int(4)]))]))
        .unwrap();
    insta::assert_snapshot!(disassemble(&program), @r"
    fact(1):
       0  label fact
       1  label .L0
       2  aload 0
       3  iconst 1
       4  binop <=
       5  if_false .L1
       6  iconst 1
       7  ireturn
       8  goto .L1
       9  label .L1
      10  aload 0
      11  aload 0
      12  iconst 1
      13  binop -
      14  invoke_static fact,1
      15  binop *
      16  ireturn
      17  aconst_null
      18  areturn

    main(0):
       0  label main
       1  iconst 4
       2  invoke_static fact,1
       3  invoke_static write,1
       4  return
    ");
}
