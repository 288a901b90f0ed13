//! Error parity: both tiers reject the same programs with the same error kind

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tern_runtime::ast::{BinaryOperator as Op, CompilationUnit, Expression as E, FunctionDeclaration, Statement as S};
use tern_runtime::pipeline::{run_ast, run_vm, PipelineError};
use tern_runtime::span::Span;
use tern_runtime::{CompileError, RuntimeError};

#[rstest]
#[case::division_by_zero(vec![S::write(bin(Op::Div, E::int(1), E::int(0)))], "division-by-zero")]
#[case::remainder_by_zero(vec![S::write(bin(Op::Mod, E::int(1), E::int(0)))], "division-by-zero")]
#[case::undefined_variable(vec![S::write(E::var("ghost"))], "undefined-variable")]
#[case::unknown_function(vec![S::call("nope", vec![])], "unknown-function")]
#[case::write_of_string(vec![S::write(E::string("s"))], "type-mismatch")]
#[case::mixed_operands(vec![S::write(bin(Op::Add, E::int(1), E::char(b'a')))], "type-mismatch")]
#[case::non_int_condition(vec![S::while_loop(E::null(), vec![])], "type-mismatch")]
#[case::index_out_of_bounds(vec![S::write(E::index(E::array(vec![E::int(1)]), E::int(3)))], "index-out-of-bounds")]
#[case::negative_index(vec![S::write(E::index(E::array(vec![E::int(1)]), E::int(-1)))], "index-out-of-bounds")]
#[case::external_assignment(vec![S::assign("true", E::int(0))], "external-reassignment")]
#[case::break_outside_loop(vec![S::Break], "unsupported")]
#[case::continue_outside_loop(vec![S::Continue], "unsupported")]
#[case::goto(vec![S::Goto("end".into())], "unsupported")]
#[case::label(vec![S::Label("end".into())], "unsupported")]
#[case::read_past_end(vec![S::write(E::call("read", vec![]))], "io")]
#[case::primitive_read_as_value(vec![S::write(E::var("strlen"))], "type-mismatch")]
#[case::constant_called(vec![S::write(E::call("true", vec![]))], "type-mismatch")]
#[case::wrong_arity_never_reached(vec![S::while_loop(E::int(0), vec![S::call("write", vec![])])], "arity-mismatch")]
#[case::strmake_negative(vec![S::call("strmake", vec![E::int(-1), E::char(b'x')])], "type-mismatch")]
fn test_error_kind_matches(#[case] body: Vec<S>, #[case] code: &str) {
    assert_error_code(&program(body), code);
}

#[test]
fn test_output_before_error_is_kept() {
    let unit = program(vec![
        S::write(E::int(1)),
        S::write(bin(Op::Div, E::int(1), E::int(0))),
        S::write(E::int(2)),
    ]);
    let run = assert_tiers_agree(&unit, "");
    assert_eq!(run.output, "1\n");
}

#[test]
fn test_arity_mismatch_on_user_function() {
    let f = FunctionDeclaration::new("f", &["a"], vec![]);
    let unit = CompilationUnit::new(vec![f], vec![S::call("f", vec![])]);
    assert_error_code(&unit, "arity-mismatch");

    // The compiler catches it before anything runs.
    assert!(matches!(
        run_vm(&unit, "").result,
        Err(PipelineError::Compile(CompileError::ArityMismatch { .. }))
    ));
    assert!(matches!(
        run_ast(&unit, "").result,
        Err(PipelineError::Runtime(RuntimeError::ArityMismatch { .. }))
    ));
}

#[test]
fn test_duplicate_functions_name_both_spans() {
    let unit = CompilationUnit::new(
        vec![
            FunctionDeclaration::new("f", &[], vec![]).with_span(Span::new(0, 10)),
            FunctionDeclaration::new("f", &["x"], vec![]).with_span(Span::new(20, 30)),
        ],
        vec![],
    );
    assert_error_code(&unit, "redefinition");
    assert_eq!(
        run_vm(&unit, "").result,
        Err(PipelineError::Compile(CompileError::Redefinition {
            name: "f".into(),
            first: Span::new(0, 10),
            second: Span::new(20, 30),
        }))
    );
}

#[test]
fn test_function_named_like_external_rejected() {
    let unit = CompilationUnit::new(vec![FunctionDeclaration::new("write", &["n"], vec![])], vec![]);
    assert_error_code(&unit, "external-reassignment");
}

#[test]
fn test_duplicate_parameters_rejected() {
    let unit = CompilationUnit::new(vec![FunctionDeclaration::new("f", &["a", "a"], vec![])], vec![]);
    assert_error_code(&unit, "redefinition");
}

#[test]
fn test_error_messages_name_the_culprit() {
    let run = run_ast(&program(vec![S::write(E::var("ghost"))]), "");
    assert_eq!(run.result.unwrap_err().to_string(), "Undefined variable: ghost");

    let run = run_vm(&program(vec![S::call("nope", vec![E::int(1)])]), "");
    assert_eq!(run.result.unwrap_err().to_string(), "Unknown function: nope");
}
