// ABOUTME: End-to-end scenarios run through the compiled binary against a
// ABOUTME: script file, asserting on stdout/stderr and exit code

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp script");
    file.write_all(source.as_bytes()).expect("write temp script");
    file
}

fn run(source: &str) -> assert_cmd::assert::Assert {
    let file = script(source);
    Command::cargo_bin("loxide")
        .unwrap()
        .arg(file.path())
        .assert()
}

#[test]
fn closures_capture_by_scope_not_by_name_rebinding() {
    run(r#"
        var a = "global";
        { fun showA() { print a; }
          showA();
          var a = "block";
          showA(); }
    "#)
    .success()
    .stdout("global\nglobal\n");
}

#[test]
fn arithmetic_and_precedence() {
    run("print (1 + 2) * 3 / 2 - 1;").success().stdout("3.5\n");
    run("print 5 + 2 * 3;").success().stdout("11\n");
}

#[test]
fn short_circuit_returns_the_deciding_operand() {
    run(r#"print nil or "hi";"#).success().stdout("hi\n");
    run("print 1 and 2;").success().stdout("2\n");
    run("print false and (1/0);").success().stdout("false\n");
}

#[test]
fn recursion_and_return() {
    run("fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } print fib(10);")
        .success()
        .stdout("55\n");
}

#[test]
fn for_loop_desugar_produces_correct_iteration() {
    run("for (var i = 0; i < 3; i = i + 1) print i;")
        .success()
        .stdout("0\n1\n2\n");
}

#[test]
fn self_initializer_in_a_block_is_a_compile_error() {
    run("{ var a = a; }")
        .failure()
        .code(65)
        .stderr(predicate::str::contains("own initializer"));
}

#[test]
fn duplicate_declaration_in_a_block_is_a_compile_error() {
    run("{ var x = 1; var x = 2; }")
        .failure()
        .code(65)
        .stderr(predicate::str::contains(
            "Already a variable with this name in this scope.",
        ));
}

#[test]
fn adding_a_string_and_a_number_is_a_runtime_error() {
    run(r#""a" + 1;"#)
        .failure()
        .code(70)
        .stderr(predicate::str::contains(
            "Operands must be two numbers or two strings.",
        ));
}

#[test]
fn top_level_return_is_a_compile_error() {
    run("return 1;")
        .failure()
        .code(65)
        .stderr(predicate::str::contains("top-level code"));
}
