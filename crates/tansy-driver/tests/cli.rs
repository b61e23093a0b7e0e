//! Black-box CLI tests: invoke the built `tansy` binary against temp
//! script files and check its exit code and stdout/stderr, covering the
//! end-to-end scenarios the unit tests can't (process exit codes,
//! argv parsing, file I/O errors).

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn script(contents: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("failed to create temp script");
    std::fs::write(file.path(), contents).expect("failed to write temp script");
    file
}

#[test]
fn runs_a_script_and_exits_zero() {
    let file = script("print 1 + 2;");
    Command::cargo_bin("tansy")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

#[test]
fn recursive_fibonacci_prints_expected_value() {
    let file = script(
        r#"
        fun fib(n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        print fib(10);
        "#,
    );
    Command::cargo_bin("tansy")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("55"));
}

#[test]
fn compile_error_exits_65_with_diagnostic_on_stderr() {
    let file = script("var = 1;");
    Command::cargo_bin("tansy")
        .unwrap()
        .arg(file.path())
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Expect variable name"));
}

#[test]
fn runtime_type_error_exits_70_with_trace_on_stderr() {
    let file = script("print 1 + \"a\";");
    Command::cargo_bin("tansy")
        .unwrap()
        .arg(file.path())
        .assert()
        .code(70)
        .stderr(predicate::str::contains("Operands must be two numbers or two strings"))
        .stderr(predicate::str::contains("[line 1] in script"));
}

#[test]
fn missing_script_argument_is_a_usage_error() {
    Command::cargo_bin("tansy")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("usage"));
}

#[test]
fn unreadable_path_reports_the_path_in_the_error() {
    Command::cargo_bin("tansy")
        .unwrap()
        .arg("/nonexistent/path/does-not-exist.tansy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.tansy"));
}

#[test]
#[cfg(feature = "disassemble")]
fn disassemble_flag_prints_bytecode_instead_of_running() {
    let file = script("print 1 + 2;");
    Command::cargo_bin("tansy")
        .unwrap()
        .arg("--disassemble")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ADD").or(predicate::str::contains("PRINT")));
}

#[test]
#[cfg(not(feature = "disassemble"))]
fn disassemble_flag_fails_without_the_feature() {
    let file = script("print 1 + 2;");
    Command::cargo_bin("tansy")
        .unwrap()
        .arg("--disassemble")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("disassemble"));
}
