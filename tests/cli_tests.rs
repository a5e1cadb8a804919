//! The `codetrial` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn codetrial() -> Command {
    Command::cargo_bin("codetrial").unwrap()
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

const SOLUTION: &str = "function double(n: number): number { return n * 2; }\n";

#[test]
fn transpile_prints_javascript() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "a.ts", "const x: number = 2 ** 3;\n");
    codetrial()
        .arg("transpile")
        .arg(&file)
        .assert()
        .success()
        .stdout("const x = Math.pow(2, 3);\n");
}

#[test]
fn transpile_diff_marks_changed_lines() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "a.ts", "let y: string = 'a';\nlet z = 1;\n");
    codetrial()
        .args(["transpile", "--diff"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("-let y: string = 'a';").and(contains("+let y = 'a';")).and(contains(" let z = 1;")));
}

#[test]
fn compilation_errors_are_rendered_with_miette() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "bad.ts", "let x = ;\n");
    codetrial()
        .arg("transpile")
        .arg(&file)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("codetrial::compile").and(contains("Line 1, Column 9")));
}

#[test]
fn passing_suite_exits_zero() {
    let dir = TempDir::new().unwrap();
    let solution = write(dir.path(), "solution.ts", SOLUTION);
    let suite = write(dir.path(), "suite.js", "it('doubles', () => assert.equal(double(4), 8));\n");
    codetrial()
        .arg("test")
        .arg(&solution)
        .arg("--suite")
        .arg(&suite)
        .assert()
        .success()
        .stdout(contains("doubles").and(contains("1/1 passed")));
}

#[test]
fn failing_suite_exits_one_and_reports_json() {
    let dir = TempDir::new().unwrap();
    let solution = write(dir.path(), "solution.ts", SOLUTION);
    let suite = write(dir.path(), "suite.js", "it('wrong', () => assert.equal(double(1), 3));\n");
    codetrial()
        .arg("test")
        .arg(&solution)
        .arg("--suite")
        .arg(&suite)
        .arg("--json")
        .assert()
        .code(1)
        .stdout(contains("\"status\": \"fail\"").and(contains("expected 2 to equal 3")));
}

#[test]
fn empty_suite_exits_zero() {
    let dir = TempDir::new().unwrap();
    let solution = write(dir.path(), "solution.ts", SOLUTION);
    let suite = write(dir.path(), "suite.js", "describe('nothing yet', function () {});\n");
    codetrial()
        .arg("test")
        .arg(&solution)
        .arg("--suite")
        .arg(&suite)
        .assert()
        .success()
        .stdout(contains("No tests ran (0/0 passed").and(contains("failed").not()));
}

#[test]
fn step_budget_flag_limits_cases() {
    let dir = TempDir::new().unwrap();
    let solution = write(dir.path(), "solution.ts", "function spin() { while (true) {} }\n");
    let suite = write(dir.path(), "suite.js", "it('spins', () => spin());\n");
    codetrial()
        .arg("test")
        .arg(&solution)
        .arg("--suite")
        .arg(&suite)
        .args(["--step-budget", "1000"])
        .assert()
        .code(1)
        .stdout(contains("Execution budget of 1000 steps exceeded"));
}

#[test]
fn builtin_challenge_is_the_default_suite() {
    let dir = TempDir::new().unwrap();
    let solution = write(dir.path(), "solution.ts", "function convertRomanToDecimal(r: string) { return 0; }\n");
    codetrial()
        .arg("test")
        .arg(&solution)
        .assert()
        .code(1)
        .stdout(contains("should convert empty string to 0").and(contains("1/11 passed")));
}

#[test]
fn challenge_show_and_list() {
    codetrial()
        .args(["challenge", "show"])
        .assert()
        .success()
        .stdout(contains("Convert Roman Numeral to Number").and(contains("convertRomanToDecimal")));

    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("more");
    fs::create_dir(&nested).unwrap();
    write(
        &nested,
        "sum.yml",
        "name: Sum\ndescription: Add numbers.\nstarter_code: 'function sum() {}'\nsuite: \"it('s', () => assert.equal(sum(1, 2), 3));\"\n",
    );
    write(dir.path(), "broken.yaml", "name: [\n");
    write(dir.path(), "notes.txt", "ignored");
    codetrial()
        .args(["challenge", "list"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("Sum").and(contains("(invalid)")).and(contains("notes.txt").not()));
}

#[test]
fn missing_solution_file_is_an_io_error() {
    codetrial()
        .args(["test", "does-not-exist.ts"])
        .assert()
        .failure()
        .stderr(contains("codetrial::cli::io"));
}
