//! Harness runs through the async and blocking entry points.

mod common;

use codetrial::harness::{
    run_artifacts, run_session, run_tests, run_tests_blocking, run_tests_with, RunnerConfig, TestOutcome,
    TestReport, TestStatus, CODE_EXECUTION_ERROR, TEST_RUNNER_ERROR,
};
use common::suite_of;
use pretty_assertions::assert_eq;

fn statuses(report: &TestReport) -> Vec<TestStatus> {
    report.outcomes().iter().map(|o| o.status).collect()
}

fn errors(report: &TestReport) -> Vec<Option<&str>> {
    report.outcomes().iter().map(|o| o.error.as_deref()).collect()
}

// ============================================================================
// ORDERING AND ISOLATION
// ============================================================================

#[tokio::test]
async fn outcomes_follow_declaration_order() {
    let suite = suite_of(&[
        ("A", "assert.equal(1, 1);"),
        ("B", "assert.ok(true);"),
        ("C", "assert.strictEqual('x', 'x');"),
    ]);
    let report = run_tests("", &suite).await;
    assert_eq!(
        report.outcomes(),
        [TestOutcome::pass("A"), TestOutcome::pass("B"), TestOutcome::pass("C")]
    );
}

#[tokio::test]
async fn a_failing_case_does_not_affect_its_neighbours() {
    let suite = suite_of(&[
        ("A", "assert.equal(1, 2);"),
        ("B", "assert.equal(2, 2);"),
        ("C", "throw new TypeError('bad');"),
    ]);
    let report = run_tests("", &suite).await;
    assert_eq!(statuses(&report), [TestStatus::Fail, TestStatus::Pass, TestStatus::Fail]);
    assert_eq!(errors(&report), [Some("expected 1 to equal 2"), None, Some("bad")]);
}

#[tokio::test]
async fn duplicate_case_names_are_reported_separately() {
    let suite = "it('d', () => {});\nit('d', () => { assert.fail('second'); });";
    let report = run_tests("", suite).await;
    assert_eq!(
        report.outcomes(),
        [TestOutcome::pass("d"), TestOutcome::fail("d", "second")]
    );
}

#[test]
fn registering_from_inside_a_case_is_a_type_error() {
    let suite = "it('outer', () => { it('late', () => {}); });\nit('nested group', () => { describe('g', () => {}); });";
    let report = run_tests_blocking("", suite);
    assert_eq!(
        errors(&report),
        [
            Some("Cannot register a case while the suite is running"),
            Some("Cannot register a group while the suite is running"),
        ]
    );
}

#[tokio::test]
async fn state_changes_persist_between_cases_in_one_run() {
    let suite = "let count = 0;\nit('first', () => { count++; });\nit('second', () => { assert.equal(count, 1); });";
    let report = run_tests("", suite).await;
    assert!(report.is_complete(), "{:?}", report);
}

#[tokio::test]
async fn runs_do_not_share_state() {
    let suite = "it('fresh', () => { assert.isUndefined(globalThis.leak); globalThis.leak = 1; });";
    let first = run_tests("", suite).await;
    let second = run_tests("", suite).await;
    assert!(first.is_complete());
    assert!(second.is_complete());
}

// ============================================================================
// FAILURE MESSAGES
// ============================================================================

#[test]
fn assertion_messages_follow_chai() {
    let suite = suite_of(&[
        ("deep", "assert.deepEqual([1, 2], [1, 3]);"),
        ("custom", "assert.isTrue(false, 'must hold');"),
        ("length", "assert.lengthOf([1], 2);"),
        ("include", "assert.include('team', 'i');"),
    ]);
    let report = run_tests_blocking("", &suite);
    assert_eq!(
        errors(&report),
        [
            Some("expected [ 1, 2 ] to deeply equal [ 1, 3 ]"),
            Some("must hold: expected false to be true"),
            Some("expected [ 1 ] to have a length of 2 but got 1"),
            Some("expected 'team' to include 'i'"),
        ]
    );
}

#[test]
fn non_error_throws_are_stringified() {
    let suite = suite_of(&[("string", "throw 'plain';"), ("number", "throw 42;")]);
    let report = run_tests_blocking("", &suite);
    assert_eq!(errors(&report), [Some("plain"), Some("42")]);
}

#[test]
fn throws_assertions_inspect_the_error() {
    let suite = suite_of(&[
        ("throws", "assert.throws(() => { throw new RangeError('r'); }, RangeError);"),
        ("message", "assert.throws(() => { throw new Error('needle in text'); }, 'needle');"),
        ("silent", "assert.doesNotThrow(() => 1);"),
    ]);
    let report = run_tests_blocking("", &suite);
    assert!(report.is_complete(), "{:?}", report);
}

// ============================================================================
// SETUP FAILURES
// ============================================================================

#[test]
fn syntax_error_in_suite_is_a_code_execution_error() {
    let report = run_tests_blocking("function ok() {}", "it('x', () => {");
    assert_eq!(report.len(), 1);
    assert_eq!(report.outcomes()[0].name, CODE_EXECUTION_ERROR);
    assert_eq!(report.outcomes()[0].status, TestStatus::Fail);
}

#[test]
fn non_function_case_body_is_a_code_execution_error() {
    let report = run_tests_blocking("", "it('no body', 42);");
    assert_eq!(report.outcomes()[0].name, CODE_EXECUTION_ERROR);
    assert!(report.outcomes()[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("requires a function body")));
}

#[test]
fn empty_suite_gives_empty_report() {
    let report = run_tests_blocking("const unused = 1;", "describe('nothing', function () {});");
    assert!(report.is_empty());
    assert!(!report.is_complete());
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[tokio::test]
async fn budget_is_configurable_and_per_case() {
    let config = RunnerConfig {
        step_budget: 2_000,
        ..RunnerConfig::default()
    };
    let suite = suite_of(&[("loops", "while (true) {}"), ("quick", "assert.ok(1);")]);
    let report = run_tests_with("", &suite, &config).await;
    assert_eq!(
        errors(&report),
        [Some("Execution budget of 2000 steps exceeded"), None]
    );
}

#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
#[tokio::test]
async fn worker_that_cannot_start_is_a_test_runner_error() {
    let config = RunnerConfig {
        worker_stack_size: 1 << 60,
        ..RunnerConfig::default()
    };
    let artifacts = run_artifacts("", "it('never', () => {});", &config).await;
    assert_eq!(artifacts.report.len(), 1);
    let outcome = &artifacts.report.outcomes()[0];
    assert_eq!(outcome.name, TEST_RUNNER_ERROR);
    assert_eq!(outcome.status, TestStatus::Fail);
    assert!(outcome
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("failed to start test worker: ")));
    assert!(artifacts.console.is_empty());
}

#[tokio::test]
async fn artifacts_keep_console_output() {
    let artifacts = run_artifacts(
        "console.log('defined');",
        "it('logs', () => { console.info('inside', { a: 1 }); });",
        &RunnerConfig::default(),
    )
    .await;
    let texts: Vec<&str> = artifacts.console.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, ["defined", "inside { a: 1 }"]);
    assert!(artifacts.report.is_complete());
}

#[test]
fn doubling_a_string_past_the_limit_fails_the_case() {
    let suite = "it('t', () => { let s = 'x'; for (let i = 0; i < 40; i++) s += s; });\nit('after', () => {});";
    let report = run_tests_blocking("", suite);
    assert_eq!(statuses(&report), [TestStatus::Fail, TestStatus::Pass]);
    assert_eq!(errors(&report)[0], Some("Invalid string length"));
}

#[test]
fn same_seed_gives_same_random_outcomes() {
    let suite = "it('r', () => { throw String(Math.random()); });";
    let config = RunnerConfig::default();
    let first = run_session("", suite, &config).report;
    let second = run_session("", suite, &config).report;
    assert_eq!(first, second);
}

#[test]
fn report_serializes_to_the_ui_shape() {
    let report = TestReport::new(vec![TestOutcome::pass("a"), TestOutcome::fail("b", "no")]);
    let json = serde_json::to_string(&report).unwrap();
    assert_eq!(
        json,
        r#"[{"name":"a","status":"pass"},{"name":"b","status":"fail","error":"no"}]"#
    );
}
