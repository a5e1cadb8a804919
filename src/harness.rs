//! # Test Harness
//!
//! Runs an executable program against a mocha-style suite and reports one
//! outcome per case. The run never fails: a program that cannot even be
//! set up produces a single `Code Execution Error` outcome, and a harness
//! fault produces a single `Test Runner Error` outcome.
//!
//! ## Run Lifecycle
//!
//! 1. **Synthesis**: the program text is the executable, a newline, then the
//!    suite.
//! 2. **Compilation**: the text is compiled with exactly `describe`, `it` and
//!    `assert` as its free bindings.
//! 3. **Registration**: invoking the program fills a per-run
//!    [`SuiteBuilder`]; no case body runs yet.
//! 4. **Execution**: the [`Runner`] walks the tree depth-first, each case
//!    with a fresh step budget.
//!
//! The interpreter is single-threaded, so the async entry point runs the
//! whole session on a dedicated worker thread and awaits its report.
//!
//! ## Module Structure
//!
//! - **`suite`**: the suite tree and the `describe`/`it` bindings
//! - **`runner`**: depth-first case execution
//! - **`assert`**: the chai-style `assert` binding
//! - **`report`**: serializable outcomes

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::diagnostics::{ExecutionSetupError, HarnessError};
use crate::runtime::{
    compile_for_execution, invoke, CaptureSink, ConsoleLine, Interpreter, InterpreterConfig,
};

pub mod assert;
pub mod report;
pub mod runner;
pub mod suite;

pub use report::{TestOutcome, TestReport, TestStatus, CODE_EXECUTION_ERROR, TEST_RUNNER_ERROR};
pub use runner::Runner;
pub use suite::{SuiteBuilder, TestCase, TestGroup};

/// The names a synthesized program may use beyond the built-ins.
pub const HARNESS_BINDINGS: [&str; 3] = ["describe", "it", "assert"];

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Steps each case (and the registration pass) may take.
    pub step_budget: u64,
    /// Nested calls allowed before a `RangeError`.
    pub max_call_depth: usize,
    /// Seed for `Math.random`.
    pub random_seed: u64,
    /// Stack size of the worker thread, in bytes.
    pub worker_stack_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let interpreter = InterpreterConfig::default();
        Self {
            step_budget: interpreter.step_budget,
            max_call_depth: interpreter.max_call_depth,
            random_seed: interpreter.random_seed,
            worker_stack_size: 64 * 1024 * 1024,
        }
    }
}

impl RunnerConfig {
    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            step_budget: self.step_budget,
            max_call_depth: self.max_call_depth,
            random_seed: self.random_seed,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub report: TestReport,
    /// `console.*` output in emission order.
    pub console: Vec<ConsoleLine>,
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Run `suite` against `executable` with the default configuration.
pub async fn run_tests(executable: &str, suite: &str) -> TestReport {
    run_tests_with(executable, suite, &RunnerConfig::default()).await
}

/// Run on a worker thread and await the report.
pub async fn run_tests_with(executable: &str, suite: &str, config: &RunnerConfig) -> TestReport {
    run_artifacts(executable, suite, config).await.report
}

/// Like [`run_tests_with`], keeping the captured console output.
pub async fn run_artifacts(executable: &str, suite: &str, config: &RunnerConfig) -> RunArtifacts {
    let executable = executable.to_string();
    let suite = suite.to_string();
    let worker_config = config.clone();
    run_on_worker(config, move || {
        guarded(|| run_session(&executable, &suite, &worker_config))
    })
    .await
}

/// Blocking variant of [`run_tests`], for callers without a runtime.
pub fn run_tests_blocking(executable: &str, suite: &str) -> TestReport {
    let config = RunnerConfig::default();
    let executable = executable.to_string();
    let suite = suite.to_string();
    let worker_config = config.clone();
    let artifacts = spawn_worker(&config, move || guarded(|| run_session(&executable, &suite, &worker_config)))
        .and_then(|handle| {
            handle
                .join()
                .unwrap_or_else(|payload| Err(HarnessError::WorkerPanicked(crate::panic_message(payload.as_ref()))))
        });
    finish(artifacts).report
}

/// Run a whole session on the current thread.
pub fn run_session(executable: &str, suite: &str, config: &RunnerConfig) -> RunArtifacts {
    let sink = CaptureSink::default();
    let mut interp = Interpreter::new(config.interpreter_config(), Box::new(sink.clone()));
    let report = match execute(&mut interp, executable, suite) {
        Ok(report) => report,
        Err(error) => {
            warn!(error = %error, "program failed before any case ran");
            TestReport::code_execution_error(error.message())
        }
    };
    info!(
        passed = report.passed(),
        failed = report.failed(),
        "test run finished"
    );
    RunArtifacts {
        report,
        console: sink.lines(),
    }
}

// ============================================================================
// INTERNALS
// ============================================================================

fn spawn_worker<T, F>(config: &RunnerConfig, work: F) -> Result<thread::JoinHandle<T>, HarnessError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name("codetrial-runner".to_string())
        .stack_size(config.worker_stack_size)
        .spawn(work)
        .map_err(HarnessError::Spawn)
}

/// Run `work` on a fresh worker thread and await what it sends back.
async fn run_on_worker<F>(config: &RunnerConfig, work: F) -> RunArtifacts
where
    F: FnOnce() -> Result<RunArtifacts, HarnessError> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let spawned = spawn_worker(config, move || {
        // The receiver only goes away if the caller stopped waiting.
        let _ = sender.send(work());
    });
    let artifacts = match spawned {
        Ok(_) => receiver.await.unwrap_or(Err(HarnessError::Disconnected)),
        Err(error) => Err(error),
    };
    finish(artifacts)
}

fn guarded(work: impl FnOnce() -> RunArtifacts) -> Result<RunArtifacts, HarnessError> {
    panic::catch_unwind(AssertUnwindSafe(work))
        .map_err(|payload| HarnessError::WorkerPanicked(crate::panic_message(payload.as_ref())))
}

fn finish(artifacts: Result<RunArtifacts, HarnessError>) -> RunArtifacts {
    artifacts.unwrap_or_else(|error| {
        warn!(error = %error, "test runner failed");
        RunArtifacts {
            report: TestReport::test_runner_error(error.to_string()),
            console: Vec::new(),
        }
    })
}

/// Compile, register and run. Errors before the first case are setup errors.
fn execute(interp: &mut Interpreter, executable: &str, suite: &str) -> Result<TestReport, ExecutionSetupError> {
    let program = format!("{}\n{}", executable, suite);
    let invocable = compile_for_execution(&program, &HARNESS_BINDINGS)?;

    let builder = SuiteBuilder::shared();
    let bindings = [
        suite::describe_function(interp, &builder),
        suite::it_function(interp, &builder),
        assert::create(interp),
    ];

    interp.reset_budget();
    if let Err(thrown) = invoke(&invocable, interp, &bindings) {
        return Err(ExecutionSetupError::Thrown {
            message: runner::thrown_message(interp, thrown),
        });
    }
    let root = builder.borrow_mut().finish();
    debug!(cases = root.case_count(), "suite registered");

    Ok(TestReport::new(Runner::new(interp).run(&root)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn statuses(report: &TestReport) -> Vec<TestStatus> {
        report.outcomes().iter().map(|o| o.status).collect()
    }

    #[test]
    fn test_own_cases_run_before_child_groups() {
        let suite = r#"
            describe('outer', () => {
                describe('inner', () => { it('second', () => {}); });
                it('first', () => {});
            });
        "#;
        let report = run_session("", suite, &RunnerConfig::default()).report;
        let names: Vec<_> = report.outcomes().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_registration_error_is_code_execution_error() {
        let report = run_session("throw new Error('boom');", "", &RunnerConfig::default()).report;
        assert_eq!(report.outcomes(), [TestOutcome::fail(CODE_EXECUTION_ERROR, "boom")]);
    }

    #[test]
    fn test_budget_exhaustion_fails_only_that_case() {
        let config = RunnerConfig {
            step_budget: 10_000,
            ..RunnerConfig::default()
        };
        let suite = r#"
            it('spins', () => { while (true) {} });
            it('returns', () => { assert.equal(1, 1); });
        "#;
        let report = run_session("", suite, &config).report;
        assert_eq!(statuses(&report), [TestStatus::Fail, TestStatus::Pass]);
        assert_eq!(
            report.outcomes()[0].error.as_deref(),
            Some("Execution budget of 10000 steps exceeded")
        );
    }

    #[test]
    fn test_console_output_is_captured() {
        let artifacts = run_session("console.log('hi', 1);", "", &RunnerConfig::default());
        assert_eq!(artifacts.console.len(), 1);
        assert_eq!(artifacts.console[0].text, "hi 1");
    }

    #[tokio::test]
    async fn test_worker_panic_is_a_test_runner_error() {
        let config = RunnerConfig::default();
        let artifacts = run_on_worker(&config, || guarded(|| panic!("lost the suite"))).await;
        assert_eq!(
            artifacts.report.outcomes(),
            [TestOutcome::fail(TEST_RUNNER_ERROR, "test worker panicked: lost the suite")]
        );
        assert!(artifacts.console.is_empty());
    }

    #[tokio::test]
    async fn test_worker_that_never_reports_is_a_test_runner_error() {
        let config = RunnerConfig::default();
        let artifacts = run_on_worker(&config, || panic!("unguarded")).await;
        assert_eq!(
            artifacts.report.outcomes(),
            [TestOutcome::fail(TEST_RUNNER_ERROR, "test worker stopped without reporting")]
        );
    }

    #[test]
    fn test_blocking_entry_point() {
        let report = run_tests_blocking("function two() { return 2; }", "it('two', () => assert.strictEqual(two(), 2));");
        assert!(report.is_complete());
    }
}
