//! # Codetrial
//!
//! Evaluates TypeScript challenge submissions. A submission is transpiled to
//! JavaScript, then run by an embedded interpreter against a mocha-style
//! suite that uses a chai-style `assert`.
//!
//! ## Pipeline
//!
//! ```text
//! source.ts --transpile--> executable.js --run_tests(suite)--> TestReport
//! ```
//!
//! The two stages share no state: the harness re-parses the emitted text.
//!
//! ## Module Structure
//!
//! - **`syntax`**: grammar, parser and syntax tree
//! - **`transpile`**: type erasure and target lowering
//! - **`runtime`**: the tree-walking interpreter
//! - **`intrinsics`**: the built-in globals of each realm
//! - **`harness`**: suite registration, execution and reporting
//! - **`challenge`**: YAML challenge definitions
//! - **`diagnostics`**: error types
//! - **`cli`**: the `codetrial` command line

use std::any::Any;

pub mod challenge;
pub mod cli;
pub mod diagnostics;
pub mod harness;
pub mod intrinsics;
pub mod logging;
pub mod runtime;
pub mod stack;
pub mod syntax;
pub mod transpile;

pub use crate::diagnostics::{CompilationError, Diagnostic, Location, Severity};
pub use crate::harness::{run_tests, run_tests_blocking, run_tests_with, RunnerConfig, TestOutcome, TestReport, TestStatus};
pub use crate::transpile::{transpile, transpile_with, CompilerOptions};

/// Transpile `source`, then run `suite` against the result.
///
/// A compilation failure is returned as the error and no test runs.
pub async fn evaluate_submission(source: &str, suite: &str) -> Result<TestReport, CompilationError> {
    let executable = transpile(source)?;
    Ok(run_tests(&executable, suite).await)
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
