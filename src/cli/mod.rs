//! The `codetrial` command line.
//!
//! Every subcommand returns `Result<Outcome, CliError>`; [`run`] renders
//! errors with miette and maps the result to the exit code.

use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::Parser;
use thiserror::Error;
use tracing::debug;

use crate::challenge::{self, Challenge};
use crate::cli::args::{ChallengeCommand, CodetrialArgs, Command};
use crate::cli::output::Printer;
use crate::diagnostics::{ChallengeError, CompilationError};
use crate::harness::{self, RunnerConfig};
use crate::transpile::{transpile_with, CompilerOptions, ScriptTarget};

pub mod args;
pub mod output;

#[derive(Debug, Error, miette::Diagnostic)]
pub enum CliError {
    #[error("could not read {path}")]
    #[diagnostic(code(codetrial::cli::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write output")]
    #[diagnostic(code(codetrial::cli::output))]
    Output(#[from] std::io::Error),
    #[error("could not serialize the report")]
    #[diagnostic(code(codetrial::cli::json))]
    Json(#[from] serde_json::Error),
    #[error("could not start the async runtime")]
    #[diagnostic(code(codetrial::cli::runtime))]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compilation(#[from] CompilationError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Challenge(#[from] ChallengeError),
}

/// Whether the command's verdict was positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// The main entry point for the CLI.
pub fn run() {
    crate::logging::init_tracing();
    let args = CodetrialArgs::parse();

    let result = match args.command {
        Command::Transpile { file, target, diff } => handle_transpile(&file, target, diff),
        Command::Test {
            solution,
            suite,
            challenge,
            json,
            step_budget,
        } => handle_test(&solution, suite.as_deref(), challenge.as_deref(), json, step_budget),
        Command::Challenge { action } => match action {
            ChallengeCommand::Show { file } => handle_show(file.as_deref()),
            ChallengeCommand::List { dir } => handle_list(&dir),
        },
    };

    match result {
        Ok(Outcome::Success) => {}
        Ok(Outcome::Failure) => process::exit(1),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            process::exit(1);
        }
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn handle_transpile(file: &Path, target: ScriptTarget, diff: bool) -> Result<Outcome, CliError> {
    let source = read_file(file)?;
    let emitted = transpile_with(&source, &CompilerOptions::with_target(target))?;
    let mut printer = Printer::new();
    if diff {
        printer.diff(&source, &emitted)?;
    } else {
        printer.code(&emitted)?;
    }
    Ok(Outcome::Success)
}

fn handle_test(
    solution: &Path,
    suite_file: Option<&Path>,
    challenge_file: Option<&Path>,
    json: bool,
    step_budget: Option<u64>,
) -> Result<Outcome, CliError> {
    let source = read_file(solution)?;
    let suite = match (suite_file, challenge_file) {
        (Some(path), _) => read_file(path)?,
        (None, Some(path)) => challenge::load(path)?.suite,
        (None, None) => challenge::builtin()?.suite,
    };

    let mut config = RunnerConfig::default();
    if let Some(budget) = step_budget {
        config.step_budget = budget;
    }

    let executable = transpile_with(&source, &CompilerOptions::default())?;
    debug!(bytes = executable.len(), "solution transpiled");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(CliError::Runtime)?;
    let artifacts = runtime.block_on(harness::run_artifacts(&executable, &suite, &config));

    let mut printer = Printer::new();
    if json {
        printer.report_json(&artifacts.report)?;
    } else {
        printer.console(&artifacts.console)?;
        printer.report(&artifacts.report)?;
    }

    // An empty suite is not a failure.
    Ok(if artifacts.report.failed() == 0 {
        Outcome::Success
    } else {
        Outcome::Failure
    })
}

fn handle_show(file: Option<&Path>) -> Result<Outcome, CliError> {
    let challenge = match file {
        Some(path) => challenge::load(path)?,
        None => challenge::builtin()?,
    };
    Printer::new().challenge(&challenge)?;
    Ok(Outcome::Success)
}

fn handle_list(dir: &Path) -> Result<Outcome, CliError> {
    let entries: Vec<(PathBuf, Option<String>)> = challenge::discover_challenges(dir)?
        .into_iter()
        .map(|path| {
            let name = challenge::load(&path).ok().map(|c: Challenge| c.name);
            (path, name)
        })
        .collect();
    Printer::new().challenge_list(&entries)?;
    Ok(Outcome::Success)
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
