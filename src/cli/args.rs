//! Command-line arguments and subcommands for `codetrial`.
//!
//! Declared with clap's derive API.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use crate::transpile::ScriptTarget;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "codetrial",
    version,
    about = "Transpile TypeScript submissions and judge them against challenge suites."
)]
pub struct CodetrialArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the JavaScript a TypeScript file transpiles to.
    Transpile {
        /// The TypeScript file to transpile.
        #[arg(required = true)]
        file: PathBuf,
        /// Language level of the emitted code.
        #[arg(long, value_enum, default_value_t = ScriptTarget::Es2015)]
        target: ScriptTarget,
        /// Show a line diff between the source and the emitted code.
        #[arg(long)]
        diff: bool,
    },
    /// Transpile a solution and run a suite against it.
    ///
    /// Without `--suite` or `--challenge` the built-in challenge's suite is used.
    #[command(group(ArgGroup::new("suite_source").args(["suite", "challenge"])))]
    Test {
        /// The TypeScript solution file.
        #[arg(required = true)]
        solution: PathBuf,
        /// A file holding `describe`/`it` suite code.
        #[arg(long)]
        suite: Option<PathBuf>,
        /// A challenge YAML file whose suite should be used.
        #[arg(long)]
        challenge: Option<PathBuf>,
        /// Print the report as JSON instead of a summary.
        #[arg(long)]
        json: bool,
        /// Steps each case may take before it fails.
        #[arg(long)]
        step_budget: Option<u64>,
    },
    /// Inspect challenge definitions.
    Challenge {
        #[command(subcommand)]
        action: ChallengeCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChallengeCommand {
    /// Print a challenge's description and starter code.
    Show {
        /// The challenge YAML file; the built-in challenge when omitted.
        file: Option<PathBuf>,
    },
    /// List the challenge files found under a directory.
    List {
        #[arg(required = true)]
        dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_well_formed() {
        CodetrialArgs::command().debug_assert();
    }

    #[test]
    fn test_suite_and_challenge_conflict() {
        let parsed = CodetrialArgs::try_parse_from([
            "codetrial",
            "test",
            "solution.ts",
            "--suite",
            "suite.js",
            "--challenge",
            "c.yaml",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_transpile_target() {
        let parsed = CodetrialArgs::try_parse_from(["codetrial", "transpile", "a.ts", "--target", "es2022"]).unwrap();
        match parsed.command {
            Command::Transpile { target, diff, .. } => {
                assert_eq!(target, ScriptTarget::Es2022);
                assert!(!diff);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
