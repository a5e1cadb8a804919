//! User-facing output for the CLI.
//!
//! Color is used only when stdout is a terminal. All printing goes through
//! a [`termcolor`] stream so colored and plain output share one code path.

use std::io::{self, Write};
use std::path::PathBuf;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::challenge::Challenge;
use crate::harness::TestReport;
use crate::runtime::{ConsoleLevel, ConsoleLine};

pub struct Printer {
    stdout: StandardStream,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        let choice = if atty::is(atty::Stream::Stdout) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    // ========================================================================
    // TRANSPILATION
    // ========================================================================

    pub fn code(&mut self, code: &str) -> io::Result<()> {
        writeln!(self.stdout, "{}", code.trim_end())
    }

    /// Line diff from `before` to `after`.
    pub fn diff(&mut self, before: &str, after: &str) -> io::Result<()> {
        let changeset = Changeset::new(before.trim_end(), after.trim_end(), "\n");
        for diff in &changeset.diffs {
            let (marker, color, text) = match diff {
                Difference::Same(x) => (' ', None, x),
                Difference::Add(x) => ('+', Some(Color::Green), x),
                Difference::Rem(x) => ('-', Some(Color::Red), x),
            };
            self.stdout.set_color(ColorSpec::new().set_fg(color))?;
            for line in text.split('\n') {
                writeln!(self.stdout, "{}{}", marker, line)?;
            }
        }
        self.stdout.reset()
    }

    // ========================================================================
    // TEST REPORTS
    // ========================================================================

    pub fn report(&mut self, report: &TestReport) -> io::Result<()> {
        for outcome in report.outcomes() {
            if outcome.is_pass() {
                self.colored(Color::Green, false, "✓")?;
                writeln!(self.stdout, " {}", outcome.name)?;
            } else {
                self.colored(Color::Red, false, "✗")?;
                writeln!(self.stdout, " {}", outcome.name)?;
                if let Some(error) = &outcome.error {
                    self.stdout.set_color(ColorSpec::new().set_dimmed(true))?;
                    writeln!(self.stdout, "    {}", error)?;
                    self.stdout.reset()?;
                }
            }
        }

        writeln!(self.stdout)?;
        let total = report.len();
        let rate = if total > 0 {
            (report.passed() as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let (color, verdict) = if report.is_empty() {
            (Color::Yellow, "No tests ran")
        } else if report.is_complete() {
            (Color::Green, "All tests passed")
        } else {
            (Color::Red, "Some tests failed")
        };
        self.colored(color, true, verdict)?;
        writeln!(
            self.stdout,
            " ({}/{} passed, {:.1}%)",
            report.passed(),
            total,
            rate
        )
    }

    pub fn report_json(&mut self, report: &TestReport) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(&mut self.stdout, report)?;
        writeln!(self.stdout).map_err(serde_json::Error::io)
    }

    /// Console output the program produced, in emission order.
    pub fn console(&mut self, lines: &[ConsoleLine]) -> io::Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        self.colored(Color::Cyan, true, "Console output")?;
        writeln!(self.stdout)?;
        for line in lines {
            let color = match line.level {
                ConsoleLevel::Warn => Some(Color::Yellow),
                ConsoleLevel::Error => Some(Color::Red),
                ConsoleLevel::Log | ConsoleLevel::Info => None,
            };
            self.stdout.set_color(ColorSpec::new().set_fg(color))?;
            writeln!(self.stdout, "  {}", line.text)?;
        }
        self.stdout.reset()?;
        writeln!(self.stdout)
    }

    // ========================================================================
    // CHALLENGES
    // ========================================================================

    pub fn challenge(&mut self, challenge: &Challenge) -> io::Result<()> {
        self.colored(Color::Yellow, true, &challenge.name)?;
        writeln!(self.stdout)?;
        if let Some(limit) = challenge.time_limit_secs {
            writeln!(self.stdout, "Time limit: {}:{:02}", limit / 60, limit % 60)?;
        }
        writeln!(self.stdout, "\n{}", challenge.description.trim_end())?;
        self.colored(Color::Cyan, true, "\nStarter code")?;
        writeln!(self.stdout, "\n{}", challenge.starter_code.trim_end())
    }

    pub fn challenge_list(&mut self, entries: &[(PathBuf, Option<String>)]) -> io::Result<()> {
        if entries.is_empty() {
            return writeln!(self.stdout, "  No challenges found.");
        }
        for (path, name) in entries {
            match name {
                Some(name) => writeln!(self.stdout, "  {}  {}", path.display(), name)?,
                None => {
                    write!(self.stdout, "  {}  ", path.display())?;
                    self.colored(Color::Red, false, "(invalid)")?;
                    writeln!(self.stdout)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // PRIVATE HELPERS
    // ========================================================================

    fn colored(&mut self, color: Color, bold: bool, text: &str) -> io::Result<()> {
        self.stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
        write!(self.stdout, "{}", text)?;
        self.stdout.reset()
    }
}
