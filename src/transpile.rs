//! TypeScript to JavaScript transpiler.
//!
//! A single pass over one source unit: parse with recovery, run the
//! syntactic checks, erase types and print JavaScript for the configured
//! target. Type errors are not this component's concern; only syntax and
//! structural problems are diagnosed.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diagnostics::{CompilationError, Diagnostic};
use crate::syntax::parse_program;

pub mod emitter;
pub mod lint;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Language level of the emitted JavaScript.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTarget {
    #[default]
    #[value(name = "es2015")]
    Es2015,
    #[value(name = "es2020")]
    Es2020,
    #[value(name = "es2022")]
    Es2022,
}

impl ScriptTarget {
    /// `**` arrived in ES2016.
    pub fn has_exponent(self) -> bool {
        self > ScriptTarget::Es2015
    }

    /// Object spread arrived in ES2018.
    pub fn has_object_spread(self) -> bool {
        self > ScriptTarget::Es2015
    }

    /// Optional catch binding arrived in ES2019.
    pub fn has_optional_catch_binding(self) -> bool {
        self > ScriptTarget::Es2015
    }

    /// `??` arrived in ES2020.
    pub fn has_nullish(self) -> bool {
        self >= ScriptTarget::Es2020
    }

    /// Optional chaining arrived in ES2020.
    pub fn has_optional_chaining(self) -> bool {
        self >= ScriptTarget::Es2020
    }

    /// Logical assignment and numeric separators arrived in ES2021.
    pub fn has_logical_assignment(self) -> bool {
        self > ScriptTarget::Es2020
    }

    /// Class fields arrived in ES2022.
    pub fn has_class_fields(self) -> bool {
        self >= ScriptTarget::Es2022
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    CommonJs,
}

/// The fixed compiler configuration the pipeline transpiles with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub target: ScriptTarget,
    pub module: ModuleKind,
    pub strict: bool,
    pub es_module_interop: bool,
    pub skip_lib_check: bool,
    pub force_consistent_casing_in_file_names: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: ScriptTarget::Es2015,
            module: ModuleKind::CommonJs,
            strict: false,
            es_module_interop: true,
            skip_lib_check: true,
            force_consistent_casing_in_file_names: true,
        }
    }
}

impl CompilerOptions {
    pub fn with_target(target: ScriptTarget) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Emitted text plus every diagnostic, warnings included.
#[derive(Debug, Clone, PartialEq)]
pub struct TranspileOutput {
    pub output_text: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranspileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Transpile with the default configuration.
pub fn transpile(source: &str) -> Result<String, CompilationError> {
    transpile_with(source, &CompilerOptions::default())
}

/// Transpile, failing when any error-severity diagnostic is produced.
pub fn transpile_with(source: &str, options: &CompilerOptions) -> Result<String, CompilationError> {
    debug!(bytes = source.len(), target = ?options.target, "transpiling");
    let output = panic::catch_unwind(AssertUnwindSafe(|| transpile_module(source, options)))
        .map_err(|payload| CompilationError::internal(crate::panic_message(payload.as_ref())))?;

    if let Some(error) = CompilationError::from_diagnostics(&output.diagnostics, source) {
        warn!(errors = error.diagnostics().len(), "transpilation failed");
        return Err(error);
    }
    debug!(
        diagnostics = output.diagnostics.len(),
        output_bytes = output.output_text.len(),
        "transpiled"
    );
    Ok(output.output_text)
}

/// Lower-level entry point: always emits, and reports every diagnostic.
pub fn transpile_module(source: &str, options: &CompilerOptions) -> TranspileOutput {
    let parsed = parse_program(source);
    let mut diagnostics: Vec<Diagnostic> = parsed
        .errors
        .iter()
        .map(|error| Diagnostic::from_syntax_error(error, source))
        .collect();
    diagnostics.extend(lint::check_program(&parsed.program, source));

    let (output_text, emit_diagnostics) = emitter::emit_program(&parsed.program, source, options);
    diagnostics.extend(emit_diagnostics);

    TranspileOutput {
        output_text,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_fixed_configuration() {
        let options = CompilerOptions::default();
        assert_eq!(options.target, ScriptTarget::Es2015);
        assert!(!options.strict);
        assert!(options.es_module_interop);
        assert!(options.skip_lib_check);
        assert!(options.force_consistent_casing_in_file_names);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CompilerOptions = serde_json::from_str(r#"{"target": "es2022"}"#).unwrap();
        assert_eq!(options.target, ScriptTarget::Es2022);
        assert!(options.es_module_interop);
    }

    #[test]
    fn test_type_annotations_are_removed() {
        let output = transpile("const n: number = 1;\nfunction f(a: string): void {}").unwrap();
        assert_eq!(output, "const n = 1;\nfunction f(a) { }\n");
    }

    #[test]
    fn test_errors_block_output() {
        let error = transpile("let x = ;").unwrap_err();
        assert!(error.to_string().starts_with("TypeScript compilation errors:\nLine 1, Column 9:"));
    }

    #[test]
    fn test_module_output_keeps_warnings() {
        let output = transpile_module("function f() { return 1; f(); }", &CompilerOptions::default());
        assert!(!output.has_errors());
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].code, 7027);
    }
}
