//! Transpiler behavior through the public API.

use codetrial::diagnostics::Severity;
use codetrial::transpile::{transpile, transpile_module, transpile_with, CompilerOptions, ScriptTarget};
use codetrial::CompilationError;
use pretty_assertions::assert_eq;

#[test]
fn transpile_is_idempotent() {
    let source = "interface P { x: number }\nconst ps: P[] = [{ x: 1 }];\nconst total = ps.reduce((s, p) => s + p.x, 0);\n";
    assert_eq!(transpile(source).unwrap(), transpile(source).unwrap());
}

#[test]
fn type_only_declarations_disappear() {
    let source = "type Id = string | number;\ninterface Shape { area(): number }\ndeclare const env: any;\nlet id: Id = 1;";
    assert_eq!(transpile(source).unwrap(), "let id = 1;\n");
}

#[test]
fn two_syntax_errors_aggregate_into_one_error() {
    let error = transpile("let a = ;\nlet ok = 1;\nlet b = );\n").unwrap_err();
    let text = error.to_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "TypeScript compilation errors:");
    assert_eq!(lines.len(), 3, "{}", text);
    assert!(lines[1].starts_with("Line 1, Column 9: "), "{}", lines[1]);
    assert!(lines[2].starts_with("Line 3, Column 9: "), "{}", lines[2]);
    assert_eq!(error.diagnostics().len(), 2);
}

#[test]
fn warnings_do_not_block_output() {
    let source = "function f(): number {\n  return 1;\n  console.log('never');\n}";
    let output = transpile(source).unwrap();
    assert!(output.starts_with("function f() {"), "{}", output);

    let module = transpile_module(source, &CompilerOptions::default());
    assert_eq!(module.diagnostics.len(), 1);
    assert_eq!(module.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn columns_count_utf16_units() {
    let error = transpile("const s = '😀'; let x = ;").unwrap_err();
    let diagnostic = &error.diagnostics()[0];
    let location = diagnostic.location.unwrap();
    assert_eq!(location.line, 1);
    // The emoji is one char but two UTF-16 code units.
    assert_eq!(location.column, 25);
}

#[test]
fn try_without_handler_is_an_error() {
    let error = transpile("try { risky(); }").unwrap_err();
    assert!(error.to_string().contains("'catch' or 'finally' expected."));
}

#[test]
fn value_imports_are_rejected() {
    assert!(transpile("import fs from 'fs';").is_err());
    assert!(transpile("import type { A } from './a';\nconst x = 1;").is_ok());
}

#[test]
fn target_controls_lowering() {
    let source = "const v = a ** 2;";
    assert_eq!(transpile(source).unwrap(), "const v = Math.pow(a, 2);\n");
    let modern = transpile_with(source, &CompilerOptions::with_target(ScriptTarget::Es2022)).unwrap();
    assert_eq!(modern, "const v = a ** 2;\n");
}

#[test]
fn parameter_properties_become_assignments() {
    let source = "class Point {\n  constructor(public x: number, private readonly y: number) {}\n}";
    assert_eq!(
        transpile(source).unwrap(),
        "class Point {\n    constructor(x, y) {\n        this.x = x;\n        this.y = y;\n    }\n}\n"
    );
}

#[test]
fn compilation_error_is_a_miette_diagnostic() {
    let error = transpile("let x = ;").unwrap_err();
    let report = miette::Report::new(error);
    let rendered = format!("{:?}", report);
    assert!(rendered.contains("codetrial::compile"), "{}", rendered);
}

#[test]
fn internal_errors_use_the_failure_prefix() {
    let error = CompilationError::internal("boom");
    assert_eq!(error.to_string(), "Failed to transpile TypeScript: boom");
    assert!(error.diagnostics().is_empty());
}

#[test]
fn roman_starter_code_transpiles() {
    let challenge = codetrial::challenge::builtin().unwrap();
    let output = transpile(&challenge.starter_code).unwrap();
    assert!(output.contains("function convertRomanToDecimal(roman) {"), "{}", output);
}

#[test]
fn optional_chaining_is_lowered_for_es2015() {
    let source = "const o: any = { a: { b: 1 } };\nfunction f() { return o?.a?.b; }";
    assert_eq!(
        transpile(source).unwrap(),
        "const o = { a: { b: 1 } };\nfunction f() {\n    var _a;\n    return (_a = o === null || o === void 0 ? void 0 : o.a) === null || _a === void 0 ? void 0 : _a.b;\n}\n"
    );
}

#[test]
fn type_mismatches_are_not_checked() {
    assert_eq!(transpile("let x: number = 'str';").unwrap(), "let x = 'str';\n");
}

#[test]
fn excessive_nesting_has_its_own_diagnostic() {
    let depth = 300;
    let source = format!("const v = {}0{};", "[".repeat(depth), "]".repeat(depth));
    let error = transpile(&source).unwrap_err();
    assert_eq!(error.diagnostics().len(), 1);
    assert_eq!(
        error.to_string(),
        "TypeScript compilation errors:\nLine 1, Column 139: Brackets are nested too deeply (more than 128 levels)"
    );
}
