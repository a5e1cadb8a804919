//! Shared helpers for the integration tests.

#![allow(dead_code)]

use codetrial::runtime::inspect::{inspect, Style};
use codetrial::runtime::{
    compile_for_execution, invoke, CaptureSink, ConsoleLine, Interpreter, InterpreterConfig, NullSink, Thrown,
};

/// Run `source` as a function body and render its completion.
///
/// Returned values use assertion-style inspection; exceptions render as
/// `threw <console inspection>`.
pub fn eval(source: &str) -> String {
    eval_with(source, InterpreterConfig::default())
}

pub fn eval_with(source: &str, config: InterpreterConfig) -> String {
    let invocable = compile_for_execution(source, &[]).unwrap_or_else(|e| panic!("{}: {}", source, e));
    let mut interp = Interpreter::new(config, Box::new(NullSink));
    render(invoke(&invocable, &mut interp, &[]))
}

/// Run `source` and return what it wrote to the console.
pub fn console_of(source: &str) -> Vec<ConsoleLine> {
    let invocable = compile_for_execution(source, &[]).unwrap_or_else(|e| panic!("{}: {}", source, e));
    let sink = CaptureSink::default();
    let mut interp = Interpreter::new(InterpreterConfig::default(), Box::new(sink.clone()));
    let _ = invoke(&invocable, &mut interp, &[]);
    sink.lines()
}

fn render(result: Result<codetrial::runtime::Value, Thrown>) -> String {
    match result {
        Ok(value) => inspect(&value, Style::Assertion),
        Err(Thrown::Exception(error)) => format!("threw {}", inspect(&error, Style::Console)),
        Err(Thrown::BudgetExceeded { budget }) => format!("budget {}", budget),
    }
}

/// A suite with one `it` per `(name, body)` pair, inside one `describe`.
pub fn suite_of(cases: &[(&str, &str)]) -> String {
    let mut suite = String::from("describe('suite', function () {\n");
    for (name, body) in cases {
        suite.push_str(&format!("  it('{}', function () {{ {} }});\n", name, body));
    }
    suite.push_str("});\n");
    suite
}
