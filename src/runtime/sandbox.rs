//! Compile-then-invoke boundary.
//!
//! A program text is compiled once into an [`Invocable`] whose free
//! parameters are the bindings the embedder chooses to expose (`describe`,
//! `it`, `assert`, …). Invoking it runs the program as the body of a
//! function taking those parameters, in a fresh scope below the realm's
//! global scope, with `this` undefined.

use std::rc::Rc;

use tracing::debug;

use crate::diagnostics::{ExecutionSetupError, Location};
use crate::runtime::eval::Flow;
use crate::runtime::scope::THIS;
use crate::runtime::{Interpreter, Thrown, Value};
use crate::syntax::{parse_program, Program};

/// A parsed program waiting for its bindings.
#[derive(Clone, Debug)]
pub struct Invocable {
    program: Rc<Program>,
    params: Vec<String>,
}

impl Invocable {
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

/// Parse `text` for later execution with `allowed_bindings` in scope.
pub fn compile_for_execution(
    text: &str,
    allowed_bindings: &[&str],
) -> Result<Invocable, ExecutionSetupError> {
    let parsed = parse_program(text);
    if let Some(error) = parsed.errors.first() {
        debug!(code = error.code, "executable text failed to parse");
        return Err(ExecutionSetupError::Syntax {
            message: error.message.clone(),
            location: Some(Location::of_offset(text, error.span.start)),
        });
    }
    Ok(Invocable {
        program: Rc::new(parsed.program),
        params: allowed_bindings.iter().map(|name| name.to_string()).collect(),
    })
}

/// Run `invocable` with `args` bound positionally to its parameters.
/// Missing arguments are `undefined`.
pub fn invoke(
    invocable: &Invocable,
    interpreter: &mut Interpreter,
    args: &[Value],
) -> Result<Value, Thrown> {
    let env = interpreter.global_env().child();
    env.declare(THIS, Some(Value::Undefined), false);
    for (index, name) in invocable.params.iter().enumerate() {
        env.declare(name, Some(args.get(index).cloned().unwrap_or_default()), true);
    }
    let body = &invocable.program.body;
    interpreter.instantiate_body(body, &env);
    match interpreter.exec_block(body, &env)? {
        Flow::Return(value) => Ok(value),
        _ => Ok(Value::Undefined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InterpreterConfig, NullSink};

    #[test]
    fn test_bindings_are_parameters() {
        let invocable = compile_for_execution("return a + b;", &["a", "b"]).unwrap();
        let mut interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        let result = invoke(&invocable, &mut interp, &[Value::Number(2.0), Value::Number(3.0)]).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 5.0));
    }

    #[test]
    fn test_missing_arguments_are_undefined() {
        let invocable = compile_for_execution("return typeof a;", &["a"]).unwrap();
        let mut interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        let result = invoke(&invocable, &mut interp, &[]).unwrap();
        assert!(matches!(result, Value::String(s) if &*s == "undefined"));
    }

    #[test]
    fn test_syntax_error_reports_location() {
        let error = compile_for_execution("let x = ;", &[]).unwrap_err();
        match error {
            ExecutionSetupError::Syntax { location, .. } => {
                assert_eq!(location.map(|l| l.line), Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
