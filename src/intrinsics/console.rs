//! # Console
//!
//! Output goes to the interpreter's sink; nothing is written to the host's
//! stdout directly.
//!
//! ## Members Provided
//!
//! - **`console.log`**, **`console.info`**, **`console.debug`** (log level)
//! - **`console.warn`**, **`console.error`**

use crate::intrinsics::helpers::{method, namespace, NativeResult};
use crate::runtime::inspect::console_text;
use crate::runtime::{ConsoleLevel, Interpreter, Value};

pub fn register(interp: &mut Interpreter) {
    let console = namespace(interp, "console");
    method(interp, &console, "log", 0, console_log);
    method(interp, &console, "debug", 0, console_log);
    method(interp, &console, "info", 0, console_info);
    method(interp, &console, "warn", 0, console_warn);
    method(interp, &console, "error", 0, console_error);
}

/// Arguments rendered the way `console.log` joins them.
pub fn format_args(args: &[Value]) -> String {
    args.iter().map(console_text).collect::<Vec<_>>().join(" ")
}

fn write(interp: &mut Interpreter, level: ConsoleLevel, args: &[Value]) -> NativeResult {
    let text = format_args(args);
    interp.emit(level, &text);
    Ok(Value::Undefined)
}

fn console_log(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    write(interp, ConsoleLevel::Log, args)
}

fn console_info(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    write(interp, ConsoleLevel::Info, args)
}

fn console_warn(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    write(interp, ConsoleLevel::Warn, args)
}

fn console_error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    write(interp, ConsoleLevel::Error, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_args_joins_with_spaces() {
        let args = [Value::from("total:"), Value::Number(3.0), Value::Bool(true)];
        assert_eq!(format_args(&args), "total: 3 true");
    }
}
