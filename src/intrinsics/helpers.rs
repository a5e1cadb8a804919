//! # Intrinsic Helper Infrastructure
//!
//! Registration and argument handling shared by every built-in domain.

use std::rc::Rc;

use crate::runtime::inspect::describe_for_error;
use crate::runtime::object::{FunctionObject, NativeFn, NativeFunction, Property};
use crate::runtime::{Interpreter, Obj, Thrown, Value};

// ============================================================================
// TYPE ALIASES
// ============================================================================

pub type NativeResult = Result<Value, Thrown>;

/// Signature every built-in function is written against.
pub type NativeFnPtr = fn(&mut Interpreter, &Value, &[Value]) -> NativeResult;

// ============================================================================
// REGISTRATION
// ============================================================================

/// A built-in function object.
pub fn native(
    interp: &Interpreter,
    name: &str,
    length: usize,
    call: NativeFnPtr,
    construct: Option<NativeFnPtr>,
) -> Obj {
    let call: NativeFn = Rc::new(call);
    let construct = construct.map(|f| -> NativeFn { Rc::new(f) });
    interp.create_function(
        FunctionObject::Native(NativeFunction {
            name: name.to_string(),
            call,
            construct,
        }),
        name,
        length,
    )
}

/// Install a non-enumerable method on `target`.
pub fn method(interp: &Interpreter, target: &Obj, name: &str, length: usize, call: NativeFnPtr) {
    let function = native(interp, name, length, call, None);
    target.set_hidden(name, Value::Object(function));
}

/// Install a non-enumerable getter on `target`.
pub fn getter(interp: &mut Interpreter, target: &Obj, name: &str, call: NativeFnPtr) {
    let function = native(interp, &format!("get {}", name), 0, call, None);
    interp.define_accessor(target, name, Some(function), None, false);
}

/// Create a global constructor wired to `prototype`.
pub fn constructor(
    interp: &Interpreter,
    name: &str,
    length: usize,
    prototype: &Obj,
    call: NativeFnPtr,
    construct: Option<NativeFnPtr>,
) -> Obj {
    let function = native(interp, name, length, call, construct);
    function.borrow_mut().properties.insert(
        "prototype".to_string(),
        Property::readonly(Value::Object(prototype.clone())),
    );
    prototype.set_hidden("constructor", Value::Object(function.clone()));
    interp.realm.global.set_hidden(name, Value::Object(function.clone()));
    function
}

/// A plain namespace object (`Math`, `JSON`, `console`) bound globally.
pub fn namespace(interp: &Interpreter, name: &str) -> Obj {
    let object = interp.new_object();
    interp.realm.global.set_hidden(name, Value::Object(object.clone()));
    object
}

// ============================================================================
// ARGUMENTS
// ============================================================================

/// Argument `index`, or `undefined` when absent.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Argument `index` as a number, `NaN` when absent.
pub fn number_arg(interp: &mut Interpreter, args: &[Value], index: usize) -> Result<f64, Thrown> {
    interp.to_number(&arg(args, index))
}

/// Argument `index` as a string.
pub fn string_arg(interp: &mut Interpreter, args: &[Value], index: usize) -> Result<String, Thrown> {
    interp.to_string(&arg(args, index))
}

/// Argument `index` as a callback; throws `x is not a function` otherwise.
pub fn callback_arg(interp: &Interpreter, args: &[Value], index: usize) -> Result<Value, Thrown> {
    let value = arg(args, index);
    if value.is_callable() {
        Ok(value)
    } else {
        Err(interp.type_error(format!("{} is not a function", describe_for_error(&value))))
    }
}

/// `this` as an object, for methods that require one.
pub fn this_object(interp: &Interpreter, this: &Value, method: &str) -> Result<Obj, Thrown> {
    match this {
        Value::Object(object) => Ok(object.clone()),
        other => Err(interp.type_error(format!(
            "{} called on non-object {}",
            method,
            describe_for_error(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InterpreterConfig, NullSink};

    #[test]
    fn test_arg_defaults_to_undefined() {
        assert!(matches!(arg(&[], 3), Value::Undefined));
    }

    #[test]
    fn test_callback_arg_rejects_values() {
        let interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        assert!(callback_arg(&interp, &[Value::Number(1.0)], 0).is_err());
    }
}
