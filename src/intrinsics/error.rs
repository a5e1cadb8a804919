//! # Errors
//!
//! ## Members Provided
//!
//! - **Constructors**: `Error`, `TypeError`, `RangeError`, `ReferenceError`,
//!   `SyntaxError` (callable with or without `new`)
//! - **Prototype**: `name`, `message`, `toString`
//!
//! `AssertionError` has a prototype (for `name`) but no global constructor;
//! only the assertion library creates those.

use crate::intrinsics::helpers::{arg, constructor, method, NativeFnPtr, NativeResult};
use crate::runtime::object::Property;
use crate::runtime::{ErrorKind, Interpreter, JsObject, ObjectKind, Value};

pub fn register(interp: &mut Interpreter) {
    for kind in ErrorKind::ALL {
        let prototype = interp.realm.error_prototype(kind);
        prototype.set_hidden("name", Value::from(kind.name()));
        prototype.set_hidden("message", Value::from(""));

        let create: Option<NativeFnPtr> = match kind {
            ErrorKind::Error => Some(create_error),
            ErrorKind::TypeError => Some(create_type_error),
            ErrorKind::RangeError => Some(create_range_error),
            ErrorKind::ReferenceError => Some(create_reference_error),
            ErrorKind::SyntaxError => Some(create_syntax_error),
            ErrorKind::AssertionError => None,
        };
        if let Some(create) = create {
            let function = constructor(interp, kind.name(), 1, &prototype, create, Some(create));
            if kind != ErrorKind::Error {
                // `TypeError.__proto__ === Error`
                let base = interp.realm.global.own_data("Error");
                if let Some(Value::Object(base)) = base {
                    function.borrow_mut().proto = Some(base);
                }
            }
        }
    }

    let base = interp.realm.error_prototype(ErrorKind::Error);
    method(interp, &base, "toString", 0, proto_to_string);
}

/// A fresh error object of `kind`, with `message` only when one was given.
fn create(interp: &mut Interpreter, kind: ErrorKind, args: &[Value]) -> NativeResult {
    let object = interp.alloc(JsObject::new(
        Some(interp.realm.error_prototype(kind)),
        ObjectKind::Error,
    ));
    let message = arg(args, 0);
    if !matches!(message, Value::Undefined) {
        let message = interp.to_string(&message)?;
        object.set_hidden("message", Value::from(message));
    }
    if let Value::Object(options) = arg(args, 1) {
        if crate::runtime::property::has_own_property(&Value::Object(options.clone()), "cause") {
            let cause = interp.get_property(&Value::Object(options), "cause")?;
            object.set_hidden("cause", cause);
        }
    }
    let name = kind.name();
    let text = match object.own_data("message") {
        Some(Value::String(m)) if !m.is_empty() => format!("{}: {}", name, m),
        _ => name.to_string(),
    };
    object
        .borrow_mut()
        .properties
        .insert("stack".to_string(), Property::hidden(Value::from(format!("{}\n    at <anonymous>", text))));
    Ok(Value::Object(object))
}

fn create_error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    create(interp, ErrorKind::Error, args)
}

fn create_type_error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    create(interp, ErrorKind::TypeError, args)
}

fn create_range_error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    create(interp, ErrorKind::RangeError, args)
}

fn create_reference_error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    create(interp, ErrorKind::ReferenceError, args)
}

fn create_syntax_error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    create(interp, ErrorKind::SyntaxError, args)
}

fn proto_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    if !matches!(this, Value::Object(_)) {
        return Err(interp.type_error("Error.prototype.toString requires that 'this' be an Object"));
    }
    let name = match interp.get_property(this, "name")? {
        Value::Undefined => "Error".to_string(),
        other => interp.to_string(&other)?,
    };
    let message = match interp.get_property(this, "message")? {
        Value::Undefined => String::new(),
        other => interp.to_string(&other)?,
    };
    Ok(Value::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    }))
}
