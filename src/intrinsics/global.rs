//! # Global Values
//!
//! ## Members Provided
//!
//! - **`NaN`**, **`Infinity`**, **`undefined`**: read-only
//! - **`globalThis`**: the global object itself

use crate::runtime::object::Property;
use crate::runtime::{Interpreter, Value};

pub fn register(interp: &mut Interpreter) {
    let global = interp.realm.global.clone();
    let constants = [
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("undefined", Value::Undefined),
    ];
    let mut borrowed = global.borrow_mut();
    for (name, value) in constants {
        borrowed
            .properties
            .insert(name.to_string(), Property::readonly(value));
    }
    borrowed
        .properties
        .insert("globalThis".to_string(), Property::hidden(Value::Object(global.clone())));
}
