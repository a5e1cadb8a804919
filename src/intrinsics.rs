// # Built-in Objects
//
// This module provides the standard library every program run sees: the
// global object, the constructors and prototypes behind literals, and the
// host facilities (`console`). A realm is created per interpreter and is
// never shared between runs.
//
// ## Module Structure
//
// - **`helpers`**: registration and argument helpers shared by all domains
// - **`object`**: `Object` and `Object.prototype`
// - **`function`**: `Function.prototype.call/apply/bind`
// - **`array`**: `Array` and its prototype methods
// - **`string`**: `String` and its prototype methods
// - **`number`**: `Number`, `Boolean`, `parseInt`, `parseFloat`, …
// - **`math`**: `Math`, with a seeded `random`
// - **`json`**: `JSON.stringify` / `JSON.parse`
// - **`error`**: the error constructors
// - **`regexp`**: `RegExp`, backed by the `regex` crate
// - **`collections`**: `Map` and `Set`
// - **`console`**: `console.*`, routed to the interpreter's output sink
// - **`global`**: `NaN`, `Infinity`, `undefined`, `globalThis`
//
// ## Design Principles
//
// - **Minimal Coupling**: each domain module depends only on `helpers` and
//   the interpreter's public operations
// - **Registration Order**: prototypes exist before any domain registers, so
//   domains may refer to each other's prototypes freely

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::runtime::object::{FunctionObject, NativeFunction};
use crate::runtime::{ErrorKind, Heap, Interpreter, JsObject, Obj, ObjectKind, Value};

pub mod array;
pub mod collections;
pub mod console;
pub mod error;
pub mod function;
pub mod global;
pub mod helpers;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod regexp;
pub mod string;

// ============================================================================
// REALM
// ============================================================================

/// The intrinsic objects of one interpreter.
pub struct Realm {
    pub global: Obj,
    pub object_prototype: Obj,
    pub function_prototype: Obj,
    pub array_prototype: Obj,
    pub string_prototype: Obj,
    pub number_prototype: Obj,
    pub boolean_prototype: Obj,
    pub regexp_prototype: Obj,
    pub map_prototype: Obj,
    pub set_prototype: Obj,
    error_prototypes: HashMap<ErrorKind, Obj>,
}

impl Realm {
    /// Empty prototypes wired into their chains; [`install`] fills them.
    pub fn new(heap: &Heap) -> Self {
        let object_prototype = heap.alloc(JsObject::new(None, ObjectKind::Ordinary));
        let ordinary = || heap.alloc(JsObject::new(Some(object_prototype.clone()), ObjectKind::Ordinary));

        let noop = NativeFunction {
            name: String::new(),
            call: Rc::new(|_, _, _| Ok(Value::Undefined)),
            construct: None,
        };
        let function_prototype = heap.alloc(JsObject::new(
            Some(object_prototype.clone()),
            ObjectKind::Function(FunctionObject::Native(noop)),
        ));

        let base_error = ordinary();
        let mut error_prototypes = HashMap::new();
        for kind in ErrorKind::ALL {
            let prototype = if kind == ErrorKind::Error {
                base_error.clone()
            } else {
                heap.alloc(JsObject::new(Some(base_error.clone()), ObjectKind::Ordinary))
            };
            error_prototypes.insert(kind, prototype);
        }

        Self {
            global: ordinary(),
            function_prototype,
            array_prototype: ordinary(),
            string_prototype: ordinary(),
            number_prototype: ordinary(),
            boolean_prototype: ordinary(),
            regexp_prototype: ordinary(),
            map_prototype: ordinary(),
            set_prototype: ordinary(),
            error_prototypes,
            object_prototype,
        }
    }

    pub fn error_prototype(&self, kind: ErrorKind) -> Obj {
        match self.error_prototypes.get(&kind) {
            Some(prototype) => prototype.clone(),
            None => self.object_prototype.clone(),
        }
    }
}

/// Register every built-in on the interpreter's realm.
pub fn install(interp: &mut Interpreter) {
    object::register(interp);
    function::register(interp);
    array::register(interp);
    string::register(interp);
    number::register(interp);
    math::register(interp);
    json::register(interp);
    error::register(interp);
    regexp::register(interp);
    collections::register(interp);
    console::register(interp);
    global::register(interp);
    trace!(
        globals = interp.realm.global.borrow().properties.len(),
        "intrinsics installed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InterpreterConfig, NullSink};

    #[test]
    fn test_error_prototypes_chain_to_error() {
        let heap = Heap::default();
        let realm = Realm::new(&heap);
        let base = realm.error_prototype(ErrorKind::Error);
        let type_error = realm.error_prototype(ErrorKind::TypeError);
        assert!(type_error.proto().is_some_and(|p| p.ptr_eq(&base)));
    }

    #[test]
    fn test_realms_are_independent() {
        let first = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        let second = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        first.global_object().set_own("leak", Value::Bool(true));
        assert!(second.global_object().own_data("leak").is_none());
    }
}
