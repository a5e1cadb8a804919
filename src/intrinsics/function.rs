//! # Function
//!
//! ## Members Provided
//!
//! - **Constructor**: `Function` (dynamic code is refused)
//! - **Prototype**: `call`, `apply`, `bind`, `toString`

use crate::intrinsics::helpers::{arg, constructor, method, NativeResult};
use crate::runtime::inspect::function_name;
use crate::runtime::object::{BoundFunction, FunctionObject, ObjectKind};
use crate::runtime::{ErrorKind, Interpreter, Value};

pub fn register(interp: &mut Interpreter) {
    let prototype = interp.realm.function_prototype.clone();
    constructor(interp, "Function", 1, &prototype, function_call, Some(function_call));

    method(interp, &prototype, "call", 1, proto_call);
    method(interp, &prototype, "apply", 2, proto_apply);
    method(interp, &prototype, "bind", 1, proto_bind);
    method(interp, &prototype, "toString", 0, proto_to_string);
}

fn function_call(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> NativeResult {
    Err(interp.throw(
        ErrorKind::Error,
        "Code generation from strings disallowed for this context",
    ))
}

fn proto_call(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let rest = args.get(1..).unwrap_or_default();
    interp.call(this, arg(args, 0), rest)
}

fn proto_apply(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let list = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(object) if object.is_array() => interp.iterate(&Value::Object(object))?,
        Value::Object(object) => {
            let value = Value::Object(object);
            let length = interp.get_property(&value, "length")?;
            let length = interp.to_number(&length)?;
            let mut items = Vec::new();
            for index in 0..(length.max(0.0) as usize) {
                items.push(interp.get_property(&value, &index.to_string())?);
            }
            items
        }
        _ => return Err(interp.type_error("CreateListFromArrayLike called on non-object")),
    };
    interp.call(this, arg(args, 0), &list)
}

fn proto_bind(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let Value::Object(target) = this else {
        return Err(interp.type_error("Bind must be called on a function"));
    };
    if !target.is_callable() {
        return Err(interp.type_error("Bind must be called on a function"));
    }
    let bound_args = args.get(1..).unwrap_or_default().to_vec();
    let length = match target.own_data("length") {
        Some(Value::Number(n)) => (n as usize).saturating_sub(bound_args.len()),
        _ => 0,
    };
    let name = format!("bound {}", function_name(target));
    let bound = interp.create_function(
        FunctionObject::Bound(BoundFunction {
            target: target.clone(),
            this: arg(args, 0),
            args: bound_args,
        }),
        &name,
        length,
    );
    Ok(Value::Object(bound))
}

fn proto_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let Value::Object(object) = this else {
        return Err(interp.type_error("Function.prototype.toString requires that 'this' be a Function"));
    };
    let text = match &object.borrow().kind {
        ObjectKind::Function(FunctionObject::Closure(closure)) if closure.class.is_some() => {
            format!("class {} {{ }}", function_name(object))
        }
        ObjectKind::Function(_) => format!("function {}() {{ [native code] }}", function_name(object)),
        _ => {
            return Err(interp.type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            ))
        }
    };
    Ok(Value::from(text))
}
