//! # Object
//!
//! ## Members Provided
//!
//! - **Constructor**: `Object(value)`
//! - **Statics**: `keys`, `values`, `entries`, `assign`, `freeze`,
//!   `isFrozen`, `create`, `getPrototypeOf`, `setPrototypeOf`,
//!   `defineProperty`, `getOwnPropertyNames`, `fromEntries`, `is`
//! - **Prototype**: `hasOwnProperty`, `isPrototypeOf`,
//!   `propertyIsEnumerable`, `toString`, `toLocaleString`, `valueOf`

use crate::intrinsics::helpers::{arg, constructor, method, this_object, NativeResult};
use crate::runtime::inspect::describe_for_error;
use crate::runtime::object::{array_index, ObjectKind, Property, Slot};
use crate::runtime::property::has_own_property;
use crate::runtime::{Interpreter, JsObject, Obj, Value};

pub fn register(interp: &mut Interpreter) {
    let prototype = interp.realm.object_prototype.clone();
    let object = constructor(interp, "Object", 1, &prototype, object_call, Some(object_call));

    method(interp, &object, "keys", 1, object_keys);
    method(interp, &object, "values", 1, object_values);
    method(interp, &object, "entries", 1, object_entries);
    method(interp, &object, "assign", 2, object_assign);
    method(interp, &object, "freeze", 1, object_freeze);
    method(interp, &object, "isFrozen", 1, object_is_frozen);
    method(interp, &object, "create", 2, object_create);
    method(interp, &object, "getPrototypeOf", 1, object_get_prototype_of);
    method(interp, &object, "setPrototypeOf", 2, object_set_prototype_of);
    method(interp, &object, "defineProperty", 3, object_define_property);
    method(interp, &object, "getOwnPropertyNames", 1, object_get_own_property_names);
    method(interp, &object, "fromEntries", 1, object_from_entries);
    method(interp, &object, "is", 2, object_is);

    method(interp, &prototype, "hasOwnProperty", 1, proto_has_own_property);
    method(interp, &prototype, "isPrototypeOf", 1, proto_is_prototype_of);
    method(interp, &prototype, "propertyIsEnumerable", 1, proto_property_is_enumerable);
    method(interp, &prototype, "toString", 0, proto_to_string);
    method(interp, &prototype, "toLocaleString", 0, proto_to_string);
    method(interp, &prototype, "valueOf", 0, proto_value_of);
}

/// `Object.prototype.toString` tag for any value.
pub fn object_tag(value: &Value) -> String {
    let class = match value {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Object(object) => object.borrow().kind.class_name(),
    };
    format!("[object {}]", class)
}

fn require_object_coercible(interp: &Interpreter, value: &Value) -> Result<(), crate::runtime::Thrown> {
    if value.is_nullish() {
        return Err(interp.type_error("Cannot convert undefined or null to object"));
    }
    Ok(())
}

// ============================================================================
// CONSTRUCTOR AND STATICS
// ============================================================================

fn object_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    match arg(args, 0) {
        Value::Undefined | Value::Null => Ok(Value::Object(interp.new_object())),
        other => Ok(other),
    }
}

fn object_keys(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    require_object_coercible(interp, &target)?;
    let keys = interp.own_keys(&target).into_iter().map(Value::from).collect();
    Ok(interp.new_array(keys))
}

fn object_values(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    require_object_coercible(interp, &target)?;
    let mut values = Vec::new();
    for key in interp.own_keys(&target) {
        values.push(interp.get_property(&target, &key)?);
    }
    Ok(interp.new_array(values))
}

fn object_entries(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    require_object_coercible(interp, &target)?;
    let mut entries = Vec::new();
    for key in interp.own_keys(&target) {
        let value = interp.get_property(&target, &key)?;
        entries.push(interp.new_array(vec![Value::from(key), value]));
    }
    Ok(interp.new_array(entries))
}

fn object_assign(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    require_object_coercible(interp, &target)?;
    let Value::Object(object) = &target else {
        return Ok(target);
    };
    for source in args.iter().skip(1) {
        for key in interp.own_keys(source) {
            let value = interp.get_property(source, &key)?;
            interp.set_property(&target, &key, value)?;
        }
    }
    Ok(Value::Object(object.clone()))
}

fn object_freeze(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    if let Value::Object(object) = &target {
        object.borrow_mut().freeze();
    }
    Ok(target)
}

fn object_is_frozen(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(match arg(args, 0) {
        Value::Object(object) => object.borrow().is_frozen(),
        _ => true,
    }))
}

fn object_create(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let proto = match arg(args, 0) {
        Value::Object(proto) => Some(proto),
        Value::Null => None,
        other => {
            return Err(interp.type_error(format!(
                "Object prototype may only be an Object or null: {}",
                describe_for_error(&other)
            )))
        }
    };
    let object = interp.alloc(JsObject::new(proto, ObjectKind::Ordinary));
    if let Value::Object(descriptors) = arg(args, 1) {
        for key in interp.own_keys(&Value::Object(descriptors.clone())) {
            let descriptor = interp.get_from(&descriptors, &key, &Value::Object(descriptors.clone()))?;
            define_from_descriptor(interp, &object, &key, &descriptor)?;
        }
    }
    Ok(Value::Object(object))
}

fn object_get_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    require_object_coercible(interp, &target)?;
    Ok(match &target {
        Value::Object(object) => object.proto().map(Value::Object).unwrap_or(Value::Null),
        Value::String(_) => Value::Object(interp.realm.string_prototype.clone()),
        Value::Number(_) => Value::Object(interp.realm.number_prototype.clone()),
        Value::Bool(_) => Value::Object(interp.realm.boolean_prototype.clone()),
        _ => Value::Null,
    })
}

fn object_set_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    require_object_coercible(interp, &target)?;
    let proto = match arg(args, 1) {
        Value::Object(proto) => Some(proto),
        Value::Null => None,
        other => {
            return Err(interp.type_error(format!(
                "Object prototype may only be an Object or null: {}",
                describe_for_error(&other)
            )))
        }
    };
    if let Value::Object(object) = &target {
        if proto.as_ref().is_some_and(|p| p.ptr_eq(object) || p.inherits_from(object)) {
            return Err(interp.type_error("Cyclic __proto__ value"));
        }
        object.borrow_mut().proto = proto;
    }
    Ok(target)
}

fn object_define_property(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    let Value::Object(object) = &target else {
        return Err(interp.type_error("Object.defineProperty called on non-object"));
    };
    let key = interp.to_property_key(&arg(args, 1))?;
    let descriptor = arg(args, 2);
    if !matches!(descriptor, Value::Object(_)) {
        return Err(interp.type_error(format!(
            "Property description must be an object: {}",
            describe_for_error(&descriptor)
        )));
    }
    define_from_descriptor(interp, object, &key, &descriptor)?;
    Ok(target)
}

/// Apply a property descriptor object; absent attributes default to false.
fn define_from_descriptor(
    interp: &mut Interpreter,
    object: &Obj,
    key: &str,
    descriptor: &Value,
) -> Result<(), crate::runtime::Thrown> {
    let flag = |interp: &mut Interpreter, name: &str| -> Result<bool, crate::runtime::Thrown> {
        Ok(interp.get_property(descriptor, name)?.truthy())
    };
    let enumerable = flag(interp, "enumerable")?;
    let getter = interp.get_property(descriptor, "get")?;
    let setter = interp.get_property(descriptor, "set")?;
    if getter.is_callable() || setter.is_callable() {
        interp.define_accessor(
            object,
            key,
            getter.as_object().cloned(),
            setter.as_object().cloned(),
            enumerable,
        );
        return Ok(());
    }
    let value = interp.get_property(descriptor, "value")?;
    let writable = flag(interp, "writable")?;
    let configurable = flag(interp, "configurable")?;
    if array_index(key).is_some() && object.is_array() {
        interp.define_own(object, key, value);
        return Ok(());
    }
    object.borrow_mut().properties.insert(
        key.to_string(),
        Property {
            slot: Slot::Data(value),
            enumerable,
            writable,
            configurable,
        },
    );
    Ok(())
}

fn object_get_own_property_names(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let target = arg(args, 0);
    require_object_coercible(interp, &target)?;
    let mut names = Vec::new();
    if let Value::Object(object) = &target {
        let borrowed = object.borrow();
        if let ObjectKind::Array(items) = &borrowed.kind {
            names.extend((0..items.len()).map(|i| i.to_string()));
            names.push("length".to_string());
        }
        names.extend(borrowed.properties.keys());
    } else {
        names = interp.own_keys(&target);
    }
    Ok(interp.new_array(names.into_iter().map(Value::from).collect()))
}

fn object_from_entries(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let entries = interp.iterate(&arg(args, 0))?;
    let object = interp.new_object();
    for entry in entries {
        let key = interp.get_property(&entry, "0")?;
        let key = interp.to_property_key(&key)?;
        let value = interp.get_property(&entry, "1")?;
        interp.define_own(&object, &key, value);
    }
    Ok(Value::Object(object))
}

fn object_is(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(arg(args, 0).same_value(&arg(args, 1))))
}

// ============================================================================
// PROTOTYPE
// ============================================================================

fn proto_has_own_property(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let key = interp.to_property_key(&arg(args, 0))?;
    require_object_coercible(interp, this)?;
    Ok(Value::Bool(has_own_property(this, &key)))
}

fn proto_is_prototype_of(_interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(match (this, arg(args, 0)) {
        (Value::Object(proto), Value::Object(object)) => object.inherits_from(proto),
        _ => false,
    }))
}

fn proto_property_is_enumerable(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let key = interp.to_property_key(&arg(args, 0))?;
    let object = this_object(interp, this, "Object.prototype.propertyIsEnumerable")?;
    let borrowed = object.borrow();
    let enumerable = match &borrowed.kind {
        ObjectKind::Array(items) if array_index(&key).is_some_and(|i| (i as usize) < items.len()) => true,
        _ => borrowed.properties.get(&key).is_some_and(|p| p.enumerable),
    };
    Ok(Value::Bool(enumerable))
}

fn proto_to_string(_interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    Ok(Value::from(object_tag(this)))
}

fn proto_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    require_object_coercible(interp, this)?;
    Ok(this.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_tag() {
        assert_eq!(object_tag(&Value::Null), "[object Null]");
        assert_eq!(object_tag(&Value::Number(1.0)), "[object Number]");
    }
}
