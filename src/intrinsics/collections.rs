//! # Map and Set
//!
//! Both keep entries in insertion order and compare keys with
//! SameValueZero. Iteration methods return arrays.
//!
//! ## Members Provided
//!
//! - **Map**: `new Map(entries?)`, `get`, `set`, `has`, `delete`, `clear`,
//!   `size`, `forEach`, `keys`, `values`, `entries`
//! - **Set**: `new Set(values?)`, `add`, `has`, `delete`, `clear`, `size`,
//!   `forEach`, `keys`, `values`, `entries`

use crate::intrinsics::helpers::{arg, callback_arg, constructor, getter, method, NativeResult};
use crate::runtime::inspect::describe_for_error;
use crate::runtime::{Interpreter, JsObject, Obj, ObjectKind, Thrown, Value};

pub fn register(interp: &mut Interpreter) {
    let map_prototype = interp.realm.map_prototype.clone();
    constructor(interp, "Map", 0, &map_prototype, map_call, Some(map_construct));
    method(interp, &map_prototype, "get", 1, map_get);
    method(interp, &map_prototype, "set", 2, map_set);
    method(interp, &map_prototype, "has", 1, map_has);
    method(interp, &map_prototype, "delete", 1, map_delete);
    method(interp, &map_prototype, "clear", 0, map_clear);
    method(interp, &map_prototype, "forEach", 1, map_for_each);
    method(interp, &map_prototype, "keys", 0, map_keys);
    method(interp, &map_prototype, "values", 0, map_values);
    method(interp, &map_prototype, "entries", 0, map_entries);
    getter(interp, &map_prototype, "size", map_size);

    let set_prototype = interp.realm.set_prototype.clone();
    constructor(interp, "Set", 0, &set_prototype, set_call, Some(set_construct));
    method(interp, &set_prototype, "add", 1, set_add);
    method(interp, &set_prototype, "has", 1, set_has);
    method(interp, &set_prototype, "delete", 1, set_delete);
    method(interp, &set_prototype, "clear", 0, set_clear);
    method(interp, &set_prototype, "forEach", 1, set_for_each);
    method(interp, &set_prototype, "keys", 0, set_values);
    method(interp, &set_prototype, "values", 0, set_values);
    method(interp, &set_prototype, "entries", 0, set_entries);
    getter(interp, &set_prototype, "size", set_size);
}

// ============================================================================
// MAP
// ============================================================================

fn map_call(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> NativeResult {
    Err(interp.type_error("Constructor Map requires 'new'"))
}

fn map_construct(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let map = interp.alloc(JsObject::new(
        Some(interp.realm.map_prototype.clone()),
        ObjectKind::Map(Vec::new()),
    ));
    let source = arg(args, 0);
    if !source.is_nullish() {
        for entry in interp.iterate(&source)? {
            if !matches!(entry, Value::Object(_)) {
                return Err(interp.type_error(format!(
                    "Iterator value {} is not an entry object",
                    describe_for_error(&entry)
                )));
            }
            let key = interp.get_property(&entry, "0")?;
            let value = interp.get_property(&entry, "1")?;
            insert_entry(&map, key, value);
        }
    }
    Ok(Value::Object(map))
}

fn this_map(interp: &Interpreter, this: &Value, name: &str) -> Result<Obj, Thrown> {
    match this {
        Value::Object(object) if matches!(object.borrow().kind, ObjectKind::Map(_)) => Ok(object.clone()),
        other => Err(interp.type_error(format!(
            "Method Map.prototype.{} called on incompatible receiver {}",
            name,
            describe_for_error(other)
        ))),
    }
}

fn map_entries_of(map: &Obj) -> Vec<(Value, Value)> {
    match &map.borrow().kind {
        ObjectKind::Map(entries) => entries.clone(),
        _ => Vec::new(),
    }
}

/// -0 keys are stored as +0.
fn normalize_key(key: Value) -> Value {
    match key {
        Value::Number(n) if n == 0.0 => Value::Number(0.0),
        other => other,
    }
}

fn insert_entry(map: &Obj, key: Value, value: Value) {
    let key = normalize_key(key);
    if let ObjectKind::Map(entries) = &mut map.borrow_mut().kind {
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }
}

fn map_get(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "get")?;
    let key = arg(args, 0);
    let found = map_entries_of(&map)
        .into_iter()
        .find(|(k, _)| k.same_value_zero(&key))
        .map(|(_, v)| v);
    Ok(found.unwrap_or_default())
}

fn map_set(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "set")?;
    insert_entry(&map, arg(args, 0), arg(args, 1));
    Ok(this.clone())
}

fn map_has(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "has")?;
    let key = arg(args, 0);
    Ok(Value::Bool(map_entries_of(&map).iter().any(|(k, _)| k.same_value_zero(&key))))
}

fn map_delete(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "delete")?;
    let key = arg(args, 0);
    let mut borrowed = map.borrow_mut();
    let ObjectKind::Map(entries) = &mut borrowed.kind else {
        return Ok(Value::Bool(false));
    };
    let before = entries.len();
    entries.retain(|(k, _)| !k.same_value_zero(&key));
    Ok(Value::Bool(entries.len() != before))
}

fn map_clear(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "clear")?;
    if let ObjectKind::Map(entries) = &mut map.borrow_mut().kind {
        entries.clear();
    }
    Ok(Value::Undefined)
}

fn map_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "forEach")?;
    let callback = callback_arg(interp, args, 0)?;
    let this_arg = arg(args, 1);
    for (key, value) in map_entries_of(&map) {
        interp.call(&callback, this_arg.clone(), &[value, key, this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn map_keys(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "keys")?;
    let keys = map_entries_of(&map).into_iter().map(|(k, _)| k).collect();
    Ok(interp.new_array(keys))
}

fn map_values(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "values")?;
    let values = map_entries_of(&map).into_iter().map(|(_, v)| v).collect();
    Ok(interp.new_array(values))
}

fn map_entries(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "entries")?;
    let pairs = map_entries_of(&map)
        .into_iter()
        .map(|(k, v)| interp.new_array(vec![k, v]))
        .collect();
    Ok(interp.new_array(pairs))
}

fn map_size(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let map = this_map(interp, this, "size")?;
    Ok(Value::from(map_entries_of(&map).len()))
}

// ============================================================================
// SET
// ============================================================================

fn set_call(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> NativeResult {
    Err(interp.type_error("Constructor Set requires 'new'"))
}

fn set_construct(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let set = interp.alloc(JsObject::new(
        Some(interp.realm.set_prototype.clone()),
        ObjectKind::Set(Vec::new()),
    ));
    let source = arg(args, 0);
    if !source.is_nullish() {
        for item in interp.iterate(&source)? {
            insert_item(&set, item);
        }
    }
    Ok(Value::Object(set))
}

fn this_set(interp: &Interpreter, this: &Value, name: &str) -> Result<Obj, Thrown> {
    match this {
        Value::Object(object) if matches!(object.borrow().kind, ObjectKind::Set(_)) => Ok(object.clone()),
        other => Err(interp.type_error(format!(
            "Method Set.prototype.{} called on incompatible receiver {}",
            name,
            describe_for_error(other)
        ))),
    }
}

fn set_items_of(set: &Obj) -> Vec<Value> {
    match &set.borrow().kind {
        ObjectKind::Set(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn insert_item(set: &Obj, item: Value) {
    let item = normalize_key(item);
    if let ObjectKind::Set(items) = &mut set.borrow_mut().kind {
        if !items.iter().any(|existing| existing.same_value_zero(&item)) {
            items.push(item);
        }
    }
}

fn set_add(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "add")?;
    insert_item(&set, arg(args, 0));
    Ok(this.clone())
}

fn set_has(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "has")?;
    let item = arg(args, 0);
    Ok(Value::Bool(set_items_of(&set).iter().any(|v| v.same_value_zero(&item))))
}

fn set_delete(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "delete")?;
    let item = arg(args, 0);
    let mut borrowed = set.borrow_mut();
    let ObjectKind::Set(items) = &mut borrowed.kind else {
        return Ok(Value::Bool(false));
    };
    let before = items.len();
    items.retain(|v| !v.same_value_zero(&item));
    Ok(Value::Bool(items.len() != before))
}

fn set_clear(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "clear")?;
    if let ObjectKind::Set(items) = &mut set.borrow_mut().kind {
        items.clear();
    }
    Ok(Value::Undefined)
}

fn set_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "forEach")?;
    let callback = callback_arg(interp, args, 0)?;
    let this_arg = arg(args, 1);
    for item in set_items_of(&set) {
        interp.call(&callback, this_arg.clone(), &[item.clone(), item, this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn set_values(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "values")?;
    Ok(interp.new_array(set_items_of(&set)))
}

fn set_entries(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "entries")?;
    let pairs = set_items_of(&set)
        .into_iter()
        .map(|v| interp.new_array(vec![v.clone(), v]))
        .collect();
    Ok(interp.new_array(pairs))
}

fn set_size(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let set = this_set(interp, this, "size")?;
    Ok(Value::from(set_items_of(&set).len()))
}
