//! # Array
//!
//! Array methods read a snapshot of the elements when they start; callbacks
//! that mutate the array they are iterating see their writes only through
//! later reads, not through the running iteration.
//!
//! ## Members Provided
//!
//! - **Constructor**: `Array(n)` / `Array(...items)`
//! - **Statics**: `isArray`, `from`, `of`
//! - **Mutators**: `push`, `pop`, `shift`, `unshift`, `splice`, `reverse`,
//!   `sort`, `fill`
//! - **Accessors**: `slice`, `concat`, `join`, `indexOf`, `lastIndexOf`,
//!   `includes`, `at`, `flat`, `toString`
//! - **Iteration**: `forEach`, `map`, `filter`, `find`, `findIndex`,
//!   `findLast`, `findLastIndex`, `some`, `every`, `reduce`, `reduceRight`,
//!   `flatMap`, `keys`, `values`, `entries`

use std::cmp::Ordering;

use crate::intrinsics::helpers::{arg, callback_arg, constructor, method, NativeResult};
use crate::runtime::convert::{relative_index, to_integer};
use crate::runtime::inspect::describe_for_error;
use crate::runtime::{Interpreter, Obj, ObjectKind, Thrown, Value};

pub fn register(interp: &mut Interpreter) {
    let prototype = interp.realm.array_prototype.clone();
    let array = constructor(interp, "Array", 1, &prototype, array_construct, Some(array_construct));

    method(interp, &array, "isArray", 1, array_is_array);
    method(interp, &array, "from", 1, array_from);
    method(interp, &array, "of", 0, array_of);

    method(interp, &prototype, "push", 1, proto_push);
    method(interp, &prototype, "pop", 0, proto_pop);
    method(interp, &prototype, "shift", 0, proto_shift);
    method(interp, &prototype, "unshift", 1, proto_unshift);
    method(interp, &prototype, "splice", 2, proto_splice);
    method(interp, &prototype, "reverse", 0, proto_reverse);
    method(interp, &prototype, "sort", 1, proto_sort);
    method(interp, &prototype, "fill", 1, proto_fill);

    method(interp, &prototype, "slice", 2, proto_slice);
    method(interp, &prototype, "concat", 1, proto_concat);
    method(interp, &prototype, "join", 1, proto_join);
    method(interp, &prototype, "indexOf", 1, proto_index_of);
    method(interp, &prototype, "lastIndexOf", 1, proto_last_index_of);
    method(interp, &prototype, "includes", 1, proto_includes);
    method(interp, &prototype, "at", 1, proto_at);
    method(interp, &prototype, "flat", 0, proto_flat);
    method(interp, &prototype, "toString", 0, proto_to_string);

    method(interp, &prototype, "forEach", 1, proto_for_each);
    method(interp, &prototype, "map", 1, proto_map);
    method(interp, &prototype, "filter", 1, proto_filter);
    method(interp, &prototype, "find", 1, proto_find);
    method(interp, &prototype, "findIndex", 1, proto_find_index);
    method(interp, &prototype, "findLast", 1, proto_find_last);
    method(interp, &prototype, "findLastIndex", 1, proto_find_last_index);
    method(interp, &prototype, "some", 1, proto_some);
    method(interp, &prototype, "every", 1, proto_every);
    method(interp, &prototype, "reduce", 1, proto_reduce);
    method(interp, &prototype, "reduceRight", 1, proto_reduce_right);
    method(interp, &prototype, "flatMap", 1, proto_flat_map);
    method(interp, &prototype, "keys", 0, proto_keys);
    method(interp, &prototype, "values", 0, proto_values);
    method(interp, &prototype, "entries", 0, proto_entries);
}

// ============================================================================
// HELPERS
// ============================================================================

fn this_array(interp: &Interpreter, this: &Value, name: &str) -> Result<Obj, Thrown> {
    match this {
        Value::Object(object) if object.is_array() => Ok(object.clone()),
        other => Err(interp.type_error(format!(
            "Array.prototype.{} called on {}",
            name,
            describe_for_error(other)
        ))),
    }
}

fn snapshot(object: &Obj) -> Vec<Value> {
    match &object.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

/// Mutate the elements in place; frozen arrays refuse.
fn mutate<R>(interp: &Interpreter, object: &Obj, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, Thrown> {
    let mut borrowed = object.borrow_mut();
    if !borrowed.extensible {
        drop(borrowed);
        return Err(interp.type_error("Cannot add property 0, object is not extensible"));
    }
    match &mut borrowed.kind {
        ObjectKind::Array(items) => Ok(f(items)),
        _ => Ok(f(&mut Vec::new())),
    }
}

/// Relative index argument with a default for `undefined`.
fn index_arg(value: &Value, default: usize, len: usize, interp: &mut Interpreter) -> Result<usize, Thrown> {
    match value {
        Value::Undefined => Ok(default),
        other => Ok(relative_index(interp.to_number(other)?, len)),
    }
}

/// Call `callback(element, index, array)` with the optional `thisArg`.
fn visit(
    interp: &mut Interpreter,
    callback: &Value,
    this_arg: &Value,
    item: &Value,
    index: usize,
    array: &Obj,
) -> Result<Value, Thrown> {
    interp.call(
        callback,
        this_arg.clone(),
        &[item.clone(), Value::from(index), Value::Object(array.clone())],
    )
}

// ============================================================================
// CONSTRUCTOR AND STATICS
// ============================================================================

fn array_construct(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    if let [Value::Number(n)] = args {
        if *n < 0.0 || n.fract() != 0.0 || *n > u32::MAX as f64 {
            return Err(interp.range_error("Invalid array length"));
        }
        return Ok(interp.new_array(vec![Value::Undefined; *n as usize]));
    }
    Ok(interp.new_array(args.to_vec()))
}

fn array_is_array(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(arg(args, 0).as_object().is_some_and(Obj::is_array)))
}

fn array_from(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let source = arg(args, 0);
    let items = match &source {
        Value::Undefined | Value::Null => {
            return Err(interp.type_error(format!(
                "{} is not iterable",
                describe_for_error(&source)
            )))
        }
        Value::Object(object)
            if !object.is_array()
                && !matches!(object.borrow().kind, ObjectKind::Map(_) | ObjectKind::Set(_)) =>
        {
            // Array-like: `{ length: n }`.
            let length = interp.get_property(&source, "length")?;
            let length = to_integer(interp.to_number(&length)?).max(0.0) as usize;
            let mut items = Vec::with_capacity(length);
            for index in 0..length {
                items.push(interp.get_property(&source, &index.to_string())?);
            }
            items
        }
        _ => interp.iterate(&source)?,
    };
    let mapper = arg(args, 1);
    if mapper.is_nullish() {
        return Ok(interp.new_array(items));
    }
    let mapper = callback_arg(interp, args, 1)?;
    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        mapped.push(interp.call(&mapper, Value::Undefined, &[item, Value::from(index)])?);
    }
    Ok(interp.new_array(mapped))
}

fn array_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(interp.new_array(args.to_vec()))
}

// ============================================================================
// MUTATORS
// ============================================================================

fn proto_push(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "push")?;
    let length = mutate(interp, &array, |items| {
        items.extend_from_slice(args);
        items.len()
    })?;
    Ok(Value::from(length))
}

fn proto_pop(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "pop")?;
    Ok(mutate(interp, &array, |items| items.pop())?.unwrap_or_default())
}

fn proto_shift(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "shift")?;
    let first = mutate(interp, &array, |items| {
        if items.is_empty() {
            None
        } else {
            Some(items.remove(0))
        }
    })?;
    Ok(first.unwrap_or_default())
}

fn proto_unshift(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "unshift")?;
    let length = mutate(interp, &array, |items| {
        items.splice(0..0, args.iter().cloned());
        items.len()
    })?;
    Ok(Value::from(length))
}

fn proto_splice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "splice")?;
    let len = snapshot(&array).len();
    if args.is_empty() {
        return Ok(interp.new_array(Vec::new()));
    }
    let start = index_arg(&arg(args, 0), 0, len, interp)?;
    let delete_count = match args.get(1) {
        None => len - start,
        Some(count) => {
            let count = to_integer(interp.to_number(count)?).max(0.0) as usize;
            count.min(len - start)
        }
    };
    let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
    let removed = mutate(interp, &array, |items| {
        items
            .splice(start..start + delete_count, inserted)
            .collect::<Vec<_>>()
    })?;
    Ok(interp.new_array(removed))
}

fn proto_reverse(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "reverse")?;
    mutate(interp, &array, |items| items.reverse())?;
    Ok(this.clone())
}

fn proto_sort(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "sort")?;
    let comparator = arg(args, 0);
    if !comparator.is_nullish() && !comparator.is_callable() {
        return Err(interp.type_error(
            "The comparison function must be either a function or undefined",
        ));
    }
    let (defined, undefined): (Vec<Value>, Vec<Value>) = snapshot(&array)
        .into_iter()
        .partition(|v| !matches!(v, Value::Undefined));
    let mut sorted = merge_sort(interp, defined, &comparator)?;
    sorted.extend(undefined);
    mutate(interp, &array, |items| *items = sorted)?;
    Ok(this.clone())
}

/// Stable merge sort with a comparator that may throw.
fn merge_sort(interp: &mut Interpreter, mut items: Vec<Value>, comparator: &Value) -> Result<Vec<Value>, Thrown> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, comparator)?;
    let right = merge_sort(interp, right, comparator)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => compare(interp, r, l, comparator)? == Ordering::Less,
            _ => break,
        };
        if take_right {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn compare(interp: &mut Interpreter, a: &Value, b: &Value, comparator: &Value) -> Result<Ordering, Thrown> {
    if comparator.is_callable() {
        let result = interp.call(comparator, Value::Undefined, &[a.clone(), b.clone()])?;
        let n = interp.to_number(&result)?;
        return Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal));
    }
    let a = interp.to_string(a)?;
    let b = interp.to_string(b)?;
    Ok(a.encode_utf16().cmp(b.encode_utf16()))
}

fn proto_fill(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "fill")?;
    let len = snapshot(&array).len();
    let value = arg(args, 0);
    let start = index_arg(&arg(args, 1), 0, len, interp)?;
    let end = index_arg(&arg(args, 2), len, len, interp)?;
    mutate(interp, &array, |items| {
        for slot in items.iter_mut().take(end).skip(start) {
            *slot = value.clone();
        }
    })?;
    Ok(this.clone())
}

// ============================================================================
// ACCESSORS
// ============================================================================

fn proto_slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "slice")?;
    let items = snapshot(&array);
    let start = index_arg(&arg(args, 0), 0, items.len(), interp)?;
    let end = index_arg(&arg(args, 1), items.len(), items.len(), interp)?;
    let slice = items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default();
    Ok(interp.new_array(slice))
}

fn proto_concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "concat")?;
    let mut items = snapshot(&array);
    for value in args {
        match value {
            Value::Object(object) if object.is_array() => items.extend(snapshot(object)),
            other => items.push(other.clone()),
        }
    }
    Ok(interp.new_array(items))
}

fn proto_join(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "join")?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => interp.to_string(&other)?,
    };
    if interp.joining.contains(&array.id()) {
        return Ok(Value::from(""));
    }
    interp.joining.push(array.id());
    let parts = join_parts(interp, &array);
    interp.joining.pop();
    let parts = parts?;
    let borrowed: Vec<&str> = parts.iter().map(String::as_str).collect();
    interp.check_joined_length(&borrowed, &separator)?;
    Ok(Value::from(parts.join(&separator)))
}

fn join_parts(interp: &mut Interpreter, array: &Obj) -> Result<Vec<String>, Thrown> {
    let mut parts = Vec::new();
    for item in snapshot(array) {
        parts.push(match item {
            Value::Undefined | Value::Null => String::new(),
            other => interp.to_string(&other)?,
        });
    }
    Ok(parts)
}

fn proto_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    proto_join(interp, this, &[])
}

fn proto_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "indexOf")?;
    let items = snapshot(&array);
    let start = index_arg(&arg(args, 1), 0, items.len(), interp)?;
    let target = arg(args, 0);
    let found = items.iter().enumerate().skip(start).find(|(_, v)| v.strict_equals(&target));
    Ok(Value::Number(found.map_or(-1.0, |(i, _)| i as f64)))
}

fn proto_last_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "lastIndexOf")?;
    let items = snapshot(&array);
    let target = arg(args, 0);
    let found = items.iter().enumerate().rev().find(|(_, v)| v.strict_equals(&target));
    Ok(Value::Number(found.map_or(-1.0, |(i, _)| i as f64)))
}

fn proto_includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "includes")?;
    let items = snapshot(&array);
    let start = index_arg(&arg(args, 1), 0, items.len(), interp)?;
    let target = arg(args, 0);
    Ok(Value::Bool(items.iter().skip(start).any(|v| v.same_value_zero(&target))))
}

fn proto_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "at")?;
    let items = snapshot(&array);
    let n = to_integer(interp.to_number(&arg(args, 0))?);
    let index = if n < 0.0 { items.len() as f64 + n } else { n };
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(items.get(index as usize).cloned().unwrap_or_default())
}

fn flatten_into(out: &mut Vec<Value>, items: Vec<Value>, depth: f64) {
    for item in items {
        match &item {
            Value::Object(object) if object.is_array() && depth >= 1.0 => {
                flatten_into(out, snapshot(object), depth - 1.0)
            }
            _ => out.push(item),
        }
    }
}

fn proto_flat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "flat")?;
    let depth = match arg(args, 0) {
        Value::Undefined => 1.0,
        other => to_integer(interp.to_number(&other)?),
    };
    let mut out = Vec::new();
    flatten_into(&mut out, snapshot(&array), depth);
    Ok(interp.new_array(out))
}

// ============================================================================
// ITERATION
// ============================================================================

fn proto_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "forEach")?;
    let callback = callback_arg(interp, args, 0)?;
    let this_arg = arg(args, 1);
    for (index, item) in snapshot(&array).iter().enumerate() {
        visit(interp, &callback, &this_arg, item, index, &array)?;
    }
    Ok(Value::Undefined)
}

fn proto_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "map")?;
    let callback = callback_arg(interp, args, 0)?;
    let this_arg = arg(args, 1);
    let items = snapshot(&array);
    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        mapped.push(visit(interp, &callback, &this_arg, item, index, &array)?);
    }
    Ok(interp.new_array(mapped))
}

fn proto_filter(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "filter")?;
    let callback = callback_arg(interp, args, 0)?;
    let this_arg = arg(args, 1);
    let mut kept = Vec::new();
    for (index, item) in snapshot(&array).into_iter().enumerate() {
        if visit(interp, &callback, &this_arg, &item, index, &array)?.truthy() {
            kept.push(item);
        }
    }
    Ok(interp.new_array(kept))
}

/// First index (scanning forward or backward) whose callback is truthy.
fn find_position(interp: &mut Interpreter, this: &Value, args: &[Value], name: &str, backward: bool) -> Result<Option<(usize, Value)>, Thrown> {
    let array = this_array(interp, this, name)?;
    let callback = callback_arg(interp, args, 0)?;
    let this_arg = arg(args, 1);
    let items = snapshot(&array);
    let order: Box<dyn Iterator<Item = usize>> = if backward {
        Box::new((0..items.len()).rev())
    } else {
        Box::new(0..items.len())
    };
    for index in order {
        if visit(interp, &callback, &this_arg, &items[index], index, &array)?.truthy() {
            return Ok(Some((index, items[index].clone())));
        }
    }
    Ok(None)
}

fn proto_find(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    Ok(find_position(interp, this, args, "find", false)?.map(|(_, v)| v).unwrap_or_default())
}

fn proto_find_index(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let found = find_position(interp, this, args, "findIndex", false)?;
    Ok(Value::Number(found.map_or(-1.0, |(i, _)| i as f64)))
}

fn proto_find_last(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    Ok(find_position(interp, this, args, "findLast", true)?.map(|(_, v)| v).unwrap_or_default())
}

fn proto_find_last_index(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let found = find_position(interp, this, args, "findLastIndex", true)?;
    Ok(Value::Number(found.map_or(-1.0, |(i, _)| i as f64)))
}

fn proto_some(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(find_position(interp, this, args, "some", false)?.is_some()))
}

fn proto_every(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "every")?;
    let callback = callback_arg(interp, args, 0)?;
    let this_arg = arg(args, 1);
    for (index, item) in snapshot(&array).iter().enumerate() {
        if !visit(interp, &callback, &this_arg, item, index, &array)?.truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn reduce_with(interp: &mut Interpreter, this: &Value, args: &[Value], name: &str, backward: bool) -> NativeResult {
    let array = this_array(interp, this, name)?;
    let callback = callback_arg(interp, args, 0)?;
    let items = snapshot(&array);
    let mut order: Vec<usize> = (0..items.len()).collect();
    if backward {
        order.reverse();
    }
    let mut order = order.into_iter();
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match order.next() {
            Some(index) => items[index].clone(),
            None => return Err(interp.type_error("Reduce of empty array with no initial value")),
        },
    };
    for index in order {
        accumulator = interp.call(
            &callback,
            Value::Undefined,
            &[
                accumulator,
                items[index].clone(),
                Value::from(index),
                Value::Object(array.clone()),
            ],
        )?;
    }
    Ok(accumulator)
}

fn proto_reduce(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    reduce_with(interp, this, args, "reduce", false)
}

fn proto_reduce_right(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    reduce_with(interp, this, args, "reduceRight", true)
}

fn proto_flat_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mapped = proto_map(interp, this, args)?;
    let Value::Object(mapped) = mapped else {
        return Ok(mapped);
    };
    let mut out = Vec::new();
    flatten_into(&mut out, snapshot(&mapped), 1.0);
    Ok(interp.new_array(out))
}

// Iterator methods return arrays; `for…of` and spread accept them directly.

fn proto_keys(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "keys")?;
    let keys = (0..snapshot(&array).len()).map(Value::from).collect();
    Ok(interp.new_array(keys))
}

fn proto_values(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "values")?;
    Ok(interp.new_array(snapshot(&array)))
}

fn proto_entries(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let array = this_array(interp, this, "entries")?;
    let entries = snapshot(&array)
        .into_iter()
        .enumerate()
        .map(|(i, v)| interp.new_array(vec![Value::from(i), v]))
        .collect();
    Ok(interp.new_array(entries))
}
