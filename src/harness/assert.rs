//! The `assert` binding: chai's assert style.
//!
//! Messages use chai's wording and its `objDisplay` rendering, so a failing
//! case reads the same as it would under mocha + chai. A failure throws an
//! `AssertionError` object carrying `actual` and `expected`.

use crate::intrinsics::helpers::{arg, method, native, NativeFnPtr, NativeResult};
use crate::intrinsics::regexp;
use crate::runtime::inspect::{function_name, inspect, Style};
use crate::runtime::object::ObjectKind;
use crate::runtime::{number_to_string, ErrorKind, Interpreter, Obj, Thrown, Value};

/// chai's `truncateThreshold`.
const TRUNCATE_THRESHOLD: usize = 40;

/// Build the `assert` function object with all its methods.
pub fn create(interp: &mut Interpreter) -> Value {
    let assert = native(interp, "assert", 2, assert_call, None);
    let methods: &[(&str, usize, NativeFnPtr)] = &[
        ("ok", 2, assert_ok),
        ("isOk", 2, assert_ok),
        ("notOk", 2, assert_not_ok),
        ("isNotOk", 2, assert_not_ok),
        ("equal", 3, assert_equal),
        ("notEqual", 3, assert_not_equal),
        ("strictEqual", 3, assert_strict_equal),
        ("notStrictEqual", 3, assert_not_strict_equal),
        ("deepEqual", 3, assert_deep_equal),
        ("deepStrictEqual", 3, assert_deep_equal),
        ("notDeepEqual", 3, assert_not_deep_equal),
        ("isTrue", 2, assert_is_true),
        ("isFalse", 2, assert_is_false),
        ("isNull", 2, assert_is_null),
        ("isNotNull", 2, assert_is_not_null),
        ("isUndefined", 2, assert_is_undefined),
        ("isDefined", 2, assert_is_defined),
        ("isNaN", 2, assert_is_nan),
        ("isNotNaN", 2, assert_is_not_nan),
        ("isAbove", 3, assert_is_above),
        ("isBelow", 3, assert_is_below),
        ("isAtLeast", 3, assert_is_at_least),
        ("isAtMost", 3, assert_is_at_most),
        ("closeTo", 4, assert_close_to),
        ("approximately", 4, assert_close_to),
        ("include", 3, assert_include),
        ("notInclude", 3, assert_not_include),
        ("lengthOf", 3, assert_length_of),
        ("isArray", 2, assert_is_array),
        ("isString", 2, assert_is_string),
        ("isNumber", 2, assert_is_number),
        ("isBoolean", 2, assert_is_boolean),
        ("isFunction", 2, assert_is_function),
        ("isObject", 2, assert_is_object),
        ("typeOf", 3, assert_type_of),
        ("throws", 4, assert_throws),
        ("throw", 4, assert_throws),
        ("Throw", 4, assert_throws),
        ("doesNotThrow", 4, assert_does_not_throw),
        ("fail", 4, assert_fail),
        ("exists", 2, assert_exists),
    ];
    for &(name, length, call) in methods {
        method(interp, &assert, name, length, call);
    }
    Value::Object(assert)
}

// ============================================================================
// MESSAGES
// ============================================================================

/// chai's `objDisplay`: `inspect`, with long values abbreviated.
pub fn obj_display(value: &Value) -> String {
    let text = inspect(value, Style::Assertion);
    if text.chars().count() < TRUNCATE_THRESHOLD {
        return text;
    }
    let Value::Object(object) = value else {
        return text;
    };
    let abbreviated = match &object.borrow().kind {
        ObjectKind::Function(_) => {
            let name = function_name(object);
            Some(if name.is_empty() {
                "[Function]".to_string()
            } else {
                format!("[Function: {}]", name)
            })
        }
        ObjectKind::Array(items) => Some(format!("[ Array({}) ]", items.len())),
        ObjectKind::Ordinary => {
            let keys = object.borrow().properties.enumerable_keys();
            let listed = if keys.len() > 2 {
                format!("{}, ...", keys[..2].join(", "))
            } else {
                keys.join(", ")
            };
            Some(format!("{{ Object ({}) }}", listed))
        }
        _ => None,
    };
    abbreviated.unwrap_or(text)
}

/// The optional trailing message argument; empty strings count as absent.
fn custom_message(interp: &mut Interpreter, args: &[Value], index: usize) -> Result<Option<String>, Thrown> {
    match arg(args, index) {
        Value::Undefined | Value::Null => Ok(None),
        other => {
            let text = interp.to_string(&other)?;
            Ok((!text.is_empty()).then_some(text))
        }
    }
}

/// An `AssertionError` carrying `message`, prefixed by the custom message.
fn failure(
    interp: &Interpreter,
    custom: Option<String>,
    message: String,
    actual: Option<Value>,
    expected: Option<Value>,
) -> Thrown {
    let message = match custom {
        Some(custom) => format!("{}: {}", custom, message),
        None => message,
    };
    let error = interp.make_error(ErrorKind::AssertionError, message);
    if let Value::Object(object) = &error {
        object.set_hidden("showDiff", Value::Bool(expected.is_some()));
        if let Some(actual) = actual {
            object.set_hidden("actual", actual);
        }
        if let Some(expected) = expected {
            object.set_hidden("expected", expected);
        }
    }
    Thrown::Exception(error)
}

/// Pass when `passed`; otherwise fail with `message`.
fn check(
    interp: &mut Interpreter,
    args: &[Value],
    message_index: usize,
    passed: bool,
    message: impl FnOnce() -> String,
) -> NativeResult {
    if passed {
        return Ok(Value::Undefined);
    }
    let custom = custom_message(interp, args, message_index)?;
    Err(failure(interp, custom, message(), None, None))
}

/// Like [`check`], recording `actual` and `expected` on the error.
fn check_values(
    interp: &mut Interpreter,
    args: &[Value],
    message_index: usize,
    passed: bool,
    message: String,
    actual: Value,
    expected: Value,
) -> NativeResult {
    if passed {
        return Ok(Value::Undefined);
    }
    let custom = custom_message(interp, args, message_index)?;
    Err(failure(interp, custom, message, Some(actual), Some(expected)))
}

// ============================================================================
// TYPES
// ============================================================================

fn is_error_object(interp: &Interpreter, object: &Obj) -> bool {
    matches!(object.borrow().kind, ObjectKind::Error)
        || object.inherits_from(&interp.realm.error_prototype(ErrorKind::Error))
}

/// chai's `type-detect`, lowercased.
fn type_name(interp: &Interpreter, value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::Function(_) => "function",
            ObjectKind::Array(_) => "array",
            ObjectKind::RegExp(_) => "regexp",
            ObjectKind::Map(_) => "map",
            ObjectKind::Set(_) => "set",
            ObjectKind::Error => "error",
            ObjectKind::Ordinary if is_error_object(interp, object) => "error",
            ObjectKind::Ordinary => "object",
        },
    }
}

fn article(kind: &str) -> &'static str {
    match kind.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

fn check_type(interp: &mut Interpreter, args: &[Value], expected: &str) -> NativeResult {
    let value = arg(args, 0);
    let actual = type_name(interp, &value);
    check(interp, args, 1, actual == expected, || {
        format!("expected {} to be {} {}", obj_display(&value), article(expected), expected)
    })
}

// ============================================================================
// DEEP EQUALITY
// ============================================================================

/// chai's `deep-eql`: structural equality with SameValue leaves.
pub fn deep_equal(interp: &mut Interpreter, left: &Value, right: &Value) -> Result<bool, Thrown> {
    let mut visiting = Vec::new();
    deep_equal_inner(interp, left, right, &mut visiting)
}

fn deep_equal_inner(
    interp: &mut Interpreter,
    left: &Value,
    right: &Value,
    visiting: &mut Vec<(usize, usize)>,
) -> Result<bool, Thrown> {
    let (Value::Object(a), Value::Object(b)) = (left, right) else {
        return Ok(left.same_value(right));
    };
    if a.ptr_eq(b) {
        return Ok(true);
    }
    if type_name(interp, left) != type_name(interp, right) {
        return Ok(false);
    }
    let pair = (a.id(), b.id());
    if visiting.contains(&pair) {
        return Ok(true);
    }

    enum Pair {
        Sequence(Vec<Value>, Vec<Value>),
        Entries(Vec<(Value, Value)>, Vec<(Value, Value)>),
        Text(String, String),
        Identity,
        Keyed,
    }
    let pair_kind = match (&a.borrow().kind, &b.borrow().kind) {
        (ObjectKind::Array(x), ObjectKind::Array(y)) => Pair::Sequence(x.clone(), y.clone()),
        (ObjectKind::Set(x), ObjectKind::Set(y)) => Pair::Sequence(x.clone(), y.clone()),
        (ObjectKind::Map(x), ObjectKind::Map(y)) => Pair::Entries(x.clone(), y.clone()),
        (ObjectKind::RegExp(x), ObjectKind::RegExp(y)) => Pair::Text(
            format!("/{}/{}", x.source, x.flags),
            format!("/{}/{}", y.source, y.flags),
        ),
        (ObjectKind::Function(_), _) | (ObjectKind::Error, _) => Pair::Identity,
        _ => Pair::Keyed,
    };

    visiting.push(pair);
    let result = match pair_kind {
        Pair::Identity => Ok(false),
        Pair::Text(x, y) => Ok(x == y),
        Pair::Sequence(x, y) => sequences_equal(interp, &x, &y, visiting),
        Pair::Entries(x, y) => {
            if x.len() != y.len() {
                Ok(false)
            } else {
                let mut equal = true;
                for ((xk, xv), (yk, yv)) in x.iter().zip(y.iter()) {
                    if !deep_equal_inner(interp, xk, yk, visiting)?
                        || !deep_equal_inner(interp, xv, yv, visiting)?
                    {
                        equal = false;
                        break;
                    }
                }
                Ok(equal)
            }
        }
        Pair::Keyed => keyed_equal(interp, left, right, visiting),
    };
    visiting.pop();
    result
}

fn sequences_equal(
    interp: &mut Interpreter,
    left: &[Value],
    right: &[Value],
    visiting: &mut Vec<(usize, usize)>,
) -> Result<bool, Thrown> {
    if left.len() != right.len() {
        return Ok(false);
    }
    for (x, y) in left.iter().zip(right) {
        if !deep_equal_inner(interp, x, y, visiting)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn keyed_equal(
    interp: &mut Interpreter,
    left: &Value,
    right: &Value,
    visiting: &mut Vec<(usize, usize)>,
) -> Result<bool, Thrown> {
    let mut left_keys = interp.for_in_keys(left);
    let mut right_keys = interp.for_in_keys(right);
    if left_keys.len() != right_keys.len() {
        return Ok(false);
    }
    left_keys.sort();
    right_keys.sort();
    if left_keys != right_keys {
        return Ok(false);
    }
    for key in left_keys {
        let x = interp.get_property(left, &key)?;
        let y = interp.get_property(right, &key)?;
        if !deep_equal_inner(interp, &x, &y, visiting)? {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// TRUTHINESS AND EQUALITY
// ============================================================================

fn assert_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    if arg(args, 0).truthy() {
        return Ok(Value::Undefined);
    }
    let custom = custom_message(interp, args, 1)?;
    let message = custom.unwrap_or_default();
    Err(failure(interp, None, message, None, None))
}

fn assert_ok(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, value.truthy(), || {
        format!("expected {} to be truthy", obj_display(&value))
    })
}

fn assert_not_ok(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, !value.truthy(), || {
        format!("expected {} to be falsy", obj_display(&value))
    })
}

fn assert_exists(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, !value.is_nullish(), || {
        format!("expected {} to exist", obj_display(&value))
    })
}

fn assert_equal(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (actual, expected) = (arg(args, 0), arg(args, 1));
    let passed = interp.loose_equals(&actual, &expected)?;
    let message = format!("expected {} to equal {}", obj_display(&actual), obj_display(&expected));
    check_values(interp, args, 2, passed, message, actual, expected)
}

fn assert_not_equal(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (actual, expected) = (arg(args, 0), arg(args, 1));
    let passed = !interp.loose_equals(&actual, &expected)?;
    let message = format!("expected {} to not equal {}", obj_display(&actual), obj_display(&expected));
    check_values(interp, args, 2, passed, message, actual, expected)
}

fn assert_strict_equal(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (actual, expected) = (arg(args, 0), arg(args, 1));
    let passed = actual.strict_equals(&expected);
    let message = format!("expected {} to equal {}", obj_display(&actual), obj_display(&expected));
    check_values(interp, args, 2, passed, message, actual, expected)
}

fn assert_not_strict_equal(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (actual, expected) = (arg(args, 0), arg(args, 1));
    let passed = !actual.strict_equals(&expected);
    let message = format!("expected {} to not equal {}", obj_display(&actual), obj_display(&expected));
    check_values(interp, args, 2, passed, message, actual, expected)
}

fn assert_deep_equal(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (actual, expected) = (arg(args, 0), arg(args, 1));
    let passed = deep_equal(interp, &actual, &expected)?;
    let message = format!(
        "expected {} to deeply equal {}",
        obj_display(&actual),
        obj_display(&expected)
    );
    check_values(interp, args, 2, passed, message, actual, expected)
}

fn assert_not_deep_equal(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (actual, expected) = (arg(args, 0), arg(args, 1));
    let passed = !deep_equal(interp, &actual, &expected)?;
    let message = format!(
        "expected {} to not deeply equal {}",
        obj_display(&actual),
        obj_display(&expected)
    );
    check_values(interp, args, 2, passed, message, actual, expected)
}

// ============================================================================
// SPECIFIC VALUES
// ============================================================================

fn assert_is_true(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, matches!(value, Value::Bool(true)), || {
        format!("expected {} to be true", obj_display(&value))
    })
}

fn assert_is_false(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, matches!(value, Value::Bool(false)), || {
        format!("expected {} to be false", obj_display(&value))
    })
}

fn assert_is_null(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, matches!(value, Value::Null), || {
        format!("expected {} to equal null", obj_display(&value))
    })
}

fn assert_is_not_null(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, !matches!(value, Value::Null), || {
        format!("expected {} to not equal null", obj_display(&value))
    })
}

fn assert_is_undefined(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, matches!(value, Value::Undefined), || {
        format!("expected {} to equal undefined", obj_display(&value))
    })
}

fn assert_is_defined(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    check(interp, args, 1, !matches!(value, Value::Undefined), || {
        format!("expected {} to not equal undefined", obj_display(&value))
    })
}

fn assert_is_nan(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    let passed = matches!(value, Value::Number(n) if n.is_nan());
    check(interp, args, 1, passed, || format!("expected {} to be NaN", obj_display(&value)))
}

fn assert_is_not_nan(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    let passed = !matches!(value, Value::Number(n) if n.is_nan());
    check(interp, args, 1, passed, || format!("expected {} not to be NaN", obj_display(&value)))
}

// ============================================================================
// COMPARISONS
// ============================================================================

/// Both operands as numbers, or an assertion failure naming the culprit.
fn numeric_pair(interp: &mut Interpreter, args: &[Value]) -> Result<(f64, f64), Thrown> {
    let custom = custom_message(interp, args, 2)?;
    match (arg(args, 0), arg(args, 1)) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        (Value::Number(_), other) => Err(failure(
            interp,
            custom,
            format!("the argument to the comparison must be a number, but {} was given", obj_display(&other)),
            None,
            None,
        )),
        (other, _) => Err(failure(
            interp,
            custom,
            format!("expected {} to be a number or a date", obj_display(&other)),
            None,
            None,
        )),
    }
}

fn compare(
    interp: &mut Interpreter,
    args: &[Value],
    relation: &str,
    holds: fn(f64, f64) -> bool,
) -> NativeResult {
    let (actual, bound) = numeric_pair(interp, args)?;
    check(interp, args, 2, holds(actual, bound), || {
        format!(
            "expected {} to be {} {}",
            number_to_string(actual),
            relation,
            number_to_string(bound)
        )
    })
}

fn assert_is_above(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    compare(interp, args, "above", |a, b| a > b)
}

fn assert_is_below(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    compare(interp, args, "below", |a, b| a < b)
}

fn assert_is_at_least(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    compare(interp, args, "at least", |a, b| a >= b)
}

fn assert_is_at_most(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    compare(interp, args, "at most", |a, b| a <= b)
}

fn assert_close_to(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (actual, expected, delta) = match (arg(args, 0), arg(args, 1), arg(args, 2)) {
        (Value::Number(a), Value::Number(e), Value::Number(d)) => (a, e, d),
        (actual, _, _) => {
            let custom = custom_message(interp, args, 3)?;
            return Err(failure(
                interp,
                custom,
                format!("expected {} to be a number", obj_display(&actual)),
                None,
                None,
            ));
        }
    };
    check(interp, args, 3, (actual - expected).abs() <= delta, || {
        format!(
            "expected {} to be close to {} +/- {}",
            number_to_string(actual),
            number_to_string(expected),
            number_to_string(delta)
        )
    })
}

// ============================================================================
// MEMBERSHIP AND SHAPE
// ============================================================================

/// Whether `haystack` includes `needle`, or a failure message when the
/// combination is unsupported.
fn includes(interp: &mut Interpreter, haystack: &Value, needle: &Value) -> Result<Result<bool, String>, Thrown> {
    match haystack {
        Value::String(text) => {
            let needle = interp.to_string(needle)?;
            Ok(Ok(text.contains(needle.as_str())))
        }
        Value::Object(object) => {
            let members = match &object.borrow().kind {
                ObjectKind::Array(items) | ObjectKind::Set(items) => Some(items.clone()),
                ObjectKind::Map(entries) => Some(entries.iter().map(|(_, v)| v.clone()).collect()),
                _ => None,
            };
            if let Some(members) = members {
                return Ok(Ok(members.iter().any(|m| m.strict_equals(needle))));
            }
            let Value::Object(_) = needle else {
                return Ok(Err(format!(
                    "the given combination of arguments ({} and {}) is invalid for this assertion",
                    type_name(interp, haystack),
                    type_name(interp, needle)
                )));
            };
            for key in interp.own_keys(needle) {
                let expected = interp.get_property(needle, &key)?;
                let actual = interp.get_property(haystack, &key)?;
                if !actual.strict_equals(&expected) {
                    return Ok(Ok(false));
                }
            }
            Ok(Ok(true))
        }
        other => Ok(Err(format!(
            "the given combination of arguments ({} and {}) is invalid for this assertion",
            type_name(interp, other),
            type_name(interp, needle)
        ))),
    }
}

fn assert_include(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (haystack, needle) = (arg(args, 0), arg(args, 1));
    let passed = match includes(interp, &haystack, &needle)? {
        Ok(passed) => passed,
        Err(message) => {
            let custom = custom_message(interp, args, 2)?;
            return Err(failure(interp, custom, message, None, None));
        }
    };
    check(interp, args, 2, passed, || {
        format!("expected {} to include {}", obj_display(&haystack), obj_display(&needle))
    })
}

fn assert_not_include(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (haystack, needle) = (arg(args, 0), arg(args, 1));
    let passed = match includes(interp, &haystack, &needle)? {
        Ok(found) => !found,
        Err(message) => {
            let custom = custom_message(interp, args, 2)?;
            return Err(failure(interp, custom, message, None, None));
        }
    };
    check(interp, args, 2, passed, || {
        format!("expected {} to not include {}", obj_display(&haystack), obj_display(&needle))
    })
}

fn assert_length_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let (value, expected) = (arg(args, 0), arg(args, 1));
    let size = match &value {
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::Map(entries) => Some(entries.len() as f64),
            ObjectKind::Set(items) => Some(items.len() as f64),
            _ => None,
        },
        _ => None,
    };
    let length = match size {
        Some(size) => Value::Number(size),
        None if value.is_nullish() => {
            let custom = custom_message(interp, args, 2)?;
            return Err(failure(
                interp,
                custom,
                format!("expected {} to have property 'length'", obj_display(&value)),
                None,
                None,
            ));
        }
        None => interp.get_property(&value, "length")?,
    };
    let passed = length.strict_equals(&expected);
    let message = format!(
        "expected {} to have a length of {} but got {}",
        obj_display(&value),
        obj_display(&expected),
        obj_display(&length)
    );
    check_values(interp, args, 2, passed, message, length, expected)
}

fn assert_is_array(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    check_type(interp, args, "array")
}

fn assert_is_string(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    check_type(interp, args, "string")
}

fn assert_is_number(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    check_type(interp, args, "number")
}

fn assert_is_boolean(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    check_type(interp, args, "boolean")
}

fn assert_is_function(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    check_type(interp, args, "function")
}

fn assert_is_object(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    check_type(interp, args, "object")
}

fn assert_type_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    let expected = interp.to_string(&arg(args, 1))?.to_lowercase();
    let actual = type_name(interp, &value);
    check(interp, args, 2, actual == expected, || {
        format!("expected {} to be {} {}", obj_display(&value), article(&expected), expected)
    })
}

// ============================================================================
// EXCEPTIONS
// ============================================================================

/// `String(error)` for error objects, the value itself otherwise, as chai
/// reports a caught exception.
fn caught_display(interp: &mut Interpreter, caught: &Value) -> Result<Value, Thrown> {
    match caught {
        Value::Object(object) if is_error_object(interp, object) => Ok(Value::from(interp.to_string(caught)?)),
        other => Ok(other.clone()),
    }
}

/// Run `body`, returning what it threw. The step budget is never caught.
fn capture_throw(interp: &mut Interpreter, body: &Value) -> Result<Option<Value>, Thrown> {
    match interp.call(body, Value::Undefined, &[]) {
        Ok(_) => Ok(None),
        Err(Thrown::Exception(value)) => Ok(Some(value)),
        Err(budget) => Err(budget),
    }
}

fn assert_throws(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let body = arg(args, 0);
    let (mut error_like, mut matcher) = (arg(args, 1), arg(args, 2));
    if matches!(error_like, Value::String(_)) || regexp::regexp_of(&error_like).is_some() {
        matcher = error_like;
        error_like = Value::Undefined;
    }
    let custom = custom_message(interp, args, 3)?;
    let subject = obj_display(&body);

    let Some(caught) = capture_throw(interp, &body)? else {
        let message = match &error_like {
            Value::Object(constructor) if constructor.is_callable() => {
                format!("expected {} to throw {}", subject, function_name(constructor))
            }
            _ => format!("expected {} to throw an error", subject),
        };
        return Err(failure(interp, custom, message, None, None));
    };

    if let Value::Object(constructor) = &error_like {
        if constructor.is_callable() && !interp.instance_of(&caught, &error_like)? {
            let shown = caught_display(interp, &caught)?;
            let message = format!(
                "expected {} to throw {} but {} was thrown",
                subject,
                obj_display(&Value::from(function_name(constructor))),
                obj_display(&shown)
            );
            return Err(failure(interp, custom, message, None, None));
        }
    }

    if !matcher.is_nullish() {
        let message = match &caught {
            Value::Object(object) if is_error_object(interp, object) => interp.get_property(&caught, "message")?,
            other => other.clone(),
        };
        let text = interp.to_string(&message)?;
        let mismatch = match regexp::regexp_of(&matcher) {
            Some(pattern) => {
                let matched = regexp::regexp_parts(&pattern).is_some_and(|(regex, _, _)| regex.is_match(&text));
                (!matched).then_some("matching")
            }
            None => {
                let needle = interp.to_string(&matcher)?;
                (!text.contains(needle.as_str())).then_some("including")
            }
        };
        if let Some(relation) = mismatch {
            let message = format!(
                "expected {} to throw error {} {} but got {}",
                subject,
                relation,
                obj_display(&matcher),
                obj_display(&Value::from(text))
            );
            return Err(failure(interp, custom, message, None, None));
        }
    }
    Ok(caught)
}

fn assert_does_not_throw(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let body = arg(args, 0);
    let message_index = if matches!(arg(args, 1), Value::String(_)) && args.len() == 2 { 1 } else { 3 };
    let custom = custom_message(interp, args, message_index)?;
    match capture_throw(interp, &body)? {
        None => Ok(Value::Undefined),
        Some(caught) => {
            let shown = caught_display(interp, &caught)?;
            let message = format!(
                "expected {} to not throw an error but {} was thrown",
                obj_display(&body),
                obj_display(&shown)
            );
            Err(failure(interp, custom, message, None, None))
        }
    }
}

fn assert_fail(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    // `fail(message)` or `fail(actual, expected, message, operator)`.
    let message_index = if args.len() < 2 { 0 } else { 2 };
    let message = custom_message(interp, args, message_index)?.unwrap_or_else(|| "assert.fail()".to_string());
    let (actual, expected) = if args.len() < 2 {
        (None, None)
    } else {
        (Some(arg(args, 0)), Some(arg(args, 1)))
    };
    Err(failure(interp, None, message, actual, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InterpreterConfig, NullSink};

    fn interpreter() -> Interpreter {
        Interpreter::new(InterpreterConfig::default(), Box::new(NullSink))
    }

    #[test]
    fn test_obj_display_truncates_long_values() {
        let interp = interpreter();
        let short = interp.new_array(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(obj_display(&short), "[ 1, 2 ]");

        let long = interp.new_array((0..30).map(|n| Value::Number(n as f64)).collect());
        assert_eq!(obj_display(&long), "[ Array(30) ]");

        let object = interp.new_object();
        for key in ["alpha", "beta", "gamma", "delta"] {
            object.set_own(key, Value::from("a fairly long string value"));
        }
        assert_eq!(obj_display(&Value::Object(object)), "{ Object (alpha, beta, ...) }");
    }

    #[test]
    fn test_deep_equal() {
        let mut interp = interpreter();
        let a = interp.new_array(vec![Value::Number(1.0), Value::from("x")]);
        let b = interp.new_array(vec![Value::Number(1.0), Value::from("x")]);
        let c = interp.new_array(vec![Value::Number(1.0), Value::from("y")]);
        assert!(deep_equal(&mut interp, &a, &b).unwrap());
        assert!(!deep_equal(&mut interp, &a, &c).unwrap());
        assert!(deep_equal(&mut interp, &Value::Number(f64::NAN), &Value::Number(f64::NAN)).unwrap());
        assert!(!deep_equal(&mut interp, &Value::Number(0.0), &Value::Number(-0.0)).unwrap());

        let left = interp.new_object();
        left.set_own("self", Value::Object(left.clone()));
        let right = interp.new_object();
        right.set_own("self", Value::Object(right.clone()));
        assert!(deep_equal(&mut interp, &Value::Object(left), &Value::Object(right)).unwrap());
    }

    #[test]
    fn test_equal_message() {
        let mut interp = interpreter();
        let args = [Value::Number(0.0), Value::Number(3.0)];
        let Err(Thrown::Exception(error)) = assert_equal(&mut interp, &Value::Undefined, &args) else {
            panic!("expected an assertion failure");
        };
        let message = error.as_object().and_then(|o| o.own_data("message"));
        assert!(matches!(message, Some(Value::String(m)) if &*m == "expected 0 to equal 3"));
    }

    #[test]
    fn test_custom_message_prefix() {
        let mut interp = interpreter();
        let args = [Value::Bool(false), Value::from("flag must be set")];
        let Err(Thrown::Exception(error)) = assert_is_true(&mut interp, &Value::Undefined, &args) else {
            panic!("expected an assertion failure");
        };
        let message = error.as_object().and_then(|o| o.own_data("message"));
        assert!(matches!(
            message,
            Some(Value::String(m)) if &*m == "flag must be set: expected false to be true"
        ));
    }
}
