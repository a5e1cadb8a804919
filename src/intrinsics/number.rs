//! # Number and Boolean
//!
//! Primitives only: `Number` and `Boolean` convert when called and are not
//! constructors, so there are no wrapper objects.
//!
//! ## Members Provided
//!
//! - **Number**: `isInteger`, `isFinite`, `isNaN`, `isSafeInteger`,
//!   `parseFloat`, `parseInt`, `MAX_SAFE_INTEGER`, `MIN_SAFE_INTEGER`,
//!   `EPSILON`, `MAX_VALUE`, `MIN_VALUE`, `POSITIVE_INFINITY`,
//!   `NEGATIVE_INFINITY`, `NaN`
//! - **Number.prototype**: `toFixed`, `toPrecision`, `toString`, `valueOf`
//! - **Boolean.prototype**: `toString`, `valueOf`
//! - **Globals**: `parseInt`, `parseFloat`, `isNaN`, `isFinite`

use crate::intrinsics::helpers::{arg, constructor, method, native, number_arg, string_arg, NativeResult};
use crate::runtime::convert::{is_js_whitespace, number_to_string, parse_float_prefix, to_integer};
use crate::runtime::object::Property;
use crate::runtime::{Interpreter, Thrown, Value};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn register(interp: &mut Interpreter) {
    let prototype = interp.realm.number_prototype.clone();
    let number = constructor(interp, "Number", 1, &prototype, number_call, None);
    method(interp, &number, "isInteger", 1, number_is_integer);
    method(interp, &number, "isFinite", 1, number_is_finite);
    method(interp, &number, "isNaN", 1, number_is_nan);
    method(interp, &number, "isSafeInteger", 1, number_is_safe_integer);

    let constants = [
        ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
        ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ];
    for (name, value) in constants {
        number
            .borrow_mut()
            .properties
            .insert(name.to_string(), Property::readonly(Value::Number(value)));
    }

    method(interp, &prototype, "toFixed", 1, proto_to_fixed);
    method(interp, &prototype, "toPrecision", 1, proto_to_precision);
    method(interp, &prototype, "toString", 1, proto_to_string);
    method(interp, &prototype, "toLocaleString", 0, proto_to_string);
    method(interp, &prototype, "valueOf", 0, proto_value_of);

    // The same function objects are shared between `Number` and the global.
    let parse_int = native(interp, "parseInt", 2, global_parse_int, None);
    let parse_float = native(interp, "parseFloat", 1, global_parse_float, None);
    for (name, function) in [("parseInt", parse_int), ("parseFloat", parse_float)] {
        number.set_hidden(name, Value::Object(function.clone()));
        interp.realm.global.set_hidden(name, Value::Object(function));
    }
    let global = interp.realm.global.clone();
    method(interp, &global, "isNaN", 1, global_is_nan);
    method(interp, &global, "isFinite", 1, global_is_finite);

    let boolean_prototype = interp.realm.boolean_prototype.clone();
    constructor(interp, "Boolean", 1, &boolean_prototype, boolean_call, None);
    method(interp, &boolean_prototype, "toString", 0, boolean_to_string);
    method(interp, &boolean_prototype, "valueOf", 0, boolean_value_of);
}

// ============================================================================
// CONSTRUCTOR AND STATICS
// ============================================================================

fn number_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    if args.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(interp.to_number(&args[0])?))
}

fn number_value(args: &[Value]) -> Option<f64> {
    match arg(args, 0) {
        Value::Number(n) => Some(n),
        _ => None,
    }
}

fn number_is_integer(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(number_value(args).is_some_and(|n| n.is_finite() && n.trunc() == n)))
}

fn number_is_finite(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(number_value(args).is_some_and(f64::is_finite)))
}

fn number_is_nan(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(number_value(args).is_some_and(f64::is_nan)))
}

fn number_is_safe_integer(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(number_value(args).is_some_and(|n| {
        n.is_finite() && n.trunc() == n && n.abs() <= MAX_SAFE_INTEGER
    })))
}

// ============================================================================
// GLOBAL FUNCTIONS
// ============================================================================

/// `parseInt` over an already-stringified input.
pub fn parse_int(text: &str, radix: u32) -> f64 {
    let text = text.trim_start_matches(is_js_whitespace);
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, text) = match radix {
        0 | 16 if text.starts_with("0x") || text.starts_with("0X") => (16, &text[2..]),
        0 => (10, text),
        r => (r, text),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    let mut any = false;
    for c in text.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    match (any, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

fn global_parse_int(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let text = string_arg(interp, args, 0)?;
    let radix = match arg(args, 1) {
        Value::Undefined => 0,
        other => crate::runtime::convert::to_int32(interp.to_number(&other)?),
    };
    if radix != 0 && !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(parse_int(&text, radix as u32)))
}

fn global_parse_float(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let text = string_arg(interp, args, 0)?;
    Ok(Value::Number(parse_float_prefix(&text)))
}

fn global_is_nan(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(number_arg(interp, args, 0)?.is_nan()))
}

fn global_is_finite(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(number_arg(interp, args, 0)?.is_finite()))
}

// ============================================================================
// PROTOTYPE
// ============================================================================

fn this_number(interp: &Interpreter, this: &Value, name: &str) -> Result<f64, Thrown> {
    match this {
        Value::Number(n) => Ok(*n),
        _ => Err(interp.type_error(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            name
        ))),
    }
}

/// `toFixed`: ties round away from zero, as the decimal definition demands.
pub fn to_fixed(value: f64, digits: usize) -> String {
    if !value.is_finite() || value.abs() >= 1e21 {
        return number_to_string(value);
    }
    let scale = 10f64.powi(digits as i32);
    let scaled = value.abs() * scale;
    let rounded = if scaled.fract() == 0.5 { scaled.ceil() } else { scaled.round() };
    let mut text = format!("{:.*}", digits, rounded / scale);
    if value < 0.0 && rounded != 0.0 {
        text.insert(0, '-');
    }
    text
}

fn proto_to_fixed(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let value = this_number(interp, this, "toFixed")?;
    let digits = to_integer(number_arg(interp, args, 0)?);
    if !(0.0..=100.0).contains(&digits) {
        return Err(interp.range_error("toFixed() digits argument must be between 0 and 100"));
    }
    Ok(Value::from(to_fixed(value, digits as usize)))
}

/// `toPrecision` with `precision` significant digits.
pub fn to_precision(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return number_to_string(value);
    }
    if value == 0.0 {
        return if precision > 1 {
            format!("0.{}", "0".repeat(precision - 1))
        } else {
            "0".to_string()
        };
    }
    let formatted = format!("{:.*e}", precision - 1, value.abs());
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let sign = if value < 0.0 { "-" } else { "" };
    if exponent < -6 || exponent >= precision as i32 {
        let (head, tail) = digits.split_at(1);
        let dot = if tail.is_empty() { String::new() } else { format!(".{}", tail) };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}{}{}e{}{}", sign, head, dot, exp_sign, exponent.abs());
    }
    if exponent < 0 {
        return format!("{}0.{}{}", sign, "0".repeat((-exponent - 1) as usize), digits);
    }
    let point = exponent as usize + 1;
    if point >= digits.len() {
        format!("{}{}", sign, digits)
    } else {
        format!("{}{}.{}", sign, &digits[..point], &digits[point..])
    }
}

fn proto_to_precision(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let value = this_number(interp, this, "toPrecision")?;
    if matches!(arg(args, 0), Value::Undefined) {
        return Ok(Value::from(number_to_string(value)));
    }
    let precision = to_integer(number_arg(interp, args, 0)?);
    if !(1.0..=100.0).contains(&precision) {
        return Err(interp.range_error("toPrecision() argument must be between 1 and 100"));
    }
    Ok(Value::from(to_precision(value, precision as usize)))
}

/// Radix rendering for `toString(radix)` with radix other than 10.
pub fn to_radix_string(value: f64, radix: u32) -> String {
    if !value.is_finite() {
        return number_to_string(value);
    }
    let negative = value < 0.0;
    let value = value.abs();
    let mut int = value.trunc();
    let mut frac = value - int;

    let mut digits = Vec::new();
    if int == 0.0 {
        digits.push('0');
    }
    while int >= 1.0 {
        let digit = (int % f64::from(radix)) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        int = (int / f64::from(radix)).trunc();
    }
    digits.reverse();
    let mut text: String = digits.into_iter().collect();

    if frac > 0.0 {
        text.push('.');
        let mut count = 0;
        while frac > 0.0 && count < 52 {
            frac *= f64::from(radix);
            let digit = frac.trunc() as u32;
            text.push(std::char::from_digit(digit, radix).unwrap_or('0'));
            frac -= f64::from(digit);
            count += 1;
        }
    }
    if negative {
        text.insert(0, '-');
    }
    text
}

fn proto_to_string(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let value = this_number(interp, this, "toString")?;
    let radix = match arg(args, 0) {
        Value::Undefined => 10.0,
        other => to_integer(interp.to_number(&other)?),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(interp.range_error("toString() radix must be between 2 and 36"));
    }
    if radix == 10.0 {
        return Ok(Value::from(number_to_string(value)));
    }
    Ok(Value::from(to_radix_string(value, radix as u32)))
}

fn proto_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    Ok(Value::Number(this_number(interp, this, "valueOf")?))
}

// ============================================================================
// BOOLEAN
// ============================================================================

fn boolean_call(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(arg(args, 0).truthy()))
}

fn this_boolean(interp: &Interpreter, this: &Value, name: &str) -> Result<bool, Thrown> {
    match this {
        Value::Bool(b) => Ok(*b),
        _ => Err(interp.type_error(format!(
            "Boolean.prototype.{} requires that 'this' be a Boolean",
            name
        ))),
    }
}

fn boolean_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    Ok(Value::from(this_boolean(interp, this, "toString")?.to_string()))
}

fn boolean_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    Ok(Value::Bool(this_boolean(interp, this, "valueOf")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("  42px", 0), 42.0);
        assert_eq!(parse_int("-0x1F", 0), -31.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("px", 10).is_nan());
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(-1.5, 1), "-1.5");
        assert_eq!(to_fixed(3.14159, 3), "3.142");
        assert_eq!(to_fixed(0.0, 2), "0.00");
    }

    #[test]
    fn test_to_precision() {
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(0.000123, 2), "0.00012");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
    }

    #[test]
    fn test_to_radix_string() {
        assert_eq!(to_radix_string(255.0, 16), "ff");
        assert_eq!(to_radix_string(-5.0, 2), "-101");
        assert_eq!(to_radix_string(0.5, 2), "0.1");
    }
}
