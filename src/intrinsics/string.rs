//! # String
//!
//! Positions and lengths count UTF-16 code units, as programs observe them.
//!
//! ## Members Provided
//!
//! - **Constructor**: `String(value)`, `String.fromCharCode`
//! - **Prototype**: `charAt`, `charCodeAt`, `codePointAt`, `at`, `indexOf`,
//!   `lastIndexOf`, `includes`, `startsWith`, `endsWith`, `slice`,
//!   `substring`, `substr`, `toUpperCase`, `toLowerCase`, `trim`,
//!   `trimStart`, `trimEnd`, `padStart`, `padEnd`, `repeat`, `split`,
//!   `concat`, `replace`, `replaceAll`, `match`, `matchAll`, `search`,
//!   `localeCompare`, `toString`, `valueOf`

use std::cmp::Ordering;

use crate::intrinsics::helpers::{arg, constructor, method, number_arg, string_arg, NativeResult};
use crate::intrinsics::regexp::{self, Found};
use crate::runtime::convert::{is_js_whitespace, relative_index, to_integer, utf16_len, utf16_slice};
use crate::runtime::inspect::describe_for_error;
use crate::runtime::{Interpreter, Thrown, Value};

pub fn register(interp: &mut Interpreter) {
    let prototype = interp.realm.string_prototype.clone();
    let string = constructor(interp, "String", 1, &prototype, string_call, None);
    method(interp, &string, "fromCharCode", 1, string_from_char_code);

    method(interp, &prototype, "charAt", 1, proto_char_at);
    method(interp, &prototype, "charCodeAt", 1, proto_char_code_at);
    method(interp, &prototype, "codePointAt", 1, proto_code_point_at);
    method(interp, &prototype, "at", 1, proto_at);
    method(interp, &prototype, "indexOf", 1, proto_index_of);
    method(interp, &prototype, "lastIndexOf", 1, proto_last_index_of);
    method(interp, &prototype, "includes", 1, proto_includes);
    method(interp, &prototype, "startsWith", 1, proto_starts_with);
    method(interp, &prototype, "endsWith", 1, proto_ends_with);
    method(interp, &prototype, "slice", 2, proto_slice);
    method(interp, &prototype, "substring", 2, proto_substring);
    method(interp, &prototype, "substr", 2, proto_substr);
    method(interp, &prototype, "toUpperCase", 0, proto_to_upper_case);
    method(interp, &prototype, "toLowerCase", 0, proto_to_lower_case);
    method(interp, &prototype, "trim", 0, proto_trim);
    method(interp, &prototype, "trimStart", 0, proto_trim_start);
    method(interp, &prototype, "trimEnd", 0, proto_trim_end);
    method(interp, &prototype, "padStart", 2, proto_pad_start);
    method(interp, &prototype, "padEnd", 2, proto_pad_end);
    method(interp, &prototype, "repeat", 1, proto_repeat);
    method(interp, &prototype, "split", 2, proto_split);
    method(interp, &prototype, "concat", 1, proto_concat);
    method(interp, &prototype, "replace", 2, proto_replace);
    method(interp, &prototype, "replaceAll", 2, proto_replace_all);
    method(interp, &prototype, "match", 1, proto_match);
    method(interp, &prototype, "matchAll", 1, proto_match_all);
    method(interp, &prototype, "search", 1, proto_search);
    method(interp, &prototype, "localeCompare", 1, proto_locale_compare);
    method(interp, &prototype, "toString", 0, proto_value_of);
    method(interp, &prototype, "valueOf", 0, proto_value_of);
}

// ============================================================================
// HELPERS
// ============================================================================

/// `this` coerced to a string; `undefined` and `null` throw.
fn this_string(interp: &mut Interpreter, this: &Value, name: &str) -> Result<String, Thrown> {
    if this.is_nullish() {
        return Err(interp.type_error(format!(
            "String.prototype.{} called on null or undefined",
            name
        )));
    }
    interp.to_string(this)
}

fn units(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// UTF-16 position of `needle` at or after `from`.
fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn position_arg(interp: &mut Interpreter, args: &[Value], index: usize, default: f64) -> Result<f64, Thrown> {
    match arg(args, index) {
        Value::Undefined => Ok(default),
        other => Ok(to_integer(interp.to_number(&other)?)),
    }
}

// ============================================================================
// CONSTRUCTOR
// ============================================================================

fn string_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    if args.is_empty() {
        return Ok(Value::from(""));
    }
    Ok(Value::from(interp.to_string(&args[0])?))
}

fn string_from_char_code(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let mut codes = Vec::with_capacity(args.len());
    for value in args {
        codes.push(crate::runtime::convert::to_uint32(interp.to_number(value)?) as u16);
    }
    Ok(Value::from(String::from_utf16_lossy(&codes)))
}

// ============================================================================
// CHARACTERS AND SEARCH
// ============================================================================

fn proto_char_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "charAt")?;
    let index = position_arg(interp, args, 0, 0.0)?;
    if index < 0.0 || index >= utf16_len(&text) as f64 {
        return Ok(Value::from(""));
    }
    let index = index as usize;
    Ok(Value::from(utf16_slice(&text, index, index + 1)))
}

fn proto_char_code_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "charCodeAt")?;
    let index = position_arg(interp, args, 0, 0.0)?;
    let units = units(&text);
    if index < 0.0 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(
        units.get(index as usize).map_or(f64::NAN, |u| f64::from(*u)),
    ))
}

fn proto_code_point_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "codePointAt")?;
    let index = position_arg(interp, args, 0, 0.0)?;
    let units = units(&text);
    if index < 0.0 || index as usize >= units.len() {
        return Ok(Value::Undefined);
    }
    let tail = &units[index as usize..];
    let code = char::decode_utf16(tail.iter().copied())
        .next()
        .map(|r| match r {
            Ok(c) => f64::from(u32::from(c)),
            Err(e) => f64::from(e.unpaired_surrogate()),
        })
        .unwrap_or(f64::NAN);
    Ok(Value::Number(code))
}

fn proto_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "at")?;
    let len = utf16_len(&text) as f64;
    let n = position_arg(interp, args, 0, 0.0)?;
    let index = if n < 0.0 { len + n } else { n };
    if index < 0.0 || index >= len {
        return Ok(Value::Undefined);
    }
    let index = index as usize;
    Ok(Value::from(utf16_slice(&text, index, index + 1)))
}

fn proto_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "indexOf")?;
    let needle = string_arg(interp, args, 0)?;
    let from = position_arg(interp, args, 1, 0.0)?.max(0.0) as usize;
    let found = find_units(&units(&text), &units(&needle), from);
    Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
}

fn proto_last_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "lastIndexOf")?;
    let needle = units(&string_arg(interp, args, 0)?);
    let haystack = units(&text);
    if needle.len() > haystack.len() {
        return Ok(Value::Number(-1.0));
    }
    let found = (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..i + needle.len()] == *needle);
    Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
}

fn reject_regexp(interp: &Interpreter, value: &Value, name: &str) -> Result<(), Thrown> {
    if regexp::regexp_of(value).is_some() {
        return Err(interp.type_error(format!(
            "First argument to String.prototype.{} must not be a regular expression",
            name
        )));
    }
    Ok(())
}

fn proto_includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "includes")?;
    reject_regexp(interp, &arg(args, 0), "includes")?;
    let needle = string_arg(interp, args, 0)?;
    let from = position_arg(interp, args, 1, 0.0)?.max(0.0) as usize;
    Ok(Value::Bool(find_units(&units(&text), &units(&needle), from).is_some()))
}

fn proto_starts_with(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "startsWith")?;
    reject_regexp(interp, &arg(args, 0), "startsWith")?;
    let needle = units(&string_arg(interp, args, 0)?);
    let haystack = units(&text);
    let start = position_arg(interp, args, 1, 0.0)?.clamp(0.0, haystack.len() as f64) as usize;
    Ok(Value::Bool(haystack[start..].starts_with(&needle)))
}

fn proto_ends_with(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "endsWith")?;
    reject_regexp(interp, &arg(args, 0), "endsWith")?;
    let needle = units(&string_arg(interp, args, 0)?);
    let haystack = units(&text);
    let end = position_arg(interp, args, 1, haystack.len() as f64)?.clamp(0.0, haystack.len() as f64) as usize;
    Ok(Value::Bool(haystack[..end].ends_with(&needle)))
}

fn proto_search(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "search")?;
    let object = match regexp::regexp_of(&arg(args, 0)) {
        Some(object) => object,
        None => {
            let pattern = string_arg(interp, args, 0)?;
            let created = regexp::create_regexp(interp, &pattern, "")?;
            regexp::regexp_of(&created).ok_or_else(|| interp.type_error("Invalid regular expression"))?
        }
    };
    let Some((regex, _, _)) = regexp::regexp_parts(&object) else {
        return Ok(Value::Number(-1.0));
    };
    Ok(Value::Number(match regex.find(&text) {
        Some(m) => utf16_len(&text[..m.start()]) as f64,
        None => -1.0,
    }))
}

fn proto_locale_compare(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "localeCompare")?;
    let other = string_arg(interp, args, 0)?;
    Ok(Value::Number(match text.cmp(&other) {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }))
}

// ============================================================================
// SUBSTRINGS AND TRANSFORMS
// ============================================================================

fn proto_slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "slice")?;
    let len = utf16_len(&text);
    let start = relative_index(position_arg(interp, args, 0, 0.0)?, len);
    let end = relative_index(position_arg(interp, args, 1, len as f64)?, len);
    Ok(Value::from(utf16_slice(&text, start, end)))
}

fn proto_substring(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "substring")?;
    let len = utf16_len(&text) as f64;
    let start = position_arg(interp, args, 0, 0.0)?.clamp(0.0, len) as usize;
    let end = position_arg(interp, args, 1, len)?.clamp(0.0, len) as usize;
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Ok(Value::from(utf16_slice(&text, start, end)))
}

fn proto_substr(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "substr")?;
    let len = utf16_len(&text);
    let start = relative_index(position_arg(interp, args, 0, 0.0)?, len);
    let count = position_arg(interp, args, 1, len as f64)?.max(0.0) as usize;
    Ok(Value::from(utf16_slice(&text, start, start.saturating_add(count))))
}

fn proto_to_upper_case(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    Ok(Value::from(this_string(interp, this, "toUpperCase")?.to_uppercase()))
}

fn proto_to_lower_case(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    Ok(Value::from(this_string(interp, this, "toLowerCase")?.to_lowercase()))
}

fn proto_trim(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "trim")?;
    Ok(Value::from(text.trim_matches(is_js_whitespace)))
}

fn proto_trim_start(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "trimStart")?;
    Ok(Value::from(text.trim_start_matches(is_js_whitespace)))
}

fn proto_trim_end(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "trimEnd")?;
    Ok(Value::from(text.trim_end_matches(is_js_whitespace)))
}

fn padding(interp: &mut Interpreter, text: &str, args: &[Value]) -> Result<String, Thrown> {
    let target = to_integer(number_arg(interp, args, 0)?).max(0.0) as usize;
    let filler = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        other => interp.to_string(&other)?,
    };
    let len = utf16_len(text);
    if target <= len || filler.is_empty() {
        return Ok(String::new());
    }
    interp.check_string_length(target)?;
    let needed = target - len;
    let repeated = filler.repeat(needed / utf16_len(&filler) + 1);
    Ok(utf16_slice(&repeated, 0, needed))
}

fn proto_pad_start(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "padStart")?;
    let pad = padding(interp, &text, args)?;
    Ok(Value::from(pad + &text))
}

fn proto_pad_end(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "padEnd")?;
    let pad = padding(interp, &text, args)?;
    Ok(Value::from(text + &pad))
}

fn proto_repeat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "repeat")?;
    let count = to_integer(number_arg(interp, args, 0)?);
    if count < 0.0 || count.is_infinite() {
        return Err(interp.range_error(format!(
            "Invalid count value: {}",
            describe_for_error(&Value::Number(count))
        )));
    }
    let count = count as usize;
    if !text.is_empty() {
        interp.check_string_length(utf16_len(&text).saturating_mul(count))?;
    }
    Ok(Value::from(text.repeat(count)))
}

fn proto_concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let mut text = this_string(interp, this, "concat")?;
    for value in args {
        let part = interp.to_string(value)?;
        interp.check_joined_length(&[&text, &part], "")?;
        text.push_str(&part);
    }
    Ok(Value::from(text))
}

fn proto_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    match this {
        Value::String(_) => Ok(this.clone()),
        other => Err(interp.type_error(format!(
            "String.prototype.valueOf requires that 'this' be a String, not {}",
            describe_for_error(other)
        ))),
    }
}

// ============================================================================
// SPLIT, REPLACE, MATCH
// ============================================================================

fn proto_split(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "split")?;
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        other => crate::runtime::convert::to_uint32(interp.to_number(&other)?) as usize,
    };
    let separator = arg(args, 0);
    let mut parts: Vec<Value> = if let Some(object) = regexp::regexp_of(&separator) {
        let Some((regex, _, _)) = regexp::regexp_parts(&object) else {
            return Ok(interp.new_array(vec![Value::from(text)]));
        };
        let mut parts = Vec::new();
        let mut last = 0;
        for found in regexp::find_matches(&regex, &text, true) {
            if found.end == found.start && (found.start == 0 || found.start == text.len()) {
                continue;
            }
            parts.push(Value::from(&text[last..found.start]));
            parts.extend(found.groups.iter().map(|g| g.as_deref().map(Value::from).unwrap_or_default()));
            last = found.end;
        }
        parts.push(Value::from(&text[last..]));
        parts
    } else if matches!(separator, Value::Undefined) {
        vec![Value::from(text)]
    } else {
        let separator = interp.to_string(&separator)?;
        if separator.is_empty() {
            text.encode_utf16()
                .map(|u| Value::from(String::from_utf16_lossy(&[u])))
                .collect()
        } else {
            text.split(separator.as_str()).map(Value::from).collect()
        }
    };
    parts.truncate(limit);
    Ok(interp.new_array(parts))
}

/// Matches for `replace` / `replaceAll` with a string or RegExp pattern.
fn replacement_matches(interp: &mut Interpreter, text: &str, pattern: &Value, all: bool) -> Result<Vec<Found>, Thrown> {
    if let Some(object) = regexp::regexp_of(pattern) {
        let Some((regex, global, _)) = regexp::regexp_parts(&object) else {
            return Ok(Vec::new());
        };
        if all && !global {
            return Err(interp.type_error("replaceAll must be called with a global RegExp"));
        }
        return Ok(regexp::find_matches(&regex, text, global));
    }
    let needle = interp.to_string(pattern)?;
    let plain = |(start, matched): (usize, &str)| Found {
        start,
        end: start + matched.len(),
        text: matched.to_string(),
        groups: Vec::new(),
        named: Vec::new(),
    };
    Ok(if all {
        text.match_indices(needle.as_str()).map(plain).collect()
    } else {
        text.match_indices(needle.as_str()).take(1).map(plain).collect()
    })
}

fn replace_with(interp: &mut Interpreter, this: &Value, args: &[Value], all: bool) -> NativeResult {
    let text = this_string(interp, this, if all { "replaceAll" } else { "replace" })?;
    let matches = replacement_matches(interp, &text, &arg(args, 0), all)?;
    let replacement = arg(args, 1);
    let template = if replacement.is_callable() {
        None
    } else {
        Some(interp.to_string(&replacement)?)
    };
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in &matches {
        out.push_str(&text[last..found.start]);
        match &template {
            Some(template) => out.push_str(&regexp::expand_replacement(template, found, &text)),
            None => {
                let mut call_args = vec![Value::from(found.text.as_str())];
                call_args.extend(found.groups.iter().map(|g| g.as_deref().map(Value::from).unwrap_or_default()));
                call_args.push(Value::from(utf16_len(&text[..found.start])));
                call_args.push(Value::from(text.as_str()));
                let result = interp.call(&replacement, Value::Undefined, &call_args)?;
                out.push_str(&interp.to_string(&result)?);
            }
        }
        last = found.end;
    }
    out.push_str(&text[last..]);
    Ok(Value::from(out))
}

fn proto_replace(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    replace_with(interp, this, args, false)
}

fn proto_replace_all(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    replace_with(interp, this, args, true)
}

/// The argument as a RegExp object, compiling strings as patterns.
fn as_regexp(interp: &mut Interpreter, value: &Value, flags: &str) -> Result<crate::runtime::Obj, Thrown> {
    if let Some(object) = regexp::regexp_of(value) {
        return Ok(object);
    }
    let pattern = match value {
        Value::Undefined => String::new(),
        other => interp.to_string(other)?,
    };
    let created = regexp::create_regexp(interp, &pattern, flags)?;
    regexp::regexp_of(&created).ok_or_else(|| interp.type_error("Invalid regular expression"))
}

fn proto_match(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "match")?;
    let object = as_regexp(interp, &arg(args, 0), "")?;
    let Some((regex, global, _)) = regexp::regexp_parts(&object) else {
        return Ok(Value::Null);
    };
    if !global {
        return regexp::exec(interp, &object, &text);
    }
    let found = regexp::find_matches(&regex, &text, true);
    if found.is_empty() {
        return Ok(Value::Null);
    }
    let items = found.into_iter().map(|f| Value::from(f.text)).collect();
    Ok(interp.new_array(items))
}

fn proto_match_all(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let text = this_string(interp, this, "matchAll")?;
    let object = as_regexp(interp, &arg(args, 0), "g")?;
    let Some((regex, global, _)) = regexp::regexp_parts(&object) else {
        return Ok(interp.new_array(Vec::new()));
    };
    if !global {
        return Err(interp.type_error("String.prototype.matchAll called with a non-global RegExp argument"));
    }
    let items = regexp::find_matches(&regex, &text, true)
        .iter()
        .map(|found| regexp::match_array(interp, found, &text))
        .collect();
    Ok(interp.new_array(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_units() {
        let hay = units("hello");
        assert_eq!(find_units(&hay, &units("l"), 0), Some(2));
        assert_eq!(find_units(&hay, &units("l"), 3), Some(3));
        assert_eq!(find_units(&hay, &units(""), 9), Some(5));
        assert_eq!(find_units(&hay, &units("z"), 0), None);
    }
}
