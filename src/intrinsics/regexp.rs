//! # RegExp
//!
//! Regular expressions run on the `regex` crate. JavaScript flags map onto
//! builder options (`i`, `m`, `s`); `g` and `y` are tracked here through
//! `lastIndex`. Indices visible to programs count UTF-16 code units, while
//! the engine works in byte offsets, so every boundary is converted.
//!
//! Backreferences and lookaround are not supported by the engine and report
//! an invalid-pattern `SyntaxError` when the expression is created.
//!
//! ## Members Provided
//!
//! - **Constructor**: `RegExp(pattern, flags)`
//! - **Prototype**: `test`, `exec`, `toString`, and the `source`, `flags`,
//!   `global`, `ignoreCase`, `multiline`, `sticky` getters

use regex::{Regex, RegexBuilder};
use tracing::trace;

use crate::intrinsics::helpers::{arg, constructor, getter, method, string_arg, NativeResult};
use crate::runtime::convert::utf16_len;
use crate::runtime::object::RegExpData;
use crate::runtime::{ErrorKind, Interpreter, JsObject, Obj, ObjectKind, Thrown, Value};

pub fn register(interp: &mut Interpreter) {
    let prototype = interp.realm.regexp_prototype.clone();
    constructor(interp, "RegExp", 2, &prototype, regexp_construct, Some(regexp_construct));

    method(interp, &prototype, "test", 1, proto_test);
    method(interp, &prototype, "exec", 1, proto_exec);
    method(interp, &prototype, "toString", 0, proto_to_string);

    getter(interp, &prototype, "source", |interp, this, _| {
        with_data(interp, this, |data| Value::from(data.source.as_str()))
    });
    getter(interp, &prototype, "flags", |interp, this, _| {
        with_data(interp, this, |data| Value::from(data.flags.as_str()))
    });
    getter(interp, &prototype, "global", |interp, this, _| {
        with_data(interp, this, |data| Value::Bool(data.global()))
    });
    getter(interp, &prototype, "ignoreCase", |interp, this, _| {
        with_data(interp, this, |data| Value::Bool(data.flags.contains('i')))
    });
    getter(interp, &prototype, "multiline", |interp, this, _| {
        with_data(interp, this, |data| Value::Bool(data.flags.contains('m')))
    });
    getter(interp, &prototype, "sticky", |interp, this, _| {
        with_data(interp, this, |data| Value::Bool(data.sticky()))
    });
}

// ============================================================================
// COMPILATION
// ============================================================================

/// Rewrite JavaScript-only escapes into the engine's syntax.
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some('/')) => {
                out.push('/');
                chars.next();
            }
            ('\\', Some(&next)) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn compile(pattern: &str, flags: &str) -> Result<Regex, String> {
    let mut seen = String::new();
    for flag in flags.chars() {
        if !"gimsuy".contains(flag) || seen.contains(flag) {
            return Err(format!("Invalid flags supplied to RegExp constructor '{}'", flags));
        }
        seen.push(flag);
    }
    RegexBuilder::new(&translate(pattern))
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|_| format!("Invalid regular expression: /{}/{}: Invalid pattern", pattern, flags))
}

/// A new RegExp object, as a `/pattern/flags` literal evaluates to.
pub fn create_regexp(interp: &mut Interpreter, pattern: &str, flags: &str) -> NativeResult {
    let regex = compile(pattern, flags).map_err(|message| interp.throw(ErrorKind::SyntaxError, message))?;
    trace!(pattern, flags, "regexp compiled");
    let object = interp.alloc(JsObject::new(
        Some(interp.realm.regexp_prototype.clone()),
        ObjectKind::RegExp(Box::new(RegExpData {
            source: pattern.to_string(),
            flags: flags.to_string(),
            regex,
        })),
    ));
    object.set_hidden("lastIndex", Value::Number(0.0));
    Ok(Value::Object(object))
}

fn regexp_construct(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let flags = match arg(args, 1) {
        Value::Undefined => None,
        other => Some(interp.to_string(&other)?),
    };
    if let Some(object) = regexp_of(&arg(args, 0)) {
        let (source, own_flags) = {
            let borrowed = object.borrow();
            match &borrowed.kind {
                ObjectKind::RegExp(data) => (data.source.clone(), data.flags.clone()),
                _ => (String::new(), String::new()),
            }
        };
        return create_regexp(interp, &source, flags.as_deref().unwrap_or(&own_flags));
    }
    let source = match arg(args, 0) {
        Value::Undefined => "(?:)".to_string(),
        other => interp.to_string(&other)?,
    };
    create_regexp(interp, &source, flags.as_deref().unwrap_or_default())
}

// ============================================================================
// MATCHING
// ============================================================================

/// The object when `value` is a RegExp.
pub fn regexp_of(value: &Value) -> Option<Obj> {
    match value {
        Value::Object(object) if matches!(object.borrow().kind, ObjectKind::RegExp(_)) => Some(object.clone()),
        _ => None,
    }
}

fn with_data(interp: &Interpreter, this: &Value, f: impl FnOnce(&RegExpData) -> Value) -> NativeResult {
    if let Value::Object(object) = this {
        if let ObjectKind::RegExp(data) = &object.borrow().kind {
            return Ok(f(data));
        }
    }
    Err(interp.type_error("RegExp method called on incompatible receiver"))
}

/// Engine, `g`, `y` of a RegExp object.
pub fn regexp_parts(object: &Obj) -> Option<(Regex, bool, bool)> {
    match &object.borrow().kind {
        ObjectKind::RegExp(data) => Some((data.regex.clone(), data.global(), data.sticky())),
        _ => None,
    }
}

/// One match: byte range plus capture texts (`None` for groups that did not take part).
pub struct Found {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub groups: Vec<Option<String>>,
    pub named: Vec<(String, Option<String>)>,
}

fn found_from(regex: &Regex, captures: &regex::Captures<'_>) -> Option<Found> {
    let whole = captures.get(0)?;
    let groups = captures
        .iter()
        .skip(1)
        .map(|m| m.map(|m| m.as_str().to_string()))
        .collect();
    let named = regex
        .capture_names()
        .flatten()
        .map(|name| (name.to_string(), captures.name(name).map(|m| m.as_str().to_string())))
        .collect();
    Some(Found {
        start: whole.start(),
        end: whole.end(),
        text: whole.as_str().to_string(),
        groups,
        named,
    })
}

/// Every match, or only the first.
pub fn find_matches(regex: &Regex, text: &str, all: bool) -> Vec<Found> {
    if all {
        regex
            .captures_iter(text)
            .filter_map(|captures| found_from(regex, &captures))
            .collect()
    } else {
        regex
            .captures(text)
            .and_then(|captures| found_from(regex, &captures))
            .into_iter()
            .collect()
    }
}

/// Byte offset of the `units`-th UTF-16 code unit.
fn byte_offset(text: &str, units: usize) -> usize {
    let mut count = 0;
    for (offset, c) in text.char_indices() {
        if count >= units {
            return offset;
        }
        count += c.len_utf16();
    }
    text.len()
}

/// The match array `exec` returns: captures plus `index`, `input`, `groups`.
pub fn match_array(interp: &Interpreter, found: &Found, input: &str) -> Value {
    let mut items = vec![Value::from(found.text.as_str())];
    items.extend(
        found
            .groups
            .iter()
            .map(|g| g.as_deref().map(Value::from).unwrap_or_default()),
    );
    let array = interp.new_array(items);
    if let Value::Object(object) = &array {
        object.set_own("index", Value::from(utf16_len(&input[..found.start])));
        object.set_own("input", Value::from(input));
        let groups = if found.named.is_empty() {
            Value::Undefined
        } else {
            let groups = interp.new_object();
            for (name, value) in &found.named {
                groups.set_own(name.clone(), value.as_deref().map(Value::from).unwrap_or_default());
            }
            Value::Object(groups)
        };
        object.set_own("groups", groups);
    }
    array
}

/// `RegExp.prototype.exec`, honoring `lastIndex` for `g` and `y`.
pub fn exec(interp: &mut Interpreter, object: &Obj, text: &str) -> NativeResult {
    let Some((regex, global, sticky)) = regexp_parts(object) else {
        return Err(interp.type_error("RegExp method called on incompatible receiver"));
    };
    let this = Value::Object(object.clone());
    let tracks_position = global || sticky;
    let last_index = if tracks_position {
        let value = interp.get_property(&this, "lastIndex")?;
        interp.to_number(&value)?.max(0.0) as usize
    } else {
        0
    };
    if last_index > utf16_len(text) {
        interp.set_property(&this, "lastIndex", Value::Number(0.0))?;
        return Ok(Value::Null);
    }
    let start = byte_offset(text, last_index);
    let found = regex
        .captures_at(text, start)
        .and_then(|captures| found_from(&regex, &captures))
        .filter(|found| !sticky || found.start == start);
    match found {
        None => {
            if tracks_position {
                interp.set_property(&this, "lastIndex", Value::Number(0.0))?;
            }
            Ok(Value::Null)
        }
        Some(found) => {
            if tracks_position {
                let end = utf16_len(&text[..found.end]);
                interp.set_property(&this, "lastIndex", Value::from(end))?;
            }
            Ok(match_array(interp, &found, text))
        }
    }
}

fn this_regexp(interp: &Interpreter, this: &Value) -> Result<Obj, Thrown> {
    regexp_of(this).ok_or_else(|| interp.type_error("RegExp method called on incompatible receiver"))
}

fn proto_exec(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let object = this_regexp(interp, this)?;
    let text = string_arg(interp, args, 0)?;
    exec(interp, &object, &text)
}

fn proto_test(interp: &mut Interpreter, this: &Value, args: &[Value]) -> NativeResult {
    let object = this_regexp(interp, this)?;
    let text = string_arg(interp, args, 0)?;
    Ok(Value::Bool(!matches!(exec(interp, &object, &text)?, Value::Null)))
}

fn proto_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> NativeResult {
    with_data(interp, this, |data| Value::from(format!("/{}/{}", data.source, data.flags)))
}

// ============================================================================
// REPLACEMENT TEMPLATES
// ============================================================================

/// Expand `$&`, `$1`…`$99`, `$<name>`, `` $` ``, `$'` and `$$`.
pub fn expand_replacement(template: &str, found: &Found, input: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                out.push_str(&found.text);
                i += 2;
            }
            '`' => {
                out.push_str(&input[..found.start]);
                i += 2;
            }
            '\'' => {
                out.push_str(&input[found.end..]);
                i += 2;
            }
            '<' if !found.named.is_empty() => {
                let close = chars[i + 2..].iter().position(|c| *c == '>');
                match close {
                    Some(len) => {
                        let name: String = chars[i + 2..i + 2 + len].iter().collect();
                        if let Some((_, Some(value))) = found.named.iter().find(|(n, _)| *n == name) {
                            out.push_str(value);
                        }
                        i += len + 3;
                    }
                    None => {
                        out.push('$');
                        i += 1;
                    }
                }
            }
            d if d.is_ascii_digit() => {
                let one = d.to_digit(10).unwrap_or(0) as usize;
                let two = chars
                    .get(i + 2)
                    .and_then(|c| c.to_digit(10))
                    .map(|second| one * 10 + second as usize)
                    .filter(|n| *n >= 1 && *n <= found.groups.len());
                match two {
                    Some(n) => {
                        out.push_str(found.groups[n - 1].as_deref().unwrap_or_default());
                        i += 3;
                    }
                    None if one >= 1 && one <= found.groups.len() => {
                        out.push_str(found.groups[one - 1].as_deref().unwrap_or_default());
                        i += 2;
                    }
                    None => {
                        out.push('$');
                        i += 1;
                    }
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_escaped_slash() {
        assert_eq!(translate(r"a\/b\d"), r"a/b\d");
    }

    #[test]
    fn test_invalid_flags() {
        assert!(compile("a", "gg").is_err());
        assert!(compile("a", "x").is_err());
        assert!(compile("a", "gi").is_ok());
    }

    #[test]
    fn test_expand_replacement() {
        let regex = Regex::new(r"(\w+)@(\w+)").unwrap();
        let input = "mail bob@host now";
        let found = find_matches(&regex, input, false).remove(0);
        assert_eq!(expand_replacement("$2:$1 [$&] $$", &found, input), "host:bob [bob@host] $");
        assert_eq!(expand_replacement("$`|$'", &found, input), "mail | now");
    }

    #[test]
    fn test_byte_offset_counts_utf16_units() {
        assert_eq!(byte_offset("a😀b", 3), 5);
        assert_eq!(byte_offset("abc", 10), 3);
    }
}
