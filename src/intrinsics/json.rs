//! # JSON
//!
//! `stringify` walks runtime values directly; `parse` goes through
//! `serde_json` (with `preserve_order`, so object keys keep source order).
//!
//! ## Members Provided
//!
//! - **`JSON.stringify(value, replacer?, space?)`**
//! - **`JSON.parse(text, reviver?)`**

use serde_json::error::Category;

use crate::intrinsics::helpers::{arg, method, namespace, string_arg, NativeResult};
use crate::runtime::convert::{number_to_string, quote_json_string, to_integer};
use crate::runtime::object::ObjectKind;
use crate::runtime::{ErrorKind, Interpreter, Obj, Thrown, Value};

pub fn register(interp: &mut Interpreter) {
    let json = namespace(interp, "JSON");
    method(interp, &json, "stringify", 3, json_stringify);
    method(interp, &json, "parse", 2, json_parse);
}

// ============================================================================
// STRINGIFY
// ============================================================================

enum Replacer {
    None,
    Function(Value),
    Allow(Vec<String>),
}

struct Stringifier {
    replacer: Replacer,
    gap: String,
    stack: Vec<usize>,
}

impl Stringifier {
    /// The serialized form of `holder[key]`, or `None` when it is omitted.
    fn property(
        &mut self,
        interp: &mut Interpreter,
        holder: &Value,
        key: &str,
        value: Value,
        indent: &str,
    ) -> Result<Option<String>, Thrown> {
        let mut value = value;
        if let Value::Object(_) = value {
            let to_json = interp.get_property(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interp.call(&to_json, value.clone(), &[Value::from(key)])?;
            }
        }
        if let Replacer::Function(replacer) = &self.replacer {
            let replacer = replacer.clone();
            value = interp.call(&replacer, holder.clone(), &[Value::from(key), value])?;
        }
        Ok(match &value {
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) if n.is_finite() => Some(number_to_string(*n)),
            Value::Number(_) => Some("null".to_string()),
            Value::String(s) => Some(quote_json_string(s)),
            Value::Undefined => None,
            Value::Object(object) if object.is_callable() => None,
            Value::Object(object) => Some(self.object(interp, object, indent)?),
        })
    }

    fn object(&mut self, interp: &mut Interpreter, object: &Obj, indent: &str) -> Result<String, Thrown> {
        if self.stack.contains(&object.id()) {
            return Err(interp.type_error("Converting circular structure to JSON"));
        }
        self.stack.push(object.id());
        let inner = format!("{}{}", indent, self.gap);
        let holder = Value::Object(object.clone());

        let items = match &object.borrow().kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        };
        let parts = match items {
            Some(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let text = self.property(interp, &holder, &index.to_string(), item, &inner)?;
                    parts.push(text.unwrap_or_else(|| "null".to_string()));
                }
                parts
            }
            None => {
                let keys = match &self.replacer {
                    Replacer::Allow(keys) => keys.clone(),
                    _ => interp.own_keys(&holder),
                };
                let mut parts = Vec::new();
                for key in keys {
                    let value = interp.get_property(&holder, &key)?;
                    if let Some(text) = self.property(interp, &holder, &key, value, &inner)? {
                        let colon = if self.gap.is_empty() { ":" } else { ": " };
                        parts.push(format!("{}{}{}", quote_json_string(&key), colon, text));
                    }
                }
                parts
            }
        };
        self.stack.pop();

        let (open, close) = if object.is_array() { ('[', ']') } else { ('{', '}') };
        if parts.is_empty() {
            return Ok(format!("{}{}", open, close));
        }
        if self.gap.is_empty() {
            return Ok(format!("{}{}{}", open, parts.join(","), close));
        }
        let separator = format!(",\n{}", inner);
        Ok(format!("{}\n{}{}\n{}{}", open, inner, parts.join(&separator), indent, close))
    }
}

fn gap_from(interp: &mut Interpreter, space: &Value) -> Result<String, Thrown> {
    Ok(match space {
        Value::Number(n) => " ".repeat(to_integer(*n).clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        Value::Object(_) => {
            let primitive = interp.to_string(space)?;
            primitive.chars().take(10).collect()
        }
        _ => String::new(),
    })
}

fn replacer_from(interp: &mut Interpreter, replacer: &Value) -> Result<Replacer, Thrown> {
    if replacer.is_callable() {
        return Ok(Replacer::Function(replacer.clone()));
    }
    match replacer {
        Value::Object(object) if object.is_array() => {
            let mut keys = Vec::new();
            for item in interp.iterate(replacer)? {
                if matches!(item, Value::String(_) | Value::Number(_)) {
                    let key = interp.to_string(&item)?;
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
            Ok(Replacer::Allow(keys))
        }
        _ => Ok(Replacer::None),
    }
}

fn json_stringify(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let mut stringifier = Stringifier {
        replacer: replacer_from(interp, &arg(args, 1))?,
        gap: gap_from(interp, &arg(args, 2))?,
        stack: Vec::new(),
    };
    let value = arg(args, 0);
    let holder = interp.new_object();
    holder.set_own("", value.clone());
    let text = stringifier.property(interp, &Value::Object(holder), "", value, "")?;
    Ok(text.map(Value::from).unwrap_or_default())
}

// ============================================================================
// PARSE
// ============================================================================

/// Convert a parsed document into runtime values.
pub fn from_json(interp: &mut Interpreter, json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => {
            let items = items.into_iter().map(|item| from_json(interp, item)).collect();
            interp.new_array(items)
        }
        serde_json::Value::Object(map) => {
            let object = interp.new_object();
            for (key, value) in map {
                let value = from_json(interp, value);
                object.set_own(key, value);
            }
            Value::Object(object)
        }
    }
}

/// V8-style message for a malformed document.
fn parse_error_message(text: &str, error: &serde_json::Error) -> String {
    if error.classify() == Category::Eof {
        return "Unexpected end of JSON input".to_string();
    }
    let position: usize = text
        .split_inclusive('\n')
        .take(error.line().saturating_sub(1))
        .map(str::len)
        .sum::<usize>()
        + error.column().saturating_sub(1);
    match text.get(position..).and_then(|rest| rest.chars().next()) {
        Some(token) => format!("Unexpected token {} in JSON at position {}", token, position),
        None => "Unexpected end of JSON input".to_string(),
    }
}

fn internalize(interp: &mut Interpreter, holder: &Value, key: &str, reviver: &Value) -> NativeResult {
    let value = interp.get_property(holder, key)?;
    if let Value::Object(_) = value {
        for child in interp.own_keys(&value) {
            let revived = internalize(interp, &value, &child, reviver)?;
            if matches!(revived, Value::Undefined) {
                interp.delete_property(&value, &child)?;
            } else {
                interp.set_property(&value, &child, revived)?;
            }
        }
    }
    interp.call(reviver, holder.clone(), &[Value::from(key), value])
}

fn json_parse(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let text = string_arg(interp, args, 0)?;
    let json = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => json,
        Err(error) => {
            return Err(interp.throw(ErrorKind::SyntaxError, parse_error_message(&text, &error)));
        }
    };
    let value = from_json(interp, json);
    let reviver = arg(args, 1);
    if !reviver.is_callable() {
        return Ok(value);
    }
    let root = interp.new_object();
    root.set_own("", value);
    internalize(interp, &Value::Object(root), "", &reviver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let text = "{\"a\": x}";
        let error = serde_json::from_str::<serde_json::Value>(text).unwrap_err();
        let message = parse_error_message(text, &error);
        assert!(message.starts_with("Unexpected token"), "{}", message);
        assert!(message.contains("in JSON at position"), "{}", message);

        let text = "[1, 2";
        let error = serde_json::from_str::<serde_json::Value>(text).unwrap_err();
        assert_eq!(parse_error_message(text, &error), "Unexpected end of JSON input");
    }
}
