//! Value rendering for console output and assertion messages.
//!
//! Rendering never runs user code: accessors are shown as `[Getter]` rather
//! than invoked, and cycles print as `[Circular]`.

use crate::runtime::convert::number_to_string;
use crate::runtime::object::{FunctionObject, Obj, ObjectKind, Slot};
use crate::runtime::Value;

const MAX_DEPTH: usize = 4;

/// Which host's formatting to imitate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Style {
    /// `util.inspect`, as `console.log` prints.
    Console,
    /// chai's `inspect`, as assertion messages print.
    Assertion,
}

pub fn inspect(value: &Value, style: Style) -> String {
    let mut seen = Vec::new();
    render(value, style, 0, &mut seen)
}

/// Top-level `console.log` argument: strings print raw.
pub fn console_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => inspect(other, Style::Console),
    }
}

/// Short rendering used inside runtime error messages.
pub fn describe_for_error(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Object(object) if object.is_callable() => inspect(value, Style::Console),
        Value::Object(object) if object.is_array() => "object".to_string(),
        Value::Object(_) => "object".to_string(),
        other => inspect(other, Style::Console),
    }
}

fn render(value: &Value, style: Style, depth: usize, seen: &mut Vec<usize>) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if *n == 0.0 && n.is_sign_negative() => "-0".to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::String(s) => quote(s),
        Value::Object(object) => {
            if seen.contains(&object.id()) {
                return "[Circular]".to_string();
            }
            seen.push(object.id());
            let text = render_object(object, style, depth, seen);
            seen.pop();
            text
        }
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn render_key(key: &str) -> String {
    let mut chars = key.chars();
    let identifier = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if identifier {
        key.to_string()
    } else {
        quote(key)
    }
}

/// `name` of a function object, read without running getters.
pub fn function_name(object: &Obj) -> String {
    match object.own_data("name") {
        Some(Value::String(name)) => name.to_string(),
        _ => String::new(),
    }
}

/// Inherited data property, read without running getters.
pub fn inherited_data(object: &Obj, key: &str) -> Option<Value> {
    let mut current = Some(object.clone());
    while let Some(candidate) = current {
        if let Some(value) = candidate.own_data(key) {
            return Some(value);
        }
        current = candidate.proto();
    }
    None
}

/// Constructor name shown before class instances, when not plain `Object`.
fn constructor_prefix(object: &Obj) -> Option<String> {
    let proto = object.proto()?;
    let Some(Value::Object(constructor)) = proto.own_data("constructor") else {
        return None;
    };
    let name = function_name(&constructor);
    (!name.is_empty() && name != "Object").then_some(name)
}

fn render_object(object: &Obj, style: Style, depth: usize, seen: &mut Vec<usize>) -> String {
    enum Shape {
        Function { class: bool },
        Error,
        RegExp(String),
        Array(Vec<Value>),
        Map(Vec<(Value, Value)>),
        Set(Vec<Value>),
        Ordinary,
    }
    let shape = match &object.borrow().kind {
        ObjectKind::Function(FunctionObject::Closure(closure)) => Shape::Function {
            class: closure.class.is_some(),
        },
        ObjectKind::Function(_) => Shape::Function { class: false },
        ObjectKind::Error => Shape::Error,
        ObjectKind::RegExp(data) => Shape::RegExp(format!("/{}/{}", data.source, data.flags)),
        ObjectKind::Array(items) => Shape::Array(items.clone()),
        ObjectKind::Map(entries) => Shape::Map(entries.clone()),
        ObjectKind::Set(items) => Shape::Set(items.clone()),
        ObjectKind::Ordinary => Shape::Ordinary,
    };

    match shape {
        Shape::Function { class } => {
            let name = function_name(object);
            match (class, style, name.is_empty()) {
                (true, _, true) => "[class (anonymous)]".to_string(),
                (true, _, false) => format!("[class {}]", name),
                (false, Style::Console, true) => "[Function (anonymous)]".to_string(),
                (false, Style::Console, false) => format!("[Function: {}]", name),
                (false, Style::Assertion, true) => "[Function]".to_string(),
                (false, Style::Assertion, false) => format!("[Function {}]", name),
            }
        }
        Shape::Error => {
            let name = match inherited_data(object, "name") {
                Some(Value::String(name)) => name.to_string(),
                _ => "Error".to_string(),
            };
            match object.own_data("message") {
                Some(Value::String(message)) if !message.is_empty() => format!("{}: {}", name, message),
                _ => name,
            }
        }
        Shape::RegExp(text) => text,
        Shape::Array(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            if depth >= MAX_DEPTH {
                return "[Array]".to_string();
            }
            let parts: Vec<String> = items.iter().map(|v| render(v, style, depth + 1, seen)).collect();
            format!("[ {} ]", parts.join(", "))
        }
        Shape::Map(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{} => {}",
                        render(k, style, depth + 1, seen),
                        render(v, style, depth + 1, seen)
                    )
                })
                .collect();
            match style {
                Style::Console if parts.is_empty() => "Map(0) {}".to_string(),
                Style::Console => format!("Map({}) {{ {} }}", parts.len(), parts.join(", ")),
                Style::Assertion if parts.is_empty() => "Map{}".to_string(),
                Style::Assertion => format!("Map{{ {} }}", parts.join(", ")),
            }
        }
        Shape::Set(items) => {
            let parts: Vec<String> = items.iter().map(|v| render(v, style, depth + 1, seen)).collect();
            match style {
                Style::Console if parts.is_empty() => "Set(0) {}".to_string(),
                Style::Console => format!("Set({}) {{ {} }}", parts.len(), parts.join(", ")),
                Style::Assertion if parts.is_empty() => "Set{}".to_string(),
                Style::Assertion => format!("Set{{ {} }}", parts.join(", ")),
            }
        }
        Shape::Ordinary => {
            let prefix = match style {
                Style::Console => constructor_prefix(object).map(|name| format!("{} ", name)),
                Style::Assertion => None,
            };
            let keys = object.borrow().properties.enumerable_keys();
            if keys.is_empty() {
                return format!("{}{{}}", prefix.unwrap_or_default());
            }
            if depth >= MAX_DEPTH {
                return "[Object]".to_string();
            }
            let mut parts = Vec::with_capacity(keys.len());
            for key in keys {
                let slot = object.borrow().properties.get(&key).map(|p| p.slot.clone());
                let rendered = match slot {
                    Some(Slot::Data(value)) => render(&value, style, depth + 1, seen),
                    Some(Slot::Accessor { get: Some(_), set: Some(_) }) => "[Getter/Setter]".to_string(),
                    Some(Slot::Accessor { get: Some(_), .. }) => "[Getter]".to_string(),
                    Some(Slot::Accessor { .. }) => "[Setter]".to_string(),
                    None => continue,
                };
                parts.push(format!("{}: {}", render_key(&key), rendered));
            }
            format!("{}{{ {} }}", prefix.unwrap_or_default(), parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Interpreter, InterpreterConfig, NullSink};

    #[test]
    fn test_primitives() {
        assert_eq!(inspect(&Value::from("hi"), Style::Assertion), "'hi'");
        assert_eq!(inspect(&Value::Number(-0.0), Style::Assertion), "-0");
        assert_eq!(inspect(&Value::Undefined, Style::Console), "undefined");
        assert_eq!(console_text(&Value::from("raw")), "raw");
    }

    #[test]
    fn test_structures() {
        let interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        let array = interp.new_array(vec![Value::Number(1.0), Value::from("a")]);
        assert_eq!(inspect(&array, Style::Assertion), "[ 1, 'a' ]");
        let object = interp.new_object();
        object.set_own("a", Value::Number(1.0));
        object.set_own("b-c", Value::Null);
        assert_eq!(inspect(&Value::Object(object.clone()), Style::Console), "{ a: 1, 'b-c': null }");
        object.set_own("self", Value::Object(object.clone()));
        assert!(inspect(&Value::Object(object), Style::Console).contains("[Circular]"));
    }

    #[test]
    fn test_errors() {
        let interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        let error = interp.make_error(crate::runtime::ErrorKind::TypeError, "bad");
        assert_eq!(inspect(&error, Style::Console), "TypeError: bad");
    }
}
