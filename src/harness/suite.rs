//! Suite registration.
//!
//! `describe` and `it` are native functions closing over one run's
//! [`SuiteBuilder`]. Registration never runs case bodies; `describe` does
//! run its callback immediately so nested declarations land in the group.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use crate::intrinsics::helpers::arg;
use crate::runtime::inspect::describe_for_error;
use crate::runtime::object::{FunctionObject, NativeFn, NativeFunction};
use crate::runtime::{Interpreter, Thrown, Value};

/// A registered case: a name and a zero-argument body.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub body: Value,
}

#[derive(Debug, Clone, Default)]
pub struct TestGroup {
    pub name: String,
    pub cases: Vec<TestCase>,
    pub groups: Vec<TestGroup>,
}

impl TestGroup {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Cases in this group and all nested groups.
    pub fn case_count(&self) -> usize {
        self.cases.len() + self.groups.iter().map(TestGroup::case_count).sum::<usize>()
    }
}

/// `describe` or `it` called after registration ended, from inside a case.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Cannot register a {0} while the suite is running")]
pub struct SuiteClosed(&'static str);

/// Per-run suite tree under construction.
#[derive(Debug)]
pub struct SuiteBuilder {
    /// Open groups; the bottom entry is the root.
    stack: Vec<TestGroup>,
}

pub type SharedBuilder = Rc<RefCell<SuiteBuilder>>;

impl Default for SuiteBuilder {
    fn default() -> Self {
        Self {
            stack: vec![TestGroup::named("")],
        }
    }
}

impl SuiteBuilder {
    pub fn shared() -> SharedBuilder {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn open_group(&mut self, name: impl Into<String>) -> Result<(), SuiteClosed> {
        if self.stack.is_empty() {
            return Err(SuiteClosed("group"));
        }
        self.stack.push(TestGroup::named(name));
        Ok(())
    }

    pub fn close_group(&mut self) {
        if self.stack.len() > 1 {
            if let Some(group) = self.stack.pop() {
                if let Some(parent) = self.stack.last_mut() {
                    parent.groups.push(group);
                }
            }
        }
    }

    pub fn add_case(&mut self, name: impl Into<String>, body: Value) -> Result<(), SuiteClosed> {
        let group = self.stack.last_mut().ok_or(SuiteClosed("case"))?;
        group.cases.push(TestCase {
            name: name.into(),
            body,
        });
        Ok(())
    }

    /// Close any groups left open and return the root. Later registrations
    /// fail with [`SuiteClosed`].
    pub fn finish(&mut self) -> TestGroup {
        while self.stack.len() > 1 {
            self.close_group();
        }
        self.stack.pop().unwrap_or_default()
    }
}

// ============================================================================
// REGISTRATION FUNCTIONS
// ============================================================================

fn title_and_body(
    interp: &mut Interpreter,
    args: &[Value],
    what: &str,
) -> Result<(String, Value), Thrown> {
    let title = interp.to_string(&arg(args, 0))?;
    let body = arg(args, 1);
    if !body.is_callable() {
        return Err(interp.type_error(format!(
            "{} \"{}\" requires a function body, got {}",
            what,
            title,
            describe_for_error(&body)
        )));
    }
    Ok((title, body))
}

fn registration_function(interp: &Interpreter, name: &str, call: NativeFn) -> Value {
    let function = interp.create_function(
        FunctionObject::Native(NativeFunction {
            name: name.to_string(),
            call,
            construct: None,
        }),
        name,
        2,
    );
    Value::Object(function)
}

/// `describe(name, fn)`: open a group, run `fn`, close the group.
pub fn describe_function(interp: &Interpreter, builder: &SharedBuilder) -> Value {
    let builder = builder.clone();
    let call: NativeFn = Rc::new(move |interp: &mut Interpreter, _this: &Value, args: &[Value]| -> Result<Value, Thrown> {
        let (title, body) = title_and_body(interp, args, "describe")?;
        trace!(group = %title, "registering group");
        let opened = builder.borrow_mut().open_group(title);
        opened.map_err(|closed| interp.type_error(closed.to_string()))?;
        let result = interp.call(&body, Value::Undefined, &[]);
        builder.borrow_mut().close_group();
        result.map(|_| Value::Undefined)
    });
    registration_function(interp, "describe", call)
}

/// `it(name, fn)`: register a case in the innermost open group.
pub fn it_function(interp: &Interpreter, builder: &SharedBuilder) -> Value {
    let builder = builder.clone();
    let call: NativeFn = Rc::new(move |interp: &mut Interpreter, _this: &Value, args: &[Value]| -> Result<Value, Thrown> {
        let (title, body) = title_and_body(interp, args, "it")?;
        trace!(case = %title, "registering case");
        let added = builder.borrow_mut().add_case(title, body);
        added.map_err(|closed| interp.type_error(closed.to_string()))?;
        Ok(Value::Undefined)
    });
    registration_function(interp, "it", call)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_groups() {
        let mut builder = SuiteBuilder::default();
        builder.add_case("top", Value::Undefined).unwrap();
        builder.open_group("outer").unwrap();
        builder.add_case("a", Value::Undefined).unwrap();
        builder.open_group("inner").unwrap();
        builder.add_case("b", Value::Undefined).unwrap();
        builder.close_group();
        builder.add_case("c", Value::Undefined).unwrap();
        builder.close_group();

        let root = builder.finish();
        assert_eq!(root.cases.len(), 1);
        assert_eq!(root.groups[0].name, "outer");
        let names: Vec<_> = root.groups[0].cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(root.groups[0].groups[0].cases[0].name, "b");
        assert_eq!(root.case_count(), 4);
    }

    #[test]
    fn test_finish_closes_open_groups() {
        let mut builder = SuiteBuilder::default();
        builder.open_group("left open").unwrap();
        builder.add_case("x", Value::Undefined).unwrap();
        let root = builder.finish();
        assert_eq!(root.groups.len(), 1);
        assert_eq!(root.case_count(), 1);
    }

    #[test]
    fn test_registration_after_finish_is_refused() {
        let mut builder = SuiteBuilder::default();
        builder.finish();
        assert_eq!(builder.add_case("late", Value::Undefined), Err(SuiteClosed("case")));
        assert_eq!(
            builder.open_group("late").unwrap_err().to_string(),
            "Cannot register a group while the suite is running"
        );
    }
}
