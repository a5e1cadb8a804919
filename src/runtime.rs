//! Interpreter for the executable dialect.
//!
//! The runtime evaluates the JavaScript the transpiler emits, re-parsed from
//! text. It is a tree-walking interpreter over [`crate::syntax`] with
//! reference-counted objects, prototype chains and lexical environments.
//!
//! ## Module Structure
//!
//! - **`convert`**: primitive conversions (number formatting, `ToInt32`, …)
//! - **`object`**: heap objects, properties and callable kinds
//! - **`scope`**: lexical environments and bindings
//! - **`operators`**: abstract operations (`ToPrimitive`, equality, `+`, …)
//! - **`property`**: property access along prototype chains, iteration
//! - **`eval`**: statements, expressions, calls and classes
//! - **`inspect`**: value rendering for console output and assertion messages
//! - **`sandbox`**: the compile-then-invoke boundary the harness uses
//!
//! ## Limits
//!
//! Every statement and loop iteration costs one step against a budget that
//! the embedder resets per unit of work. Exhausting it produces
//! [`Thrown::BudgetExceeded`], which `catch` cannot intercept. Calls deeper
//! than the configured maximum throw a catchable `RangeError`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod convert;
pub mod eval;
pub mod inspect;
pub mod object;
pub mod operators;
pub mod property;
pub mod sandbox;
pub mod scope;

pub use convert::number_to_string;
pub use object::{Heap, JsObject, Obj, ObjectKind};
pub use sandbox::{compile_for_execution, invoke, Invocable};
pub use scope::Env;

use crate::intrinsics::{self, Realm};

// ============================================================================
// VALUES
// ============================================================================

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Obj),
}

impl Value {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(Obj::is_callable)
    }

    /// `ToBoolean`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(object) if object.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// `===`.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// SameValueZero, used by `includes`, `Map` and `Set`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// SameValue, used by `Object.is`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if *a == 0.0 && *b == 0.0 => {
                a.is_sign_negative() == b.is_sign_negative()
            }
            _ => self.same_value_zero(other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Obj> for Value {
    fn from(object: Obj) -> Self {
        Value::Object(object)
    }
}

// ============================================================================
// ABRUPT COMPLETION
// ============================================================================

/// Why evaluation stopped early.
#[derive(Clone, Debug)]
pub enum Thrown {
    /// A `throw`, from user code or the runtime. Catchable.
    Exception(Value),
    /// The step budget ran out. Not catchable.
    BudgetExceeded { budget: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
    AssertionError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::AssertionError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::AssertionError => "AssertionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// CONSOLE OUTPUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub text: String,
}

/// Destination for `console.*` output, injectable so runs stay testable.
pub trait OutputSink {
    fn emit(&mut self, level: ConsoleLevel, text: &str);
}

/// Discards output.
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _level: ConsoleLevel, _text: &str) {}
}

/// Collects output; clones share the same buffer.
#[derive(Clone, Default)]
pub struct CaptureSink(Rc<RefCell<Vec<ConsoleLine>>>);

impl CaptureSink {
    pub fn lines(&self) -> Vec<ConsoleLine> {
        self.0.borrow().clone()
    }
}

impl OutputSink for CaptureSink {
    fn emit(&mut self, level: ConsoleLevel, text: &str) {
        self.0.borrow_mut().push(ConsoleLine {
            level,
            text: text.to_string(),
        });
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub step_budget: u64,
    pub max_call_depth: usize,
    pub random_seed: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            step_budget: 5_000_000,
            max_call_depth: 2_000,
            random_seed: 0x5eed,
        }
    }
}

/// Longest string the engine builds, in UTF-16 code units (V8's limit on
/// 64-bit hosts).
pub const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

/// One realm plus the execution state of a single run.
///
/// Dropping the interpreter empties every object it allocated, so values that
/// outlive it read as empty ordinary objects.
pub struct Interpreter {
    heap: Heap,
    pub(crate) realm: Realm,
    global_env: Env,
    output: Box<dyn OutputSink>,
    steps: u64,
    step_budget: u64,
    depth: usize,
    max_call_depth: usize,
    pub(crate) rng: Xoshiro256PlusPlus,
    /// Arrays whose `join` is in progress; a nested join of one reads as `''`.
    pub(crate) joining: Vec<usize>,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig, output: Box<dyn OutputSink>) -> Self {
        let global_env = Env::root();
        global_env.declare(scope::THIS, Some(Value::Undefined), false);
        let heap = Heap::default();
        let mut interpreter = Self {
            realm: Realm::new(&heap),
            heap,
            global_env,
            output,
            steps: 0,
            step_budget: config.step_budget,
            depth: 0,
            max_call_depth: config.max_call_depth,
            rng: Xoshiro256PlusPlus::seed_from_u64(config.random_seed),
            joining: Vec::new(),
        };
        intrinsics::install(&mut interpreter);
        interpreter
    }

    pub fn global_env(&self) -> &Env {
        &self.global_env
    }

    pub fn global_object(&self) -> &Obj {
        &self.realm.global
    }

    pub fn emit(&mut self, level: ConsoleLevel, text: &str) {
        self.output.emit(level, text);
    }

    /// Start a fresh step budget.
    pub fn reset_budget(&mut self) {
        self.steps = 0;
    }

    pub fn steps_used(&self) -> u64 {
        self.steps
    }

    pub(crate) fn tick(&mut self) -> Result<(), Thrown> {
        self.steps += 1;
        if self.steps > self.step_budget {
            warn!(budget = self.step_budget, "step budget exhausted");
            return Err(Thrown::BudgetExceeded {
                budget: self.step_budget,
            });
        }
        Ok(())
    }

    pub(crate) fn enter_call(&mut self) -> Result<(), Thrown> {
        if self.depth >= self.max_call_depth {
            return Err(self.throw(ErrorKind::RangeError, "Maximum call stack size exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------

    /// A new error object of `kind`.
    pub fn make_error(&self, kind: ErrorKind, message: impl Into<String>) -> Value {
        let object = self.alloc(JsObject::new(
            Some(self.realm.error_prototype(kind)),
            ObjectKind::Error,
        ));
        object.set_hidden("message", Value::from(message.into()));
        Value::Object(object)
    }

    pub fn throw(&self, kind: ErrorKind, message: impl Into<String>) -> Thrown {
        Thrown::Exception(self.make_error(kind, message))
    }

    pub fn type_error(&self, message: impl Into<String>) -> Thrown {
        self.throw(ErrorKind::TypeError, message)
    }

    pub fn reference_error(&self, message: impl Into<String>) -> Thrown {
        self.throw(ErrorKind::ReferenceError, message)
    }

    pub fn range_error(&self, message: impl Into<String>) -> Thrown {
        self.throw(ErrorKind::RangeError, message)
    }

    /// Fails with `RangeError: Invalid string length` when a string of
    /// `length` UTF-16 units would exceed [`MAX_STRING_LENGTH`].
    pub fn check_string_length(&self, length: usize) -> Result<(), Thrown> {
        if length > MAX_STRING_LENGTH {
            return Err(self.range_error("Invalid string length"));
        }
        Ok(())
    }

    /// [`Interpreter::check_string_length`] for `parts` joined by
    /// `separator`. Byte lengths bound UTF-16 lengths from above, so the
    /// exact count is only taken near the limit.
    pub fn check_joined_length(&self, parts: &[&str], separator: &str) -> Result<(), Thrown> {
        let gaps = parts.len().saturating_sub(1);
        let total = |measure: &dyn Fn(&str) -> usize| {
            parts
                .iter()
                .map(|&p| measure(p))
                .fold(measure(separator).saturating_mul(gaps), usize::saturating_add)
        };
        if total(&str::len) <= MAX_STRING_LENGTH {
            return Ok(());
        }
        self.check_string_length(total(&convert::utf16_len))
    }

    // ------------------------------------------------------------------------
    // Object creation
    // ------------------------------------------------------------------------

    /// Every object of a run is created here.
    pub fn alloc(&self, object: JsObject) -> Obj {
        self.heap.alloc(object)
    }

    pub fn new_object(&self) -> Obj {
        self.alloc(JsObject::new(
            Some(self.realm.object_prototype.clone()),
            ObjectKind::Ordinary,
        ))
    }

    pub fn new_array(&self, items: Vec<Value>) -> Value {
        Value::Object(self.alloc(JsObject::new(
            Some(self.realm.array_prototype.clone()),
            ObjectKind::Array(items),
        )))
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        let released = self.heap.sweep();
        debug!(objects = released, "realm released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").truthy());
        assert!(Value::from("0").truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::Null.truthy());
    }

    #[test]
    fn test_same_value_variants() {
        let nan = Value::Number(f64::NAN);
        assert!(!nan.strict_equals(&nan));
        assert!(nan.same_value_zero(&nan));
        assert!(Value::Number(0.0).same_value_zero(&Value::Number(-0.0)));
        assert!(!Value::Number(0.0).same_value(&Value::Number(-0.0)));
    }

    #[test]
    fn test_step_budget() {
        let config = InterpreterConfig {
            step_budget: 2,
            ..InterpreterConfig::default()
        };
        let mut interpreter = Interpreter::new(config, Box::new(NullSink));
        assert!(interpreter.tick().is_ok());
        assert!(interpreter.tick().is_ok());
        assert!(matches!(interpreter.tick(), Err(Thrown::BudgetExceeded { budget: 2 })));
        interpreter.reset_budget();
        assert!(interpreter.tick().is_ok());
    }

    #[test]
    fn test_string_length_limit() {
        let interpreter = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        assert!(interpreter.check_string_length(MAX_STRING_LENGTH).is_ok());
        assert!(matches!(
            interpreter.check_string_length(MAX_STRING_LENGTH + 1),
            Err(Thrown::Exception(_))
        ));
        let parts = vec![""; 1 << 16];
        assert!(interpreter.check_joined_length(&parts, &"-".repeat(1 << 10)).is_ok());
        assert!(interpreter.check_joined_length(&parts, &"-".repeat(1 << 14)).is_err());
    }
}
