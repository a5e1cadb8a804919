//! Lexical environments.
//!
//! A chain of scopes, innermost first. Function scopes hold `var` bindings,
//! parameters and the internal `this` binding; block scopes hold `let`,
//! `const` and `class` bindings. A binding without a value is in its
//! temporal dead zone.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::Value;

/// Internal binding names. None of them is a valid identifier.
pub const THIS: &str = "this";
pub const NEW_TARGET: &str = "%new.target";
pub const ACTIVE_FUNCTION: &str = "%function";
pub const HOME_OBJECT: &str = "%home";

#[derive(Clone)]
pub struct Env(Rc<RefCell<Scope>>);

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<Env>,
}

struct Binding {
    value: Option<Value>,
    mutable: bool,
}

pub enum Lookup {
    Value(Value),
    Uninitialized,
    Unbound,
}

pub enum Store {
    Done,
    Constant,
    Uninitialized,
    Unbound,
}

impl Env {
    pub fn root() -> Self {
        Env(Rc::new(RefCell::new(Scope::default())))
    }

    pub fn child(&self) -> Self {
        Env(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    fn parent(&self) -> Option<Env> {
        self.0.borrow().parent.clone()
    }

    /// Create or replace a binding in this scope.
    pub fn declare(&self, name: &str, value: Option<Value>, mutable: bool) {
        self.0
            .borrow_mut()
            .bindings
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// `var` semantics: a redeclaration keeps the current value.
    pub fn declare_var(&self, name: &str) {
        let mut scope = self.0.borrow_mut();
        scope.bindings.entry(name.to_string()).or_insert(Binding {
            value: Some(Value::Undefined),
            mutable: true,
        });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    /// Give a binding of this scope its first value, ending its dead zone.
    pub fn initialize(&self, name: &str, value: Value) {
        if let Some(binding) = self.0.borrow_mut().bindings.get_mut(name) {
            binding.value = Some(value);
        }
    }

    pub fn lookup(&self, name: &str) -> Lookup {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if let Some(binding) = env.0.borrow().bindings.get(name) {
                return match &binding.value {
                    Some(value) => Lookup::Value(value.clone()),
                    None => Lookup::Uninitialized,
                };
            }
            current = env.parent();
        }
        Lookup::Unbound
    }

    pub fn assign(&self, name: &str, value: Value) -> Store {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if let Some(binding) = env.0.borrow_mut().bindings.get_mut(name) {
                if binding.value.is_none() {
                    return Store::Uninitialized;
                }
                if !binding.mutable {
                    return Store::Constant;
                }
                binding.value = Some(value);
                return Store::Done;
            }
            current = env.parent();
        }
        Store::Unbound
    }

    /// Initialize the nearest `this` binding; used once `super()` returns.
    /// Returns false when it was already initialized.
    pub fn bind_this(&self, value: Value) -> bool {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if let Some(binding) = env.0.borrow_mut().bindings.get_mut(THIS) {
                if binding.value.is_some() {
                    return false;
                }
                binding.value = Some(value);
                return true;
            }
            current = env.parent();
        }
        false
    }

    /// Fresh scope with copies of `names`, for per-iteration loop bindings.
    pub fn copy_bindings(&self, parent: &Env, names: &[String]) -> Env {
        let copy = parent.child();
        {
            let source = self.0.borrow();
            let mut target = copy.0.borrow_mut();
            for name in names {
                if let Some(binding) = source.bindings.get(name) {
                    target.bindings.insert(
                        name.clone(),
                        Binding {
                            value: binding.value.clone(),
                            mutable: binding.mutable,
                        },
                    );
                }
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_assignment() {
        let outer = Env::root();
        outer.declare("x", Some(Value::Number(1.0)), true);
        let inner = outer.child();
        inner.declare("x", Some(Value::Number(2.0)), false);
        assert!(matches!(inner.lookup("x"), Lookup::Value(Value::Number(n)) if n == 2.0));
        assert!(matches!(inner.assign("x", Value::Null), Store::Constant));
        assert!(matches!(outer.assign("x", Value::Null), Store::Done));
        assert!(matches!(inner.lookup("y"), Lookup::Unbound));
    }

    #[test]
    fn test_dead_zone() {
        let env = Env::root();
        env.declare("x", None, true);
        assert!(matches!(env.lookup("x"), Lookup::Uninitialized));
        assert!(matches!(env.assign("x", Value::Null), Store::Uninitialized));
        env.initialize("x", Value::Bool(true));
        assert!(matches!(env.lookup("x"), Lookup::Value(Value::Bool(true))));
    }

    #[test]
    fn test_bind_this_once() {
        let env = Env::root();
        env.declare(THIS, None, false);
        let block = env.child();
        assert!(block.bind_this(Value::Null));
        assert!(!block.bind_this(Value::Null));
    }
}
