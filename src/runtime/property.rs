//! Property access along prototype chains, and iteration.

use crate::runtime::convert::{number_to_string, utf16_len, utf16_slice};
use crate::runtime::inspect::describe_for_error;
use crate::runtime::object::{array_index, Obj, ObjectKind, Property, Slot};
use crate::runtime::{Interpreter, Thrown, Value};

impl Interpreter {
    /// `base[key]`, including primitives.
    pub fn get_property(&mut self, base: &Value, key: &str) -> Result<Value, Thrown> {
        match base {
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                if matches!(base, Value::Null) { "null" } else { "undefined" },
                key
            ))),
            Value::Bool(_) => {
                let proto = self.realm.boolean_prototype.clone();
                self.get_from(&proto, key, base)
            }
            Value::Number(_) => {
                let proto = self.realm.number_prototype.clone();
                self.get_from(&proto, key, base)
            }
            Value::String(text) => {
                if key == "length" {
                    return Ok(Value::from(utf16_len(text)));
                }
                if let Some(index) = array_index(key) {
                    let index = index as usize;
                    return Ok(if index < utf16_len(text) {
                        Value::from(utf16_slice(text, index, index + 1))
                    } else {
                        Value::Undefined
                    });
                }
                let proto = self.realm.string_prototype.clone();
                self.get_from(&proto, key, base)
            }
            Value::Object(object) => self.get_from(object, key, base),
        }
    }

    /// Look `key` up starting at `object`; getters run with `receiver`.
    pub fn get_from(&mut self, object: &Obj, key: &str, receiver: &Value) -> Result<Value, Thrown> {
        let mut current = Some(object.clone());
        while let Some(candidate) = current {
            let slot = {
                let borrowed = candidate.borrow();
                if let ObjectKind::Array(items) = &borrowed.kind {
                    if key == "length" {
                        return Ok(Value::from(items.len()));
                    }
                    if let Some(index) = array_index(key) {
                        if let Some(item) = items.get(index as usize) {
                            return Ok(item.clone());
                        }
                    }
                }
                borrowed.properties.get(key).map(|p| p.slot.clone())
            };
            match slot {
                Some(Slot::Data(value)) => return Ok(value),
                Some(Slot::Accessor { get, .. }) => {
                    return match get {
                        Some(getter) => self.call(&Value::Object(getter), receiver.clone(), &[]),
                        None => Ok(Value::Undefined),
                    };
                }
                None => current = candidate.proto(),
            }
        }
        Ok(Value::Undefined)
    }

    /// `base[key] = value` with sloppy-mode failure semantics.
    pub fn set_property(&mut self, base: &Value, key: &str, value: Value) -> Result<(), Thrown> {
        match base {
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                if matches!(base, Value::Null) { "null" } else { "undefined" },
                key
            ))),
            Value::Object(object) => self.set_on(object, key, value, base),
            _ => Ok(()),
        }
    }

    fn set_on(&mut self, object: &Obj, key: &str, value: Value, receiver: &Value) -> Result<(), Thrown> {
        {
            let mut borrowed = object.borrow_mut();
            let extensible = borrowed.extensible;
            if let ObjectKind::Array(items) = &mut borrowed.kind {
                if key == "length" {
                    let Value::Number(n) = value else {
                        return Err(self.range_error("Invalid array length"));
                    };
                    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                        return Err(self.range_error("Invalid array length"));
                    }
                    if extensible {
                        items.resize(n as usize, Value::Undefined);
                    }
                    return Ok(());
                }
                if let Some(index) = array_index(key) {
                    if !extensible {
                        return Ok(());
                    }
                    let index = index as usize;
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                    return Ok(());
                }
            }
        }

        let mut current = Some(object.clone());
        while let Some(candidate) = current {
            let found = candidate
                .borrow()
                .properties
                .get(key)
                .map(|p| (p.slot.clone(), p.writable));
            match found {
                Some((Slot::Accessor { set, .. }, _)) => {
                    return match set {
                        Some(setter) => self
                            .call(&Value::Object(setter), receiver.clone(), &[value])
                            .map(|_| ()),
                        None => Ok(()),
                    };
                }
                Some((Slot::Data(_), false)) => return Ok(()),
                Some((Slot::Data(_), true)) => break,
                None => current = candidate.proto(),
            }
        }

        let mut borrowed = object.borrow_mut();
        let target = &mut *borrowed;
        let extensible = target.extensible;
        match target.properties.get_mut(key) {
            Some(property) => {
                if property.writable {
                    property.slot = Slot::Data(value);
                }
            }
            None if extensible => {
                target.properties.insert(key.to_string(), Property::data(value));
            }
            None => {}
        }
        Ok(())
    }

    /// `delete base[key]`.
    pub fn delete_property(&mut self, base: &Value, key: &str) -> Result<bool, Thrown> {
        let object = match base {
            Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "Cannot convert undefined or null to object (deleting '{}')",
                    key
                )))
            }
            Value::Object(object) => object,
            _ => return Ok(true),
        };
        let mut borrowed = object.borrow_mut();
        if !borrowed.extensible && borrowed.properties.contains(key) {
            return Ok(false);
        }
        if let ObjectKind::Array(items) = &mut borrowed.kind {
            if let Some(index) = array_index(key) {
                if let Some(slot) = items.get_mut(index as usize) {
                    *slot = Value::Undefined;
                }
                return Ok(true);
            }
        }
        if borrowed.properties.get(key).is_some_and(|p| !p.configurable) {
            return Ok(false);
        }
        borrowed.properties.remove(key);
        Ok(true)
    }

    /// The `in` operator.
    pub fn has_property(&self, object: &Obj, key: &str) -> bool {
        let mut current = Some(object.clone());
        while let Some(candidate) = current {
            if has_own(&candidate, key) {
                return true;
            }
            current = candidate.proto();
        }
        false
    }

    /// Define an own data property, bypassing setters.
    pub fn define_own(&mut self, object: &Obj, key: &str, value: Value) {
        let mut borrowed = object.borrow_mut();
        if let ObjectKind::Array(items) = &mut borrowed.kind {
            if let Some(index) = array_index(key) {
                let index = index as usize;
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return;
            }
        }
        borrowed.properties.insert(key.to_string(), Property::data(value));
    }

    /// Merge a getter or setter into an own accessor property.
    pub fn define_accessor(&mut self, object: &Obj, key: &str, getter: Option<Obj>, setter: Option<Obj>, enumerable: bool) {
        let mut borrowed = object.borrow_mut();
        let (mut get, mut set) = match borrowed.properties.get(key).map(|p| &p.slot) {
            Some(Slot::Accessor { get, set }) => (get.clone(), set.clone()),
            _ => (None, None),
        };
        if getter.is_some() {
            get = getter;
        }
        if setter.is_some() {
            set = setter;
        }
        borrowed
            .properties
            .insert(key.to_string(), Property::accessor(get, set, enumerable));
    }

    /// Own enumerable string keys, as `Object.keys` returns them.
    pub fn own_keys(&self, value: &Value) -> Vec<String> {
        match value {
            Value::String(text) => (0..utf16_len(text)).map(|i| i.to_string()).collect(),
            Value::Object(object) => {
                let borrowed = object.borrow();
                let mut keys: Vec<String> = match &borrowed.kind {
                    ObjectKind::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
                    _ => Vec::new(),
                };
                keys.extend(borrowed.properties.enumerable_keys());
                keys
            }
            _ => Vec::new(),
        }
    }

    /// Keys visited by `for…in`: own and inherited enumerable keys.
    pub fn for_in_keys(&self, value: &Value) -> Vec<String> {
        let mut keys = self.own_keys(value);
        let mut current = match value {
            Value::Object(object) => object.proto(),
            _ => None,
        };
        while let Some(object) = current {
            for key in object.borrow().properties.enumerable_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            current = object.proto();
        }
        keys
    }

    /// The values a `for…of` loop or spread visits.
    pub fn iterate(&mut self, value: &Value) -> Result<Vec<Value>, Thrown> {
        if let Value::String(text) = value {
            return Ok(text.chars().map(|c| Value::from(c.to_string())).collect());
        }
        if let Value::Object(object) = value {
            let entries = match &object.borrow().kind {
                ObjectKind::Array(items) | ObjectKind::Set(items) => return Ok(items.clone()),
                ObjectKind::Map(entries) => Some(entries.clone()),
                _ => None,
            };
            if let Some(entries) = entries {
                return Ok(entries
                    .into_iter()
                    .map(|(k, v)| self.new_array(vec![k, v]))
                    .collect());
            }
        }
        Err(self.type_error(format!("{} is not iterable", describe_for_error(value))))
    }

    /// Property key for a numeric index.
    pub fn index_key(index: usize) -> String {
        number_to_string(index as f64)
    }
}

fn has_own(object: &Obj, key: &str) -> bool {
    let borrowed = object.borrow();
    if let ObjectKind::Array(items) = &borrowed.kind {
        if key == "length" {
            return true;
        }
        if array_index(key).is_some_and(|i| (i as usize) < items.len()) {
            return true;
        }
    }
    borrowed.properties.contains(key)
}

/// `Object.prototype.hasOwnProperty` on any value.
pub fn has_own_property(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(object) => has_own(object, key),
        Value::String(text) => key == "length" || array_index(key).is_some_and(|i| (i as usize) < utf16_len(text)),
        _ => false,
    }
}
