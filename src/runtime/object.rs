//! Heap objects.
//!
//! Objects are reference-counted and mutably shared; identity is pointer
//! identity. Property order follows the language rules: integer-like keys
//! ascending, then string keys in insertion order.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::runtime::scope::Env;
use crate::runtime::{Interpreter, Thrown, Value};
use crate::syntax::{Expression, Function};

#[derive(Clone)]
pub struct Obj(Rc<RefCell<JsObject>>);

impl Obj {
    pub fn new(object: JsObject) -> Self {
        Obj(Rc::new(RefCell::new(object)))
    }

    pub fn borrow(&self) -> Ref<'_, JsObject> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, JsObject> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address, used for cycle detection.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn proto(&self) -> Option<Obj> {
        self.borrow().proto.clone()
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    /// Own data property value, ignoring accessors and the prototype chain.
    pub fn own_data(&self, key: &str) -> Option<Value> {
        match self.borrow().properties.get(key).map(|p| &p.slot) {
            Some(Slot::Data(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Define or overwrite an own, writable, enumerable data property.
    pub fn set_own(&self, key: impl Into<String>, value: Value) {
        self.borrow_mut().properties.insert(key.into(), Property::data(value));
    }

    /// Define a non-enumerable data property, as built-in members are.
    pub fn set_hidden(&self, key: impl Into<String>, value: Value) {
        self.borrow_mut().properties.insert(key.into(), Property::hidden(value));
    }

    /// Is `proto` somewhere on this object's prototype chain?
    pub fn inherits_from(&self, proto: &Obj) -> bool {
        let mut current = self.proto();
        while let Some(object) = current {
            if object.ptr_eq(proto) {
                return true;
            }
            current = object.proto();
        }
        false
    }
}

/// Every object one run allocates.
///
/// Closures capture the environments that bind them and prototypes point at
/// their constructors, so a realm is full of reference cycles. Sweeping
/// empties each object still alive, which leaves nothing for a cycle to
/// hold on to.
#[derive(Default)]
pub struct Heap {
    objects: RefCell<Vec<Weak<RefCell<JsObject>>>>,
}

impl Heap {
    pub fn alloc(&self, object: JsObject) -> Obj {
        let obj = Obj::new(object);
        let mut objects = self.objects.borrow_mut();
        if objects.len() == objects.capacity() {
            objects.retain(|weak| weak.strong_count() > 0);
        }
        objects.push(Rc::downgrade(&obj.0));
        obj
    }

    /// Empty every live object; returns how many there were.
    pub fn sweep(&self) -> usize {
        let objects = std::mem::take(&mut *self.objects.borrow_mut());
        // Contents are dropped only once every object is empty, so no drop
        // recurses through a long chain of objects.
        let mut contents = Vec::new();
        for object in objects.iter().filter_map(Weak::upgrade) {
            if let Ok(mut object) = object.try_borrow_mut() {
                contents.push(std::mem::replace(&mut *object, JsObject::new(None, ObjectKind::Ordinary)));
            }
        }
        contents.len()
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "Obj<{}>", object.kind.class_name()),
            Err(_) => f.write_str("Obj<borrowed>"),
        }
    }
}

pub struct JsObject {
    pub proto: Option<Obj>,
    pub properties: PropertyMap,
    pub kind: ObjectKind,
    pub extensible: bool,
}

impl JsObject {
    pub fn new(proto: Option<Obj>, kind: ObjectKind) -> Self {
        Self {
            proto,
            properties: PropertyMap::default(),
            kind,
            extensible: true,
        }
    }

    /// `Object.freeze`.
    pub fn freeze(&mut self) {
        self.extensible = false;
        for property in self.properties.entries.values_mut() {
            property.writable = false;
            property.configurable = false;
        }
    }

    pub fn is_frozen(&self) -> bool {
        !self.extensible && self.properties.entries.values().all(|p| !p.writable && !p.configurable)
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[derive(Clone)]
pub enum Slot {
    Data(Value),
    Accessor { get: Option<Obj>, set: Option<Obj> },
}

#[derive(Clone)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
    pub writable: bool,
    pub configurable: bool,
}

impl Property {
    pub fn data(value: Value) -> Self {
        Self {
            slot: Slot::Data(value),
            enumerable: true,
            writable: true,
            configurable: true,
        }
    }

    pub fn hidden(value: Value) -> Self {
        Self {
            enumerable: false,
            ..Self::data(value)
        }
    }

    /// Non-enumerable and non-writable, like a function's `name`.
    pub fn readonly(value: Value) -> Self {
        Self {
            writable: false,
            ..Self::hidden(value)
        }
    }

    pub fn accessor(get: Option<Obj>, set: Option<Obj>, enumerable: bool) -> Self {
        Self {
            slot: Slot::Accessor { get, set },
            enumerable,
            writable: true,
            configurable: true,
        }
    }
}

#[derive(Default, Clone)]
pub struct PropertyMap {
    order: Vec<String>,
    entries: HashMap<String, Property>,
}

impl PropertyMap {
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Property> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: String, property: Property) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, property);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        self.order.retain(|k| k != key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in enumeration order.
    pub fn keys(&self) -> Vec<String> {
        let mut indices: Vec<(u32, &String)> = self
            .order
            .iter()
            .filter_map(|k| array_index(k).map(|i| (i, k)))
            .collect();
        indices.sort_by_key(|(i, _)| *i);
        let mut keys: Vec<String> = indices.into_iter().map(|(_, k)| k.clone()).collect();
        keys.extend(self.order.iter().filter(|k| array_index(k).is_none()).cloned());
        keys
    }

    pub fn enumerable_keys(&self) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|k| self.entries.get(k).is_some_and(|p| p.enumerable))
            .collect()
    }
}

/// `"3"` → `Some(3)`; canonical non-negative integers only.
pub fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|i| *i != u32::MAX)
}

// ============================================================================
// OBJECT KINDS
// ============================================================================

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(FunctionObject),
    Error,
    RegExp(Box<RegExpData>),
    /// Entries in insertion order; keys compare with SameValueZero.
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
}

impl ObjectKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
        }
    }
}

pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, Thrown>>;

#[derive(Clone)]
pub enum FunctionObject {
    Closure(Closure),
    Native(NativeFunction),
    Bound(BoundFunction),
}

/// A function defined in user code, with the environment it closes over.
#[derive(Clone)]
pub struct Closure {
    pub function: Rc<Function>,
    pub env: Env,
    /// Object whose prototype `super.x` reads from.
    pub home: Option<Obj>,
    /// Present on class constructors.
    pub class: Option<Rc<ClassInfo>>,
}

pub struct ClassInfo {
    pub name: String,
    pub derived: bool,
    pub fields: Vec<FieldInit>,
    /// Scope the field initializers run in.
    pub env: Env,
}

pub struct FieldInit {
    pub key: String,
    pub init: Option<Expression>,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub call: NativeFn,
    /// Behavior under `new`; `None` means not a constructor.
    pub construct: Option<NativeFn>,
}

#[derive(Clone)]
pub struct BoundFunction {
    pub target: Obj,
    pub this: Value,
    pub args: Vec<Value>,
}

pub struct RegExpData {
    pub source: String,
    pub flags: String,
    pub regex: regex::Regex,
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }

    pub fn sticky(&self) -> bool {
        self.flags.contains('y')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{compile_for_execution, invoke, InterpreterConfig, NullSink};

    #[test]
    fn test_sweep_breaks_cycles() {
        let heap = Heap::default();
        let first = heap.alloc(JsObject::new(None, ObjectKind::Ordinary));
        let second = heap.alloc(JsObject::new(Some(first.clone()), ObjectKind::Ordinary));
        first.set_own("next", Value::Object(second.clone()));
        let weak = Rc::downgrade(&first.0);
        drop((first, second));
        assert!(weak.upgrade().is_some());
        assert_eq!(heap.sweep(), 2);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_dropped_interpreters_release_their_realm() {
        let source = "const o = {}; o.self = o; function f() { return f; } o.f = f; return o;";
        let invocable = compile_for_execution(source, &[]).unwrap();
        let mut released = Vec::new();
        for _ in 0..3 {
            let mut interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
            let Ok(Value::Object(object)) = invoke(&invocable, &mut interp, &[]) else {
                panic!("expected an object");
            };
            let prototype = object.proto().unwrap();
            released.push((Rc::downgrade(&object.0), Rc::downgrade(&prototype.0)));
            drop((object, prototype));
            drop(interp);
        }
        for (object, prototype) in released {
            assert!(object.upgrade().is_none());
            assert!(prototype.upgrade().is_none());
        }
    }

    #[test]
    fn test_property_order() {
        let mut map = PropertyMap::default();
        for key in ["b", "2", "a", "0", "10"] {
            map.insert(key.to_string(), Property::data(Value::Null));
        }
        assert_eq!(map.keys(), vec!["0", "2", "10", "b", "a"]);
        assert!(map.remove("a"));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_array_index() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("042"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("1.5"), None);
    }

    #[test]
    fn test_freeze() {
        let object = Obj::new(JsObject::new(None, ObjectKind::Ordinary));
        object.set_own("a", Value::Number(1.0));
        object.borrow_mut().freeze();
        assert!(object.borrow().is_frozen());
    }
}
