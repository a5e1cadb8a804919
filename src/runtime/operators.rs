//! Abstract operations and operator semantics.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::runtime::convert::{number_to_string, string_to_number, to_int32, to_uint32};
use crate::runtime::object::{FunctionObject, ObjectKind};
use crate::runtime::{Interpreter, Thrown, Value};
use crate::syntax::BinaryOp;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

impl Interpreter {
    /// `ToPrimitive`: objects convert through `valueOf` / `toString`.
    pub fn to_primitive(&mut self, value: &Value, hint: Hint) -> Result<Value, Thrown> {
        let Value::Object(object) = value else {
            return Ok(value.clone());
        };
        let order = if hint == Hint::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get_from(object, name, value)?;
            if method.is_callable() {
                let result = self.call(&method, value.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub fn to_number(&mut self, value: &Value) -> Result<f64, Thrown> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub fn to_string(&mut self, value: &Value) -> Result<String, Thrown> {
        Ok(match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                return self.to_string(&primitive);
            }
        })
    }

    pub fn to_property_key(&mut self, value: &Value) -> Result<String, Thrown> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            Value::Number(n) => Ok(number_to_string(*n)),
            other => self.to_string(other),
        }
    }

    /// `==`.
    pub fn loose_equals(&mut self, left: &Value, right: &Value) -> Result<bool, Thrown> {
        Ok(match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(a), Value::String(b)) => *a == string_to_number(b),
            (Value::String(a), Value::Number(b)) => string_to_number(a) == *b,
            (Value::Bool(b), other) => {
                let n = Value::Number(f64::from(u8::from(*b)));
                return self.loose_equals(&n, other);
            }
            (other, Value::Bool(b)) => {
                let n = Value::Number(f64::from(u8::from(*b)));
                return self.loose_equals(other, &n);
            }
            (Value::Object(_), Value::Object(_)) => left.strict_equals(right),
            (Value::Object(_), _) => {
                let primitive = self.to_primitive(left, Hint::Default)?;
                return self.loose_equals(&primitive, right);
            }
            (_, Value::Object(_)) => {
                let primitive = self.to_primitive(right, Hint::Default)?;
                return self.loose_equals(left, &primitive);
            }
            _ => left.strict_equals(right),
        })
    }

    /// Abstract relational comparison; `None` when either side is `NaN`.
    fn compare(&mut self, left: &Value, right: &Value) -> Result<Option<Ordering>, Thrown> {
        let left = self.to_primitive(left, Hint::Number)?;
        let right = self.to_primitive(right, Hint::Number)?;
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            return Ok(Some(a.encode_utf16().cmp(b.encode_utf16())));
        }
        let a = self.to_number(&left)?;
        let b = self.to_number(&right)?;
        Ok(a.partial_cmp(&b))
    }

    /// A primitive operand of string `+`, without copying string values.
    fn string_operand(&mut self, value: Value) -> Result<Rc<str>, Thrown> {
        match value {
            Value::String(text) => Ok(text),
            other => Ok(self.to_string(&other)?.into()),
        }
    }

    pub fn binary_op(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Thrown> {
        use BinaryOp::*;
        Ok(match op {
            Add => {
                let l = self.to_primitive(left, Hint::Default)?;
                let r = self.to_primitive(right, Hint::Default)?;
                if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                    let head = self.string_operand(l)?;
                    let tail = self.string_operand(r)?;
                    self.check_joined_length(&[&head, &tail], "")?;
                    Value::from([&*head, &*tail].concat())
                } else {
                    Value::Number(self.to_number(&l)? + self.to_number(&r)?)
                }
            }
            Sub => Value::Number(self.to_number(left)? - self.to_number(right)?),
            Mul => Value::Number(self.to_number(left)? * self.to_number(right)?),
            Div => Value::Number(self.to_number(left)? / self.to_number(right)?),
            Mod => Value::Number(self.to_number(left)? % self.to_number(right)?),
            Exp => {
                let base = self.to_number(left)?;
                let exponent = self.to_number(right)?;
                Value::Number(js_pow(base, exponent))
            }
            Shl => {
                let l = to_int32(self.to_number(left)?);
                let r = to_uint32(self.to_number(right)?) & 31;
                Value::Number(l.wrapping_shl(r) as f64)
            }
            Shr => {
                let l = to_int32(self.to_number(left)?);
                let r = to_uint32(self.to_number(right)?) & 31;
                Value::Number((l >> r) as f64)
            }
            UShr => {
                let l = to_uint32(self.to_number(left)?);
                let r = to_uint32(self.to_number(right)?) & 31;
                Value::Number((l >> r) as f64)
            }
            BitAnd => Value::Number((to_int32(self.to_number(left)?) & to_int32(self.to_number(right)?)) as f64),
            BitOr => Value::Number((to_int32(self.to_number(left)?) | to_int32(self.to_number(right)?)) as f64),
            BitXor => Value::Number((to_int32(self.to_number(left)?) ^ to_int32(self.to_number(right)?)) as f64),
            Eq => Value::Bool(self.loose_equals(left, right)?),
            NotEq => Value::Bool(!self.loose_equals(left, right)?),
            StrictEq => Value::Bool(left.strict_equals(right)),
            StrictNotEq => Value::Bool(!left.strict_equals(right)),
            Lt => Value::Bool(self.compare(left, right)? == Some(Ordering::Less)),
            Gt => Value::Bool(self.compare(left, right)? == Some(Ordering::Greater)),
            LtEq => Value::Bool(matches!(
                self.compare(left, right)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            GtEq => Value::Bool(matches!(
                self.compare(left, right)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            In => {
                let Value::Object(object) = right else {
                    let key = self.to_string(left)?;
                    let target = self.to_string(right)?;
                    return Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key, target
                    )));
                };
                let key = self.to_property_key(left)?;
                Value::Bool(self.has_property(object, &key))
            }
            InstanceOf => Value::Bool(self.instance_of(left, right)?),
        })
    }

    pub fn instance_of(&mut self, value: &Value, constructor: &Value) -> Result<bool, Thrown> {
        let Value::Object(constructor) = constructor else {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        };
        let target = match &constructor.borrow().kind {
            ObjectKind::Function(FunctionObject::Bound(bound)) => Some(bound.target.clone()),
            ObjectKind::Function(_) => None,
            _ => return Err(self.type_error("Right-hand side of 'instanceof' is not callable")),
        };
        if let Some(target) = target {
            return self.instance_of(value, &Value::Object(target));
        }
        let Value::Object(object) = value else {
            return Ok(false);
        };
        match self.get_property(&Value::Object(constructor.clone()), "prototype")? {
            Value::Object(prototype) => Ok(object.inherits_from(&prototype)),
            _ => Err(self.type_error("Function has non-object prototype in instanceof check")),
        }
    }
}

/// `Number::exponentiate`.
pub fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InterpreterConfig, NullSink};

    fn interpreter() -> Interpreter {
        Interpreter::new(InterpreterConfig::default(), Box::new(NullSink))
    }

    #[test]
    fn test_addition_concatenates_strings() {
        let mut interp = interpreter();
        let result = interp
            .binary_op(BinaryOp::Add, &Value::from("a"), &Value::Number(1.0))
            .unwrap();
        assert!(matches!(result, Value::String(s) if &*s == "a1"));
        let result = interp
            .binary_op(BinaryOp::Add, &Value::Bool(true), &Value::Number(1.0))
            .unwrap();
        assert!(matches!(result, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn test_loose_equality() {
        let mut interp = interpreter();
        assert!(interp.loose_equals(&Value::Null, &Value::Undefined).unwrap());
        assert!(interp.loose_equals(&Value::from("1"), &Value::Number(1.0)).unwrap());
        assert!(interp.loose_equals(&Value::Bool(false), &Value::from("0")).unwrap());
        assert!(!interp.loose_equals(&Value::Null, &Value::Number(0.0)).unwrap());
    }

    #[test]
    fn test_string_comparison() {
        let mut interp = interpreter();
        let result = interp.binary_op(BinaryOp::Lt, &Value::from("a"), &Value::from("b")).unwrap();
        assert!(matches!(result, Value::Bool(true)));
        let result = interp
            .binary_op(BinaryOp::Lt, &Value::Number(f64::NAN), &Value::Number(1.0))
            .unwrap();
        assert!(matches!(result, Value::Bool(false)));
    }

    #[test]
    fn test_pow_edge_cases() {
        assert!(js_pow(1.0, f64::INFINITY).is_nan());
        assert_eq!(js_pow(2.0, 10.0), 1024.0);
    }
}
