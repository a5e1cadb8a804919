//! # Math
//!
//! `Math.random` draws from the interpreter's seeded generator, so runs are
//! reproducible for a given configuration.
//!
//! ## Members Provided
//!
//! - **Constants**: `PI`, `E`, `LN2`, `LN10`, `LOG2E`, `LOG10E`, `SQRT2`, `SQRT1_2`
//! - **Functions**: `abs`, `floor`, `ceil`, `round`, `trunc`, `sign`, `sqrt`,
//!   `cbrt`, `exp`, `expm1`, `log`, `log2`, `log10`, `log1p`, `sin`, `cos`,
//!   `tan`, `asin`, `acos`, `atan`, `atan2`, `sinh`, `cosh`, `tanh`, `fround`,
//!   `pow`, `hypot`, `max`, `min`, `random`

use rand::Rng;

use crate::intrinsics::helpers::{method, namespace, number_arg, NativeResult};
use crate::runtime::object::Property;
use crate::runtime::operators::js_pow;
use crate::runtime::{Interpreter, Value};

/// Built-ins that apply one `f64 -> f64` function to their first argument.
macro_rules! unary {
    ($($name:ident => $op:expr),* $(,)?) => {
        $(
            fn $name(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
                let x = number_arg(interp, args, 0)?;
                let op: fn(f64) -> f64 = $op;
                Ok(Value::Number(op(x)))
            }
        )*
    };
}

unary! {
    math_abs => f64::abs,
    math_floor => f64::floor,
    math_ceil => f64::ceil,
    math_round => round,
    math_trunc => f64::trunc,
    math_sign => sign,
    math_sqrt => f64::sqrt,
    math_cbrt => f64::cbrt,
    math_exp => f64::exp,
    math_expm1 => f64::exp_m1,
    math_log => f64::ln,
    math_log2 => f64::log2,
    math_log10 => f64::log10,
    math_log1p => f64::ln_1p,
    math_sin => f64::sin,
    math_cos => f64::cos,
    math_tan => f64::tan,
    math_asin => f64::asin,
    math_acos => f64::acos,
    math_atan => f64::atan,
    math_sinh => f64::sinh,
    math_cosh => f64::cosh,
    math_tanh => f64::tanh,
    math_fround => |x| f64::from(x as f32),
}

pub fn register(interp: &mut Interpreter) {
    let math = namespace(interp, "Math");

    let constants = [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ];
    for (name, value) in constants {
        math.borrow_mut()
            .properties
            .insert(name.to_string(), Property::readonly(Value::Number(value)));
    }

    let unary: [(&str, crate::intrinsics::helpers::NativeFnPtr); 24] = [
        ("abs", math_abs),
        ("floor", math_floor),
        ("ceil", math_ceil),
        ("round", math_round),
        ("trunc", math_trunc),
        ("sign", math_sign),
        ("sqrt", math_sqrt),
        ("cbrt", math_cbrt),
        ("exp", math_exp),
        ("expm1", math_expm1),
        ("log", math_log),
        ("log2", math_log2),
        ("log10", math_log10),
        ("log1p", math_log1p),
        ("sin", math_sin),
        ("cos", math_cos),
        ("tan", math_tan),
        ("asin", math_asin),
        ("acos", math_acos),
        ("atan", math_atan),
        ("sinh", math_sinh),
        ("cosh", math_cosh),
        ("tanh", math_tanh),
        ("fround", math_fround),
    ];
    for (name, call) in unary {
        method(interp, &math, name, 1, call);
    }

    method(interp, &math, "atan2", 2, math_atan2);
    method(interp, &math, "pow", 2, math_pow);
    method(interp, &math, "hypot", 2, math_hypot);
    method(interp, &math, "max", 2, math_max);
    method(interp, &math, "min", 2, math_min);
    method(interp, &math, "random", 0, math_random);
}

/// `Math.round`: halves round toward positive infinity.
fn round(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let rounded = (x + 0.5).floor();
    if rounded == 0.0 && x < 0.0 {
        -0.0
    } else {
        rounded
    }
}

fn sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else {
        x.signum()
    }
}

fn math_atan2(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let y = number_arg(interp, args, 0)?;
    let x = number_arg(interp, args, 1)?;
    Ok(Value::Number(y.atan2(x)))
}

fn math_pow(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let base = number_arg(interp, args, 0)?;
    let exponent = number_arg(interp, args, 1)?;
    Ok(Value::Number(js_pow(base, exponent)))
}

fn numbers(interp: &mut Interpreter, args: &[Value]) -> Result<Vec<f64>, crate::runtime::Thrown> {
    args.iter().map(|value| interp.to_number(value)).collect()
}

fn math_hypot(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let values = numbers(interp, args)?;
    if values.iter().any(|v| v.is_infinite()) {
        return Ok(Value::Number(f64::INFINITY));
    }
    Ok(Value::Number(values.iter().map(|v| v * v).sum::<f64>().sqrt()))
}

fn math_max(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let mut best = f64::NEG_INFINITY;
    for value in numbers(interp, args)? {
        if value.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if value > best || (value == 0.0 && best == 0.0 && best.is_sign_negative()) {
            best = value;
        }
    }
    Ok(Value::Number(best))
}

fn math_min(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> NativeResult {
    let mut best = f64::INFINITY;
    for value in numbers(interp, args)? {
        if value.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if value < best || (value == 0.0 && best == 0.0 && value.is_sign_negative()) {
            best = value;
        }
    }
    Ok(Value::Number(best))
}

fn math_random(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> NativeResult {
    Ok(Value::Number(interp.rng.gen::<f64>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_halves_up() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(-0.4), 0.0);
        assert!(round(-0.4).is_sign_negative());
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(-3.0), -1.0);
        assert_eq!(sign(7.0), 1.0);
        assert!(sign(f64::NAN).is_nan());
    }
}
