//! Operator folding over abstract values
//!
//! An operator folds to a constant when every operand is a constant
//! primitive; anything else gives Top. A Bottom operand means the expression
//! was never evaluated with a real value, so the result is Bottom as well.

use crate::ast::{BinaryOp, LiteralValue, UnaryOp, UpdateOp};
use crate::lattice::{AbstractValue, Approx, HeapRef, Lattice, Value};
use crate::prelude::*;

pub fn binary(op: BinaryOp, left: &Approx, right: &Approx) -> Approx {
    if left.is_bottom() || right.is_bottom() {
        return Approx::bottom();
    }
    if left.unknown || right.unknown {
        return Approx::top();
    }
    match (left.value.as_primitive(), right.value.as_primitive()) {
        (Some(l), Some(r)) => fold_binary(op, l, r).map_or_else(Approx::top, Approx::constant),
        _ => reference_binary(op, left, right),
    }
}

fn fold_binary(op: BinaryOp, l: &LiteralValue, r: &LiteralValue) -> Option<LiteralValue> {
    Some(match op {
        // Arithmetic
        BinaryOp::Add => {
            if matches!(l, LiteralValue::String(_)) || matches!(r, LiteralValue::String(_)) {
                let joined = format!("{}{}", l.to_js_string(), r.to_js_string());
                LiteralValue::String(Rc::from(joined))
            } else {
                LiteralValue::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => LiteralValue::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => LiteralValue::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => LiteralValue::Number(l.to_number() / r.to_number()),
        BinaryOp::Mod => LiteralValue::Number(l.to_number() % r.to_number()),
        BinaryOp::Exp => LiteralValue::Number(l.to_number().powf(r.to_number())),

        // Comparison
        BinaryOp::Lt => LiteralValue::Boolean(compare(l, r, |a, b| a < b, |a, b| a < b)),
        BinaryOp::LtEq => LiteralValue::Boolean(compare(l, r, |a, b| a <= b, |a, b| a <= b)),
        BinaryOp::Gt => LiteralValue::Boolean(compare(l, r, |a, b| a > b, |a, b| a > b)),
        BinaryOp::GtEq => LiteralValue::Boolean(compare(l, r, |a, b| a >= b, |a, b| a >= b)),

        // Equality
        BinaryOp::Eq => LiteralValue::Boolean(l.loose_equals(r)),
        BinaryOp::NotEq => LiteralValue::Boolean(!l.loose_equals(r)),
        BinaryOp::StrictEq => LiteralValue::Boolean(l.strict_equals(r)),
        BinaryOp::StrictNotEq => LiteralValue::Boolean(!l.strict_equals(r)),

        // Bitwise
        BinaryOp::BitAnd => int32(to_int32(l) & to_int32(r)),
        BinaryOp::BitOr => int32(to_int32(l) | to_int32(r)),
        BinaryOp::BitXor => int32(to_int32(l) ^ to_int32(r)),
        BinaryOp::LShift => int32(to_int32(l).wrapping_shl(shift_count(r))),
        BinaryOp::RShift => int32(to_int32(l).wrapping_shr(shift_count(r))),
        BinaryOp::URShift => LiteralValue::Number(f64::from(to_uint32(l).wrapping_shr(shift_count(r)))),

        // Both need an object on the right
        BinaryOp::In | BinaryOp::Instanceof => return None,
    })
}

/// Operators with a heap reference on either side. Allocation sites stand for
/// any number of concrete objects, so identity comparisons between two
/// references are never folded.
fn reference_binary(op: BinaryOp, left: &Approx, right: &Approx) -> Approx {
    let left_ref = matches!(left.value, AbstractValue::Constant(Value::Ref(_)));
    let right_ref = matches!(right.value, AbstractValue::Constant(Value::Ref(_)));
    let one_primitive = (left_ref && right.value.as_primitive().is_some())
        || (right_ref && left.value.as_primitive().is_some());
    match op {
        BinaryOp::StrictEq if one_primitive => Approx::constant(LiteralValue::Boolean(false)),
        BinaryOp::StrictNotEq if one_primitive => Approx::constant(LiteralValue::Boolean(true)),
        _ => Approx::top(),
    }
}

fn compare(
    l: &LiteralValue,
    r: &LiteralValue,
    strings: impl Fn(&str, &str) -> bool,
    numbers: impl Fn(f64, f64) -> bool,
) -> bool {
    match (l, r) {
        (LiteralValue::String(a), LiteralValue::String(b)) => strings(a, b),
        _ => {
            let (a, b) = (l.to_number(), r.to_number());
            // Any comparison with NaN is false
            !a.is_nan() && !b.is_nan() && numbers(a, b)
        }
    }
}

fn int32(n: i32) -> LiteralValue {
    LiteralValue::Number(f64::from(n))
}

fn shift_count(value: &LiteralValue) -> u32 {
    to_uint32(value) & 0x1f
}

/// ToUint32
pub fn to_uint32(value: &LiteralValue) -> u32 {
    let n = value.to_number();
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// ToInt32
pub fn to_int32(value: &LiteralValue) -> i32 {
    to_uint32(value) as i32
}

pub fn unary(op: UnaryOp, argument: &Approx) -> Approx {
    if argument.is_bottom() {
        return Approx::bottom();
    }
    match op {
        UnaryOp::Void => return Approx::undefined(),
        UnaryOp::Not => {
            return match argument.truthiness() {
                Some(truthy) => Approx::constant(LiteralValue::Boolean(!truthy)),
                None => Approx::top(),
            };
        }
        UnaryOp::Typeof => return type_of(argument),
        UnaryOp::Minus | UnaryOp::Plus | UnaryOp::BitNot => {}
    }
    let Some(value) = argument.value.as_primitive().filter(|_| !argument.unknown) else {
        return Approx::top();
    };
    Approx::constant(match op {
        UnaryOp::Minus => LiteralValue::Number(-value.to_number()),
        UnaryOp::BitNot => int32(!to_int32(value)),
        _ => LiteralValue::Number(value.to_number()),
    })
}

fn type_of(argument: &Approx) -> Approx {
    if argument.unknown {
        return Approx::top();
    }
    match &argument.value {
        AbstractValue::Constant(Value::Primitive(p)) => Approx::constant(LiteralValue::from(p.type_of())),
        AbstractValue::Constant(Value::Ref(HeapRef::Object(_))) => {
            Approx::constant(LiteralValue::from("object"))
        }
        AbstractValue::Constant(Value::Ref(HeapRef::Closure(_))) => {
            Approx::constant(LiteralValue::from("function"))
        }
        AbstractValue::Bottom | AbstractValue::Top => Approx::top(),
    }
}

/// New value of an `++`/`--` target; the expression result of the postfix
/// form is [`to_numeric`] of the old value
pub fn update(op: UpdateOp, current: &Approx) -> Approx {
    let delta = match op {
        UpdateOp::Increment => 1.0,
        UpdateOp::Decrement => -1.0,
    };
    binary(BinaryOp::Add, &to_numeric(current), &Approx::constant(LiteralValue::Number(delta)))
}

pub fn to_numeric(value: &Approx) -> Approx {
    if value.is_bottom() {
        return Approx::bottom();
    }
    match value.value.as_primitive().filter(|_| !value.unknown) {
        Some(p) => Approx::constant(LiteralValue::Number(p.to_number())),
        None => Approx::top(),
    }
}
