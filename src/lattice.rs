//! Abstract value lattice
//!
//! ```text
//!              Top            two or more distinct values (or external input)
//!         /     |     \
//!   Constant(a) ... Constant(z)   exactly one value observed so far
//!         \     |     /
//!            Bottom           never observed
//! ```
//!
//! The lattice has height 3, so any chain of joins over a fixed storage
//! location stabilises after at most two steps. [`Approx`] pairs a lattice
//! element with the set of heap references the location may hold, which is
//! what property access and calls dispatch on.

use core::fmt;

use serde::Serialize;

use crate::ast::{Function, LiteralValue, Name, NodeId};
use crate::prelude::*;

/// A join-semilattice with a least element
pub trait Lattice: Sized {
    fn bottom() -> Self;

    /// Least upper bound
    fn join(&self, other: &Self) -> Self;

    /// Partial order induced by `join`
    fn leq(&self, other: &Self) -> bool;
}

/// Abstract object, one per allocation site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(pub NodeId);

/// Interned closure value, see [`crate::heap::Heap::intern_closure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClosureId(pub u32);

impl ClosureId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Anything that owns a property map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeapRef {
    Object(ObjectId),
    Closure(ClosureId),
}

/// One concrete value as far as the analysis can name it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Primitive(LiteralValue),
    Ref(HeapRef),
}

impl From<LiteralValue> for Value {
    fn from(lit: LiteralValue) -> Self {
        Value::Primitive(lit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AbstractValue {
    #[default]
    Bottom,
    Constant(Value),
    Top,
}

impl Lattice for AbstractValue {
    fn bottom() -> Self {
        AbstractValue::Bottom
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (AbstractValue::Bottom, v) | (v, AbstractValue::Bottom) => v.clone(),
            (AbstractValue::Constant(a), AbstractValue::Constant(b)) if a == b => {
                AbstractValue::Constant(a.clone())
            }
            _ => AbstractValue::Top,
        }
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (AbstractValue::Bottom, _) | (_, AbstractValue::Top) => true,
            (AbstractValue::Constant(a), AbstractValue::Constant(b)) => a == b,
            _ => false,
        }
    }
}

impl AbstractValue {
    pub fn constant(value: impl Into<Value>) -> Self {
        AbstractValue::Constant(value.into())
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, AbstractValue::Bottom)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, AbstractValue::Top)
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            AbstractValue::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&LiteralValue> {
        match self {
            AbstractValue::Constant(Value::Primitive(p)) => Some(p),
            _ => None,
        }
    }

    /// Position in the lattice: 0 for Bottom, 1 for a constant, 2 for Top
    pub fn height(&self) -> u8 {
        match self {
            AbstractValue::Bottom => 0,
            AbstractValue::Constant(_) => 1,
            AbstractValue::Top => 2,
        }
    }
}

/// What a storage location (or an evaluated expression) may hold.
///
/// The product of the constant lattice, the powerset of heap references and
/// a flag for values that come from outside the analyzed program. All three
/// components only grow under [`Lattice::join`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Approx {
    pub value: AbstractValue,
    pub refs: BTreeSet<HeapRef>,
    /// Originates from an external function, an unknown property or host
    /// input; calling it is an opaque call
    pub unknown: bool,
    /// May hold a primitive other than undefined or null. Kept apart from
    /// `value` so a Top mixing a primitive with references still reads
    /// properties off the primitive side.
    pub primitive: bool,
}

impl Lattice for Approx {
    fn bottom() -> Self {
        Approx::default()
    }

    fn join(&self, other: &Self) -> Self {
        Approx {
            value: self.value.join(&other.value),
            refs: self.refs.union(&other.refs).copied().collect(),
            unknown: self.unknown || other.unknown,
            primitive: self.primitive || other.primitive,
        }
    }

    fn leq(&self, other: &Self) -> bool {
        self.value.leq(&other.value)
            && self.refs.is_subset(&other.refs)
            && (!self.unknown || other.unknown)
            && (!self.primitive || other.primitive)
    }
}

impl Approx {
    pub fn constant(lit: LiteralValue) -> Self {
        Approx {
            primitive: !matches!(lit, LiteralValue::Undefined | LiteralValue::Null),
            value: AbstractValue::constant(lit),
            ..Approx::default()
        }
    }

    pub fn undefined() -> Self {
        Approx::constant(LiteralValue::Undefined)
    }

    pub fn reference(r: HeapRef) -> Self {
        let mut refs = BTreeSet::new();
        refs.insert(r);
        Approx {
            value: AbstractValue::Constant(Value::Ref(r)),
            refs,
            ..Approx::default()
        }
    }

    /// Any value at all; used for results of opaque calls and host input
    pub fn unknown() -> Self {
        Approx {
            value: AbstractValue::Top,
            refs: BTreeSet::new(),
            unknown: true,
            primitive: false,
        }
    }

    /// Some primitive the analysis does not track precisely
    pub fn top() -> Self {
        Approx {
            value: AbstractValue::Top,
            primitive: true,
            ..Approx::default()
        }
    }

    pub fn is_bottom(&self) -> bool {
        self.value.is_bottom() && self.refs.is_empty() && !self.unknown
    }

    /// Join `other` into `self`, reporting whether anything changed
    pub fn join_in_place(&mut self, other: &Approx) -> bool {
        if other.leq(self) {
            return false;
        }
        *self = self.join(other);
        true
    }

    pub fn closures(&self) -> impl Iterator<Item = ClosureId> + '_ {
        self.refs.iter().filter_map(|r| match r {
            HeapRef::Closure(c) => Some(*c),
            HeapRef::Object(_) => None,
        })
    }

    /// `Some` when every observed value has the same truthiness
    pub fn truthiness(&self) -> Option<bool> {
        if self.unknown {
            return None;
        }
        match &self.value {
            AbstractValue::Constant(Value::Primitive(p)) => Some(p.to_boolean()),
            AbstractValue::Constant(Value::Ref(_)) => Some(true),
            AbstractValue::Bottom | AbstractValue::Top => None,
        }
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractValue::Bottom => write!(f, "⊥"),
            AbstractValue::Constant(Value::Primitive(p)) => write!(f, "{}", p),
            AbstractValue::Constant(Value::Ref(HeapRef::Object(o))) => {
                write!(f, "<object #{}>", o.0.0)
            }
            AbstractValue::Constant(Value::Ref(HeapRef::Closure(c))) => {
                write!(f, "<closure #{}>", c.0)
            }
            AbstractValue::Top => write!(f, "⊤"),
        }
    }
}

// ============ PRIMITIVE SEMANTICS ============

impl LiteralValue {
    /// ToBoolean
    pub fn to_boolean(&self) -> bool {
        match self {
            LiteralValue::Undefined | LiteralValue::Null => false,
            LiteralValue::Boolean(b) => *b,
            LiteralValue::Number(n) => *n != 0.0 && !n.is_nan(),
            LiteralValue::String(s) => !s.is_empty(),
        }
    }

    /// ToNumber
    pub fn to_number(&self) -> f64 {
        match self {
            LiteralValue::Undefined => f64::NAN,
            LiteralValue::Null => 0.0,
            LiteralValue::Boolean(true) => 1.0,
            LiteralValue::Boolean(false) => 0.0,
            LiteralValue::Number(n) => *n,
            LiteralValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
        }
    }

    /// ToString
    pub fn to_js_string(&self) -> Name {
        match self {
            LiteralValue::Undefined => Rc::from("undefined"),
            LiteralValue::Null => Rc::from("null"),
            LiteralValue::Boolean(true) => Rc::from("true"),
            LiteralValue::Boolean(false) => Rc::from("false"),
            LiteralValue::Number(n) => Rc::from(number_to_string(*n)),
            LiteralValue::String(s) => Rc::clone(s),
        }
    }

    /// Property key of a computed member access or literal key
    pub fn to_property_key(&self) -> Name {
        self.to_js_string()
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            LiteralValue::Undefined => "undefined",
            LiteralValue::Null => "object",
            LiteralValue::Boolean(_) => "boolean",
            LiteralValue::Number(_) => "number",
            LiteralValue::String(_) => "string",
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &LiteralValue) -> bool {
        match (self, other) {
            (LiteralValue::Number(a), LiteralValue::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Abstract equality (==) restricted to primitives
    pub fn loose_equals(&self, other: &LiteralValue) -> bool {
        use LiteralValue::*;
        match (self, other) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number(_), String(_)) | (String(_), Number(_)) | (Boolean(_), _) | (_, Boolean(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

/// Number::toString. Rust's shortest round-trip digits are reused; only the
/// switch to exponent notation outside `[1e-6, 1e21)` differs from `Display`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return n.to_string();
    }
    // `{:e}` prints `1.5e300` / `1e-7`; JS wants an explicit `+` on positive exponents
    let formatted = format!("{:e}", n);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

/// Human-readable name for a closure's function, used in logs
pub fn function_label(function: &Function) -> String {
    match function.display_name() {
        Some(name) => name.to_string(),
        None => "<anonymous>".to_string(),
    }
}
