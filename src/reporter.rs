//! Reporter
//!
//! Projects the fixpoint state onto the locations a reader cares about:
//! bindings captured by some closure, object properties and (optionally)
//! program globals. Locations with the same description (one binding seen
//! in several activations) are joined before they are classified.

use core::fmt;

use serde::ser::{Serialize, Serializer};

use crate::ast::LiteralValue;
use crate::config::AnalyzerConfig;
use crate::extractor::{ScopeKind, StaticInfo, THIS};
use crate::heap::{Heap, LocationKey};
use crate::lattice::{AbstractValue, Approx, HeapRef, Lattice, Value, number_to_string};
use crate::prelude::*;
use crate::scheduler::GlobalAbstractState;

/// A value the analysis proved a location always holds
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Literal(LiteralValue),
    /// Object allocated at the described site
    Object(String),
    /// Closure of the described function
    Function(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Literal(LiteralValue::Undefined) => write!(f, "<undefined>"),
            Constant::Literal(lit) => write!(f, "{}", lit),
            Constant::Object(site) => write!(f, "<object {}>", site),
            Constant::Function(path) => write!(f, "<function {}>", path),
        }
    }
}

// JSON has no undefined and no heap references; those are written as
// bracketed descriptions
impl Serialize for Constant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Constant::Literal(LiteralValue::Null) => serializer.serialize_unit(),
            Constant::Literal(LiteralValue::Boolean(b)) => serializer.serialize_bool(*b),
            Constant::Literal(LiteralValue::Number(n)) if n.is_finite() => {
                serializer.serialize_f64(*n)
            }
            Constant::Literal(LiteralValue::Number(n)) => {
                serializer.serialize_str(&number_to_string(*n))
            }
            Constant::Literal(LiteralValue::String(s)) => serializer.serialize_str(s),
            other => serializer.collect_str(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Exactly one value was ever observed
    Constant(Constant),
    /// Two or more values, or a value from outside the program
    Varies,
    /// Never observed
    Dead,
}

impl Classification {
    pub fn is_constant(&self) -> bool {
        matches!(self, Classification::Constant(_))
    }

    pub fn constant(&self) -> Option<&Constant> {
        match self {
            Classification::Constant(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Constant(c) => write!(f, "constant {}", c),
            Classification::Varies => write!(f, "varies"),
            Classification::Dead => write!(f, "dead"),
        }
    }
}

/// Classified locations keyed by description (`global/outerFn1/x`,
/// `global/outerFn1/someApiObject1.y`)
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Report {
    entries: IndexMap<String, Classification>,
}

impl Report {
    pub fn get(&self, description: &str) -> Option<&Classification> {
        self.entries.get(description)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Classification)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptions classified as constant, with their values
    pub fn constants(&self) -> impl Iterator<Item = (&String, &Constant)> {
        self.entries
            .iter()
            .filter_map(|(d, c)| c.constant().map(|value| (d, value)))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Classify every reported location of a fixpoint state
pub fn report(info: &StaticInfo, state: &GlobalAbstractState, config: &AnalyzerConfig) -> Report {
    let heap = &state.heap;
    let mut joined: IndexMap<String, Approx> = index_map_new();

    for (_, location) in heap.locations() {
        let Some(description) = describe(info, heap, &location.key, config) else {
            continue;
        };
        joined
            .entry(description)
            .or_default()
            .join_in_place(&location.approx);
    }

    let entries = joined
        .into_iter()
        .map(|(description, approx)| {
            let classification = classify(info, heap, &approx);
            (description, classification)
        })
        .collect();
    Report { entries }
}

/// Classification of one abstract value
pub fn classify(info: &StaticInfo, heap: &Heap, approx: &Approx) -> Classification {
    if approx.unknown {
        return Classification::Varies;
    }
    match &approx.value {
        AbstractValue::Bottom => Classification::Dead,
        AbstractValue::Top => Classification::Varies,
        AbstractValue::Constant(Value::Primitive(lit)) => {
            Classification::Constant(Constant::Literal(lit.clone()))
        }
        AbstractValue::Constant(Value::Ref(HeapRef::Object(site))) => {
            Classification::Constant(Constant::Object(describe_owner(
                info,
                heap,
                HeapRef::Object(*site),
            )))
        }
        AbstractValue::Constant(Value::Ref(HeapRef::Closure(closure))) => {
            Classification::Constant(Constant::Function(describe_owner(
                info,
                heap,
                HeapRef::Closure(*closure),
            )))
        }
    }
}

/// Description of a reported location; `None` for locations that are not
/// reported (uncaptured locals, `this`, host externals, return values)
fn describe(
    info: &StaticInfo,
    heap: &Heap,
    key: &LocationKey,
    config: &AnalyzerConfig,
) -> Option<String> {
    match key {
        LocationKey::Binding { scope, name } => {
            if &**name == THIS {
                return None;
            }
            let scope = info.scope(scope.node)?;
            let captured = scope.captured.contains(name);
            let global =
                config.report_globals && scope.kind == ScopeKind::Program && scope.declares(name);
            (captured || global).then(|| format!("{}/{}", scope.path, name))
        }
        LocationKey::Property { owner, name } => {
            Some(format!("{}.{}", describe_owner(info, heap, *owner), name))
        }
        LocationKey::Return(_) => None,
    }
}

fn describe_owner(info: &StaticInfo, heap: &Heap, owner: HeapRef) -> String {
    match owner {
        HeapRef::Object(site) => info
            .site(site.0)
            .map_or_else(|| format!("{{object#{}}}", site.0.0), str::to_string),
        HeapRef::Closure(id) => heap
            .closure(id)
            .and_then(|closure| info.function(closure.function).ok())
            .map_or_else(|| format!("{{closure#{}}}", id.0), |f| f.path.clone()),
    }
}
