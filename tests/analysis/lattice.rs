//! Lattice laws for the full abstract value (constant, references, unknown)

use jsabsint::lattice::{ClosureId, HeapRef, ObjectId, Value};
use jsabsint::{AbstractValue, Approx, Lattice, LiteralValue, NodeId};

fn samples() -> Vec<Approx> {
    let object = HeapRef::Object(ObjectId(NodeId(3)));
    let closure = HeapRef::Closure(ClosureId(1));
    vec![
        Approx::bottom(),
        Approx::constant(LiteralValue::Number(51.0)),
        Approx::constant(LiteralValue::Number(52.0)),
        Approx::constant(LiteralValue::Null),
        Approx::undefined(),
        Approx::reference(object),
        Approx::reference(closure),
        Approx::undefined().join(&Approx::reference(object)),
        Approx::top(),
        Approx::unknown(),
    ]
}

#[test]
fn test_join_is_commutative() {
    for a in samples() {
        for b in samples() {
            assert_eq!(a.join(&b), b.join(&a));
        }
    }
}

#[test]
fn test_join_is_idempotent_with_bottom_neutral() {
    for a in samples() {
        assert_eq!(a.join(&a), a);
        assert_eq!(a.join(&Approx::bottom()), a);
        assert_eq!(Approx::bottom().join(&a), a);
    }
}

#[test]
fn test_join_is_associative() {
    let samples = samples();
    for a in &samples {
        for b in &samples {
            for c in &samples {
                assert_eq!(a.join(b).join(c), a.join(&b.join(c)));
            }
        }
    }
}

#[test]
fn test_join_is_an_upper_bound() {
    for a in samples() {
        for b in samples() {
            let joined = a.join(&b);
            assert!(a.leq(&joined));
            assert!(b.leq(&joined));
        }
    }
}

#[test]
fn test_chains_stabilise_within_lattice_height() {
    let mut slot = Approx::bottom();
    let mut changes = 0;
    for n in 0..10 {
        if slot.join_in_place(&Approx::constant(LiteralValue::Number(f64::from(n)))) {
            changes += 1;
        }
    }
    assert_eq!(changes, 2);
    assert_eq!(slot.value.height(), 2);
}

#[test]
fn test_references_are_kept_when_value_goes_top() {
    let a = HeapRef::Object(ObjectId(NodeId(1)));
    let b = HeapRef::Object(ObjectId(NodeId(2)));
    let joined = Approx::reference(a).join(&Approx::reference(b));
    assert_eq!(joined.value, AbstractValue::Top);
    assert_eq!(joined.refs.len(), 2);

    let same = Approx::reference(a).join(&Approx::reference(a));
    assert_eq!(same.value, AbstractValue::Constant(Value::Ref(a)));
}
