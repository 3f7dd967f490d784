//! Heap and environment operations: declare, read, write, capture

use jsabsint::ast::{FunctionId, Name};
use jsabsint::heap::{
    Binding, Context, DeclarationKind, Environment, Heap, Scope, ScopeInstance,
};
use jsabsint::{AbstractValue, Approx, ErrorKind, LiteralValue, NodeId};

fn name(s: &str) -> Name {
    Name::from(s)
}

fn global_env() -> Environment {
    let mut env = Environment::new();
    env.push(Scope::new(ScopeInstance {
        node: NodeId(0),
        context: Context::Root,
    }));
    env
}

fn number(n: f64) -> Approx {
    Approx::constant(LiteralValue::Number(n))
}

#[test]
fn test_declared_binding_starts_at_bottom() {
    let mut heap = Heap::new();
    let mut env = global_env();
    env.declare(&mut heap, &name("x"), DeclarationKind::Var, None).unwrap();
    let value = env.read(&heap, "x", None).unwrap();
    assert!(value.is_bottom());
}

#[test]
fn test_writes_join() {
    let mut heap = Heap::new();
    let mut env = global_env();
    env.declare(&mut heap, &name("x"), DeclarationKind::Var, None).unwrap();

    let first = env.write(&mut heap, "x", &number(42.0), None).unwrap();
    assert_eq!(first, number(42.0));
    let again = env.write(&mut heap, "x", &number(42.0), None).unwrap();
    assert_eq!(again, number(42.0));
    let second = env.write(&mut heap, "x", &number(43.0), None).unwrap();
    assert_eq!(second.value, AbstractValue::Top);
    assert_eq!(env.read(&heap, "x", None).unwrap().value, AbstractValue::Top);
}

#[test]
fn test_inner_scope_shadows_outer() {
    let mut heap = Heap::new();
    let mut env = global_env();
    env.declare(&mut heap, &name("x"), DeclarationKind::Var, None).unwrap();
    env.write(&mut heap, "x", &number(1.0), None).unwrap();

    env.push(Scope::new(ScopeInstance {
        node: NodeId(5),
        context: Context::CallSite(NodeId(9)),
    }));
    env.declare(&mut heap, &name("x"), DeclarationKind::Let, None).unwrap();
    env.write(&mut heap, "x", &number(2.0), None).unwrap();
    assert_eq!(env.read(&heap, "x", None).unwrap(), number(2.0));

    env.pop();
    assert_eq!(env.read(&heap, "x", None).unwrap(), number(1.0));
}

#[test]
fn test_same_activation_reuses_locations() {
    let mut heap = Heap::new();
    let instance = ScopeInstance {
        node: NodeId(4),
        context: Context::Callback(0),
    };

    let mut first = global_env();
    first.push(Scope::new(instance));
    let a = first.declare(&mut heap, &name("c"), DeclarationKind::Var, None).unwrap();

    let mut second = global_env();
    second.push(Scope::new(instance));
    let b = second.declare(&mut heap, &name("c"), DeclarationKind::Var, None).unwrap();

    assert_eq!(a, b);
    assert_eq!(heap.location_count(), 1);
}

#[test]
fn test_distinct_contexts_get_distinct_locations() {
    let mut heap = Heap::new();
    let mut ids = Vec::new();
    for context in [Context::Root, Context::CallSite(NodeId(1)), Context::Callback(0)] {
        let mut env = Environment::new();
        env.push(Scope::new(ScopeInstance {
            node: NodeId(4),
            context,
        }));
        ids.push(env.declare(&mut heap, &name("c"), DeclarationKind::Var, None).unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_redeclaration_rules() {
    let mut heap = Heap::new();
    let mut env = global_env();
    env.declare(&mut heap, &name("v"), DeclarationKind::Var, None).unwrap();
    // var after var is the same binding
    assert!(env.declare(&mut heap, &name("v"), DeclarationKind::Var, None).is_ok());
    assert!(env.declare(&mut heap, &name("v"), DeclarationKind::Function, None).is_ok());

    let err = env
        .declare(&mut heap, &name("v"), DeclarationKind::Let, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RedeclarationError);

    env.declare(&mut heap, &name("l"), DeclarationKind::Const, None).unwrap();
    let err = env
        .declare(&mut heap, &name("l"), DeclarationKind::Var, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RedeclarationError);
}

#[test]
fn test_unbound_read_and_write() {
    let mut heap = Heap::new();
    let env = global_env();
    assert_eq!(
        env.read(&heap, "nope", None).unwrap_err().kind(),
        ErrorKind::UnboundNameError
    );
    assert_eq!(
        env.write(&mut heap, "nope", &number(1.0), None).unwrap_err().kind(),
        ErrorKind::UnboundNameError
    );
}

#[test]
fn test_closures_share_captured_locations() {
    let mut heap = Heap::new();
    let mut env = global_env();
    let location = env.declare(&mut heap, &name("x"), DeclarationKind::Var, None).unwrap();

    let capture = || {
        let mut scope = Scope::captured();
        scope.bindings.insert(
            name("x"),
            Binding {
                location,
                kind: DeclarationKind::Captured,
            },
        );
        scope
    };
    let first = heap.intern_closure(FunctionId(0), capture());
    let same = heap.intern_closure(FunctionId(0), capture());
    let other = heap.intern_closure(FunctionId(1), capture());
    assert_eq!(first, same);
    assert_ne!(first, other);

    // A write through one closure environment is seen through the other
    let first_env = Environment::for_closure(heap.closure(first).unwrap());
    let other_env = Environment::for_closure(heap.closure(other).unwrap());
    first_env.write(&mut heap, "x", &number(51.0), None).unwrap();
    assert_eq!(other_env.read(&heap, "x", None).unwrap(), number(51.0));
    assert_eq!(env.read(&heap, "x", None).unwrap(), number(51.0));
}

#[test]
fn test_capture_scope_rejects_declarations() {
    let mut heap = Heap::new();
    let mut env = Environment::new();
    env.push(Scope::captured());
    let err = env
        .declare(&mut heap, &name("x"), DeclarationKind::Var, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidProgramError);
}

#[test]
fn test_generation_tracks_changes_only() {
    let mut heap = Heap::new();
    let mut env = global_env();
    let before = heap.generation();
    env.declare(&mut heap, &name("x"), DeclarationKind::Var, None).unwrap();
    let declared = heap.generation();
    assert!(declared > before);

    env.write(&mut heap, "x", &number(1.0), None).unwrap();
    let written = heap.generation();
    assert!(written > declared);

    env.write(&mut heap, "x", &number(1.0), None).unwrap();
    assert_eq!(heap.generation(), written);
}
