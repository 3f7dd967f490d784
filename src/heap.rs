//! Heap and environment model
//!
//! Storage locations live in an arena and are addressed by [`LocationId`].
//! Scopes, closures and objects hold ids rather than references, so closures
//! that capture the same variable share one location without any cycle
//! management, and comparing or snapshotting the whole abstract state is a
//! plain walk over the arena.

use core::fmt;

use crate::ast::{FunctionId, Name, NodeId, Span};
use crate::error::AnalysisError;
use crate::lattice::{Approx, ClosureId, HeapRef, Lattice, ObjectId};
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub u32);

impl LocationId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which activation of a scope a binding belongs to.
///
/// Activations are told apart by the call site that created them (or by the
/// registered callback the scheduler invoked), so re-running a callback in a
/// later round reuses its locations instead of allocating new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Context {
    /// Top-level code
    Root,
    /// Called from this call expression
    CallSite(NodeId),
    /// Invoked by the scheduler as the n-th registered callback
    Callback(u32),
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Root => write!(f, "root"),
            Context::CallSite(node) => write!(f, "call#{}", node.0),
            Context::Callback(index) => write!(f, "callback#{}", index),
        }
    }
}

/// One activation of a static scope (program, function body or block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeInstance {
    pub node: NodeId,
    pub context: Context,
}

/// What a storage location stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationKey {
    Binding { scope: ScopeInstance, name: Name },
    Property { owner: HeapRef, name: Name },
    /// Everything one function activation may return
    Return(ScopeInstance),
}

#[derive(Debug, Clone)]
pub struct Location {
    pub key: LocationKey,
    pub approx: Approx,
}

/// Property map of an abstract object
#[derive(Debug, Clone, Default)]
pub struct ObjectAbstract {
    pub properties: IndexMap<Name, LocationId>,
}

/// A function literal together with the locations it captured.
///
/// The captured scope holds exactly the function's free variables, shared
/// with every other closure that resolved the same names: a write through
/// one closure is visible through all of them.
#[derive(Debug, Clone)]
pub struct ClosureValue {
    pub function: FunctionId,
    pub captured: Rc<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    /// Implicit `this` of non-arrow functions and of the program
    This,
    /// Host global from the configuration
    External,
    /// Free variable copied into a closure
    Captured,
}

impl DeclarationKind {
    /// `let`/`const` may not share a scope with any other declaration of the
    /// same name; `var`, functions and parameters may redeclare each other
    pub fn is_lexical(self) -> bool {
        matches!(self, DeclarationKind::Let | DeclarationKind::Const)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub location: LocationId,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone)]
pub struct Scope {
    /// `None` for the capture scope of a closure
    pub instance: Option<ScopeInstance>,
    pub bindings: IndexMap<Name, Binding>,
}

impl Scope {
    pub fn new(instance: ScopeInstance) -> Self {
        Scope {
            instance: Some(instance),
            bindings: index_map_new(),
        }
    }

    pub fn captured() -> Self {
        Scope {
            instance: None,
            bindings: index_map_new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }
}

/// The abstract heap: every storage location, object and closure of one
/// analysis run.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    locations: Vec<Location>,
    index: FxHashMap<LocationKey, LocationId>,
    objects: IndexMap<HeapRef, ObjectAbstract>,
    closures: Vec<ClosureValue>,
    closure_index: FxHashMap<(FunctionId, Vec<LocationId>), ClosureId>,
    /// Locations each identifier read resolved to, across all activations
    reads: FxHashMap<NodeId, BTreeSet<LocationId>>,
    /// Bumped whenever a location changes value or anything new is allocated
    generation: u64,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn closure_count(&self) -> usize {
        self.closures.len()
    }

    /// Location for `key`, created holding Bottom if it does not exist yet
    pub fn location(&mut self, key: LocationKey) -> LocationId {
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = LocationId(self.locations.len() as u32);
        self.locations.push(Location {
            key: key.clone(),
            approx: Approx::bottom(),
        });
        self.index.insert(key, id);
        self.generation += 1;
        id
    }

    pub fn find(&self, key: &LocationKey) -> Option<LocationId> {
        self.index.get(key).copied()
    }

    pub fn get(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(id.index())
    }

    /// Current content of a location; unknown ids read as Bottom
    pub fn value(&self, id: LocationId) -> Approx {
        self.locations
            .get(id.index())
            .map(|l| l.approx.clone())
            .unwrap_or_default()
    }

    /// Join `value` into the location and return the joined content.
    ///
    /// Writes never overwrite: the scheduler may replay a write any number
    /// of times and each location must only move up the lattice.
    pub fn join_into(&mut self, id: LocationId, value: &Approx) -> Approx {
        match self.locations.get_mut(id.index()) {
            Some(location) => {
                if location.approx.join_in_place(value) {
                    self.generation += 1;
                }
                location.approx.clone()
            }
            None => value.clone(),
        }
    }

    pub fn locations(&self) -> impl Iterator<Item = (LocationId, &Location)> {
        self.locations
            .iter()
            .enumerate()
            .map(|(i, l)| (LocationId(i as u32), l))
    }

    /// Copy of every location's content, in id order
    pub fn snapshot(&self) -> Vec<Approx> {
        self.locations.iter().map(|l| l.approx.clone()).collect()
    }

    // ========== Objects ==========

    /// Register the abstract object of an allocation site
    pub fn allocate_object(&mut self, site: ObjectId) -> HeapRef {
        let owner = HeapRef::Object(site);
        if !self.objects.contains_key(&owner) {
            self.objects.insert(owner, ObjectAbstract::default());
            self.generation += 1;
        }
        owner
    }

    pub fn object(&self, owner: HeapRef) -> Option<&ObjectAbstract> {
        self.objects.get(&owner)
    }

    pub fn objects(&self) -> impl Iterator<Item = (&HeapRef, &ObjectAbstract)> {
        self.objects.iter()
    }

    /// Location of `owner.name`, created on first write
    pub fn property(&mut self, owner: HeapRef, name: &Name) -> LocationId {
        if let Some(id) = self
            .objects
            .get(&owner)
            .and_then(|o| o.properties.get(name.as_ref()))
        {
            return *id;
        }
        let id = self.location(LocationKey::Property {
            owner,
            name: Rc::clone(name),
        });
        self.objects
            .entry(owner)
            .or_default()
            .properties
            .insert(Rc::clone(name), id);
        id
    }

    /// Location of `owner.name` if it was ever written. Objects are open
    /// ended, so a missing property is not an error.
    pub fn find_property(&self, owner: HeapRef, name: &str) -> Option<LocationId> {
        self.objects
            .get(&owner)
            .and_then(|o| o.properties.get(name))
            .copied()
    }

    // ========== Closures ==========

    /// Closures are identified by their function and the locations they
    /// captured, so creating the same closure again (a later scheduler
    /// round, a loop) yields the same id.
    pub fn intern_closure(&mut self, function: FunctionId, captured: Scope) -> ClosureId {
        let key = (
            function,
            captured.bindings.values().map(|b| b.location).collect(),
        );
        if let Some(id) = self.closure_index.get(&key) {
            return *id;
        }
        let id = ClosureId(self.closures.len() as u32);
        self.closures.push(ClosureValue {
            function,
            captured: Rc::new(captured),
        });
        self.closure_index.insert(key, id);
        self.generation += 1;
        id
    }

    pub fn closure(&self, id: ClosureId) -> Option<&ClosureValue> {
        self.closures.get(id.index())
    }

    // ========== Read resolution ==========

    pub fn record_read(&mut self, node: NodeId, location: LocationId) {
        self.reads.entry(node).or_default().insert(location);
    }

    pub fn reads_of(&self, node: NodeId) -> Option<&BTreeSet<LocationId>> {
        self.reads.get(&node)
    }
}

/// Chain of scopes, innermost last; the program scope is always first.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    scopes: Vec<Rc<Scope>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    /// Environment of a closure invocation: its capture scope, to which the
    /// callee pushes its own activation scope
    pub fn for_closure(closure: &ClosureValue) -> Self {
        Environment {
            scopes: vec![Rc::clone(&closure.captured)],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(Rc::new(scope));
    }

    pub fn pop(&mut self) -> Option<Rc<Scope>> {
        self.scopes.pop()
    }

    pub fn innermost(&self) -> Option<&Scope> {
        self.scopes.last().map(|s| s.as_ref())
    }

    /// Resolve `name` innermost-first
    pub fn resolve(&self, name: &str) -> Option<Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Create a Bottom location for `name` in the innermost scope.
    ///
    /// All declarations of a scope are made before any of its statements run,
    /// so declaration order relative to use does not matter.
    pub fn declare(
        &mut self,
        heap: &mut Heap,
        name: &Name,
        kind: DeclarationKind,
        span: Option<Span>,
    ) -> Result<LocationId, AnalysisError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(AnalysisError::invalid_program(
                format!("declaration of {} outside any scope", name),
                span,
            ));
        };
        let scope = Rc::make_mut(scope);
        if let Some(existing) = scope.bindings.get(name.as_ref()) {
            if existing.kind.is_lexical() || kind.is_lexical() {
                return Err(AnalysisError::redeclaration(name.as_ref(), span));
            }
            return Ok(existing.location);
        }
        let Some(instance) = scope.instance else {
            return Err(AnalysisError::invalid_program(
                format!("cannot declare {} in a capture scope", name),
                span,
            ));
        };
        let location = heap.location(LocationKey::Binding {
            scope: instance,
            name: Rc::clone(name),
        });
        scope
            .bindings
            .insert(Rc::clone(name), Binding { location, kind });
        Ok(location)
    }

    pub fn read(&self, heap: &Heap, name: &str, span: Option<Span>) -> Result<Approx, AnalysisError> {
        let binding = self
            .resolve(name)
            .ok_or_else(|| AnalysisError::unbound_name(name, span))?;
        Ok(heap.value(binding.location))
    }

    /// Join `value` into the binding of `name`; returns the joined content
    pub fn write(
        &self,
        heap: &mut Heap,
        name: &str,
        value: &Approx,
        span: Option<Span>,
    ) -> Result<Approx, AnalysisError> {
        let binding = self
            .resolve(name)
            .ok_or_else(|| AnalysisError::unbound_name(name, span))?;
        Ok(heap.join_into(binding.location, value))
    }
}
