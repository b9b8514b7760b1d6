//! The object model shared by data models and widgets.
//!
//! An [`Object`] is a reference-counted bag of named attributes. Every write
//! that changes a value is announced synchronously to the attribute's
//! observers, in registration order. The binding runtime is built entirely on
//! these notifications.
//!
//! Ownership flows root to leaf: a parent owns its children, an object owns
//! the bindings that write into it, and the back-reference to the parent is a
//! [`Weak`] that never extends a lifetime.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binding::Binding;
use crate::value::Value;

pub type ObjectRef = Rc<Object>;

// ── ObjectId ──────────────────────────────────────────────────────────────

/// Process-unique identity of an object, stable for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ObjectId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Phase ─────────────────────────────────────────────────────────────────

/// Lifecycle of a constructed instance.
///
/// Construction leaves objects `Pending`; the UI layer then drives every tree
/// through `Created → Initialized → Bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Pending,
    Created,
    Initialized,
    Bound,
    Destroyed,
}

// ── Change ────────────────────────────────────────────────────────────────

/// One attribute change, as delivered to observers.
#[derive(Debug, Clone)]
pub struct Change {
    pub object: ObjectRef,
    pub name: String,
    pub old: Value,
    pub new: Value,
}

type Callback = Rc<dyn Fn(&Change)>;

struct Observer {
    id: u64,
    attr: String,
    callback: Callback,
    /// Cleared on removal so an in-progress dispatch skips the observer.
    alive: Rc<Cell<bool>>,
}

/// Handle for one registered observer. Dropping it unregisters the observer.
pub struct Subscription {
    object: Weak<Object>,
    id: u64,
}

impl Subscription {
    pub fn object(&self) -> Option<ObjectRef> {
        self.object.upgrade()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(object) = self.object.upgrade() {
            object.unobserve(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ── Object ────────────────────────────────────────────────────────────────

pub struct Object {
    id: ObjectId,
    type_name: String,
    this: Weak<Object>,
    attrs: RefCell<Vec<(String, Value)>>,
    observers: RefCell<Vec<Observer>>,
    next_observer: Cell<u64>,
    /// Attributes whose change notification is being dispatched right now.
    in_flight: RefCell<Vec<String>>,
    parent: RefCell<Weak<Object>>,
    children: RefCell<Vec<ObjectRef>>,
    bindings: RefCell<Vec<Rc<Binding>>>,
    phase: Cell<Phase>,
}

impl Object {
    pub fn new(type_name: &str) -> ObjectRef {
        Rc::new_cyclic(|this| Object {
            id: ObjectId::next(),
            type_name: type_name.to_string(),
            this: this.clone(),
            attrs: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            next_observer: Cell::new(0),
            in_flight: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            bindings: RefCell::new(Vec::new()),
            phase: Cell::new(Phase::Pending),
        })
    }

    /// Build an object with initial attributes, without notifying anyone.
    pub fn with_attrs<K, V>(type_name: &str, attrs: impl IntoIterator<Item = (K, V)>) -> ObjectRef
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let object = Object::new(type_name);
        {
            let mut slots = object.attrs.borrow_mut();
            for (name, value) in attrs {
                let name = name.into();
                let value = value.into();
                match slots.iter_mut().find(|(n, _)| *n == name) {
                    Some(slot) => slot.1 = value,
                    None => slots.push((name, value)),
                }
            }
        }
        object
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    // ── attributes ────────────────────────────────────────────────────────

    pub fn get(&self, name: &str) -> Option<Value> {
        self.attrs.borrow().iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrs.borrow().iter().any(|(n, _)| n == name)
    }

    /// Attribute names in first-assignment order.
    pub fn attr_names(&self) -> Vec<String> {
        self.attrs.borrow().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Write an attribute. Returns `false` (and notifies nobody) when the
    /// stored value is already equal to `value`.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let old = {
            let mut attrs = self.attrs.borrow_mut();
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, slot)) if *slot == value => return false,
                Some((_, slot)) => std::mem::replace(slot, value.clone()),
                None => {
                    attrs.push((name.to_string(), value.clone()));
                    Value::None
                }
            }
        };
        self.notify(name, old, value);
        true
    }

    /// Write an attribute and notify even if the value did not change.
    /// Used for event-like attributes.
    pub fn emit(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let old = {
            let mut attrs = self.attrs.borrow_mut();
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, slot)) => std::mem::replace(slot, value.clone()),
                None => {
                    attrs.push((name.to_string(), value.clone()));
                    Value::None
                }
            }
        };
        self.notify(name, old, value);
    }

    // ── observers ─────────────────────────────────────────────────────────

    /// Register `callback` for changes of attribute `name`.
    pub fn observe(&self, name: &str, callback: impl Fn(&Change) + 'static) -> Subscription {
        let id = self.next_observer.get();
        self.next_observer.set(id + 1);
        self.observers.borrow_mut().push(Observer {
            id,
            attr: name.to_string(),
            callback: Rc::new(callback),
            alive: Rc::new(Cell::new(true)),
        });
        Subscription { object: self.this.clone(), id }
    }

    fn unobserve(&self, id: u64) {
        let mut observers = self.observers.borrow_mut();
        if let Some(index) = observers.iter().position(|o| o.id == id) {
            observers.remove(index).alive.set(false);
        }
    }

    pub fn observer_count(&self, name: &str) -> usize {
        self.observers.borrow().iter().filter(|o| o.attr == name).count()
    }

    /// True while observers of `name` are being called.
    pub fn is_in_flight(&self, name: &str) -> bool {
        self.in_flight.borrow().iter().any(|n| n == name)
    }

    fn notify(&self, name: &str, old: Value, new: Value) {
        let Some(object) = self.this.upgrade() else {
            return;
        };
        // Snapshot so observers may subscribe or unsubscribe while we dispatch.
        let snapshot: Vec<(Callback, Rc<Cell<bool>>)> = self
            .observers
            .borrow()
            .iter()
            .filter(|o| o.attr == name)
            .map(|o| (o.callback.clone(), o.alive.clone()))
            .collect();
        if snapshot.is_empty() {
            return;
        }

        let change = Change { object, name: name.to_string(), old, new };
        self.in_flight.borrow_mut().push(name.to_string());
        for (callback, alive) in snapshot {
            if alive.get() {
                callback(&change);
            }
        }
        let mut in_flight = self.in_flight.borrow_mut();
        if let Some(index) = in_flight.iter().rposition(|n| n == name) {
            in_flight.remove(index);
        }
    }

    // ── tree ──────────────────────────────────────────────────────────────

    pub fn parent(&self) -> Option<ObjectRef> {
        self.parent.borrow().upgrade()
    }

    pub fn children(&self) -> Vec<ObjectRef> {
        self.children.borrow().clone()
    }

    pub fn add_child(&self, child: ObjectRef) {
        *child.parent.borrow_mut() = self.this.clone();
        self.children.borrow_mut().push(child);
    }

    // ── bindings & lifecycle ──────────────────────────────────────────────

    /// Take ownership of a binding that writes into this object.
    pub fn own_binding(&self, binding: Rc<Binding>) {
        self.bindings.borrow_mut().push(binding);
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.set(phase);
    }

    /// Tear down this object and its subtree: disconnect every owned binding,
    /// drop all observers and release the children.
    pub fn destroy(&self) {
        if self.phase.get() == Phase::Destroyed {
            return;
        }
        self.phase.set(Phase::Destroyed);
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.destroy();
        }
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        for binding in &bindings {
            binding.disconnect();
        }
        drop(bindings);
        for observer in self.observers.borrow_mut().drain(..) {
            observer.alive.set(false);
        }
        *self.parent.borrow_mut() = Weak::new();
        log::trace!("destroyed {} #{}", self.type_name, self.id);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("attrs", &self.attr_names())
            .field("phase", &self.phase.get())
            .finish()
    }
}
