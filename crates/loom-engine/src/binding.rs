//! Runtime behaviour of the four binding operators.
//!
//! | Operator | Behaviour |
//! |----------|-----------|
//! | `=`  | [`apply_default`]: evaluate once, assign, no listener |
//! | `<<` | [`Binding::bind`]: re-evaluate whenever a recorded dependency changes |
//! | `:=` | [`Binding::delegate`]: `<<` plus write-back from the target into `base.attr` |
//! | `>>` | [`Binding::notify`]: evaluate for side effect whenever the target changes |
//!
//! # Propagation policy
//!
//! Updates run synchronously inside the change notification that triggered
//! them. Two guards stop runaway propagation:
//!
//! * a binding never re-enters itself while it is evaluating or writing;
//! * a binding never writes an attribute whose own change notification is
//!   still being dispatched ([`Object::is_in_flight`]). The one exception is
//!   a delegate pushing a normalised value back to the side it came from.
//!
//! In `A << f(B)` / `B << g(A)`, a change to `A` recomputes `B`, and the
//! recomputation of `A` that `B` would trigger is skipped. Diamonds still
//! converge because each branch's notification has finished before the next
//! sibling listener runs.
//!
//! Errors from re-evaluations triggered by a notification have no caller to
//! return to; they are logged at `warn` and the target keeps its value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::code::Code;
use crate::error::EvalError;
use crate::eval::{Evaluator, Frame};
use crate::object::{Change, Object, ObjectRef, Subscription};
use crate::value::Value;

/// Everything a binding needs to know about where it writes.
#[derive(Clone)]
pub struct Site {
    pub target: ObjectRef,
    pub attr: String,
    pub frame: Rc<Frame>,
    /// Rendered source line, for logs.
    pub label: String,
}

/// `target.attr = value` evaluated once.
pub fn apply_default(site: &Site, code: &Code) -> Result<(), EvalError> {
    let value = Evaluator::new(&site.frame).eval(code)?;
    site.target.set(&site.attr, value);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Bind,
    Delegate,
    Notify,
}

/// Marks a binding busy for the lifetime of the guard.
struct Busy<'a>(&'a Cell<bool>);

impl<'a> Busy<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) { None } else { Some(Busy(flag)) }
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// ── Binding ───────────────────────────────────────────────────────────────

/// A live `<<`, `:=` or `>>` binding, owned by its target object.
pub struct Binding {
    kind: BindingKind,
    this: Weak<Binding>,
    /// The owner; weak so the binding does not keep it alive.
    target: Weak<Object>,
    attr: String,
    code: Rc<Code>,
    frame: Rc<Frame>,
    label: String,
    /// Listeners on the dependencies found by the last evaluation.
    sources: RefCell<Vec<Subscription>>,
    /// Listener on the target attribute (`:=` and `>>`).
    target_listener: RefCell<Option<Subscription>>,
    busy: Cell<bool>,
}

impl Binding {
    fn new(kind: BindingKind, site: &Site, code: Rc<Code>) -> Rc<Binding> {
        Rc::new_cyclic(|this| Binding {
            kind,
            this: this.clone(),
            target: Rc::downgrade(&site.target),
            attr: site.attr.clone(),
            code,
            frame: site.frame.clone(),
            label: site.label.clone(),
            sources: RefCell::new(Vec::new()),
            target_listener: RefCell::new(None),
            busy: Cell::new(false),
        })
    }

    /// One-way binding: evaluate now while recording reads, subscribe to
    /// exactly those reads, and repeat on every change of any of them.
    pub fn bind(site: &Site, code: Rc<Code>) -> Result<Rc<Binding>, EvalError> {
        let binding = Binding::new(BindingKind::Bind, site, code);
        binding.refresh()?;
        site.target.own_binding(binding.clone());
        Ok(binding)
    }

    /// Two-way binding with `base.attr`: forward like [`bind`](Self::bind),
    /// and write target changes back into `base.attr`.
    pub fn delegate(site: &Site, code: Rc<Code>) -> Result<Rc<Binding>, EvalError> {
        if code.as_attr_path().is_none() {
            return Err(EvalError::NotAssignable(site.label.clone()));
        }
        let binding = Binding::new(BindingKind::Delegate, site, code);
        binding.refresh()?;
        binding.listen_to_target();
        site.target.own_binding(binding.clone());
        Ok(binding)
    }

    /// Event hook: evaluate `code` with `args` bound to the change record
    /// every time the target attribute changes.
    pub fn notify(site: &Site, code: Rc<Code>) -> Rc<Binding> {
        let binding = Binding::new(BindingKind::Notify, site, code);
        binding.listen_to_target();
        site.target.own_binding(binding.clone());
        binding
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of dependencies currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.sources.borrow().len()
    }

    /// Drop every listener. The binding never fires again.
    pub fn disconnect(&self) {
        self.sources.borrow_mut().clear();
        self.target_listener.borrow_mut().take();
    }

    fn listen_to_target(&self) {
        let Some(target) = self.target.upgrade() else {
            return;
        };
        let weak = self.this.clone();
        let subscription = target.observe(&self.attr, move |change| {
            if let Some(binding) = weak.upgrade() {
                binding.on_target_changed(change);
            }
        });
        *self.target_listener.borrow_mut() = Some(subscription);
    }

    // ── forward: sources → target ─────────────────────────────────────────

    fn on_source_changed(&self) {
        let Some(target) = self.target.upgrade() else {
            return;
        };
        if self.busy.get() {
            log::trace!("`{}`: already updating, skipped", self.label);
            return;
        }
        if target.is_in_flight(&self.attr) {
            log::trace!("`{}`: target still notifying, propagation stops", self.label);
            return;
        }
        log::trace!("re-evaluating `{}`", self.label);
        if let Err(err) = self.refresh() {
            log::warn!("binding `{}` failed: {}", self.label, err);
        }
    }

    /// Evaluate in recording mode, swap listeners to the new dependency set
    /// and assign the result.
    fn refresh(&self) -> Result<(), EvalError> {
        let Some(_busy) = Busy::enter(&self.busy) else {
            return Ok(());
        };
        let Some(target) = self.target.upgrade() else {
            return Ok(());
        };

        let mut evaluator = Evaluator::new(&self.frame).recording();
        let result = evaluator.eval(&self.code);
        let deps = evaluator.into_dependencies();

        // Swap even on failure, so a fix to a dependency that made the
        // evaluation fail triggers a retry.
        let fresh: Vec<Subscription> = deps
            .iter()
            .map(|(object, attr)| {
                let weak = self.this.clone();
                object.observe(attr, move |_| {
                    if let Some(binding) = weak.upgrade() {
                        binding.on_source_changed();
                    }
                })
            })
            .collect();
        let stale = std::mem::replace(&mut *self.sources.borrow_mut(), fresh);
        drop(stale);
        log::trace!("`{}` depends on {} attribute(s)", self.label, deps.len());

        let value = result?;
        target.set(&self.attr, value.clone());

        if self.kind == BindingKind::Delegate {
            // The target may normalise what it was given; keep the source in step.
            let stored = target.get(&self.attr).unwrap_or_default();
            if stored != value {
                let (source, attr) = self.source()?;
                source.set(attr, stored);
            }
        }
        Ok(())
    }

    // ── reverse: target → source / side effect ────────────────────────────

    fn on_target_changed(&self, change: &Change) {
        let result = match self.kind {
            BindingKind::Delegate => self.reverse(change),
            BindingKind::Notify => self.fire(change),
            BindingKind::Bind => Ok(()),
        };
        if let Err(err) = result {
            log::warn!("binding `{}` failed: {}", self.label, err);
        }
    }

    fn reverse(&self, change: &Change) -> Result<(), EvalError> {
        let Some(_busy) = Busy::enter(&self.busy) else {
            return Ok(());
        };
        let (source, attr) = self.source()?;
        if source.is_in_flight(attr) {
            log::trace!("`{}`: source still notifying, write-back stops", self.label);
            return Ok(());
        }
        log::trace!("writing back `{}`", self.label);
        source.set(attr, change.new.clone());

        // The source may normalise what it was given; keep the target in step.
        let stored = source.get(attr).unwrap_or_default();
        if stored != change.new {
            change.object.set(&self.attr, stored);
        }
        Ok(())
    }

    /// The object and attribute a delegate's `base.attr` expression denotes.
    fn source(&self) -> Result<(ObjectRef, &str), EvalError> {
        let Some((base, attr)) = self.code.as_attr_path() else {
            return Err(EvalError::NotAssignable(self.label.clone()));
        };
        match Evaluator::new(&self.frame).eval(base)? {
            Value::Object(object) => Ok((object, attr)),
            other => Err(EvalError::NotAssignable(format!("a '{}' value", other.type_name()))),
        }
    }

    fn fire(&self, change: &Change) -> Result<(), EvalError> {
        let Some(_busy) = Busy::enter(&self.busy) else {
            return Ok(());
        };
        let args = Object::with_attrs(
            "ChangeArgs",
            [
                ("object", Value::Object(change.object.clone())),
                ("name", Value::Str(change.name.clone())),
                ("old", change.old.clone()),
                ("new", change.new.clone()),
            ],
        );
        log::trace!("notifying `{}`", self.label);
        Evaluator::new(&self.frame).with_args(Value::Object(args)).eval(&self.code)?;
        Ok(())
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
