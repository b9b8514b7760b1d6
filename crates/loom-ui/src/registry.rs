//! Type-name → factory lookup, supplied per construction session.
//!
//! A [`Registry`] is an ordinary value: build one per target toolkit (or per
//! test) and pass it to every call. Nothing is cached process-wide.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use loom_engine::Value;

use crate::error::RuntimeError;
use crate::widget::Instance;

// ── Factory ───────────────────────────────────────────────────────────────

/// Arguments of one construct, already evaluated.
pub struct FactoryCall<'a> {
    pub type_name: &'a str,
    pub args: Vec<Value>,
    /// Keyword arguments in source order.
    pub kwargs: Vec<(String, Value)>,
    /// The registry the construct was resolved in, for factories that build
    /// further constructs themselves.
    pub registry: &'a Registry,
}

/// What a factory built.
pub struct FactoryOutput {
    /// Top-level instances: one for a widget, the roots for a define.
    pub instances: Vec<Instance>,
    /// Named values a construct's captures can pick up.
    pub exports: Vec<(String, Value)>,
}

impl FactoryOutput {
    pub fn single(instance: Instance) -> Self {
        Self { instances: vec![instance], exports: Vec::new() }
    }
}

/// Builds the instance(s) for one construct type.
pub trait Factory {
    fn build(&self, call: FactoryCall<'_>) -> Result<FactoryOutput, RuntimeError>;
}

struct FnFactory<F>(F);

impl<F> Factory for FnFactory<F>
where
    F: Fn(FactoryCall<'_>) -> Result<FactoryOutput, RuntimeError>,
{
    fn build(&self, call: FactoryCall<'_>) -> Result<FactoryOutput, RuntimeError> {
        (self.0)(call)
    }
}

// ── LookupError ───────────────────────────────────────────────────────────

/// A construct type the registry does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub type_name: String,
    pub registry: String,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown type '{}' in registry '{}'", self.type_name, self.registry)
    }
}

impl std::error::Error for LookupError {}

// ── Registry ──────────────────────────────────────────────────────────────

pub struct Registry {
    name: String,
    factories: HashMap<String, Rc<dyn Factory>>,
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), factories: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn register(mut self, type_name: impl Into<String>, factory: impl Factory + 'static) -> Self {
        self.insert(type_name, factory);
        self
    }

    /// Register a closure as a factory.
    pub fn register_fn<F>(self, type_name: impl Into<String>, build: F) -> Self
    where
        F: Fn(FactoryCall<'_>) -> Result<FactoryOutput, RuntimeError> + 'static,
    {
        self.register(type_name, FnFactory(build))
    }

    /// Add or replace the factory for `type_name`.
    pub fn insert(&mut self, type_name: impl Into<String>, factory: impl Factory + 'static) {
        let type_name = type_name.into();
        log::debug!("registry '{}': registered {}", self.name, type_name);
        self.factories.insert(type_name, Rc::new(factory));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn lookup(&self, type_name: &str) -> Result<Rc<dyn Factory>, LookupError> {
        self.factories.get(type_name).cloned().ok_or_else(|| LookupError {
            type_name: type_name.to_string(),
            registry: self.name.clone(),
        })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("Registry").field("name", &self.name).field("types", &types).finish()
    }
}
