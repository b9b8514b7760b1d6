//! Callable results of compilation.
//!
//! | Type | Produced from | Call |
//! |------|---------------|------|
//! | [`CompiledDefine`] | `defn Name(params):` | [`call`](CompiledDefine::call), or register it as a type |
//! | [`CompiledConstruct`] | a bare top-level construct | [`build`](CompiledConstruct::build) |
//! | [`CompiledModule`] | a whole source unit | both of the above |
//!
//! Each call runs the shared [`Program`] against a fresh frame, so calls are
//! independent: two views built from one define share no objects and no
//! bindings.

use std::fmt;
use std::rc::Rc;

use loom_engine::{Frame, Value};

use crate::error::RuntimeError;
use crate::program::{Built, Program};
use crate::registry::{Factory, FactoryCall, FactoryOutput, Registry};
use crate::widget::{Instance, run_lifecycle};

// ── View ──────────────────────────────────────────────────────────────────

/// A constructed tree, lifecycle complete.
///
/// Dropping a view destroys it: its bindings stop observing the models they
/// read, so a discarded view does not keep receiving updates.
#[derive(Debug)]
pub struct View {
    roots: Vec<Instance>,
    exports: Vec<(String, Value)>,
}

impl View {
    fn finish(built: Built) -> Self {
        run_lifecycle(&built.roots);
        Self { roots: built.roots, exports: built.exports }
    }

    /// The first root, which for most templates is the only one.
    pub fn root(&self) -> Option<&Instance> {
        self.roots.first()
    }

    pub fn roots(&self) -> &[Instance] {
        &self.roots
    }

    /// Value of an unpack alias or capture after construction.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.exports.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }

    /// Tear every root down, disconnecting all bindings they own.
    pub fn destroy(&self) {
        for root in &self.roots {
            root.object.destroy();
        }
    }
}

impl Drop for View {
    fn drop(&mut self) {
        self.destroy();
    }
}

// ── CompiledDefine ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CompiledDefine {
    name: String,
    /// Parameter names with their already-evaluated defaults.
    params: Vec<(String, Option<Value>)>,
    program: Rc<Program>,
}

impl CompiledDefine {
    pub(crate) fn new(name: &str, params: Vec<(String, Option<Value>)>, program: Rc<Program>) -> Self {
        Self { name: name.to_string(), params, program }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Build a fresh tree from positional arguments.
    pub fn call(&self, registry: &Registry, args: &[Value]) -> Result<View, RuntimeError> {
        self.call_with(registry, args.to_vec(), Vec::new())
    }

    pub fn call_with(
        &self,
        registry: &Registry,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<View, RuntimeError> {
        log::debug!("calling defn {} in registry '{}'", self.name, registry.name());
        self.instantiate(registry, args, kwargs).map(View::finish)
    }

    fn instantiate(
        &self,
        registry: &Registry,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Built, RuntimeError> {
        let frame = Frame::new(self.program.slots);
        for (slot, value) in self.bind_arguments(args, kwargs)?.into_iter().enumerate() {
            frame.set(slot, value);
        }
        self.program.run(registry, &frame)
    }

    /// Match arguments to parameters the way a call does: positionals
    /// first, then keywords, then defaults.
    fn bind_arguments(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Vec<Value>, RuntimeError> {
        let fail = |message: String| RuntimeError::Arguments { define: self.name.clone(), message };

        if args.len() > self.params.len() {
            return Err(fail(format!(
                "takes {} argument(s) but {} were given",
                self.params.len(),
                args.len()
            )));
        }
        let mut bound: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        bound.resize(self.params.len(), None);

        for (name, value) in kwargs {
            let Some(index) = self.params.iter().position(|(p, _)| *p == name) else {
                return Err(fail(format!("unexpected keyword argument '{}'", name)));
            };
            if bound[index].is_some() {
                return Err(fail(format!("got multiple values for argument '{}'", name)));
            }
            bound[index] = Some(value);
        }

        bound
            .into_iter()
            .zip(&self.params)
            .map(|(value, (name, default))| {
                value
                    .or_else(|| default.clone())
                    .ok_or_else(|| fail(format!("missing required argument '{}'", name)))
            })
            .collect()
    }
}

impl fmt::Debug for CompiledDefine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledDefine").field("name", &self.name).field("params", &self.param_names()).finish()
    }
}

/// A define registered as a type builds its roots as children of the
/// enclosing construct. The lifecycle runs later, with the enclosing tree.
impl Factory for CompiledDefine {
    fn build(&self, call: FactoryCall<'_>) -> Result<FactoryOutput, RuntimeError> {
        let built = self.instantiate(call.registry, call.args, call.kwargs)?;
        Ok(FactoryOutput { instances: built.roots, exports: built.exports })
    }
}

// ── CompiledConstruct ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CompiledConstruct {
    program: Rc<Program>,
}

impl CompiledConstruct {
    pub(crate) fn new(program: Rc<Program>) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn build(&self, registry: &Registry) -> Result<View, RuntimeError> {
        let frame = Frame::new(self.program.slots);
        self.program.run(registry, &frame).map(View::finish)
    }
}

// ── CompiledModule ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CompiledModule {
    defines: Vec<CompiledDefine>,
    constructs: Vec<CompiledConstruct>,
}

impl CompiledModule {
    pub(crate) fn new(defines: Vec<CompiledDefine>, constructs: Vec<CompiledConstruct>) -> Self {
        Self { defines, constructs }
    }

    pub fn define(&self, name: &str) -> Option<&CompiledDefine> {
        self.defines.iter().find(|d| d.name == name)
    }

    pub fn defines(&self) -> &[CompiledDefine] {
        &self.defines
    }

    pub fn constructs(&self) -> &[CompiledConstruct] {
        &self.constructs
    }

    /// Register every define as a construct type.
    pub fn register_into(&self, registry: &mut Registry) {
        for define in &self.defines {
            registry.insert(define.name.clone(), define.clone());
        }
    }

    /// Build each top-level construct, in source order.
    pub fn build(&self, registry: &Registry) -> Result<Vec<View>, RuntimeError> {
        self.constructs.iter().map(|c| c.build(registry)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::component::Component;
    use loom_engine::Object;

    fn registry() -> Registry {
        Registry::new("test")
            .register("Window", Component::new().attr("title", ""))
            .register("Label", Component::new().positional(&["text"]).attr("text", ""))
    }

    fn form() -> CompiledDefine {
        let module = Compiler::new()
            .compile_str("defn Form(m, title = 'untitled'):\n    Window -> win:\n        title = title\n        Label(m.name)\n")
            .unwrap();
        module.define("Form").cloned().unwrap()
    }

    #[test]
    fn call_binds_parameters_and_defaults() {
        let model = Object::with_attrs("Model", [("name", "ada")]);
        let view = form().call(&registry(), &[model.clone().into()]).unwrap();
        let win = view.get("win").unwrap();
        assert_eq!(win.as_object().unwrap().get("title"), Some(Value::from("untitled")));
        let label = &view.root().unwrap().children[0];
        assert_eq!(label.object.get("text"), Some(Value::from("ada")));
    }

    #[test]
    fn keyword_arguments() {
        let model = Object::new("Model");
        model.set("name", "x");
        let view = form()
            .call_with(&registry(), vec![], vec![("m".into(), model.into()), ("title".into(), "Inbox".into())])
            .unwrap();
        assert_eq!(view.root().unwrap().object.get("title"), Some(Value::from("Inbox")));
    }

    #[test]
    fn argument_mismatches() {
        let registry = registry();
        let form = form();
        let message = |r: Result<View, RuntimeError>| r.err().unwrap().to_string();
        assert_eq!(message(form.call(&registry, &[])), "Form(): missing required argument 'm'");
        assert_eq!(
            message(form.call(&registry, &[Value::None, Value::None, Value::None])),
            "Form(): takes 2 argument(s) but 3 were given"
        );
        assert_eq!(
            message(form.call_with(&registry, vec![Value::None], vec![("m".into(), Value::None)])),
            "Form(): got multiple values for argument 'm'"
        );
        assert_eq!(
            message(form.call_with(&registry, vec![], vec![("model".into(), Value::None)])),
            "Form(): unexpected keyword argument 'model'"
        );
    }

    #[test]
    fn dropped_views_stop_observing() {
        let module = Compiler::new().compile_str("defn Meter(m):\n    Label:\n        text << str(m.x)\n").unwrap();
        let meter = module.define("Meter").unwrap();
        let registry = registry();
        let m = Object::with_attrs("Model", [("x", 0)]);

        let kept = meter.call(&registry, &[m.clone().into()]).unwrap();
        for _ in 0..5 {
            meter.call(&registry, &[m.clone().into()]).unwrap();
        }
        assert_eq!(m.observer_count("x"), 1);

        m.set("x", 3);
        assert_eq!(kept.root().unwrap().object.get("text"), Some(Value::from("3")));
        drop(kept);
        assert_eq!(m.observer_count("x"), 0);
    }

    #[test]
    fn module_registers_defines_as_types() {
        let module = Compiler::new()
            .compile_str("defn Header(text):\n    Label(text)\n\nWindow:\n    Header('hello')\n")
            .unwrap();
        let mut registry = registry();
        module.register_into(&mut registry);
        let views = module.build(&registry).unwrap();
        let window = views[0].root().unwrap();
        assert_eq!(window.children[0].object.get("text"), Some(Value::from("hello")));
        assert_eq!(window.object.children().len(), 1);
    }
}
