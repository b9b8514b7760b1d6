//! A generic factory for attribute-bag widgets.
//!
//! Toolkits with no native widget for a type (and tests) register a
//! [`Component`]: it builds an [`Object`] carrying the construct's type name,
//! seeds declared defaults, maps positional arguments onto declared attribute
//! names and applies keyword arguments as attributes.

use std::rc::Rc;

use loom_engine::{Object, Value};

use crate::error::RuntimeError;
use crate::registry::{Factory, FactoryCall, FactoryOutput};
use crate::widget::{Instance, NoHooks, WidgetHooks};

type HooksFn = dyn Fn() -> Rc<dyn WidgetHooks>;

#[derive(Clone, Default)]
pub struct Component {
    positional: Vec<String>,
    defaults: Vec<(String, Value)>,
    hooks: Option<Rc<HooksFn>>,
}

impl Component {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute names receiving positional arguments, in order.
    pub fn positional(mut self, names: &[&str]) -> Self {
        self.positional = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Initial value of `name` unless an argument overrides it.
    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.defaults.push((name.to_string(), value.into()));
        self
    }

    /// Toolkit hooks for every instance built.
    pub fn hooks(mut self, make: impl Fn() -> Rc<dyn WidgetHooks> + 'static) -> Self {
        self.hooks = Some(Rc::new(make));
        self
    }
}

impl Factory for Component {
    fn build(&self, call: FactoryCall<'_>) -> Result<FactoryOutput, RuntimeError> {
        if call.args.len() > self.positional.len() {
            return Err(RuntimeError::Factory {
                type_name: call.type_name.to_string(),
                message: format!(
                    "takes {} positional argument(s) but {} were given",
                    self.positional.len(),
                    call.args.len()
                ),
            });
        }

        let object = Object::with_attrs(call.type_name, self.defaults.iter().cloned());
        for (name, value) in self.positional.iter().zip(call.args) {
            object.set(name, value);
        }
        for (name, value) in call.kwargs {
            object.set(&name, value);
        }

        let hooks: Rc<dyn WidgetHooks> = match &self.hooks {
            Some(make) => make(),
            None => Rc::new(NoHooks),
        };
        Ok(FactoryOutput::single(Instance::with_hooks(object, hooks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn build(component: &Component, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<FactoryOutput, RuntimeError> {
        let registry = Registry::new("test");
        component.build(FactoryCall { type_name: "Label", args, kwargs, registry: &registry })
    }

    #[test]
    fn arguments_become_attributes() {
        let label = Component::new().positional(&["text"]).attr("text", "").attr("visible", true);
        let output = build(&label, vec![Value::from("hi")], vec![("visible".into(), Value::Bool(false))]).unwrap();
        let object = &output.instances[0].object;
        assert_eq!(object.type_name(), "Label");
        assert_eq!(object.get("text"), Some(Value::from("hi")));
        assert_eq!(object.get("visible"), Some(Value::Bool(false)));
        assert_eq!(object.attr_names(), vec!["text", "visible"]);
    }

    #[test]
    fn too_many_positional_arguments() {
        let err = build(&Component::new(), vec![Value::Int(1)], vec![]).err().unwrap();
        assert!(matches!(err, RuntimeError::Factory { .. }));
    }
}
