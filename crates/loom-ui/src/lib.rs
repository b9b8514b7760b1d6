//! Loom UI: compile `.loom` templates into reusable construction procedures
//! and run them against a toolkit registry.
//!
//! # Quick start
//!
//! ```rust
//! use loom_ui::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let module = Compiler::new().compile_str(
//!     "defn Editor(m):\n    Window -> win:\n        Field -> field:\n            value := m.name\n        Label:\n            text << 'Hello, ' + field.value\n",
//! )?;
//!
//! let registry = Registry::new("headless")
//!     .register("Window", Component::new())
//!     .register("Field", Component::new().attr("value", ""))
//!     .register("Label", Component::new().attr("text", ""));
//!
//! let model = Object::with_attrs("Person", [("name", "Ada")]);
//! let editor = module.define("Editor").unwrap();
//! let view = editor.call(&registry, &[model.clone().into()])?;
//! let label = &view.root().unwrap().children[1].object;
//! assert_eq!(label.get("text"), Some(Value::from("Hello, Ada")));
//!
//! model.set("name", "Grace");
//! assert_eq!(label.get("text"), Some(Value::from("Hello, Grace")));
//! # Ok(())
//! # }
//! ```
//!
//! # Adapting a toolkit
//!
//! Register a [`Factory`](registry::Factory) per widget type and give its
//! instances [`WidgetHooks`](widget::WidgetHooks) to mirror the lifecycle
//! into native widgets:
//!
//! ```rust,ignore
//! struct NativeButton;
//!
//! impl WidgetHooks for NativeButton {
//!     fn create(&self, object: &ObjectRef, parent: Option<&ObjectRef>) { /* make the widget */ }
//!     fn bind(&self, object: &ObjectRef) { /* forward clicks with object.emit("clicked", ..) */ }
//! }
//!
//! let registry = Registry::new("native")
//!     .register("Button", Component::new().attr("text", "").hooks(|| Rc::new(NativeButton)));
//! ```

pub mod compiler;
pub mod component;
pub mod error;
pub mod program;
pub mod registry;
pub mod template;
pub mod widget;

pub use compiler::Compiler;
pub use error::{CompileError, RuntimeError};
pub use registry::Registry;
pub use template::{CompiledDefine, CompiledModule, View};

/// Everything needed to compile templates and adapt a toolkit.
pub mod prelude {
    pub use crate::compiler::Compiler;
    pub use crate::component::Component;
    pub use crate::error::{CompileError, Location, RuntimeError};
    pub use crate::registry::{Factory, FactoryCall, FactoryOutput, LookupError, Registry};
    pub use crate::template::{CompiledConstruct, CompiledDefine, CompiledModule, View};
    pub use crate::widget::{Instance, NoHooks, WidgetHooks};

    // Object model shared with the binding runtime.
    pub use loom_engine::{Func, Object, ObjectRef, Phase, Value};
}
