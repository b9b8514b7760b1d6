//! Loom engine crate.
//!
//! The reactive object model and expression runtime that compiled Loom
//! templates execute against.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`object`] | `Object`, change observers, ownership tree, lifecycle phase |
//! | [`value`] | dynamic `Value`, callable `Func` |
//! | [`code`] | expressions lowered to slot-resolved `Code` |
//! | [`eval`] | `Evaluator` (with dependency recording), invocation `Frame` |
//! | [`builtins`] | `len`, `str`, `int`, `float`, `bool`, `abs`, `min`, `max` |
//! | [`binding`] | the `=`, `:=`, `<<`, `>>` runtime |
//! | [`logging`] | `env_logger` initialisation |

pub mod binding;
pub mod builtins;
pub mod code;
pub mod error;
pub mod eval;
pub mod logging;
pub mod object;
pub mod value;

pub use binding::{Binding, BindingKind, Site};
pub use code::Code;
pub use error::EvalError;
pub use eval::{Evaluator, Frame};
pub use object::{Change, Object, ObjectId, ObjectRef, Phase, Subscription};
pub use value::{Func, Value};
