//! The compiled form of a template and the interpreter that runs it.
//!
//! A [`Program`] is a flat op sequence with every name resolved to a frame
//! slot. It holds no per-call state: each run gets its own
//! [`Frame`](loom_engine::Frame), so one program can build any number of
//! unrelated trees.

use std::rc::Rc;

use loom_engine::binding::{self, Binding, Site};
use loom_engine::{Code, Evaluator, Frame, ObjectRef, Value};
use loom_lang::Operator;

use crate::error::{Location, RuntimeError};
use crate::registry::{FactoryCall, Registry};
use crate::widget::Instance;

/// Where an assignment writes: `base.attr` or `base[index].attr`.
#[derive(Debug, Clone)]
pub struct TargetRef {
    pub base: Code,
    pub index: Option<i64>,
    pub attr: String,
}

#[derive(Debug, Clone)]
pub enum Op {
    /// Build one construct and make it the current `self`.
    Begin {
        type_name: String,
        args: Vec<Code>,
        kwargs: Vec<(String, Code)>,
        self_slot: usize,
        unpack: Vec<usize>,
        /// `(slot, attribute)` per capture.
        captures: Vec<(usize, String)>,
        at: Location,
    },
    Assign { target: TargetRef, op: Operator, code: Rc<Code>, at: Location },
    /// Close the innermost construct and attach it to its parent.
    End,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub ops: Vec<Op>,
    /// Frame size.
    pub slots: usize,
    /// Names visible to callers after a run, with their slots.
    pub exports: Vec<(String, usize)>,
}

/// The result of one run, before the lifecycle starts.
pub struct Built {
    pub roots: Vec<Instance>,
    pub exports: Vec<(String, Value)>,
}

struct Open {
    instances: Vec<Instance>,
}

impl Program {
    pub fn run(&self, registry: &Registry, frame: &Rc<Frame>) -> Result<Built, RuntimeError> {
        let mut stack: Vec<Open> = Vec::new();
        let mut roots = Vec::new();

        for op in &self.ops {
            match op {
                Op::Begin { type_name, args, kwargs, self_slot, unpack, captures, at } => {
                    let mut evaluator = Evaluator::new(frame);
                    let args = args
                        .iter()
                        .map(|c| evaluator.eval(c))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| RuntimeError::eval(e, at))?;
                    let kwargs = kwargs
                        .iter()
                        .map(|(name, c)| evaluator.eval(c).map(|v| (name.clone(), v)))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| RuntimeError::eval(e, at))?;

                    let factory = registry.lookup(type_name)?;
                    log::trace!("building {} via '{}'", type_name, registry.name());
                    let output = factory.build(FactoryCall { type_name, args, kwargs, registry })?;
                    let Some(first) = output.instances.first() else {
                        return Err(RuntimeError::Factory {
                            type_name: type_name.clone(),
                            message: "factory produced no instances".into(),
                        });
                    };
                    frame.set(*self_slot, Value::Object(first.object.clone()));

                    bind_unpack(frame, unpack, &output.instances, at)?;
                    for (slot, attr) in captures {
                        let value = capture(attr, &output.instances, &output.exports, at)?;
                        frame.set(*slot, value);
                    }
                    stack.push(Open { instances: output.instances });
                }
                Op::Assign { target, op, code, at } => {
                    let object = resolve_target(frame, target, at)?;
                    let site = Site {
                        target: object,
                        attr: target.attr.clone(),
                        frame: frame.clone(),
                        label: at.line.clone(),
                    };
                    let applied = match op {
                        Operator::Default => binding::apply_default(&site, code),
                        Operator::Bind => Binding::bind(&site, code.clone()).map(drop),
                        Operator::Delegate => Binding::delegate(&site, code.clone()).map(drop),
                        Operator::Notify => {
                            Binding::notify(&site, code.clone());
                            Ok(())
                        }
                    };
                    applied.map_err(|e| RuntimeError::eval(e, at))?;
                }
                Op::End => {
                    let Some(done) = stack.pop() else {
                        continue;
                    };
                    match stack.last_mut().and_then(|parent| parent.instances.first_mut()) {
                        Some(parent) => done.instances.into_iter().for_each(|child| parent.adopt(child)),
                        None => roots.extend(done.instances),
                    }
                }
            }
        }

        let exports = self.exports.iter().map(|(name, slot)| (name.clone(), frame.get(*slot))).collect();
        Ok(Built { roots, exports })
    }
}

/// One name takes the single instance (or the list when there are several);
/// `k > 1` names need exactly `k` instances.
fn bind_unpack(frame: &Frame, slots: &[usize], instances: &[Instance], at: &Location) -> Result<(), RuntimeError> {
    match slots {
        [] => Ok(()),
        [slot] => {
            let value = match instances {
                [single] => Value::Object(single.object.clone()),
                many => Value::List(many.iter().map(|i| Value::Object(i.object.clone())).collect()),
            };
            frame.set(*slot, value);
            Ok(())
        }
        slots if slots.len() != instances.len() => Err(RuntimeError::Unpack {
            expected: slots.len(),
            found: instances.len(),
            at: at.clone(),
        }),
        slots => {
            for (slot, instance) in slots.iter().zip(instances) {
                frame.set(*slot, Value::Object(instance.object.clone()));
            }
            Ok(())
        }
    }
}

/// A capture reads the construct's exported name, or else an attribute of
/// its single instance.
fn capture(attr: &str, instances: &[Instance], exports: &[(String, Value)], at: &Location) -> Result<Value, RuntimeError> {
    if let Some((_, value)) = exports.iter().find(|(name, _)| name == attr) {
        return Ok(value.clone());
    }
    match instances {
        [single] => single
            .object
            .get(attr)
            .ok_or_else(|| RuntimeError::Capture { attr: attr.to_string(), at: at.clone() }),
        _ => Err(RuntimeError::Capture { attr: attr.to_string(), at: at.clone() }),
    }
}

fn resolve_target(frame: &Frame, target: &TargetRef, at: &Location) -> Result<ObjectRef, RuntimeError> {
    let fail = |message: String| RuntimeError::Target { message, at: at.clone() };
    let base = Evaluator::new(frame).eval(&target.base).map_err(|e| RuntimeError::eval(e, at))?;
    let base = match target.index {
        None => base,
        Some(index) => {
            let Value::List(_) = &base else {
                return Err(fail(format!("cannot index a '{}'", base.type_name())));
            };
            loom_engine::eval::subscript(&base, &Value::Int(index)).map_err(|e| RuntimeError::eval(e, at))?
        }
    };
    match base {
        Value::Object(object) => Ok(object),
        other => Err(fail(format!("cannot set '{}' on a '{}'", target.attr, other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use loom_engine::Object;
    use loom_lang::ast::Pos;

    fn at() -> Location {
        Location::new(Pos::new(1, 1), "test")
    }

    fn begin(type_name: &str, self_slot: usize, unpack: Vec<usize>) -> Op {
        Op::Begin {
            type_name: type_name.into(),
            args: vec![],
            kwargs: vec![],
            self_slot,
            unpack,
            captures: vec![],
            at: at(),
        }
    }

    #[test]
    fn nesting_builds_object_tree() {
        let program = Program {
            ops: vec![begin("Window", 0, vec![]), begin("Label", 1, vec![]), Op::End, begin("Label", 2, vec![]), Op::End, Op::End],
            slots: 3,
            exports: vec![],
        };
        let registry = Registry::new("test").register("Window", Component::new()).register("Label", Component::new());
        let built = program.run(&registry, &Frame::new(3)).unwrap();
        assert_eq!(built.roots.len(), 1);
        assert_eq!(built.roots[0].children.len(), 2);
        assert_eq!(built.roots[0].object.children().len(), 2);
    }

    #[test]
    fn unknown_type_is_lookup_error() {
        let program = Program { ops: vec![begin("Dial", 0, vec![]), Op::End], slots: 1, exports: vec![] };
        let err = program.run(&Registry::new("qt"), &Frame::new(1)).err().unwrap();
        assert_eq!(err.to_string(), "unknown type 'Dial' in registry 'qt'");
    }

    #[test]
    fn unpack_counts_must_match() {
        let frame = Frame::new(3);
        let two = vec![Instance::new(Object::new("A")), Instance::new(Object::new("B"))];
        bind_unpack(&frame, &[0], &two, &at()).unwrap();
        assert_eq!(frame.get(0).as_list().map(|l| l.len()), Some(2));
        bind_unpack(&frame, &[1, 2], &two, &at()).unwrap();
        assert_eq!(frame.get(2).as_object().map(|o| o.type_name().to_string()), Some("B".into()));
        let err = bind_unpack(&frame, &[0, 1, 2], &two, &at()).unwrap_err();
        assert!(matches!(err, RuntimeError::Unpack { expected: 3, found: 2, .. }));
    }

    #[test]
    fn indexed_target_resolves_list_element() {
        let frame = Frame::new(1);
        let items: Vec<Value> = (0..3).map(|i| Value::Object(Object::with_attrs("Item", [("n", i)]))).collect();
        frame.set(0, Value::List(items));
        let target = TargetRef { base: Code::Slot(0), index: Some(-1), attr: "text".into() };
        let object = resolve_target(&frame, &target, &at()).unwrap();
        assert_eq!(object.get("n"), Some(Value::Int(2)));

        let out_of_range = TargetRef { base: Code::Slot(0), index: Some(3), attr: "text".into() };
        assert!(resolve_target(&frame, &out_of_range, &at()).is_err());
        let not_a_list = TargetRef { base: Code::Const(Value::Int(1)), index: Some(0), attr: "text".into() };
        assert!(matches!(resolve_target(&frame, &not_a_list, &at()).unwrap_err(), RuntimeError::Target { .. }));
    }
}
