//! Compilation and construction of whole templates: scoping, registries,
//! defines used as types, unpacking and the widget lifecycle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;
use loom_lang::ast::{Construct, Define};
use loom_lang::builder::{bind, delegate, simple};
use loom_lang::parse_str;
use loom_ui::prelude::*;

fn registry() -> Registry {
    Registry::new("headless")
        .register("Window", Component::new().attr("title", ""))
        .register("Field", Component::new().attr("value", ""))
        .register("Label", Component::new().positional(&["text"]).attr("text", ""))
}

const FORM: &str = "\
defn Form(m):
    Window -> win:
        title = 'Edit'
        Field -> field:
            value := m.name
        Label:
            text << field.value
";

#[test]
fn builder_and_source_compile_the_same() -> Result<()> {
    let built = Define::new("Form")?.param("m")?.construct(
        Construct::new("Window")?
            .unpack("win")?
            .assign(simple("title", "'Edit'")?)
            .child(Construct::new("Field")?.unpack("field")?.assign(delegate("value", "m.name")?))
            .child(Construct::new("Label")?.assign(bind("text", "field.value")?)),
    );
    let parsed = parse_str(FORM)?;
    assert_eq!(parsed.define("Form"), Some(&built));

    let compiler = Compiler::new();
    let registry = registry();
    for define in [&built, parsed.define("Form").unwrap()] {
        let m = Object::with_attrs("Person", [("name", "ada")]);
        let view = compiler.compile_define(define)?.call(&registry, &[m.clone().into()])?;
        let window = view.root().unwrap();
        assert_eq!(window.object.get("title"), Some(Value::from("Edit")));
        m.set("name", "grace");
        assert_eq!(window.children[1].object.get("text"), Some(Value::from("grace")));
    }
    Ok(())
}

#[test]
fn forward_reference_fails_until_moved() -> Result<()> {
    let backwards = "\
defn Form(m):
    Label:
        text << field.value
    Field -> field:
        value := m.name
";
    let err = Compiler::new().compile_str(backwards).err().unwrap();
    assert!(matches!(err, CompileError::Name { ref name, .. } if name == "field"));
    assert!(err.to_string().contains("`text << field.value`"));

    Compiler::new().compile_str(FORM)?;
    Ok(())
}

#[test]
fn each_call_builds_an_independent_tree() -> Result<()> {
    let form = Compiler::new().compile_str(FORM)?.define("Form").cloned().unwrap();
    let registry = registry();
    let first = Object::with_attrs("Person", [("name", "ada")]);
    let second = Object::with_attrs("Person", [("name", "alan")]);
    let a = form.call(&registry, &[first.clone().into()])?;
    let b = form.call(&registry, &[second.clone().into()])?;

    first.set("name", "grace");
    let field = |view: &View| view.get("field").and_then(|v| v.as_object().cloned()).unwrap();
    assert_eq!(field(&a).get("value"), Some(Value::from("grace")));
    assert_eq!(field(&b).get("value"), Some(Value::from("alan")));
    assert_ne!(field(&a).id(), field(&b).id());

    field(&b).set("value", "turing");
    assert_eq!(first.get("name"), Some(Value::from("grace")));
    assert_eq!(second.get("name"), Some(Value::from("turing")));
    Ok(())
}

#[test]
fn unknown_type_fails_at_call_time() -> Result<()> {
    let module = Compiler::new().compile_str("defn F():\n    Window:\n        Dial\n")?;
    let define = module.define("F").unwrap();
    let err = define.call(&registry(), &[]).err().unwrap();
    assert_eq!(err.to_string(), "unknown type 'Dial' in registry 'headless'");

    let registry = registry().register("Dial", Component::new());
    assert!(define.call(&registry, &[]).is_ok());
    Ok(())
}

#[test]
fn define_used_as_type_exports_its_names() -> Result<()> {
    let src = "\
defn Labeled(caption):
    Label(caption) -> title
    Field -> input

defn Page(m):
    Window -> win:
        Labeled('Name') -> label, field [inner = input]:
            pass
        Label:
            text << inner.value
";
    let module = Compiler::new().compile_str(src)?;
    let mut registry = registry();
    module.register_into(&mut registry);

    let view = module.define("Page").unwrap().call(&registry, &[Value::None])?;
    let window = view.root().unwrap();
    assert_eq!(window.children.len(), 3);
    assert_eq!(window.object.children().len(), 3);

    let label = view.get("label").unwrap();
    assert_eq!(label.as_object().unwrap().get("text"), Some(Value::from("Name")));
    let inner = view.get("inner").unwrap();
    assert_eq!(inner.as_object().map(|o| o.id()), view.get("field").unwrap().as_object().map(|o| o.id()));

    inner.as_object().unwrap().set("value", "typed");
    assert_eq!(window.children[2].object.get("text"), Some(Value::from("typed")));
    Ok(())
}

#[test]
fn unpack_count_must_match() -> Result<()> {
    let src = "\
defn Pair():
    Label('left')
    Label('right')

defn Bad():
    Window:
        Pair -> a, b, c

defn Indexed():
    Window:
        Pair -> both
        both[-1].text = 'last'
";
    let module = Compiler::new().compile_str(src)?;
    let mut registry = registry();
    module.register_into(&mut registry);

    let err = module.define("Bad").unwrap().call(&registry, &[]).err().unwrap();
    assert!(matches!(err, RuntimeError::Unpack { expected: 3, found: 2, .. }));

    let view = module.define("Indexed").unwrap().call(&registry, &[])?;
    let both = view.get("both").unwrap();
    let both = both.as_list().unwrap();
    assert_eq!(both[0].as_object().unwrap().get("text"), Some(Value::from("left")));
    assert_eq!(both[1].as_object().unwrap().get("text"), Some(Value::from("last")));
    Ok(())
}

#[test]
fn defaults_are_evaluated_at_compile_time() -> Result<()> {
    let ticks = Rc::new(Cell::new(0));
    let counted = ticks.clone();
    let tick = Func::new("tick", move |_| {
        counted.set(counted.get() + 1);
        Ok(Value::Int(counted.get()))
    });

    let module = Compiler::new()
        .global("tick", tick)
        .compile_str("defn F(n = tick()):\n    Label -> l:\n        text = str(n)\n")?;
    assert_eq!(ticks.get(), 1);

    let define = module.define("F").unwrap();
    let registry = registry();
    for _ in 0..2 {
        let view = define.call(&registry, &[])?;
        assert_eq!(view.get("l").unwrap().as_object().unwrap().get("text"), Some(Value::from("1")));
    }
    assert_eq!(ticks.get(), 1);
    Ok(())
}

struct Recorder(Rc<RefCell<Vec<String>>>);

impl WidgetHooks for Recorder {
    fn create(&self, object: &ObjectRef, parent: Option<&ObjectRef>) {
        let parent = parent.map(|p| p.type_name().to_string()).unwrap_or_default();
        self.0.borrow_mut().push(format!("create {} {}", object.type_name(), parent));
    }

    fn initialize(&self, object: &ObjectRef) {
        let text = object.get("text").map(|v| v.to_string()).unwrap_or_default();
        self.0.borrow_mut().push(format!("init {} {}", object.type_name(), text));
    }

    fn bind(&self, object: &ObjectRef) {
        self.0.borrow_mut().push(format!("bind {}", object.type_name()));
    }
}

#[test]
fn lifecycle_runs_phase_by_phase_after_bindings() -> Result<()> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let hooks = {
        let log = log.clone();
        move || -> Rc<dyn WidgetHooks> { Rc::new(Recorder(log.clone())) }
    };
    let registry = Registry::new("recording")
        .register("Window", Component::new().hooks(hooks.clone()))
        .register("Label", Component::new().attr("text", "").hooks(hooks));

    let module = Compiler::new().compile_str("defn F(m):\n    Window:\n        Label:\n            text << m.x\n")?;
    let m = Object::with_attrs("Model", [("x", "hi")]);
    let view = module.define("F").unwrap().call(&registry, &[m.into()])?;

    assert_eq!(
        *log.borrow(),
        vec!["create Window ", "create Label Window", "init Window ", "init Label hi", "bind Window", "bind Label"]
    );
    view.root().unwrap().walk(&mut |node, _| assert_eq!(node.object.phase(), Phase::Bound));
    Ok(())
}
