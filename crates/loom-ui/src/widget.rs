use std::rc::Rc;

use loom_engine::{ObjectRef, Phase};

// ── WidgetHooks ───────────────────────────────────────────────────────────

/// Lifecycle callbacks a toolkit adapter implements for its instances.
///
/// Every constructed tree goes through three phases, each run over the whole
/// tree (parents before children) before the next one starts:
///
/// 1. `create`: make the native widget under its parent's native widget;
/// 2. `initialize`: push initial attribute values into the native widget;
/// 3. `bind`: start forwarding native events into attributes.
///
/// All three default to doing nothing, so a headless adapter implements only
/// what it needs.
///
/// ```rust,ignore
/// struct Logged;
///
/// impl WidgetHooks for Logged {
///     fn create(&self, object: &ObjectRef, parent: Option<&ObjectRef>) {
///         println!("{} under {:?}", object.type_name(), parent.map(|p| p.id()));
///     }
/// }
/// ```
pub trait WidgetHooks: 'static {
    fn create(&self, _object: &ObjectRef, _parent: Option<&ObjectRef>) {}

    fn initialize(&self, _object: &ObjectRef) {}

    fn bind(&self, _object: &ObjectRef) {}
}

/// Hooks for instances with no native counterpart.
pub struct NoHooks;

impl WidgetHooks for NoHooks {}

// ── Instance ──────────────────────────────────────────────────────────────

/// One constructed node: its object, its adapter hooks and its children.
pub struct Instance {
    pub object: ObjectRef,
    pub hooks: Rc<dyn WidgetHooks>,
    pub children: Vec<Instance>,
}

impl Instance {
    pub fn new(object: ObjectRef) -> Self {
        Self::with_hooks(object, Rc::new(NoHooks))
    }

    pub fn with_hooks(object: ObjectRef, hooks: Rc<dyn WidgetHooks>) -> Self {
        Self { object, hooks, children: Vec::new() }
    }

    /// Attach `child` below this instance, in both the instance tree and the
    /// object tree.
    pub fn adopt(&mut self, child: Instance) {
        self.object.add_child(child.object.clone());
        self.children.push(child);
    }

    /// Depth-first, parents first.
    pub fn walk(&self, visit: &mut dyn FnMut(&Instance, Option<&Instance>)) {
        fn go(node: &Instance, parent: Option<&Instance>, visit: &mut dyn FnMut(&Instance, Option<&Instance>)) {
            visit(node, parent);
            for child in &node.children {
                go(child, Some(node), visit);
            }
        }
        go(self, None, visit);
    }

    /// First instance (depth-first) whose object has type `type_name`.
    pub fn find(&self, type_name: &str) -> Option<&Instance> {
        if self.object.type_name() == type_name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(type_name))
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance").field("object", &self.object).field("children", &self.children).finish()
    }
}

// ── lifecycle ─────────────────────────────────────────────────────────────

/// Drive `roots` through `Created → Initialized → Bound`.
pub fn run_lifecycle(roots: &[Instance]) {
    for phase in [Phase::Created, Phase::Initialized, Phase::Bound] {
        for root in roots {
            root.walk(&mut |node, parent| {
                node.object.set_phase(phase);
                match phase {
                    Phase::Created => node.hooks.create(&node.object, parent.map(|p| &p.object)),
                    Phase::Initialized => node.hooks.initialize(&node.object),
                    _ => node.hooks.bind(&node.object),
                }
            });
        }
        log::trace!("lifecycle: {:?} for {} root(s)", phase, roots.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_engine::Object;
    use std::cell::RefCell;

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl WidgetHooks for Recorder {
        fn create(&self, object: &ObjectRef, parent: Option<&ObjectRef>) {
            let parent = parent.map(|p| p.type_name().to_string()).unwrap_or_else(|| "-".into());
            self.0.borrow_mut().push(format!("create {} in {}", object.type_name(), parent));
        }
        fn initialize(&self, object: &ObjectRef) {
            self.0.borrow_mut().push(format!("init {}", object.type_name()));
        }
        fn bind(&self, object: &ObjectRef) {
            assert_eq!(object.phase(), Phase::Bound);
            self.0.borrow_mut().push(format!("bind {}", object.type_name()));
        }
    }

    fn node(name: &str, log: &Rc<RefCell<Vec<String>>>) -> Instance {
        Instance::with_hooks(Object::new(name), Rc::new(Recorder(log.clone())))
    }

    #[test]
    fn phases_complete_tree_wide_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut window = node("Window", &log);
        let mut form = node("Form", &log);
        form.adopt(node("Field", &log));
        window.adopt(form);
        window.adopt(node("Button", &log));

        run_lifecycle(std::slice::from_ref(&window));
        assert_eq!(
            *log.borrow(),
            vec![
                "create Window in -",
                "create Form in Window",
                "create Field in Form",
                "create Button in Window",
                "init Window",
                "init Form",
                "init Field",
                "init Button",
                "bind Window",
                "bind Form",
                "bind Field",
                "bind Button",
            ]
        );
        assert_eq!(window.object.children().len(), 2);
    }

    #[test]
    fn find_searches_depth_first() {
        let mut window = Instance::new(Object::new("Window"));
        let mut form = Instance::new(Object::new("Form"));
        form.adopt(Instance::new(Object::with_attrs("Label", [("text", "inner")])));
        window.adopt(form);
        window.adopt(Instance::new(Object::with_attrs("Label", [("text", "outer")])));
        let label = window.find("Label").unwrap();
        assert_eq!(label.object.get("text").unwrap().as_str(), Some("inner"));
        assert!(window.find("Slider").is_none());
    }
}
