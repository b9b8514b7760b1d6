//! AST → [`Program`].
//!
//! The compiler walks a Define (or a bare construct) once, in document order,
//! and resolves every name an expression uses to one of:
//!
//! | Name | Resolves to |
//! |------|-------------|
//! | a parameter, unpack alias or capture bound earlier | its frame slot |
//! | `self` | the slot of the enclosing construct's instance |
//! | `args` (inside `>>` only) | the change record being handled |
//! | a compiler global | a constant |
//! | a builtin (`len`, `str`, `min`, ...) | a constant |
//!
//! Anything else is a [`CompileError::Name`], raised before any object is
//! built. Names introduced by a construct become visible after its own
//! arguments and stay visible for the rest of the Define, so a construct
//! cannot refer to its own alias in its arguments and nothing can refer
//! forward.
//!
//! Type names are not checked here: they are looked up in whatever
//! [`Registry`](crate::registry::Registry) the caller passes at run time.
//!
//! ```rust,ignore
//! let module = Compiler::new().global("title", "Inbox").compile_str(SRC)?;
//! let form = module.define("Form").unwrap();
//! let view = form.call(&registry, &[model.into()])?;
//! ```

use std::rc::Rc;

use loom_engine::{Code, Evaluator, Frame, Value, builtins};
use loom_lang::ast::{Assignment, BodyItem, Construct, Define, Module, Target, TargetBase};
use loom_lang::expr::Expr;
use loom_lang::render::{render_assignment, render_construct_header};
use loom_lang::{Expression, Operator, parse_str};

use crate::error::{CompileError, Location};
use crate::program::{Op, Program, TargetRef};
use crate::template::{CompiledConstruct, CompiledDefine, CompiledModule};

// ── Compiler ──────────────────────────────────────────────────────────────

/// Compilation settings. Holds no per-template state, so one compiler can
/// compile any number of sources.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    globals: Vec<(String, Value)>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` visible to every expression as a constant. Later globals
    /// shadow earlier ones; builtins come last.
    pub fn global(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.globals.push((name.to_string(), value.into()));
        self
    }

    pub fn compile_str(&self, src: &str) -> Result<CompiledModule, CompileError> {
        let module = parse_str(src)?;
        self.compile_module(&module)
    }

    pub fn compile_module(&self, module: &Module) -> Result<CompiledModule, CompileError> {
        let defines = module.defines().map(|d| self.compile_define(d)).collect::<Result<Vec<_>, _>>()?;
        let constructs = module.constructs().map(|c| self.compile_construct(c)).collect::<Result<Vec<_>, _>>()?;
        log::debug!("compiled module: {} define(s), {} construct(s)", defines.len(), constructs.len());
        Ok(CompiledModule::new(defines, constructs))
    }

    pub fn compile_define(&self, define: &Define) -> Result<CompiledDefine, CompileError> {
        let mut params = Vec::with_capacity(define.parameters.names.len());
        for (i, name) in define.parameters.names.iter().enumerate() {
            let default = match define.parameters.default_for(i) {
                Some(expression) => Some(self.eval_default(define, name, expression)?),
                None => None,
            };
            params.push((name.clone(), default));
        }

        let mut emitter = Emitter::new(self);
        for (name, _) in &params {
            emitter.bind_local(name);
        }
        for construct in &define.body {
            emitter.construct(construct)?;
        }
        let program = emitter.finish();
        log::debug!(
            "compiled defn {}: {} op(s), {} slot(s), exports {:?}",
            define.name,
            program.ops.len(),
            program.slots,
            program.exports.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>()
        );
        Ok(CompiledDefine::new(&define.name, params, Rc::new(program)))
    }

    pub fn compile_construct(&self, construct: &Construct) -> Result<CompiledConstruct, CompileError> {
        let mut emitter = Emitter::new(self);
        emitter.construct(construct)?;
        let program = emitter.finish();
        log::debug!("compiled {}: {} op(s), {} slot(s)", construct.type_name, program.ops.len(), program.slots);
        Ok(CompiledConstruct::new(Rc::new(program)))
    }

    /// Parameter defaults are evaluated once, here, against globals and
    /// builtins only.
    fn eval_default(&self, define: &Define, param: &str, expression: &Expression) -> Result<Value, CompileError> {
        let code = Code::lower(&expression.expr, &mut |name| self.resolve_constant(name)).map_err(|name| {
            CompileError::Name {
                name,
                at: Location::new(expression.pos, format!("{} = {}", param, expression.source)),
            }
        })?;
        Evaluator::new(&Frame::new(0)).eval(&code).map_err(|source| CompileError::Default {
            define: define.name.clone(),
            param: param.to_string(),
            source,
        })
    }

    fn resolve_constant(&self, name: &str) -> Option<Code> {
        self.globals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.clone())
            .or_else(|| builtins::lookup(name))
            .map(Code::Const)
    }
}

// ── Emitter ───────────────────────────────────────────────────────────────

/// Per-template compilation state.
struct Emitter<'c> {
    compiler: &'c Compiler,
    /// Visible names in introduction order; searched from the end so a
    /// rebinding shadows the earlier one.
    scope: Vec<(String, usize)>,
    slots: usize,
    ops: Vec<Op>,
    self_slot: Option<usize>,
    exports: Vec<(String, usize)>,
}

impl<'c> Emitter<'c> {
    fn new(compiler: &'c Compiler) -> Self {
        Self { compiler, scope: Vec::new(), slots: 0, ops: Vec::new(), self_slot: None, exports: Vec::new() }
    }

    fn finish(self) -> Program {
        Program { ops: self.ops, slots: self.slots, exports: self.exports }
    }

    fn alloc(&mut self) -> usize {
        self.slots += 1;
        self.slots - 1
    }

    fn bind_local(&mut self, name: &str) -> usize {
        let slot = self.alloc();
        self.scope.push((name.to_string(), slot));
        slot
    }

    fn bind_export(&mut self, name: &str) -> usize {
        let slot = self.bind_local(name);
        match self.exports.iter_mut().find(|(n, _)| n == name) {
            Some(export) => export.1 = slot,
            None => self.exports.push((name.to_string(), slot)),
        }
        slot
    }

    fn resolve(&self, name: &str, notify: bool) -> Option<Code> {
        if let Some((_, slot)) = self.scope.iter().rev().find(|(n, _)| n == name) {
            return Some(Code::Slot(*slot));
        }
        match (name, self.self_slot) {
            ("self", Some(slot)) => return Some(Code::Slot(slot)),
            ("args", _) if notify => return Some(Code::Args),
            _ => {}
        }
        self.compiler.resolve_constant(name)
    }

    fn lower(&self, expression: &Expression, notify: bool, at: &Location) -> Result<Code, CompileError> {
        Code::lower(&expression.expr, &mut |name| self.resolve(name, notify))
            .map_err(|name| CompileError::Name { name, at: at.clone() })
    }

    fn construct(&mut self, construct: &Construct) -> Result<(), CompileError> {
        let at = Location::new(construct.pos, render_construct_header(construct));

        let args = construct
            .positional_args()
            .map(|e| self.lower(e, false, &at))
            .collect::<Result<Vec<_>, _>>()?;
        let kwargs = construct
            .keyword_args()
            .map(|(name, e)| self.lower(e, false, &at).map(|code| (name.to_string(), code)))
            .collect::<Result<Vec<_>, _>>()?;

        let self_slot = self.alloc();
        let unpack = construct.unpack.iter().map(|name| self.bind_export(name)).collect();
        let captures = construct
            .captures
            .iter()
            .map(|capture| (self.bind_export(&capture.local), capture.attr.clone()))
            .collect();

        self.ops.push(Op::Begin {
            type_name: construct.type_name.clone(),
            args,
            kwargs,
            self_slot,
            unpack,
            captures,
            at,
        });

        let outer = self.self_slot.replace(self_slot);
        for item in &construct.body {
            match item {
                BodyItem::Assignment(assignment) => self.assignment(assignment)?,
                BodyItem::Construct(child) => self.construct(child)?,
            }
        }
        self.self_slot = outer;
        self.ops.push(Op::End);
        Ok(())
    }

    fn assignment(&mut self, assignment: &Assignment) -> Result<(), CompileError> {
        let at = Location::new(assignment.pos, render_assignment(assignment));
        let unknown = |name: &str| CompileError::Name { name: name.to_string(), at: at.clone() };

        let target = match &assignment.target {
            Target::Name(attr) => {
                let slot = self.self_slot.ok_or_else(|| unknown("self"))?;
                TargetRef { base: Code::Slot(slot), index: None, attr: attr.clone() }
            }
            Target::Getattr { base, attr } => {
                let code = self.resolve(base.name(), false).ok_or_else(|| unknown(base.name()))?;
                let index = match base {
                    TargetBase::Index { index, .. } => Some(*index),
                    TargetBase::Name(_) => None,
                };
                TargetRef { base: code, index, attr: attr.clone() }
            }
        };

        if assignment.op == Operator::Delegate && !matches!(assignment.value.expr, Expr::Attr { .. }) {
            return Err(CompileError::Delegate { at });
        }
        let code = self.lower(&assignment.value, assignment.op == Operator::Notify, &at)?;
        self.ops.push(Op::Assign { target, op: assignment.op, code: Rc::new(code), at });
        Ok(())
    }
}
