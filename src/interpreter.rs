//! Tree-walking evaluation of a parsed script.
//!
//! Only a handful of node kinds do anything: imports bind names, calls and attribute lookups
//! evaluate, and `with` blocks whose guard evaluates to a [Cell] turn their body into that cell.
//! Every other kind evaluates to nothing and has no effect.

use std::collections::HashMap;

use linked_hash_map::LinkedHashMap;
use nbgen_syntax::{Alias, Keyword, Node, NodeKind, Unparser};
use tracing::debug;

use crate::cell::Cell;
use crate::context::ContextStore;
use crate::error::{Error, Result};
use crate::modules::ModuleRegistry;
use crate::value::Value;

pub struct Interpreter<'a> {
    namespace: HashMap<String, Value>,
    modules: &'a ModuleRegistry,
    unparser: &'a dyn Unparser,
    context: &'a mut ContextStore,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        modules: &'a ModuleRegistry,
        unparser: &'a dyn Unparser,
        context: &'a mut ContextStore,
    ) -> Self {
        Interpreter {
            namespace: HashMap::new(),
            modules,
            unparser,
            context,
        }
    }

    /// Runs a module and returns the cells its statements produced, in source order.
    pub fn run(&mut self, root: &Node) -> Result<Vec<Cell>> {
        match &root.kind {
            NodeKind::Module { body } => self.module(body),
            _ => Ok(self.visit(root)?.and_then(Value::into_cell).into_iter().collect()),
        }
    }

    fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.namespace.insert(name.into(), value);
    }

    fn visit(&mut self, node: &Node) -> Result<Option<Value>> {
        match &node.kind {
            NodeKind::Module { body } => {
                let cells = self.module(body)?;
                Ok(Some(Value::List(cells.into_iter().map(Value::Cell).collect())))
            }
            NodeKind::Import { names } => self.import(names).map(|_| None),
            NodeKind::ImportFrom { module, names } => {
                self.import_from(module, names).map(|_| None)
            }
            NodeKind::With { items, body } => self.with(node, items, body),
            NodeKind::Call {
                func,
                args,
                keywords,
            } => self.call(func, args, keywords).map(Some),
            NodeKind::Name { id } => self
                .namespace
                .get(id)
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::UndefinedName(id.clone())),
            NodeKind::Attribute { value, attr } => {
                self.eval(value)?.attribute(attr).map(Some)
            }
            NodeKind::Expr { value } => self.visit(value),
            NodeKind::Constant { value } => Ok(Some(Value::from(value.clone()))),
            NodeKind::Other { kind } => {
                debug!(line = node.span.line, kind = %kind, "skipping unsupported node");
                Ok(None)
            }
        }
    }

    /// Evaluates an expression. Nodes that yield nothing evaluate to `None`.
    fn eval(&mut self, node: &Node) -> Result<Value> {
        Ok(self.visit(node)?.unwrap_or(Value::None))
    }

    fn module(&mut self, body: &[Node]) -> Result<Vec<Cell>> {
        let mut cells = Vec::new();
        for child in body {
            match self.visit(child)? {
                Some(Value::Cell(cell)) => cells.push(cell),
                Some(other) => {
                    debug!(line = child.span.line, value = %other.repr(), "dropping top-level value")
                }
                None => {}
            }
        }
        Ok(cells)
    }

    fn import(&mut self, names: &[Alias]) -> Result<()> {
        for alias in names {
            let module = self.modules.resolve(&alias.name)?.clone();
            match &alias.asname {
                Some(asname) => self.set_variable(asname, Value::Module(module)),
                None => {
                    // `import a.b` binds `a`.
                    let top = alias.name.split('.').next().unwrap_or(&alias.name);
                    let top = self.modules.resolve(top)?.clone();
                    self.set_variable(top.name().to_string(), Value::Module(top));
                }
            }
            debug!(module = %alias.name, "imported");
        }
        Ok(())
    }

    fn import_from(&mut self, module: &str, names: &[Alias]) -> Result<()> {
        let resolved = self.modules.resolve(module)?.clone();
        for alias in names {
            if alias.name == "*" {
                for (name, value) in resolved.members() {
                    self.set_variable(name.clone(), value.clone());
                }
                continue;
            }
            let value = resolved
                .member(&alias.name)
                .cloned()
                .ok_or_else(|| Error::UnresolvedMember {
                    module: module.to_string(),
                    name: alias.name.clone(),
                })?;
            self.set_variable(alias.bound_name(), value);
        }
        Ok(())
    }

    fn with(&mut self, node: &Node, items: &[Node], body: &[Node]) -> Result<Option<Value>> {
        let [guard] = items else {
            debug!(line = node.span.line, items = items.len(), "skipping multi-item with");
            return Ok(None);
        };
        match self.eval(guard)? {
            Value::Cell(mut cell) => {
                cell.fill(body, node.span.line, self.unparser, self.context)?;
                Ok(Some(Value::Cell(cell)))
            }
            other => {
                debug!(
                    line = node.span.line,
                    guard = other.type_name(),
                    "skipping with block without a cell"
                );
                Ok(None)
            }
        }
    }

    fn call(&mut self, func: &Node, args: &[Node], keywords: &[Keyword]) -> Result<Value> {
        let function = self.eval(func)?;
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>>>()?;

        let mut kwargs = LinkedHashMap::new();
        for keyword in keywords {
            let value = self.eval(&keyword.value)?;
            let entries = match (&keyword.arg, value) {
                (Some(name), value) => vec![(name.clone(), value)],
                (None, Value::Dict(entries)) => entries.into_iter().collect(),
                (None, other) => {
                    return Err(Error::Arguments(format!(
                        "argument after ** must be a mapping, not {}",
                        other.type_name()
                    )))
                }
            };
            for (name, value) in entries {
                if kwargs.contains_key(&name) {
                    return Err(Error::Arguments(format!(
                        "got multiple values for keyword argument '{name}'"
                    )));
                }
                kwargs.insert(name, value);
            }
        }

        match function {
            Value::Builtin(builtin) => builtin.call(self.context, args, kwargs),
            other => Err(Error::NotCallable(other.type_name().to_string())),
        }
    }
}
