//! The modules a script may import.
//!
//! Imports never reach the host environment: they resolve against a [ModuleRegistry], a fixed
//! table of named modules whose members are plain values and [Builtin] functions.

use linked_hash_map::LinkedHashMap;
use tracing::debug;

use crate::cell::{Cell, Metadata};
use crate::context::ContextStore;
use crate::error::{Error, Result};
use crate::value::Value;

/// Name of the module scripts import the cell constructors and context accessors from.
pub const GENERATOR_MODULE: &str = "nb_generator";

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    members: LinkedHashMap<String, Value>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            members: LinkedHashMap::new(),
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.members.iter()
    }
}

/// Functions exposed to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    CodeCell,
    MarkdownCell,
    GetVariable,
    SetVariable,
    GetContext,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::CodeCell,
        Builtin::MarkdownCell,
        Builtin::GetVariable,
        Builtin::SetVariable,
        Builtin::GetContext,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::CodeCell => "nb_code_cell",
            Builtin::MarkdownCell => "nb_markdown_cell",
            Builtin::GetVariable => "get_variable",
            Builtin::SetVariable => "set_variable",
            Builtin::GetContext => "get_context",
        }
    }

    pub fn call(
        self,
        context: &mut ContextStore,
        args: Vec<Value>,
        kwargs: LinkedHashMap<String, Value>,
    ) -> Result<Value> {
        match self {
            Builtin::CodeCell | Builtin::MarkdownCell => {
                if !args.is_empty() {
                    return Err(Error::Arguments(format!(
                        "{}() takes 0 positional arguments but {} were given",
                        self.name(),
                        args.len()
                    )));
                }
                let metadata = kwargs
                    .into_iter()
                    .map(|(k, v)| Ok((k, v.to_json()?)))
                    .collect::<Result<Metadata>>()?;
                Ok(Value::Cell(match self {
                    Builtin::CodeCell => Cell::code(metadata),
                    _ => Cell::markdown(metadata),
                }))
            }
            Builtin::SetVariable => {
                let mut bound = self.bind(args, kwargs, &["key", "value"], 2)?.into_iter();
                let key = expect_key(self, bound.next().flatten())?;
                let value = bound.next().flatten().unwrap_or(Value::None);
                debug!(key = %key, "set_variable");
                context.set(key, value);
                Ok(Value::None)
            }
            Builtin::GetVariable => {
                let mut bound = self.bind(args, kwargs, &["key", "default"], 1)?.into_iter();
                let key = expect_key(self, bound.next().flatten())?;
                let default = bound.next().flatten().unwrap_or(Value::None);
                Ok(context.get_or(&key, default))
            }
            Builtin::GetContext => {
                self.bind(args, kwargs, &[], 0)?;
                Ok(context.to_value())
            }
        }
    }

    /// Binds positional and keyword arguments to `params` the way Python does for simple
    /// signatures. The first `required` parameters must be given.
    fn bind(
        self,
        args: Vec<Value>,
        mut kwargs: LinkedHashMap<String, Value>,
        params: &[&str],
        required: usize,
    ) -> Result<Vec<Option<Value>>> {
        if args.len() > params.len() {
            return Err(Error::Arguments(format!(
                "{}() takes {} positional arguments but {} were given",
                self.name(),
                params.len(),
                args.len()
            )));
        }
        let mut bound: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        bound.resize(params.len(), None);
        for (slot, param) in bound.iter_mut().zip(params) {
            if let Some(value) = kwargs.remove(*param) {
                if slot.is_some() {
                    return Err(Error::Arguments(format!(
                        "{}() got multiple values for argument '{}'",
                        self.name(),
                        param
                    )));
                }
                *slot = Some(value);
            }
        }
        if let Some((unexpected, _)) = kwargs.into_iter().next() {
            return Err(Error::Arguments(format!(
                "{}() got an unexpected keyword argument '{}'",
                self.name(),
                unexpected
            )));
        }
        if let Some(missing) = bound
            .iter()
            .zip(params)
            .take(required)
            .find(|(slot, _)| slot.is_none())
        {
            return Err(Error::Arguments(format!(
                "{}() missing required argument: '{}'",
                self.name(),
                missing.1
            )));
        }
        Ok(bound)
    }
}

fn expect_key(builtin: Builtin, value: Option<Value>) -> Result<String> {
    match value {
        Some(Value::Str(key)) => Ok(key),
        Some(other) => Err(Error::Arguments(format!(
            "{}() key must be str, not {}",
            builtin.name(),
            other.type_name()
        ))),
        None => Err(Error::Arguments(format!(
            "{}() missing required argument: 'key'",
            builtin.name()
        ))),
    }
}

/// The table of importable modules.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: LinkedHashMap<String, Module>,
}

impl Default for ModuleRegistry {
    /// A registry holding `nb_generator` and its `nb_generator.helper` submodule.
    fn default() -> Self {
        let helper = Builtin::ALL.iter().fold(
            Module::new(format!("{GENERATOR_MODULE}.helper")),
            |m, b| m.with_member(b.name(), Value::Builtin(*b)),
        );
        let root = Builtin::ALL
            .iter()
            .fold(Module::new(GENERATOR_MODULE), |m, b| {
                m.with_member(b.name(), Value::Builtin(*b))
            })
            .with_member("helper", Value::Module(helper.clone()));

        let mut registry = ModuleRegistry::empty();
        registry.register(root);
        registry.register(helper);
        registry
    }
}

impl ModuleRegistry {
    pub fn empty() -> Self {
        ModuleRegistry {
            modules: LinkedHashMap::new(),
        }
    }

    /// Adds a module under its own name, replacing any module with the same name.
    pub fn register(&mut self, module: Module) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Resolves a dotted module path.
    pub fn resolve(&self, path: &str) -> Result<&Module> {
        self.modules
            .get(path)
            .ok_or_else(|| Error::UnresolvedModule(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(pairs: &[(&str, Value)]) -> LinkedHashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn registry_resolves_known_modules_only() {
        let registry = ModuleRegistry::default();
        assert!(registry.resolve("nb_generator").is_ok());
        assert!(registry.resolve("nb_generator.helper").is_ok());
        assert!(matches!(
            registry.resolve("os"),
            Err(Error::UnresolvedModule(ref m)) if m == "os"
        ));
    }

    #[test]
    fn cell_constructors_pass_metadata_through() {
        let mut ctx = ContextStore::new();
        let cell = Builtin::CodeCell
            .call(
                &mut ctx,
                vec![],
                kwargs(&[("tags", Value::List(vec![Value::from("hide")]))]),
            )
            .unwrap()
            .into_cell()
            .unwrap();
        assert_eq!(cell.metadata()["tags"], serde_json::json!(["hide"]));
        assert!(Builtin::MarkdownCell
            .call(&mut ctx, vec![Value::Int(1)], LinkedHashMap::new())
            .is_err());
    }

    #[test]
    fn accessors_read_and_write_the_store() {
        let mut ctx = ContextStore::new();
        Builtin::SetVariable
            .call(&mut ctx, vec![Value::from("x"), Value::Int(2)], LinkedHashMap::new())
            .unwrap();
        assert_eq!(
            Builtin::GetVariable
                .call(&mut ctx, vec![Value::from("x")], LinkedHashMap::new())
                .unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            Builtin::GetVariable
                .call(
                    &mut ctx,
                    vec![Value::from("y")],
                    kwargs(&[("default", Value::from("d"))])
                )
                .unwrap(),
            Value::from("d")
        );
        assert_eq!(
            Builtin::GetVariable
                .call(&mut ctx, vec![Value::from("y")], LinkedHashMap::new())
                .unwrap(),
            Value::None
        );
    }

    #[test]
    fn argument_errors() {
        let mut ctx = ContextStore::new();
        assert!(matches!(
            Builtin::SetVariable.call(&mut ctx, vec![Value::from("x")], kwargs(&[("key", Value::from("y"))])),
            Err(Error::Arguments(_))
        ));
        assert!(matches!(
            Builtin::GetVariable.call(&mut ctx, vec![Value::Int(1)], LinkedHashMap::new()),
            Err(Error::Arguments(_))
        ));
        assert!(matches!(
            Builtin::GetContext.call(&mut ctx, vec![], kwargs(&[("x", Value::None)])),
            Err(Error::Arguments(_))
        ));
    }
}
