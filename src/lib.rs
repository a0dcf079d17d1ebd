//! Generates Jupyter notebooks from annotated Python scripts.
//!
//! A script marks its cells with `with nb_code_cell():` and `with nb_markdown_cell():` blocks.
//! The script is never executed: an [Interpreter](interpreter::Interpreter) walks its syntax
//! tree, evaluates imports and cell constructors, and turns each block body into a cell. The
//! cells are assembled into a [Notebook](notebook::Notebook) whose first cell restores the
//! caller's context values.

pub mod cell;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod generator;
pub mod interpreter;
pub mod modules;
pub mod notebook;
pub mod template;
pub mod value;

pub use context::ContextStore;
pub use error::{Error, Result};
pub use generator::NotebookGenerator;
pub use notebook::Notebook;
pub use value::Value;
