//! Notebook documents and their assembly from generated cells.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cell::{Cell, Metadata};
use crate::context::ContextStore;
use crate::error::{Error, Result};
use crate::modules::{Builtin, GENERATOR_MODULE};

pub const NBFORMAT: u32 = 4;
pub const NBFORMAT_MINOR: u32 = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notebook {
    pub metadata: NotebookMeta,
    pub nbformat: u32,
    pub nbformat_minor: u32,
    pub cells: Vec<NotebookCell>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NotebookMeta {
    pub kernelspec: KernelSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KernelSpec {
    pub display_name: String,
    pub language: String,
    pub name: String,
}

impl Default for KernelSpec {
    fn default() -> Self {
        KernelSpec {
            display_name: "Python 3 (ipykernel)".to_string(),
            language: "python".to_string(),
            name: "python3".to_string(),
        }
    }
}

/// A cell as stored on disk. `execution_count` holds the cell's position in the notebook.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "cell_type")]
pub enum NotebookCell {
    #[serde(rename = "code")]
    Code {
        metadata: Metadata,
        source: Vec<String>,
        outputs: Vec<serde_json::Value>,
        execution_count: usize,
    },
    #[serde(rename = "markdown")]
    Markdown {
        metadata: Metadata,
        source: String,
        execution_count: usize,
    },
}

impl NotebookCell {
    fn from_cell(cell: Cell, execution_count: usize) -> Self {
        match cell {
            Cell::Code { metadata, source } => NotebookCell::Code {
                metadata,
                source,
                outputs: Vec::new(),
                execution_count,
            },
            Cell::Markdown { metadata, source } => NotebookCell::Markdown {
                metadata,
                source,
                execution_count,
            },
        }
    }

    pub fn execution_count(&self) -> usize {
        match self {
            NotebookCell::Code {
                execution_count, ..
            }
            | NotebookCell::Markdown {
                execution_count, ..
            } => *execution_count,
        }
    }

    /// The cell source as one string.
    pub fn text(&self) -> String {
        match self {
            NotebookCell::Code { source, .. } => source.concat(),
            NotebookCell::Markdown { source, .. } => source.clone(),
        }
    }
}

/// Builds the code cell that restores `context` when the notebook is executed.
pub fn injection_cell(context: &ContextStore) -> Result<Cell> {
    let mut cell = Cell::code(Metadata::new());
    cell.push_code(&format!(
        "from {GENERATOR_MODULE} import {}, {}",
        Builtin::GetVariable.name(),
        Builtin::SetVariable.name()
    ));
    for (key, value) in context.iter() {
        cell.push_code(&format!(
            "{}({}, {})",
            Builtin::SetVariable.name(),
            crate::value::Value::Str(key.clone()).repr(),
            value.literal()?
        ));
    }
    Ok(cell)
}

impl Notebook {
    /// Assembles a notebook: the injection cell for `context` first, then `cells` in order.
    pub fn assemble(context: &ContextStore, cells: Vec<Cell>) -> Result<Self> {
        let cells = std::iter::once(injection_cell(context)?)
            .chain(cells)
            .enumerate()
            .map(|(idx, cell)| NotebookCell::from_cell(cell, idx))
            .collect();

        Ok(Notebook {
            metadata: NotebookMeta {
                kernelspec: KernelSpec::default(),
            },
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            cells,
        })
    }

    /// Serializes the notebook the way Jupyter does: one-space indentation and a final newline.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let output = self.to_json()?;
        let write = |path: &Path| -> std::io::Result<()> {
            let mut file = fs::File::create(path)?;
            file.write_all(output.as_bytes())?;
            file.flush()
        };
        write(path).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), cells = self.cells.len(), "notebook written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn injection_cell_restores_context() {
        let mut ctx = ContextStore::new();
        ctx.set("name", "Ada");
        ctx.set("n", 3);
        ctx.set("flags", Value::from(serde_json::json!([true, null])));
        let cell = injection_cell(&ctx).unwrap();
        assert_eq!(
            cell.text(),
            "from nb_generator import get_variable, set_variable\n\
             set_variable('name', 'Ada')\n\
             set_variable('n', 3)\n\
             set_variable('flags', [True, None])"
        );
    }

    #[test]
    fn injection_cell_rejects_opaque_values() {
        let mut ctx = ContextStore::new();
        ctx.set("cell", Value::Cell(Cell::code(Metadata::new())));
        assert!(matches!(injection_cell(&ctx), Err(Error::NotLiteral(_))));
    }

    #[test]
    fn positions_follow_cell_order() {
        let ctx = ContextStore::new();
        let mut code = Cell::code(Metadata::new());
        code.push_code("x = 1");
        let notebook =
            Notebook::assemble(&ctx, vec![code, Cell::markdown(Metadata::new())]).unwrap();
        let counts: Vec<_> = notebook.cells.iter().map(|c| c.execution_count()).collect();
        assert_eq!(counts, vec![0, 1, 2]);
        assert_eq!(notebook.cells[0].text(), "from nb_generator import get_variable, set_variable");
    }

    #[test]
    fn serialized_layout() {
        let notebook = Notebook::assemble(&ContextStore::new(), vec![]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&notebook.to_json().unwrap()).unwrap();
        assert_eq!(json["nbformat"], 4);
        assert_eq!(json["nbformat_minor"], 5);
        assert_eq!(json["metadata"]["kernelspec"]["name"], "python3");
        assert_eq!(json["cells"][0]["cell_type"], "code");
        assert_eq!(json["cells"][0]["outputs"], serde_json::json!([]));
        assert_eq!(json["cells"][0]["execution_count"], 0);

        let back: Notebook = serde_json::from_value(json).unwrap();
        assert_eq!(back, notebook);
    }
}
