//! The cells a generation pass produces.

use std::fmt;

use nbgen_syntax::{Node, Unparser};
use serde::{Deserialize, Serialize};

use crate::context::ContextStore;
use crate::error::{Error, Result};
use crate::template;
use crate::value::Value;

/// Cell metadata. Opaque to the generator, copied verbatim into the notebook.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    Markdown,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Code => f.write_str("code"),
            CellKind::Markdown => f.write_str("markdown"),
        }
    }
}

/// A notebook cell under construction.
///
/// Code cells keep their source as lines, each terminated by `\n` except the last. Markdown
/// cells hold a single rendered string. Outputs are never produced, so they are not stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Code { metadata: Metadata, source: Vec<String> },
    Markdown { metadata: Metadata, source: String },
}

impl Cell {
    pub fn code(metadata: Metadata) -> Self {
        Cell::Code {
            metadata,
            source: Vec::new(),
        }
    }

    pub fn markdown(metadata: Metadata) -> Self {
        Cell::Markdown {
            metadata,
            source: String::new(),
        }
    }

    pub fn kind(&self) -> CellKind {
        match self {
            Cell::Code { .. } => CellKind::Code,
            Cell::Markdown { .. } => CellKind::Markdown,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Cell::Code { metadata, .. } | Cell::Markdown { metadata, .. } => metadata,
        }
    }

    /// The full source text of the cell.
    pub fn text(&self) -> String {
        match self {
            Cell::Code { source, .. } => source.concat(),
            Cell::Markdown { source, .. } => source.clone(),
        }
    }

    /// Appends one chunk of code, splitting it into lines.
    pub fn push_code(&mut self, text: &str) {
        let Cell::Code { source, .. } = self else {
            return;
        };
        if text.is_empty() {
            return;
        }
        if let Some(last) = source.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
        source.extend(text.split_inclusive('\n').map(String::from));
    }

    /// Fills the cell from the body of the `with` block that constructed it. `line` is the line
    /// of the `with` statement.
    ///
    /// Code cells take the unparsed text of every statement. A markdown cell needs exactly one
    /// statement, a plain string literal, which is rendered against `context`.
    pub fn fill(
        &mut self,
        body: &[Node],
        line: usize,
        unparser: &dyn Unparser,
        context: &ContextStore,
    ) -> Result<()> {
        match self {
            Cell::Code { .. } => {
                for node in body {
                    self.push_code(&unparser.unparse(node));
                }
                Ok(())
            }
            Cell::Markdown { source, .. } => {
                let node = match body {
                    [node] => node,
                    _ => {
                        return Err(Error::MalformedNarrative {
                            line,
                            found: format!("{} statements", body.len()),
                        })
                    }
                };
                let text = node
                    .as_string_statement()
                    .ok_or_else(|| Error::MalformedNarrative {
                        line: node.span.line,
                        found: node.kind.describe().to_string(),
                    })?;
                *source = template::render(text, context).map_err(|e| Error::Template {
                    line: node.span.line,
                    source: e,
                })?;
                Ok(())
            }
        }
    }

    /// Attributes visible to scripts.
    pub(crate) fn attribute(&self, attr: &str) -> Option<Value> {
        match attr {
            "cell_type" => Some(Value::Str(self.kind().to_string())),
            "metadata" => Some(Value::from(serde_json::Value::Object(
                self.metadata().clone(),
            ))),
            "source" => Some(match self {
                Cell::Code { source, .. } => {
                    Value::List(source.iter().cloned().map(Value::Str).collect())
                }
                Cell::Markdown { source, .. } => Value::Str(source.clone()),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbgen_syntax::{parse_script, NodeKind, Script, SourceUnparser};

    fn with_body(script: &Script) -> (&[Node], usize) {
        let NodeKind::Module { body } = &script.root().kind else {
            panic!("expected module");
        };
        match &body[0].kind {
            NodeKind::With { body: inner, .. } => (inner.as_slice(), body[0].span.line),
            other => panic!("expected with, got {other:?}"),
        }
    }

    #[test]
    fn code_lines_are_newline_terminated_except_last() {
        let mut cell = Cell::code(Metadata::new());
        cell.push_code("a = 1\nb = 2");
        cell.push_code("c = 3");
        let Cell::Code { source, .. } = &cell else {
            unreachable!()
        };
        assert_eq!(source, &vec!["a = 1\n", "b = 2\n", "c = 3"]);
        assert_eq!(cell.text(), "a = 1\nb = 2\nc = 3");
    }

    #[test]
    fn code_cell_takes_body_source() {
        let script = parse_script("with c():\n    x = 1 + 1\n    for i in range(x):\n        print(i)\n").unwrap();
        let (body, line) = with_body(&script);
        let mut cell = Cell::code(Metadata::new());
        cell.fill(body, line, &SourceUnparser::new(&script), &ContextStore::new())
            .unwrap();
        assert_eq!(cell.text(), "x = 1 + 1\nfor i in range(x):\n    print(i)");
    }

    #[test]
    fn markdown_cell_renders_template() {
        let script = parse_script("with c():\n    \"Hello {name}\"\n").unwrap();
        let (body, line) = with_body(&script);
        let mut context = ContextStore::new();
        context.set("name", "Ada");
        let mut cell = Cell::markdown(Metadata::new());
        cell.fill(body, line, &SourceUnparser::new(&script), &context)
            .unwrap();
        assert_eq!(cell.text(), "Hello Ada");
    }

    #[test]
    fn markdown_cell_decodes_named_escapes() {
        let script = parse_script("with c():\n    \"\\N{BULLET} {item}\"\n").unwrap();
        let (body, line) = with_body(&script);
        let mut context = ContextStore::new();
        context.set("item", "loops");
        let mut cell = Cell::markdown(Metadata::new());
        cell.fill(body, line, &SourceUnparser::new(&script), &context)
            .unwrap();
        assert_eq!(cell.text(), "\u{2022} loops");
    }

    #[test]
    fn markdown_cell_rejects_non_strings() {
        let script = parse_script("with c():\n    42\n").unwrap();
        let (body, line) = with_body(&script);
        let mut cell = Cell::markdown(Metadata::new());
        let err = cell
            .fill(body, line, &SourceUnparser::new(&script), &ContextStore::new())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedNarrative { line: 2, ref found } if found == "int"));
    }

    #[test]
    fn markdown_cell_rejects_several_statements() {
        let script = parse_script("with c():\n    \"one\"\n    \"two\"\n").unwrap();
        let (body, line) = with_body(&script);
        let mut cell = Cell::markdown(Metadata::new());
        let err = cell
            .fill(body, line, &SourceUnparser::new(&script), &ContextStore::new())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedNarrative { line: 1, .. }));
    }
}
