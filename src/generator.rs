use std::fs;
use std::path::{Path, PathBuf};

use linked_hash_map::LinkedHashMap;
use nbgen_syntax::{parse_script, SourceUnparser};
use tracing::{debug, info};

use crate::context::ContextStore;
use crate::error::{Error, Result};
use crate::interpreter::Interpreter;
use crate::modules::ModuleRegistry;
use crate::notebook::Notebook;
use crate::value::Value;

/// Turns one annotated script into a notebook next to it.
#[derive(Debug, Clone)]
pub struct NotebookGenerator {
    path: PathBuf,
    context: LinkedHashMap<String, Value>,
    modules: ModuleRegistry,
}

impl NotebookGenerator {
    /// `context` holds the caller's values. They are written to the store before the script
    /// runs and restored in the notebook's first cell.
    pub fn new(path: impl Into<PathBuf>, context: LinkedHashMap<String, Value>) -> Self {
        NotebookGenerator {
            path: path.into(),
            context,
            modules: ModuleRegistry::default(),
        }
    }

    pub fn with_modules(mut self, modules: ModuleRegistry) -> Self {
        self.modules = modules;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The script path with its extension replaced by `.ipynb`.
    pub fn output_path(&self) -> PathBuf {
        self.path.with_extension("ipynb")
    }

    /// Builds the notebook for `source` without touching the filesystem.
    pub fn render(&self, source: &str, store: &mut ContextStore) -> Result<Notebook> {
        for (key, value) in &self.context {
            store.set(key.clone(), value.clone());
        }

        let script = parse_script(source)?;
        let unparser = SourceUnparser::new(&script);
        let cells = Interpreter::new(&self.modules, &unparser, store).run(script.root())?;
        debug!(path = %self.path.display(), cells = cells.len(), "script interpreted");

        // The first cell restores the caller's values, not what the script set.
        let mut caller = ContextStore::new();
        caller.extend(self.context.clone());
        Notebook::assemble(&caller, cells)
    }

    /// Reads the script, renders it and writes the notebook. Nothing is written when any step
    /// fails. Returns the path of the written notebook.
    pub fn generate(&self, store: &mut ContextStore) -> Result<PathBuf> {
        let source = fs::read_to_string(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })?;
        let notebook = self.render(&source, store)?;
        let output = self.output_path();
        notebook.write_to(&output)?;
        info!(script = %self.path.display(), notebook = %output.display(), "generated");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SCENARIO: &str = include_str!("../resources/test/scenario.py");
    const BAD_NARRATIVE: &str = include_str!("../resources/test/bad_narrative.py");
    const LESSON: &str = include_str!("../resources/test/lesson.py");

    fn context(pairs: &[(&str, Value)]) -> LinkedHashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn output_path_replaces_extension() {
        let gen = NotebookGenerator::new("lessons/intro.py", LinkedHashMap::new());
        assert_eq!(gen.output_path(), PathBuf::from("lessons/intro.ipynb"));
        let gen = NotebookGenerator::new("lessons/intro", LinkedHashMap::new());
        assert_eq!(gen.output_path(), PathBuf::from("lessons/intro.ipynb"));
    }

    #[test]
    fn scenario_produces_three_cells() {
        let gen = NotebookGenerator::new("scenario.py", LinkedHashMap::new());
        let mut store = ContextStore::new();
        store.set("x", 2);
        let notebook = gen.render(SCENARIO, &mut store).unwrap();

        assert_eq!(notebook.cells.len(), 3);
        let counts: Vec<_> = notebook.cells.iter().map(|c| c.execution_count()).collect();
        assert_eq!(counts, vec![0, 1, 2]);
        assert_eq!(
            notebook.cells[0].text(),
            "from nb_generator import get_variable, set_variable"
        );
        assert_eq!(notebook.cells[1].text(), "x = 1 + 1");
        assert_eq!(notebook.cells[2].text(), "result: 2");
    }

    #[test]
    fn caller_values_are_injected_and_templated() {
        let gen = NotebookGenerator::new(
            "hello.py",
            context(&[("name", Value::from("Ada"))]),
        );
        let mut store = ContextStore::new();
        let notebook = gen
            .render(
                "from nb_generator import nb_markdown_cell\nwith nb_markdown_cell():\n    \"Hello {name}\"\n",
                &mut store,
            )
            .unwrap();
        assert_eq!(
            notebook.cells[0].text(),
            "from nb_generator import get_variable, set_variable\nset_variable('name', 'Ada')"
        );
        assert_eq!(notebook.cells[1].text(), "Hello Ada");
    }

    #[test]
    fn lesson_fixture() {
        let gen = NotebookGenerator::new(
            "lesson.py",
            context(&[("pi", Value::Float(std::f64::consts::PI))]),
        );
        let mut store = ContextStore::new();
        let notebook = gen.render(LESSON, &mut store).unwrap();

        assert_eq!(notebook.cells.len(), 4);
        assert!(notebook.cells[1].text().contains("# Untitled"));
        assert_eq!(
            notebook.cells[2].text(),
            "import math\ndef area(r):\n    text = \"\"\"radius\n  indented\"\"\"\n    return math.pi * r ** 2"
        );
        match &notebook.cells[2] {
            crate::notebook::NotebookCell::Code { metadata, .. } => {
                assert_eq!(metadata["collapsed"], serde_json::json!(true))
            }
            other => panic!("expected a code cell, got {other:?}"),
        }
        assert_eq!(
            notebook.cells[3].text(),
            "The area of a unit circle is 3.142."
        );
        assert_eq!(store.get("title"), Some(&Value::from("Untitled")));
    }

    #[test]
    fn identical_stores_give_identical_notebooks() {
        let gen = NotebookGenerator::new("scenario.py", context(&[("x", Value::Int(2))]));
        let mut store = ContextStore::new();
        let first = gen.render(SCENARIO, &mut store).unwrap();
        store.clear();
        let second = gen.render(SCENARIO, &mut store).unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn extra_modules_can_be_registered() {
        use crate::modules::{Builtin, Module};

        let mut modules = ModuleRegistry::default();
        modules.register(
            Module::new("course").with_member("cell", Value::Builtin(Builtin::CodeCell)),
        );
        let gen = NotebookGenerator::new("a.py", context(&[("n", Value::Int(1))]))
            .with_modules(modules);
        let mut store = ContextStore::new();
        let notebook = gen
            .render("import course\nwith course.cell():\n    n += 1\n", &mut store)
            .unwrap();
        assert_eq!(notebook.cells[1].text(), "n += 1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn shared_store_carries_values_between_passes() {
        let mut store = ContextStore::new();
        NotebookGenerator::new("a.py", LinkedHashMap::new())
            .render(
                "from nb_generator import set_variable\nset_variable('topic', 'loops')\n",
                &mut store,
            )
            .unwrap();
        let notebook = NotebookGenerator::new("b.py", LinkedHashMap::new())
            .render(
                "from nb_generator import nb_markdown_cell\nwith nb_markdown_cell():\n    '# {topic}'\n",
                &mut store,
            )
            .unwrap();
        assert_eq!(notebook.cells[1].text(), "# loops");
    }

    #[test]
    fn generate_writes_notebook_next_to_script() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("scenario.py");
        fs::write(&script, SCENARIO).unwrap();

        let gen = NotebookGenerator::new(&script, context(&[("x", Value::Int(2))]));
        let output = gen.generate(&mut ContextStore::new()).unwrap();
        assert_eq!(output, dir.path().join("scenario.ipynb"));

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.ends_with("}\n"));
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["cells"].as_array().unwrap().len(), 3);
        assert_eq!(json["cells"][2]["cell_type"], "markdown");
        assert_eq!(json["cells"][2]["source"], "result: 2");
    }

    #[test]
    fn failed_pass_writes_nothing() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("bad.py");
        fs::write(&script, BAD_NARRATIVE).unwrap();

        let gen = NotebookGenerator::new(&script, LinkedHashMap::new());
        let err = gen.generate(&mut ContextStore::new()).unwrap_err();
        assert!(matches!(err, Error::MalformedNarrative { .. }));
        assert!(!gen.output_path().exists());
    }

    #[test]
    fn missing_script_is_a_read_error() {
        let dir = tempdir().unwrap();
        let gen = NotebookGenerator::new(dir.path().join("absent.py"), LinkedHashMap::new());
        assert!(matches!(
            gen.generate(&mut ContextStore::new()),
            Err(Error::Read { .. })
        ));
    }
}
