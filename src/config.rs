use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};

use crate::convert::ConvertConfig;
use crate::value::Value;

pub const CONFIG_FILE: &str = "nbgen.yml";

/// Contents of `nbgen.yml`.
///
/// ```yaml
/// context:
///   title: Loops
///   show_solutions: false
/// convert:
///   options:
///     to: html
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub context: LinkedHashMap<String, serde_json::Value>,
    pub convert: ConvertConfig,
}

impl GeneratorConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("could not open config file {}", path.display()))?;
        let config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Reads `nbgen.yml` from `dir` if it exists.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if path.is_file() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Applies a `key=value` override. The value is read as JSON and falls back to a plain
    /// string, so `n=3` stores a number and `name=Ada` a string.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = parse_assignment(assignment)?;
        self.context.insert(key, value);
        Ok(())
    }

    /// The caller values handed to the generator.
    pub fn context_values(&self) -> LinkedHashMap<String, Value> {
        self.context
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect()
    }
}

/// Splits `key=value`, reading the value as JSON with a plain string fallback.
pub fn parse_assignment(assignment: &str) -> Result<(String, serde_json::Value)> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{assignment}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("missing key in '{assignment}'"));
    }
    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn reads_context_and_conversion_options() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "context:\n  title: Loops\n  count: 3\n  tags: [a, b]\nconvert:\n  options:\n    to: html\n    execute: true\n",
        )
        .unwrap();
        let config = GeneratorConfig::discover(dir.path()).unwrap();
        let keys: Vec<_> = config.context.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "count", "tags"]);
        assert_eq!(config.context["tags"], json!(["a", "b"]));
        assert_eq!(config.convert.options["execute"], json!(true));
        assert_eq!(
            config.context_values()["count"],
            Value::Int(3)
        );
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(
            GeneratorConfig::discover(dir.path()).unwrap(),
            GeneratorConfig::default()
        );
    }

    #[test]
    fn assignments_parse_json_then_strings() {
        assert_eq!(parse_assignment("n=3").unwrap(), ("n".into(), json!(3)));
        assert_eq!(
            parse_assignment("name=Ada").unwrap(),
            ("name".into(), json!("Ada"))
        );
        assert_eq!(
            parse_assignment("eq=a=b").unwrap(),
            ("eq".into(), json!("a=b"))
        );
        assert_eq!(parse_assignment("flag=true").unwrap().1, json!(true));
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = GeneratorConfig::default();
        config.context.insert("title".into(), json!("Old"));
        config.set("title=New").unwrap();
        assert_eq!(config.context["title"], json!("New"));
    }
}
