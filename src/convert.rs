use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::value::Value;

pub const DEFAULT_COMMAND: &str = "jupyter-nbconvert";

/// How generated notebooks are handed to an external converter.
///
/// Every option becomes `--<key>`, followed by the value as its own argument unless the value is
/// `true`, which makes a bare flag.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConvertConfig {
    pub command: String,
    pub options: LinkedHashMap<String, serde_json::Value>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            command: DEFAULT_COMMAND.to_string(),
            options: LinkedHashMap::new(),
        }
    }
}

impl ConvertConfig {
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Arguments passed to the converter for `notebook`.
    pub fn arguments(&self, notebook: &Path) -> Vec<OsString> {
        let mut args = vec![notebook.as_os_str().to_os_string()];
        for (key, value) in &self.options {
            args.push(format!("--{key}").into());
            if value != &serde_json::Value::Bool(true) {
                args.push(Value::from(value.clone()).to_string().into());
            }
        }
        args
    }

    pub fn command(&self, notebook: &Path) -> Command {
        let mut command = Command::new(&self.command);
        command.args(self.arguments(notebook));
        command
    }

    /// Runs the converter and waits for it. The exit status is left to the caller.
    pub fn run(&self, notebook: &Path) -> io::Result<ExitStatus> {
        info!(command = %self.command, notebook = %notebook.display(), "converting");
        self.command(notebook).status()
    }
}
