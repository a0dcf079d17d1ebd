use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::template::TemplateError;

/// Everything that aborts a generation pass.
#[derive(Error, Debug)]
pub enum Error {
    #[error("narrative cell at line {line} must contain a single string literal, found {found}")]
    MalformedNarrative { line: usize, found: String },
    #[error("no module named '{0}'")]
    UnresolvedModule(String),
    #[error("cannot import name '{name}' from '{module}'")]
    UnresolvedMember { module: String, name: String },
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    #[error("'{type_name}' object has no attribute '{attr}'")]
    Attribute { type_name: String, attr: String },
    #[error("'{0}' object is not callable")]
    NotCallable(String),
    #[error("{0}")]
    Arguments(String),
    #[error("value of type '{0}' has no literal form")]
    NotLiteral(String),
    #[error("integer {0} is too large for notebook metadata")]
    IntegerRange(String),
    #[error("error rendering narrative cell at line {line}")]
    Template {
        line: usize,
        #[source]
        source: TemplateError,
    },
    #[error(transparent)]
    Syntax(#[from] nbgen_syntax::SyntaxError),
    #[error("could not read script {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write notebook {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
