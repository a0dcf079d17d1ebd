//! Front end for notebook scripts: parses Python source with tree-sitter and lowers it into the
//! small [Node] tree the generator interprets. Statements keep their source span so they can be
//! rendered back into text through an [Unparser].

mod literal;
mod lower;
mod node;
mod unparse;

pub use literal::LiteralError;
pub use lower::{parse_script, Script, SyntaxError};
pub use node::{Alias, Constant, Keyword, Node, NodeKind, Span};
pub use unparse::{SourceUnparser, Unparser};
