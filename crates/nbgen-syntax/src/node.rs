use std::fmt;
use std::ops::Range;

/// Location of a node in the script it was parsed from.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct Span {
    /// Byte range in the source.
    pub range: Range<usize>,
    /// One-based line of the first byte.
    pub line: usize,
    /// Byte column of the first byte.
    pub column: usize,
}

impl Span {
    pub fn new(range: Range<usize>, line: usize, column: usize) -> Self {
        Span {
            range,
            line,
            column,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Node { kind, span }
    }

    /// Returns the string value if this node is an expression statement wrapping a plain string
    /// literal.
    pub fn as_string_statement(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Expr { value } => match &value.kind {
                NodeKind::Constant {
                    value: Constant::Str(s),
                } => Some(s),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The node kinds the generator understands. Everything the lowering does not recognise becomes
/// [NodeKind::Other], which keeps the tree-sitter kind name for diagnostics.
#[derive(Debug, PartialEq, Clone)]
pub enum NodeKind {
    Module {
        body: Vec<Node>,
    },
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: String,
        names: Vec<Alias>,
    },
    With {
        items: Vec<Node>,
        body: Vec<Node>,
    },
    Expr {
        value: Box<Node>,
    },
    Call {
        func: Box<Node>,
        args: Vec<Node>,
        keywords: Vec<Keyword>,
    },
    Name {
        id: String,
    },
    Attribute {
        value: Box<Node>,
        attr: String,
    },
    Constant {
        value: Constant,
    },
    Other {
        kind: String,
    },
}

impl NodeKind {
    /// Short description used in logs and error messages.
    pub fn describe(&self) -> &str {
        match self {
            NodeKind::Module { .. } => "module",
            NodeKind::Import { .. } => "import statement",
            NodeKind::ImportFrom { .. } => "from-import statement",
            NodeKind::With { .. } => "with statement",
            NodeKind::Expr { value } => match value.kind {
                NodeKind::Constant { ref value } => value.type_name(),
                _ => "expression statement",
            },
            NodeKind::Call { .. } => "call",
            NodeKind::Name { .. } => "name",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Constant { value } => value.type_name(),
            NodeKind::Other { kind } => kind,
        }
    }
}

/// An imported name, optionally renamed with `as`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// The name the import binds in the namespace.
    pub fn bound_name(&self) -> &str {
        self.asname.as_deref().unwrap_or(&self.name)
    }
}

/// A keyword argument. `arg` is `None` for a `**mapping` splat.
#[derive(Debug, PartialEq, Clone)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Node,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    /// An integer literal outside the `i64` range, as decimal digits.
    BigInt(String),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Ellipsis,
}

impl Constant {
    pub fn type_name(&self) -> &'static str {
        match self {
            Constant::None => "None",
            Constant::Bool(_) => "bool",
            Constant::Int(_) | Constant::BigInt(_) => "int",
            Constant::Float(_) => "float",
            Constant::Str(_) => "str",
            Constant::Bytes(_) => "bytes",
            Constant::Ellipsis => "ellipsis",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
