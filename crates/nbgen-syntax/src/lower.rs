use std::cell::RefCell;

use thiserror::Error;
use tracing::debug;
use tree_sitter::{LanguageError, Parser, Tree};

use crate::literal::{self, LiteralError};
use crate::node::{Alias, Constant, Keyword, Node, NodeKind, Span};

type TsNode<'t> = tree_sitter::Node<'t>;

#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("python grammar could not be loaded")]
    Language(#[from] LanguageError),
    #[error("parser returned no tree")]
    NoTree,
    #[error("invalid syntax at line {line}, column {column}: `{snippet}`")]
    Invalid {
        line: usize,
        column: usize,
        snippet: String,
    },
    #[error("invalid literal at line {line}, column {column}")]
    Literal {
        line: usize,
        column: usize,
        #[source]
        source: LiteralError,
    },
}

/// A parsed script. Owns the source text and the concrete syntax tree so the lowered [Node] tree
/// can be rendered back to text.
pub struct Script {
    source: String,
    tree: Tree,
    root: Node,
}

impl Script {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The lowered module node.
    pub fn root(&self) -> &Node {
        &self.root
    }
}

/// Parses Python source and lowers it into a [Node] tree. Any syntax error in the input aborts
/// with the location of the first error.
pub fn parse_script(source: impl Into<String>) -> Result<Script, SyntaxError> {
    let source = source.into();
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
    let tree = parser.parse(&source, None).ok_or(SyntaxError::NoTree)?;

    let ts_root = tree.root_node();
    if ts_root.has_error() {
        let err = first_error(ts_root).unwrap_or(ts_root);
        let pos = err.start_position();
        let snippet = source[err.byte_range()].lines().next().unwrap_or("").to_string();
        return Err(SyntaxError::Invalid {
            line: pos.row + 1,
            column: pos.column + 1,
            snippet,
        });
    }

    let lowering = Lowering {
        source: &source,
        error: RefCell::new(None),
    };
    let root = lowering.module(ts_root);
    if let Some(err) = lowering.error.into_inner() {
        return Err(err);
    }
    Ok(Script { source, tree, root })
}

fn first_error(node: TsNode<'_>) -> Option<TsNode<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error);
    found
}

struct Lowering<'s> {
    source: &'s str,
    /// First literal Python would refuse to compile.
    error: RefCell<Option<SyntaxError>>,
}

impl<'s> Lowering<'s> {
    fn text(&self, node: TsNode<'_>) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn span(&self, node: TsNode<'_>) -> Span {
        let pos = node.start_position();
        Span::new(node.byte_range(), pos.row + 1, pos.column)
    }

    fn other(&self, node: TsNode<'_>) -> Node {
        debug!(
            kind = node.kind(),
            line = node.start_position().row + 1,
            "lowered as unsupported"
        );
        Node::new(
            NodeKind::Other {
                kind: node.kind().to_string(),
            },
            self.span(node),
        )
    }

    /// Records an undecodable literal. Lowering carries on; `parse_script` reports the first one.
    fn invalid_literal(&self, node: TsNode<'_>, source: LiteralError) -> Node {
        let pos = node.start_position();
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(SyntaxError::Literal {
                line: pos.row + 1,
                column: pos.column + 1,
                source,
            });
        }
        drop(slot);
        self.other(node)
    }

    fn module(&self, node: TsNode<'_>) -> Node {
        Node::new(
            NodeKind::Module {
                body: self.statements(node),
            },
            self.span(node),
        )
    }

    /// Lowers the statements of a module or block. Comments are not statements.
    fn statements(&self, node: TsNode<'_>) -> Vec<Node> {
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        children
            .into_iter()
            .filter(|c| c.kind() != "comment")
            .map(|c| self.statement(c))
            .collect()
    }

    fn statement(&self, node: TsNode<'_>) -> Node {
        let kind = match node.kind() {
            "import_statement" => NodeKind::Import {
                names: self.aliases(node),
            },
            "import_from_statement" => {
                let Some(module) = node.child_by_field_name("module_name") else {
                    return self.other(node);
                };
                let mut names = self.aliases(node);
                let mut cursor = node.walk();
                if node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "wildcard_import")
                {
                    names.push(Alias {
                        name: "*".to_string(),
                        asname: None,
                    });
                }
                NodeKind::ImportFrom {
                    module: self.text(module).to_string(),
                    names,
                }
            }
            "with_statement" => self.with_statement(node),
            "expression_statement" => {
                let mut cursor = node.walk();
                let children: Vec<_> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() != "comment")
                    .collect();
                match children.as_slice() {
                    [child] if !is_statement_like(child.kind()) => NodeKind::Expr {
                        value: Box::new(self.expression(*child)),
                    },
                    _ => return self.other(node),
                }
            }
            _ => return self.other(node),
        };
        Node::new(kind, self.span(node))
    }

    fn aliases(&self, node: TsNode<'_>) -> Vec<Alias> {
        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();
        names
            .into_iter()
            .map(|n| match n.kind() {
                "aliased_import" => Alias {
                    name: n
                        .child_by_field_name("name")
                        .map(|c| self.text(c).to_string())
                        .unwrap_or_default(),
                    asname: n
                        .child_by_field_name("alias")
                        .map(|c| self.text(c).to_string()),
                },
                _ => Alias {
                    name: self.text(n).to_string(),
                    asname: None,
                },
            })
            .collect()
    }

    fn with_statement(&self, node: TsNode<'_>) -> NodeKind {
        let mut items = Vec::new();
        let mut cursor = node.walk();
        let clauses: Vec<_> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "with_clause")
            .collect();
        for clause in clauses {
            let mut cursor = clause.walk();
            let with_items: Vec<_> = clause
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "with_item")
                .collect();
            for item in with_items {
                if let Some(value) = item.child_by_field_name("value") {
                    items.push(self.with_item_value(value));
                }
            }
        }
        let body = node
            .child_by_field_name("body")
            .map(|b| self.statements(b))
            .unwrap_or_default();
        NodeKind::With { items, body }
    }

    /// `with guard as target:` parses the value as an `as_pattern`; only the guard matters.
    fn with_item_value(&self, value: TsNode<'_>) -> Node {
        if value.kind() == "as_pattern" {
            if let Some(inner) = value.named_child(0) {
                return self.expression(inner);
            }
        }
        self.expression(value)
    }

    fn expression(&self, node: TsNode<'_>) -> Node {
        let kind = match node.kind() {
            "call" => return self.call(node),
            "identifier" | "keyword_identifier" => NodeKind::Name {
                id: self.text(node).to_string(),
            },
            "attribute" => {
                let (Some(object), Some(attr)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("attribute"),
                ) else {
                    return self.other(node);
                };
                NodeKind::Attribute {
                    value: Box::new(self.expression(object)),
                    attr: self.text(attr).to_string(),
                }
            }
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner: Vec<_> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() != "comment")
                    .collect();
                return match inner.as_slice() {
                    [single] => self.expression(*single),
                    _ => self.other(node),
                };
            }
            "string" => match literal::decode_string(self.text(node)) {
                Ok(Some(value)) => NodeKind::Constant { value },
                Ok(None) => return self.other(node),
                Err(err) => return self.invalid_literal(node, err),
            },
            "concatenated_string" => {
                let mut cursor = node.walk();
                let parts: Result<Option<Vec<Constant>>, LiteralError> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "string")
                    .map(|c| literal::decode_string(self.text(c)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|parts| parts.into_iter().collect());
                match parts.and_then(|parts| parts.map(literal::concatenate).transpose()) {
                    Ok(Some(value)) => NodeKind::Constant { value },
                    Ok(None) => return self.other(node),
                    Err(err) => return self.invalid_literal(node, err),
                }
            }
            "integer" => match literal::decode_integer(self.text(node)) {
                Some(value) => NodeKind::Constant { value },
                None => return self.other(node),
            },
            "float" => match literal::decode_float(self.text(node)) {
                Some(value) => NodeKind::Constant { value },
                None => return self.other(node),
            },
            "true" => NodeKind::Constant {
                value: Constant::Bool(true),
            },
            "false" => NodeKind::Constant {
                value: Constant::Bool(false),
            },
            "none" => NodeKind::Constant {
                value: Constant::None,
            },
            "ellipsis" => NodeKind::Constant {
                value: Constant::Ellipsis,
            },
            _ => return self.other(node),
        };
        Node::new(kind, self.span(node))
    }

    fn call(&self, node: TsNode<'_>) -> Node {
        let (Some(function), Some(arguments)) = (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) else {
            return self.other(node);
        };
        if arguments.kind() != "argument_list" {
            return self.other(node);
        }

        let mut args = Vec::new();
        let mut keywords = Vec::new();
        let mut cursor = arguments.walk();
        let children: Vec<_> = arguments.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "comment" => {}
                "keyword_argument" => {
                    let (Some(name), Some(value)) = (
                        child.child_by_field_name("name"),
                        child.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    keywords.push(Keyword {
                        arg: Some(self.text(name).to_string()),
                        value: self.expression(value),
                    });
                }
                "dictionary_splat" => {
                    if let Some(value) = child.named_child(0) {
                        keywords.push(Keyword {
                            arg: None,
                            value: self.expression(value),
                        });
                    }
                }
                _ => args.push(self.expression(child)),
            }
        }

        Node::new(
            NodeKind::Call {
                func: Box::new(self.expression(function)),
                args,
                keywords,
            },
            self.span(node),
        )
    }
}

fn is_statement_like(kind: &str) -> bool {
    matches!(kind, "assignment" | "augmented_assignment" | "yield")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(source: &str) -> Vec<Node> {
        match parse_script(source).unwrap().root().kind.clone() {
            NodeKind::Module { body } => body,
            other => panic!("expected module, got {other:?}"),
        }
    }

    #[test]
    fn imports() {
        let nodes = body("import nb_generator as nb\nfrom nb_generator import nb_code_cell, get_variable as gv\n");
        assert_eq!(
            nodes[0].kind,
            NodeKind::Import {
                names: vec![Alias {
                    name: "nb_generator".into(),
                    asname: Some("nb".into())
                }]
            }
        );
        assert_eq!(
            nodes[1].kind,
            NodeKind::ImportFrom {
                module: "nb_generator".into(),
                names: vec![
                    Alias {
                        name: "nb_code_cell".into(),
                        asname: None
                    },
                    Alias {
                        name: "get_variable".into(),
                        asname: Some("gv".into())
                    },
                ]
            }
        );
    }

    #[test]
    fn wildcard_import() {
        let nodes = body("from nb_generator import *\n");
        match &nodes[0].kind {
            NodeKind::ImportFrom { names, .. } => assert_eq!(names[0].name, "*"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn with_block_and_call() {
        let nodes = body("with nb.nb_code_cell(tags=['x'], **extra) as cell:\n    x = 1\n    # note\n    print(x)\n");
        let NodeKind::With { items, body } = &nodes[0].kind else {
            panic!("expected with statement");
        };
        assert_eq!(body.len(), 2);
        assert_eq!(items.len(), 1);
        let NodeKind::Call {
            func,
            args,
            keywords,
        } = &items[0].kind
        else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].arg.as_deref(), Some("tags"));
        assert_eq!(keywords[1].arg, None);
        assert!(matches!(
            &func.kind,
            NodeKind::Attribute { attr, .. } if attr == "nb_code_cell"
        ));
        assert!(matches!(&body[0].kind, NodeKind::Other { kind } if kind == "expression_statement"));
        assert!(matches!(&body[1].kind, NodeKind::Expr { .. }));
    }

    #[test]
    fn string_statement() {
        let nodes = body("\"\"\"Hello {name}\"\"\"\n");
        assert_eq!(nodes[0].as_string_statement(), Some("Hello {name}"));
        assert_eq!(nodes[0].span.line, 1);
    }

    #[test]
    fn unsupported_statements_are_kept_as_other() {
        let nodes = body("for i in range(3):\n    pass\nif x:\n    y()\n");
        assert_eq!(nodes.len(), 2);
        assert!(matches!(&nodes[0].kind, NodeKind::Other { kind } if kind == "for_statement"));
        assert!(matches!(&nodes[1].kind, NodeKind::Other { kind } if kind == "if_statement"));
    }

    #[test]
    fn literal_values() {
        let nodes = body("\"\\N{BULLET} item\"\nf(seed=99999999999999999999)\n'a' 'b'\n");
        assert_eq!(nodes[0].as_string_statement(), Some("\u{2022} item"));
        let NodeKind::Expr { value } = &nodes[1].kind else {
            panic!("expected expression");
        };
        let NodeKind::Call { keywords, .. } = &value.kind else {
            panic!("expected call");
        };
        assert_eq!(
            keywords[0].value.kind,
            NodeKind::Constant {
                value: Constant::BigInt("99999999999999999999".into())
            }
        );
        assert_eq!(nodes[2].as_string_statement(), Some("ab"));
    }

    #[test]
    fn invalid_literals_are_syntax_errors() {
        let err = parse_script("x = 1\n\"\\N{NOT A NAME}\"\n")
            .err()
            .expect("should fail");
        assert!(matches!(
            err,
            SyntaxError::Literal {
                line: 2,
                column: 1,
                source: LiteralError::NamedEscape
            }
        ));
        assert!(matches!(
            parse_script("'a' b'b'\n"),
            Err(SyntaxError::Literal {
                source: LiteralError::MixedBytes,
                ..
            })
        ));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = parse_script("with nb_code_cell(:\n    pass\n")
            .err()
            .expect("should fail");
        assert!(matches!(err, SyntaxError::Invalid { .. }));
    }
}
