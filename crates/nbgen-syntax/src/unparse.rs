use std::ops::Range;

use crate::lower::Script;
use crate::node::Node;

type TsNode<'t> = tree_sitter::Node<'t>;

/// Renders a lowered node back into source text.
///
/// Implementations must produce syntactically valid source that parses to a tree equivalent to
/// the node (whitespace aside). The text carries no trailing newline.
pub trait Unparser {
    fn unparse(&self, node: &Node) -> String;
}

/// Unparser that reuses the exact source text of a node, with the indentation of its enclosing
/// block removed. Continuation lines inside multi-line strings are left as written.
pub struct SourceUnparser<'a> {
    script: &'a Script,
}

impl<'a> SourceUnparser<'a> {
    pub fn new(script: &'a Script) -> Self {
        SourceUnparser { script }
    }

    fn verbatim_ranges(&self, range: &Range<usize>) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        if let Some(ts_node) = self
            .script
            .tree()
            .root_node()
            .descendant_for_byte_range(range.start, range.end)
        {
            collect_multiline_strings(ts_node, &mut ranges);
        }
        ranges
    }
}

impl Unparser for SourceUnparser<'_> {
    fn unparse(&self, node: &Node) -> String {
        let range = node.span.range.clone();
        let Some(text) = self.script.source().get(range.clone()) else {
            return String::new();
        };
        let verbatim = self.verbatim_ranges(&range);
        dedent(text, range.start, node.span.column, &verbatim)
    }
}

fn collect_multiline_strings(node: TsNode<'_>, out: &mut Vec<Range<usize>>) {
    if node.kind() == "string" && node.start_position().row != node.end_position().row {
        out.push(node.byte_range());
        return;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    for child in children {
        collect_multiline_strings(child, out);
    }
}

/// Strips up to `column` leading whitespace bytes from every line after the first, except lines
/// that start inside one of the `verbatim` byte ranges. `offset` is the source offset of `text`.
fn dedent(text: &str, offset: usize, column: usize, verbatim: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line_start = offset;
    for (idx, raw) in text.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if idx > 0 {
            out.push('\n');
        }
        let protected = verbatim
            .iter()
            .any(|r| r.start < line_start && line_start < r.end);
        if idx == 0 || protected {
            out.push_str(line);
        } else {
            let indent = line
                .bytes()
                .take(column)
                .take_while(|b| *b == b' ' || *b == b'\t')
                .count();
            out.push_str(&line[indent..]);
        }
        line_start += raw.len() + 1;
    }
    out
}
