use crate::properties::Node;

/// Render a sorted row-set as an ASCII tree:
///
/// ```text
/// Plant
/// |-- Area A
/// |   |-- Temperature
/// ```
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        let depth = node.depth();
        if depth > 1 {
            out.push_str(&"|   ".repeat(depth - 2));
            out.push_str("|-- ");
        }
        out.push_str(&node.name);
        out.push('\n');
    }
    out
}
