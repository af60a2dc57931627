//! Printable directory-tree rendering.

use std::collections::BTreeMap;

#[derive(Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
}

/// Render a printable tree from relative file paths.
///
/// Paths are split on `/`; ordering is the BTreeMap's lexicographic order,
/// so the output is deterministic for a given path set.
pub fn tree_from_paths<S: AsRef<str>>(paths: &[S]) -> String {
    let mut root = TreeNode::default();

    for path in paths {
        let mut current = &mut root;
        for part in path.as_ref().split('/').filter(|p| !p.is_empty()) {
            current = current.children.entry(part.to_string()).or_default();
        }
    }

    let mut out = String::new();
    stringify(&root, "", &mut out);
    out
}

fn stringify(node: &TreeNode, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (index, (name, child)) in node.children.iter().enumerate() {
        let is_last = index == count - 1;
        let connector = if is_last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(name);
        out.push('\n');

        if !child.children.is_empty() {
            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "|   " });
            stringify(child, &child_prefix, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_paths() {
        let text = tree_from_paths(&["b.rs", "a.rs"]);
        assert_eq!(text, "├── a.rs\n└── b.rs\n");
    }

    #[test]
    fn test_nested_paths() {
        let text = tree_from_paths(&["src/main.rs", "src/lib.rs", "Cargo.toml"]);
        assert_eq!(
            text,
            "├── Cargo.toml\n└── src\n    ├── lib.rs\n    └── main.rs\n"
        );
    }

    #[test]
    fn test_deeper_nesting_uses_pipe_prefix() {
        let text = tree_from_paths(&["a/x.rs", "b.rs"]);
        assert_eq!(text, "├── a\n|   └── x.rs\n└── b.rs\n");
    }

    #[test]
    fn test_empty() {
        assert_eq!(tree_from_paths::<&str>(&[]), "");
    }
}
