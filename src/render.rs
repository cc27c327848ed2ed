//! Plain-text rendering of the resource tree.

use futures_util::future::{join_all, BoxFuture, FutureExt};
use std::fmt::Write;

use crate::tree::{NodeKind, TreeNode, TreeProvider};

/// Render the tree, expanding nodes up to `depth` levels below the roots.
///
/// Root categories are fetched concurrently; each fails independently.
pub async fn render(provider: &TreeProvider, depth: usize) -> String {
    let roots = provider.root_items();
    join_all(roots.iter().map(|root| render_node(provider, root, 0, depth)))
        .await
        .concat()
}

fn render_node<'a>(
    provider: &'a TreeProvider,
    node: &'a TreeNode,
    level: usize,
    depth: usize,
) -> BoxFuture<'a, String> {
    async move {
        let mut out = String::new();
        let _ = writeln!(out, "{}{}", "  ".repeat(level), line(node));
        if level < depth && node.is_expandable() {
            let children = provider.children(node).await;
            for child in children.iter() {
                out.push_str(&render_node(provider, child, level + 1, depth).await);
            }
        }
        out
    }
    .boxed()
}

/// One line of text for `node`.
pub fn line(node: &TreeNode) -> String {
    let marker = match node.running {
        Some(true) => "● ",
        Some(false) => "○ ",
        None => "",
    };
    let mut text = format!("{marker}{}", node.label);
    match node.kind {
        NodeKind::Container | NodeKind::ComposeContainer | NodeKind::Pod => {
            if let Some(status) = &node.status {
                let _ = write!(text, "  [{status}]");
            }
        }
        NodeKind::ComposeGroup => {
            if let Some(file) = node.compose_file.as_deref().filter(|f| !f.is_empty()) {
                let _ = write!(text, "  ({file})");
            }
        }
        NodeKind::Image | NodeKind::ImageTag => {
            if node.in_use == Some(false) {
                text.push_str("  (unused)");
            }
        }
        _ => {}
    }
    text
}
