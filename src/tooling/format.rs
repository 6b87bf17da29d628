//! Human-readable rendering of cache snapshots for the CLI.

use crate::tree::{DocumentSlot, TreeNode};
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Indented outline of the loaded tree; collapsed subtrees are not descended.
pub fn format_tree_text(roots: &[TreeNode]) -> String {
    let mut out = String::new();
    for root in roots {
        push_node_line(&mut out, root, 0);
    }
    if out.is_empty() {
        out.push_str("(no nodes loaded)\n");
    }
    out
}

fn push_node_line(out: &mut String, node: &TreeNode, depth: usize) {
    let marker = if node.is_loading {
        format!("{}", "…".yellow())
    } else if !node.record.has_children() {
        " ".to_string()
    } else if node.is_expanded {
        format!("{}", "▾".green())
    } else {
        "▸".to_string()
    };

    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("{} {}", marker, node.record.name.bold()));
    if let Some(code) = &node.record.code {
        out.push_str(&format!(" {}", format!("[{}]", code).dimmed()));
    }
    out.push_str(&format!(" {}", format!("#{}", node.id()).dimmed()));
    if node.record.allows_leaf_documents {
        out.push_str(&format!(" ({} docs)", node.record.document_count));
    } else if node.record.has_children() && node.children.is_none() {
        out.push_str(&format!(" ({} children, not loaded)", node.record.child_count));
    }
    out.push('\n');

    if node.is_expanded {
        for child in node.children.iter().flatten() {
            push_node_line(out, child, depth + 1);
        }
    }
}

/// Key/value summary of one node
pub fn format_node_text(node: &TreeNode) -> String {
    let record = &node.record;
    let mut out = format!("{}\n\n", format_section_heading(&record.name));
    let parent = record
        .parent_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let loaded = match &node.children {
        Some(children) => children.len().to_string(),
        None => "not loaded".to_string(),
    };

    let rows = [
        ("Id", record.id.to_string()),
        ("Parent", parent),
        ("Level", record.level.to_string()),
        ("Order", record.order.to_string()),
        ("Code", record.code.clone().unwrap_or_else(|| "-".to_string())),
        ("Children", record.child_count.to_string()),
        ("Loaded children", loaded),
        ("Leaf documents", record.allows_leaf_documents.to_string()),
        ("Documents", record.document_count.to_string()),
        ("Expanded", node.is_expanded.to_string()),
    ];
    for (label, value) in rows {
        out.push_str(&format!("  {:<16} {}\n", label, value));
    }
    if let Some(description) = &record.description {
        out.push_str(&format!("\n  {}\n", description));
    }
    out
}

/// One row per document type slot
pub fn format_documents_table(slots: &[DocumentSlot]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Type", "Name", "Available", "Document", "Updated"]);
    for slot in slots {
        let type_name = slot
            .document_type_name
            .clone()
            .unwrap_or_else(|| slot.document_type_id.to_string());
        let available = if slot.available { "yes" } else { "no" };
        let document = match (slot.document_id, &slot.document_name) {
            (Some(id), Some(name)) => format!("{} (#{})", name, id),
            (Some(id), None) => format!("#{}", id),
            _ => "-".to_string(),
        };
        let updated = slot
            .updated_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            slot.document_type_id.to_string(),
            type_name,
            available.to_string(),
            document,
            updated,
        ]);
    }
    table.to_string()
}
