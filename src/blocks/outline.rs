//! ASCII outline of a block tree, used by `studio tree`.

use super::{Block, SlotContent};

const UNNAMED: &str = "(unnamed)";
const MAX_TEXT_PREVIEW: usize = 24;

/// Render a block tree as an ASCII outline.
///
/// Slots appear as `#name` nodes; text slots show a short preview.
///
/// Example output:
/// ```text
/// container
/// ├── Button
/// │   └── #prefix
/// │       └── FeatherIcon
/// └── Dialog
///     └── #title "Confirm"
/// ```
pub fn render_outline(root: &Block) -> String {
    let mut output = String::new();
    output.push_str(label(root));
    output.push('\n');
    render_children(&mut output, root, "");
    output
}

enum Entry<'a> {
    Child(&'a Block),
    Slot(&'a str, Option<&'a SlotContent>),
}

fn label(block: &Block) -> &str {
    block.component_name.as_deref().unwrap_or(UNNAMED)
}

fn render_children(output: &mut String, block: &Block, prefix: &str) {
    let entries: Vec<Entry<'_>> = block
        .children
        .iter()
        .map(Entry::Child)
        .chain(
            block
                .component_slots
                .iter()
                .map(|(name, slot)| Entry::Slot(name, slot.slot_content.as_ref())),
        )
        .collect();
    render_entries(output, &entries, prefix);
}

fn render_entries(output: &mut String, entries: &[Entry<'_>], prefix: &str) {
    for (i, entry) in entries.iter().enumerate() {
        let is_last = i == entries.len() - 1;
        let branch = if is_last { "└── " } else { "├── " };
        let continuation = if is_last { "    " } else { "│   " };
        let child_prefix = format!("{}{}", prefix, continuation);

        output.push_str(prefix);
        output.push_str(branch);

        match entry {
            Entry::Child(child) => {
                output.push_str(label(child));
                output.push('\n');
                render_children(output, child, &child_prefix);
            }
            Entry::Slot(name, content) => {
                output.push('#');
                output.push_str(name);
                match content {
                    Some(SlotContent::Text(text)) if !text.is_empty() => {
                        output.push_str(&format!(" \"{}\"", preview(text)));
                        output.push('\n');
                    }
                    Some(SlotContent::Blocks(blocks)) => {
                        output.push('\n');
                        let nested: Vec<Entry<'_>> = blocks.iter().map(Entry::Child).collect();
                        render_entries(output, &nested, &child_prefix);
                    }
                    _ => output.push('\n'),
                }
            }
        }
    }
}

fn preview(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= MAX_TEXT_PREVIEW {
        single_line
    } else {
        let cut: String = single_line.chars().take(MAX_TEXT_PREVIEW).collect();
        format!("{}…", cut)
    }
}
