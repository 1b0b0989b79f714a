//! Page block trees.
//!
//! The editor stores a page state as a JSON array whose first element is the
//! root [`Block`]. Only the structural keys are modelled here; props, styles
//! and ids stay in the stored JSON text and are never rewritten by this crate.

mod collector;
mod outline;

pub use collector::{
    ComponentCollector, ComponentSet, PageContent, DEFAULT_COMPONENTS, EXCLUDED_COMPONENTS,
};
pub use outline::render_outline;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::value::MapAccessDeserializer;
use serde::de::{IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Default upper bound on the number of blocks visited in one tree.
pub const DEFAULT_NODE_BUDGET: usize = 10_000;

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Block tree exceeds the limit of {budget} blocks")]
    BudgetExceeded { budget: usize },
}

/// One node of a page's UI tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Block {
    #[serde(rename = "componentName", default)]
    pub component_name: Option<String>,
    #[serde(default)]
    pub children: Vec<Block>,
    #[serde(rename = "componentSlots", default)]
    pub component_slots: BTreeMap<String, Slot>,
}

/// A named insertion point of a block.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    #[serde(rename = "slotContent", default)]
    pub slot_content: Option<SlotContent>,
}

/// Slot content is either literal text or nested blocks.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SlotContent {
    Text(String),
    Blocks(Vec<Block>),
}

impl<'de> Deserialize<'de> for SlotContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SlotContentVisitor)
    }
}

/// Decodes slot content without buffering, so nested blocks stream through
/// the same deserializer as the rest of the tree.
struct SlotContentVisitor;

impl<'de> Visitor<'de> for SlotContentVisitor {
    type Value = SlotContent;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("slot text or a list of blocks")
    }

    fn visit_str<E: serde::de::Error>(self, text: &str) -> Result<SlotContent, E> {
        Ok(SlotContent::Text(text.to_string()))
    }

    fn visit_string<E: serde::de::Error>(self, text: String) -> Result<SlotContent, E> {
        Ok(SlotContent::Text(text))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<SlotContent, A::Error> {
        let mut blocks = Vec::new();
        while let Some(block) = seq.next_element::<Block>()? {
            blocks.push(block);
        }
        Ok(SlotContent::Blocks(blocks))
    }
}

impl Block {
    pub fn new(component_name: impl Into<String>) -> Self {
        Self {
            component_name: Some(component_name.into()),
            children: Vec::new(),
            component_slots: BTreeMap::new(),
        }
    }

    pub fn with_child(mut self, child: Block) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>, content: SlotContent) -> Self {
        self.component_slots.insert(
            name.into(),
            Slot {
                slot_content: Some(content),
            },
        );
        self
    }

    /// Blocks nested in this block's slots. Text slots yield nothing.
    pub fn slot_blocks(&self) -> impl Iterator<Item = &Block> {
        self.component_slots
            .values()
            .filter_map(|slot| match &slot.slot_content {
                Some(SlotContent::Blocks(blocks)) => Some(blocks.iter()),
                _ => None,
            })
            .flatten()
    }

    /// Visits every block of the tree depth-first, root first.
    ///
    /// Fails once more than `budget` blocks have been visited.
    pub fn walk<F>(&self, budget: usize, mut visit: F) -> Result<(), BlockError>
    where
        F: FnMut(&Block),
    {
        let mut stack = vec![self];
        let mut visited = 0usize;

        while let Some(block) = stack.pop() {
            visited += 1;
            if visited > budget {
                return Err(BlockError::BudgetExceeded { budget });
            }
            visit(block);

            // Reverse so children come off the stack in document order,
            // followed by slot content.
            let slot_children: Vec<&Block> = block.slot_blocks().collect();
            stack.extend(slot_children.into_iter().rev());
            stack.extend(block.children.iter().rev());
        }

        Ok(())
    }

    /// Detaches this block's children and slot blocks.
    fn take_nested(&mut self) -> Vec<Block> {
        let mut nested = std::mem::take(&mut self.children);
        for slot in std::mem::take(&mut self.component_slots).into_values() {
            if let Some(SlotContent::Blocks(blocks)) = slot.slot_content {
                nested.extend(blocks);
            }
        }
        nested
    }
}

// Deep trees are torn down from a flat list; the derived drop would recurse
// once per level.
impl Drop for Block {
    fn drop(&mut self) {
        let mut pending = self.take_nested();
        while let Some(mut block) = pending.pop() {
            pending.extend(block.take_nested());
        }
    }
}

/// Parses stored block content into its root block.
///
/// Accepts the editor's array form (root is the first element) or a bare root
/// object. Returns `None` for empty input or anything that is not a block tree.
///
/// Nesting depth is not limited here: the parser grows its stack on the heap,
/// and the node budget is enforced by [`Block::walk`].
pub fn parse_root(text: &str) -> Option<Block> {
    let mut json = serde_json::Deserializer::from_str(text);
    json.disable_recursion_limit();
    let root = RootForm::deserialize(serde_stacker::Deserializer::new(&mut json)).ok()?;
    json.end().ok()?;
    root.0
}

/// The root block of either stored form, or `None` for an empty list.
struct RootForm(Option<Block>);

impl<'de> Deserialize<'de> for RootForm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RootVisitor)
    }
}

struct RootVisitor;

impl<'de> Visitor<'de> for RootVisitor {
    type Value = RootForm;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a block or a list of blocks")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RootForm, A::Error> {
        let root = seq.next_element::<Block>()?;
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(RootForm(root))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<RootForm, A::Error> {
        Block::deserialize(MapAccessDeserializer::new(map)).map(|root| RootForm(Some(root)))
    }
}
