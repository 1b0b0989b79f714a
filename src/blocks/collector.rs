//! Collects the distinct UI components a page or app references.
//!
//! The set drives two decisions: which components the bundler must include,
//! and whether the published bundle is stale (draft and published sets differ).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{parse_root, Block, BlockError, DEFAULT_NODE_BUDGET};

/// Components bundled with every app whether or not a tree mentions them.
pub const DEFAULT_COMPONENTS: &[&str] = &["Dialog", "ErrorMessage", "FeatherIcon", "Tooltip"];

/// Structural elements rendered as plain HTML, never bundled as components.
pub const EXCLUDED_COMPONENTS: &[&str] = &["container", "div", "span", "p", "a", "img", "body"];

/// `h(ComponentName, ...)` calls inside hand-written render functions.
static RENDER_CALL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bh\(\s*([A-Z][a-zA-Z0-9_]*)").expect("render call pattern is valid")
});

/// An ordered set of component names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentSet(BTreeSet<String>);

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn extend(&mut self, other: ComponentSet) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Names in `self` that are missing from `other`.
    pub fn difference(&self, other: &ComponentSet) -> Vec<String> {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn symmetric_difference_is_empty(&self, other: &ComponentSet) -> bool {
        self.0.symmetric_difference(&other.0).next().is_none()
    }

    /// Comma-separated list, as the bundler's `--components` flag expects.
    pub fn to_arg(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ComponentSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Block content handed to the collector.
#[derive(Debug, Clone, Copy)]
pub enum PageContent<'a> {
    /// Stored JSON text. Scanned for render calls before parsing.
    Text(&'a str),
    /// An already-parsed root block.
    Tree(&'a Block),
}

/// Walks block trees and gathers component names.
#[derive(Debug, Clone)]
pub struct ComponentCollector {
    defaults: Vec<String>,
    excluded: BTreeSet<String>,
    node_budget: usize,
}

impl Default for ComponentCollector {
    fn default() -> Self {
        Self::new(
            DEFAULT_COMPONENTS.iter().map(|s| s.to_string()).collect(),
            EXCLUDED_COMPONENTS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_NODE_BUDGET,
        )
    }
}

impl ComponentCollector {
    pub fn new(defaults: Vec<String>, excluded: Vec<String>, node_budget: usize) -> Self {
        Self {
            defaults,
            excluded: excluded.into_iter().collect(),
            node_budget,
        }
    }

    /// The set every page starts from.
    pub fn default_set(&self) -> ComponentSet {
        self.defaults.iter().cloned().collect()
    }

    /// Components referenced by one page state.
    ///
    /// Absent, empty or unparseable content yields the default set (plus any
    /// render-call matches found in the text).
    pub fn collect(&self, content: Option<PageContent<'_>>) -> Result<ComponentSet, BlockError> {
        let mut components = self.default_set();

        match content {
            None => {}
            Some(PageContent::Tree(root)) => self.add_tree(root, &mut components)?,
            Some(PageContent::Text(text)) => {
                if text.trim().is_empty() {
                    return Ok(components);
                }
                for caps in RENDER_CALL_REGEX.captures_iter(text) {
                    components.insert(&caps[1]);
                }
                match parse_root(text) {
                    Some(root) => self.add_tree(&root, &mut components)?,
                    None => tracing::warn!(
                        "Ignoring block content that is not a block tree ({} bytes)",
                        text.len()
                    ),
                }
            }
        }

        Ok(components)
    }

    /// Convenience for stored text that may be absent.
    pub fn collect_text(&self, text: Option<&str>) -> Result<ComponentSet, BlockError> {
        self.collect(text.map(PageContent::Text))
    }

    /// Union of the sets of every page content given.
    ///
    /// Empty content contributes nothing; no content at all yields the empty set.
    pub fn collect_all<'a, I>(&self, contents: I) -> Result<ComponentSet, BlockError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut components = ComponentSet::new();
        for text in contents {
            if text.trim().is_empty() {
                continue;
            }
            components.extend(self.collect_text(Some(text))?);
        }
        Ok(components)
    }

    fn add_tree(&self, root: &Block, components: &mut ComponentSet) -> Result<(), BlockError> {
        root.walk(self.node_budget, |block| {
            if let Some(name) = block.component_name.as_deref() {
                if !self.excluded.contains(name) {
                    components.insert(name);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::SlotContent;

    fn with_defaults(extra: &[&str]) -> ComponentSet {
        let mut set = ComponentCollector::default().default_set();
        for name in extra {
            set.insert(*name);
        }
        set
    }

    #[test]
    fn absent_content_yields_defaults() {
        let collector = ComponentCollector::default();
        assert_eq!(collector.collect(None).unwrap(), with_defaults(&[]));
        assert_eq!(
            collector.collect_text(Some("   ")).unwrap(),
            with_defaults(&[])
        );
        assert_eq!(collector.collect_text(Some("[]")).unwrap(), with_defaults(&[]));
    }

    #[test]
    fn collects_root_child_and_skips_text_slots() {
        let collector = ComponentCollector::default();
        let root = Block::new("Button")
            .with_child(Block::new("Text"))
            .with_slot("default", SlotContent::Text("Click me".into()));

        let set = collector.collect(Some(PageContent::Tree(&root))).unwrap();
        assert_eq!(set, with_defaults(&["Button", "Text"]));
    }

    #[test]
    fn collects_slot_children_at_any_depth() {
        let collector = ComponentCollector::default();
        let text = r#"[{"componentName":"container","children":[
            {"componentName":"Card","componentSlots":{"actions":{"slotContent":[
                {"componentName":"Dropdown","children":[{"componentName":"Badge"}]}
            ]}}}
        ]}]"#;

        let set = collector.collect_text(Some(text)).unwrap();
        assert_eq!(set, with_defaults(&["Card", "Dropdown", "Badge"]));
        assert!(!set.contains("container"));
    }

    #[test]
    fn picks_up_render_calls_in_scripts() {
        let collector = ComponentCollector::default();
        let text = r#"[{"componentName":"ListView","componentProps":{
            "columns":[{"prefix":"() => h(Avatar, { label: row.owner })"},
                       {"render":"h( Badge,{})"},
                       {"ignored":"h(lowercase)"}]
        }}]"#;

        let set = collector.collect_text(Some(text)).unwrap();
        assert_eq!(set, with_defaults(&["ListView", "Avatar", "Badge"]));
        assert!(!set.contains("lowercase"));
    }

    #[test]
    fn malformed_tree_yields_defaults() {
        let collector = ComponentCollector::default();
        let set = collector.collect_text(Some(r#"{"componentName": 7}"#)).unwrap();
        assert_eq!(set, with_defaults(&[]));
    }

    #[test]
    fn collects_names_from_deeply_nested_trees() {
        let collector = ComponentCollector::default();
        let mut text = r#"{"componentName":"Leaf"}"#.to_string();
        for _ in 0..70 {
            text = format!(r#"{{"componentName":"Card","children":[{}]}}"#, text);
        }

        let set = collector.collect_text(Some(&format!("[{}]", text))).unwrap();
        assert_eq!(set, with_defaults(&["Card", "Leaf"]));
    }

    #[test]
    fn deep_text_over_budget_is_an_error() {
        let collector = ComponentCollector::new(vec![], vec![], 50);
        let mut text = r#"{"componentName":"Leaf"}"#.to_string();
        for _ in 0..70 {
            text = format!(r#"{{"componentName":"Card","children":[{}]}}"#, text);
        }

        let err = collector.collect_text(Some(&text)).unwrap_err();
        assert!(matches!(err, BlockError::BudgetExceeded { budget: 50 }));
    }

    #[test]
    fn oversized_tree_is_rejected() {
        let collector = ComponentCollector::new(vec![], vec![], 2);
        let root = Block::new("A")
            .with_child(Block::new("B"))
            .with_child(Block::new("C"));

        assert!(collector.collect(Some(PageContent::Tree(&root))).is_err());
    }

    #[test]
    fn collecting_twice_is_stable() {
        let collector = ComponentCollector::default();
        let text = r#"[{"componentName":"Tabs","children":[{"componentName":"TextInput"}]}]"#;
        assert_eq!(
            collector.collect_text(Some(text)).unwrap(),
            collector.collect_text(Some(text)).unwrap()
        );
    }

    #[test]
    fn union_over_pages_skips_empty_ones() {
        let collector = ComponentCollector::default();
        let pages = [
            r#"[{"componentName":"Button"}]"#,
            "",
            r#"[{"componentName":"Table"}]"#,
        ];

        let set = collector.collect_all(pages).unwrap();
        assert_eq!(set, with_defaults(&["Button", "Table"]));
        assert!(collector.collect_all(Vec::<&str>::new()).unwrap().is_empty());
    }

    #[test]
    fn component_arg_is_sorted_and_comma_separated() {
        let set: ComponentSet = ["Table", "Button", "Avatar"].into_iter().collect();
        assert_eq!(set.to_arg(), "Avatar,Button,Table");
    }
}
