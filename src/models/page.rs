use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A page of a Studio app.
///
/// A page keeps two independent snapshots of its block tree, both stored as
/// JSON text exactly as the editor produced them:
///
/// - `blocks`: the published tree, rendered to end users.
/// - `draft_blocks`: pending edits. Publishing copies it into `blocks` and
///   clears it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioPage {
    pub name: String,
    pub studio_app: String,
    pub page_name: Option<String>,
    pub page_title: String,
    /// Always starts with `/` (the front-end router requires it).
    pub route: String,
    pub published: bool,
    pub blocks: Option<String>,
    pub draft_blocks: Option<String>,
    pub variables: Vec<PageVariable>,
    /// Names of the [`super::StudioResource`]s bound to this page.
    pub resources: Vec<String>,
    pub watchers: Vec<PageWatcher>,
    /// Client script references, in load order.
    pub client_scripts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudioPage {
    /// The block content for a snapshot.
    ///
    /// The draft snapshot falls back to the published tree when no draft is
    /// pending, so a page without edits looks the same in both.
    pub fn content(&self, snapshot: super::Snapshot) -> Option<&str> {
        let published = self.blocks.as_deref().filter(|b| !b.trim().is_empty());
        match snapshot {
            super::Snapshot::Published => published,
            super::Snapshot::Draft => self
                .draft_blocks
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .or(published),
        }
    }
}

/// Minimal page info used by the app renderer's navigation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSummary {
    pub name: String,
    pub page_title: String,
    pub route: String,
}

impl From<&StudioPage> for PageSummary {
    fn from(page: &StudioPage) -> Self {
        Self {
            name: page.name.clone(),
            page_title: page.page_title.clone(),
            route: page.route.clone(),
        }
    }
}

/// A named piece of reactive state declared on a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageVariable {
    pub variable_name: String,
    pub variable_type: VariableType,
    /// Initial value as source text, evaluated by the front end.
    #[serde(default)]
    pub initial_value: Option<String>,
}

/// Script re-run whenever the `source` expression changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageWatcher {
    pub source: String,
    pub script: String,
    /// Also run once when the page loads.
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VariableType {
    #[default]
    String,
    Number,
    Boolean,
    Object,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Object => "Object",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "String" => Some(Self::String),
            "Number" => Some(Self::Number),
            "Boolean" => Some(Self::Boolean),
            "Object" => Some(Self::Object),
            _ => None,
        }
    }
}

/// Input for creating a new page.
///
/// `blocks` and `draft_blocks` accept either a JSON block list or the same
/// list already encoded as a JSON string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePageInput {
    #[serde(default)]
    pub page_name: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub blocks: Option<serde_json::Value>,
    #[serde(default)]
    pub draft_blocks: Option<serde_json::Value>,
    #[serde(default)]
    pub variables: Vec<PageVariable>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub watchers: Vec<PageWatcher>,
    #[serde(default)]
    pub client_scripts: Vec<String>,
}

/// Input for updating an existing page. All fields are optional for partial
/// updates; the list fields replace the existing lists when given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePageInput {
    #[serde(default)]
    pub page_name: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub blocks: Option<serde_json::Value>,
    #[serde(default)]
    pub draft_blocks: Option<serde_json::Value>,
    #[serde(default)]
    pub variables: Option<Vec<PageVariable>>,
    #[serde(default)]
    pub resources: Option<Vec<String>>,
    #[serde(default)]
    pub watchers: Option<Vec<PageWatcher>>,
    #[serde(default)]
    pub client_scripts: Option<Vec<String>>,
}

/// Input for duplicating a page, optionally into another app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicatePageInput {
    #[serde(default)]
    pub app_name: Option<String>,
}
