use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Studio app: a set of pages published together as one front-end bundle.
///
/// `name` is the stable identifier (`app-<hash>`), used for build output
/// directories and manifest lookup. `route` is the URL segment the renderer
/// serves the app under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioApp {
    pub name: String,
    pub app_title: String,
    /// Optional short name, separate from the title.
    pub app_name: Option<String>,
    pub route: String,
    /// The page shown at the app root. Set by the first page inserted.
    pub app_home: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new app. Every field is optional; lifecycle hooks fill
/// in the name, title and route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAppInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub app_title: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Input for updating an existing app. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppInput {
    #[serde(default)]
    pub app_title: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub app_home: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Which block-tree snapshot of a page to read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Snapshot {
    /// The `blocks` field: what end users see.
    #[default]
    Published,
    /// The `draft_blocks` field, falling back to `blocks` when no draft is pending.
    Draft,
}

impl Snapshot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
        }
    }
}

/// Derived build freshness of an app.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Draft and published component sets match.
    Fresh,
    /// At least one component differs between draft and published.
    Stale,
}

/// Result of comparing an app's draft and published component sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildStatus {
    pub app_name: String,
    pub state: BuildState,
    /// Components present in the draft but not yet published.
    pub added: Vec<String>,
    /// Components published but no longer referenced by the draft.
    pub removed: Vec<String>,
}

/// Outcome of a build request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Nothing to do: the component sets already match.
    UpToDate,
    /// The bundler ran successfully with `components`.
    Built {
        components: Vec<String>,
        added: Vec<String>,
        removed: Vec<String>,
    },
}

/// Asset paths of a built app, consumed by the page renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppAssets {
    pub script: String,
    pub stylesheets: Vec<String>,
}
