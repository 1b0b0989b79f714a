use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A data source that pages bind their components to.
///
/// Which fields are meaningful depends on `resource_type`; see
/// [`crate::lifecycle::validate_resource`] for the rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioResource {
    pub name: String,
    pub resource_name: String,
    pub resource_type: ResourceType,
    pub document_type: Option<String>,
    pub document_name: Option<String>,
    pub fetch_document_using_filters: bool,
    /// JSON text: list of field names to fetch.
    pub fields: Option<String>,
    /// JSON text: filter object or list.
    pub filters: Option<String>,
    pub limit: Option<i64>,
    pub method: HttpMethod,
    pub url: Option<String>,
    pub transform_results: bool,
    pub transform: Option<String>,
    /// JSON text: controller methods callable on a `Document` resource.
    pub whitelisted_methods: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceType {
    #[serde(rename = "Document List")]
    DocumentList,
    #[serde(rename = "Document")]
    Document,
    #[serde(rename = "API Resource")]
    ApiResource,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentList => "Document List",
            Self::Document => "Document",
            Self::ApiResource => "API Resource",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Document List" => Some(Self::DocumentList),
            "Document" => Some(Self::Document),
            "API Resource" => Some(Self::ApiResource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Input for creating or replacing a resource.
///
/// `fields`, `filters` and `whitelisted_methods` accept JSON values; lists
/// and objects are stored as compact JSON text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInput {
    pub resource_name: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub fetch_document_using_filters: bool,
    #[serde(default)]
    pub fields: Option<serde_json::Value>,
    #[serde(default)]
    pub filters: Option<serde_json::Value>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub transform_results: bool,
    #[serde(default)]
    pub transform: Option<String>,
    #[serde(default)]
    pub whitelisted_methods: Option<serde_json::Value>,
}

impl ResourceInput {
    /// Minimal input for a resource of `resource_type`.
    pub fn new(resource_name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            resource_name: resource_name.into(),
            resource_type,
            document_type: None,
            document_name: None,
            fetch_document_using_filters: false,
            fields: None,
            filters: None,
            limit: None,
            method: HttpMethod::Get,
            url: None,
            transform_results: false,
            transform: None,
            whitelisted_methods: None,
        }
    }
}
