//! Lifecycle hooks for Studio entities.
//!
//! Each hook is a free function over plain data. [`crate::db::Database`] calls
//! them in a fixed order around every write:
//!
//! - insert: `autoname` → `before_insert` → `validate` → INSERT → `after_insert`
//! - update: `validate` → UPDATE
//!
//! Hooks never touch storage. Facts they need from other rows (titles already
//! taken, conflicting pages) are passed in by the caller.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::StudioError;
use crate::models::*;
use crate::utils::{camel_case_to_kebab_case, generate_hash, is_safe_name, with_leading_slash};

pub const DEFAULT_APP_TITLE: &str = "My App";
pub const DEFAULT_PAGE_TITLE: &str = "My Page";
pub const EMPTY_BLOCKS: &str = "[]";

const NAME_HASH_LEN: usize = 8;
const ROUTE_HASH_LEN: usize = 4;

// ============================================================
// Shared
// ============================================================

/// Normalizes editor-supplied block content to stored JSON text.
///
/// Lists and objects are encoded compactly, strings are stored verbatim and
/// `null` clears the field.
pub fn blocks_to_text(value: Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    }
}

fn default_route(title: &str) -> String {
    format!(
        "{}-{}",
        camel_case_to_kebab_case(title, true),
        generate_hash(ROUTE_HASH_LEN)
    )
}

/// Returns `value`, or `value-N` with the next free number when `value` is
/// already in `taken`.
pub fn append_number_if_name_exists(value: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == value) {
        return value.to_string();
    }
    let prefix = format!("{}-", value);
    let last = taken
        .iter()
        .filter_map(|t| t.strip_prefix(&prefix))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{}", value, last + 1)
}

// ============================================================
// Studio App
// ============================================================

pub fn autoname_app(name: Option<String>) -> String {
    name.filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("app-{}", generate_hash(NAME_HASH_LEN)))
}

/// Builds a new app from input, filling the default title and route.
pub fn app_before_insert(input: CreateAppInput, now: DateTime<Utc>) -> StudioApp {
    let app_title = input
        .app_title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_APP_TITLE.to_string());
    let route = input
        .route
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| default_route(&app_title));

    StudioApp {
        name: autoname_app(input.name),
        app_title,
        app_name: input.app_name.filter(|n| !n.trim().is_empty()),
        route,
        app_home: None,
        published: input.published.unwrap_or(false),
        created_at: now,
        updated_at: now,
    }
}

/// `route_taken` is whether another app already uses this route.
///
/// The name becomes a directory under the builds dir and a bundler argument,
/// so it is limited to letters, digits, `_` and `-`.
pub fn validate_app(app: &StudioApp, route_taken: bool) -> Result<(), StudioError> {
    if !is_safe_name(&app.name) {
        return Err(StudioError::validation(format!(
            "App name {} may only contain letters, digits, _ and -, and must not start with -",
            app.name
        )));
    }
    let route = app.route.trim();
    if route.is_empty() {
        return Err(StudioError::validation("App route is required"));
    }
    if route.contains('/') {
        return Err(StudioError::validation(format!(
            "App route {} must be a single path segment",
            route
        )));
    }
    if route_taken {
        return Err(StudioError::validation(format!(
            "Another app already uses the route {}",
            route
        )));
    }
    Ok(())
}

// ============================================================
// Studio Page
// ============================================================

pub fn autoname_page() -> String {
    format!("page-{}", generate_hash(NAME_HASH_LEN))
}

/// Builds a new page of `studio_app` from input.
///
/// `titles_in_app` lists the page titles already used in the app, for
/// numbering the default title.
pub fn page_before_insert(
    studio_app: &str,
    input: CreatePageInput,
    titles_in_app: &[String],
    now: DateTime<Utc>,
) -> StudioPage {
    let blocks = blocks_to_text(input.blocks)
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| EMPTY_BLOCKS.to_string());
    let draft_blocks = blocks_to_text(input.draft_blocks);

    let page_title = match input.page_title.filter(|t| !t.trim().is_empty()) {
        Some(title) => title,
        None => append_number_if_name_exists(DEFAULT_PAGE_TITLE, titles_in_app),
    };
    let route = input
        .route
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| default_route(&page_title));

    StudioPage {
        name: autoname_page(),
        studio_app: studio_app.to_string(),
        page_name: input.page_name,
        page_title,
        route,
        published: input.published.unwrap_or(false),
        blocks: Some(blocks),
        draft_blocks,
        variables: input.variables,
        resources: input.resources,
        watchers: input.watchers,
        client_scripts: input.client_scripts,
        created_at: now,
        updated_at: now,
    }
}

/// Normalizes the route and rejects duplicate variable names.
pub fn validate_page(page: &mut StudioPage) -> Result<(), StudioError> {
    page.route = with_leading_slash(page.route.trim());
    validate_variables(&page.variables)
}

fn validate_variables(variables: &[PageVariable]) -> Result<(), StudioError> {
    let mut duplicates: Vec<&str> = Vec::new();
    for (i, variable) in variables.iter().enumerate() {
        let name = variable.variable_name.as_str();
        if variables[..i].iter().any(|v| v.variable_name == name) && !duplicates.contains(&name) {
            duplicates.push(name);
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(StudioError::validation(format!(
            "Duplicate variable name: {}",
            duplicates.join(", ")
        )))
    }
}

/// The new `app_home` after inserting `page`, if the app has none yet.
pub fn page_after_insert(app: &StudioApp, page: &StudioPage) -> Option<String> {
    match app.app_home.as_deref() {
        Some(home) if !home.is_empty() => None,
        _ => Some(page.name.clone()),
    }
}

/// Publishes a page in place.
///
/// `conflicts` are the other published pages of the same app sharing this
/// page's route or title.
pub fn publish_page(page: &mut StudioPage, conflicts: &[StudioPage]) -> Result<(), StudioError> {
    if !conflicts.is_empty() {
        let listed: Vec<String> = conflicts
            .iter()
            .map(|p| format!("{} - {}", p.page_title, p.route))
            .collect();
        return Err(StudioError::validation(format!(
            "Page(s) with duplicate Route or Page Title already exist in this app: {}",
            listed.join(", ")
        )));
    }

    page.published = true;
    if let Some(draft) = page.draft_blocks.take().filter(|d| !d.trim().is_empty()) {
        page.blocks = Some(draft);
    }
    Ok(())
}

/// Input for inserting a copy of `source` into `target_app`.
///
/// The copy keeps both snapshots and every child list; its route is left
/// empty so `page_before_insert` generates a fresh one.
pub fn duplicate_page_input(source: &StudioPage) -> CreatePageInput {
    CreatePageInput {
        page_name: None,
        page_title: Some(format!("{} Copy", source.page_title)),
        route: None,
        published: Some(source.published),
        blocks: source.blocks.clone().map(Value::String),
        draft_blocks: source.draft_blocks.clone().map(Value::String),
        variables: source.variables.clone(),
        resources: source.resources.clone(),
        watchers: source.watchers.clone(),
        client_scripts: source.client_scripts.clone(),
    }
}

// ============================================================
// Studio Resource
// ============================================================

pub fn autoname_resource() -> String {
    format!("resource-{}", generate_hash(NAME_HASH_LEN))
}

fn json_field(value: Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if text.trim().is_empty() => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    }
}

fn is_empty_json(text: Option<&str>) -> bool {
    match text.map(str::trim) {
        None | Some("") | Some("[]") | Some("{}") | Some("null") => true,
        Some(_) => false,
    }
}

/// Builds the stored form of a resource and checks its configuration.
pub fn prepare_resource(
    name: String,
    input: ResourceInput,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<StudioResource, StudioError> {
    let mut resource = StudioResource {
        name,
        resource_name: input.resource_name,
        resource_type: input.resource_type,
        document_type: input.document_type.filter(|d| !d.trim().is_empty()),
        document_name: input.document_name.filter(|d| !d.trim().is_empty()),
        fetch_document_using_filters: input.fetch_document_using_filters,
        fields: json_field(input.fields),
        filters: json_field(input.filters),
        limit: input.limit,
        method: input.method,
        url: input.url.filter(|u| !u.trim().is_empty()),
        transform_results: input.transform_results,
        transform: input.transform,
        whitelisted_methods: json_field(input.whitelisted_methods),
        created_at,
        updated_at: now,
    };
    validate_resource(&mut resource)?;
    Ok(resource)
}

/// Checks that the fields required by the resource type are set.
///
/// A `Document` resource is fetched either by filters or by name; the unused
/// one is cleared.
pub fn validate_resource(resource: &mut StudioResource) -> Result<(), StudioError> {
    if resource.resource_name.trim().is_empty() {
        return Err(StudioError::validation("Data Source name is required"));
    }
    let label = resource.resource_name.clone();

    match resource.resource_type {
        ResourceType::ApiResource => {
            if resource.url.is_none() {
                return Err(StudioError::validation(format!(
                    "Please set API URL for Data Source {}",
                    label
                )));
            }
        }
        ResourceType::DocumentList | ResourceType::Document => {
            if resource.document_type.is_none() {
                return Err(StudioError::validation(format!(
                    "Please set Document Type for Data Source {}",
                    label
                )));
            }
        }
    }

    match resource.resource_type {
        ResourceType::DocumentList if is_empty_json(resource.fields.as_deref()) => {
            return Err(StudioError::validation(format!(
                "Please set fields to fetch for Data Source {}",
                label
            )));
        }
        ResourceType::Document if resource.fetch_document_using_filters => {
            if is_empty_json(resource.filters.as_deref()) {
                return Err(StudioError::validation(format!(
                    "Please set filters to fetch the Data Source {}",
                    label
                )));
            }
            resource.document_name = None;
        }
        ResourceType::Document => {
            if resource.document_name.is_none() {
                return Err(StudioError::validation(format!(
                    "Please set the document name to fetch the Data Source {}",
                    label
                )));
            }
            resource.filters = Some(EMPTY_BLOCKS.to_string());
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_with_variables(names: &[&str]) -> StudioPage {
        let mut page = page_before_insert("app-1", CreatePageInput::default(), &[], Utc::now());
        page.variables = names
            .iter()
            .map(|n| PageVariable {
                variable_name: n.to_string(),
                variable_type: VariableType::String,
                initial_value: None,
            })
            .collect();
        page
    }

    #[test]
    fn numbers_taken_titles() {
        let taken = vec!["My Page".to_string(), "My Page-1".to_string(), "My Page-3".to_string()];
        assert_eq!(append_number_if_name_exists("My Page", &taken), "My Page-4");
        assert_eq!(append_number_if_name_exists("Other", &taken), "Other");
        assert_eq!(
            append_number_if_name_exists("My Page", &["My Page".to_string()]),
            "My Page-1"
        );
    }

    #[test]
    fn app_defaults() {
        let app = app_before_insert(CreateAppInput::default(), Utc::now());
        assert!(app.name.starts_with("app-"));
        assert_eq!(app.name.len(), "app-".len() + 8);
        assert_eq!(app.app_title, "My App");
        assert!(app.route.starts_with("my-app-"));
        assert!(!app.published);
    }

    #[test]
    fn app_route_must_be_a_segment() {
        let mut app = app_before_insert(CreateAppInput::default(), Utc::now());
        app.route = "a/b".into();
        assert!(validate_app(&app, false).is_err());
        app.route = "crm".into();
        assert!(validate_app(&app, false).is_ok());
        assert!(validate_app(&app, true).is_err());
    }

    #[test]
    fn page_defaults() {
        let page = page_before_insert(
            "app-1",
            CreatePageInput {
                blocks: Some(json!([{"componentName": "Button"}])),
                ..Default::default()
            },
            &["My Page".to_string()],
            Utc::now(),
        );
        assert!(page.name.starts_with("page-"));
        assert_eq!(page.page_title, "My Page-1");
        assert!(page.route.starts_with("my-page-1-"));
        assert_eq!(page.blocks.as_deref(), Some(r#"[{"componentName":"Button"}]"#));
        assert!(page.draft_blocks.is_none());
    }

    #[test]
    fn empty_blocks_default_to_empty_list() {
        let page = page_before_insert("app-1", CreatePageInput::default(), &[], Utc::now());
        assert_eq!(page.blocks.as_deref(), Some("[]"));
    }

    #[test]
    fn validate_adds_leading_slash() {
        let mut page = page_with_variables(&[]);
        page.route = "home".into();
        validate_page(&mut page).unwrap();
        assert_eq!(page.route, "/home");
    }

    #[test]
    fn validate_rejects_duplicate_variables() {
        let mut page = page_with_variables(&["count", "user", "count", "user", "count"]);
        let err = validate_page(&mut page).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate variable name: count, user");

        let mut page = page_with_variables(&["count", "user"]);
        assert!(validate_page(&mut page).is_ok());
    }

    #[test]
    fn publish_moves_draft_into_blocks() {
        let mut page = page_with_variables(&[]);
        page.draft_blocks = Some(r#"[{"componentName":"Table"}]"#.into());

        publish_page(&mut page, &[]).unwrap();
        assert!(page.published);
        assert_eq!(page.blocks.as_deref(), Some(r#"[{"componentName":"Table"}]"#));
        assert!(page.draft_blocks.is_none());
    }

    #[test]
    fn publish_without_draft_keeps_blocks() {
        let mut page = page_with_variables(&[]);
        publish_page(&mut page, &[]).unwrap();
        assert_eq!(page.blocks.as_deref(), Some("[]"));
    }

    #[test]
    fn publish_reports_conflicts() {
        let mut page = page_with_variables(&[]);
        let mut other = page_with_variables(&[]);
        other.page_title = "Home".into();
        other.route = "/home".into();

        let err = publish_page(&mut page, &[other]).unwrap_err();
        assert!(err.to_string().ends_with("Home - /home"));
        assert!(!page.published);
    }

    #[test]
    fn duplicate_clears_route_and_renames() {
        let mut source = page_with_variables(&["count"]);
        source.page_title = "Orders".into();
        source.page_name = Some("orders".into());
        source.draft_blocks = Some("[{}]".into());

        let input = duplicate_page_input(&source);
        assert_eq!(input.page_title.as_deref(), Some("Orders Copy"));
        assert!(input.route.is_none());
        assert!(input.page_name.is_none());
        assert_eq!(input.variables, source.variables);

        let copy = page_before_insert("app-2", input, &[], Utc::now());
        assert_eq!(copy.blocks, source.blocks);
        assert_eq!(copy.draft_blocks, source.draft_blocks);
        assert_ne!(copy.name, source.name);
        assert_ne!(copy.route, source.route);
    }

    #[test]
    fn api_resource_needs_url() {
        let input = ResourceInput::new("Weather", ResourceType::ApiResource);
        let err = prepare_resource("r".into(), input, Utc::now(), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Please set API URL for Data Source Weather");
    }

    #[test]
    fn document_list_needs_doctype_and_fields() {
        let mut input = ResourceInput::new("Todos", ResourceType::DocumentList);
        assert!(prepare_resource("r".into(), input.clone(), Utc::now(), Utc::now()).is_err());

        input.document_type = Some("ToDo".into());
        let err = prepare_resource("r".into(), input.clone(), Utc::now(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("fields"));

        input.fields = Some(json!(["name", "status"]));
        let resource = prepare_resource("r".into(), input, Utc::now(), Utc::now()).unwrap();
        assert_eq!(resource.fields.as_deref(), Some(r#"["name","status"]"#));
    }

    #[test]
    fn document_by_filters_clears_name() {
        let mut input = ResourceInput::new("Latest", ResourceType::Document);
        input.document_type = Some("ToDo".into());
        input.document_name = Some("TODO-1".into());
        input.fetch_document_using_filters = true;
        assert!(prepare_resource("r".into(), input.clone(), Utc::now(), Utc::now()).is_err());

        input.filters = Some(json!({"status": "Open"}));
        let resource = prepare_resource("r".into(), input, Utc::now(), Utc::now()).unwrap();
        assert!(resource.document_name.is_none());
    }

    #[test]
    fn document_by_name_clears_filters() {
        let mut input = ResourceInput::new("One", ResourceType::Document);
        input.document_type = Some("ToDo".into());
        input.filters = Some(json!({"status": "Open"}));
        assert!(prepare_resource("r".into(), input.clone(), Utc::now(), Utc::now()).is_err());

        input.document_name = Some("TODO-1".into());
        let resource = prepare_resource("r".into(), input, Utc::now(), Utc::now()).unwrap();
        assert_eq!(resource.filters.as_deref(), Some("[]"));
    }
}
