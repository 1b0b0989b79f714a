use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::blocks::ComponentSet;
use crate::build::BuildError;
use crate::context::{PermissionType, RequestContext, STUDIO_APP, STUDIO_PAGE, STUDIO_RESOURCE};
use crate::error::StudioError;
use crate::manifest::read_app_assets;
use crate::models::*;
use crate::registry::DocField;
use crate::render;

type ApiError = (StatusCode, String);

// ============================================================
// Error Handling
// ============================================================

/// Maps domain errors to their status codes. Anything else is logged and
/// returned as a generic 500 so internal details never reach the client.
fn internal_error(e: anyhow::Error) -> ApiError {
    match e.downcast::<StudioError>() {
        Ok(err) => studio_error(err),
        Err(e) => {
            tracing::error!("Internal error: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn studio_error(err: StudioError) -> ApiError {
    let status = match &err {
        StudioError::NotFound { .. } => StatusCode::NOT_FOUND,
        StudioError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        StudioError::Validation(_) | StudioError::Block(_) => StatusCode::BAD_REQUEST,
        StudioError::Build(BuildError::ProcessFailed { .. }) => StatusCode::BAD_GATEWAY,
        StudioError::Build(BuildError::Spawn { .. }) => {
            tracing::error!("{}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start the build process".to_string(),
            );
        }
    };
    tracing::warn!("Request failed: {}", err);
    (status, err.to_string())
}

fn not_found(doctype: &'static str, name: &str) -> ApiError {
    studio_error(StudioError::not_found(doctype, name))
}

fn require(ctx: &RequestContext, doctypes: &[&str], ptype: PermissionType) -> Result<(), ApiError> {
    ctx.require(doctypes, ptype).map_err(studio_error)
}

// ============================================================
// Request principal
// ============================================================

/// The acting user, from `X-Studio-User` and `X-Studio-Permissions`.
///
/// The headers are trusted input: they are read only when the server is
/// configured to trust them (local mode, or behind an authenticating proxy).
/// Otherwise every request acts as the configured default user.
pub struct Principal(pub RequestContext);

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !state.trust_user_headers {
            if parts.headers.contains_key("X-Studio-User") {
                tracing::debug!("Ignoring X-Studio-User header from an untrusted client");
            }
            return Ok(Principal(RequestContext::new(
                state.default_user.as_str(),
                state.config.site_name(),
            )));
        }

        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let user = header("X-Studio-User").unwrap_or(state.default_user.as_str());
        let mut ctx = RequestContext::new(user, state.config.site_name());
        if let Some(grants) = header("X-Studio-Permissions") {
            ctx = ctx.with_grant_list(grants);
        }
        Ok(Principal(ctx))
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Apps
// ============================================================

pub async fn list_apps(State(state): State<AppState>) -> Result<Json<Vec<StudioApp>>, ApiError> {
    state.db.get_all_apps().map(Json).map_err(internal_error)
}

pub async fn get_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StudioApp>, ApiError> {
    state
        .db
        .get_app(&name)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Studio App", &name))
}

pub async fn create_app(
    State(state): State<AppState>,
    Principal(ctx): Principal,
    Json(input): Json<CreateAppInput>,
) -> Result<(StatusCode, Json<StudioApp>), ApiError> {
    require(&ctx, &[STUDIO_APP], PermissionType::Write)?;
    state
        .db
        .create_app(input)
        .map(|app| (StatusCode::CREATED, Json(app)))
        .map_err(internal_error)
}

pub async fn update_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
    Json(input): Json<UpdateAppInput>,
) -> Result<Json<StudioApp>, ApiError> {
    require(&ctx, &[STUDIO_APP], PermissionType::Write)?;
    state
        .db
        .update_app(&name, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Studio App", &name))
}

pub async fn delete_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
) -> Result<StatusCode, ApiError> {
    require(&ctx, &[STUDIO_APP], PermissionType::Write)?;
    if state.db.delete_app(&name).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Studio App", &name))
    }
}

pub async fn list_app_pages(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<StudioPage>>, ApiError> {
    if state.db.get_app(&name).map_err(internal_error)?.is_none() {
        return Err(not_found("Studio App", &name));
    }
    state.db.get_pages_by_app(&name).map(Json).map_err(internal_error)
}

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub route: String,
}

#[derive(Debug, Serialize)]
pub struct PageRef {
    pub page: String,
}

pub async fn find_page_with_route(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<PageRef>, ApiError> {
    state
        .db
        .find_page_with_route(&name, &query.route)
        .map_err(internal_error)?
        .map(|page| Json(PageRef { page }))
        .ok_or_else(|| not_found("Studio Page", &query.route))
}

#[derive(Debug, Default, Deserialize)]
pub struct ComponentsQuery {
    #[serde(default)]
    pub snapshot: Snapshot,
}

pub async fn get_app_components(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ComponentsQuery>,
) -> Result<Json<ComponentSet>, ApiError> {
    state
        .builds
        .app_components(&name, query.snapshot)
        .map(Json)
        .map_err(internal_error)
}

pub async fn get_build_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BuildStatus>, ApiError> {
    state.builds.build_status(&name).map(Json).map_err(internal_error)
}

/// Runs the bundler on the blocking pool; the request waits for it to exit.
pub async fn generate_app_build(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
) -> Result<Json<BuildOutcome>, ApiError> {
    let builds = state.builds.clone();
    tokio::task::spawn_blocking(move || builds.generate_app_build(&ctx, &name))
        .await
        .map_err(|e| internal_error(e.into()))?
        .map(Json)
        .map_err(internal_error)
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetsResponse {
    Built {
        script: String,
        stylesheets: Vec<String>,
    },
    NotBuilt,
}

pub async fn get_app_assets(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AssetsResponse>, ApiError> {
    if state.db.get_app(&name).map_err(internal_error)?.is_none() {
        return Err(not_found("Studio App", &name));
    }
    let resolution = read_app_assets(&state.config.builds_dir, &state.config.assets_base_url, &name);
    let response = match resolution.assets() {
        Some(assets) => AssetsResponse::Built {
            script: assets.script,
            stylesheets: assets.stylesheets,
        },
        None => AssetsResponse::NotBuilt,
    };
    Ok(Json(response))
}

// ============================================================
// Pages
// ============================================================

pub async fn get_page(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StudioPage>, ApiError> {
    state
        .db
        .get_page(&name)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Studio Page", &name))
}

pub async fn create_page(
    State(state): State<AppState>,
    Path(app_name): Path<String>,
    Principal(ctx): Principal,
    Json(input): Json<CreatePageInput>,
) -> Result<(StatusCode, Json<StudioPage>), ApiError> {
    require(&ctx, &[STUDIO_PAGE], PermissionType::Write)?;
    state
        .db
        .create_page(&app_name, input)
        .map(|page| (StatusCode::CREATED, Json(page)))
        .map_err(internal_error)
}

pub async fn update_page(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
    Json(input): Json<UpdatePageInput>,
) -> Result<Json<StudioPage>, ApiError> {
    require(&ctx, &[STUDIO_PAGE], PermissionType::Write)?;
    state
        .db
        .update_page(&name, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Studio Page", &name))
}

pub async fn delete_page(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
) -> Result<StatusCode, ApiError> {
    require(&ctx, &[STUDIO_PAGE], PermissionType::Write)?;
    if state.db.delete_page(&name).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Studio Page", &name))
    }
}

pub async fn publish_page(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
) -> Result<Json<StudioPage>, ApiError> {
    require(&ctx, &[STUDIO_PAGE], PermissionType::Write)?;
    state
        .db
        .publish_page(&name)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Studio Page", &name))
}

pub async fn duplicate_page(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
    input: Option<Json<DuplicatePageInput>>,
) -> Result<(StatusCode, Json<StudioPage>), ApiError> {
    require(&ctx, &[STUDIO_PAGE], PermissionType::Write)?;
    let target_app = input.and_then(|Json(input)| input.app_name);
    state
        .db
        .duplicate_page(&name, target_app)
        .map_err(internal_error)?
        .map(|page| (StatusCode::CREATED, Json(page)))
        .ok_or_else(|| not_found("Studio Page", &name))
}

// ============================================================
// Resources
// ============================================================

pub async fn list_resources(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudioResource>>, ApiError> {
    state.db.get_all_resources().map(Json).map_err(internal_error)
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StudioResource>, ApiError> {
    state
        .db
        .get_resource(&name)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Studio Resource", &name))
}

pub async fn create_resource(
    State(state): State<AppState>,
    Principal(ctx): Principal,
    Json(input): Json<ResourceInput>,
) -> Result<(StatusCode, Json<StudioResource>), ApiError> {
    require(&ctx, &[STUDIO_RESOURCE], PermissionType::Write)?;
    state
        .db
        .create_resource(input)
        .map(|resource| (StatusCode::CREATED, Json(resource)))
        .map_err(internal_error)
}

pub async fn update_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
    Json(input): Json<ResourceInput>,
) -> Result<Json<StudioResource>, ApiError> {
    require(&ctx, &[STUDIO_RESOURCE], PermissionType::Write)?;
    state
        .db
        .update_resource(&name, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Studio Resource", &name))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Principal(ctx): Principal,
) -> Result<StatusCode, ApiError> {
    require(&ctx, &[STUDIO_RESOURCE], PermissionType::Write)?;
    if state.db.delete_resource(&name).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Studio Resource", &name))
    }
}

// ============================================================
// Doctype metadata and permissions
// ============================================================

pub async fn get_doctype_fields(
    State(state): State<AppState>,
    Path(doctype): Path<String>,
) -> Result<Json<Vec<DocField>>, ApiError> {
    state
        .registry
        .get_doctype_fields(&doctype)
        .map(Json)
        .map_err(studio_error)
}

pub async fn get_whitelisted_methods(
    State(state): State<AppState>,
    Path(doctype): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    state
        .registry
        .get_whitelisted_methods(&doctype)
        .map(Json)
        .map_err(studio_error)
}

/// Whether the caller may edit Studio apps.
pub async fn check_app_permission(Principal(ctx): Principal) -> Json<bool> {
    Json(ctx.can_edit_apps())
}

// ============================================================
// App renderer
// ============================================================

pub async fn render_app(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Html<String>, ApiError> {
    match render::resolve(&state.db, &state.config, &path).map_err(internal_error)? {
        Some(context) => Ok(Html(render::render_html(&context))),
        None => Err((StatusCode::NOT_FOUND, format!("No app is served at /{}", path))),
    }
}
