mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::build::{BuildRunner, BuildTrigger, ProcessRunner};
use crate::config::StudioConfig;
use crate::db::Database;
use crate::registry::DocTypeRegistry;

pub use middleware::{RateLimiter, SecurityConfig};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<StudioConfig>,
    pub registry: Arc<DocTypeRegistry>,
    pub builds: BuildTrigger,
    /// Principal for requests without an `X-Studio-User` header.
    pub default_user: String,
    /// Whether the identity headers are read at all. When false every
    /// request acts as `default_user`.
    pub trust_user_headers: bool,
}

impl AppState {
    /// State whose builds run the configured bundler as a child process.
    pub fn new(db: Database, config: StudioConfig, registry: DocTypeRegistry) -> Self {
        Self::with_runner(db, config, registry, Arc::new(ProcessRunner))
    }

    pub fn with_runner(
        db: Database,
        config: StudioConfig,
        registry: DocTypeRegistry,
        runner: Arc<dyn BuildRunner>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            builds: BuildTrigger::new(db.clone(), config.clone(), runner),
            db,
            config,
            registry: Arc::new(registry),
            default_user: crate::context::ADMINISTRATOR.to_string(),
            trust_user_headers: true,
        }
    }

    pub fn with_default_user(mut self, user: impl Into<String>) -> Self {
        self.default_user = user.into();
        self
    }

    pub fn with_trusted_user_headers(mut self, trusted: bool) -> Self {
        self.trust_user_headers = trusted;
        self
    }
}

/// Router without authentication, rate limiting or CORS restrictions.
pub fn create_router(state: AppState) -> Router {
    create_router_with_security(state, SecurityConfig::disabled())
}

pub fn create_router_with_security(state: AppState, security: SecurityConfig) -> Router {
    let mut api = Router::new()
        // Apps
        .route("/apps", get(handlers::list_apps).post(handlers::create_app))
        .route(
            "/apps/{name}",
            get(handlers::get_app)
                .put(handlers::update_app)
                .delete(handlers::delete_app),
        )
        .route(
            "/apps/{name}/pages",
            get(handlers::list_app_pages).post(handlers::create_page),
        )
        .route("/apps/{name}/pages/by-route", get(handlers::find_page_with_route))
        .route("/apps/{name}/components", get(handlers::get_app_components))
        .route("/apps/{name}/build-status", get(handlers::get_build_status))
        .route("/apps/{name}/build", post(handlers::generate_app_build))
        .route("/apps/{name}/assets", get(handlers::get_app_assets))
        // Pages
        .route(
            "/pages/{name}",
            get(handlers::get_page)
                .put(handlers::update_page)
                .delete(handlers::delete_page),
        )
        .route("/pages/{name}/publish", post(handlers::publish_page))
        .route("/pages/{name}/duplicate", post(handlers::duplicate_page))
        // Resources
        .route(
            "/resources",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route(
            "/resources/{name}",
            get(handlers::get_resource)
                .put(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        // Doctype metadata
        .route("/doctypes/{doctype}/fields", get(handlers::get_doctype_fields))
        .route("/doctypes/{doctype}/methods", get(handlers::get_whitelisted_methods))
        .route("/permissions/app", get(handlers::check_app_permission))
        // Health
        .route("/health", get(handlers::health));

    if let Some(ref limiter) = security.rate_limiter {
        api = api.layer(from_fn_with_state(
            limiter.clone(),
            middleware::rate_limit_middleware,
        ));
    }
    if security.api_key.is_some() {
        api = api.layer(from_fn_with_state(
            security.clone(),
            middleware::auth_middleware,
        ));
    }

    let state = match security.default_user {
        Some(ref user) => state.with_default_user(user.clone()),
        None => state,
    }
    .with_trusted_user_headers(security.user_headers_trusted());

    Router::new()
        .nest("/api/v1", api)
        .route("/{*path}", get(handlers::render_app))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&security))
        .with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match security.cors_origins {
        Some(ref origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
