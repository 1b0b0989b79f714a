//! Server-side shell for Studio apps.
//!
//! `/<app route>/...` serves the built bundle of the app mounted at that
//! route. `/dev/<app route>/...` serves the editor's live preview instead.
//! When an app has no usable build, the preview shell is served with an
//! `assets_not_found` flag so the front end can explain why.

use anyhow::Result;
use serde::Serialize;

use crate::config::StudioConfig;
use crate::db::Database;
use crate::manifest::read_app_assets;
use crate::models::PageSummary;

const PREVIEW_PREFIX: &str = "dev/";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// The app's own built bundle.
    App,
    /// The Studio front end, rendering the app from its stored blocks.
    Studio,
}

/// Everything the HTML shell and the front end need to boot an app.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppRenderContext {
    pub template: Template,
    pub app_name: String,
    pub app_title: String,
    pub app_route: String,
    pub base_url: String,
    pub app_pages: Vec<PageSummary>,
    pub is_developer_mode: bool,
    pub site_name: String,
    pub is_preview: bool,
    pub assets_not_found: bool,
    pub script: Option<String>,
    pub stylesheets: Vec<String>,
}

/// Splits a request path into (is_preview, app route).
pub fn app_route_for_path(path: &str) -> (bool, Option<&str>) {
    let path = path.trim_start_matches('/');
    let (is_preview, rest) = match path.strip_prefix(PREVIEW_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, path),
    };
    let route = rest.split('/').next().filter(|r| !r.is_empty());
    (is_preview, route)
}

/// Builds the render context for `path`, or `None` when no app is mounted
/// there.
pub fn resolve(db: &Database, config: &StudioConfig, path: &str) -> Result<Option<AppRenderContext>> {
    let (is_preview, Some(route)) = app_route_for_path(path) else {
        return Ok(None);
    };
    let Some(app) = db.get_app_by_route(route)? else {
        return Ok(None);
    };

    let app_pages = db
        .get_published_pages(&app.name)?
        .iter()
        .map(PageSummary::from)
        .collect();

    let mut context = AppRenderContext {
        template: Template::Studio,
        base_url: format!("{}/{}", config.site_url.trim_end_matches('/'), app.route),
        app_route: app.route,
        app_name: app.name,
        app_title: app.app_title,
        app_pages,
        is_developer_mode: config.developer_mode,
        site_name: config.site_name().to_string(),
        is_preview,
        assets_not_found: false,
        script: None,
        stylesheets: Vec::new(),
    };

    if is_preview {
        context.app_route = format!("{}{}", PREVIEW_PREFIX, context.app_route);
        return Ok(Some(context));
    }

    match read_app_assets(&config.builds_dir, &config.assets_base_url, &context.app_name).assets() {
        Some(assets) => {
            context.template = Template::App;
            context.script = Some(assets.script);
            context.stylesheets = assets.stylesheets;
        }
        None => {
            tracing::debug!("No build found for app {}, serving studio shell", context.app_name);
            context.assets_not_found = true;
        }
    }

    Ok(Some(context))
}

/// Minimal HTML document that boots the front end with `context`.
pub fn render_html(context: &AppRenderContext) -> String {
    let mut head = String::new();
    for href in &context.stylesheets {
        head.push_str(&format!(
            "    <link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(href)
        ));
    }

    let boot = match serde_json::to_string(context) {
        Ok(json) => json.replace("</", "<\\/"),
        Err(e) => {
            tracing::error!("Failed to encode render context: {}", e);
            "{}".to_string()
        }
    };

    let body = match (&context.template, &context.script) {
        (Template::App, Some(script)) => format!(
            "    <div id=\"app\"></div>\n    <script type=\"module\" src=\"{}\"></script>\n",
            escape_html(script)
        ),
        _ => "    <div id=\"studio-app\"></div>\n".to_string(),
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n    <title>{}</title>\n{}</head>\n<body>\n    <script>window.studio_app = {};</script>\n{}</body>\n</html>\n",
        escape_html(&context.app_title),
        head,
        boot,
        body
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_preview_and_app_paths() {
        assert_eq!(app_route_for_path("crm/orders"), (false, Some("crm")));
        assert_eq!(app_route_for_path("/crm"), (false, Some("crm")));
        assert_eq!(app_route_for_path("dev/crm/orders"), (true, Some("crm")));
        assert_eq!(app_route_for_path("dev/"), (true, None));
        assert_eq!(app_route_for_path(""), (false, None));
    }

    #[test]
    fn escapes_title_and_script_tags() {
        let context = AppRenderContext {
            template: Template::Studio,
            app_name: "app-1".into(),
            app_title: "<Sales & Ops>".into(),
            app_route: "sales".into(),
            base_url: "http://localhost/sales".into(),
            app_pages: vec![],
            is_developer_mode: false,
            site_name: "localhost".into(),
            is_preview: false,
            assets_not_found: true,
            script: None,
            stylesheets: vec![],
        };

        let html = render_html(&context);
        assert!(html.contains("<title>&lt;Sales &amp; Ops&gt;</title>"));
        assert!(!html.contains("</Sales"));
        assert!(html.contains("\"assets_not_found\":true"));
        assert!(html.contains("id=\"studio-app\""));
    }
}
