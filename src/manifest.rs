//! Reads the bundler's manifest to find an app's built assets.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::AppAssets;
use crate::utils::is_safe_name;

/// What the renderer knows about an app's bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetResolution {
    Built(AppAssets),
    /// No manifest on disk: the app was never built.
    NotBuilt,
    /// A manifest exists but could not be used. Treated like `NotBuilt`.
    Failed(String),
}

impl AssetResolution {
    pub fn assets(self) -> Option<AppAssets> {
        match self {
            Self::Built(assets) => Some(assets),
            Self::NotBuilt | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Chunk {
    file: String,
    #[serde(default)]
    css: Vec<String>,
}

pub fn manifest_path(builds_dir: &Path, app_name: &str) -> PathBuf {
    builds_dir.join(app_name).join(".vite").join("manifest.json")
}

/// Resolves the script and stylesheets of `app_name`'s bundle.
///
/// Paths are made public by prefixing `<assets_base>/<app_name>/`.
///
/// Names that are not a single safe path segment never resolve.
pub fn read_app_assets(builds_dir: &Path, assets_base: &str, app_name: &str) -> AssetResolution {
    if !is_safe_name(app_name) {
        tracing::warn!("Refusing to look up assets for app name {:?}", app_name);
        return AssetResolution::NotBuilt;
    }
    let path = manifest_path(builds_dir, app_name);
    if !path.exists() {
        return AssetResolution::NotBuilt;
    }

    match resolve(&path, assets_base, app_name) {
        Ok(assets) => AssetResolution::Built(assets),
        Err(e) => {
            let reason = format!("{:#}", e);
            tracing::error!("Failed to read build manifest for app {}: {}", app_name, reason);
            AssetResolution::Failed(reason)
        }
    }
}

fn resolve(path: &Path, assets_base: &str, app_name: &str) -> Result<AppAssets> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let manifest: Map<String, Value> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let entry_key = format!("renderer-{}.js", app_name);
    let entry_key = if manifest.contains_key(&entry_key) {
        entry_key
    } else {
        manifest
            .keys()
            .find(|key| key.ends_with(&entry_key))
            .cloned()
            .ok_or_else(|| anyhow!("No entry chunk for {}", entry_key))?
    };

    let base = format!("{}/{}", assets_base.trim_end_matches('/'), app_name);
    let mut script = None;
    let mut stylesheets = Vec::new();
    let mut other_css = Vec::new();

    for (key, value) in manifest {
        let chunk: Chunk = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) if key == entry_key => {
                return Err(e).with_context(|| format!("Bad entry chunk {}", key))
            }
            Err(_) => continue,
        };
        let css = chunk.css.iter().map(|file| format!("{}/{}", base, file));
        if key == entry_key {
            script = Some(format!("{}/{}", base, chunk.file));
            stylesheets.extend(css);
        } else {
            other_css.extend(css);
        }
    }
    stylesheets.extend(other_css);

    let script = script.ok_or_else(|| anyhow!("No entry chunk for {}", entry_key))?;
    Ok(AppAssets {
        script,
        stylesheets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/assets/studio/app_builds";

    fn write_manifest(dir: &Path, app: &str, body: &str) {
        let path = manifest_path(dir, app);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn missing_manifest_is_not_built() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            read_app_assets(dir.path(), BASE, "app-1"),
            AssetResolution::NotBuilt
        );
    }

    #[test]
    fn resolves_entry_and_all_stylesheets() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "app-1",
            r#"{
                "_shared.js": {"file": "assets/shared-1.js", "css": ["assets/shared-1.css"]},
                "renderer-app-1.js": {"file": "assets/renderer-abc.js", "css": ["assets/renderer-abc.css"]},
                "_Table.js": {"file": "assets/Table-2.js", "css": ["assets/Table-2.css"]}
            }"#,
        );

        let assets = read_app_assets(dir.path(), BASE, "app-1").assets().unwrap();
        assert_eq!(
            assets.script,
            "/assets/studio/app_builds/app-1/assets/renderer-abc.js"
        );
        assert_eq!(
            assets.stylesheets,
            vec![
                "/assets/studio/app_builds/app-1/assets/renderer-abc.css",
                "/assets/studio/app_builds/app-1/assets/shared-1.css",
                "/assets/studio/app_builds/app-1/assets/Table-2.css",
            ]
        );
    }

    #[test]
    fn falls_back_to_suffix_match() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "app-1",
            r#"{"src/renderer-app-1.js": {"file": "assets/entry.js"}}"#,
        );

        let assets = read_app_assets(dir.path(), BASE, "app-1").assets().unwrap();
        assert_eq!(assets.script, "/assets/studio/app_builds/app-1/assets/entry.js");
        assert!(assets.stylesheets.is_empty());
    }

    #[test]
    fn unreadable_manifest_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "app-1", "{ not json");
        let resolution = read_app_assets(dir.path(), BASE, "app-1");
        assert!(matches!(resolution, AssetResolution::Failed(_)));
        assert!(resolution.assets().is_none());
    }

    #[test]
    fn names_outside_the_builds_dir_never_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let builds = dir.path().join("a").join("b");
        std::fs::create_dir_all(&builds).unwrap();
        write_manifest(dir.path(), "escape", r#"{"renderer-../../escape.js": {"file": "x.js"}}"#);

        assert_eq!(
            read_app_assets(&builds, BASE, "../../escape"),
            AssetResolution::NotBuilt
        );
    }

    #[test]
    fn failure_reason_names_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "app-1", "{ not json");
        match read_app_assets(dir.path(), BASE, "app-1") {
            AssetResolution::Failed(reason) => assert!(reason.contains("manifest.json")),
            other => panic!("expected a failure, got {:?}", other),
        }
    }

    #[test]
    fn missing_entry_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "app-1", r#"{"other.js": {"file": "x.js"}}"#);
        assert!(matches!(
            read_app_assets(dir.path(), BASE, "app-1"),
            AssetResolution::Failed(_)
        ));
    }
}
