//! Server configuration.
//!
//! Values are layered: built-in defaults, then a JSON file, then `STUDIO_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::blocks::{ComponentCollector, DEFAULT_COMPONENTS, DEFAULT_NODE_BUDGET, EXCLUDED_COMPONENTS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StudioConfig {
    /// SQLite file. `None` uses the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Front-end source tree the bundler runs in.
    pub source_dir: PathBuf,
    /// Where the bundler writes `<app>/.vite/manifest.json`.
    pub builds_dir: PathBuf,
    /// Public URL prefix of built assets.
    pub assets_base_url: String,
    pub build_program: String,
    pub build_script: String,
    pub default_components: Vec<String>,
    pub excluded_components: Vec<String>,
    pub max_block_nodes: usize,
    pub site_url: String,
    pub developer_mode: bool,
    /// Extra doctype definitions merged into the registry at startup.
    pub doctypes_path: Option<PathBuf>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            source_dir: PathBuf::from("frontend"),
            builds_dir: PathBuf::from("public/app_builds"),
            assets_base_url: "/assets/studio/app_builds".to_string(),
            build_program: "yarn".to_string(),
            build_script: "build-studio-app".to_string(),
            default_components: DEFAULT_COMPONENTS.iter().map(|s| s.to_string()).collect(),
            excluded_components: EXCLUDED_COMPONENTS.iter().map(|s| s.to_string()).collect(),
            max_block_nodes: DEFAULT_NODE_BUDGET,
            site_url: "http://127.0.0.1:3000".to_string(),
            developer_mode: false,
            doctypes_path: None,
        }
    }
}

impl StudioConfig {
    /// Defaults with the source tree at `source_dir` and builds under its
    /// `public/app_builds`.
    pub fn for_source_dir(source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        Self {
            builds_dir: source_dir.join("public").join("app_builds"),
            source_dir,
            ..Self::default()
        }
    }

    /// Loads the config file named by `STUDIO_CONFIG`, else the one in the
    /// platform config directory if present, then applies env overrides.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os("STUDIO_CONFIG") {
            Some(path) => Some(PathBuf::from(path)),
            None => directories::ProjectDirs::from("", "", "studio")
                .map(|dirs| dirs.config_dir().join("config.json"))
                .filter(|path| path.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(dir) = env_var("STUDIO_SOURCE_DIR") {
            self.source_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("STUDIO_BUILDS_DIR") {
            self.builds_dir = PathBuf::from(dir);
        }
        if let Some(base) = env_var("STUDIO_ASSETS_BASE") {
            self.assets_base_url = base;
        }
        if let Some(program) = env_var("STUDIO_BUILD_PROGRAM") {
            self.build_program = program;
        }
        if let Some(url) = env_var("STUDIO_SITE_URL") {
            self.site_url = url;
        }
        if let Some(flag) = env_var("STUDIO_DEVELOPER_MODE") {
            self.developer_mode = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Some(path) = env_var("STUDIO_DOCTYPES") {
            self.doctypes_path = Some(PathBuf::from(path));
        }
    }

    pub fn collector(&self) -> ComponentCollector {
        ComponentCollector::new(
            self.default_components.clone(),
            self.excluded_components.clone(),
            self.max_block_nodes,
        )
    }

    /// Host part of `site_url`, shown as the site name.
    pub fn site_name(&self) -> &str {
        let url = self
            .site_url
            .split_once("://")
            .map_or(self.site_url.as_str(), |(_, rest)| rest);
        url.split(['/', ':']).next().unwrap_or(url)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"build_program": "npm", "default_components": ["Dialog"], "max_block_nodes": 50}}"#
        )
        .unwrap();

        let config = StudioConfig::from_file(file.path()).unwrap();
        assert_eq!(config.build_program, "npm");
        assert_eq!(config.build_script, "build-studio-app");
        assert_eq!(config.default_components, vec!["Dialog"]);
        assert_eq!(config.max_block_nodes, 50);
    }

    #[test]
    fn bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(StudioConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn builds_live_under_source_dir() {
        let config = StudioConfig::for_source_dir("/srv/studio");
        assert_eq!(config.builds_dir, PathBuf::from("/srv/studio/public/app_builds"));
    }

    #[test]
    fn site_name_is_the_host() {
        let mut config = StudioConfig::default();
        assert_eq!(config.site_name(), "127.0.0.1");
        config.site_url = "https://erp.example.com/desk".into();
        assert_eq!(config.site_name(), "erp.example.com");
    }
}
