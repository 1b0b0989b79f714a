//! Bundle builds for Studio apps.
//!
//! An app's bundle is stale when the components referenced by its draft
//! pages differ from those referenced by its published pages. A build runs
//! the external bundler with the draft component list and blocks until it
//! exits.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use thiserror::Error;

use crate::blocks::{ComponentCollector, ComponentSet};
use crate::config::StudioConfig;
use crate::context::{PermissionType, RequestContext, STUDIO_APP, STUDIO_PAGE};
use crate::db::Database;
use crate::error::StudioError;
use crate::models::{BuildOutcome, BuildState, BuildStatus, Snapshot};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build of app {app_name} failed ({}):\n{output}", status_text(.status))]
    ProcessFailed {
        app_name: String,
        status: Option<i32>,
        output: String,
    },
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// A fully resolved bundler command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    pub app_name: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub components: Vec<String>,
}

impl BuildInvocation {
    /// `<program> <script> <app> --components <a,b,c>` in the source dir.
    pub fn new(config: &StudioConfig, app_name: &str, components: &ComponentSet) -> Self {
        Self {
            app_name: app_name.to_string(),
            program: config.build_program.clone(),
            args: vec![
                config.build_script.clone(),
                app_name.to_string(),
                "--components".to_string(),
                components.to_arg(),
            ],
            cwd: config.source_dir.clone(),
            components: components.to_vec(),
        }
    }
}

/// Captured output of a successful bundler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a bundler invocation to completion.
///
/// Implementations block the calling thread; async callers run them on the
/// blocking pool.
pub trait BuildRunner: Send + Sync {
    fn run(&self, invocation: &BuildInvocation) -> Result<BuildOutput, BuildError>;
}

/// Runs the bundler as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl BuildRunner for ProcessRunner {
    fn run(&self, invocation: &BuildInvocation) -> Result<BuildOutput, BuildError> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .output()
            .map_err(|source| BuildError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(BuildError::ProcessFailed {
                app_name: invocation.app_name.clone(),
                status: output.status.code(),
                output: format!("{}{}", stdout, stderr),
            });
        }

        Ok(BuildOutput { stdout, stderr })
    }
}

/// Decides whether an app needs a rebuild and runs it.
#[derive(Clone)]
pub struct BuildTrigger {
    db: Database,
    config: Arc<StudioConfig>,
    collector: ComponentCollector,
    runner: Arc<dyn BuildRunner>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl BuildTrigger {
    pub fn new(db: Database, config: Arc<StudioConfig>, runner: Arc<dyn BuildRunner>) -> Self {
        Self {
            collector: config.collector(),
            db,
            config,
            runner,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Union of the components referenced by the app's published pages in
    /// `snapshot`.
    pub fn app_components(&self, app_name: &str, snapshot: Snapshot) -> Result<ComponentSet> {
        if self.db.get_app(app_name)?.is_none() {
            return Err(StudioError::not_found("Studio App", app_name).into());
        }
        let contents = self.db.page_contents(app_name, snapshot)?;
        let components = self
            .collector
            .collect_all(contents.iter().map(String::as_str))
            .map_err(StudioError::from)?;
        Ok(components)
    }

    pub fn build_status(&self, app_name: &str) -> Result<BuildStatus> {
        let draft = self.app_components(app_name, Snapshot::Draft)?;
        let published = self.app_components(app_name, Snapshot::Published)?;
        Ok(status_of(app_name, &draft, &published))
    }

    /// Rebuilds the app's bundle if its draft and published component sets
    /// differ.
    ///
    /// Builds of one app are serialized. Blocks until the bundler exits.
    pub fn generate_app_build(&self, ctx: &RequestContext, app_name: &str) -> Result<BuildOutcome> {
        if self.db.get_app(app_name)?.is_none() {
            return Err(StudioError::not_found("Studio App", app_name).into());
        }

        let lock = self.acquire_app_lock(app_name);
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.build_if_stale(ctx, app_name)
        };
        self.release_app_lock(app_name, lock);
        outcome
    }

    fn build_if_stale(&self, ctx: &RequestContext, app_name: &str) -> Result<BuildOutcome> {
        let draft = self.app_components(app_name, Snapshot::Draft)?;
        let published = self.app_components(app_name, Snapshot::Published)?;
        let status = status_of(app_name, &draft, &published);

        if status.state == BuildState::Fresh {
            tracing::debug!("App {} is up to date, skipping build", app_name);
            return Ok(BuildOutcome::UpToDate);
        }

        ctx.require(&[STUDIO_APP, STUDIO_PAGE], PermissionType::Write)?;

        let invocation = BuildInvocation::new(&self.config, app_name, &draft);
        tracing::info!(
            "Building app {} with {} components ({} added, {} removed)",
            app_name,
            draft.len(),
            status.added.len(),
            status.removed.len()
        );

        match self.runner.run(&invocation) {
            Ok(output) => {
                tracing::info!("Build of app {} finished", app_name);
                tracing::debug!("Bundler output for {}: {}", app_name, output.stdout.trim());
                Ok(BuildOutcome::Built {
                    components: invocation.components,
                    added: status.added,
                    removed: status.removed,
                })
            }
            Err(e) => {
                tracing::error!("Build of app {} failed: {}", app_name, e);
                Err(StudioError::from(e).into())
            }
        }
    }

    // Handles are cloned and dropped only under the map lock, so a strong
    // count of 1 in the map means no build holds or waits on the entry.
    fn acquire_app_lock(&self, app_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(app_name.to_string()).or_default().clone()
    }

    fn release_app_lock(&self, app_name: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks.get(app_name).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(app_name);
        }
    }
}

fn status_of(app_name: &str, draft: &ComponentSet, published: &ComponentSet) -> BuildStatus {
    let state = if draft.symmetric_difference_is_empty(published) {
        BuildState::Fresh
    } else {
        BuildState::Stale
    };
    BuildStatus {
        app_name: app_name.to_string(),
        state,
        added: draft.difference(published),
        removed: published.difference(draft),
    }
}
