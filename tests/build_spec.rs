use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use speculate2::speculate;
use studio::build::{BuildError, BuildInvocation, BuildOutput, BuildRunner, BuildTrigger};
use studio::config::StudioConfig;
use studio::context::{PermissionType, RequestContext, STUDIO_APP, STUDIO_PAGE};
use studio::db::Database;
use studio::error::StudioError;
use studio::manifest::manifest_path;
use studio::models::*;
use studio::render::{self, Template};

/// Records invocations and, on success, writes a manifest like the bundler.
struct RecordingRunner {
    builds_dir: PathBuf,
    fail: bool,
    calls: Mutex<Vec<BuildInvocation>>,
}

impl RecordingRunner {
    fn new(builds_dir: PathBuf, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            builds_dir,
            fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<BuildInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl BuildRunner for RecordingRunner {
    fn run(&self, invocation: &BuildInvocation) -> Result<BuildOutput, BuildError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.fail {
            return Err(BuildError::ProcessFailed {
                app_name: invocation.app_name.clone(),
                status: Some(1),
                output: "error: Could not resolve \"Table\"".to_string(),
            });
        }

        let path = manifest_path(&self.builds_dir, &invocation.app_name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut manifest = serde_json::Map::new();
        manifest.insert(
            format!("renderer-{}.js", invocation.app_name),
            json!({"file": "assets/renderer-1a2b.js", "css": ["assets/renderer-1a2b.css"]}),
        );
        std::fs::write(path, serde_json::Value::Object(manifest).to_string()).unwrap();
        Ok(BuildOutput::default())
    }
}

/// Sleeps through each run and counts runs that started while another was
/// still in progress.
#[derive(Default)]
struct SlowRunner {
    active: AtomicUsize,
    overlapping: AtomicUsize,
    runs: AtomicUsize,
}

impl BuildRunner for SlowRunner {
    fn run(&self, _invocation: &BuildInvocation) -> Result<BuildOutput, BuildError> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapping.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(150));
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(BuildOutput::default())
    }
}

fn editor() -> RequestContext {
    RequestContext::new("editor@example.com", "localhost")
        .grant(STUDIO_APP, PermissionType::Write)
        .grant(STUDIO_PAGE, PermissionType::Write)
}

/// An app with one published page whose draft adds a `Table`.
fn stale_app(db: &Database) -> StudioApp {
    let app = db
        .create_app(CreateAppInput {
            route: Some("orders".to_string()),
            ..Default::default()
        })
        .expect("Failed to create app");
    db.create_page(
        &app.name,
        CreatePageInput {
            route: Some("home".to_string()),
            published: Some(true),
            blocks: Some(json!([{
                "componentName": "container",
                "children": [{"componentName": "Button"}]
            }])),
            draft_blocks: Some(json!([{
                "componentName": "container",
                "children": [{"componentName": "Button"}, {"componentName": "Table"}]
            }])),
            ..Default::default()
        },
    )
    .expect("Failed to create page");
    app
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = StudioConfig::for_source_dir(dir.path());
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let runner = RecordingRunner::new(config.builds_dir.clone(), false);
        let builds = BuildTrigger::new(db.clone(), Arc::new(config.clone()), runner.clone());
    }

    describe "build_status" {
        it "reports components added by the draft" {
            let app = stale_app(&db);
            let status = builds.build_status(&app.name).expect("Status failed");

            assert_eq!(status.state, BuildState::Stale);
            assert_eq!(status.added, vec!["Table"]);
            assert!(status.removed.is_empty());
        }

        it "treats an app without pages as fresh" {
            let app = db.create_app(CreateAppInput::default()).expect("Failed to create app");
            let status = builds.build_status(&app.name).expect("Status failed");

            assert_eq!(status.state, BuildState::Fresh);
            assert!(builds.app_components(&app.name, Snapshot::Draft).expect("Collect failed").is_empty());
        }

        it "fails for an unknown app" {
            let err = builds.build_status("app-missing").unwrap_err();
            assert!(matches!(err.downcast::<StudioError>(), Ok(StudioError::NotFound { .. })));
        }
    }

    describe "generate_app_build" {
        it "runs the bundler with the draft components" {
            let app = stale_app(&db);
            let outcome = builds.generate_app_build(&editor(), &app.name).expect("Build failed");

            assert_eq!(outcome, BuildOutcome::Built {
                components: vec![
                    "Button".to_string(),
                    "Dialog".to_string(),
                    "ErrorMessage".to_string(),
                    "FeatherIcon".to_string(),
                    "Table".to_string(),
                    "Tooltip".to_string(),
                ],
                added: vec!["Table".to_string()],
                removed: vec![],
            });

            let calls = runner.calls();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].program, "yarn");
            assert_eq!(calls[0].args, vec![
                "build-studio-app".to_string(),
                app.name.clone(),
                "--components".to_string(),
                "Button,Dialog,ErrorMessage,FeatherIcon,Table,Tooltip".to_string(),
            ]);
            assert_eq!(calls[0].cwd, dir.path());
        }

        it "skips the build when nothing changed, without checking permissions" {
            let app = stale_app(&db);
            let page = db.get_pages_by_app(&app.name).expect("Query failed").remove(0);
            db.publish_page(&page.name).expect("Publish failed");

            let guest = RequestContext::guest("localhost");
            let outcome = builds.generate_app_build(&guest, &app.name).expect("Build failed");

            assert_eq!(outcome, BuildOutcome::UpToDate);
            assert!(runner.calls().is_empty());
        }

        it "requires write access on apps and pages" {
            let app = stale_app(&db);
            let reader = RequestContext::new("viewer@example.com", "localhost")
                .grant(STUDIO_APP, PermissionType::Write);

            let err = builds.generate_app_build(&reader, &app.name).unwrap_err();
            assert!(matches!(err.downcast::<StudioError>(), Ok(StudioError::PermissionDenied(_))));
            assert!(runner.calls().is_empty());
        }

        it "reports a failing bundler with its output" {
            let app = stale_app(&db);
            let failing = RecordingRunner::new(config.builds_dir.clone(), true);
            let builds = BuildTrigger::new(db.clone(), Arc::new(config.clone()), failing.clone());

            let err = builds.generate_app_build(&editor(), &app.name).unwrap_err();
            let err = err.downcast::<StudioError>().expect("Expected a StudioError");
            assert!(matches!(err, StudioError::Build(BuildError::ProcessFailed { status: Some(1), .. })));
            assert!(err.to_string().contains("Could not resolve"));
            assert_eq!(failing.calls().len(), 1);
        }

        it "lets the renderer serve the built bundle" {
            let app = stale_app(&db);

            let before = render::resolve(&db, &config, "orders/home").expect("Render failed").expect("No app");
            assert_eq!(before.template, Template::Studio);
            assert!(before.assets_not_found);

            builds.generate_app_build(&RequestContext::administrator("localhost"), &app.name).expect("Build failed");

            let after = render::resolve(&db, &config, "orders/home").expect("Render failed").expect("No app");
            assert_eq!(after.template, Template::App);
            assert_eq!(
                after.script.as_deref(),
                Some(format!("/assets/studio/app_builds/{}/assets/renderer-1a2b.js", app.name).as_str())
            );
            assert_eq!(after.app_pages.len(), 1);
        }

        it "runs concurrent builds of one app one after the other" {
            let app = stale_app(&db);
            let slow = Arc::new(SlowRunner::default());
            let builds = BuildTrigger::new(db.clone(), Arc::new(config.clone()), slow.clone());

            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        let builds = builds.clone();
                        let app_name = app.name.clone();
                        scope.spawn(move || builds.generate_app_build(&editor(), &app_name))
                    })
                    .collect();
                for handle in handles {
                    let outcome = handle.join().expect("Build thread panicked").expect("Build failed");
                    assert!(matches!(outcome, BuildOutcome::Built { .. }));
                }
            });

            assert_eq!(slow.runs.load(Ordering::SeqCst), 2);
            assert_eq!(slow.overlapping.load(Ordering::SeqCst), 0);
        }

        it "always serves the studio shell for previews" {
            let app = stale_app(&db);
            builds.generate_app_build(&editor(), &app.name).expect("Build failed");

            let preview = render::resolve(&db, &config, "dev/orders").expect("Render failed").expect("No app");
            assert_eq!(preview.template, Template::Studio);
            assert!(preview.is_preview);
            assert_eq!(preview.app_route, "dev/orders");
        }
    }
}
