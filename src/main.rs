use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio::api::{self, AppState, SecurityConfig};
use studio::blocks::{parse_root, render_outline};
use studio::build::{BuildTrigger, ProcessRunner};
use studio::client::StudioClient;
use studio::config::StudioConfig;
use studio::context::RequestContext;
use studio::db::Database;
use studio::models::{BuildOutcome, BuildState, Snapshot};
use studio::registry::DocTypeRegistry;

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Back end for the Studio visual app builder")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Rebuild an app's bundle if its components changed
    Build {
        /// App name (`app-<hash>`)
        app: String,

        /// Ask a running server to build instead of building in-process
        #[arg(long)]
        remote: bool,

        /// User to act as on the server (overrides STUDIO_USER)
        #[arg(long, requires = "remote")]
        user: Option<String>,
    },
    /// Check server status, and an app's build freshness if given
    Status {
        app: Option<String>,
    },
    /// Print a page's block tree as an outline
    Tree {
        page: String,

        /// Show the draft instead of the published tree
        #[arg(long)]
        draft: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "studio=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(config: &StudioConfig) -> anyhow::Result<Database> {
    let db = match config.database_path {
        Some(ref path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

fn load_registry(config: &StudioConfig) -> anyhow::Result<DocTypeRegistry> {
    let mut registry = DocTypeRegistry::builtin();
    if let Some(ref path) = config.doctypes_path {
        registry.load_file(path)?;
    }
    Ok(registry)
}

async fn serve(config: StudioConfig, host: &str, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting Studio server on port {}", port);

    let db = open_database(&config)?;
    let registry = load_registry(&config)?;
    let security = SecurityConfig::from_env();

    if let Some(limiter) = security.rate_limiter.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.window());
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });
    }

    let app = api::create_router_with_security(AppState::new(db, config, registry), security);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Studio server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = StudioConfig::load()?;

    match cli.command {
        Some(Commands::Serve { port, host }) => serve(config, &host, port).await?,
        Some(Commands::Build { app, remote, user }) => {
            let outcome = if remote {
                let client = match user {
                    Some(user) => StudioClient::from_env().as_user(user),
                    None => StudioClient::from_env(),
                };
                client.trigger_build(&app).await?
            } else {
                let db = open_database(&config)?;
                let site = config.site_name().to_string();
                let builds = BuildTrigger::new(db, config.into(), std::sync::Arc::new(ProcessRunner));
                tokio::task::spawn_blocking(move || {
                    builds.generate_app_build(&RequestContext::administrator(site), &app)
                })
                .await??
            };

            match outcome {
                BuildOutcome::UpToDate => println!("App is up to date, nothing to build."),
                BuildOutcome::Built { components, .. } => {
                    println!("Built with {} components: {}", components.len(), components.join(", "))
                }
            }
        }
        Some(Commands::Status { app }) => {
            let client = StudioClient::from_env();
            match client.health().await {
                Ok(_) => println!("Studio server is running."),
                Err(e) => {
                    println!("Studio server is not reachable: {}", e);
                    return Ok(());
                }
            }

            if let Some(app) = app {
                let status = client.build_status(&app).await?;
                match status.state {
                    BuildState::Fresh => println!("{}: up to date", status.app_name),
                    BuildState::Stale => println!(
                        "{}: stale (added: [{}], removed: [{}])",
                        status.app_name,
                        status.added.join(", "),
                        status.removed.join(", ")
                    ),
                }
            }
        }
        Some(Commands::Tree { page, draft }) => {
            let db = open_database(&config)?;
            let page = db
                .get_page(&page)?
                .ok_or_else(|| anyhow::anyhow!("Page {} not found", page))?;

            let snapshot = if draft { Snapshot::Draft } else { Snapshot::Published };
            match page.content(snapshot).and_then(parse_root) {
                Some(root) => print!("{}", render_outline(&root)),
                None => println!("{} has no {} blocks.", page.name, snapshot.as_str()),
            }
        }
        None => serve(config, "127.0.0.1", 3000).await?,
    }

    Ok(())
}
