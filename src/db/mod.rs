mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StudioError;
use crate::lifecycle;
use crate::models::*;

const APP_COLUMNS: &str =
    "name, app_title, route, app_home, published, created_at, updated_at, app_name";

const PAGE_COLUMNS: &str = "name, studio_app, page_name, page_title, route, published, blocks, draft_blocks, created_at, updated_at";

const RESOURCE_COLUMNS: &str = "name, resource_name, resource_type, document_type, document_name, fetch_document_using_filters, fields, filters, fetch_limit, method, url, transform_results, transform, whitelisted_methods, created_at, updated_at";

/// SQLite-backed store for Studio entities.
///
/// Every write runs the entity's lifecycle hooks from [`crate::lifecycle`].
/// Multi-row writes (a page with its variables and resources) run in one
/// transaction under a single lock.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "studio")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("studio.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Studio App operations
    // ============================================================

    pub fn get_all_apps(&self) -> Result<Vec<StudioApp>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {APP_COLUMNS} FROM studio_apps ORDER BY app_title, name"
        ))?;

        let apps = stmt
            .query_map([], app_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(apps)
    }

    pub fn get_app(&self, name: &str) -> Result<Option<StudioApp>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_app(&conn, name)
    }

    pub fn get_app_by_route(&self, route: &str) -> Result<Option<StudioApp>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let app = conn
            .query_row(
                &format!("SELECT {APP_COLUMNS} FROM studio_apps WHERE route = ?"),
                [route],
                app_from_row,
            )
            .optional()?;
        Ok(app)
    }

    pub fn create_app(&self, input: CreateAppInput) -> Result<StudioApp> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let app = lifecycle::app_before_insert(input, Utc::now());

        if query_app(&conn, &app.name)?.is_some() {
            return Err(StudioError::validation(format!("App {} already exists", app.name)).into());
        }
        let route_taken = route_in_use(&conn, &app.route, None)?;
        lifecycle::validate_app(&app, route_taken)?;

        conn.execute(
            &format!("INSERT INTO studio_apps ({APP_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                &app.name,
                &app.app_title,
                &app.route,
                &app.app_home,
                app.published,
                app.created_at.to_rfc3339(),
                app.updated_at.to_rfc3339(),
                &app.app_name,
            ],
        )?;

        tracing::debug!("Created app {} at route {}", app.name, app.route);
        Ok(app)
    }

    pub fn update_app(&self, name: &str, input: UpdateAppInput) -> Result<Option<StudioApp>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(existing) = query_app(&conn, name)? else {
            return Ok(None);
        };

        let app_home = match input.app_home {
            Some(home) if home.is_empty() => None,
            Some(home) => {
                let belongs: bool = conn
                    .query_row(
                        "SELECT COUNT(*) > 0 FROM studio_pages WHERE name = ? AND studio_app = ?",
                        params![&home, name],
                        |row| row.get(0),
                    )?;
                if !belongs {
                    return Err(StudioError::validation(format!(
                        "Page {} does not belong to app {}",
                        home, name
                    ))
                    .into());
                }
                Some(home)
            }
            None => existing.app_home,
        };

        let app = StudioApp {
            name: existing.name,
            app_title: input.app_title.unwrap_or(existing.app_title),
            app_name: match input.app_name {
                Some(app_name) if app_name.trim().is_empty() => None,
                Some(app_name) => Some(app_name),
                None => existing.app_name,
            },
            route: input.route.unwrap_or(existing.route),
            app_home,
            published: input.published.unwrap_or(existing.published),
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        let route_taken = route_in_use(&conn, &app.route, Some(name))?;
        lifecycle::validate_app(&app, route_taken)?;

        conn.execute(
            "UPDATE studio_apps SET app_title = ?, app_name = ?, route = ?, app_home = ?, published = ?, updated_at = ?
             WHERE name = ?",
            params![
                &app.app_title,
                &app.app_name,
                &app.route,
                &app.app_home,
                app.published,
                app.updated_at.to_rfc3339(),
                name,
            ],
        )?;

        Ok(Some(app))
    }

    /// Deletes an app together with its pages.
    pub fn delete_app(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM studio_apps WHERE name = ?", [name])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Studio Page operations
    // ============================================================

    pub fn get_pages_by_app(&self, app_name: &str) -> Result<Vec<StudioPage>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_pages(
            &conn,
            "WHERE studio_app = ? ORDER BY page_title, name",
            &[&app_name],
        )
    }

    pub fn get_published_pages(&self, app_name: &str) -> Result<Vec<StudioPage>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_pages(
            &conn,
            "WHERE studio_app = ? AND published = 1 ORDER BY page_title, name",
            &[&app_name],
        )
    }

    pub fn get_page(&self, name: &str) -> Result<Option<StudioPage>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_page(&conn, name)
    }

    /// Inserts a page into `app_name`.
    ///
    /// The first page inserted into an app becomes its home page.
    pub fn create_page(&self, app_name: &str, input: CreatePageInput) -> Result<StudioPage> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let app = query_app(&tx, app_name)?
            .ok_or_else(|| StudioError::not_found("Studio App", app_name))?;

        let titles = page_titles(&tx, app_name)?;
        let mut page = lifecycle::page_before_insert(app_name, input, &titles, Utc::now());
        lifecycle::validate_page(&mut page)?;
        ensure_resources_exist(&tx, &page.resources)?;

        tx.execute(
            &format!("INSERT INTO studio_pages ({PAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                &page.name,
                &page.studio_app,
                &page.page_name,
                &page.page_title,
                &page.route,
                page.published,
                &page.blocks,
                &page.draft_blocks,
                page.created_at.to_rfc3339(),
                page.updated_at.to_rfc3339(),
            ],
        )?;
        write_page_children(&tx, &page)?;

        if let Some(home) = lifecycle::page_after_insert(&app, &page) {
            tx.execute(
                "UPDATE studio_apps SET app_home = ? WHERE name = ?",
                params![&home, app_name],
            )?;
        }

        tx.commit()?;
        tracing::debug!("Created page {} in app {}", page.name, app_name);
        Ok(page)
    }

    /// Updates a page. `variables` and `resources` replace the stored lists
    /// when given; an empty draft discards pending edits.
    pub fn update_page(&self, name: &str, input: UpdatePageInput) -> Result<Option<StudioPage>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let Some(existing) = query_page(&tx, name)? else {
            return Ok(None);
        };

        let mut page = StudioPage {
            page_name: input.page_name.or(existing.page_name),
            page_title: input
                .page_title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(existing.page_title),
            route: input
                .route
                .filter(|r| !r.trim().is_empty())
                .unwrap_or(existing.route),
            blocks: match input.blocks {
                Some(value) => lifecycle::blocks_to_text(Some(value)),
                None => existing.blocks,
            },
            draft_blocks: match input.draft_blocks {
                Some(value) => {
                    lifecycle::blocks_to_text(Some(value)).filter(|b| !b.trim().is_empty())
                }
                None => existing.draft_blocks,
            },
            variables: input.variables.unwrap_or(existing.variables),
            resources: input.resources.unwrap_or(existing.resources),
            watchers: input.watchers.unwrap_or(existing.watchers),
            client_scripts: input.client_scripts.unwrap_or(existing.client_scripts),
            updated_at: Utc::now(),
            ..existing
        };
        lifecycle::validate_page(&mut page)?;
        ensure_resources_exist(&tx, &page.resources)?;

        save_page(&tx, &page)?;
        write_page_children(&tx, &page)?;

        tx.commit()?;
        Ok(Some(page))
    }

    /// Deletes a page, clearing the app's home page if it pointed here.
    pub fn delete_page(&self, name: &str) -> Result<bool> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE studio_apps SET app_home = NULL WHERE app_home = ?",
            [name],
        )?;
        let rows = tx.execute("DELETE FROM studio_pages WHERE name = ?", [name])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    /// Publishes a page: the draft tree replaces the published tree.
    ///
    /// Fails when another published page of the same app has the same route
    /// or title.
    pub fn publish_page(&self, name: &str) -> Result<Option<StudioPage>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(mut page) = query_page(&conn, name)? else {
            return Ok(None);
        };

        let conflicts = query_pages(
            &conn,
            "WHERE studio_app = ? AND name != ? AND published = 1 AND (route = ? OR page_title = ?)",
            &[&page.studio_app, &page.name, &page.route, &page.page_title],
        )?;
        lifecycle::publish_page(&mut page, &conflicts)?;
        lifecycle::validate_page(&mut page)?;
        page.updated_at = Utc::now();

        save_page(&conn, &page)?;
        tracing::info!("Published page {} of app {}", page.name, page.studio_app);
        Ok(Some(page))
    }

    /// Copies a page under a new name, into `target_app` or the source's app.
    pub fn duplicate_page(
        &self,
        name: &str,
        target_app: Option<String>,
    ) -> Result<Option<StudioPage>> {
        let Some(source) = self.get_page(name)? else {
            return Ok(None);
        };
        let target = target_app
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| source.studio_app.clone());

        let copy = self.create_page(&target, lifecycle::duplicate_page_input(&source))?;
        Ok(Some(copy))
    }

    /// Name of the published page of `app_name` served at `route`.
    pub fn find_page_with_route(&self, app_name: &str, route: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let route = crate::utils::with_leading_slash(route);
        let name = conn
            .query_row(
                "SELECT name FROM studio_pages WHERE studio_app = ? AND route = ? AND published = 1",
                [app_name, route.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    /// Non-empty block content of the app's published pages for `snapshot`.
    pub fn page_contents(&self, app_name: &str, snapshot: Snapshot) -> Result<Vec<String>> {
        let pages = self.get_published_pages(app_name)?;
        Ok(pages
            .iter()
            .filter_map(|page| page.content(snapshot).map(str::to_string))
            .collect())
    }

    // ============================================================
    // Studio Resource operations
    // ============================================================

    pub fn get_all_resources(&self) -> Result<Vec<StudioResource>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM studio_resources ORDER BY resource_name, name"
        ))?;

        let resources = stmt
            .query_map([], resource_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(resources)
    }

    pub fn get_resource(&self, name: &str) -> Result<Option<StudioResource>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_resource(&conn, name)
    }

    pub fn create_resource(&self, input: ResourceInput) -> Result<StudioResource> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let resource = lifecycle::prepare_resource(lifecycle::autoname_resource(), input, now, now)?;

        conn.execute(
            &format!(
                "INSERT INTO studio_resources ({RESOURCE_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                &resource.name,
                &resource.resource_name,
                resource.resource_type.as_str(),
                &resource.document_type,
                &resource.document_name,
                resource.fetch_document_using_filters,
                &resource.fields,
                &resource.filters,
                resource.limit,
                resource.method.as_str(),
                &resource.url,
                resource.transform_results,
                &resource.transform,
                &resource.whitelisted_methods,
                resource.created_at.to_rfc3339(),
                resource.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(resource)
    }

    /// Replaces a resource's configuration.
    pub fn update_resource(
        &self,
        name: &str,
        input: ResourceInput,
    ) -> Result<Option<StudioResource>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(existing) = query_resource(&conn, name)? else {
            return Ok(None);
        };
        let resource =
            lifecycle::prepare_resource(existing.name, input, existing.created_at, Utc::now())?;

        conn.execute(
            "UPDATE studio_resources SET resource_name = ?, resource_type = ?, document_type = ?,
                document_name = ?, fetch_document_using_filters = ?, fields = ?, filters = ?,
                fetch_limit = ?, method = ?, url = ?, transform_results = ?, transform = ?,
                whitelisted_methods = ?, updated_at = ?
             WHERE name = ?",
            params![
                &resource.resource_name,
                resource.resource_type.as_str(),
                &resource.document_type,
                &resource.document_name,
                resource.fetch_document_using_filters,
                &resource.fields,
                &resource.filters,
                resource.limit,
                resource.method.as_str(),
                &resource.url,
                resource.transform_results,
                &resource.transform,
                &resource.whitelisted_methods,
                resource.updated_at.to_rfc3339(),
                name,
            ],
        )?;

        Ok(Some(resource))
    }

    /// Deletes a resource and unlinks it from every page.
    pub fn delete_resource(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM studio_resources WHERE name = ?", [name])?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

// ============================================================
// Row helpers
// ============================================================

fn query_app(conn: &Connection, name: &str) -> Result<Option<StudioApp>> {
    let app = conn
        .query_row(
            &format!("SELECT {APP_COLUMNS} FROM studio_apps WHERE name = ?"),
            [name],
            app_from_row,
        )
        .optional()?;
    Ok(app)
}

fn route_in_use(conn: &Connection, route: &str, except: Option<&str>) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM studio_apps WHERE route = ? AND name != ?",
        [route, except.unwrap_or("")],
        |row| row.get(0),
    )?;
    Ok(taken)
}

fn page_titles(conn: &Connection, app_name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT page_title FROM studio_pages WHERE studio_app = ?")?;
    let titles = stmt
        .query_map([app_name], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(titles)
}

fn query_page(conn: &Connection, name: &str) -> Result<Option<StudioPage>> {
    let pages = query_pages(conn, "WHERE name = ?", &[&name])?;
    Ok(pages.into_iter().next())
}

fn query_pages(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<StudioPage>> {
    let mut stmt = conn.prepare(&format!("SELECT {PAGE_COLUMNS} FROM studio_pages {filter}"))?;
    let mut pages = stmt
        .query_map(args, page_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for page in &mut pages {
        load_page_children(conn, page)?;
    }
    Ok(pages)
}

fn load_page_children(conn: &Connection, page: &mut StudioPage) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT variable_name, variable_type, initial_value
         FROM studio_page_variables WHERE page = ? ORDER BY idx",
    )?;
    page.variables = stmt
        .query_map([&page.name], |row| {
            Ok(PageVariable {
                variable_name: row.get(0)?,
                variable_type: VariableType::from_str(&row.get::<_, String>(1)?)
                    .unwrap_or_default(),
                initial_value: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT resource FROM studio_page_resources WHERE page = ? ORDER BY idx")?;
    page.resources = stmt
        .query_map([&page.name], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT source, script, immediate FROM studio_page_watchers WHERE page = ? ORDER BY idx",
    )?;
    page.watchers = stmt
        .query_map([&page.name], |row| {
            Ok(PageWatcher {
                source: row.get(0)?,
                script: row.get(1)?,
                immediate: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn
        .prepare("SELECT script FROM studio_page_client_scripts WHERE page = ? ORDER BY idx")?;
    page.client_scripts = stmt
        .query_map([&page.name], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(())
}

fn save_page(conn: &Connection, page: &StudioPage) -> Result<()> {
    conn.execute(
        "UPDATE studio_pages SET page_name = ?, page_title = ?, route = ?, published = ?,
            blocks = ?, draft_blocks = ?, updated_at = ?
         WHERE name = ?",
        params![
            &page.page_name,
            &page.page_title,
            &page.route,
            page.published,
            &page.blocks,
            &page.draft_blocks,
            page.updated_at.to_rfc3339(),
            &page.name,
        ],
    )?;
    Ok(())
}

fn write_page_children(conn: &Connection, page: &StudioPage) -> Result<()> {
    conn.execute("DELETE FROM studio_page_variables WHERE page = ?", [&page.name])?;
    for (idx, variable) in page.variables.iter().enumerate() {
        conn.execute(
            "INSERT INTO studio_page_variables (page, idx, variable_name, variable_type, initial_value)
             VALUES (?, ?, ?, ?, ?)",
            params![
                &page.name,
                idx as i64,
                &variable.variable_name,
                variable.variable_type.as_str(),
                &variable.initial_value,
            ],
        )?;
    }

    conn.execute("DELETE FROM studio_page_resources WHERE page = ?", [&page.name])?;
    for (idx, resource) in page.resources.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO studio_page_resources (page, resource, idx) VALUES (?, ?, ?)",
            params![&page.name, resource, idx as i64],
        )?;
    }

    conn.execute("DELETE FROM studio_page_watchers WHERE page = ?", [&page.name])?;
    for (idx, watcher) in page.watchers.iter().enumerate() {
        conn.execute(
            "INSERT INTO studio_page_watchers (page, idx, source, script, immediate)
             VALUES (?, ?, ?, ?, ?)",
            params![&page.name, idx as i64, &watcher.source, &watcher.script, watcher.immediate],
        )?;
    }

    conn.execute("DELETE FROM studio_page_client_scripts WHERE page = ?", [&page.name])?;
    for (idx, script) in page.client_scripts.iter().enumerate() {
        conn.execute(
            "INSERT INTO studio_page_client_scripts (page, idx, script) VALUES (?, ?, ?)",
            params![&page.name, idx as i64, script],
        )?;
    }
    Ok(())
}

fn ensure_resources_exist(conn: &Connection, resources: &[String]) -> Result<()> {
    for name in resources {
        if query_resource(conn, name)?.is_none() {
            return Err(StudioError::validation(format!("Data Source {} not found", name)).into());
        }
    }
    Ok(())
}

fn query_resource(conn: &Connection, name: &str) -> Result<Option<StudioResource>> {
    let resource = conn
        .query_row(
            &format!("SELECT {RESOURCE_COLUMNS} FROM studio_resources WHERE name = ?"),
            [name],
            resource_from_row,
        )
        .optional()?;
    Ok(resource)
}

fn app_from_row(row: &Row<'_>) -> rusqlite::Result<StudioApp> {
    Ok(StudioApp {
        name: row.get(0)?,
        app_title: row.get(1)?,
        app_name: row.get(7)?,
        route: row.get(2)?,
        app_home: row.get(3)?,
        published: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<StudioPage> {
    Ok(StudioPage {
        name: row.get(0)?,
        studio_app: row.get(1)?,
        page_name: row.get(2)?,
        page_title: row.get(3)?,
        route: row.get(4)?,
        published: row.get(5)?,
        blocks: row.get(6)?,
        draft_blocks: row.get(7)?,
        variables: Vec::new(),
        resources: Vec::new(),
        watchers: Vec::new(),
        client_scripts: Vec::new(),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<StudioResource> {
    Ok(StudioResource {
        name: row.get(0)?,
        resource_name: row.get(1)?,
        resource_type: ResourceType::from_str(&row.get::<_, String>(2)?)
            .unwrap_or(ResourceType::ApiResource),
        document_type: row.get(3)?,
        document_name: row.get(4)?,
        fetch_document_using_filters: row.get(5)?,
        fields: row.get(6)?,
        filters: row.get(7)?,
        limit: row.get(8)?,
        method: HttpMethod::from_str(&row.get::<_, String>(9)?).unwrap_or_default(),
        url: row.get(10)?,
        transform_results: row.get(11)?,
        transform: row.get(12)?,
        whitelisted_methods: row.get(13)?,
        created_at: parse_datetime(row.get::<_, String>(14)?),
        updated_at: parse_datetime(row.get::<_, String>(15)?),
    })
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
