//! Domain models for Studio.
//!
//! # Core Concepts
//!
//! - [`StudioApp`]: A publishable web app. Owns pages and a build-identity route.
//!   Whether its bundle is fresh is derived from its pages, never stored.
//! - [`StudioPage`]: A page holding two independent block-tree snapshots,
//!   `blocks` (published) and `draft_blocks` (draft), plus routing metadata.
//! - [`PageVariable`]: Named reactive state declared on a page.
//! - [`PageWatcher`]: A page script re-run when a watched expression changes.
//! - [`StudioResource`]: A data source (document, document list or HTTP API)
//!   that pages bind to.
//!
//! Entities are plain data. Their lifecycle hooks live in [`crate::lifecycle`]
//! and are invoked by [`crate::db::Database`].

mod app;
mod page;
mod resource;

pub use app::*;
pub use page::*;
pub use resource::*;
