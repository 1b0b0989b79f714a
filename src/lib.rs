pub mod api;
pub mod blocks;
pub mod build;
pub mod client;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod models;
pub mod registry;
pub mod render;
pub mod utils;
