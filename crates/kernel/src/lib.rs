//! Cadence Site Kernel Library
//!
//! Public pages, the blog CMS API, the media library and feedback intake.
//! The main entry point for running the server is the `cadence` binary;
//! the library is exposed for integration testing and tooling.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod media;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod theme;
pub mod toc;

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
