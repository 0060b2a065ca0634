//! Storage layer
//!
//! SQLite (embedded) backs the artifact store in production; the in-memory
//! store from `lodestar-core` is available for local runs.

pub mod db;

pub use db::SqliteArtifactStore;
