//! Lodestar Core Library
//!
//! The artifact synchronization engine: pagination over paged REST
//! resources, repository file parsing, the store and repository ports, and
//! the refresh and reconcile-and-publish pipelines.

// Re-export pure types from lodestar-types
pub use lodestar_types::*;

pub mod config;
pub mod error;
pub mod format;
pub mod pagination;
pub mod ports;
pub mod storage;
pub mod sync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{RefreshMode, SyncConfig};
pub use error::{LodestarError, Result};
pub use pagination::{Page, PageRequest, Paginator};
pub use ports::{ArtifactStore, RepositoryClient};
pub use storage::MemoryArtifactStore;
pub use sync::{EngagementOutcome, ModifyCounts, ReconcileReport, RefreshReport, SyncEngine};
