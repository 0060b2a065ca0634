//! Ports (interfaces) for the engine's external collaborators

pub mod repository;
pub mod store;

pub use repository::RepositoryClient;
pub use store::ArtifactStore;
