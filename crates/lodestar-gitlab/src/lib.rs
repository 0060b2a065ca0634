//! GitLab adapter for the Lodestar repository port.

pub mod client;
pub mod config;

pub use client::GitlabClient;
pub use config::GitlabConfig;
