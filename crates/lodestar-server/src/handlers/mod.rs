//! HTTP handlers

pub mod artifacts;
pub mod health;
pub mod refresh;

pub use health::health;
