//! Lodestar Types - Pure type definitions shared by the engine, the
//! repository adapter and the HTTP layer.
//!
//! This crate contains only serde data types with no async runtime
//! dependencies.

pub mod artifact;
pub mod options;
pub mod repository;
pub mod timestamp;

pub use artifact::*;
pub use options::*;
pub use repository::*;
