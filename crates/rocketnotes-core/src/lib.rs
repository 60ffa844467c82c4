//! # rocketnotes-core
//!
//! Core types, traits, and abstractions for rocketnotes.
//!
//! The data model (documents, trees, user configs, queue messages, vector
//! indexes), the error type and the traits every other crate implements or
//! consumes.

pub mod chunking;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod tree;

// Re-export commonly used types at crate root
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
