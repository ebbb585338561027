//! Shared domain types, traits, configuration and the chunker used by the
//! retrieval and ingestion pipeline.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
