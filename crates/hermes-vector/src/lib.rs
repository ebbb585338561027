//! hermes-vector
//!
//! LanceDB persistence for documents and chunks, and cosine nearest-neighbour
//! search over the chunk embeddings.
pub mod index_build;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod writer;

pub use index_build::{IndexBuildOutcome, IvfPqParams};
pub use store::{LanceStore, StoreOptions};
