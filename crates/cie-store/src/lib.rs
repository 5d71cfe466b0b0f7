//! Embedded datalog storage.
//!
//! Entities and edges are translated into cozo mutation statements and
//! executed in one transaction per batch. The table layout is vertically
//! partitioned: lightweight metadata, the large `code_text` column, and the
//! HNSW-indexed embedding vector each live in their own relation keyed by the
//! entity id, so metadata scans never drag code bodies or vectors along.

pub mod mutation;
pub mod schema;
pub mod store;

pub use mutation::{Mutation, MutationBuilder, batch_mutations};
pub use store::GraphStore;
