//! Workspace-wide error type.
//!
//! Mirrors the recovered-vs-surfaced split of the error handling policy: the
//! first five variants are recorded into a run's counters and never abort a
//! pipeline run; the last three propagate and stop the run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CieError {
    #[error("{0} is not a version-controlled repository")]
    NotARepository(PathBuf),

    #[error("no prior indexed reference recorded for {0}")]
    NoPriorReference(PathBuf),

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error("storage write failed: {0}")]
    Storage(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("schema already exists, ignoring")]
    SchemaExists,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CieResult<T> = std::result::Result<T, CieError>;
