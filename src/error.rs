use crate::models::Collection;
use std::path::PathBuf;
use thiserror::Error;

/// A row had fewer columns than its schema requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected at least {expected} fields, found {found}")]
pub struct MissingFields {
    pub expected: usize,
    pub found: usize,
}

/// Failures that abort a pipeline run. Unresolved references are not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{collection}: malformed record at {path:?} line {line}: expected at least {expected} fields, found {found}")]
    MalformedRecord {
        collection: Collection,
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{collection}: sink rejected batch {batch}")]
    SinkWrite {
        collection: Collection,
        batch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("{collection}: failed to read {path:?}")]
    Io {
        collection: Collection,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn collection(&self) -> Collection {
        match self {
            PipelineError::MalformedRecord { collection, .. }
            | PipelineError::SinkWrite { collection, .. }
            | PipelineError::Io { collection, .. } => *collection,
        }
    }
}
