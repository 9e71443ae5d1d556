// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandSyncError {
    /// The host could not create an actor from a template.
    #[error("failed to instantiate hand model '{template}': {reason}")]
    Instantiate { template: String, reason: String },

    #[error("unknown hand model template '{0}'")]
    UnknownTemplate(String),

    #[error("hand {id} has {found} landmarks, expected at least {expected}")]
    Landmarks { id: i32, found: usize, expected: usize },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, HandSyncError>;
