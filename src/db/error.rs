use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NickStoreError {
    #[error("failed to read nickname store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("nickname store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write nickname store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize nickname store: {0}")]
    Serialize(#[from] serde_json::Error),
}
