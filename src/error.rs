use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the navigation controller.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The folder could not be listed.
    #[error("failed to scan folder {path:?}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested path is not part of the media list.
    #[error("{0:?} is not in the media list")]
    NotFound(PathBuf),

    /// Deleting a file from disk failed. In-memory state is unchanged.
    #[error("failed to delete {path:?}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The media list is empty.
    #[error("no media selected")]
    NoSelection,

    /// A background worker thread could not be started.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
