//! Error taxonomy shared by the store, the repository layer, and the client
//! model. Each variant corresponds to one way a caller has to react: fix the
//! input, accept that the set is gone, retry later, or fix the import file.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before touching the store (missing set or song title,
    /// a reorder that is not a permutation, ...).
    #[error("{0}")]
    Validation(String),

    /// The requested set id has no matching row.
    #[error("Set {0} not found")]
    NotFound(String),

    /// A store operation failed. Only the short context is displayed; the
    /// underlying SQLite error stays reachable through `source()` for logs.
    #[error("{context}")]
    Store {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Import input was not an array of sets (or a versioned envelope).
    #[error("Invalid import data: {0}")]
    MalformedImportPayload(String),

    /// The client is running from the local snapshot and cannot persist.
    #[error("The set store is unavailable; working read-only from the local snapshot.")]
    Offline,

    /// Reading or writing a snapshot or backup file failed.
    #[error("failed to access {}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize sets")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Attach a short, user-safe description to a rusqlite failure. Mirrors the
/// `anyhow::Context` style used around the SQL calls.
pub(crate) trait StoreContext<T> {
    fn store_context(self, context: &'static str) -> Result<T>;
}

impl<T> StoreContext<T> for std::result::Result<T, rusqlite::Error> {
    fn store_context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| Error::Store { context, source })
    }
}
