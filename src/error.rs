//! Crate-scoped error handling for partview.
//!
//! Each layer owns a precise error type; public APIs return the unified
//! [`Error`] so callers can match on the failure category without caring
//! which layer produced it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type exposed to users of the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Errors from the partition layer (value mapping, strategy definition)
    #[error("Partition error: {0}")]
    Partition(#[from] crate::partition::PartitionError),

    /// Invalid configuration parameters
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Listing partitions or data files failed
    #[error("Cannot enumerate {}: {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading, writing or deleting a path failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A data file held a line that is not a valid record
    #[error("Malformed record in {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A writer was handed a record its view does not include
    #[error("Record is outside the view's constraints")]
    RecordOutsideView,

    /// The view's constraints cannot be mapped onto whole partitions
    #[error("Cannot cleanly delete view: {0}")]
    UnsupportedDelete(String),
}

impl Error {
    pub(crate) fn enumeration(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Enumeration {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the failure happened while listing directories.
    pub fn is_enumeration(&self) -> bool {
        matches!(self, Error::Enumeration { .. })
    }

    /// Returns true if a partitioner rejected a field value.
    pub fn is_invalid_value(&self) -> bool {
        matches!(
            self,
            Error::Partition(crate::partition::PartitionError::InvalidValue { .. })
        )
    }
}
