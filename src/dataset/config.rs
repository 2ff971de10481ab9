//! Configuration for datasets.
//!
//! Contains the tunables that shape how views write data files.

use crate::error::{Error, Result};

/// Configuration for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    /// Extension of data files created by writers, without the dot.
    pub data_file_extension: String,

    /// Maximum number of partition files a partitioned writer keeps open.
    ///
    /// When a record targets a new partition and the limit is reached, the
    /// least recently used partition file is closed first.
    pub max_open_writers: usize,
}

impl DatasetConfig {
    /// Creates a validated configuration.
    ///
    /// # Arguments
    /// * `data_file_extension` - Non-empty, without dots or path separators
    /// * `max_open_writers` - At least 1
    pub fn new(data_file_extension: impl Into<String>, max_open_writers: usize) -> Result<Self> {
        let data_file_extension = data_file_extension.into();
        if data_file_extension.is_empty()
            || data_file_extension.contains(|c: char| c == '.' || c == '/' || c == '\\')
        {
            return Err(Error::Config(format!(
                "invalid data file extension {:?}",
                data_file_extension
            )));
        }
        if max_open_writers == 0 {
            return Err(Error::Config(
                "max_open_writers must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            data_file_extension,
            max_open_writers,
        })
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_file_extension: "jsonl".to_string(),
            max_open_writers: 10,
        }
    }
}
