//! Record reader over a view.

use super::iterator::PathIterator;
use crate::constraints::Constraints;
use crate::error::{Error, Result};
use crate::storage::FileSystem;
use crate::value::Record;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

type RecordLines = Lines<BufReader<Box<dyn Read + Send>>>;

/// Streams the records of a view, one data file at a time.
///
/// Each data file holds one JSON object per line; blank lines are skipped.
/// Records that fall outside the view's constraints are filtered out, since
/// a partition can hold more than the view selects. The first failure is
/// yielded once and ends the stream. At most one file is open at a time and
/// it is released when the reader is closed or dropped.
pub struct DatasetReader {
    fs: Arc<dyn FileSystem>,
    paths: PathIterator,
    constraints: Constraints,
    current: Option<(PathBuf, RecordLines)>,
    finished: bool,
}

impl DatasetReader {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        paths: PathIterator,
        constraints: Constraints,
    ) -> Self {
        Self {
            fs,
            paths,
            constraints,
            current: None,
            finished: false,
        }
    }

    /// Releases the open data file, if any.
    pub fn close(mut self) {
        self.current = None;
        self.finished = true;
    }
}

impl Iterator for DatasetReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if let Some((path, lines)) = self.current.as_mut() {
                match lines.next() {
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Record>(&line) {
                            Ok(record) if self.constraints.matches(&record) => {
                                return Some(Ok(record))
                            }
                            Ok(_) => continue,
                            Err(source) => {
                                let path = path.clone();
                                self.current = None;
                                self.finished = true;
                                return Some(Err(Error::Format { path, source }));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let path = path.clone();
                        self.current = None;
                        self.finished = true;
                        return Some(Err(Error::io(path, e)));
                    }
                    None => {}
                }
                self.current = None;
            }

            let path = match self.paths.next() {
                Some(Ok(path)) => path,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            };
            match self.fs.open_read(&path) {
                Ok(reader) => {
                    trace!(path = %path.display(), "Opened data file");
                    self.current = Some((path, BufReader::new(reader).lines()));
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(Error::io(path, e)));
                }
            }
        }
    }
}
