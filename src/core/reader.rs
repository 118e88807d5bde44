//! Lazy, single-pass CSV row reader.
//!
//! The underlying file is opened on the first pull and closed as soon as the
//! reader is exhausted, hits an I/O failure, or is dropped.

use crate::utils::error::{MergeError, Result};
use csv::{ErrorKind, StringRecord, StringRecordsIntoIter};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

type Opener<R> = Box<dyn FnOnce() -> std::io::Result<R>>;

enum ReaderState<R: Read> {
    Pending(Opener<R>),
    Open {
        records: StringRecordsIntoIter<BufReader<R>>,
        header_lines: u64,
    },
    Done,
}

pub struct CsvRowReader<R: Read = File> {
    label: String,
    skip_header: bool,
    state: ReaderState<R>,
    malformed: usize,
}

impl CsvRowReader<File> {
    /// Reader over a file on disk. Nothing is opened until the first `next()`.
    pub fn open(path: impl AsRef<Path>, skip_header: bool) -> Self {
        let path: PathBuf = path.as_ref().to_path_buf();
        let label = path.display().to_string();
        Self::with_opener(label, skip_header, Box::new(move || File::open(path)))
    }
}

impl<R: Read + 'static> CsvRowReader<R> {
    pub fn from_reader(label: impl Into<String>, reader: R, skip_header: bool) -> Self {
        Self::with_opener(label.into(), skip_header, Box::new(move || Ok(reader)))
    }
}

impl<R: Read> CsvRowReader<R> {
    fn with_opener(label: String, skip_header: bool, opener: Opener<R>) -> Self {
        Self {
            label,
            skip_header,
            state: ReaderState::Pending(opener),
            malformed: 0,
        }
    }

    /// Whether the underlying resource is currently held.
    pub fn is_open(&self) -> bool {
        matches!(self.state, ReaderState::Open { .. })
    }

    /// Lines dropped because they could not be parsed.
    pub fn malformed_lines(&self) -> usize {
        self.malformed
    }

    fn start(&mut self, opener: Opener<R>) -> Result<()> {
        let mut buffered = BufReader::new(opener()?);
        let mut header_lines = 0;
        if self.skip_header {
            let mut header = Vec::new();
            if buffered.read_until(b'\n', &mut header)? > 0 {
                header_lines = 1;
            }
        }

        let records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(b',')
            .quote(b'"')
            .from_reader(buffered)
            .into_records();

        tracing::debug!("Opened {} (header skipped: {})", self.label, header_lines > 0);
        self.state = ReaderState::Open {
            records,
            header_lines,
        };
        Ok(())
    }
}

impl<R: Read> Iterator for CsvRowReader<R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, ReaderState::Done) {
                ReaderState::Done => return None,
                ReaderState::Pending(opener) => {
                    if let Err(e) = self.start(opener) {
                        return Some(Err(e));
                    }
                }
                ReaderState::Open {
                    mut records,
                    header_lines,
                } => match records.next() {
                    None => {
                        tracing::debug!("Closed {} after last row", self.label);
                        return None;
                    }
                    Some(Ok(record)) => {
                        self.state = ReaderState::Open {
                            records,
                            header_lines,
                        };
                        return Some(Ok(record));
                    }
                    Some(Err(e)) => {
                        if matches!(e.kind(), ErrorKind::Io(_)) {
                            tracing::error!("Read failure in {}: {}", self.label, e);
                            return Some(Err(MergeError::CsvError(e)));
                        }
                        let line = e
                            .position()
                            .map(|p| p.line() + header_lines)
                            .unwrap_or_default();
                        self.malformed += 1;
                        tracing::warn!(
                            "Skipping malformed line {} in {}: {}",
                            line,
                            self.label,
                            e
                        );
                        self.state = ReaderState::Open {
                            records,
                            header_lines,
                        };
                    }
                },
            }
        }
    }
}
