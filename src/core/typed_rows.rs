use crate::core::converter::convert_record;
use crate::domain::model::TypedRecord;
use crate::utils::error::{MergeError, Result};
use csv::StringRecord;
use serde::Serialize;
use std::marker::PhantomData;

/// Result of converting one upstream row.
#[derive(Debug)]
pub enum RowOutcome<T> {
    Converted(T),
    /// Value coercion failed; the row is dropped and the stream goes on.
    Skipped { row: usize, reason: MergeError },
    /// Structural failure the caller has to deal with.
    Failed(MergeError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Upstream rows pulled, counted against `max_count`.
    pub consumed: usize,
    pub yielded: usize,
    pub skipped: usize,
}

/// Schema-typed view over a raw row sequence, capped at `max_count` upstream rows.
///
/// Rows whose values fail to coerce are logged and skipped but still count
/// towards the cap. Arity mismatches and read failures are yielded as `Err`.
pub struct TypedRows<T, I> {
    source: I,
    label: String,
    remaining: Option<usize>,
    stats: SourceStats,
    _record: PhantomData<fn() -> T>,
}

impl<T, I> TypedRows<T, I>
where
    T: TypedRecord,
    I: Iterator<Item = Result<StringRecord>>,
{
    pub fn new(source: I, max_count: Option<usize>) -> Self {
        Self {
            source,
            label: T::SCHEMA.name.to_string(),
            remaining: max_count,
            stats: SourceStats::default(),
            _record: PhantomData,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    /// Pull and convert the next upstream row without hiding skips.
    pub fn next_outcome(&mut self) -> Option<RowOutcome<T>> {
        if self.remaining == Some(0) {
            return None;
        }
        let raw = self.source.next()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.stats.consumed += 1;
        let row = self.stats.consumed;

        let outcome = match raw.and_then(|record| convert_record::<T>(&record)) {
            Ok(record) => {
                self.stats.yielded += 1;
                RowOutcome::Converted(record)
            }
            Err(reason) if reason.is_row_level() => {
                self.stats.skipped += 1;
                RowOutcome::Skipped { row, reason }
            }
            Err(e) => RowOutcome::Failed(e),
        };
        Some(outcome)
    }
}

/// A typed record sequence that can report how much of its upstream it used.
pub trait RecordSource<T>: Iterator<Item = Result<T>> {
    fn stats(&self) -> SourceStats;
}

impl<T, I> RecordSource<T> for TypedRows<T, I>
where
    T: TypedRecord,
    I: Iterator<Item = Result<StringRecord>>,
{
    fn stats(&self) -> SourceStats {
        self.stats
    }
}

impl<T, I> Iterator for TypedRows<T, I>
where
    T: TypedRecord,
    I: Iterator<Item = Result<StringRecord>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_outcome()? {
                RowOutcome::Converted(record) => return Some(Ok(record)),
                RowOutcome::Skipped { row, reason } => {
                    tracing::warn!("Skipping {} row {}: {}", self.label, row, reason);
                }
                RowOutcome::Failed(e) => {
                    tracing::error!("{} row {} failed: {}", self.label, self.stats.consumed, e);
                    return Some(Err(e));
                }
            }
        }
    }
}
