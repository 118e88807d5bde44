//! Lockstep merge of the four source files.
//!
//! Every step pulls one record from each source in the fixed order
//! personal info, employment, updates, vehicles. The sequence ends cleanly as
//! soon as any source runs dry. Diverging identity keys abort it: the error is
//! yielded once and nothing follows.

use crate::core::reader::CsvRowReader;
use crate::core::typed_rows::{RecordSource, SourceStats, TypedRows};
use crate::domain::model::{
    Employment, MergedRecord, PersonalInfo, SourceRole, TypedRecord, UpdateStatus, Vehicle,
};
use crate::domain::schema::{self, THRESHOLD_DATE_FORMAT};
use crate::utils::error::{MergeError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

pub type FileRows<T> = TypedRows<T, CsvRowReader<File>>;

pub type FileMergedRecords = MergedRecords<
    FileRows<PersonalInfo>,
    FileRows<Employment>,
    FileRows<UpdateStatus>,
    FileRows<Vehicle>,
>;

/// Parse a `DD/MM/YYYY` threshold into midnight UTC of that day.
pub fn parse_threshold_date(value: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, THRESHOLD_DATE_FORMAT).map_err(|source| {
        MergeError::InvalidDateFormat {
            value: value.to_string(),
            source,
        }
    })?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Builds merged record sequences from four files given in role order
/// vehicles, updates, employment, personal_info.
#[derive(Debug, Clone)]
pub struct FullRecordMerger {
    files: [PathBuf; 4],
    max_count: Option<usize>,
    max_recorded_date: Option<DateTime<Utc>>,
    skip_header: bool,
}

impl FullRecordMerger {
    /// Fails right away on a bad file list or an unparsable `max_recorded_date`.
    pub fn new<P: AsRef<Path>>(
        file_name_list: &[P],
        max_count: Option<usize>,
        max_recorded_date: Option<&str>,
    ) -> Result<Self> {
        schema::validate_registry()?;

        let files: [PathBuf; 4] = match file_name_list {
            [vehicles, updates, employment, personal_info] => [
                vehicles.as_ref().to_path_buf(),
                updates.as_ref().to_path_buf(),
                employment.as_ref().to_path_buf(),
                personal_info.as_ref().to_path_buf(),
            ],
            _ => {
                return Err(MergeError::ConfigError {
                    message: format!(
                        "Expected 4 source files (vehicles, updates, employment, personal_info), got {}",
                        file_name_list.len()
                    ),
                })
            }
        };

        let max_recorded_date = match max_recorded_date {
            Some(value) => Some(parse_threshold_date(value).inspect_err(|e| {
                tracing::error!("Invalid max_recorded_date: {}", e);
            })?),
            None => None,
        };

        Ok(Self {
            files,
            max_count,
            max_recorded_date,
            skip_header: true,
        })
    }

    /// Treat the first line of every file as data.
    pub fn without_headers(mut self) -> Self {
        self.skip_header = false;
        self
    }

    pub fn max_recorded_date(&self) -> Option<DateTime<Utc>> {
        self.max_recorded_date
    }

    pub fn file(&self, role: SourceRole) -> &Path {
        let index = SourceRole::FILE_ORDER
            .iter()
            .position(|r| *r == role)
            .unwrap_or_default();
        &self.files[index]
    }

    fn rows<T: TypedRecord>(&self, role: SourceRole) -> FileRows<T> {
        TypedRows::new(
            CsvRowReader::open(self.file(role), self.skip_header),
            self.max_count,
        )
        .with_label(role.to_string())
    }

    /// A fresh, single-pass merge over the files. No file is opened until the first pull.
    pub fn iter(&self) -> FileMergedRecords {
        MergedRecords::new(
            self.rows(SourceRole::PersonalInfo),
            self.rows(SourceRole::Employment),
            self.rows(SourceRole::Updates),
            self.rows(SourceRole::Vehicles),
            self.max_recorded_date,
        )
    }
}

impl<'a> IntoIterator for &'a FullRecordMerger {
    type Item = Result<MergedRecord>;
    type IntoIter = FileMergedRecords;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// How a merge sequence stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "source", rename_all = "snake_case")]
pub enum MergeOutcome {
    Running,
    /// Normal end of stream: this source ran out first.
    Exhausted(SourceRole),
    /// Stopped on a structural failure; the error was the last item yielded.
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub role: SourceRole,
    #[serde(flatten)]
    pub stats: SourceStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeStats {
    /// Aligned rows pulled from all four sources.
    pub rows_read: usize,
    pub merged: usize,
    /// Dropped by the `max_recorded_date` filter.
    pub filtered: usize,
    pub sources: Vec<SourceReport>,
}

struct Sources<P, E, U, V> {
    personal: P,
    employment: E,
    updates: U,
    vehicles: V,
}

impl<P, E, U, V> Sources<P, E, U, V>
where
    P: RecordSource<PersonalInfo>,
    E: RecordSource<Employment>,
    U: RecordSource<UpdateStatus>,
    V: RecordSource<Vehicle>,
{
    fn reports(&self) -> Vec<SourceReport> {
        vec![
            SourceReport {
                role: SourceRole::PersonalInfo,
                stats: self.personal.stats(),
            },
            SourceReport {
                role: SourceRole::Employment,
                stats: self.employment.stats(),
            },
            SourceReport {
                role: SourceRole::Updates,
                stats: self.updates.stats(),
            },
            SourceReport {
                role: SourceRole::Vehicles,
                stats: self.vehicles.stats(),
            },
        ]
    }
}

enum Stop {
    Exhausted(SourceRole),
    Failed(MergeError),
}

fn pull<T>(
    source: &mut impl Iterator<Item = Result<T>>,
    role: SourceRole,
) -> std::result::Result<T, Stop> {
    match source.next() {
        Some(Ok(record)) => Ok(record),
        Some(Err(e)) => Err(Stop::Failed(e)),
        None => Err(Stop::Exhausted(role)),
    }
}

type Row = (PersonalInfo, Employment, UpdateStatus, Vehicle);

pub struct MergedRecords<P, E, U, V> {
    sources: Option<Sources<P, E, U, V>>,
    threshold: Option<DateTime<Utc>>,
    outcome: MergeOutcome,
    stats: MergeStats,
}

impl<P, E, U, V> MergedRecords<P, E, U, V>
where
    P: RecordSource<PersonalInfo>,
    E: RecordSource<Employment>,
    U: RecordSource<UpdateStatus>,
    V: RecordSource<Vehicle>,
{
    pub fn new(
        personal: P,
        employment: E,
        updates: U,
        vehicles: V,
        threshold: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            sources: Some(Sources {
                personal,
                employment,
                updates,
                vehicles,
            }),
            threshold,
            outcome: MergeOutcome::Running,
            stats: MergeStats::default(),
        }
    }

    pub fn outcome(&self) -> MergeOutcome {
        self.outcome
    }

    pub fn stats(&self) -> MergeStats {
        let mut stats = self.stats.clone();
        if let Some(sources) = &self.sources {
            stats.sources = sources.reports();
        }
        stats
    }

    fn next_row(&mut self) -> std::result::Result<Row, Stop> {
        let Some(sources) = self.sources.as_mut() else {
            return Err(Stop::Failed(MergeError::ConfigError {
                message: "merge sequence already finished".to_string(),
            }));
        };
        let personal = pull(&mut sources.personal, SourceRole::PersonalInfo)?;
        let employment = pull(&mut sources.employment, SourceRole::Employment)?;
        let update = pull(&mut sources.updates, SourceRole::Updates)?;
        let vehicle = pull(&mut sources.vehicles, SourceRole::Vehicles)?;
        Ok((personal, employment, update, vehicle))
    }

    /// Record final statistics and release every source.
    fn finish(&mut self, outcome: MergeOutcome) {
        if let Some(sources) = self.sources.take() {
            self.stats.sources = sources.reports();
        }
        self.outcome = outcome;
    }
}

impl<P, E, U, V> Iterator for MergedRecords<P, E, U, V>
where
    P: RecordSource<PersonalInfo>,
    E: RecordSource<Employment>,
    U: RecordSource<UpdateStatus>,
    V: RecordSource<Vehicle>,
{
    type Item = Result<MergedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.outcome != MergeOutcome::Running {
            return None;
        }

        loop {
            let (personal, employment, update, vehicle) = match self.next_row() {
                Ok(row) => row,
                Err(Stop::Exhausted(role)) => {
                    tracing::debug!(
                        "Merge finished: {} exhausted after {} rows",
                        role,
                        self.stats.rows_read
                    );
                    self.finish(MergeOutcome::Exhausted(role));
                    return None;
                }
                Err(Stop::Failed(e)) => {
                    self.finish(MergeOutcome::Aborted);
                    return Some(Err(e));
                }
            };
            self.stats.rows_read += 1;

            let key = personal.key();
            if employment.key() != key || update.key() != key || vehicle.key() != key {
                let keys = vec![
                    personal.key().to_string(),
                    employment.key().to_string(),
                    update.key().to_string(),
                    vehicle.key().to_string(),
                ];
                tracing::error!("Mismatched keys at row {}: {:?}", self.stats.rows_read, keys);
                self.finish(MergeOutcome::Aborted);
                return Some(Err(MergeError::KeyMismatchError {
                    row: self.stats.rows_read,
                    keys,
                }));
            }

            if let Some(threshold) = self.threshold {
                if update.last_updated < threshold {
                    tracing::debug!("Filtered {}: last updated {}", key, update.last_updated);
                    self.stats.filtered += 1;
                    continue;
                }
            }

            self.stats.merged += 1;
            return Some(Ok(MergedRecord::from_parts(
                personal, employment, update, vehicle,
            )));
        }
    }
}
